use std::sync::Arc;

use tracing::debug;

use additv_core::ConnectionManager;

use crate::cli::{GlobalOpts, RegisterArgs};
use crate::config;
use crate::error::CliError;

pub async fn handle(args: RegisterArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let store = config::open_store(global)?;
    let path = store.path().display().to_string();

    if args.url.is_some() || args.token.is_some() {
        store.update(|s| {
            if let Some(url) = args.url {
                s.url = Some(url);
            }
            if let Some(token) = args.token {
                s.registration_token = Some(token);
            }
        })?;
        debug!(%path, "stored registration inputs");
    }

    let manager = ConnectionManager::new(Arc::clone(&store), config::transport(global));
    let saved = manager
        .register(&args.name)
        .await
        .map_err(|e| CliError::from_core(e, &path))?;

    println!(
        "registered printer {} ({})",
        saved.printer_id.as_deref().unwrap_or_default(),
        args.name
    );
    println!("settings saved to {path}");
    Ok(())
}
