//! Resolution of the data directory, settings store, and transport
//! from global flags.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use additv_api::{TlsMode, TransportConfig};
use additv_config::{SessionStore, default_data_dir};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub fn data_dir(global: &GlobalOpts) -> PathBuf {
    global.data_dir.clone().unwrap_or_else(default_data_dir)
}

/// Open the settings store, merged with environment overrides.
pub fn open_store(global: &GlobalOpts) -> Result<Arc<SessionStore>, CliError> {
    let dir = data_dir(global);
    tracing::debug!(data_dir = %dir.display(), "opening settings store");
    Ok(Arc::new(SessionStore::open(&dir)?))
}

pub fn transport(global: &GlobalOpts) -> TransportConfig {
    let tls = global
        .ca_cert
        .clone()
        .map_or(TlsMode::System, TlsMode::CustomCa);
    TransportConfig {
        tls,
        ..TransportConfig::default()
    }
    .with_timeout(Duration::from_secs(global.timeout))
}
