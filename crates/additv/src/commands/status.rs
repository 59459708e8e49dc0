use additv_config::ConnectionSettings;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;

fn shown(value: Option<&String>) -> &str {
    value.map_or("(unset)", String::as_str)
}

fn secret(value: Option<&String>) -> &'static str {
    match value {
        Some(v) if !v.is_empty() => "(set)",
        _ => "(unset)",
    }
}

pub fn render(settings: &ConnectionSettings) -> String {
    [
        format!("url: {}", shown(settings.url.as_ref())),
        format!("printer_id: {}", shown(settings.printer_id.as_ref())),
        format!(
            "service_principal_id: {}",
            shown(settings.service_principal_id.as_ref())
        ),
        format!("registration_token: {}", secret(settings.registration_token.as_ref())),
        format!("access_key: {}", secret(settings.access_key.as_ref())),
        format!("refresh_key: {}", secret(settings.refresh_key.as_ref())),
        format!("anon_key: {}", secret(settings.anon_key.as_ref())),
        format!(
            "registered: {}",
            if settings.is_registered() { "yes" } else { "no" }
        ),
    ]
    .join("\n")
}

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let store = config::open_store(global)?;
    println!("settings: {}", store.path().display());
    println!("{}", render(&store.settings()));
    Ok(())
}
