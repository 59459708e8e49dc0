//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing errors with actionable
//! help text.

use miette::Diagnostic;
use thiserror::Error;

use additv_config::ConfigError;
use additv_core::{ConnectionError, CoreError, OperationError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const CONFIG: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the backend at {url}")]
    #[diagnostic(
        code(additv::connection_failed),
        help(
            "Check the network and the configured URL.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Backend rejected this printer's credentials")]
    #[diagnostic(
        code(additv::auth_failed),
        help(
            "{message}\n\
             If the keys were revoked, register again: additv register --token <TOKEN> --name <NAME>"
        )
    )]
    AuthFailed { message: String },

    #[error("Authenticated as '{actual}', but this printer belongs to '{expected}'")]
    #[diagnostic(
        code(additv::identity_mismatch),
        help("The stored access key belongs to another principal. Re-register this printer.")
    )]
    IdentityMismatch { expected: String, actual: String },

    #[error("Registration failed: {message}")]
    #[diagnostic(
        code(additv::registration_failed),
        help("Registration tokens are single-use. Request a fresh one from the dashboard.")
    )]
    RegistrationFailed { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Setting '{field}' is not configured")]
    #[diagnostic(
        code(additv::missing_setting),
        help(
            "Register the printer first: additv register --token <TOKEN> --name <NAME>\n\
             Settings file: {path}"
        )
    )]
    MissingSetting { field: String, path: String },

    #[error(transparent)]
    #[diagnostic(code(additv::config))]
    Config(#[from] ConfigError),

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(additv::validation))]
    Validation { field: String, reason: String },

    // ── Backend ──────────────────────────────────────────────────────
    #[error("Backend error: {message}")]
    #[diagnostic(code(additv::api_error))]
    Api { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(additv::json), help("Event payloads must be a JSON object."))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. }
            | Self::IdentityMismatch { .. }
            | Self::RegistrationFailed { .. } => exit_code::AUTH,
            Self::MissingSetting { .. } | Self::Config(_) => exit_code::CONFIG,
            Self::Validation { .. } | Self::Json(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the settings path to a connection failure.
    pub fn from_connection(err: ConnectionError, settings_path: &str) -> Self {
        match err {
            ConnectionError::MissingCredential { field } => Self::MissingSetting {
                field,
                path: settings_path.to_owned(),
            },
            ConnectionError::InvalidUrl { url, reason } => Self::Validation {
                field: "url".into(),
                reason: format!("{url}: {reason}"),
            },
            ConnectionError::Unreachable { url, reason } => Self::ConnectionFailed { url, reason },
            ConnectionError::Rejected { message } | ConnectionError::RefreshFailed { message } => {
                Self::AuthFailed { message }
            }
            ConnectionError::IdentityMismatch { expected, actual } => {
                Self::IdentityMismatch { expected, actual }
            }
        }
    }

    /// A one-shot write that used up its retries.
    pub fn from_operation(err: OperationError, url: &str) -> Self {
        let OperationError {
            operation,
            attempts,
            source,
        } = err;
        match source {
            additv_api::Error::Transport(ref e) if e.is_connect() || e.is_timeout() => {
                Self::ConnectionFailed {
                    url: url.to_owned(),
                    reason: format!("{operation} failed after {attempts} attempts: {e}"),
                }
            }
            additv_api::Error::SessionExpired | additv_api::Error::Authentication { .. } => {
                Self::AuthFailed {
                    message: source.to_string(),
                }
            }
            other => Self::Api {
                message: format!("{operation} failed after {attempts} attempts: {other}"),
            },
        }
    }

    pub fn from_core(err: CoreError, settings_path: &str) -> Self {
        match err {
            CoreError::Connection(e) => Self::from_connection(e, settings_path),
            CoreError::Config(e) => Self::Config(e),
            CoreError::Registration { message } => Self::RegistrationFailed { message },
            CoreError::NotConnected => Self::AuthFailed {
                message: "no active session".into(),
            },
            other => Self::Api {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let path = "/tmp/additv.toml";
        let missing = CliError::from_connection(
            ConnectionError::MissingCredential {
                field: "access_key".into(),
            },
            path,
        );
        assert_eq!(missing.exit_code(), exit_code::CONFIG);

        let mismatch = CliError::from_connection(
            ConnectionError::IdentityMismatch {
                expected: "a".into(),
                actual: "b".into(),
            },
            path,
        );
        assert_eq!(mismatch.exit_code(), exit_code::AUTH);

        let unreachable = CliError::from_connection(
            ConnectionError::Unreachable {
                url: "http://x".into(),
                reason: "refused".into(),
            },
            path,
        );
        assert_eq!(unreachable.exit_code(), exit_code::CONNECTION);
    }
}
