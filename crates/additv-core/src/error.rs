// ── Core error types ──
//
// Errors are split by where they are allowed to travel. Connection
// failures reach the caller of `ConnectionManager::connect`. Operation
// failures end inside the queue worker's log. Field errors never leave
// the decoder.

use thiserror::Error;

/// Failure to establish or keep a backend session.
///
/// Fatal to initialization: the manager stays unconnected and does not
/// retry in the background.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Missing connection setting: {field}")]
    MissingCredential { field: String },

    #[error("Invalid backend URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Cannot reach backend at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Backend rejected the session: {message}")]
    Rejected { message: String },

    #[error("Session refresh failed: {message}")]
    RefreshFailed { message: String },

    #[error("Authenticated as '{actual}' but this printer belongs to '{expected}'")]
    IdentityMismatch { expected: String, actual: String },
}

impl ConnectionError {
    pub(crate) fn missing(field: &str) -> Self {
        Self::MissingCredential {
            field: field.to_owned(),
        }
    }

    /// Classify a transport-layer error raised while connecting.
    pub(crate) fn from_api(url: &str, err: additv_api::Error) -> Self {
        match err {
            additv_api::Error::Transport(ref e) if e.is_connect() || e.is_timeout() => {
                Self::Unreachable {
                    url: url.to_owned(),
                    reason: e.to_string(),
                }
            }
            additv_api::Error::InvalidUrl(e) => Self::InvalidUrl {
                url: url.to_owned(),
                reason: e.to_string(),
            },
            other => Self::Rejected {
                message: other.to_string(),
            },
        }
    }
}

/// A queued write that used up its retry budget.
#[derive(Debug, Error)]
#[error("{operation} failed after {attempts} attempts: {source}")]
pub struct OperationError {
    pub operation: String,
    pub attempts: u32,
    #[source]
    pub source: additv_api::Error,
}

/// A single status-line field that could not be used.
///
/// Logged and dropped; the rest of the reading survives.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("{metric}: unparseable value {raw:?}")]
    Parse { metric: &'static str, raw: String },

    #[error("{metric}: {value} outside {min}..={max}")]
    OutOfRange {
        metric: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error("Configuration error: {0}")]
    Config(#[from] additv_config::ConfigError),

    #[error("Not connected to the backend")]
    NotConnected,

    #[error("Printer registration failed: {message}")]
    Registration { message: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },
}

impl From<additv_api::Error> for CoreError {
    fn from(err: additv_api::Error) -> Self {
        match err {
            additv_api::Error::NoSession => Self::NotConnected,
            additv_api::Error::Authentication { message } => {
                Self::Connection(ConnectionError::Rejected { message })
            }
            additv_api::Error::Registration { message } => Self::Registration { message },
            other => Self::Api {
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}
