use thiserror::Error;

/// Top-level error type for the `additv-api` crate.
///
/// Covers every failure mode of the backend surface: authentication,
/// transport, REST/function responses, and the registration handshake.
/// `additv-core` maps these into its own taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The backend rejected our credentials.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Access token expired or was revoked (HTTP 401 on a data call).
    #[error("Session expired -- token refresh required")]
    SessionExpired,

    /// No access token is held by the client.
    #[error("No active session")]
    NoSession,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Backend ─────────────────────────────────────────────────────
    /// Non-success response from a table or function endpoint.
    #[error("Backend API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Registration handshake failed or returned an incomplete response.
    #[error("Registration failed: {message}")]
    Registration { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// A request body could not be encoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates auth has expired
    /// and a token refresh might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::SessionExpired => true,
            _ => false,
        }
    }

    /// HTTP status code, when the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::SessionExpired => Some(401),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
