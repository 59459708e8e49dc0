use std::sync::Arc;

use secrecy::SecretString;
use serde::Deserialize;

/// An access/refresh token pair.
///
/// The backend always rotates both halves together; holders must never
/// store one without the other.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: SecretString::from(refresh_token.into()),
        }
    }
}

/// The authenticated principal, as reported by `GET /auth/v1/user`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthUser {
    pub id: String,
}

/// Callback fired synchronously whenever the backend hands us a new
/// token pair. Runs inside the request that triggered the refresh.
pub type RotationObserver = Arc<dyn Fn(&TokenPair) + Send + Sync>;
