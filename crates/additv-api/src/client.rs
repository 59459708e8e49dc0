// Backend HTTP client
//
// Wraps `reqwest::Client` with URL construction for the three backend
// surfaces (auth, REST tables, functions), header injection, and the
// token-rotation observer list. Endpoint methods live in `session`,
// `rest`, and `registration` to keep this module on transport mechanics.

use std::sync::RwLock;

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace};
use url::Url;

use crate::auth::{RotationObserver, TokenPair};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Longest response body excerpt carried inside an error.
const ERROR_BODY_PREVIEW: usize = 200;

/// Credentials currently held. The refresh half is optional: a printer
/// configured with only an access key can still write until it expires.
#[derive(Clone)]
struct HeldTokens {
    access_token: SecretString,
    refresh_token: Option<SecretString>,
}

/// Raw HTTP client for the backend.
///
/// Holds the anonymous project key, the current token pair, and the
/// observers to notify when that pair rotates. Safe to share behind an
/// `Arc` between the queue worker and the caller's thread.
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
    anon_key: SecretString,
    tokens: RwLock<Option<HeldTokens>>,
    observers: RwLock<Vec<RotationObserver>>,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let has_session = self.tokens.read().map(|t| t.is_some()).unwrap_or(false);
        f.debug_struct("BackendClient")
            .field("base_url", &self.base_url.as_str())
            .field("has_session", &has_session)
            .finish_non_exhaustive()
    }
}

impl BackendClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(
        base_url: Url,
        anon_key: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, anon_key))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, anon_key: SecretString) -> Self {
        Self {
            http,
            base_url,
            anon_key,
            tokens: RwLock::new(None),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // ── Token management ─────────────────────────────────────────────

    /// Install a token pair without notifying observers (initial load).
    pub fn set_tokens(&self, tokens: TokenPair) {
        self.set_access_token(tokens.access_token, Some(tokens.refresh_token));
    }

    /// Install an access token, with or without a refresh token.
    pub fn set_access_token(&self, access_token: SecretString, refresh_token: Option<SecretString>) {
        *self.tokens.write().expect("token lock poisoned") = Some(HeldTokens {
            access_token,
            refresh_token,
        });
    }

    /// The current token pair, if both halves are held.
    pub fn tokens(&self) -> Option<TokenPair> {
        let guard = self.tokens.read().expect("token lock poisoned");
        let held = guard.as_ref()?;
        Some(TokenPair {
            access_token: held.access_token.clone(),
            refresh_token: held.refresh_token.clone()?,
        })
    }

    /// The refresh token, if one is held.
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.tokens
            .read()
            .expect("token lock poisoned")
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
    }

    /// Register a handler invoked every time the token pair rotates.
    pub fn on_token_rotated(&self, observer: RotationObserver) {
        self.observers
            .write()
            .expect("observer lock poisoned")
            .push(observer);
    }

    /// Store a freshly issued pair, then notify every observer in
    /// registration order before returning.
    pub(crate) fn rotate(&self, tokens: TokenPair) {
        self.set_tokens(tokens.clone());
        let observers = self.observers.read().expect("observer lock poisoned").clone();
        debug!(observers = observers.len(), "token pair rotated");
        for observer in &observers {
            observer(&tokens);
        }
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/{path}`, tolerant of trailing slashes on the base.
    pub(crate) fn url(base: &Url, path: &str) -> Result<Url, Error> {
        let base = base.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// `{base}/auth/v1/{path}`
    pub(crate) fn auth_url(&self, path: &str) -> Result<Url, Error> {
        Self::url(&self.base_url, &format!("auth/v1/{path}"))
    }

    /// `{base}/rest/v1/{table}`
    pub(crate) fn rest_url(&self, table: &str) -> Result<Url, Error> {
        Self::url(&self.base_url, &format!("rest/v1/{table}"))
    }

    /// `{base}/functions/v1/{name}`
    pub(crate) fn function_url(&self, name: &str) -> Result<Url, Error> {
        Self::url(&self.base_url, &format!("functions/v1/{name}"))
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Attach only the project key (auth endpoints that precede a session).
    pub(crate) fn with_anon_key(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("apikey", self.anon_key.expose_secret())
    }

    /// Attach the project key and the bearer access token.
    pub(crate) fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, Error> {
        let guard = self.tokens.read().expect("token lock poisoned");
        let tokens = guard.as_ref().ok_or(Error::NoSession)?;
        Ok(self
            .with_anon_key(builder)
            .bearer_auth(tokens.access_token.expose_secret()))
    }

    /// Send an authorized request. If the access token is rejected and a
    /// refresh token is held, refresh once and resend.
    pub(crate) async fn send<F>(&self, build: F) -> Result<reqwest::Response, Error>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder + Send + Sync,
    {
        let resp = self.authorized(build(&self.http))?.send().await?;
        if resp.status() != reqwest::StatusCode::UNAUTHORIZED {
            return Self::check(resp).await;
        }

        if self.refresh_token().is_none() {
            return Err(Error::SessionExpired);
        }

        debug!("access token rejected, refreshing session");
        self.refresh_session().await?;

        let resp = self.authorized(build(&self.http))?.send().await?;
        Self::check(resp).await
    }

    /// Map non-success responses into errors, passing successes through.
    pub(crate) async fn check(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
        let status = resp.status();
        trace!(%status, url = %resp.url(), "response");

        if status.is_success() {
            return Ok(resp);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::SessionExpired);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(Error::Api {
            status: status.as_u16(),
            message: preview(&body),
        })
    }
}

/// Truncate a response body for inclusion in an error message.
pub(crate) fn preview(body: &str) -> String {
    body.chars().take(ERROR_BODY_PREVIEW).collect()
}
