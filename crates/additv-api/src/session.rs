// Session endpoints
//
// Identity lookup and refresh-token exchange. These calls deliberately
// bypass `BackendClient::send` so a failing refresh can never recurse.

use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::auth::{AuthUser, TokenPair};
use crate::client::{BackendClient, preview};
use crate::error::Error;

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    refresh_token: String,
}

impl BackendClient {
    /// Fetch the principal behind the current access token.
    ///
    /// `GET /auth/v1/user`. Never refreshes on its own: a 401 surfaces
    /// as [`Error::SessionExpired`] so the caller decides what to do.
    pub async fn current_user(&self) -> Result<AuthUser, Error> {
        let url = self.auth_url("user")?;
        debug!("fetching authenticated user at {}", url);

        let resp = self.authorized(self.http().get(url))?.send().await?;
        let resp = Self::check(resp).await?;
        let body = resp.text().await?;

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        })
    }

    /// Exchange the held refresh token for a new pair.
    ///
    /// `POST /auth/v1/token?grant_type=refresh_token`. On success the new
    /// pair replaces the old one and every rotation observer runs before
    /// this returns.
    pub async fn refresh_session(&self) -> Result<TokenPair, Error> {
        let refresh_token = self.refresh_token().ok_or(Error::NoSession)?;

        let mut url = self.auth_url("token")?;
        url.query_pairs_mut().append_pair("grant_type", "refresh_token");
        debug!("refreshing session at {}", url);

        let resp = self
            .with_anon_key(self.http().post(url))
            .json(&json!({ "refresh_token": refresh_token.expose_secret() }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("refresh failed (HTTP {status}): {}", preview(&body)),
            });
        }

        let body = resp.text().await?;
        let refreshed: RefreshResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: format!("{e} (body preview: {:?})", preview(&body)),
                body: body.clone(),
            })?;

        let pair = TokenPair::new(refreshed.access_token, refreshed.refresh_token);
        self.rotate(pair.clone());
        debug!("session refresh successful");
        Ok(pair)
    }
}
