// Registration handshake
//
// Trades a one-time registration token for the printer's permanent
// identity and credentials. Runs before any session exists, so it is a
// free function rather than a `BackendClient` method.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::client::{BackendClient, preview};
use crate::error::Error;
use crate::transport::TransportConfig;

/// Fixed handshake endpoint, relative to the backend base URL.
pub const REGISTRATION_PATH: &str = "functions/v1/register-printer";

#[derive(Debug, Serialize)]
pub struct RegistrationRequest<'a> {
    pub registration_token: &'a str,
    pub printer_name: &'a str,
}

/// Identifiers may arrive as JSON strings or numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum Identifier {
    Text(String),
    Number(serde_json::Number),
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        match id {
            Identifier::Text(text) => text,
            Identifier::Number(n) => n.to_string(),
        }
    }
}

/// Every field is optional on the wire so that a partial response turns
/// into a descriptive [`Error::Registration`] instead of a serde error.
#[derive(Deserialize)]
struct RawRegistration {
    printer_id: Option<Identifier>,
    service_principal_id: Option<Identifier>,
    access_key: Option<String>,
    refresh_key: Option<String>,
    anon_key: Option<String>,
}

/// A complete registration response.
#[derive(Debug, Clone)]
pub struct Registration {
    pub printer_id: String,
    pub service_principal_id: String,
    pub access_key: SecretString,
    pub refresh_key: SecretString,
    pub anon_key: SecretString,
}

impl TryFrom<RawRegistration> for Registration {
    type Error = Error;

    fn try_from(raw: RawRegistration) -> Result<Self, Error> {
        fn require(field: &str, value: Option<String>) -> Result<String, Error> {
            value
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::Registration {
                    message: format!("response is missing '{field}'"),
                })
        }

        Ok(Self {
            printer_id: require("printer_id", raw.printer_id.map(String::from))?,
            service_principal_id: require(
                "service_principal_id",
                raw.service_principal_id.map(String::from),
            )?,
            access_key: require("access_key", raw.access_key)?.into(),
            refresh_key: require("refresh_key", raw.refresh_key)?.into(),
            anon_key: require("anon_key", raw.anon_key)?.into(),
        })
    }
}

/// Perform the registration handshake.
///
/// `POST {base}/functions/v1/register-printer`. The anonymous key, when
/// already known, is sent as `apikey`.
pub async fn register(
    base_url: &Url,
    anon_key: Option<&SecretString>,
    request: &RegistrationRequest<'_>,
    transport: &TransportConfig,
) -> Result<Registration, Error> {
    let http = transport.build_client()?;
    let url = BackendClient::url(base_url, REGISTRATION_PATH)?;
    debug!(printer = request.printer_name, "registering printer at {}", url);

    let mut builder = http.post(url).json(request);
    if let Some(key) = anon_key {
        builder = builder.header("apikey", key.expose_secret());
    }

    let resp = builder.send().await?;
    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(Error::Registration {
            message: format!("HTTP {status}: {}", preview(&body)),
        });
    }

    let raw: RawRegistration = serde_json::from_str(&body).map_err(|e| Error::Registration {
        message: format!("unreadable response: {e}"),
    })?;
    let registration = Registration::try_from(raw)?;
    info!(printer_id = %registration.printer_id, "printer registered");
    Ok(registration)
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<Registration, Error> {
        let raw: RawRegistration = serde_json::from_str(body).expect("valid json");
        Registration::try_from(raw)
    }

    #[test]
    fn numeric_identifiers_are_accepted() {
        let registration = parse(
            r#"{"printer_id": 17, "service_principal_id": 9001,
                "access_key": "a", "refresh_key": "r", "anon_key": "k"}"#,
        )
        .expect("complete response");
        assert_eq!(registration.printer_id, "17");
        assert_eq!(registration.service_principal_id, "9001");
    }

    #[test]
    fn missing_field_is_named() {
        let err = parse(r#"{"printer_id": "p-1", "access_key": "a"}"#).unwrap_err();
        assert!(err.to_string().contains("service_principal_id"), "{err}");
    }
}
