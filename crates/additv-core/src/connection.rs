// ── Connection manager ──
//
// Owns the live backend session. A session is established with the
// stored access key; if the backend rejects it and a refresh key is
// held, one refresh and one more attempt follow. Every rotated token
// pair is written through the SessionStore before listeners hear
// about it.

use std::sync::{Arc, Mutex, RwLock};

use additv_api::{
    BackendClient, RegistrationRequest, RotationObserver, TokenPair, TransportConfig,
};
use additv_config::{ConfigError, ConnectionSettings, SessionStore};
use secrecy::{ExposeSecret, SecretString};
use tracing::{Instrument, Span, debug, error, info, warn};
use url::Url;

use crate::error::{ConnectionError, CoreError};
use crate::model::Job;
use crate::operation::{Backend, Operation};

/// Remote function handing out the next queued print job.
pub const NEXT_JOB_FUNCTION: &str = "get-next-job";

/// An authenticated, identity-checked backend session.
#[derive(Debug)]
pub struct Session {
    client: Arc<BackendClient>,
    principal_id: String,
    printer_id: String,
}

impl Session {
    pub fn client(&self) -> &Arc<BackendClient> {
        &self.client
    }

    pub fn principal_id(&self) -> &str {
        &self.principal_id
    }

    pub fn printer_id(&self) -> &str {
        &self.printer_id
    }

    /// Ask the backend for the next job, if any.
    pub async fn next_job(&self) -> Result<Option<Job>, CoreError> {
        let response = self.client.invoke(NEXT_JOB_FUNCTION, None).await?;
        let job = response.as_ref().and_then(Job::from_value);
        match &job {
            Some(j) => info!(job_id = %j.job_id, "next job received"),
            None => debug!("no job available"),
        }
        Ok(job)
    }
}

impl Backend for Session {
    async fn execute(&self, op: &Operation) -> Result<(), additv_api::Error> {
        self.client.execute(op).await
    }
}

pub struct ConnectionManager {
    store: Arc<SessionStore>,
    transport: TransportConfig,
    listeners: Arc<RwLock<Vec<RotationObserver>>>,
    session: Mutex<Option<Arc<Session>>>,
    span: Span,
}

fn required<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, ConnectionError> {
    ConnectionSettings::require(field, value).map_err(|e| match e {
        ConfigError::Validation { field, .. } => ConnectionError::missing(&field),
        other => ConnectionError::Rejected {
            message: other.to_string(),
        },
    })
}

impl ConnectionManager {
    pub fn new(store: Arc<SessionStore>, transport: TransportConfig) -> Self {
        Self {
            store,
            transport,
            listeners: Arc::new(RwLock::new(Vec::new())),
            session: Mutex::new(None),
            span: tracing::info_span!("connection"),
        }
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Register a listener for rotated token pairs.
    ///
    /// Listeners run after the pair has been persisted.
    pub fn on_token_rotated(&self, listener: RotationObserver) {
        self.listeners
            .write()
            .expect("listener lock poisoned")
            .push(listener);
    }

    /// The current session, if connected.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.session.lock().expect("session lock poisoned").clone()
    }

    pub fn is_connected(&self) -> bool {
        self.session().is_some()
    }

    pub fn disconnect(&self) {
        if self.session.lock().expect("session lock poisoned").take().is_some() {
            self.span.in_scope(|| info!("disconnected"));
        }
    }

    /// Establish and verify a session.
    ///
    /// On failure the manager is left unconnected and nothing retries in
    /// the background.
    pub async fn connect(
        &self,
        settings: &ConnectionSettings,
    ) -> Result<Arc<Session>, ConnectionError> {
        self.disconnect();
        let session = self.establish(settings).instrument(self.span.clone()).await?;
        let session = Arc::new(session);
        *self.session.lock().expect("session lock poisoned") = Some(Arc::clone(&session));
        Ok(session)
    }

    async fn establish(&self, settings: &ConnectionSettings) -> Result<Session, ConnectionError> {
        let raw_url = required("url", &settings.url)?;
        let anon_key = required("anon_key", &settings.anon_key)?;
        let access_key = required("access_key", &settings.access_key)?;
        let expected = required("service_principal_id", &settings.service_principal_id)?;
        let printer_id = required("printer_id", &settings.printer_id)?;
        let refresh_key = settings.refresh_key.as_deref().filter(|k| !k.is_empty());

        let url = Url::parse(raw_url).map_err(|e| ConnectionError::InvalidUrl {
            url: raw_url.to_owned(),
            reason: e.to_string(),
        })?;
        let client = BackendClient::new(url, SecretString::from(anon_key.to_owned()), &self.transport)
            .map_err(|e| ConnectionError::from_api(raw_url, e))?;
        client.set_access_token(
            SecretString::from(access_key.to_owned()),
            refresh_key.map(|k| SecretString::from(k.to_owned())),
        );
        client.on_token_rotated(self.persisting_observer());

        let user = match client.current_user().await {
            Ok(user) => user,
            Err(first) if client.refresh_token().is_some() => {
                warn!(error = %first, "access key rejected, refreshing session");
                client
                    .refresh_session()
                    .await
                    .map_err(|e| match ConnectionError::from_api(raw_url, e) {
                        unreachable @ ConnectionError::Unreachable { .. } => unreachable,
                        other => ConnectionError::RefreshFailed {
                            message: other.to_string(),
                        },
                    })?;
                client
                    .current_user()
                    .await
                    .map_err(|e| ConnectionError::from_api(raw_url, e))?
            }
            Err(e) => return Err(ConnectionError::from_api(raw_url, e)),
        };

        if user.id != expected {
            error!(expected, actual = %user.id, "principal mismatch");
            return Err(ConnectionError::IdentityMismatch {
                expected: expected.to_owned(),
                actual: user.id,
            });
        }

        info!(printer_id, principal = %user.id, "connected");
        Ok(Session {
            client: Arc::new(client),
            principal_id: user.id,
            printer_id: printer_id.to_owned(),
        })
    }

    fn persisting_observer(&self) -> RotationObserver {
        let store = Arc::clone(&self.store);
        let listeners = Arc::clone(&self.listeners);
        let span = self.span.clone();
        Arc::new(move |tokens: &TokenPair| {
            let _guard = span.enter();
            if let Err(e) = store.rotate_tokens(
                tokens.access_token.expose_secret(),
                tokens.refresh_token.expose_secret(),
            ) {
                error!(error = %e, "failed to persist rotated tokens");
            }
            for listener in listeners.read().expect("listener lock poisoned").iter() {
                listener(tokens);
            }
        })
    }

    /// Exchange the stored registration token for printer credentials.
    ///
    /// The credentials are merged into the store and the one-time token
    /// is cleared.
    pub async fn register(&self, printer_name: &str) -> Result<ConnectionSettings, CoreError> {
        let current = self.store.settings();
        let raw_url = required("url", &current.url)?;
        let token = required("registration_token", &current.registration_token)?;
        let url = Url::parse(raw_url).map_err(|e| ConnectionError::InvalidUrl {
            url: raw_url.to_owned(),
            reason: e.to_string(),
        })?;
        let anon_key = current
            .anon_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(|k| SecretString::from(k.to_owned()));

        let request = RegistrationRequest {
            registration_token: token,
            printer_name,
        };
        let registration = additv_api::register(&url, anon_key.as_ref(), &request, &self.transport)
            .instrument(self.span.clone())
            .await?;

        let saved = self.store.update(|s| {
            s.printer_id = Some(registration.printer_id.clone());
            s.service_principal_id = Some(registration.service_principal_id.clone());
            s.access_key = Some(registration.access_key.expose_secret().to_owned());
            s.refresh_key = Some(registration.refresh_key.expose_secret().to_owned());
            s.anon_key = Some(registration.anon_key.expose_secret().to_owned());
            s.registration_token = None;
        })?;
        self.span
            .in_scope(|| info!(printer_id = %registration.printer_id, "registration saved"));
        Ok(saved)
    }
}
