//! Connection settings for the Additv bridge.
//!
//! One flat TOML document per data directory holds the backend URL, the
//! printer's identity, and its rotating credentials. [`SessionStore`] is
//! the only writer: registration merges a full identity in, token
//! refresh swaps the access/refresh pair, and every change rewrites the
//! whole document.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// File name of the settings document inside the data directory.
pub const SETTINGS_FILE: &str = "additv.toml";

/// Prefix of the environment variables that may override settings.
pub const ENV_PREFIX: &str = "ADDITV_";

/// Keys that may be supplied through the environment. Everything else
/// is owned by the persisted document.
const ENV_OVERRIDABLE: &[&str] = &["url", "registration_token", "anon_key"];

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize settings: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("settings loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings document ───────────────────────────────────────────────

/// Everything needed to reach the backend as this printer.
///
/// Unknown keys are rejected so a typo in a hand-edited file fails
/// loudly instead of silently dropping a credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionSettings {
    /// Backend base URL (e.g. "https://xyz.supabase.co").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// One-time token consumed by the registration handshake.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_token: Option<String>,

    /// Principal the access key must authenticate as.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_principal_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub printer_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_key: Option<String>,

    /// Public project key sent as `apikey` on every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anon_key: Option<String>,
}

impl ConnectionSettings {
    /// True once a registration handshake has produced an identity.
    pub fn is_registered(&self) -> bool {
        self.printer_id.is_some() && self.service_principal_id.is_some()
    }

    /// Fetch a required field, naming it in the error when absent.
    pub fn require<'a>(
        field: &'static str,
        value: &'a Option<String>,
    ) -> Result<&'a str, ConfigError> {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::Validation {
                field: field.into(),
                reason: "not configured".into(),
            })
    }
}

// ── Paths ───────────────────────────────────────────────────────────

/// Resolve the default data directory via XDG / platform conventions.
pub fn default_data_dir() -> PathBuf {
    ProjectDirs::from("com", "additv", "additv").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".local");
            p.push("share");
            p.push("additv");
            p
        },
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

// ── Store ───────────────────────────────────────────────────────────

/// Owner of the settings document.
///
/// Holds the in-memory copy behind a mutex so the token-rotation
/// callback (queue worker) and the caller's thread can both write.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    settings: Mutex<ConnectionSettings>,
}

impl SessionStore {
    /// Open the store for `data_dir`, loading the file merged with
    /// environment overrides.
    pub fn open(data_dir: &Path) -> Result<Self, ConfigError> {
        let path = data_dir.join(SETTINGS_FILE);
        let settings = load(&path)?;
        Ok(Self {
            path,
            settings: Mutex::new(settings),
        })
    }

    /// Wrap an explicit settings value, persisting to `path` on change.
    pub fn with_settings(path: PathBuf, settings: ConnectionSettings) -> Self {
        Self {
            path,
            settings: Mutex::new(settings),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current settings.
    pub fn settings(&self) -> ConnectionSettings {
        self.settings.lock().expect("settings lock poisoned").clone()
    }

    /// Apply `f` to the settings and rewrite the document.
    pub fn update<F>(&self, f: F) -> Result<ConnectionSettings, ConfigError>
    where
        F: FnOnce(&mut ConnectionSettings),
    {
        let mut guard = self.settings.lock().expect("settings lock poisoned");
        f(&mut guard);
        save(&self.path, &guard)?;
        Ok(guard.clone())
    }

    /// Replace the access/refresh pair in a single write.
    pub fn rotate_tokens(&self, access_key: &str, refresh_key: &str) -> Result<(), ConfigError> {
        self.update(|s| {
            s.access_key = Some(access_key.to_owned());
            s.refresh_key = Some(refresh_key.to_owned());
        })?;
        info!("persisted rotated token pair");
        Ok(())
    }
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load settings from `path` only. A missing file is an empty document.
pub fn load_file(path: &Path) -> Result<ConnectionSettings, ConfigError> {
    let settings = Figment::new()
        .merge(Serialized::defaults(ConnectionSettings::default()))
        .merge(Toml::file(path))
        .extract()?;
    Ok(settings)
}

/// Overridable keys present in the environment, taken verbatim so a
/// numeric token stays a string.
fn env_overrides() -> impl Iterator<Item = (&'static str, String)> {
    ENV_OVERRIDABLE.iter().filter_map(|key| {
        let var = format!("{ENV_PREFIX}{}", key.to_ascii_uppercase());
        std::env::var(var)
            .ok()
            .filter(|value| !value.is_empty())
            .map(|value| (*key, value))
    })
}

/// Load settings from `path`, then let `ADDITV_URL`,
/// `ADDITV_REGISTRATION_TOKEN`, and `ADDITV_ANON_KEY` take precedence.
pub fn load(path: &Path) -> Result<ConnectionSettings, ConfigError> {
    debug!(path = %path.display(), "loading connection settings");
    let figment = Figment::new()
        .merge(Serialized::defaults(ConnectionSettings::default()))
        .merge(Toml::file(path));
    let settings = env_overrides()
        .fold(figment, |figment, (key, value)| {
            figment.merge(Serialized::default(key, value))
        })
        .extract()?;
    Ok(settings)
}

/// Rewrite the whole document atomically (temp file + rename).
pub fn save(path: &Path, settings: &ConnectionSettings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(settings)?;
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, toml_str)?;
    std::fs::rename(&temp_path, path)?;
    debug!(path = %path.display(), "saved connection settings");
    Ok(())
}
