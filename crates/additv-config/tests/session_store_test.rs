#![allow(clippy::unwrap_used)]
// Persistence tests for `SessionStore`: round-trips, rotation, env overrides.

use pretty_assertions::assert_eq;

use additv_config::{ConfigError, ConnectionSettings, SETTINGS_FILE, SessionStore, load, load_file, save};

fn full_settings() -> ConnectionSettings {
    ConnectionSettings {
        url: Some("https://db.example.com".into()),
        registration_token: Some("reg-123".into()),
        service_principal_id: Some("sp-42".into()),
        printer_id: Some("p-1".into()),
        access_key: Some("access-1".into()),
        refresh_key: Some("refresh-1".into()),
        anon_key: Some("anon-key".into()),
    }
}

#[test]
fn save_then_load_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(SETTINGS_FILE);

    let original = full_settings();
    save(&path, &original).unwrap();

    assert_eq!(load_file(&path).unwrap(), original);
}

#[test]
fn partial_document_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(SETTINGS_FILE);

    let original = ConnectionSettings {
        url: Some("https://db.example.com".into()),
        printer_id: Some("p-1".into()),
        ..ConnectionSettings::default()
    };
    save(&path, &original).unwrap();

    assert_eq!(load_file(&path).unwrap(), original);
}

#[test]
fn missing_file_is_empty_settings() {
    let dir = tempfile::tempdir().unwrap();
    let settings = load_file(&dir.path().join(SETTINGS_FILE)).unwrap();
    assert_eq!(settings, ConnectionSettings::default());
}

#[test]
fn unknown_keys_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(SETTINGS_FILE);
    std::fs::write(&path, "url = \"https://db\"\nacess_key = \"typo\"\n").unwrap();

    let result = load_file(&path);
    assert!(matches!(result, Err(ConfigError::Figment(_))), "got: {result:?}");
}

#[test]
fn rotate_tokens_updates_pair_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(SETTINGS_FILE);
    let store = SessionStore::with_settings(path.clone(), full_settings());

    store.rotate_tokens("access-2", "refresh-2").unwrap();

    let on_disk = load_file(&path).unwrap();
    assert_eq!(on_disk.access_key.as_deref(), Some("access-2"));
    assert_eq!(on_disk.refresh_key.as_deref(), Some("refresh-2"));
    assert_eq!(on_disk.printer_id.as_deref(), Some("p-1"));
    assert_eq!(store.settings(), on_disk);
}

#[test]
fn save_creates_missing_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("plugin").join(SETTINGS_FILE);

    save(&path, &full_settings()).unwrap();
    assert!(path.exists());
    assert!(!path.with_extension("toml.tmp").exists());
}

#[test]
fn env_overrides_only_whitelisted_keys() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            SETTINGS_FILE,
            r#"
            url = "https://persisted.example.com"
            printer_id = "p-1"
            access_key = "access-1"
            "#,
        )?;
        jail.set_env("ADDITV_URL", "https://override.example.com");
        jail.set_env("ADDITV_ANON_KEY", "env-anon");
        jail.set_env("ADDITV_ACCESS_KEY", "ignored");

        let settings = load(std::path::Path::new(SETTINGS_FILE)).expect("loads");
        assert_eq!(settings.url.as_deref(), Some("https://override.example.com"));
        assert_eq!(settings.anon_key.as_deref(), Some("env-anon"));
        assert_eq!(settings.access_key.as_deref(), Some("access-1"));
        assert_eq!(settings.printer_id.as_deref(), Some("p-1"));
        Ok(())
    });
}

#[test]
fn numeric_env_values_stay_strings() {
    figment::Jail::expect_with(|jail| {
        jail.set_env("ADDITV_REGISTRATION_TOKEN", "482913");
        jail.set_env("ADDITV_ANON_KEY", "1234");

        let settings = load(std::path::Path::new(SETTINGS_FILE)).expect("loads");
        assert_eq!(settings.registration_token.as_deref(), Some("482913"));
        assert_eq!(settings.anon_key.as_deref(), Some("1234"));
        assert_eq!(settings.url, None);
        Ok(())
    });
}

#[test]
fn open_reads_existing_document() {
    let dir = tempfile::tempdir().unwrap();
    save(&dir.path().join(SETTINGS_FILE), &full_settings()).unwrap();

    let store = SessionStore::open(dir.path()).unwrap();
    assert!(store.settings().is_registered());
}
