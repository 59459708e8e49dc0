//! Integration tests for the `additv` CLI binary.
//!
//! Argument parsing, settings handling and error exit codes run without
//! a backend; the end-to-end cases spawn the binary against wiremock.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::assert::OutputAssertExt;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `additv` binary with env isolation.
fn additv_cmd(data_dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("additv");
    cmd.env("ADDITV_DATA_DIR", data_dir)
        .env_remove("ADDITV_URL")
        .env_remove("ADDITV_REGISTRATION_TOKEN")
        .env_remove("ADDITV_ANON_KEY")
        .env_remove("ADDITV_TIMEOUT")
        .env_remove("ADDITV_CA_CERT")
        .env_remove("RUST_LOG");
    cmd
}

fn write_settings(dir: &Path, url: &str) {
    let doc = format!(
        "url = \"{url}\"\n\
         service_principal_id = \"sp-1\"\n\
         printer_id = \"printer-1\"\n\
         access_key = \"access-1\"\n\
         refresh_key = \"refresh-1\"\n\
         anon_key = \"anon-key\"\n"
    );
    std::fs::write(dir.join("additv.toml"), doc).unwrap();
}

async fn mount_identity(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "sp-1" })))
        .mount(server)
        .await;
}

/// Run a prepared command off the async runtime.
async fn run(mut cmd: assert_cmd::Command) -> assert_cmd::assert::Assert {
    let output = tokio::task::spawn_blocking(move || cmd.output())
        .await
        .unwrap()
        .unwrap();
    output.assert()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let dir = tempfile::tempdir().unwrap();
    additv_cmd(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    additv_cmd(dir.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("register")
            .and(predicate::str::contains("stream"))
            .and(predicate::str::contains("next-job")),
    );
}

#[test]
fn test_completions_bash() {
    let dir = tempfile::tempdir().unwrap();
    additv_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_stream_rejects_unknown_profile() {
    let dir = tempfile::tempdir().unwrap();
    additv_cmd(dir.path())
        .args(["stream", "--profile", "klipper"])
        .assert()
        .code(2);
}

// ── Settings and errors ─────────────────────────────────────────────

#[test]
fn test_status_on_empty_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    additv_cmd(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("registered: no"));
}

#[test]
fn test_status_redacts_keys() {
    let dir = tempfile::tempdir().unwrap();
    write_settings(dir.path(), "https://api.example");
    additv_cmd(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("access_key: (set)")
                .and(predicate::str::contains("registered: yes"))
                .and(predicate::str::contains("access-1").not()),
        );
}

#[test]
fn test_env_url_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    write_settings(dir.path(), "https://api.example");
    additv_cmd(dir.path())
        .env("ADDITV_URL", "https://override.example")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("url: https://override.example"));
}

#[test]
fn test_unknown_settings_key_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("additv.toml"), "acess_key = \"typo\"\n").unwrap();
    additv_cmd(dir.path()).arg("status").assert().code(9);
}

#[test]
fn test_untracked_event_is_ignored_without_connecting() {
    let dir = tempfile::tempdir().unwrap();
    additv_cmd(dir.path())
        .args(["event", "ZChange"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ignored untracked event ZChange"));
}

#[test]
fn test_event_without_registration_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    additv_cmd(dir.path())
        .args(["event", "PrintStarted"])
        .assert()
        .code(9)
        .stderr(predicate::str::contains("url"));
}

#[test]
fn test_progress_out_of_range_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    additv_cmd(dir.path())
        .args(["progress", "--job-id", "j-1", "--percent", "150"])
        .assert()
        .code(2);
}

#[test]
fn test_bad_event_payload_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    additv_cmd(dir.path())
        .args(["event", "PrintStarted", "--payload", "[1,2]"])
        .assert()
        .code(2);
}

// ── Against a mock backend ──────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_register_persists_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/register-printer"))
        .and(body_json(json!({
            "registration_token": "tok-1",
            "printer_name": "Bench",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "printer_id": "printer-7",
            "service_principal_id": "sp-7",
            "access_key": "ak",
            "refresh_key": "rk",
            "anon_key": "anon",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut cmd = additv_cmd(dir.path());
    cmd.args(["register", "--token", "tok-1", "--name", "Bench", "--url", &server.uri()]);
    run(cmd)
        .await
        .success()
        .stdout(predicate::str::contains("registered printer printer-7"));

    let saved = std::fs::read_to_string(dir.path().join("additv.toml")).unwrap();
    assert!(saved.contains("printer_id = \"printer-7\""));
    assert!(!saved.contains("registration_token"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_identity_mismatch_exits_with_auth_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "intruder" })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_settings(dir.path(), &server.uri());
    let mut cmd = additv_cmd(dir.path());
    cmd.arg("next-job");
    run(cmd)
        .await
        .code(3)
        .stderr(predicate::str::contains("intruder"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_next_job_without_work() {
    let server = MockServer::start().await;
    mount_identity(&server).await;
    Mock::given(method("POST"))
        .and(path("/functions/v1/get-next-job"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_settings(dir.path(), &server.uri());
    let mut cmd = additv_cmd(dir.path());
    cmd.arg("next-job");
    run(cmd)
        .await
        .success()
        .stdout(predicate::str::contains("no job available"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stream_delivers_events_and_telemetry() {
    let server = MockServer::start().await;
    mount_identity(&server).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/printer_events"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/printer_telemetry"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_settings(dir.path(), &server.uri());
    let input = "//event PrintStarted {\"name\":\"cube.gcode\"}\n\
                 //event ZChange\n\
                 T:200.0 /210.0 B:60.0 /60.0 @:100 B@:40\n\
                 E0:4000 RPM PRN1:2500 RPM E0@:255 PRN1@:128\n\
                 ok\n";
    let mut cmd = additv_cmd(dir.path());
    cmd.args(["stream", "--batch-size", "5"]).write_stdin(input);
    run(cmd).await.success();

    let received = server.received_requests().await.unwrap();
    let telemetry = received
        .iter()
        .find(|r| r.url.path() == "/rest/v1/printer_telemetry")
        .unwrap();
    let rows: Value = serde_json::from_slice(&telemetry.body).unwrap();
    assert_eq!(rows[0]["printer_id"], "printer-1");
    assert_eq!(rows[0]["telemetry"]["tool0_temp"], 200.0);
    assert_eq!(rows[0]["telemetry"]["part_fan_power"], 50.2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stream_survives_undecodable_line_noise() {
    let server = MockServer::start().await;
    mount_identity(&server).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/printer_events"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    write_settings(dir.path(), &server.uri());
    let mut input = b"//event PrintStarted\n".to_vec();
    input.extend_from_slice(b"T:20.0 \xff\xfe B:20.0\n");
    input.extend_from_slice(b"//event PrintDone\n");
    let mut cmd = additv_cmd(dir.path());
    cmd.arg("stream").write_stdin(input);
    run(cmd).await.success();

    let received = server.received_requests().await.unwrap();
    let events: Vec<Value> = received
        .iter()
        .filter(|r| r.url.path() == "/rest/v1/printer_events")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event"], "Job_Started");
    assert_eq!(events[1]["event"], "Job_Complete");
}
