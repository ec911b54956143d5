// codewarden/tests/cli_tests.rs
//! End-to-end tests for the `codewarden` binary.
//!
//! Each command runs in a scratch directory with a scratch config dir, so a
//! developer's `.env` or per-user pattern file cannot leak into the results.

use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn codewarden(scratch: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("codewarden").unwrap();
    cmd.current_dir(scratch.path())
        .env("HOME", scratch.path())
        .env("XDG_CONFIG_HOME", scratch.path())
        .env_remove("CODEWARDEN_DSN")
        .env_remove("CODEWARDEN_ENVIRONMENT")
        .env_remove("CODEWARDEN_RELEASE")
        .env_remove("RUST_LOG");
    cmd
}

#[test_log::test]
fn scrub_reads_stdin_and_masks_defaults() -> Result<()> {
    let scratch = TempDir::new()?;
    codewarden(&scratch)
        .args(["scrub"])
        .write_stdin("mail jane@example.com or call 555-123-4567 from 10.0.0.1\n")
        .assert()
        .success()
        .stdout("mail [EMAIL] or call [PHONE] from [IP]\n");
    Ok(())
}

#[test_log::test]
fn scrub_honours_disable_and_custom_config() -> Result<()> {
    let scratch = TempDir::new()?;
    let config = scratch.path().join("patterns.yaml");
    fs::write(
        &config,
        "patterns:\n  - name: order_id\n    pattern: 'ORD-\\d{6}'\n    mask: '[ORDER]'\n",
    )?;
    let input = scratch.path().join("input.txt");
    fs::write(&input, "ORD-123456 from jane@example.com")?;

    codewarden(&scratch)
        .args(["scrub", "--input"])
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .args(["--disable", "email", "--summary"])
        .assert()
        .success()
        .stdout("[ORDER] from jane@example.com")
        .stderr(predicate::str::contains("order_id"));
    Ok(())
}

#[test_log::test]
fn scrub_rejects_bad_pattern_file() -> Result<()> {
    let scratch = TempDir::new()?;
    let config = scratch.path().join("broken.yaml");
    fs::write(&config, "patterns:\n  - name: broken\n    pattern: '(oops'\n")?;

    codewarden(&scratch)
        .args(["scrub", "--config"])
        .arg(&config)
        .write_stdin("x")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load pattern file"));
    Ok(())
}

#[test_log::test]
fn check_dsn_prints_endpoint_without_key() -> Result<()> {
    let scratch = TempDir::new()?;
    codewarden(&scratch)
        .args(["check-dsn", "https://cw_live_secret@ingest.example.com:8443"])
        .assert()
        .success()
        .stdout(predicate::str::contains("endpoint: https://ingest.example.com:8443/v1/telemetry"))
        .stdout(predicate::str::contains("cw_live_secret").not());
    Ok(())
}

#[test_log::test]
fn check_dsn_fails_on_missing_key() -> Result<()> {
    let scratch = TempDir::new()?;
    codewarden(&scratch)
        .args(["check-dsn", "https://ingest.example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DSN is not valid"));
    Ok(())
}

#[test_log::test]
fn patterns_lists_effective_rules() -> Result<()> {
    let scratch = TempDir::new()?;
    codewarden(&scratch)
        .args(["patterns", "--disable", "api_key"])
        .assert()
        .success()
        .stdout(predicate::str::contains("email"))
        .stdout(predicate::str::contains("[CARD]"))
        .stdout(predicate::str::contains("api_key").not());

    let output = codewarden(&scratch).args(["patterns", "--json", "--enable", "ssn"]).output()?;
    let rules: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(rules.as_array().map(Vec::len), Some(1));
    assert_eq!(rules[0]["mask"], "[SSN]");
    Ok(())
}

#[test_log::test]
fn send_delivers_a_scrubbed_event() -> Result<()> {
    let scratch = TempDir::new()?;
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/v1/telemetry")
        .match_header("authorization", "Bearer cli-key")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "type": "error",
            "severity": "medium",
            "environment": "ci",
            "payload": { "message": "ping from [EMAIL]", "tags": { "suite": "cli" } }
        })))
        .with_status(200)
        .expect(1)
        .create();

    codewarden(&scratch)
        .env("CODEWARDEN_DSN", format!("http://cli-key@{}", server.host_with_port()))
        .args(["send", "--message", "ping from ops@example.com", "--level", "warning"])
        .args(["--environment", "ci", "--tag", "suite=cli"])
        .assert()
        .success()
        .stdout(predicate::str::contains("event_id: "))
        .stdout(predicate::str::contains("delivered: 1"));

    mock.assert();
    Ok(())
}

#[test_log::test]
fn send_fails_when_the_endpoint_rejects() -> Result<()> {
    let scratch = TempDir::new()?;
    let mut server = mockito::Server::new();
    let mock = server.mock("POST", "/v1/telemetry").with_status(401).expect(1).create();

    codewarden(&scratch)
        .args(["send", "-m", "hello", "--dsn"])
        .arg(format!("http://bad-key@{}", server.host_with_port()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("was not delivered"));

    mock.assert();
    Ok(())
}

#[test_log::test]
fn send_requires_a_dsn() -> Result<()> {
    let scratch = TempDir::new()?;
    codewarden(&scratch)
        .args(["send", "-m", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No DSN given"));
    Ok(())
}
