//! Integration tests for the `sindri` binary.

use std::fs;

use anyhow::Result;
use assert_cmd::Command;
use serde_json::{Value, json};
use tempfile::tempdir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

/// Runs the binary from an empty directory, with only `SINDRI_API_KEY` in the environment
/// deciding credentials. Blocking, so callers run it on a blocking thread.
fn sindri(dir: &std::path::Path, api_key: Option<&str>) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sindri"));
    cmd.current_dir(dir)
        .env_remove("SINDRI_API_KEY")
        .env_remove("SINDRI_API_URL")
        .env_remove("RUST_LOG");
    if let Some(api_key) = api_key {
        cmd.env("SINDRI_API_KEY", api_key);
    }
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_verify_prints_result() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/proof/p-1/verify"))
        .and(header("authorization", "Bearer env-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = tempdir()?;
    let mut cmd = sindri(temp_dir.path(), Some("env-key"));
    cmd.arg("--api-url")
        .arg(server.uri())
        .arg("verify")
        .arg("--proof-id")
        .arg("p-1");

    let output = tokio::task::spawn_blocking(move || cmd.assert().success().get_output().clone())
        .await?;
    assert_eq!(
        stdout_json(&output),
        json!({ "proof_id": "p-1", "success": true })
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_run_compiles_proves_and_verifies() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/circuit/create"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "circuit_id": "c-1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/circuit/c-1/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "circuit_id": "c-1",
            "status": "Ready",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/circuit/c-1/prove"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "proof_id": "p-1" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/proof/p-1/detail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "proof_id": "p-1",
            "circuit_id": "c-1",
            "status": "Ready",
            "public": ["33"],
        })))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/proof/p-1/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = tempdir()?;
    let circuit_dir = temp_dir.path().join("multiplier2");
    fs::create_dir_all(&circuit_dir)?;
    fs::write(circuit_dir.join("sindri.json"), r#"{"circuitType": "circom"}"#)?;
    let input_path = temp_dir.path().join("input.json");
    fs::write(&input_path, r#"{"a": 3, "b": 11}"#)?;
    let config_path = temp_dir.path().join("sindri.toml");
    fs::write(
        &config_path,
        format!("api_url = \"{}\"\nverbosity = \"silent\"\n", server.uri()),
    )?;

    let mut cmd = sindri(temp_dir.path(), Some("env-key"));
    cmd.arg("--config")
        .arg(&config_path)
        .arg("--poll-interval-ms")
        .arg("1")
        .arg("run")
        .arg("--path")
        .arg(&circuit_dir)
        .arg("--input")
        .arg(&input_path);

    let output = tokio::task::spawn_blocking(move || cmd.assert().success().get_output().clone())
        .await?;
    assert_eq!(
        stdout_json(&output),
        json!({
            "circuit_id": "c-1",
            "proof_id": "p-1",
            "public": ["33"],
            "verified": true,
        })
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_cli_not_found_exits_non_zero() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/circuit/missing/detail"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = tempdir()?;
    let mut cmd = sindri(temp_dir.path(), Some("env-key"));
    cmd.arg("--api-url")
        .arg(server.uri())
        .arg("circuit")
        .arg("missing");

    let output = tokio::task::spawn_blocking(move || cmd.assert().failure().get_output().clone())
        .await?;
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Not found"));
    Ok(())
}

#[test]
fn test_cli_without_api_key_fails() -> Result<()> {
    let temp_dir = tempdir()?;
    let output = sindri(temp_dir.path(), None)
        .arg("--api-url")
        .arg("http://127.0.0.1:9")
        .arg("circuits")
        .assert()
        .failure()
        .get_output()
        .clone();
    assert!(String::from_utf8_lossy(&output.stderr).contains("no API key found"));
    Ok(())
}

#[test]
fn test_cli_reads_api_key_file() -> Result<()> {
    let temp_dir = tempdir()?;
    fs::write(temp_dir.path().join("API_KEY"), "file-key\n")?;

    // The key resolves, so the failure comes from the unreachable service instead.
    let output = sindri(temp_dir.path(), None)
        .arg("--api-url")
        .arg("http://127.0.0.1:9")
        .arg("circuits")
        .assert()
        .failure()
        .get_output()
        .clone();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Unable to connect"), "{stderr}");
    Ok(())
}
