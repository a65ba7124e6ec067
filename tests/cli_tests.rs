use assert_cmd::Command;
use mockito::Matcher;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const RUNS_PATH: &str = "/api/v1/namespaces/default/translations-runs/";

const RUN_JSON: &str = r#"{
    "namespace_name": "default",
    "dataset_name": "greetings",
    "dataset_source_lang": "en",
    "dataset_target_lang": "fr",
    "segments": [{"src": "Hello", "tgt": "Bonjour"}]
}"#;

fn cli(data_dir: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("mteval-upload").unwrap();
    cmd.env_remove("MTEVAL_HOST")
        .env_remove("MTEVAL_API_KEY")
        .env_remove("RUST_LOG")
        .arg("--data-dir")
        .arg(data_dir)
        .args(["--retry-initial-ms", "1", "--retry-max-ms", "2"]);
    cmd
}

fn write_run(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("run.json");
    fs::write(&path, RUN_JSON).unwrap();
    path
}

fn stored(data_dir: &Path, partition: &str) -> usize {
    match fs::read_dir(data_dir.join(partition)) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .count(),
        Err(_) => 0,
    }
}

#[test]
fn test_upload_delivers_and_discards_local_copy() {
    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("data");
    let run_file = write_run(&tmp);
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", RUNS_PATH)
        .match_header("authorization", "Bearer secret")
        .match_body(Matcher::PartialJson(serde_json::json!({
            "dataset_name": "greetings",
            "segments": [{"src": "Hello", "tgt": "Bonjour"}]
        })))
        .with_status(201)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id": 42}"#)
        .create();

    cli(&data_dir)
        .arg("upload")
        .arg("-d")
        .arg(&run_file)
        .args(["-h", &server.url(), "-k", "secret"])
        .assert()
        .success()
        .stdout(predicate::str::contains("delivered"))
        .stdout(predicate::str::contains("remote id 42"));

    mock.assert();
    assert_eq!(stored(&data_dir, "pending_failure"), 0);
    assert_eq!(stored(&data_dir, "success"), 0);
}

#[test]
fn test_upload_with_keep_stores_success_copy() {
    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("data");
    let run_file = write_run(&tmp);
    let mut server = mockito::Server::new();
    server.mock("POST", RUNS_PATH).with_status(200).create();

    cli(&data_dir)
        .arg("upload")
        .arg("-d")
        .arg(&run_file)
        .args(["-h", &server.url(), "-k", "secret", "-K"])
        .assert()
        .success();

    assert_eq!(stored(&data_dir, "pending_failure"), 0);
    assert_eq!(stored(&data_dir, "success"), 1);
}

#[test]
fn test_rejected_upload_is_saved_with_reason() {
    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("data");
    let run_file = write_run(&tmp);
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", RUNS_PATH)
        .with_status(422)
        .with_body(r#"{"detail": "segments mismatch"}"#)
        .expect(1)
        .create();

    cli(&data_dir)
        .arg("upload")
        .arg("-d")
        .arg(&run_file)
        .args(["-h", &server.url(), "-k", "secret"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("rejected-permanently"))
        .stdout(predicate::str::contains("segments mismatch"));

    mock.assert();
    assert_eq!(stored(&data_dir, "pending_failure"), 1);
}

#[test]
fn test_failed_upload_is_queued_then_replayed() {
    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("data");
    let run_file = write_run(&tmp);

    let mut down = mockito::Server::new();
    let outage = down
        .mock("POST", RUNS_PATH)
        .with_status(503)
        .expect(2)
        .create();
    cli(&data_dir)
        .args(["--max-attempts", "2"])
        .arg("upload")
        .arg("-d")
        .arg(&run_file)
        .args(["-h", &down.url(), "-k", "secret"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("queued-for-retry"));
    outage.assert();
    assert_eq!(stored(&data_dir, "pending_failure"), 1);

    let mut up = mockito::Server::new();
    let recovered = up.mock("POST", RUNS_PATH).with_status(201).expect(1).create();
    cli(&data_dir)
        .arg("upload-failed")
        .args(["-h", &up.url(), "-k", "secret", "--keep"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"Delivered:\s+1").unwrap());
    recovered.assert();
    assert_eq!(stored(&data_dir, "pending_failure"), 0);
    assert_eq!(stored(&data_dir, "success"), 1);
}

#[test]
fn test_upload_failed_json_summary() {
    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("data");
    let server = mockito::Server::new();

    let output = cli(&data_dir)
        .arg("--json")
        .arg("upload-failed")
        .args(["-h", &server.url(), "-k", "secret"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let summary: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(summary["selection"], "failed");
    assert_eq!(summary["total"], 0);
}

#[test]
fn test_missing_data_file_is_fatal() {
    let tmp = TempDir::new().unwrap();
    cli(tmp.path())
        .arg("upload")
        .args(["-d", "does-not-exist.json", "-h", "http://127.0.0.1:1", "-k", "secret"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to read data file"));
}

#[test]
fn test_invalid_run_is_rejected_before_storing() {
    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("data");
    let run_file = tmp.path().join("empty.json");
    fs::write(
        &run_file,
        r#"{"namespace_name": "default", "dataset_name": "empty",
            "dataset_source_lang": "en", "dataset_target_lang": "fr", "segments": []}"#,
    )
    .unwrap();

    cli(&data_dir)
        .arg("upload")
        .arg("-d")
        .arg(&run_file)
        .args(["-h", "http://127.0.0.1:1", "-k", "secret"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("does not contain a valid run"));
    assert_eq!(stored(&data_dir, "pending_failure"), 0);
}

#[test]
fn test_list_shows_queued_runs() {
    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("data");
    let run_file = write_run(&tmp);
    let mut server = mockito::Server::new();
    server.mock("POST", RUNS_PATH).with_status(403).create();

    cli(&data_dir)
        .arg("upload")
        .arg("-d")
        .arg(&run_file)
        .args(["-h", &server.url(), "-k", "wrong"])
        .assert()
        .code(1);

    let output = cli(&data_dir)
        .args(["--json", "list", "--failed"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let listing: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let runs = listing["runs"].as_array().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["dataset_name"], "greetings");
    assert_eq!(runs[0]["state"], "pending_failure");
    assert_eq!(runs[0]["last_error"]["kind"], "permanent");
    assert_eq!(runs[0]["last_error"]["status"], 403);
}

#[test]
fn test_host_flag_does_not_shadow_help() {
    let tmp = TempDir::new().unwrap();
    cli(tmp.path())
        .args(["upload", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--data"))
        .stdout(predicate::str::contains("--host"));
}
