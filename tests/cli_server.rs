use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

struct TestDaemon {
    base_url: String,
    child: Child,
}

impl TestDaemon {
    fn spawn(index_path: &Path) -> Self {
        // Bind an ephemeral port first so we know which port to pass
        // to `scoutdb serve`.
        let listener =
            TcpListener::bind("127.0.0.1:0").expect("bind ephemeral TCP listener for daemon");
        let port = listener
            .local_addr()
            .expect("local_addr for daemon listener")
            .port();
        drop(listener);

        let addr_arg = format!("127.0.0.1:{port}");
        let base_url = format!("http://{addr_arg}");

        // Capture daemon output to temp files for easier debugging when
        // tests fail.
        let log_dir = std::env::temp_dir();
        let stdout_path = log_dir.join(format!("scoutdb_daemon_{port}_stdout.log"));
        let stderr_path = log_dir.join(format!("scoutdb_daemon_{port}_stderr.log"));
        let stdout_file =
            std::fs::File::create(stdout_path).expect("create daemon stdout log file");
        let stderr_file =
            std::fs::File::create(stderr_path).expect("create daemon stderr log file");

        let child = Command::new(env!("CARGO_BIN_EXE_scoutdb"))
            .args(["serve", "--addr", &addr_arg, "--index-path"])
            .arg(index_path)
            .env_remove("SCOUTDB_SERVER_URL")
            .stdout(stdout_file)
            .stderr(stderr_file)
            .spawn()
            .expect("spawn scoutdb serve daemon");

        wait_for_health(&base_url);

        Self { base_url, child }
    }
}

impl Drop for TestDaemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn wait_for_health(base_url: &str) {
    let client = Client::new();
    let url = format!("{}/v1/health", base_url);

    let mut last_err = None;
    for _ in 0..150 {
        match client.get(&url).send() {
            Ok(resp) if resp.status().is_success() => return,
            Err(e) => {
                last_err = Some(format!("HTTP error: {}", e));
                thread::sleep(Duration::from_millis(100));
            }
            Ok(resp) => {
                last_err = Some(format!("unexpected status: {}", resp.status()));
                thread::sleep(Duration::from_millis(100));
            }
        }
    }

    panic!(
        "scoutdb HTTP daemon did not become healthy in time. Last error: {}",
        last_err.unwrap_or_else(|| "unknown".to_string())
    );
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn scoutdb(cwd: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("scoutdb");
    cmd.current_dir(cwd)
        .env_remove("SCOUTDB_SERVER_URL")
        .env_remove("SCOUTDB_INDEX_PATH")
        .env_remove("SCOUTDB_LOG");
    cmd
}

#[test]
fn cli_delegates_to_daemon() {
    let dir = tempdir().expect("tempdir");
    let daemon = TestDaemon::spawn(&dir.path().join("daemon.sqlite"));

    scoutdb(dir.path())
        .args(["import", "--server", &daemon.base_url])
        .arg(fixture("posts.jsonl"))
        .assert()
        .success()
        .stdout(predicate::str::contains("import: 5 document(s)"));

    // The local default index was never touched.
    assert!(!dir.path().join(".scoutdb/index.sqlite").exists());

    let source = fixture("posts.jsonl");
    let output = scoutdb(dir.path())
        .env("SCOUTDB_SERVER_URL", &daemon.base_url)
        .args([
            "search",
            "rust",
            "--type",
            "posts",
            "--format",
            "json",
            "--source",
            source.to_str().expect("utf-8 path"),
        ])
        .output()
        .expect("run search");
    assert!(
        output.status.success(),
        "search failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let result: Value = serde_json::from_slice(&output.stdout).expect("JSON result");
    assert_eq!(result["ids"], json!(["2", "1", "4"]));
    assert_eq!(result["total"], 3);
    let hydrated: Vec<&str> = result["documents"]
        .as_array()
        .expect("documents")
        .iter()
        .map(|doc| doc["id"].as_str().expect("id"))
        .collect();
    assert_eq!(hydrated, vec!["2", "1", "4"]);

    scoutdb(dir.path())
        .args(["delete", "--type", "posts", "--id", "1,4", "--server", &daemon.base_url])
        .assert()
        .success()
        .stdout(predicate::str::contains("delete: 2 document(s) of posts"));

    let output = scoutdb(dir.path())
        .args(["index-info", "--format", "json", "--server", &daemon.base_url])
        .output()
        .expect("run index-info");
    assert!(output.status.success());
    let summary: Value = serde_json::from_slice(&output.stdout).expect("JSON summary");
    assert_eq!(summary["documents_indexed"], 3);
}

#[test]
fn no_server_forces_local_execution() {
    let dir = tempdir().expect("tempdir");
    let index = dir.path().join("local.sqlite");

    // Nothing listens on this port; --no-server must win over the env.
    scoutdb(dir.path())
        .env("SCOUTDB_SERVER_URL", "http://127.0.0.1:9")
        .args(["import", "--no-server", "--index-path"])
        .arg(&index)
        .arg(fixture("posts.jsonl"))
        .assert()
        .success();

    assert!(index.is_file());
}

#[test]
fn http_api_reports_errors_as_json() {
    let dir = tempdir().expect("tempdir");
    let daemon = TestDaemon::spawn(&dir.path().join("daemon.sqlite"));
    let client = Client::new();

    let response = client
        .post(format!("{}/v1/import", daemon.base_url))
        .json(&json!({ "documents": [{ "id": 1, "fields": { "title": "untyped" } }] }))
        .send()
        .expect("send import");
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().expect("error body");
    assert!(body["error"].as_str().expect("error text").contains("no type"));

    let response = client
        .post(format!("{}/v1/search", daemon.base_url))
        .json(&json!({ "builder": { "model": "posts", "query": "anything" } }))
        .send()
        .expect("send search");
    assert!(response.status().is_success());
    let body: Value = response.json().expect("search body");
    assert_eq!(body["total"], 0);
    assert_eq!(body["ids"], json!([]));

    let response = client
        .post(format!("{}/v1/search", daemon.base_url))
        .json(&json!({ "builder": { "model": "", "query": "anything" } }))
        .send()
        .expect("send search");
    assert_eq!(response.status().as_u16(), 400);
}
