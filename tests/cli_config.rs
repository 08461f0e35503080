use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn write_config(root: &Path, contents: &str) {
    let config_dir = root.join(".scoutdb");
    fs::create_dir_all(&config_dir).expect("create .scoutdb");
    fs::write(config_dir.join("config.toml"), contents).expect("write config");
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
fn config_is_discovered_from_nested_directory() {
    let dir = tempdir().expect("tempdir");
    write_config(
        dir.path(),
        r#"
[index]
index_path = "data/search.sqlite"
table_prefix = "app_"
stemmer = "none"
"#,
    );

    // Relative index paths resolve against the working directory; the
    // nested search still picks up the table prefix and stemmer.
    scoutdb(dir.path())
        .arg("import")
        .arg(fixture("posts.jsonl"))
        .assert()
        .success();
    assert!(dir.path().join("data/search.sqlite").is_file());

    let nested = dir.path().join("sub/dir");
    fs::create_dir_all(&nested).expect("nested dir");
    scoutdb(&nested)
        .args(["search", "ownership", "--type", "posts", "--index-path"])
        .arg(dir.path().join("data/search.sqlite"))
        .assert()
        .success()
        .stdout(predicate::str::contains("1 hit for \"ownership\" in posts"));
}

#[test]
fn config_search_format_defaults_to_json() {
    let dir = tempdir().expect("tempdir");
    write_config(
        dir.path(),
        r#"
[search]
format = "json"
"#,
    );

    scoutdb(dir.path())
        .args(["import", "--index-path", "index.sqlite"])
        .arg(fixture("posts.jsonl"))
        .assert()
        .success();

    scoutdb(dir.path())
        .args(["search", "rust", "--type", "posts", "--index-path", "index.sqlite"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("{\"version\":\"1.0.0\""));
}

#[test]
fn config_require_all_tokens_narrows_results() {
    let dir = tempdir().expect("tempdir");
    write_config(
        dir.path(),
        r#"
[search]
format = "json"
require_match_for_all_tokens = true
"#,
    );

    scoutdb(dir.path())
        .args(["import", "--index-path", "index.sqlite"])
        .arg(fixture("posts.jsonl"))
        .assert()
        .success();

    scoutdb(dir.path())
        .args([
            "search",
            "rust futures",
            "--type",
            "posts",
            "--index-path",
            "index.sqlite",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ids\":[\"4\"]"))
        .stdout(predicate::str::contains("\"total\":1"));
}

#[test]
fn invalid_config_is_reported() {
    let dir = tempdir().expect("tempdir");
    write_config(dir.path(), "[index\nindex_path = 1\n");

    scoutdb(dir.path())
        .args(["index-info"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse TOML config"));
}

#[test]
fn schema_version_flag_prints_version() {
    let dir = tempdir().expect("tempdir");

    scoutdb(dir.path())
        .arg("--schema-version")
        .assert()
        .success()
        .stdout(predicate::str::contains("1.0.0"));
}
