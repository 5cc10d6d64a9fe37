//! CLI surface tests: argument parsing and exit codes that don't need a
//! live index or provider credentials.

use assert_cmd::Command;
use predicates::prelude::*;

fn melody() -> Command {
    let mut cmd = Command::cargo_bin("melody").unwrap();
    // Keep host configuration from leaking into assertions.
    cmd.env_remove("MELODY_DB")
        .env_remove("MELODY_INDEX_URL")
        .env_remove("MELODY_INDEX_NAME")
        .env_remove("OPENAI_API_KEY");
    cmd
}

#[test]
fn help_lists_subcommands() {
    melody()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("search"))
        .stdout(predicate::str::contains("index"))
        .stdout(predicate::str::contains("schema"))
        .stdout(predicate::str::contains("health"));
}

#[test]
fn index_without_db_path_fails_fast() {
    melody()
        .arg("index")
        .assert()
        .failure()
        .stderr(predicate::str::contains("catalog database path is required"));
}

#[test]
fn index_with_missing_db_file_fails_before_connecting() {
    melody()
        .args(["index", "--db", "/nonexistent/catalog.db"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("catalog"));
}

#[test]
fn search_requires_a_prompt_argument() {
    melody().arg("search").assert().failure();
}

#[test]
fn health_reports_without_credentials() {
    // Health never fails the process; it reports state instead.
    melody()
        .arg("health")
        .assert()
        .success()
        .stdout(predicate::str::contains("index status"))
        .stdout(predicate::str::contains("not configured"));
}
