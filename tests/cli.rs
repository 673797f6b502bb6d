use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn zennit() -> Command {
    Command::cargo_bin("zennit").expect("zennit binary")
}

#[test]
fn prints_version() {
    zennit()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    zennit()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--subreddit"))
        .stdout(predicate::str::contains("--offline"));
}

#[test]
fn prints_paths_without_starting_the_ui() {
    let dir = tempdir().expect("tempdir");
    zennit()
        .arg("--print-paths")
        .env("HOME", dir.path())
        .env("XDG_CONFIG_HOME", dir.path().join("config"))
        .env("XDG_DATA_HOME", dir.path().join("data"))
        .env("XDG_CACHE_HOME", dir.path().join("cache"))
        .assert()
        .success()
        .stdout(predicate::str::contains("config.yaml"))
        .stdout(predicate::str::contains("preferences.db"))
        .stdout(predicate::str::contains("zennit.log"));
}

#[test]
fn missing_explicit_config_fails() {
    let dir = tempdir().expect("tempdir");
    zennit()
        .args(["--print-paths", "--config"])
        .arg(dir.path().join("absent.yaml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn rejects_unknown_log_level() {
    zennit()
        .args(["--log-level", "loud", "--print-paths"])
        .assert()
        .failure();
}
