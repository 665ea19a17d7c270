use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_help_lists_options() {
    Command::cargo_bin("alertrelay")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--token-file"))
        .stdout(predicate::str::contains("--metrics"));
}

#[test]
fn test_missing_config_file_fails_startup() {
    Command::cargo_bin("alertrelay")
        .unwrap()
        .args(["--config", "/nonexistent/alertrelay.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn test_invalid_port_is_rejected() {
    Command::cargo_bin("alertrelay")
        .unwrap()
        .args(["--port", "not-a-port"])
        .assert()
        .failure();
}
