use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_version_flag() {
    Command::cargo_bin("spotify-remote")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("spotify-remote"));
}

#[test]
fn test_help_lists_keys() {
    Command::cargo_bin("spotify-remote")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Remote-control a running media player"))
        .stdout(predicate::str::contains(":q!"));
}

#[test]
fn test_rejects_unknown_flags() {
    Command::cargo_bin("spotify-remote")
        .unwrap()
        .arg("--bus")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unexpected argument"));
}
