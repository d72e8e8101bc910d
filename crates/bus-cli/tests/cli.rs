//! Integration tests for the `bus` binary.

use assert_cmd::cargo;
use predicates::str::contains;
use tempfile::TempDir;

fn bus(home: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo::cargo_bin_cmd!("bus");
    cmd.env("BUS_HOME", home.path())
        .env("BUS_SESSION", "itest")
        .arg("init");
    cmd.assert().success();
    cargo::cargo_bin_cmd!("bus")
}

fn bus_cmd(home: &TempDir) -> assert_cmd::Command {
    let mut cmd = cargo::cargo_bin_cmd!("bus");
    cmd.env("BUS_HOME", home.path()).env("BUS_SESSION", "itest");
    cmd
}

#[test]
fn init_creates_session_root() {
    let home = TempDir::new().unwrap();
    bus(&home);
    assert!(home.path().join("itest").exists());
}

#[test]
fn send_then_inbox_round_trips_a_message() {
    let home = TempDir::new().unwrap();
    bus(&home);

    bus_cmd(&home)
        .args(["send", "--from", "build", "--to", "edit", "--action", "compile", "--payload", "ok"])
        .assert()
        .success()
        .stdout(contains("sent"));

    bus_cmd(&home)
        .args(["inbox", "--role", "edit"])
        .assert()
        .success()
        .stdout(contains("compile"));
}

#[test]
fn send_denies_build_to_test() {
    let home = TempDir::new().unwrap();
    bus(&home);

    bus_cmd(&home)
        .args(["send", "--from", "build", "--to", "test", "--action", "run"])
        .assert()
        .failure()
        .stderr(contains("send denied"));
}

#[test]
fn send_rejects_unknown_role() {
    let home = TempDir::new().unwrap();
    bus(&home);

    bus_cmd(&home)
        .args(["send", "--from", "build", "--to", "nonexistent", "--action", "run"])
        .assert()
        .failure()
        .stderr(contains("unknown role"));
}

#[test]
fn lock_unlock_and_is_locked_exit_codes() {
    let home = TempDir::new().unwrap();
    bus(&home);

    bus_cmd(&home).args(["is-locked", "--role", "build"]).assert().failure().code(1);

    bus_cmd(&home).args(["lock", "--role", "build"]).assert().success();
    bus_cmd(&home).args(["is-locked", "--role", "build"]).assert().success().code(0);

    bus_cmd(&home).args(["unlock", "--role", "build"]).assert().success();
    bus_cmd(&home).args(["is-locked", "--role", "build"]).assert().failure().code(1);
}

#[test]
fn log_success_dispatches_chain_to_next_role() {
    let home = TempDir::new().unwrap();
    bus(&home);

    bus_cmd(&home)
        .args(["log", "--role", "build", "--command", "cargo build", "--exit-code", "0"])
        .assert()
        .success();

    // build -> test on success, per the default chain rules.
    bus_cmd(&home)
        .args(["inbox", "--role", "test"])
        .assert()
        .success()
        .stdout(contains("build"));
}

#[test]
fn history_reflects_logged_commands() {
    let home = TempDir::new().unwrap();
    bus(&home);

    bus_cmd(&home)
        .args(["log", "--role", "build", "--command", "cargo build", "--exit-code", "1"])
        .assert()
        .success();

    bus_cmd(&home)
        .args(["history", "--role", "build"])
        .assert()
        .success()
        .stdout(contains("cargo build"))
        .stdout(contains("failure"));
}

#[test]
fn status_reports_known_roles() {
    let home = TempDir::new().unwrap();
    bus(&home);

    bus_cmd(&home)
        .args(["status", "--all"])
        .assert()
        .success()
        .stdout(contains("build"))
        .stdout(contains("edit"));
}

#[test]
fn chain_all_lists_default_rules() {
    let home = TempDir::new().unwrap();
    bus(&home);

    bus_cmd(&home)
        .args(["chain", "--all"])
        .assert()
        .success()
        .stdout(contains("build"));
}

#[test]
fn external_collaborator_commands_fail_with_explanation() {
    let home = TempDir::new().unwrap();
    bus(&home);

    bus_cmd(&home)
        .arg("memory")
        .assert()
        .failure()
        .stderr(contains("external collaborator"));
}

#[test]
fn cleanup_removes_session_root() {
    let home = TempDir::new().unwrap();
    bus(&home);
    assert!(home.path().join("itest").exists());

    bus_cmd(&home).arg("cleanup").assert().success();
    assert!(!home.path().join("itest").exists());
}
