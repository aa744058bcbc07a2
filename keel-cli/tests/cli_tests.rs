//! Integration tests for the Keel CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get the keel binary running in `dir`, with no environment overrides.
#[allow(deprecated)]
fn keel_bare(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("keel").unwrap();
    cmd.current_dir(dir)
        .env_remove("KEEL_CONFIG")
        .env_remove("KEEL_DATABASE")
        .env_remove("KEEL_LOG_LEVEL")
        .env_remove("KEEL_DEBUG");
    cmd
}

/// Get the keel binary, pointed at a database and migrations directory
/// inside `dir`.
fn keel_cmd(dir: &Path) -> Command {
    let mut cmd = keel_bare(dir);
    cmd.args(["--database", "test.db", "--migrations", "migrations"]);
    cmd
}

fn write_migration(dir: &Path, file_name: &str, up: &str, down: &str) {
    let migrations = dir.join("migrations");
    fs::create_dir_all(&migrations).unwrap();
    fs::write(
        migrations.join(file_name),
        format!("-- migrate:up\n{up}\n\n-- migrate:down\n{down}\n"),
    )
    .unwrap();
}

fn project_with_two_migrations() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_migration(
        dir.path(),
        "001-create-users.sql",
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
        "DROP TABLE users;",
    );
    write_migration(
        dir.path(),
        "002-add-email.sql",
        "ALTER TABLE users ADD COLUMN email TEXT;",
        "ALTER TABLE users DROP COLUMN email;",
    );
    dir
}

#[test]
fn test_help_command() {
    let dir = TempDir::new().unwrap();
    keel_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: keel"))
        .stdout(predicate::str::contains("up"))
        .stdout(predicate::str::contains("down"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("reset"))
        .stdout(predicate::str::contains("unlock"))
        .stdout(predicate::str::contains("create"));
}

#[test]
fn test_create_writes_numbered_file() {
    let dir = TempDir::new().unwrap();

    keel_cmd(dir.path())
        .args(["create", "add", "users", "table"])
        .assert()
        .success()
        .stdout(predicate::str::contains("001-add-users-table.sql"));

    keel_cmd(dir.path())
        .args(["create", "add email"])
        .assert()
        .success()
        .stdout(predicate::str::contains("002-add-email.sql"));

    let content = fs::read_to_string(dir.path().join("migrations/001-add-users-table.sql")).unwrap();
    assert!(content.contains("-- migrate:up"));
    assert!(content.contains("-- migrate:down"));
}

#[test]
fn test_up_then_status() {
    let dir = project_with_two_migrations();

    keel_cmd(dir.path())
        .arg("pending")
        .assert()
        .success()
        .stdout(predicate::str::contains("001-create-users\n002-add-email"));

    keel_cmd(dir.path())
        .arg("up")
        .assert()
        .success()
        .stdout(predicate::str::contains("001-create-users"))
        .stdout(predicate::str::contains("002-add-email"))
        .stdout(predicate::str::contains("Applied 2 migration(s)"));

    keel_cmd(dir.path())
        .arg("up")
        .assert()
        .success()
        .stdout(predicate::str::contains("No pending migrations"));

    keel_cmd(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 executed, 0 pending"));

    keel_cmd(dir.path())
        .arg("pending")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_up_to_and_status_json() {
    let dir = project_with_two_migrations();

    keel_cmd(dir.path())
        .args(["up", "--to", "001-create-users"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Applied 1 migration(s)"));

    let output = keel_cmd(dir.path())
        .args(["status", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["executed"][0]["name"], "001-create-users");
    assert_eq!(status["pending"], serde_json::json!(["002-add-email"]));
}

#[test]
fn test_down_reverts_latest() {
    let dir = project_with_two_migrations();
    keel_cmd(dir.path()).arg("up").assert().success();

    keel_cmd(dir.path())
        .arg("down")
        .assert()
        .success()
        .stdout(predicate::str::contains("002-add-email"))
        .stdout(predicate::str::contains("Reverted 1 migration(s)"));

    keel_cmd(dir.path())
        .arg("pending")
        .assert()
        .success()
        .stdout(predicate::str::contains("002-add-email"));
}

#[test]
fn test_reset_requires_force() {
    let dir = project_with_two_migrations();
    keel_cmd(dir.path()).arg("up").assert().success();

    keel_cmd(dir.path())
        .arg("reset")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    keel_cmd(dir.path())
        .args(["reset", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reverted 2 migration(s)"));

    keel_cmd(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 executed, 2 pending"));
}

#[test]
fn test_failing_migration_is_named() {
    let dir = project_with_two_migrations();
    write_migration(
        dir.path(),
        "003-broken.sql",
        "CREATE TABLEX nope (id INTEGER);",
        "DROP TABLE nope;",
    );

    keel_cmd(dir.path())
        .arg("up")
        .assert()
        .failure()
        .stderr(predicate::str::contains("003-broken"));

    keel_cmd(dir.path())
        .arg("pending")
        .assert()
        .success()
        .stdout(predicate::str::diff("003-broken\n"));
}

#[test]
fn test_unlock() {
    let dir = TempDir::new().unwrap();

    keel_cmd(dir.path())
        .arg("unlock")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    keel_cmd(dir.path())
        .args(["unlock", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not held"));
}

#[test]
fn test_database_url() {
    let dir = project_with_two_migrations();

    keel_bare(dir.path())
        .args(["--database", "sqlite://url.db?journal_mode=delete", "up"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Applied 2 migration(s)"));
    assert!(dir.path().join("url.db").exists());
    assert!(!dir.path().join("test.db").exists());

    keel_bare(dir.path())
        .args(["--database", "sqlite://url.db?journal_mode=sideways", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("sideways"));
}

#[test]
fn test_config_file_is_used() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("keel.toml"),
        "[database]\npath = \"from-config.db\"\n\n[migrations]\ndirectory = \"db\"\n",
    )
    .unwrap();
    fs::create_dir_all(dir.path().join("db")).unwrap();
    fs::write(
        dir.path().join("db/001-init.sql"),
        "-- migrate:up\nCREATE TABLE t (id INTEGER);\n-- migrate:down\nDROP TABLE t;\n",
    )
    .unwrap();

    keel_bare(dir.path())
        .arg("up")
        .assert()
        .success()
        .stdout(predicate::str::contains("001-init"));

    assert!(dir.path().join("from-config.db").exists());
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bad.toml"), "[database\n").unwrap();

    keel_cmd(dir.path())
        .args(["--config", "bad.toml", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}
