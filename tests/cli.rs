use std::path::Path;

use assert_cmd::Command;
use kasongo::profile::{ProfileStore, SqliteProfileStore};
use tempfile::TempDir;

/// Binary with every on-disk location pointed into `home`
fn kasongo(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kasongo").unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("KASONGO_LOG")
        .arg("--catalog")
        .arg(home.join("exercises.json"))
        .arg("--db")
        .arg(home.join("profiles.db"));
    cmd
}

fn seeded_home() -> TempDir {
    let home = tempfile::tempdir().unwrap();
    let store = SqliteProfileStore::open(home.path().join("profiles.db")).unwrap();
    store.record_session("ada", "b1", 40.0, 100.0, 30.0).unwrap();
    store.record_session("ada", "i1", 55.5, 92.0, 45.5).unwrap();
    home
}

#[test]
fn list_prints_levels_in_catalog_order() {
    let home = tempfile::tempdir().unwrap();
    let out = kasongo(home.path()).arg("--list").output().unwrap();
    assert!(out.status.success());

    let text = String::from_utf8(out.stdout).unwrap();
    let beginner = text.find("beginner").unwrap();
    let intermediate = text.find("intermediate").unwrap();
    let advanced = text.find("advanced").unwrap();
    assert!(beginner < intermediate && intermediate < advanced);
    assert!(text.contains("Home Row"));

    // a missing catalog is seeded with the defaults
    assert!(home.path().join("exercises.json").exists());
}

#[test]
fn stats_reports_recorded_history() {
    let home = seeded_home();
    let out = kasongo(home.path())
        .args(["--stats", "-u", "ada"])
        .output()
        .unwrap();
    assert!(out.status.success());

    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.contains("profile: ada"));
    assert!(text.contains("best 55.5 wpm"));
    assert!(text.contains("2 completed"));
    assert!(text.contains("i1"));
}

#[test]
fn stats_for_unknown_user_is_empty() {
    let home = seeded_home();
    let out = kasongo(home.path())
        .args(["--stats", "-u", "nobody"])
        .output()
        .unwrap();
    assert!(out.status.success());

    let text = String::from_utf8(out.stdout).unwrap();
    assert!(text.contains("0 completed"));
    assert!(text.contains("acc 100.00%"));
}

#[test]
fn export_writes_csv() {
    let home = seeded_home();
    let csv = home.path().join("history.csv");
    let out = kasongo(home.path())
        .args(["--export"])
        .arg(&csv)
        .args(["-u", "ada"])
        .output()
        .unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8(out.stdout)
        .unwrap()
        .contains("exported 2 sessions"));

    let written = std::fs::read_to_string(&csv).unwrap();
    let mut lines = written.lines();
    assert_eq!(
        lines.next(),
        Some("timestamp,exercise_id,wpm,accuracy,time_elapsed")
    );
    assert_eq!(lines.count(), 2);
}

#[test]
fn exercise_without_level_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    kasongo(home.path())
        .args(["-e", "b1", "--list"])
        .assert()
        .failure();
}
