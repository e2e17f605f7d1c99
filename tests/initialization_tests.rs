//! Start-up behaviour of the CLI binary.
//!
//! Everything here fails (or finishes) before a browser would be launched,
//! so these run without Chrome installed.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn dirscout() -> assert_cmd::Command {
    cargo_bin_cmd!("dirscout")
}

/// Copy the real config into a temp dir so the binary finds
/// `./config/dirscout.toml` relative to its working directory.
fn setup_config_dir(tmp: &TempDir) {
    let src = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config");
    let dst = tmp.path().join("config");
    fs::create_dir_all(&dst).unwrap();
    fs::copy(src.join("dirscout.toml"), dst.join("dirscout.toml")).unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Non-interactive runs must fail fast instead of waiting on a prompt.
#[test]
fn test_missing_config_exits_fast_not_hangs() {
    let tmp = TempDir::new().expect("create temp dir");
    fs::write(tmp.path().join("districts.csv"), "District Name\nLodi Unified\n").unwrap();

    dirscout()
        .current_dir(tmp.path())
        .args(["--input", "districts.csv"])
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found"))
        .stderr(predicate::str::contains("--init"));
}

#[test]
fn test_init_creates_config_file() {
    let tmp = TempDir::new().expect("create temp dir");
    let config_path = tmp.path().join("config").join("dirscout.toml");

    dirscout()
        .current_dir(tmp.path())
        .arg("--init")
        .timeout(Duration::from_secs(10))
        .assert()
        .success()
        .stdout(predicate::str::contains("Created default configuration file"));

    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[directory]"));
    assert!(content.contains("[[directory.roles]]"));
    assert!(content.contains("[timeouts]"));
}

#[test]
fn test_init_honours_config_flag() {
    let tmp = TempDir::new().expect("create temp dir");

    dirscout()
        .current_dir(tmp.path())
        .args(["--init", "--config", "custom/site.toml"])
        .timeout(Duration::from_secs(10))
        .assert()
        .success();

    assert!(tmp.path().join("custom").join("site.toml").exists());
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().expect("create temp dir");
    setup_config_dir(&tmp);
    let path = tmp.path().join("config").join("dirscout.toml");
    let broken = fs::read_to_string(&path)
        .unwrap()
        .replace("https://www.cde.ca.gov/SchoolDirectory/", "ftp://example.org");
    fs::write(&path, broken).unwrap();
    fs::write(tmp.path().join("districts.csv"), "District Name\nLodi Unified\n").unwrap();

    dirscout()
        .current_dir(tmp.path())
        .args(["--input", "districts.csv"])
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("directory.entry_url"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Input errors abort before any session is opened
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_input_is_required() {
    let tmp = TempDir::new().expect("create temp dir");
    setup_config_dir(&tmp);

    dirscout()
        .current_dir(tmp.path())
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file is required"));
}

#[test]
fn test_missing_input_file() {
    let tmp = TempDir::new().expect("create temp dir");
    setup_config_dir(&tmp);

    dirscout()
        .current_dir(tmp.path())
        .args(["--input", "nope.csv"])
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read input file"));
}

#[test]
fn test_missing_key_column() {
    let tmp = TempDir::new().expect("create temp dir");
    setup_config_dir(&tmp);
    let input = tmp.path().join("districts.csv");
    let original = "Name,County\nLodi Unified,San Joaquin\n";
    fs::write(&input, original).unwrap();

    dirscout()
        .current_dir(tmp.path())
        .args(["--input", "districts.csv"])
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Key column 'District Name' not found"));

    assert_eq!(fs::read_to_string(&input).unwrap(), original);
    assert!(!tmp.path().join("skipped_items.txt").exists());
}

#[test]
fn test_unsupported_input_format() {
    let tmp = TempDir::new().expect("create temp dir");
    setup_config_dir(&tmp);
    fs::write(tmp.path().join("districts.json"), "[]").unwrap();

    dirscout()
        .current_dir(tmp.path())
        .args(["--input", "districts.json"])
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains(".csv, .tsv or .xlsx"));
}

#[test]
fn test_empty_key_column_finishes_without_browser() {
    let tmp = TempDir::new().expect("create temp dir");
    setup_config_dir(&tmp);
    fs::write(tmp.path().join("districts.tsv"), "Name\tCounty\n\tSan Joaquin\n").unwrap();

    dirscout()
        .current_dir(tmp.path())
        .args(["--input", "districts.tsv", "--key-column", "Name"])
        .timeout(Duration::from_secs(10))
        .assert()
        .success()
        .stderr(predicate::str::contains("nothing to do"));
}

#[test]
fn test_help_works_without_config() {
    let tmp = TempDir::new().expect("create temp dir");

    dirscout()
        .current_dir(tmp.path())
        .arg("--help")
        .timeout(Duration::from_secs(10))
        .assert()
        .success()
        .stdout(predicate::str::contains("--input"));
}
