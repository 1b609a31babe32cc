//! Integration tests for the CLI binary (offline commands only)

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cli() -> Command {
    Command::cargo_bin("wholesale-profit-analyzer").unwrap()
}

#[test]
fn test_validate_jan_accepts_valid_code() {
    cli()
        .args(["validate", "jan", "4901234567894"])
        .assert()
        .success()
        .stdout(predicate::str::contains("4901234567894"));
}

#[test]
fn test_validate_jan_rejects_bad_check_digit() {
    cli()
        .args(["validate", "jan", "4901234567890"])
        .assert()
        .failure();
}

#[test]
fn test_sources_list_names_all_three_sources() {
    cli()
        .args(["sources", "list"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("catalog")
                .and(predicate::str::contains("price_history"))
                .and(predicate::str::contains("competitor_price")),
        );
}

#[test]
fn test_sources_list_json_output_is_parseable() {
    let output = cli()
        .args(["sources", "list", "--format", "json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let parsed: serde_json::Value = serde_json::from_slice(&output).unwrap();
    // Three sources, with the competitor search listing both marketplaces.
    assert_eq!(parsed.as_array().map(|a| a.len()), Some(4));
}

#[test]
fn test_analyze_fails_on_missing_input_file() {
    let dir = TempDir::new().unwrap();
    cli()
        .args(["analyze", "does-not-exist.csv"])
        .args(["--checkpoint-dir", dir.path().to_str().unwrap()])
        .assert()
        .failure();
}

#[test]
fn test_validate_checkpoints_on_empty_directory_succeeds() {
    let dir = TempDir::new().unwrap();
    cli()
        .args([
            "validate",
            "checkpoints",
            "--checkpoint-dir",
            dir.path().to_str().unwrap(),
        ])
        .assert()
        .success();
}
