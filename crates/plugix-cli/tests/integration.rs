//! Integration tests for the plugix binary

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture_config_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("plugix.toml")
}

fn plugix_cmd_with(config: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("plugix");
    cmd.env("PLUGIX_CONFIG", config)
        .env("NO_COLOR", "1")
        .env_remove("PLUGIX_LOG");
    cmd
}

fn plugix_cmd() -> Command {
    plugix_cmd_with(&fixture_config_path())
}

#[test]
fn test_version() {
    plugix_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("plugix"));
}

#[test]
fn test_help() {
    plugix_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("registry index"));
}

#[test]
fn test_invalid_command() {
    plugix_cmd().arg("invalid").assert().failure();
}

#[test]
fn test_list_plugins() {
    plugix_cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("readers"))
        .stdout(predicate::str::contains("text_lines"))
        .stdout(predicate::str::contains("conus"));
}

#[test]
fn test_list_single_interface() {
    plugix_cmd()
        .args(["list", "algorithms"])
        .assert()
        .success()
        .stdout(predicate::str::contains("scale"))
        .stdout(predicate::str::contains("text_lines").not());
}

#[test]
fn test_list_unknown_interface() {
    plugix_cmd()
        .args(["list", "bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown interface 'bogus'"));
}

#[test]
fn test_get_code_plugin() {
    plugix_cmd()
        .args(["get", "readers", "text_lines"])
        .assert()
        .success()
        .stdout(predicate::str::contains("readers.text_lines"))
        .stdout(predicate::str::contains("metadata_only=false"));
}

#[test]
fn test_get_declarative_plugin() {
    plugix_cmd()
        .args(["get", "sectors", "conus"])
        .assert()
        .success()
        .stdout(predicate::str::contains("sectors.conus"))
        .stdout(predicate::str::contains("area_id: conus"));
}

#[test]
fn test_get_missing_plugin_fails() {
    plugix_cmd()
        .args(["get", "readers", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Plugin 'nope' not found in interface 'readers'"));
}

#[test]
fn test_get_product_requires_source() {
    plugix_cmd()
        .args(["get", "products", "Infrared"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pass --source"));
}

#[test]
fn test_validate_fixture_plugins() {
    plugix_cmd()
        .arg("validate")
        .assert()
        .success()
        .stderr(predicate::str::contains("3 plugin(s) valid"));
}

#[test]
fn test_rebuild_without_indexer_fails() {
    plugix_cmd()
        .arg("rebuild")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Rebuild failed"));
}

#[test]
fn test_config_show() {
    plugix_cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration:"))
        .stdout(predicate::str::contains("rebuild-on-miss: false"));
}

#[test]
fn test_config_path() {
    plugix_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("plugix.toml"));
}

#[test]
fn test_describe_uses_help_cache() {
    let Ok(temp_dir) = TempDir::new() else {
        return;
    };
    let config = temp_dir.path().join("plugix.toml");
    if fs::write(&config, "cache_path = \"cache\"\n").is_err() {
        return;
    }

    plugix_cmd_with(&config)
        .arg("describe")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"));
    assert!(temp_dir.path().join("cache").join("commands.json").exists());

    plugix_cmd_with(&config)
        .args(["describe", "get"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--source"));

    plugix_cmd_with(&config)
        .args(["describe", "bogus"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No extended help for 'bogus'"));
}
