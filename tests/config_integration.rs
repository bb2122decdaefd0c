// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Tests use unwrap/expect for clear failure messages"
)]
//! Integration tests for configuration loading and merging.
//!
//! Verifies that Pantograph correctly loads settings from an explicit
//! file, applies per-folder overrides, and honors the CLI `--service`
//! override end to end.

use std::path::Path;
use std::process::Command;

use tempfile::tempdir;

use pantograph_gql::config::Config;

const PANTOGRAPH: &str = env!("CARGO_BIN_EXE_pantograph");

#[test]
fn test_explicit_file_loading() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        r#"
[service]
command = "gql-ls-nightly"
loglevel = "debug"
watchman = false

[folder."/work/legacy"]
loglevel = "error"
gql_path = "vendor/gql"
"#,
    )
    .unwrap();

    let config = Config::load(Some(config_path)).unwrap();

    let base = config.service_for(Path::new("/work/app"));
    assert_eq!(base.command, "gql-ls-nightly");
    assert_eq!(base.loglevel, "debug");
    assert!(!base.watchman);
    // Unset fields keep their defaults
    assert!(!base.auto_download);
    assert_eq!(base.gql_path, ".");

    let legacy = config.service_for(Path::new("/work/legacy"));
    assert_eq!(legacy.command, "gql-ls-nightly");
    assert_eq!(legacy.loglevel, "error");
    assert_eq!(legacy.gql_path, "vendor/gql");
}

#[test]
fn test_missing_explicit_file_fails() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(Config::load(Some(missing)).is_err());
}

#[test]
fn test_launch_args_reflect_overrides() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        r#"
[service]
loglevel = "warn"
auto_download = true
args = ["--experimental"]
"#,
    )
    .unwrap();

    let config = Config::load(Some(config_path)).unwrap();
    let service = config.service_for(Path::new("/work/api"));
    let args = service.launch_args(Path::new("/work/api"));

    assert!(args.contains(&"--loglevel=warn".to_string()));
    assert!(args.contains(&"--auto-download-gql=true".to_string()));
    assert!(args.contains(&"--watchman=true".to_string()));
    assert_eq!(args.last().map(String::as_str), Some("--experimental"));
}

#[test]
fn test_doctor_uses_config_file_service() {
    // End-to-end: the config file's service command shows up in doctor
    // output for a folder that would activate.
    let folder = tempdir().unwrap();
    std::fs::write(folder.path().join(".gqlconfig"), "{ schema: {} }").unwrap();

    let config_dir = tempdir().unwrap();
    let config_path = config_dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        r#"
[service]
command = "pantograph-no-such-ls"
"#,
    )
    .unwrap();

    let output = Command::new(PANTOGRAPH)
        .args(["doctor", "--nocolor"])
        .arg("--config")
        .arg(&config_path)
        .arg("--root")
        .arg(folder.path())
        .env("XDG_CONFIG_HOME", config_dir.path())
        .output()
        .expect("Failed to run pantograph doctor");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("pantograph-no-such-ls not found"),
        "unexpected: {stdout}"
    );
}
