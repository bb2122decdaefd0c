// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Tests use unwrap/expect for clear failure messages"
)]
//! End-to-end tests for the `pantograph` binary: supervisor startup,
//! control-socket commands, and session teardown.
//!
//! Session state is isolated per test via `XDG_STATE_HOME`.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tempfile::{TempDir, tempdir};

const PANTOGRAPH: &str = env!("CARGO_BIN_EXE_pantograph");
const MOCKGLS: &str = env!("CARGO_BIN_EXE_mockgls");

/// A running `pantograph serve` child, killed on drop.
struct Supervisor {
    child: Child,
    state_home: TempDir,
}

impl Supervisor {
    /// Spawn `pantograph serve` over the given roots with mockgls as the
    /// service.
    fn spawn(roots: &[&Path]) -> Self {
        let state_home = tempdir().unwrap();

        let mut cmd = Command::new(PANTOGRAPH);
        cmd.arg("serve");
        cmd.arg("--service").arg(MOCKGLS);
        for root in roots {
            cmd.arg("--root").arg(root);
        }
        cmd.env("XDG_STATE_HOME", state_home.path());
        cmd.env("XDG_CONFIG_HOME", state_home.path()); // isolate user config
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let child = cmd.spawn().expect("Failed to spawn pantograph serve");

        Self { child, state_home }
    }

    fn sessions_dir(&self) -> PathBuf {
        self.state_home
            .path()
            .join("pantograph")
            .join("sessions")
    }

    /// Wait for the session directory and control socket to appear,
    /// returning the session id.
    fn wait_for_session(&self) -> String {
        let deadline = Instant::now() + Duration::from_secs(15);

        loop {
            assert!(
                Instant::now() < deadline,
                "supervisor session never appeared"
            );

            if let Ok(entries) = std::fs::read_dir(self.sessions_dir()) {
                for entry in entries.flatten() {
                    let dir = entry.path();
                    if dir.join("control.sock").exists() {
                        return entry.file_name().to_string_lossy().into_owned();
                    }
                }
            }

            std::thread::sleep(Duration::from_millis(100));
        }
    }

    /// Run a pantograph CLI subcommand against this supervisor's state.
    fn cli(&self, args: &[&str]) -> std::process::Output {
        Command::new(PANTOGRAPH)
            .args(args)
            .env("XDG_STATE_HOME", self.state_home.path())
            .env("XDG_CONFIG_HOME", self.state_home.path())
            .output()
            .expect("Failed to run pantograph CLI")
    }

    /// Wait for the serve child to exit, with a deadline.
    fn wait_for_exit(&mut self) -> std::process::ExitStatus {
        let deadline = Instant::now() + Duration::from_secs(15);
        loop {
            if let Some(status) = self.child.try_wait().unwrap() {
                return status;
            }
            assert!(Instant::now() < deadline, "supervisor did not exit");
            std::thread::sleep(Duration::from_millis(100));
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A workspace folder that will activate (has a `.gqlconfig`).
fn gql_folder() -> TempDir {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(".gqlconfig"), "{ schema: {} }").unwrap();
    dir
}

#[test]
fn test_version_flag() {
    let output = Command::new(PANTOGRAPH)
        .arg("--version")
        .output()
        .expect("Failed to run pantograph");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("pantograph"));
}

#[test]
fn test_list_with_no_sessions() {
    let state_home = tempdir().unwrap();
    let output = Command::new(PANTOGRAPH)
        .arg("list")
        .env("XDG_STATE_HOME", state_home.path())
        .output()
        .expect("Failed to run pantograph list");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No active Pantograph sessions"));
}

#[test]
fn test_serve_roots_status_stop_roundtrip() {
    let folder_a = gql_folder();
    let folder_b = tempdir().unwrap();

    let mut supervisor = Supervisor::spawn(&[folder_a.path()]);
    let id = supervisor.wait_for_session();

    // Replace the open-folder set: add B alongside A.
    let output = supervisor.cli(&[
        "roots",
        "--session",
        &id,
        folder_a.path().to_str().unwrap(),
        folder_b.path().to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "roots failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    // A was already tracked; only B is new, and it declines (no config).
    assert!(stdout.contains("Reconciled:"), "unexpected: {stdout}");
    assert!(stdout.contains("1 declined"), "unexpected: {stdout}");

    // Session status shows the workspace.
    let output = supervisor.cli(&["status", &id]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(&id));
    assert!(stdout.contains("Workspace:"));

    // Reveal the active folder's sink.
    let output = supervisor.cli(&[
        "reveal",
        "--session",
        &id,
        folder_a.path().to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "reveal failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let sink = String::from_utf8_lossy(&output.stdout).trim().to_string();
    assert!(sink.ends_with(".log"), "unexpected sink path: {sink}");

    // Revealing the declined folder fails.
    let output = supervisor.cli(&[
        "reveal",
        "--session",
        &id,
        folder_b.path().to_str().unwrap(),
    ]);
    assert!(!output.status.success());

    // Stop the session; the supervisor exits cleanly and cleans up.
    let output = supervisor.cli(&["stop", &id]);
    assert!(
        output.status.success(),
        "stop failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let status = supervisor.wait_for_exit();
    assert!(status.success(), "supervisor exited with {status}");

    // Session directory is removed on drop.
    let session_dir = supervisor.sessions_dir().join(&id);
    assert!(!session_dir.exists(), "session dir was not cleaned up");
}

#[test]
fn test_focus_command_roundtrip() {
    let folder = gql_folder();
    let mut supervisor = Supervisor::spawn(&[folder.path()]);
    let id = supervisor.wait_for_session();

    let doc = folder.path().join("schema.graphql");
    let output = supervisor.cli(&["focus", "--session", &id, doc.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "focus failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    // Clearing focus also succeeds.
    let output = supervisor.cli(&["focus", "--session", &id]);
    assert!(output.status.success());

    let output = supervisor.cli(&["stop", &id]);
    assert!(output.status.success());
    supervisor.wait_for_exit();
}

#[test]
fn test_doctor_reports_unconfigured_folder() {
    let folder = tempdir().unwrap();
    let state_home = tempdir().unwrap();

    let output = Command::new(PANTOGRAPH)
        .args(["doctor", "--nocolor"])
        .arg("--root")
        .arg(folder.path())
        .env("XDG_CONFIG_HOME", state_home.path())
        .output()
        .expect("Failed to run pantograph doctor");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("skipped"), "unexpected: {stdout}");
    assert!(stdout.contains(".gqlconfig"), "unexpected: {stdout}");
}

#[test]
fn test_doctor_reports_missing_service() {
    let folder = gql_folder();
    let state_home = tempdir().unwrap();

    let output = Command::new(PANTOGRAPH)
        .args(["doctor", "--nocolor", "--service", "pantograph-no-such-ls"])
        .arg("--root")
        .arg(folder.path())
        .env("XDG_CONFIG_HOME", state_home.path())
        .output()
        .expect("Failed to run pantograph doctor");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("not found"), "unexpected: {stdout}");
}

#[test]
fn test_doctor_reports_healthy_folder() {
    let folder = gql_folder();
    std::fs::write(folder.path().join("schema.graphql"), "type Query { ok: Boolean }").unwrap();
    let state_home = tempdir().unwrap();

    let output = Command::new(PANTOGRAPH)
        .args(["doctor", "--nocolor", "--service", MOCKGLS])
        .arg("--root")
        .arg(folder.path())
        .env("XDG_CONFIG_HOME", state_home.path())
        .output()
        .expect("Failed to run pantograph doctor");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains('✓'), "unexpected: {stdout}");
    assert!(stdout.contains("1 GraphQL document"), "unexpected: {stdout}");
}
