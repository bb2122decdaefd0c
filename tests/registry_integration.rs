// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Tests use unwrap/expect/panic for clear failure messages"
)]
//! Integration tests for the workspace client registry, driving real
//! `mockgls` service processes.
//!
//! Covers the full lifecycle: activation and decline, idempotent
//! reconciliation, indicator transitions on `serverInitialized` and
//! `serverExited`, visibility against the focused document, and
//! per-folder failure isolation.

use std::path::Path;
use std::time::Duration;

use tempfile::{TempDir, tempdir};
use tokio::sync::mpsc;

use pantograph_gql::config::{Config, ServiceConfig};
use pantograph_gql::lsp::{
    Activation, ClientRegistry, ConnectionHandle, FolderSnapshot, ServiceEvent, WorkspaceKey,
};
use pantograph_gql::session::EventBroadcaster;
use pantograph_gql::status::ActiveDocument;

const MOCKGLS: &str = env!("CARGO_BIN_EXE_mockgls");

struct Harness {
    registry: ClientRegistry,
    events: mpsc::Receiver<ServiceEvent>,
    _channels: TempDir,
}

/// Build a registry whose service command is `mockgls` with extra flags.
fn harness(mock_args: &[&str]) -> Harness {
    let channels = tempdir().unwrap();
    let mut config = Config::default();
    config.service.command = MOCKGLS.to_string();
    config.service.args = mock_args.iter().map(ToString::to_string).collect();

    let (event_tx, events) = mpsc::channel(256);
    let registry = ClientRegistry::new(
        config,
        channels.path().to_path_buf(),
        event_tx,
        EventBroadcaster::noop().unwrap(),
    );

    Harness {
        registry,
        events,
        _channels: channels,
    }
}

/// A workspace folder that will activate (has a `.gqlconfig`).
fn gql_folder() -> TempDir {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(".gqlconfig"), "{ schema: { files: \"**/*.graphql\" } }")
        .unwrap();
    dir
}

/// Pump service events into the registry until `pred` holds or the
/// deadline passes.
async fn pump_until<F>(harness: &mut Harness, pred: F, what: &str)
where
    F: Fn(&[FolderSnapshot]) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);

    loop {
        if pred(&harness.registry.snapshots()) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for: {what}; snapshots: {:?}",
            harness.registry.snapshots()
        );

        if let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(100), harness.events.recv()).await
        {
            harness.registry.handle_event(event).await;
        }
    }
}

fn snapshot_for<'a>(snapshots: &'a [FolderSnapshot], root: &Path) -> Option<&'a FolderSnapshot> {
    let canonical = root.canonicalize().unwrap().display().to_string();
    snapshots.iter().find(|s| s.folder == canonical)
}

#[tokio::test]
async fn test_mixed_folders_only_configured_one_activates() {
    let mut harness = harness(&[]);
    let with_config = gql_folder();
    let without_config = tempdir().unwrap();

    let summary = harness
        .registry
        .reconcile(&[
            with_config.path().to_path_buf(),
            without_config.path().to_path_buf(),
        ])
        .await;

    // Two keys tracked; only the configured folder started a process.
    assert_eq!(summary.started, 1);
    assert_eq!(summary.declined, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(harness.registry.len(), 2);

    let snapshots = harness.registry.snapshots();
    assert!(snapshot_for(&snapshots, with_config.path()).unwrap().active);
    assert!(
        !snapshot_for(&snapshots, without_config.path())
            .unwrap()
            .active
    );

    // The configured folder reaches running with the declared extensions.
    let root = with_config.path().to_path_buf();
    pump_until(
        &mut harness,
        |snaps| {
            snapshot_for(snaps, &root)
                .is_some_and(|s| s.state.as_deref() == Some("running"))
        },
        "serverInitialized to reach the indicator",
    )
    .await;

    let snapshots = harness.registry.snapshots();
    let active = snapshot_for(&snapshots, with_config.path()).unwrap();
    assert_eq!(active.extensions, vec!["graphql", "gql"]);

    harness.registry.dispose_all().await;
}

#[tokio::test]
async fn test_reconcile_twice_with_live_service_is_noop() {
    let mut harness = harness(&[]);
    let folder = gql_folder();
    let folders = vec![folder.path().to_path_buf()];

    let first = harness.registry.reconcile(&folders).await;
    assert_eq!(first.started, 1);

    let second = harness.registry.reconcile(&folders).await;
    assert!(second.is_noop(), "second pass did work: {second:?}");

    harness.registry.dispose_all().await;
}

#[tokio::test]
async fn test_closing_running_folder_removes_it_and_spares_the_rest() {
    let mut harness = harness(&[]);
    let a = gql_folder();
    let b = tempdir().unwrap();

    harness
        .registry
        .reconcile(&[a.path().to_path_buf(), b.path().to_path_buf()])
        .await;

    let a_root = a.path().to_path_buf();
    pump_until(
        &mut harness,
        |snaps| {
            snapshot_for(snaps, &a_root)
                .is_some_and(|s| s.state.as_deref() == Some("running"))
        },
        "folder A to reach running",
    )
    .await;

    // Close A. Its handle is disposed, key removed; B is untouched.
    let summary = harness.registry.reconcile(&[b.path().to_path_buf()]).await;
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.started, 0);
    assert_eq!(harness.registry.len(), 1);

    let snapshots = harness.registry.snapshots();
    assert!(snapshot_for(&snapshots, a.path()).is_none());
    assert!(snapshot_for(&snapshots, b.path()).is_some());

    harness.registry.dispose_all().await;
}

#[tokio::test]
async fn test_indicator_visibility_follows_active_editor() {
    let mut harness = harness(&[]);
    let folder = gql_folder();
    let root = folder.path().canonicalize().unwrap();

    harness
        .registry
        .reconcile(&[folder.path().to_path_buf()])
        .await;

    pump_until(
        &mut harness,
        |snaps| snaps.first().is_some_and(|s| s.state.as_deref() == Some("running")),
        "the service to reach running",
    )
    .await;

    // A matching document inside the folder: shown.
    harness.registry.on_active_editor(Some(ActiveDocument {
        path: root.join("src").join("schema.graphql"),
    }));
    assert_eq!(harness.registry.snapshots()[0].visible, Some(true));

    // A non-matching document inside the folder: hidden.
    harness.registry.on_active_editor(Some(ActiveDocument {
        path: root.join("src").join("main.rs"),
    }));
    assert_eq!(harness.registry.snapshots()[0].visible, Some(false));

    // A document outside any tracked folder: hidden.
    harness.registry.on_active_editor(Some(ActiveDocument {
        path: std::env::temp_dir().join("elsewhere.graphql"),
    }));
    assert_eq!(harness.registry.snapshots()[0].visible, Some(false));

    // No focused editor: hidden.
    harness.registry.on_active_editor(None);
    assert_eq!(harness.registry.snapshots()[0].visible, Some(false));

    harness.registry.dispose_all().await;
}

#[tokio::test]
async fn test_server_exit_marks_indicator_errored() {
    let mut harness = harness(&["--exit-after", "100"]);
    let folder = gql_folder();

    harness
        .registry
        .reconcile(&[folder.path().to_path_buf()])
        .await;

    // Runtime failure after a successful start: indicator only, the
    // entry stays tracked (no removal, no dialog-equivalent event).
    pump_until(
        &mut harness,
        |snaps| snaps.first().is_some_and(|s| s.state.as_deref() == Some("errored")),
        "serverExited to reach the indicator",
    )
    .await;

    assert_eq!(harness.registry.len(), 1);
    assert!(harness.registry.snapshots()[0].active);

    harness.registry.dispose_all().await;
}

#[tokio::test]
async fn test_failed_initialize_is_tombstoned_without_retry() {
    let mut harness = harness(&["--fail-initialize"]);
    let folder = gql_folder();
    let folders = vec![folder.path().to_path_buf()];

    let first = harness.registry.reconcile(&folders).await;
    assert_eq!(first.failed, 1);
    assert_eq!(first.started, 0);

    let snapshots = harness.registry.snapshots();
    assert_eq!(snapshots.len(), 1);
    assert!(!snapshots[0].active);

    // Retry is suppressed until the folder is closed and reopened.
    let second = harness.registry.reconcile(&folders).await;
    assert!(second.is_noop());

    harness.registry.reconcile(&[]).await;
    let third = harness.registry.reconcile(&folders).await;
    assert_eq!(third.failed, 1);

    harness.registry.dispose_all().await;
}

#[tokio::test]
async fn test_not_ready_service_stays_initializing_and_shows_for_folder_docs() {
    let mut harness = harness(&["--no-ready"]);
    let folder = gql_folder();
    let root = folder.path().canonicalize().unwrap();

    harness
        .registry
        .reconcile(&[folder.path().to_path_buf()])
        .await;

    // Drain whatever arrives for a moment; no serverInitialized comes.
    let settle = tokio::time::Instant::now() + Duration::from_millis(300);
    while tokio::time::Instant::now() < settle {
        if let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(50), harness.events.recv()).await
        {
            harness.registry.handle_event(event).await;
        }
    }

    let snapshots = harness.registry.snapshots();
    assert_eq!(snapshots[0].state.as_deref(), Some("initializing"));
    assert!(snapshots[0].extensions.is_empty());

    // While initializing, any document inside the folder shows the
    // indicator, whatever its extension.
    harness.registry.on_active_editor(Some(ActiveDocument {
        path: root.join("notes.md"),
    }));
    assert_eq!(harness.registry.snapshots()[0].visible, Some(true));

    harness.registry.dispose_all().await;
}

#[tokio::test]
async fn test_reveal_returns_sink_for_active_folder_only() {
    let mut harness = harness(&[]);
    let active = gql_folder();
    let declined = tempdir().unwrap();

    harness
        .registry
        .reconcile(&[active.path().to_path_buf(), declined.path().to_path_buf()])
        .await;

    let sink = harness.registry.reveal(active.path());
    assert!(sink.is_some());
    assert!(sink.unwrap().exists(), "sink log must exist on disk");

    assert!(harness.registry.reveal(declined.path()).is_none());

    harness.registry.dispose_all().await;
}

#[tokio::test]
async fn test_handle_dispose_is_idempotent() {
    let folder = gql_folder();
    let channels = tempdir().unwrap();
    let (key, root) = WorkspaceKey::for_folder(folder.path()).unwrap();
    let (event_tx, _event_rx) = mpsc::channel(64);

    let service = ServiceConfig {
        command: MOCKGLS.to_string(),
        ..ServiceConfig::default()
    };

    let activation = ConnectionHandle::start(
        key,
        root,
        &service,
        channels.path(),
        event_tx,
        EventBroadcaster::noop().unwrap(),
    )
    .await;

    let mut handle = match activation {
        Activation::Active(handle) => handle,
        Activation::Declined { reason } => panic!("unexpected decline: {reason}"),
        Activation::Failed { error } => panic!("unexpected failure: {error}"),
    };

    let sink = handle.channel_path().to_path_buf();

    handle.dispose().await;
    assert!(handle.is_disposed());

    let after_first = std::fs::read_to_string(&sink).unwrap();

    // Second dispose: no observable action — the sink doesn't change
    // and the call returns immediately.
    handle.dispose().await;
    let after_second = std::fs::read_to_string(&sink).unwrap();
    assert_eq!(after_first, after_second);
}

#[tokio::test]
async fn test_dispose_all_removes_every_key() {
    let mut harness = harness(&[]);
    let a = gql_folder();
    let b = gql_folder();

    let summary = harness
        .registry
        .reconcile(&[a.path().to_path_buf(), b.path().to_path_buf()])
        .await;
    assert_eq!(summary.started, 2);

    harness.registry.dispose_all().await;
    assert!(harness.registry.is_empty());
}
