// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Workspace client registry.
//!
//! Keeps the set of language-service connections synchronized with the
//! editor host's open workspace folders: one [`ConnectionHandle`] (or a
//! tombstone for folders that declined or failed activation) per
//! [`WorkspaceKey`]. All mutation happens inside [`reconcile`] and the
//! event/visibility entry points, which the supervisor loop serializes.
//!
//! [`reconcile`]: ClientRegistry::reconcile

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::session::{EventBroadcaster, EventKind};
use crate::status::ActiveDocument;

use super::handle::{Activation, ConnectionHandle};
use super::state::{ServiceEvent, WorkspaceKey};

/// What one reconciliation pass actually did.
///
/// A second pass over an unchanged folder set is all zeros — that is the
/// idempotence contract, and tests assert it directly.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    /// Handles constructed and running.
    pub started: usize,
    /// Folders that opted out (no `.gqlconfig`).
    pub declined: usize,
    /// Folders whose service failed to start or initialize.
    pub failed: usize,
    /// Keys removed (their handles disposed).
    pub removed: usize,
}

impl ReconcileSummary {
    /// True when the pass neither created nor removed anything.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.started == 0 && self.declined == 0 && self.failed == 0 && self.removed == 0
    }
}

/// Snapshot of one registry entry, for `status` replies and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderSnapshot {
    /// Canonical folder path.
    pub folder: String,
    /// The folder's workspace key.
    pub key: String,
    /// Whether a live handle exists (false for tombstones).
    pub active: bool,
    /// Indicator state label, when active.
    pub state: Option<String>,
    /// Indicator visibility, when active.
    pub visible: Option<bool>,
    /// Extensions declared by the service, once known.
    pub extensions: Vec<String>,
    /// Diagnostic sink path, when active.
    pub channel: Option<String>,
}

struct Entry {
    root: PathBuf,
    /// `None` is the tombstone: inspected, deliberately not (or no
    /// longer able to be) activated. Re-attempted only if the key is
    /// removed and re-added.
    handle: Option<Box<ConnectionHandle>>,
}

/// Owns one entry per open workspace folder.
///
/// An explicitly owned value passed through activation/deactivation —
/// never a process-wide singleton — so teardown is clean and tests can
/// run several instances side by side.
pub struct ClientRegistry {
    config: Config,
    channels_dir: PathBuf,
    broadcaster: EventBroadcaster,
    event_tx: mpsc::Sender<ServiceEvent>,
    entries: HashMap<WorkspaceKey, Entry>,
    active_document: Option<ActiveDocument>,
}

impl ClientRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(
        config: Config,
        channels_dir: PathBuf,
        event_tx: mpsc::Sender<ServiceEvent>,
        broadcaster: EventBroadcaster,
    ) -> Self {
        Self {
            config,
            channels_dir,
            broadcaster,
            event_tx,
            entries: HashMap::new(),
            active_document: None,
        }
    }

    /// Synchronize the registry with the current open-folder set.
    ///
    /// Folders that fail to canonicalize are skipped with a warning —
    /// one bad folder must not abort the pass for the others, and
    /// neither may one folder's failed construction.
    pub async fn reconcile(&mut self, folders: &[PathBuf]) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        // Desired set, deduplicated by key.
        let mut desired: HashMap<WorkspaceKey, PathBuf> = HashMap::new();
        for folder in folders {
            match WorkspaceKey::for_folder(folder) {
                Ok((key, canonical)) => {
                    desired.entry(key).or_insert(canonical);
                }
                Err(e) => {
                    warn!("Skipping workspace folder: {e}");
                }
            }
        }

        // Construct handles for newly appeared keys, in a stable order.
        let mut added: Vec<(&WorkspaceKey, &PathBuf)> = desired
            .iter()
            .filter(|(key, _)| !self.entries.contains_key(*key))
            .collect();
        added.sort_by(|a, b| a.1.cmp(b.1));

        for (key, root) in added {
            let service = self.config.service_for(root);
            let activation = ConnectionHandle::start(
                key.clone(),
                root.clone(),
                &service,
                &self.channels_dir,
                self.event_tx.clone(),
                self.broadcaster.clone(),
            )
            .await;

            let handle = match activation {
                Activation::Active(mut handle) => {
                    info!("Activated language service for {}", root.display());
                    summary.started += 1;
                    handle.update_visibility(self.active_document.as_ref());
                    Some(handle)
                }
                Activation::Declined { .. } => {
                    summary.declined += 1;
                    None
                }
                Activation::Failed { .. } => {
                    summary.failed += 1;
                    None
                }
            };

            self.entries.insert(
                key.clone(),
                Entry {
                    root: root.clone(),
                    handle,
                },
            );
        }

        // Dispose and remove keys whose folders were closed.
        let removed: Vec<WorkspaceKey> = self
            .entries
            .keys()
            .filter(|key| !desired.contains_key(*key))
            .cloned()
            .collect();

        for key in removed {
            if let Some(mut entry) = self.entries.remove(&key) {
                if let Some(handle) = entry.handle.as_mut() {
                    info!("Disposing language service for {}", entry.root.display());
                    handle.dispose().await;
                }
                summary.removed += 1;
            }
        }

        if !summary.is_noop() {
            let mut current: Vec<String> = self
                .entries
                .values()
                .map(|e| e.root.display().to_string())
                .collect();
            current.sort();
            self.broadcaster
                .send(EventKind::FoldersChanged { folders: current });
        }

        summary
    }

    /// Route a service event to the owning handle.
    ///
    /// Events for unknown keys (a folder removed while the event was in
    /// flight) are dropped.
    pub async fn handle_event(&mut self, event: ServiceEvent) {
        let active = self.active_document.clone();

        match self.entries.get_mut(&event.key) {
            Some(Entry {
                handle: Some(handle),
                ..
            }) => {
                handle.on_event(event).await;
                handle.update_visibility(active.as_ref());
            }
            _ => {
                debug!("Dropping event for untracked workspace: {}", event.key);
            }
        }
    }

    /// The editor host's focused document changed.
    pub fn on_active_editor(&mut self, document: Option<ActiveDocument>) {
        self.active_document = document;
        let active = self.active_document.clone();

        for entry in self.entries.values_mut() {
            if let Some(handle) = entry.handle.as_mut() {
                handle.update_visibility(active.as_ref());
            }
        }
    }

    /// Number of tracked folders (live handles and tombstones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no folder is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-folder snapshots, sorted by folder path.
    #[must_use]
    pub fn snapshots(&self) -> Vec<FolderSnapshot> {
        let mut out: Vec<FolderSnapshot> = self
            .entries
            .iter()
            .map(|(key, entry)| {
                let handle = entry.handle.as_deref();
                FolderSnapshot {
                    folder: entry.root.display().to_string(),
                    key: key.as_str().to_string(),
                    active: handle.is_some(),
                    state: handle.map(|h| h.indicator().status().label().to_string()),
                    visible: handle.map(|h| h.indicator().is_visible()),
                    extensions: handle
                        .and_then(|h| h.indicator().extensions())
                        .map(<[String]>::to_vec)
                        .unwrap_or_default(),
                    channel: handle.map(|h| h.channel_path().display().to_string()),
                }
            })
            .collect();
        out.sort_by(|a, b| a.folder.cmp(&b.folder));
        out
    }

    /// The diagnostic sink path for a folder, if it has a live handle.
    #[must_use]
    pub fn reveal(&self, folder: &Path) -> Option<PathBuf> {
        let (key, _) = WorkspaceKey::for_folder(folder).ok()?;
        self.entries
            .get(&key)?
            .handle
            .as_deref()
            .map(|h| h.channel_path().to_path_buf())
    }

    /// Dispose every handle and clear the registry (deactivation).
    pub async fn dispose_all(&mut self) {
        for (_, mut entry) in self.entries.drain() {
            if let Some(handle) = entry.handle.as_mut() {
                handle.dispose().await;
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests use unwrap for clear failure messages"
)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        registry: ClientRegistry,
        _event_rx: mpsc::Receiver<ServiceEvent>,
        _channels: TempDir,
    }

    fn fixture() -> Fixture {
        let channels = tempdir().unwrap();
        let (event_tx, event_rx) = mpsc::channel(64);
        let registry = ClientRegistry::new(
            Config::default(),
            channels.path().to_path_buf(),
            event_tx,
            EventBroadcaster::noop().unwrap(),
        );
        Fixture {
            registry,
            _event_rx: event_rx,
            _channels: channels,
        }
    }

    #[tokio::test]
    async fn test_key_set_tracks_folder_set() {
        let mut fx = fixture();
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();

        let summary = fx
            .registry
            .reconcile(&[a.path().to_path_buf(), b.path().to_path_buf()])
            .await;
        assert_eq!(summary.declined, 2);
        assert_eq!(fx.registry.len(), 2);

        let summary = fx.registry.reconcile(&[a.path().to_path_buf()]).await;
        assert_eq!(summary.removed, 1);
        assert_eq!(fx.registry.len(), 1);

        let summary = fx.registry.reconcile(&[]).await;
        assert_eq!(summary.removed, 1);
        assert!(fx.registry.is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let mut fx = fixture();
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        let folders = vec![a.path().to_path_buf(), b.path().to_path_buf()];

        let first = fx.registry.reconcile(&folders).await;
        assert!(!first.is_noop());

        // Unchanged folder set: no constructions, no disposals.
        let second = fx.registry.reconcile(&folders).await;
        assert!(second.is_noop(), "second pass did work: {second:?}");
        assert_eq!(fx.registry.len(), 2);
    }

    #[tokio::test]
    async fn test_declined_folder_is_tombstoned_not_retried() {
        let mut fx = fixture();
        let a = tempdir().unwrap();
        let folders = vec![a.path().to_path_buf()];

        let first = fx.registry.reconcile(&folders).await;
        assert_eq!(first.declined, 1);

        // Revisiting the same key must not re-attempt activation...
        let second = fx.registry.reconcile(&folders).await;
        assert_eq!(second.declined, 0);

        // ...but removing and re-adding the folder does.
        fx.registry.reconcile(&[]).await;
        let third = fx.registry.reconcile(&folders).await;
        assert_eq!(third.declined, 1);
    }

    #[tokio::test]
    async fn test_failed_start_is_isolated_per_key() {
        let mut fx = fixture();
        // This folder has a config, so activation is attempted — and
        // fails, because the service executable does not exist.
        let bad = tempdir().unwrap();
        std::fs::write(bad.path().join(".gqlconfig"), "{ schema: {} }").unwrap();
        fx.registry.config.service.command = "/nonexistent/gql-language-server".to_string();

        let plain = tempdir().unwrap();

        let summary = fx
            .registry
            .reconcile(&[bad.path().to_path_buf(), plain.path().to_path_buf()])
            .await;

        // The failure did not abort the pass; both keys are tracked.
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.declined, 1);
        assert_eq!(fx.registry.len(), 2);

        let snapshots = fx.registry.snapshots();
        assert!(snapshots.iter().all(|s| !s.active));
    }

    #[tokio::test]
    async fn test_missing_folder_is_skipped() {
        let mut fx = fixture();
        let a = tempdir().unwrap();
        let ghost = a.path().join("does-not-exist");

        let summary = fx
            .registry
            .reconcile(&[a.path().to_path_buf(), ghost])
            .await;
        assert_eq!(fx.registry.len(), 1);
        assert_eq!(summary.declined, 1);
    }

    #[tokio::test]
    async fn test_duplicate_folders_collapse_to_one_key() {
        let mut fx = fixture();
        let a = tempdir().unwrap();
        let dotted = a.path().join(".");

        fx.registry
            .reconcile(&[a.path().to_path_buf(), dotted])
            .await;
        assert_eq!(fx.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshots_for_tombstones() {
        let mut fx = fixture();
        let a = tempdir().unwrap();
        fx.registry.reconcile(&[a.path().to_path_buf()]).await;

        let snapshots = fx.registry.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert!(!snapshots[0].active);
        assert!(snapshots[0].state.is_none());
        assert!(snapshots[0].extensions.is_empty());
    }

    #[tokio::test]
    async fn test_reveal_unknown_folder_is_none() {
        let fx = fixture();
        assert!(fx.registry.reveal(Path::new("/nope")).is_none());
    }

    #[tokio::test]
    async fn test_dispose_all_empties_registry() {
        let mut fx = fixture();
        let a = tempdir().unwrap();
        let b = tempdir().unwrap();
        fx.registry
            .reconcile(&[a.path().to_path_buf(), b.path().to_path_buf()])
            .await;

        fx.registry.dispose_all().await;
        assert!(fx.registry.is_empty());
    }
}
