// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Shared identity and lifecycle types for the service subsystem.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

/// Stable identity of a workspace folder: its canonicalized root rendered
/// as a `file://` URL.
///
/// Keys are recomputed from the folder path on every reconciliation and
/// never mutated. Two paths that canonicalize to the same directory map
/// to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkspaceKey(String);

/// Failure to derive a [`WorkspaceKey`] from a folder path.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// The folder does not exist or cannot be canonicalized.
    #[error("cannot canonicalize workspace folder {path}: {source}")]
    Canonicalize {
        /// The offending path.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The canonical path cannot be expressed as a `file://` URL.
    #[error("cannot express {path} as a file URL")]
    NotFileUrl {
        /// The offending path.
        path: String,
    },
}

impl WorkspaceKey {
    /// Derive the key for a folder, canonicalizing first.
    ///
    /// Returns the key together with the canonical root path.
    ///
    /// # Errors
    ///
    /// Returns [`KeyError`] if the folder cannot be canonicalized or is
    /// not expressible as a `file://` URL.
    pub fn for_folder(root: &Path) -> Result<(Self, PathBuf), KeyError> {
        let canonical = root.canonicalize().map_err(|source| KeyError::Canonicalize {
            path: root.display().to_string(),
            source,
        })?;
        let url = Url::from_directory_path(&canonical).map_err(|()| KeyError::NotFileUrl {
            path: canonical.display().to_string(),
        })?;
        Ok((Self(url.into()), canonical))
    }

    /// The key as its URL string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkspaceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection state of one service link, mirrored from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientState {
    /// Process spawned, initialize handshake in flight.
    Starting,
    /// Handshake complete, service responding.
    Running,
    /// Process exited or the link broke.
    Stopped,
}

impl ClientState {
    /// Short lowercase label for logs and event payloads.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopped => "stopped",
        }
    }
}

/// An event emitted by a service link, tagged with its owning folder.
#[derive(Debug)]
pub struct ServiceEvent {
    /// Folder the event belongs to.
    pub key: WorkspaceKey,
    /// What happened.
    pub kind: ServiceEventKind,
}

/// The specific event payload.
#[derive(Debug)]
pub enum ServiceEventKind {
    /// The service sent `serverInitialized` with its extension list.
    Initialized {
        /// File extensions the service declared it handles.
        file_extensions: Vec<String>,
    },
    /// The service sent `serverExited` or closed its stdout.
    Exited,
    /// Transport-level state change.
    StateChanged(ClientState),
    /// Fresh diagnostics were published for a document.
    Diagnostics {
        /// Document path (already translated from the service URI).
        path: PathBuf,
        /// Number of diagnostics now attached to the document.
        count: usize,
    },
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests use unwrap for clear failure messages"
)]
mod tests {
    use super::*;

    #[test]
    fn test_key_for_folder_is_stable() {
        let dir = std::env::temp_dir();
        let (a, _) = WorkspaceKey::for_folder(&dir).unwrap();
        let (b, _) = WorkspaceKey::for_folder(&dir).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_is_file_url() {
        let dir = std::env::temp_dir();
        let (key, canonical) = WorkspaceKey::for_folder(&dir).unwrap();
        assert!(key.as_str().starts_with("file://"));
        assert!(canonical.is_absolute());
    }

    #[test]
    fn test_key_normalizes_trailing_component() {
        let dir = std::env::temp_dir();
        let dotted = dir.join(".");
        let (a, _) = WorkspaceKey::for_folder(&dir).unwrap();
        let (b, _) = WorkspaceKey::for_folder(&dotted).unwrap();
        assert_eq!(a, b, "canonicalization must collapse '.' components");
    }

    #[test]
    fn test_key_for_missing_folder_fails() {
        let missing = std::env::temp_dir().join("pantograph-definitely-missing-dir");
        assert!(WorkspaceKey::for_folder(&missing).is_err());
    }

    #[test]
    fn test_client_state_labels() {
        assert_eq!(ClientState::Starting.label(), "starting");
        assert_eq!(ClientState::Running.label(), "running");
        assert_eq!(ClientState::Stopped.label(), "stopped");
    }
}
