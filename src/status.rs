// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Per-folder status indicator.
//!
//! A state-to-presentation mapper with three live states (initializing,
//! running, errored) plus the terminal disposed state. The indicator
//! mirrors connection health into session events and decides its own
//! visibility from the active editor document; it holds no other logic.

use std::path::{Path, PathBuf};

use crate::lsp::ClientState;
use crate::session::{EventBroadcaster, EventKind};

/// Lifecycle state shown by the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorStatus {
    /// Service spawned, waiting for `serverInitialized`.
    Initializing,
    /// Service initialized and responding.
    Running,
    /// Service exited or reported a bad state.
    Errored,
    /// Owning handle was disposed. Terminal.
    Disposed,
}

impl IndicatorStatus {
    /// Short lowercase label used in events and logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Running => "running",
            Self::Errored => "errored",
            Self::Disposed => "disposed",
        }
    }
}

/// How a status renders: codicon name, theme color, and tooltip.
///
/// Kept in the editor host's vocabulary so a front end can map it
/// straight onto a status-bar item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
    /// Icon name.
    pub icon: &'static str,
    /// Theme color identifier.
    pub color: &'static str,
    /// Hover text.
    pub tooltip: &'static str,
}

const PRESENTATION_INIT: Presentation = Presentation {
    icon: "sync",
    color: "progressBar.background",
    tooltip: "GraphQL language service is initializing.",
};

const PRESENTATION_OK: Presentation = Presentation {
    icon: "plug",
    color: "statusBar.foreground",
    tooltip: "GraphQL language service is running.",
};

const PRESENTATION_ERROR: Presentation = Presentation {
    icon: "stop",
    color: "editorError.foreground",
    tooltip: "GraphQL language service is not running.",
};

/// The document currently focused in the editor host.
#[derive(Debug, Clone)]
pub struct ActiveDocument {
    /// Absolute path of the document.
    pub path: PathBuf,
}

/// Status indicator for one workspace folder's connection.
pub struct StatusIndicator {
    folder_root: PathBuf,
    folder_display: String,
    status: IndicatorStatus,
    /// Extensions declared in `serverInitialized`; `None` until then.
    extensions: Option<Vec<String>>,
    visible: bool,
    channel_path: PathBuf,
    broadcaster: EventBroadcaster,
}

impl StatusIndicator {
    /// Create an indicator in the initializing state, hidden.
    #[must_use]
    pub fn new(folder_root: PathBuf, channel_path: PathBuf, broadcaster: EventBroadcaster) -> Self {
        let folder_display = folder_root.display().to_string();
        let indicator = Self {
            folder_root,
            folder_display,
            status: IndicatorStatus::Initializing,
            extensions: None,
            visible: false,
            channel_path,
            broadcaster,
        };
        indicator.broadcast_status();
        indicator
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> IndicatorStatus {
        self.status
    }

    /// Whether the indicator is currently shown.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// The cached extension list, once the service declared it.
    #[must_use]
    pub fn extensions(&self) -> Option<&[String]> {
        self.extensions.as_deref()
    }

    /// Presentation for the current status.
    ///
    /// Disposed indicators keep the error presentation; they are never
    /// shown anyway.
    #[must_use]
    pub const fn presentation(&self) -> Presentation {
        match self.status {
            IndicatorStatus::Initializing => PRESENTATION_INIT,
            IndicatorStatus::Running => PRESENTATION_OK,
            IndicatorStatus::Errored | IndicatorStatus::Disposed => PRESENTATION_ERROR,
        }
    }

    /// The click affordance: the path of the folder's diagnostic sink.
    #[must_use]
    pub fn reveal(&self) -> &Path {
        &self.channel_path
    }

    /// `serverInitialized` arrived — cache the declared extensions and
    /// go running.
    pub fn set_initialized(&mut self, file_extensions: Vec<String>) {
        if self.status == IndicatorStatus::Disposed {
            return;
        }
        self.extensions = Some(file_extensions);
        self.transition(IndicatorStatus::Running);
    }

    /// `serverExited` arrived — the service is gone.
    pub fn set_exited(&mut self) {
        if self.status == IndicatorStatus::Disposed {
            return;
        }
        self.transition(IndicatorStatus::Errored);
    }

    /// Transport state change: running keeps/restores the ok state, any
    /// other state is an error. May oscillate while the process restarts.
    pub fn on_state_change(&mut self, state: ClientState) {
        if self.status == IndicatorStatus::Disposed {
            return;
        }
        match state {
            ClientState::Running => self.transition(IndicatorStatus::Running),
            ClientState::Starting => {}
            ClientState::Stopped => self.transition(IndicatorStatus::Errored),
        }
    }

    /// Recompute visibility against the active editor document.
    ///
    /// Shown when the document lives inside the owning folder and — once
    /// the extension list is known — its extension is in that list. While
    /// still initializing, any document inside the folder shows the
    /// indicator. Hidden otherwise, and always hidden once disposed.
    pub fn update_visibility(&mut self, active: Option<&ActiveDocument>) {
        let mut hide = true;

        if self.status != IndicatorStatus::Disposed
            && let Some(doc) = active
            && doc.path.starts_with(&self.folder_root)
        {
            hide = match &self.extensions {
                Some(extensions) => !matches_extension(&doc.path, extensions),
                // While the service is initializing, show for all
                // documents inside the workspace folder.
                None => false,
            };
        }

        let show = !hide;
        if show != self.visible {
            self.visible = show;
            self.broadcaster.send(EventKind::Indicator {
                folder: self.folder_display.clone(),
                visible: show,
            });
        }
    }

    /// Dispose the indicator: hide it and enter the terminal state.
    /// Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.status == IndicatorStatus::Disposed {
            return;
        }
        self.update_visibility(None);
        self.transition(IndicatorStatus::Disposed);
    }

    fn transition(&mut self, next: IndicatorStatus) {
        if self.status == next {
            return;
        }
        self.status = next;
        self.broadcast_status();
    }

    fn broadcast_status(&self) {
        self.broadcaster.send(EventKind::ServerState {
            folder: self.folder_display.clone(),
            state: self.status.label().to_string(),
        });
    }
}

/// Case-insensitive extension membership test — the effective semantics
/// of a `**/*.{a,b}` document selector.
fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests use unwrap for clear failure messages"
)]
mod tests {
    use super::*;

    fn indicator(root: &str) -> StatusIndicator {
        StatusIndicator::new(
            PathBuf::from(root),
            PathBuf::from("/tmp/chan.log"),
            EventBroadcaster::noop().unwrap(),
        )
    }

    fn doc(path: &str) -> ActiveDocument {
        ActiveDocument {
            path: PathBuf::from(path),
        }
    }

    #[test]
    fn test_starts_initializing_and_hidden() {
        let ind = indicator("/work/api");
        assert_eq!(ind.status(), IndicatorStatus::Initializing);
        assert!(!ind.is_visible());
        assert!(ind.extensions().is_none());
    }

    #[test]
    fn test_initialized_transitions_to_running() {
        let mut ind = indicator("/work/api");
        ind.set_initialized(vec!["graphql".to_string(), "gql".to_string()]);
        assert_eq!(ind.status(), IndicatorStatus::Running);
        assert_eq!(ind.extensions().unwrap().len(), 2);
        assert_eq!(ind.presentation().icon, "plug");
    }

    #[test]
    fn test_exited_transitions_to_errored() {
        let mut ind = indicator("/work/api");
        ind.set_initialized(vec!["graphql".to_string()]);
        ind.set_exited();
        assert_eq!(ind.status(), IndicatorStatus::Errored);
        assert_eq!(ind.presentation().icon, "stop");
    }

    #[test]
    fn test_state_change_oscillation() {
        let mut ind = indicator("/work/api");
        ind.set_initialized(vec!["graphql".to_string()]);

        ind.on_state_change(ClientState::Stopped);
        assert_eq!(ind.status(), IndicatorStatus::Errored);

        // Process restarted by its own supervision
        ind.on_state_change(ClientState::Running);
        assert_eq!(ind.status(), IndicatorStatus::Running);
    }

    #[test]
    fn test_starting_state_change_is_not_an_error() {
        let mut ind = indicator("/work/api");
        ind.on_state_change(ClientState::Starting);
        assert_eq!(ind.status(), IndicatorStatus::Initializing);
    }

    #[test]
    fn test_visible_for_matching_document() {
        let mut ind = indicator("/work/api");
        ind.set_initialized(vec!["graphql".to_string()]);

        ind.update_visibility(Some(&doc("/work/api/src/schema.graphql")));
        assert!(ind.is_visible());

        ind.update_visibility(Some(&doc("/work/api/src/main.rs")));
        assert!(!ind.is_visible());
    }

    #[test]
    fn test_hidden_for_document_outside_folder() {
        let mut ind = indicator("/work/api");
        ind.set_initialized(vec!["graphql".to_string()]);

        ind.update_visibility(Some(&doc("/elsewhere/schema.graphql")));
        assert!(!ind.is_visible());

        ind.update_visibility(None);
        assert!(!ind.is_visible());
    }

    #[test]
    fn test_visible_for_any_folder_document_while_initializing() {
        let mut ind = indicator("/work/api");
        ind.update_visibility(Some(&doc("/work/api/README.md")));
        assert!(ind.is_visible());
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let mut ind = indicator("/work/api");
        ind.set_initialized(vec!["graphql".to_string()]);
        ind.update_visibility(Some(&doc("/work/api/Schema.GraphQL")));
        assert!(ind.is_visible());
    }

    #[test]
    fn test_dispose_is_terminal_and_idempotent() {
        let mut ind = indicator("/work/api");
        ind.set_initialized(vec!["graphql".to_string()]);
        ind.update_visibility(Some(&doc("/work/api/a.graphql")));
        assert!(ind.is_visible());

        ind.dispose();
        assert_eq!(ind.status(), IndicatorStatus::Disposed);
        assert!(!ind.is_visible());

        // Terminal: no transition revives a disposed indicator
        ind.set_initialized(vec!["graphql".to_string()]);
        ind.set_exited();
        ind.on_state_change(ClientState::Running);
        ind.update_visibility(Some(&doc("/work/api/a.graphql")));
        assert_eq!(ind.status(), IndicatorStatus::Disposed);
        assert!(!ind.is_visible());

        ind.dispose();
        assert_eq!(ind.status(), IndicatorStatus::Disposed);
    }

    #[test]
    fn test_reveal_returns_channel_path() {
        let ind = indicator("/work/api");
        assert_eq!(ind.reveal(), Path::new("/tmp/chan.log"));
    }
}
