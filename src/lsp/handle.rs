// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! One folder's connection handle: service process, diagnostic sink, and
//! status indicator behind a single idempotent disposal.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::{self, ServiceConfig};
use crate::session::{EventBroadcaster, EventKind, OutputChannel};
use crate::status::{ActiveDocument, StatusIndicator};

use super::client::ServiceClient;
use super::state::{ServiceEvent, ServiceEventKind, WorkspaceKey};

/// Outcome of a construction attempt for one folder.
pub enum Activation {
    /// A fully wired handle.
    Active(Box<ConnectionHandle>),
    /// The folder opted out (no `.gqlconfig`). Valid, terminal, not an
    /// error.
    Declined {
        /// Why activation was declined.
        reason: String,
    },
    /// The service failed to start or rejected the handshake.
    Failed {
        /// What went wrong.
        error: String,
    },
}

/// An active language-service link for one workspace folder.
pub struct ConnectionHandle {
    key: WorkspaceKey,
    root: PathBuf,
    /// Taken on disposal; `None` afterwards.
    client: Option<ServiceClient>,
    channel: OutputChannel,
    indicator: StatusIndicator,
    disposed: bool,
}

impl ConnectionHandle {
    /// Attempt to construct a handle for one folder.
    ///
    /// Resources are acquired in a fixed order (sink, process, indicator)
    /// so [`dispose`](Self::dispose) can release them in reverse. A
    /// declined or failed attempt leaves nothing running: the probe
    /// happens before the spawn, and a failed handshake reaps the child
    /// before returning.
    pub async fn start(
        key: WorkspaceKey,
        root: PathBuf,
        service: &ServiceConfig,
        channels_dir: &Path,
        event_tx: mpsc::Sender<ServiceEvent>,
        broadcaster: EventBroadcaster,
    ) -> Activation {
        let folder_display = root.display().to_string();

        let mut channel = match OutputChannel::create(channels_dir, &folder_display) {
            Ok(channel) => channel,
            Err(e) => {
                // No sink to explain ourselves in; treat as a failed start.
                error!("Failed to create output channel for {folder_display}: {e:#}");
                return Activation::Failed {
                    error: format!("output channel: {e:#}"),
                };
            }
        };

        // Activation probe: folders without a readable .gqlconfig are
        // GraphQL-free and never get a process.
        if let Err(probe) = config::find_gql_config(&root) {
            let reason = probe.to_string();
            channel.append(&format!(
                "Not activating language-server for workspace folder '{folder_display}'."
            ));
            channel.append(&format!("Reason: {reason}"));
            channel.dispose();

            info!("Declined activation for {folder_display}: {reason}");
            broadcaster.send(EventKind::Declined {
                folder: folder_display,
                reason: reason.clone(),
            });
            return Activation::Declined { reason };
        }

        let args = service.launch_args(&root);
        channel.append(&format!(
            "Starting language service: {} {}",
            service.command,
            args.join(" ")
        ));

        let mut client = match ServiceClient::spawn(key.clone(), &service.command, &args, event_tx)
        {
            Ok(client) => client,
            Err(e) => {
                return Self::fail_start(&mut channel, &broadcaster, &folder_display, &e);
            }
        };

        if let Err(e) = client.initialize(&root).await {
            // Dispose-mid-initialization: reap the child before reporting.
            client.shutdown().await;
            return Self::fail_start(&mut channel, &broadcaster, &folder_display, &e);
        }

        let indicator = StatusIndicator::new(
            root.clone(),
            channel.path().to_path_buf(),
            broadcaster.clone(),
        );

        Activation::Active(Box::new(Self {
            key,
            root,
            client: Some(client),
            channel,
            indicator,
            disposed: false,
        }))
    }

    /// Shared failure path: sink detail plus the user-visible message.
    /// Retries are suppressed until the folder is closed and reopened.
    fn fail_start(
        channel: &mut OutputChannel,
        broadcaster: &EventBroadcaster,
        folder_display: &str,
        e: &anyhow::Error,
    ) -> Activation {
        let message = format!(
            "GraphQL language service couldn't start for workspace '{folder_display}'. \
             See output channel '{folder_display}' for more details."
        );
        channel.append(&format!("Server initialization failed: {e:#}"));
        channel.dispose();

        error!("Initialization failed for {folder_display}: {e:#}");
        broadcaster.send(EventKind::ErrorMessage {
            folder: folder_display.to_string(),
            message,
        });
        Activation::Failed {
            error: format!("{e:#}"),
        }
    }

    /// The owning folder's key.
    #[must_use]
    pub const fn key(&self) -> &WorkspaceKey {
        &self.key
    }

    /// The owning folder's canonical root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The folder's status indicator.
    #[must_use]
    pub const fn indicator(&self) -> &StatusIndicator {
        &self.indicator
    }

    /// Path of the diagnostic sink (the click-to-reveal target).
    #[must_use]
    pub fn channel_path(&self) -> &Path {
        self.channel.path()
    }

    /// Whether this handle has been disposed.
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Route one service event into the indicator and the sink.
    pub async fn on_event(&mut self, event: ServiceEvent) {
        debug_assert_eq!(event.key, self.key);

        match event.kind {
            ServiceEventKind::Initialized { file_extensions } => {
                self.channel.append(&format!(
                    "Language service initialized (extensions: {}).",
                    file_extensions.join(", ")
                ));
                self.indicator.set_initialized(file_extensions);
            }
            ServiceEventKind::Exited => {
                self.channel.append("Language service exited.");
                self.indicator.set_exited();
            }
            ServiceEventKind::StateChanged(state) => {
                self.indicator.on_state_change(state);
            }
            ServiceEventKind::Diagnostics { path, count } => {
                self.append_diagnostics(&path, count).await;
            }
        }
    }

    /// Write published diagnostics to the sink in editor coordinates
    /// (1-indexed lines and columns).
    async fn append_diagnostics(&mut self, path: &Path, count: usize) {
        if count == 0 {
            self.channel
                .append(&format!("{}: diagnostics cleared", path.display()));
            return;
        }

        let diagnostics = match &self.client {
            Some(client) => client.diagnostics_for(path).await,
            None => return,
        };

        self.channel.append(&format!(
            "{} ({} diagnostic{}):",
            path.display(),
            count,
            if count == 1 { "" } else { "s" }
        ));
        self.channel.append(&format_diagnostics_compact(&diagnostics));
    }

    /// Recompute indicator visibility against the active document.
    pub fn update_visibility(&mut self, active: Option<&ActiveDocument>) {
        self.indicator.update_visibility(active);
    }

    /// Release everything: indicator, service process, sink — in reverse
    /// order of acquisition. Safe to call more than once; the second
    /// call performs no observable action.
    pub async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        self.indicator.dispose();

        if let Some(client) = self.client.take() {
            if client.is_alive() {
                info!("Shutting down language service for {}", self.root.display());
            } else {
                warn!(
                    "Language service for {} already gone at disposal",
                    self.root.display()
                );
            }
            client.shutdown().await;
        }

        self.channel.append("Connection disposed.");
        self.channel.dispose();
    }
}

/// Formats diagnostics with line/column and severity.
pub(crate) fn format_diagnostics_compact(diagnostics: &[lsp_types::Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| {
            let severity = match d.severity {
                Some(lsp_types::DiagnosticSeverity::ERROR) => "error",
                Some(lsp_types::DiagnosticSeverity::WARNING) => "warning",
                Some(lsp_types::DiagnosticSeverity::INFORMATION) => "info",
                Some(lsp_types::DiagnosticSeverity::HINT) => "hint",
                _ => "unknown",
            };
            let line = d.range.start.line + 1;
            let col = d.range.start.character + 1;
            let source = d.source.as_deref().unwrap_or("graphql");
            let code = d
                .code
                .as_ref()
                .map(|c| match c {
                    lsp_types::NumberOrString::Number(n) => n.to_string(),
                    lsp_types::NumberOrString::String(s) => s.clone(),
                })
                .unwrap_or_default();

            if code.is_empty() {
                format!("  {line}:{col} [{severity}] {source}: {}", d.message)
            } else {
                format!("  {line}:{col} [{severity}] {source}({code}): {}", d.message)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    reason = "Tests use unwrap and panic for clear failure messages"
)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;
    use tempfile::tempdir;

    fn test_service(command: &str) -> ServiceConfig {
        ServiceConfig {
            command: command.to_string(),
            ..ServiceConfig::default()
        }
    }

    #[tokio::test]
    async fn test_folder_without_config_is_declined() {
        let folder = tempdir().unwrap();
        let channels = tempdir().unwrap();
        let (key, root) = WorkspaceKey::for_folder(folder.path()).unwrap();
        let (event_tx, mut event_rx) = tokio::sync::mpsc::channel(8);

        let activation = ConnectionHandle::start(
            key,
            root,
            // A command that must never run; decline happens first.
            &test_service("/nonexistent/gql-language-server"),
            channels.path(),
            event_tx,
            EventBroadcaster::noop().unwrap(),
        )
        .await;

        match activation {
            Activation::Declined { reason } => {
                assert!(reason.contains(".gqlconfig"), "unexpected reason: {reason}");
            }
            Activation::Active(_) => panic!("expected Declined, got Active"),
            Activation::Failed { error } => panic!("expected Declined, got Failed: {error}"),
        }

        // The process was never started, so no service events exist.
        assert!(event_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_declined_reason_reaches_the_sink() {
        let folder = tempdir().unwrap();
        let channels = tempdir().unwrap();
        let (key, root) = WorkspaceKey::for_folder(folder.path()).unwrap();
        let (event_tx, _event_rx) = tokio::sync::mpsc::channel(8);

        let _ = ConnectionHandle::start(
            key,
            root,
            &test_service("/nonexistent/gql-language-server"),
            channels.path(),
            event_tx,
            EventBroadcaster::noop().unwrap(),
        )
        .await;

        let mut logs = std::fs::read_dir(channels.path()).unwrap();
        let log_path = logs.next().unwrap().unwrap().path();
        let contents = std::fs::read_to_string(log_path).unwrap();
        assert!(contents.contains("Not activating language-server"));
        assert!(contents.contains(".gqlconfig"));
    }

    #[tokio::test]
    async fn test_missing_executable_is_failed_not_declined() {
        let folder = tempdir().unwrap();
        std::fs::write(folder.path().join(".gqlconfig"), "{ schema: {} }").unwrap();
        let channels = tempdir().unwrap();
        let (key, root) = WorkspaceKey::for_folder(folder.path()).unwrap();
        let (event_tx, _event_rx) = tokio::sync::mpsc::channel(8);

        let activation = ConnectionHandle::start(
            key,
            root,
            &test_service("/nonexistent/gql-language-server"),
            channels.path(),
            event_tx,
            EventBroadcaster::noop().unwrap(),
        )
        .await;

        assert!(matches!(activation, Activation::Failed { .. }));
    }

    #[test]
    fn test_format_diagnostics_compact() {
        let diag = lsp_types::Diagnostic {
            range: lsp_types::Range {
                start: lsp_types::Position {
                    line: 4,
                    character: 2,
                },
                end: lsp_types::Position {
                    line: 4,
                    character: 9,
                },
            },
            severity: Some(lsp_types::DiagnosticSeverity::ERROR),
            source: Some("graphql".to_string()),
            message: "Unknown type 'Userr'".to_string(),
            ..Default::default()
        };

        // 0-indexed internally, 1-indexed for display
        assert_eq!(
            format_diagnostics_compact(&[diag]),
            "  5:3 [error] graphql: Unknown type 'Userr'"
        );
    }

    #[test]
    fn test_format_diagnostics_with_code() {
        let diag = lsp_types::Diagnostic {
            range: lsp_types::Range::default(),
            severity: Some(lsp_types::DiagnosticSeverity::WARNING),
            code: Some(lsp_types::NumberOrString::String("syntax".to_string())),
            message: "trailing comma".to_string(),
            ..Default::default()
        };

        assert_eq!(
            format_diagnostics_compact(&[diag]),
            "  1:1 [warning] graphql(syntax): trailing comma"
        );
    }
}
