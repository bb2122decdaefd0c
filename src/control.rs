// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Unix socket server for editor-host events.
//!
//! The editor side (a plugin hook, or the `pantograph roots`/`focus`/
//! `reveal` subcommands) connects to this socket and sends one JSON
//! request per connection: the current open-folder set, the focused
//! document, or a status/reveal query. Mutations are forwarded to the
//! supervisor loop over a command channel, so reconciliation stays
//! serialized on a single task.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::lsp::{FolderSnapshot, ReconcileSummary};
use crate::status::ActiveDocument;

/// A request from the editor host.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ControlRequest {
    /// The full set of currently open workspace folders.
    Roots {
        /// Folder root paths.
        paths: Vec<String>,
    },
    /// The active editor changed. `None` path means no editor focused.
    Focus {
        /// Absolute path of the focused document, if any.
        path: Option<String>,
    },
    /// Per-folder state snapshot.
    Status,
    /// The click affordance: where is this folder's diagnostic sink?
    Reveal {
        /// Folder root path.
        folder: String,
    },
    /// Stop the supervisor.
    Shutdown,
}

/// The reply written back to the editor host.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ControlResponse {
    /// Outcome of a `roots` reconciliation.
    Reconciled {
        /// What the pass did.
        summary: ReconcileSummary,
    },
    /// Focus change applied.
    Focused,
    /// Snapshot of every tracked folder.
    Status {
        /// One entry per folder, sorted by path.
        folders: Vec<FolderSnapshot>,
    },
    /// Sink location for a folder (absent for tombstones).
    Reveal {
        /// Path of the sink log, if the folder has a live handle.
        channel: Option<String>,
    },
    /// Shutdown acknowledged.
    ShuttingDown,
    /// The request could not be served.
    Error {
        /// What went wrong.
        message: String,
    },
}

/// A command forwarded to the supervisor loop.
#[derive(Debug)]
pub enum ControlCommand {
    /// Reconcile against this folder set.
    Roots {
        /// Folder root paths.
        paths: Vec<PathBuf>,
        /// Reply channel.
        reply: oneshot::Sender<ReconcileSummary>,
    },
    /// Active editor changed.
    Focus {
        /// The focused document, if any.
        document: Option<ActiveDocument>,
        /// Reply channel.
        reply: oneshot::Sender<()>,
    },
    /// Snapshot request.
    Status {
        /// Reply channel.
        reply: oneshot::Sender<Vec<FolderSnapshot>>,
    },
    /// Sink lookup.
    Reveal {
        /// Folder root path.
        folder: PathBuf,
        /// Reply channel.
        reply: oneshot::Sender<Option<PathBuf>>,
    },
    /// Stop the supervisor.
    Shutdown,
}

/// Listens on a Unix socket and forwards editor-host events to the
/// supervisor loop.
pub struct ControlServer {
    commands: mpsc::Sender<ControlCommand>,
}

impl ControlServer {
    /// Creates a new `ControlServer`.
    #[must_use]
    pub const fn new(commands: mpsc::Sender<ControlCommand>) -> Self {
        Self { commands }
    }

    /// Starts listening on the given Unix socket path.
    ///
    /// Spawns a background task that accepts connections and processes
    /// host events. Returns a `JoinHandle` for the listener task.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn start(self, socket_path: &Path) -> Result<tokio::task::JoinHandle<()>> {
        // Remove stale socket file if it exists
        let _ = std::fs::remove_file(socket_path);

        let listener = UnixListener::bind(socket_path).map_err(|e| {
            anyhow!(
                "Failed to bind control socket {}: {e}",
                socket_path.display()
            )
        })?;

        info!("Control socket listening on {}", socket_path.display());

        let server = Arc::new(self);

        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, _)) => {
                        let server = server.clone();
                        tokio::spawn(async move {
                            if let Err(e) = server.handle_connection(stream).await {
                                debug!("Control connection error: {e}");
                            }
                        });
                    }
                    Err(e) => {
                        warn!("Control socket accept error: {e}");
                    }
                }
            }
        });

        Ok(handle)
    }

    /// Handles a single connection: reads a JSON request, forwards it,
    /// and writes back the reply.
    async fn handle_connection(&self, stream: UnixStream) -> Result<()> {
        let (reader, mut writer) = stream.into_split();
        let mut buf_reader = BufReader::new(reader);
        let mut line = String::new();
        buf_reader.read_line(&mut line).await?;

        let response = match serde_json::from_str::<ControlRequest>(line.trim()) {
            Ok(request) => {
                debug!("Control: {request:?}");
                self.process(request).await
            }
            Err(e) => ControlResponse::Error {
                message: format!("Invalid request: {e}"),
            },
        };

        let json = serde_json::to_string(&response)?;
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.shutdown().await?;

        Ok(())
    }

    /// Forward one request to the supervisor loop and await its reply.
    async fn process(&self, request: ControlRequest) -> ControlResponse {
        match request {
            ControlRequest::Roots { paths } => {
                let (reply, rx) = oneshot::channel();
                let command = ControlCommand::Roots {
                    paths: paths.into_iter().map(PathBuf::from).collect(),
                    reply,
                };
                match self.dispatch(command, rx).await {
                    Ok(summary) => ControlResponse::Reconciled { summary },
                    Err(message) => ControlResponse::Error { message },
                }
            }
            ControlRequest::Focus { path } => {
                let (reply, rx) = oneshot::channel();
                let command = ControlCommand::Focus {
                    document: path.map(|p| ActiveDocument {
                        path: PathBuf::from(p),
                    }),
                    reply,
                };
                match self.dispatch(command, rx).await {
                    Ok(()) => ControlResponse::Focused,
                    Err(message) => ControlResponse::Error { message },
                }
            }
            ControlRequest::Status => {
                let (reply, rx) = oneshot::channel();
                match self.dispatch(ControlCommand::Status { reply }, rx).await {
                    Ok(folders) => ControlResponse::Status { folders },
                    Err(message) => ControlResponse::Error { message },
                }
            }
            ControlRequest::Reveal { folder } => {
                let (reply, rx) = oneshot::channel();
                let command = ControlCommand::Reveal {
                    folder: PathBuf::from(folder),
                    reply,
                };
                match self.dispatch(command, rx).await {
                    Ok(channel) => ControlResponse::Reveal {
                        channel: channel.map(|p| p.display().to_string()),
                    },
                    Err(message) => ControlResponse::Error { message },
                }
            }
            ControlRequest::Shutdown => {
                if self.commands.send(ControlCommand::Shutdown).await.is_err() {
                    ControlResponse::Error {
                        message: "supervisor is gone".to_string(),
                    }
                } else {
                    ControlResponse::ShuttingDown
                }
            }
        }
    }

    async fn dispatch<T>(
        &self,
        command: ControlCommand,
        rx: oneshot::Receiver<T>,
    ) -> std::result::Result<T, String> {
        if self.commands.send(command).await.is_err() {
            return Err("supervisor is gone".to_string());
        }
        rx.await.map_err(|_| "supervisor dropped reply".to_string())
    }
}

/// Send one request to a running session's control socket and return the
/// parsed reply. This is the editor-host side of the protocol.
///
/// # Errors
///
/// Returns an error if the socket is unreachable or the reply is not
/// valid JSON.
pub async fn send_request(socket_path: &Path, request: &ControlRequest) -> Result<ControlResponse> {
    let stream = UnixStream::connect(socket_path).await.map_err(|e| {
        anyhow!(
            "Failed to connect to control socket {}: {e}",
            socket_path.display()
        )
    })?;

    let (reader, mut writer) = stream.into_split();

    let json = serde_json::to_string(request)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.shutdown().await?;

    let mut buf_reader = BufReader::new(reader);
    let mut line = String::new();
    buf_reader.read_line(&mut line).await?;

    serde_json::from_str(line.trim()).map_err(|e| anyhow!("Invalid control reply: {e}"))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::panic,
    reason = "Tests use unwrap and panic for clear failure messages"
)]
mod tests {
    use super::*;

    #[test]
    fn test_request_roundtrip() {
        let request = ControlRequest::Roots {
            paths: vec!["/work/api".to_string()],
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""cmd":"roots""#));

        let parsed: ControlRequest = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, ControlRequest::Roots { paths } if paths.len() == 1));
    }

    #[test]
    fn test_focus_without_path() {
        let parsed: ControlRequest =
            serde_json::from_str(r#"{"cmd":"focus","path":null}"#).unwrap();
        assert!(matches!(parsed, ControlRequest::Focus { path: None }));
    }

    #[test]
    fn test_response_roundtrip() {
        let response = ControlResponse::Reconciled {
            summary: ReconcileSummary {
                started: 1,
                declined: 2,
                failed: 0,
                removed: 0,
            },
        };
        let json = serde_json::to_string(&response).unwrap();
        let parsed: ControlResponse = serde_json::from_str(&json).unwrap();
        match parsed {
            ControlResponse::Reconciled { summary } => {
                assert_eq!(summary.started, 1);
                assert_eq!(summary.declined, 2);
            }
            other => panic!("expected Reconciled, got {other:?}"),
        }
    }

    #[test]
    fn test_error_response_shape() {
        let json = serde_json::to_string(&ControlResponse::Error {
            message: "nope".to_string(),
        })
        .unwrap();
        assert!(json.contains(r#""result":"error""#));
    }

    #[tokio::test]
    async fn test_roots_command_reaches_supervisor() {
        let (tx, mut rx) = mpsc::channel(4);
        let server = ControlServer::new(tx);

        // Simulate the supervisor loop answering one command.
        let supervisor = tokio::spawn(async move {
            match rx.recv().await {
                Some(ControlCommand::Roots { paths, reply }) => {
                    assert_eq!(paths, vec![PathBuf::from("/work/api")]);
                    let _ = reply.send(ReconcileSummary {
                        started: 0,
                        declined: 1,
                        failed: 0,
                        removed: 0,
                    });
                }
                other => panic!("expected Roots, got {other:?}"),
            }
        });

        let response = server
            .process(ControlRequest::Roots {
                paths: vec!["/work/api".to_string()],
            })
            .await;

        supervisor.await.unwrap();
        assert!(
            matches!(response, ControlResponse::Reconciled { summary } if summary.declined == 1)
        );
    }

    #[tokio::test]
    async fn test_dead_supervisor_yields_error() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let server = ControlServer::new(tx);

        let response = server.process(ControlRequest::Status).await;
        assert!(matches!(response, ControlResponse::Error { .. }));
    }
}
