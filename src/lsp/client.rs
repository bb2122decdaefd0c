// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Low-level client for one GraphQL language-service process.
//!
//! Spawns the service over stdio, runs the LSP `initialize` handshake,
//! and routes incoming traffic: responses to pending requests, the
//! service's custom lifecycle notifications to [`ServiceEvent`]s, and
//! published diagnostics into a per-document cache (translated from the
//! service's URI space into editor-side paths).

use anyhow::{Context, Result, anyhow};
use bytes::BytesMut;
use lsp_types::{ClientCapabilities, InitializeParams, InitializeResult, WorkspaceFolder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, error, trace, warn};

use super::protocol::{
    self, NotificationMessage, RequestId, RequestMessage, ResponseMessage, ServerInitializedParams,
};
use super::state::{ClientState, ServiceEvent, ServiceEventKind, WorkspaceKey};

/// Cached diagnostics per document, keyed by translated path.
pub type DiagnosticsCache = Arc<Mutex<HashMap<PathBuf, Vec<lsp_types::Diagnostic>>>>;

/// Default timeout for requests, including the initialize handshake.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to wait for the process to exit after `shutdown`/`exit`.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Manages communication with one language-service process.
pub struct ServiceClient {
    key: WorkspaceKey,
    next_id: AtomicI64,
    stdin: Arc<Mutex<ChildStdin>>,
    pending: Arc<Mutex<HashMap<RequestId, oneshot::Sender<ResponseMessage>>>>,
    diagnostics: DiagnosticsCache,
    alive: Arc<AtomicBool>,
    reader_handle: tokio::task::JoinHandle<()>,
    child: Child,
}

impl ServiceClient {
    /// Spawns the service process and starts the response reader task.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or its stdio
    /// pipes cannot be captured.
    pub fn spawn(
        key: WorkspaceKey,
        program: &str,
        args: &[String],
        event_tx: mpsc::Sender<ServiceEvent>,
    ) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn language service: {program}"))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("stdout not captured"))?;

        let stdin = Arc::new(Mutex::new(stdin));
        let pending: Arc<Mutex<HashMap<RequestId, oneshot::Sender<ResponseMessage>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let diagnostics: DiagnosticsCache = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));

        let reader_handle = tokio::spawn(Self::reader_task(
            key.clone(),
            stdin.clone(),
            stdout,
            pending.clone(),
            diagnostics.clone(),
            alive.clone(),
            event_tx,
        ));

        Ok(Self {
            key,
            next_id: AtomicI64::new(1),
            stdin,
            pending,
            diagnostics,
            alive,
            reader_handle,
            child,
        })
    }

    /// Background task that reads service messages and routes them.
    #[allow(
        clippy::too_many_lines,
        reason = "Message routing handles every frame shape in one place"
    )]
    async fn reader_task(
        key: WorkspaceKey,
        stdin: Arc<Mutex<ChildStdin>>,
        stdout: ChildStdout,
        pending: Arc<Mutex<HashMap<RequestId, oneshot::Sender<ResponseMessage>>>>,
        diagnostics: DiagnosticsCache,
        alive: Arc<AtomicBool>,
        event_tx: mpsc::Sender<ServiceEvent>,
    ) {
        let mut reader = BufReader::new(stdout);
        let mut buffer = BytesMut::with_capacity(8192);

        loop {
            // Read more data into buffer
            let mut temp = [0u8; 4096];
            match reader.read(&mut temp).await {
                Ok(0) => {
                    debug!("service stdout closed for {}", key);
                    break;
                }
                Ok(n) => {
                    buffer.extend_from_slice(&temp[..n]);
                }
                Err(e) => {
                    error!("Error reading from service stdout: {}", e);
                    break;
                }
            }

            // Try to parse complete messages
            while let Ok(Some(message_str)) = protocol::try_parse_message(&mut buffer) {
                trace!("Received service message: {}", message_str);

                let value: serde_json::Value = match serde_json::from_str(&message_str) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!("Failed to parse JSON: {}", e);
                        continue;
                    }
                };

                if let Some(method) = value.get("method").and_then(|m| m.as_str()) {
                    if let Some(id) = value.get("id") {
                        // Server request (e.g., workspace/configuration).
                        // Reply with MethodNotFound to unblock the server.
                        debug!("Received server request: {} (id: {})", method, id);

                        let response = ResponseMessage {
                            jsonrpc: "2.0".to_string(),
                            id: Some(
                                serde_json::from_value(id.clone()).unwrap_or(RequestId::Number(0)),
                            ),
                            result: None,
                            error: Some(protocol::ResponseError {
                                code: -32601, // MethodNotFound
                                message: format!("Method '{method}' not supported by client"),
                                data: None,
                            }),
                        };

                        if let Ok(body) = serde_json::to_string(&response) {
                            let header = format!("Content-Length: {}\r\n\r\n", body.len());
                            let mut stdin_guard = stdin.lock().await;
                            if let Err(e) = stdin_guard.write_all(header.as_bytes()).await {
                                warn!("Failed to write response header: {}", e);
                            } else if let Err(e) = stdin_guard.write_all(body.as_bytes()).await {
                                warn!("Failed to write response body: {}", e);
                            } else if let Err(e) = stdin_guard.flush().await {
                                warn!("Failed to flush response: {}", e);
                            }
                        }
                    } else if let Ok(notification) =
                        serde_json::from_value::<NotificationMessage>(value)
                    {
                        Self::handle_notification(&key, &notification, &diagnostics, &event_tx)
                            .await;
                    }
                } else if value.get("id").is_some() {
                    // Response
                    if let Ok(response) = serde_json::from_value::<ResponseMessage>(value) {
                        if let Some(id) = &response.id {
                            let mut pending = pending.lock().await;
                            if let Some(sender) = pending.remove(id) {
                                let _ = sender.send(response);
                            } else {
                                warn!("Received response for unknown request id: {:?}", id);
                            }
                        }
                    }
                } else {
                    warn!("Unknown message format: {}", message_str);
                }
            }
        }

        // Mark the link dead and surface it as a state change; the
        // indicator decides whether that is worth showing.
        alive.store(false, Ordering::SeqCst);
        let _ = event_tx
            .send(ServiceEvent {
                key: key.clone(),
                kind: ServiceEventKind::StateChanged(ClientState::Stopped),
            })
            .await;
        debug!("service reader task exiting for {}", key);
    }

    /// Handles incoming service notifications.
    async fn handle_notification(
        key: &WorkspaceKey,
        notification: &NotificationMessage,
        diagnostics: &DiagnosticsCache,
        event_tx: &mpsc::Sender<ServiceEvent>,
    ) {
        match notification.method.as_str() {
            protocol::SERVER_INITIALIZED => {
                let params: ServerInitializedParams =
                    serde_json::from_value(notification.params.clone()).unwrap_or_default();
                let _ = event_tx
                    .send(ServiceEvent {
                        key: key.clone(),
                        kind: ServiceEventKind::Initialized {
                            file_extensions: params.file_extensions,
                        },
                    })
                    .await;
            }
            protocol::SERVER_EXITED => {
                let _ = event_tx
                    .send(ServiceEvent {
                        key: key.clone(),
                        kind: ServiceEventKind::Exited,
                    })
                    .await;
            }
            "textDocument/publishDiagnostics" => {
                if let Ok(params) = serde_json::from_value::<lsp_types::PublishDiagnosticsParams>(
                    notification.params.clone(),
                ) {
                    let Some(path) = uri_to_path(params.uri.as_str()) else {
                        warn!("Ignoring diagnostics for non-file URI: {:?}", params.uri);
                        return;
                    };
                    let count = params.diagnostics.len();
                    {
                        let mut cache = diagnostics.lock().await;
                        if params.diagnostics.is_empty() {
                            cache.remove(&path);
                        } else {
                            cache.insert(path.clone(), params.diagnostics);
                        }
                    }
                    let _ = event_tx
                        .send(ServiceEvent {
                            key: key.clone(),
                            kind: ServiceEventKind::Diagnostics { path, count },
                        })
                        .await;
                } else {
                    warn!("Failed to parse publishDiagnostics params");
                }
            }
            "window/logMessage" | "window/showMessage" => {
                if let Some(message) = notification.params.get("message").and_then(|m| m.as_str()) {
                    debug!("service message: {}", message);
                }
            }
            _ => {
                trace!(
                    "Ignoring notification: {} params={}",
                    notification.method, notification.params
                );
            }
        }
    }

    /// Sends a request and waits for the response with timeout.
    async fn request<P: serde::Serialize, R: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: P,
    ) -> Result<R> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst));

        let request = RequestMessage {
            jsonrpc: "2.0".to_string(),
            id: id.clone(),
            method: method.to_string(),
            params: serde_json::to_value(params)?,
        };

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id.clone(), tx);
        }

        self.send_message(&request).await?;

        // Wait for response with timeout
        let response = match tokio::time::timeout(REQUEST_TIMEOUT, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                // Channel closed - service died
                return Err(anyhow!("language service closed connection"));
            }
            Err(_) => {
                // Timeout - clean up pending request
                let mut pending = self.pending.lock().await;
                pending.remove(&id);
                return Err(anyhow!(
                    "service request '{}' timed out after {:?}",
                    method,
                    REQUEST_TIMEOUT
                ));
            }
        };

        if let Some(error) = response.error {
            return Err(anyhow!("service error {}: {}", error.code, error.message));
        }

        // Handle null/missing result - use JSON null as default
        let result = response.result.unwrap_or(serde_json::Value::Null);

        serde_json::from_value(result).context("Failed to parse service response")
    }

    /// Sends a notification (no response expected).
    async fn notify<P: serde::Serialize>(&self, method: &str, params: P) -> Result<()> {
        let notification = NotificationMessage {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params: serde_json::to_value(params)?,
        };

        self.send_message(&notification).await
    }

    /// Sends a JSON-RPC message with Content-Length header.
    async fn send_message<T: serde::Serialize>(&self, message: &T) -> Result<()> {
        let body = serde_json::to_string(message)?;
        let header = format!("Content-Length: {}\r\n\r\n", body.len());

        trace!("Sending service message: {}", body);

        let mut stdin = self.stdin.lock().await;
        stdin.write_all(header.as_bytes()).await?;
        stdin.write_all(body.as_bytes()).await?;
        stdin.flush().await?;

        Ok(())
    }

    /// Performs the LSP initialize handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is not expressible as a URI, the
    /// request times out, or the service rejects initialization.
    pub async fn initialize(&mut self, root: &Path) -> Result<InitializeResult> {
        let root_url = url::Url::from_directory_path(root)
            .map_err(|()| anyhow!("Invalid root path {:?}", root))?;
        let root_uri: lsp_types::Uri = root_url
            .as_str()
            .parse()
            .map_err(|e| anyhow!("Invalid root URI: {e}"))?;

        let params = InitializeParams {
            process_id: Some(std::process::id()),
            capabilities: ClientCapabilities::default(),
            // The service resolves watch patterns relative to the folder.
            initialization_options: Some(serde_json::json!({ "relativePattern": true })),
            workspace_folders: Some(vec![WorkspaceFolder {
                uri: root_uri,
                name: root
                    .file_name()
                    .map_or_else(|| "workspace".to_string(), |s| s.to_string_lossy().to_string()),
            }]),
            ..Default::default()
        };

        let result: InitializeResult = self.request("initialize", params).await?;

        self.notify("initialized", lsp_types::InitializedParams {})
            .await?;

        Ok(result)
    }

    /// The folder this client belongs to.
    #[must_use]
    pub const fn key(&self) -> &WorkspaceKey {
        &self.key
    }

    /// Cached diagnostics for a document, if any.
    pub async fn diagnostics_for(&self, path: &Path) -> Vec<lsp_types::Diagnostic> {
        let cache = self.diagnostics.lock().await;
        cache.get(path).cloned().unwrap_or_default()
    }

    /// Returns true if the service connection is still alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Gracefully shut down the service and reap the process. Consumes
    /// self; a second shutdown is impossible by construction.
    pub async fn shutdown(mut self) {
        if self.is_alive() {
            // shutdown response varies by server (null, true, etc.) - ignore result
            let _: Result<serde_json::Value> =
                self.request("shutdown", serde_json::Value::Null).await;
            let _ = self.notify("exit", serde_json::Value::Null).await;
        }

        if tokio::time::timeout(SHUTDOWN_GRACE, self.child.wait())
            .await
            .is_err()
        {
            debug!("service for {} didn't exit in time, killing", self.key);
            let _ = self.child.kill().await;
        }

        self.reader_handle.abort();
    }
}

/// Translate a service-side file URI into an editor-side path.
fn uri_to_path(uri: &str) -> Option<PathBuf> {
    url::Url::parse(uri).ok().and_then(|u| u.to_file_path().ok())
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
    fn test_uri_to_path_file_scheme() {
        assert_eq!(
            uri_to_path("file:///work/api/schema.graphql"),
            Some(PathBuf::from("/work/api/schema.graphql"))
        );
    }

    #[test]
    fn test_uri_to_path_rejects_other_schemes() {
        assert!(uri_to_path("https://example.com/schema.graphql").is_none());
        assert!(uri_to_path("not a uri").is_none());
    }

    #[tokio::test]
    async fn test_notification_routing_initialized() {
        let dir = std::env::temp_dir();
        let (key, _) = WorkspaceKey::for_folder(&dir).unwrap();
        let diagnostics: DiagnosticsCache = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, mut event_rx) = mpsc::channel(8);

        let notification = NotificationMessage {
            jsonrpc: "2.0".to_string(),
            method: protocol::SERVER_INITIALIZED.to_string(),
            params: serde_json::json!({ "fileExtensions": ["graphql", "gql"] }),
        };

        ServiceClient::handle_notification(&key, &notification, &diagnostics, &event_tx).await;

        let event = event_rx.try_recv().unwrap();
        assert_eq!(event.key, key);
        match event.kind {
            ServiceEventKind::Initialized { file_extensions } => {
                assert_eq!(file_extensions, vec!["graphql", "gql"]);
            }
            other => panic!("expected Initialized, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_notification_routing_exited() {
        let dir = std::env::temp_dir();
        let (key, _) = WorkspaceKey::for_folder(&dir).unwrap();
        let diagnostics: DiagnosticsCache = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, mut event_rx) = mpsc::channel(8);

        let notification = NotificationMessage {
            jsonrpc: "2.0".to_string(),
            method: protocol::SERVER_EXITED.to_string(),
            params: serde_json::Value::Null,
        };

        ServiceClient::handle_notification(&key, &notification, &diagnostics, &event_tx).await;

        let event = event_rx.try_recv().unwrap();
        assert!(matches!(event.kind, ServiceEventKind::Exited));
    }

    #[tokio::test]
    async fn test_notification_routing_diagnostics_cached() {
        let dir = std::env::temp_dir();
        let (key, _) = WorkspaceKey::for_folder(&dir).unwrap();
        let diagnostics: DiagnosticsCache = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, mut event_rx) = mpsc::channel(8);

        let notification = NotificationMessage {
            jsonrpc: "2.0".to_string(),
            method: "textDocument/publishDiagnostics".to_string(),
            params: serde_json::json!({
                "uri": "file:///work/api/schema.graphql",
                "diagnostics": [{
                    "range": {
                        "start": { "line": 4, "character": 2 },
                        "end": { "line": 4, "character": 9 }
                    },
                    "severity": 1,
                    "source": "graphql",
                    "message": "Unknown type 'Userr'"
                }]
            }),
        };

        ServiceClient::handle_notification(&key, &notification, &diagnostics, &event_tx).await;

        let event = event_rx.try_recv().unwrap();
        match event.kind {
            ServiceEventKind::Diagnostics { path, count } => {
                assert_eq!(path, PathBuf::from("/work/api/schema.graphql"));
                assert_eq!(count, 1);
            }
            other => panic!("expected Diagnostics, got {other:?}"),
        }

        let cache = diagnostics.lock().await;
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_diagnostics_clears_cache() {
        let dir = std::env::temp_dir();
        let (key, _) = WorkspaceKey::for_folder(&dir).unwrap();
        let diagnostics: DiagnosticsCache = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, mut event_rx) = mpsc::channel(8);

        diagnostics.lock().await.insert(
            PathBuf::from("/work/api/schema.graphql"),
            vec![lsp_types::Diagnostic::default()],
        );

        let notification = NotificationMessage {
            jsonrpc: "2.0".to_string(),
            method: "textDocument/publishDiagnostics".to_string(),
            params: serde_json::json!({
                "uri": "file:///work/api/schema.graphql",
                "diagnostics": []
            }),
        };

        ServiceClient::handle_notification(&key, &notification, &diagnostics, &event_tx).await;

        let event = event_rx.try_recv().unwrap();
        assert!(matches!(
            event.kind,
            ServiceEventKind::Diagnostics { count: 0, .. }
        ));
        assert!(diagnostics.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_notification_ignored() {
        let dir = std::env::temp_dir();
        let (key, _) = WorkspaceKey::for_folder(&dir).unwrap();
        let diagnostics: DiagnosticsCache = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, mut event_rx) = mpsc::channel(8);

        let notification = NotificationMessage {
            jsonrpc: "2.0".to_string(),
            method: "window/logMessage".to_string(),
            params: serde_json::json!({ "type": 3, "message": "hello" }),
        };

        ServiceClient::handle_notification(&key, &notification, &diagnostics, &event_tx).await;

        assert!(event_rx.try_recv().is_err());
    }
}
