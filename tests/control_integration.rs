// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Tests use unwrap/expect/panic for clear failure messages"
)]
//! Integration tests for the control socket: a real Unix socket server
//! in front of a scripted supervisor loop.

use std::path::PathBuf;

use tempfile::tempdir;
use tokio::sync::mpsc;

use pantograph_gql::control::{
    ControlCommand, ControlRequest, ControlResponse, ControlServer, send_request,
};
use pantograph_gql::lsp::{FolderSnapshot, ReconcileSummary};

/// Run a scripted supervisor that answers every command with canned
/// replies until the channel closes.
fn scripted_supervisor(mut rx: mpsc::Receiver<ControlCommand>) -> tokio::task::JoinHandle<usize> {
    tokio::spawn(async move {
        let mut handled = 0;
        while let Some(command) = rx.recv().await {
            handled += 1;
            match command {
                ControlCommand::Roots { paths, reply } => {
                    let _ = reply.send(ReconcileSummary {
                        started: 0,
                        declined: paths.len(),
                        failed: 0,
                        removed: 0,
                    });
                }
                ControlCommand::Focus { reply, .. } => {
                    let _ = reply.send(());
                }
                ControlCommand::Status { reply } => {
                    let _ = reply.send(vec![FolderSnapshot {
                        folder: "/work/api".to_string(),
                        key: "file:///work/api/".to_string(),
                        active: true,
                        state: Some("running".to_string()),
                        visible: Some(false),
                        extensions: vec!["graphql".to_string()],
                        channel: Some("/tmp/api.log".to_string()),
                    }]);
                }
                ControlCommand::Reveal { folder, reply } => {
                    let channel = (folder == PathBuf::from("/work/api"))
                        .then(|| PathBuf::from("/tmp/api.log"));
                    let _ = reply.send(channel);
                }
                ControlCommand::Shutdown => break,
            }
        }
        handled
    })
}

#[tokio::test]
async fn test_socket_roundtrip_roots_and_status() {
    let dir = tempdir().unwrap();
    let socket = dir.path().join("control.sock");

    let (command_tx, command_rx) = mpsc::channel(8);
    let supervisor = scripted_supervisor(command_rx);
    let listener = ControlServer::new(command_tx).start(&socket).unwrap();

    let response = send_request(
        &socket,
        &ControlRequest::Roots {
            paths: vec!["/work/api".to_string(), "/work/web".to_string()],
        },
    )
    .await
    .unwrap();
    match response {
        ControlResponse::Reconciled { summary } => assert_eq!(summary.declined, 2),
        other => panic!("expected Reconciled, got {other:?}"),
    }

    let response = send_request(&socket, &ControlRequest::Status).await.unwrap();
    match response {
        ControlResponse::Status { folders } => {
            assert_eq!(folders.len(), 1);
            assert_eq!(folders[0].state.as_deref(), Some("running"));
        }
        other => panic!("expected Status, got {other:?}"),
    }

    let response = send_request(
        &socket,
        &ControlRequest::Reveal {
            folder: "/work/api".to_string(),
        },
    )
    .await
    .unwrap();
    assert!(matches!(
        response,
        ControlResponse::Reveal { channel: Some(path) } if path == "/tmp/api.log"
    ));

    // Shutdown stops the scripted supervisor.
    let response = send_request(&socket, &ControlRequest::Shutdown).await.unwrap();
    assert!(matches!(response, ControlResponse::ShuttingDown));

    let handled = supervisor.await.unwrap();
    assert_eq!(handled, 4);

    listener.abort();
}

#[tokio::test]
async fn test_malformed_request_yields_error_reply() {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    let dir = tempdir().unwrap();
    let socket = dir.path().join("control.sock");

    let (command_tx, _command_rx) = mpsc::channel(8);
    let listener = ControlServer::new(command_tx).start(&socket).unwrap();

    let stream = tokio::net::UnixStream::connect(&socket).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    writer.write_all(b"this is not json\n").await.unwrap();
    writer.shutdown().await.unwrap();

    let mut line = String::new();
    BufReader::new(reader).read_line(&mut line).await.unwrap();
    let response: ControlResponse = serde_json::from_str(line.trim()).unwrap();
    assert!(matches!(response, ControlResponse::Error { .. }));

    listener.abort();
}

#[tokio::test]
async fn test_stale_socket_file_is_replaced() {
    let dir = tempdir().unwrap();
    let socket = dir.path().join("control.sock");
    std::fs::write(&socket, b"stale").unwrap();

    let (command_tx, command_rx) = mpsc::channel(8);
    let supervisor = scripted_supervisor(command_rx);
    let listener = ControlServer::new(command_tx).start(&socket).unwrap();

    let response = send_request(&socket, &ControlRequest::Focus { path: None })
        .await
        .unwrap();
    assert!(matches!(response, ControlResponse::Focused));

    listener.abort();
    supervisor.abort();
}
