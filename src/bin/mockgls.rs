// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! A configurable mock GraphQL language server for testing.
//!
//! Speaks the LSP protocol over stdin/stdout using Content-Length framed
//! JSON-RPC, plus the service's custom `serverInitialized` and
//! `serverExited` lifecycle notifications. CLI flags control timing and
//! failure modes. No tokio — uses `std::thread` for deferred
//! notifications.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mock GraphQL language server for integration testing.
#[derive(Parser, Debug)]
#[command(name = "mockgls")]
struct Args {
    /// Directory containing the folder's `.gqlconfig` (CLI parity with
    /// the real service; not inspected).
    #[arg(long)]
    #[allow(dead_code, reason = "Accepted for CLI parity with gql-language-server")]
    config_dir: Option<std::path::PathBuf>,

    /// Location of the folder's `gql` module (CLI parity; not inspected).
    #[arg(long)]
    #[allow(dead_code, reason = "Accepted for CLI parity with gql-language-server")]
    gql_path: Option<std::path::PathBuf>,

    /// Log level (CLI parity; not inspected).
    #[arg(long, default_value = "info")]
    #[allow(dead_code, reason = "Accepted for CLI parity with gql-language-server")]
    loglevel: String,

    /// Watchman toggle (CLI parity; not inspected).
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    #[allow(dead_code, reason = "Accepted for CLI parity with gql-language-server")]
    watchman: bool,

    /// Auto-download toggle (CLI parity; not inspected).
    #[arg(long = "auto-download-gql", default_value_t = false, action = clap::ArgAction::Set)]
    #[allow(dead_code, reason = "Accepted for CLI parity with gql-language-server")]
    auto_download_gql: bool,

    /// Comma-separated extensions announced in `serverInitialized`.
    #[arg(long, default_value = "graphql,gql")]
    extensions: String,

    /// Delay before sending `serverInitialized` (milliseconds).
    #[arg(long, default_value_t = 0)]
    init_delay: u64,

    /// Sleep before every response (milliseconds).
    #[arg(long, default_value_t = 0)]
    response_delay: u64,

    /// Reject the `initialize` request with `InternalError`.
    #[arg(long)]
    fail_initialize: bool,

    /// Never send `serverInitialized`.
    #[arg(long)]
    no_ready: bool,

    /// Send `serverExited` then exit, n milliseconds after `initialized`.
    #[arg(long)]
    exit_after: Option<u64>,

    /// Publish a canned diagnostic on every `didOpen`.
    #[arg(long)]
    diagnostic: bool,

    /// Never respond to this method (repeatable).
    #[arg(long)]
    hang_on: Vec<String>,
}

/// A JSON-RPC request.
#[derive(Debug, Deserialize)]
struct Request {
    #[allow(dead_code, reason = "Required by JSON-RPC protocol")]
    jsonrpc: String,
    id: Option<Value>,
    method: Option<String>,
    #[serde(default)]
    params: Value,
}

/// A JSON-RPC response.
#[derive(Debug, Serialize)]
struct Response {
    jsonrpc: String,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Thread-safe writer handle. Wraps `std::io::Stdout` for production,
/// or a shared `Vec<u8>` for tests.
type Writer = Arc<Mutex<Box<dyn Write + Send>>>;

/// Create a writer that forwards to stdout.
fn stdout_writer() -> Writer {
    Arc::new(Mutex::new(Box::new(std::io::stdout())))
}

#[cfg(test)]
fn buffer_writer() -> (Writer, Arc<Mutex<Vec<u8>>>) {
    let buf = Arc::new(Mutex::new(Vec::<u8>::new()));
    let writer: Box<dyn Write + Send> = Box::new(SharedVecWriter(buf.clone()));
    (Arc::new(Mutex::new(writer)), buf)
}

/// Write adapter for `Arc<Mutex<Vec<u8>>>` used in tests.
#[cfg(test)]
struct SharedVecWriter(Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl Write for SharedVecWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Shared state for the mock server.
struct MockServer {
    args: Args,
    writer: Writer,
    shutdown_flag: Arc<AtomicBool>,
}

impl MockServer {
    fn new(args: Args, writer: Writer) -> Self {
        Self {
            args,
            writer,
            shutdown_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run the server, reading from the given reader.
    fn run(&mut self, reader: &mut dyn Read) {
        let mut buffer = Vec::new();
        let mut temp = [0u8; 4096];

        loop {
            if self.shutdown_flag.load(Ordering::SeqCst) {
                break;
            }

            match reader.read(&mut temp) {
                Ok(0) | Err(_) => break,
                Ok(n) => buffer.extend_from_slice(&temp[..n]),
            }

            while let Some((message, consumed)) = try_parse_message(&buffer) {
                buffer.drain(..consumed);

                let Ok(request) = serde_json::from_str::<Request>(&message) else {
                    continue;
                };

                self.handle_message(request);
            }
        }
    }

    fn handle_message(&mut self, request: Request) {
        let Some(method) = request.method.clone() else {
            return;
        };

        if request.id.is_some() {
            self.handle_request(&method, request);
        } else {
            self.handle_notification(&method, &request.params);
        }
    }

    fn handle_request(&mut self, method: &str, request: Request) {
        let Some(id) = request.id else { return };

        // Check hang_on — never respond
        if self.args.hang_on.iter().any(|m| m == method) {
            return;
        }

        if self.args.response_delay > 0 {
            std::thread::sleep(Duration::from_millis(self.args.response_delay));
        }

        let result = match method {
            "initialize" => {
                if self.args.fail_initialize {
                    self.send_response(&Response {
                        jsonrpc: "2.0".to_string(),
                        id,
                        result: None,
                        error: Some(RpcError {
                            code: -32603,
                            message: "mockgls: configured to fail initialize".to_string(),
                        }),
                    });
                    return;
                }
                serde_json::json!({
                    "capabilities": {
                        "textDocumentSync": { "openClose": true, "change": 1 },
                        "hoverProvider": true,
                        "definitionProvider": true,
                        "referencesProvider": true,
                        "completionProvider": { "resolveProvider": false }
                    }
                })
            }
            "shutdown" => Value::Null,
            _ => {
                self.send_response(&Response {
                    jsonrpc: "2.0".to_string(),
                    id,
                    result: None,
                    error: Some(RpcError {
                        code: -32601,
                        message: format!("mockgls: method not found: {method}"),
                    }),
                });
                return;
            }
        };

        self.send_response(&Response {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        });
    }

    fn handle_notification(&mut self, method: &str, params: &Value) {
        match method {
            "initialized" => {
                if !self.args.no_ready {
                    self.send_server_initialized();
                }
                if let Some(delay) = self.args.exit_after {
                    self.schedule_exit(delay);
                }
            }
            "textDocument/didOpen" => {
                if self.args.diagnostic
                    && let Some(uri) = params
                        .get("textDocument")
                        .and_then(|td| td.get("uri"))
                        .and_then(Value::as_str)
                {
                    send_diagnostics_notification(&self.writer, uri);
                }
            }
            "exit" => {
                self.shutdown_flag.store(true, Ordering::SeqCst);
                std::process::exit(0);
            }
            _ => {}
        }
    }

    /// Send `serverInitialized` with the configured extension list,
    /// after the configured delay.
    fn send_server_initialized(&self) {
        let extensions: Vec<String> = self
            .args
            .extensions
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let delay = self.args.init_delay;
        let writer = self.writer.clone();

        let send = move || {
            send_message(
                &writer,
                &serde_json::json!({
                    "jsonrpc": "2.0",
                    "method": "serverInitialized",
                    "params": { "fileExtensions": extensions }
                }),
            );
        };

        if delay > 0 {
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(delay));
                send();
            });
        } else {
            send();
        }
    }

    /// Simulate the service dying: `serverExited`, then process exit.
    fn schedule_exit(&self, delay: u64) {
        let writer = self.writer.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(delay));
            send_message(
                &writer,
                &serde_json::json!({
                    "jsonrpc": "2.0",
                    "method": "serverExited",
                    "params": null
                }),
            );
            // Give the client a moment to read the notification
            std::thread::sleep(Duration::from_millis(50));
            std::process::exit(1);
        });
    }

    fn send_response(&mut self, response: &Response) {
        let Ok(json) = serde_json::to_string(response) else {
            return;
        };
        write_framed(&self.writer, &json);
    }
}

/// Write a Content-Length framed JSON string.
fn write_framed(writer: &Writer, json: &str) {
    let header = format!("Content-Length: {}\r\n\r\n", json.len());
    let Ok(mut w) = writer.lock() else { return };
    let _ = w.write_all(header.as_bytes());
    let _ = w.write_all(json.as_bytes());
    let _ = w.flush();
}

/// Send a JSON-RPC message to the client.
fn send_message(writer: &Writer, value: &Value) {
    let Ok(json) = serde_json::to_string(value) else {
        return;
    };
    write_framed(writer, &json);
}

/// Send a `publishDiagnostics` notification.
fn send_diagnostics_notification(writer: &Writer, uri: &str) {
    send_message(
        writer,
        &serde_json::json!({
            "jsonrpc": "2.0",
            "method": "textDocument/publishDiagnostics",
            "params": {
                "uri": uri,
                "diagnostics": [{
                    "range": {
                        "start": { "line": 0, "character": 0 },
                        "end": { "line": 0, "character": 1 }
                    },
                    "severity": 1,
                    "source": "graphql",
                    "message": "mockgls: mock diagnostic"
                }]
            }
        }),
    );
}

/// Parse a Content-Length framed message from a buffer.
/// Returns the message string and the number of bytes consumed.
fn try_parse_message(buffer: &[u8]) -> Option<(String, usize)> {
    let header_end = buffer.windows(4).position(|w| w == b"\r\n\r\n")?;
    let headers = std::str::from_utf8(&buffer[..header_end]).ok()?;

    let mut content_length: Option<usize> = None;
    for line in headers.lines() {
        if line.to_ascii_lowercase().starts_with("content-length:") {
            content_length = line
                .split_once(':')
                .and_then(|(_, v)| v.trim().parse().ok());
        }
    }

    let content_length = content_length?;
    let total = header_end + 4 + content_length;

    if buffer.len() < total {
        return None;
    }

    let body = std::str::from_utf8(&buffer[header_end + 4..total]).ok()?;
    Some((body.to_string(), total))
}

fn main() {
    let args = Args::parse();
    let writer = stdout_writer();
    let mut server = MockServer::new(args, writer);
    let mut stdin = std::io::stdin().lock();
    server.run(&mut stdin);
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    reason = "Tests use expect/unwrap for clear failure messages"
)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn default_args() -> Args {
        Args {
            config_dir: None,
            gql_path: None,
            loglevel: "info".to_string(),
            watchman: true,
            auto_download_gql: false,
            extensions: "graphql,gql".to_string(),
            init_delay: 0,
            response_delay: 0,
            fail_initialize: false,
            no_ready: false,
            exit_after: None,
            diagnostic: false,
            hang_on: vec![],
        }
    }

    fn frame(body: &str) -> Vec<u8> {
        format!("Content-Length: {}\r\n\r\n{}", body.len(), body).into_bytes()
    }

    fn extract_messages(data: &[u8]) -> Vec<Value> {
        let mut messages = Vec::new();
        let mut buf = data.to_vec();
        while let Some((msg, consumed)) = try_parse_message(&buf) {
            if let Ok(v) = serde_json::from_str::<Value>(&msg) {
                messages.push(v);
            }
            buf.drain(..consumed);
        }
        messages
    }

    fn run_server_with(args: Args, input: &[u8]) -> Vec<Value> {
        let (writer, buf) = buffer_writer();
        let mut server = MockServer::new(args, writer);
        let mut reader = Cursor::new(input.to_vec());
        server.run(&mut reader);
        let data = buf
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        extract_messages(&data)
    }

    fn initialize_request(id: u64) -> String {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "initialize",
            "params": {
                "processId": null,
                "capabilities": {},
                "rootUri": "file:///tmp/test"
            }
        })
        .to_string()
    }

    fn initialized_notification() -> String {
        serde_json::json!({
            "jsonrpc": "2.0",
            "method": "initialized",
            "params": {}
        })
        .to_string()
    }

    fn shutdown_request(id: u64) -> String {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "shutdown",
            "params": null
        })
        .to_string()
    }

    #[test]
    fn test_initialize_response_valid() {
        let mut input = frame(&initialize_request(1));
        input.extend(frame(&shutdown_request(2)));

        let messages = run_server_with(default_args(), &input);

        assert!(!messages.is_empty(), "Expected at least one response");
        let resp = &messages[0];
        assert_eq!(resp["id"], 1);
        assert!(resp["result"].is_object(), "Expected result object");
        assert!(
            resp["result"]["capabilities"].is_object(),
            "Expected capabilities"
        );
        assert!(resp["error"].is_null(), "Expected no error");
    }

    #[test]
    fn test_fail_initialize_flag() {
        let mut args = default_args();
        args.fail_initialize = true;

        let input = frame(&initialize_request(1));
        let messages = run_server_with(args, &input);

        let resp = &messages[0];
        assert_eq!(resp["id"], 1);
        assert_eq!(resp["error"]["code"], -32603);
    }

    #[test]
    fn test_server_initialized_after_initialized() {
        let mut input = frame(&initialize_request(1));
        input.extend(frame(&initialized_notification()));
        input.extend(frame(&shutdown_request(2)));

        let messages = run_server_with(default_args(), &input);

        let ready = messages
            .iter()
            .find(|m| m.get("method").and_then(Value::as_str) == Some("serverInitialized"))
            .expect("serverInitialized notification");

        let extensions = ready["params"]["fileExtensions"]
            .as_array()
            .expect("fileExtensions array");
        assert_eq!(extensions.len(), 2);
        assert_eq!(extensions[0], "graphql");
        assert_eq!(extensions[1], "gql");
    }

    #[test]
    fn test_no_ready_suppresses_server_initialized() {
        let mut args = default_args();
        args.no_ready = true;

        let mut input = frame(&initialize_request(1));
        input.extend(frame(&initialized_notification()));
        input.extend(frame(&shutdown_request(2)));

        let messages = run_server_with(args, &input);

        assert!(
            !messages
                .iter()
                .any(|m| m.get("method").and_then(Value::as_str) == Some("serverInitialized")),
            "serverInitialized must be suppressed"
        );
    }

    #[test]
    fn test_custom_extensions() {
        let mut args = default_args();
        args.extensions = "graphql, ts,tsx".to_string();

        let mut input = frame(&initialize_request(1));
        input.extend(frame(&initialized_notification()));

        let messages = run_server_with(args, &input);

        let ready = messages
            .iter()
            .find(|m| m.get("method").and_then(Value::as_str) == Some("serverInitialized"))
            .expect("serverInitialized notification");
        let extensions = ready["params"]["fileExtensions"].as_array().unwrap();
        assert_eq!(extensions.len(), 3);
        assert_eq!(extensions[1], "ts");
    }

    #[test]
    fn test_diagnostic_on_did_open() {
        let mut args = default_args();
        args.diagnostic = true;

        let did_open = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "textDocument/didOpen",
            "params": {
                "textDocument": {
                    "uri": "file:///tmp/schema.graphql",
                    "languageId": "graphql",
                    "version": 1,
                    "text": "type Query { ok: Boolean }"
                }
            }
        })
        .to_string();

        let mut input = frame(&initialize_request(1));
        input.extend(frame(&did_open));

        let messages = run_server_with(args, &input);

        let diag = messages
            .iter()
            .find(|m| {
                m.get("method").and_then(Value::as_str) == Some("textDocument/publishDiagnostics")
            })
            .expect("publishDiagnostics notification");

        assert_eq!(diag["params"]["uri"], "file:///tmp/schema.graphql");
        assert_eq!(diag["params"]["diagnostics"][0]["severity"], 1);
    }

    #[test]
    fn test_hang_on_never_responds() {
        let mut args = default_args();
        args.hang_on = vec!["initialize".to_string()];

        let input = frame(&initialize_request(1));
        let messages = run_server_with(args, &input);

        assert!(messages.is_empty(), "hang_on must suppress the response");
    }

    #[test]
    fn test_unknown_method_not_found() {
        let unknown = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "textDocument/hover",
            "params": {}
        })
        .to_string();

        let messages = run_server_with(default_args(), &frame(&unknown));

        assert_eq!(messages[0]["id"], 7);
        assert_eq!(messages[0]["error"]["code"], -32601);
    }

    #[test]
    fn test_framing_roundtrip() {
        let body = r#"{"jsonrpc":"2.0","id":1}"#;
        let framed = frame(body);
        let (parsed, consumed) = try_parse_message(&framed).expect("complete frame");
        assert_eq!(parsed, body);
        assert_eq!(consumed, framed.len());
    }

    #[test]
    fn test_framing_incomplete() {
        assert!(try_parse_message(b"Content-Length: 10\r\n").is_none());
        assert!(try_parse_message(b"Content-Length: 100\r\n\r\n{}").is_none());
    }
}
