// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Pantograph supervisor and CLI.
//!
//! This is the main entry point for the Pantograph supervisor. It can be
//! run as the per-editor supervisor (`serve`) or as a CLI tool to list
//! and monitor sessions and to feed editor-host events (folder set,
//! focused document) into a running supervisor.

#![allow(clippy::print_stdout, reason = "CLI tool needs to output to stdout")]
#![allow(clippy::print_stderr, reason = "CLI tool needs to output to stderr")]

use anyhow::Result;
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pantograph_gql::cli::{self, ColorConfig, ColumnWidths};
use pantograph_gql::config::{self, Config};
use pantograph_gql::control::{
    ControlCommand, ControlRequest, ControlResponse, ControlServer, send_request,
};
use pantograph_gql::lsp::ClientRegistry;
use pantograph_gql::session::{self, EventKind, Session, SessionEvent};

/// Command-line arguments for Pantograph.
#[derive(Parser, Debug)]
#[command(name = "pantograph")]
#[command(about = "Workspace-multiplexing supervisor for the GraphQL language server")]
#[command(version = env!("PANTOGRAPH_VERSION"))]
struct Args {
    /// The subcommand to run.
    #[command(subcommand)]
    command: Option<Command>,

    /// Language service command, with arguments (e.g.,
    /// "gql-language-server --no-color"). Overrides the config file.
    #[arg(short, long, global = true)]
    service: Option<String>,

    /// Path to configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Workspace root directories. Can be specified multiple times.
    #[arg(short, long, global = true)]
    root: Vec<PathBuf>,
}

/// Subcommands supported by Pantograph.
#[derive(Subcommand, Debug)]
enum Command {
    /// Run the supervisor (default if no subcommand given).
    Serve,

    /// List active Pantograph sessions.
    List,

    /// Monitor events from a session.
    Monitor {
        /// Session ID or row number (use 'pantograph list' to see available sessions).
        id: String,

        /// Show raw JSON output.
        #[arg(long)]
        raw: bool,

        /// Disable colored output.
        #[arg(long)]
        nocolor: bool,

        /// Filter events by regex pattern.
        #[arg(long, short)]
        filter: Option<String>,
    },

    /// Show status of a session: metadata, folders, recent events.
    Status {
        /// Session ID (use 'pantograph list' to see available sessions).
        id: String,
    },

    /// Replace a running session's open-folder set (the editor-host
    /// folder-added/folder-removed event).
    Roots {
        /// Target session ID (defaults to the only active session).
        #[arg(long)]
        session: Option<String>,

        /// The full set of open workspace folders.
        paths: Vec<PathBuf>,
    },

    /// Tell a running session which document is focused (the editor-host
    /// active-editor-changed event).
    Focus {
        /// Target session ID (defaults to the only active session).
        #[arg(long)]
        session: Option<String>,

        /// Absolute or relative path of the focused document. Omit to
        /// report that no editor is focused.
        path: Option<PathBuf>,
    },

    /// Print the path of a folder's diagnostic sink (the status
    /// indicator's click affordance).
    Reveal {
        /// Target session ID (defaults to the only active session).
        #[arg(long)]
        session: Option<String>,

        /// The workspace folder whose sink to reveal.
        folder: PathBuf,
    },

    /// Stop a running session.
    Stop {
        /// Session ID.
        id: String,
    },

    /// Check workspace folders and service health.
    Doctor {
        /// Disable colored output.
        #[arg(long)]
        nocolor: bool,
    },
}

/// Entry point for the Pantograph binary.
///
/// # Errors
///
/// Returns an error if the subcommand fails.
#[tokio::main]
async fn main() -> Result<()> {
    let mut args = Args::parse();
    let command = args.command.take();

    match command {
        None | Some(Command::Serve) => run_server(args).await,
        Some(Command::List) => run_list(),
        Some(Command::Monitor {
            id,
            raw,
            nocolor,
            filter,
        }) => run_monitor(&id, raw, nocolor, filter.as_deref()),
        Some(Command::Status { id }) => run_status(&id),
        Some(Command::Roots { session, paths }) => run_roots(session.as_deref(), &paths).await,
        Some(Command::Focus { session, path }) => run_focus(session.as_deref(), path).await,
        Some(Command::Reveal { session, folder }) => {
            run_reveal(session.as_deref(), &folder).await
        }
        Some(Command::Stop { id }) => run_stop(&id).await,
        Some(Command::Doctor { nocolor }) => run_doctor(args, nocolor),
    }
}

/// Apply the `--service` override on top of the loaded config.
fn apply_service_override(config: &mut Config, spec: Option<&str>) -> Result<()> {
    let Some(spec) = spec else { return Ok(()) };

    let mut parts = spec.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| anyhow::anyhow!("service command cannot be empty"))?
        .to_string();
    let extra: Vec<String> = parts.map(std::string::ToString::to_string).collect();

    config.service.command = program;
    config.service.args = extra;
    Ok(())
}

/// Resolve the workspace roots from CLI args (default: current dir).
fn resolve_roots(root_args: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    let raw_roots = if root_args.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        root_args
    };
    Ok(raw_roots
        .into_iter()
        .map(|r| r.canonicalize())
        .collect::<std::io::Result<Vec<_>>>()?)
}

/// Runs the supervisor loop.
///
/// # Errors
///
/// Returns an error if configuration or session setup fails.
async fn run_server(args: Args) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("pantograph_gql=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(args.config.clone())?;
    apply_service_override(&mut config, args.service.as_deref())?;

    let roots = resolve_roots(args.root)?;
    let workspace_display = roots
        .iter()
        .map(|r| r.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(", ");

    let mut session = Session::create(&workspace_display)?;
    let broadcaster = session.broadcaster();

    info!("Starting pantograph supervisor");
    info!("Session ID: {}", session.info.id);
    info!("Workspace roots: {}", workspace_display);
    info!("Service command: {}", config.service.command);

    // Service events flow from every connection's reader task into the
    // supervisor loop; host commands arrive from the control socket.
    // One loop owns the registry, so reconciliation stays serialized.
    let (event_tx, mut event_rx) = mpsc::channel(256);
    let mut registry =
        ClientRegistry::new(config, session.channels_dir(), event_tx, broadcaster);

    let summary = registry.reconcile(&roots).await;
    info!(
        "Initial reconcile: {} started, {} declined, {} failed",
        summary.started, summary.declined, summary.failed
    );

    let (command_tx, mut command_rx) = mpsc::channel(32);
    let control = ControlServer::new(command_tx);
    let socket_path = session.socket_path();
    let control_handle = control.start(&socket_path)?;
    session.set_socket_active();

    loop {
        tokio::select! {
            Some(command) = command_rx.recv() => match command {
                ControlCommand::Roots { paths, reply } => {
                    let summary = registry.reconcile(&paths).await;
                    let _ = reply.send(summary);
                }
                ControlCommand::Focus { document, reply } => {
                    registry.on_active_editor(document);
                    let _ = reply.send(());
                }
                ControlCommand::Status { reply } => {
                    let _ = reply.send(registry.snapshots());
                }
                ControlCommand::Reveal { folder, reply } => {
                    let _ = reply.send(registry.reveal(&folder));
                }
                ControlCommand::Shutdown => {
                    info!("Shutdown requested via control socket");
                    break;
                }
            },
            Some(event) = event_rx.recv() => {
                registry.handle_event(event).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    // Stop the control socket server
    control_handle.abort();
    let _ = control_handle.await;

    // Dispose every folder's connection (deactivation)
    info!("Disposing language-service connections");
    registry.dispose_all().await;

    // Session cleanup happens automatically via Drop
    Ok(())
}

/// Runs the session list command.
///
/// # Errors
///
/// Returns an error if listing sessions fails.
fn run_list() -> Result<()> {
    let sessions = session::list_sessions()?;

    if sessions.is_empty() {
        println!("No active Pantograph sessions");
        return Ok(());
    }

    let term_width = cli::terminal_width();
    let widths = ColumnWidths::calculate(term_width);

    // Print header
    println!(
        "{:>width_num$} {:<width_id$} {:<width_pid$} {:<width_ws$} {:<width_folders$} STARTED",
        "#",
        "ID",
        "PID",
        "WORKSPACE",
        "FOLDERS",
        width_num = widths.row_num,
        width_id = widths.id,
        width_pid = widths.pid,
        width_ws = widths.workspace,
        width_folders = widths.folders,
    );
    println!("{}", "-".repeat(term_width.min(120)));

    for (idx, s) in sessions.iter().enumerate() {
        let ago = format_duration_ago(s.started_at);

        // Folders with a live indicator in this session
        let folders = session::active_folders(&s.id).unwrap_or_default();
        let folders = if folders.is_empty() {
            "-".to_string()
        } else {
            folders.len().to_string()
        };

        // Truncate fields to fit column widths
        let id = cli::truncate(&s.id, widths.id);
        let workspace = cli::truncate(&s.workspace, widths.workspace);

        println!(
            "{:>width_num$} {:<width_id$} {:<width_pid$} {:<width_ws$} {:<width_folders$} {}",
            idx + 1,
            id,
            s.pid,
            workspace,
            folders,
            ago,
            width_num = widths.row_num,
            width_id = widths.id,
            width_pid = widths.pid,
            width_ws = widths.workspace,
            width_folders = widths.folders,
        );
    }

    Ok(())
}

/// Resolve a session ID from either a row number or ID prefix
fn resolve_session_id(id: &str) -> Result<session::SessionInfo> {
    // Try parsing as a row number first (1-indexed)
    if let Ok(row_num) = id.parse::<usize>()
        && row_num > 0
    {
        let sessions = session::list_sessions()?;
        if let Some(s) = sessions.get(row_num - 1) {
            return Ok(s.clone());
        }
        // Row number out of range — try as session ID prefix before giving up.
        // Session IDs are hex strings that may be all digits (e.g., "025586387"),
        // so a purely numeric input could be either a row number or a session ID.
        if let Ok(session) = find_session(id) {
            return Ok(session);
        }
        anyhow::bail!("Row number {} out of range (1-{})", row_num, sessions.len());
    }

    // Fall back to find_session (ID prefix matching)
    find_session(id)
}

/// Runs the monitor command.
///
/// # Errors
///
/// Returns an error if the session cannot be found or monitoring fails.
fn run_monitor(id: &str, raw: bool, nocolor: bool, filter: Option<&str>) -> Result<()> {
    // Resolve session ID (supports row numbers and prefix matching)
    let session = resolve_session_id(id)?;
    let full_id = session.id;

    let colors = ColorConfig::new(nocolor);

    // Compile filter regex if provided
    let filter_regex = filter
        .as_ref()
        .map(|f| Regex::new(f))
        .transpose()
        .map_err(|e| anyhow::anyhow!("Invalid filter regex: {e}"))?;

    println!("Monitoring session {full_id} (Ctrl+C to stop)\n");

    let mut reader = session::tail_events(&full_id)?;

    loop {
        if let Some(event) = reader.next_event()? {
            // Apply filter if set
            if let Some(ref re) = filter_regex {
                let event_str = format!("{:?}", event.kind);
                if !re.is_match(&event_str) {
                    continue;
                }
            }

            if raw {
                print_event_raw(&event);
            } else {
                print_event_annotated(&event, &colors);
            }
        } else {
            println!("\nSession ended");
            break;
        }
    }

    Ok(())
}

/// Runs the status command.
///
/// # Errors
///
/// Returns an error if the session cannot be found.
fn run_status(id: &str) -> Result<()> {
    let session = find_session(id)?;

    println!("Session: {}", session.id);
    println!("PID: {}", session.pid);
    println!("Workspace: {}", session.workspace);
    println!(
        "Started: {} ({})",
        session
            .started_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S"),
        format_duration_ago(session.started_at)
    );

    let folders = session::active_folders(&session.id)?;
    if !folders.is_empty() {
        println!("Folders: {}", folders.join(", "));
    }

    // Show recent events
    println!("\nRecent events:");
    let events: Vec<_> = session::monitor_events(&session.id)?.collect();
    let recent: Vec<_> = events.iter().rev().take(10).collect();

    for event in recent.iter().rev() {
        print_event(event);
    }

    Ok(())
}

/// Resolve the target session for a control command: explicit ID, or the
/// only active session.
fn resolve_target_session(id: Option<&str>) -> Result<session::SessionInfo> {
    if let Some(id) = id {
        return find_session(id);
    }

    let mut sessions = session::list_sessions()?;
    match sessions.len() {
        0 => anyhow::bail!("No active Pantograph sessions"),
        1 => sessions
            .pop()
            .ok_or_else(|| anyhow::anyhow!("session list changed underneath us")),
        _ => anyhow::bail!("Multiple sessions active; pass --session <id>"),
    }
}

/// The control socket path for a session.
fn control_endpoint(session_id: &str) -> PathBuf {
    session::sessions_dir().join(session_id).join("control.sock")
}

/// Make a path absolute against the current directory, without requiring
/// it to exist.
fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Runs the roots command: replace a session's open-folder set.
///
/// # Errors
///
/// Returns an error if the session or its socket is unreachable.
async fn run_roots(session_id: Option<&str>, paths: &[PathBuf]) -> Result<()> {
    let session = resolve_target_session(session_id)?;
    let socket = control_endpoint(&session.id);

    let absolute: Vec<String> = paths
        .iter()
        .map(|p| absolutize(p).map(|p| p.display().to_string()))
        .collect::<Result<_>>()?;

    let response = send_request(&socket, &ControlRequest::Roots { paths: absolute }).await?;
    match response {
        ControlResponse::Reconciled { summary } => {
            println!(
                "Reconciled: {} started, {} declined, {} failed, {} removed",
                summary.started, summary.declined, summary.failed, summary.removed
            );
            Ok(())
        }
        ControlResponse::Error { message } => anyhow::bail!("{message}"),
        other => anyhow::bail!("Unexpected reply: {other:?}"),
    }
}

/// Runs the focus command: report the active editor document.
///
/// # Errors
///
/// Returns an error if the session or its socket is unreachable.
async fn run_focus(session_id: Option<&str>, path: Option<PathBuf>) -> Result<()> {
    let session = resolve_target_session(session_id)?;
    let socket = control_endpoint(&session.id);

    let path = path
        .map(|p| absolutize(&p).map(|p| p.display().to_string()))
        .transpose()?;

    let response = send_request(&socket, &ControlRequest::Focus { path }).await?;
    match response {
        ControlResponse::Focused => Ok(()),
        ControlResponse::Error { message } => anyhow::bail!("{message}"),
        other => anyhow::bail!("Unexpected reply: {other:?}"),
    }
}

/// Runs the reveal command: print a folder's diagnostic sink path.
///
/// # Errors
///
/// Returns an error if the session or its socket is unreachable.
async fn run_reveal(session_id: Option<&str>, folder: &Path) -> Result<()> {
    let session = resolve_target_session(session_id)?;
    let socket = control_endpoint(&session.id);

    let folder = absolutize(folder)?.display().to_string();
    let response = send_request(&socket, &ControlRequest::Reveal { folder }).await?;
    match response {
        ControlResponse::Reveal {
            channel: Some(path),
        } => {
            println!("{path}");
            Ok(())
        }
        ControlResponse::Reveal { channel: None } => {
            anyhow::bail!("No output channel for that folder (not activated)")
        }
        ControlResponse::Error { message } => anyhow::bail!("{message}"),
        other => anyhow::bail!("Unexpected reply: {other:?}"),
    }
}

/// Runs the stop command.
///
/// # Errors
///
/// Returns an error if the session or its socket is unreachable.
async fn run_stop(id: &str) -> Result<()> {
    let session = find_session(id)?;
    let socket = control_endpoint(&session.id);

    let response = send_request(&socket, &ControlRequest::Shutdown).await?;
    match response {
        ControlResponse::ShuttingDown => {
            println!("Session {} shutting down", session.id);
            Ok(())
        }
        ControlResponse::Error { message } => anyhow::bail!("{message}"),
        other => anyhow::bail!("Unexpected reply: {other:?}"),
    }
}

/// Runs the doctor command: per-folder activation and service health.
///
/// # Errors
///
/// Returns an error if configuration loading fails.
fn run_doctor(args: Args, nocolor: bool) -> Result<()> {
    let colors = ColorConfig::new(nocolor);

    // Print version header
    println!("Pantograph {}", env!("PANTOGRAPH_VERSION"));
    println!();

    // Load configuration (same as run_server)
    let mut config = Config::load(args.config.clone())?;
    apply_service_override(&mut config, args.service.as_deref())?;

    let roots = resolve_roots(args.root)?;

    let config_source = args
        .config
        .as_ref()
        .map_or_else(|| "default paths".to_string(), |p| p.display().to_string());
    println!("{} {}", colors.bold("Config:"), config_source);
    println!();

    let max_root_width = roots
        .iter()
        .map(|r| r.display().to_string().len())
        .max()
        .unwrap_or(10);

    for root in &roots {
        let service = config.service_for(root);
        let root_display = format!("{:<max_root_width$}", root.display().to_string());

        // Would the service activate here at all?
        if let Err(probe) = config::find_gql_config(root) {
            println!(
                "{}  {}",
                colors.dim(&root_display),
                colors.dim(&format!("- skipped ({probe})")),
            );
            continue;
        }

        // Is the service executable reachable?
        if !binary_exists(&service.command) {
            println!(
                "{}  {}",
                root_display,
                colors.red(&format!("✗ {} not found", service.command)),
            );
            continue;
        }

        let documents = count_graphql_documents(root);
        println!(
            "{}  {} {}",
            root_display,
            colors.green("✓"),
            colors.dim(&format!(
                "{} ({} GraphQL document{})",
                service.command,
                documents,
                if documents == 1 { "" } else { "s" }
            )),
        );
    }

    Ok(())
}

/// Check whether a command resolves to an executable.
fn binary_exists(command: &str) -> bool {
    // If the command contains a path separator, check it directly
    if command.contains('/') {
        return Path::new(command).exists();
    }

    // Search PATH
    let path_var = std::env::var("PATH").unwrap_or_default();
    std::env::split_paths(&path_var).any(|dir| dir.join(command).is_file())
}

/// Count `.graphql`/`.gql` documents under a root, honoring ignore files.
fn count_graphql_documents(root: &Path) -> usize {
    ignore::WalkBuilder::new(root)
        .build()
        .filter_map(Result::ok)
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("graphql") || ext.eq_ignore_ascii_case("gql"))
        })
        .count()
}

/// Find a session by exact ID or unique prefix.
fn find_session(id: &str) -> Result<session::SessionInfo> {
    // Try exact match first
    if let Some(s) = session::get_session(id)? {
        return Ok(s);
    }

    // Try prefix match
    let sessions = session::list_sessions()?;
    let matches: Vec<_> = sessions.iter().filter(|s| s.id.starts_with(id)).collect();

    match matches.len() {
        0 => anyhow::bail!("No session found matching '{id}'"),
        1 => Ok(matches[0].clone()),
        _ => {
            eprintln!("Multiple sessions match '{id}':");
            for s in matches {
                eprintln!("  {}", s.id);
            }
            anyhow::bail!("Please specify a more complete session ID")
        }
    }
}

/// Format a timestamp as "Xm ago" or similar
fn format_duration_ago(timestamp: chrono::DateTime<Utc>) -> String {
    let now = Utc::now();
    let duration = now.signed_duration_since(timestamp);

    if duration.num_hours() > 0 {
        format!(
            "{}h {}m ago",
            duration.num_hours(),
            duration.num_minutes() % 60
        )
    } else if duration.num_minutes() > 0 {
        format!("{}m ago", duration.num_minutes())
    } else {
        format!("{}s ago", duration.num_seconds())
    }
}

/// Print an event in raw JSON format
fn print_event_raw(event: &SessionEvent) {
    let time = event.timestamp.with_timezone(&Local).format("%H:%M:%S");
    let json = serde_json::to_string_pretty(&event.kind).unwrap_or_default();
    println!("[{time}] {json}");
}

/// Print an event with annotations and colors
fn print_event_annotated(event: &SessionEvent, colors: &ColorConfig) {
    let time = event.timestamp.with_timezone(&Local).format("%H:%M:%S");
    let time_str = colors.dim(&format!("[{time}]"));

    match &event.kind {
        EventKind::Started => {
            println!("{time_str} Session started");
        }
        EventKind::Shutdown => {
            println!("{time_str} Session shutting down");
        }
        EventKind::FoldersChanged { folders } => {
            if folders.is_empty() {
                println!("{time_str} Folder set now empty");
            } else {
                println!("{time_str} Folders: {}", colors.cyan(&folders.join(", ")));
            }
        }
        EventKind::ServerState { folder, state } => {
            let state_str = match state.as_str() {
                "running" => colors.green(state),
                "errored" => colors.red(state),
                "initializing" => colors.blue(state),
                _ => colors.dim(state),
            };
            println!("{time_str} {}: {state_str}", colors.cyan(folder));
        }
        EventKind::Declined { folder, reason } => {
            println!(
                "{time_str} {}: {}",
                colors.cyan(folder),
                colors.dim(&format!("not activated — {reason}"))
            );
        }
        EventKind::ErrorMessage { folder, message } => {
            println!("{time_str} {}: {}", colors.cyan(folder), colors.red(message));
        }
        EventKind::Indicator { folder, visible } => {
            let verb = if *visible { "shown" } else { "hidden" };
            println!(
                "{time_str} {}: {}",
                colors.cyan(folder),
                colors.dim(&format!("indicator {verb}"))
            );
        }
        EventKind::Diagnostics {
            folder,
            file,
            count,
        } => {
            let summary = format!("{count} diagnostic{}", if *count == 1 { "" } else { "s" });
            let summary = if *count > 0 {
                colors.red(&summary)
            } else {
                colors.green(&summary)
            };
            println!("{time_str} {}: {file} — {summary}", colors.cyan(folder));
        }
    }
}

/// Print an event with default colors (used by `status`).
fn print_event(event: &SessionEvent) {
    let colors = ColorConfig::new(false);
    print_event_annotated(event, &colors);
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests use unwrap for clear failure messages"
)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_service_override() {
        let mut config = Config::default();
        apply_service_override(&mut config, Some("gql-ls --no-color --loglevel debug")).unwrap();
        assert_eq!(config.service.command, "gql-ls");
        assert_eq!(config.service.args, vec!["--no-color", "--loglevel", "debug"]);
    }

    #[test]
    fn test_apply_service_override_none_keeps_config() {
        let mut config = Config::default();
        apply_service_override(&mut config, None).unwrap();
        assert_eq!(config.service.command, "gql-language-server");
    }

    #[test]
    fn test_apply_service_override_empty_fails() {
        let mut config = Config::default();
        assert!(apply_service_override(&mut config, Some("   ")).is_err());
    }

    #[test]
    fn test_binary_exists_for_shell() {
        assert!(binary_exists("sh"));
        assert!(!binary_exists("pantograph-definitely-not-a-binary"));
    }

    #[test]
    fn test_absolutize() {
        assert_eq!(
            absolutize(Path::new("/already/abs")).unwrap(),
            PathBuf::from("/already/abs")
        );
        let rel = absolutize(Path::new("some/rel")).unwrap();
        assert!(rel.is_absolute());
        assert!(rel.ends_with("some/rel"));
    }

    #[test]
    fn test_format_duration_ago_seconds() {
        let s = format_duration_ago(Utc::now());
        assert!(s.ends_with("s ago"));
    }

    #[test]
    fn test_count_graphql_documents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.graphql"), "type Query { ok: Boolean }").unwrap();
        std::fs::write(dir.path().join("b.gql"), "query { ok }").unwrap();
        std::fs::write(dir.path().join("c.rs"), "fn main() {}").unwrap();
        assert_eq!(count_graphql_documents(dir.path()), 2);
    }
}
