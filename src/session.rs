// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Session management for observability.
//!
//! Each Pantograph instance creates a session that can be discovered and
//! monitored from other terminals via `pantograph list` and
//! `pantograph monitor`. The session directory also holds the control
//! socket and the per-folder diagnostic sinks (output channels).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Session metadata stored in info.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Unique session ID.
    pub id: String,
    /// Process ID of the Pantograph instance.
    pub pid: u32,
    /// Workspace roots the session was started with.
    pub workspace: String,
    /// When the session started.
    pub started_at: DateTime<Utc>,
}

/// An event that can be broadcast to listeners.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The specific event data.
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Types of session events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Session started.
    Started,
    /// Session ending.
    Shutdown,
    /// The open-folder set changed after a reconciliation pass.
    FoldersChanged {
        /// Current folder roots after the pass.
        folders: Vec<String>,
    },
    /// A folder's indicator changed state.
    ServerState {
        /// Display path of the folder.
        folder: String,
        /// The new state ("initializing", "running", "errored", "disposed").
        state: String,
    },
    /// A folder was inspected and deliberately not activated.
    Declined {
        /// Display path of the folder.
        folder: String,
        /// Why activation was declined.
        reason: String,
    },
    /// A user-visible error (the modal-message analog).
    ErrorMessage {
        /// Display path of the folder.
        folder: String,
        /// The message shown to the user.
        message: String,
    },
    /// A folder's indicator visibility flipped.
    Indicator {
        /// Display path of the folder.
        folder: String,
        /// Whether the indicator is now shown.
        visible: bool,
    },
    /// Diagnostics were published for a document.
    Diagnostics {
        /// Display path of the folder.
        folder: String,
        /// Document the diagnostics belong to.
        file: String,
        /// Number of diagnostics now attached.
        count: usize,
    },
}

/// Returns the base directory for session data.
#[must_use]
pub fn sessions_dir() -> PathBuf {
    let state_dir = dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    state_dir.join("pantograph").join("sessions")
}

/// An active session that broadcasts events.
pub struct Session {
    /// Metadata about the session.
    pub info: SessionInfo,

    dir: PathBuf,

    events_file: Arc<Mutex<File>>,

    /// Path to the control socket (if started).
    socket_path: Option<PathBuf>,
}

impl Session {
    /// Create a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The session directory cannot be created.
    /// - Metadata or event files cannot be created.
    pub fn create(workspace: &str) -> Result<Self> {
        let id = Self::generate_id();
        let sessions_base = sessions_dir();
        let session_dir = sessions_base.join(&id);

        fs::create_dir_all(&session_dir)
            .with_context(|| format!("Failed to create session dir: {}", session_dir.display()))?;

        let info = SessionInfo {
            id,
            pid: std::process::id(),
            workspace: workspace.to_string(),
            started_at: Utc::now(),
        };

        let info_path = session_dir.join("info.json");
        let info_file = File::create(&info_path)?;
        serde_json::to_writer_pretty(info_file, &info)?;

        let events_path = session_dir.join("events.jsonl");
        let events_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&events_path)?;

        let session = Self {
            info,
            dir: session_dir,
            events_file: Arc::new(Mutex::new(events_file)),
            socket_path: None,
        };

        session.broadcast(EventKind::Started);

        Ok(session)
    }

    /// Generate a short unique session ID.
    fn generate_id() -> String {
        use std::time::{SystemTime, UNIX_EPOCH};

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(std::time::Duration::ZERO)
            .as_millis();

        let pid = std::process::id();

        // Use thread ID to avoid collisions in tests
        let tid = format!("{:?}", std::thread::current().id());
        let tid_hash = tid
            .bytes()
            .fold(0u32, |acc, x| acc.wrapping_add(u32::from(x)));

        format!(
            "{:x}{:x}{:x}",
            u32::try_from(now).unwrap_or(0),
            pid,
            tid_hash
        )
    }

    /// Returns the path to the control endpoint for this session.
    #[must_use]
    pub fn socket_path(&self) -> PathBuf {
        #[cfg(unix)]
        {
            self.dir.join("control.sock")
        }
        #[cfg(windows)]
        {
            PathBuf::from(format!(r"\\.\pipe\pantograph-{}", self.info.id))
        }
    }

    /// Returns the directory holding per-folder output channels.
    #[must_use]
    pub fn channels_dir(&self) -> PathBuf {
        self.dir.join("channels")
    }

    /// Records that the control socket has been started, so it will be
    /// cleaned up on drop.
    pub fn set_socket_active(&mut self) {
        self.socket_path = Some(self.socket_path());
    }

    /// Broadcast an event to listeners.
    pub fn broadcast(&self, kind: EventKind) {
        let event = SessionEvent {
            timestamp: Utc::now(),
            kind,
        };

        if let Ok(mut file) = self.events_file.lock()
            && let Ok(json) = serde_json::to_string(&event)
        {
            let _ = writeln!(file, "{json}");
            let _ = file.flush();
        }
    }

    /// Get a broadcaster that can be cloned and shared.
    #[must_use]
    pub fn broadcaster(&self) -> EventBroadcaster {
        EventBroadcaster {
            events_file: self.events_file.clone(),
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.broadcast(EventKind::Shutdown);

        // Clean up control socket (Unix only — named pipes are kernel
        // objects cleaned up automatically when all handles close)
        #[cfg(unix)]
        if let Some(ref sock) = self.socket_path {
            let _ = fs::remove_file(sock);
        }

        if let Err(e) = fs::remove_dir_all(&self.dir) {
            warn!("Failed to clean up session directory: {}", e);
        }
    }
}

/// Cloneable broadcaster for sharing across components.
#[derive(Clone)]
pub struct EventBroadcaster {
    events_file: Arc<Mutex<File>>,
}

impl EventBroadcaster {
    /// Broadcast an event.
    pub fn send(&self, kind: EventKind) {
        let event = SessionEvent {
            timestamp: Utc::now(),
            kind,
        };

        if let Ok(mut file) = self.events_file.lock()
            && let Ok(json) = serde_json::to_string(&event)
        {
            let _ = writeln!(file, "{json}");
            let _ = file.flush();
        }
    }

    /// Create a no-op broadcaster (for when session is disabled).
    ///
    /// # Errors
    ///
    /// Returns an error if the null file cannot be opened or created.
    pub fn noop() -> Result<Self> {
        // Create a broadcaster that writes to /dev/null
        let file = OpenOptions::new()
            .write(true)
            .open("/dev/null")
            .or_else(|_| {
                // Fallback for non-Unix systems
                OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(std::env::temp_dir().join(".pantograph_null"))
            })?;
        Ok(Self {
            events_file: Arc::new(Mutex::new(file)),
        })
    }
}

/// A per-folder append-only diagnostic sink.
///
/// The terminal analog of an editor output channel: a line-oriented log
/// file under the session's `channels/` directory, revealed on demand by
/// `pantograph reveal`. Disposal closes the file handle; appends after
/// disposal are dropped.
#[derive(Debug)]
pub struct OutputChannel {
    name: String,
    path: PathBuf,
    file: Option<File>,
}

impl OutputChannel {
    /// Create (or reopen) the channel for a folder inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the channels directory or log file cannot be
    /// created.
    pub fn create(dir: &Path, folder_name: &str) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create channels dir: {}", dir.display()))?;

        let name = sanitize_channel_name(folder_name);
        let path = dir.join(format!("{name}.log"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open output channel: {}", path.display()))?;

        Ok(Self {
            name,
            path,
            file: Some(file),
        })
    }

    /// The channel's display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the backing log file (what `reveal` prints).
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line. Dropped silently after disposal.
    pub fn append(&mut self, line: &str) {
        if let Some(file) = self.file.as_mut() {
            let stamp = Utc::now().format("%H:%M:%S%.3f");
            let _ = writeln!(file, "[{stamp}] {line}");
            let _ = file.flush();
        }
    }

    /// Close the channel. Safe to call more than once.
    pub fn dispose(&mut self) {
        self.file = None;
    }

    /// Whether the channel has been disposed.
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        self.file.is_none()
    }
}

/// Replace path separators and other awkward characters so a folder name
/// can be used as a file name.
fn sanitize_channel_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        "folder".to_string()
    } else {
        trimmed.to_string()
    }
}

/// List all active sessions.
///
/// # Errors
///
/// Returns an error if the sessions directory cannot be read.
pub fn list_sessions() -> Result<Vec<SessionInfo>> {
    let sessions_base = sessions_dir();

    if !sessions_base.exists() {
        return Ok(vec![]);
    }

    let mut sessions = Vec::new();

    for entry in fs::read_dir(&sessions_base)? {
        let entry = entry?;
        let info_path = entry.path().join("info.json");

        if info_path.exists()
            && let Ok(file) = File::open(&info_path)
            && let Ok(info) = serde_json::from_reader::<_, SessionInfo>(file)
        {
            // Check if process is still alive
            if is_process_alive(info.pid) {
                sessions.push(info);
            } else {
                // Clean up dead session
                warn!("Cleaning up dead session {} (pid {})", info.id, info.pid);
                let _ = fs::remove_dir_all(entry.path());
            }
        }
    }

    // Sort by start time (most recent first)
    sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));

    Ok(sessions)
}

/// Get a specific session by ID.
///
/// # Errors
///
/// Returns an error if the session info file exists but cannot be read or parsed.
pub fn get_session(id: &str) -> Result<Option<SessionInfo>> {
    let sessions_base = sessions_dir();
    let info_path = sessions_base.join(id).join("info.json");

    if !info_path.exists() {
        return Ok(None);
    }

    let file = File::open(&info_path)?;
    let info: SessionInfo = serde_json::from_reader(file)?;

    if is_process_alive(info.pid) {
        Ok(Some(info))
    } else {
        // Clean up dead session
        let _ = fs::remove_dir_all(sessions_base.join(id));
        Ok(None)
    }
}

/// Monitor events from a session (blocking iterator).
///
/// # Errors
///
/// Returns an error if the session does not exist or the events file cannot be opened.
pub fn monitor_events(id: &str) -> Result<impl Iterator<Item = SessionEvent>> {
    let sessions_base = sessions_dir();
    let events_path = sessions_base.join(id).join("events.jsonl");

    if !events_path.exists() {
        anyhow::bail!("Session not found: {id}");
    }

    let file = File::open(&events_path)?;
    let reader = BufReader::new(file);

    Ok(reader.lines().filter_map(|line| {
        line.ok()
            .and_then(|l| serde_json::from_str::<SessionEvent>(&l).ok())
    }))
}

/// Tail events from a session (follows new events).
///
/// # Errors
///
/// Returns an error if the session does not exist or the events file cannot be opened.
pub fn tail_events(id: &str) -> Result<TailReader> {
    let sessions_base = sessions_dir();
    let events_path = sessions_base.join(id).join("events.jsonl");

    if !events_path.exists() {
        anyhow::bail!("Session not found: {id}");
    }

    TailReader::new(events_path)
}

/// Reader that tails a file for new content.
pub struct TailReader {
    path: PathBuf,
    reader: BufReader<File>,
    last_size: u64,
}

impl TailReader {
    fn new(path: PathBuf) -> Result<Self> {
        let file = File::open(&path)?;
        let metadata = file.metadata()?;
        let reader = BufReader::new(file);

        Ok(Self {
            path,
            reader,
            last_size: metadata.len(),
        })
    }

    /// Read the next event, blocking if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the file fails.
    pub fn next_event(&mut self) -> Result<Option<SessionEvent>> {
        use std::io::Seek;

        loop {
            let mut line = String::new();
            let bytes_read = self.reader.read_line(&mut line)?;

            if bytes_read > 0 {
                let line = line.trim();
                if !line.is_empty()
                    && let Ok(event) = serde_json::from_str::<SessionEvent>(line)
                {
                    return Ok(Some(event));
                }
            } else {
                // Check if file was truncated or if we should wait
                if let Ok(metadata) = fs::metadata(&self.path) {
                    if metadata.len() < self.last_size {
                        // File was truncated, reopen
                        let file = File::open(&self.path)?;
                        self.reader = BufReader::new(file);
                        self.last_size = 0;
                        continue;
                    }

                    if metadata.len() > self.last_size {
                        // File grew — reset BufReader's EOF state so
                        // it reads new data on the next iteration.
                        self.reader.stream_position()?;
                    }

                    self.last_size = metadata.len();
                } else {
                    // File was deleted, session ended
                    return Ok(None);
                }

                // Wait a bit before checking again
                std::thread::sleep(std::time::Duration::from_millis(100));
            }
        }
    }
}

/// Folders with a live (non-disposed) indicator, read from session events.
///
/// # Errors
///
/// Returns an error if the events file exists but cannot be read.
pub fn active_folders(id: &str) -> Result<Vec<String>> {
    use std::collections::HashMap;

    let sessions_base = sessions_dir();
    let events_path = sessions_base.join(id).join("events.jsonl");

    if !events_path.exists() {
        return Ok(vec![]);
    }

    let file = File::open(&events_path)?;
    let reader = BufReader::new(file);

    // Track indicator states: folder -> state
    let mut states: HashMap<String, String> = HashMap::new();

    for line in reader.lines().map_while(Result::ok) {
        if let Ok(event) = serde_json::from_str::<SessionEvent>(&line)
            && let EventKind::ServerState { folder, state } = event.kind
        {
            if state == "disposed" {
                states.remove(&folder);
            } else {
                states.insert(folder, state);
            }
        }
    }

    let mut folders: Vec<String> = states.keys().cloned().collect();
    folders.sort();
    Ok(folders)
}

/// Check if a process is still running.
fn is_process_alive(pid: u32) -> bool {
    #[cfg(target_os = "linux")]
    {
        // On Linux, checking /proc/<pid> is safe and doesn't require unsafe blocks.
        std::path::Path::new("/proc").join(pid.to_string()).exists()
    }

    #[cfg(all(unix, not(target_os = "linux")))]
    {
        // On other Unix systems, we use the kill command with signal 0.
        // This is safe but slightly slower than a syscall.
        std::process::Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    {
        // On non-Unix, assume alive (could use platform-specific APIs).
        let _ = pid;
        true
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests use unwrap for clear failure messages"
)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn test_session_create_and_list() -> Result<()> {
        let session = Session::create("/tmp/test-workspace")?;
        let id = session.info.id.clone();

        // Should appear in list
        let sessions = list_sessions()?;
        assert!(sessions.iter().any(|s| s.id == id));

        // Should be retrievable
        let found = get_session(&id)?;
        let found_session = found.context("missing session")?;
        assert_eq!(found_session.workspace, "/tmp/test-workspace");

        // Drop session
        drop(session);

        // Should be cleaned up
        let found = get_session(&id)?;
        assert!(found.is_none());
        Ok(())
    }

    #[test]
    fn test_event_broadcast() -> Result<()> {
        let session = Session::create("/tmp/test-events")?;
        let id = session.info.id.clone();

        session.broadcast(EventKind::ServerState {
            folder: "/tmp/app".to_string(),
            state: "initializing".to_string(),
        });

        session.broadcast(EventKind::Declined {
            folder: "/tmp/docs".to_string(),
            reason: "no .gqlconfig found".to_string(),
        });

        // Read events back
        assert!(monitor_events(&id)?.count() >= 2); // Started + our events

        drop(session);
        Ok(())
    }

    #[test]
    fn test_active_folders_empty() -> Result<()> {
        let session = Session::create("/tmp/test-folders-empty")?;
        let id = session.info.id.clone();

        // No server state events, should return empty
        let folders = active_folders(&id)?;
        assert!(folders.is_empty());

        drop(session);
        Ok(())
    }

    #[test]
    fn test_active_folders_tracks_server_state() -> Result<()> {
        let session = Session::create("/tmp/test-folders-state")?;
        let id = session.info.id.clone();

        session.broadcast(EventKind::ServerState {
            folder: "/tmp/app".to_string(),
            state: "initializing".to_string(),
        });

        session.broadcast(EventKind::ServerState {
            folder: "/tmp/app".to_string(),
            state: "running".to_string(),
        });

        let folders = active_folders(&id)?;
        assert_eq!(folders, vec!["/tmp/app"]);

        drop(session);
        Ok(())
    }

    #[test]
    fn test_active_folders_removes_disposed() -> Result<()> {
        let session = Session::create("/tmp/test-folders-disposed")?;
        let id = session.info.id.clone();

        session.broadcast(EventKind::ServerState {
            folder: "/tmp/app".to_string(),
            state: "running".to_string(),
        });

        session.broadcast(EventKind::ServerState {
            folder: "/tmp/app".to_string(),
            state: "disposed".to_string(),
        });

        let folders = active_folders(&id)?;
        assert!(folders.is_empty());

        drop(session);
        Ok(())
    }

    #[test]
    fn test_active_folders_multiple() -> Result<()> {
        let session = Session::create("/tmp/test-folders-multi")?;
        let id = session.info.id.clone();

        session.broadcast(EventKind::ServerState {
            folder: "/tmp/api".to_string(),
            state: "running".to_string(),
        });

        session.broadcast(EventKind::ServerState {
            folder: "/tmp/web".to_string(),
            state: "running".to_string(),
        });

        session.broadcast(EventKind::ServerState {
            folder: "/tmp/cli".to_string(),
            state: "initializing".to_string(),
        });

        let folders = active_folders(&id)?;
        assert_eq!(folders, vec!["/tmp/api", "/tmp/cli", "/tmp/web"]);

        drop(session);
        Ok(())
    }

    #[test]
    fn test_output_channel_append_and_dispose() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("pantograph-chan-{}", std::process::id()));
        let mut channel = OutputChannel::create(&dir, "/tmp/my app")?;

        channel.append("Not activating language-server for this folder.");
        assert!(channel.path().exists());

        let contents = std::fs::read_to_string(channel.path())?;
        assert!(contents.contains("Not activating"));

        channel.dispose();
        assert!(channel.is_disposed());

        // Second dispose is a no-op; appends after disposal are dropped
        channel.dispose();
        channel.append("after dispose");
        let contents = std::fs::read_to_string(channel.path())?;
        assert!(!contents.contains("after dispose"));

        let _ = std::fs::remove_dir_all(&dir);
        Ok(())
    }

    #[test]
    fn test_sanitize_channel_name() {
        assert_eq!(sanitize_channel_name("/tmp/my app"), "tmp_my_app");
        assert_eq!(sanitize_channel_name("api-v2"), "api-v2");
        assert_eq!(sanitize_channel_name("///"), "folder");
    }
}
