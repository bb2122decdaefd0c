// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Pantograph is a workspace-multiplexing supervisor for the GraphQL
//! language server.
//!
//! It keeps one supervised `gql-language-server` process per open
//! workspace folder, reconciling the process set against the editor
//! host's folder list, translating the service's diagnostics into
//! per-folder sinks, and mirroring connection health into a small status
//! surface the host can render.

/// Command-line interface definitions and utilities.
pub mod cli;
/// Configuration handling for the supervised service.
pub mod config;
/// IPC server for editor-host events (folders, focus, status).
pub mod control;
/// Service client, connection handles, and the workspace registry.
pub mod lsp;
/// Session management and event broadcasting.
pub mod session;
/// Per-folder status indicator.
pub mod status;
