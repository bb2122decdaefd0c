// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

/// Low-level client for one language-service process.
pub mod client;
/// Per-folder connection handle with single-shot disposal.
pub mod handle;
/// Service message protocol definitions.
pub mod protocol;
/// Workspace client registry and reconciliation.
pub mod registry;
/// Shared identity and lifecycle types.
pub mod state;

pub use client::ServiceClient;
pub use handle::{Activation, ConnectionHandle};
pub use registry::{ClientRegistry, FolderSnapshot, ReconcileSummary};
pub use state::{ClientState, ServiceEvent, ServiceEventKind, WorkspaceKey};
