// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Mark Wells <contact@markwells.dev>

//! Configuration handling for the supervised GraphQL language service.
//!
//! Settings layer file config (`~/.config/pantograph/config.toml`), an
//! explicit `--config` file, and `PANTOGRAPH__*` environment variables.
//! Per-folder overrides let one workspace run a different service build
//! or log level than the rest.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Marker file the service looks for to decide whether a folder is a
/// GraphQL project at all. Folders without it are never activated.
pub const GQL_CONFIG_FILE: &str = ".gqlconfig";

/// Top-level configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    /// Service settings applied to every folder unless overridden.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Per-folder overrides keyed by absolute folder path.
    #[serde(default)]
    pub folder: HashMap<String, ServiceOverrides>,
}

/// Settings for launching the language service for one folder.
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    /// The service executable (e.g., "gql-language-server").
    #[serde(default = "default_command")]
    pub command: String,

    /// Extra arguments appended after the generated ones.
    #[serde(default)]
    pub args: Vec<String>,

    /// Service log level.
    #[serde(default = "default_loglevel")]
    pub loglevel: String,

    /// Where the folder's `gql` module lives, relative to the folder
    /// unless absolute.
    #[serde(default = "default_gql_path")]
    pub gql_path: String,

    /// Whether the service should use watchman for file watching.
    #[serde(default = "default_true")]
    pub watchman: bool,

    /// Whether the service may download the `gql` module itself.
    #[serde(default)]
    pub auto_download: bool,
}

/// Optional per-folder overrides; unset fields fall back to [`Config::service`].
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ServiceOverrides {
    /// Override the service executable.
    pub command: Option<String>,
    /// Override the extra arguments.
    pub args: Option<Vec<String>>,
    /// Override the log level.
    pub loglevel: Option<String>,
    /// Override the `gql` module location.
    pub gql_path: Option<String>,
    /// Override watchman usage.
    pub watchman: Option<bool>,
    /// Override auto-download.
    pub auto_download: Option<bool>,
}

fn default_command() -> String {
    "gql-language-server".to_string()
}

fn default_loglevel() -> String {
    "info".to_string()
}

fn default_gql_path() -> String {
    ".".to_string()
}

const fn default_true() -> bool {
    true
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: Vec::new(),
            loglevel: default_loglevel(),
            gql_path: default_gql_path(),
            watchman: true,
            auto_download: false,
        }
    }
}

impl Config {
    /// Load configuration from standard paths or a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if a config source fails to parse or deserialize.
    pub fn load(explicit_file: Option<PathBuf>) -> Result<Self> {
        let mut builder = config::Config::builder();

        // 1. Load from user config directory (~/.config/pantograph/config.toml)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("pantograph").join("config.toml");
            if config_path.exists() {
                builder = builder.add_source(config::File::from(config_path));
            }
        }

        // 2. Load from explicit file if provided
        if let Some(path) = explicit_file {
            builder = builder.add_source(config::File::from(path));
        }

        // 3. Load from environment variables (PANTOGRAPH__SERVICE__LOGLEVEL, etc.)
        builder = builder.add_source(
            config::Environment::with_prefix("PANTOGRAPH")
                .prefix_separator("__")
                .separator("__"),
        );

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Resolve the effective service settings for a folder, applying any
    /// per-folder overrides.
    #[must_use]
    pub fn service_for(&self, root: &Path) -> ServiceConfig {
        let mut resolved = self.service.clone();

        if let Some(overrides) = self.folder.get(&root.display().to_string()) {
            if let Some(command) = &overrides.command {
                resolved.command = command.clone();
            }
            if let Some(args) = &overrides.args {
                resolved.args = args.clone();
            }
            if let Some(loglevel) = &overrides.loglevel {
                resolved.loglevel = loglevel.clone();
            }
            if let Some(gql_path) = &overrides.gql_path {
                resolved.gql_path = gql_path.clone();
            }
            if let Some(watchman) = overrides.watchman {
                resolved.watchman = watchman;
            }
            if let Some(auto_download) = overrides.auto_download {
                resolved.auto_download = auto_download;
            }
        }

        resolved
    }
}

impl ServiceConfig {
    /// Build the service command line for one folder.
    ///
    /// The generated arguments mirror the service CLI contract:
    /// config directory, `gql` module path, log level, and feature
    /// toggles, followed by any user-supplied extras.
    #[must_use]
    pub fn launch_args(&self, root: &Path) -> Vec<String> {
        let mut args = vec![
            format!("--config-dir={}", root.display()),
            format!("--gql-path={}", resolve_path(&self.gql_path, root).display()),
            format!("--loglevel={}", self.loglevel),
            format!("--watchman={}", self.watchman),
            format!("--auto-download-gql={}", self.auto_download),
        ];
        args.extend(self.args.iter().cloned());
        args
    }
}

/// Resolve a possibly-relative path with respect to a workspace folder.
fn resolve_path(path: &str, folder: &Path) -> PathBuf {
    let p = PathBuf::from(path);
    if p.is_absolute() { p } else { folder.join(p) }
}

/// Why a folder was not activated.
#[derive(Debug, thiserror::Error)]
pub enum ActivationProbe {
    /// No marker file in the folder — the expected outcome for folders
    /// that simply aren't GraphQL projects.
    #[error("no .gqlconfig file found in path: {dir}")]
    NotFound {
        /// The probed folder.
        dir: String,
    },
    /// The marker exists but cannot be read.
    #[error(".gqlconfig in {dir} is not readable: {source}")]
    Unreadable {
        /// The probed folder.
        dir: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Check whether the service would activate for a folder: its
/// `.gqlconfig` must exist and be readable.
///
/// # Errors
///
/// Returns [`ActivationProbe`] describing why the folder was declined.
pub fn find_gql_config(dir: &Path) -> Result<PathBuf, ActivationProbe> {
    let path = dir.join(GQL_CONFIG_FILE);

    if !path.exists() {
        return Err(ActivationProbe::NotFound {
            dir: dir.display().to_string(),
        });
    }

    match std::fs::File::open(&path) {
        Ok(_) => Ok(path),
        Err(source) => Err(ActivationProbe::Unreadable {
            dir: dir.display().to_string(),
            source,
        }),
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    reason = "Tests use unwrap for clear failure messages"
)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.service.command, "gql-language-server");
        assert_eq!(config.service.loglevel, "info");
        assert_eq!(config.service.gql_path, ".");
        assert!(config.service.watchman);
        assert!(!config.service.auto_download);
        assert!(config.folder.is_empty());
    }

    #[test]
    fn test_deserialize_with_overrides() {
        let toml = r#"
            [service]
            command = "gql-ls"
            loglevel = "debug"

            [folder."/work/api"]
            loglevel = "error"
            watchman = false
        "#;
        let config: Config = toml::from_str(toml).unwrap();

        let base = config.service_for(Path::new("/work/web"));
        assert_eq!(base.command, "gql-ls");
        assert_eq!(base.loglevel, "debug");
        assert!(base.watchman);

        let overridden = config.service_for(Path::new("/work/api"));
        assert_eq!(overridden.command, "gql-ls");
        assert_eq!(overridden.loglevel, "error");
        assert!(!overridden.watchman);
    }

    #[test]
    fn test_launch_args_shape() {
        let service = ServiceConfig::default();
        let args = service.launch_args(Path::new("/work/api"));

        assert_eq!(args[0], "--config-dir=/work/api");
        assert_eq!(args[1], "--gql-path=/work/api/.");
        assert_eq!(args[2], "--loglevel=info");
        assert_eq!(args[3], "--watchman=true");
        assert_eq!(args[4], "--auto-download-gql=false");
    }

    #[test]
    fn test_launch_args_absolute_gql_path() {
        let service = ServiceConfig {
            gql_path: "/opt/gql".to_string(),
            ..ServiceConfig::default()
        };
        let args = service.launch_args(Path::new("/work/api"));
        assert_eq!(args[1], "--gql-path=/opt/gql");
    }

    #[test]
    fn test_launch_args_appends_extras() {
        let service = ServiceConfig {
            args: vec!["--experimental".to_string()],
            ..ServiceConfig::default()
        };
        let args = service.launch_args(Path::new("/w"));
        assert_eq!(args.last().map(String::as_str), Some("--experimental"));
    }

    #[test]
    fn test_find_gql_config_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_gql_config(dir.path()).unwrap_err();
        assert!(matches!(err, ActivationProbe::NotFound { .. }));
        assert!(err.to_string().contains(".gqlconfig"));
    }

    #[test]
    fn test_find_gql_config_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(GQL_CONFIG_FILE), "{ schema: {} }").unwrap();

        let found = find_gql_config(dir.path()).unwrap();
        assert!(found.ends_with(GQL_CONFIG_FILE));
    }
}
