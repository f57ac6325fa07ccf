//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! There are two configuration scopes:
//! - **Global**: User-level settings
//! - **Workspace**: Overrides for one working directory
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Workspace config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$PDEF_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/pipeline-defaults/config.toml`
//! 3. `~/.pipeline-defaults/config.toml` (canonical write location)
//!
//! # Workspace Config Location
//!
//! `.pipeline-defaults/config.toml` in the workspace directory.
//!
//! # Example
//!
//! ```no_run
//! use pipeline_defaults::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/path/to/workspace"))).unwrap();
//!
//! println!("Script: {}", config.script_path());
//! println!("Mode: {}", config.mode());
//! println!("Store: {}", config.store_root().unwrap().display());
//! ```

pub mod schema;

pub use schema::{DefaultsMode, GlobalConfig, IndexDefaults, WorkspaceConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::types::DocumentName;
use crate::resolve::DEFAULT_MAX_SCOPE_DEPTH;

/// Directory name used for both global and workspace configuration.
pub const CONFIG_DIR: &str = ".pipeline-defaults";

/// Default number of branches resolved at once while indexing.
pub const DEFAULT_INDEX_CONCURRENCY: usize = 8;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Merged configuration from all sources.
///
/// This struct provides accessor methods that apply precedence rules
/// automatically. Workspace config overrides global config.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Workspace configuration (if present)
    pub workspace: Option<WorkspaceConfig>,
    /// Path to the global config file (if loaded)
    global_path: Option<PathBuf>,
    /// Path to the workspace config file (if loaded)
    workspace_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `workspace` is provided, also loads its workspace config.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed.
    /// Missing config files are not an error (defaults are used).
    pub fn load(workspace: Option<&Path>) -> Result<Config, ConfigError> {
        Self::load_from(Self::find_global().as_deref(), workspace)
    }

    /// Load configuration from an explicit global file.
    ///
    /// `global` may be `None` or point at a missing file; defaults are used
    /// in both cases.
    pub fn load_from(global: Option<&Path>, workspace: Option<&Path>) -> Result<Config, ConfigError> {
        let (global, global_path) = match global.filter(|p| p.exists()) {
            Some(path) => (read_config::<GlobalConfig>(path)?, Some(path.to_path_buf())),
            None => (GlobalConfig::default(), None),
        };

        let (workspace, workspace_path) = match workspace {
            Some(dir) => {
                let path = Self::workspace_config_path(dir);
                if path.exists() {
                    (Some(read_config::<WorkspaceConfig>(&path)?), Some(path))
                } else {
                    (None, None)
                }
            }
            None => (None, None),
        };

        global.validate()?;
        if let Some(ref w) = workspace {
            w.validate()?;
        }

        Ok(Config {
            global,
            workspace,
            global_path,
            workspace_path,
        })
    }

    /// Locate the global config file, if any exists.
    fn find_global() -> Option<PathBuf> {
        // 1. Check $PDEF_CONFIG
        if let Ok(path) = std::env::var("PDEF_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/pipeline-defaults/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("pipeline-defaults/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.pipeline-defaults/config.toml
        let path = Self::global_config_path().ok()?;
        path.exists().then_some(path)
    }

    /// Get the canonical path for global config.
    ///
    /// Returns `~/.pipeline-defaults/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(CONFIG_DIR).join("config.toml"))
    }

    /// Get the path for workspace config.
    pub fn workspace_config_path(dir: &Path) -> PathBuf {
        dir.join(CONFIG_DIR).join("config.toml")
    }

    /// Write global config atomically.
    pub fn write_global(config: &GlobalConfig) -> Result<PathBuf, ConfigError> {
        config.validate()?;
        let path = Self::global_config_path()?;
        write_config_atomic(&path, config)?;
        Ok(path)
    }

    /// Write workspace config atomically.
    pub fn write_workspace(dir: &Path, config: &WorkspaceConfig) -> Result<PathBuf, ConfigError> {
        config.validate()?;
        let path = Self::workspace_config_path(dir);
        write_config_atomic(&path, config)?;
        Ok(path)
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Name of the pipeline definition to resolve.
    ///
    /// Defaults to `Jenkinsfile` if not configured.
    pub fn script_path(&self) -> DocumentName {
        self.workspace
            .as_ref()
            .and_then(|w| w.script_path.as_deref())
            .or(self.global.script_path.as_deref())
            .and_then(|name| DocumentName::new(name).ok())
            .unwrap_or_else(DocumentName::jenkinsfile)
    }

    /// When defaults apply.
    ///
    /// Defaults to `fallback` if not configured.
    pub fn mode(&self) -> DefaultsMode {
        self.workspace
            .as_ref()
            .and_then(|w| w.mode)
            .unwrap_or_default()
    }

    /// Maximum folder depth walked per resolution.
    pub fn max_scope_depth(&self) -> usize {
        self.global
            .max_scope_depth
            .unwrap_or(DEFAULT_MAX_SCOPE_DEPTH)
    }

    /// Whether bound definitions run sandboxed.
    ///
    /// Defaults to `true` if not configured.
    pub fn sandbox(&self) -> bool {
        self.global.sandbox.unwrap_or(true)
    }

    /// Branches resolved at once while indexing.
    pub fn index_concurrency(&self) -> usize {
        self.global
            .index
            .as_ref()
            .and_then(|i| i.concurrency)
            .unwrap_or(DEFAULT_INDEX_CONCURRENCY)
    }

    /// Root directory of the file-backed store.
    ///
    /// Defaults to `~/.pipeline-defaults/store`.
    pub fn store_root(&self) -> Result<PathBuf, ConfigError> {
        if let Some(root) = self
            .workspace
            .as_ref()
            .and_then(|w| w.store_root.clone())
            .or_else(|| self.global.store_root.clone())
        {
            return Ok(root);
        }
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(CONFIG_DIR).join("store"))
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded workspace config file.
    pub fn workspace_config_loaded_from(&self) -> Option<&Path> {
        self.workspace_path.as_deref()
    }
}

fn read_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Write a config file atomically (temp file in the same directory, then rename).
fn write_config_atomic<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let contents =
        toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

    let temp_path = path.with_extension("toml.tmp");
    let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
        path: temp_path.clone(),
        source: e,
    })?;

    file.write_all(contents.as_bytes())
        .and_then(|_| file.sync_all())
        .map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

    fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })?;

    Ok(())
}
