//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$PDEF_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/pipeline-defaults/config.toml`
//! 3. `~/.pipeline-defaults/config.toml` (canonical write location)
//!
//! # Workspace Config
//!
//! Located at `.pipeline-defaults/config.toml` in the working directory.
//!
//! # Validation
//!
//! Config values are validated after parsing (e.g., `script_path` must be a
//! valid document name).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::DocumentName;

/// Upper bound accepted for `max_scope_depth`.
pub const MAX_SCOPE_DEPTH_LIMIT: usize = 1024;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// store_root = "/srv/pipeline-defaults"
/// script_path = "Jenkinsfile"
/// max_scope_depth = 64
/// sandbox = true
///
/// [index]
/// concurrency = 8
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Root directory of the file-backed document store
    pub store_root: Option<PathBuf>,

    /// Name of the pipeline definition to look for
    pub script_path: Option<String>,

    /// Maximum folder nesting walked when computing a scope chain
    pub max_scope_depth: Option<usize>,

    /// Run bound definitions sandboxed
    pub sandbox: Option<bool>,

    /// Branch indexing defaults
    pub index: Option<IndexDefaults>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_script_path(self.script_path.as_deref())?;

        if let Some(depth) = self.max_scope_depth {
            if depth == 0 || depth > MAX_SCOPE_DEPTH_LIMIT {
                return Err(ConfigError::InvalidValue(format!(
                    "max_scope_depth must be between 1 and {}, got {}",
                    MAX_SCOPE_DEPTH_LIMIT, depth
                )));
            }
        }

        if let Some(index) = &self.index {
            index.validate()?;
        }

        Ok(())
    }
}

/// Workspace configuration.
///
/// # Example
///
/// ```toml
/// script_path = "Jenkinsfile"
/// mode = "override"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Name of the pipeline definition to look for
    pub script_path: Option<String>,

    /// When defaults apply
    pub mode: Option<DefaultsMode>,

    /// Root directory of the file-backed document store
    pub store_root: Option<PathBuf>,
}

impl WorkspaceConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_script_path(self.script_path.as_deref())
    }
}

/// When a default definition is used for a branch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DefaultsMode {
    /// Only for branches without their own definition
    #[default]
    Fallback,
    /// For every branch, ignoring any in-repo definition
    Override,
}

impl std::fmt::Display for DefaultsMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefaultsMode::Fallback => write!(f, "fallback"),
            DefaultsMode::Override => write!(f, "override"),
        }
    }
}

/// Branch indexing defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct IndexDefaults {
    /// Maximum branches resolved at once
    pub concurrency: Option<usize>,
}

impl IndexDefaults {
    /// Validate the indexing defaults.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == Some(0) {
            return Err(ConfigError::InvalidValue(
                "index.concurrency must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_script_path(script_path: Option<&str>) -> Result<(), ConfigError> {
    if let Some(path) = script_path {
        DocumentName::new(path).map_err(|e| {
            ConfigError::InvalidValue(format!("invalid script_path: {}", e))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    mod global_config {
        use super::*;

        #[test]
        fn defaults() {
            let config = GlobalConfig::default();
            assert!(config.store_root.is_none());
            assert!(config.script_path.is_none());
            assert!(config.validate().is_ok());
        }

        #[test]
        fn zero_depth_rejected() {
            let config = GlobalConfig {
                max_scope_depth: Some(0),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn excessive_depth_rejected() {
            let config = GlobalConfig {
                max_scope_depth: Some(MAX_SCOPE_DEPTH_LIMIT + 1),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn zero_concurrency_rejected() {
            let config = GlobalConfig {
                index: Some(IndexDefaults {
                    concurrency: Some(0),
                }),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn parses_full_file() {
            let config: GlobalConfig = toml::from_str(
                r#"
                store_root = "/srv/defaults"
                script_path = "Jenkinsfile"
                max_scope_depth = 8
                sandbox = false

                [index]
                concurrency = 4
                "#,
            )
            .unwrap();
            assert!(config.validate().is_ok());
            assert_eq!(config.max_scope_depth, Some(8));
            assert_eq!(config.index.unwrap().concurrency, Some(4));
        }
    }

    mod workspace_config {
        use super::*;

        #[test]
        fn invalid_script_path() {
            let config = WorkspaceConfig {
                script_path: Some("ci/Jenkinsfile".to_string()),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn parses_mode() {
            let config: WorkspaceConfig = toml::from_str("mode = \"override\"").unwrap();
            assert_eq!(config.mode, Some(DefaultsMode::Override));
        }

        #[test]
        fn reject_unknown_fields() {
            let result: Result<WorkspaceConfig, _> = toml::from_str("trunk = \"main\"");
            assert!(result.is_err());
        }
    }
}
