//! core::paths
//!
//! Centralized path routing for the file-backed document store.
//!
//! # Storage Layout
//!
//! All documents live under a single store root:
//! - `global/documents.toml` - Global scope
//! - `folders/<id path>/documents.toml` - One file per folder scope
//! - `lock` - Exclusive writer lock
//!
//! **Hard rule:** No code outside this module computes store paths.
//! Container ids are validated so their components can never escape the root.
//!
//! # Example
//!
//! ```
//! use pipeline_defaults::core::document::Scope;
//! use pipeline_defaults::core::paths::StorePaths;
//! use std::path::PathBuf;
//!
//! let paths = StorePaths::new(PathBuf::from("/srv/defaults"));
//!
//! assert_eq!(
//!     paths.documents_path(&Scope::Global),
//!     PathBuf::from("/srv/defaults/global/documents.toml")
//! );
//! assert_eq!(
//!     paths.documents_path(&"folder:team/backend".parse().unwrap()),
//!     PathBuf::from("/srv/defaults/folders/team/backend/documents.toml")
//! );
//! ```

use std::path::{Path, PathBuf};

use super::document::Scope;

/// File name holding the documents of one scope.
pub const DOCUMENTS_FILE: &str = "documents.toml";

/// Path routing for a store root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    root: PathBuf,
}

impl StorePaths {
    /// Create paths rooted at `root`.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// The store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the global scope.
    pub fn global_dir(&self) -> PathBuf {
        self.root.join("global")
    }

    /// Directory holding all folder scopes.
    pub fn folders_dir(&self) -> PathBuf {
        self.root.join("folders")
    }

    /// Directory for one scope.
    pub fn scope_dir(&self, scope: &Scope) -> PathBuf {
        match scope {
            Scope::Global => self.global_dir(),
            Scope::Container(id) => id
                .components()
                .fold(self.folders_dir(), |dir, component| dir.join(component)),
        }
    }

    /// The documents file for one scope.
    pub fn documents_path(&self, scope: &Scope) -> PathBuf {
        self.scope_dir(scope).join(DOCUMENTS_FILE)
    }

    /// The writer lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.root.join("lock")
    }
}
