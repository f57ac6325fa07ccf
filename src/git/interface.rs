//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to all Git operations.
//! Branch discovery and the local scheduler's checkout step both read the
//! repository through it, and errors are normalized into typed categories.
//!
//! # Architecture
//!
//! The `Git` struct is the only way to interact with a Git repository.
//! No other module should import `git2` directly. A `Git` handle is not
//! `Sync`; async callers open one per blocking section and drop it before
//! the next await.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::RefNotFound`]: Requested ref does not exist
//! - [`GitError::ObjectNotFound`]: Requested object does not exist
//! - [`GitError::PathNotFound`]: Requested file is absent from a commit
//!
//! # Example
//!
//! ```ignore
//! use pipeline_defaults::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let oid = git.resolve_ref("refs/heads/main")?;
//! println!("main is at {}", oid.short(7));
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::{BranchName, Oid, TypeError};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// File not present in a commit's tree.
    #[error("path '{path}' not found in commit {commit}")]
    PathNotFound {
        /// The commit searched
        commit: String,
        /// The path that was not found
        path: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// Blob content is not valid UTF-8.
    #[error("blob is not valid UTF-8: {oid}")]
    InvalidUtf8 {
        /// The OID of the blob
        oid: String,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") || context == "HEAD" {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::UnbornBranch => GitError::RefNotFound {
                refname: context.to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            TypeError::InvalidBranchName(msg) => GitError::InvalidRefName { message: msg },
            other => GitError::Internal {
                message: other.to_string(),
            },
        }
    }
}

/// The Git interface.
///
/// Wraps a git2 repository handle. Read-only: this crate never writes to
/// the repositories it indexes.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover` to find the repository root,
    /// so `path` can be any directory within the repository. Bare
    /// repositories are accepted since only committed content is read.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        Ok(Self { repo })
    }

    // =========================================================================
    // Ref Resolution
    // =========================================================================

    /// Resolve a ref to its target commit OID.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if the ref doesn't exist
    pub fn resolve_ref(&self, refname: &str) -> Result<Oid, GitError> {
        let reference = self
            .repo
            .find_reference(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;

        let oid = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname))?
            .id();

        Oid::new(oid.to_string()).map_err(|e| e.into())
    }

    /// Resolve a ref, returning None if it doesn't exist.
    pub fn try_resolve_ref(&self, refname: &str) -> Result<Option<Oid>, GitError> {
        match self.resolve_ref(refname) {
            Ok(oid) => Ok(Some(oid)),
            Err(GitError::RefNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get HEAD commit OID.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if HEAD is unborn (new repository)
    pub fn head_oid(&self) -> Result<Oid, GitError> {
        let head = self
            .repo
            .head()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;

        let oid = head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?
            .id();

        Oid::new(oid.to_string()).map_err(|e| e.into())
    }

    /// Tip commit of a local branch.
    pub fn branch_tip(&self, branch: &BranchName) -> Result<Oid, GitError> {
        self.resolve_ref(&branch.ref_name())
    }

    /// List all local branches, sorted by name.
    ///
    /// Branches whose names fail validation are skipped.
    pub fn list_branches(&self) -> Result<Vec<BranchName>, GitError> {
        let branches = self
            .repo
            .branches(Some(git2::BranchType::Local))
            .map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;

        let mut names = Vec::new();
        for branch in branches {
            let (branch, _) = branch.map_err(|e| GitError::Internal {
                message: e.message().to_string(),
            })?;
            if let Some(name) = branch.name().ok().flatten() {
                if let Ok(branch_name) = BranchName::new(name) {
                    names.push(branch_name);
                }
            }
        }

        names.sort();
        Ok(names)
    }

    // =========================================================================
    // Tree Content
    // =========================================================================

    /// Read a file from a commit's tree.
    ///
    /// Returns `None` if the path does not exist in the commit or names a
    /// directory.
    ///
    /// # Errors
    ///
    /// - [`GitError::ObjectNotFound`] if the commit doesn't exist
    pub fn read_file_at(&self, commit: &Oid, path: &str) -> Result<Option<Vec<u8>>, GitError> {
        let git_oid = git2::Oid::from_str(commit.as_str())
            .map_err(|e| GitError::from_git2(e, commit.as_str()))?;

        let tree = self
            .repo
            .find_commit(git_oid)
            .and_then(|c| c.tree())
            .map_err(|e| GitError::from_git2(e, commit.as_str()))?;

        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, path)),
        };

        if entry.kind() != Some(git2::ObjectType::Blob) {
            return Ok(None);
        }

        let blob = self
            .repo
            .find_blob(entry.id())
            .map_err(|e| GitError::from_git2(e, &entry.id().to_string()))?;

        Ok(Some(blob.content().to_vec()))
    }

    /// Read a file from a commit's tree as UTF-8.
    ///
    /// # Errors
    ///
    /// - [`GitError::PathNotFound`] if the file is absent
    /// - [`GitError::InvalidUtf8`] if the content is not UTF-8
    pub fn read_file_string_at(&self, commit: &Oid, path: &str) -> Result<String, GitError> {
        let content = self
            .read_file_at(commit, path)?
            .ok_or_else(|| GitError::PathNotFound {
                commit: commit.to_string(),
                path: path.to_string(),
            })?;

        String::from_utf8(content).map_err(|_| GitError::InvalidUtf8 {
            oid: format!("{}:{}", commit, path),
        })
    }

    /// Check whether a commit contains a file at `path`.
    pub fn file_exists_at(&self, commit: &Oid, path: &str) -> Result<bool, GitError> {
        Ok(self.read_file_at(commit, path)?.is_some())
    }
}
