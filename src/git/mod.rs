//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. No other module should
//! import `git2`. Access is read-only: branch discovery lists branches and
//! probes their trees, the local scheduler resolves a branch tip and reads
//! files from it.
//!
//! # Invariants
//!
//! - No other module calls git2 directly
//! - All operations return strong types (Oid, BranchName)
//! - A [`Git`] handle never crosses an await point
//!
//! # Example
//!
//! ```ignore
//! use pipeline_defaults::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! for branch in git.list_branches()? {
//!     let tip = git.branch_tip(&branch)?;
//!     let has_script = git.file_exists_at(&tip, "Jenkinsfile")?;
//!     println!("{branch} {} {has_script}", tip.short(7));
//! }
//! ```

mod interface;

pub use interface::{Git, GitError};
