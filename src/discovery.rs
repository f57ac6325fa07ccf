//! discovery
//!
//! Branch discovery for multibranch projects.
//!
//! A [`BranchSource`] lists the branches of a repository together with the
//! checkout context each should be built from, and whether the branch
//! carries its own pipeline definition. [`GitBranchSource`] does this for a
//! local git repository.
//!
//! # Filtering
//!
//! Branch names are filtered by space-separated include and exclude
//! wildcard lists, where `*` matches any run of characters (including `/`).
//! A branch is kept when it matches some include and no exclude. The default
//! include is `*`.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::types::{BranchName, DocumentName, RepoRef, TypeError};
use crate::git::{Git, GitError};
use crate::resolve::CheckoutContext;

/// Errors from branch discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Reading the repository failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// The repository location is not usable.
    #[error(transparent)]
    InvalidRepo(#[from] TypeError),

    /// The discovery task died.
    #[error("discovery task failed: {0}")]
    Task(String),
}

/// A branch found by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredBranch {
    /// Where to build the branch from
    pub checkout: CheckoutContext,
    /// Whether the branch has its own definition file
    pub has_definition: bool,
}

/// Something that can list a project's branches.
#[async_trait]
pub trait BranchSource: Send + Sync {
    /// Get a human-readable name for this source.
    fn name(&self) -> &'static str;

    /// List branches, sorted by name, probing each for `script_path`.
    async fn discover(
        &self,
        script_path: &DocumentName,
    ) -> Result<Vec<DiscoveredBranch>, DiscoveryError>;
}

/// Include/exclude wildcard filter over branch names.
///
/// # Example
///
/// ```
/// use pipeline_defaults::discovery::BranchFilter;
///
/// let filter = BranchFilter::new("master feature/*", "feature/wip-*");
/// assert!(filter.matches("master"));
/// assert!(filter.matches("feature/login"));
/// assert!(!filter.matches("feature/wip-login"));
/// assert!(!filter.matches("release"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchFilter {
    includes: Vec<String>,
    excludes: Vec<String>,
}

impl Default for BranchFilter {
    fn default() -> Self {
        Self::new("*", "")
    }
}

impl BranchFilter {
    /// Build a filter from space-separated pattern lists.
    pub fn new(includes: &str, excludes: &str) -> Self {
        let split = |s: &str| s.split_whitespace().map(str::to_string).collect::<Vec<_>>();
        Self {
            includes: split(includes),
            excludes: split(excludes),
        }
    }

    /// Check whether `name` passes the filter.
    pub fn matches(&self, name: &str) -> bool {
        self.includes.iter().any(|p| wildcard_match(p, name))
            && !self.excludes.iter().any(|p| wildcard_match(p, name))
    }
}

/// Match `name` against `pattern`, where `*` matches any run of characters.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    // Greedy match with backtracking to the most recent '*'.
    let (mut p, mut n) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, n));
            p += 1;
        } else if p < pattern.len() && pattern[p] == name[n] {
            p += 1;
            n += 1;
        } else if let Some((sp, sn)) = star {
            p = sp + 1;
            n = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Branch source over a local git repository.
#[derive(Debug, Clone)]
pub struct GitBranchSource {
    path: PathBuf,
    repo: RepoRef,
    filter: BranchFilter,
}

impl GitBranchSource {
    /// Source for the repository at `path`, including every branch.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError::InvalidRepo` if `path` is empty.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, DiscoveryError> {
        let path = path.into();
        let repo = RepoRef::new(path.display().to_string())?;
        Ok(Self {
            path,
            repo,
            filter: BranchFilter::default(),
        })
    }

    /// Replace the branch filter.
    pub fn with_filter(mut self, filter: BranchFilter) -> Self {
        self.filter = filter;
        self
    }

    /// The repository reference handed to checkouts.
    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }
}

#[async_trait]
impl BranchSource for GitBranchSource {
    fn name(&self) -> &'static str {
        "git"
    }

    async fn discover(
        &self,
        script_path: &DocumentName,
    ) -> Result<Vec<DiscoveredBranch>, DiscoveryError> {
        let path = self.path.clone();
        let repo = self.repo.clone();
        let filter = self.filter.clone();
        let script = script_path.as_str().to_string();

        tokio::task::spawn_blocking(move || -> Result<Vec<DiscoveredBranch>, DiscoveryError> {
            let git = Git::open(&path)?;
            let mut found = Vec::new();

            for branch in git.list_branches()? {
                if !filter.matches(branch.as_str()) {
                    tracing::debug!(%branch, "branch excluded by filter");
                    continue;
                }
                let head = git.branch_tip(&branch)?;
                let has_definition = git.file_exists_at(&head, &script)?;
                found.push(DiscoveredBranch {
                    checkout: CheckoutContext::new(repo.clone(), branch, Some(head)),
                    has_definition,
                });
            }

            Ok(found)
        })
        .await
        .map_err(|e| DiscoveryError::Task(e.to_string()))?
    }
}

/// Sort branches by name.
pub(crate) fn sort_by_branch(branches: &mut [DiscoveredBranch]) {
    branches.sort_by(|a, b| a.checkout.branch.cmp(&b.checkout.branch));
}

/// Branch names of `branches`, for logging.
pub(crate) fn branch_names(branches: &[DiscoveredBranch]) -> Vec<&BranchName> {
    branches.iter().map(|b| &b.checkout.branch).collect()
}
