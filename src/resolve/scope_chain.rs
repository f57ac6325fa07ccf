//! resolve::scope_chain
//!
//! The ordered list of scopes searched for a project.
//!
//! # Algorithm
//!
//! Start at the project's own folder (if nested) and follow parent pointers
//! upward, appending each ancestor in order of increasing distance. `Global`
//! is appended last, exactly once, whether or not any folders were found.
//!
//! The walk keeps a visited set and a depth cap, so a host that registered
//! a cyclic or absurdly deep topology gets an error instead of a hang.

use std::collections::HashSet;

use thiserror::Error;

use crate::core::document::Scope;
use crate::core::folders::{ContainerTopology, Project};
use crate::core::types::ContainerId;

/// Default cap on the number of folder scopes in one chain.
pub const DEFAULT_MAX_SCOPE_DEPTH: usize = 64;

/// Errors computing a scope chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeChainError {
    /// The folder ancestry loops back on itself.
    #[error("folder ancestry of '{project}' loops at '{container}'")]
    Cycle {
        /// Project being resolved
        project: String,
        /// First folder seen twice
        container: ContainerId,
    },

    /// The folder ancestry is deeper than allowed.
    #[error("folder ancestry of '{project}' exceeds {limit} levels")]
    DepthExceeded {
        /// Project being resolved
        project: String,
        /// The configured cap
        limit: usize,
    },
}

/// Scopes in resolution order: most specific first, `Global` last.
///
/// # Example
///
/// ```
/// use pipeline_defaults::core::document::Scope;
/// use pipeline_defaults::core::folders::{PathTopology, Project};
/// use pipeline_defaults::resolve::ScopeChain;
///
/// let project = Project::from_full_name("org/team/p").unwrap();
/// let chain = ScopeChain::compute(&project, &PathTopology).unwrap();
///
/// let scopes: Vec<String> = chain.iter().map(|s| s.to_string()).collect();
/// assert_eq!(scopes, vec!["folder:org/team", "folder:org", "global"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeChain {
    scopes: Vec<Scope>,
}

impl ScopeChain {
    /// Compute the chain with [`DEFAULT_MAX_SCOPE_DEPTH`].
    pub fn compute(
        project: &Project,
        topology: &dyn ContainerTopology,
    ) -> Result<Self, ScopeChainError> {
        Self::compute_with_limit(project, topology, DEFAULT_MAX_SCOPE_DEPTH)
    }

    /// Compute the chain allowing at most `max_depth` folder scopes.
    pub fn compute_with_limit(
        project: &Project,
        topology: &dyn ContainerTopology,
        max_depth: usize,
    ) -> Result<Self, ScopeChainError> {
        let mut scopes = Vec::new();
        let mut visited = HashSet::new();
        let mut current = project.folder().cloned();

        while let Some(container) = current {
            if !visited.insert(container.clone()) {
                return Err(ScopeChainError::Cycle {
                    project: project.full_name(),
                    container,
                });
            }
            if scopes.len() == max_depth {
                return Err(ScopeChainError::DepthExceeded {
                    project: project.full_name(),
                    limit: max_depth,
                });
            }
            current = topology.parent_of(&container);
            scopes.push(Scope::Container(container));
        }

        scopes.push(Scope::Global);
        Ok(Self { scopes })
    }

    /// The scopes in order.
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Iterate the scopes in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Scope> {
        self.scopes.iter()
    }

    /// Number of scopes, `Global` included.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Always false; a chain holds at least `Global`.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl<'a> IntoIterator for &'a ScopeChain {
    type Item = &'a Scope;
    type IntoIter = std::slice::Iter<'a, Scope>;

    fn into_iter(self) -> Self::IntoIter {
        self.scopes.iter()
    }
}

impl std::fmt::Display for ScopeChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.scopes.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join(" -> "))
    }
}
