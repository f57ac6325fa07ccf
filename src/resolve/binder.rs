//! resolve::binder
//!
//! Pairs a resolved default definition with a branch's checkout context.
//!
//! The bound definition substitutes only the script. The repository, branch
//! and head commit stay the branch's own, so `checkout scm` inside a default
//! script checks out the branch being built, not wherever the default came
//! from.

use thiserror::Error;

use super::resolver::{Resolution, ResolvedDefinition};
use crate::core::document::{Document, Scope};
use crate::core::types::{BranchName, Oid, RepoRef};

/// Where a branch's sources come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutContext {
    /// Repository location
    pub repo: RepoRef,
    /// Branch being built
    pub branch: BranchName,
    /// Commit the branch pointed at when discovered, if known
    pub head: Option<Oid>,
}

impl CheckoutContext {
    /// Create a checkout context.
    pub fn new(repo: RepoRef, branch: BranchName, head: Option<Oid>) -> Self {
        Self { repo, branch, head }
    }
}

/// Errors from binding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// There was nothing to bind.
    #[error("no default definition to bind for branch '{branch}'")]
    Absent {
        /// Branch the binding was attempted for
        branch: BranchName,
    },
}

/// A default definition ready to run for one branch.
///
/// Deliberately not `Clone`: each triggered run consumes exactly one.
#[derive(Debug)]
pub struct BoundDefinition {
    definition: ResolvedDefinition,
    checkout: CheckoutContext,
    sandbox: bool,
}

impl BoundDefinition {
    /// Script text to execute.
    pub fn script(&self) -> &str {
        self.definition.document().content()
    }

    /// The resolved document.
    pub fn document(&self) -> &Document {
        self.definition.document()
    }

    /// Scope the definition was resolved from.
    pub fn source_scope(&self) -> &Scope {
        self.definition.source_scope()
    }

    /// The branch's own checkout context.
    pub fn checkout(&self) -> &CheckoutContext {
        &self.checkout
    }

    /// Whether the script runs sandboxed.
    pub fn sandbox(&self) -> bool {
        self.sandbox
    }
}

/// Binds resolutions to checkout contexts.
///
/// # Example
///
/// ```
/// use pipeline_defaults::core::types::{BranchName, RepoRef};
/// use pipeline_defaults::resolve::{BindingError, BranchDefinitionBinder, CheckoutContext, Resolution};
///
/// let checkout = CheckoutContext::new(
///     RepoRef::new("/srv/repo").unwrap(),
///     BranchName::new("master").unwrap(),
///     None,
/// );
///
/// let err = BranchDefinitionBinder::new().bind(Resolution::Absent, checkout).unwrap_err();
/// assert!(matches!(err, BindingError::Absent { .. }));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BranchDefinitionBinder {
    sandbox: bool,
}

impl Default for BranchDefinitionBinder {
    fn default() -> Self {
        Self { sandbox: true }
    }
}

impl BranchDefinitionBinder {
    /// A binder producing sandboxed definitions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sandbox flag for bound definitions.
    pub fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Bind `resolution` to `checkout`.
    ///
    /// # Errors
    ///
    /// [`BindingError::Absent`] if the resolution found nothing.
    pub fn bind(
        &self,
        resolution: Resolution,
        checkout: CheckoutContext,
    ) -> Result<BoundDefinition, BindingError> {
        match resolution {
            Resolution::Found(definition) => Ok(BoundDefinition {
                definition,
                checkout,
                sandbox: self.sandbox,
            }),
            Resolution::Absent => Err(BindingError::Absent {
                branch: checkout.branch,
            }),
        }
    }
}
