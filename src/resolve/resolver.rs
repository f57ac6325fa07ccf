//! resolve::resolver
//!
//! First-match resolution of a named definition across a scope chain.
//!
//! # Algorithm
//!
//! 1. Compute the project's [`ScopeChain`] (synchronously, no await)
//! 2. For each scope in order, `get` the scope's documents from the store
//! 3. The first document whose name equals the requested name wins; later
//!    scopes are not queried
//!
//! # Failure Semantics
//!
//! A store failure in one scope does not stop the walk. If a later scope
//! matches, the match is returned and the earlier failures are logged. If
//! nothing matches and any scope failed, the failures are returned together
//! as a [`ResolutionError`]. "Nothing stored anywhere" is
//! [`Resolution::Absent`], not an error.
//!
//! # Concurrency
//!
//! The resolver holds only `Arc`s to its collaborators and allocates a fresh
//! chain and result per call. It is `Send + Sync` and may be shared across
//! tasks freely. No lock is held while awaiting the store.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::scope_chain::{ScopeChain, ScopeChainError, DEFAULT_MAX_SCOPE_DEPTH};
use crate::core::document::{Document, Scope};
use crate::core::folders::{ContainerTopology, Project};
use crate::core::types::DocumentName;
use crate::store::{ConfigStore, StoreError};

/// A document located by resolution, with the scope it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDefinition {
    source_scope: Scope,
    document: Document,
}

impl ResolvedDefinition {
    /// Pair a document with the scope that supplied it.
    pub fn new(source_scope: Scope, document: Document) -> Self {
        Self {
            source_scope,
            document,
        }
    }

    /// The scope whose store supplied the document.
    pub fn source_scope(&self) -> &Scope {
        &self.source_scope
    }

    /// The resolved document.
    pub fn document(&self) -> &Document {
        &self.document
    }
}

/// Outcome of a successful resolution walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A matching document was found.
    Found(ResolvedDefinition),
    /// No scope holds a matching document. A normal outcome.
    Absent,
}

impl Resolution {
    /// Check whether a document was found.
    pub fn is_found(&self) -> bool {
        matches!(self, Resolution::Found(_))
    }

    /// The found definition, if any.
    pub fn found(&self) -> Option<&ResolvedDefinition> {
        match self {
            Resolution::Found(def) => Some(def),
            Resolution::Absent => None,
        }
    }
}

/// One scope's store failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeFailure {
    /// The scope whose `get` failed
    pub scope: Scope,
    /// The store's error
    pub error: StoreError,
}

/// Nothing matched and at least one scope could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not resolve '{file_name}' for '{project}': {}", describe_failures(.failures))]
pub struct ResolutionError {
    /// Project being resolved
    pub project: String,
    /// Requested document name
    pub file_name: DocumentName,
    /// Every failing scope, in chain order
    pub failures: Vec<ScopeFailure>,
}

fn describe_failures(failures: &[ScopeFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} ({})", f.scope, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The scope chain could not be computed.
    #[error(transparent)]
    Chain(#[from] ScopeChainError),

    /// Store failures with no match anywhere.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// What happened at one scope during a walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// A single matching document
    Hit,
    /// Several matching documents; the first was used
    Duplicate(usize),
    /// No matching document
    Miss,
    /// The store failed for this scope
    Failed(StoreError),
    /// Not queried because an earlier scope matched
    NotProbed,
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Hit => write!(f, "hit"),
            ProbeOutcome::Duplicate(n) => write!(f, "hit ({} duplicates, first used)", n),
            ProbeOutcome::Miss => write!(f, "miss"),
            ProbeOutcome::Failed(e) => write!(f, "failed: {}", e),
            ProbeOutcome::NotProbed => write!(f, "not probed"),
        }
    }
}

/// One entry of a probe trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeProbe {
    /// The scope
    pub scope: Scope,
    /// What happened there
    pub outcome: ProbeOutcome,
}

/// Full record of a resolution walk.
#[derive(Debug, Clone)]
pub struct ResolutionReport {
    project: Project,
    file_name: DocumentName,
    chain: ScopeChain,
    probes: Vec<ScopeProbe>,
    found: Option<ResolvedDefinition>,
}

impl ResolutionReport {
    /// The chain that was walked.
    pub fn chain(&self) -> &ScopeChain {
        &self.chain
    }

    /// One probe per scope, in chain order.
    pub fn probes(&self) -> &[ScopeProbe] {
        &self.probes
    }

    /// Scopes whose store failed.
    pub fn failures(&self) -> Vec<ScopeFailure> {
        self.probes
            .iter()
            .filter_map(|p| match &p.outcome {
                ProbeOutcome::Failed(error) => Some(ScopeFailure {
                    scope: p.scope.clone(),
                    error: error.clone(),
                }),
                _ => None,
            })
            .collect()
    }

    /// Apply the failure rules to the walk.
    ///
    /// A match wins over any failure. With no match, any failure makes the
    /// whole resolution fail.
    pub fn into_result(self) -> Result<Resolution, ResolutionError> {
        if let Some(found) = self.found {
            return Ok(Resolution::Found(found));
        }
        let failures = self.failures();
        if failures.is_empty() {
            Ok(Resolution::Absent)
        } else {
            Err(ResolutionError {
                project: self.project.full_name(),
                file_name: self.file_name,
                failures,
            })
        }
    }
}

/// Resolves a named default definition for a project.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use pipeline_defaults::core::document::{Document, Scope};
/// use pipeline_defaults::core::folders::{PathTopology, Project};
/// use pipeline_defaults::core::types::DocumentName;
/// use pipeline_defaults::resolve::{DefaultDefinitionResolver, Resolution};
/// use pipeline_defaults::store::MemoryConfigStore;
///
/// # tokio_test::block_on(async {
/// let store = MemoryConfigStore::with_documents([Document::new(
///     Scope::Global,
///     DocumentName::jenkinsfile(),
///     "node { checkout scm }",
/// )]);
/// let resolver = DefaultDefinitionResolver::new(Arc::new(store), Arc::new(PathTopology));
///
/// let project = Project::from_full_name("folder/p").unwrap();
/// let resolution = resolver
///     .resolve(&project, &DocumentName::jenkinsfile())
///     .await
///     .unwrap();
///
/// let found = resolution.found().unwrap();
/// assert!(found.source_scope().is_global());
/// # });
/// ```
#[derive(Clone)]
pub struct DefaultDefinitionResolver {
    store: Arc<dyn ConfigStore>,
    topology: Arc<dyn ContainerTopology>,
    max_depth: usize,
}

impl fmt::Debug for DefaultDefinitionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultDefinitionResolver")
            .field("store", &self.store.name())
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl DefaultDefinitionResolver {
    /// Create a resolver over a store and a folder topology.
    pub fn new(store: Arc<dyn ConfigStore>, topology: Arc<dyn ContainerTopology>) -> Self {
        Self {
            store,
            topology,
            max_depth: DEFAULT_MAX_SCOPE_DEPTH,
        }
    }

    /// Cap the number of folder scopes walked.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The chain this resolver would walk for `project`.
    pub fn scope_chain(&self, project: &Project) -> Result<ScopeChain, ScopeChainError> {
        ScopeChain::compute_with_limit(project, self.topology.as_ref(), self.max_depth)
    }

    /// Resolve `file_name` for `project`.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::Chain`] if the folder ancestry is cyclic or too deep
    /// - [`ResolveError::Resolution`] if nothing matched and a store failed
    #[instrument(skip_all, fields(project = %project, file = %file_name))]
    pub async fn resolve(
        &self,
        project: &Project,
        file_name: &DocumentName,
    ) -> Result<Resolution, ResolveError> {
        let report = self.walk(project, file_name).await?;

        if report.found.is_some() {
            for failure in report.failures() {
                warn!(
                    scope = %failure.scope,
                    error = %failure.error,
                    "store failure masked by a match in a later scope"
                );
            }
        }

        let resolution = report.into_result()?;
        match &resolution {
            Resolution::Found(def) => debug!(scope = %def.source_scope(), "resolved"),
            Resolution::Absent => debug!("no default definition"),
        }
        Ok(resolution)
    }

    /// Resolve and return the per-scope probe trail.
    ///
    /// Only chain errors are returned as `Err`; store failures are recorded
    /// in the report. Use [`ResolutionReport::into_result`] to apply the
    /// failure rules.
    #[instrument(skip_all, fields(project = %project, file = %file_name))]
    pub async fn resolve_detailed(
        &self,
        project: &Project,
        file_name: &DocumentName,
    ) -> Result<ResolutionReport, ResolveError> {
        self.walk(project, file_name).await
    }

    async fn walk(
        &self,
        project: &Project,
        file_name: &DocumentName,
    ) -> Result<ResolutionReport, ResolveError> {
        let chain = self.scope_chain(project)?;
        let mut probes = Vec::with_capacity(chain.len());
        let mut found = None;

        for scope in &chain {
            if found.is_some() {
                probes.push(ScopeProbe {
                    scope: scope.clone(),
                    outcome: ProbeOutcome::NotProbed,
                });
                continue;
            }

            let outcome = match self.store.get(scope).await {
                Err(error) => {
                    debug!(%scope, %error, "store failed");
                    ProbeOutcome::Failed(error)
                }
                Ok(documents) => {
                    let mut matches = documents.into_iter().filter(|d| d.name() == file_name);
                    match matches.next() {
                        None => ProbeOutcome::Miss,
                        Some(document) => {
                            let count = 1 + matches.count();
                            found = Some(ResolvedDefinition {
                                source_scope: scope.clone(),
                                document,
                            });
                            if count > 1 {
                                warn!(
                                    %scope,
                                    name = %file_name,
                                    count,
                                    "duplicate documents in scope, using the first"
                                );
                                ProbeOutcome::Duplicate(count)
                            } else {
                                ProbeOutcome::Hit
                            }
                        }
                    }
                }
            };

            probes.push(ScopeProbe {
                scope: scope.clone(),
                outcome,
            });
        }

        Ok(ResolutionReport {
            project: project.clone(),
            file_name: file_name.clone(),
            chain,
            probes,
            found,
        })
    }
}
