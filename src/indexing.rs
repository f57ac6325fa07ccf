//! indexing
//!
//! Branch indexing: discover branches, resolve a default definition for the
//! ones that need it, bind it and hand it to the scheduler.
//!
//! # Lifecycle
//!
//! Each branch moves through a validated state machine:
//!
//! ```text
//! Discovered -> NoInRepoDefinition -> Resolving -> Bound -> Scheduled
//!            \                                 \        \-> ScheduleFailed
//!             -> InRepoDefinition               -> AbsentNoDefault
//!                  (-> Resolving in override)    -> ResolutionFailed
//! ```
//!
//! In [`DefaultsMode::Fallback`] a branch carrying its own definition stops
//! at `InRepoDefinition`. In [`DefaultsMode::Override`] it is resolved like
//! any other branch.
//!
//! A project's branches are indexed concurrently on a `JoinSet`, bounded by
//! the configured concurrency. Reports come back sorted by branch name.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::core::config::DefaultsMode;
use crate::core::document::Scope;
use crate::core::folders::Project;
use crate::core::types::{BranchName, DocumentName};
use crate::discovery::{self, BranchSource, DiscoveredBranch, DiscoveryError};
use crate::resolve::{BindingError, BranchDefinitionBinder, DefaultDefinitionResolver, ResolveError};
use crate::scheduler::{BranchJob, BuildScheduler, RunId, SchedulerError};

/// Errors from indexing.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Listing branches failed; nothing was indexed.
    #[error("branch discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Resolving the default definition failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Binding the resolution failed.
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// The scheduler refused the run.
    #[error("scheduling failed: {0}")]
    Schedule(#[from] SchedulerError),

    /// A branch tried to move to a state it cannot reach.
    #[error("invalid branch state transition: {from} -> {to}")]
    InvalidTransition {
        /// Current state
        from: BranchState,
        /// Requested state
        to: BranchState,
    },

    /// An indexing task panicked or was cancelled.
    #[error("indexing task failed: {0}")]
    Task(String),
}

/// Where a branch is in the indexing lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BranchState {
    /// Found by the branch source
    Discovered,
    /// The branch has its own definition
    InRepoDefinition,
    /// The branch has no definition of its own
    NoInRepoDefinition,
    /// Looking up a default definition
    Resolving,
    /// A default was found and bound to the branch
    Bound,
    /// No scope had a default
    AbsentNoDefault,
    /// Resolution returned an error
    ResolutionFailed,
    /// A run was queued
    Scheduled,
    /// The scheduler refused the run
    ScheduleFailed,
}

impl BranchState {
    /// Check whether no further transition is possible.
    ///
    /// `InRepoDefinition` is not terminal: override mode resolves from it.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BranchState::AbsentNoDefault
                | BranchState::ResolutionFailed
                | BranchState::Scheduled
                | BranchState::ScheduleFailed
        )
    }

    /// Check whether `next` may follow this state.
    pub fn can_transition_to(self, next: BranchState) -> bool {
        use BranchState::*;
        matches!(
            (self, next),
            (Discovered, InRepoDefinition)
                | (Discovered, NoInRepoDefinition)
                | (InRepoDefinition, Resolving)
                | (NoInRepoDefinition, Resolving)
                | (Resolving, Bound)
                | (Resolving, AbsentNoDefault)
                | (Resolving, ResolutionFailed)
                | (Bound, Scheduled)
                | (Bound, ScheduleFailed)
        )
    }
}

impl fmt::Display for BranchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BranchState::Discovered => "discovered",
            BranchState::InRepoDefinition => "in-repo-definition",
            BranchState::NoInRepoDefinition => "no-in-repo-definition",
            BranchState::Resolving => "resolving",
            BranchState::Bound => "bound",
            BranchState::AbsentNoDefault => "absent-no-default",
            BranchState::ResolutionFailed => "resolution-failed",
            BranchState::Scheduled => "scheduled",
            BranchState::ScheduleFailed => "schedule-failed",
        };
        write!(f, "{}", s)
    }
}

/// What happened to one branch.
#[derive(Debug)]
pub struct BranchReport {
    /// The branch
    pub branch: BranchName,
    states: Vec<BranchState>,
    /// Run queued for the branch
    pub run_id: Option<RunId>,
    /// Scope the default came from
    pub source_scope: Option<Scope>,
    /// Why indexing the branch stopped early
    pub error: Option<IndexError>,
}

impl BranchReport {
    fn new(branch: BranchName) -> Self {
        Self {
            branch,
            states: vec![BranchState::Discovered],
            run_id: None,
            source_scope: None,
            error: None,
        }
    }

    fn failed(branch: BranchName, error: IndexError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(branch)
        }
    }

    /// The current state.
    pub fn state(&self) -> BranchState {
        self.states
            .last()
            .copied()
            .unwrap_or(BranchState::Discovered)
    }

    /// Every state visited, in order.
    pub fn history(&self) -> &[BranchState] {
        &self.states
    }

    fn advance(&mut self, next: BranchState) -> Result<(), IndexError> {
        let from = self.state();
        if !from.can_transition_to(next) {
            return Err(IndexError::InvalidTransition { from, to: next });
        }
        debug!(branch = %self.branch, %from, to = %next, "branch state");
        self.states.push(next);
        Ok(())
    }
}

/// Result of indexing a project.
#[derive(Debug)]
pub struct IndexOutcome {
    /// The indexed project
    pub project: Project,
    /// One report per branch, sorted by branch name
    pub reports: Vec<BranchReport>,
}

impl IndexOutcome {
    /// The report for `branch`.
    pub fn report(&self, branch: &str) -> Option<&BranchReport> {
        self.reports.iter().find(|r| r.branch.as_str() == branch)
    }

    /// Runs queued during indexing.
    pub fn scheduled(&self) -> Vec<&RunId> {
        self.reports.iter().filter_map(|r| r.run_id.as_ref()).collect()
    }

    /// Reports that ended in an error.
    pub fn failures(&self) -> impl Iterator<Item = &BranchReport> {
        self.reports.iter().filter(|r| r.error.is_some())
    }
}

/// Indexes branches of multibranch projects.
///
/// Cheap to clone; clones share the resolver and scheduler.
#[derive(Clone)]
pub struct BranchIndexer {
    resolver: Arc<DefaultDefinitionResolver>,
    binder: BranchDefinitionBinder,
    scheduler: Arc<dyn BuildScheduler>,
    script_path: DocumentName,
    mode: DefaultsMode,
    concurrency: usize,
}

impl fmt::Debug for BranchIndexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BranchIndexer")
            .field("scheduler", &self.scheduler.name())
            .field("script_path", &self.script_path)
            .field("mode", &self.mode)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}

impl BranchIndexer {
    /// Create an indexer looking for `Jenkinsfile` in fallback mode.
    pub fn new(
        resolver: Arc<DefaultDefinitionResolver>,
        binder: BranchDefinitionBinder,
        scheduler: Arc<dyn BuildScheduler>,
    ) -> Self {
        Self {
            resolver,
            binder,
            scheduler,
            script_path: DocumentName::jenkinsfile(),
            mode: DefaultsMode::default(),
            concurrency: crate::core::config::DEFAULT_INDEX_CONCURRENCY,
        }
    }

    /// Set the definition file name.
    pub fn with_script_path(mut self, script_path: DocumentName) -> Self {
        self.script_path = script_path;
        self
    }

    /// Set when defaults apply.
    pub fn with_mode(mut self, mode: DefaultsMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set how many branches are indexed at once. Zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// The definition file name.
    pub fn script_path(&self) -> &DocumentName {
        &self.script_path
    }

    /// Discover and index every branch of `project`.
    ///
    /// # Errors
    ///
    /// Only whole-project failures are returned; per-branch failures are in
    /// the reports.
    #[instrument(skip_all, fields(project = %project, source = source.name()))]
    pub async fn index_project(
        &self,
        project: &Project,
        source: &dyn BranchSource,
    ) -> Result<IndexOutcome, IndexError> {
        let mut branches = source.discover(&self.script_path).await?;
        discovery::sort_by_branch(&mut branches);
        info!(branches = ?discovery::branch_names(&branches), "discovered branches");
        self.index_branches(project, branches).await
    }

    /// Index already discovered branches of `project` concurrently.
    pub async fn index_branches(
        &self,
        project: &Project,
        branches: Vec<DiscoveredBranch>,
    ) -> Result<IndexOutcome, IndexError> {
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut pending: BTreeSet<BranchName> = BTreeSet::new();

        for branch in branches {
            pending.insert(branch.checkout.branch.clone());
            let indexer = self.clone();
            let project = project.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let name = branch.checkout.branch.clone();
                match permits.acquire_owned().await {
                    Ok(_permit) => indexer.index_branch(&project, branch).await,
                    Err(e) => BranchReport::failed(name, IndexError::Task(e.to_string())),
                }
            });
        }

        let mut reports = Vec::new();
        let mut task_errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => {
                    pending.remove(&report.branch);
                    reports.push(report);
                }
                Err(e) => {
                    warn!(error = %e, "indexing task aborted");
                    task_errors.push(e.to_string());
                }
            }
        }
        // A task that died never produced a report; its branch is whichever is left.
        for (branch, message) in pending.into_iter().zip(task_errors) {
            reports.push(BranchReport::failed(branch, IndexError::Task(message)));
        }
        reports.sort_by(|a, b| a.branch.cmp(&b.branch));

        let scheduled = reports.iter().filter(|r| r.run_id.is_some()).count();
        let failed = reports.iter().filter(|r| r.error.is_some()).count();
        info!(branches = reports.len(), scheduled, failed, "indexing finished");

        Ok(IndexOutcome {
            project: project.clone(),
            reports,
        })
    }

    /// Index one branch. Failures are recorded in the report.
    #[instrument(skip_all, fields(project = %project, branch = %branch.checkout.branch))]
    pub async fn index_branch(&self, project: &Project, branch: DiscoveredBranch) -> BranchReport {
        let mut report = BranchReport::new(branch.checkout.branch.clone());
        if let Err(err) = self.drive(project, branch, &mut report).await {
            warn!(state = %report.state(), error = %err, "branch not scheduled");
            report.error = Some(err);
        }
        report
    }

    async fn drive(
        &self,
        project: &Project,
        branch: DiscoveredBranch,
        report: &mut BranchReport,
    ) -> Result<(), IndexError> {
        if branch.has_definition {
            report.advance(BranchState::InRepoDefinition)?;
            if self.mode == DefaultsMode::Fallback {
                debug!("branch carries its own definition");
                return Ok(());
            }
        } else {
            report.advance(BranchState::NoInRepoDefinition)?;
        }

        report.advance(BranchState::Resolving)?;
        let resolution = match self.resolver.resolve(project, &self.script_path).await {
            Ok(resolution) => resolution,
            Err(err) => {
                report.advance(BranchState::ResolutionFailed)?;
                return Err(err.into());
            }
        };

        let Some(found) = resolution.found() else {
            report.advance(BranchState::AbsentNoDefault)?;
            info!("no default definition in any scope");
            return Ok(());
        };
        report.source_scope = Some(found.source_scope().clone());

        let job = BranchJob::new(project.clone(), branch.checkout.branch.clone());
        let bound = self.binder.bind(resolution, branch.checkout)?;
        report.advance(BranchState::Bound)?;

        match self.scheduler.schedule(job, bound).await {
            Ok(run_id) => {
                report.advance(BranchState::Scheduled)?;
                info!(run = %run_id, "run scheduled");
                report.run_id = Some(run_id);
                Ok(())
            }
            Err(err) => {
                report.advance(BranchState::ScheduleFailed)?;
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::Document;
    use crate::core::folders::PathTopology;
    use crate::core::types::{ContainerId, Oid, RepoRef};
    use crate::resolve::CheckoutContext;
    use crate::scheduler::mock::{FailOn, MockScheduler};
    use crate::store::{self, MemoryConfigStore, StoreError};
    use async_trait::async_trait;

    fn folder_doc(folder: &str, content: &str) -> Document {
        Document::new(
            Scope::container(ContainerId::new(folder).unwrap()),
            DocumentName::jenkinsfile(),
            content,
        )
    }

    fn branch(name: &str, has_definition: bool) -> DiscoveredBranch {
        DiscoveredBranch {
            checkout: CheckoutContext::new(
                RepoRef::new("/srv/repo").unwrap(),
                BranchName::new(name).unwrap(),
                Some(Oid::new("a".repeat(40)).unwrap()),
            ),
            has_definition,
        }
    }

    fn indexer(store: MemoryConfigStore, scheduler: &MockScheduler) -> BranchIndexer {
        let resolver = DefaultDefinitionResolver::new(Arc::new(store), Arc::new(PathTopology));
        BranchIndexer::new(
            Arc::new(resolver),
            BranchDefinitionBinder::new(),
            Arc::new(scheduler.clone()),
        )
    }

    fn project() -> Project {
        Project::from_full_name("team/p").unwrap()
    }

    struct StaticSource(Vec<DiscoveredBranch>);

    #[async_trait]
    impl BranchSource for StaticSource {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn discover(
            &self,
            _script_path: &DocumentName,
        ) -> Result<Vec<DiscoveredBranch>, DiscoveryError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn transitions() {
        use BranchState::*;
        assert!(Discovered.can_transition_to(NoInRepoDefinition));
        assert!(InRepoDefinition.can_transition_to(Resolving));
        assert!(Resolving.can_transition_to(AbsentNoDefault));
        assert!(Bound.can_transition_to(ScheduleFailed));
        assert!(!Discovered.can_transition_to(Resolving));
        assert!(!Resolving.can_transition_to(Scheduled));
        assert!(!Scheduled.can_transition_to(Resolving));
        assert!(Scheduled.is_terminal());
        assert!(!InRepoDefinition.is_terminal());
    }

    #[test]
    fn invalid_transition_rejected() {
        let mut report = BranchReport::new(BranchName::new("b").unwrap());
        let err = report.advance(BranchState::Scheduled).unwrap_err();
        assert!(matches!(
            err,
            IndexError::InvalidTransition {
                from: BranchState::Discovered,
                to: BranchState::Scheduled
            }
        ));
        assert_eq!(report.state(), BranchState::Discovered);
    }

    #[tokio::test]
    async fn branch_without_definition_is_scheduled() {
        let scheduler = MockScheduler::new();
        let store = MemoryConfigStore::with_documents([folder_doc("team", "node {}")]);
        let indexer = indexer(store, &scheduler);

        let report = indexer.index_branch(&project(), branch("master", false)).await;

        assert_eq!(
            report.history(),
            &[
                BranchState::Discovered,
                BranchState::NoInRepoDefinition,
                BranchState::Resolving,
                BranchState::Bound,
                BranchState::Scheduled,
            ]
        );
        assert!(report.error.is_none());
        assert_eq!(
            report.source_scope,
            Some(Scope::container(ContainerId::new("team").unwrap()))
        );

        let runs = scheduler.scheduled();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].script, "node {}");
        assert_eq!(runs[0].checkout.branch.as_str(), "master");
        assert_eq!(Some(&runs[0].run_id), report.run_id.as_ref());
    }

    #[tokio::test]
    async fn in_repo_definition_skipped_in_fallback_mode() {
        let scheduler = MockScheduler::new();
        let store = MemoryConfigStore::with_documents([folder_doc("team", "node {}")]);
        let indexer = indexer(store.clone(), &scheduler);

        let report = indexer.index_branch(&project(), branch("master", true)).await;

        assert_eq!(report.state(), BranchState::InRepoDefinition);
        assert!(scheduler.scheduled().is_empty());
        assert!(store.queried_scopes().is_empty());
    }

    #[tokio::test]
    async fn override_mode_resolves_every_branch() {
        let scheduler = MockScheduler::new();
        let store = MemoryConfigStore::with_documents([folder_doc("team", "node {}")]);
        let indexer = indexer(store, &scheduler).with_mode(DefaultsMode::Override);

        let report = indexer.index_branch(&project(), branch("master", true)).await;

        assert_eq!(report.state(), BranchState::Scheduled);
        assert_eq!(report.history()[1], BranchState::InRepoDefinition);
        assert_eq!(scheduler.scheduled().len(), 1);
    }

    #[tokio::test]
    async fn absent_is_not_an_error() {
        let scheduler = MockScheduler::new();
        let indexer = indexer(MemoryConfigStore::new(), &scheduler);

        let report = indexer.index_branch(&project(), branch("master", false)).await;

        assert_eq!(report.state(), BranchState::AbsentNoDefault);
        assert!(report.error.is_none());
        assert!(report.run_id.is_none());
        assert!(scheduler.scheduled().is_empty());
    }

    #[tokio::test]
    async fn store_failures_mark_resolution_failed() {
        let scheduler = MockScheduler::new();
        let store = MemoryConfigStore::new().fail_on(store::FailOn::GetAny(
            StoreError::Unavailable("down".into()),
        ));
        let indexer = indexer(store, &scheduler);

        let report = indexer.index_branch(&project(), branch("master", false)).await;

        assert_eq!(report.state(), BranchState::ResolutionFailed);
        assert!(matches!(report.error, Some(IndexError::Resolve(_))));
        assert!(scheduler.scheduled().is_empty());
    }

    #[tokio::test]
    async fn scheduling_failure_is_reported() {
        let scheduler = MockScheduler::new().fail_on(FailOn::Branch(
            BranchName::new("broken").unwrap(),
            SchedulerError::Rejected("queue full".into()),
        ));
        let store = MemoryConfigStore::with_documents([folder_doc("team", "node {}")]);
        let indexer = indexer(store, &scheduler);

        let outcome = indexer
            .index_branches(&project(), vec![branch("broken", false), branch("ok", false)])
            .await
            .unwrap();

        let broken = outcome.report("broken").unwrap();
        assert_eq!(broken.state(), BranchState::ScheduleFailed);
        assert!(matches!(
            broken.error,
            Some(IndexError::Schedule(SchedulerError::Rejected(_)))
        ));
        assert_eq!(outcome.report("ok").unwrap().state(), BranchState::Scheduled);
        assert_eq!(outcome.failures().count(), 1);
        assert_eq!(outcome.scheduled().len(), 1);
    }

    /// Panics while scheduling one branch, delegates the rest.
    struct CrashingScheduler {
        crash_on: &'static str,
        inner: MockScheduler,
    }

    #[async_trait]
    impl BuildScheduler for CrashingScheduler {
        fn name(&self) -> &'static str {
            "crashing"
        }

        async fn schedule(
            &self,
            job: BranchJob,
            definition: crate::resolve::BoundDefinition,
        ) -> Result<RunId, SchedulerError> {
            if job.branch.as_str() == self.crash_on {
                panic!("scheduler crashed on {}", job.branch);
            }
            self.inner.schedule(job, definition).await
        }
    }

    #[tokio::test]
    async fn crashed_task_keeps_other_reports() {
        let mock = MockScheduler::new();
        let store = MemoryConfigStore::with_documents([folder_doc("team", "node {}")]);
        let resolver = DefaultDefinitionResolver::new(Arc::new(store), Arc::new(PathTopology));
        let indexer = BranchIndexer::new(
            Arc::new(resolver),
            BranchDefinitionBinder::new(),
            Arc::new(CrashingScheduler {
                crash_on: "crash",
                inner: mock.clone(),
            }),
        );

        let outcome = indexer
            .index_branches(
                &project(),
                vec![branch("alpha", false), branch("crash", false), branch("zeta", false)],
            )
            .await
            .unwrap();

        assert_eq!(outcome.reports.len(), 3);
        let crashed = outcome.report("crash").unwrap();
        assert!(matches!(crashed.error, Some(IndexError::Task(_))));
        assert!(crashed.run_id.is_none());
        assert_eq!(outcome.report("alpha").unwrap().state(), BranchState::Scheduled);
        assert_eq!(outcome.report("zeta").unwrap().state(), BranchState::Scheduled);
        assert_eq!(outcome.scheduled().len(), 2);
        assert_eq!(outcome.failures().count(), 1);
        assert_eq!(mock.scheduled().len(), 2);
    }

    #[tokio::test]
    async fn project_reports_sorted_by_branch() {
        let scheduler = MockScheduler::new();
        let store = MemoryConfigStore::with_documents([folder_doc("team", "node {}")]);
        let indexer = indexer(store, &scheduler).with_concurrency(2);

        let names = ["zeta", "alpha", "mid", "beta", "omega"];
        let source = StaticSource(names.iter().map(|n| branch(n, false)).collect());

        let outcome = indexer.index_project(&project(), &source).await.unwrap();

        let reported: Vec<_> = outcome.reports.iter().map(|r| r.branch.as_str()).collect();
        assert_eq!(reported, vec!["alpha", "beta", "mid", "omega", "zeta"]);
        assert_eq!(scheduler.scheduled().len(), names.len());
    }

    #[tokio::test]
    async fn zero_concurrency_still_indexes() {
        let scheduler = MockScheduler::new();
        let store = MemoryConfigStore::with_documents([folder_doc("team", "node {}")]);
        let indexer = indexer(store, &scheduler).with_concurrency(0);

        let outcome = indexer
            .index_branches(&project(), vec![branch("a", false), branch("b", false)])
            .await
            .unwrap();

        assert_eq!(outcome.scheduled().len(), 2);
    }
}
