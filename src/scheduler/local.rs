//! scheduler::local
//!
//! In-process scheduler that runs bound definitions on the tokio runtime.
//!
//! # Execution
//!
//! `schedule` records a `Queued` run, spawns a task and returns at once.
//! The task parses the script (see [`super::script`]) and runs its steps:
//!
//! - `node { ... }` allocates an empty workspace for the nested steps
//! - `checkout scm` checks out the branch's own commit into the workspace
//! - `echo` appends to the run log; `readFile` reads from the workspace
//! - `semaphore` blocks on the rendezvous registry, if enabled
//!
//! A workspace is a commit of the branch's repository; files are read from
//! the commit's tree. Git is opened inside `spawn_blocking` for each step
//! and never held across an await.
//!
//! # Observing Runs
//!
//! Run records live behind a mutex; every change bumps a `watch` channel so
//! [`LocalScheduler::wait_for_completion`] can wait without polling.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, info_span, warn, Instrument};

use super::script::{self, Expr, Step};
use super::semaphore::Semaphores;
use super::traits::{BranchJob, BuildScheduler, RunId, RunRecord, RunStatus, SchedulerError};
use crate::core::types::{Oid, RepoRef};
use crate::git::Git;
use crate::resolve::{BoundDefinition, CheckoutContext};

/// Scheduler running definitions as local tokio tasks.
///
/// Cheap to clone; clones share runs.
#[derive(Debug, Clone)]
pub struct LocalScheduler {
    inner: Arc<LocalInner>,
}

#[derive(Debug)]
struct LocalInner {
    runs: Mutex<RunTable>,
    updates: watch::Sender<u64>,
    semaphores: Option<Arc<Semaphores>>,
}

#[derive(Debug, Default)]
struct RunTable {
    records: HashMap<RunId, RunRecord>,
    next_number: HashMap<String, u64>,
    last: HashMap<String, RunId>,
}

impl Default for LocalScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalScheduler {
    /// Create a scheduler. Semaphore steps fail runs.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a scheduler whose semaphore steps wait on a rendezvous registry.
    pub fn with_rendezvous() -> Self {
        Self::build(Some(Arc::new(Semaphores::new())))
    }

    fn build(semaphores: Option<Arc<Semaphores>>) -> Self {
        let (updates, _) = watch::channel(0);
        Self {
            inner: Arc::new(LocalInner {
                runs: Mutex::new(RunTable::default()),
                updates,
                semaphores,
            }),
        }
    }

    /// The rendezvous registry, if enabled.
    pub fn semaphores(&self) -> Option<&Semaphores> {
        self.inner.semaphores.as_deref()
    }

    fn require_semaphores(&self) -> Result<&Semaphores, SchedulerError> {
        self.semaphores()
            .ok_or_else(|| SchedulerError::Unavailable("semaphore rendezvous is not enabled".into()))
    }

    /// Wait until a run reaches the semaphore step `id` (e.g. `wait/1`).
    pub async fn wait_for_start(&self, id: &str) -> Result<(), SchedulerError> {
        self.require_semaphores()?.wait_for_start(id).await;
        Ok(())
    }

    /// Release the semaphore step `id`.
    pub fn success(&self, id: &str) -> Result<(), SchedulerError> {
        self.require_semaphores()?.success(id);
        Ok(())
    }

    /// Snapshot of one run.
    pub fn run(&self, id: &RunId) -> Option<RunRecord> {
        self.inner.table().records.get(id).cloned()
    }

    /// Snapshot of the most recent run of `job`.
    pub fn last_run(&self, job: &BranchJob) -> Option<RunRecord> {
        let table = self.inner.table();
        let id = table.last.get(&job.full_name())?;
        table.records.get(id).cloned()
    }

    /// Snapshots of all runs, ordered by id.
    pub fn runs(&self) -> Vec<RunRecord> {
        let mut runs: Vec<_> = self.inner.table().records.values().cloned().collect();
        runs.sort_by(|a, b| a.id.cmp(&b.id));
        runs
    }

    /// Wait until run `id` completes or fails, and return its final record.
    pub async fn wait_for_completion(&self, id: &RunId) -> Result<RunRecord, SchedulerError> {
        let mut updates = self.inner.updates.subscribe();
        loop {
            let record = self
                .run(id)
                .ok_or_else(|| SchedulerError::UnknownRun(id.clone()))?;
            if record.status.is_terminal() {
                return Ok(record);
            }
            updates
                .changed()
                .await
                .map_err(|_| SchedulerError::Unavailable("scheduler shut down".into()))?;
        }
    }
}

impl LocalInner {
    fn table(&self) -> MutexGuard<'_, RunTable> {
        self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn update(&self, id: &RunId, f: impl FnOnce(&mut RunRecord)) {
        if let Some(record) = self.table().records.get_mut(id) {
            f(record);
        }
        self.updates.send_modify(|n| *n += 1);
    }

    fn append(&self, id: &RunId, line: &str) {
        self.update(id, |record| {
            record.log.push_str(line);
            if !line.ends_with('\n') {
                record.log.push('\n');
            }
        });
    }

    fn transition(&self, id: &RunId, next: RunStatus) {
        self.update(id, |record| {
            if record.status.can_transition_to(next) {
                record.status = next;
                if next == RunStatus::Running {
                    record.started_at = Some(Utc::now());
                } else if next.is_terminal() {
                    record.finished_at = Some(Utc::now());
                }
            } else {
                warn!(run = %id, from = %record.status, to = %next, "ignored invalid run transition");
            }
        });
    }
}

#[async_trait]
impl BuildScheduler for LocalScheduler {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn schedule(
        &self,
        job: BranchJob,
        definition: BoundDefinition,
    ) -> Result<RunId, SchedulerError> {
        let id = {
            let mut table = self.inner.table();
            let number = table.next_number.entry(job.full_name()).or_insert(0);
            *number += 1;
            let id = RunId::new(job.full_name(), *number);

            table.records.insert(
                id.clone(),
                RunRecord {
                    id: id.clone(),
                    status: RunStatus::Queued,
                    source_scope: definition.source_scope().clone(),
                    branch: job.branch.clone(),
                    revision: None,
                    sandbox: definition.sandbox(),
                    log: String::new(),
                    error: None,
                    queued_at: Utc::now(),
                    started_at: None,
                    finished_at: None,
                },
            );
            table.last.insert(job.full_name(), id.clone());
            id
        };
        self.inner.updates.send_modify(|n| *n += 1);

        let span = info_span!("run", run = %id);
        tokio::spawn(execute(Arc::clone(&self.inner), id.clone(), definition).instrument(span));

        Ok(id)
    }
}

async fn execute(inner: Arc<LocalInner>, id: RunId, definition: BoundDefinition) {
    inner.transition(&id, RunStatus::Running);
    info!(scope = %definition.source_scope(), "run started");
    inner.append(&id, &format!("Started {}", id));
    inner.append(
        &id,
        &format!(
            "Obtained {} from {}",
            definition.document().name(),
            definition.source_scope()
        ),
    );
    if definition.sandbox() {
        inner.append(&id, "Running in sandbox");
    }

    let result = match script::parse(definition.script()) {
        Ok(steps) => {
            let execution = Execution {
                inner: Arc::clone(&inner),
                id: id.clone(),
                checkout: definition.checkout().clone(),
            };
            execution.run_steps(&steps, None).await
        }
        Err(e) => Err(e.to_string()),
    };

    match result {
        Ok(()) => {
            inner.append(&id, "Finished: SUCCESS");
            inner.transition(&id, RunStatus::Completed);
            info!("run completed");
        }
        Err(message) => {
            inner.append(&id, &format!("ERROR: {}", message));
            inner.append(&id, "Finished: FAILURE");
            inner.update(&id, |record| record.error = Some(message.clone()));
            inner.transition(&id, RunStatus::Failed);
            warn!(error = %message, "run failed");
        }
    }
}

/// Workspace of the enclosing `node`; `Some` once checked out.
type Workspace = Option<Oid>;

struct Execution {
    inner: Arc<LocalInner>,
    id: RunId,
    checkout: CheckoutContext,
}

type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<(), String>> + Send + 'a>>;

impl Execution {
    fn log(&self, line: &str) {
        self.inner.append(&self.id, line);
    }

    /// Run `steps`. `node` is the enclosing node's workspace, `None` outside any node.
    fn run_steps<'a>(&'a self, steps: &'a [Step], node: Option<&'a mut Workspace>) -> StepFuture<'a> {
        Box::pin(async move {
            let mut node = node;
            for step in steps {
                match step {
                    Step::Node(body) => {
                        self.log("[Pipeline] node");
                        let mut workspace: Workspace = None;
                        self.run_steps(body, Some(&mut workspace)).await?;
                        self.log("[Pipeline] // node");
                    }
                    Step::Checkout => {
                        let workspace = node
                            .as_deref_mut()
                            .ok_or_else(|| "checkout scm requires a node".to_string())?;
                        let revision = self.resolve_revision().await?;
                        self.log(&format!(
                            "Checking out Revision {} ({})",
                            revision, self.checkout.branch
                        ));
                        self.inner
                            .update(&self.id, |record| record.revision = Some(revision.clone()));
                        *workspace = Some(revision);
                    }
                    Step::Echo(Expr::Literal(text)) => self.log(text),
                    Step::Echo(Expr::ReadFile(path)) => {
                        let revision = node
                            .as_deref()
                            .and_then(|w| w.clone())
                            .ok_or_else(|| {
                                format!("readFile('{}') requires a checked-out workspace", path)
                            })?;
                        let content = self.read_file(revision, path.clone()).await?;
                        self.log(&content);
                    }
                    Step::Semaphore(name) => {
                        let semaphores = self.inner.semaphores.as_ref().ok_or_else(|| {
                            format!("semaphore '{}' needs rendezvous enabled", name)
                        })?;
                        let id = semaphores.enter(name);
                        self.log(&format!("[Pipeline] semaphore ({})", id));
                        semaphores
                            .wait_released(&id)
                            .await
                            .map_err(|e| format!("semaphore {} failed: {}", id, e))?;
                    }
                }
            }
            Ok(())
        })
    }

    /// Resolve the commit to check out: the discovered head, else the branch tip.
    async fn resolve_revision(&self) -> Result<Oid, String> {
        if let Some(head) = &self.checkout.head {
            return Ok(head.clone());
        }
        let path = repo_path(&self.checkout.repo);
        let branch = self.checkout.branch.clone();
        tokio::task::spawn_blocking(move || {
            let git = Git::open(&path)?;
            git.branch_tip(&branch)
        })
        .await
        .map_err(|e| format!("checkout task failed: {}", e))?
        .map_err(|e| format!("checkout failed: {}", e))
    }

    async fn read_file(&self, revision: Oid, path: String) -> Result<String, String> {
        let repo = repo_path(&self.checkout.repo);
        tokio::task::spawn_blocking(move || {
            let git = Git::open(&repo)?;
            git.read_file_string_at(&revision, &path)
        })
        .await
        .map_err(|e| format!("readFile task failed: {}", e))?
        .map_err(|e| format!("readFile failed: {}", e))
    }
}

/// Local filesystem path of a repository reference.
fn repo_path(repo: &RepoRef) -> PathBuf {
    let location = repo.as_str();
    PathBuf::from(location.strip_prefix("file://").unwrap_or(location))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::{Document, Scope};
    use crate::core::folders::Project;
    use crate::core::types::{BranchName, DocumentName};
    use crate::resolve::{BranchDefinitionBinder, Resolution, ResolvedDefinition};
    use std::time::Duration;

    fn bound(script: &str) -> BoundDefinition {
        let doc = Document::new(Scope::Global, DocumentName::jenkinsfile(), script);
        BranchDefinitionBinder::new()
            .bind(
                Resolution::Found(ResolvedDefinition::new(Scope::Global, doc)),
                CheckoutContext::new(
                    RepoRef::new("/nonexistent/repo").unwrap(),
                    BranchName::new("master").unwrap(),
                    None,
                ),
            )
            .unwrap()
    }

    fn job() -> BranchJob {
        BranchJob::new(
            Project::from_full_name("p").unwrap(),
            BranchName::new("master").unwrap(),
        )
    }

    async fn finish(scheduler: &LocalScheduler, id: &RunId) -> RunRecord {
        tokio::time::timeout(Duration::from_secs(10), scheduler.wait_for_completion(id))
            .await
            .expect("run did not finish")
            .unwrap()
    }

    #[tokio::test]
    async fn echo_script_completes() {
        let scheduler = LocalScheduler::new();
        let id = scheduler.schedule(job(), bound("echo 'hello'")).await.unwrap();

        let record = finish(&scheduler, &id).await;
        assert_eq!(record.status, RunStatus::Completed);
        assert!(record.log_contains("hello"));
        assert!(record.log_contains("Finished: SUCCESS"));
        assert_eq!(scheduler.last_run(&job()).unwrap().id, id);
        assert!(record.started_at.is_some_and(|t| t >= record.queued_at));
        assert!(record.duration().is_some_and(|d| d >= chrono::Duration::zero()));
    }

    #[tokio::test]
    async fn numbers_runs_per_job() {
        let scheduler = LocalScheduler::new();
        let first = scheduler.schedule(job(), bound("")).await.unwrap();
        let second = scheduler.schedule(job(), bound("")).await.unwrap();
        assert_eq!(first.number(), 1);
        assert_eq!(second.number(), 2);
        finish(&scheduler, &first).await;
        finish(&scheduler, &second).await;
        assert_eq!(scheduler.runs().len(), 2);
    }

    #[tokio::test]
    async fn parse_error_fails_run() {
        let scheduler = LocalScheduler::new();
        let id = scheduler.schedule(job(), bound("sh 'make'")).await.unwrap();

        let record = finish(&scheduler, &id).await;
        assert_eq!(record.status, RunStatus::Failed);
        assert!(record.error.unwrap().contains("unknown step"));
    }

    #[tokio::test]
    async fn deeply_nested_script_fails_run() {
        let scheduler = LocalScheduler::new();
        let script = format!("{}{}", "node {".repeat(100_000), "}".repeat(100_000));
        let id = scheduler.schedule(job(), bound(&script)).await.unwrap();

        let record = finish(&scheduler, &id).await;
        assert_eq!(record.status, RunStatus::Failed);
        assert!(record.error.unwrap().contains("node nesting exceeds 64 levels"));
    }

    #[tokio::test]
    async fn read_file_before_checkout_fails() {
        let scheduler = LocalScheduler::new();
        let id = scheduler
            .schedule(job(), bound("node { echo readFile('file') }"))
            .await
            .unwrap();

        let record = finish(&scheduler, &id).await;
        assert_eq!(record.status, RunStatus::Failed);
        assert!(record.log_contains("requires a checked-out workspace"));
    }

    #[tokio::test]
    async fn checkout_outside_node_fails() {
        let scheduler = LocalScheduler::new();
        let id = scheduler.schedule(job(), bound("checkout scm")).await.unwrap();

        let record = finish(&scheduler, &id).await;
        assert_eq!(record.status, RunStatus::Failed);
        assert!(record.log_contains("requires a node"));
    }

    #[tokio::test]
    async fn semaphore_without_rendezvous_fails() {
        let scheduler = LocalScheduler::new();
        let id = scheduler.schedule(job(), bound("semaphore 'wait'")).await.unwrap();

        let record = finish(&scheduler, &id).await;
        assert_eq!(record.status, RunStatus::Failed);
        assert!(scheduler.wait_for_start("wait/1").await.is_err());
    }

    #[tokio::test]
    async fn semaphore_holds_run() {
        let scheduler = LocalScheduler::with_rendezvous();
        let id = scheduler
            .schedule(job(), bound("semaphore 'wait'; echo 'after'"))
            .await
            .unwrap();

        scheduler.wait_for_start("wait/1").await.unwrap();
        let record = scheduler.run(&id).unwrap();
        assert_eq!(record.status, RunStatus::Running);
        assert!(!record.log_contains("after"));

        scheduler.success("wait/1").unwrap();
        let record = finish(&scheduler, &id).await;
        assert_eq!(record.status, RunStatus::Completed);
        assert!(record.log_contains("after"));
    }

    #[tokio::test]
    async fn unknown_run() {
        let scheduler = LocalScheduler::new();
        let result = scheduler.wait_for_completion(&RunId::new("nope", 1)).await;
        assert!(matches!(result, Err(SchedulerError::UnknownRun(_))));
    }

    #[test]
    fn repo_path_strips_file_scheme() {
        let repo = RepoRef::new("file:///srv/repo").unwrap();
        assert_eq!(repo_path(&repo), PathBuf::from("/srv/repo"));
    }
}
