//! scheduler::mock
//!
//! Mock scheduler for deterministic testing.
//!
//! Records every scheduled run and assigns build numbers per job without
//! executing anything. Failures can be configured for all runs or for one
//! branch.
//!
//! # Example
//!
//! ```
//! use pipeline_defaults::scheduler::mock::{FailOn, MockScheduler};
//! use pipeline_defaults::scheduler::SchedulerError;
//!
//! let scheduler = MockScheduler::new()
//!     .fail_on(FailOn::Any(SchedulerError::Unavailable("maintenance".into())));
//! assert!(scheduler.scheduled().is_empty());
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::traits::{BranchJob, BuildScheduler, RunId, SchedulerError};
use crate::core::document::Scope;
use crate::core::types::BranchName;
use crate::resolve::{BoundDefinition, CheckoutContext};

/// Mock scheduler. Thread-safe; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockScheduler {
    inner: Arc<Mutex<MockSchedulerInner>>,
}

#[derive(Debug, Default)]
struct MockSchedulerInner {
    next_number: HashMap<String, u64>,
    fail_on: Vec<FailOn>,
    scheduled: Vec<ScheduledRun>,
}

/// Configuration for which calls should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail every `schedule` call.
    Any(SchedulerError),
    /// Fail `schedule` for one branch.
    Branch(BranchName, SchedulerError),
}

/// A recorded `schedule` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledRun {
    pub run_id: RunId,
    pub job: BranchJob,
    pub source_scope: Scope,
    pub script: String,
    pub checkout: CheckoutContext,
    pub sandbox: bool,
}

impl MockScheduler {
    /// Create a new mock scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to fail on matching calls.
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.inner.lock().unwrap().fail_on.push(fail_on);
        self
    }

    /// All recorded runs, in scheduling order.
    pub fn scheduled(&self) -> Vec<ScheduledRun> {
        self.inner.lock().unwrap().scheduled.clone()
    }

    /// The most recent run for a job.
    pub fn last_run(&self, job: &BranchJob) -> Option<ScheduledRun> {
        self.inner
            .lock()
            .unwrap()
            .scheduled
            .iter()
            .rev()
            .find(|run| &run.job == job)
            .cloned()
    }
}

#[async_trait]
impl BuildScheduler for MockScheduler {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn schedule(
        &self,
        job: BranchJob,
        definition: BoundDefinition,
    ) -> Result<RunId, SchedulerError> {
        let mut inner = self.inner.lock().unwrap();

        let failure = inner.fail_on.iter().find_map(|f| match f {
            FailOn::Any(e) => Some(e.clone()),
            FailOn::Branch(branch, e) if branch == &job.branch => Some(e.clone()),
            _ => None,
        });
        if let Some(err) = failure {
            return Err(err);
        }

        let number = inner.next_number.entry(job.full_name()).or_insert(0);
        *number += 1;
        let run_id = RunId::new(job.full_name(), *number);

        inner.scheduled.push(ScheduledRun {
            run_id: run_id.clone(),
            job,
            source_scope: definition.source_scope().clone(),
            script: definition.script().to_string(),
            checkout: definition.checkout().clone(),
            sandbox: definition.sandbox(),
        });

        Ok(run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::Document;
    use crate::core::folders::Project;
    use crate::core::types::{DocumentName, RepoRef};
    use crate::resolve::{BranchDefinitionBinder, Resolution, ResolvedDefinition};

    fn bound(branch: &str) -> BoundDefinition {
        let doc = Document::new(Scope::Global, DocumentName::jenkinsfile(), "node {}");
        BranchDefinitionBinder::new()
            .bind(
                Resolution::Found(ResolvedDefinition::new(Scope::Global, doc)),
                CheckoutContext::new(
                    RepoRef::new("/repo").unwrap(),
                    BranchName::new(branch).unwrap(),
                    None,
                ),
            )
            .unwrap()
    }

    fn job(branch: &str) -> BranchJob {
        BranchJob::new(
            Project::from_full_name("f/p").unwrap(),
            BranchName::new(branch).unwrap(),
        )
    }

    #[tokio::test]
    async fn numbers_runs_per_job() {
        let scheduler = MockScheduler::new();

        let a1 = scheduler.schedule(job("a"), bound("a")).await.unwrap();
        let a2 = scheduler.schedule(job("a"), bound("a")).await.unwrap();
        let b1 = scheduler.schedule(job("b"), bound("b")).await.unwrap();

        assert_eq!(a1.number(), 1);
        assert_eq!(a2.number(), 2);
        assert_eq!(b1.number(), 1);
        assert_eq!(scheduler.last_run(&job("a")).unwrap().run_id, a2);
    }

    #[tokio::test]
    async fn records_definition() {
        let scheduler = MockScheduler::new();
        scheduler.schedule(job("a"), bound("a")).await.unwrap();

        let run = &scheduler.scheduled()[0];
        assert_eq!(run.script, "node {}");
        assert_eq!(run.checkout.branch.as_str(), "a");
        assert!(run.sandbox);
    }

    #[tokio::test]
    async fn fail_on_branch() {
        let scheduler = MockScheduler::new().fail_on(FailOn::Branch(
            BranchName::new("bad").unwrap(),
            SchedulerError::Rejected("queue full".into()),
        ));

        assert!(scheduler.schedule(job("bad"), bound("bad")).await.is_err());
        assert!(scheduler.schedule(job("good"), bound("good")).await.is_ok());
        assert_eq!(scheduler.scheduled().len(), 1);
    }
}
