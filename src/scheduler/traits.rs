//! scheduler::traits
//!
//! The build scheduler trait and run bookkeeping types.
//!
//! # Design
//!
//! `schedule` hands a [`BoundDefinition`] to the scheduler and returns a
//! [`RunId`] as soon as the run is queued. It never waits for the run to
//! execute, so branch indexing is never blocked by builds.
//!
//! The definition is taken by value: one bound definition, one run.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::core::document::Scope;
use crate::core::folders::Project;
use crate::core::types::{BranchName, Oid};
use crate::resolve::BoundDefinition;

/// Errors from scheduler operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The scheduler refused the run.
    #[error("run rejected: {0}")]
    Rejected(String),

    /// The scheduler or one of its facilities is not available.
    #[error("scheduler unavailable: {0}")]
    Unavailable(String),

    /// No run with this id is known.
    #[error("unknown run: {0}")]
    UnknownRun(RunId),

    /// A run failed while executing.
    #[error("run failed: {0}")]
    Execution(String),
}

/// The job a branch's runs belong to: one per project branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchJob {
    /// The multibranch project
    pub project: Project,
    /// The branch
    pub branch: BranchName,
}

impl BranchJob {
    /// Create a job for `branch` of `project`.
    pub fn new(project: Project, branch: BranchName) -> Self {
        Self { project, branch }
    }

    /// `project/.../branch`.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.project.full_name(), self.branch)
    }
}

impl fmt::Display for BranchJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

/// Identifier of one run: the job plus a 1-based build number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId {
    job: String,
    number: u64,
}

impl RunId {
    /// Create a run id.
    pub fn new(job: impl Into<String>, number: u64) -> Self {
        Self {
            job: job.into(),
            number,
        }
    }

    /// Full name of the job.
    pub fn job(&self) -> &str {
        &self.job
    }

    /// Build number within the job, starting at 1.
    pub fn number(&self) -> u64 {
        self.number
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.job, self.number)
    }
}

/// Lifecycle of a run.
///
/// ```text
/// Queued -> Running -> {Completed, Failed}
/// Queued -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// Check whether the run has finished.
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Check whether moving to `next` is a legal transition.
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Queued, RunStatus::Running)
                | (RunStatus::Queued, RunStatus::Failed)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A snapshot of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    /// The run's id
    pub id: RunId,
    /// Current status
    pub status: RunStatus,
    /// Scope the definition came from
    pub source_scope: Scope,
    /// Branch being built
    pub branch: BranchName,
    /// Commit checked out, once checkout ran
    pub revision: Option<Oid>,
    /// Whether the script ran sandboxed
    pub sandbox: bool,
    /// Console output so far
    pub log: String,
    /// Failure reason, if failed
    pub error: Option<String>,
    /// When the run was queued
    pub queued_at: DateTime<Utc>,
    /// When execution began
    pub started_at: Option<DateTime<Utc>>,
    /// When the run completed or failed
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Check whether the log contains `needle`.
    pub fn log_contains(&self, needle: &str) -> bool {
        self.log.contains(needle)
    }

    /// Wall time from start to finish, once finished.
    pub fn duration(&self) -> Option<chrono::Duration> {
        Some(self.finished_at? - self.started_at?)
    }
}

/// Triggers runs for bound definitions.
#[async_trait]
pub trait BuildScheduler: Send + Sync {
    /// Get a human-readable name for this scheduler.
    fn name(&self) -> &'static str;

    /// Queue a run of `definition` for `job` and return its id.
    ///
    /// Returns once the run is queued; execution happens independently.
    async fn schedule(
        &self,
        job: BranchJob,
        definition: BoundDefinition,
    ) -> Result<RunId, SchedulerError>;
}
