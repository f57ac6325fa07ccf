//! scheduler
//!
//! Build scheduling for bound definitions.
//!
//! # Architecture
//!
//! [`BuildScheduler`] is the seam to whatever actually runs builds. The
//! indexer hands it one [`BoundDefinition`](crate::resolve::BoundDefinition)
//! per run and gets a [`RunId`] back without waiting for the build.
//!
//! Implementations:
//! - [`LocalScheduler`]: runs a small step language on the tokio runtime
//! - [`MockScheduler`]: records calls, runs nothing
//!
//! # Modules
//!
//! - [`script`] - Step language parser
//! - [`semaphore`] - Rendezvous points for controlling run timing

pub mod local;
pub mod mock;
pub mod script;
pub mod semaphore;
mod traits;

pub use local::LocalScheduler;
pub use mock::MockScheduler;
pub use traits::{BranchJob, BuildScheduler, RunId, RunRecord, RunStatus, SchedulerError};
