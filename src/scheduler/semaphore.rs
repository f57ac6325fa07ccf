//! scheduler::semaphore
//!
//! Named rendezvous points between running scripts and a test harness.
//!
//! Each `semaphore 'name'` step gets an id `name/N`, where `N` counts the
//! steps with that name seen by this scheduler, starting at 1. The step
//! blocks until the harness calls [`Semaphores::success`] or
//! [`Semaphores::failure`] for its id. The harness can wait for a step to be
//! reached with [`Semaphores::wait_for_start`]. Releases may happen before
//! the step starts.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pipeline_defaults::scheduler::semaphore::Semaphores;
//!
//! # tokio_test::block_on(async {
//! let semaphores = Arc::new(Semaphores::new());
//!
//! let step = {
//!     let semaphores = Arc::clone(&semaphores);
//!     tokio::spawn(async move {
//!         let id = semaphores.enter("wait");
//!         semaphores.wait_released(&id).await
//!     })
//! };
//!
//! semaphores.wait_for_start("wait/1").await;
//! semaphores.success("wait/1");
//! assert!(step.await.unwrap().is_ok());
//! # });
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Slot {
    started: bool,
    outcome: Option<Result<(), String>>,
}

#[derive(Debug, Default)]
struct State {
    counters: HashMap<String, u64>,
    slots: HashMap<String, Slot>,
}

/// Registry of semaphore slots.
#[derive(Debug, Default)]
pub struct Semaphores {
    state: Mutex<State>,
    changed: Notify,
}

impl Semaphores {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a step reaching semaphore `name` and return its id.
    pub fn enter(&self, name: &str) -> String {
        let id = {
            let mut state = self.state();
            let counter = state.counters.entry(name.to_string()).or_insert(0);
            *counter += 1;
            let id = format!("{}/{}", name, counter);
            state.slots.entry(id.clone()).or_default().started = true;
            id
        };
        tracing::debug!(semaphore = %id, "semaphore reached");
        self.changed.notify_waiters();
        id
    }

    /// Wait until the step `id` is released.
    ///
    /// Returns the message passed to [`Semaphores::failure`] as `Err`.
    pub async fn wait_released(&self, id: &str) -> Result<(), String> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let outcome = self.state().slots.get(id).and_then(|s| s.outcome.clone());
            if let Some(outcome) = outcome {
                return outcome;
            }
            notified.await;
        }
    }

    /// Wait until a step with id `id` has been reached.
    pub async fn wait_for_start(&self, id: &str) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_started(id) {
                return;
            }
            notified.await;
        }
    }

    /// Check whether step `id` has been reached.
    pub fn is_started(&self, id: &str) -> bool {
        self.state().slots.get(id).is_some_and(|s| s.started)
    }

    /// Let step `id` continue.
    pub fn success(&self, id: &str) {
        self.release(id, Ok(()));
    }

    /// Make step `id` fail with `message`.
    pub fn failure(&self, id: &str, message: impl Into<String>) {
        self.release(id, Err(message.into()));
    }

    fn release(&self, id: &str, outcome: Result<(), String>) {
        self.state().slots.entry(id.to_string()).or_default().outcome = Some(outcome);
        self.changed.notify_waiters();
    }
}
