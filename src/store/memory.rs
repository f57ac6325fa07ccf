//! store::memory
//!
//! In-memory configuration store.
//!
//! # Design
//!
//! Documents live in a map behind an `Arc<Mutex<...>>`. `get` clones a
//! snapshot of one scope under the mutex and releases it before returning,
//! so concurrent readers see either the state before or after a save, never
//! a partial one.
//!
//! The store also serves as the test double for the resolver: failures can
//! be injected per scope and every call is recorded.
//!
//! # Example
//!
//! ```
//! use pipeline_defaults::core::document::{Document, Scope};
//! use pipeline_defaults::core::types::DocumentName;
//! use pipeline_defaults::store::{ConfigStore, MemoryConfigStore};
//!
//! # tokio_test::block_on(async {
//! let store = MemoryConfigStore::new();
//! let doc = Document::new(Scope::Global, DocumentName::jenkinsfile(), "node {}");
//! store.save(&Scope::Global, doc).await.unwrap();
//!
//! let docs = store.get(&Scope::Global).await.unwrap();
//! assert_eq!(docs.len(), 1);
//! assert_eq!(docs[0].content(), "node {}");
//! # });
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::{check_scope, upsert, ConfigStore, StoreError};
use crate::core::document::{Document, Scope};
use crate::core::types::DocumentName;

/// In-memory store, cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigStore {
    /// Internal state shared across clones.
    inner: Arc<Mutex<MemoryStoreInner>>,
}

/// Internal mutable state.
#[derive(Debug, Default)]
struct MemoryStoreInner {
    /// Documents per scope, in insertion order.
    documents: HashMap<Scope, Vec<Document>>,
    /// Injected failures.
    fail_on: Vec<FailOn>,
    /// Recorded operations for verification.
    operations: Vec<StoreOperation>,
    /// Artificial delay applied to every `get`.
    latency: Option<Duration>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail `get` for one scope.
    Get(Scope, StoreError),
    /// Fail every `get`.
    GetAny(StoreError),
    /// Fail every `save`.
    Save(StoreError),
    /// Fail every `remove`.
    Remove(StoreError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOperation {
    Get { scope: Scope },
    Save { scope: Scope, name: DocumentName },
    Remove { scope: Scope, name: DocumentName },
}

impl MemoryConfigStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with documents, each under its own scope.
    pub fn with_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let store = Self::new();
        for document in documents {
            store.insert_raw(document);
        }
        store
    }

    /// Configure the store to fail on a specific operation.
    ///
    /// Several failures may be configured; the first matching one applies.
    ///
    /// # Example
    ///
    /// ```
    /// use pipeline_defaults::core::document::Scope;
    /// use pipeline_defaults::store::{FailOn, MemoryConfigStore, StoreError};
    ///
    /// let store = MemoryConfigStore::new().fail_on(FailOn::Get(
    ///     Scope::Global,
    ///     StoreError::Unavailable("offline".into()),
    /// ));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.inner.lock().unwrap().fail_on.push(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.inner.lock().unwrap().fail_on.clear();
    }

    /// Delay every `get` by `latency`, to widen race windows in tests.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.inner.lock().unwrap().latency = Some(latency);
        self
    }

    /// Append a document to its scope without replacing same-named entries.
    ///
    /// This is how a host with duplicate names in one scope is modeled.
    pub fn insert_raw(&self, document: Document) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .documents
            .entry(document.scope().clone())
            .or_default()
            .push(document);
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<StoreOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    /// Scopes that `get` was called with, in call order.
    pub fn queried_scopes(&self) -> Vec<Scope> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                StoreOperation::Get { scope } => Some(scope),
                _ => None,
            })
            .collect()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.inner.lock().unwrap().operations.clear();
    }
}

impl MemoryStoreInner {
    fn get_failure(&self, scope: &Scope) -> Option<StoreError> {
        self.fail_on.iter().find_map(|f| match f {
            FailOn::Get(s, e) if s == scope => Some(e.clone()),
            FailOn::GetAny(e) => Some(e.clone()),
            _ => None,
        })
    }

    fn save_failure(&self) -> Option<StoreError> {
        self.fail_on.iter().find_map(|f| match f {
            FailOn::Save(e) => Some(e.clone()),
            _ => None,
        })
    }

    fn remove_failure(&self) -> Option<StoreError> {
        self.fail_on.iter().find_map(|f| match f {
            FailOn::Remove(e) => Some(e.clone()),
            _ => None,
        })
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, scope: &Scope) -> Result<Vec<Document>, StoreError> {
        let (snapshot, latency) = {
            let mut inner = self.inner.lock().unwrap();
            inner.operations.push(StoreOperation::Get {
                scope: scope.clone(),
            });
            let snapshot = match inner.get_failure(scope) {
                Some(err) => Err(err),
                None => Ok(inner.documents.get(scope).cloned().unwrap_or_default()),
            };
            (snapshot, inner.latency)
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        snapshot
    }

    async fn save(&self, scope: &Scope, document: Document) -> Result<(), StoreError> {
        check_scope(scope, &document)?;

        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(StoreOperation::Save {
            scope: scope.clone(),
            name: document.name().clone(),
        });
        if let Some(err) = inner.save_failure() {
            return Err(err);
        }

        upsert(inner.documents.entry(scope.clone()).or_default(), document);
        Ok(())
    }

    async fn remove(&self, scope: &Scope, name: &DocumentName) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(StoreOperation::Remove {
            scope: scope.clone(),
            name: name.clone(),
        });
        if let Some(err) = inner.remove_failure() {
            return Err(err);
        }

        let Some(documents) = inner.documents.get_mut(scope) else {
            return Ok(false);
        };
        let before = documents.len();
        documents.retain(|d| d.name() != name);
        Ok(documents.len() != before)
    }
}
