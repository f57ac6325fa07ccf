//! store::traits
//!
//! The configuration store trait.
//!
//! # Design
//!
//! `ConfigStore` is async because real stores do I/O. `get` is the only
//! suspension point of a resolution; it must return a snapshot of the
//! scope's documents that later saves cannot mutate.
//!
//! Implementations own their own concurrency control. Callers never hold a
//! lock across a store call.
//!
//! # Example
//!
//! ```ignore
//! use pipeline_defaults::core::document::Scope;
//! use pipeline_defaults::store::ConfigStore;
//!
//! async fn names(store: &dyn ConfigStore) -> Result<Vec<String>, StoreError> {
//!     let docs = store.get(&Scope::Global).await?;
//!     Ok(docs.iter().map(|d| d.name().to_string()).collect())
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

use crate::core::document::{Document, Scope};
use crate::core::types::DocumentName;

/// Errors from store operations.
///
/// `Clone` so that failures can be aggregated per scope and injected by
/// test doubles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing store cannot be reached at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Reading a scope failed.
    #[error("failed to read {scope}: {message}")]
    Read {
        /// The scope being read
        scope: Scope,
        /// Description of the failure
        message: String,
    },

    /// Writing a scope failed.
    #[error("failed to write {scope}: {message}")]
    Write {
        /// The scope being written
        scope: Scope,
        /// Description of the failure
        message: String,
    },

    /// Stored data for a scope is malformed.
    #[error("malformed documents in {scope}: {message}")]
    Parse {
        /// The scope being read
        scope: Scope,
        /// Description of the failure
        message: String,
    },

    /// A document was saved under a scope other than its own.
    #[error("document belongs to {document} but was saved to {target}")]
    ScopeMismatch {
        /// The scope the save targeted
        target: Scope,
        /// The scope recorded on the document
        document: Scope,
    },

    /// The store's writer lock could not be taken.
    #[error("store lock error: {0}")]
    Lock(String),
}

/// A keyed store of named documents, scoped globally or to a container.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Get a human-readable name for this store.
    fn name(&self) -> &'static str;

    /// All documents in `scope`, in the store's order.
    ///
    /// An unknown or empty scope yields an empty list, not an error.
    async fn get(&self, scope: &Scope) -> Result<Vec<Document>, StoreError>;

    /// Save `document` into `scope`, replacing a same-named document.
    ///
    /// # Errors
    ///
    /// [`StoreError::ScopeMismatch`] if `document.scope()` differs from `scope`.
    async fn save(&self, scope: &Scope, document: Document) -> Result<(), StoreError>;

    /// Remove the document named `name` from `scope`.
    ///
    /// Returns whether a document was removed.
    async fn remove(&self, scope: &Scope, name: &DocumentName) -> Result<bool, StoreError>;
}

/// Check that `document` may be saved into `scope`.
pub(crate) fn check_scope(scope: &Scope, document: &Document) -> Result<(), StoreError> {
    if document.scope() != scope {
        return Err(StoreError::ScopeMismatch {
            target: scope.clone(),
            document: document.scope().clone(),
        });
    }
    Ok(())
}

/// Insert or replace `document` in `documents`, keeping its position.
pub(crate) fn upsert(documents: &mut Vec<Document>, document: Document) {
    match documents.iter_mut().find(|d| d.name() == document.name()) {
        Some(existing) => *existing = document,
        None => documents.push(document),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ContainerId;

    fn doc(scope: Scope, name: &str, content: &str) -> Document {
        Document::new(scope, DocumentName::new(name).unwrap(), content)
    }

    #[test]
    fn mismatch_detected() {
        let folder = Scope::Container(ContainerId::new("f").unwrap());
        let d = doc(Scope::Global, "Jenkinsfile", "x");
        let err = check_scope(&folder, &d).unwrap_err();
        assert!(matches!(err, StoreError::ScopeMismatch { .. }));
        assert!(err.to_string().contains("folder:f"));
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut docs = vec![
            doc(Scope::Global, "a", "1"),
            doc(Scope::Global, "b", "2"),
        ];
        upsert(&mut docs, doc(Scope::Global, "a", "3"));
        upsert(&mut docs, doc(Scope::Global, "c", "4"));

        let names: Vec<_> = docs.iter().map(|d| d.name().as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(docs[0].content(), "3");
    }
}
