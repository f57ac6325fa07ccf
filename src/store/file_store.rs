//! store::file_store
//!
//! File-backed configuration store.
//!
//! # Layout
//!
//! One TOML file per scope, routed by [`StorePaths`]:
//!
//! ```toml
//! version = 1
//!
//! [[documents]]
//! name = "Jenkinsfile"
//! comment = "org default"
//! content = """
//! node { checkout scm }
//! """
//! ```
//!
//! # Consistency
//!
//! - Reads load a whole file, so every `get` is a snapshot
//! - Writes hold the store lock for the read-modify-write and replace the
//!   file atomically (write to temp file, then rename)
//! - Blocking file locking runs on the blocking pool, never on a runtime worker
//!
//! # Example
//!
//! ```no_run
//! use pipeline_defaults::core::document::{Document, Scope};
//! use pipeline_defaults::core::types::DocumentName;
//! use pipeline_defaults::store::{ConfigStore, FileConfigStore};
//!
//! # tokio_test::block_on(async {
//! let store = FileConfigStore::new("/srv/defaults".into());
//! let doc = Document::new(Scope::Global, DocumentName::jenkinsfile(), "node {}");
//! store.save(&Scope::Global, doc).await.unwrap();
//! # });
//! ```

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::lock::StoreLock;
use super::traits::{check_scope, upsert, ConfigStore, StoreError};
use crate::core::document::{Document, Scope};
use crate::core::paths::StorePaths;
use crate::core::types::DocumentName;

/// Current on-disk format version.
const FORMAT_VERSION: u32 = 1;

/// On-disk representation of one scope.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScopeFile {
    version: u32,
    #[serde(default)]
    documents: Vec<StoredDocument>,
}

/// A document without its scope; the file's location implies it.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredDocument {
    name: DocumentName,
    #[serde(default)]
    comment: String,
    content: String,
}

impl ScopeFile {
    fn into_documents(self, scope: &Scope) -> Vec<Document> {
        self.documents
            .into_iter()
            .map(|d| Document::new(scope.clone(), d.name, d.content).with_comment(d.comment))
            .collect()
    }

    fn from_documents(documents: &[Document]) -> Self {
        Self {
            version: FORMAT_VERSION,
            documents: documents
                .iter()
                .map(|d| StoredDocument {
                    name: d.name().clone(),
                    comment: d.comment().to_string(),
                    content: d.content().to_string(),
                })
                .collect(),
        }
    }
}

/// File-backed store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    paths: StorePaths,
}

impl FileConfigStore {
    /// Create a store rooted at `root`. Nothing is created until the first save.
    pub fn new(root: PathBuf) -> Self {
        Self {
            paths: StorePaths::new(root),
        }
    }

    /// The store's path routing.
    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Run a read-modify-write of one scope file under the store lock.
    async fn modify<T, F>(&self, scope: &Scope, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Vec<Document>) -> T + Send + 'static,
    {
        let paths = self.paths.clone();
        let scope = scope.clone();
        let join_scope = scope.clone();

        tokio::task::spawn_blocking(move || {
            let _lock =
                StoreLock::acquire(&paths).map_err(|e| StoreError::Lock(e.to_string()))?;

            let path = paths.documents_path(&scope);
            let mut documents = read_scope_file(&path, &scope)?;
            let result = f(&mut documents);
            write_scope_file(&path, &scope, &documents)?;
            Ok(result)
        })
        .await
        .map_err(|e| StoreError::Write {
            scope: join_scope,
            message: format!("writer task failed: {}", e),
        })?
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, scope: &Scope) -> Result<Vec<Document>, StoreError> {
        let path = self.paths.documents_path(scope);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StoreError::Read {
                    scope: scope.clone(),
                    message: format!("{}: {}", path.display(), e),
                })
            }
        };
        parse_scope_file(&content, scope)
    }

    async fn save(&self, scope: &Scope, document: Document) -> Result<(), StoreError> {
        check_scope(scope, &document)?;
        tracing::debug!(%scope, name = %document.name(), "saving document");
        self.modify(scope, move |documents| upsert(documents, document))
            .await
    }

    async fn remove(&self, scope: &Scope, name: &DocumentName) -> Result<bool, StoreError> {
        let name = name.clone();
        self.modify(scope, move |documents| {
            let before = documents.len();
            documents.retain(|d| d.name() != &name);
            documents.len() != before
        })
        .await
    }
}

fn parse_scope_file(content: &str, scope: &Scope) -> Result<Vec<Document>, StoreError> {
    let file: ScopeFile = toml::from_str(content).map_err(|e| StoreError::Parse {
        scope: scope.clone(),
        message: e.to_string(),
    })?;

    if file.version != FORMAT_VERSION {
        return Err(StoreError::Parse {
            scope: scope.clone(),
            message: format!("unsupported format version {}", file.version),
        });
    }

    Ok(file.into_documents(scope))
}

fn read_scope_file(path: &Path, scope: &Scope) -> Result<Vec<Document>, StoreError> {
    match fs::read_to_string(path) {
        Ok(content) => parse_scope_file(&content, scope),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(StoreError::Read {
            scope: scope.clone(),
            message: format!("{}: {}", path.display(), e),
        }),
    }
}

/// Write a scope file atomically. An empty scope removes its file.
fn write_scope_file(path: &Path, scope: &Scope, documents: &[Document]) -> Result<(), StoreError> {
    let write_err = |message: String| StoreError::Write {
        scope: scope.clone(),
        message,
    };

    if documents.is_empty() {
        return match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(write_err(format!("cannot remove {}: {}", path.display(), e))),
        };
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| write_err(format!("cannot create {}: {}", parent.display(), e)))?;
    }

    let content = toml::to_string_pretty(&ScopeFile::from_documents(documents))
        .map_err(|e| write_err(format!("cannot serialize: {}", e)))?;

    let temp_path = path.with_extension("toml.tmp");
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| write_err(format!("cannot create temp file: {}", e)))?;

        file.write_all(content.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| write_err(format!("cannot write temp file: {}", e)))?;
    }

    fs::rename(&temp_path, path).map_err(|e| write_err(format!("cannot rename: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ContainerId;
    use tempfile::TempDir;

    fn folder(id: &str) -> Scope {
        Scope::Container(ContainerId::new(id).unwrap())
    }

    fn doc(scope: Scope, name: &str, content: &str) -> Document {
        Document::new(scope, DocumentName::new(name).unwrap(), content)
    }

    #[tokio::test]
    async fn missing_root_reads_empty() {
        let temp = TempDir::new().unwrap();
        let store = FileConfigStore::new(temp.path().join("absent"));
        assert!(store.get(&Scope::Global).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_get() {
        let temp = TempDir::new().unwrap();
        let store = FileConfigStore::new(temp.path().to_path_buf());
        let scope = folder("team/backend");

        let d = doc(scope.clone(), "Jenkinsfile", "node {\n  echo 'hi'\n}\n")
            .with_comment("team default");
        store.save(&scope, d.clone()).await.unwrap();

        let docs = store.get(&scope).await.unwrap();
        assert_eq!(docs, vec![d]);
        assert!(store
            .paths()
            .documents_path(&scope)
            .ends_with("folders/team/backend/documents.toml"));
    }

    #[tokio::test]
    async fn save_preserves_order_and_replaces() {
        let temp = TempDir::new().unwrap();
        let store = FileConfigStore::new(temp.path().to_path_buf());

        for (name, content) in [("a", "1"), ("b", "2"), ("a", "3")] {
            store
                .save(&Scope::Global, doc(Scope::Global, name, content))
                .await
                .unwrap();
        }

        let docs = store.get(&Scope::Global).await.unwrap();
        let pairs: Vec<_> = docs
            .iter()
            .map(|d| (d.name().as_str(), d.content()))
            .collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
    }

    #[tokio::test]
    async fn scope_mismatch_rejected() {
        let temp = TempDir::new().unwrap();
        let store = FileConfigStore::new(temp.path().to_path_buf());
        let result = store
            .save(&Scope::Global, doc(folder("x"), "Jenkinsfile", ""))
            .await;
        assert!(matches!(result, Err(StoreError::ScopeMismatch { .. })));
    }

    #[tokio::test]
    async fn malformed_file_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let store = FileConfigStore::new(temp.path().to_path_buf());
        let path = store.paths().documents_path(&Scope::Global);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "this is not toml [").unwrap();

        let result = store.get(&Scope::Global).await;
        assert!(matches!(result, Err(StoreError::Parse { .. })));
    }

    #[tokio::test]
    async fn unsupported_version_rejected() {
        let temp = TempDir::new().unwrap();
        let store = FileConfigStore::new(temp.path().to_path_buf());
        let path = store.paths().documents_path(&Scope::Global);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "version = 99\n").unwrap();

        assert!(matches!(
            store.get(&Scope::Global).await,
            Err(StoreError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn remove_last_document_deletes_file() {
        let temp = TempDir::new().unwrap();
        let store = FileConfigStore::new(temp.path().to_path_buf());
        store
            .save(&Scope::Global, doc(Scope::Global, "Jenkinsfile", "x"))
            .await
            .unwrap();

        let removed = store
            .remove(&Scope::Global, &DocumentName::jenkinsfile())
            .await
            .unwrap();

        assert!(removed);
        assert!(!store.paths().documents_path(&Scope::Global).exists());
        assert!(store.get(&Scope::Global).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_saves_all_land() {
        let temp = TempDir::new().unwrap();
        let store = FileConfigStore::new(temp.path().to_path_buf());

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let name = format!("doc-{i}");
                store
                    .save(&Scope::Global, doc(Scope::Global, &name, "x"))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.get(&Scope::Global).await.unwrap().len(), 16);
    }
}
