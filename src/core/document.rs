//! core::document
//!
//! Scopes and the documents stored under them.
//!
//! # Scopes
//!
//! A [`Scope`] names a configuration namespace: either the single global
//! namespace or the namespace owned by one container (folder). Scopes
//! display and parse as `global` and `folder:<id>`.
//!
//! # Documents
//!
//! A [`Document`] is an immutable named blob. Its identity is
//! `(scope, name)`; two scopes may each hold a document with the same name.
//! Content is opaque script text and is passed through verbatim.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::types::{ContainerId, DocumentName, TypeError};

/// A configuration namespace.
///
/// # Example
///
/// ```
/// use pipeline_defaults::core::document::Scope;
///
/// let folder: Scope = "folder:team/backend".parse().unwrap();
/// assert_eq!(folder.to_string(), "folder:team/backend");
/// assert!(!folder.is_global());
///
/// let global: Scope = "global".parse().unwrap();
/// assert!(global.is_global());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Scope {
    /// Scope owned by a container.
    Container(ContainerId),
    /// The global scope. Least specific, exactly one.
    Global,
}

impl Scope {
    const FOLDER_PREFIX: &'static str = "folder:";

    /// Scope for a container.
    pub fn container(id: ContainerId) -> Self {
        Scope::Container(id)
    }

    /// Check if this is the global scope.
    pub fn is_global(&self) -> bool {
        matches!(self, Scope::Global)
    }

    /// The container that owns this scope, if any.
    pub fn container_id(&self) -> Option<&ContainerId> {
        match self {
            Scope::Container(id) => Some(id),
            Scope::Global => None,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::Container(id) => write!(f, "{}{}", Self::FOLDER_PREFIX, id),
        }
    }
}

impl FromStr for Scope {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "global" {
            return Ok(Scope::Global);
        }
        match s.strip_prefix(Self::FOLDER_PREFIX) {
            Some(id) => Ok(Scope::Container(ContainerId::new(id)?)),
            None => Err(TypeError::InvalidContainerId(format!(
                "unknown scope '{s}', expected 'global' or 'folder:<id>'"
            ))),
        }
    }
}

impl TryFrom<String> for Scope {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.to_string()
    }
}

/// An immutable named configuration document.
///
/// Fields are private; a document never changes after construction. A new
/// version of a document is a new `Document` saved through a store.
///
/// # Example
///
/// ```
/// use pipeline_defaults::core::document::{Document, Scope};
/// use pipeline_defaults::core::types::DocumentName;
///
/// let doc = Document::new(
///     Scope::Global,
///     DocumentName::jenkinsfile(),
///     "node { checkout scm }",
/// )
/// .with_comment("org-wide default");
///
/// assert_eq!(doc.name().as_str(), "Jenkinsfile");
/// assert_eq!(doc.comment(), "org-wide default");
/// assert_eq!(doc.digest().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    scope: Scope,
    name: DocumentName,
    content: String,
    #[serde(default)]
    comment: String,
}

impl Document {
    /// Create a document in `scope`.
    pub fn new(scope: Scope, name: DocumentName, content: impl Into<String>) -> Self {
        Self {
            scope,
            name,
            content: content.into(),
            comment: String::new(),
        }
    }

    /// Attach a free-text comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// The scope the document belongs to.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// The document's name.
    pub fn name(&self) -> &DocumentName {
        &self.name
    }

    /// The raw content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The comment, possibly empty.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// Hex SHA-256 of the content.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content.as_bytes());
        hex::encode(hasher.finalize())
    }
}
