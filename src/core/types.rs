//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name
//! - [`Oid`] - Git object identifier (SHA)
//! - [`ContainerId`] - Full path of a folder that can hold projects and defaults
//! - [`DocumentName`] - Name of a stored configuration document
//! - [`RepoRef`] - Location of a source repository
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, so a resolver never has to re-check a name
//! it was handed.
//!
//! # Examples
//!
//! ```
//! use pipeline_defaults::core::types::{BranchName, ContainerId, DocumentName, Oid};
//!
//! let branch = BranchName::new("master").unwrap();
//! let folder = ContainerId::new("team/backend").unwrap();
//! let script = DocumentName::new("Jenkinsfile").unwrap();
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//!
//! assert_eq!(folder.parent().unwrap().as_str(), "team");
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(DocumentName::new("").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid container id: {0}")]
    InvalidContainerId(String),

    #[error("invalid document name: {0}")]
    InvalidDocumentName(String),

    #[error("invalid repository reference: {0}")]
    InvalidRepoRef(String),
}

/// A validated Git branch name.
///
/// Branch names must conform to Git's refname rules (see `git check-ref-format`):
/// - Cannot be empty
/// - Cannot start with `.` or `-`
/// - Cannot end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, or ASCII control characters
/// - Cannot contain spaces, `~`, `^`, `:`, `\`, `?`, `*`, `[`
/// - Cannot be exactly `@`
///
/// # Example
///
/// ```
/// use pipeline_defaults::core::types::BranchName;
///
/// let name = BranchName::new("feature/my-branch").unwrap();
/// assert_eq!(name.as_str(), "feature/my-branch");
/// assert_eq!(name.ref_name(), "refs/heads/feature/my-branch");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("branch.lock").is_err());
/// assert!(BranchName::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        let invalid = |msg: &str| Err(TypeError::InvalidBranchName(msg.to_string()));

        if name.is_empty() {
            return invalid("branch name cannot be empty");
        }
        if name == "@" {
            return invalid("branch name cannot be '@' (reserved)");
        }
        if name.starts_with('.') || name.starts_with('-') {
            return invalid("branch name cannot start with '.' or '-'");
        }
        if name.ends_with(".lock") || name.ends_with('/') {
            return invalid("branch name cannot end with '.lock' or '/'");
        }
        for seq in ["..", "@{", "//"] {
            if name.contains(seq) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{seq}'"
                )));
            }
        }

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        if let Some(c) = name.chars().find(|c| INVALID_CHARS.contains(c)) {
            return Err(TypeError::InvalidBranchName(format!(
                "branch name cannot contain '{c}'"
            )));
        }
        if name.chars().any(|c| c.is_ascii_control()) {
            return invalid("branch name cannot contain control characters");
        }

        for component in name.split('/').filter(|c| !c.is_empty()) {
            if component.starts_with('.') || component.ends_with(".lock") {
                return invalid("path component cannot start with '.' or end with '.lock'");
            }
        }

        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full ref name of the local branch (`refs/heads/<name>`).
    pub fn ref_name(&self) -> String {
        format!("refs/heads/{}", self.0)
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A Git object identifier (SHA-1 or SHA-256).
///
/// OIDs are normalized to lowercase for consistency.
///
/// # Example
///
/// ```
/// use pipeline_defaults::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a valid hex OID.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Get an abbreviated form of the OID.
    pub fn short(&self, len: usize) -> &str {
        let end = len.min(self.0.len());
        &self.0[..end]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Full path of a container (folder), e.g. `team/backend`.
///
/// Components are separated by `/`. Each component must be non-empty, must
/// not be `.` or `..`, and must not contain backslashes or control characters.
/// The same path is used as the on-disk location of the folder's store, so
/// these rules also keep it from escaping the store root.
///
/// # Example
///
/// ```
/// use pipeline_defaults::core::types::ContainerId;
///
/// let id = ContainerId::new("team/backend").unwrap();
/// assert_eq!(id.leaf(), "backend");
/// assert_eq!(id.components().count(), 2);
/// assert!(ContainerId::new("team/../etc").is_err());
/// assert!(ContainerId::new("/abs").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContainerId(String);

impl ContainerId {
    /// Create a new validated container id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidContainerId` if any component is invalid.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::InvalidContainerId(
                "container id cannot be empty".into(),
            ));
        }
        for component in id.split('/') {
            if component.is_empty() {
                return Err(TypeError::InvalidContainerId(format!(
                    "'{id}' has an empty path component"
                )));
            }
            if component == "." || component == ".." {
                return Err(TypeError::InvalidContainerId(format!(
                    "'{id}' cannot contain '.' or '..' components"
                )));
            }
            if component.trim() != component {
                return Err(TypeError::InvalidContainerId(format!(
                    "'{id}' has leading or trailing whitespace in a component"
                )));
            }
            if component.chars().any(|c| c == '\\' || c.is_control()) {
                return Err(TypeError::InvalidContainerId(format!(
                    "'{id}' cannot contain backslashes or control characters"
                )));
            }
        }
        Ok(Self(id))
    }

    /// Get the container id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path components, outermost first.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('/')
    }

    /// The last path component (the folder's own name).
    pub fn leaf(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The enclosing container derived from the path, if any.
    pub fn parent(&self) -> Option<ContainerId> {
        self.0
            .rsplit_once('/')
            .map(|(parent, _)| ContainerId(parent.to_string()))
    }

    /// A child container of this one.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidContainerId` if `name` is not a valid component.
    pub fn child(&self, name: &str) -> Result<ContainerId, TypeError> {
        if name.contains('/') {
            return Err(TypeError::InvalidContainerId(format!(
                "child name '{name}' cannot contain '/'"
            )));
        }
        ContainerId::new(format!("{}/{}", self.0, name))
    }
}

impl TryFrom<String> for ContainerId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContainerId> for String {
    fn from(id: ContainerId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a configuration document, such as `Jenkinsfile`.
///
/// Matching is exact and case-sensitive. Names cannot be empty, cannot be
/// `.` or `..`, and cannot contain `/`, `\` or control characters.
///
/// # Example
///
/// ```
/// use pipeline_defaults::core::types::DocumentName;
///
/// let name = DocumentName::new("Jenkinsfile").unwrap();
/// assert_ne!(name, DocumentName::new("jenkinsfile").unwrap());
/// assert!(DocumentName::new("ci/Jenkinsfile").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentName(String);

impl DocumentName {
    /// Canonical name of the pipeline script.
    pub const JENKINSFILE: &'static str = "Jenkinsfile";

    /// Create a new validated document name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidDocumentName` if the name is empty or malformed.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TypeError::InvalidDocumentName(
                "document name cannot be empty".into(),
            ));
        }
        if name == "." || name == ".." {
            return Err(TypeError::InvalidDocumentName(format!(
                "'{name}' is reserved"
            )));
        }
        if name
            .chars()
            .any(|c| c == '/' || c == '\\' || c.is_control())
        {
            return Err(TypeError::InvalidDocumentName(format!(
                "'{name}' cannot contain '/', '\\' or control characters"
            )));
        }
        Ok(Self(name))
    }

    /// The canonical `Jenkinsfile` name.
    pub fn jenkinsfile() -> Self {
        Self(Self::JENKINSFILE.to_string())
    }

    /// Get the document name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DocumentName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<DocumentName> for String {
    fn from(name: DocumentName) -> Self {
        name.0
    }
}

impl std::fmt::Display for DocumentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Location of a source repository (a URL or a local path).
///
/// The value is opaque to the resolver; only the scheduler and branch
/// source interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoRef(String);

impl RepoRef {
    /// Create a new repository reference.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRepoRef` if the value is blank.
    pub fn new(location: impl Into<String>) -> Result<Self, TypeError> {
        let location = location.into();
        if location.trim().is_empty() {
            return Err(TypeError::InvalidRepoRef(
                "repository reference cannot be empty".into(),
            ));
        }
        Ok(Self(location))
    }

    /// Get the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RepoRef {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RepoRef> for String {
    fn from(repo: RepoRef) -> Self {
        repo.0
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
