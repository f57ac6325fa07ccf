//! core::folders
//!
//! Container (folder) topology and the projects placed in it.
//!
//! # Architecture
//!
//! Containment is a tree of parent pointers maintained by the host:
//! - Nodes are containers identified by [`ContainerId`]
//! - Edges point from child to parent
//! - Projects sit in at most one container
//!
//! The resolver only needs one question answered: "what is this container's
//! parent?". That is the [`ContainerTopology`] trait. Two implementations are
//! provided:
//!
//! - [`PathTopology`]: parents follow the id path (`a/b` is inside `a`)
//! - [`FolderTree`]: explicit parent pointers registered by the host
//!
//! # Invariants
//!
//! - Nothing prevents a host from registering a cycle; readers must not trust
//!   the tree to terminate
//! - A `RwLock<T>` around a topology is itself a topology, so a shared tree
//!   can be mutated while resolutions read it

use std::collections::HashMap;
use std::sync::RwLock;

use super::types::{ContainerId, TypeError};

/// Read access to container ancestry.
pub trait ContainerTopology: Send + Sync {
    /// The immediate parent of `container`, or `None` for a top-level container.
    fn parent_of(&self, container: &ContainerId) -> Option<ContainerId>;
}

/// Topology where a container's parent is given by its id path.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathTopology;

impl ContainerTopology for PathTopology {
    fn parent_of(&self, container: &ContainerId) -> Option<ContainerId> {
        container.parent()
    }
}

impl<T: ContainerTopology> ContainerTopology for RwLock<T> {
    fn parent_of(&self, container: &ContainerId) -> Option<ContainerId> {
        let guard = self.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.parent_of(container)
    }
}

/// Folder tree with explicit parent pointers.
///
/// The host may register any parent, cycles included; the scope chain walk
/// detects them.
///
/// # Example
///
/// ```
/// use pipeline_defaults::core::folders::{ContainerTopology, FolderTree};
/// use pipeline_defaults::core::types::ContainerId;
///
/// let mut tree = FolderTree::new();
/// let org = ContainerId::new("org").unwrap();
/// let team = ContainerId::new("team").unwrap();
///
/// tree.add_folder(org.clone(), None);
/// tree.add_folder(team.clone(), Some(org.clone()));
///
/// assert_eq!(tree.parent_of(&team), Some(org.clone()));
/// assert_eq!(tree.parent_of(&org), None);
/// ```
#[derive(Debug, Default, Clone)]
pub struct FolderTree {
    /// Parent pointer for each nested folder
    parents: HashMap<ContainerId, ContainerId>,
}

impl FolderTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a folder, moving it if it was already registered.
    pub fn add_folder(&mut self, folder: ContainerId, parent: Option<ContainerId>) {
        match parent {
            Some(parent) => {
                self.parents.insert(folder, parent);
            }
            None => {
                self.parents.remove(&folder);
            }
        }
    }
}

impl ContainerTopology for FolderTree {
    fn parent_of(&self, container: &ContainerId) -> Option<ContainerId> {
        self.parents.get(container).cloned()
    }
}

/// A multibranch project and the folder it lives in.
///
/// # Example
///
/// ```
/// use pipeline_defaults::core::folders::Project;
///
/// let p = Project::from_full_name("team/backend/p").unwrap();
/// assert_eq!(p.name(), "p");
/// assert_eq!(p.folder().unwrap().as_str(), "team/backend");
/// assert_eq!(p.full_name(), "team/backend/p");
///
/// let top = Project::from_full_name("p").unwrap();
/// assert!(top.folder().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Project {
    name: String,
    folder: Option<ContainerId>,
}

impl Project {
    /// Create a project named `name` inside `folder`.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidContainerId` if `name` is not a valid path component.
    pub fn new(name: impl Into<String>, folder: Option<ContainerId>) -> Result<Self, TypeError> {
        let name = name.into();
        // A project name must be usable as the last component of a full name.
        ContainerId::new(name.as_str())?;
        if name.contains('/') {
            return Err(TypeError::InvalidContainerId(format!(
                "project name '{name}' cannot contain '/'"
            )));
        }
        Ok(Self { name, folder })
    }

    /// Parse a full name such as `folder/sub/project`.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidContainerId` if any component is invalid.
    pub fn from_full_name(full_name: &str) -> Result<Self, TypeError> {
        let id = ContainerId::new(full_name)?;
        let name = id.leaf().to_string();
        Self::new(name, id.parent())
    }

    /// The project's own name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The immediate containing folder, if nested.
    pub fn folder(&self) -> Option<&ContainerId> {
        self.folder.as_ref()
    }

    /// `folder/.../name`.
    pub fn full_name(&self) -> String {
        match &self.folder {
            Some(folder) => format!("{}/{}", folder, self.name),
            None => self.name.clone(),
        }
    }
}

impl std::fmt::Display for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_name())
    }
}
