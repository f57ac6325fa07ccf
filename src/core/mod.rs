//! core
//!
//! Core domain types, schemas, and configuration.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, ContainerId, DocumentName, RepoRef
//! - [`document`] - Scopes and the documents stored under them
//! - [`folders`] - Container topology and projects
//! - [`config`] - Configuration schema and loading
//! - [`paths`] - Path routing for the file-backed store
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and self-describing
//! - Documents are immutable once constructed

pub mod config;
pub mod document;
pub mod folders;
pub mod paths;
pub mod types;
