//! pipeline-defaults - Default pipeline definitions for multibranch projects
//!
//! A multibranch project builds every branch of a repository. Branches that
//! carry no pipeline definition of their own get a default one, looked up in
//! ranked configuration scopes (the project's folders, nearest first, then
//! global), bound to the branch's own checkout and handed to a scheduler.
//!
//! # Architecture
//!
//! The codebase is layered, leaves first:
//!
//! - [`core`] - Domain types, documents, scopes, folders, configuration
//! - [`git`] - Single interface for all Git reads
//! - [`store`] - Scoped document stores (in-memory and file-backed)
//! - [`resolve`] - Scope chains, the default definition resolver and binder
//! - [`scheduler`] - Build scheduling (local step runner and mock)
//! - [`discovery`] - Branch discovery from git repositories
//! - [`indexing`] - Per-branch indexing flow tying the above together
//! - [`cli`] - The `pdef` command-line interface
//! - [`ui`] - User-facing output
//!
//! # Guarantees
//!
//! 1. Resolution follows the scope chain order and stops at the first match
//! 2. Finding no default is an outcome, not an error
//! 3. A store failure never hides a match from a later scope
//! 4. Resolution holds no lock across a store read and caches nothing

pub mod cli;
pub mod core;
pub mod discovery;
pub mod git;
pub mod indexing;
pub mod resolve;
pub mod scheduler;
pub mod store;
pub mod ui;
