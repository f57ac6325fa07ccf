//! store
//!
//! Scoped document storage.
//!
//! # Architecture
//!
//! The [`ConfigStore`] trait is the seam between resolution and wherever
//! documents actually live. Two implementations ship:
//!
//! - [`MemoryConfigStore`]: in-process map with failure injection and call
//!   recording
//! - [`FileConfigStore`]: one TOML file per scope under a root directory
//!
//! # Invariants
//!
//! - `get` returns a snapshot; later saves never mutate it
//! - A document is only ever saved into its own scope
//! - Within a scope, a save replaces a same-named document in place

pub mod file_store;
pub mod lock;
pub mod memory;
mod traits;

pub use file_store::FileConfigStore;
pub use memory::{FailOn, MemoryConfigStore, StoreOperation};
pub use traits::{ConfigStore, StoreError};
