//! ui
//!
//! User-facing output.
//!
//! # Modules
//!
//! - [`output`] - Verbosity-aware printing
//!
//! # Design
//!
//! All CLI output goes through this module so the quiet and debug flags are
//! honored the same way by every command.

pub mod output;
