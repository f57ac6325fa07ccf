//! resolve
//!
//! Default definition resolution and binding.
//!
//! # Architecture
//!
//! Resolution is a pure walk over collaborators injected as trait objects:
//!
//! ```text
//! Project ──► ScopeChain ──► ConfigStore::get per scope ──► Resolution
//!                                                              │
//!                      CheckoutContext ──► Binder ◄────────────┘
//!                                            │
//!                                            ▼
//!                                     BoundDefinition
//! ```
//!
//! # Modules
//!
//! - [`scope_chain`] - Ordered scopes for a project
//! - [`resolver`] - First-match resolution across the chain
//! - [`binder`] - Pairing a resolution with a branch checkout

pub mod binder;
pub mod resolver;
pub mod scope_chain;

pub use binder::{BindingError, BoundDefinition, BranchDefinitionBinder, CheckoutContext};
pub use resolver::{
    DefaultDefinitionResolver, ProbeOutcome, Resolution, ResolutionError, ResolutionReport,
    ResolveError, ResolvedDefinition, ScopeFailure, ScopeProbe,
};
pub use scope_chain::{ScopeChain, ScopeChainError, DEFAULT_MAX_SCOPE_DEPTH};
