//! Name binder for the cxy compiler.
//!
//! This crate provides:
//! - `BinderState` - the scope-stack walk that resolves names, records
//!   jump targets and closure captures
//! - `BindResult` - the side tables later passes consume
//! - `did you mean` suggestion search

pub mod scope;
pub mod state;
pub mod suggest;

pub use scope::{LookupHit, ScopeFrame, ScopeKind};
pub use state::{BindResult, BinderState, Capture};
pub use suggest::{best_suggestion, levenshtein};
