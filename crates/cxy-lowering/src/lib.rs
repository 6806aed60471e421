//! AST lowering passes for the cxy compiler.
//!
//! This crate provides:
//! - `Shaker` - pre-check desugaring of high-level syntax into the core
//!   grammar (multi-var splits, interpolation, closures, variadics,
//!   exceptions, tests, raise, match hoists, slice sugar)
//! - `Simplifier` - post-check defer materialization and linker-name
//!   mangling

pub mod shake;
pub mod simplify;

pub use shake::{ShakeOptions, Shaker};
pub use simplify::{Simplifier, SimplifyResult};
