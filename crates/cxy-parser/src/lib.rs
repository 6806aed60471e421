//! Parser and AST model for the cxy compiler.
//!
//! This crate provides:
//! - The AST model: `NodeArena`, `NodeIndex`, `AstKind`, `NodeFlags`,
//!   `Operator` with precedence and canonical overload names
//! - `ParserState` - recursive descent + Pratt parser with sum-typed
//!   recoverable/fatal error propagation and declaration-level recovery
//! - `dump_sexp` - a stable S-expression rendering for tests and tooling

pub mod ast;
pub mod dump;
pub mod parser;

pub use ast::{AstKind, Node, NodeArena, NodeFlags, NodeIndex, NodeList, Operator, PrimitiveKind};
pub use dump::dump_sexp;
pub use parser::{ParseError, ParseResult, ParserState};
pub use parser::decl::{all_overload_names, operator_for_overload_name};
