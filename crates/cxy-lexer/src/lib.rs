//! Lexer and token model for the cxy compiler.
//!
//! This crate provides:
//! - `Token`, `TokenKind`, `TokenValue` - the token model
//! - `Lexer` - pull-based tokenizer with include pushdown and
//!   string-interpolation mode
//! - `FrontendCtx` - the interner + log pair threaded through the frontend

pub mod lexer;
pub mod token;

pub use lexer::{FrontendCtx, Lexer, SourceLoader};
pub use token::{FloatSuffix, IntSuffix, Token, TokenKind, TokenValue};
