//! Common types and utilities for the cxy compiler.
//!
//! This crate provides foundational types used across all cxy crates:
//! - String interning (`Atom`, `Interner`)
//! - Source locations (`FilePos`, `FileLoc`)
//! - The diagnostic log (`Log`, `Diagnostic`, warning masks)
//! - 128-bit numeric formatting and parsing
//! - Compiler limits and thresholds

// String interning for identifier deduplication
pub mod interner;
pub use interner::{Atom, Interner};

// Source locations (file, row, col, byte offset)
pub mod loc;
pub use loc::{FileLoc, FilePos};

// Diagnostic log and warning masks
pub mod diag;
pub use diag::{Diagnostic, DiagnosticHandler, DiagnosticKind, Log, WarningFlags, WarningId};

// 128-bit integer formatting/parsing
pub mod numeric;

// Centralized limits and thresholds
pub mod limits;
