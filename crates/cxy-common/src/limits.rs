//! Centralized limits and thresholds.

/// Errors reported after this many are counted but not emitted.
pub const DEFAULT_MAX_ERRORS: usize = 1000;

/// Parser lookahead window size.
pub const LOOKAHEAD: usize = 4;

/// Maximum depth of nested `include` directives in the lexer.
pub const MAX_INCLUDE_DEPTH: usize = 64;

/// Maximum nesting of generic instantiations before the checker gives up.
/// Guards the comptime evaluator against runaway recursive templates.
pub const MAX_INSTANTIATION_DEPTH: usize = 64;

/// Maximum number of compile-time loop iterations the evaluator will unroll.
pub const MAX_COMPTIME_ITERATIONS: usize = 1 << 16;

/// Cap on candidates listed in a `did you mean` suggestion search.
pub const MAX_SUGGESTION_DISTANCE: usize = 2;
