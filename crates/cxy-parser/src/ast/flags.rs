//! Node flags.
//!
//! A 64-bit set carried by every AST node. Passes communicate through these
//! bits: the parser sets syntactic facts, the shaker and checker add derived
//! ones.

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct NodeFlags: u64 {
        const PUBLIC            = 1 << 0;
        const EXTERN            = 1 << 1;
        const CONST             = 1 << 2;
        const STATIC            = 1 << 3;
        const VARIADIC          = 1 << 4;
        /// Node must be evaluated at compile time and removed before codegen
        const COMPTIME          = 1 << 5;
        /// Declaration is a member of a struct/class/interface
        const MEMBER            = 1 << 6;
        const TOP_LEVEL_DECL    = 1 << 7;
        /// Synthesized by a pass rather than written in source
        const GENERATED         = 1 << 8;
        /// Member was merged in from a base class
        const INHERITED         = 1 << 9;
        /// Declaration participates in a closure (captured or capturing)
        const CLOSURE           = 1 << 10;
        /// Only visible inside test functions
        const TEST_CONTEXT      = 1 << 11;
        const FORWARD_DECL      = 1 << 12;
        /// Node appears in type position
        const TYPE_AST          = 1 << 13;
        const ABSTRACT          = 1 << 14;
        const VIRTUAL           = 1 << 15;
        const REFERENCE         = 1 << 16;
        const MOVE              = 1 << 17;
        /// Aggregate contains reference-typed members
        const REFERENCE_MEMBERS = 1 << 18;
        /// Block's last expression is its value
        const BLOCK_RETURNS     = 1 << 19;
        /// Parameter is not captured by the callee
        const TRANSIENT         = 1 << 20;
        /// Declaration introduces a default arm in a match
        const DEFAULT_CASE      = 1 << 21;
        /// Call site propagates a result-type failure to the caller
        const PROPAGATES        = 1 << 22;
        /// Instantiation failed once; don't retry
        const ERRORED           = 1 << 23;
        /// Function or closure runs on the async runtime
        const ASYNC             = 1 << 24;
    }
}
