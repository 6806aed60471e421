//! Builtin names.
//!
//! Names the prelude and runtime provide; they are interned at startup and
//! registered with the binder so references to them never report undefined
//! symbols. The backend links the actual definitions.

use cxy_common::{Atom, Interner};

/// Runtime and prelude symbols.
const RUNTIME_NAMES: &[&str] = &[
    "main",
    "println",
    "print",
    "assert",
    "String",
    "Slice",
    "Optional",
    "Iterator",
    "Exception",
    "allTestCases",
    "__builtins",
    "__thread_launch",
    "__async",
    "__smart_ptr_alloc",
    "__smart_ptr_drop",
    "__push_ex_trace",
    "sizeof",
    "defined",
    "mkIdent",
    "mkInteger",
];

/// Primitive type names double as ordinary identifiers in expression
/// position (`sizeof!(i128)`).
const PRIMITIVE_NAMES: &[&str] = &[
    "bool", "char", "wchar", "i8", "i16", "i32", "i64", "i128", "u8", "u16", "u32", "u64", "u128",
    "f32", "f64", "string", "void", "auto",
];

/// Intern every builtin name and return the atoms for binder registration.
pub fn register(strings: &mut Interner) -> Vec<Atom> {
    let mut atoms = Vec::with_capacity(RUNTIME_NAMES.len() + PRIMITIVE_NAMES.len());
    for name in RUNTIME_NAMES.iter().chain(PRIMITIVE_NAMES) {
        atoms.push(strings.intern(name));
    }
    // Canonical operator-overload names are interned eagerly too, so
    // equality on them is atom equality everywhere in the pipeline.
    for name in cxy_parser::all_overload_names() {
        strings.intern(name);
    }
    atoms
}
