//! String interning - identifier deduplication for the whole pipeline.
//!
//! Every identifier, keyword-like builtin name, and file name is interned
//! exactly once; the rest of the compiler passes around `Atom` handles.
//! Equality on `Atom` is a `u32` compare, which is what makes canonical
//! operator-name dispatch and sorted member lookup cheap.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Handle to an interned string.
///
/// Atoms are only meaningful together with the `Interner` that produced
/// them. Two atoms from the same interner are equal iff their strings are
/// byte-equal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Atom(pub u32);

impl Atom {
    /// A placeholder atom. Interners never hand this value out.
    pub const DUMMY: Atom = Atom(u32::MAX);

    #[inline]
    pub const fn is_dummy(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// String pool with O(1) lookup in both directions.
///
/// The pool only grows; atoms stay valid for the lifetime of the interner.
#[derive(Debug, Default)]
pub struct Interner {
    map: FxHashMap<Box<str>, Atom>,
    strings: Vec<Box<str>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its atom. Idempotent.
    pub fn intern(&mut self, text: &str) -> Atom {
        if let Some(&atom) = self.map.get(text) {
            return atom;
        }
        let atom = Atom(self.strings.len() as u32);
        let boxed: Box<str> = text.into();
        self.strings.push(boxed.clone());
        self.map.insert(boxed, atom);
        atom
    }

    /// Look up a string without interning it.
    pub fn get(&self, text: &str) -> Option<Atom> {
        self.map.get(text).copied()
    }

    /// Resolve an atom back to its string.
    ///
    /// Panics if the atom did not come from this interner.
    #[inline]
    pub fn resolve(&self, atom: Atom) -> &str {
        &self.strings[atom.index()]
    }

    /// Resolve an atom, tolerating dummies.
    pub fn try_resolve(&self, atom: Atom) -> Option<&str> {
        self.strings.get(atom.index()).map(|s| &**s)
    }

    /// Number of distinct strings interned so far.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut interner = Interner::new();
        let a = interner.intern("op_add");
        let b = interner.intern("op_add");
        assert_eq!(a, b);
        assert_eq!(interner.resolve(a), "op_add");
        assert_eq!(interner.len(), 1);
    }

    #[test]
    fn distinct_strings_get_distinct_atoms() {
        let mut interner = Interner::new();
        let a = interner.intern("x");
        let b = interner.intern("y");
        assert_ne!(a, b);
        assert_eq!(interner.get("x"), Some(a));
        assert_eq!(interner.get("z"), None);
    }
}
