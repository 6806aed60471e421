//! Lexical scope stack.
//!
//! A scope maps names to declaration nodes and remembers the AST node that
//! owns it. Function names may bind more than once (overload chains); other
//! kinds of declarations report shadowing within the same scope.

use cxy_common::Atom;
use cxy_parser::NodeIndex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Function,
    Closure,
    Block,
    Loop,
    Aggregate,
    MatchArm,
}

/// One frame on the binder's scope stack.
#[derive(Debug)]
pub struct ScopeFrame {
    pub kind: ScopeKind,
    /// The declaration or block that owns this scope.
    pub owner: NodeIndex,
    bindings: FxHashMap<Atom, SmallVec<[NodeIndex; 1]>>,
}

impl ScopeFrame {
    pub fn new(kind: ScopeKind, owner: NodeIndex) -> Self {
        ScopeFrame {
            kind,
            owner,
            bindings: FxHashMap::default(),
        }
    }

    /// Bind `name`; `overloadable` controls whether a repeat binding chains
    /// or clashes. Returns the previous chain head on a clash.
    pub fn define(&mut self, name: Atom, decl: NodeIndex, overloadable: bool) -> Option<NodeIndex> {
        let chain = self.bindings.entry(name).or_default();
        if !chain.is_empty() && !overloadable {
            return chain.first().copied();
        }
        chain.push(decl);
        None
    }

    pub fn lookup(&self, name: Atom) -> Option<&[NodeIndex]> {
        self.bindings.get(&name).map(|chain| chain.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = Atom> + '_ {
        self.bindings.keys().copied()
    }
}

/// Result of an outward lookup: the chain head plus every closure boundary
/// the lookup crossed (innermost first).
#[derive(Debug)]
pub struct LookupHit {
    pub decl: NodeIndex,
    pub chain: SmallVec<[NodeIndex; 1]>,
    pub crossed_closures: SmallVec<[NodeIndex; 2]>,
    /// Scope kind of the defining frame.
    pub defined_in: ScopeKind,
}
