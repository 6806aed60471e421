//! Checker context.
//!
//! Holds the shared state used throughout type checking: the arena, the
//! type table, binder output, the diagnostic log, and the node-type side
//! table. Passing it explicitly keeps the pipeline free of global state.

use cxy_binder::BindResult;
use cxy_common::{Atom, Interner, Log};
use cxy_parser::{NodeArena, NodeIndex};
use cxy_types::{TypeId, TypeTable};
use rustc_hash::{FxHashMap, FxHashSet};

/// Options the driver hands to the checker.
#[derive(Clone, Copy, Debug, Default)]
pub struct CheckerOptions {
    /// Test declarations were kept by the shaker.
    pub test_mode: bool,
}

/// Virtual dispatch layout for one class.
#[derive(Clone, Debug, Default)]
pub struct VTable {
    /// Type id used by the `is` operator (`__tid` comparisons).
    pub tid: u32,
    /// Virtual methods in slot order: (name, implementing declaration).
    pub entries: Vec<(Atom, NodeIndex)>,
}

pub struct CheckerContext<'a> {
    pub strings: &'a mut Interner,
    pub log: &'a mut Log,
    pub arena: &'a mut NodeArena,
    pub types: &'a mut TypeTable,
    pub bindings: &'a BindResult,
    pub options: CheckerOptions,

    /// Every typed node, including declarations.
    pub node_types: FxHashMap<NodeIndex, TypeId>,
    /// Declarations whose signature phase already ran.
    pub declared: FxHashSet<NodeIndex>,
    /// Declarations currently in their signature phase (cycle detection).
    pub declaring: FxHashSet<NodeIndex>,
    /// Class type -> vtable layout.
    pub vtables: FxHashMap<TypeId, VTable>,
    /// Imported module types by import-declaration node.
    pub module_exports: FxHashMap<NodeIndex, TypeId>,
    /// Values of `@define` preprocessor symbols, for `defined(X)`.
    pub defines: FxHashSet<Atom>,

    /// The builtin exception base class.
    pub exception_type: TypeId,
    /// Namespace atom of the unit being checked.
    pub namespace: Atom,
    /// Guard against runaway recursive instantiation.
    pub instantiation_depth: usize,
    /// Next `__tid` to hand out.
    next_tid: u32,
}

impl<'a> CheckerContext<'a> {
    pub fn new(
        strings: &'a mut Interner,
        log: &'a mut Log,
        arena: &'a mut NodeArena,
        types: &'a mut TypeTable,
        bindings: &'a BindResult,
        options: CheckerOptions,
    ) -> Self {
        use cxy_types::{Inheritance, MembersContainer, NamedMember, NominalFlags, NominalKind};

        let namespace = strings.intern("main");
        // The builtin exception base class: `class Exception { func what() -> string; }`.
        let exception_name = strings.intern("Exception");
        let exception_type = types.declare_nominal(
            NominalKind::Class,
            exception_name,
            namespace,
            NodeIndex(u32::MAX),
        );
        let what_ty = types.func_type(Vec::new(), TypeTable::STRING, Vec::new(), false);
        let what_name = strings.intern("what");
        let init_ty = types.func_type(vec![TypeTable::STRING], TypeTable::VOID, Vec::new(), false);
        let init_name = strings.intern("op_init");
        let members = MembersContainer::new(vec![
            NamedMember {
                name: what_name,
                ty: what_ty,
                decl: NodeIndex(u32::MAX),
            },
            NamedMember {
                name: init_name,
                ty: init_ty,
                decl: NodeIndex(u32::MAX),
            },
        ]);
        types.seal_nominal(
            exception_type,
            members,
            Inheritance::default(),
            NominalFlags::EXCEPTION,
        );

        CheckerContext {
            strings,
            log,
            arena,
            types,
            bindings,
            options,
            node_types: FxHashMap::default(),
            declared: FxHashSet::default(),
            declaring: FxHashSet::default(),
            vtables: FxHashMap::default(),
            module_exports: FxHashMap::default(),
            defines: FxHashSet::default(),
            exception_type,
            namespace,
            instantiation_depth: 0,
            next_tid: 1,
        }
    }

    /// Record a node's type and return it.
    pub fn set_type(&mut self, node: NodeIndex, ty: TypeId) -> TypeId {
        self.node_types.insert(node, ty);
        ty
    }

    pub fn type_of(&self, node: NodeIndex) -> Option<TypeId> {
        self.node_types.get(&node).copied()
    }

    pub fn error_at(&mut self, node: NodeIndex, message: impl Into<String>) -> TypeId {
        let loc = self.arena.loc(node);
        self.log.error(loc, message);
        self.set_type(node, TypeTable::ERROR)
    }

    pub fn fresh_tid(&mut self) -> u32 {
        let tid = self.next_tid;
        self.next_tid += 1;
        tid
    }
}

/// Result of checking one compilation unit.
#[derive(Debug)]
pub struct CheckedModule {
    /// Node -> type side table (every expression has an entry).
    pub node_types: FxHashMap<NodeIndex, TypeId>,
    /// The module's exported namespace type.
    pub exported: TypeId,
    /// Class type -> vtable layout.
    pub vtables: FxHashMap<TypeId, VTable>,
}
