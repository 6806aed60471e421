//! The type table.
//!
//! Interns every structural type exactly once so equality reduces to
//! `TypeId` comparison. Nominal types are allocated per declaration and
//! sealed with their member table once the declaration is fully built;
//! `This` placeholders created during construction are resolved afterwards.
//! Generic instantiations are memoized through `Applied` records whose
//! generated type is written exactly once.

use crate::types::{
    GenericParamInfo, Inheritance, MembersContainer, NominalBody, NominalFlags, Type, TypeId,
};
use cxy_common::{Atom, Interner};
use cxy_parser::{NodeIndex, PrimitiveKind};
use rustc_hash::FxHashMap;
use tracing::trace;

pub struct TypeTable {
    types: Vec<Type>,
    intern: FxHashMap<Type, TypeId>,
    /// `This` placeholder -> resolved nominal type.
    this_bindings: FxHashMap<TypeId, TypeId>,
    /// `(generic, args)` -> `Applied` record id.
    applied: FxHashMap<(TypeId, Vec<TypeId>), TypeId>,
    /// `Applied` record -> generated instantiation, filled exactly once.
    generated: FxHashMap<TypeId, TypeId>,
}

impl TypeTable {
    pub const ERROR: TypeId = TypeId(0);
    pub const AUTO: TypeId = TypeId(1);
    pub const VOID: TypeId = TypeId(2);
    pub const NULL: TypeId = TypeId(3);
    pub const STRING: TypeId = TypeId(4);

    pub fn new() -> Self {
        let mut table = TypeTable {
            types: Vec::new(),
            intern: FxHashMap::default(),
            this_bindings: FxHashMap::default(),
            applied: FxHashMap::default(),
            generated: FxHashMap::default(),
        };
        // Fixed well-known slots, in the order of the associated constants.
        for ty in [Type::Error, Type::Auto, Type::Void, Type::Null, Type::String] {
            let id = table.push(ty.clone());
            table.intern.insert(ty, id);
        }
        table
    }

    fn push(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    #[inline]
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    // =========================================================================
    // Structural interning
    // =========================================================================

    /// Intern a structural type; equal shapes return the same id.
    pub fn intern(&mut self, ty: Type) -> TypeId {
        debug_assert!(ty.is_structural(), "nominal types are not interned");
        if let Some(&id) = self.intern.get(&ty) {
            return id;
        }
        let id = self.push(ty.clone());
        self.intern.insert(ty, id);
        id
    }

    pub fn primitive(&mut self, kind: PrimitiveKind) -> TypeId {
        self.intern(Type::Primitive(kind))
    }

    pub fn pointer_to(&mut self, pointee: TypeId, is_const: bool) -> TypeId {
        self.intern(Type::Pointer { pointee, is_const })
    }

    pub fn reference_to(&mut self, referred: TypeId, is_const: bool) -> TypeId {
        self.intern(Type::Reference { referred, is_const })
    }

    pub fn optional_of(&mut self, target: TypeId) -> TypeId {
        self.intern(Type::Optional { target })
    }

    pub fn array_of(&mut self, element: TypeId, len: Option<u64>) -> TypeId {
        self.intern(Type::Array { element, len })
    }

    pub fn slice_of(&mut self, element: TypeId) -> TypeId {
        self.array_of(element, None)
    }

    pub fn tuple_of(&mut self, elements: Vec<TypeId>) -> TypeId {
        self.intern(Type::Tuple { elements })
    }

    /// Build a union: nested unions are flattened and duplicate members
    /// dropped. A single surviving member collapses to that member.
    pub fn union_of(&mut self, members: Vec<TypeId>) -> TypeId {
        let mut flat: Vec<TypeId> = Vec::with_capacity(members.len());
        for member in members {
            match self.get(member) {
                Type::Union { members: inner } => {
                    let inner = inner.clone();
                    for m in inner {
                        if !flat.contains(&m) {
                            flat.push(m);
                        }
                    }
                }
                _ => {
                    if !flat.contains(&member) {
                        flat.push(member);
                    }
                }
            }
        }
        if flat.len() == 1 {
            return flat[0];
        }
        self.intern(Type::Union { members: flat })
    }

    pub fn func_type(
        &mut self,
        params: Vec<TypeId>,
        ret: TypeId,
        capture_names: Vec<Atom>,
        variadic: bool,
    ) -> TypeId {
        self.intern(Type::Func {
            params,
            ret,
            capture_names,
            variadic,
        })
    }

    pub fn wrapped(&mut self, target: TypeId, is_const: bool) -> TypeId {
        self.intern(Type::Wrapped { target, is_const })
    }

    pub fn info_of(&mut self, target: TypeId) -> TypeId {
        self.intern(Type::Info { target })
    }

    pub fn literal_of(&mut self, node: NodeIndex) -> TypeId {
        self.intern(Type::Literal { node })
    }

    // =========================================================================
    // Nominal types
    // =========================================================================

    /// Allocate a struct/class/interface shell. Members are sealed later so
    /// the declaration can refer to itself through a `This` placeholder.
    pub fn declare_nominal(
        &mut self,
        kind: NominalKind,
        name: Atom,
        ns: Atom,
        decl: NodeIndex,
    ) -> TypeId {
        let body = NominalBody {
            name,
            ns,
            decl,
            members: MembersContainer::default(),
            inheritance: Inheritance::default(),
            flags: NominalFlags::empty(),
        };
        let ty = match kind {
            NominalKind::Struct => Type::Struct(body),
            NominalKind::Class => Type::Class(body),
            NominalKind::Interface => Type::Interface(body),
        };
        self.push(ty)
    }

    /// Fill a nominal shell's body. Called exactly once per declaration,
    /// at the end of its signature phase.
    pub fn seal_nominal(
        &mut self,
        id: TypeId,
        members: MembersContainer,
        inheritance: Inheritance,
        flags: NominalFlags,
    ) {
        let slot = &mut self.types[id.index()];
        match slot {
            Type::Struct(body) | Type::Class(body) | Type::Interface(body) => {
                debug_assert!(body.members.is_empty(), "nominal sealed twice");
                body.members = members;
                body.inheritance = inheritance;
                body.flags = flags;
            }
            other => unreachable!("sealing a non-nominal type {other:?}"),
        }
    }

    pub fn declare_enum(
        &mut self,
        name: Atom,
        ns: Atom,
        decl: NodeIndex,
        base: TypeId,
        options: Vec<(Atom, i64)>,
    ) -> TypeId {
        self.push(Type::Enum {
            name,
            ns,
            decl,
            base,
            options,
        })
    }

    pub fn declare_alias(&mut self, name: Atom, ns: Atom, decl: NodeIndex, aliased: TypeId) -> TypeId {
        self.push(Type::Alias {
            name,
            ns,
            decl,
            aliased,
        })
    }

    pub fn declare_opaque(&mut self, name: Atom, ns: Atom, decl: NodeIndex) -> TypeId {
        self.push(Type::Opaque { name, ns, decl })
    }

    pub fn declare_generic(
        &mut self,
        name: Atom,
        decl: NodeIndex,
        params: Vec<GenericParamInfo>,
        inferrable: bool,
    ) -> TypeId {
        self.push(Type::Generic {
            name,
            decl,
            params,
            inferrable,
        })
    }

    pub fn declare_module(&mut self, name: Atom, members: MembersContainer) -> TypeId {
        self.push(Type::Module { name, members })
    }

    // =========================================================================
    // This placeholders
    // =========================================================================

    /// Placeholder for the type currently being declared.
    pub fn this_type(&mut self, decl: NodeIndex) -> TypeId {
        // One placeholder per declaration; reuse on repeat calls.
        let ty = Type::This { decl };
        if let Some(&id) = self.intern.get(&ty) {
            return id;
        }
        let id = self.push(ty.clone());
        self.intern.insert(ty, id);
        id
    }

    /// Bind a `This` placeholder to the finished nominal type.
    pub fn resolve_this(&mut self, this_id: TypeId, target: TypeId) {
        debug_assert!(matches!(self.get(this_id), Type::This { .. }));
        trace!(?this_id, ?target, "resolving This placeholder");
        self.this_bindings.insert(this_id, target);
    }

    /// Follow `This` bindings, alias chains and generated instantiations to
    /// the underlying type.
    pub fn resolve(&self, id: TypeId) -> TypeId {
        let mut current = id;
        loop {
            match self.get(current) {
                Type::This { .. } => match self.this_bindings.get(&current) {
                    Some(&target) => current = target,
                    None => return current,
                },
                Type::Alias { aliased, .. } => current = *aliased,
                Type::Wrapped { target, .. } => current = *target,
                Type::Applied { .. } => match self.generated.get(&current) {
                    Some(&target) => current = target,
                    None => return current,
                },
                _ => return current,
            }
        }
    }

    // =========================================================================
    // Generic instantiation memoization
    // =========================================================================

    /// Look up or create the `Applied` record for `(generic, args)`.
    /// Returns `(record, Some(generated))` on a hit.
    pub fn apply_generic(&mut self, from: TypeId, args: Vec<TypeId>) -> (TypeId, Option<TypeId>) {
        if let Some(&record) = self.applied.get(&(from, args.clone())) {
            return (record, self.generated.get(&record).copied());
        }
        let record = self.push(Type::Applied {
            from,
            args: args.clone(),
        });
        self.applied.insert((from, args), record);
        (record, None)
    }

    /// Fill an `Applied` record's generated type. Written exactly once.
    pub fn set_generated(&mut self, record: TypeId, generated: TypeId) {
        debug_assert!(matches!(self.get(record), Type::Applied { .. }));
        let previous = self.generated.insert(record, generated);
        debug_assert!(previous.is_none(), "Applied.generated written twice");
    }

    pub fn generated_of(&self, record: TypeId) -> Option<TypeId> {
        self.generated.get(&record).copied()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn is_error(&self, id: TypeId) -> bool {
        matches!(self.get(self.resolve(id)), Type::Error)
    }

    pub fn is_void(&self, id: TypeId) -> bool {
        matches!(self.get(self.resolve(id)), Type::Void)
    }

    /// A result type is a union with at least one exception member.
    pub fn is_result_type(&self, id: TypeId) -> bool {
        match self.get(self.resolve(id)) {
            Type::Union { members } => members.iter().any(|&m| self.is_exception(m)),
            _ => false,
        }
    }

    /// Success (non-exception) side of a result type.
    pub fn result_success_type(&mut self, id: TypeId) -> Option<TypeId> {
        let resolved = self.resolve(id);
        match self.get(resolved) {
            Type::Union { members } => {
                let members = members.clone();
                let oks: Vec<TypeId> = members
                    .iter()
                    .copied()
                    .filter(|&m| !self.is_exception(m))
                    .collect();
                match oks.len() {
                    0 => None,
                    1 => Some(oks[0]),
                    _ => Some(self.union_of(oks)),
                }
            }
            _ => None,
        }
    }

    /// True when the type descends from the builtin exception class.
    ///
    /// The checker rejects inheritance cycles, but the walk still carries a
    /// visited set so a cyclic chain terminates instead of hanging.
    pub fn is_exception(&self, id: TypeId) -> bool {
        let mut current = self.resolve(id);
        let mut visited: Vec<TypeId> = Vec::new();
        loop {
            if visited.contains(&current) {
                return false;
            }
            visited.push(current);
            match self.get(current) {
                Type::Class(body) => {
                    if body.flags.contains(NominalFlags::EXCEPTION) {
                        return true;
                    }
                    match body.inheritance.base {
                        Some(base) => current = self.resolve(base),
                        None => return false,
                    }
                }
                _ => return false,
            }
        }
    }

    /// Walk up the inheritance chain checking whether `sub` derives from
    /// `base`. Terminates on cyclic chains.
    pub fn derives_from(&self, sub: TypeId, base: TypeId) -> bool {
        let target = self.resolve(base);
        let mut current = self.resolve(sub);
        let mut visited: Vec<TypeId> = Vec::new();
        loop {
            if current == target {
                return true;
            }
            if visited.contains(&current) {
                return false;
            }
            visited.push(current);
            match self.get(current) {
                Type::Class(body) => match body.inheritance.base {
                    Some(b) => current = self.resolve(b),
                    None => return false,
                },
                _ => return false,
            }
        }
    }

    // =========================================================================
    // Display
    // =========================================================================

    /// Human-readable type name for diagnostics.
    pub fn display(&self, id: TypeId, strings: &Interner) -> String {
        match self.get(id) {
            Type::Error => "<error>".into(),
            Type::Auto => "auto".into(),
            Type::Void => "void".into(),
            Type::Null => "null".into(),
            Type::Primitive(kind) => kind.name().into(),
            Type::String => "string".into(),
            Type::Pointer { pointee, is_const } => {
                let inner = self.display(*pointee, strings);
                if *is_const {
                    format!("^const {inner}")
                } else {
                    format!("^{inner}")
                }
            }
            Type::Reference { referred, is_const } => {
                let inner = self.display(*referred, strings);
                if *is_const {
                    format!("&const {inner}")
                } else {
                    format!("&{inner}")
                }
            }
            Type::Optional { target } => format!("{}?", self.display(*target, strings)),
            Type::Array { element, len } => match len {
                Some(n) => format!("[{}, {n}]", self.display(*element, strings)),
                None => format!("[{}]", self.display(*element, strings)),
            },
            Type::Tuple { elements } => {
                let parts: Vec<String> =
                    elements.iter().map(|&e| self.display(e, strings)).collect();
                format!("({})", parts.join(", "))
            }
            Type::Union { members } => {
                let parts: Vec<String> =
                    members.iter().map(|&m| self.display(m, strings)).collect();
                parts.join(" | ")
            }
            Type::Func { params, ret, .. } => {
                let parts: Vec<String> =
                    params.iter().map(|&p| self.display(p, strings)).collect();
                format!("({}) -> {}", parts.join(", "), self.display(*ret, strings))
            }
            Type::Struct(body) | Type::Class(body) | Type::Interface(body) => {
                strings.resolve(body.name).into()
            }
            Type::Enum { name, .. }
            | Type::Generic { name, .. }
            | Type::Alias { name, .. }
            | Type::Opaque { name, .. }
            | Type::Module { name, .. } => strings.resolve(*name).into(),
            Type::Applied { from, args } => {
                let parts: Vec<String> = args.iter().map(|&a| self.display(a, strings)).collect();
                format!("{}[{}]", self.display(*from, strings), parts.join(", "))
            }
            Type::Wrapped { target, is_const } => {
                if *is_const {
                    format!("const {}", self.display(*target, strings))
                } else {
                    self.display(*target, strings)
                }
            }
            Type::Info { target } => format!("typeinfo[{}]", self.display(*target, strings)),
            Type::This { .. } => "This".into(),
            Type::Literal { .. } => "{integer}".into(),
        }
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        TypeTable::new()
    }
}

/// Which nominal shell to allocate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NominalKind {
    Struct,
    Class,
    Interface,
}
