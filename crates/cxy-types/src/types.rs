//! Type representation.
//!
//! Structural variants (pointer, tuple, union, func, ...) are hash-consed by
//! the table: equal shapes share one `TypeId`. Nominal variants (struct,
//! class, interface, enum, alias, opaque) are identified by their
//! declaration and never interned structurally.

use cxy_common::Atom;
use cxy_parser::{NodeIndex, PrimitiveKind};
use bitflags::bitflags;

/// Handle to a type in the `TypeTable`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// One named member of a nominal type. Function members with the same name
/// form an overload chain (adjacent entries in the sorted view).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NamedMember {
    pub name: Atom,
    pub ty: TypeId,
    pub decl: NodeIndex,
}

/// Member storage with a sorted view for binary-search lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MembersContainer {
    members: Vec<NamedMember>,
    /// Indices into `members`, sorted by name atom; equal names stay in
    /// declaration order.
    sorted: Vec<u32>,
}

impl MembersContainer {
    pub fn new(members: Vec<NamedMember>) -> Self {
        let mut sorted: Vec<u32> = (0..members.len() as u32).collect();
        sorted.sort_by_key(|&i| members[i as usize].name);
        MembersContainer { members, sorted }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedMember> {
        self.members.iter()
    }

    pub fn get(&self, index: usize) -> Option<&NamedMember> {
        self.members.get(index)
    }

    /// All members named `name`, in declaration order. More than one entry
    /// means an overload chain.
    pub fn lookup(&self, name: Atom) -> &[u32] {
        let start = self.sorted.partition_point(|&i| self.members[i as usize].name < name);
        let end = self.sorted.partition_point(|&i| self.members[i as usize].name <= name);
        &self.sorted[start..end]
    }

    /// First member named `name`.
    pub fn find(&self, name: Atom) -> Option<&NamedMember> {
        self.lookup(name)
            .first()
            .map(|&i| &self.members[i as usize])
    }

    pub fn member(&self, index: u32) -> &NamedMember {
        &self.members[index as usize]
    }
}

bitflags! {
    /// Facts about a nominal type.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct NominalFlags: u32 {
        /// Type descends from the builtin exception class
        const EXCEPTION   = 1 << 0;
        /// Lowered from a closure expression
        const CLOSURE     = 1 << 1;
        /// Type has a user-defined destructor
        const DESTRUCTIBLE = 1 << 2;
        /// Aggregate contains reference-typed fields
        const REFERENCE_MEMBERS = 1 << 3;
        /// Declaration is abstract
        const ABSTRACT    = 1 << 4;
    }
}

/// Inheritance record for classes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Inheritance {
    pub base: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
}

/// Body of a struct/class/interface.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NominalBody {
    pub name: Atom,
    /// Namespace (module) qualifier; dummy when top level of the main module
    pub ns: Atom,
    pub decl: NodeIndex,
    pub members: MembersContainer,
    pub inheritance: Inheritance,
    pub flags: NominalFlags,
}

/// One generic formal parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenericParamInfo {
    pub name: Atom,
    /// Value-parameter position this type parameter is inferred from
    pub infer_index: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// Poisoned type produced by reported errors; absorbs further checking.
    Error,
    /// Placeholder for to-be-inferred declarations.
    Auto,
    Void,
    /// Type of the `null` literal, assignable to pointers and optionals.
    Null,
    Primitive(PrimitiveKind),
    /// The singleton immutable UTF-8 string type.
    String,
    Pointer {
        pointee: TypeId,
        is_const: bool,
    },
    Reference {
        referred: TypeId,
        is_const: bool,
    },
    Optional {
        target: TypeId,
    },
    Array {
        element: TypeId,
        /// `None` is a slice
        len: Option<u64>,
    },
    Tuple {
        elements: Vec<TypeId>,
    },
    /// Tagged union; members are deduplicated and flattened.
    Union {
        members: Vec<TypeId>,
    },
    Func {
        params: Vec<TypeId>,
        ret: TypeId,
        /// Names captured by a lowered closure
        capture_names: Vec<Atom>,
        variadic: bool,
    },
    Struct(NominalBody),
    Class(NominalBody),
    Interface(NominalBody),
    Enum {
        name: Atom,
        ns: Atom,
        decl: NodeIndex,
        base: TypeId,
        options: Vec<(Atom, i64)>,
    },
    /// An uninstantiated generic declaration.
    Generic {
        name: Atom,
        decl: NodeIndex,
        params: Vec<GenericParamInfo>,
        inferrable: bool,
    },
    /// Memoized instantiation record; the generated type is stored in the
    /// table and filled exactly once.
    Applied {
        from: TypeId,
        args: Vec<TypeId>,
    },
    Alias {
        name: Atom,
        ns: Atom,
        decl: NodeIndex,
        aliased: TypeId,
    },
    Opaque {
        name: Atom,
        ns: Atom,
        decl: NodeIndex,
    },
    /// Const-propagating wrapper.
    Wrapped {
        target: TypeId,
        is_const: bool,
    },
    /// Type-of-type used by comptime introspection.
    Info {
        target: TypeId,
    },
    /// Self-referential placeholder used while a nominal declaration is
    /// being built; resolved by the table afterwards.
    This {
        decl: NodeIndex,
    },
    /// Type of an integer literal until context forces a concrete primitive.
    Literal {
        node: NodeIndex,
    },
    /// A module's exported namespace.
    Module {
        name: Atom,
        members: MembersContainer,
    },
}

impl Type {
    /// True for variants the table interns structurally.
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Type::Error
                | Type::Auto
                | Type::Void
                | Type::Null
                | Type::Primitive(_)
                | Type::String
                | Type::Pointer { .. }
                | Type::Reference { .. }
                | Type::Optional { .. }
                | Type::Array { .. }
                | Type::Tuple { .. }
                | Type::Union { .. }
                | Type::Func { .. }
                | Type::Wrapped { .. }
                | Type::Info { .. }
                | Type::Literal { .. }
                | Type::Applied { .. }
        )
    }

    pub fn nominal_body(&self) -> Option<&NominalBody> {
        match self {
            Type::Struct(body) | Type::Class(body) | Type::Interface(body) => Some(body),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<Atom> {
        match self {
            Type::Struct(body) | Type::Class(body) | Type::Interface(body) => Some(body.name),
            Type::Enum { name, .. }
            | Type::Generic { name, .. }
            | Type::Alias { name, .. }
            | Type::Opaque { name, .. }
            | Type::Module { name, .. } => Some(*name),
            _ => None,
        }
    }
}
