//! Tests for nominal declaration, `This` resolution, member lookup and
//! generic instantiation memoization.

use cxy_common::Interner;
use cxy_parser::{NodeIndex, PrimitiveKind};
use cxy_types::{
    GenericParamInfo, Inheritance, MembersContainer, NamedMember, NominalFlags, NominalKind,
    TypeTable,
};

#[test]
fn this_placeholder_resolves_to_the_sealed_nominal() {
    let mut strings = Interner::new();
    let mut table = TypeTable::new();
    let name = strings.intern("Node");
    let ns = strings.intern("main");
    let decl = NodeIndex(1);

    let node_ty = table.declare_nominal(NominalKind::Class, name, ns, decl);
    let this_ty = table.this_type(decl);
    // `next: ^This` inside the declaration body.
    let next_field_ty = table.pointer_to(this_ty, false);

    let i64_ty = table.primitive(PrimitiveKind::I64);
    let members = MembersContainer::new(vec![
        NamedMember {
            name: strings.intern("next"),
            ty: next_field_ty,
            decl: NodeIndex(2),
        },
        NamedMember {
            name: strings.intern("value"),
            ty: i64_ty,
            decl: NodeIndex(3),
        },
    ]);
    table.seal_nominal(node_ty, members, Inheritance::default(), NominalFlags::empty());
    table.resolve_this(this_ty, node_ty);

    assert_eq!(table.resolve(this_ty), node_ty);
    // The same declaration always produces the same placeholder.
    assert_eq!(table.this_type(decl), this_ty);
}

#[test]
fn sorted_member_lookup_and_overload_chains() {
    let mut strings = Interner::new();
    let mut table = TypeTable::new();
    let i32_ty = table.primitive(PrimitiveKind::I32);
    let f64_ty = table.primitive(PrimitiveKind::F64);
    let get = strings.intern("get");
    let set = strings.intern("set");

    let f_a = table.func_type(vec![i32_ty], i32_ty, Vec::new(), false);
    let f_b = table.func_type(vec![f64_ty], f64_ty, Vec::new(), false);
    let members = MembersContainer::new(vec![
        NamedMember { name: set, ty: f_a, decl: NodeIndex(10) },
        NamedMember { name: get, ty: f_a, decl: NodeIndex(11) },
        NamedMember { name: get, ty: f_b, decl: NodeIndex(12) },
    ]);

    let chain = members.lookup(get);
    assert_eq!(chain.len(), 2, "overloads share a chain");
    // Declaration order within the chain is preserved.
    assert_eq!(members.member(chain[0]).decl, NodeIndex(11));
    assert_eq!(members.member(chain[1]).decl, NodeIndex(12));
    assert_eq!(members.lookup(set).len(), 1);
    assert_eq!(members.lookup(strings.intern("missing")).len(), 0);
}

#[test]
fn applied_records_are_memoized_and_generated_written_once() {
    let mut strings = Interner::new();
    let mut table = TypeTable::new();
    let name = strings.intern("Vec");
    let generic = table.declare_generic(
        name,
        NodeIndex(5),
        vec![GenericParamInfo {
            name: strings.intern("T"),
            infer_index: None,
        }],
        true,
    );
    let i32_ty = table.primitive(PrimitiveKind::I32);

    let (record, generated) = table.apply_generic(generic, vec![i32_ty]);
    assert!(generated.is_none(), "first application is a miss");

    let instance = table.declare_nominal(
        NominalKind::Struct,
        name,
        strings.intern("main"),
        NodeIndex(6),
    );
    table.set_generated(record, instance);

    let (record2, generated2) = table.apply_generic(generic, vec![i32_ty]);
    assert_eq!(record, record2, "same args return the memoized record");
    assert_eq!(generated2, Some(instance));

    let f64_ty = table.primitive(PrimitiveKind::F64);
    let (record3, _) = table.apply_generic(generic, vec![f64_ty]);
    assert_ne!(record, record3, "different args are a different record");
}

#[test]
fn cyclic_base_chains_terminate() {
    // The checker rejects inheritance cycles at declaration time; the
    // table's chain walks must still terminate if handed one.
    let mut strings = Interner::new();
    let mut table = TypeTable::new();
    let ns = strings.intern("main");
    let a = table.declare_nominal(NominalKind::Class, strings.intern("A"), ns, NodeIndex(1));
    let b = table.declare_nominal(NominalKind::Class, strings.intern("B"), ns, NodeIndex(2));
    table.seal_nominal(
        a,
        MembersContainer::default(),
        Inheritance {
            base: Some(b),
            interfaces: Vec::new(),
        },
        NominalFlags::empty(),
    );
    table.seal_nominal(
        b,
        MembersContainer::default(),
        Inheritance {
            base: Some(a),
            interfaces: Vec::new(),
        },
        NominalFlags::empty(),
    );

    assert!(!table.is_exception(a));
    assert!(!table.derives_from(a, TypeTable::STRING));
    // Reachability through the loop still answers before the guard trips.
    assert!(table.derives_from(a, b));
    assert!(table.derives_from(b, a));
}

#[test]
fn exception_detection_walks_the_base_chain() {
    let mut strings = Interner::new();
    let mut table = TypeTable::new();
    let ns = strings.intern("main");

    let base = table.declare_nominal(
        NominalKind::Class,
        strings.intern("Exception"),
        ns,
        NodeIndex(1),
    );
    table.seal_nominal(
        base,
        MembersContainer::default(),
        Inheritance::default(),
        NominalFlags::EXCEPTION,
    );

    let derived = table.declare_nominal(
        NominalKind::Class,
        strings.intern("NotFound"),
        ns,
        NodeIndex(2),
    );
    table.seal_nominal(
        derived,
        MembersContainer::default(),
        Inheritance {
            base: Some(base),
            interfaces: Vec::new(),
        },
        NominalFlags::empty(),
    );

    assert!(table.is_exception(derived));
    assert!(table.derives_from(derived, base));

    let i32_ty = table.primitive(PrimitiveKind::I32);
    let result = table.union_of(vec![i32_ty, derived]);
    assert!(table.is_result_type(result));
    assert_eq!(table.result_success_type(result), Some(i32_ty));
    assert!(!table.is_result_type(i32_ty));
}
