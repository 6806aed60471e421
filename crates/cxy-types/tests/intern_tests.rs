//! Tests for structural hash-consing and union canonicalization.

use cxy_parser::{NodeIndex, PrimitiveKind};
use cxy_types::{Type, TypeTable};

#[test]
fn equal_structural_types_share_one_id() {
    let mut table = TypeTable::new();
    let i32_ty = table.primitive(PrimitiveKind::I32);
    let a = table.pointer_to(i32_ty, false);
    let b = table.pointer_to(i32_ty, false);
    assert_eq!(a, b);

    let t1 = table.tuple_of(vec![i32_ty, TypeTable::STRING]);
    let t2 = table.tuple_of(vec![i32_ty, TypeTable::STRING]);
    assert_eq!(t1, t2);

    let f1 = table.func_type(vec![i32_ty], TypeTable::VOID, Vec::new(), false);
    let f2 = table.func_type(vec![i32_ty], TypeTable::VOID, Vec::new(), false);
    assert_eq!(f1, f2);
}

#[test]
fn const_qualification_distinguishes_pointers() {
    let mut table = TypeTable::new();
    let i8_ty = table.primitive(PrimitiveKind::I8);
    let plain = table.pointer_to(i8_ty, false);
    let constant = table.pointer_to(i8_ty, true);
    assert_ne!(plain, constant);
}

#[test]
fn unions_flatten_and_deduplicate() {
    let mut table = TypeTable::new();
    let i32_ty = table.primitive(PrimitiveKind::I32);
    let f64_ty = table.primitive(PrimitiveKind::F64);
    let inner = table.union_of(vec![i32_ty, f64_ty]);
    let outer = table.union_of(vec![inner, i32_ty, f64_ty]);
    assert_eq!(inner, outer, "nested duplicate union should collapse");

    match table.get(outer) {
        Type::Union { members } => assert_eq!(members.len(), 2),
        other => panic!("expected union, got {other:?}"),
    }
}

#[test]
fn single_member_union_collapses() {
    let mut table = TypeTable::new();
    let i32_ty = table.primitive(PrimitiveKind::I32);
    assert_eq!(table.union_of(vec![i32_ty, i32_ty]), i32_ty);
}

#[test]
fn literal_types_are_per_node() {
    let mut table = TypeTable::new();
    let a = table.literal_of(NodeIndex(7));
    let b = table.literal_of(NodeIndex(7));
    let c = table.literal_of(NodeIndex(9));
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn well_known_slots_are_stable() {
    let table = TypeTable::new();
    assert!(matches!(table.get(TypeTable::ERROR), Type::Error));
    assert!(matches!(table.get(TypeTable::VOID), Type::Void));
    assert!(matches!(table.get(TypeTable::NULL), Type::Null));
    assert!(matches!(table.get(TypeTable::STRING), Type::String));
}
