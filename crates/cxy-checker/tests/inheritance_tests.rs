//! Tests for classes: inheritance, vtables, interface conformance, `is`,
//! and member dispatch through base chains.

mod pipeline;

use cxy_parser::AstKind;
use pipeline::{compile, compile_expecting_errors};

#[test]
fn derived_class_overrides_and_is_test_folds_true() {
    let c = compile(
        "class A { func greet() -> string => \"a\"; }\n\
         class B : A { func greet() -> string => \"b\"; }\n\
         func main() { var b: B = B{}; var s = b.greet(); var t = b is A; }",
    );
    assert_eq!(c.var_type("s"), "string");
    assert_eq!(c.var_type("t"), "bool");

    // The statically-true upcast folded to a literal.
    let t = c.find_var("t").expect("t");
    if let AstKind::VarDecl { init: Some(init), .. } = c.arena.kind(t) {
        assert!(matches!(c.arena.kind(*init), AstKind::BoolLit { value: true }));
    } else {
        panic!("expected initialized var");
    }
}

#[test]
fn override_produces_a_vtable_slot_for_both_classes() {
    let c = compile(
        "class A { func greet() -> string => \"a\"; }\n\
         class B : A { func greet() -> string => \"b\"; }",
    );
    let a_decl = c.find_decl("A").expect("A");
    let b_decl = c.find_decl("B").expect("B");
    let a_ty = c.module.node_types[&a_decl];
    let b_ty = c.module.node_types[&b_decl];
    let a_vtable = c.module.vtables.get(&a_ty).expect("A vtable");
    let b_vtable = c.module.vtables.get(&b_ty).expect("B vtable");

    let greet = c.strings.get("greet").expect("greet interned");
    let a_slot = a_vtable.entries.iter().position(|(n, _)| *n == greet);
    let b_slot = b_vtable.entries.iter().position(|(n, _)| *n == greet);
    assert!(a_slot.is_some(), "base method gets a slot once overridden");
    // Overrides keep the base slot index so upcast dispatch works.
    assert_eq!(a_slot, b_slot);
    assert_ne!(
        a_vtable.entries[a_slot.unwrap()].1,
        b_vtable.entries[b_slot.unwrap()].1,
        "slots point at different implementations"
    );
    assert_ne!(a_vtable.tid, b_vtable.tid);
}

#[test]
fn dynamic_downcast_test_lowers_to_a_tid_comparison() {
    let c = compile(
        "class A { func greet() -> string => \"a\"; }\n\
         class B : A { func greet() -> string => \"b\"; }\n\
         func f(a: A) { var t = a is B; }",
    );
    assert_eq!(c.var_type("t"), "bool");
    let has_tid_compare = c.arena.indices().any(|idx| {
        if let AstKind::BinaryExpr {
            op: cxy_parser::Operator::Eq,
            lhs,
            ..
        } = c.arena.kind(idx)
        {
            if let AstKind::MemberExpr { member, .. } = c.arena.kind(*lhs) {
                if let AstKind::Identifier { name } = c.arena.kind(*member) {
                    return c.strings.resolve(*name) == "__tid";
                }
            }
        }
        false
    });
    assert!(has_tid_compare, "downcast test should compare __tid");
}

#[test]
fn impossible_is_test_is_an_error() {
    let c = compile_expecting_errors(
        "class A {}\nclass B {}\nfunc f(a: A) { var t = a is B; }",
    );
    assert!(c.has_error_containing("can never be"));
}

#[test]
fn base_fields_are_reachable_from_the_derived_class() {
    let c = compile(
        "class Base { count: i64; }\n\
         class Derived : Base { func bump() : i64 => this.count + 1; }",
    );
    assert_eq!(c.log.error_count(), 0, "{:?}", c.log.diagnostics());
}

#[test]
fn upcast_assignment_is_implicit_downcast_is_explicit() {
    let c = compile(
        "class A {}\nclass B : A { }\n\
         func f() { var b: B = B{}; var a: A = b; var back: B = a as B; }",
    );
    assert_eq!(c.var_type("a"), "A");
    assert_eq!(c.var_type("back"), "B");

    let c = compile_expecting_errors(
        "class A {}\nclass B : A { }\nfunc f(a: A) { var b: B = a; }",
    );
    assert!(c.has_error_containing("cannot initialize"));
}

#[test]
fn circular_inheritance_is_an_error() {
    let c = compile_expecting_errors("class A : B {}\nclass B : A {}");
    assert!(c.has_error_containing("circular inheritance"));
}

#[test]
fn self_inheritance_is_an_error() {
    let c = compile_expecting_errors("class A : A {}");
    assert!(c.has_error_containing("circular inheritance"));
}

#[test]
fn alias_mediated_inheritance_cycle_is_an_error() {
    // The alias resolves after the class starts declaring, so the cycle
    // surfaces as an unbound self placeholder rather than an in-progress
    // declaration.
    let c = compile_expecting_errors("class A : Base {}\ntype Base = A;");
    assert!(c.has_error_containing("circular inheritance"));
}

#[test]
fn three_class_cycle_is_an_error_and_terminates() {
    let c = compile_expecting_errors(
        "class A : B {}\nclass B : C {}\nclass C : A {}\nfunc f(a: A) { var t = a is B; }",
    );
    assert!(c.has_error_containing("circular inheritance"));
}

#[test]
fn interface_conformance_is_member_by_member() {
    let c = compile(
        "interface Shape { func area() : f64; }\n\
         class Circle : Shape { func area() : f64 => 3.14; }\n\
         func f() { var c: Circle = Circle{}; var a = c.area(); }",
    );
    assert_eq!(c.var_type("a"), "f64");
}

#[test]
fn missing_interface_member_is_an_error() {
    let c = compile_expecting_errors(
        "interface Shape { func area() : f64; }\nclass Square : Shape { }",
    );
    assert!(c.has_error_containing("does not implement"));
}

#[test]
fn default_interface_methods_are_inherited() {
    let c = compile(
        "interface Greeter { func greet() -> string => \"hi\"; }\n\
         class Quiet : Greeter { }\n\
         func f() { var q: Quiet = Quiet{}; var s = q.greet(); }",
    );
    assert_eq!(c.var_type("s"), "string");
}

#[test]
fn interface_type_accepts_conforming_values() {
    let c = compile(
        "interface Shape { func area() : f64; }\n\
         class Circle : Shape { func area() : f64 => 1.0; }\n\
         func f() { var c: Circle = Circle{}; var s: Shape = c; }",
    );
    assert_eq!(c.var_type("s"), "Shape");
}

#[test]
fn super_constructor_and_member_access() {
    let c = compile(
        "class Base { count: i64; func describe() -> string => \"base\"; }\n\
         class Child : Base { func describe() -> string => super.describe(); }",
    );
    assert_eq!(c.log.error_count(), 0, "{:?}", c.log.diagnostics());
}
