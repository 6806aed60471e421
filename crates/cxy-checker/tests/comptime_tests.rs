//! Tests for the comptime evaluator: branch selection, loop unrolling,
//! constants, macros, substitutions and type introspection.

mod pipeline;

use cxy_parser::{dump_sexp, AstKind, NodeFlags};
use pipeline::{compile, compile_expecting_errors};

#[test]
fn comptime_if_selects_by_sizeof() {
    let c = compile(
        "#if (sizeof!(i128) == 16) { const K = 1; } else { const K = 2; }\n\
         func f() { var v = K; }",
    );
    let k = c.find_var("K").expect("spliced constant");
    if let AstKind::VarDecl { init: Some(init), .. } = c.arena.kind(k) {
        assert!(
            matches!(c.arena.kind(*init), AstKind::IntLit { value: 1, .. }),
            "K should be 1"
        );
    } else {
        panic!("expected constant");
    }
    assert_eq!(c.var_type("v"), "i32");
}

#[test]
fn comptime_if_discards_the_untaken_branch() {
    let c = compile(
        "#if (1 == 2) { const K = 1; } else { const K = 2; }\nfunc f() { var v = K; }",
    );
    let k = c.find_var("K").expect("spliced constant");
    if let AstKind::VarDecl { init: Some(init), .. } = c.arena.kind(k) {
        assert!(matches!(c.arena.kind(*init), AstKind::IntLit { value: 2, .. }));
    } else {
        panic!("expected constant");
    }
}

#[test]
fn comptime_for_unrolls_integer_ranges() {
    let c = compile("func g(v: i32) {}\nfunc f() { #for (const i: 0..3) { g(i); } }");
    let sexp = dump_sexp(&c.arena, &c.strings, c.root);
    assert!(sexp.contains("(call (path (path-elem g)) (int 0))"), "got {sexp}");
    assert!(sexp.contains("(call (path (path-elem g)) (int 1))"), "got {sexp}");
    assert!(sexp.contains("(call (path (path-elem g)) (int 2))"), "got {sexp}");
}

#[test]
fn comptime_while_advances_bindings() {
    let c = compile(
        "func g(v: i32) {}\nfunc f() { #const n = 0; #while (n < 2) { g(n); n = n + 1; } }",
    );
    let sexp = dump_sexp(&c.arena, &c.strings, c.root);
    assert!(sexp.contains("(call (path (path-elem g)) (int 0))"), "got {sexp}");
    assert!(sexp.contains("(call (path (path-elem g)) (int 1))"), "got {sexp}");
    assert!(!sexp.contains("(call (path (path-elem g)) (int 2))"), "got {sexp}");
}

#[test]
fn comptime_const_feeds_array_lengths() {
    let c = compile("#const N = 4;\nfunc f() { var a: [i32, N]; }");
    assert_eq!(c.var_type("a"), "[i32, 4]");
}

#[test]
fn substitution_folds_to_a_literal() {
    let c = compile("func f() { var v = #{1 + 2 * 3}; }");
    let v = c.find_var("v").expect("v");
    if let AstKind::VarDecl { init: Some(init), .. } = c.arena.kind(v) {
        assert!(matches!(c.arena.kind(*init), AstKind::IntLit { value: 7, .. }));
    } else {
        panic!("expected var");
    }
}

#[test]
fn non_foldable_substitution_is_an_error() {
    let c = compile_expecting_errors("func g() : i32 { return 1; }\nfunc f() { var v = #{g()}; }");
    assert!(c.has_error_containing("not a compile-time constant"));
}

#[test]
fn user_macros_substitute_their_arguments() {
    let c = compile("macro twice(x) => x + x;\nfunc f() { var v = twice!(3); }");
    assert_eq!(c.var_type("v"), "i32");
    let sexp = dump_sexp(&c.arena, &c.strings, c.root);
    assert!(sexp.contains("(binary + (int 3) (int 3))"), "got {sexp}");
}

#[test]
fn variadic_macro_parameters_flatten_to_a_tuple() {
    let c = compile(
        "macro pack(first, ...rest) => (first, rest);\nfunc f() { var v = pack!(1, 2, 3); }",
    );
    let sexp = dump_sexp(&c.arena, &c.strings, c.root);
    assert!(
        sexp.contains("(tuple (int 1) (tuple (int 2) (int 3)))"),
        "got {sexp}"
    );
}

#[test]
fn primitive_introspection_predicates() {
    let c = compile(
        "#if (i32.isInteger) { const A = 1; } else { const A = 0; }\n\
         #if (f64.isFloat) { const B = 1; } else { const B = 0; }\n\
         #if (i32.isFloat) { const C = 1; } else { const C = 0; }",
    );
    for (name, want) in [("A", 1u128), ("B", 1), ("C", 0)] {
        let decl = c.find_var(name).expect(name);
        if let AstKind::VarDecl { init: Some(init), .. } = c.arena.kind(decl) {
            assert!(
                matches!(c.arena.kind(*init), AstKind::IntLit { value, .. } if *value == want),
                "{name} wrong"
            );
        }
    }
}

#[test]
fn struct_member_introspection_drives_loops() {
    let c = compile(
        "struct P { x: i32; y: i32; }\n\
         func g(name: string) {}\n\
         func f() { #for (const m: P.members) { g(#{m.name}); } }",
    );
    let sexp = dump_sexp(&c.arena, &c.strings, c.root);
    assert!(sexp.contains("(call (path (path-elem g)) (string \"x\"))"), "got {sexp}");
    assert!(sexp.contains("(call (path (path-elem g)) (string \"y\"))"), "got {sexp}");
}

#[test]
fn type_name_introspection() {
    let c = compile(
        "struct Point { x: i32; }\n\
         func g(name: string) {}\n\
         func f() { g(#{Point.name}); }",
    );
    let sexp = dump_sexp(&c.arena, &c.strings, c.root);
    assert!(
        sexp.contains("(call (path (path-elem g)) (string \"Point\"))"),
        "got {sexp}"
    );
}

#[test]
fn no_comptime_flags_survive_evaluation() {
    let c = compile(
        "#if (1 == 1) { const K = 1; }\nfunc f() { #for (const i: 0..2) { println(i); } }",
    );
    for idx in c.arena.indices() {
        if c.arena.flags(idx).contains(NodeFlags::COMPTIME) {
            // Only detached placeholders may keep the flag.
            assert!(
                matches!(c.arena.kind(idx), AstKind::Noop),
                "comptime flag on {:?}",
                c.arena.kind(idx)
            );
        }
    }
}

#[test]
fn comptime_loop_over_a_non_constant_range_is_an_error() {
    let c = compile_expecting_errors(
        "func g() : i32 { return 3; }\nfunc f() { #for (const i: 0..g()) { } }",
    );
    assert!(c.has_error_containing("member list"));
}
