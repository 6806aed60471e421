//! Tests for core type checking: inference, assignability, calls,
//! overloads, generics, tuples and the lowered pipeline output.

mod pipeline;

use cxy_parser::AstKind;
use pipeline::{compile, compile_expecting_errors};

#[test]
fn literal_initializers_infer_default_primitives() {
    let c = compile("func f() { var v = 1; var w = 1.5; var b = true; var s = \"x\"; }");
    assert_eq!(c.var_type("v"), "i32");
    assert_eq!(c.var_type("w"), "f64");
    assert_eq!(c.var_type("b"), "bool");
    assert_eq!(c.var_type("s"), "string");
}

#[test]
fn suffixed_literals_take_their_suffix_type() {
    let c = compile("func f() { var v = 255_u8; var w = 1_i128; }");
    assert_eq!(c.var_type("v"), "u8");
    assert_eq!(c.var_type("w"), "i128");
}

#[test]
fn out_of_range_suffixed_literal_is_an_error() {
    let c = compile_expecting_errors("func f() { var v = 256_u8; }");
    assert!(c.has_error_containing("does not fit"));
}

#[test]
fn annotated_declaration_checks_the_initializer() {
    let c = compile_expecting_errors("func f() { var v: i32 = \"text\"; }");
    assert!(c.has_error_containing("cannot initialize"));
}

#[test]
fn literals_adapt_to_the_annotated_type() {
    let c = compile("func f() { var v: i64 = 1; var w: f32 = 2.5; }");
    assert_eq!(c.var_type("v"), "i64");
    assert_eq!(c.var_type("w"), "f32");
}

#[test]
fn unsigned_widens_into_strictly_larger_signed_only() {
    let c = compile("func f(a: u8) { var v: i16 = a; }");
    assert_eq!(c.log.error_count(), 0, "{:?}", c.log.diagnostics());

    let c = compile_expecting_errors("func f(a: u8) { var v: i8 = a; }");
    assert!(c.has_error_containing("cannot initialize"));
}

#[test]
fn multi_var_declaration_types_each_name() {
    // After shaking, `x` and `y` read through a tuple temp.
    let c = compile("func f() { var x, y = (1, 2); var s = x + y; }");
    assert_eq!(c.var_type("x"), "i32");
    assert_eq!(c.var_type("y"), "i32");
    assert_eq!(c.var_type("s"), "i32");
}

#[test]
fn tuple_expression_and_element_access() {
    let c = compile("func f() { var t = (1, \"a\"); var n = t.0; var s = t.1; }");
    assert_eq!(c.var_type("t"), "(i32, string)");
    assert_eq!(c.var_type("n"), "i32");
    assert_eq!(c.var_type("s"), "string");
}

#[test]
fn tuple_index_out_of_range_is_an_error() {
    let c = compile_expecting_errors("func f() { var t = (1, 2); var v = t.5; }");
    assert!(c.has_error_containing("no element"));
}

#[test]
fn call_arity_and_argument_types_are_checked() {
    let c = compile("func add(a: i32, b: i32) : i32 { return a + b; }\nfunc f() { var v = add(1, 2); }");
    assert_eq!(c.var_type("v"), "i32");

    let c = compile_expecting_errors(
        "func add(a: i32, b: i32) : i32 { return a + b; }\nfunc f() { var v = add(1, \"x\"); }",
    );
    assert!(c.log.error_count() >= 1);
}

#[test]
fn default_parameters_relax_arity() {
    let c = compile(
        "func greet(times: i32, loud: bool = false) : i32 { return times; }\nfunc f() { var v = greet(2); }",
    );
    assert_eq!(c.var_type("v"), "i32");
}

#[test]
fn overloads_resolve_by_exact_match_first() {
    let c = compile(
        "func show(v: i32) : i32 { return v; }\nfunc show(v: f64) : f64 { return v; }\nfunc f(a: i32) { var v = show(a); }",
    );
    assert_eq!(c.var_type("v"), "i32");
}

#[test]
fn ambiguous_overload_is_an_error() {
    let c = compile_expecting_errors(
        "func show(v: i64) : i32 { return 0; }\nfunc show(v: f64) : i32 { return 0; }\nfunc f(a: i32) { var v = show(a); }",
    );
    assert!(c.has_error_containing("ambiguous"));
}

#[test]
fn generic_function_infers_from_arguments() {
    let c = compile("func id[T](v: T) : T { return v; }\nfunc f() { var v = id(5); var s = id(\"a\"); }");
    assert_eq!(c.var_type("v"), "i32");
    assert_eq!(c.var_type("s"), "string");
}

#[test]
fn generic_struct_instantiates_and_memoizes() {
    let c = compile(
        "struct Box[T] { value: T; }\nfunc f() { var a = Box[i32]{value: 1}; var b = Box[i32]{value: 2}; var v = a.value; }",
    );
    assert_eq!(c.var_type("a"), "Box");
    assert_eq!(c.var_type("v"), "i32");
    // Memoized: both literals share one instance type.
    let a = c.find_var("a").expect("a");
    let b = c.find_var("b").expect("b");
    assert_eq!(c.module.node_types[&a], c.module.node_types[&b]);
}

#[test]
fn generic_type_annotation_uses_bracket_arguments() {
    let c = compile("struct Box[T] { value: T; }\nfunc f(b: Box[i64]) { var v = b.value; }");
    assert_eq!(c.var_type("v"), "i64");
}

#[test]
fn variadic_call_with_zero_extra_args_is_the_empty_tuple() {
    let c = compile("func log_all(...items: i32) {}\nfunc f() { log_all(); }");
    assert_eq!(c.log.error_count(), 0, "{:?}", c.log.diagnostics());
}

#[test]
fn undefined_member_is_an_error() {
    let c = compile_expecting_errors(
        "struct P { x: i32; }\nfunc f() { var p = P{x: 1}; var v = p.missing; }",
    );
    assert!(c.has_error_containing("no member named 'missing'"));
}

#[test]
fn error_types_do_not_cascade() {
    // One undefined symbol produces one error, not a chain from its uses.
    let c = compile_expecting_errors("func f() { var v = missing; var w = v + 1; }");
    assert_eq!(c.log.error_count(), 1, "{:?}", c.log.diagnostics());
}

#[test]
fn string_interpolation_types_as_string() {
    let c = compile("func f(n: i32) { var s = `n=${n}`; }");
    assert_eq!(c.var_type("s"), "string");
}

#[test]
fn slice_parameter_indexing_and_len() {
    let c = compile("func f(xs: [i32]) { var v = xs[0]; var n = xs.len; }");
    assert_eq!(c.var_type("v"), "i32");
    assert_eq!(c.var_type("n"), "u64");
}

#[test]
fn array_literal_infers_element_type_and_length() {
    let c = compile("func f() { var a = [1, 2, 3]; }");
    assert_eq!(c.var_type("a"), "[i32, 3]");
}

#[test]
fn match_with_duplicate_case_is_an_error() {
    let c = compile_expecting_errors(
        "func f(v: i32) { match (v) { case 1 => println(1); case 1 => println(2); else => println(3); } }",
    );
    assert!(c.has_error_containing("duplicate case"));
}

#[test]
fn empty_match_is_an_error() {
    let c = compile_expecting_errors("func f(v: i32) { match (v) { } }");
    assert!(c.has_error_containing("no arms"));
}

#[test]
fn multiple_default_arms_are_an_error() {
    let c = compile_expecting_errors(
        "func f(v: i32) { match (v) { case 1 => println(1); else => println(2); else => println(3); } }",
    );
    assert!(c.has_error_containing("more than one default"));
}

#[test]
fn assignment_needs_an_lvalue_and_compatible_types() {
    let c = compile_expecting_errors("func f() { 1 = 2; }");
    assert!(c.has_error_containing("not assignable"));

    let c = compile_expecting_errors("func f() { var v = 1; v = \"x\"; }");
    assert!(c.has_error_containing("cannot assign"));
}

#[test]
fn return_type_mismatch_is_an_error() {
    let c = compile_expecting_errors("func f() : i32 { return \"x\"; }");
    assert!(c.has_error_containing("return type mismatch"));
}

#[test]
fn every_checked_expression_carries_a_type() {
    let c = compile("func f(a: i32) : i32 { var v = a * (a + 1); return v; }");
    for idx in c.arena.indices() {
        if matches!(
            c.arena.kind(idx),
            AstKind::BinaryExpr { .. } | AstKind::IntLit { .. } | AstKind::Path { .. }
        ) {
            assert!(
                c.module.node_types.contains_key(&idx),
                "missing type for {:?}",
                c.arena.kind(idx)
            );
        }
    }
}
