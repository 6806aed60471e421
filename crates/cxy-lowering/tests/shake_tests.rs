//! Tests for the shaker's desugarings.

use cxy_binder::BinderState;
use cxy_common::{Interner, Log};
use cxy_lowering::{ShakeOptions, Shaker};
use cxy_parser::{dump_sexp, AstKind, NodeArena, NodeFlags, NodeIndex, ParserState};

fn shake_with(source: &str, options: ShakeOptions) -> (Interner, Log, NodeArena, NodeIndex) {
    let mut strings = Interner::new();
    let mut log = Log::new();
    let (mut arena, root) = {
        let mut parser = ParserState::new(&mut strings, &mut log, "test.cxy", source.to_string());
        let root = parser.parse_program();
        (parser.into_arena(), root)
    };
    assert_eq!(log.error_count(), 0, "parse: {:?}", log.diagnostics());
    let builtins: Vec<_> = ["String", "Slice", "Exception", "println", "check", "g", "close", "release"]
        .iter()
        .map(|n| strings.intern(n))
        .collect();
    let bindings = BinderState::new(&mut strings, &mut log, &mut arena)
        .with_builtins(builtins)
        .bind_program(root);
    assert_eq!(log.error_count(), 0, "bind: {:?}", log.diagnostics());
    Shaker::new(&mut strings, &mut log, &mut arena, &bindings, options).shake_program(root);
    (strings, log, arena, root)
}

fn shake(source: &str) -> (Interner, Log, NodeArena, NodeIndex) {
    shake_with(source, ShakeOptions::default())
}

fn dump(arena: &NodeArena, strings: &Interner, root: NodeIndex) -> String {
    dump_sexp(arena, strings, root)
}

#[test]
fn multi_var_from_tuple_literal_expands_directly() {
    let (strings, _, arena, root) = shake("func f() { var x, y = (1, 2); }");
    let sexp = dump(&arena, &strings, root);
    assert!(sexp.contains("(var (ident x) (int 1))"), "got {sexp}");
    assert!(sexp.contains("(var (ident y) (int 2))"), "got {sexp}");
}

#[test]
fn multi_var_from_expression_goes_through_a_temp() {
    let (strings, _, arena, root) = shake("func f() { var x, y = g(); }");
    let sexp = dump(&arena, &strings, root);
    assert!(sexp.contains("(var (ident _t0) (call"), "got {sexp}");
    assert!(
        sexp.contains("(var (ident x) (member (path (path-elem _t0)) (int 0)))"),
        "got {sexp}"
    );
    assert!(
        sexp.contains("(var (ident y) (member (path (path-elem _t0)) (int 1)))"),
        "got {sexp}"
    );
}

#[test]
fn underscore_names_are_dropped() {
    let (strings, _, arena, root) = shake("func f() { var _, y = (1, 2); }");
    let sexp = dump(&arena, &strings, root);
    assert!(!sexp.contains("(var (ident _) "), "got {sexp}");
    assert!(sexp.contains("(var (ident y) (int 2))"), "got {sexp}");
}

#[test]
fn string_interpolation_becomes_builder_appends() {
    let (strings, _, arena, root) = shake("func f() { var s = `A${1}B`; }");
    let sexp = dump(&arena, &strings, root);
    assert!(sexp.contains("(call (path (path-elem String)))"), "got {sexp}");
    assert!(sexp.contains("(binary << (path (path-elem _t0)) (string \"A\"))"), "got {sexp}");
    assert!(sexp.contains("(binary << (path (path-elem _t0)) (int 1))"), "got {sexp}");
    assert!(sexp.contains("(binary << (path (path-elem _t0)) (string \"B\"))"), "got {sexp}");
}

#[test]
fn if_condition_declaration_is_hoisted() {
    let (strings, _, arena, root) = shake("func f() { if (var x = g()) { println(x); } }");
    let sexp = dump(&arena, &strings, root);
    let var_pos = sexp.find("(var (ident x)").expect("hoisted declaration");
    let if_pos = sexp.find("(if (path (path-elem x))").expect("if references temp");
    assert!(var_pos < if_pos, "declaration must precede the if: {sexp}");
}

#[test]
fn for_body_is_always_a_block() {
    let (strings, _, arena, root) = shake("func f() { for (const i: 0..3) println(i); }");
    let sexp = dump(&arena, &strings, root);
    assert!(
        sexp.contains("(for (var (ident i)) (binary .. (int 0) (int 3)) (block"),
        "got {sexp}"
    );
}

#[test]
fn closure_becomes_struct_with_op_call_and_trampoline() {
    let (strings, _, arena, root) = shake("func f() { var x = 1; var g = (d: i64) => x + d; }");
    let sexp = dump(&arena, &strings, root);
    // A generated struct declaration with the capture field, op_call and
    // the forward trampoline.
    assert!(sexp.contains("(struct CXY__closure0"), "got {sexp}");
    assert!(sexp.contains("(field x (auto-type))"), "got {sexp}");
    assert!(sexp.contains("(func op_call (param d (prim-type i64))"), "got {sexp}");
    assert!(sexp.contains("(func __fwd (param __self (ptr-type (void-type)))"), "got {sexp}");
    // The original site became a struct expression initializing captures.
    assert!(
        sexp.contains("(struct-expr (path (path-elem CXY__closure0)) (field-init x (path (path-elem x))))"),
        "got {sexp}"
    );
}

#[test]
fn captured_references_read_through_this() {
    let (strings, _, arena, root) = shake("func f() { var x = 1; var g = () => x; }");
    let sexp = dump(&arena, &strings, root);
    assert!(
        sexp.contains("(return (path (path-elem this) (path-elem x)))"),
        "got {sexp}"
    );
}

#[test]
fn zero_capture_closure_still_gets_a_struct() {
    let (strings, _, arena, root) = shake("func f() { var g = () => 1; }");
    let sexp = dump(&arena, &strings, root);
    assert!(sexp.contains("(struct CXY__closure0"), "got {sexp}");
    assert!(sexp.contains("(func op_call"), "got {sexp}");
}

#[test]
fn variadic_parameter_becomes_trailing_generic() {
    let (_, _, arena, _) = shake("func log_all(...items: i32) {}");
    let mut found = false;
    for idx in arena.indices() {
        if let AstKind::GenericParam {
            infer_index: Some(0),
            ..
        } = arena.kind(idx)
        {
            if arena.flags(idx).contains(NodeFlags::VARIADIC) {
                found = true;
            }
        }
    }
    assert!(found, "variadic generic parameter with infer index");
}

#[test]
fn exception_becomes_class_deriving_exception() {
    let (strings, _, arena, root) = shake("exception NotFound(k: string) => `key ${k}`;");
    let sexp = dump(&arena, &strings, root);
    assert!(sexp.contains("(class NotFound (path (path-elem Exception))"), "got {sexp}");
    assert!(sexp.contains("(field k (string-type))"), "got {sexp}");
    assert!(sexp.contains("(func op_init (param k (string-type))"), "got {sexp}");
    assert!(sexp.contains("(call (path (path-elem super)) (string \"NotFound\"))"), "got {sexp}");
    assert!(sexp.contains("(func what (string-type)"), "got {sexp}");
}

#[test]
fn raise_lowers_to_return_cast_to_exception() {
    let (strings, _, arena, root) = shake(
        "exception Oops(m: string) => m;\nfunc f() { raise Oops(\"bad\"); }",
    );
    let sexp = dump(&arena, &strings, root);
    assert!(
        sexp.contains("(return (cast (call (path (path-elem Oops)) (string \"bad\")) (path (path-elem Exception))))"),
        "got {sexp}"
    );
}

#[test]
fn test_declarations_drop_outside_test_mode() {
    let (_, _, arena, root) = shake("test \"t\" { check(1); }\nfunc f() {}");
    match arena.kind(root) {
        AstKind::Program { decls, .. } => {
            assert!(decls.iter().all(|&d| !matches!(
                arena.kind(d),
                AstKind::TestDecl { .. }
            )));
        }
        _ => panic!("expected program"),
    }
}

#[test]
fn test_mode_gathers_all_test_cases() {
    let options = ShakeOptions {
        test_mode: true,
        trace_exceptions: false,
    };
    let (strings, _, arena, root) = shake_with(
        "test \"a\" { check(1); }\ntest \"b\" { check(2); }",
        options,
    );
    let sexp = dump(&arena, &strings, root);
    assert!(sexp.contains("(func __test0"), "got {sexp}");
    assert!(sexp.contains("(func __test1"), "got {sexp}");
    assert!(
        sexp.contains("(var (ident allTestCases) (array (path (path-elem __test0)) (path (path-elem __test1))))"),
        "got {sexp}"
    );
    // Lowered tests return Void | Exception.
    assert!(sexp.contains("(union-type (void-type) (path (path-elem Exception)))"), "got {sexp}");
}

#[test]
fn slice_type_sugar_becomes_slice_path() {
    let (strings, _, arena, root) = shake("func f(xs: [i32]) {}");
    let sexp = dump(&arena, &strings, root);
    assert!(
        sexp.contains("(param xs (path (path-elem Slice (prim-type i32))))"),
        "got {sexp}"
    );
}

#[test]
fn sized_array_type_is_untouched() {
    let (strings, _, arena, root) = shake("func f(xs: [i32, 4]) {}");
    let sexp = dump(&arena, &strings, root);
    assert!(sexp.contains("(array-type (prim-type i32) (int 4))"), "got {sexp}");
}

#[test]
fn catch_expression_rhs_is_wrapped_in_a_yield_block() {
    let (strings, _, arena, root) = shake("func f() { var r = g() catch -1; }");
    let sexp = dump(&arena, &strings, root);
    assert!(
        sexp.contains("(binary catch (call (path (path-elem g))) (block (yield (unary - (int 1)))))"),
        "got {sexp}"
    );
}

#[test]
fn match_scrutinee_is_hoisted_to_an_lvalue() {
    let (strings, _, arena, root) = shake(
        "func f() { match (g()) { case 1 => println(1); else => println(2); } }",
    );
    let sexp = dump(&arena, &strings, root);
    let temp = sexp.find("(var (ident _t0) (call").expect("hoist temp");
    let match_pos = sexp.find("(match (path (path-elem _t0))").expect("match on temp");
    assert!(temp < match_pos, "temp precedes match: {sexp}");
}
