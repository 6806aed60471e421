//! Tests for expression parsing: precedence, associativity, postfix chains,
//! closures, interpolation and tie-breaks.

use cxy_common::{Interner, Log};
use cxy_parser::{dump_sexp, NodeArena, NodeIndex, ParserState};

fn parse(source: &str) -> (Interner, Log, NodeArena, NodeIndex) {
    let mut strings = Interner::new();
    let mut log = Log::new();
    let (arena, root) = {
        let mut parser = ParserState::new(&mut strings, &mut log, "test.cxy", source.to_string());
        let root = parser.parse_program();
        (parser.into_arena(), root)
    };
    (strings, log, arena, root)
}

fn dump(source: &str) -> String {
    let (strings, log, arena, root) = parse(source);
    assert_eq!(
        log.error_count(),
        0,
        "unexpected parser diagnostics for {source:?}: {:?}",
        log.diagnostics()
    );
    dump_sexp(&arena, &strings, root)
}

#[test]
fn multiplicative_binds_tighter_than_additive() {
    let sexp = dump("var v = 1 + 2 * 3;");
    assert!(
        sexp.contains("(binary + (int 1) (binary * (int 2) (int 3)))"),
        "got {sexp}"
    );
}

#[test]
fn same_level_operators_associate_left() {
    let sexp = dump("var v = 1 - 2 - 3;");
    assert!(
        sexp.contains("(binary - (binary - (int 1) (int 2)) (int 3))"),
        "got {sexp}"
    );
}

#[test]
fn shift_binds_tighter_than_range_and_comparison() {
    let sexp = dump("var v = a << 1 .. b >> 2;");
    assert!(
        sexp.contains("(binary .. (binary <<"),
        "range should contain shifts: {sexp}"
    );

    let sexp = dump("var c = x < 1 << 2;");
    assert!(
        sexp.contains("(binary < (path (path-elem x)) (binary << (int 1) (int 2)))"),
        "got {sexp}"
    );
}

#[test]
fn assignment_is_right_associative_and_loosest() {
    let sexp = dump("func f() { a = b = c + 1; }");
    assert!(
        sexp.contains("(assign = (path (path-elem a)) (assign = (path (path-elem b))"),
        "got {sexp}"
    );
}

#[test]
fn ternary_right_associates_and_binds_tighter_than_assignment() {
    let sexp = dump("func f() { x = c ? a : b; }");
    assert!(
        sexp.contains("(assign = (path (path-elem x)) (ternary"),
        "got {sexp}"
    );
}

#[test]
fn is_operator_compares_against_a_type() {
    let sexp = dump("var t = b is A;");
    assert!(
        sexp.contains("(binary is (path (path-elem b)) (path (path-elem A)))"),
        "got {sexp}"
    );
}

#[test]
fn catch_operator_takes_a_block() {
    let sexp = dump("func f() { var r = g() catch { yield -1; }; }");
    assert!(
        sexp.contains("(binary catch (call"),
        "got {sexp}"
    );
    assert!(
        sexp.contains("(yield (unary - (int 1)))"),
        "got {sexp}"
    );
}

#[test]
fn postfix_chain_member_call_index_cast() {
    let sexp = dump("var v = a.b(1)[2] as i32;");
    assert!(sexp.contains("(cast (index (call"), "got {sexp}");
}

#[test]
fn forced_cast_is_marked_unchecked() {
    let sexp = dump("var v = x !: u8;");
    assert!(sexp.contains("(cast unchecked"), "got {sexp}");
}

#[test]
fn tuple_member_access_by_index() {
    let sexp = dump("var v = t.0;");
    assert!(
        sexp.contains("(member (path (path-elem t)) (int 0))"),
        "got {sexp}"
    );
}

#[test]
fn macro_call_through_bang() {
    let sexp = dump("var s = sizeof!(i128);");
    assert!(
        sexp.contains("(macro-call (path (path-elem sizeof)) (path (path-elem i128)))"),
        "got {sexp}"
    );
}

#[test]
fn closure_with_typed_params() {
    let sexp = dump("var f = (a: i32, b: i32) : i32 => a + b;");
    assert!(sexp.contains("(closure (param a"), "got {sexp}");
    assert!(sexp.contains("(return (binary +"), "got {sexp}");
}

#[test]
fn zero_param_closure_detected_by_lookahead() {
    let sexp = dump("var f = () => 1;");
    assert!(sexp.contains("(closure (block (return (int 1))))"), "got {sexp}");
}

#[test]
fn parenthesized_expression_is_not_a_closure() {
    let sexp = dump("var v = (a + b);");
    assert!(sexp.contains("(group (binary +"), "got {sexp}");
}

#[test]
fn tuple_literal_in_parens() {
    let sexp = dump("var v = (1, 2, 3);");
    assert!(
        sexp.contains("(tuple (int 1) (int 2) (int 3))"),
        "got {sexp}"
    );
}

#[test]
fn string_interpolation_alternates_parts() {
    let sexp = dump("var s = `A${x}B${y}`;");
    assert!(
        sexp.contains(
            "(string-expr (string \"A\") (path (path-elem x)) (string \"B\") (path (path-elem y)))"
        ),
        "got {sexp}"
    );
}

#[test]
fn struct_literal_after_path() {
    let sexp = dump("var b = B{};");
    assert!(sexp.contains("(struct-expr (path (path-elem B)))"), "got {sexp}");

    let sexp = dump("var p = Point{x: 1, y: 2};");
    assert!(
        sexp.contains("(struct-expr (path (path-elem Point)) (field-init x (int 1)) (field-init y (int 2)))"),
        "got {sexp}"
    );
}

#[test]
fn new_and_delete_expressions() {
    let sexp = dump("func f() { var p = new Box(1); delete p; }");
    assert!(sexp.contains("(new (path (path-elem Box)) (int 1))"), "got {sexp}");
    assert!(sexp.contains("(unary delete (path (path-elem p)))"), "got {sexp}");
}

#[test]
fn launch_rewrites_to_thread_launch_call() {
    let sexp = dump("func f() { launch work(); }");
    assert!(
        sexp.contains("(call (path (path-elem __thread_launch)) (closure"),
        "got {sexp}"
    );
}

#[test]
fn move_and_reference_prefix_operators() {
    let sexp = dump("var m = &&x; var r = &y;");
    assert!(sexp.contains("(unary && (path (path-elem x)))"), "got {sexp}");
    assert!(sexp.contains("(unary & (path (path-elem y)))"), "got {sexp}");
}

#[test]
fn comptime_substitution_expression() {
    let sexp = dump("var v = #{T};");
    assert!(sexp.contains("(substitute (path (path-elem T)))"), "got {sexp}");
}

#[test]
fn every_parsed_location_is_ordered() {
    let (_, log, arena, _) = parse("func f(a: i32) : i32 { return a * (a + 1); }");
    assert_eq!(log.error_count(), 0);
    for idx in arena.indices() {
        let loc = arena.loc(idx);
        assert!(
            loc.begin.offset <= loc.end.offset,
            "node {idx:?} has inverted span"
        );
    }
}
