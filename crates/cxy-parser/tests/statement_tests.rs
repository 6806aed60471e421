//! Tests for statement parsing: control flow, match, defer, raise, async.

use cxy_common::{Interner, Log};
use cxy_parser::{dump_sexp, AstKind, NodeArena, NodeFlags, NodeIndex, ParserState};

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
fn for_loop_over_integer_range() {
    let sexp = dump("func main() { for (const i: 0..3) { println(i); } }");
    assert!(
        sexp.contains("(for (var (ident i)) (binary .. (int 0) (int 3)) (block"),
        "got {sexp}"
    );
}

#[test]
fn multi_variable_declaration_before_shaking() {
    let sexp = dump("func f() { var x, y = (1, 2); }");
    assert!(
        sexp.contains("(var (ident x) (ident y) (tuple (int 1) (int 2)))"),
        "got {sexp}"
    );
}

#[test]
fn if_else_chain() {
    let sexp = dump("func f() { if (a) { b(); } else if (c) { d(); } else { e(); } }");
    assert!(sexp.contains("(if (path (path-elem a)) (block"), "got {sexp}");
}

#[test]
fn if_with_var_declaration_condition() {
    let (_, log, arena, _) = parse("func f() { if (var x = g()) { use(x); } }");
    assert_eq!(log.error_count(), 0);
    let has_var_cond = arena.indices().any(|idx| {
        matches!(arena.kind(idx), AstKind::IfStmt { cond, .. }
            if matches!(arena.kind(*cond), AstKind::VarDecl { .. }))
    });
    assert!(has_var_cond, "condition should be a var declaration");
}

#[test]
fn while_loop_with_break_and_continue() {
    let sexp = dump("func f() { while (x < 10) { if (x == 5) { break; } continue; } }");
    assert!(sexp.contains("(while (binary <"), "got {sexp}");
    assert!(sexp.contains("(break)"), "got {sexp}");
    assert!(sexp.contains("(continue)"), "got {sexp}");
}

#[test]
fn defer_statement_with_expression_and_block() {
    let sexp = dump("func f() { defer close(h); defer { release(a); release(b); } }");
    assert!(sexp.contains("(defer (call (path (path-elem close))"), "got {sexp}");
    assert!(sexp.contains("(defer (block (expr-stmt (call"), "got {sexp}");
}

#[test]
fn raise_statement() {
    let sexp = dump("func f() { raise NotFound(\"x\"); }");
    assert!(
        sexp.contains("(raise (call (path (path-elem NotFound)) (string \"x\")))"),
        "got {sexp}"
    );
}

#[test]
fn match_with_cases_bindings_and_default() {
    let (_, log, arena, _) = parse(
        "func f() { match (v) { case 1, 2 => small(); case Big as b => use(b); else => other(); } }",
    );
    assert_eq!(log.error_count(), 0);
    let mut arm_count = 0;
    let mut default_count = 0;
    let mut binding_count = 0;
    for idx in arena.indices() {
        if let AstKind::MatchArm { binding, .. } = arena.kind(idx) {
            arm_count += 1;
            if arena.flags(idx).contains(NodeFlags::DEFAULT_CASE) {
                default_count += 1;
            }
            if binding.is_some() {
                binding_count += 1;
            }
        }
    }
    assert_eq!(arm_count, 3);
    assert_eq!(default_count, 1);
    assert_eq!(binding_count, 1);
}

#[test]
fn async_statement_wraps_body_in_runtime_macro() {
    let sexp = dump("func f() { async { work(); } }");
    assert!(
        sexp.contains("(macro-call (path (path-elem __async)) (closure async"),
        "got {sexp}"
    );
}

#[test]
fn comptime_for_is_flagged() {
    let (_, log, arena, _) = parse("func f() { #for (const i: 0..4) { emit(i); } }");
    assert_eq!(log.error_count(), 0);
    let has_comptime_for = arena.indices().any(|idx| {
        matches!(arena.kind(idx), AstKind::ForStmt { .. })
            && arena.flags(idx).contains(NodeFlags::COMPTIME)
    });
    assert!(has_comptime_for);
}

#[test]
fn comptime_while_is_flagged() {
    let (_, log, arena, _) = parse("func f() { #while (n < 4) { n = n + 1; } }");
    assert_eq!(log.error_count(), 0);
    let has_comptime_while = arena.indices().any(|idx| {
        matches!(arena.kind(idx), AstKind::WhileStmt { .. })
            && arena.flags(idx).contains(NodeFlags::COMPTIME)
    });
    assert!(has_comptime_while);
}

#[test]
fn nested_function_declaration_in_block() {
    let sexp = dump("func outer() { func inner() : i32 => 1; var v = inner(); }");
    assert!(sexp.contains("(func inner"), "got {sexp}");
}
