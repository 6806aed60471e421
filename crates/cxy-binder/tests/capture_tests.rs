//! Tests for closure capture analysis.

use cxy_common::{Interner, Log};
use cxy_parser::{AstKind, NodeArena, NodeIndex, ParserState};
use cxy_binder::{BindResult, BinderState};

fn bind(source: &str) -> (Interner, Log, NodeArena, NodeIndex, BindResult) {
    let mut strings = Interner::new();
    let mut log = Log::new();
    let (mut arena, root) = {
        let mut parser = ParserState::new(&mut strings, &mut log, "test.cxy", source.to_string());
        let root = parser.parse_program();
        (parser.into_arena(), root)
    };
    assert_eq!(log.error_count(), 0, "parse: {:?}", log.diagnostics());
    let result = BinderState::new(&mut strings, &mut log, &mut arena).bind_program(root);
    (strings, log, arena, root, result)
}

fn closures_of(arena: &NodeArena) -> Vec<NodeIndex> {
    arena
        .indices()
        .filter(|&i| matches!(arena.kind(i), AstKind::ClosureExpr { .. }))
        .collect()
}

#[test]
fn closure_captures_enclosing_local() {
    let (strings, log, arena, _, result) = bind(
        "func f() { var x = 1; var g = (d: i64) => x + d; }",
    );
    assert_eq!(log.error_count(), 0, "{:?}", log.diagnostics());
    let closures = closures_of(&arena);
    assert_eq!(closures.len(), 1);
    let captures = result.captures.get(&closures[0]).expect("capture set");
    assert_eq!(captures.len(), 1);
    assert_eq!(strings.resolve(captures[0].name), "x");
    assert!(matches!(arena.kind(captures[0].decl), AstKind::VarDecl { .. }));
}

#[test]
fn binding_twice_records_the_same_captures() {
    // The pass is idempotent: lowering passes re-run it on transformed
    // trees.
    let mut strings = Interner::new();
    let mut log = Log::new();
    let (mut arena, root) = {
        let mut parser = ParserState::new(
            &mut strings,
            &mut log,
            "test.cxy",
            "func f() { var x = 1; var g = () => x; }".to_string(),
        );
        let root = parser.parse_program();
        (parser.into_arena(), root)
    };
    let first = BinderState::new(&mut strings, &mut log, &mut arena).bind_program(root);
    let second = BinderState::new(&mut strings, &mut log, &mut arena).bind_program(root);
    assert_eq!(log.error_count(), 0, "{:?}", log.diagnostics());
    let closures = closures_of(&arena);
    assert_eq!(
        first.captures.get(&closures[0]).map(Vec::len),
        second.captures.get(&closures[0]).map(Vec::len),
    );
    assert_eq!(first.captures.get(&closures[0]).map(Vec::len), Some(1));
}

#[test]
fn parameters_are_captured_too() {
    let (strings, log, arena, _, result) = bind(
        "func adder(base: i64) { var g = (n: i64) => base + n; }",
    );
    assert_eq!(log.error_count(), 0, "{:?}", log.diagnostics());
    let closures = closures_of(&arena);
    let captures = result.captures.get(&closures[0]).expect("capture set");
    assert_eq!(captures.len(), 1);
    assert_eq!(strings.resolve(captures[0].name), "base");
    assert!(matches!(arena.kind(captures[0].decl), AstKind::FuncParam { .. }));
}

#[test]
fn top_level_symbols_are_not_captured() {
    let (_, log, arena, _, result) = bind(
        "var shared = 1;\nfunc f() { var g = () => shared; }",
    );
    assert_eq!(log.error_count(), 0, "{:?}", log.diagnostics());
    let closures = closures_of(&arena);
    let captures = result.captures.get(&closures[0]).expect("capture set");
    assert!(captures.is_empty(), "module globals are not captured");
}

#[test]
fn zero_capture_closure_still_gets_an_entry() {
    let (_, log, arena, _, result) = bind("func f() { var g = () => 1; }");
    assert_eq!(log.error_count(), 0, "{:?}", log.diagnostics());
    let closures = closures_of(&arena);
    assert_eq!(closures.len(), 1);
    assert!(result.captures.get(&closures[0]).expect("entry").is_empty());
}

#[test]
fn nested_closures_capture_through_every_boundary() {
    let (strings, log, arena, _, result) = bind(
        "func f() { var x = 1; var outer = () => { var inner = () => x; return inner; }; }",
    );
    assert_eq!(log.error_count(), 0, "{:?}", log.diagnostics());
    let closures = closures_of(&arena);
    assert_eq!(closures.len(), 2);
    // Both the inner and the outer closure must carry `x`.
    let mut with_x = 0;
    for closure in &closures {
        let captures = result.captures.get(closure).expect("entry");
        if captures
            .iter()
            .any(|c| strings.resolve(c.name) == "x")
        {
            with_x += 1;
        }
    }
    assert_eq!(with_x, 2, "capture crosses every closure boundary");
}

#[test]
fn capture_is_recorded_once_per_closure() {
    let (_, log, arena, _, result) = bind(
        "func f() { var x = 1; var g = () => x + x + x; }",
    );
    assert_eq!(log.error_count(), 0, "{:?}", log.diagnostics());
    let closures = closures_of(&arena);
    let captures = result.captures.get(&closures[0]).expect("entry");
    assert_eq!(captures.len(), 1);
}
