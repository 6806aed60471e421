//! Tests for parser error recovery and abort semantics.

use cxy_common::{Interner, Log};
use cxy_parser::{AstKind, NodeArena, NodeIndex, ParserState};

fn parse(source: &str) -> (Log, NodeArena, NodeIndex) {
    let mut strings = Interner::new();
    let mut log = Log::new();
    let (arena, root) = {
        let mut parser = ParserState::new(&mut strings, &mut log, "test.cxy", source.to_string());
        let root = parser.parse_program();
        (parser.into_arena(), root)
    };
    (log, arena, root)
}

fn decl_count(arena: &NodeArena, root: NodeIndex) -> usize {
    match arena.kind(root) {
        AstKind::Program { decls, .. } => decls.len(),
        other => panic!("expected program, got {other:?}"),
    }
}

#[test]
fn recovers_at_next_declaration_after_bad_function_header() {
    let (log, arena, root) = parse("func f( {\nvar ok = 1;\nfunc g() {}");
    assert!(log.error_count() >= 1, "expected at least one diagnostic");
    // Both following declarations survive recovery.
    assert!(decl_count(&arena, root) >= 2);
}

#[test]
fn recovers_inside_blocks_at_statement_granularity() {
    let (log, arena, root) = parse("func f() { var x = ; var y = 2; }");
    assert!(log.error_count() >= 1);
    assert_eq!(decl_count(&arena, root), 1);
    let y_survives = arena.indices().any(|idx| {
        matches!(arena.kind(idx), AstKind::VarDecl { init: Some(init), .. }
            if matches!(arena.kind(*init), AstKind::IntLit { value: 2, .. }))
    });
    assert!(y_survives, "statement after the error should parse");
}

#[test]
fn every_error_is_reported_never_silently_skipped() {
    let (log, _, _) = parse("func () {}\nstruct {}\n");
    assert!(log.error_count() >= 2, "got {:?}", log.diagnostics());
}

#[test]
fn missing_include_aborts_the_unit() {
    let (log, arena, root) = parse("var before = 1;\ninclude \"missing\"\nvar after = 2;");
    assert!(log.error_count() >= 1);
    // The declaration before the abort is kept; nothing after it parses.
    let decls = decl_count(&arena, root);
    assert_eq!(decls, 1, "unit should stop at the failed include");
}

#[test]
fn empty_source_yields_empty_program() {
    let (log, arena, root) = parse("");
    assert_eq!(log.error_count(), 0);
    assert_eq!(decl_count(&arena, root), 0);
    assert!(matches!(arena.kind(root), AstKind::Program { .. }));
}
