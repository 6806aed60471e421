//! Tests for the simplifier: defer materialization and name mangling.

use cxy_binder::BinderState;
use cxy_common::{Interner, Log};
use cxy_lowering::{ShakeOptions, Shaker, Simplifier, SimplifyResult};
use cxy_parser::{dump_sexp, AstKind, NodeArena, NodeFlags, NodeIndex, ParserState};
use cxy_types::{TypeId, TypeTable};
use rustc_hash::FxHashMap;

fn lower(source: &str) -> (Interner, Log, NodeArena, NodeIndex, SimplifyResult) {
    let mut strings = Interner::new();
    let mut log = Log::new();
    let (mut arena, root) = {
        let mut parser = ParserState::new(&mut strings, &mut log, "test.cxy", source.to_string());
        let root = parser.parse_program();
        (parser.into_arena(), root)
    };
    assert_eq!(log.error_count(), 0, "parse: {:?}", log.diagnostics());
    let builtins: Vec<_> = ["open", "close", "release", "work", "println", "String", "Exception", "Slice"]
        .iter()
        .map(|n| strings.intern(n))
        .collect();
    let bindings = BinderState::new(&mut strings, &mut log, &mut arena)
        .with_builtins(builtins)
        .bind_program(root);
    assert_eq!(log.error_count(), 0, "bind: {:?}", log.diagnostics());
    Shaker::new(
        &mut strings,
        &mut log,
        &mut arena,
        &bindings,
        ShakeOptions::default(),
    )
    .shake_program(root);
    let node_types: FxHashMap<NodeIndex, TypeId> = FxHashMap::default();
    let types = TypeTable::new();
    let result =
        Simplifier::new(&mut strings, &mut arena, &node_types, &types).simplify_program(root);
    (strings, log, arena, root, result)
}

#[test]
fn defer_runs_before_return() {
    let (strings, _, arena, root, _) = lower(
        "func f() { defer close(1); work(); return; }",
    );
    let sexp = dump_sexp(&arena, &strings, root);
    let close_pos = sexp.find("(call (path (path-elem close)) (int 1))").expect("defer copy");
    let return_pos = sexp.rfind("(return)").expect("return");
    assert!(close_pos < return_pos, "defer body must precede return: {sexp}");
    // No DeferStmt survives.
    assert!(
        arena
            .indices()
            .all(|i| !matches!(arena.kind(i), AstKind::DeferStmt { .. })),
        "defers must be removed"
    );
}

#[test]
fn defer_runs_at_natural_fallthrough() {
    let (strings, _, arena, root, _) = lower("func f() { defer close(1); work(); }");
    let sexp = dump_sexp(&arena, &strings, root);
    let work_pos = sexp.find("(call (path (path-elem work)))").expect("work call");
    let close_pos = sexp.find("(call (path (path-elem close))").expect("defer copy");
    assert!(work_pos < close_pos, "defer runs after the last statement: {sexp}");
}

#[test]
fn defers_replay_in_reverse_order() {
    let (strings, _, arena, root, _) = lower(
        "func f() { defer close(1); defer close(2); work(); }",
    );
    let sexp = dump_sexp(&arena, &strings, root);
    let first = sexp.find("(call (path (path-elem close)) (int 2))").expect("second defer");
    let second = sexp.find("(call (path (path-elem close)) (int 1))").expect("first defer");
    assert!(first < second, "last registered runs first: {sexp}");
}

#[test]
fn break_replays_defers_up_to_the_loop() {
    let (strings, _, arena, root, _) = lower(
        "func f() { defer close(9); while (true) { defer close(1); break; } }",
    );
    let sexp = dump_sexp(&arena, &strings, root);
    // Inside the loop body the block defer is replayed before break.
    let loop_defer = sexp.find("(call (path (path-elem close)) (int 1))").expect("loop defer");
    let break_pos = sexp.find("(break)").expect("break");
    assert!(loop_defer < break_pos, "{sexp}");
    // The function-level defer is not replayed by the break (it appears
    // exactly twice: registration was removed, one copy at fallthrough).
    let nine_copies = sexp.matches("(call (path (path-elem close)) (int 9))").count();
    assert_eq!(nine_copies, 1, "{sexp}");
}

#[test]
fn return_replays_every_enclosing_defer() {
    let (strings, _, arena, root, _) = lower(
        "func f() { defer close(9); while (true) { defer close(1); return; } }",
    );
    let sexp = dump_sexp(&arena, &strings, root);
    let inner = sexp.find("(call (path (path-elem close)) (int 1))").expect("inner defer");
    let outer = sexp.find("(call (path (path-elem close)) (int 9))").expect("outer defer");
    let return_pos = sexp.find("(return)").expect("return");
    assert!(inner < outer && outer < return_pos, "inner unwinds first: {sexp}");
}

#[test]
fn defer_copies_are_independent_clones() {
    let (_, _, arena, _, _) = lower(
        "func f() { defer close(1); if (true) { return; } work(); }",
    );
    // One copy before the return, one at fallthrough; they are distinct
    // nodes, not shared references.
    let copies: Vec<_> = arena
        .indices()
        .filter(|&i| {
            matches!(arena.kind(i), AstKind::CallExpr { callee, .. }
                if matches!(arena.kind(*callee), AstKind::Path { .. }))
        })
        .collect();
    assert!(copies.len() >= 2);
}

#[test]
fn overloaded_functions_are_mangled() {
    let (strings, _, arena, _, result) = lower(
        "func show(v: i32) {}\nfunc show(v: f64) {}",
    );
    let mut names = Vec::new();
    for idx in arena.indices() {
        if matches!(arena.kind(idx), AstKind::FuncDecl { .. })
            && !arena.flags(idx).contains(NodeFlags::GENERATED)
        {
            if let Some(&atom) = result.mangled_names.get(&idx) {
                names.push(strings.resolve(atom).to_string());
            }
        }
    }
    assert_eq!(names.len(), 2, "both overloads mangled");
    assert!(names[0].starts_with("cxy_show"));
}

#[test]
fn methods_are_mangled_with_their_owner() {
    let (strings, _, arena, _, result) = lower(
        "struct V { func get() : i32 => 1; }",
    );
    let method = arena
        .indices()
        .find(|&i| {
            matches!(arena.kind(i), AstKind::FuncDecl { .. })
                && arena.flags(i).contains(NodeFlags::MEMBER)
        })
        .expect("method");
    let mangled = strings.resolve(*result.mangled_names.get(&method).expect("mangled"));
    assert!(mangled.contains("V"), "owner in name: {mangled}");
    assert!(mangled.contains("get"), "method in name: {mangled}");
}

#[test]
fn no_comptime_flags_survive_simplification() {
    let (_, _, arena, _, _) = lower("func f() { var v = 1; }");
    for idx in arena.indices() {
        assert!(!arena.flags(idx).contains(NodeFlags::COMPTIME));
    }
}
