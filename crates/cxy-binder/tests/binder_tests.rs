//! Tests for name resolution: scoping, hoisting, jump targets, suggestions
//! and context rules.

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
    assert_eq!(
        log.error_count(),
        0,
        "unexpected parse errors: {:?}",
        log.diagnostics()
    );
    let builtin_names: Vec<_> = ["println", "String", "Slice", "Optional", "Exception"]
        .iter()
        .map(|n| strings.intern(n))
        .collect();
    let result = BinderState::new(&mut strings, &mut log, &mut arena)
        .with_builtins(builtin_names)
        .bind_program(root);
    (strings, log, arena, root, result)
}

fn find_path_to(
    strings: &Interner,
    arena: &NodeArena,
    name: &str,
) -> Option<NodeIndex> {
    arena.indices().find(|&idx| {
        if let AstKind::Path { elements } = arena.kind(idx) {
            if let Some(&head) = elements.first() {
                if let AstKind::PathElement { name: n, .. } = arena.kind(head) {
                    return strings.resolve(*n) == name;
                }
            }
        }
        false
    })
}

#[test]
fn local_variables_resolve_to_their_declaration() {
    let (strings, log, arena, _, result) = bind("func f() { var x = 1; var y = x + 1; }");
    assert_eq!(log.error_count(), 0, "{:?}", log.diagnostics());
    let x_use = find_path_to(&strings, &arena, "x").expect("use of x");
    let decl = result.resolution_of(x_use).expect("x resolves");
    assert!(matches!(arena.kind(decl), AstKind::VarDecl { .. }));
}

#[test]
fn top_level_declarations_are_mutually_visible() {
    let (_, log, _, _, _) = bind(
        "func a() { b(); }\nfunc b() { a(); }\nstruct S { other: ^T; }\nstruct T { other: ^S; }",
    );
    assert_eq!(log.error_count(), 0, "{:?}", log.diagnostics());
}

#[test]
fn undefined_symbol_gets_a_suggestion() {
    let (_, log, _, _, _) = bind("func f() { var count = 1; var v = cuont; }");
    assert_eq!(log.error_count(), 1);
    let message = &log.diagnostics()[0].message;
    assert!(
        message.contains("did you mean 'count'"),
        "message was: {message}"
    );
}

#[test]
fn shadowing_a_variable_in_the_same_scope_is_an_error() {
    let (_, log, _, _, _) = bind("func f() { var x = 1; var x = 2; }");
    assert!(log.error_count() >= 1);
    assert!(log.diagnostics()[0].message.contains("already defined"));
}

#[test]
fn function_overloads_share_a_chain() {
    let (strings, log, arena, _, result) = bind(
        "func show(v: i32) {}\nfunc show(v: string) {}\nfunc main() { show(1); }",
    );
    assert_eq!(log.error_count(), 0, "{:?}", log.diagnostics());
    let call_path = find_path_to(&strings, &arena, "show").expect("call site");
    let chain = result
        .overload_chains
        .get(&call_path)
        .expect("overload chain recorded");
    assert_eq!(chain.len(), 2);
}

#[test]
fn break_and_continue_point_at_the_enclosing_loop() {
    let (_, log, arena, _, result) = bind(
        "func f() { while (true) { if (x()) { break; } continue; } }",
    );
    // `x` is undefined; ignore that one error and check the targets.
    let _ = log;
    let break_stmt = arena
        .indices()
        .find(|&i| matches!(arena.kind(i), AstKind::BreakStmt))
        .expect("break");
    let target = result.jump_targets.get(&break_stmt).expect("break target");
    assert!(matches!(arena.kind(*target), AstKind::WhileStmt { .. }));
}

#[test]
fn break_outside_a_loop_is_an_error() {
    let (_, log, _, _, _) = bind("func f() { break; }");
    assert_eq!(log.error_count(), 1);
    assert!(log.diagnostics()[0].message.contains("outside of a loop"));
}

#[test]
fn return_points_at_the_enclosing_function() {
    let (_, log, arena, _, result) = bind("func f() : i32 { return 1; }");
    assert_eq!(log.error_count(), 0, "{:?}", log.diagnostics());
    let ret = arena
        .indices()
        .find(|&i| matches!(arena.kind(i), AstKind::ReturnStmt { .. }))
        .expect("return");
    let target = result.jump_targets.get(&ret).expect("return target");
    assert!(matches!(arena.kind(*target), AstKind::FuncDecl { .. }));
}

#[test]
fn defer_points_at_the_enclosing_block() {
    let (_, log, arena, _, result) = bind("func f() { defer cleanup(); }");
    let _ = log;
    let defer = arena
        .indices()
        .find(|&i| matches!(arena.kind(i), AstKind::DeferStmt { .. }))
        .expect("defer");
    let target = result.jump_targets.get(&defer).expect("defer target");
    assert!(matches!(arena.kind(*target), AstKind::Block { .. }));
}

#[test]
fn this_resolves_to_the_enclosing_class() {
    let (strings, log, arena, _, result) = bind(
        "class Counter { count: i64; func bump() { this.count = this.count + 1; } }",
    );
    assert_eq!(log.error_count(), 0, "{:?}", log.diagnostics());
    let this_path = find_path_to(&strings, &arena, "this").expect("this path");
    let class = result.enclosing_class.get(&this_path).expect("class");
    assert!(matches!(arena.kind(*class), AstKind::ClassDecl { .. }));
}

#[test]
fn this_outside_a_class_is_an_error() {
    let (_, log, _, _, _) = bind("func f() { var v = this.x; }");
    assert_eq!(log.error_count(), 1);
}

#[test]
fn enum_options_resolve_syntactically() {
    let (strings, log, arena, _, result) = bind(
        "enum Color { Red, Green }\nfunc f() { var c = Color.Red; }",
    );
    assert_eq!(log.error_count(), 0, "{:?}", log.diagnostics());
    let path = find_path_to(&strings, &arena, "Color").expect("enum path");
    if let AstKind::Path { elements } = arena.kind(path) {
        let option = result
            .resolution_of(elements[1])
            .expect("option resolved");
        assert!(matches!(arena.kind(option), AstKind::EnumOption { .. }));
    } else {
        panic!("expected path");
    }
}

#[test]
fn members_are_visible_before_their_declaration() {
    let (_, log, _, _, _) = bind(
        "struct S { func get() : i64 => this.value; value: i64; }",
    );
    assert_eq!(log.error_count(), 0, "{:?}", log.diagnostics());
}

#[test]
fn test_context_symbols_are_fenced() {
    let (_, log, _, _, _) = bind(
        "test \"helper\" { var probe = 1; }\nfunc f() { }",
    );
    assert_eq!(log.error_count(), 0, "{:?}", log.diagnostics());
}

#[test]
fn import_aliases_bind() {
    let (strings, log, arena, _, result) = bind(
        "import \"./util.cxy\" as util\nfunc f() { util.helper(); }",
    );
    assert_eq!(log.error_count(), 0, "{:?}", log.diagnostics());
    let path = find_path_to(&strings, &arena, "util").expect("qualified path");
    let decl = result.resolution_of(path).expect("resolves to import");
    assert!(matches!(arena.kind(decl), AstKind::ImportDecl { .. }));
}
