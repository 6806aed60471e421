//! Tests for declaration parsing: functions, aggregates, enums, aliases,
//! exceptions, macros, tests, imports and attributes.

use cxy_common::{Interner, Log};
use cxy_parser::{dump_sexp, AstKind, NodeArena, NodeFlags, NodeIndex, Operator, ParserState};

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

fn program_decls(arena: &NodeArena, root: NodeIndex) -> Vec<NodeIndex> {
    match arena.kind(root) {
        AstKind::Program { decls, .. } => decls.clone(),
        other => panic!("expected program, got {other:?}"),
    }
}

#[test]
fn function_with_params_return_and_block_body() {
    let sexp = dump("func div(a: i32, b: i32) : i32 | Exception { return a / b; }");
    assert!(sexp.contains("(func div (param a (prim-type i32)) (param b (prim-type i32))"));
    assert!(sexp.contains("(union-type (prim-type i32) (path (path-elem Exception)))"));
}

#[test]
fn function_with_arrow_return_and_expr_body() {
    let sexp = dump("func greet() -> string => \"a\";");
    assert!(sexp.contains("(func greet (string-type) (block (return (string \"a\"))))"));
}

#[test]
fn operator_overload_declaration_is_tagged() {
    let (_, log, arena, root) = parse("struct V { func op_add(other: V) : V => other; }");
    assert_eq!(log.error_count(), 0);
    let decls = program_decls(&arena, root);
    let members = match arena.kind(decls[0]) {
        AstKind::StructDecl { members, .. } => members.clone(),
        other => panic!("expected struct, got {other:?}"),
    };
    match arena.kind(members[0]) {
        AstKind::FuncDecl { operator, .. } => assert_eq!(*operator, Some(Operator::Add)),
        other => panic!("expected func member, got {other:?}"),
    }
}

#[test]
fn variadic_parameter_sets_the_flag() {
    let (_, log, arena, root) = parse("func log_all(...items: i32) {}");
    assert_eq!(log.error_count(), 0);
    let decls = program_decls(&arena, root);
    assert!(arena.flags(decls[0]).contains(NodeFlags::VARIADIC));
}

#[test]
fn generic_parameters_with_constraints_and_defaults() {
    let sexp = dump("func max[T: Comparable, U = i32](a: T, b: T) : T { return a; }");
    assert!(sexp.contains("(generic-param T (path (path-elem Comparable)))"));
    assert!(sexp.contains("(generic-param U (prim-type i32))"));
}

#[test]
fn class_with_base_and_members() {
    let sexp = dump(
        "class B : A { count: i64; func greet() -> string => \"b\"; }",
    );
    assert!(sexp.contains("(class B (path (path-elem A)) (field count (prim-type i64))"));
    assert!(sexp.contains("(func greet"));
}

#[test]
fn self_referential_pointer_field() {
    let sexp = dump("class Node { next: ^This; value: i64; }");
    assert!(sexp.contains("(field next (ptr-type (path (path-elem This))))"));
}

#[test]
fn interface_with_signature_only_members() {
    let (_, log, arena, root) = parse("interface Shape { func area() : f64; }");
    assert_eq!(log.error_count(), 0);
    let decls = program_decls(&arena, root);
    let members = match arena.kind(decls[0]) {
        AstKind::InterfaceDecl { members, .. } => members.clone(),
        other => panic!("expected interface, got {other:?}"),
    };
    match arena.kind(members[0]) {
        AstKind::FuncDecl { body, .. } => assert!(body.is_none()),
        other => panic!("expected func member, got {other:?}"),
    }
}

#[test]
fn enum_with_base_and_values() {
    let sexp = dump("enum Color : u8 { Red = 1, Green, Blue }");
    assert!(sexp.contains("(enum Color (prim-type u8) (enum-option Red (int 1)) (enum-option Green) (enum-option Blue))"));
}

#[test]
fn type_alias_and_opaque_type() {
    let sexp = dump("type Meters = i64; type Handle;");
    assert!(sexp.contains("(type Meters (prim-type i64))"));
    assert!(sexp.contains("(type Handle)"));
}

#[test]
fn exception_declaration() {
    let sexp = dump("exception NotFound(k: string) => `key ${k}`;");
    assert!(sexp.contains("(exception NotFound (param k (string-type))"));
    assert!(sexp.contains("(string-expr (string \"key \") (path (path-elem k)))"));
}

#[test]
fn macro_declaration_is_comptime() {
    let (_, log, arena, root) = parse("macro twice(x) => x + x;");
    assert_eq!(log.error_count(), 0);
    let decls = program_decls(&arena, root);
    assert!(arena.flags(decls[0]).contains(NodeFlags::COMPTIME));
}

#[test]
fn test_declaration_carries_test_context() {
    let (_, log, arena, root) = parse("test \"adds small numbers\" { check(1 + 1); }");
    assert_eq!(log.error_count(), 0);
    let decls = program_decls(&arena, root);
    assert!(arena.flags(decls[0]).contains(NodeFlags::TEST_CONTEXT));
    match arena.kind(decls[0]) {
        AstKind::TestDecl { .. } => {}
        other => panic!("expected test decl, got {other:?}"),
    }
}

#[test]
fn imports_are_collected_separately() {
    let (_, log, arena, root) = parse(
        "import \"./util.cxy\" as util\nimport plugin \"./p.so\" as hooks\nvar x = 1;",
    );
    assert_eq!(log.error_count(), 0);
    match arena.kind(root) {
        AstKind::Program { imports, decls, .. } => {
            assert_eq!(imports.len(), 2);
            assert_eq!(decls.len(), 1);
            match arena.kind(imports[1]) {
                AstKind::ImportDecl { is_plugin, alias, .. } => {
                    assert!(*is_plugin);
                    assert!(alias.is_some());
                }
                other => panic!("expected import, got {other:?}"),
            }
        }
        other => panic!("expected program, got {other:?}"),
    }
}

#[test]
fn module_header_soft_keyword() {
    let (strings, log, arena, root) = parse("module geometry\nvar x = 1;");
    assert_eq!(log.error_count(), 0);
    match arena.kind(root) {
        AstKind::Program { module, .. } => {
            let module = module.expect("module header");
            match arena.kind(module) {
                AstKind::ModuleDecl { name } => {
                    assert_eq!(strings.resolve(*name), "geometry");
                }
                other => panic!("expected module decl, got {other:?}"),
            }
        }
        other => panic!("expected program, got {other:?}"),
    }
}

#[test]
fn attributes_attach_to_the_following_declaration() {
    let (strings, log, arena, root) = parse("@inline @linkage(\"external\") func f() {}");
    assert_eq!(log.error_count(), 0);
    let decls = program_decls(&arena, root);
    let attrs = &arena.get(decls[0]).attrs;
    assert_eq!(attrs.len(), 2);
    match arena.kind(attrs[0]) {
        AstKind::Attr { name, .. } => assert_eq!(strings.resolve(*name), "inline"),
        other => panic!("expected attr, got {other:?}"),
    }
}

#[test]
fn bare_attribute_line_is_a_directive() {
    let (strings, log, arena, root) = parse("@cBuild(\":clib\", \"m\")\n");
    assert_eq!(log.error_count(), 0);
    let decls = program_decls(&arena, root);
    assert_eq!(decls.len(), 1);
    match arena.kind(decls[0]) {
        AstKind::Attr { name, args } => {
            assert_eq!(strings.resolve(*name), "cBuild");
            assert_eq!(args.len(), 2);
        }
        other => panic!("expected directive attr, got {other:?}"),
    }
}

#[test]
fn comptime_if_declaration_selects_branches_later() {
    let (_, log, arena, root) = parse(
        "#if (sizeof!(i128) == 16) { const K = 1; } else { const K = 2; }",
    );
    assert_eq!(log.error_count(), 0);
    let decls = program_decls(&arena, root);
    assert!(arena.flags(decls[0]).contains(NodeFlags::COMPTIME));
    match arena.kind(decls[0]) {
        AstKind::IfStmt { otherwise, .. } => assert!(otherwise.is_some()),
        other => panic!("expected comptime if, got {other:?}"),
    }
}
