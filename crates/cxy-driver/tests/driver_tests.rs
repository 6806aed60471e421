//! Tests for the driver: module cache, imports, preprocessor directives,
//! test mode and end-to-end compilation.

use cxy_driver::{CompilerDriver, Options};
use cxy_parser::{dump_sexp, AstKind};
use std::io::Write as _;

fn driver() -> CompilerDriver {
    CompilerDriver::new(Options::default())
}

fn write_file(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("create source file");
    file.write_all(contents.as_bytes()).expect("write source");
    path
}

#[test]
fn compiles_a_simple_program_from_memory() {
    let mut driver = driver();
    let unit = driver.compile_source(
        "main.cxy",
        "func main() { var greeting = `hello ${40 + 2}`; println(greeting); }",
    );
    assert_eq!(driver.log.error_count(), 0, "{:?}", driver.log.diagnostics());
    assert_eq!(driver.exit_code(), 0);
    assert!(unit.arena.len() > 0);
}

#[test]
fn exit_code_is_nonzero_on_errors() {
    let mut driver = driver();
    driver.compile_source("main.cxy", "func main() { var v = missing; }");
    assert!(driver.log.has_errors());
    assert_eq!(driver.exit_code(), 1);
}

#[test]
fn compile_file_resolves_imports_recursively() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(
        dir.path(),
        "util.cxy",
        "pub func helper() : i32 { return 7; }",
    );
    let main = write_file(
        dir.path(),
        "main.cxy",
        "import \"./util.cxy\" as util\nfunc main() { var v = util.helper(); }",
    );

    let mut driver = driver();
    let unit = driver.compile_file(&main).expect("compiles");
    assert_eq!(driver.log.error_count(), 0, "{:?}", driver.log.diagnostics());
    let v = unit
        .arena
        .indices()
        .find(|&idx| {
            matches!(unit.arena.kind(idx), AstKind::VarDecl { names, .. }
                if names.first().is_some_and(|&ident| {
                    matches!(unit.arena.kind(ident), AstKind::Identifier { name }
                        if driver.strings.resolve(*name) == "v")
                }))
        })
        .expect("v");
    let ty = unit.module.node_types[&v];
    assert_eq!(driver.types.display(ty, &driver.strings), "i32");
}

#[test]
fn module_cache_deduplicates_shared_dependencies() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(dir.path(), "shared.cxy", "pub func shared() : i32 { return 1; }");
    write_file(
        dir.path(),
        "a.cxy",
        "import \"./shared.cxy\" as shared\npub func a() : i32 { return shared.shared(); }",
    );
    write_file(
        dir.path(),
        "b.cxy",
        "import \"./shared.cxy\" as shared\npub func b() : i32 { return shared.shared(); }",
    );
    let main = write_file(
        dir.path(),
        "main.cxy",
        "import \"./a.cxy\" as a\nimport \"./b.cxy\" as b\nfunc main() { var v = a.a() + b.b(); }",
    );
    let mut driver = driver();
    driver.compile_file(&main).expect("compiles");
    assert_eq!(driver.log.error_count(), 0, "{:?}", driver.log.diagnostics());
}

#[test]
fn import_cycles_are_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_file(
        dir.path(),
        "x.cxy",
        "import \"./y.cxy\" as y\npub func fx() : i32 { return 1; }",
    );
    write_file(
        dir.path(),
        "y.cxy",
        "import \"./x.cxy\" as x\npub func fy() : i32 { return 2; }",
    );
    let main = write_file(dir.path(), "main.cxy", "import \"./x.cxy\" as x\nfunc main() { }");
    let mut driver = driver();
    driver.compile_file(&main).expect("compiles");
    assert!(
        driver
            .log
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("import cycle")),
        "{:?}",
        driver.log.diagnostics()
    );
}

#[test]
fn missing_import_fails_the_dependent_module() {
    let dir = tempfile::tempdir().expect("tempdir");
    let main = write_file(
        dir.path(),
        "main.cxy",
        "import \"./nope.cxy\" as nope\nfunc main() { }",
    );
    let mut driver = driver();
    driver.compile_file(&main).expect("driver itself survives");
    assert!(driver.log.has_errors());
    assert_eq!(driver.exit_code(), 1);
}

#[test]
fn defines_feed_comptime_conditions() {
    let mut driver = driver();
    let unit = driver.compile_source(
        "main.cxy",
        "@define(FAST)\n\
         #if (defined!(FAST)) { const K = 1; } else { const K = 2; }\n\
         func main() { var v = K; }",
    );
    assert_eq!(driver.log.error_count(), 0, "{:?}", driver.log.diagnostics());
    let sexp = dump_sexp(&unit.arena, &driver.strings, unit.root);
    assert!(sexp.contains("(var (ident K) (int 1))"), "got {sexp}");
}

#[test]
fn c_build_directives_collect_backend_inputs() {
    let mut driver = driver();
    driver.compile_source(
        "main.cxy",
        "@cBuild(\":src\", \"support.c\")\n@cBuild(\":clib\", \"m\")\nfunc main() { }",
    );
    assert_eq!(driver.native_sources(), &["support.c".to_string()]);
    assert_eq!(driver.link_libraries(), &["m".to_string()]);
}

#[test]
fn test_mode_keeps_tests_and_gathers_cases() {
    let mut driver = CompilerDriver::new(Options {
        test_mode: true,
        ..Options::default()
    });
    let unit = driver.compile_source(
        "main.cxy",
        "test \"first\" { println(1); }\ntest \"second\" { println(2); }",
    );
    assert_eq!(driver.log.error_count(), 0, "{:?}", driver.log.diagnostics());
    let sexp = dump_sexp(&unit.arena, &driver.strings, unit.root);
    assert!(sexp.contains("(var (ident allTestCases)"), "got {sexp}");
}

#[test]
fn plain_mode_drops_tests() {
    let mut driver = driver();
    let unit = driver.compile_source("main.cxy", "test \"first\" { println(1); }\nfunc main() { }");
    assert_eq!(driver.log.error_count(), 0, "{:?}", driver.log.diagnostics());
    let sexp = dump_sexp(&unit.arena, &driver.strings, unit.root);
    assert!(!sexp.contains("allTestCases"), "got {sexp}");
}

#[test]
fn compiled_unit_satisfies_lowering_postconditions() {
    let mut driver = driver();
    let unit = driver.compile_source(
        "main.cxy",
        "func f() : i32 { defer println(0); var x, y = (1, 2); return x + y; }",
    );
    assert_eq!(driver.log.error_count(), 0, "{:?}", driver.log.diagnostics());
    for idx in unit.arena.indices() {
        assert!(
            !matches!(unit.arena.kind(idx), AstKind::DeferStmt { .. }),
            "defer must be materialized"
        );
        assert!(
            !unit
                .arena
                .flags(idx)
                .contains(cxy_parser::NodeFlags::COMPTIME),
            "comptime flags must be stripped"
        );
    }
}
