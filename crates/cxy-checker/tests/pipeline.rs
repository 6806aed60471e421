//! Shared test pipeline: parse, bind, evaluate, shake, rebind, check.
//!
//! The bind passes that feed lowering go to a scratch log; the final bind
//! and the checker report into the real one (the binder is idempotent, so
//! genuine name errors are re-reported by the last pass).

#![allow(dead_code)]

use cxy_binder::BinderState;
use cxy_checker::{check_unit, evaluate_unit, CheckedModule, CheckerOptions};
use cxy_common::{Atom, Interner, Log};
use cxy_lowering::{ShakeOptions, Shaker};
use cxy_parser::{AstKind, NodeArena, NodeIndex, ParserState};
use cxy_types::TypeTable;

const BUILTINS: &[&str] = &[
    "println",
    "print",
    "String",
    "Slice",
    "Optional",
    "Iterator",
    "Exception",
    "allTestCases",
    "__thread_launch",
    "__async",
    "__smart_ptr_alloc",
    "__smart_ptr_drop",
    "__push_ex_trace",
    "sizeof",
    "defined",
    "bool",
    "char",
    "wchar",
    "i8",
    "i16",
    "i32",
    "i64",
    "i128",
    "u8",
    "u16",
    "u32",
    "u64",
    "u128",
    "f32",
    "f64",
];

pub struct Compiled {
    pub strings: Interner,
    pub log: Log,
    pub arena: NodeArena,
    pub types: TypeTable,
    pub module: CheckedModule,
    pub root: NodeIndex,
}

impl Compiled {
    pub fn find_var(&self, name: &str) -> Option<NodeIndex> {
        let atom = self.strings.get(name)?;
        self.arena.indices().find(|&idx| {
            matches!(self.arena.kind(idx), AstKind::VarDecl { names, .. }
                if names.first().is_some_and(|&ident| {
                    matches!(self.arena.kind(ident), AstKind::Identifier { name } if *name == atom)
                }))
        })
    }

    pub fn find_decl(&self, name: &str) -> Option<NodeIndex> {
        let atom = self.strings.get(name)?;
        self.arena
            .indices()
            .find(|&idx| self.arena.kind(idx).decl_name() == Some(atom))
    }

    /// Display string of a named variable's checked type.
    pub fn var_type(&self, name: &str) -> String {
        let decl = self
            .find_var(name)
            .unwrap_or_else(|| panic!("no variable named '{name}'"));
        let ty = self
            .module
            .node_types
            .get(&decl)
            .unwrap_or_else(|| panic!("variable '{name}' has no type"));
        self.types.display(*ty, &self.strings)
    }

    pub fn has_error_containing(&self, fragment: &str) -> bool {
        self.log
            .diagnostics()
            .iter()
            .any(|d| d.message.contains(fragment))
    }
}

pub fn compile_pipeline(source: &str, test_mode: bool) -> Compiled {
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
        "parse errors: {:?}",
        log.diagnostics()
    );
    let atoms = |strings: &mut Interner| -> Vec<Atom> {
        BUILTINS.iter().map(|n| strings.intern(n)).collect()
    };

    // Pre-lowering bind feeds the evaluator.
    let bind_a = {
        let mut scratch = Log::new();
        let builtins = atoms(&mut strings);
        BinderState::new(&mut strings, &mut scratch, &mut arena)
            .with_builtins(builtins)
            .bind_program(root)
    };
    evaluate_unit(&mut strings, &mut log, &mut arena, &bind_a, root);

    // Rebind the folded tree so the shaker sees fresh capture sets.
    let bind_b = {
        let mut scratch = Log::new();
        let builtins = atoms(&mut strings);
        BinderState::new(&mut strings, &mut scratch, &mut arena)
            .with_builtins(builtins)
            .bind_program(root)
    };
    let shake_options = ShakeOptions {
        test_mode,
        trace_exceptions: false,
    };
    {
        let mut scratch = Log::new();
        Shaker::new(&mut strings, &mut scratch, &mut arena, &bind_b, shake_options)
            .shake_program(root);
    }

    // Final bind and check report for real.
    let builtins = atoms(&mut strings);
    let bindings = BinderState::new(&mut strings, &mut log, &mut arena)
        .with_builtins(builtins)
        .bind_program(root);
    let mut types = TypeTable::new();
    let module = check_unit(
        &mut strings,
        &mut log,
        &mut arena,
        &mut types,
        &bindings,
        CheckerOptions { test_mode },
        root,
    );

    Compiled {
        strings,
        log,
        arena,
        types,
        module,
        root,
    }
}

/// Compile and require a clean log.
pub fn compile(source: &str) -> Compiled {
    let compiled = compile_pipeline(source, false);
    assert_eq!(
        compiled.log.error_count(),
        0,
        "unexpected errors: {:?}",
        compiled.log.diagnostics()
    );
    compiled
}

/// Compile a program that must produce at least one error.
pub fn compile_expecting_errors(source: &str) -> Compiled {
    let compiled = compile_pipeline(source, false);
    assert!(
        compiled.log.error_count() > 0,
        "expected errors, log was clean"
    );
    compiled
}
