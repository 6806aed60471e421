//! The compiler driver.
//!
//! Owns the compilation-wide state (string pool, diagnostic log, type
//! table, module cache, preprocessor, plugin registry) and orchestrates the
//! pass pipeline for each module: parse, preprocess, resolve imports
//! (recursively compiling dependencies), bind, evaluate, shake, rebind,
//! check, simplify. The module cache guarantees at most one in-flight
//! compilation per canonical path.

use crate::builtins;
use crate::options::Options;
use crate::plugin::PluginRegistry;
use crate::preprocessor::Preprocessor;
use anyhow::{Context as _, Result};
use cxy_binder::{BindResult, BinderState};
use cxy_checker::{CheckedModule, CheckerContext, CheckerOptions, CheckerState};
use cxy_common::{Atom, FileLoc, Interner, Log};
use cxy_lowering::{ShakeOptions, Shaker, Simplifier, SimplifyResult};
use cxy_parser::{AstKind, NodeArena, NodeIndex, ParserState};
use cxy_types::{TypeId, TypeTable};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Compilation state of one module in the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompileState {
    NotStarted,
    InProgress,
    Done,
    Failed,
}

struct ModuleEntry {
    state: CompileState,
    exported: TypeId,
}

/// A fully compiled unit: typed, desugared AST plus side tables.
pub struct CompiledUnit {
    pub arena: NodeArena,
    pub root: NodeIndex,
    pub module: CheckedModule,
    pub mangled: SimplifyResult,
}

pub struct CompilerDriver {
    pub options: Options,
    pub strings: Interner,
    pub log: Log,
    pub types: TypeTable,
    pub preprocessor: Preprocessor,
    pub plugins: PluginRegistry,
    /// Keyed by canonical path; iteration order is compile order.
    module_cache: IndexMap<PathBuf, ModuleEntry>,
    /// The shared builtin exception base, created by the first unit.
    exception_type: Option<TypeId>,
    builtin_atoms: Vec<Atom>,
}

impl CompilerDriver {
    pub fn new(options: Options) -> Self {
        let mut strings = Interner::new();
        let mut log = Log::new();
        log.set_max_errors(options.max_errors);
        log.set_enabled_warnings(options.warnings);
        let builtin_atoms = builtins::register(&mut strings);
        CompilerDriver {
            options,
            strings,
            log,
            types: TypeTable::new(),
            preprocessor: Preprocessor::new(),
            plugins: PluginRegistry::new(),
            module_cache: IndexMap::new(),
            exception_type: None,
            builtin_atoms,
        }
    }

    /// Exit status is nonzero iff any error was reported.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.log.has_errors())
    }

    /// Native sources collected by `@cBuild(":src", ...)` for the backend.
    pub fn native_sources(&self) -> &[String] {
        &self.preprocessor.native_sources
    }

    pub fn link_libraries(&self) -> &[String] {
        &self.preprocessor.link_libraries
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Compile the main module from a file.
    pub fn compile_file(&mut self, path: &Path) -> Result<CompiledUnit> {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let source = std::fs::read_to_string(&canonical)
            .with_context(|| format!("cannot read '{}'", path.display()))?;
        let base_dir = canonical
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        self.module_cache.insert(
            canonical.clone(),
            ModuleEntry {
                state: CompileState::InProgress,
                exported: TypeTable::ERROR,
            },
        );
        let name = canonical.display().to_string();
        let unit = self.run_unit(&name, source, &base_dir);
        let state = if self.log.has_errors() {
            CompileState::Failed
        } else {
            CompileState::Done
        };
        if let Some(entry) = self.module_cache.get_mut(&canonical) {
            entry.state = state;
            entry.exported = unit.module.exported;
        }
        Ok(unit)
    }

    /// Compile an in-memory source as the main module.
    pub fn compile_source(&mut self, name: &str, source: &str) -> CompiledUnit {
        self.run_unit(name, source.to_string(), &PathBuf::new())
    }

    /// Compile an imported module, memoized by canonical path. A module
    /// re-entered while `InProgress` is an import cycle.
    fn compile_module(&mut self, path: &Path, loc: FileLoc) -> TypeId {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if let Some(entry) = self.module_cache.get(&canonical) {
            match entry.state {
                CompileState::Done => return entry.exported,
                CompileState::Failed => return TypeTable::ERROR,
                CompileState::InProgress => {
                    self.log.error(loc, "import cycle detected");
                    return entry.exported;
                }
                CompileState::NotStarted => {}
            }
        }
        let source = match std::fs::read_to_string(&canonical) {
            Ok(source) => source,
            Err(error) => {
                self.log.error(
                    loc,
                    format!("cannot read module '{}': {error}", path.display()),
                );
                self.module_cache.insert(
                    canonical,
                    ModuleEntry {
                        state: CompileState::Failed,
                        exported: TypeTable::ERROR,
                    },
                );
                return TypeTable::ERROR;
            }
        };
        self.module_cache.insert(
            canonical.clone(),
            ModuleEntry {
                state: CompileState::InProgress,
                exported: TypeTable::ERROR,
            },
        );
        let errors_before = self.log.error_count();
        let base_dir = canonical
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let name = canonical.display().to_string();
        let unit = self.run_unit(&name, source, &base_dir);
        let failed = self.log.error_count() > errors_before;
        let entry = self.module_cache.get_mut(&canonical).expect("cache entry");
        if failed {
            entry.state = CompileState::Failed;
            entry.exported = TypeTable::ERROR;
            TypeTable::ERROR
        } else {
            entry.state = CompileState::Done;
            entry.exported = unit.module.exported;
            unit.module.exported
        }
    }

    // =========================================================================
    // The pass pipeline
    // =========================================================================

    fn run_unit(&mut self, name: &str, source: String, base_dir: &Path) -> CompiledUnit {
        info!(module = name, "compiling");
        let include_dir = base_dir.to_path_buf();
        let loader = Box::new(move |path: &str| {
            let resolved = include_dir.join(path);
            let contents = std::fs::read_to_string(&resolved).ok()?;
            Some((resolved.display().to_string(), contents))
        });
        let (mut arena, root) = {
            let mut parser = ParserState::with_loader(
                &mut self.strings,
                &mut self.log,
                name,
                source,
                loader,
            );
            let root = parser.parse_program();
            (parser.into_arena(), root)
        };

        self.preprocessor
            .run(&mut self.strings, &mut self.log, &arena, root);
        let module_exports = self.resolve_imports(&arena, root, base_dir);

        // Early bind passes feed the evaluator and the shaker; the final
        // pass re-reports their diagnostics, so these go to a scratch log.
        let bind_a = self.bind_scratch(&mut arena, root);
        self.evaluate(&mut arena, root, &bind_a, &module_exports);

        let bind_b = self.bind_scratch(&mut arena, root);
        {
            let mut scratch = Log::new();
            let shake_options = ShakeOptions {
                test_mode: self.options.test_mode,
                trace_exceptions: self.options.trace_exceptions,
            };
            Shaker::new(
                &mut self.strings,
                &mut scratch,
                &mut arena,
                &bind_b,
                shake_options,
            )
            .shake_program(root);
        }
        self.expand_plugin_macros(&mut arena, root, &bind_b);

        // The final bind and the checker report for real.
        let bindings = self.bind_into_log(&mut arena, root);
        let module = self.check(&mut arena, root, &bindings, module_exports);

        let mangled = Simplifier::new(
            &mut self.strings,
            &mut arena,
            &module.node_types,
            &self.types,
        )
        .simplify_program(root);

        CompiledUnit {
            arena,
            root,
            module,
            mangled,
        }
    }

    fn bind_scratch(&mut self, arena: &mut NodeArena, root: NodeIndex) -> BindResult {
        let mut scratch = Log::new();
        BinderState::new(&mut self.strings, &mut scratch, arena)
            .with_builtins(self.builtin_atoms.clone())
            .bind_program(root)
    }

    fn bind_into_log(&mut self, arena: &mut NodeArena, root: NodeIndex) -> BindResult {
        BinderState::new(&mut self.strings, &mut self.log, arena)
            .with_builtins(self.builtin_atoms.clone())
            .bind_program(root)
    }

    fn evaluate(
        &mut self,
        arena: &mut NodeArena,
        root: NodeIndex,
        bindings: &BindResult,
        module_exports: &FxHashMap<NodeIndex, TypeId>,
    ) {
        let mut ctx = CheckerContext::new(
            &mut self.strings,
            &mut self.log,
            arena,
            &mut self.types,
            bindings,
            CheckerOptions {
                test_mode: self.options.test_mode,
            },
        );
        match self.exception_type {
            Some(shared) => ctx.exception_type = shared,
            None => self.exception_type = Some(ctx.exception_type),
        }
        ctx.defines = self.preprocessor.defined_symbols();
        ctx.module_exports = module_exports.clone();
        let mut state = CheckerState::new(&mut ctx);
        state.evaluate_comptime(root);
    }

    fn check(
        &mut self,
        arena: &mut NodeArena,
        root: NodeIndex,
        bindings: &BindResult,
        module_exports: FxHashMap<NodeIndex, TypeId>,
    ) -> CheckedModule {
        let mut ctx = CheckerContext::new(
            &mut self.strings,
            &mut self.log,
            arena,
            &mut self.types,
            bindings,
            CheckerOptions {
                test_mode: self.options.test_mode,
            },
        );
        match self.exception_type {
            Some(shared) => ctx.exception_type = shared,
            None => self.exception_type = Some(ctx.exception_type),
        }
        ctx.defines = self.preprocessor.defined_symbols();
        ctx.module_exports = module_exports;
        let mut state = CheckerState::new(&mut ctx);
        state.evaluate_comptime(root);
        state.check_program(root)
    }

    // =========================================================================
    // Imports
    // =========================================================================

    /// Recursively compile imported modules; load plugin imports. Returns
    /// the import-declaration to module-type map the checker consumes.
    fn resolve_imports(
        &mut self,
        arena: &NodeArena,
        root: NodeIndex,
        base_dir: &Path,
    ) -> FxHashMap<NodeIndex, TypeId> {
        let imports = match arena.kind(root) {
            AstKind::Program { imports, .. } => imports.clone(),
            _ => return FxHashMap::default(),
        };
        struct PendingImport {
            node: NodeIndex,
            path: String,
            alias: Option<Atom>,
            is_plugin: bool,
            loc: FileLoc,
        }
        let mut pending = Vec::new();
        for import in imports {
            if let AstKind::ImportDecl {
                path,
                alias,
                is_plugin,
                ..
            } = arena.kind(import)
            {
                if let AstKind::StringLit { raw } = arena.kind(*path) {
                    pending.push(PendingImport {
                        node: import,
                        path: self.strings.resolve(*raw).to_string(),
                        alias: *alias,
                        is_plugin: *is_plugin,
                        loc: arena.loc(import),
                    });
                }
            }
        }

        let mut exports = FxHashMap::default();
        for import in pending {
            if import.is_plugin {
                let Some(alias) = import.alias else {
                    self.log
                        .error(import.loc, "a plugin import needs an 'as' alias");
                    continue;
                };
                let mut resolved = base_dir.join(&import.path);
                if !resolved.exists() {
                    if let Some(dir) = &self.options.plugins_dir {
                        resolved = dir.join(&import.path);
                    }
                }
                // Plugins register actions but export no module type.
                self.load_plugin(import.loc, alias, &resolved);
                continue;
            }
            debug!(path = %import.path, "resolving import");
            let resolved = base_dir.join(&import.path);
            let exported = self.compile_module(&resolved, import.loc);
            exports.insert(import.node, exported);
        }
        exports
    }

    fn load_plugin(&mut self, loc: FileLoc, alias: Atom, path: &Path) -> bool {
        if self.plugins.is_loaded(alias) {
            return true;
        }
        self.plugins
            .load(&mut self.strings, &mut self.log, loc, alias, path)
    }

    /// Expand `pluginName.action!(...)` macro calls through the registry.
    /// Actions construct replacement nodes in the shared arena.
    fn expand_plugin_macros(
        &mut self,
        arena: &mut NodeArena,
        _root: NodeIndex,
        bindings: &BindResult,
    ) {
        let mut sites = Vec::new();
        for idx in arena.indices() {
            let AstKind::MacroCallExpr { callee, args } = arena.kind(idx) else {
                continue;
            };
            let AstKind::Path { elements } = arena.kind(*callee) else {
                continue;
            };
            if elements.len() != 2 {
                continue;
            }
            let Some(decl) = bindings.resolution_of(*callee) else {
                continue;
            };
            let AstKind::ImportDecl {
                is_plugin: true,
                alias: Some(alias),
                ..
            } = arena.kind(decl)
            else {
                continue;
            };
            let action = match arena.kind(elements[1]) {
                AstKind::PathElement { name, .. } => *name,
                _ => continue,
            };
            sites.push((idx, *alias, action, args.clone(), arena.loc(idx)));
        }
        for (site, alias, action, args, loc) in sites {
            let produced = self.plugins.dispatch(
                &mut self.strings,
                &mut self.log,
                arena,
                loc,
                alias,
                action,
                &args,
            );
            if let Some(produced) = produced {
                let node = arena.get(produced).clone();
                arena.replace(site, node.kind);
                arena.get_mut(site).flags = node.flags;
            } else {
                arena.replace(site, AstKind::Error);
            }
        }
    }
}
