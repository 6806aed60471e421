//! The preprocessor.
//!
//! A tiny evaluator over top-level attribute directives: `@define` feeds a
//! symbol table (queried by `defined(X)` in comptime conditions), and the
//! `@cBuild` family collects native sources and link libraries for the
//! backend. Its symbol table is separate from the module environment;
//! values are simple literal nodes.

use cxy_common::{Atom, Interner, Log, WarningId};
use cxy_parser::{AstKind, NodeArena, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Default)]
pub struct Preprocessor {
    /// `@define` symbols and their optional literal values.
    symbols: FxHashMap<Atom, Option<NodeIndex>>,
    /// Native C sources collected from `@cBuild(":src", ...)`.
    pub native_sources: Vec<String>,
    /// Libraries collected from `@cBuild(":clib", ...)`.
    pub link_libraries: Vec<String>,
}

impl Preprocessor {
    pub fn new() -> Self {
        Preprocessor::default()
    }

    pub fn is_defined(&self, symbol: Atom) -> bool {
        self.symbols.contains_key(&symbol)
    }

    pub fn defined_symbols(&self) -> FxHashSet<Atom> {
        self.symbols.keys().copied().collect()
    }

    /// Consume the directive attributes of one parsed unit.
    pub fn run(
        &mut self,
        strings: &mut Interner,
        log: &mut Log,
        arena: &NodeArena,
        root: NodeIndex,
    ) {
        let decls = match arena.kind(root) {
            AstKind::Program { decls, .. } => decls.clone(),
            _ => return,
        };
        for decl in decls {
            let AstKind::Attr { name, args } = arena.kind(decl) else {
                continue;
            };
            let text = strings.resolve(*name).to_string();
            match text.as_str() {
                "define" => self.handle_define(strings, log, arena, decl, args),
                "cDefine" => {
                    // C-side defines pass straight through to the backend.
                    if let Some(value) = args.first().and_then(|&a| string_arg(arena, a)) {
                        let text = strings.resolve(value).to_string();
                        let symbol = strings.intern(&text);
                        if self.symbols.insert(symbol, args.get(1).copied()).is_some() {
                            log.warning_with_id(
                                WarningId::CMacroRedefine,
                                arena.loc(decl),
                                format!("macro '{}' redefined", strings.resolve(symbol)),
                            );
                        }
                    }
                }
                "cBuild" | "cSources" | "cInclude" => {
                    self.handle_c_build(strings, log, arena, decl, args);
                }
                _ => {}
            }
        }
    }

    fn handle_define(
        &mut self,
        strings: &mut Interner,
        log: &mut Log,
        arena: &NodeArena,
        decl: NodeIndex,
        args: &[NodeIndex],
    ) {
        let Some(&first) = args.first() else {
            log.error(arena.loc(decl), "@define needs a symbol name");
            return;
        };
        let symbol = match arena.kind(first) {
            AstKind::Path { elements } => elements.first().and_then(|&e| {
                match arena.kind(e) {
                    AstKind::PathElement { name, .. } => Some(*name),
                    _ => None,
                }
            }),
            AstKind::Identifier { name } => Some(*name),
            AstKind::StringLit { raw } => {
                let text = strings.resolve(*raw).to_string();
                Some(strings.intern(&text))
            }
            _ => None,
        };
        let Some(symbol) = symbol else {
            log.error(arena.loc(first), "@define needs a symbol name");
            return;
        };
        let value = args.get(1).copied();
        if self.symbols.insert(symbol, value).is_some() {
            log.warning_with_id(
                WarningId::CMacroRedefine,
                arena.loc(decl),
                format!("symbol '{}' redefined", strings.resolve(symbol)),
            );
        }
    }

    /// `@cBuild(":src", "file.c")` / `@cBuild(":clib", "m")`.
    fn handle_c_build(
        &mut self,
        strings: &Interner,
        log: &mut Log,
        arena: &NodeArena,
        decl: NodeIndex,
        args: &[NodeIndex],
    ) {
        let Some(kind) = args.first().and_then(|&a| string_arg(arena, a)) else {
            log.error(arena.loc(decl), "@cBuild needs a kind string");
            return;
        };
        let kind_text = strings.resolve(kind).to_string();
        for &arg in &args[1..] {
            let Some(value) = string_arg(arena, arg) else {
                log.error(arena.loc(arg), "@cBuild arguments must be string literals");
                continue;
            };
            let value = strings.resolve(value).to_string();
            match kind_text.as_str() {
                ":src" => self.native_sources.push(value),
                ":clib" => self.link_libraries.push(value),
                other => {
                    log.error(
                        arena.loc(arg),
                        format!("unknown @cBuild kind '{other}'"),
                    );
                    break;
                }
            }
        }
    }
}

fn string_arg(arena: &NodeArena, node: NodeIndex) -> Option<Atom> {
    match arena.kind(node) {
        AstKind::StringLit { raw } => Some(*raw),
        _ => None,
    }
}
