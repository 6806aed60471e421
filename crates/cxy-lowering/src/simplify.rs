//! The simplifier: post-check lowering.
//!
//! - **Defer materialization**: every block's deferred expressions are
//!   copied (deep clones, so each site owns its nodes) in reverse
//!   registration order before each `return`, `break`, `continue`, and at
//!   natural fallthrough. The `DeferStmt` nodes themselves are removed.
//! - **Name mangling**: overloaded functions, methods and generated
//!   instantiations get unique linker names incorporating their owner and
//!   parameter types.

use cxy_common::{Atom, Interner};
use cxy_parser::{AstKind, NodeArena, NodeFlags, NodeIndex, NodeList};
use cxy_types::{TypeId, TypeTable};
use rustc_hash::FxHashMap;
use tracing::debug;

/// Output of the simplify pass.
#[derive(Debug, Default)]
pub struct SimplifyResult {
    /// Function declaration -> unique linker name.
    pub mangled_names: FxHashMap<NodeIndex, Atom>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameKind {
    /// Function body boundary: returns unwind to here.
    Function,
    /// Loop body boundary: break/continue unwind to here.
    Loop,
    Plain,
}

struct DeferFrame {
    kind: FrameKind,
    defers: Vec<NodeIndex>,
}

pub struct Simplifier<'a> {
    strings: &'a mut Interner,
    arena: &'a mut NodeArena,
    node_types: &'a FxHashMap<NodeIndex, TypeId>,
    types: &'a TypeTable,
    result: SimplifyResult,
    frames: Vec<DeferFrame>,
}

impl<'a> Simplifier<'a> {
    pub fn new(
        strings: &'a mut Interner,
        arena: &'a mut NodeArena,
        node_types: &'a FxHashMap<NodeIndex, TypeId>,
        types: &'a TypeTable,
    ) -> Self {
        Simplifier {
            strings,
            arena,
            node_types,
            types,
            result: SimplifyResult::default(),
            frames: Vec::new(),
        }
    }

    pub fn simplify_program(mut self, root: NodeIndex) -> SimplifyResult {
        debug!("simplifying program");
        let decls = match self.arena.kind(root) {
            AstKind::Program { decls, .. } => decls.clone(),
            other => unreachable!("simplifying a non-program root {other:?}"),
        };
        for &decl in &decls {
            self.simplify_decl(decl, None);
        }
        self.mangle_overloads(&decls, None);
        self.strip_comptime_flags(root);
        self.result
    }

    // =========================================================================
    // Defer materialization
    // =========================================================================

    fn simplify_decl(&mut self, decl: NodeIndex, owner: Option<Atom>) {
        match self.arena.kind(decl).clone() {
            AstKind::FuncDecl { body: Some(body), .. } => {
                self.frames.push(DeferFrame {
                    kind: FrameKind::Function,
                    defers: Vec::new(),
                });
                self.simplify_block(body);
                self.frames.pop();
            }
            AstKind::StructDecl { name, members, .. }
            | AstKind::ClassDecl { name, members, .. }
            | AstKind::InterfaceDecl { name, members, .. } => {
                for member in members.clone() {
                    self.simplify_decl(member, Some(name));
                }
                self.mangle_overloads(&members, Some(name));
            }
            AstKind::VarDecl { init: Some(init), .. } => {
                if let AstKind::Block { .. } = self.arena.kind(init) {
                    self.simplify_block(init);
                }
            }
            _ => {}
        }
        let _ = owner;
    }

    fn simplify_block(&mut self, block: NodeIndex) {
        let stmts = match self.arena.kind(block) {
            AstKind::Block { stmts } => stmts.clone(),
            _ => return,
        };
        self.frames.push(DeferFrame {
            kind: FrameKind::Plain,
            defers: Vec::new(),
        });
        let mut out: NodeList = Vec::with_capacity(stmts.len());
        let mut terminated = false;
        for stmt in stmts {
            match self.arena.kind(stmt).clone() {
                AstKind::DeferStmt { expr } => {
                    self.frames
                        .last_mut()
                        .expect("frame stack")
                        .defers
                        .push(expr);
                    self.arena.clear_to_noop(stmt);
                }
                AstKind::ReturnStmt { .. } => {
                    self.emit_defers_until(FrameKind::Function, &mut out);
                    out.push(stmt);
                    terminated = true;
                    break;
                }
                AstKind::BreakStmt | AstKind::ContinueStmt => {
                    self.emit_defers_until(FrameKind::Loop, &mut out);
                    out.push(stmt);
                    terminated = true;
                    break;
                }
                AstKind::Noop => {}
                _ => {
                    self.simplify_stmt(stmt);
                    out.push(stmt);
                }
            }
        }
        if !terminated {
            self.emit_frame_defers(self.frames.len() - 1, &mut out);
        }
        self.frames.pop();
        if let AstKind::Block { stmts } = &mut self.arena.get_mut(block).kind {
            *stmts = out;
        }
    }

    fn simplify_stmt(&mut self, stmt: NodeIndex) {
        match self.arena.kind(stmt).clone() {
            AstKind::Block { .. } => self.simplify_block(stmt),
            AstKind::IfStmt {
                then, otherwise, ..
            } => {
                self.simplify_block(then);
                if let Some(otherwise) = otherwise {
                    self.simplify_stmt(otherwise);
                }
            }
            AstKind::WhileStmt { body, .. } | AstKind::ForStmt { body, .. } => {
                self.frames.push(DeferFrame {
                    kind: FrameKind::Loop,
                    defers: Vec::new(),
                });
                self.simplify_block(body);
                self.frames.pop();
            }
            AstKind::MatchStmt { arms, .. } => {
                for arm in arms {
                    if let AstKind::MatchArm { body, .. } = self.arena.kind(arm) {
                        let body = *body;
                        self.simplify_block(body);
                    }
                }
            }
            AstKind::FuncDecl { .. } => self.simplify_decl(stmt, None),
            AstKind::VarDecl { init: Some(init), .. } => {
                if matches!(self.arena.kind(init), AstKind::Block { .. }) {
                    self.simplify_block(init);
                }
            }
            _ => {}
        }
    }

    /// Clone and emit the defers of every frame from the innermost up to and
    /// including the first frame of `boundary` kind.
    fn emit_defers_until(&mut self, boundary: FrameKind, out: &mut NodeList) {
        let mut level = self.frames.len();
        while level > 0 {
            level -= 1;
            self.emit_frame_defers(level, out);
            if self.frames[level].kind == boundary || self.frames[level].kind == FrameKind::Function
            {
                break;
            }
        }
    }

    fn emit_frame_defers(&mut self, level: usize, out: &mut NodeList) {
        let defers = self.frames[level].defers.clone();
        // Reverse order: last registered runs first.
        for &deferred in defers.iter().rev() {
            let clone = self.arena.deep_clone(deferred);
            let loc = self.arena.loc(clone);
            if matches!(self.arena.kind(clone), AstKind::Block { .. }) {
                out.push(clone);
            } else {
                out.push(self.arena.alloc_flagged(
                    AstKind::ExprStmt { expr: clone },
                    loc,
                    NodeFlags::GENERATED,
                ));
            }
        }
    }

    // =========================================================================
    // Name mangling
    // =========================================================================

    /// Give unique linker names to overloaded functions, methods, and
    /// generated instantiations within one declaration list.
    fn mangle_overloads(&mut self, decls: &[NodeIndex], owner: Option<Atom>) {
        let mut by_name: FxHashMap<Atom, Vec<NodeIndex>> = FxHashMap::default();
        for &decl in decls {
            if let AstKind::FuncDecl { name, .. } = self.arena.kind(decl) {
                by_name.entry(*name).or_default().push(decl);
            }
        }
        for (name, funcs) in by_name {
            let needs_mangle =
                funcs.len() > 1 || owner.is_some() || funcs.iter().any(|&f| {
                    self.arena.flags(f).contains(NodeFlags::GENERATED)
                });
            if !needs_mangle {
                continue;
            }
            for &func in &funcs {
                let mangled = self.mangle_func(func, name, owner);
                let atom = self.strings.intern(&mangled);
                self.result.mangled_names.insert(func, atom);
            }
        }
    }

    fn mangle_func(&mut self, func: NodeIndex, name: Atom, owner: Option<Atom>) -> String {
        let mut out = String::from("cxy");
        if let Some(owner) = owner {
            out.push('_');
            out.push_str(&sanitize(self.strings.resolve(owner)));
        }
        out.push('_');
        out.push_str(&sanitize(self.strings.resolve(name)));
        if let AstKind::FuncDecl { params, .. } = self.arena.kind(func).clone() {
            for param in params {
                let abbrev = match self.node_types.get(&param) {
                    Some(&ty) => type_abbrev(self.types, ty),
                    None => "x".to_string(),
                };
                out.push('_');
                out.push_str(&abbrev);
            }
        }
        out
    }

    // =========================================================================
    // Final sweeps
    // =========================================================================

    /// After evaluation and lowering no node may keep the comptime flag.
    fn strip_comptime_flags(&mut self, root: NodeIndex) {
        let _ = root;
        for idx in self.arena.indices().collect::<Vec<_>>() {
            let flags = self.arena.flags(idx);
            if flags.contains(NodeFlags::COMPTIME) {
                self.arena.get_mut(idx).flags = flags - NodeFlags::COMPTIME;
            }
        }
    }
}

fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// Short stable abbreviation of a type for linker names.
fn type_abbrev(types: &TypeTable, ty: TypeId) -> String {
    use cxy_types::Type;
    match types.get(types.resolve(ty)) {
        Type::Error => "err".into(),
        Type::Auto => "a".into(),
        Type::Void => "v".into(),
        Type::Null => "n".into(),
        Type::Primitive(kind) => kind.name().into(),
        Type::String => "s".into(),
        Type::Pointer { pointee, is_const } => {
            let inner = type_abbrev(types, *pointee);
            if *is_const {
                format!("Pc{inner}")
            } else {
                format!("P{inner}")
            }
        }
        Type::Reference { referred, is_const } => {
            let inner = type_abbrev(types, *referred);
            if *is_const {
                format!("Rc{inner}")
            } else {
                format!("R{inner}")
            }
        }
        Type::Optional { target } => format!("O{}", type_abbrev(types, *target)),
        Type::Array { element, len } => match len {
            Some(n) => format!("A{n}{}", type_abbrev(types, *element)),
            None => format!("S{}", type_abbrev(types, *element)),
        },
        Type::Tuple { elements } => {
            let mut out = format!("T{}", elements.len());
            for &e in elements {
                out.push_str(&type_abbrev(types, e));
            }
            out
        }
        Type::Union { members } => {
            let mut out = format!("U{}", members.len());
            for &m in members {
                out.push_str(&type_abbrev(types, m));
            }
            out
        }
        Type::Func { params, .. } => format!("F{}", params.len()),
        other => match other.name() {
            Some(_) => "N".into(),
            None => "x".into(),
        },
    }
}
