//! Binder - name resolution and capture analysis.
//!
//! Walks the AST with a scope stack, decorating paths and identifiers with
//! the declaration they resolve to, recording back-references for
//! `break`/`continue`/`return`/`defer`, and building closure capture sets.
//! Results live in side tables keyed by `NodeIndex`; the only AST mutation
//! is the rewrite of captured references to `this.<name>`.
//!
//! The pass is idempotent: the driver re-runs it after lowering passes
//! synthesize new nodes.

use crate::scope::{LookupHit, ScopeFrame, ScopeKind};
use crate::suggest::best_suggestion;
use cxy_common::{Atom, Interner, Log};
use cxy_parser::{AstKind, NodeArena, NodeFlags, NodeIndex};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tracing::{debug, trace};

/// One captured variable of a closure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capture {
    pub name: Atom,
    /// The captured declaration in the enclosing function.
    pub decl: NodeIndex,
}

/// Side tables produced by a bind pass.
#[derive(Debug, Default)]
pub struct BindResult {
    /// Path/identifier node -> resolved declaration.
    pub resolved: FxHashMap<NodeIndex, NodeIndex>,
    /// Path node -> full overload chain, when the name binds more than once.
    pub overload_chains: FxHashMap<NodeIndex, Vec<NodeIndex>>,
    /// Node -> owning scope node (enclosing declaration or block).
    pub parents: FxHashMap<NodeIndex, NodeIndex>,
    /// break/continue -> loop, return -> function, defer -> block.
    pub jump_targets: FxHashMap<NodeIndex, NodeIndex>,
    /// Closure expression -> ordered capture set.
    pub captures: FxHashMap<NodeIndex, Vec<Capture>>,
    /// `this`/`super`/`This` reference -> enclosing aggregate declaration.
    pub enclosing_class: FxHashMap<NodeIndex, NodeIndex>,
}

impl BindResult {
    pub fn resolution_of(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.resolved.get(&node).copied()
    }
}

pub struct BinderState<'a> {
    pub strings: &'a mut Interner,
    pub log: &'a mut Log,
    pub arena: &'a mut NodeArena,
    scopes: Vec<ScopeFrame>,
    result: BindResult,
    /// Names the runtime/prelude provides; references to them never error.
    builtins: FxHashSet<Atom>,
    comptime_depth: u32,
    test_depth: u32,
}

impl<'a> BinderState<'a> {
    pub fn new(strings: &'a mut Interner, log: &'a mut Log, arena: &'a mut NodeArena) -> Self {
        BinderState {
            strings,
            log,
            arena,
            scopes: Vec::new(),
            result: BindResult::default(),
            builtins: FxHashSet::default(),
            comptime_depth: 0,
            test_depth: 0,
        }
    }

    /// Register prelude/runtime names that resolve outside this unit.
    pub fn with_builtins(mut self, names: impl IntoIterator<Item = Atom>) -> Self {
        self.builtins.extend(names);
        self
    }

    /// Bind a whole program and return the side tables.
    pub fn bind_program(mut self, root: NodeIndex) -> BindResult {
        debug!("binding program");
        self.scopes.push(ScopeFrame::new(ScopeKind::Module, root));
        let (imports, decls) = match self.arena.kind(root) {
            AstKind::Program { imports, decls, .. } => (imports.clone(), decls.clone()),
            other => unreachable!("binding a non-program root {other:?}"),
        };
        // Imports and top-level declarations are pre-registered so
        // declarations can refer to each other regardless of order.
        for &import in &imports {
            self.declare_import(import);
        }
        for &decl in &decls {
            self.predeclare(decl);
        }
        for &decl in &decls {
            self.note_parent(decl, root);
            self.bind_decl(decl);
        }
        self.scopes.pop();
        self.result
    }

    // =========================================================================
    // Scope helpers
    // =========================================================================

    fn push_scope(&mut self, kind: ScopeKind, owner: NodeIndex) {
        self.scopes.push(ScopeFrame::new(kind, owner));
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn current_owner(&self) -> NodeIndex {
        self.scopes.last().expect("scope stack is never empty").owner
    }

    fn note_parent(&mut self, node: NodeIndex, owner: NodeIndex) {
        self.result.parents.insert(node, owner);
    }

    fn define(&mut self, name: Atom, decl: NodeIndex) {
        let overloadable = matches!(self.arena.kind(decl), AstKind::FuncDecl { .. });
        let frame = self.scopes.last_mut().expect("scope stack is never empty");
        if let Some(previous) = frame.define(name, decl, overloadable) {
            let text = self.strings.resolve(name).to_string();
            let loc = self.arena.loc(decl);
            let previous_loc = self.arena.loc(previous);
            self.log
                .error(loc, format!("symbol '{text}' is already defined in this scope"));
            self.log.note(previous_loc, "previous definition is here");
        }
    }

    fn lookup(&self, name: Atom) -> Option<LookupHit> {
        let mut crossed: SmallVec<[NodeIndex; 2]> = SmallVec::new();
        for frame in self.scopes.iter().rev() {
            if let Some(chain) = frame.lookup(name) {
                return Some(LookupHit {
                    decl: chain[0],
                    chain: chain.iter().copied().collect(),
                    crossed_closures: crossed,
                    defined_in: frame.kind,
                });
            }
            if frame.kind == ScopeKind::Closure {
                crossed.push(frame.owner);
            }
        }
        None
    }

    fn find_scope(&self, wanted: &[ScopeKind]) -> Option<NodeIndex> {
        self.scopes
            .iter()
            .rev()
            .find(|frame| wanted.contains(&frame.kind))
            .map(|frame| frame.owner)
    }

    fn all_visible_names(&self) -> Vec<Atom> {
        let mut names = Vec::new();
        for frame in &self.scopes {
            names.extend(frame.names());
        }
        names
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    fn declare_import(&mut self, import: NodeIndex) {
        let (entities, alias) = match self.arena.kind(import) {
            AstKind::ImportDecl {
                entities, alias, ..
            } => (entities.clone(), *alias),
            _ => return,
        };
        if let Some(alias) = alias {
            self.define(alias, import);
        }
        for entity in entities {
            if let AstKind::ImportEntity { name, alias } = self.arena.kind(entity) {
                let bind_name = alias.unwrap_or(*name);
                self.define(bind_name, entity);
            }
        }
    }

    fn predeclare(&mut self, decl: NodeIndex) {
        if let Some(name) = self.arena.kind(decl).decl_name() {
            self.define(name, decl);
            return;
        }
        match self.arena.kind(decl) {
            AstKind::VarDecl { names, .. } => {
                for &ident in &names.clone() {
                    if let AstKind::Identifier { name } = self.arena.kind(ident) {
                        self.define(*name, decl);
                    }
                }
            }
            AstKind::TestDecl { .. } | AstKind::Attr { .. } | AstKind::IfStmt { .. } => {}
            _ => {}
        }
    }

    fn bind_decl(&mut self, decl: NodeIndex) {
        let comptime = self.arena.flags(decl).contains(NodeFlags::COMPTIME);
        if comptime {
            self.comptime_depth += 1;
        }
        match self.arena.kind(decl).clone() {
            AstKind::FuncDecl {
                generic_params,
                params,
                ret,
                body,
                ..
            } => {
                self.push_scope(ScopeKind::Function, decl);
                for &gp in &generic_params {
                    self.note_parent(gp, decl);
                    if let Some(name) = self.arena.kind(gp).decl_name() {
                        self.define(name, gp);
                    }
                    self.bind_children_of(gp, decl);
                }
                for &param in &params {
                    self.note_parent(param, decl);
                    if let Some(name) = self.arena.kind(param).decl_name() {
                        self.define(name, param);
                    }
                    self.bind_children_of(param, decl);
                }
                if let Some(ret) = ret {
                    self.bind_type(ret, decl);
                }
                if let Some(body) = body {
                    self.bind_stmt(body, decl);
                }
                self.pop_scope();
            }
            AstKind::VarDecl { names, ty, init } => {
                // The initializer binds before the names so `var x = x`
                // resolves outward.
                if let Some(ty) = ty {
                    self.bind_type(ty, decl);
                }
                if let Some(init) = init {
                    self.bind_expr(init, decl);
                }
                if !self.arena.flags(decl).contains(NodeFlags::TOP_LEVEL_DECL) {
                    for &ident in &names {
                        if let AstKind::Identifier { name } = self.arena.kind(ident) {
                            let name = *name;
                            self.define(name, decl);
                        }
                    }
                }
            }
            AstKind::StructDecl {
                generic_params,
                members,
                ..
            }
            | AstKind::InterfaceDecl {
                generic_params,
                members,
                ..
            } => {
                self.bind_aggregate(decl, &generic_params, None, &[], &members);
            }
            AstKind::ClassDecl {
                generic_params,
                base,
                interfaces,
                members,
                ..
            } => {
                self.bind_aggregate(decl, &generic_params, base, &interfaces, &members);
            }
            AstKind::EnumDecl { base, options, .. } => {
                if let Some(base) = base {
                    self.bind_type(base, decl);
                }
                for &option in &options {
                    self.note_parent(option, decl);
                    if let AstKind::EnumOption {
                        value: Some(value), ..
                    } = self.arena.kind(option)
                    {
                        let value = *value;
                        self.bind_expr(value, decl);
                    }
                }
            }
            AstKind::TypeDecl {
                generic_params,
                aliased,
                ..
            } => {
                self.push_scope(ScopeKind::Function, decl);
                for &gp in &generic_params {
                    if let Some(name) = self.arena.kind(gp).decl_name() {
                        self.define(name, gp);
                    }
                }
                if let Some(aliased) = aliased {
                    self.bind_type(aliased, decl);
                }
                self.pop_scope();
            }
            AstKind::ExceptionDecl { params, body, .. } => {
                self.push_scope(ScopeKind::Function, decl);
                for &param in &params {
                    self.note_parent(param, decl);
                    if let Some(name) = self.arena.kind(param).decl_name() {
                        self.define(name, param);
                    }
                    self.bind_children_of(param, decl);
                }
                self.bind_stmt(body, decl);
                self.pop_scope();
            }
            AstKind::MacroDecl { params, body, .. } => {
                self.comptime_depth += 1;
                self.push_scope(ScopeKind::Function, decl);
                for &param in &params {
                    if let Some(name) = self.arena.kind(param).decl_name() {
                        self.define(name, param);
                    }
                }
                self.bind_expr(body, decl);
                self.pop_scope();
                self.comptime_depth -= 1;
            }
            AstKind::TestDecl { body, .. } => {
                self.test_depth += 1;
                self.push_scope(ScopeKind::Function, decl);
                self.bind_stmt(body, decl);
                self.pop_scope();
                self.test_depth -= 1;
            }
            AstKind::IfStmt { .. } => {
                // A comptime `#if` in declaration position.
                self.bind_stmt(decl, self.current_owner());
            }
            AstKind::Attr { .. } | AstKind::ImportDecl { .. } | AstKind::Noop | AstKind::Error => {}
            _ => {
                let owner = self.current_owner();
                self.bind_stmt(decl, owner);
            }
        }
        if comptime {
            self.comptime_depth -= 1;
        }
    }

    fn bind_aggregate(
        &mut self,
        decl: NodeIndex,
        generic_params: &[NodeIndex],
        base: Option<NodeIndex>,
        interfaces: &[NodeIndex],
        members: &[NodeIndex],
    ) {
        if let Some(base) = base {
            self.bind_type(base, decl);
        }
        for &interface in interfaces {
            self.bind_type(interface, decl);
        }
        self.push_scope(ScopeKind::Aggregate, decl);
        for &gp in generic_params {
            self.note_parent(gp, decl);
            if let Some(name) = self.arena.kind(gp).decl_name() {
                self.define(name, gp);
            }
        }
        // Members are pre-registered so methods see fields declared after
        // them.
        for &member in members {
            self.note_parent(member, decl);
            self.predeclare(member);
        }
        for &member in members {
            self.bind_decl(member);
        }
        self.pop_scope();
    }

    /// Bind the non-name children of a simple declaration (parameter types
    /// and defaults).
    fn bind_children_of(&mut self, node: NodeIndex, owner: NodeIndex) {
        match self.arena.kind(node).clone() {
            AstKind::FuncParam { ty, default, .. } => {
                if let Some(ty) = ty {
                    self.bind_type(ty, owner);
                }
                if let Some(default) = default {
                    self.bind_expr(default, owner);
                }
            }
            AstKind::GenericParam {
                constraints,
                default,
                ..
            } => {
                for constraint in constraints {
                    self.bind_type(constraint, owner);
                }
                if let Some(default) = default {
                    self.bind_type(default, owner);
                }
            }
            _ => {}
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn bind_stmt(&mut self, stmt: NodeIndex, owner: NodeIndex) {
        self.note_parent(stmt, owner);
        let comptime = self.arena.flags(stmt).contains(NodeFlags::COMPTIME);
        if comptime {
            self.comptime_depth += 1;
        }
        match self.arena.kind(stmt).clone() {
            AstKind::Block { stmts } => {
                self.push_scope(ScopeKind::Block, stmt);
                for &child in &stmts {
                    if self.arena.kind(child).is_declaration()
                        && !matches!(self.arena.kind(child), AstKind::VarDecl { .. })
                    {
                        // Local funcs/types are hoisted within the block.
                        self.predeclare(child);
                    }
                }
                for &child in &stmts {
                    match self.arena.kind(child) {
                        AstKind::VarDecl { .. }
                        | AstKind::FuncDecl { .. }
                        | AstKind::TypeDecl { .. }
                        | AstKind::StructDecl { .. }
                        | AstKind::ClassDecl { .. } => {
                            self.note_parent(child, stmt);
                            self.bind_decl(child);
                        }
                        _ => self.bind_stmt(child, stmt),
                    }
                }
                self.pop_scope();
            }
            AstKind::ExprStmt { expr } => self.bind_expr(expr, stmt),
            AstKind::ReturnStmt { value } => {
                if let Some(value) = value {
                    self.bind_expr(value, stmt);
                }
                match self.find_scope(&[ScopeKind::Function, ScopeKind::Closure]) {
                    Some(target) => {
                        self.result.jump_targets.insert(stmt, target);
                    }
                    None => {
                        let loc = self.arena.loc(stmt);
                        self.log.error(loc, "'return' outside of a function");
                    }
                }
            }
            AstKind::BreakStmt | AstKind::ContinueStmt => {
                match self.find_scope(&[ScopeKind::Loop]) {
                    Some(target) => {
                        self.result.jump_targets.insert(stmt, target);
                    }
                    None => {
                        let loc = self.arena.loc(stmt);
                        let what = if matches!(self.arena.kind(stmt), AstKind::BreakStmt) {
                            "break"
                        } else {
                            "continue"
                        };
                        self.log
                            .error(loc, format!("'{what}' outside of a loop"));
                    }
                }
            }
            AstKind::DeferStmt { expr } => {
                self.bind_expr(expr, stmt);
                if let Some(target) = self.find_scope(&[ScopeKind::Block]) {
                    self.result.jump_targets.insert(stmt, target);
                }
            }
            AstKind::YieldStmt { value } | AstKind::RaiseStmt { value } => {
                self.bind_expr(value, stmt);
            }
            AstKind::IfStmt {
                cond,
                then,
                otherwise,
            } => {
                // A var-declaration condition scopes over both branches.
                self.push_scope(ScopeKind::Block, stmt);
                if matches!(self.arena.kind(cond), AstKind::VarDecl { .. }) {
                    self.note_parent(cond, stmt);
                    self.bind_decl(cond);
                } else {
                    self.bind_expr(cond, stmt);
                }
                self.bind_stmt(then, stmt);
                if let Some(otherwise) = otherwise {
                    self.bind_stmt(otherwise, stmt);
                }
                self.pop_scope();
            }
            AstKind::WhileStmt { cond, body } => {
                self.push_scope(ScopeKind::Loop, stmt);
                if matches!(self.arena.kind(cond), AstKind::VarDecl { .. }) {
                    self.note_parent(cond, stmt);
                    self.bind_decl(cond);
                } else {
                    self.bind_expr(cond, stmt);
                }
                self.bind_stmt(body, stmt);
                self.pop_scope();
            }
            AstKind::ForStmt { var, range, body } => {
                self.bind_expr(range, stmt);
                self.push_scope(ScopeKind::Loop, stmt);
                self.note_parent(var, stmt);
                if let AstKind::VarDecl { names, .. } = self.arena.kind(var).clone() {
                    for ident in names {
                        if let AstKind::Identifier { name } = self.arena.kind(ident) {
                            let name = *name;
                            self.define(name, var);
                        }
                    }
                }
                self.bind_stmt(body, stmt);
                self.pop_scope();
            }
            AstKind::MatchStmt { scrutinee, arms } => {
                self.bind_expr(scrutinee, stmt);
                for arm in arms {
                    self.note_parent(arm, stmt);
                    if let AstKind::MatchArm {
                        patterns,
                        binding,
                        body,
                    } = self.arena.kind(arm).clone()
                    {
                        self.push_scope(ScopeKind::MatchArm, arm);
                        for pattern in patterns {
                            self.bind_expr(pattern, arm);
                        }
                        if let Some(name) = binding {
                            self.define(name, arm);
                        }
                        self.bind_stmt(body, arm);
                        self.pop_scope();
                    }
                }
            }
            AstKind::VarDecl { .. }
            | AstKind::FuncDecl { .. }
            | AstKind::StructDecl { .. }
            | AstKind::ClassDecl { .. }
            | AstKind::TypeDecl { .. } => {
                self.bind_decl(stmt);
            }
            AstKind::Noop | AstKind::Error => {}
            _ => self.bind_expr(stmt, owner),
        }
        if comptime {
            self.comptime_depth -= 1;
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn bind_expr(&mut self, expr: NodeIndex, owner: NodeIndex) {
        self.note_parent(expr, owner);
        let comptime = self.arena.flags(expr).contains(NodeFlags::COMPTIME);
        if comptime {
            self.comptime_depth += 1;
        }
        match self.arena.kind(expr).clone() {
            AstKind::Path { elements } => self.bind_path(expr, &elements),
            AstKind::Identifier { name } => {
                self.resolve_name(expr, name);
            }
            AstKind::MemberExpr { target, .. } => {
                // The member name resolves during checking, against the
                // target's type.
                self.bind_expr(target, expr);
            }
            AstKind::CallExpr { callee, args } | AstKind::MacroCallExpr { callee, args } => {
                self.bind_expr(callee, expr);
                for arg in args {
                    self.bind_expr(arg, expr);
                }
            }
            AstKind::IndexExpr { target, indices } => {
                self.bind_expr(target, expr);
                for index in indices {
                    self.bind_expr(index, expr);
                }
            }
            AstKind::UnaryExpr { operand, .. } => self.bind_expr(operand, expr),
            AstKind::BinaryExpr { op, lhs, rhs } => {
                self.bind_expr(lhs, expr);
                if op == cxy_parser::Operator::Is {
                    self.bind_type(rhs, expr);
                } else if op == cxy_parser::Operator::Catch
                    && matches!(self.arena.kind(rhs), AstKind::Block { .. })
                {
                    self.bind_stmt(rhs, expr);
                } else {
                    self.bind_expr(rhs, expr);
                }
            }
            AstKind::AssignExpr { lhs, rhs, .. } => {
                self.bind_expr(lhs, expr);
                self.bind_expr(rhs, expr);
            }
            AstKind::TernaryExpr {
                cond,
                then,
                otherwise,
            } => {
                self.bind_expr(cond, expr);
                self.bind_expr(then, expr);
                self.bind_expr(otherwise, expr);
            }
            AstKind::CastExpr { expr: inner, target, .. } => {
                self.bind_expr(inner, expr);
                self.bind_type(target, expr);
            }
            AstKind::TupleExpr { elements } | AstKind::ArrayExpr { elements } => {
                for element in elements {
                    self.bind_expr(element, expr);
                }
            }
            AstKind::StructExpr { left, fields } => {
                self.bind_expr(left, expr);
                for field in fields {
                    self.note_parent(field, expr);
                    if let AstKind::FieldInit { value, .. } = self.arena.kind(field) {
                        let value = *value;
                        self.bind_expr(value, expr);
                    }
                }
            }
            AstKind::ClosureExpr { params, ret, body, .. } => {
                self.push_scope(ScopeKind::Closure, expr);
                self.result.captures.entry(expr).or_default();
                for &param in &params {
                    self.note_parent(param, expr);
                    if let Some(name) = self.arena.kind(param).decl_name() {
                        self.define(name, param);
                    }
                    self.bind_children_of(param, expr);
                }
                if let Some(ret) = ret {
                    self.bind_type(ret, expr);
                }
                self.bind_stmt(body, expr);
                self.pop_scope();
            }
            AstKind::StringExpr { parts } => {
                for part in parts {
                    if !matches!(self.arena.kind(part), AstKind::StringLit { .. }) {
                        self.bind_expr(part, expr);
                    }
                }
            }
            AstKind::GroupExpr { inner } => self.bind_expr(inner, expr),
            AstKind::NewExpr { target, args } => {
                self.bind_expr(target, expr);
                for arg in args {
                    self.bind_expr(arg, expr);
                }
            }
            AstKind::Substitute { expr: inner } => {
                self.comptime_depth += 1;
                self.bind_expr(inner, expr);
                self.comptime_depth -= 1;
            }
            AstKind::AsmExpr {
                outputs,
                inputs,
                ..
            } => {
                for node in outputs.into_iter().chain(inputs) {
                    self.bind_expr(node, expr);
                }
            }
            AstKind::Block { .. } => self.bind_stmt(expr, owner),
            // Literals and type syntax carried in expression position.
            kind if kind.is_type_syntax() => self.bind_type(expr, owner),
            _ => {}
        }
        if comptime {
            self.comptime_depth -= 1;
        }
    }

    fn bind_type(&mut self, ty: NodeIndex, owner: NodeIndex) {
        self.note_parent(ty, owner);
        match self.arena.kind(ty).clone() {
            AstKind::Path { elements } => self.bind_path(ty, &elements),
            AstKind::ArrayType { element, size } => {
                self.bind_type(element, ty);
                if let Some(size) = size {
                    self.bind_expr(size, ty);
                }
            }
            _ => {
                for child in self.arena.children_of(ty) {
                    if self.arena.flags(child).contains(NodeFlags::TYPE_AST)
                        || matches!(self.arena.kind(child), AstKind::Path { .. })
                    {
                        self.bind_type(child, ty);
                    }
                }
            }
        }
    }

    // =========================================================================
    // Path resolution
    // =========================================================================

    fn bind_path(&mut self, path: NodeIndex, elements: &[NodeIndex]) {
        let Some(&head) = elements.first() else { return };
        let (head_name, args) = match self.arena.kind(head) {
            AstKind::PathElement { name, args, .. } => (*name, args.clone()),
            _ => return,
        };
        for arg in args {
            self.bind_type(arg, path);
        }
        for &element in &elements[1..] {
            if let AstKind::PathElement { args, .. } = self.arena.kind(element) {
                for arg in args.clone() {
                    self.bind_type(arg, path);
                }
            }
        }

        let text = self.strings.resolve(head_name).to_string();
        match text.as_str() {
            "this" | "super" | "This" => {
                // Inside a lowered or not-yet-lowered closure, `this` names
                // the closure structure itself.
                let Some(class) = self.find_scope(&[ScopeKind::Aggregate, ScopeKind::Closure])
                else {
                    let loc = self.arena.loc(path);
                    self.log.error(
                        loc,
                        format!("'{text}' can only be used inside a struct or class"),
                    );
                    return;
                };
                self.result.enclosing_class.insert(path, class);
                self.result.resolved.insert(path, class);
                if text == "super" {
                    if let AstKind::PathElement { super_depth, .. } =
                        &mut self.arena.get_mut(head).kind
                    {
                        *super_depth = 1;
                    }
                }
                return;
            }
            _ => {}
        }

        let Some(hit) = self.lookup(head_name) else {
            if self.builtins.contains(&head_name) {
                return;
            }
            let loc = self.arena.loc(path);
            let names = self.all_visible_names();
            let candidates: Vec<String> = names
                .iter()
                .map(|&n| self.strings.resolve(n).to_string())
                .collect();
            let suggestion = best_suggestion(&text, candidates.iter().map(|s| s.as_str()))
                .map(|s| s.to_string());
            match suggestion {
                Some(suggestion) => self.log.error(
                    loc,
                    format!("undefined symbol '{text}', did you mean '{suggestion}'?"),
                ),
                None => self.log.error(loc, format!("undefined symbol '{text}'")),
            }
            return;
        };

        trace!(name = %text, decl = ?hit.decl, "resolved path head");
        self.check_context_rules(path, hit.decl, &text);
        self.result.resolved.insert(path, hit.decl);
        if hit.chain.len() > 1 {
            self.result
                .overload_chains
                .insert(path, hit.chain.to_vec());
        }

        // Second element against a syntactic namespace (enum options).
        if elements.len() > 1 {
            if let AstKind::EnumDecl { options, .. } = self.arena.kind(hit.decl).clone() {
                if let AstKind::PathElement { name, .. } = self.arena.kind(elements[1]) {
                    let wanted = *name;
                    if let Some(&option) = options.iter().find(|&&o| {
                        matches!(self.arena.kind(o), AstKind::EnumOption { name, .. } if *name == wanted)
                    }) {
                        self.result.resolved.insert(elements[1], option);
                    }
                }
            }
        }

        // Capture analysis: a local crossing closure boundaries becomes a
        // capture of every crossed closure. The reference itself is
        // rewritten to `this.<name>` when the closure is lowered.
        if !hit.crossed_closures.is_empty() && self.is_capturable(hit.decl, hit.defined_in) {
            let capture = Capture {
                name: head_name,
                decl: hit.decl,
            };
            for &closure in &hit.crossed_closures {
                let set = self.result.captures.entry(closure).or_default();
                if !set.contains(&capture) {
                    trace!(name = %text, ?closure, "recording closure capture");
                    set.push(capture);
                }
                self.arena.add_flags(closure, NodeFlags::CLOSURE);
            }
        }
    }

    fn is_capturable(&self, decl: NodeIndex, defined_in: ScopeKind) -> bool {
        if matches!(defined_in, ScopeKind::Module | ScopeKind::Aggregate) {
            return false;
        }
        if self.arena.flags(decl).contains(NodeFlags::TOP_LEVEL_DECL) {
            return false;
        }
        matches!(
            self.arena.kind(decl),
            AstKind::VarDecl { .. } | AstKind::FuncParam { .. } | AstKind::MatchArm { .. }
        )
    }

    fn check_context_rules(&mut self, node: NodeIndex, decl: NodeIndex, name: &str) {
        // Synthesized references (test gathering, lowered closures) are
        // exempt from context fencing.
        if self.arena.flags(node).contains(NodeFlags::GENERATED) {
            return;
        }
        let flags = self.arena.flags(decl);
        if flags.contains(NodeFlags::COMPTIME) && self.comptime_depth == 0 {
            let loc = self.arena.loc(node);
            self.log.error(
                loc,
                format!("comptime symbol '{name}' can only be read in a comptime context"),
            );
        }
        if flags.contains(NodeFlags::TEST_CONTEXT) && self.test_depth == 0 {
            let loc = self.arena.loc(node);
            self.log.error(
                loc,
                format!("'{name}' is only visible inside test functions"),
            );
        }
    }

    fn resolve_name(&mut self, node: NodeIndex, name: Atom) {
        let Some(hit) = self.lookup(name) else {
            if self.builtins.contains(&name) {
                return;
            }
            let text = self.strings.resolve(name).to_string();
            let loc = self.arena.loc(node);
            self.log.error(loc, format!("undefined symbol '{text}'"));
            return;
        };
        let text = self.strings.resolve(name).to_string();
        self.check_context_rules(node, hit.decl, &text);
        self.result.resolved.insert(node, hit.decl);
    }
}
