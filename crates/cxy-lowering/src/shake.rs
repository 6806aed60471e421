//! The shaker: pre-check desugaring.
//!
//! Rewrites high-level syntax into the smaller core grammar the checker
//! handles:
//! - multi-variable declarations split through a tuple temp
//! - string interpolation becomes builder appends
//! - `if`/`while` var-declaration conditions hoist into the enclosing block
//! - `for`/`if`/`while` bodies become blocks
//! - closures become structs with an `op_call` method plus a forward
//!   trampoline, instantiated through a struct expression
//! - variadic parameters become a trailing inferred generic parameter
//! - `exception` declarations become classes deriving the builtin exception
//! - `test` declarations become functions gathered into `allTestCases`
//! - `raise e` becomes `return e as Exception` (plus trace push)
//! - match scrutinees are hoisted to l-values
//! - `[T]` becomes `Slice[T]`
//! - a non-block `catch` right-hand side is wrapped in a yielding block
//!
//! Defer statements are only collected here; the simplifier materializes
//! them after checking.

use cxy_binder::BindResult;
use cxy_common::{Atom, FileLoc, Interner, Log};
use cxy_parser::{AstKind, NodeArena, NodeFlags, NodeIndex, NodeList, Operator};
use tracing::debug;

/// Options controlling shaker behavior.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShakeOptions {
    /// Keep and register `test` declarations.
    pub test_mode: bool,
    /// Wrap raised values with a source-location push.
    pub trace_exceptions: bool,
}

pub struct Shaker<'a> {
    strings: &'a mut Interner,
    #[allow(dead_code)]
    log: &'a mut Log,
    arena: &'a mut NodeArena,
    bindings: &'a BindResult,
    options: ShakeOptions,
    /// Declarations synthesized during the walk, appended to the program.
    pending_decls: Vec<NodeIndex>,
    /// Lowered test functions, registered into `allTestCases`.
    test_funcs: Vec<(Atom, NodeIndex)>,
    temp_counter: u32,
    closure_counter: u32,
}

impl<'a> Shaker<'a> {
    pub fn new(
        strings: &'a mut Interner,
        log: &'a mut Log,
        arena: &'a mut NodeArena,
        bindings: &'a BindResult,
        options: ShakeOptions,
    ) -> Self {
        Shaker {
            strings,
            log,
            arena,
            bindings,
            options,
            pending_decls: Vec::new(),
            test_funcs: Vec::new(),
            temp_counter: 0,
            closure_counter: 0,
        }
    }

    pub fn shake_program(mut self, root: NodeIndex) {
        debug!("shaking program");
        let decls = match self.arena.kind(root) {
            AstKind::Program { decls, .. } => decls.clone(),
            other => unreachable!("shaking a non-program root {other:?}"),
        };
        let mut new_decls: NodeList = Vec::new();
        for decl in decls {
            match self.shake_decl(decl) {
                Some(kept) => new_decls.push(kept),
                None => {}
            }
            new_decls.append(&mut self.pending_decls);
        }
        if self.options.test_mode && !self.test_funcs.is_empty() {
            let all = self.build_all_test_cases();
            new_decls.push(all);
        }
        if let AstKind::Program { decls, .. } = &mut self.arena.get_mut(root).kind {
            *decls = new_decls;
        }
    }

    fn fresh_temp(&mut self) -> Atom {
        let name = format!("_t{}", self.temp_counter);
        self.temp_counter += 1;
        self.strings.intern(&name)
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    /// Returns the (possibly rewritten in place) declaration, or `None` when
    /// it is dropped entirely.
    fn shake_decl(&mut self, decl: NodeIndex) -> Option<NodeIndex> {
        match self.arena.kind(decl).clone() {
            AstKind::FuncDecl { params, body, .. } => {
                self.shake_variadic_func(decl, &params);
                for param in params {
                    if let AstKind::FuncParam {
                        ty: Some(ty),
                        default,
                        ..
                    } = self.arena.kind(param).clone()
                    {
                        self.shake_type(ty);
                        if let Some(default) = default {
                            self.shake_expr(default);
                        }
                    }
                }
                if let Some(body) = body {
                    self.shake_stmt(body);
                }
                Some(decl)
            }
            AstKind::StructDecl { members, .. }
            | AstKind::InterfaceDecl { members, .. }
            | AstKind::ClassDecl { members, .. } => {
                let mut kept = Vec::new();
                for member in members {
                    if let Some(m) = self.shake_decl(member) {
                        kept.push(m);
                    }
                }
                match &mut self.arena.get_mut(decl).kind {
                    AstKind::StructDecl { members, .. }
                    | AstKind::InterfaceDecl { members, .. }
                    | AstKind::ClassDecl { members, .. } => *members = kept,
                    _ => {}
                }
                Some(decl)
            }
            AstKind::FieldDecl { ty, default, .. } => {
                self.shake_type(ty);
                if let Some(default) = default {
                    self.shake_expr(default);
                }
                Some(decl)
            }
            AstKind::VarDecl { ty, init, .. } => {
                if let Some(ty) = ty {
                    self.shake_type(ty);
                }
                if let Some(init) = init {
                    self.shake_expr(init);
                }
                Some(decl)
            }
            AstKind::ExceptionDecl { .. } => {
                self.lower_exception(decl);
                Some(decl)
            }
            AstKind::TestDecl { name, body } => {
                if !self.options.test_mode {
                    self.arena.clear_to_noop(decl);
                    return None;
                }
                self.shake_stmt(body);
                self.lower_test(decl, name, body);
                Some(decl)
            }
            AstKind::TypeDecl { aliased, .. } => {
                if let Some(aliased) = aliased {
                    self.shake_type(aliased);
                }
                Some(decl)
            }
            AstKind::EnumDecl { .. }
            | AstKind::MacroDecl { .. }
            | AstKind::ImportDecl { .. }
            | AstKind::Attr { .. } => Some(decl),
            AstKind::IfStmt { .. } => {
                // Comptime declaration-level #if; branches shake after
                // evaluation splices them.
                Some(decl)
            }
            AstKind::Noop => None,
            _ => Some(decl),
        }
    }

    /// A variadic `...x: T` parameter becomes a trailing generic parameter
    /// `_Variadic` inferred from that argument position.
    fn shake_variadic_func(&mut self, decl: NodeIndex, params: &[NodeIndex]) {
        if !self.arena.flags(decl).contains(NodeFlags::VARIADIC) {
            return;
        }
        let Some(position) = params
            .iter()
            .position(|&p| self.arena.flags(p).contains(NodeFlags::VARIADIC))
        else {
            return;
        };
        let variadic_atom = self.strings.intern("_Variadic");
        let already_lowered = match self.arena.kind(decl) {
            AstKind::FuncDecl { generic_params, .. } => generic_params.iter().any(|&gp| {
                self.arena.kind(gp).decl_name() == Some(variadic_atom)
            }),
            _ => false,
        };
        if already_lowered {
            return;
        }
        let loc = self.arena.loc(params[position]);
        let generic = self.arena.alloc_flagged(
            AstKind::GenericParam {
                name: variadic_atom,
                constraints: Vec::new(),
                default: None,
                infer_index: Some(position as u32),
            },
            loc,
            NodeFlags::GENERATED | NodeFlags::VARIADIC,
        );
        let param_ty = self.arena.mk_path(variadic_atom, loc);
        self.arena.get_mut(param_ty).flags |= NodeFlags::TYPE_AST;
        if let AstKind::FuncParam { ty, .. } = &mut self.arena.get_mut(params[position]).kind {
            *ty = Some(param_ty);
        }
        if let AstKind::FuncDecl { generic_params, .. } = &mut self.arena.get_mut(decl).kind {
            generic_params.push(generic);
        }
    }

    /// `exception Name(a: T) { body }` rewrites in place to
    /// `class Name : Exception { a: T; init(...) { super("Name"); ... } func what() -> string body }`.
    fn lower_exception(&mut self, decl: NodeIndex) {
        let (name, params, body) = match self.arena.kind(decl).clone() {
            AstKind::ExceptionDecl { name, params, body } => (name, params, body),
            _ => return,
        };
        self.shake_stmt(body);
        let loc = self.arena.loc(decl);
        let mut members: NodeList = Vec::new();

        // One field per constructor parameter.
        for &param in &params {
            if let AstKind::FuncParam { name, ty, .. } = self.arena.kind(param).clone() {
                let field_ty = match ty {
                    Some(ty) => self.arena.deep_clone(ty),
                    None => self.arena.alloc_flagged(
                        AstKind::AutoType,
                        loc,
                        NodeFlags::TYPE_AST | NodeFlags::GENERATED,
                    ),
                };
                members.push(self.arena.alloc_flagged(
                    AstKind::FieldDecl {
                        name,
                        ty: field_ty,
                        default: None,
                    },
                    loc,
                    NodeFlags::MEMBER | NodeFlags::GENERATED,
                ));
            }
        }

        // init: forwards the exception name to the base and stores fields.
        let mut init_stmts: NodeList = Vec::new();
        let super_atom = self.strings.intern("super");
        let super_path = self.arena.mk_path(super_atom, loc);
        let name_text = self.strings.resolve(name).to_string();
        let name_lit_atom = self.strings.intern(&name_text);
        let name_lit = self
            .arena
            .alloc_flagged(AstKind::StringLit { raw: name_lit_atom }, loc, NodeFlags::GENERATED);
        let super_call = self.arena.mk_call(super_path, vec![name_lit], loc);
        init_stmts.push(
            self.arena
                .alloc_flagged(AstKind::ExprStmt { expr: super_call }, loc, NodeFlags::GENERATED),
        );
        let this_atom = self.strings.intern("this");
        for &param in &params {
            if let AstKind::FuncParam { name, .. } = self.arena.kind(param).clone() {
                let this_path = self.arena.mk_path(this_atom, loc);
                let field_ref = self.arena.mk_member(this_path, name, loc);
                let value = self.arena.mk_path(name, loc);
                let assign = self.arena.alloc_flagged(
                    AstKind::AssignExpr {
                        op: Operator::Assign,
                        lhs: field_ref,
                        rhs: value,
                    },
                    loc,
                    NodeFlags::GENERATED,
                );
                init_stmts.push(self.arena.alloc_flagged(
                    AstKind::ExprStmt { expr: assign },
                    loc,
                    NodeFlags::GENERATED,
                ));
            }
        }
        let init_body = self.arena.mk_block(init_stmts, loc);
        let init_name = self.strings.intern(Operator::Init.overload_name());
        members.push(self.arena.alloc_flagged(
            AstKind::FuncDecl {
                name: init_name,
                generic_params: Vec::new(),
                params,
                ret: None,
                body: Some(init_body),
                operator: Some(Operator::Init),
            },
            loc,
            NodeFlags::MEMBER | NodeFlags::GENERATED,
        ));

        // what(): the exception's message body.
        let what_name = self.strings.intern("what");
        let string_ty =
            self.arena
                .alloc_flagged(AstKind::StringType, loc, NodeFlags::TYPE_AST | NodeFlags::GENERATED);
        members.push(self.arena.alloc_flagged(
            AstKind::FuncDecl {
                name: what_name,
                generic_params: Vec::new(),
                params: Vec::new(),
                ret: Some(string_ty),
                body: Some(body),
                operator: None,
            },
            loc,
            NodeFlags::MEMBER | NodeFlags::GENERATED | NodeFlags::VIRTUAL,
        ));

        let exception_atom = self.strings.intern("Exception");
        let base = self.arena.mk_path(exception_atom, loc);
        self.arena.get_mut(base).flags |= NodeFlags::TYPE_AST;
        let flags = self.arena.flags(decl);
        self.arena.replace(
            decl,
            AstKind::ClassDecl {
                name,
                generic_params: Vec::new(),
                base: Some(base),
                interfaces: Vec::new(),
                members,
            },
        );
        self.arena.get_mut(decl).flags = flags | NodeFlags::GENERATED;
    }

    /// `test "name" { body }` becomes `func __testN() : Void | Exception body`
    /// and is registered for the `allTestCases` array.
    fn lower_test(&mut self, decl: NodeIndex, name: Atom, body: NodeIndex) {
        let loc = self.arena.loc(decl);
        let func_name = self
            .strings
            .intern(&format!("__test{}", self.test_funcs.len()));
        let void_ty = self.arena.alloc_flagged(
            AstKind::VoidType,
            loc,
            NodeFlags::TYPE_AST | NodeFlags::GENERATED,
        );
        let exception_atom = self.strings.intern("Exception");
        let exception_ty = self.arena.mk_path(exception_atom, loc);
        self.arena.get_mut(exception_ty).flags |= NodeFlags::TYPE_AST;
        let ret = self.arena.alloc_flagged(
            AstKind::UnionType {
                members: vec![void_ty, exception_ty],
            },
            loc,
            NodeFlags::TYPE_AST | NodeFlags::GENERATED,
        );
        let flags = self.arena.flags(decl);
        self.arena.replace(
            decl,
            AstKind::FuncDecl {
                name: func_name,
                generic_params: Vec::new(),
                params: Vec::new(),
                ret: Some(ret),
                body: Some(body),
                operator: None,
            },
        );
        self.arena.get_mut(decl).flags = flags | NodeFlags::GENERATED | NodeFlags::TEST_CONTEXT;
        self.test_funcs.push((name, decl));
    }

    /// `var allTestCases = [__test0, __test1, ...];`
    fn build_all_test_cases(&mut self) -> NodeIndex {
        let loc = FileLoc::synthetic();
        let mut elements = Vec::new();
        for (_, func) in self.test_funcs.clone() {
            if let AstKind::FuncDecl { name, .. } = self.arena.kind(func) {
                let name = *name;
                elements.push(self.arena.mk_path(name, loc));
            }
        }
        let array = self
            .arena
            .alloc_flagged(AstKind::ArrayExpr { elements }, loc, NodeFlags::GENERATED);
        let all_atom = self.strings.intern("allTestCases");
        let decl = self.arena.mk_var_decl(all_atom, None, Some(array), loc);
        self.arena.get_mut(decl).flags |=
            NodeFlags::TOP_LEVEL_DECL | NodeFlags::TEST_CONTEXT | NodeFlags::GENERATED;
        decl
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn shake_stmt(&mut self, stmt: NodeIndex) {
        match self.arena.kind(stmt).clone() {
            AstKind::Block { stmts } => self.shake_block(stmt, stmts),
            AstKind::ExprStmt { expr } => self.shake_expr(expr),
            AstKind::ReturnStmt { value } => {
                if let Some(value) = value {
                    self.shake_expr(value);
                }
            }
            AstKind::DeferStmt { expr } => self.shake_expr(expr),
            AstKind::YieldStmt { value } => self.shake_expr(value),
            AstKind::RaiseStmt { value } => {
                self.shake_expr(value);
                self.lower_raise(stmt, value);
            }
            AstKind::IfStmt {
                cond,
                then,
                otherwise,
            } => {
                if !matches!(self.arena.kind(cond), AstKind::VarDecl { .. }) {
                    self.shake_expr(cond);
                }
                self.ensure_block(then);
                self.shake_stmt(then);
                if let Some(otherwise) = otherwise {
                    self.shake_stmt(otherwise);
                }
            }
            AstKind::WhileStmt { cond, body } => {
                if !matches!(self.arena.kind(cond), AstKind::VarDecl { .. }) {
                    self.shake_expr(cond);
                }
                self.ensure_block(body);
                self.shake_stmt(body);
            }
            AstKind::ForStmt { range, body, .. } => {
                self.shake_expr(range);
                self.ensure_block(body);
                self.shake_stmt(body);
            }
            AstKind::MatchStmt { arms, .. } => {
                for arm in arms {
                    if let AstKind::MatchArm { body, .. } = self.arena.kind(arm) {
                        let body = *body;
                        self.shake_stmt(body);
                    }
                }
            }
            AstKind::VarDecl { .. }
            | AstKind::FuncDecl { .. }
            | AstKind::StructDecl { .. }
            | AstKind::ClassDecl { .. }
            | AstKind::TypeDecl { .. } => {
                self.shake_decl(stmt);
            }
            _ => {}
        }
    }

    /// Wrap a non-block statement in a block so later passes see a uniform
    /// shape.
    fn ensure_block(&mut self, stmt: NodeIndex) {
        if matches!(self.arena.kind(stmt), AstKind::Block { .. }) {
            return;
        }
        let loc = self.arena.loc(stmt);
        let kind = self.arena.kind(stmt).clone();
        let flags = self.arena.flags(stmt);
        let inner = self.arena.alloc_flagged(kind, loc, flags);
        self.arena.replace(stmt, AstKind::Block { stmts: vec![inner] });
        self.arena.get_mut(stmt).flags = NodeFlags::GENERATED;
    }

    /// Process a block's statement list, splicing in hoists and multi-var
    /// expansions.
    fn shake_block(&mut self, block: NodeIndex, stmts: NodeList) {
        let mut out: NodeList = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            match self.arena.kind(stmt).clone() {
                AstKind::VarDecl { names, ty, init } if names.len() > 1 => {
                    self.expand_multi_var(stmt, names, ty, init, &mut out);
                }
                AstKind::IfStmt { cond, .. } | AstKind::WhileStmt { cond, .. }
                    if matches!(self.arena.kind(cond), AstKind::VarDecl { .. }) =>
                {
                    self.hoist_condition(stmt, cond, &mut out);
                    self.shake_stmt(stmt);
                    out.push(stmt);
                }
                AstKind::MatchStmt { scrutinee, .. } => {
                    self.shake_expr(scrutinee);
                    if !self.is_lvalue(scrutinee) {
                        let hoisted = self.hoist_to_temp(scrutinee, &mut out);
                        if let AstKind::MatchStmt { scrutinee, .. } =
                            &mut self.arena.get_mut(stmt).kind
                        {
                            *scrutinee = hoisted;
                        }
                    }
                    self.shake_stmt(stmt);
                    out.push(stmt);
                }
                _ => {
                    self.shake_stmt(stmt);
                    if !matches!(self.arena.kind(stmt), AstKind::Noop) {
                        out.push(stmt);
                    }
                }
            }
        }
        if let AstKind::Block { stmts } = &mut self.arena.get_mut(block).kind {
            *stmts = out;
        }
    }

    /// `var a, b = expr` splits into single declarations, through a tuple
    /// temp unless the initializer is already a tuple literal. `_` names are
    /// dropped.
    fn expand_multi_var(
        &mut self,
        stmt: NodeIndex,
        names: NodeList,
        ty: Option<NodeIndex>,
        init: Option<NodeIndex>,
        out: &mut NodeList,
    ) {
        let loc = self.arena.loc(stmt);
        let flags = self.arena.flags(stmt) & NodeFlags::CONST;
        let underscore = self.strings.intern("_");

        let name_atoms: Vec<Atom> = names
            .iter()
            .filter_map(|&ident| match self.arena.kind(ident) {
                AstKind::Identifier { name } => Some(*name),
                _ => None,
            })
            .collect();

        match init.map(|i| (i, self.arena.kind(i).clone())) {
            Some((_, AstKind::TupleExpr { elements })) if elements.len() == name_atoms.len() => {
                // Direct expansion from the tuple literal.
                for (name, element) in name_atoms.into_iter().zip(elements) {
                    self.shake_expr(element);
                    if name == underscore {
                        continue;
                    }
                    let decl = self.arena.mk_var_decl(name, None, Some(element), loc);
                    self.arena.get_mut(decl).flags |= flags;
                    out.push(decl);
                }
            }
            Some((init, _)) => {
                self.shake_expr(init);
                let temp = self.fresh_temp();
                let temp_decl = self.arena.mk_var_decl(temp, ty, Some(init), loc);
                self.arena.get_mut(temp_decl).flags |= flags;
                out.push(temp_decl);
                for (position, name) in name_atoms.into_iter().enumerate() {
                    if name == underscore {
                        continue;
                    }
                    let temp_path = self.arena.mk_path(temp, loc);
                    let index = self.arena.mk_int(position as u128, loc);
                    let element = self.arena.alloc_flagged(
                        AstKind::MemberExpr {
                            target: temp_path,
                            member: index,
                            optional: false,
                        },
                        loc,
                        NodeFlags::GENERATED,
                    );
                    let decl = self.arena.mk_var_decl(name, None, Some(element), loc);
                    self.arena.get_mut(decl).flags |= flags;
                    out.push(decl);
                }
            }
            None => {
                for name in name_atoms {
                    if name == underscore {
                        continue;
                    }
                    let ty = ty.map(|t| self.arena.deep_clone(t));
                    let decl = self.arena.mk_var_decl(name, ty, None, loc);
                    self.arena.get_mut(decl).flags |= flags;
                    out.push(decl);
                }
            }
        }
        self.arena.clear_to_noop(stmt);
    }

    /// `if (var x = e) ...` hoists the declaration before the statement and
    /// leaves a reference to the declared name as the condition.
    fn hoist_condition(&mut self, stmt: NodeIndex, cond: NodeIndex, out: &mut NodeList) {
        let name = match self.arena.kind(cond) {
            AstKind::VarDecl { names, .. } => names.first().and_then(|&ident| {
                match self.arena.kind(ident) {
                    AstKind::Identifier { name } => Some(*name),
                    _ => None,
                }
            }),
            _ => None,
        };
        let Some(name) = name else { return };
        if let AstKind::VarDecl { init: Some(init), .. } = self.arena.kind(cond).clone() {
            self.shake_expr(init);
        }
        out.push(cond);
        let loc = self.arena.loc(cond);
        let reference = self.arena.mk_path(name, loc);
        match &mut self.arena.get_mut(stmt).kind {
            AstKind::IfStmt { cond, .. } | AstKind::WhileStmt { cond, .. } => *cond = reference,
            _ => {}
        }
    }

    fn hoist_to_temp(&mut self, expr: NodeIndex, out: &mut NodeList) -> NodeIndex {
        let loc = self.arena.loc(expr);
        let temp = self.fresh_temp();
        let decl = self.arena.mk_var_decl(temp, None, Some(expr), loc);
        out.push(decl);
        self.arena.mk_path(temp, loc)
    }

    fn is_lvalue(&self, expr: NodeIndex) -> bool {
        matches!(
            self.arena.kind(expr),
            AstKind::Path { .. } | AstKind::MemberExpr { .. } | AstKind::IndexExpr { .. }
        )
    }

    /// `raise e` becomes `return e as Exception`, optionally wrapped with a
    /// source-location push for exception traces.
    fn lower_raise(&mut self, stmt: NodeIndex, value: NodeIndex) {
        let loc = self.arena.loc(stmt);
        let mut payload = value;
        if self.options.trace_exceptions {
            let push_atom = self.strings.intern("__push_ex_trace");
            let callee = self.arena.mk_path(push_atom, loc);
            let file_lit = self
                .arena
                .alloc_flagged(AstKind::StringLit { raw: loc.file }, loc, NodeFlags::GENERATED);
            let row = self.arena.mk_int(loc.begin.row as u128, loc);
            payload = self.arena.mk_call(callee, vec![payload, file_lit, row], loc);
        }
        let exception_atom = self.strings.intern("Exception");
        let exception_ty = self.arena.mk_path(exception_atom, loc);
        self.arena.get_mut(exception_ty).flags |= NodeFlags::TYPE_AST;
        let cast = self.arena.alloc_flagged(
            AstKind::CastExpr {
                expr: payload,
                target: exception_ty,
                unchecked: false,
            },
            loc,
            NodeFlags::GENERATED,
        );
        self.arena
            .replace(stmt, AstKind::ReturnStmt { value: Some(cast) });
        self.arena.get_mut(stmt).flags |= NodeFlags::GENERATED;
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn shake_expr(&mut self, expr: NodeIndex) {
        match self.arena.kind(expr).clone() {
            AstKind::StringExpr { parts } => {
                for &part in &parts {
                    if !matches!(self.arena.kind(part), AstKind::StringLit { .. }) {
                        self.shake_expr(part);
                    }
                }
                self.lower_string_expr(expr, parts);
            }
            AstKind::ClosureExpr { .. } => {
                self.lower_closure(expr);
            }
            AstKind::BinaryExpr { op, lhs, rhs } => {
                self.shake_expr(lhs);
                if op == Operator::Catch {
                    self.ensure_catch_block(expr, rhs);
                } else if !matches!(self.arena.kind(rhs), AstKind::Block { .. }) {
                    self.shake_expr(rhs);
                }
            }
            AstKind::ArrayType { .. } => self.shake_type(expr),
            AstKind::Block { stmts } => self.shake_block(expr, stmts),
            _ => {
                for child in self.arena.children_of(expr) {
                    match self.arena.kind(child) {
                        AstKind::Block { .. } => self.shake_stmt(child),
                        kind if kind.is_type_syntax() => self.shake_type(child),
                        _ => self.shake_expr(child),
                    }
                }
            }
        }
    }

    fn shake_type(&mut self, ty: NodeIndex) {
        if let AstKind::ArrayType {
            element,
            size: None,
        } = self.arena.kind(ty).clone()
        {
            // `[T]` is sugar for `Slice[T]`.
            self.shake_type(element);
            let loc = self.arena.loc(ty);
            let slice_atom = self.strings.intern("Slice");
            let elem = self.arena.alloc_flagged(
                AstKind::PathElement {
                    name: slice_atom,
                    args: vec![element],
                    super_depth: 0,
                },
                loc,
                NodeFlags::GENERATED,
            );
            let flags = self.arena.flags(ty) | NodeFlags::GENERATED | NodeFlags::TYPE_AST;
            self.arena
                .replace(ty, AstKind::Path { elements: vec![elem] });
            self.arena.get_mut(ty).flags = flags;
            return;
        }
        for child in self.arena.children_of(ty) {
            if self.arena.flags(child).contains(NodeFlags::TYPE_AST)
                || self.arena.kind(child).is_type_syntax()
            {
                self.shake_type(child);
            }
        }
    }

    /// `` `A${x}B` `` lowers to a block expression
    /// `{ var _sbN = String(); _sbN << "A"; _sbN << x; _sbN << "B"; _sbN }`.
    fn lower_string_expr(&mut self, expr: NodeIndex, parts: NodeList) {
        let loc = self.arena.loc(expr);
        let builder = self.fresh_temp();
        let string_atom = self.strings.intern("String");
        let ctor_path = self.arena.mk_path(string_atom, loc);
        let ctor_call = self.arena.mk_call(ctor_path, Vec::new(), loc);
        let mut stmts: NodeList = Vec::new();
        let builder_decl = self.arena.mk_var_decl(builder, None, Some(ctor_call), loc);
        stmts.push(builder_decl);
        for part in parts {
            let builder_path = self.arena.mk_path(builder, loc);
            let append = self.arena.alloc_flagged(
                AstKind::BinaryExpr {
                    op: Operator::Shl,
                    lhs: builder_path,
                    rhs: part,
                },
                loc,
                NodeFlags::GENERATED,
            );
            stmts.push(self.arena.alloc_flagged(
                AstKind::ExprStmt { expr: append },
                loc,
                NodeFlags::GENERATED,
            ));
        }
        let read_back = self.arena.mk_path(builder, loc);
        stmts.push(self.arena.alloc_flagged(
            AstKind::ExprStmt { expr: read_back },
            loc,
            NodeFlags::GENERATED,
        ));
        self.arena.replace(expr, AstKind::Block { stmts });
        self.arena.get_mut(expr).flags =
            NodeFlags::GENERATED | NodeFlags::BLOCK_RETURNS;
    }

    /// A non-block catch right-hand side `lhs catch rhs` becomes
    /// `lhs catch { yield rhs; }`.
    fn ensure_catch_block(&mut self, _expr: NodeIndex, rhs: NodeIndex) {
        if matches!(self.arena.kind(rhs), AstKind::Block { .. }) {
            self.shake_stmt(rhs);
            return;
        }
        self.shake_expr(rhs);
        let loc = self.arena.loc(rhs);
        let kind = self.arena.kind(rhs).clone();
        let flags = self.arena.flags(rhs);
        let inner = self.arena.alloc_flagged(kind, loc, flags);
        let yield_stmt = self
            .arena
            .alloc_flagged(AstKind::YieldStmt { value: inner }, loc, NodeFlags::GENERATED);
        self.arena.replace(
            rhs,
            AstKind::Block {
                stmts: vec![yield_stmt],
            },
        );
        self.arena.get_mut(rhs).flags = NodeFlags::GENERATED | NodeFlags::BLOCK_RETURNS;
    }

    /// Closures become an anonymous struct with capture fields, an `op_call`
    /// method and a `__fwd` trampoline callable through `(^void, args...)`,
    /// plus a struct expression initializing the captures at the original
    /// site.
    fn lower_closure(&mut self, expr: NodeIndex) {
        let (params, ret, body) = match self.arena.kind(expr).clone() {
            AstKind::ClosureExpr {
                params, ret, body, ..
            } => (params, ret, body),
            _ => return,
        };
        self.shake_stmt(body);
        for &param in &params {
            if let AstKind::FuncParam { ty: Some(ty), .. } = self.arena.kind(param) {
                let ty = *ty;
                self.shake_type(ty);
            }
        }

        let loc = self.arena.loc(expr);
        let struct_name = self
            .strings
            .intern(&format!("CXY__closure{}", self.closure_counter));
        self.closure_counter += 1;

        let captures = self
            .bindings
            .captures
            .get(&expr)
            .cloned()
            .unwrap_or_default();

        // References to captured locals inside the body now read through
        // the closure structure: `x` becomes `this.x`.
        for capture in &captures {
            self.rewrite_capture_references(body, capture.name);
        }

        let mut members: NodeList = Vec::new();
        for capture in &captures {
            let auto_ty = self.arena.alloc_flagged(
                AstKind::AutoType,
                loc,
                NodeFlags::TYPE_AST | NodeFlags::GENERATED,
            );
            members.push(self.arena.alloc_flagged(
                AstKind::FieldDecl {
                    name: capture.name,
                    ty: auto_ty,
                    default: None,
                },
                loc,
                NodeFlags::MEMBER | NodeFlags::GENERATED | NodeFlags::CLOSURE,
            ));
        }

        // op_call carries the original body; an unannotated closure return
        // is inferred during checking.
        let call_name = self.strings.intern(Operator::Call.overload_name());
        let call_ret = ret.or_else(|| {
            Some(self.arena.alloc_flagged(
                AstKind::AutoType,
                loc,
                NodeFlags::TYPE_AST | NodeFlags::GENERATED,
            ))
        });
        let op_call = self.arena.alloc_flagged(
            AstKind::FuncDecl {
                name: call_name,
                generic_params: Vec::new(),
                params: params.clone(),
                ret: call_ret,
                body: Some(body),
                operator: Some(Operator::Call),
            },
            loc,
            NodeFlags::MEMBER | NodeFlags::GENERATED,
        );
        members.push(op_call);

        // __fwd: uniform function-pointer entry `(ptr: ^void, args...)`
        // forwarding to op_call on the cast receiver.
        members.push(self.build_trampoline(struct_name, &params, ret_of(self.arena, op_call), loc));

        let struct_decl = self.arena.alloc_flagged(
            AstKind::StructDecl {
                name: struct_name,
                generic_params: Vec::new(),
                members,
            },
            loc,
            NodeFlags::GENERATED | NodeFlags::CLOSURE | NodeFlags::TOP_LEVEL_DECL,
        );
        self.pending_decls.push(struct_decl);

        // The original expression becomes a struct literal capturing by
        // value from the creation site.
        let mut fields: NodeList = Vec::new();
        for capture in &captures {
            let value = self.arena.mk_path(capture.name, loc);
            fields.push(self.arena.alloc_flagged(
                AstKind::FieldInit {
                    name: capture.name,
                    value,
                },
                loc,
                NodeFlags::GENERATED,
            ));
        }
        let left = self.arena.mk_path(struct_name, loc);
        self.arena
            .replace(expr, AstKind::StructExpr { left, fields });
        self.arena.get_mut(expr).flags = NodeFlags::GENERATED | NodeFlags::CLOSURE;
    }

    fn rewrite_capture_references(&mut self, node: NodeIndex, name: Atom) {
        let matches_name = match self.arena.kind(node) {
            AstKind::Path { elements } if elements.len() == 1 => {
                matches!(
                    self.arena.kind(elements[0]),
                    AstKind::PathElement { name: n, args, .. } if *n == name && args.is_empty()
                )
            }
            _ => false,
        };
        if matches_name {
            let loc = self.arena.loc(node);
            let this_atom = self.strings.intern("this");
            let this_elem = self.arena.alloc_flagged(
                AstKind::PathElement {
                    name: this_atom,
                    args: Vec::new(),
                    super_depth: 0,
                },
                loc,
                NodeFlags::GENERATED,
            );
            if let AstKind::Path { elements } = &mut self.arena.get_mut(node).kind {
                elements.insert(0, this_elem);
            }
            return;
        }
        for child in self.arena.children_of(node) {
            self.rewrite_capture_references(child, name);
        }
    }

    fn build_trampoline(
        &mut self,
        struct_name: Atom,
        params: &[NodeIndex],
        ret: Option<NodeIndex>,
        loc: FileLoc,
    ) -> NodeIndex {
        let fwd_name = self.strings.intern("__fwd");
        let ptr_name = self.strings.intern("__self");
        let void_ty = self.arena.alloc_flagged(
            AstKind::VoidType,
            loc,
            NodeFlags::TYPE_AST | NodeFlags::GENERATED,
        );
        let void_ptr = self.arena.alloc_flagged(
            AstKind::PointerType { pointee: void_ty },
            loc,
            NodeFlags::TYPE_AST | NodeFlags::GENERATED,
        );
        let ptr_param = self.arena.alloc_flagged(
            AstKind::FuncParam {
                name: ptr_name,
                ty: Some(void_ptr),
                default: None,
            },
            loc,
            NodeFlags::GENERATED,
        );
        let mut fwd_params = vec![ptr_param];
        for &param in params {
            fwd_params.push(self.arena.deep_clone(param));
        }

        // (__self as ^CXY__closureN).op_call(args...)
        let ptr_ref = self.arena.mk_path(ptr_name, loc);
        let struct_path = self.arena.mk_path(struct_name, loc);
        self.arena.get_mut(struct_path).flags |= NodeFlags::TYPE_AST;
        let typed_ptr = self.arena.alloc_flagged(
            AstKind::PointerType {
                pointee: struct_path,
            },
            loc,
            NodeFlags::TYPE_AST | NodeFlags::GENERATED,
        );
        let cast = self.arena.alloc_flagged(
            AstKind::CastExpr {
                expr: ptr_ref,
                target: typed_ptr,
                unchecked: true,
            },
            loc,
            NodeFlags::GENERATED,
        );
        let call_name = self.strings.intern(Operator::Call.overload_name());
        let callee = self.arena.mk_member(cast, call_name, loc);
        let mut args = Vec::new();
        for &param in params {
            if let Some(name) = self.arena.kind(param).decl_name() {
                args.push(self.arena.mk_path(name, loc));
            }
        }
        let call = self.arena.mk_call(callee, args, loc);
        let ret_stmt = self
            .arena
            .alloc_flagged(AstKind::ReturnStmt { value: Some(call) }, loc, NodeFlags::GENERATED);
        let fwd_body = self.arena.mk_block(vec![ret_stmt], loc);
        let fwd_ret = ret.map(|r| self.arena.deep_clone(r));
        self.arena.alloc_flagged(
            AstKind::FuncDecl {
                name: fwd_name,
                generic_params: Vec::new(),
                params: fwd_params,
                ret: fwd_ret,
                body: Some(fwd_body),
                operator: None,
            },
            loc,
            NodeFlags::MEMBER | NodeFlags::GENERATED | NodeFlags::STATIC,
        )
    }
}

fn ret_of(arena: &NodeArena, func: NodeIndex) -> Option<NodeIndex> {
    match arena.kind(func) {
        AstKind::FuncDecl { ret, .. } => *ret,
        _ => None,
    }
}
