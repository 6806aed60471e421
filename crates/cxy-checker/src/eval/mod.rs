//! Comptime evaluator.
//!
//! A tree-rewriting interpreter that runs before type checking proper.
//! `#if`/`#for`/`#while`/`#const` fold away (selected branches splice into
//! the surrounding list, loops unroll), `#{expr}` substitutions and macro
//! calls expand in place, and type introspection builtins (`T.name`,
//! `T.members`, `T.is*`, ...) compute values through the type table. After
//! the pass, no node carries the comptime flag except `Noop` placeholders.

pub mod introspect;

use crate::context::CheckerContext;
use crate::state::CheckerState;
use cxy_common::limits::MAX_COMPTIME_ITERATIONS;
use cxy_common::Atom;
use cxy_parser::{AstKind, NodeFlags, NodeIndex, NodeList, Operator};
use cxy_types::TypeId;
use rustc_hash::FxHashMap;
use tracing::debug;

/// A compile-time value.
#[derive(Clone, Debug, PartialEq)]
pub enum EvalValue {
    Int(i128),
    Bool(bool),
    Float(f64),
    /// Interned raw string
    Str(Atom),
    /// An integer range `[start, end)`
    Range(i128, i128),
    Type(TypeId),
    /// One named member during `#for` iteration over `T.members`
    Member(Atom, TypeId),
    /// A member list produced by `T.members`
    Members(Vec<(Atom, TypeId)>),
}

/// Constant integer evaluation usable outside a full evaluator run (enum
/// option values, array lengths, case labels).
pub fn const_int(ctx: &CheckerContext<'_>, node: NodeIndex) -> Option<i128> {
    match ctx.arena.kind(node) {
        AstKind::IntLit {
            value, negative, ..
        } => {
            let magnitude = i128::try_from(*value).ok()?;
            Some(if *negative { -magnitude } else { magnitude })
        }
        AstKind::BoolLit { value } => Some(i128::from(*value)),
        AstKind::GroupExpr { inner } => const_int(ctx, *inner),
        AstKind::UnaryExpr {
            op: Operator::Minus,
            operand,
            ..
        } => Some(-const_int(ctx, *operand)?),
        AstKind::BinaryExpr { op, lhs, rhs } => {
            let a = const_int(ctx, *lhs)?;
            let b = const_int(ctx, *rhs)?;
            match op {
                Operator::Add => a.checked_add(b),
                Operator::Sub => a.checked_sub(b),
                Operator::Mul => a.checked_mul(b),
                Operator::Div => a.checked_div(b),
                Operator::Rem => a.checked_rem(b),
                Operator::Shl => a.checked_shl(b.try_into().ok()?),
                Operator::Shr => a.checked_shr(b.try_into().ok()?),
                Operator::BAnd => Some(a & b),
                Operator::BOr => Some(a | b),
                Operator::BXor => Some(a ^ b),
                _ => None,
            }
        }
        AstKind::Path { .. } => {
            let decl = ctx.bindings.resolution_of(node)?;
            match ctx.arena.kind(decl) {
                AstKind::VarDecl {
                    init: Some(init), ..
                } if ctx.arena.flags(decl).contains(NodeFlags::CONST) => const_int(ctx, *init),
                AstKind::EnumOption {
                    value: Some(value), ..
                } => const_int(ctx, *value),
                _ => None,
            }
        }
        _ => None,
    }
}

impl<'a, 'b> CheckerState<'a, 'b> {
    /// Fold every comptime construct in the unit.
    pub fn evaluate_comptime(&mut self, root: NodeIndex) {
        debug!("evaluating comptime constructs");
        let decls = match self.ctx.arena.kind(root) {
            AstKind::Program { decls, .. } => decls.clone(),
            _ => return,
        };
        self.eval_env.push(FxHashMap::default());
        let folded = self.fold_decl_list(decls);
        self.eval_env.pop();
        if let AstKind::Program { decls, .. } = &mut self.ctx.arena.get_mut(root).kind {
            *decls = folded;
        }
    }

    fn fold_decl_list(&mut self, decls: NodeList) -> NodeList {
        let mut out = Vec::with_capacity(decls.len());
        for decl in decls {
            if self.ctx.arena.flags(decl).contains(NodeFlags::COMPTIME) {
                match self.ctx.arena.kind(decl).clone() {
                    AstKind::IfStmt { .. } => {
                        if let Some(branch) = self.fold_comptime_if(decl) {
                            let stmts = match self.ctx.arena.kind(branch) {
                                AstKind::Block { stmts } => stmts.clone(),
                                _ => vec![branch],
                            };
                            out.extend(self.fold_decl_list(stmts));
                        }
                        continue;
                    }
                    AstKind::VarDecl { .. } => {
                        self.fold_comptime_const(decl);
                        // The binding stays visible as an ordinary constant.
                        self.ctx.arena.get_mut(decl).flags -= NodeFlags::COMPTIME;
                        out.push(decl);
                        continue;
                    }
                    _ => {}
                }
            }
            self.fold_decl(decl);
            out.push(decl);
        }
        out
    }

    fn fold_decl(&mut self, decl: NodeIndex) {
        match self.ctx.arena.kind(decl).clone() {
            AstKind::FuncDecl { body: Some(body), .. } => self.fold_block(body),
            AstKind::StructDecl { members, .. }
            | AstKind::ClassDecl { members, .. }
            | AstKind::InterfaceDecl { members, .. } => {
                let folded = self.fold_decl_list(members);
                match &mut self.ctx.arena.get_mut(decl).kind {
                    AstKind::StructDecl { members, .. }
                    | AstKind::ClassDecl { members, .. }
                    | AstKind::InterfaceDecl { members, .. } => *members = folded,
                    _ => {}
                }
            }
            AstKind::VarDecl { init: Some(init), .. } => self.fold_expr(init),
            AstKind::ExceptionDecl { body, .. } => self.fold_block(body),
            AstKind::TestDecl { body, .. } => self.fold_block(body),
            _ => {}
        }
    }

    fn fold_block(&mut self, block: NodeIndex) {
        let stmts = match self.ctx.arena.kind(block) {
            AstKind::Block { stmts } => stmts.clone(),
            _ => return,
        };
        self.eval_env.push(FxHashMap::default());
        let folded = self.fold_stmt_list(stmts);
        self.eval_env.pop();
        if let AstKind::Block { stmts } = &mut self.ctx.arena.get_mut(block).kind {
            *stmts = folded;
        }
    }

    fn fold_stmt_list(&mut self, stmts: NodeList) -> NodeList {
        let mut out = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            if self.ctx.arena.flags(stmt).contains(NodeFlags::COMPTIME) {
                match self.ctx.arena.kind(stmt).clone() {
                    AstKind::IfStmt { .. } => {
                        if let Some(branch) = self.fold_comptime_if(stmt) {
                            let inner = match self.ctx.arena.kind(branch) {
                                AstKind::Block { stmts } => stmts.clone(),
                                _ => vec![branch],
                            };
                            out.extend(self.fold_stmt_list(inner));
                        }
                        continue;
                    }
                    AstKind::ForStmt { var, range, body } => {
                        out.extend(self.unroll_comptime_for(stmt, var, range, body));
                        continue;
                    }
                    AstKind::WhileStmt { cond, body } => {
                        out.extend(self.unroll_comptime_while(stmt, cond, body));
                        continue;
                    }
                    AstKind::VarDecl { .. } => {
                        // The binding is tracked in the environment; a
                        // residual constant stays behind for runtime reads.
                        self.fold_comptime_const(stmt);
                        self.ctx.arena.get_mut(stmt).flags -= NodeFlags::COMPTIME;
                        out.push(stmt);
                        continue;
                    }
                    _ => {}
                }
            }
            self.fold_stmt(stmt);
            if !matches!(self.ctx.arena.kind(stmt), AstKind::Noop) {
                out.push(stmt);
            }
        }
        out
    }

    fn fold_stmt(&mut self, stmt: NodeIndex) {
        match self.ctx.arena.kind(stmt).clone() {
            AstKind::Block { .. } => self.fold_block(stmt),
            AstKind::ExprStmt { expr } => self.fold_expr(expr),
            AstKind::ReturnStmt { value: Some(value) } => self.fold_expr(value),
            AstKind::YieldStmt { value } | AstKind::RaiseStmt { value } => self.fold_expr(value),
            AstKind::DeferStmt { expr } => self.fold_expr(expr),
            AstKind::IfStmt {
                cond,
                then,
                otherwise,
            } => {
                self.fold_expr(cond);
                self.fold_stmt(then);
                if let Some(otherwise) = otherwise {
                    self.fold_stmt(otherwise);
                }
            }
            AstKind::WhileStmt { cond, body } => {
                self.fold_expr(cond);
                self.fold_stmt(body);
            }
            AstKind::ForStmt { range, body, .. } => {
                self.fold_expr(range);
                self.fold_stmt(body);
            }
            AstKind::MatchStmt { scrutinee, arms } => {
                self.fold_expr(scrutinee);
                for arm in arms {
                    if let AstKind::MatchArm { body, .. } = self.ctx.arena.kind(arm) {
                        let body = *body;
                        self.fold_stmt(body);
                    }
                }
            }
            AstKind::VarDecl { init: Some(init), .. } => self.fold_expr(init),
            AstKind::FuncDecl { .. }
            | AstKind::StructDecl { .. }
            | AstKind::ClassDecl { .. } => self.fold_decl(stmt),
            _ => {}
        }
    }

    /// Expand substitutions and macro calls inside an expression tree.
    fn fold_expr(&mut self, expr: NodeIndex) {
        match self.ctx.arena.kind(expr).clone() {
            AstKind::Substitute { expr: inner } => {
                self.fold_expr(inner);
                match self.eval_expr(inner) {
                    Some(value) => self.replace_with_value(expr, &value),
                    None => {
                        self.ctx
                            .error_at(expr, "substitution is not a compile-time constant");
                        self.ctx.arena.replace(expr, AstKind::Error);
                    }
                }
            }
            AstKind::MacroCallExpr { callee, args } => {
                for &arg in &args {
                    self.fold_expr(arg);
                }
                self.expand_macro(expr, callee, &args);
            }
            AstKind::Block { .. } => self.fold_block(expr),
            _ => {
                for child in self.ctx.arena.children_of(expr) {
                    match self.ctx.arena.kind(child) {
                        AstKind::Block { .. } => self.fold_block(child),
                        _ => self.fold_expr(child),
                    }
                }
            }
        }
    }

    // =========================================================================
    // Comptime statements
    // =========================================================================

    /// Evaluate a `#if` and return the selected branch, if any.
    fn fold_comptime_if(&mut self, stmt: NodeIndex) -> Option<NodeIndex> {
        let (cond, then, otherwise) = match self.ctx.arena.kind(stmt).clone() {
            AstKind::IfStmt {
                cond,
                then,
                otherwise,
            } => (cond, then, otherwise),
            _ => return None,
        };
        self.fold_expr(cond);
        let value = match self.eval_expr(cond) {
            Some(EvalValue::Bool(value)) => value,
            Some(EvalValue::Int(value)) => value != 0,
            _ => {
                self.ctx
                    .error_at(cond, "comptime condition must fold to a boolean");
                return None;
            }
        };
        self.ctx.arena.clear_to_noop(stmt);
        if value {
            Some(then)
        } else {
            otherwise
        }
    }

    fn fold_comptime_const(&mut self, decl: NodeIndex) {
        let (names, init) = match self.ctx.arena.kind(decl).clone() {
            AstKind::VarDecl {
                names,
                init: Some(init),
                ..
            } => (names, init),
            _ => return,
        };
        self.fold_expr(init);
        let Some(value) = self.eval_expr(init) else {
            self.ctx
                .error_at(init, "comptime constant needs a foldable initializer");
            return;
        };
        for ident in names {
            if let AstKind::Identifier { name } = self.ctx.arena.kind(ident) {
                let name = *name;
                self.eval_env
                    .last_mut()
                    .expect("eval env")
                    .insert(name, value.clone());
            }
        }
    }

    /// Unroll `#for (const x : range) body` into copies of the body with
    /// the loop variable folded to each value.
    fn unroll_comptime_for(
        &mut self,
        stmt: NodeIndex,
        var: NodeIndex,
        range: NodeIndex,
        body: NodeIndex,
    ) -> NodeList {
        let name = match self.ctx.arena.kind(var).clone() {
            AstKind::VarDecl { names, .. } => names.first().and_then(|&ident| {
                match self.ctx.arena.kind(ident) {
                    AstKind::Identifier { name } => Some(*name),
                    _ => None,
                }
            }),
            _ => None,
        };
        let Some(name) = name else { return Vec::new() };
        self.fold_expr(range);
        let values: Vec<EvalValue> = match self.eval_expr(range) {
            Some(EvalValue::Range(start, end)) => (start..end).map(EvalValue::Int).collect(),
            Some(EvalValue::Members(members)) => members
                .into_iter()
                .map(|(n, t)| EvalValue::Member(n, t))
                .collect(),
            _ => {
                self.ctx.error_at(
                    range,
                    "comptime loop range must be a literal integer range or a member list",
                );
                return Vec::new();
            }
        };
        if values.len() > MAX_COMPTIME_ITERATIONS {
            self.ctx
                .error_at(stmt, "comptime loop unrolls too many iterations");
            return Vec::new();
        }
        self.ctx.arena.clear_to_noop(stmt);
        let mut out = Vec::new();
        for value in values {
            let copy = self.ctx.arena.deep_clone(body);
            self.eval_env.push(FxHashMap::default());
            self.eval_env
                .last_mut()
                .expect("eval env")
                .insert(name, value.clone());
            self.fold_block(copy);
            self.substitute_name_with_value(copy, name, &value);
            self.eval_env.pop();
            match self.ctx.arena.kind(copy) {
                AstKind::Block { stmts } => out.extend(stmts.clone()),
                _ => out.push(copy),
            }
        }
        out
    }

    fn unroll_comptime_while(
        &mut self,
        stmt: NodeIndex,
        cond: NodeIndex,
        body: NodeIndex,
    ) -> NodeList {
        let mut out = Vec::new();
        let mut iterations = 0usize;
        loop {
            match self.eval_expr(cond) {
                Some(EvalValue::Bool(true)) => {}
                Some(EvalValue::Bool(false)) => break,
                Some(EvalValue::Int(value)) => {
                    if value == 0 {
                        break;
                    }
                }
                _ => {
                    self.ctx
                        .error_at(cond, "comptime condition must fold to a boolean");
                    break;
                }
            }
            iterations += 1;
            if iterations > MAX_COMPTIME_ITERATIONS {
                self.ctx
                    .error_at(stmt, "comptime loop does not terminate");
                break;
            }
            // Assignments to comptime bindings advance the loop state;
            // everything else is emitted.
            let body_stmts = match self.ctx.arena.kind(body) {
                AstKind::Block { stmts } => stmts.clone(),
                _ => vec![body],
            };
            for stmt in body_stmts {
                if let AstKind::ExprStmt { expr } = self.ctx.arena.kind(stmt).clone() {
                    if let AstKind::AssignExpr {
                        op: Operator::Assign,
                        lhs,
                        rhs,
                    } = self.ctx.arena.kind(expr).clone()
                    {
                        if let Some(name) = self.path_head_name(lhs) {
                            if self.env_contains(name) {
                                match self.eval_expr(rhs) {
                                    Some(value) => self.env_update(name, value),
                                    None => {
                                        self.ctx.error_at(
                                            rhs,
                                            "comptime assignment needs a foldable value",
                                        );
                                    }
                                }
                                continue;
                            }
                        }
                    }
                }
                let copy = self.ctx.arena.deep_clone(stmt);
                self.fold_stmt(copy);
                // Bindings fold to their current iteration's value.
                let snapshot: Vec<(Atom, EvalValue)> = self
                    .eval_env
                    .iter()
                    .flat_map(|frame| frame.iter().map(|(&k, v)| (k, v.clone())))
                    .collect();
                for (name, value) in snapshot {
                    if matches!(
                        value,
                        EvalValue::Int(_)
                            | EvalValue::Bool(_)
                            | EvalValue::Float(_)
                            | EvalValue::Str(_)
                    ) {
                        self.substitute_name_with_value(copy, name, &value);
                    }
                }
                out.push(copy);
            }
        }
        self.ctx.arena.clear_to_noop(stmt);
        out
    }

    fn env_contains(&self, name: Atom) -> bool {
        self.eval_env.iter().rev().any(|frame| frame.contains_key(&name))
    }

    fn env_update(&mut self, name: Atom, value: EvalValue) {
        for frame in self.eval_env.iter_mut().rev() {
            if let Some(slot) = frame.get_mut(&name) {
                *slot = value;
                return;
            }
        }
    }

    // =========================================================================
    // Macro expansion
    // =========================================================================

    /// Expand `name!(args)` in place: user macros substitute their body,
    /// builtin macros fold to values, runtime macros stay for the checker.
    fn expand_macro(&mut self, expr: NodeIndex, callee: NodeIndex, args: &[NodeIndex]) {
        let head_name = match self.ctx.arena.kind(callee) {
            AstKind::Path { elements } => elements.first().and_then(|&e| {
                match self.ctx.arena.kind(e) {
                    AstKind::PathElement { name, .. } => Some(*name),
                    _ => None,
                }
            }),
            _ => None,
        };
        let Some(head_name) = head_name else { return };
        let text = self.ctx.strings.resolve(head_name).to_string();

        match text.as_str() {
            "sizeof" => {
                match args.first().and_then(|&arg| self.eval_type_arg(arg)) {
                    Some(ty) => {
                        let size = self.size_of_type(ty);
                        match size {
                            Some(size) => {
                                self.replace_with_value(expr, &EvalValue::Int(size as i128));
                            }
                            None => {
                                self.ctx
                                    .error_at(expr, "type has no compile-time size");
                            }
                        }
                    }
                    None => {
                        self.ctx.error_at(expr, "sizeof! needs a type argument");
                    }
                }
                return;
            }
            "defined" => {
                let value = args.first().is_some_and(|&arg| {
                    self.path_head_name(arg)
                        .is_some_and(|name| self.ctx.defines.contains(&name))
                });
                self.replace_with_value(expr, &EvalValue::Bool(value));
                return;
            }
            // Runtime hooks expanded against the runtime library.
            "__async" => return,
            _ => {}
        }

        let Some(decl) = self.ctx.bindings.resolution_of(callee) else {
            return;
        };
        let (params, body) = match self.ctx.arena.kind(decl).clone() {
            AstKind::MacroDecl { params, body, .. } => (params, body),
            _ => return,
        };

        // Arity: a trailing variadic parameter absorbs the rest as a tuple.
        let variadic = params
            .last()
            .is_some_and(|&p| self.ctx.arena.flags(p).contains(NodeFlags::VARIADIC));
        let required = if variadic { params.len() - 1 } else { params.len() };
        if args.len() < required || (!variadic && args.len() > params.len()) {
            self.ctx.error_at(
                expr,
                format!(
                    "macro '{text}' takes {required} argument(s), {} given",
                    args.len()
                ),
            );
            return;
        }

        let copy = self.ctx.arena.deep_clone(body);
        for (position, &param) in params.iter().enumerate() {
            let Some(param_name) = self.ctx.arena.kind(param).decl_name() else {
                continue;
            };
            if variadic && position == params.len() - 1 {
                let loc = self.ctx.arena.loc(expr);
                let rest: NodeList = args[position..]
                    .iter()
                    .map(|&a| self.ctx.arena.deep_clone(a))
                    .collect();
                let tuple = self.ctx.arena.alloc_flagged(
                    AstKind::TupleExpr { elements: rest },
                    loc,
                    NodeFlags::GENERATED,
                );
                self.substitute_name_with_node(copy, param_name, tuple);
            } else {
                self.substitute_name_with_node(copy, param_name, args[position]);
            }
        }
        let node = self.ctx.arena.get(copy).clone();
        self.ctx.arena.replace(expr, node.kind);
        self.ctx.arena.get_mut(expr).flags = node.flags | NodeFlags::GENERATED;
        self.fold_expr(expr);
    }

    // =========================================================================
    // Expression evaluation
    // =========================================================================

    pub(crate) fn eval_expr(&mut self, expr: NodeIndex) -> Option<EvalValue> {
        match self.ctx.arena.kind(expr).clone() {
            AstKind::IntLit {
                value, negative, ..
            } => {
                let magnitude = i128::try_from(value).ok()?;
                Some(EvalValue::Int(if negative { -magnitude } else { magnitude }))
            }
            AstKind::BoolLit { value } => Some(EvalValue::Bool(value)),
            AstKind::FloatLit { value, .. } => Some(EvalValue::Float(value)),
            AstKind::StringLit { raw } => Some(EvalValue::Str(raw)),
            AstKind::GroupExpr { inner } | AstKind::Substitute { expr: inner } => {
                self.eval_expr(inner)
            }
            AstKind::Path { elements } => {
                let mut value = self.eval_path_head(expr, elements.first().copied()?)?;
                // Remaining elements apply as introspection members.
                for &element in &elements[1..] {
                    let name = match self.ctx.arena.kind(element) {
                        AstKind::PathElement { name, .. } => *name,
                        _ => return None,
                    };
                    let text = self.ctx.strings.resolve(name).to_string();
                    value = match value {
                        EvalValue::Type(ty) => self.introspect(ty, &text)?,
                        EvalValue::Member(member_name, ty) => match text.as_str() {
                            "name" => EvalValue::Str(member_name),
                            "Tinfo" => EvalValue::Type(ty),
                            _ => self.introspect(ty, &text)?,
                        },
                        _ => return None,
                    };
                }
                Some(value)
            }
            AstKind::UnaryExpr {
                op,
                operand,
                prefix: true,
            } => {
                let value = self.eval_expr(operand)?;
                match (op, value) {
                    (Operator::Minus, EvalValue::Int(v)) => Some(EvalValue::Int(-v)),
                    (Operator::Minus, EvalValue::Float(v)) => Some(EvalValue::Float(-v)),
                    (Operator::Not, EvalValue::Bool(v)) => Some(EvalValue::Bool(!v)),
                    (Operator::Compl, EvalValue::Int(v)) => Some(EvalValue::Int(!v)),
                    _ => None,
                }
            }
            AstKind::BinaryExpr { op, lhs, rhs } => self.eval_binary(op, lhs, rhs),
            AstKind::TernaryExpr {
                cond,
                then,
                otherwise,
            } => match self.eval_expr(cond)? {
                EvalValue::Bool(true) => self.eval_expr(then),
                EvalValue::Bool(false) => self.eval_expr(otherwise),
                _ => None,
            },
            AstKind::MemberExpr { target, member, .. } => {
                let member_name = match self.ctx.arena.kind(member) {
                    AstKind::Identifier { name } => *name,
                    _ => return None,
                };
                let value = self.eval_expr(target)?;
                match value {
                    EvalValue::Type(ty) => {
                        let text = self.ctx.strings.resolve(member_name).to_string();
                        self.introspect(ty, &text)
                    }
                    // Loop variables bound to members expose name/type.
                    EvalValue::Member(name, ty) => {
                        let text = self.ctx.strings.resolve(member_name).to_string();
                        match text.as_str() {
                            "name" => Some(EvalValue::Str(name)),
                            "Tinfo" => Some(EvalValue::Type(ty)),
                            _ => self.introspect(ty, &text),
                        }
                    }
                    _ => None,
                }
            }
            AstKind::MacroCallExpr { .. } => {
                // A macro that survived folding is not a constant.
                None
            }
            kind if kind.is_type_syntax() => {
                let ty = self.type_from_node(expr);
                Some(EvalValue::Type(self.ctx.types.resolve(ty)))
            }
            _ => None,
        }
    }

    fn eval_path_head(&mut self, path: NodeIndex, head: NodeIndex) -> Option<EvalValue> {
        let name = match self.ctx.arena.kind(head) {
            AstKind::PathElement { name, .. } => *name,
            _ => return None,
        };
        for frame in self.eval_env.iter().rev() {
            if let Some(value) = frame.get(&name) {
                return Some(value.clone());
            }
        }
        if let Some(subst) = self.lookup_substitution(name) {
            return Some(EvalValue::Type(subst));
        }
        let text = self.ctx.strings.resolve(name).to_string();
        if let Some(kind) = cxy_parser::PrimitiveKind::from_name(&text) {
            let ty = self.ctx.types.primitive(kind);
            return Some(EvalValue::Type(ty));
        }
        if text == "string" {
            return Some(EvalValue::Type(cxy_types::TypeTable::STRING));
        }
        let decl = self.ctx.bindings.resolution_of(path)?;
        match self.ctx.arena.kind(decl).clone() {
            AstKind::VarDecl {
                init: Some(init), ..
            } if self.ctx.arena.flags(decl).contains(NodeFlags::CONST) => self.eval_expr(init),
            AstKind::StructDecl { .. }
            | AstKind::ClassDecl { .. }
            | AstKind::InterfaceDecl { .. }
            | AstKind::EnumDecl { .. }
            | AstKind::TypeDecl { .. } => {
                let ty = self.ensure_declared(decl);
                Some(EvalValue::Type(self.ctx.types.resolve(ty)))
            }
            AstKind::EnumOption { value: Some(value), .. } => self.eval_expr(value),
            _ => None,
        }
    }

    fn eval_binary(&mut self, op: Operator, lhs: NodeIndex, rhs: NodeIndex) -> Option<EvalValue> {
        // Short-circuit forms first.
        if op == Operator::LAnd || op == Operator::LOr {
            let left = match self.eval_expr(lhs)? {
                EvalValue::Bool(v) => v,
                EvalValue::Int(v) => v != 0,
                _ => return None,
            };
            if op == Operator::LAnd && !left {
                return Some(EvalValue::Bool(false));
            }
            if op == Operator::LOr && left {
                return Some(EvalValue::Bool(true));
            }
            return match self.eval_expr(rhs)? {
                EvalValue::Bool(v) => Some(EvalValue::Bool(v)),
                EvalValue::Int(v) => Some(EvalValue::Bool(v != 0)),
                _ => None,
            };
        }
        let a = self.eval_expr(lhs)?;
        let b = self.eval_expr(rhs)?;
        match (a, b) {
            (EvalValue::Int(a), EvalValue::Int(b)) => match op {
                Operator::Add => a.checked_add(b).map(EvalValue::Int),
                Operator::Sub => a.checked_sub(b).map(EvalValue::Int),
                Operator::Mul => a.checked_mul(b).map(EvalValue::Int),
                Operator::Div => a.checked_div(b).map(EvalValue::Int),
                Operator::Rem => a.checked_rem(b).map(EvalValue::Int),
                Operator::Shl => a.checked_shl(b.try_into().ok()?).map(EvalValue::Int),
                Operator::Shr => a.checked_shr(b.try_into().ok()?).map(EvalValue::Int),
                Operator::BAnd => Some(EvalValue::Int(a & b)),
                Operator::BOr => Some(EvalValue::Int(a | b)),
                Operator::BXor => Some(EvalValue::Int(a ^ b)),
                Operator::Eq => Some(EvalValue::Bool(a == b)),
                Operator::Ne => Some(EvalValue::Bool(a != b)),
                Operator::Lt => Some(EvalValue::Bool(a < b)),
                Operator::Gt => Some(EvalValue::Bool(a > b)),
                Operator::Leq => Some(EvalValue::Bool(a <= b)),
                Operator::Geq => Some(EvalValue::Bool(a >= b)),
                Operator::Range => Some(EvalValue::Range(a, b)),
                _ => None,
            },
            (EvalValue::Bool(a), EvalValue::Bool(b)) => match op {
                Operator::Eq => Some(EvalValue::Bool(a == b)),
                Operator::Ne => Some(EvalValue::Bool(a != b)),
                _ => None,
            },
            (EvalValue::Str(a), EvalValue::Str(b)) => match op {
                Operator::Eq => Some(EvalValue::Bool(a == b)),
                Operator::Ne => Some(EvalValue::Bool(a != b)),
                _ => None,
            },
            (EvalValue::Type(a), EvalValue::Type(b)) => match op {
                Operator::Eq => Some(EvalValue::Bool(a == b)),
                Operator::Ne => Some(EvalValue::Bool(a != b)),
                _ => None,
            },
            _ => None,
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn path_head_name(&self, node: NodeIndex) -> Option<Atom> {
        match self.ctx.arena.kind(node) {
            AstKind::Path { elements } => elements.first().and_then(|&e| {
                match self.ctx.arena.kind(e) {
                    AstKind::PathElement { name, .. } => Some(*name),
                    _ => None,
                }
            }),
            AstKind::Identifier { name } => Some(*name),
            _ => None,
        }
    }

    /// Resolve a macro argument written as an expression to a type.
    pub(crate) fn eval_type_arg(&mut self, arg: NodeIndex) -> Option<TypeId> {
        if let Some(name) = self.path_head_name(arg) {
            let text = self.ctx.strings.resolve(name).to_string();
            if let Some(kind) = cxy_parser::PrimitiveKind::from_name(&text) {
                return Some(self.ctx.types.primitive(kind));
            }
        }
        match self.eval_expr(arg)? {
            EvalValue::Type(ty) => Some(ty),
            _ => None,
        }
    }

    pub(crate) fn size_of_type(&mut self, ty: TypeId) -> Option<u64> {
        use cxy_types::Type;
        let resolved = self.ctx.types.resolve(ty);
        match self.ctx.types.get(resolved).clone() {
            Type::Primitive(kind) => Some(kind.size()),
            Type::Pointer { .. } | Type::Reference { .. } | Type::Func { .. } => Some(8),
            Type::String => Some(16),
            Type::Array {
                element,
                len: Some(len),
            } => Some(self.size_of_type(element)? * len),
            Type::Tuple { elements } => {
                let mut total = 0;
                for element in elements {
                    total += self.size_of_type(element)?;
                }
                Some(total)
            }
            Type::Enum { base, .. } => self.size_of_type(base),
            _ => None,
        }
    }

    /// Replace a node with the literal form of a value.
    fn replace_with_value(&mut self, node: NodeIndex, value: &EvalValue) {
        let kind = match value {
            EvalValue::Int(v) => AstKind::IntLit {
                value: v.unsigned_abs(),
                suffix: None,
                negative: *v < 0,
            },
            EvalValue::Bool(v) => AstKind::BoolLit { value: *v },
            EvalValue::Float(v) => AstKind::FloatLit {
                value: *v,
                suffix: None,
            },
            EvalValue::Str(raw) | EvalValue::Member(raw, _) => AstKind::StringLit { raw: *raw },
            _ => {
                self.ctx
                    .error_at(node, "this compile-time value has no runtime form");
                AstKind::Error
            }
        };
        self.ctx.arena.replace(node, kind);
        self.ctx.arena.get_mut(node).flags = NodeFlags::GENERATED;
    }

    /// Replace references to `name` with the literal form of `value` in a
    /// subtree (used when splicing unrolled loop bodies).
    fn substitute_name_with_value(&mut self, root: NodeIndex, name: Atom, value: &EvalValue) {
        if self.node_references_name(root, name) {
            self.replace_with_value(root, value);
            return;
        }
        for child in self.ctx.arena.children_of(root) {
            self.substitute_name_with_value(child, name, value);
        }
    }

    /// Replace references to `name` with clones of an argument node (macro
    /// parameter substitution).
    fn substitute_name_with_node(&mut self, root: NodeIndex, name: Atom, replacement: NodeIndex) {
        if self.node_references_name(root, name) {
            let copy = self.ctx.arena.deep_clone(replacement);
            let node = self.ctx.arena.get(copy).clone();
            self.ctx.arena.replace(root, node.kind);
            self.ctx.arena.get_mut(root).flags = node.flags;
            return;
        }
        for child in self.ctx.arena.children_of(root) {
            self.substitute_name_with_node(child, name, replacement);
        }
    }

    fn node_references_name(&self, node: NodeIndex, name: Atom) -> bool {
        match self.ctx.arena.kind(node) {
            AstKind::Identifier { name: n } => *n == name,
            AstKind::Path { elements } => {
                elements.len() == 1
                    && matches!(
                        self.ctx.arena.kind(elements[0]),
                        AstKind::PathElement { name: n, args, .. }
                            if *n == name && args.is_empty()
                    )
            }
            _ => false,
        }
    }
}
