//! Statement checking.

use crate::state::CheckerState;
use cxy_parser::{AstKind, NodeFlags, NodeIndex};
use cxy_types::{Type, TypeId, TypeTable};

impl<'a, 'b> CheckerState<'a, 'b> {
    pub(crate) fn check_stmt(&mut self, stmt: NodeIndex) {
        match self.ctx.arena.kind(stmt).clone() {
            AstKind::Block { stmts } => {
                for stmt in stmts {
                    self.check_stmt(stmt);
                }
            }
            AstKind::ExprStmt { expr } => {
                self.check_expr(expr);
            }
            AstKind::VarDecl { .. } => {
                // Local declaration: signature + body phase in one step.
                self.ensure_declared(stmt);
                self.check_decl_body(stmt);
            }
            AstKind::FuncDecl { .. }
            | AstKind::StructDecl { .. }
            | AstKind::ClassDecl { .. }
            | AstKind::TypeDecl { .. } => {
                self.ensure_declared(stmt);
                self.check_decl_body(stmt);
            }
            AstKind::ReturnStmt { value } => self.check_return(stmt, value),
            AstKind::BreakStmt | AstKind::ContinueStmt => {}
            AstKind::DeferStmt { expr } => {
                self.check_expr(expr);
            }
            AstKind::YieldStmt { value } => {
                let value_ty = self.check_expr(value);
                match self.yield_types.last().copied() {
                    Some(expected) => {
                        if !self.assignable(expected, value_ty) {
                            let want = self.ctx.types.display(expected, self.ctx.strings);
                            let got = self.ctx.types.display(value_ty, self.ctx.strings);
                            self.ctx.error_at(
                                value,
                                format!("catch block yields '{got}' where '{want}' is expected"),
                            );
                        }
                    }
                    None => {
                        self.ctx
                            .error_at(stmt, "'yield' is only valid inside a catch block");
                    }
                }
            }
            AstKind::RaiseStmt { value } => {
                // Normally lowered by the shaker; check directly otherwise.
                let value_ty = self.check_expr(value);
                if !self.ctx.types.is_exception(value_ty) && !self.ctx.types.is_error(value_ty)
                {
                    let exception = self.ctx.exception_type;
                    if !self.assignable(exception, value_ty) {
                        let got = self.ctx.types.display(value_ty, self.ctx.strings);
                        self.ctx
                            .error_at(value, format!("cannot raise a value of type '{got}'"));
                    }
                }
                let admits = self
                    .return_types
                    .last()
                    .copied()
                    .is_some_and(|r| self.ctx.types.is_result_type(r));
                if !admits {
                    self.ctx.error_at(
                        stmt,
                        "the enclosing function's return type does not admit exceptions",
                    );
                }
            }
            AstKind::IfStmt {
                cond,
                then,
                otherwise,
            } => {
                if matches!(self.ctx.arena.kind(cond), AstKind::VarDecl { .. }) {
                    self.check_stmt(cond);
                } else {
                    let cond_ty = self.check_expr(cond);
                    self.require_condition(cond, cond_ty);
                }
                self.check_stmt(then);
                if let Some(otherwise) = otherwise {
                    self.check_stmt(otherwise);
                }
            }
            AstKind::WhileStmt { cond, body } => {
                if matches!(self.ctx.arena.kind(cond), AstKind::VarDecl { .. }) {
                    self.check_stmt(cond);
                } else {
                    let cond_ty = self.check_expr(cond);
                    self.require_condition(cond, cond_ty);
                }
                self.check_stmt(body);
            }
            AstKind::ForStmt { var, range, body } => self.check_for(var, range, body),
            AstKind::MatchStmt { scrutinee, arms } => self.check_match(stmt, scrutinee, &arms),
            AstKind::Noop | AstKind::Error => {}
            _ => {
                self.check_expr(stmt);
            }
        }
    }

    fn check_return(&mut self, stmt: NodeIndex, value: Option<NodeIndex>) {
        let expected = self.return_types.last().copied().unwrap_or(TypeTable::VOID);
        match value {
            Some(value) => {
                let value_ty = self.check_expr_expecting(value, Some(expected));
                if !self.assignable(expected, value_ty) {
                    let want = self.ctx.types.display(expected, self.ctx.strings);
                    let got = self.ctx.types.display(value_ty, self.ctx.strings);
                    self.ctx.error_at(
                        value,
                        format!("return type mismatch: expected '{want}', found '{got}'"),
                    );
                }
            }
            None => {
                let void_ok = self.ctx.types.is_void(expected)
                    || self.ctx.types.is_error(expected)
                    || expected == TypeTable::AUTO
                    || match self.ctx.types.get(self.ctx.types.resolve(expected)) {
                        Type::Union { members } => {
                            members.iter().any(|&m| self.ctx.types.is_void(m))
                        }
                        _ => false,
                    };
                if !void_ok {
                    let want = self.ctx.types.display(expected, self.ctx.strings);
                    self.ctx.error_at(
                        stmt,
                        format!("this function must return a value of type '{want}'"),
                    );
                }
            }
        }
    }

    /// `for (const x : range)` iterates an integer range, an array/slice, or
    /// a string.
    fn check_for(&mut self, var: NodeIndex, range: NodeIndex, body: NodeIndex) {
        let range_ty = self.check_expr(range);
        let resolved = self.ctx.types.resolve(range_ty);
        let is_range_pair = matches!(
            self.ctx.arena.kind(range),
            AstKind::BinaryExpr {
                op: cxy_parser::Operator::Range,
                ..
            }
        );
        let (element, index) = match self.ctx.types.get(resolved).clone() {
            Type::Tuple { elements } if is_range_pair && elements.len() == 2 => {
                (elements[0], None)
            }
            Type::Array { element, .. } => {
                let index_ty = self.ctx.types.primitive(cxy_parser::PrimitiveKind::U64);
                (element, Some(index_ty))
            }
            Type::String => {
                let char_ty = self.ctx.types.primitive(cxy_parser::PrimitiveKind::WChar);
                let index_ty = self.ctx.types.primitive(cxy_parser::PrimitiveKind::U64);
                (char_ty, Some(index_ty))
            }
            Type::Error => (TypeTable::ERROR, None),
            _ => {
                let shown = self.ctx.types.display(resolved, self.ctx.strings);
                self.ctx
                    .error_at(range, format!("'{shown}' is not iterable"));
                (TypeTable::ERROR, None)
            }
        };

        // First name binds the element; a second name binds the index.
        if let AstKind::VarDecl { names, .. } = self.ctx.arena.kind(var).clone() {
            self.ctx.set_type(var, element);
            if names.len() > 1 {
                match index {
                    Some(index_ty) => {
                        // The declaration node types as the element; the
                        // second identifier carries the index type.
                        self.ctx.set_type(names[1], index_ty);
                    }
                    None => {
                        self.ctx.error_at(
                            var,
                            "a range loop introduces a single variable",
                        );
                    }
                }
            }
        }
        self.ctx.declared.insert(var);
        self.check_stmt(body);
    }

    /// Match semantics: l-value scrutinee (hoisted by the shaker), constant
    /// case values deduplicated, at most one default arm, no empty match.
    fn check_match(&mut self, stmt: NodeIndex, scrutinee: NodeIndex, arms: &[NodeIndex]) {
        let scrutinee_ty = self.check_expr(scrutinee);
        if arms.is_empty() {
            self.ctx.error_at(stmt, "match statement has no arms");
            return;
        }
        let mut defaults = 0usize;
        let mut seen_values: Vec<i128> = Vec::new();
        for &arm in arms {
            let (patterns, binding, body) = match self.ctx.arena.kind(arm).clone() {
                AstKind::MatchArm {
                    patterns,
                    binding,
                    body,
                } => (patterns, binding, body),
                _ => continue,
            };
            if self.ctx.arena.flags(arm).contains(NodeFlags::DEFAULT_CASE) {
                defaults += 1;
                if defaults > 1 {
                    self.ctx
                        .error_at(arm, "match statement has more than one default arm");
                }
            }
            let mut binding_ty: TypeId = scrutinee_ty;
            for &pattern in &patterns {
                // A pattern naming a type matches that union member or
                // class; otherwise it is a constant compared for equality.
                let pattern_ty = self.check_expr(pattern);
                let pattern_resolved = self.ctx.types.resolve(pattern_ty);
                if let Type::Info { target } = self.ctx.types.get(pattern_resolved) {
                    binding_ty = *target;
                    continue;
                }
                if !self.assignable(scrutinee_ty, pattern_ty)
                    && !self.assignable(pattern_ty, scrutinee_ty)
                    && self.promote(scrutinee_ty, pattern_ty).is_none()
                {
                    let got = self.ctx.types.display(pattern_ty, self.ctx.strings);
                    let want = self.ctx.types.display(scrutinee_ty, self.ctx.strings);
                    self.ctx.error_at(
                        pattern,
                        format!("case of type '{got}' cannot match '{want}'"),
                    );
                }
                if let Some(value) = crate::eval::const_int(self.ctx, pattern) {
                    if seen_values.contains(&value) {
                        self.ctx.error_at(pattern, "duplicate case value");
                    } else {
                        seen_values.push(value);
                    }
                }
            }
            if binding.is_some() {
                self.ctx.set_type(arm, binding_ty);
            }
            self.check_stmt(body);
        }
    }
}
