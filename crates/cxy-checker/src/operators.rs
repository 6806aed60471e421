//! Operator typing and overload dispatch.
//!
//! Binary and unary operators on non-primitive operands look up the
//! canonical member (`op_add`, `op_neg`, ...) and rewrite the expression to
//! a method call; primitives follow the promotion rules.

use crate::state::CheckerState;
use cxy_parser::{AstKind, NodeFlags, NodeIndex, Operator, PrimitiveKind};
use cxy_types::{Type, TypeId, TypeTable};

impl<'a, 'b> CheckerState<'a, 'b> {
    pub(crate) fn check_binary(
        &mut self,
        expr: NodeIndex,
        op: Operator,
        lhs: NodeIndex,
        rhs: NodeIndex,
    ) -> TypeId {
        match op {
            Operator::Catch => return self.check_catch(expr, lhs, rhs),
            Operator::Is => return self.check_is(expr, lhs, rhs),
            _ => {}
        }

        let lhs_ty = self.check_expr(lhs);
        let lhs_resolved = self.ctx.types.resolve(lhs_ty);

        // Overload dispatch on aggregate operands.
        if matches!(
            self.ctx.types.get(lhs_resolved),
            Type::Struct(_) | Type::Class(_)
        ) && op.is_overloadable()
        {
            let rhs_ty = self.check_expr(rhs);
            return self.dispatch_binary_operator(expr, op, lhs, lhs_resolved, rhs, rhs_ty);
        }

        match op {
            Operator::Add
            | Operator::Sub
            | Operator::Mul
            | Operator::Div
            | Operator::Rem => {
                // String concatenation through `+` stays primitive.
                if op == Operator::Add
                    && matches!(self.ctx.types.get(lhs_resolved), Type::String)
                {
                    let rhs_ty = self.check_expr(rhs);
                    if !matches!(
                        self.ctx.types.get(self.ctx.types.resolve(rhs_ty)),
                        Type::String | Type::Error
                    ) {
                        self.ctx
                            .error_at(rhs, "can only concatenate a string to a string");
                    }
                    return TypeTable::STRING;
                }
                let rhs_ty = self.check_expr_expecting(rhs, Some(lhs_ty));
                match self.promote(lhs_ty, rhs_ty) {
                    Some(common) => common,
                    None => self.numeric_mismatch(expr, op, lhs_ty, rhs_ty),
                }
            }
            Operator::Shl | Operator::Shr => {
                // The string builder appends through `<<`.
                if op == Operator::Shl
                    && matches!(self.ctx.types.get(lhs_resolved), Type::String)
                {
                    let rhs_ty = self.check_expr(rhs);
                    if self.ctx.types.is_void(rhs_ty) {
                        self.ctx
                            .error_at(rhs, "cannot append a void value to a string");
                    }
                    return TypeTable::STRING;
                }
                let rhs_ty = self.check_expr(rhs);
                if !self.is_integer_type(lhs_ty) || !self.is_integer_type(rhs_ty) {
                    return self.numeric_mismatch(expr, op, lhs_ty, rhs_ty);
                }
                self.concretize_literal(lhs_ty)
            }
            Operator::BAnd | Operator::BOr | Operator::BXor => {
                let rhs_ty = self.check_expr_expecting(rhs, Some(lhs_ty));
                if !self.is_integer_type(lhs_ty) || !self.is_integer_type(rhs_ty) {
                    return self.numeric_mismatch(expr, op, lhs_ty, rhs_ty);
                }
                match self.promote(lhs_ty, rhs_ty) {
                    Some(common) => common,
                    None => self.numeric_mismatch(expr, op, lhs_ty, rhs_ty),
                }
            }
            Operator::Lt | Operator::Gt | Operator::Leq | Operator::Geq => {
                let rhs_ty = self.check_expr_expecting(rhs, Some(lhs_ty));
                if self.promote(lhs_ty, rhs_ty).is_none() {
                    self.numeric_mismatch(expr, op, lhs_ty, rhs_ty);
                }
                self.ctx.types.primitive(PrimitiveKind::Bool)
            }
            Operator::Eq | Operator::Ne => {
                let rhs_ty = self.check_expr_expecting(rhs, Some(lhs_ty));
                let comparable = self.promote(lhs_ty, rhs_ty).is_some()
                    || self.assignable(lhs_ty, rhs_ty)
                    || self.assignable(rhs_ty, lhs_ty);
                if !comparable {
                    let a = self.ctx.types.display(lhs_ty, self.ctx.strings);
                    let b = self.ctx.types.display(rhs_ty, self.ctx.strings);
                    self.ctx.error_at(
                        expr,
                        format!("cannot compare '{a}' with '{b}'"),
                    );
                }
                self.ctx.types.primitive(PrimitiveKind::Bool)
            }
            Operator::LAnd | Operator::LOr => {
                let rhs_ty = self.check_expr(rhs);
                self.require_condition(lhs, lhs_ty);
                self.require_condition(rhs, rhs_ty);
                self.ctx.types.primitive(PrimitiveKind::Bool)
            }
            Operator::Range => {
                let rhs_ty = self.check_expr_expecting(rhs, Some(lhs_ty));
                match self.promote(lhs_ty, rhs_ty) {
                    Some(common) if self.is_integer_type(common) => {
                        let element = self.concretize_literal(common);
                        // A range is carried as its (start, end) pair.
                        self.ctx.types.tuple_of(vec![element, element])
                    }
                    _ => self.numeric_mismatch(expr, op, lhs_ty, rhs_ty),
                }
            }
            _ => {
                let rhs_ty = self.check_expr(rhs);
                self.numeric_mismatch(expr, op, lhs_ty, rhs_ty)
            }
        }
    }

    fn numeric_mismatch(
        &mut self,
        expr: NodeIndex,
        op: Operator,
        lhs: TypeId,
        rhs: TypeId,
    ) -> TypeId {
        if self.ctx.types.is_error(lhs) || self.ctx.types.is_error(rhs) {
            return TypeTable::ERROR;
        }
        let a = self.ctx.types.display(lhs, self.ctx.strings);
        let b = self.ctx.types.display(rhs, self.ctx.strings);
        let symbol = op.symbol();
        self.ctx.error_at(
            expr,
            format!("operator '{symbol}' is not defined for '{a}' and '{b}'"),
        )
    }

    /// Rewrite `a + b` into `a.op_add(b)` when the member exists.
    fn dispatch_binary_operator(
        &mut self,
        expr: NodeIndex,
        op: Operator,
        lhs: NodeIndex,
        lhs_ty: TypeId,
        rhs: NodeIndex,
        rhs_ty: TypeId,
    ) -> TypeId {
        let name = self.ctx.strings.intern(op.overload_name());
        let overloads = self.member_lookup(lhs_ty, name);
        if overloads.is_empty() {
            return self.numeric_mismatch(expr, op, lhs_ty, rhs_ty);
        }
        let mut result = None;
        for member in &overloads {
            if let Type::Func { params, ret, .. } = self.ctx.types.get(member.ty).clone() {
                if params.len() == 1 && self.assignable(params[0], rhs_ty) {
                    result = Some(ret);
                    break;
                }
            }
        }
        let Some(ret) = result else {
            let shown = self.ctx.types.display(lhs_ty, self.ctx.strings);
            let got = self.ctx.types.display(rhs_ty, self.ctx.strings);
            let overload = op.overload_name();
            return self.ctx.error_at(
                expr,
                format!("no '{overload}' overload on '{shown}' accepts '{got}'"),
            );
        };
        // Rewrite to a method call so later passes see one call form.
        let loc = self.ctx.arena.loc(expr);
        let callee = self.ctx.arena.mk_member(lhs, name, loc);
        self.ctx.set_type(callee, overloads[0].ty);
        self.ctx.arena.replace(
            expr,
            AstKind::CallExpr {
                callee,
                args: vec![rhs],
            },
        );
        self.ctx.arena.get_mut(expr).flags |= NodeFlags::GENERATED;
        ret
    }

    pub(crate) fn dispatch_index_operator(
        &mut self,
        expr: NodeIndex,
        target_ty: TypeId,
        indices: &[NodeIndex],
        index_ty: TypeId,
    ) -> TypeId {
        let name = self.ctx.strings.intern(Operator::Index.overload_name());
        let overloads = self.member_lookup(target_ty, name);
        for member in &overloads {
            if let Type::Func { params, ret, .. } = self.ctx.types.get(member.ty).clone() {
                if params.len() == indices.len()
                    && params.first().is_none_or(|&p| self.assignable(p, index_ty))
                {
                    return ret;
                }
            }
        }
        let shown = self.ctx.types.display(target_ty, self.ctx.strings);
        self.ctx
            .error_at(expr, format!("'{shown}' has no matching op_idx overload"))
    }

    // =========================================================================
    // Unary
    // =========================================================================

    pub(crate) fn check_unary(
        &mut self,
        expr: NodeIndex,
        op: Operator,
        operand: NodeIndex,
        prefix: bool,
    ) -> TypeId {
        // Negated integer literals stay literal so `-128` fits an i8.
        if op == Operator::Minus && prefix {
            if let AstKind::IntLit {
                value,
                suffix,
                negative,
            } = self.ctx.arena.kind(operand).clone()
            {
                self.ctx.arena.replace(
                    expr,
                    AstKind::IntLit {
                        value,
                        suffix,
                        negative: !negative,
                    },
                );
                return self.check_expr(expr);
            }
        }

        let operand_ty = self.check_expr(operand);
        let resolved = self.ctx.types.resolve(operand_ty);

        if matches!(self.ctx.types.get(resolved), Type::Struct(_) | Type::Class(_))
            && op.is_overloadable()
        {
            let name = self.ctx.strings.intern(op.overload_name());
            let overloads = self.member_lookup(resolved, name);
            if let Some(member) = overloads.first() {
                if let Type::Func { ret, .. } = self.ctx.types.get(member.ty) {
                    return *ret;
                }
            }
        }

        match op {
            Operator::Minus | Operator::Plus => match self.ctx.types.get(resolved) {
                Type::Primitive(kind) if kind.is_integer() || kind.is_float() => resolved,
                Type::Literal { .. } => resolved,
                Type::Error => TypeTable::ERROR,
                _ => self.unary_mismatch(expr, op, resolved),
            },
            Operator::Not => {
                self.require_condition(operand, resolved);
                self.ctx.types.primitive(PrimitiveKind::Bool)
            }
            Operator::Compl => {
                if self.is_integer_type(resolved) {
                    self.concretize_literal(resolved)
                } else {
                    self.unary_mismatch(expr, op, resolved)
                }
            }
            Operator::Deref => match self.ctx.types.get(resolved) {
                Type::Pointer { pointee, .. } => *pointee,
                Type::Reference { referred, .. } => *referred,
                Type::Error => TypeTable::ERROR,
                _ => self.unary_mismatch(expr, op, resolved),
            },
            Operator::Refof => self.ctx.types.reference_to(resolved, false),
            Operator::Ptrof => self.ctx.types.pointer_to(resolved, false),
            Operator::Move => resolved,
            Operator::Spread => resolved,
            Operator::Await => resolved,
            Operator::Delete => {
                // `delete e` lowers to the runtime drop hook.
                let loc = self.ctx.arena.loc(expr);
                let drop_atom = self.ctx.strings.intern("__smart_ptr_drop");
                let callee = self.ctx.arena.mk_path(drop_atom, loc);
                self.ctx.arena.replace(
                    expr,
                    AstKind::CallExpr {
                        callee,
                        args: vec![operand],
                    },
                );
                self.ctx.arena.get_mut(expr).flags |= NodeFlags::GENERATED;
                self.ctx.set_type(callee, TypeTable::VOID);
                TypeTable::VOID
            }
            Operator::PreInc | Operator::PreDec | Operator::PostInc | Operator::PostDec => {
                let _ = prefix;
                if self.is_integer_type(resolved) {
                    self.concretize_literal(resolved)
                } else {
                    self.unary_mismatch(expr, op, resolved)
                }
            }
            _ => self.unary_mismatch(expr, op, resolved),
        }
    }

    fn unary_mismatch(&mut self, expr: NodeIndex, op: Operator, ty: TypeId) -> TypeId {
        if self.ctx.types.is_error(ty) {
            return TypeTable::ERROR;
        }
        let shown = self.ctx.types.display(ty, self.ctx.strings);
        let symbol = op.symbol();
        self.ctx.error_at(
            expr,
            format!("operator '{symbol}' is not defined for '{shown}'"),
        )
    }

    // =========================================================================
    // Assignment
    // =========================================================================

    pub(crate) fn check_assign(
        &mut self,
        expr: NodeIndex,
        op: Operator,
        lhs: NodeIndex,
        rhs: NodeIndex,
    ) -> TypeId {
        let lhs_ty = self.check_expr(lhs);
        if !self.is_lvalue(lhs) {
            self.ctx.error_at(lhs, "left side of assignment is not assignable");
        }
        // Assignment to a `const` binding.
        if matches!(self.ctx.arena.kind(lhs), AstKind::Path { .. }) {
            if let Some(decl) = self.ctx.bindings.resolution_of(lhs) {
                if matches!(self.ctx.arena.kind(decl), AstKind::VarDecl { .. })
                    && self.ctx.arena.flags(decl).contains(NodeFlags::CONST)
                {
                    self.ctx.error_at(lhs, "cannot assign to a constant");
                }
            }
        }
        // Assigning through `a[i] = v` on an aggregate goes through
        // op_idx_assign.
        if op == Operator::Assign {
            if let AstKind::IndexExpr { target, .. } = self.ctx.arena.kind(lhs).clone() {
                let target_ty = self.check_expr(target);
                let resolved = self.ctx.types.resolve(target_ty);
                if matches!(self.ctx.types.get(resolved), Type::Struct(_) | Type::Class(_)) {
                    let name = self
                        .ctx
                        .strings
                        .intern(Operator::IndexAssign.overload_name());
                    if self.member_lookup(resolved, name).is_empty() {
                        let shown = self.ctx.types.display(resolved, self.ctx.strings);
                        self.ctx.error_at(
                            lhs,
                            format!("'{shown}' has no op_idx_assign overload"),
                        );
                    }
                }
            }
        }
        let rhs_ty = self.check_expr_expecting(rhs, Some(lhs_ty));
        if op != Operator::Assign {
            // Compound assignment checks the underlying binary operator.
            if self.promote(lhs_ty, rhs_ty).is_none() {
                let resolved = self.ctx.types.resolve(lhs_ty);
                if matches!(self.ctx.types.get(resolved), Type::Struct(_) | Type::Class(_)) {
                    let name = self.ctx.strings.intern(op.overload_name());
                    if self.member_lookup(resolved, name).is_empty() {
                        self.numeric_mismatch(expr, op, lhs_ty, rhs_ty);
                    }
                } else if !matches!(self.ctx.types.get(resolved), Type::String) {
                    self.numeric_mismatch(expr, op, lhs_ty, rhs_ty);
                }
            }
        } else if !self.assignable(lhs_ty, rhs_ty) {
            let want = self.ctx.types.display(lhs_ty, self.ctx.strings);
            let got = self.ctx.types.display(rhs_ty, self.ctx.strings);
            self.ctx
                .error_at(rhs, format!("cannot assign '{got}' to '{want}'"));
        }
        TypeTable::VOID
    }

    fn is_lvalue(&self, expr: NodeIndex) -> bool {
        match self.ctx.arena.kind(expr) {
            AstKind::Path { .. } | AstKind::MemberExpr { .. } | AstKind::IndexExpr { .. } => true,
            AstKind::UnaryExpr {
                op: Operator::Deref,
                ..
            } => true,
            AstKind::GroupExpr { inner } => self.is_lvalue(*inner),
            _ => false,
        }
    }

    // =========================================================================
    // is / catch
    // =========================================================================

    /// `e is T`: on class hierarchies a statically-known upcast folds to
    /// `true` and a dynamic test lowers to a `__tid` comparison through the
    /// vtable; on unions and other values the tag/name comparison stays
    /// symbolic for the backend.
    fn check_is(&mut self, expr: NodeIndex, lhs: NodeIndex, rhs: NodeIndex) -> TypeId {
        let lhs_ty = self.check_expr(lhs);
        let rhs_ty = self.type_from_node(rhs);
        let bool_ty = self.ctx.types.primitive(PrimitiveKind::Bool);
        let lhs_resolved = self.ctx.types.resolve(lhs_ty);
        let rhs_resolved = self.ctx.types.resolve(rhs_ty);

        match self.ctx.types.get(lhs_resolved).clone() {
            Type::Class(_) => {
                if self.ctx.types.derives_from(lhs_resolved, rhs_resolved) {
                    // Statically true upcast.
                    self.ctx.arena.replace(expr, AstKind::BoolLit { value: true });
                    self.ctx.arena.get_mut(expr).flags |= NodeFlags::GENERATED;
                } else if self.ctx.types.derives_from(rhs_resolved, lhs_resolved) {
                    // Dynamic downcast test: e.vtable.__tid == tid(T).
                    if let Some(vtable) = self.ctx.vtables.get(&rhs_resolved) {
                        let tid = vtable.tid;
                        let loc = self.ctx.arena.loc(expr);
                        let vtable_atom = self.ctx.strings.intern("vtable");
                        let tid_atom = self.ctx.strings.intern("__tid");
                        let vtable_ref = self.ctx.arena.mk_member(lhs, vtable_atom, loc);
                        let tid_ref = self.ctx.arena.mk_member(vtable_ref, tid_atom, loc);
                        let tid_lit = self.ctx.arena.mk_int(tid as u128, loc);
                        self.ctx.arena.replace(
                            expr,
                            AstKind::BinaryExpr {
                                op: Operator::Eq,
                                lhs: tid_ref,
                                rhs: tid_lit,
                            },
                        );
                        self.ctx.arena.get_mut(expr).flags |= NodeFlags::GENERATED;
                        let u32_ty = self.ctx.types.primitive(PrimitiveKind::U32);
                        self.ctx.set_type(tid_ref, u32_ty);
                        self.ctx.set_type(tid_lit, u32_ty);
                        self.ctx.set_type(vtable_ref, TypeTable::VOID);
                    }
                } else {
                    let a = self.ctx.types.display(lhs_resolved, self.ctx.strings);
                    let b = self.ctx.types.display(rhs_resolved, self.ctx.strings);
                    self.ctx.error_at(
                        expr,
                        format!("'{a}' can never be an instance of '{b}'"),
                    );
                }
            }
            Type::Union { members } => {
                if !members
                    .iter()
                    .any(|&m| self.ctx.types.resolve(m) == rhs_resolved)
                {
                    let b = self.ctx.types.display(rhs_resolved, self.ctx.strings);
                    self.ctx.error_at(
                        expr,
                        format!("union can never hold a value of type '{b}'"),
                    );
                }
            }
            // Everything else compares type identity by name at compile
            // time.
            Type::Error => return TypeTable::ERROR,
            _ => {
                let statically = lhs_resolved == rhs_resolved;
                self.ctx
                    .arena
                    .replace(expr, AstKind::BoolLit { value: statically });
                self.ctx.arena.get_mut(expr).flags |= NodeFlags::GENERATED;
            }
        }
        bool_ty
    }

    /// `lhs catch { block }`: the expression takes `lhs`'s success type;
    /// the block must yield a compatible value (and may itself raise).
    fn check_catch(&mut self, expr: NodeIndex, lhs: NodeIndex, rhs: NodeIndex) -> TypeId {
        let lhs_ty = self.check_result_producer(lhs);
        if self.ctx.types.is_error(lhs_ty) {
            self.check_stmt(rhs);
            return TypeTable::ERROR;
        }
        if !self.ctx.types.is_result_type(lhs_ty) {
            let shown = self.ctx.types.display(lhs_ty, self.ctx.strings);
            self.ctx.error_at(
                lhs,
                format!("'catch' needs a result-typed left side, got '{shown}'"),
            );
            self.check_stmt(rhs);
            return lhs_ty;
        }
        let success = self
            .ctx
            .types
            .result_success_type(lhs_ty)
            .unwrap_or(TypeTable::VOID);
        self.yield_types.push(success);
        self.check_stmt(rhs);
        self.yield_types.pop();
        let _ = expr;
        success
    }
}
