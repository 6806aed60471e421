//! Expression type checking.
//!
//! Bottom-up: every expression node receives a type in the side table.
//! Subexpressions that already failed carry `Error`, which parents absorb
//! without re-reporting.

use crate::state::CheckerState;
use cxy_common::Atom;
use cxy_parser::{AstKind, NodeFlags, NodeIndex, Operator, PrimitiveKind};
use cxy_types::{Type, TypeId, TypeTable};

impl<'a, 'b> CheckerState<'a, 'b> {
    pub(crate) fn check_expr(&mut self, expr: NodeIndex) -> TypeId {
        self.check_expr_expecting(expr, None)
    }

    pub(crate) fn check_expr_expecting(
        &mut self,
        expr: NodeIndex,
        expected: Option<TypeId>,
    ) -> TypeId {
        let ty = match self.ctx.arena.kind(expr).clone() {
            AstKind::NullLit => TypeTable::NULL,
            AstKind::BoolLit { .. } => self.ctx.types.primitive(PrimitiveKind::Bool),
            AstKind::CharLit { .. } => self.ctx.types.primitive(PrimitiveKind::WChar),
            AstKind::StringLit { .. } => TypeTable::STRING,
            AstKind::IntLit { suffix, value, negative } => match suffix {
                Some(suffix) => {
                    let kind = primitive_of_suffix(suffix);
                    let fits = if kind.is_signed() {
                        cxy_common::numeric::fits_signed(value, negative, kind.bits())
                    } else {
                        !negative && cxy_common::numeric::fits_unsigned(value, kind.bits())
                    };
                    if !fits {
                        let name = kind.name();
                        self.ctx.error_at(
                            expr,
                            format!("integer literal does not fit in '{name}'"),
                        );
                    }
                    self.ctx.types.primitive(kind)
                }
                // Pending literal: context forces the concrete primitive.
                None => match expected {
                    Some(want) if self.literal_fits(want, expr) => {
                        self.ctx.types.resolve(want)
                    }
                    _ => self.ctx.types.literal_of(expr),
                },
            },
            AstKind::FloatLit { suffix, .. } => match suffix {
                Some(cxy_lexer::FloatSuffix::F32) => self.ctx.types.primitive(PrimitiveKind::F32),
                _ => self.ctx.types.primitive(PrimitiveKind::F64),
            },
            AstKind::Path { elements } => self.check_path(expr, &elements),
            AstKind::Identifier { .. } => self.check_identifier(expr),
            AstKind::MemberExpr {
                target,
                member,
                optional,
            } => self.check_member(expr, target, member, optional),
            AstKind::CallExpr { callee, args } => self.check_call(expr, callee, &args),
            AstKind::MacroCallExpr { args, .. } => {
                // Runtime-provided macros (`__async`) survive to here; their
                // arguments still check.
                for arg in args {
                    self.check_expr(arg);
                }
                TypeTable::VOID
            }
            AstKind::IndexExpr { target, indices } => self.check_index(expr, target, &indices),
            AstKind::UnaryExpr {
                op,
                operand,
                prefix,
            } => self.check_unary(expr, op, operand, prefix),
            AstKind::BinaryExpr { op, lhs, rhs } => self.check_binary(expr, op, lhs, rhs),
            AstKind::AssignExpr { op, lhs, rhs } => self.check_assign(expr, op, lhs, rhs),
            AstKind::TernaryExpr {
                cond,
                then,
                otherwise,
            } => {
                let cond_ty = self.check_expr(cond);
                self.require_condition(cond, cond_ty);
                let then_ty = self.check_expr_expecting(then, expected);
                let else_ty = self.check_expr_expecting(otherwise, expected);
                match self.promote(then_ty, else_ty) {
                    Some(common) => common,
                    None => {
                        if self.assignable(then_ty, else_ty) {
                            then_ty
                        } else if self.assignable(else_ty, then_ty) {
                            else_ty
                        } else {
                            let a = self.ctx.types.display(then_ty, self.ctx.strings);
                            let b = self.ctx.types.display(else_ty, self.ctx.strings);
                            self.ctx.error_at(
                                expr,
                                format!("ternary branches have incompatible types '{a}' and '{b}'"),
                            )
                        }
                    }
                }
            }
            AstKind::CastExpr {
                expr: inner,
                target,
                unchecked,
            } => self.check_cast(expr, inner, target, unchecked),
            AstKind::TupleExpr { elements } => {
                let mut element_types = Vec::with_capacity(elements.len());
                for element in elements {
                    let ty = self.check_expr(element);
                    let ty = self.concretize_literal(ty);
                    element_types.push(ty);
                }
                self.ctx.types.tuple_of(element_types)
            }
            AstKind::ArrayExpr { elements } => self.check_array_literal(expr, &elements, expected),
            AstKind::StructExpr { left, fields } => self.check_struct_expr(expr, left, &fields),
            AstKind::GroupExpr { inner } => self.check_expr_expecting(inner, expected),
            AstKind::NewExpr { target, args } => self.check_new(expr, target, &args),
            AstKind::Block { stmts } => {
                // Expression blocks produced by lowering yield their last
                // statement's value.
                debug_assert!(
                    self.ctx.arena.flags(expr).contains(NodeFlags::BLOCK_RETURNS)
                        || stmts.is_empty()
                );
                let mut last = TypeTable::VOID;
                for &stmt in &stmts {
                    self.check_stmt(stmt);
                    if let AstKind::ExprStmt { expr: e } = self.ctx.arena.kind(stmt) {
                        last = self.ctx.type_of(*e).unwrap_or(TypeTable::VOID);
                    }
                }
                last
            }
            AstKind::ClosureExpr { params, ret, body, .. } => {
                // Only reachable when the shaker has not run (tests, tools).
                let mut param_types = Vec::new();
                for &param in &params {
                    let ty = match self.ctx.arena.kind(param).clone() {
                        AstKind::FuncParam { ty: Some(ty), .. } => self.type_from_node(ty),
                        _ => TypeTable::AUTO,
                    };
                    self.ctx.set_type(param, ty);
                    param_types.push(ty);
                }
                let ret_ty = match ret {
                    Some(ret) => self.type_from_node(ret),
                    None => TypeTable::AUTO,
                };
                self.return_types.push(ret_ty);
                self.check_stmt(body);
                self.return_types.pop();
                self.ctx
                    .types
                    .func_type(param_types, ret_ty, Vec::new(), false)
            }
            AstKind::Substitute { expr: inner } => self.check_expr(inner),
            AstKind::StringExpr { parts } => {
                for part in parts {
                    self.check_expr(part);
                }
                TypeTable::STRING
            }
            AstKind::AsmExpr {
                outputs, inputs, ..
            } => {
                for node in outputs.into_iter().chain(inputs) {
                    self.check_expr(node);
                }
                TypeTable::VOID
            }
            AstKind::Noop | AstKind::Error => TypeTable::ERROR,
            kind if kind.is_type_syntax() => {
                let target = self.type_from_node(expr);
                self.ctx.types.info_of(target)
            }
            other => {
                let tag = other.tag_name();
                return self
                    .ctx
                    .error_at(expr, format!("'{tag}' is not an expression"));
            }
        };
        self.ctx.set_type(expr, ty)
    }

    // =========================================================================
    // Names
    // =========================================================================

    fn check_identifier(&mut self, expr: NodeIndex) -> TypeId {
        match self.ctx.bindings.resolution_of(expr) {
            Some(decl) => self.type_of_decl_ref(decl),
            None => TypeTable::ERROR,
        }
    }

    pub(crate) fn check_path(&mut self, path: NodeIndex, elements: &[NodeIndex]) -> TypeId {
        let Some(&head) = elements.first() else {
            return TypeTable::ERROR;
        };
        let head_name = match self.ctx.arena.kind(head) {
            AstKind::PathElement { name, .. } => *name,
            _ => return TypeTable::ERROR,
        };
        let text = self.ctx.strings.resolve(head_name).to_string();

        // `this` / `super` resolve against the enclosing aggregate.
        if text == "this" || text == "super" {
            let Some(&class_decl) = self.ctx.bindings.enclosing_class.get(&path) else {
                return TypeTable::ERROR;
            };
            let mut base_ty = self.ensure_declared(class_decl);
            base_ty = self.ctx.types.resolve(base_ty);
            if text == "super" {
                base_ty = match self.ctx.types.get(base_ty) {
                    Type::Class(body) => match body.inheritance.base {
                        Some(base) => self.ctx.types.resolve(base),
                        None => {
                            return self
                                .ctx
                                .error_at(path, "'super' used in a class without a base");
                        }
                    },
                    _ => return self.ctx.error_at(path, "'super' outside of a class"),
                };
            }
            return self.resolve_path_tail(path, base_ty, &elements[1..]);
        }

        if let Some(subst) = self.lookup_substitution(head_name) {
            let info = self.ctx.types.info_of(subst);
            return self.resolve_path_tail(path, info, &elements[1..]);
        }

        // Type names used in expression position (sizeof arguments, generic
        // indexing, `is` comparisons spelled as values).
        if let Some(kind) = PrimitiveKind::from_name(&text) {
            let ty = self.ctx.types.primitive(kind);
            let info = self.ctx.types.info_of(ty);
            return self.resolve_path_tail(path, info, &elements[1..]);
        }
        if text == "Exception" {
            let info = self.ctx.types.info_of(self.ctx.exception_type);
            return self.resolve_path_tail(path, info, &elements[1..]);
        }

        let Some(decl) = self.ctx.bindings.resolution_of(path) else {
            // Builtin names resolve to opaque runtime symbols.
            return TypeTable::ERROR;
        };

        // Enum option syntactically resolved by the binder.
        if elements.len() > 1 {
            if let Some(second_decl) = self.ctx.bindings.resolution_of(elements[1]) {
                if matches!(self.ctx.arena.kind(second_decl), AstKind::EnumOption { .. }) {
                    return self.ensure_declared(decl);
                }
            }
        }

        let head_ty = self.type_of_decl_ref(decl);
        self.resolve_path_tail(path, head_ty, &elements[1..])
    }

    /// Resolve the remaining path elements as member accesses.
    fn resolve_path_tail(
        &mut self,
        path: NodeIndex,
        mut current: TypeId,
        rest: &[NodeIndex],
    ) -> TypeId {
        for &element in rest {
            let name = match self.ctx.arena.kind(element) {
                AstKind::PathElement { name, .. } => *name,
                _ => return TypeTable::ERROR,
            };
            current = self.member_type_of(path, current, name);
            if self.ctx.types.is_error(current) {
                return current;
            }
        }
        current
    }

    /// Type of a reference to a declaration.
    pub(crate) fn type_of_decl_ref(&mut self, decl: NodeIndex) -> TypeId {
        match self.ctx.arena.kind(decl).clone() {
            AstKind::VarDecl { .. } | AstKind::FuncParam { .. } => {
                match self.ctx.type_of(decl) {
                    Some(ty) if ty != TypeTable::AUTO => ty,
                    _ => self.ensure_declared(decl),
                }
            }
            AstKind::FuncDecl { .. } => self.ensure_declared(decl),
            AstKind::StructDecl { .. }
            | AstKind::ClassDecl { .. }
            | AstKind::InterfaceDecl { .. }
            | AstKind::EnumDecl { .. }
            | AstKind::TypeDecl { .. } => {
                let ty = self.ensure_declared(decl);
                self.ctx.types.info_of(ty)
            }
            AstKind::ImportDecl { .. } => self
                .ctx
                .module_exports
                .get(&decl)
                .copied()
                .unwrap_or(TypeTable::ERROR),
            AstKind::EnumOption { .. } => self.ctx.type_of(decl).unwrap_or(TypeTable::ERROR),
            AstKind::GenericParam { .. } => self.ensure_declared(decl),
            AstKind::MatchArm { .. } => self.ctx.type_of(decl).unwrap_or(TypeTable::AUTO),
            _ => TypeTable::ERROR,
        }
    }

    // =========================================================================
    // Member access
    // =========================================================================

    fn check_member(
        &mut self,
        expr: NodeIndex,
        target: NodeIndex,
        member: NodeIndex,
        optional: bool,
    ) -> TypeId {
        let target_ty = self.check_expr(target);
        let resolved = self.ctx.types.resolve(target_ty);

        // Tuple element access `t.0`.
        if let AstKind::IntLit { value, .. } = self.ctx.arena.kind(member) {
            let index = *value as usize;
            return match self.ctx.types.get(resolved) {
                Type::Tuple { elements } => match elements.get(index) {
                    Some(&element) => element,
                    None => self.ctx.error_at(
                        expr,
                        format!("tuple has no element {index}"),
                    ),
                },
                Type::Error => TypeTable::ERROR,
                _ => {
                    let shown = self.ctx.types.display(resolved, self.ctx.strings);
                    self.ctx
                        .error_at(expr, format!("'{shown}' is not a tuple"))
                }
            };
        }

        let name = match self.ctx.arena.kind(member) {
            AstKind::Identifier { name } => *name,
            _ => return TypeTable::ERROR,
        };

        if optional {
            if let Type::Optional { target: inner } = self.ctx.types.get(resolved) {
                let inner = *inner;
                let member_ty = self.member_type_of(expr, inner, name);
                if self.ctx.types.is_error(member_ty) {
                    return member_ty;
                }
                return self.ctx.types.optional_of(member_ty);
            }
        }
        self.member_type_of(expr, resolved, name)
    }

    /// Member lookup dispatcher shared by paths and member expressions.
    pub(crate) fn member_type_of(&mut self, site: NodeIndex, ty: TypeId, name: Atom) -> TypeId {
        let resolved = self.ctx.types.resolve(ty);
        if self.ctx.types.is_error(resolved) {
            return TypeTable::ERROR;
        }
        // Auto-deref through pointers and references.
        let receiver = match self.ctx.types.get(resolved) {
            Type::Pointer { pointee, .. } => self.ctx.types.resolve(*pointee),
            Type::Reference { referred, .. } => self.ctx.types.resolve(*referred),
            _ => resolved,
        };
        match self.ctx.types.get(receiver).clone() {
            Type::Struct(_) | Type::Class(_) | Type::Interface(_) => {
                let found = self.member_lookup(receiver, name);
                match found.first() {
                    Some(member) => member.ty,
                    None => {
                        let shown = self.ctx.types.display(receiver, self.ctx.strings);
                        let text = self.ctx.strings.resolve(name).to_string();
                        self.ctx.error_at(
                            site,
                            format!("'{shown}' has no member named '{text}'"),
                        )
                    }
                }
            }
            Type::Module { members, .. } => match members.find(name) {
                Some(member) => member.ty,
                None => {
                    let text = self.ctx.strings.resolve(name).to_string();
                    self.ctx
                        .error_at(site, format!("module has no export named '{text}'"))
                }
            },
            Type::Info { target } => {
                let target = self.ctx.types.resolve(target);
                match self.ctx.types.get(target).clone() {
                    // Enum option access `Color.Red`.
                    Type::Enum { options, .. } => {
                        if options.iter().any(|&(n, _)| n == name) {
                            target
                        } else {
                            let text = self.ctx.strings.resolve(name).to_string();
                            self.ctx.error_at(
                                site,
                                format!("enum has no option named '{text}'"),
                            )
                        }
                    }
                    // Static member access through the type name.
                    Type::Struct(_) | Type::Class(_) => {
                        let found = self.member_lookup(target, name);
                        match found.first() {
                            Some(member) => member.ty,
                            None => {
                                let shown =
                                    self.ctx.types.display(target, self.ctx.strings);
                                let text = self.ctx.strings.resolve(name).to_string();
                                self.ctx.error_at(
                                    site,
                                    format!("'{shown}' has no member named '{text}'"),
                                )
                            }
                        }
                    }
                    _ => {
                        let text = self.ctx.strings.resolve(name).to_string();
                        self.ctx
                            .error_at(site, format!("type has no member '{text}'"))
                    }
                }
            }
            Type::String => {
                // Builtin string members.
                let text = self.ctx.strings.resolve(name).to_string();
                match text.as_str() {
                    "len" => self.ctx.types.primitive(PrimitiveKind::U64),
                    _ => self
                        .ctx
                        .error_at(site, format!("string has no member '{text}'")),
                }
            }
            Type::Array { element, .. } => {
                let element = element;
                let text = self.ctx.strings.resolve(name).to_string();
                match text.as_str() {
                    "len" => self.ctx.types.primitive(PrimitiveKind::U64),
                    "data" => self.ctx.types.pointer_to(element, false),
                    _ => self
                        .ctx
                        .error_at(site, format!("array has no member '{text}'")),
                }
            }
            Type::Error => TypeTable::ERROR,
            _ => {
                let shown = self.ctx.types.display(receiver, self.ctx.strings);
                let text = self.ctx.strings.resolve(name).to_string();
                self.ctx.error_at(
                    site,
                    format!("'{shown}' has no member named '{text}'"),
                )
            }
        }
    }

    // =========================================================================
    // Literals with context
    // =========================================================================

    fn check_array_literal(
        &mut self,
        expr: NodeIndex,
        elements: &[NodeIndex],
        expected: Option<TypeId>,
    ) -> TypeId {
        let expected_element = expected.and_then(|want| {
            match self.ctx.types.get(self.ctx.types.resolve(want)) {
                Type::Array { element, .. } => Some(*element),
                _ => None,
            }
        });
        let mut element_ty = expected_element.unwrap_or(TypeTable::AUTO);
        for &element in elements {
            let ty = self.check_expr_expecting(
                element,
                (element_ty != TypeTable::AUTO).then_some(element_ty),
            );
            if element_ty == TypeTable::AUTO {
                element_ty = self.concretize_literal(ty);
            } else if !self.assignable(element_ty, ty) {
                let want = self.ctx.types.display(element_ty, self.ctx.strings);
                let got = self.ctx.types.display(ty, self.ctx.strings);
                self.ctx.error_at(
                    element,
                    format!("array element of type '{got}' does not fit '{want}'"),
                );
            }
        }
        if element_ty == TypeTable::AUTO && elements.is_empty() {
            return self.ctx.error_at(expr, "cannot infer the element type of an empty literal");
        }
        // In slice context the literal becomes a slice construction.
        match expected.map(|want| self.ctx.types.resolve(want)) {
            Some(want)
                if matches!(
                    self.ctx.types.get(want),
                    Type::Array { len: None, .. }
                ) =>
            {
                self.ctx.types.slice_of(element_ty)
            }
            _ => self.ctx.types.array_of(element_ty, Some(elements.len() as u64)),
        }
    }

    fn check_struct_expr(
        &mut self,
        expr: NodeIndex,
        left: NodeIndex,
        fields: &[NodeIndex],
    ) -> TypeId {
        let target = match self.ctx.arena.kind(left) {
            AstKind::Path { .. } => {
                let ty = self.type_from_node(left);
                self.ctx.types.resolve(ty)
            }
            // `Box[i32]{...}`: the indexed path is a generic instantiation.
            AstKind::IndexExpr { .. } => {
                let ty = self.check_expr(left);
                let resolved = self.ctx.types.resolve(ty);
                match self.ctx.types.get(resolved) {
                    Type::Info { target } => self.ctx.types.resolve(*target),
                    _ => resolved,
                }
            }
            _ => return TypeTable::ERROR,
        };
        if self.ctx.types.is_error(target) {
            return TypeTable::ERROR;
        }
        let body = match self.ctx.types.get(target) {
            Type::Struct(body) | Type::Class(body) => body.clone(),
            _ => {
                let shown = self.ctx.types.display(target, self.ctx.strings);
                return self.ctx.error_at(
                    expr,
                    format!("'{shown}' cannot be built with a struct expression"),
                );
            }
        };
        for &field in fields {
            let (name, value) = match self.ctx.arena.kind(field) {
                AstKind::FieldInit { name, value } => (*name, *value),
                _ => continue,
            };
            match body.members.find(name) {
                Some(member) => {
                    let member_decl = member.decl;
                    let member_ty = member.ty;
                    let value_ty = self.check_expr_expecting(
                        value,
                        (member_ty != TypeTable::AUTO).then_some(member_ty),
                    );
                    if member_ty == TypeTable::AUTO {
                        // Closure capture fields learn their type here.
                        let concrete = self.concretize_literal(value_ty);
                        self.ctx.set_type(member_decl, concrete);
                        self.ctx.set_type(field, concrete);
                    } else if !self.assignable(member_ty, value_ty) {
                        let want = self.ctx.types.display(member_ty, self.ctx.strings);
                        let got = self.ctx.types.display(value_ty, self.ctx.strings);
                        self.ctx.error_at(
                            value,
                            format!("cannot initialize field of type '{want}' from '{got}'"),
                        );
                    } else {
                        self.ctx.set_type(field, member_ty);
                    }
                }
                None => {
                    let shown = self.ctx.types.display(target, self.ctx.strings);
                    let text = self.ctx.strings.resolve(name).to_string();
                    self.ctx.error_at(
                        field,
                        format!("'{shown}' has no field named '{text}'"),
                    );
                }
            }
        }
        target
    }

    // =========================================================================
    // new / index / cast
    // =========================================================================

    fn check_new(&mut self, expr: NodeIndex, target: NodeIndex, args: &[NodeIndex]) -> TypeId {
        let ty = self.type_from_node(target);
        let resolved = self.ctx.types.resolve(ty);
        if self.ctx.types.is_error(resolved) {
            return TypeTable::ERROR;
        }
        let mut arg_types = Vec::new();
        for &arg in args {
            arg_types.push(self.check_expr(arg));
        }
        // Resolve the constructor overload when the type declares one.
        let init_atom = self.ctx.strings.intern(Operator::Init.overload_name());
        let ctors = self.member_lookup(resolved, init_atom);
        if !ctors.is_empty() {
            self.resolve_overload_from_members(expr, &ctors, args, &arg_types);
        } else if !args.is_empty() {
            let shown = self.ctx.types.display(resolved, self.ctx.strings);
            self.ctx.error_at(
                expr,
                format!("'{shown}' has no constructor taking arguments"),
            );
        }
        match self.ctx.types.get(resolved) {
            // Classes are reference types already.
            Type::Class(_) => resolved,
            _ => self.ctx.types.pointer_to(resolved, false),
        }
    }

    fn check_index(&mut self, expr: NodeIndex, target: NodeIndex, indices: &[NodeIndex]) -> TypeId {
        // A generic declaration indexed in expression position is an
        // explicit instantiation.
        if let AstKind::Path { .. } = self.ctx.arena.kind(target) {
            if let Some(decl) = self.ctx.bindings.resolution_of(target) {
                let decl_ty = self.ctx.type_of(decl).unwrap_or_else(|| self.ensure_declared(decl));
                let resolved = self.ctx.types.resolve(decl_ty);
                if matches!(self.ctx.types.get(resolved), Type::Generic { .. }) {
                    let arg_types: Vec<TypeId> = indices
                        .iter()
                        .map(|&index| {
                            let ty = self.check_expr(index);
                            match self.ctx.types.get(self.ctx.types.resolve(ty)) {
                                Type::Info { target } => *target,
                                _ => ty,
                            }
                        })
                        .collect();
                    let instance = self.instantiate_generic(resolved, arg_types, expr);
                    self.ctx.set_type(target, instance);
                    return self.ctx.types.info_of(instance);
                }
            }
        }

        let target_ty = self.check_expr(target);
        let resolved = self.ctx.types.resolve(target_ty);
        let index_ty = match indices.first() {
            Some(&index) => self.check_expr(index),
            None => return self.ctx.error_at(expr, "index expression needs an index"),
        };
        match self.ctx.types.get(resolved).clone() {
            Type::Array { element, .. } => {
                if !self.is_integer_type(index_ty) {
                    self.ctx.error_at(expr, "array index must be an integer");
                }
                element
            }
            Type::Pointer { pointee, .. } => {
                if !self.is_integer_type(index_ty) {
                    self.ctx.error_at(expr, "pointer index must be an integer");
                }
                pointee
            }
            Type::Tuple { elements } => {
                match indices
                    .first()
                    .and_then(|&index| crate::eval::const_int(self.ctx, index))
                {
                    Some(n) if (n as usize) < elements.len() => elements[n as usize],
                    _ => self
                        .ctx
                        .error_at(expr, "tuple index must be a constant in range"),
                }
            }
            Type::String => self.ctx.types.primitive(PrimitiveKind::Char),
            Type::Struct(_) | Type::Class(_) => {
                // Operator overload dispatch for `a[i]`.
                self.dispatch_index_operator(expr, resolved, indices, index_ty)
            }
            Type::Error => TypeTable::ERROR,
            _ => {
                let shown = self.ctx.types.display(resolved, self.ctx.strings);
                self.ctx
                    .error_at(expr, format!("'{shown}' cannot be indexed"))
            }
        }
    }

    fn check_cast(
        &mut self,
        expr: NodeIndex,
        inner: NodeIndex,
        target: NodeIndex,
        unchecked: bool,
    ) -> TypeId {
        let from = self.check_expr(inner);
        let to = self.type_from_node(target);
        let to_resolved = self.ctx.types.resolve(to);
        if unchecked || self.ctx.types.is_error(to_resolved) || self.ctx.types.is_error(from) {
            return to_resolved;
        }
        if self.assignable(to_resolved, from) {
            return to_resolved;
        }
        // Numeric casts go both directions explicitly.
        let from_resolved = self.ctx.types.resolve(from);
        let numeric = matches!(
            (self.ctx.types.get(to_resolved), self.ctx.types.get(from_resolved)),
            (Type::Primitive(_), Type::Primitive(_) | Type::Literal { .. })
        );
        if numeric {
            return to_resolved;
        }
        // Pointer casts between pointer types are explicit-only but legal.
        if matches!(
            (self.ctx.types.get(to_resolved), self.ctx.types.get(from_resolved)),
            (Type::Pointer { .. }, Type::Pointer { .. })
        ) {
            return to_resolved;
        }
        // Downcast along a class hierarchy.
        if self.ctx.types.derives_from(to_resolved, from_resolved) {
            return to_resolved;
        }
        // An op_init constructor on the target accepts the source.
        let init_atom = self.ctx.strings.intern(Operator::Init.overload_name());
        let ctors = self.member_lookup(to_resolved, init_atom);
        for ctor in &ctors {
            if let Type::Func { params, .. } = self.ctx.types.get(ctor.ty).clone() {
                if params.len() == 1 && self.assignable(params[0], from) {
                    return to_resolved;
                }
            }
        }
        let want = self.ctx.types.display(to_resolved, self.ctx.strings);
        let got = self.ctx.types.display(from, self.ctx.strings);
        self.ctx
            .error_at(expr, format!("cannot cast '{got}' to '{want}'"))
    }

    // =========================================================================
    // Conditions
    // =========================================================================

    /// A condition must be a bool, or a type with `op_truthy`, or an
    /// optional/pointer (null test).
    pub(crate) fn require_condition(&mut self, node: NodeIndex, ty: TypeId) {
        let resolved = self.ctx.types.resolve(ty);
        if self.is_boolean(resolved) {
            return;
        }
        match self.ctx.types.get(resolved).clone() {
            Type::Optional { .. } | Type::Pointer { .. } => {}
            Type::Struct(_) | Type::Class(_) => {
                let truthy = self.ctx.strings.intern(Operator::Truthy.overload_name());
                if self.member_lookup(resolved, truthy).is_empty() {
                    let shown = self.ctx.types.display(resolved, self.ctx.strings);
                    self.ctx.error_at(
                        node,
                        format!("'{shown}' cannot be used as a condition (no op_truthy)"),
                    );
                }
            }
            _ => {
                let shown = self.ctx.types.display(resolved, self.ctx.strings);
                self.ctx
                    .error_at(node, format!("'{shown}' is not a boolean condition"));
            }
        }
    }
}

fn primitive_of_suffix(suffix: cxy_lexer::IntSuffix) -> PrimitiveKind {
    use cxy_lexer::IntSuffix;
    match suffix {
        IntSuffix::I8 => PrimitiveKind::I8,
        IntSuffix::I16 => PrimitiveKind::I16,
        IntSuffix::I32 => PrimitiveKind::I32,
        IntSuffix::I64 => PrimitiveKind::I64,
        IntSuffix::I128 => PrimitiveKind::I128,
        IntSuffix::U8 => PrimitiveKind::U8,
        IntSuffix::U16 => PrimitiveKind::U16,
        IntSuffix::U32 => PrimitiveKind::U32,
        IntSuffix::U64 => PrimitiveKind::U64,
        IntSuffix::U128 => PrimitiveKind::U128,
    }
}
