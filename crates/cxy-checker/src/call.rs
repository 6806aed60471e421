//! Call checking and overload resolution.
//!
//! Candidates score exact match (0) < implicit conversion (1) < variadic
//! match (2); inaccessible candidates are rejected and a tie at the best
//! score is an ambiguity error. Generic candidates participate by
//! attempting inference first. Result-typed calls must be caught or the
//! call site is marked as propagating.

use crate::inherit::MemberRef;
use crate::state::CheckerState;
use cxy_parser::{AstKind, NodeFlags, NodeIndex, Operator};
use cxy_types::{Type, TypeId, TypeTable};
use tracing::trace;

/// Score of one viable candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Score {
    conversions: u32,
    variadic: bool,
}

impl Score {
    fn rank(&self) -> u64 {
        (u64::from(self.variadic) << 32) | u64::from(self.conversions)
    }
}

/// Members of builtin types (the exception base) carry no declaration node.
fn is_builtin_decl(decl: NodeIndex) -> bool {
    decl.0 == u32::MAX
}

impl<'a, 'b> CheckerState<'a, 'b> {
    pub(crate) fn check_call(
        &mut self,
        expr: NodeIndex,
        callee: NodeIndex,
        args: &[NodeIndex],
    ) -> TypeId {
        let mut arg_types = Vec::with_capacity(args.len());
        for &arg in args {
            arg_types.push(self.check_expr(arg));
        }

        let ret = self.check_callee(expr, callee, args, &arg_types);
        self.apply_result_policy(expr, ret)
    }

    fn check_callee(
        &mut self,
        expr: NodeIndex,
        callee: NodeIndex,
        args: &[NodeIndex],
        arg_types: &[TypeId],
    ) -> TypeId {
        match self.ctx.arena.kind(callee).clone() {
            // Method call `target.name(args)`.
            AstKind::MemberExpr { target, member, .. } => {
                let target_ty = self.check_expr(target);
                let resolved = self.ctx.types.resolve(target_ty);
                let receiver = match self.ctx.types.get(resolved) {
                    Type::Pointer { pointee, .. } => self.ctx.types.resolve(*pointee),
                    Type::Reference { referred, .. } => self.ctx.types.resolve(*referred),
                    _ => resolved,
                };
                let name = match self.ctx.arena.kind(member) {
                    AstKind::Identifier { name } => *name,
                    _ => return TypeTable::ERROR,
                };
                if self.ctx.types.is_error(receiver) {
                    return TypeTable::ERROR;
                }
                match self.ctx.types.get(receiver).clone() {
                    Type::Struct(_) | Type::Class(_) | Type::Interface(_) => {
                        let members = self.member_lookup(receiver, name);
                        if members.is_empty() {
                            let shown = self.ctx.types.display(receiver, self.ctx.strings);
                            let text = self.ctx.strings.resolve(name).to_string();
                            return self.ctx.error_at(
                                expr,
                                format!("'{shown}' has no method named '{text}'"),
                            );
                        }
                        self.resolve_overload_from_members(expr, &members, args, arg_types)
                    }
                    Type::Module { members, .. } => match members.find(name) {
                        Some(member) => {
                            let fn_ty = member.ty;
                            self.ctx.set_type(callee, fn_ty);
                            self.call_through_type(expr, fn_ty, args, arg_types)
                        }
                        None => {
                            let text = self.ctx.strings.resolve(name).to_string();
                            self.ctx
                                .error_at(expr, format!("module has no export named '{text}'"))
                        }
                    },
                    _ => {
                        // A callable field (function pointer, closure value).
                        let member_ty = self.member_type_of(expr, receiver, name);
                        self.call_through_type(expr, member_ty, args, arg_types)
                    }
                }
            }
            AstKind::Path { elements } => {
                self.check_path_call(expr, callee, &elements, args, arg_types)
            }
            _ => {
                let callee_ty = self.check_expr(callee);
                self.call_through_type(expr, callee_ty, args, arg_types)
            }
        }
    }

    fn check_path_call(
        &mut self,
        expr: NodeIndex,
        callee: NodeIndex,
        elements: &[NodeIndex],
        args: &[NodeIndex],
        arg_types: &[TypeId],
    ) -> TypeId {
        // Calls through multi-element paths or `this`/`super` go through
        // ordinary expression typing of the callee.
        let head_name = elements.first().and_then(|&e| {
            match self.ctx.arena.kind(e) {
                AstKind::PathElement { name, .. } => Some(*name),
                _ => None,
            }
        });
        let head_text = head_name
            .map(|n| self.ctx.strings.resolve(n).to_string())
            .unwrap_or_default();

        // `super(args)` invokes the base-class constructor.
        if head_text == "super" && elements.len() == 1 {
            if let Some(&class_decl) = self.ctx.bindings.enclosing_class.get(&callee) {
                let class_ty = self.ensure_declared(class_decl);
                let resolved = self.ctx.types.resolve(class_ty);
                if let Type::Class(body) = self.ctx.types.get(resolved) {
                    match body.inheritance.base {
                        Some(base) => {
                            let _ = self.construct(expr, base, args, arg_types);
                            return TypeTable::VOID;
                        }
                        None => {
                            return self
                                .ctx
                                .error_at(expr, "'super' used in a class without a base");
                        }
                    }
                }
            }
            return TypeTable::ERROR;
        }

        if elements.len() > 1 || head_text == "this" || head_text == "super" {
            let callee_ty = self.check_expr(callee);
            let resolved = self.ctx.types.resolve(callee_ty);
            // Calling a type (`Color(...)`, `util.Point(...)`) constructs it.
            if let Type::Info { target } = self.ctx.types.get(resolved) {
                let target = *target;
                return self.construct(expr, target, args, arg_types);
            }
            return self.call_through_type(expr, callee_ty, args, arg_types);
        }

        let Some(decl) = self.ctx.bindings.resolution_of(callee) else {
            // Builtin constructors and runtime hooks.
            return match head_text.as_str() {
                "String" => TypeTable::STRING,
                _ => TypeTable::VOID,
            };
        };

        match self.ctx.arena.kind(decl).clone() {
            AstKind::FuncDecl { .. } => {
                let candidates = self
                    .ctx
                    .bindings
                    .overload_chains
                    .get(&callee)
                    .cloned()
                    .unwrap_or_else(|| vec![decl]);
                self.resolve_overload(expr, &candidates, args, arg_types)
            }
            AstKind::StructDecl { .. } | AstKind::ClassDecl { .. } => {
                let ty = self.ensure_declared(decl);
                let resolved = self.ctx.types.resolve(ty);
                if matches!(self.ctx.types.get(resolved), Type::Generic { .. }) {
                    return self.call_generic(expr, resolved, args, arg_types);
                }
                self.construct(expr, resolved, args, arg_types)
            }
            _ => {
                let callee_ty = self.check_expr(callee);
                self.call_through_type(expr, callee_ty, args, arg_types)
            }
        }
    }

    /// Call through a function-typed value (closure struct values call
    /// through their `op_call`).
    pub(crate) fn call_through_type(
        &mut self,
        expr: NodeIndex,
        callee_ty: TypeId,
        args: &[NodeIndex],
        arg_types: &[TypeId],
    ) -> TypeId {
        let resolved = self.ctx.types.resolve(callee_ty);
        match self.ctx.types.get(resolved).clone() {
            Type::Func { params, ret, .. } => {
                self.check_args_against(expr, &params, args, arg_types);
                ret
            }
            Type::Struct(_) | Type::Class(_) => {
                let call_atom = self.ctx.strings.intern(Operator::Call.overload_name());
                let members = self.member_lookup(resolved, call_atom);
                if members.is_empty() {
                    let shown = self.ctx.types.display(resolved, self.ctx.strings);
                    return self
                        .ctx
                        .error_at(expr, format!("'{shown}' is not callable"));
                }
                self.resolve_overload_from_members(expr, &members, args, arg_types)
            }
            Type::Generic { .. } => self.call_generic(expr, resolved, args, arg_types),
            Type::Error => TypeTable::ERROR,
            _ => {
                let shown = self.ctx.types.display(resolved, self.ctx.strings);
                self.ctx
                    .error_at(expr, format!("'{shown}' is not callable"))
            }
        }
    }

    /// Constructor call `T(args)`: check `op_init` and produce `T`.
    fn construct(
        &mut self,
        expr: NodeIndex,
        target: TypeId,
        args: &[NodeIndex],
        arg_types: &[TypeId],
    ) -> TypeId {
        let resolved = self.ctx.types.resolve(target);
        if self.ctx.types.is_error(resolved) {
            return TypeTable::ERROR;
        }
        let init_atom = self.ctx.strings.intern(Operator::Init.overload_name());
        let ctors = self.member_lookup(resolved, init_atom);
        if !ctors.is_empty() {
            self.resolve_overload_from_members(expr, &ctors, args, arg_types);
        } else if !args.is_empty() {
            let shown = self.ctx.types.display(resolved, self.ctx.strings);
            self.ctx.error_at(
                expr,
                format!("'{shown}' has no constructor taking arguments"),
            );
        }
        resolved
    }

    // =========================================================================
    // Overload resolution
    // =========================================================================

    pub(crate) fn resolve_overload(
        &mut self,
        site: NodeIndex,
        candidates: &[NodeIndex],
        args: &[NodeIndex],
        arg_types: &[TypeId],
    ) -> TypeId {
        let mut viable: Vec<(Score, NodeIndex, TypeId)> = Vec::new();
        for &candidate in candidates {
            let decl_ty = self.ensure_declared(candidate);
            let resolved = self.ctx.types.resolve(decl_ty);
            let fn_ty = match self.ctx.types.get(resolved) {
                Type::Generic { .. } => {
                    match self.infer_generic_call(resolved, args, arg_types, site) {
                        Some(instance) => instance,
                        None => continue,
                    }
                }
                Type::Func { .. } => resolved,
                _ => continue,
            };
            if let Some(score) = self.score_candidate(candidate, fn_ty, args, arg_types) {
                viable.push((score, candidate, fn_ty));
            }
        }
        match self.pick_best(site, &mut viable, "function") {
            Some((decl, fn_ty)) => {
                trace!(?decl, "overload resolved");
                self.ctx.set_type(site, fn_ty);
                match self.ctx.types.get(fn_ty) {
                    Type::Func { ret, .. } => *ret,
                    _ => TypeTable::ERROR,
                }
            }
            None => TypeTable::ERROR,
        }
    }

    pub(crate) fn resolve_overload_from_members(
        &mut self,
        site: NodeIndex,
        members: &[MemberRef],
        args: &[NodeIndex],
        arg_types: &[TypeId],
    ) -> TypeId {
        let mut viable: Vec<(Score, NodeIndex, TypeId)> = Vec::new();
        for member in members {
            let resolved = self.ctx.types.resolve(member.ty);
            if !matches!(self.ctx.types.get(resolved), Type::Func { .. }) {
                continue;
            }
            // Members of builtin types carry no declaration node.
            let builtin = is_builtin_decl(member.decl);
            // `@private` members are only callable from inside their type
            // (or a derived one).
            let private = !builtin
                && self.ctx.arena.get(member.decl).attrs.iter().any(|&attr| {
                    matches!(self.ctx.arena.kind(attr), AstKind::Attr { name, .. }
                        if self.ctx.strings.resolve(*name) == "private")
                });
            let accessible = !private
                || self.this_types.iter().any(|&t| {
                    let t = self.ctx.types.resolve(t);
                    t == member.container || self.ctx.types.derives_from(t, member.container)
                });
            if !accessible {
                continue;
            }
            if let Some(score) = self.score_candidate(member.decl, resolved, args, arg_types) {
                viable.push((score, member.decl, resolved));
            }
        }
        if viable.is_empty() && !members.is_empty() {
            // Either nothing matched the arguments or everything was
            // inaccessible.
            let text = if is_builtin_decl(members[0].decl) {
                "member".to_string()
            } else {
                self.ctx
                    .arena
                    .kind(members[0].decl)
                    .decl_name()
                    .map(|n| self.ctx.strings.resolve(n).to_string())
                    .unwrap_or_else(|| "member".to_string())
            };
            return self.ctx.error_at(
                site,
                format!("no accessible overload of '{text}' matches these arguments"),
            );
        }
        match self.pick_best(site, &mut viable, "method") {
            Some((_, fn_ty)) => match self.ctx.types.get(fn_ty) {
                Type::Func { ret, .. } => *ret,
                _ => TypeTable::ERROR,
            },
            None => TypeTable::ERROR,
        }
    }

    fn pick_best(
        &mut self,
        site: NodeIndex,
        viable: &mut Vec<(Score, NodeIndex, TypeId)>,
        what: &str,
    ) -> Option<(NodeIndex, TypeId)> {
        if viable.is_empty() {
            self.ctx
                .error_at(site, format!("no matching {what} overload for this call"));
            return None;
        }
        viable.sort_by_key(|(score, _, _)| score.rank());
        if viable.len() > 1 && viable[0].0.rank() == viable[1].0.rank() {
            self.ctx
                .error_at(site, format!("ambiguous {what} call"));
            for &(_, candidate, _) in viable.iter().take(2) {
                if !is_builtin_decl(candidate) {
                    let loc = self.ctx.arena.loc(candidate);
                    self.ctx.log.note(loc, "candidate is here");
                }
            }
            return None;
        }
        Some((viable[0].1, viable[0].2))
    }

    /// Score one candidate, or `None` when it is not viable.
    fn score_candidate(
        &mut self,
        decl: NodeIndex,
        fn_ty: TypeId,
        args: &[NodeIndex],
        arg_types: &[TypeId],
    ) -> Option<Score> {
        let (params, variadic) = match self.ctx.types.get(fn_ty) {
            Type::Func {
                params, variadic, ..
            } => (params.clone(), *variadic),
            _ => return None,
        };
        let required = self.required_params(decl, params.len());
        if args.len() < required {
            return None;
        }
        if args.len() > params.len() && !variadic {
            return None;
        }
        let mut conversions = 0u32;
        let mut used_variadic = false;
        for (position, &arg_ty) in arg_types.iter().enumerate() {
            match params.get(position) {
                Some(&param_ty) => {
                    let exact = self.ctx.types.resolve(param_ty)
                        == self.ctx.types.resolve(arg_ty);
                    if exact {
                        continue;
                    }
                    if self.assignable(param_ty, arg_ty) {
                        conversions += 1;
                    } else {
                        return None;
                    }
                }
                None => {
                    used_variadic = true;
                }
            }
        }
        Some(Score {
            conversions,
            variadic: used_variadic,
        })
    }

    fn required_params(&self, decl: NodeIndex, fallback: usize) -> usize {
        if is_builtin_decl(decl) {
            return fallback;
        }
        match self.ctx.arena.kind(decl) {
            AstKind::FuncDecl { params, .. } => params
                .iter()
                .take_while(|&&p| {
                    !matches!(
                        self.ctx.arena.kind(p),
                        AstKind::FuncParam {
                            default: Some(_),
                            ..
                        }
                    ) && !self.ctx.arena.flags(p).contains(NodeFlags::VARIADIC)
                })
                .count(),
            _ => fallback,
        }
    }

    fn check_args_against(
        &mut self,
        site: NodeIndex,
        params: &[TypeId],
        args: &[NodeIndex],
        arg_types: &[TypeId],
    ) {
        if args.len() != params.len() {
            self.ctx.error_at(
                site,
                format!(
                    "this call takes {} argument(s), {} given",
                    params.len(),
                    args.len()
                ),
            );
            return;
        }
        for ((&arg, &arg_ty), &param_ty) in args.iter().zip(arg_types).zip(params) {
            if !self.assignable(param_ty, arg_ty) {
                let want = self.ctx.types.display(param_ty, self.ctx.strings);
                let got = self.ctx.types.display(arg_ty, self.ctx.strings);
                self.ctx
                    .error_at(arg, format!("expected '{want}', found '{got}'"));
            }
        }
    }

    // =========================================================================
    // Result propagation
    // =========================================================================

    /// Check the left side of a `catch`, keeping its result type.
    pub(crate) fn check_result_producer(&mut self, lhs: NodeIndex) -> TypeId {
        let saved = self.keep_result;
        self.keep_result = true;
        let ty = self.check_expr(lhs);
        self.keep_result = saved;
        ty
    }

    /// A result-typed call must be caught, or the enclosing function's
    /// return must admit the exception; then the call site propagates.
    fn apply_result_policy(&mut self, expr: NodeIndex, ret: TypeId) -> TypeId {
        if self.keep_result || !self.ctx.types.is_result_type(ret) {
            return ret;
        }
        let enclosing_admits = self
            .return_types
            .last()
            .copied()
            .is_some_and(|r| self.ctx.types.is_result_type(r));
        if enclosing_admits {
            self.ctx.arena.add_flags(expr, NodeFlags::PROPAGATES);
            return self
                .ctx
                .types
                .result_success_type(ret)
                .unwrap_or(TypeTable::VOID);
        }
        let shown = self.ctx.types.display(ret, self.ctx.strings);
        self.ctx.error_at(
            expr,
            format!(
                "call returning '{shown}' may raise; catch it or declare the exception in the return type"
            ),
        )
    }
}
