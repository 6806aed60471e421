//! Generic instantiation and inference.
//!
//! Instantiations are memoized through `Applied` records; the generated
//! type is written exactly once. The declaration is re-checked under a
//! parameter substitution (the substitution stack shadows name resolution,
//! which is equivalent to cloning and rewriting the template). A reentrancy
//! guard returns the pending record for self-referential instantiations,
//! and a failed instantiation marks the declaration so later uses stay
//! quiet.

use crate::state::CheckerState;
use cxy_common::limits::MAX_INSTANTIATION_DEPTH;
use cxy_parser::{AstKind, NodeFlags, NodeIndex};
use cxy_types::{GenericParamInfo, Type, TypeId, TypeTable};
use rustc_hash::FxHashMap;
use tracing::debug;

impl<'a, 'b> CheckerState<'a, 'b> {
    pub(crate) fn instantiate_generic(
        &mut self,
        generic: TypeId,
        args: Vec<TypeId>,
        site: NodeIndex,
    ) -> TypeId {
        let (decl, params) = match self.ctx.types.get(generic) {
            Type::Generic { decl, params, .. } => (*decl, params.clone()),
            _ => return TypeTable::ERROR,
        };
        if self.ctx.arena.flags(decl).contains(NodeFlags::ERRORED) {
            return TypeTable::ERROR;
        }
        if args.len() != params.len() {
            self.ctx.arena.add_flags(decl, NodeFlags::ERRORED);
            return self.ctx.error_at(
                site,
                format!(
                    "wrong number of type arguments: expected {}, found {}",
                    params.len(),
                    args.len()
                ),
            );
        }
        if self.ctx.instantiation_depth >= MAX_INSTANTIATION_DEPTH {
            self.ctx.arena.add_flags(decl, NodeFlags::ERRORED);
            return self
                .ctx
                .error_at(site, "generic instantiation is too deeply recursive");
        }

        let (record, generated) = self.ctx.types.apply_generic(generic, args.clone());
        if let Some(generated) = generated {
            return generated;
        }
        if self.instantiating.contains(&record) {
            // Self-referential instantiation: hand back the pending record;
            // it resolves once the body is sealed.
            return record;
        }
        self.instantiating.insert(record);
        self.ctx.instantiation_depth += 1;
        debug!(?record, "instantiating generic");

        let mut frame = FxHashMap::default();
        for (param, &arg) in params.iter().zip(args.iter()) {
            frame.insert(param.name, arg);
        }
        self.substitutions.push(frame);

        let result = self.instantiate_decl(decl);

        self.substitutions.pop();
        self.ctx.instantiation_depth -= 1;
        self.instantiating.remove(&record);
        if self.ctx.types.is_error(result) {
            self.ctx.arena.add_flags(decl, NodeFlags::ERRORED);
        } else {
            self.ctx.types.set_generated(record, result);
        }
        result
    }

    /// Re-run the declaration's signature (and body for functions) under
    /// the active substitution.
    fn instantiate_decl(&mut self, decl: NodeIndex) -> TypeId {
        // The generic declaration node temporarily types as its instance;
        // save and restore the memoized generic type around the run.
        let saved_type = self.ctx.type_of(decl);
        let was_declared = self.ctx.declared.contains(&decl);

        let result = match self.ctx.arena.kind(decl).clone() {
            AstKind::StructDecl { .. }
            | AstKind::ClassDecl { .. }
            | AstKind::InterfaceDecl { .. } => {
                self.ctx.declared.remove(&decl);
                self.ctx.declaring.insert(decl);
                let instance = self.declare_instance_aggregate(decl);
                self.ctx.declaring.remove(&decl);
                instance
            }
            AstKind::FuncDecl {
                params, ret, body, ..
            } => {
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
                    None => TypeTable::VOID,
                };
                let fn_ty = self
                    .ctx
                    .types
                    .func_type(param_types, ret_ty, Vec::new(), false);
                if let Some(body) = body {
                    self.return_types.push(ret_ty);
                    self.check_stmt(body);
                    self.return_types.pop();
                }
                fn_ty
            }
            AstKind::TypeDecl {
                aliased: Some(aliased),
                ..
            } => self.type_from_node(aliased),
            _ => TypeTable::ERROR,
        };

        match saved_type {
            Some(ty) => {
                self.ctx.set_type(decl, ty);
            }
            None => {
                self.ctx.node_types.remove(&decl);
            }
        }
        if was_declared {
            self.ctx.declared.insert(decl);
        }
        result
    }

    /// Aggregate instantiation reuses the normal signature-phase logic; the
    /// substitution stack redirects the parameter names while the member
    /// types are computed.
    fn declare_instance_aggregate(&mut self, decl: NodeIndex) -> TypeId {
        match self.ctx.arena.kind(decl).clone() {
            AstKind::StructDecl { name, members, .. } => self.declare_aggregate(
                decl,
                name,
                cxy_types::NominalKind::Struct,
                None,
                &[],
                &members,
            ),
            AstKind::ClassDecl {
                name,
                base,
                interfaces,
                members,
                ..
            } => self.declare_aggregate(
                decl,
                name,
                cxy_types::NominalKind::Class,
                base,
                &interfaces,
                &members,
            ),
            AstKind::InterfaceDecl { name, members, .. } => self.declare_aggregate(
                decl,
                name,
                cxy_types::NominalKind::Interface,
                None,
                &[],
                &members,
            ),
            _ => TypeTable::ERROR,
        }
    }

    // =========================================================================
    // Call-site inference
    // =========================================================================

    /// Call of a generic function: infer the type arguments from the value
    /// arguments, instantiate, and return the instance's function type.
    pub(crate) fn infer_generic_call(
        &mut self,
        generic: TypeId,
        args: &[NodeIndex],
        arg_types: &[TypeId],
        site: NodeIndex,
    ) -> Option<TypeId> {
        let (decl, params, inferrable) = match self.ctx.types.get(generic) {
            Type::Generic {
                decl,
                params,
                inferrable,
                ..
            } => (*decl, params.clone(), *inferrable),
            _ => return None,
        };
        if !inferrable {
            return None;
        }
        let formals = match self.ctx.arena.kind(decl) {
            AstKind::FuncDecl { params, .. } => params.clone(),
            _ => return None,
        };

        let mut bound: FxHashMap<cxy_common::Atom, TypeId> = FxHashMap::default();
        for param in &params {
            if let Some(index) = param.infer_index {
                let index = index as usize;
                // A variadic parameter captures the trailing arguments as a
                // tuple; zero extra arguments instantiate as the empty tuple.
                let ty = if index < arg_types.len() {
                    if index + 1 == formals.len() && arg_types.len() > formals.len() {
                        let rest: Vec<TypeId> = arg_types[index..]
                            .iter()
                            .map(|&t| self.concretize_literal(t))
                            .collect();
                        self.ctx.types.tuple_of(rest)
                    } else {
                        let t = arg_types[index];
                        self.concretize_literal(t)
                    }
                } else {
                    self.ctx.types.tuple_of(Vec::new())
                };
                bound.insert(param.name, ty);
            }
        }

        // Structural unification of the remaining parameters.
        for (&formal, &arg_ty) in formals.iter().zip(arg_types.iter()) {
            if let AstKind::FuncParam { ty: Some(ty_node), .. } = self.ctx.arena.kind(formal).clone()
            {
                self.unify(ty_node, arg_ty, &params, &mut bound);
            }
        }

        let mut resolved_args = Vec::with_capacity(params.len());
        for param in &params {
            match bound.get(&param.name) {
                Some(&ty) => resolved_args.push(ty),
                None => {
                    self.ctx.error_at(
                        site,
                        format!(
                            "cannot infer type parameter '{}'",
                            self.ctx.strings.resolve(param.name)
                        ),
                    );
                    return None;
                }
            }
        }
        let _ = args;
        let instance = self.instantiate_generic(generic, resolved_args, site);
        if self.ctx.types.is_error(instance) {
            return None;
        }
        Some(instance)
    }

    /// Unify a formal type AST against an argument type, descending through
    /// pointer/reference/array/tuple/optional wrappers.
    fn unify(
        &mut self,
        formal: NodeIndex,
        arg: TypeId,
        params: &[GenericParamInfo],
        bound: &mut FxHashMap<cxy_common::Atom, TypeId>,
    ) {
        let arg = self.ctx.types.resolve(arg);
        match self.ctx.arena.kind(formal).clone() {
            AstKind::Path { elements } if elements.len() == 1 => {
                if let AstKind::PathElement { name, .. } = self.ctx.arena.kind(elements[0]) {
                    let name = *name;
                    if params.iter().any(|p| p.name == name) {
                        let concrete = self.concretize_literal(arg);
                        bound.entry(name).or_insert(concrete);
                    }
                }
            }
            AstKind::PointerType { pointee } => {
                if let Type::Pointer { pointee: inner, .. } = self.ctx.types.get(arg) {
                    let inner = *inner;
                    self.unify(pointee, inner, params, bound);
                }
            }
            AstKind::ReferenceType { referred } => {
                if let Type::Reference { referred: inner, .. } = self.ctx.types.get(arg) {
                    let inner = *inner;
                    self.unify(referred, inner, params, bound);
                } else {
                    // Auto-take-reference still infers from the value type.
                    self.unify(referred, arg, params, bound);
                }
            }
            AstKind::OptionalType { target } => {
                if let Type::Optional { target: inner } = self.ctx.types.get(arg) {
                    let inner = *inner;
                    self.unify(target, inner, params, bound);
                }
            }
            AstKind::ArrayType { element, .. } => {
                if let Type::Array { element: inner, .. } = self.ctx.types.get(arg) {
                    let inner = *inner;
                    self.unify(element, inner, params, bound);
                }
            }
            AstKind::TupleType { elements } => {
                if let Type::Tuple { elements: inner } = self.ctx.types.get(arg).clone() {
                    for (&e, i) in elements.iter().zip(inner) {
                        self.unify(e, i, params, bound);
                    }
                }
            }
            _ => {}
        }
    }

    /// Call of an uninstantiated generic through a value position.
    pub(crate) fn call_generic(
        &mut self,
        expr: NodeIndex,
        generic: TypeId,
        args: &[NodeIndex],
        arg_types: &[TypeId],
    ) -> TypeId {
        match self.infer_generic_call(generic, args, arg_types, expr) {
            Some(instance) => {
                let resolved = self.ctx.types.resolve(instance);
                match self.ctx.types.get(resolved) {
                    Type::Func { ret, .. } => *ret,
                    // An inferred aggregate instantiation constructs it.
                    Type::Struct(_) | Type::Class(_) => resolved,
                    _ => TypeTable::ERROR,
                }
            }
            None => self
                .ctx
                .error_at(expr, "cannot infer the type arguments of this call"),
        }
    }
}
