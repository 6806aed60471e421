//! Checker driver: two-phase declaration checking.
//!
//! Phase one (signatures) allocates nominal shells, types fields and
//! function signatures without entering bodies, threading a `This`
//! placeholder through self-references. Phase two resolves `This` and
//! checks bodies against the fully built member tables. The split lets
//! top-level declarations refer to one another without ordering
//! constraints.

use crate::context::{CheckedModule, CheckerContext};
use cxy_common::Atom;
use cxy_parser::{AstKind, NodeFlags, NodeIndex, Operator};
use cxy_types::{
    Inheritance, MembersContainer, NamedMember, NominalFlags, NominalKind, Type, TypeId, TypeTable,
};
use rustc_hash::FxHashMap;
use tracing::debug;

pub struct CheckerState<'a, 'b> {
    pub ctx: &'a mut CheckerContext<'b>,
    /// Return types of the enclosing function stack.
    pub(crate) return_types: Vec<TypeId>,
    /// `this` type stack for method bodies.
    pub(crate) this_types: Vec<TypeId>,
    /// Success type expected by the enclosing catch block, for `yield`.
    pub(crate) yield_types: Vec<TypeId>,
    /// Active generic substitutions (innermost last).
    pub(crate) substitutions: Vec<FxHashMap<Atom, TypeId>>,
    /// `Applied` records currently being generated (reentrancy guard).
    pub(crate) instantiating: rustc_hash::FxHashSet<TypeId>,
    /// Comptime evaluation environment (`#const` bindings, loop variables).
    pub(crate) eval_env: Vec<FxHashMap<Atom, crate::eval::EvalValue>>,
    /// Set while checking the left side of a `catch`: result types are kept
    /// instead of propagated.
    pub(crate) keep_result: bool,
}

impl<'a, 'b> CheckerState<'a, 'b> {
    pub fn new(ctx: &'a mut CheckerContext<'b>) -> Self {
        CheckerState {
            ctx,
            return_types: Vec::new(),
            this_types: Vec::new(),
            yield_types: Vec::new(),
            substitutions: Vec::new(),
            instantiating: rustc_hash::FxHashSet::default(),
            eval_env: Vec::new(),
            keep_result: false,
        }
    }

    /// Check a whole unit and produce its side tables and export type.
    pub fn check_program(&mut self, root: NodeIndex) -> CheckedModule {
        debug!("checking program");
        let decls = match self.ctx.arena.kind(root) {
            AstKind::Program { decls, .. } => decls.clone(),
            other => unreachable!("checking a non-program root {other:?}"),
        };

        // Signature phase.
        for &decl in &decls {
            self.ensure_declared(decl);
        }
        self.build_vtables(&decls);

        // Body phase.
        for &decl in &decls {
            self.check_decl_body(decl);
        }

        let exported = self.build_module_type(&decls);
        CheckedModule {
            node_types: std::mem::take(&mut self.ctx.node_types),
            exported,
            vtables: std::mem::take(&mut self.ctx.vtables),
        }
    }

    // =========================================================================
    // Signature phase
    // =========================================================================

    /// Type a declaration's signature, memoized. Self-references during the
    /// run resolve to a `This` placeholder.
    pub(crate) fn ensure_declared(&mut self, decl: NodeIndex) -> TypeId {
        if self.ctx.declared.contains(&decl) {
            return self.ctx.type_of(decl).unwrap_or(TypeTable::ERROR);
        }
        if self.ctx.declaring.contains(&decl) {
            // A self-reference while the declaration is being built.
            return self.ctx.types.this_type(decl);
        }
        self.ctx.declaring.insert(decl);
        let ty = self.declare(decl);
        self.ctx.declaring.remove(&decl);
        self.ctx.declared.insert(decl);
        self.ctx.set_type(decl, ty);
        ty
    }

    fn declare(&mut self, decl: NodeIndex) -> TypeId {
        match self.ctx.arena.kind(decl).clone() {
            AstKind::StructDecl {
                name,
                generic_params,
                members,
            } => {
                if !generic_params.is_empty() {
                    return self.declare_generic(decl, name, &generic_params);
                }
                self.declare_aggregate(decl, name, NominalKind::Struct, None, &[], &members)
            }
            AstKind::ClassDecl {
                name,
                generic_params,
                base,
                interfaces,
                members,
            } => {
                if !generic_params.is_empty() {
                    return self.declare_generic(decl, name, &generic_params);
                }
                self.declare_aggregate(decl, name, NominalKind::Class, base, &interfaces, &members)
            }
            AstKind::InterfaceDecl {
                name,
                generic_params,
                members,
            } => {
                if !generic_params.is_empty() {
                    return self.declare_generic(decl, name, &generic_params);
                }
                self.declare_aggregate(decl, name, NominalKind::Interface, None, &[], &members)
            }
            AstKind::EnumDecl {
                name,
                base,
                options,
            } => self.declare_enum(decl, name, base, &options),
            AstKind::TypeDecl {
                name,
                generic_params,
                aliased,
            } => {
                if !generic_params.is_empty() {
                    return self.declare_generic(decl, name, &generic_params);
                }
                match aliased {
                    Some(aliased) => {
                        let target = self.type_from_node(aliased);
                        self.ctx
                            .types
                            .declare_alias(name, self.ctx.namespace, decl, target)
                    }
                    None => self
                        .ctx
                        .types
                        .declare_opaque(name, self.ctx.namespace, decl),
                }
            }
            AstKind::FuncDecl {
                name,
                generic_params,
                ..
            } => {
                if !generic_params.is_empty() {
                    return self.declare_generic(decl, name, &generic_params);
                }
                self.func_signature(decl)
            }
            AstKind::VarDecl { ty, .. } => match ty {
                Some(ty) => self.type_from_node(ty),
                // Inferred from the initializer in the body phase.
                None => TypeTable::AUTO,
            },
            AstKind::MacroDecl { .. } | AstKind::ImportDecl { .. } | AstKind::Attr { .. } => {
                TypeTable::VOID
            }
            AstKind::FuncParam { ty, .. } => match ty {
                Some(ty) => self.type_from_node(ty),
                None => TypeTable::AUTO,
            },
            AstKind::GenericParam { .. } => {
                // Outside an instantiation a bare generic parameter is
                // opaque.
                let name = self
                    .ctx
                    .arena
                    .kind(decl)
                    .decl_name()
                    .expect("generic param name");
                if let Some(subst) = self.lookup_substitution(name) {
                    return subst;
                }
                self.ctx
                    .types
                    .declare_opaque(name, self.ctx.namespace, decl)
            }
            AstKind::Noop | AstKind::Error => TypeTable::ERROR,
            _ => TypeTable::VOID,
        }
    }

    fn declare_generic(&mut self, decl: NodeIndex, name: Atom, generic_params: &[NodeIndex]) -> TypeId {
        let mut params = Vec::new();
        let mut inferrable = true;
        for &gp in generic_params {
            if let AstKind::GenericParam {
                name, infer_index, ..
            } = self.ctx.arena.kind(gp)
            {
                if infer_index.is_none() {
                    inferrable = false;
                }
                params.push(cxy_types::GenericParamInfo {
                    name: *name,
                    infer_index: *infer_index,
                });
            }
        }
        // Function generics can also infer from their value parameters.
        if matches!(self.ctx.arena.kind(decl), AstKind::FuncDecl { .. }) {
            inferrable = true;
        }
        self.ctx.types.declare_generic(name, decl, params, inferrable)
    }

    pub(crate) fn declare_aggregate(
        &mut self,
        decl: NodeIndex,
        name: Atom,
        kind: NominalKind,
        base: Option<NodeIndex>,
        interfaces: &[NodeIndex],
        members: &[NodeIndex],
    ) -> TypeId {
        let nominal = self
            .ctx
            .types
            .declare_nominal(kind, name, self.ctx.namespace, decl);
        // Publish early so sibling members referring to the name during the
        // signature phase resolve through the placeholder path.
        self.ctx.set_type(decl, nominal);

        let mut inheritance = Inheritance::default();
        if let Some(base) = base {
            // A base naming a declaration that is still in its signature
            // phase closes a cycle. Rejecting it here (the base is dropped)
            // keeps every sealed inheritance chain acyclic.
            let base_in_progress = self
                .ctx
                .bindings
                .resolution_of(base)
                .is_some_and(|base_decl| self.ctx.declaring.contains(&base_decl));
            if base_in_progress {
                self.ctx.error_at(base, "circular inheritance detected");
            } else {
                let base_ty = self.type_from_node(base);
                let resolved = self.ctx.types.resolve(base_ty);
                match self.ctx.types.get(resolved) {
                    Type::Interface(_) => inheritance.interfaces.push(resolved),
                    Type::Class(_) => inheritance.base = Some(resolved),
                    // An alias can smuggle an in-progress declaration past
                    // the resolution check; it surfaces as an unbound self
                    // placeholder.
                    Type::This { .. } => {
                        self.ctx.error_at(base, "circular inheritance detected");
                    }
                    Type::Error => {}
                    _ => {
                        let shown = self.ctx.types.display(resolved, self.ctx.strings);
                        self.ctx
                            .error_at(base, format!("'{shown}' cannot be used as a base class"));
                    }
                }
            }
        }
        for &interface in interfaces {
            let ty = self.type_from_node(interface);
            let resolved = self.ctx.types.resolve(ty);
            match self.ctx.types.get(resolved) {
                Type::Interface(_) => inheritance.interfaces.push(resolved),
                Type::Error => {}
                _ => {
                    let shown = self.ctx.types.display(resolved, self.ctx.strings);
                    self.ctx.error_at(
                        interface,
                        format!("'{shown}' is not an interface"),
                    );
                }
            }
        }

        let mut named: Vec<NamedMember> = Vec::new();
        let mut flags = NominalFlags::empty();
        if self.ctx.arena.flags(decl).contains(NodeFlags::ABSTRACT) {
            flags |= NominalFlags::ABSTRACT;
        }
        if self.ctx.arena.flags(decl).contains(NodeFlags::CLOSURE) {
            flags |= NominalFlags::CLOSURE;
        }
        for &member in members {
            match self.ctx.arena.kind(member).clone() {
                AstKind::FieldDecl { name, ty, .. } => {
                    let field_ty = self.type_from_node(ty);
                    if matches!(
                        self.ctx.types.get(self.ctx.types.resolve(field_ty)),
                        Type::Reference { .. }
                    ) {
                        flags |= NominalFlags::REFERENCE_MEMBERS;
                    }
                    self.ctx.set_type(member, field_ty);
                    named.push(NamedMember {
                        name,
                        ty: field_ty,
                        decl: member,
                    });
                }
                AstKind::FuncDecl {
                    name, operator, ..
                } => {
                    let fn_ty = self.func_signature(member);
                    self.ctx.declared.insert(member);
                    if operator == Some(Operator::Destructor)
                        || operator == Some(Operator::Deinit)
                    {
                        flags |= NominalFlags::DESTRUCTIBLE;
                    }
                    named.push(NamedMember {
                        name,
                        ty: fn_ty,
                        decl: member,
                    });
                }
                AstKind::VarDecl { names, ty, .. } => {
                    let var_ty = match ty {
                        Some(ty) => self.type_from_node(ty),
                        None => TypeTable::AUTO,
                    };
                    self.ctx.set_type(member, var_ty);
                    for ident in names {
                        if let AstKind::Identifier { name } = self.ctx.arena.kind(ident) {
                            named.push(NamedMember {
                                name: *name,
                                ty: var_ty,
                                decl: member,
                            });
                        }
                    }
                }
                _ => {}
            }
        }

        // Base classes with EXCEPTION propagate the flag transitively via
        // is_exception(); nothing to record here.
        self.ctx.types.seal_nominal(
            nominal,
            MembersContainer::new(named),
            inheritance,
            flags,
        );
        let this = self.ctx.types.this_type(decl);
        self.ctx.types.resolve_this(this, nominal);
        nominal
    }

    fn declare_enum(
        &mut self,
        decl: NodeIndex,
        name: Atom,
        base: Option<NodeIndex>,
        options: &[NodeIndex],
    ) -> TypeId {
        let base_ty = match base {
            Some(base) => self.type_from_node(base),
            None => {
                let i64_kind = cxy_parser::PrimitiveKind::I64;
                self.ctx.types.primitive(i64_kind)
            }
        };
        let mut values = Vec::new();
        let mut next = 0i64;
        for &option in options {
            if let AstKind::EnumOption { name, value } = self.ctx.arena.kind(option).clone() {
                if let Some(value_node) = value {
                    match crate::eval::const_int(self.ctx, value_node) {
                        Some(v) => next = v as i64,
                        None => {
                            self.ctx
                                .error_at(value_node, "enum option value must be a constant integer");
                        }
                    }
                }
                values.push((name, next));
                self.ctx.set_type(option, TypeTable::AUTO);
                next += 1;
            }
        }
        let enum_ty =
            self.ctx
                .types
                .declare_enum(name, self.ctx.namespace, decl, base_ty, values);
        // Option nodes carry the enum type itself.
        for &option in options {
            self.ctx.set_type(option, enum_ty);
        }
        enum_ty
    }

    /// Type a function's signature: parameters and return.
    pub(crate) fn func_signature(&mut self, decl: NodeIndex) -> TypeId {
        if let Some(ty) = self.ctx.type_of(decl) {
            if self.ctx.declared.contains(&decl) {
                return ty;
            }
        }
        let (params, ret, operator) = match self.ctx.arena.kind(decl).clone() {
            AstKind::FuncDecl {
                params,
                ret,
                operator,
                ..
            } => (params, ret, operator),
            _ => return TypeTable::ERROR,
        };
        let mut param_types = Vec::new();
        for &param in &params {
            let ty = match self.ctx.arena.kind(param).clone() {
                AstKind::FuncParam { ty: Some(ty), .. } => self.type_from_node(ty),
                AstKind::FuncParam { default: Some(default), .. } => self.check_expr(default),
                _ => TypeTable::AUTO,
            };
            self.ctx.set_type(param, ty);
            param_types.push(ty);
        }
        let ret_ty = match ret {
            Some(ret) => self.type_from_node(ret),
            // Constructors return void; others default to void too.
            None => TypeTable::VOID,
        };
        let _ = operator;
        let variadic = self.ctx.arena.flags(decl).contains(NodeFlags::VARIADIC);
        let fn_ty = self
            .ctx
            .types
            .func_type(param_types, ret_ty, Vec::new(), variadic);
        self.ctx.set_type(decl, fn_ty);
        fn_ty
    }

    // =========================================================================
    // Body phase
    // =========================================================================

    pub(crate) fn check_decl_body(&mut self, decl: NodeIndex) {
        match self.ctx.arena.kind(decl).clone() {
            AstKind::FuncDecl { body: Some(body), .. } => {
                let fn_ty = self.ensure_declared(decl);
                let ret = match self.ctx.types.get(fn_ty) {
                    Type::Func { ret, .. } => *ret,
                    _ => TypeTable::ERROR,
                };
                self.return_types.push(ret);
                self.check_stmt(body);
                self.return_types.pop();
            }
            AstKind::StructDecl { members, .. }
            | AstKind::ClassDecl { members, .. }
            | AstKind::InterfaceDecl { members, .. } => {
                let nominal = self.ensure_declared(decl);
                self.this_types.push(nominal);
                for member in members {
                    self.check_decl_body(member);
                }
                self.this_types.pop();
                self.check_interface_conformance(decl, nominal);
            }
            AstKind::VarDecl { ty, init, .. } => {
                let declared = self.ensure_declared(decl);
                match init {
                    Some(init) => {
                        let value_ty = self.check_expr_expecting(
                            init,
                            (declared != TypeTable::AUTO).then_some(declared),
                        );
                        if declared == TypeTable::AUTO {
                            let concrete = self.concretize_literal(value_ty);
                            self.ctx.set_type(decl, concrete);
                        } else if !self.assignable(declared, value_ty) {
                            let want = self.ctx.types.display(declared, self.ctx.strings);
                            let got = self.ctx.types.display(value_ty, self.ctx.strings);
                            self.ctx.error_at(
                                init,
                                format!("cannot initialize '{want}' from '{got}'"),
                            );
                        }
                    }
                    None => {
                        if declared == TypeTable::AUTO {
                            if let Some(ty_node) = ty {
                                self.ctx
                                    .error_at(ty_node, "cannot infer a type without an initializer");
                            } else {
                                self.ctx.error_at(
                                    decl,
                                    "a variable needs a type annotation or an initializer",
                                );
                            }
                        }
                    }
                }
            }
            AstKind::FuncDecl { .. }
            | AstKind::EnumDecl { .. }
            | AstKind::TypeDecl { .. }
            | AstKind::MacroDecl { .. }
            | AstKind::ImportDecl { .. }
            | AstKind::Attr { .. }
            | AstKind::Noop
            | AstKind::Error => {}
            _ => {}
        }
    }

    // =========================================================================
    // Module export type
    // =========================================================================

    fn build_module_type(&mut self, decls: &[NodeIndex]) -> TypeId {
        let mut exported = Vec::new();
        for &decl in decls {
            if !self.ctx.arena.flags(decl).contains(NodeFlags::PUBLIC) {
                continue;
            }
            let Some(name) = self.ctx.arena.kind(decl).decl_name() else {
                continue;
            };
            let ty = self.ctx.type_of(decl).unwrap_or(TypeTable::ERROR);
            exported.push(NamedMember {
                name,
                ty,
                decl,
            });
        }
        let name = self.ctx.namespace;
        self.ctx
            .types
            .declare_module(name, MembersContainer::new(exported))
    }

    // =========================================================================
    // Substitution stack
    // =========================================================================

    pub(crate) fn lookup_substitution(&self, name: Atom) -> Option<TypeId> {
        for frame in self.substitutions.iter().rev() {
            if let Some(&ty) = frame.get(&name) {
                return Some(ty);
            }
        }
        None
    }

    /// Resolve pending literal types to a concrete default (i32/f64) when no
    /// context forces one.
    pub(crate) fn concretize_literal(&mut self, ty: TypeId) -> TypeId {
        if let Type::Literal { node } = self.ctx.types.get(ty) {
            let node = *node;
            match self.ctx.arena.kind(node) {
                AstKind::IntLit { .. } => {
                    return self.ctx.types.primitive(cxy_parser::PrimitiveKind::I32);
                }
                AstKind::FloatLit { .. } => {
                    return self.ctx.types.primitive(cxy_parser::PrimitiveKind::F64);
                }
                _ => {}
            }
        }
        ty
    }
}
