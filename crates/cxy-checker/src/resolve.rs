//! Type-syntax resolution: AST type nodes to `TypeId`.

use crate::state::CheckerState;
use cxy_parser::{AstKind, NodeFlags, NodeIndex};
use cxy_types::{Type, TypeId, TypeTable};

impl<'a, 'b> CheckerState<'a, 'b> {
    pub(crate) fn type_from_node(&mut self, node: NodeIndex) -> TypeId {
        let ty = match self.ctx.arena.kind(node).clone() {
            AstKind::PrimitiveType { kind } => self.ctx.types.primitive(kind),
            AstKind::VoidType => TypeTable::VOID,
            AstKind::StringType => TypeTable::STRING,
            AstKind::AutoType => TypeTable::AUTO,
            AstKind::PointerType { pointee } => {
                let inner = self.type_from_node(pointee);
                let is_const = self.ctx.arena.flags(node).contains(NodeFlags::CONST);
                self.ctx.types.pointer_to(inner, is_const)
            }
            AstKind::ReferenceType { referred } => {
                let inner = self.type_from_node(referred);
                let is_const = self.ctx.arena.flags(node).contains(NodeFlags::CONST);
                self.ctx.types.reference_to(inner, is_const)
            }
            AstKind::ArrayType { element, size } => {
                let inner = self.type_from_node(element);
                match size {
                    Some(size) => match crate::eval::const_int(self.ctx, size) {
                        Some(n) if n >= 0 => self.ctx.types.array_of(inner, Some(n as u64)),
                        _ => {
                            return self
                                .ctx
                                .error_at(size, "array length must be a constant non-negative integer");
                        }
                    },
                    None => self.ctx.types.slice_of(inner),
                }
            }
            AstKind::TupleType { elements } => {
                let element_types = elements
                    .iter()
                    .map(|&e| self.type_from_node(e))
                    .collect();
                self.ctx.types.tuple_of(element_types)
            }
            AstKind::UnionType { members } => {
                let member_types = members.iter().map(|&m| self.type_from_node(m)).collect();
                self.ctx.types.union_of(member_types)
            }
            AstKind::OptionalType { target } => {
                let inner = self.type_from_node(target);
                self.ctx.types.optional_of(inner)
            }
            AstKind::FuncType { params, ret } => {
                let param_types = params.iter().map(|&p| self.type_from_node(p)).collect();
                let ret_ty = self.type_from_node(ret);
                self.ctx
                    .types
                    .func_type(param_types, ret_ty, Vec::new(), false)
            }
            AstKind::ResultType { target } => {
                let inner = self.type_from_node(target);
                let exception = self.ctx.exception_type;
                self.ctx.types.union_of(vec![inner, exception])
            }
            AstKind::Path { elements } => self.type_from_path(node, &elements),
            AstKind::Error | AstKind::Noop => TypeTable::ERROR,
            other => {
                let tag = other.tag_name();
                return self
                    .ctx
                    .error_at(node, format!("'{tag}' is not valid in type position"));
            }
        };
        self.ctx.set_type(node, ty);
        ty
    }

    fn type_from_path(&mut self, path: NodeIndex, elements: &[NodeIndex]) -> TypeId {
        let Some(&head) = elements.first() else {
            return TypeTable::ERROR;
        };
        let (name, args) = match self.ctx.arena.kind(head).clone() {
            AstKind::PathElement { name, args, .. } => (name, args),
            _ => return TypeTable::ERROR,
        };

        // Generic substitutions shadow everything else.
        if let Some(subst) = self.lookup_substitution(name) {
            return subst;
        }

        let text = self.ctx.strings.resolve(name).to_string();
        match text.as_str() {
            "This" => {
                if let Some(&class) = self.ctx.bindings.enclosing_class.get(&path) {
                    return self.ctx.types.this_type(class);
                }
                if let Some(&this_ty) = self.this_types.last() {
                    return this_ty;
                }
                return self
                    .ctx
                    .error_at(path, "'This' can only be used inside a type declaration");
            }
            "Exception" => return self.ctx.exception_type,
            "String" => return TypeTable::STRING,
            "Void" => return TypeTable::VOID,
            "Slice" => {
                if let Some(&arg) = args.first() {
                    let element = self.type_from_node(arg);
                    return self.ctx.types.slice_of(element);
                }
                return self.ctx.error_at(path, "'Slice' needs an element type");
            }
            "Optional" => {
                if let Some(&arg) = args.first() {
                    let target = self.type_from_node(arg);
                    return self.ctx.types.optional_of(target);
                }
                return self.ctx.error_at(path, "'Optional' needs a target type");
            }
            _ => {}
        }

        let Some(decl) = self.ctx.bindings.resolution_of(path) else {
            return self
                .ctx
                .error_at(path, format!("unknown type '{text}'"));
        };
        let decl_ty = self.ensure_declared(decl);
        let resolved = self.ctx.types.resolve(decl_ty);

        if let Type::Generic { .. } = self.ctx.types.get(resolved) {
            if args.is_empty() {
                return self.ctx.error_at(
                    path,
                    format!("generic type '{text}' needs type arguments"),
                );
            }
            let arg_types: Vec<TypeId> = args.iter().map(|&a| self.type_from_node(a)).collect();
            return self.instantiate_generic(resolved, arg_types, path);
        }
        if !args.is_empty() {
            self.ctx
                .error_at(path, format!("type '{text}' takes no type arguments"));
        }
        decl_ty
    }
}
