//! The AST arena.
//!
//! All nodes of a compilation unit live in one `NodeArena`; node-to-node
//! references are stable `NodeIndex` values. Nothing is ever freed
//! individually, so back-references (parent scopes, resolved declarations)
//! held in side tables stay valid for the arena's lifetime.

use super::flags::NodeFlags;
use super::kind::AstKind;
use cxy_common::{Atom, FileLoc};

/// Stable index of a node in its `NodeArena`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Ordered list of sibling nodes.
pub type NodeList = Vec<NodeIndex>;

/// One AST node: tag + payload, location, flags, attribute chain.
#[derive(Clone, Debug)]
pub struct Node {
    pub kind: AstKind,
    pub loc: FileLoc,
    pub flags: NodeFlags,
    pub attrs: NodeList,
}

#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        NodeArena::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a node and return its index.
    pub fn alloc(&mut self, kind: AstKind, loc: FileLoc) -> NodeIndex {
        let idx = NodeIndex(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            loc,
            flags: NodeFlags::empty(),
            attrs: Vec::new(),
        });
        idx
    }

    /// Allocate a node with flags already set.
    pub fn alloc_flagged(&mut self, kind: AstKind, loc: FileLoc, flags: NodeFlags) -> NodeIndex {
        let idx = self.alloc(kind, loc);
        self.nodes[idx.index()].flags = flags;
        idx
    }

    #[inline]
    pub fn get(&self, idx: NodeIndex) -> &Node {
        &self.nodes[idx.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, idx: NodeIndex) -> &mut Node {
        &mut self.nodes[idx.index()]
    }

    #[inline]
    pub fn kind(&self, idx: NodeIndex) -> &AstKind {
        &self.nodes[idx.index()].kind
    }

    #[inline]
    pub fn loc(&self, idx: NodeIndex) -> FileLoc {
        self.nodes[idx.index()].loc
    }

    #[inline]
    pub fn flags(&self, idx: NodeIndex) -> NodeFlags {
        self.nodes[idx.index()].flags
    }

    pub fn add_flags(&mut self, idx: NodeIndex, flags: NodeFlags) {
        self.nodes[idx.index()].flags |= flags;
    }

    /// Replace a node in place, keeping its index. Used by the comptime
    /// evaluator and the lowering passes.
    pub fn replace(&mut self, idx: NodeIndex, kind: AstKind) {
        self.nodes[idx.index()].kind = kind;
    }

    /// Replace a node with `Noop`, keeping its index valid.
    pub fn clear_to_noop(&mut self, idx: NodeIndex) {
        self.nodes[idx.index()].kind = AstKind::Noop;
        self.nodes[idx.index()].flags = NodeFlags::GENERATED;
    }

    /// Iterate all node indices in allocation order.
    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + use<> {
        (0..self.nodes.len() as u32).map(NodeIndex)
    }

    // =========================================================================
    // Child access
    // =========================================================================

    /// Direct children of a node, in source order.
    pub fn children_of(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let node = self.get(idx);
        let mut out = Vec::new();
        collect_children(&node.kind, &mut out);
        out.extend(node.attrs.iter().copied());
        out
    }

    // =========================================================================
    // Cloning
    // =========================================================================

    /// Clone a whole subtree, returning the root of the copy. Every node is
    /// freshly allocated and marked `GENERATED`.
    pub fn deep_clone(&mut self, root: NodeIndex) -> NodeIndex {
        let node = self.get(root).clone();
        let kind = self.clone_kind(node.kind);
        let attrs = node
            .attrs
            .iter()
            .map(|&a| self.deep_clone(a))
            .collect();
        let idx = self.alloc(kind, node.loc);
        let slot = self.get_mut(idx);
        slot.flags = node.flags | NodeFlags::GENERATED;
        slot.attrs = attrs;
        idx
    }

    fn clone_list(&mut self, list: NodeList) -> NodeList {
        list.into_iter().map(|n| self.deep_clone(n)).collect()
    }

    fn clone_opt(&mut self, opt: Option<NodeIndex>) -> Option<NodeIndex> {
        opt.map(|n| self.deep_clone(n))
    }

    fn clone_kind(&mut self, kind: AstKind) -> AstKind {
        match kind {
            AstKind::Program {
                module,
                imports,
                decls,
            } => AstKind::Program {
                module: self.clone_opt(module),
                imports: self.clone_list(imports),
                decls: self.clone_list(decls),
            },
            AstKind::ImportDecl {
                path,
                entities,
                alias,
                is_plugin,
            } => AstKind::ImportDecl {
                path: self.deep_clone(path),
                entities: self.clone_list(entities),
                alias,
                is_plugin,
            },
            AstKind::FuncDecl {
                name,
                generic_params,
                params,
                ret,
                body,
                operator,
            } => AstKind::FuncDecl {
                name,
                generic_params: self.clone_list(generic_params),
                params: self.clone_list(params),
                ret: self.clone_opt(ret),
                body: self.clone_opt(body),
                operator,
            },
            AstKind::FuncParam { name, ty, default } => AstKind::FuncParam {
                name,
                ty: self.clone_opt(ty),
                default: self.clone_opt(default),
            },
            AstKind::GenericParam {
                name,
                constraints,
                default,
                infer_index,
            } => AstKind::GenericParam {
                name,
                constraints: self.clone_list(constraints),
                default: self.clone_opt(default),
                infer_index,
            },
            AstKind::VarDecl { names, ty, init } => AstKind::VarDecl {
                names: self.clone_list(names),
                ty: self.clone_opt(ty),
                init: self.clone_opt(init),
            },
            AstKind::TypeDecl {
                name,
                generic_params,
                aliased,
            } => AstKind::TypeDecl {
                name,
                generic_params: self.clone_list(generic_params),
                aliased: self.clone_opt(aliased),
            },
            AstKind::StructDecl {
                name,
                generic_params,
                members,
            } => AstKind::StructDecl {
                name,
                generic_params: self.clone_list(generic_params),
                members: self.clone_list(members),
            },
            AstKind::ClassDecl {
                name,
                generic_params,
                base,
                interfaces,
                members,
            } => AstKind::ClassDecl {
                name,
                generic_params: self.clone_list(generic_params),
                base: self.clone_opt(base),
                interfaces: self.clone_list(interfaces),
                members: self.clone_list(members),
            },
            AstKind::InterfaceDecl {
                name,
                generic_params,
                members,
            } => AstKind::InterfaceDecl {
                name,
                generic_params: self.clone_list(generic_params),
                members: self.clone_list(members),
            },
            AstKind::EnumDecl {
                name,
                base,
                options,
            } => AstKind::EnumDecl {
                name,
                base: self.clone_opt(base),
                options: self.clone_list(options),
            },
            AstKind::EnumOption { name, value } => AstKind::EnumOption {
                name,
                value: self.clone_opt(value),
            },
            AstKind::FieldDecl { name, ty, default } => AstKind::FieldDecl {
                name,
                ty: self.deep_clone(ty),
                default: self.clone_opt(default),
            },
            AstKind::ExceptionDecl { name, params, body } => AstKind::ExceptionDecl {
                name,
                params: self.clone_list(params),
                body: self.deep_clone(body),
            },
            AstKind::MacroDecl { name, params, body } => AstKind::MacroDecl {
                name,
                params: self.clone_list(params),
                body: self.deep_clone(body),
            },
            AstKind::TestDecl { name, body } => AstKind::TestDecl {
                name,
                body: self.deep_clone(body),
            },
            AstKind::PointerType { pointee } => AstKind::PointerType {
                pointee: self.deep_clone(pointee),
            },
            AstKind::ReferenceType { referred } => AstKind::ReferenceType {
                referred: self.deep_clone(referred),
            },
            AstKind::ArrayType { element, size } => AstKind::ArrayType {
                element: self.deep_clone(element),
                size: self.clone_opt(size),
            },
            AstKind::TupleType { elements } => AstKind::TupleType {
                elements: self.clone_list(elements),
            },
            AstKind::UnionType { members } => AstKind::UnionType {
                members: self.clone_list(members),
            },
            AstKind::OptionalType { target } => AstKind::OptionalType {
                target: self.deep_clone(target),
            },
            AstKind::FuncType { params, ret } => AstKind::FuncType {
                params: self.clone_list(params),
                ret: self.deep_clone(ret),
            },
            AstKind::ResultType { target } => AstKind::ResultType {
                target: self.deep_clone(target),
            },
            AstKind::Path { elements } => AstKind::Path {
                elements: self.clone_list(elements),
            },
            AstKind::PathElement {
                name,
                args,
                super_depth,
            } => AstKind::PathElement {
                name,
                args: self.clone_list(args),
                super_depth,
            },
            AstKind::MemberExpr {
                target,
                member,
                optional,
            } => AstKind::MemberExpr {
                target: self.deep_clone(target),
                member: self.deep_clone(member),
                optional,
            },
            AstKind::CallExpr { callee, args } => AstKind::CallExpr {
                callee: self.deep_clone(callee),
                args: self.clone_list(args),
            },
            AstKind::MacroCallExpr { callee, args } => AstKind::MacroCallExpr {
                callee: self.deep_clone(callee),
                args: self.clone_list(args),
            },
            AstKind::IndexExpr { target, indices } => AstKind::IndexExpr {
                target: self.deep_clone(target),
                indices: self.clone_list(indices),
            },
            AstKind::UnaryExpr {
                op,
                operand,
                prefix,
            } => AstKind::UnaryExpr {
                op,
                operand: self.deep_clone(operand),
                prefix,
            },
            AstKind::BinaryExpr { op, lhs, rhs } => AstKind::BinaryExpr {
                op,
                lhs: self.deep_clone(lhs),
                rhs: self.deep_clone(rhs),
            },
            AstKind::AssignExpr { op, lhs, rhs } => AstKind::AssignExpr {
                op,
                lhs: self.deep_clone(lhs),
                rhs: self.deep_clone(rhs),
            },
            AstKind::TernaryExpr {
                cond,
                then,
                otherwise,
            } => AstKind::TernaryExpr {
                cond: self.deep_clone(cond),
                then: self.deep_clone(then),
                otherwise: self.deep_clone(otherwise),
            },
            AstKind::CastExpr {
                expr,
                target,
                unchecked,
            } => AstKind::CastExpr {
                expr: self.deep_clone(expr),
                target: self.deep_clone(target),
                unchecked,
            },
            AstKind::TupleExpr { elements } => AstKind::TupleExpr {
                elements: self.clone_list(elements),
            },
            AstKind::ArrayExpr { elements } => AstKind::ArrayExpr {
                elements: self.clone_list(elements),
            },
            AstKind::StructExpr { left, fields } => AstKind::StructExpr {
                left: self.deep_clone(left),
                fields: self.clone_list(fields),
            },
            AstKind::FieldInit { name, value } => AstKind::FieldInit {
                name,
                value: self.deep_clone(value),
            },
            AstKind::ClosureExpr {
                is_async,
                params,
                ret,
                body,
            } => AstKind::ClosureExpr {
                is_async,
                params: self.clone_list(params),
                ret: self.clone_opt(ret),
                body: self.deep_clone(body),
            },
            AstKind::StringExpr { parts } => AstKind::StringExpr {
                parts: self.clone_list(parts),
            },
            AstKind::GroupExpr { inner } => AstKind::GroupExpr {
                inner: self.deep_clone(inner),
            },
            AstKind::NewExpr { target, args } => AstKind::NewExpr {
                target: self.deep_clone(target),
                args: self.clone_list(args),
            },
            AstKind::Substitute { expr } => AstKind::Substitute {
                expr: self.deep_clone(expr),
            },
            AstKind::AsmExpr {
                template,
                outputs,
                inputs,
                clobbers,
                flags,
            } => AstKind::AsmExpr {
                template,
                outputs: self.clone_list(outputs),
                inputs: self.clone_list(inputs),
                clobbers: self.clone_list(clobbers),
                flags: self.clone_list(flags),
            },
            AstKind::Block { stmts } => AstKind::Block {
                stmts: self.clone_list(stmts),
            },
            AstKind::ExprStmt { expr } => AstKind::ExprStmt {
                expr: self.deep_clone(expr),
            },
            AstKind::ReturnStmt { value } => AstKind::ReturnStmt {
                value: self.clone_opt(value),
            },
            AstKind::DeferStmt { expr } => AstKind::DeferStmt {
                expr: self.deep_clone(expr),
            },
            AstKind::YieldStmt { value } => AstKind::YieldStmt {
                value: self.deep_clone(value),
            },
            AstKind::RaiseStmt { value } => AstKind::RaiseStmt {
                value: self.deep_clone(value),
            },
            AstKind::IfStmt {
                cond,
                then,
                otherwise,
            } => AstKind::IfStmt {
                cond: self.deep_clone(cond),
                then: self.deep_clone(then),
                otherwise: self.clone_opt(otherwise),
            },
            AstKind::WhileStmt { cond, body } => AstKind::WhileStmt {
                cond: self.deep_clone(cond),
                body: self.deep_clone(body),
            },
            AstKind::ForStmt { var, range, body } => AstKind::ForStmt {
                var: self.deep_clone(var),
                range: self.deep_clone(range),
                body: self.deep_clone(body),
            },
            AstKind::MatchStmt { scrutinee, arms } => AstKind::MatchStmt {
                scrutinee: self.deep_clone(scrutinee),
                arms: self.clone_list(arms),
            },
            AstKind::MatchArm {
                patterns,
                binding,
                body,
            } => AstKind::MatchArm {
                patterns: self.clone_list(patterns),
                binding,
                body: self.deep_clone(body),
            },
            AstKind::Attr { name, args } => AstKind::Attr {
                name,
                args: self.clone_list(args),
            },
            // Leaf nodes carry no child indices.
            leaf => leaf,
        }
    }

    // =========================================================================
    // Synthetic node builders
    // =========================================================================

    pub fn mk_ident(&mut self, name: Atom, loc: FileLoc) -> NodeIndex {
        self.alloc_flagged(AstKind::Identifier { name }, loc, NodeFlags::GENERATED)
    }

    /// A one-element path naming `name`.
    pub fn mk_path(&mut self, name: Atom, loc: FileLoc) -> NodeIndex {
        let elem = self.alloc_flagged(
            AstKind::PathElement {
                name,
                args: Vec::new(),
                super_depth: 0,
            },
            loc,
            NodeFlags::GENERATED,
        );
        self.alloc_flagged(AstKind::Path { elements: vec![elem] }, loc, NodeFlags::GENERATED)
    }

    pub fn mk_member(&mut self, target: NodeIndex, member: Atom, loc: FileLoc) -> NodeIndex {
        let member = self.mk_ident(member, loc);
        self.alloc_flagged(
            AstKind::MemberExpr {
                target,
                member,
                optional: false,
            },
            loc,
            NodeFlags::GENERATED,
        )
    }

    pub fn mk_call(&mut self, callee: NodeIndex, args: NodeList, loc: FileLoc) -> NodeIndex {
        self.alloc_flagged(AstKind::CallExpr { callee, args }, loc, NodeFlags::GENERATED)
    }

    pub fn mk_block(&mut self, stmts: NodeList, loc: FileLoc) -> NodeIndex {
        self.alloc_flagged(AstKind::Block { stmts }, loc, NodeFlags::GENERATED)
    }

    pub fn mk_int(&mut self, value: u128, loc: FileLoc) -> NodeIndex {
        self.alloc_flagged(
            AstKind::IntLit {
                value,
                suffix: None,
                negative: false,
            },
            loc,
            NodeFlags::GENERATED,
        )
    }

    pub fn mk_var_decl(
        &mut self,
        name: Atom,
        ty: Option<NodeIndex>,
        init: Option<NodeIndex>,
        loc: FileLoc,
    ) -> NodeIndex {
        let ident = self.mk_ident(name, loc);
        self.alloc_flagged(
            AstKind::VarDecl {
                names: vec![ident],
                ty,
                init,
            },
            loc,
            NodeFlags::GENERATED,
        )
    }
}

fn push_opt(out: &mut Vec<NodeIndex>, opt: &Option<NodeIndex>) {
    if let Some(idx) = opt {
        out.push(*idx);
    }
}

fn collect_children(kind: &AstKind, out: &mut Vec<NodeIndex>) {
    match kind {
        AstKind::Program {
            module,
            imports,
            decls,
        } => {
            push_opt(out, module);
            out.extend(imports);
            out.extend(decls);
        }
        AstKind::ImportDecl { path, entities, .. } => {
            out.push(*path);
            out.extend(entities);
        }
        AstKind::FuncDecl {
            generic_params,
            params,
            ret,
            body,
            ..
        } => {
            out.extend(generic_params);
            out.extend(params);
            push_opt(out, ret);
            push_opt(out, body);
        }
        AstKind::FuncParam { ty, default, .. } => {
            push_opt(out, ty);
            push_opt(out, default);
        }
        AstKind::GenericParam {
            constraints,
            default,
            ..
        } => {
            out.extend(constraints);
            push_opt(out, default);
        }
        AstKind::VarDecl { names, ty, init } => {
            out.extend(names);
            push_opt(out, ty);
            push_opt(out, init);
        }
        AstKind::TypeDecl {
            generic_params,
            aliased,
            ..
        } => {
            out.extend(generic_params);
            push_opt(out, aliased);
        }
        AstKind::StructDecl {
            generic_params,
            members,
            ..
        } => {
            out.extend(generic_params);
            out.extend(members);
        }
        AstKind::ClassDecl {
            generic_params,
            base,
            interfaces,
            members,
            ..
        } => {
            out.extend(generic_params);
            push_opt(out, base);
            out.extend(interfaces);
            out.extend(members);
        }
        AstKind::InterfaceDecl {
            generic_params,
            members,
            ..
        } => {
            out.extend(generic_params);
            out.extend(members);
        }
        AstKind::EnumDecl { base, options, .. } => {
            push_opt(out, base);
            out.extend(options);
        }
        AstKind::EnumOption { value, .. } => push_opt(out, value),
        AstKind::FieldDecl { ty, default, .. } => {
            out.push(*ty);
            push_opt(out, default);
        }
        AstKind::ExceptionDecl { params, body, .. } => {
            out.extend(params);
            out.push(*body);
        }
        AstKind::MacroDecl { params, body, .. } => {
            out.extend(params);
            out.push(*body);
        }
        AstKind::TestDecl { body, .. } => out.push(*body),
        AstKind::PointerType { pointee } => out.push(*pointee),
        AstKind::ReferenceType { referred } => out.push(*referred),
        AstKind::ArrayType { element, size } => {
            out.push(*element);
            push_opt(out, size);
        }
        AstKind::TupleType { elements } => out.extend(elements),
        AstKind::UnionType { members } => out.extend(members),
        AstKind::OptionalType { target } => out.push(*target),
        AstKind::FuncType { params, ret } => {
            out.extend(params);
            out.push(*ret);
        }
        AstKind::ResultType { target } => out.push(*target),
        AstKind::Path { elements } => out.extend(elements),
        AstKind::PathElement { args, .. } => out.extend(args),
        AstKind::MemberExpr { target, member, .. } => {
            out.push(*target);
            out.push(*member);
        }
        AstKind::CallExpr { callee, args } | AstKind::MacroCallExpr { callee, args } => {
            out.push(*callee);
            out.extend(args);
        }
        AstKind::IndexExpr { target, indices } => {
            out.push(*target);
            out.extend(indices);
        }
        AstKind::UnaryExpr { operand, .. } => out.push(*operand),
        AstKind::BinaryExpr { lhs, rhs, .. } | AstKind::AssignExpr { lhs, rhs, .. } => {
            out.push(*lhs);
            out.push(*rhs);
        }
        AstKind::TernaryExpr {
            cond,
            then,
            otherwise,
        } => {
            out.push(*cond);
            out.push(*then);
            out.push(*otherwise);
        }
        AstKind::CastExpr { expr, target, .. } => {
            out.push(*expr);
            out.push(*target);
        }
        AstKind::TupleExpr { elements } | AstKind::ArrayExpr { elements } => out.extend(elements),
        AstKind::StructExpr { left, fields } => {
            out.push(*left);
            out.extend(fields);
        }
        AstKind::FieldInit { value, .. } => out.push(*value),
        AstKind::ClosureExpr {
            params, ret, body, ..
        } => {
            out.extend(params);
            push_opt(out, ret);
            out.push(*body);
        }
        AstKind::StringExpr { parts } => out.extend(parts),
        AstKind::GroupExpr { inner } => out.push(*inner),
        AstKind::NewExpr { target, args } => {
            out.push(*target);
            out.extend(args);
        }
        AstKind::Substitute { expr } => out.push(*expr),
        AstKind::AsmExpr {
            outputs,
            inputs,
            clobbers,
            flags,
            ..
        } => {
            out.extend(outputs);
            out.extend(inputs);
            out.extend(clobbers);
            out.extend(flags);
        }
        AstKind::Block { stmts } => out.extend(stmts),
        AstKind::ExprStmt { expr } => out.push(*expr),
        AstKind::ReturnStmt { value } => push_opt(out, value),
        AstKind::DeferStmt { expr } => out.push(*expr),
        AstKind::YieldStmt { value } | AstKind::RaiseStmt { value } => out.push(*value),
        AstKind::IfStmt {
            cond,
            then,
            otherwise,
        } => {
            out.push(*cond);
            out.push(*then);
            push_opt(out, otherwise);
        }
        AstKind::WhileStmt { cond, body } => {
            out.push(*cond);
            out.push(*body);
        }
        AstKind::ForStmt { var, range, body } => {
            out.push(*var);
            out.push(*range);
            out.push(*body);
        }
        AstKind::MatchStmt { scrutinee, arms } => {
            out.push(*scrutinee);
            out.extend(arms);
        }
        AstKind::MatchArm { patterns, body, .. } => {
            out.extend(patterns);
            out.push(*body);
        }
        AstKind::Attr { args, .. } => out.extend(args),
        // Leaves
        AstKind::ModuleDecl { .. }
        | AstKind::ImportEntity { .. }
        | AstKind::PrimitiveType { .. }
        | AstKind::VoidType
        | AstKind::StringType
        | AstKind::AutoType
        | AstKind::NullLit
        | AstKind::BoolLit { .. }
        | AstKind::IntLit { .. }
        | AstKind::FloatLit { .. }
        | AstKind::CharLit { .. }
        | AstKind::StringLit { .. }
        | AstKind::Identifier { .. }
        | AstKind::BreakStmt
        | AstKind::ContinueStmt
        | AstKind::Noop
        | AstKind::Error => {}
    }
}
