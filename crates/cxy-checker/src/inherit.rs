//! Inheritance: member lookup through base chains, vtable synthesis,
//! interface conformance.

use crate::context::VTable;
use crate::state::CheckerState;
use cxy_common::Atom;
use cxy_parser::{AstKind, NodeFlags, NodeIndex};
use cxy_types::{Type, TypeId, TypeTable};

/// One resolved member: where it was found and what it is.
#[derive(Clone, Debug)]
pub struct MemberRef {
    /// The nominal type the member was found on (possibly a base).
    pub container: TypeId,
    pub decl: NodeIndex,
    pub ty: TypeId,
    /// Distance up the inheritance chain (0 = own member).
    pub depth: u32,
}

impl<'a, 'b> CheckerState<'a, 'b> {
    /// Look up a member by name, walking the base chain, then interface
    /// defaults. Returns the full overload chain. A visited set keeps the
    /// walk finite even when a reported inheritance cycle left a loop in
    /// the chain.
    pub(crate) fn member_lookup(&mut self, ty: TypeId, name: Atom) -> Vec<MemberRef> {
        let mut out = Vec::new();
        let mut current = self.ctx.types.resolve(ty);
        let mut depth = 0u32;
        let mut visited: Vec<TypeId> = Vec::new();
        loop {
            if visited.contains(&current) {
                break;
            }
            visited.push(current);
            let body = match self.ctx.types.get(current) {
                Type::Struct(body) | Type::Class(body) | Type::Interface(body) => body.clone(),
                _ => break,
            };
            for &slot in body.members.lookup(name) {
                let member = body.members.member(slot);
                let member_ty = if member.ty == TypeTable::AUTO {
                    // Closure capture fields get their type from the first
                    // initializing struct expression.
                    self.ctx.type_of(member.decl).unwrap_or(TypeTable::AUTO)
                } else {
                    member.ty
                };
                out.push(MemberRef {
                    container: current,
                    decl: member.decl,
                    ty: member_ty,
                    depth,
                });
            }
            if !out.is_empty() {
                return out;
            }
            // Interface default methods.
            for &interface in &body.inheritance.interfaces {
                let interface = self.ctx.types.resolve(interface);
                if let Type::Interface(ibody) = self.ctx.types.get(interface) {
                    let ibody = ibody.clone();
                    for &slot in ibody.members.lookup(name) {
                        let member = ibody.members.member(slot);
                        let has_body = matches!(
                            self.ctx.arena.kind(member.decl),
                            AstKind::FuncDecl { body: Some(_), .. }
                        );
                        if has_body {
                            out.push(MemberRef {
                                container: interface,
                                decl: member.decl,
                                ty: member.ty,
                                depth,
                            });
                        }
                    }
                }
            }
            if !out.is_empty() {
                return out;
            }
            match self.ctx.types.get(current) {
                Type::Class(body) => match body.inheritance.base {
                    Some(base) => {
                        current = self.ctx.types.resolve(base);
                        depth += 1;
                    }
                    None => break,
                },
                _ => break,
            }
        }
        out
    }

    // =========================================================================
    // VTables
    // =========================================================================

    /// Build vtable layouts for every class in the unit. A method is
    /// virtual when it is flagged so, overrides a base method, or is
    /// overridden by a derived class; base slots keep their positions so
    /// upcasts dispatch correctly.
    pub(crate) fn build_vtables(&mut self, decls: &[NodeIndex]) {
        // Classes in base-before-derived order.
        let mut classes: Vec<(NodeIndex, TypeId)> = Vec::new();
        for &decl in decls {
            if matches!(self.ctx.arena.kind(decl), AstKind::ClassDecl { .. }) {
                if let Some(ty) = self.ctx.type_of(decl) {
                    let resolved = self.ctx.types.resolve(ty);
                    if matches!(self.ctx.types.get(resolved), Type::Class(_)) {
                        classes.push((decl, resolved));
                    }
                }
            }
        }
        classes.sort_by_key(|&(_, ty)| self.inheritance_depth(ty));

        // Names overridden anywhere in the unit force base entries.
        let mut overridden: Vec<(TypeId, Atom)> = Vec::new();
        for &(_, class) in &classes {
            if let Type::Class(body) = self.ctx.types.get(class) {
                let base = body.inheritance.base;
                let names: Vec<Atom> = body.members.iter().map(|m| m.name).collect();
                if let Some(base) = base {
                    let base = self.ctx.types.resolve(base);
                    for name in names {
                        if !self.member_lookup(base, name).is_empty() {
                            overridden.push((base, name));
                        }
                    }
                }
            }
        }

        for &(_, class) in &classes {
            let body = match self.ctx.types.get(class) {
                Type::Class(body) => body.clone(),
                _ => continue,
            };
            let mut entries: Vec<(Atom, NodeIndex)> = match body.inheritance.base {
                Some(base) => {
                    let base = self.ctx.types.resolve(base);
                    self.ctx
                        .vtables
                        .get(&base)
                        .map(|v| v.entries.clone())
                        .unwrap_or_default()
                }
                None => Vec::new(),
            };
            for member in body.members.iter() {
                let is_method = matches!(
                    self.ctx.arena.kind(member.decl),
                    AstKind::FuncDecl { .. }
                );
                if !is_method {
                    continue;
                }
                let flags = self.ctx.arena.flags(member.decl);
                let overrides_slot = entries.iter().position(|(n, _)| *n == member.name);
                let forced = overridden
                    .iter()
                    .any(|&(ty, n)| ty == class && n == member.name);
                if let Some(slot) = overrides_slot {
                    entries[slot] = (member.name, member.decl);
                } else if flags.contains(NodeFlags::VIRTUAL)
                    || flags.contains(NodeFlags::ABSTRACT)
                    || forced
                {
                    entries.push((member.name, member.decl));
                }
            }
            let tid = self.ctx.fresh_tid();
            self.ctx.vtables.insert(class, VTable { tid, entries });
        }
    }

    fn inheritance_depth(&self, ty: TypeId) -> u32 {
        let mut depth = 0;
        let mut current = self.ctx.types.resolve(ty);
        let mut visited: Vec<TypeId> = Vec::new();
        while let Type::Class(body) = self.ctx.types.get(current) {
            if visited.contains(&current) {
                break;
            }
            visited.push(current);
            match body.inheritance.base {
                Some(base) => {
                    depth += 1;
                    current = self.ctx.types.resolve(base);
                }
                None => break,
            }
        }
        depth
    }

    // =========================================================================
    // Interface conformance
    // =========================================================================

    /// Does `ty` implement every member of `interface` (directly, through a
    /// base, or via the interface's own default bodies)?
    pub(crate) fn conforms_to(&mut self, ty: TypeId, interface: TypeId) -> bool {
        let interface = self.ctx.types.resolve(interface);
        let declared: Vec<TypeId> = match self.ctx.types.get(self.ctx.types.resolve(ty)) {
            Type::Class(body) | Type::Struct(body) => body
                .inheritance
                .interfaces
                .iter()
                .map(|&i| self.ctx.types.resolve(i))
                .collect(),
            _ => return false,
        };
        if !declared.contains(&interface) {
            return false;
        }
        self.interface_members_satisfied(ty, interface)
    }

    fn interface_members_satisfied(&mut self, ty: TypeId, interface: TypeId) -> bool {
        let members: Vec<(Atom, TypeId, bool)> = match self.ctx.types.get(interface) {
            Type::Interface(body) => body
                .members
                .iter()
                .map(|m| {
                    let has_default = matches!(
                        self.ctx.arena.kind(m.decl),
                        AstKind::FuncDecl { body: Some(_), .. }
                    );
                    (m.name, m.ty, has_default)
                })
                .collect(),
            _ => return false,
        };
        for (name, wanted, has_default) in members {
            let found = self.member_lookup(ty, name);
            let satisfied = found.iter().any(|m| {
                m.container != interface && self.assignable(wanted, m.ty)
            });
            if !satisfied && !has_default {
                return false;
            }
        }
        true
    }

    /// Report conformance errors for a sealed declaration.
    pub(crate) fn check_interface_conformance(&mut self, decl: NodeIndex, nominal: TypeId) {
        let nominal = self.ctx.types.resolve(nominal);
        let interfaces: Vec<TypeId> = match self.ctx.types.get(nominal) {
            Type::Class(body) | Type::Struct(body) => body
                .inheritance
                .interfaces
                .iter()
                .map(|&i| self.ctx.types.resolve(i))
                .collect(),
            _ => return,
        };
        for interface in interfaces {
            if !self.interface_members_satisfied(nominal, interface) {
                let shown = self.ctx.types.display(interface, self.ctx.strings);
                let name = self.ctx.types.display(nominal, self.ctx.strings);
                self.ctx.error_at(
                    decl,
                    format!("'{name}' does not implement every member of '{shown}'"),
                );
            }
        }
    }
}
