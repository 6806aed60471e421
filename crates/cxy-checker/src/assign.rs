//! Assignability and numeric promotion.

use crate::state::CheckerState;
use cxy_parser::{AstKind, PrimitiveKind};
use cxy_types::{Type, TypeId, TypeTable};

impl<'a, 'b> CheckerState<'a, 'b> {
    /// The `assignable(to, from)` ladder: identity, implicit numeric
    /// widening (unsigned into signed only when strictly larger), literal
    /// inference, null into pointer/reference/optional, element-wise tuples,
    /// union subsets, interface conformance, base-class upcasts, optional
    /// wrapping. Error types absorb everything so cascades stay quiet.
    pub(crate) fn assignable(&mut self, to: TypeId, from: TypeId) -> bool {
        let to = self.ctx.types.resolve(to);
        let from = self.ctx.types.resolve(from);
        if to == from {
            return true;
        }
        if self.ctx.types.is_error(to) || self.ctx.types.is_error(from) {
            return true;
        }
        if matches!(self.ctx.types.get(to), Type::Auto) {
            return true;
        }

        // Pending literal sources adapt to any numeric target that fits.
        if let Type::Literal { node } = self.ctx.types.get(from) {
            let node = *node;
            return self.literal_fits(to, node);
        }

        match (self.ctx.types.get(to).clone(), self.ctx.types.get(from).clone()) {
            (Type::Primitive(t), Type::Primitive(f)) => promotable(t, f),
            (Type::Pointer { .. } | Type::Reference { .. } | Type::Optional { .. }, Type::Null) => {
                true
            }
            (
                Type::Pointer {
                    pointee: t,
                    is_const: tc,
                },
                Type::Pointer {
                    pointee: f,
                    is_const: fc,
                },
            ) => (tc || !fc) && (self.ctx.types.resolve(t) == self.ctx.types.resolve(f) || self.ctx.types.is_void(t)),
            (
                Type::Reference {
                    referred: t,
                    is_const: tc,
                },
                Type::Reference {
                    referred: f,
                    is_const: fc,
                },
            ) => (tc || !fc) && self.assignable(t, f),
            // Auto-take-reference on the source side.
            (Type::Reference { referred, .. }, _) => self.assignable(referred, from),
            (_, Type::Reference { referred, .. }) => self.assignable(to, referred),
            (Type::Optional { target }, _) => {
                self.ctx.types.resolve(target) == from || self.assignable(target, from)
            }
            (Type::Tuple { elements: t }, Type::Tuple { elements: f }) => {
                t.len() == f.len()
                    && t.iter().zip(f.iter()).all(|(&a, &b)| self.assignable(a, b))
            }
            (Type::Array { element: t, len: tl }, Type::Array { element: f, len: fl }) => {
                self.ctx.types.resolve(t) == self.ctx.types.resolve(f)
                    && (tl.is_none() || tl == fl)
            }
            (Type::Union { members: t }, Type::Union { members: f }) => {
                // Union subset.
                f.iter().all(|&m| {
                    t.iter().any(|&candidate| self.assignable(candidate, m))
                })
            }
            (Type::Union { members }, _) => {
                members.iter().any(|&m| self.assignable(m, from))
            }
            (Type::Interface(_), Type::Class(_) | Type::Struct(_)) => {
                self.conforms_to(from, to)
            }
            (Type::Class(_), Type::Class(_)) => self.ctx.types.derives_from(from, to),
            (Type::Func { params: tp, ret: tr, .. }, Type::Func { params: fp, ret: fr, .. }) => {
                tp.len() == fp.len()
                    && tp.iter().zip(fp.iter()).all(|(&a, &b)| self.assignable(b, a))
                    && self.assignable(tr, fr)
            }
            _ => false,
        }
    }

    /// Whether a pending integer/float literal fits the target type.
    pub(crate) fn literal_fits(&mut self, to: TypeId, node: cxy_parser::NodeIndex) -> bool {
        let to = self.ctx.types.resolve(to);
        match self.ctx.types.get(to).clone() {
            Type::Primitive(kind) => match self.ctx.arena.kind(node) {
                AstKind::IntLit {
                    value, negative, ..
                } => {
                    if kind.is_float() {
                        return true;
                    }
                    if !kind.is_integer() {
                        return false;
                    }
                    if kind.is_signed() {
                        cxy_common::numeric::fits_signed(*value, *negative, kind.bits())
                    } else {
                        !*negative && cxy_common::numeric::fits_unsigned(*value, kind.bits())
                    }
                }
                AstKind::FloatLit { .. } => kind.is_float(),
                _ => false,
            },
            Type::Optional { target } => self.literal_fits(target, node),
            Type::Union { members } => members
                .iter()
                .any(|&m| self.literal_fits(m, node)),
            Type::Auto | Type::Error => true,
            _ => false,
        }
    }

    /// Common type of two numeric operands, following the usual promotion
    /// order; literals adapt to the other side.
    pub(crate) fn promote(&mut self, a: TypeId, b: TypeId) -> Option<TypeId> {
        let ra = self.ctx.types.resolve(a);
        let rb = self.ctx.types.resolve(b);
        if self.ctx.types.is_error(ra) || self.ctx.types.is_error(rb) {
            return Some(TypeTable::ERROR);
        }
        match (self.ctx.types.get(ra).clone(), self.ctx.types.get(rb).clone()) {
            (Type::Literal { .. }, Type::Literal { .. }) => {
                Some(self.ctx.types.primitive(PrimitiveKind::I32))
            }
            (Type::Literal { node }, Type::Primitive(_)) => {
                self.literal_fits(rb, node).then_some(rb)
            }
            (Type::Primitive(_), Type::Literal { node }) => {
                self.literal_fits(ra, node).then_some(ra)
            }
            (Type::Primitive(pa), Type::Primitive(pb)) => {
                if pa == pb {
                    return Some(ra);
                }
                if promotable(pa, pb) {
                    return Some(ra);
                }
                if promotable(pb, pa) {
                    return Some(rb);
                }
                None
            }
            _ => None,
        }
    }

    pub(crate) fn is_boolean(&mut self, ty: TypeId) -> bool {
        let resolved = self.ctx.types.resolve(ty);
        matches!(
            self.ctx.types.get(resolved),
            Type::Primitive(PrimitiveKind::Bool) | Type::Error
        )
    }

    pub(crate) fn is_integer_type(&mut self, ty: TypeId) -> bool {
        let resolved = self.ctx.types.resolve(ty);
        match self.ctx.types.get(resolved) {
            Type::Primitive(kind) => kind.is_integer(),
            Type::Literal { node } => {
                matches!(self.ctx.arena.kind(*node), AstKind::IntLit { .. })
            }
            Type::Error => true,
            _ => false,
        }
    }
}

/// Implicit widening between primitives. Unsigned widens into signed only
/// when the signed type is strictly larger; integers widen into floats.
fn promotable(to: PrimitiveKind, from: PrimitiveKind) -> bool {
    if to == from {
        return true;
    }
    if to.is_float() {
        return from.is_float() && to.bits() >= from.bits() || from.is_integer();
    }
    if !to.is_integer() || !from.is_integer() {
        return false;
    }
    match (to.is_signed(), from.is_signed()) {
        (true, true) | (false, false) => to.bits() >= from.bits(),
        // unsigned into signed: strictly larger only
        (true, false) => to.bits() > from.bits(),
        (false, true) => false,
    }
}
