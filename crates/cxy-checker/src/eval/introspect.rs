//! Type introspection builtins.
//!
//! Comptime member access on a type (`T.name`, `T.members`, `T.isInteger`,
//! ...) dispatches through a table keyed on the member name. Each handler
//! computes an `EvalValue` from the type table.

use super::EvalValue;
use crate::state::CheckerState;
use cxy_types::{Type, TypeId, TypeTable};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// The builtin introspection operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Introspect {
    Name,
    Members,
    Attributes,
    Tinfo,
    ElementType,
    PointedType,
    TargetType,
    ReturnType,
    BaseType,
    Params,
    Value,
    IsInteger,
    IsSigned,
    IsFloat,
    IsPointer,
    IsReference,
    IsStruct,
    IsClass,
    IsEnum,
    IsOptional,
    IsUnion,
    IsTuple,
    IsSlice,
    IsArray,
    IsString,
    IsBoolean,
    IsChar,
    IsVoid,
    IsClosure,
    IsFunction,
    IsAnonymousStruct,
    IsResultType,
    IsLiteral,
    IsPrimitive,
    IsDestructible,
    IsUnresolved,
    HasBase,
    HasDeinit,
    HasVoidReturnType,
    HasReferenceMembers,
}

/// Member-name dispatch table; names are matched after interning so hot
/// lookups stay pointer-cheap.
pub static INTROSPECT_TABLE: Lazy<FxHashMap<&'static str, Introspect>> = Lazy::new(|| {
    use Introspect::*;
    let mut table = FxHashMap::default();
    for (name, op) in [
        ("name", Name),
        ("members", Members),
        ("attributes", Attributes),
        ("Tinfo", Tinfo),
        ("elementType", ElementType),
        ("pointedType", PointedType),
        ("targetType", TargetType),
        ("returnType", ReturnType),
        ("baseType", BaseType),
        ("params", Params),
        ("value", Value),
        ("isInteger", IsInteger),
        ("isSigned", IsSigned),
        ("isFloat", IsFloat),
        ("isPointer", IsPointer),
        ("isReference", IsReference),
        ("isStruct", IsStruct),
        ("isClass", IsClass),
        ("isEnum", IsEnum),
        ("isOptional", IsOptional),
        ("isUnion", IsUnion),
        ("isTuple", IsTuple),
        ("isSlice", IsSlice),
        ("isArray", IsArray),
        ("isString", IsString),
        ("isBoolean", IsBoolean),
        ("isChar", IsChar),
        ("isVoid", IsVoid),
        ("isClosure", IsClosure),
        ("isFunction", IsFunction),
        ("isAnonymousStruct", IsAnonymousStruct),
        ("isResultType", IsResultType),
        ("isLiteral", IsLiteral),
        ("isPrimitive", IsPrimitive),
        ("isDestructible", IsDestructible),
        ("isUnresolved", IsUnresolved),
        ("hasBase", HasBase),
        ("hasDeinit", HasDeinit),
        ("hasVoidReturnType", HasVoidReturnType),
        ("hasReferenceMembers", HasReferenceMembers),
    ] {
        table.insert(name, op);
    }
    table
});

impl<'a, 'b> CheckerState<'a, 'b> {
    /// Apply an introspection builtin to a type; `None` when the member is
    /// not a builtin or the type does not support it.
    pub(crate) fn introspect(&mut self, ty: TypeId, member: &str) -> Option<EvalValue> {
        use cxy_types::NominalFlags;
        let &op = INTROSPECT_TABLE.get(member)?;
        let resolved = self.ctx.types.resolve(ty);
        let entry = self.ctx.types.get(resolved).clone();
        let value = match op {
            Introspect::Name => {
                let display = self.ctx.types.display(resolved, self.ctx.strings);
                EvalValue::Str(self.ctx.strings.intern(&display))
            }
            Introspect::Members => match &entry {
                Type::Struct(body) | Type::Class(body) | Type::Interface(body) => {
                    let members = body
                        .members
                        .iter()
                        .map(|m| (m.name, m.ty))
                        .collect();
                    EvalValue::Members(members)
                }
                Type::Tuple { elements } => {
                    let members = elements
                        .iter()
                        .enumerate()
                        .map(|(position, &element)| {
                            let name = self.ctx.strings.intern(&position.to_string());
                            (name, element)
                        })
                        .collect();
                    EvalValue::Members(members)
                }
                Type::Enum { options, .. } => {
                    let members = options.iter().map(|&(name, _)| (name, resolved)).collect();
                    EvalValue::Members(members)
                }
                _ => return None,
            },
            Introspect::Attributes => EvalValue::Members(Vec::new()),
            Introspect::Tinfo => EvalValue::Type(resolved),
            Introspect::ElementType => match &entry {
                Type::Array { element, .. } => EvalValue::Type(*element),
                _ => return None,
            },
            Introspect::PointedType => match &entry {
                Type::Pointer { pointee, .. } => EvalValue::Type(*pointee),
                _ => return None,
            },
            Introspect::TargetType => match &entry {
                Type::Optional { target } | Type::Info { target } => EvalValue::Type(*target),
                Type::Reference { referred, .. } => EvalValue::Type(*referred),
                _ => return None,
            },
            Introspect::ReturnType => match &entry {
                Type::Func { ret, .. } => EvalValue::Type(*ret),
                _ => return None,
            },
            Introspect::BaseType => match &entry {
                Type::Class(body) => match body.inheritance.base {
                    Some(base) => EvalValue::Type(base),
                    None => return None,
                },
                Type::Enum { base, .. } => EvalValue::Type(*base),
                _ => return None,
            },
            Introspect::Params => match &entry {
                Type::Func { params, .. } => {
                    let members = params
                        .iter()
                        .enumerate()
                        .map(|(position, &param)| {
                            let name = self.ctx.strings.intern(&position.to_string());
                            (name, param)
                        })
                        .collect();
                    EvalValue::Members(members)
                }
                _ => return None,
            },
            Introspect::Value => match &entry {
                Type::Literal { node } => {
                    return super::const_int(self.ctx, *node).map(EvalValue::Int);
                }
                _ => return None,
            },
            Introspect::IsInteger => EvalValue::Bool(matches!(
                &entry,
                Type::Primitive(kind) if kind.is_integer()
            )),
            Introspect::IsSigned => EvalValue::Bool(matches!(
                &entry,
                Type::Primitive(kind) if kind.is_signed()
            )),
            Introspect::IsFloat => EvalValue::Bool(matches!(
                &entry,
                Type::Primitive(kind) if kind.is_float()
            )),
            Introspect::IsPointer => EvalValue::Bool(matches!(&entry, Type::Pointer { .. })),
            Introspect::IsReference => EvalValue::Bool(matches!(&entry, Type::Reference { .. })),
            Introspect::IsStruct => EvalValue::Bool(matches!(&entry, Type::Struct(_))),
            Introspect::IsClass => EvalValue::Bool(matches!(&entry, Type::Class(_))),
            Introspect::IsEnum => EvalValue::Bool(matches!(&entry, Type::Enum { .. })),
            Introspect::IsOptional => EvalValue::Bool(matches!(&entry, Type::Optional { .. })),
            Introspect::IsUnion => EvalValue::Bool(matches!(&entry, Type::Union { .. })),
            Introspect::IsTuple => EvalValue::Bool(matches!(&entry, Type::Tuple { .. })),
            Introspect::IsSlice => {
                EvalValue::Bool(matches!(&entry, Type::Array { len: None, .. }))
            }
            Introspect::IsArray => EvalValue::Bool(matches!(&entry, Type::Array { .. })),
            Introspect::IsString => EvalValue::Bool(matches!(&entry, Type::String)),
            Introspect::IsBoolean => EvalValue::Bool(matches!(
                &entry,
                Type::Primitive(cxy_parser::PrimitiveKind::Bool)
            )),
            Introspect::IsChar => EvalValue::Bool(matches!(
                &entry,
                Type::Primitive(cxy_parser::PrimitiveKind::Char)
                    | Type::Primitive(cxy_parser::PrimitiveKind::WChar)
            )),
            Introspect::IsVoid => EvalValue::Bool(matches!(&entry, Type::Void)),
            Introspect::IsClosure => EvalValue::Bool(matches!(
                &entry,
                Type::Struct(body) if body.flags.contains(NominalFlags::CLOSURE)
            )),
            Introspect::IsFunction => EvalValue::Bool(matches!(&entry, Type::Func { .. })),
            Introspect::IsAnonymousStruct => EvalValue::Bool(matches!(
                &entry,
                Type::Struct(body) if body.flags.contains(NominalFlags::CLOSURE)
            )),
            Introspect::IsResultType => EvalValue::Bool(self.ctx.types.is_result_type(resolved)),
            Introspect::IsLiteral => EvalValue::Bool(matches!(&entry, Type::Literal { .. })),
            Introspect::IsPrimitive => EvalValue::Bool(matches!(&entry, Type::Primitive(_))),
            Introspect::IsDestructible => EvalValue::Bool(matches!(
                &entry,
                Type::Struct(body) | Type::Class(body)
                    if body.flags.contains(NominalFlags::DESTRUCTIBLE)
            )),
            Introspect::IsUnresolved =>

                EvalValue::Bool(matches!(&entry, Type::This { .. } | Type::Auto)),
            Introspect::HasBase => EvalValue::Bool(matches!(
                &entry,
                Type::Class(body) if body.inheritance.base.is_some()
            )),
            Introspect::HasDeinit => EvalValue::Bool(matches!(
                &entry,
                Type::Struct(body) | Type::Class(body)
                    if body.flags.contains(NominalFlags::DESTRUCTIBLE)
            )),
            Introspect::HasVoidReturnType => match &entry {
                Type::Func { ret, .. } => EvalValue::Bool(*ret == TypeTable::VOID),
                _ => return None,
            },
            Introspect::HasReferenceMembers => EvalValue::Bool(matches!(
                &entry,
                Type::Struct(body) | Type::Class(body)
                    if body.flags.contains(NominalFlags::REFERENCE_MEMBERS)
            )),
        };
        Some(value)
    }
}
