//! Hash-consed type table for the cxy compiler.
//!
//! This crate provides:
//! - `Type`, `TypeId` - the type representation
//! - `TypeTable` - structural interning, nominal declaration/sealing,
//!   `This` placeholder resolution, `Applied` instantiation memoization
//! - `MembersContainer` - sorted named-member lookup with overload chains

pub mod table;
pub mod types;

pub use table::{NominalKind, TypeTable};
pub use types::{
    GenericParamInfo, Inheritance, MembersContainer, NamedMember, NominalBody, NominalFlags, Type,
    TypeId,
};
