//! AST model: arena, node kinds, flags, operators.

pub mod arena;
pub mod flags;
pub mod kind;
pub mod operator;

pub use arena::{Node, NodeArena, NodeIndex, NodeList};
pub use flags::NodeFlags;
pub use kind::{AstKind, PrimitiveKind};
pub use operator::Operator;
