//! S-expression AST dump.
//!
//! A compact, stable rendering of a subtree used by tests and the driver's
//! `--dump-ast` flag. The format is `(tag key:value child child ...)`.

use crate::ast::{AstKind, NodeArena, NodeIndex};
use cxy_common::Interner;
use std::fmt::Write;

/// Render the subtree at `root` as an S-expression.
pub fn dump_sexp(arena: &NodeArena, strings: &Interner, root: NodeIndex) -> String {
    let mut out = String::new();
    write_node(arena, strings, root, &mut out);
    out
}

fn write_node(arena: &NodeArena, strings: &Interner, idx: NodeIndex, out: &mut String) {
    let node = arena.get(idx);
    let _ = write!(out, "({}", node.kind.tag_name());
    match &node.kind {
        AstKind::ModuleDecl { name }
        | AstKind::Identifier { name }
        | AstKind::FieldInit { name, .. }
        | AstKind::Attr { name, .. } => {
            let _ = write!(out, " {}", strings.resolve(*name));
        }
        AstKind::PathElement { name, super_depth, .. } => {
            let _ = write!(out, " {}", strings.resolve(*name));
            if *super_depth > 0 {
                let _ = write!(out, " super:{super_depth}");
            }
        }
        AstKind::FuncDecl { name, .. }
        | AstKind::FuncParam { name, .. }
        | AstKind::GenericParam { name, .. }
        | AstKind::TypeDecl { name, .. }
        | AstKind::StructDecl { name, .. }
        | AstKind::ClassDecl { name, .. }
        | AstKind::InterfaceDecl { name, .. }
        | AstKind::EnumDecl { name, .. }
        | AstKind::EnumOption { name, .. }
        | AstKind::FieldDecl { name, .. }
        | AstKind::ExceptionDecl { name, .. }
        | AstKind::MacroDecl { name, .. }
        | AstKind::TestDecl { name, .. } => {
            let _ = write!(out, " {}", strings.resolve(*name));
        }
        AstKind::PrimitiveType { kind } => {
            let _ = write!(out, " {}", kind.name());
        }
        AstKind::BoolLit { value } => {
            let _ = write!(out, " {value}");
        }
        AstKind::IntLit {
            value, negative, ..
        } => {
            let _ = write!(out, " {}{value}", if *negative { "-" } else { "" });
        }
        AstKind::FloatLit { value, .. } => {
            let _ = write!(out, " {value}");
        }
        AstKind::CharLit { raw } | AstKind::StringLit { raw } => {
            let _ = write!(out, " {:?}", strings.resolve(*raw));
        }
        AstKind::UnaryExpr { op, prefix, .. } => {
            let _ = write!(out, " {}{}", op.symbol(), if *prefix { "" } else { ":post" });
        }
        AstKind::BinaryExpr { op, .. } | AstKind::AssignExpr { op, .. } => {
            let _ = write!(out, " {}", op.symbol());
        }
        AstKind::CastExpr { unchecked, .. } => {
            if *unchecked {
                let _ = write!(out, " unchecked");
            }
        }
        AstKind::ClosureExpr { is_async, .. } => {
            if *is_async {
                let _ = write!(out, " async");
            }
        }
        _ => {}
    }
    for child in arena.children_of(idx) {
        out.push(' ');
        write_node(arena, strings, child, out);
    }
    out.push(')');
}
