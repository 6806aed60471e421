//! Type syntax parsing.
//!
//! In type position `|` always builds a union, `^`/`&` build pointer and
//! reference types, `[T]` is a slice, `[T, N]` a sized array, `(T, U)` a
//! tuple, `(T) -> R` a function type, and a trailing `?` wraps in an
//! optional.

use super::{ParseResult, ParserState};
use crate::ast::{AstKind, NodeFlags, NodeIndex, PrimitiveKind};
use cxy_lexer::TokenKind;

impl<'a> ParserState<'a> {
    pub(crate) fn parse_type(&mut self) -> ParseResult<NodeIndex> {
        let first = self.parse_type_postfix()?;
        if !self.check(TokenKind::Pipe) {
            return Ok(first);
        }
        let mut members = vec![first];
        while self.accept(TokenKind::Pipe).is_some() {
            members.push(self.parse_type_postfix()?);
        }
        let loc = self
            .arena()
            .loc(members[0])
            .merge(&self.arena().loc(*members.last().expect("non-empty")));
        Ok(self.arena_mut().alloc_flagged(
            AstKind::UnionType { members },
            loc,
            NodeFlags::TYPE_AST,
        ))
    }

    fn parse_type_postfix(&mut self) -> ParseResult<NodeIndex> {
        let mut ty = self.parse_type_atom()?;
        while self.check(TokenKind::Question) {
            let token = self.advance();
            let loc = self.arena().loc(ty).merge(&token.loc);
            ty = self.arena_mut().alloc_flagged(
                AstKind::OptionalType { target: ty },
                loc,
                NodeFlags::TYPE_AST,
            );
        }
        Ok(ty)
    }

    fn parse_type_atom(&mut self) -> ParseResult<NodeIndex> {
        let current = self.current();
        match current.kind {
            TokenKind::Caret => {
                self.advance();
                let is_const = self.accept(TokenKind::Const).is_some();
                let pointee = self.parse_type_atom()?;
                let loc = current.loc.merge(&self.arena().loc(pointee));
                let mut flags = NodeFlags::TYPE_AST;
                if is_const {
                    flags |= NodeFlags::CONST;
                }
                Ok(self
                    .arena_mut()
                    .alloc_flagged(AstKind::PointerType { pointee }, loc, flags))
            }
            TokenKind::Amp => {
                self.advance();
                let is_const = self.accept(TokenKind::Const).is_some();
                let referred = self.parse_type_atom()?;
                let loc = current.loc.merge(&self.arena().loc(referred));
                let mut flags = NodeFlags::TYPE_AST;
                if is_const {
                    flags |= NodeFlags::CONST;
                }
                Ok(self
                    .arena_mut()
                    .alloc_flagged(AstKind::ReferenceType { referred }, loc, flags))
            }
            TokenKind::LBracket => {
                self.advance();
                let element = self.parse_type()?;
                let size = if self.accept(TokenKind::Comma).is_some() {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                self.expect(TokenKind::RBracket)?;
                let loc = current.loc.merge(&self.current().loc);
                Ok(self.arena_mut().alloc_flagged(
                    AstKind::ArrayType { element, size },
                    loc,
                    NodeFlags::TYPE_AST,
                ))
            }
            TokenKind::LParen => {
                self.advance();
                let mut elements = Vec::new();
                while !self.check(TokenKind::RParen) {
                    elements.push(self.parse_type()?);
                    if self.accept(TokenKind::Comma).is_none() {
                        break;
                    }
                }
                self.expect(TokenKind::RParen)?;
                if self.accept(TokenKind::Arrow).is_some() {
                    let ret = self.parse_type()?;
                    let loc = current.loc.merge(&self.arena().loc(ret));
                    return Ok(self.arena_mut().alloc_flagged(
                        AstKind::FuncType {
                            params: elements,
                            ret,
                        },
                        loc,
                        NodeFlags::TYPE_AST,
                    ));
                }
                let loc = current.loc.merge(&self.current().loc);
                Ok(self.arena_mut().alloc_flagged(
                    AstKind::TupleType { elements },
                    loc,
                    NodeFlags::TYPE_AST,
                ))
            }
            TokenKind::Ident | TokenKind::ThisType => self.parse_named_type(),
            _ => self.unexpected("a type"),
        }
    }

    /// A named type: primitive, `void`, `string`, `auto`, or a path with
    /// optional generic arguments per element.
    fn parse_named_type(&mut self) -> ParseResult<NodeIndex> {
        let current = self.current();
        if current.kind == TokenKind::Ident {
            if let Some(text) = self.ident_text(&current) {
                if let Some(kind) = PrimitiveKind::from_name(text) {
                    self.advance();
                    return Ok(self.arena_mut().alloc_flagged(
                        AstKind::PrimitiveType { kind },
                        current.loc,
                        NodeFlags::TYPE_AST,
                    ));
                }
                match text {
                    "void" | "Void" => {
                        self.advance();
                        return Ok(self.arena_mut().alloc_flagged(
                            AstKind::VoidType,
                            current.loc,
                            NodeFlags::TYPE_AST,
                        ));
                    }
                    "string" => {
                        self.advance();
                        return Ok(self.arena_mut().alloc_flagged(
                            AstKind::StringType,
                            current.loc,
                            NodeFlags::TYPE_AST,
                        ));
                    }
                    "auto" => {
                        self.advance();
                        return Ok(self.arena_mut().alloc_flagged(
                            AstKind::AutoType,
                            current.loc,
                            NodeFlags::TYPE_AST,
                        ));
                    }
                    _ => {}
                }
            }
        }
        // Dotted path; each element may carry `[...]` type or integer
        // arguments.
        let start = self.current().loc;
        let mut elements = Vec::new();
        loop {
            let token = self.current();
            let name = match token.kind {
                TokenKind::Ident => token.ident().expect("ident token"),
                TokenKind::ThisType => self.strings.intern("This"),
                _ => return self.unexpected("a type name"),
            };
            self.advance();
            let mut args = Vec::new();
            if self.accept(TokenKind::LBracket).is_some() {
                while !self.check(TokenKind::RBracket) {
                    args.push(self.parse_type_or_const_arg()?);
                    if self.accept(TokenKind::Comma).is_none() {
                        break;
                    }
                }
                self.expect(TokenKind::RBracket)?;
            }
            elements.push(self.arena_mut().alloc(
                AstKind::PathElement {
                    name,
                    args,
                    super_depth: 0,
                },
                token.loc,
            ));
            if self.check(TokenKind::Dot) && self.peek(1).kind == TokenKind::Ident {
                self.advance();
                continue;
            }
            break;
        }
        let loc = start.merge(&self.current().loc);
        Ok(self
            .arena_mut()
            .alloc_flagged(AstKind::Path { elements }, loc, NodeFlags::TYPE_AST))
    }

    /// Generic arguments accept types and integer-literal constants.
    fn parse_type_or_const_arg(&mut self) -> ParseResult<NodeIndex> {
        if self.check(TokenKind::IntLit) {
            let token = self.advance();
            let value = match token.value {
                cxy_lexer::TokenValue::Int { value, .. } => value,
                _ => 0,
            };
            return Ok(self.arena_mut().alloc(
                AstKind::IntLit {
                    value,
                    suffix: None,
                    negative: false,
                },
                token.loc,
            ));
        }
        self.parse_type()
    }
}
