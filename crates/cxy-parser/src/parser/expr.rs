//! Expression parsing.
//!
//! `parse_expr` is the assignment level (right-associative, looser than the
//! ternary); below it sit the ternary, the Pratt climber for binaries, unary
//! prefixes, and the postfix chain (member access, calls, indexing, casts,
//! macro calls).

use super::{ParseResult, ParserState};
use crate::ast::{AstKind, NodeFlags, NodeIndex, NodeList, Operator};
use cxy_lexer::{TokenKind, TokenValue};

impl<'a> ParserState<'a> {
    pub(crate) fn parse_expr(&mut self) -> ParseResult<NodeIndex> {
        let lhs = self.parse_ternary()?;
        let Some(op) = Operator::assignment_from_token(self.current().kind) else {
            return Ok(lhs);
        };
        self.advance();
        // Right-associative: `a = b = c` nests to the right.
        let rhs = self.parse_expr()?;
        let loc = self.arena().loc(lhs).merge(&self.arena().loc(rhs));
        Ok(self
            .arena_mut()
            .alloc(AstKind::AssignExpr { op, lhs, rhs }, loc))
    }

    fn parse_ternary(&mut self) -> ParseResult<NodeIndex> {
        let cond = self.parse_binary(Operator::MAX_BINARY_PRECEDENCE)?;
        if self.accept(TokenKind::Question).is_none() {
            return Ok(cond);
        }
        let then = self.parse_expr()?;
        self.expect(TokenKind::Colon)?;
        // Right-associative else branch.
        let otherwise = self.parse_ternary()?;
        let loc = self.arena().loc(cond).merge(&self.arena().loc(otherwise));
        Ok(self.arena_mut().alloc(
            AstKind::TernaryExpr {
                cond,
                then,
                otherwise,
            },
            loc,
        ))
    }

    /// Pratt climber. `max_prec` is the loosest level this call may absorb;
    /// same-level operators associate left via the `prec - 1` recursion.
    fn parse_binary(&mut self, max_prec: u8) -> ParseResult<NodeIndex> {
        let mut lhs = self.parse_unary()?;
        loop {
            let Some(op) = Operator::binary_from_token(self.current().kind) else {
                break;
            };
            let prec = op.binary_precedence().expect("binary operator");
            if prec > max_prec {
                break;
            }
            self.advance();
            let rhs = match op {
                // `is` compares against a type name, not a value.
                Operator::Is => self.parse_type()?,
                // `lhs catch { ... }` takes a block producing the fallback.
                Operator::Catch if self.check(TokenKind::LBrace) => {
                    let block = self.parse_block()?;
                    self.arena_mut().add_flags(block, NodeFlags::BLOCK_RETURNS);
                    block
                }
                _ => self.parse_binary(prec.saturating_sub(1))?,
            };
            let loc = self.arena().loc(lhs).merge(&self.arena().loc(rhs));
            lhs = self
                .arena_mut()
                .alloc(AstKind::BinaryExpr { op, lhs, rhs }, loc);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<NodeIndex> {
        let current = self.current();
        if current.kind == TokenKind::Launch {
            // `launch E` runs E on a fresh thread through the runtime hook.
            self.advance();
            let expr = self.parse_unary()?;
            return Ok(self.lower_launch(expr, current.loc));
        }
        if current.kind == TokenKind::New {
            self.advance();
            let target = self.parse_path()?;
            let mut args = Vec::new();
            if self.accept(TokenKind::LParen).is_some() {
                args = self.parse_call_args()?;
            }
            let loc = current.loc.merge(&self.current().loc);
            return Ok(self.arena_mut().alloc(AstKind::NewExpr { target, args }, loc));
        }
        if let Some(op) = Operator::prefix_from_token(current.kind) {
            // `&&` only means move when a unary operand follows; otherwise it
            // reached here through a parse error and will be reported below.
            self.advance();
            let operand = self.parse_unary()?;
            let loc = current.loc.merge(&self.arena().loc(operand));
            return Ok(self.arena_mut().alloc(
                AstKind::UnaryExpr {
                    op,
                    operand,
                    prefix: true,
                },
                loc,
            ));
        }
        self.parse_postfix()
    }

    fn lower_launch(&mut self, expr: NodeIndex, loc: cxy_common::FileLoc) -> NodeIndex {
        let expr_loc = self.arena().loc(expr);
        let stmt = self.arena_mut().alloc_flagged(
            AstKind::ExprStmt { expr },
            expr_loc,
            NodeFlags::GENERATED,
        );
        let body = self.arena_mut().mk_block(vec![stmt], expr_loc);
        let closure = self.arena_mut().alloc_flagged(
            AstKind::ClosureExpr {
                is_async: false,
                params: Vec::new(),
                ret: None,
                body,
            },
            loc,
            NodeFlags::GENERATED,
        );
        let launch_atom = self.strings.intern("__thread_launch");
        let callee = self.arena_mut().mk_path(launch_atom, loc);
        self.arena_mut().mk_call(callee, vec![closure], loc)
    }

    // =========================================================================
    // Postfix chain
    // =========================================================================

    fn parse_postfix(&mut self) -> ParseResult<NodeIndex> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current().kind {
                TokenKind::Dot | TokenKind::QuestionDot => {
                    let optional = self.current().kind == TokenKind::QuestionDot;
                    self.advance();
                    let member = match self.current().kind {
                        TokenKind::Ident => {
                            let token = self.advance();
                            let name = token.ident().expect("ident token");
                            self.arena_mut().alloc(AstKind::Identifier { name }, token.loc)
                        }
                        // Tuple element access: `t.0`
                        TokenKind::IntLit => {
                            let token = self.advance();
                            let value = match token.value {
                                TokenValue::Int { value, .. } => value,
                                _ => 0,
                            };
                            self.arena_mut().alloc(
                                AstKind::IntLit {
                                    value,
                                    suffix: None,
                                    negative: false,
                                },
                                token.loc,
                            )
                        }
                        _ => return self.unexpected("a member name"),
                    };
                    let loc = self.arena().loc(expr).merge(&self.arena().loc(member));
                    expr = self.arena_mut().alloc(
                        AstKind::MemberExpr {
                            target: expr,
                            member,
                            optional,
                        },
                        loc,
                    );
                }
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_call_args()?;
                    let loc = self.arena().loc(expr).merge(&self.current().loc);
                    expr = self
                        .arena_mut()
                        .alloc(AstKind::CallExpr { callee: expr, args }, loc);
                }
                TokenKind::LBracket => {
                    self.advance();
                    let mut indices = Vec::new();
                    while !self.check(TokenKind::RBracket) {
                        indices.push(self.parse_expr()?);
                        if self.accept(TokenKind::Comma).is_none() {
                            break;
                        }
                    }
                    self.expect(TokenKind::RBracket)?;
                    let loc = self.arena().loc(expr).merge(&self.current().loc);
                    expr = self.arena_mut().alloc(
                        AstKind::IndexExpr {
                            target: expr,
                            indices,
                        },
                        loc,
                    );
                }
                TokenKind::As => {
                    self.advance();
                    let target = self.parse_type()?;
                    let loc = self.arena().loc(expr).merge(&self.arena().loc(target));
                    expr = self.arena_mut().alloc(
                        AstKind::CastExpr {
                            expr,
                            target,
                            unchecked: false,
                        },
                        loc,
                    );
                }
                TokenKind::BangColon => {
                    self.advance();
                    let target = self.parse_type()?;
                    let loc = self.arena().loc(expr).merge(&self.arena().loc(target));
                    expr = self.arena_mut().alloc(
                        AstKind::CastExpr {
                            expr,
                            target,
                            unchecked: true,
                        },
                        loc,
                    );
                }
                // `name!(args)` macro invocation.
                TokenKind::Bang if self.peek(1).kind == TokenKind::LParen => {
                    self.advance();
                    self.advance();
                    let args = self.parse_call_args()?;
                    let loc = self.arena().loc(expr).merge(&self.current().loc);
                    expr = self
                        .arena_mut()
                        .alloc(AstKind::MacroCallExpr { callee: expr, args }, loc);
                }
                TokenKind::PlusPlus | TokenKind::MinusMinus => {
                    let op = Operator::postfix_from_token(self.current().kind)
                        .expect("postfix operator");
                    let token = self.advance();
                    let loc = self.arena().loc(expr).merge(&token.loc);
                    expr = self.arena_mut().alloc(
                        AstKind::UnaryExpr {
                            op,
                            operand: expr,
                            prefix: false,
                        },
                        loc,
                    );
                }
                TokenKind::LBrace if self.allow_struct_literal => {
                    // `Point{...}` and `Box[i32]{...}`; anything else keeps
                    // the brace for the enclosing statement.
                    let path_like = match self.arena().kind(expr) {
                        AstKind::Path { .. } => true,
                        AstKind::IndexExpr { target, .. } => {
                            matches!(self.arena().kind(*target), AstKind::Path { .. })
                        }
                        _ => false,
                    };
                    if !path_like {
                        break;
                    }
                    expr = self.parse_struct_expr(expr)?;
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    pub(crate) fn parse_call_args(&mut self) -> ParseResult<NodeList> {
        let mut args = Vec::new();
        while !self.check(TokenKind::RParen) {
            args.push(self.parse_expr()?);
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    // =========================================================================
    // Primary expressions
    // =========================================================================

    fn parse_primary(&mut self) -> ParseResult<NodeIndex> {
        let current = self.current();
        match current.kind {
            TokenKind::IntLit => {
                self.advance();
                let (value, suffix) = match current.value {
                    TokenValue::Int { value, suffix } => (value, suffix),
                    _ => (0, None),
                };
                Ok(self.arena_mut().alloc(
                    AstKind::IntLit {
                        value,
                        suffix,
                        negative: false,
                    },
                    current.loc,
                ))
            }
            TokenKind::FloatLit => {
                self.advance();
                let (value, suffix) = match current.value {
                    TokenValue::Float { value, suffix } => (value, suffix),
                    _ => (0.0, None),
                };
                Ok(self
                    .arena_mut()
                    .alloc(AstKind::FloatLit { value, suffix }, current.loc))
            }
            TokenKind::CharLit => {
                self.advance();
                let raw = match current.value {
                    TokenValue::Char(atom) => atom,
                    _ => cxy_common::Atom::DUMMY,
                };
                Ok(self.arena_mut().alloc(AstKind::CharLit { raw }, current.loc))
            }
            TokenKind::StrLit => {
                self.advance();
                let raw = match current.value {
                    TokenValue::Str(atom) => atom,
                    _ => cxy_common::Atom::DUMMY,
                };
                Ok(self.arena_mut().alloc(AstKind::StringLit { raw }, current.loc))
            }
            TokenKind::True | TokenKind::False => {
                self.advance();
                Ok(self.arena_mut().alloc(
                    AstKind::BoolLit {
                        value: current.kind == TokenKind::True,
                    },
                    current.loc,
                ))
            }
            TokenKind::Null => {
                self.advance();
                Ok(self.arena_mut().alloc(AstKind::NullLit, current.loc))
            }
            TokenKind::Ident | TokenKind::Super | TokenKind::This | TokenKind::ThisType => {
                self.parse_path()
            }
            TokenKind::LParen => self.parse_paren_or_closure(),
            TokenKind::Async if self.peek(1).kind == TokenKind::LParen => {
                self.parse_paren_or_closure()
            }
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LStr => self.parse_string_expr(),
            TokenKind::HashLBrace => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RBrace)?;
                let loc = current.loc.merge(&self.current().loc);
                Ok(self.arena_mut().alloc_flagged(
                    AstKind::Substitute { expr },
                    loc,
                    NodeFlags::COMPTIME,
                ))
            }
            TokenKind::Asm => self.parse_asm(),
            _ => self.unexpected("an expression"),
        }
    }

    /// Dotted path `a.b.c`; elements are only absorbed while the token after
    /// the dot is an identifier, so `t.0` and `f().x` stay member accesses.
    pub(crate) fn parse_path(&mut self) -> ParseResult<NodeIndex> {
        let mut elements = Vec::new();
        let start = self.current().loc;
        loop {
            let token = self.current();
            let name = match token.kind {
                TokenKind::Ident => token.ident().expect("ident token"),
                TokenKind::Super => self.strings.intern("super"),
                TokenKind::This => self.strings.intern("this"),
                TokenKind::ThisType => self.strings.intern("This"),
                _ => return self.unexpected("a name"),
            };
            self.advance();
            elements.push(self.arena_mut().alloc(
                AstKind::PathElement {
                    name,
                    args: Vec::new(),
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
        Ok(self.arena_mut().alloc(AstKind::Path { elements }, loc))
    }

    /// Decide between a closure, a parenthesized expression and a tuple
    /// literal using the lookahead window.
    fn parse_paren_or_closure(&mut self) -> ParseResult<NodeIndex> {
        if self.looks_like_closure() {
            return self.parse_closure();
        }
        let start = self.expect(TokenKind::LParen)?;
        if self.accept(TokenKind::RParen).is_some() {
            // `()` is the empty tuple.
            let loc = start.loc.merge(&self.current().loc);
            return Ok(self
                .arena_mut()
                .alloc(AstKind::TupleExpr { elements: Vec::new() }, loc));
        }
        let saved = self.allow_struct_literal;
        self.allow_struct_literal = true;
        let first = self.parse_expr()?;
        if self.accept(TokenKind::Comma).is_some() {
            let mut elements = vec![first];
            while !self.check(TokenKind::RParen) {
                elements.push(self.parse_expr()?);
                if self.accept(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
            self.allow_struct_literal = saved;
            let loc = start.loc.merge(&self.current().loc);
            return Ok(self.arena_mut().alloc(AstKind::TupleExpr { elements }, loc));
        }
        self.expect(TokenKind::RParen)?;
        self.allow_struct_literal = saved;
        let loc = start.loc.merge(&self.current().loc);
        Ok(self.arena_mut().alloc(AstKind::GroupExpr { inner: first }, loc))
    }

    /// Closure detection: `(` followed by `)` + `=>`/`:`, an attribute, or
    /// `name :`/`name ,`/`name )` + `=>`.
    fn looks_like_closure(&self) -> bool {
        let offset = usize::from(self.current().kind == TokenKind::Async);
        if self.peek(offset).kind != TokenKind::LParen {
            return false;
        }
        if offset + 1 >= cxy_common::limits::LOOKAHEAD {
            return false;
        }
        let first = self.peek(offset + 1).kind;
        if first == TokenKind::At {
            return true;
        }
        if first == TokenKind::RParen {
            let after = self.peek(offset + 2).kind;
            return after == TokenKind::FatArrow || after == TokenKind::Colon;
        }
        if first == TokenKind::Ident && offset + 2 < cxy_common::limits::LOOKAHEAD {
            let second = self.peek(offset + 2).kind;
            if second == TokenKind::Colon || second == TokenKind::Comma {
                return true;
            }
            if second == TokenKind::RParen && offset + 3 < cxy_common::limits::LOOKAHEAD {
                return self.peek(offset + 3).kind == TokenKind::FatArrow;
            }
        }
        false
    }

    /// `async? ( params ) : ret? => body`
    fn parse_closure(&mut self) -> ParseResult<NodeIndex> {
        let start = self.current().loc;
        let is_async = self.accept(TokenKind::Async).is_some();
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.check(TokenKind::RParen) {
            let attrs = self.parse_attributes()?;
            let name_token = self.expect(TokenKind::Ident)?;
            let name = name_token.ident().expect("ident token");
            let ty = if self.accept(TokenKind::Colon).is_some() {
                Some(self.parse_type()?)
            } else {
                None
            };
            let loc = name_token.loc.merge(&self.current().loc);
            let param = self.arena_mut().alloc(
                AstKind::FuncParam {
                    name,
                    ty,
                    default: None,
                },
                loc,
            );
            self.arena_mut().get_mut(param).attrs = attrs;
            params.push(param);
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        let ret = if self.accept(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(TokenKind::FatArrow)?;
        let body = if self.check(TokenKind::LBrace) {
            self.parse_block()?
        } else {
            let expr = self.parse_expr()?;
            let loc = self.arena().loc(expr);
            let ret_stmt = self
                .arena_mut()
                .alloc(AstKind::ReturnStmt { value: Some(expr) }, loc);
            self.arena_mut().mk_block(vec![ret_stmt], loc)
        };
        let loc = start.merge(&self.current().loc);
        let mut flags = NodeFlags::CLOSURE;
        if is_async {
            flags |= NodeFlags::ASYNC;
        }
        Ok(self.arena_mut().alloc_flagged(
            AstKind::ClosureExpr {
                is_async,
                params,
                ret,
                body,
            },
            loc,
            flags,
        ))
    }

    fn parse_array_literal(&mut self) -> ParseResult<NodeIndex> {
        let start = self.expect(TokenKind::LBracket)?;
        let mut elements = Vec::new();
        while !self.check(TokenKind::RBracket) {
            elements.push(self.parse_expr()?);
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RBracket)?;
        let loc = start.loc.merge(&self.current().loc);
        Ok(self.arena_mut().alloc(AstKind::ArrayExpr { elements }, loc))
    }

    /// `` `text${expr}more` `` becomes a `StringExpr` whose parts alternate
    /// literal text and expressions; the shaker rewrites it into builder
    /// appends.
    fn parse_string_expr(&mut self) -> ParseResult<NodeIndex> {
        let start = self.expect(TokenKind::LStr)?;
        let mut parts = Vec::new();
        loop {
            let current = self.current();
            match current.kind {
                TokenKind::StrLit => {
                    self.advance();
                    let raw = match current.value {
                        TokenValue::Str(atom) => atom,
                        _ => cxy_common::Atom::DUMMY,
                    };
                    parts.push(self.arena_mut().alloc(AstKind::StringLit { raw }, current.loc));
                }
                TokenKind::LStrFmt => {
                    self.advance();
                    parts.push(self.parse_expr()?);
                    self.expect(TokenKind::LStrFmt)?;
                }
                TokenKind::RStr => {
                    self.advance();
                    break;
                }
                _ => return self.unexpected("an interpolated string part"),
            }
        }
        let loc = start.loc.merge(&self.current().loc);
        Ok(self.arena_mut().alloc(AstKind::StringExpr { parts }, loc))
    }

    /// `Path { field: value, shorthand, ... }`
    fn parse_struct_expr(&mut self, left: NodeIndex) -> ParseResult<NodeIndex> {
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.check(TokenKind::RBrace) {
            let name_token = self.expect(TokenKind::Ident)?;
            let name = name_token.ident().expect("ident token");
            let value = if self.accept(TokenKind::Colon).is_some() {
                self.parse_expr()?
            } else {
                // Shorthand `{ x }` initializes from a same-named binding.
                self.arena_mut().alloc(AstKind::Identifier { name }, name_token.loc)
            };
            let loc = name_token.loc.merge(&self.arena().loc(value));
            fields.push(self.arena_mut().alloc(AstKind::FieldInit { name, value }, loc));
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        let loc = self.arena().loc(left).merge(&self.current().loc);
        Ok(self.arena_mut().alloc(AstKind::StructExpr { left, fields }, loc))
    }

    /// `asm("template" : outputs : inputs : clobbers : flags)`
    fn parse_asm(&mut self) -> ParseResult<NodeIndex> {
        let start = self.expect(TokenKind::Asm)?;
        self.expect(TokenKind::LParen)?;
        let template_token = self.expect(TokenKind::StrLit)?;
        let template = match template_token.value {
            TokenValue::Str(atom) => atom,
            _ => cxy_common::Atom::DUMMY,
        };
        let mut sections: [NodeList; 4] = [Vec::new(), Vec::new(), Vec::new(), Vec::new()];
        let mut section = 0usize;
        while self.accept(TokenKind::Colon).is_some() && section < 4 {
            while !self.check(TokenKind::Colon) && !self.check(TokenKind::RParen) {
                sections[section].push(self.parse_expr()?);
                if self.accept(TokenKind::Comma).is_none() {
                    break;
                }
            }
            section += 1;
        }
        self.expect(TokenKind::RParen)?;
        let [outputs, inputs, clobbers, flags] = sections;
        let loc = start.loc.merge(&self.current().loc);
        Ok(self.arena_mut().alloc(
            AstKind::AsmExpr {
                template,
                outputs,
                inputs,
                clobbers,
                flags,
            },
            loc,
        ))
    }

    /// Parse a condition expression with struct literals disabled so the
    /// statement body's `{` is not absorbed.
    pub(crate) fn parse_condition(&mut self) -> ParseResult<NodeIndex> {
        let saved = self.allow_struct_literal;
        self.allow_struct_literal = false;
        let result = self.parse_expr();
        self.allow_struct_literal = saved;
        result
    }
}
