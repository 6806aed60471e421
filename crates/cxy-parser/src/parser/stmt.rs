//! Statement parsing.

use super::{ParseError, ParseResult, ParserState};
use crate::ast::{AstKind, NodeFlags, NodeIndex};
use cxy_lexer::TokenKind;

impl<'a> ParserState<'a> {
    pub(crate) fn parse_block(&mut self) -> ParseResult<NodeIndex> {
        let start = self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            match self.parse_stmt() {
                Ok(stmt) => stmts.push(stmt),
                Err(ParseError::Fatal) => return Err(ParseError::Fatal),
                Err(ParseError::Recoverable) => self.synchronize_stmt(),
            }
        }
        self.expect(TokenKind::RBrace)?;
        let loc = start.loc.merge(&self.current().loc);
        Ok(self.arena_mut().alloc(AstKind::Block { stmts }, loc))
    }

    pub(crate) fn parse_stmt(&mut self) -> ParseResult<NodeIndex> {
        match self.current().kind {
            TokenKind::LBrace => self.parse_block(),
            TokenKind::Var | TokenKind::Const => self.parse_var_decl(),
            TokenKind::Func => self.parse_func_decl(),
            TokenKind::If => self.parse_if_stmt(false),
            TokenKind::While => self.parse_while_stmt(false),
            TokenKind::For => self.parse_for_stmt(false),
            TokenKind::Match => self.parse_match_stmt(),
            TokenKind::Return => self.parse_return_stmt(),
            TokenKind::Break => {
                let token = self.advance();
                self.accept(TokenKind::Semicolon);
                Ok(self.arena_mut().alloc(AstKind::BreakStmt, token.loc))
            }
            TokenKind::Continue => {
                let token = self.advance();
                self.accept(TokenKind::Semicolon);
                Ok(self.arena_mut().alloc(AstKind::ContinueStmt, token.loc))
            }
            TokenKind::Defer => {
                let token = self.advance();
                let expr = if self.check(TokenKind::LBrace) {
                    self.parse_block()?
                } else {
                    self.parse_expr()?
                };
                self.accept(TokenKind::Semicolon);
                let loc = token.loc.merge(&self.arena().loc(expr));
                Ok(self.arena_mut().alloc(AstKind::DeferStmt { expr }, loc))
            }
            TokenKind::Raise => {
                let token = self.advance();
                let value = self.parse_expr()?;
                self.accept(TokenKind::Semicolon);
                let loc = token.loc.merge(&self.arena().loc(value));
                Ok(self.arena_mut().alloc(AstKind::RaiseStmt { value }, loc))
            }
            TokenKind::Yield => {
                let token = self.advance();
                let value = self.parse_expr()?;
                self.accept(TokenKind::Semicolon);
                let loc = token.loc.merge(&self.arena().loc(value));
                Ok(self.arena_mut().alloc(AstKind::YieldStmt { value }, loc))
            }
            TokenKind::Async if self.peek(1).kind == TokenKind::LBrace => self.parse_async_stmt(),
            TokenKind::HashIf => self.parse_comptime_if_decl(),
            TokenKind::HashFor => self.parse_comptime_for_stmt(),
            TokenKind::HashWhile => self.parse_while_stmt(true),
            TokenKind::HashConst => self.parse_comptime_const(),
            _ => {
                let expr = self.parse_expr()?;
                self.accept(TokenKind::Semicolon);
                let loc = self.arena().loc(expr);
                Ok(self.arena_mut().alloc(AstKind::ExprStmt { expr }, loc))
            }
        }
    }

    /// `if (cond) stmt else stmt` - the condition may declare a variable,
    /// which the shaker hoists into the enclosing block.
    fn parse_if_stmt(&mut self, comptime: bool) -> ParseResult<NodeIndex> {
        let start = self.advance();
        self.expect(TokenKind::LParen)?;
        let cond = if matches!(self.current().kind, TokenKind::Var | TokenKind::Const) {
            self.parse_var_decl()?
        } else {
            self.parse_condition()?
        };
        self.expect(TokenKind::RParen)?;
        let then = self.parse_stmt()?;
        let otherwise = if self.accept(TokenKind::Else).is_some() {
            Some(self.parse_stmt()?)
        } else {
            None
        };
        let loc = start.loc.merge(&self.current().loc);
        let flags = if comptime {
            NodeFlags::COMPTIME
        } else {
            NodeFlags::empty()
        };
        Ok(self.arena_mut().alloc_flagged(
            AstKind::IfStmt {
                cond,
                then,
                otherwise,
            },
            loc,
            flags,
        ))
    }

    fn parse_while_stmt(&mut self, comptime: bool) -> ParseResult<NodeIndex> {
        let start = self.advance();
        self.expect(TokenKind::LParen)?;
        let cond = if matches!(self.current().kind, TokenKind::Var | TokenKind::Const) {
            self.parse_var_decl()?
        } else {
            self.parse_condition()?
        };
        self.expect(TokenKind::RParen)?;
        let body = self.parse_stmt()?;
        let loc = start.loc.merge(&self.current().loc);
        let flags = if comptime {
            NodeFlags::COMPTIME
        } else {
            NodeFlags::empty()
        };
        Ok(self
            .arena_mut()
            .alloc_flagged(AstKind::WhileStmt { cond, body }, loc, flags))
    }

    /// `for (const x : range) body`
    pub(crate) fn parse_for_stmt(&mut self, comptime: bool) -> ParseResult<NodeIndex> {
        let start = self.advance();
        self.expect(TokenKind::LParen)?;
        if !matches!(self.current().kind, TokenKind::Var | TokenKind::Const) {
            return self.unexpected("'var' or 'const'");
        }
        let binding = self.advance();
        let mut names = Vec::new();
        loop {
            let name_token = self.expect(TokenKind::Ident)?;
            let name = name_token.ident().expect("ident token");
            names.push(
                self.arena_mut()
                    .alloc(AstKind::Identifier { name }, name_token.loc),
            );
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::Colon)?;
        let range = self.parse_condition()?;
        self.expect(TokenKind::RParen)?;
        let body = self.parse_stmt()?;

        let mut var_flags = NodeFlags::empty();
        if binding.kind == TokenKind::Const {
            var_flags |= NodeFlags::CONST;
        }
        let var = self.arena_mut().alloc_flagged(
            AstKind::VarDecl {
                names,
                ty: None,
                init: None,
            },
            binding.loc,
            var_flags,
        );
        let loc = start.loc.merge(&self.current().loc);
        let flags = if comptime {
            NodeFlags::COMPTIME
        } else {
            NodeFlags::empty()
        };
        Ok(self
            .arena_mut()
            .alloc_flagged(AstKind::ForStmt { var, range, body }, loc, flags))
    }

    pub(crate) fn parse_comptime_for_stmt(&mut self) -> ParseResult<NodeIndex> {
        debug_assert!(self.check(TokenKind::HashFor));
        self.parse_for_stmt(true)
    }

    fn parse_return_stmt(&mut self) -> ParseResult<NodeIndex> {
        let start = self.advance();
        let value = if self.check(TokenKind::Semicolon) || self.check(TokenKind::RBrace) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.accept(TokenKind::Semicolon);
        let loc = start.loc.merge(&self.current().loc);
        Ok(self.arena_mut().alloc(AstKind::ReturnStmt { value }, loc))
    }

    /// `match (scrutinee) { case pat => body; ... else => body; }`
    fn parse_match_stmt(&mut self) -> ParseResult<NodeIndex> {
        let start = self.expect(TokenKind::Match)?;
        self.expect(TokenKind::LParen)?;
        let scrutinee = self.parse_condition()?;
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::LBrace)?;
        let mut arms = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            match self.parse_match_arm() {
                Ok(arm) => arms.push(arm),
                Err(ParseError::Fatal) => return Err(ParseError::Fatal),
                Err(ParseError::Recoverable) => self.synchronize_stmt(),
            }
        }
        self.expect(TokenKind::RBrace)?;
        let loc = start.loc.merge(&self.current().loc);
        Ok(self
            .arena_mut()
            .alloc(AstKind::MatchStmt { scrutinee, arms }, loc))
    }

    fn parse_match_arm(&mut self) -> ParseResult<NodeIndex> {
        let start = self.current().loc;
        let mut patterns = Vec::new();
        let mut binding = None;
        let mut flags = NodeFlags::empty();
        if self.accept(TokenKind::Else).is_some() {
            flags |= NodeFlags::DEFAULT_CASE;
        } else {
            self.expect(TokenKind::Case)?;
            loop {
                patterns.push(self.parse_condition()?);
                if self.accept(TokenKind::Comma).is_none() {
                    break;
                }
            }
            // `case T as name` reaches us as a cast expression because `as`
            // is absorbed by the postfix chain; unwrap it into pattern +
            // binding.
            if let Some(&last) = patterns.last() {
                if let AstKind::CastExpr {
                    expr,
                    target,
                    unchecked: false,
                } = *self.arena().kind(last)
                {
                    if let AstKind::Path { elements } = self.arena().kind(target) {
                        if elements.len() == 1 {
                            if let AstKind::PathElement { name, .. } =
                                self.arena().kind(elements[0])
                            {
                                binding = Some(*name);
                                *patterns.last_mut().expect("non-empty") = expr;
                            }
                        }
                    }
                }
            }
        }
        self.expect(TokenKind::FatArrow)?;
        let body = if self.check(TokenKind::LBrace) {
            self.parse_block()?
        } else {
            let stmt = self.parse_stmt()?;
            let loc = self.arena().loc(stmt);
            self.arena_mut().mk_block(vec![stmt], loc)
        };
        let loc = start.merge(&self.current().loc);
        Ok(self.arena_mut().alloc_flagged(
            AstKind::MatchArm {
                patterns,
                binding,
                body,
            },
            loc,
            flags,
        ))
    }

    /// `async { body }` wraps the body in a `__async!` macro call which the
    /// shaker expands against the runtime.
    fn parse_async_stmt(&mut self) -> ParseResult<NodeIndex> {
        let start = self.expect(TokenKind::Async)?;
        let body = self.parse_block()?;
        let loc = start.loc.merge(&self.current().loc);
        let closure = self.arena_mut().alloc_flagged(
            AstKind::ClosureExpr {
                is_async: true,
                params: Vec::new(),
                ret: None,
                body,
            },
            loc,
            NodeFlags::GENERATED | NodeFlags::ASYNC,
        );
        let async_atom = self.strings.intern("__async");
        let callee = self.arena_mut().mk_path(async_atom, loc);
        let call = self.arena_mut().alloc_flagged(
            AstKind::MacroCallExpr {
                callee,
                args: vec![closure],
            },
            loc,
            NodeFlags::GENERATED,
        );
        Ok(self.arena_mut().alloc(AstKind::ExprStmt { expr: call }, loc))
    }
}
