//! The parser.
//!
//! Single-threaded recursive descent with a Pratt climber for binary
//! expressions and a 4-token lookahead window. Errors propagate as a
//! sum-typed result: `Recoverable` sends the parser to `synchronize()`,
//! which skips to the next declaration-start token; `Fatal` abandons the
//! unit. The parser never silently skips a construct.

pub mod decl;
mod expr;
mod stmt;
mod types;

use crate::ast::{AstKind, NodeArena, NodeFlags, NodeIndex, NodeList};
use cxy_common::limits::LOOKAHEAD;
use cxy_common::{FileLoc, Interner, Log};
use cxy_lexer::{FrontendCtx, Lexer, SourceLoader, Token, TokenKind, TokenValue};
use tracing::debug;

/// How a parse rule failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Synchronize and keep going.
    Recoverable,
    /// Abandon the whole unit (a missing include, or cascading failure).
    Fatal,
}

pub type ParseResult<T> = Result<T, ParseError>;

pub struct ParserState<'a> {
    pub strings: &'a mut Interner,
    pub log: &'a mut Log,
    lexer: Lexer,
    arena: NodeArena,
    window: [Token; LOOKAHEAD],
    /// Struct literals are disallowed while parsing `if`/`while`/`for`/`match`
    /// headers so `if (x) { ... }` reads the brace as a block.
    allow_struct_literal: bool,
}

impl<'a> ParserState<'a> {
    pub fn new(
        strings: &'a mut Interner,
        log: &'a mut Log,
        file_name: &str,
        source: String,
    ) -> Self {
        Self::with_lexer(strings, log, file_name, source, None)
    }

    /// Construct with an include loader installed.
    pub fn with_loader(
        strings: &'a mut Interner,
        log: &'a mut Log,
        file_name: &str,
        source: String,
        loader: SourceLoader,
    ) -> Self {
        Self::with_lexer(strings, log, file_name, source, Some(loader))
    }

    fn with_lexer(
        strings: &'a mut Interner,
        log: &'a mut Log,
        file_name: &str,
        source: String,
        loader: Option<SourceLoader>,
    ) -> Self {
        let file = strings.intern(file_name);
        let mut lexer = Lexer::new(file, source);
        if let Some(loader) = loader {
            lexer = lexer.with_loader(loader);
        }
        let eof = Token::new(TokenKind::Eof, FileLoc::synthetic());
        let mut state = ParserState {
            strings,
            log,
            lexer,
            arena: NodeArena::new(),
            window: [eof; LOOKAHEAD],
            allow_struct_literal: true,
        };
        for _ in 0..LOOKAHEAD {
            state.shift();
        }
        state
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut NodeArena {
        &mut self.arena
    }

    pub fn into_arena(self) -> NodeArena {
        self.arena
    }

    // =========================================================================
    // Token window
    // =========================================================================

    fn shift(&mut self) {
        let mut ctx = FrontendCtx {
            strings: &mut *self.strings,
            log: &mut *self.log,
        };
        let next = self.lexer.next_token(&mut ctx);
        self.window.rotate_left(1);
        self.window[LOOKAHEAD - 1] = next;
    }

    #[inline]
    pub(crate) fn current(&self) -> Token {
        self.window[0]
    }

    #[inline]
    pub(crate) fn peek(&self, n: usize) -> Token {
        debug_assert!(n < LOOKAHEAD);
        self.window[n]
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.window[0];
        self.shift();
        token
    }

    #[inline]
    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    /// Consume the current token when it matches.
    pub(crate) fn accept(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Consume a token of `kind` or report an error.
    pub(crate) fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(kind) {
            return Ok(self.advance());
        }
        self.unexpected(kind.describe())
    }

    /// Report the current token as unexpected; fatal if the lexer is
    /// poisoned (a failed include cannot be recovered from).
    pub(crate) fn unexpected<T>(&mut self, expected: &str) -> ParseResult<T> {
        let current = self.current();
        self.log.error(
            current.loc,
            format!("expected {expected}, found {}", current.kind.describe()),
        );
        if current.kind == TokenKind::Error && self.lexer.poisoned() {
            return Err(ParseError::Fatal);
        }
        Err(ParseError::Recoverable)
    }

    /// Skip ahead to the next declaration-start token after a recoverable
    /// error. Always makes progress.
    pub(crate) fn synchronize(&mut self) {
        debug!("parser synchronizing");
        self.advance();
        while !self.current().kind.starts_declaration() {
            if self.check(TokenKind::Semicolon) || self.check(TokenKind::RBrace) {
                self.advance();
                return;
            }
            self.advance();
        }
    }

    /// Skip to a statement boundary inside a block.
    pub(crate) fn synchronize_stmt(&mut self) {
        self.advance();
        loop {
            match self.current().kind {
                TokenKind::Semicolon => {
                    self.advance();
                    return;
                }
                TokenKind::RBrace | TokenKind::Eof => return,
                k if k.starts_declaration() => return,
                TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Match
                | TokenKind::Return
                | TokenKind::Break
                | TokenKind::Continue
                | TokenKind::Defer
                | TokenKind::Raise => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    pub(crate) fn ident_text(&self, token: &Token) -> Option<&str> {
        match token.value {
            TokenValue::Ident(atom) => Some(self.strings.resolve(atom)),
            _ => None,
        }
    }

    // =========================================================================
    // Program
    // =========================================================================

    /// Parse a whole compilation unit. Recoverable errors synchronize at
    /// declaration granularity; a fatal error stops the unit but still
    /// returns the partial program.
    pub fn parse_program(&mut self) -> NodeIndex {
        let start_loc = self.current().loc;
        let module = self.parse_module_header();
        let mut imports: NodeList = Vec::new();
        let mut decls: NodeList = Vec::new();

        while !self.check(TokenKind::Eof) {
            match self.parse_top_level() {
                Ok(Some(decl)) => {
                    if matches!(self.arena.kind(decl), AstKind::ImportDecl { .. }) {
                        imports.push(decl);
                    } else {
                        self.arena.add_flags(decl, NodeFlags::TOP_LEVEL_DECL);
                        decls.push(decl);
                    }
                }
                Ok(None) => {}
                Err(ParseError::Recoverable) => self.synchronize(),
                Err(ParseError::Fatal) => break,
            }
        }

        let loc = start_loc.merge(&self.current().loc);
        self.arena.alloc(
            AstKind::Program {
                module,
                imports,
                decls,
            },
            loc,
        )
    }

    /// `module name` is a soft keyword: only recognized at the very start
    /// of the unit.
    fn parse_module_header(&mut self) -> Option<NodeIndex> {
        let current = self.current();
        if current.kind != TokenKind::Ident || self.peek(1).kind != TokenKind::Ident {
            return None;
        }
        if self.ident_text(&current) != Some("module") {
            return None;
        }
        self.advance();
        let name_token = self.advance();
        let name = name_token.ident().expect("checked ident lookahead");
        self.accept(TokenKind::Semicolon);
        Some(self.arena.alloc(AstKind::ModuleDecl { name }, current.loc.merge(&name_token.loc)))
    }
}
