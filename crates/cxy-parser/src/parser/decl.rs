//! Declaration parsing: functions, aggregates, enums, aliases, exceptions,
//! macros, tests, imports, attributes and modifiers.

use super::{ParseError, ParseResult, ParserState};
use crate::ast::{AstKind, NodeFlags, NodeIndex, NodeList, Operator};
use cxy_common::Atom;
use cxy_lexer::{TokenKind, TokenValue};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// Canonical overload names to operators, for `func op_add(...)`-style
/// operator declarations.
static OVERLOAD_NAMES: Lazy<FxHashMap<&'static str, Operator>> = Lazy::new(|| {
    let mut map = FxHashMap::default();
    for op in [
        Operator::Add,
        Operator::Sub,
        Operator::Mul,
        Operator::Div,
        Operator::Rem,
        Operator::Shl,
        Operator::Shr,
        Operator::BAnd,
        Operator::BOr,
        Operator::BXor,
        Operator::Eq,
        Operator::Ne,
        Operator::Lt,
        Operator::Gt,
        Operator::Leq,
        Operator::Geq,
        Operator::Minus,
        Operator::Not,
        Operator::Compl,
        Operator::Deref,
        Operator::Call,
        Operator::Index,
        Operator::IndexAssign,
        Operator::Str,
        Operator::Init,
        Operator::Deinit,
        Operator::Copy,
        Operator::Destructor,
        Operator::Hash,
        Operator::Truthy,
    ] {
        map.insert(op.overload_name(), op);
    }
    map
});

impl<'a> ParserState<'a> {
    /// One top-level item. Returns `None` for stray semicolons.
    pub(crate) fn parse_top_level(&mut self) -> ParseResult<Option<NodeIndex>> {
        if self.accept(TokenKind::Semicolon).is_some() {
            return Ok(None);
        }
        let attrs = self.parse_attributes()?;
        if self.check(TokenKind::Import) {
            let decl = self.parse_import()?;
            self.arena_mut().get_mut(decl).attrs = attrs;
            return Ok(Some(decl));
        }
        // A bare attribute line is a directive consumed by the driver's
        // preprocessor (`@define`, `@cBuild`, ...).
        if !attrs.is_empty() && !self.starts_declaration_after_attrs() {
            return Ok(Some(attrs[0]));
        }
        let decl = self.parse_declaration()?;
        self.arena_mut().get_mut(decl).attrs = attrs;
        Ok(Some(decl))
    }

    fn starts_declaration_after_attrs(&self) -> bool {
        if self.check(TokenKind::Eof) {
            return false;
        }
        self.current().kind.starts_declaration()
            || matches!(
                self.current().kind,
                TokenKind::Extern
                    | TokenKind::Static
                    | TokenKind::Abstract
                    | TokenKind::Virtual
                    | TokenKind::Async
                    | TokenKind::Exception
                    | TokenKind::Test
            )
    }

    /// `@name` or `@name(arg, name: value, ...)`, repeated.
    pub(crate) fn parse_attributes(&mut self) -> ParseResult<NodeList> {
        let mut attrs = Vec::new();
        while self.check(TokenKind::At) {
            let at = self.advance();
            let name_token = self.expect(TokenKind::Ident)?;
            let name = name_token.ident().expect("ident token");
            let mut args = Vec::new();
            if self.accept(TokenKind::LParen).is_some() {
                while !self.check(TokenKind::RParen) {
                    args.push(self.parse_attr_arg()?);
                    if self.accept(TokenKind::Comma).is_none() {
                        break;
                    }
                }
                self.expect(TokenKind::RParen)?;
            }
            let loc = at.loc.merge(&self.current().loc);
            attrs.push(self.arena_mut().alloc(AstKind::Attr { name, args }, loc));
        }
        Ok(attrs)
    }

    fn parse_attr_arg(&mut self) -> ParseResult<NodeIndex> {
        // `name: value` pairs become FieldInit nodes, anything else is a
        // plain expression.
        if self.check(TokenKind::Ident) && self.peek(1).kind == TokenKind::Colon {
            let name_token = self.advance();
            let name = name_token.ident().expect("ident token");
            self.advance();
            let value = self.parse_expr()?;
            let loc = name_token.loc.merge(&self.arena().loc(value));
            return Ok(self.arena_mut().alloc(AstKind::FieldInit { name, value }, loc));
        }
        self.parse_expr()
    }

    /// Modifier keywords before a declaration.
    fn parse_modifiers(&mut self) -> NodeFlags {
        let mut flags = NodeFlags::empty();
        loop {
            match self.current().kind {
                TokenKind::Pub => flags |= NodeFlags::PUBLIC,
                TokenKind::Extern => flags |= NodeFlags::EXTERN,
                TokenKind::Static => flags |= NodeFlags::STATIC,
                TokenKind::Abstract => flags |= NodeFlags::ABSTRACT,
                TokenKind::Virtual => flags |= NodeFlags::VIRTUAL,
                _ => return flags,
            }
            self.advance();
        }
    }

    pub(crate) fn parse_declaration(&mut self) -> ParseResult<NodeIndex> {
        let flags = self.parse_modifiers();
        let decl = match self.current().kind {
            TokenKind::Func | TokenKind::Async => self.parse_func_decl()?,
            TokenKind::Struct => self.parse_struct_decl()?,
            TokenKind::Class => self.parse_class_decl()?,
            TokenKind::Interface => self.parse_interface_decl()?,
            TokenKind::Enum => self.parse_enum_decl()?,
            TokenKind::Type => self.parse_type_decl()?,
            TokenKind::Exception => self.parse_exception_decl()?,
            TokenKind::Macro => self.parse_macro_decl()?,
            TokenKind::Test => self.parse_test_decl()?,
            TokenKind::Var | TokenKind::Const => self.parse_var_decl()?,
            TokenKind::HashIf => self.parse_comptime_if_decl()?,
            TokenKind::HashFor => self.parse_comptime_for_stmt()?,
            TokenKind::HashConst => self.parse_comptime_const()?,
            _ => return self.unexpected("a declaration"),
        };
        self.arena_mut().add_flags(decl, flags);
        Ok(decl)
    }

    // =========================================================================
    // Functions
    // =========================================================================

    pub(crate) fn parse_func_decl(&mut self) -> ParseResult<NodeIndex> {
        let is_async = self.accept(TokenKind::Async).is_some();
        let start = self.expect(TokenKind::Func)?;
        let name_token = self.expect(TokenKind::Ident)?;
        let name = name_token.ident().expect("ident token");
        let operator = self
            .ident_text(&name_token)
            .and_then(|text| OVERLOAD_NAMES.get(text).copied());

        let generic_params = self.parse_generic_params()?;
        self.expect(TokenKind::LParen)?;
        let params = self.parse_func_params()?;
        self.expect(TokenKind::RParen)?;

        let ret = if self.accept(TokenKind::Arrow).is_some()
            || self.accept(TokenKind::Colon).is_some()
        {
            Some(self.parse_type()?)
        } else {
            None
        };

        let body = if self.check(TokenKind::LBrace) {
            Some(self.parse_block()?)
        } else if self.accept(TokenKind::FatArrow).is_some() {
            let expr = self.parse_expr()?;
            self.accept(TokenKind::Semicolon);
            let loc = self.arena().loc(expr);
            let ret_stmt = self
                .arena_mut()
                .alloc(AstKind::ReturnStmt { value: Some(expr) }, loc);
            Some(self.arena_mut().mk_block(vec![ret_stmt], loc))
        } else {
            // Signature-only declaration (extern or interface member).
            self.accept(TokenKind::Semicolon);
            None
        };

        let loc = start.loc.merge(&self.current().loc);
        let mut flags = NodeFlags::empty();
        if is_async {
            flags |= NodeFlags::ASYNC;
        }
        let mut has_variadic = false;
        for &param in &params {
            if self.arena().flags(param).contains(NodeFlags::VARIADIC) {
                has_variadic = true;
            }
        }
        if has_variadic {
            flags |= NodeFlags::VARIADIC;
        }
        let decl = self.arena_mut().alloc_flagged(
            AstKind::FuncDecl {
                name,
                generic_params,
                params,
                ret,
                body,
                operator,
            },
            loc,
            flags,
        );
        Ok(decl)
    }

    /// `[T, U: Constraint, V = i32]` after a declaration name.
    pub(crate) fn parse_generic_params(&mut self) -> ParseResult<NodeList> {
        let mut params = Vec::new();
        if self.accept(TokenKind::LBracket).is_none() {
            return Ok(params);
        }
        while !self.check(TokenKind::RBracket) {
            let name_token = self.expect(TokenKind::Ident)?;
            let name = name_token.ident().expect("ident token");
            let mut constraints = Vec::new();
            if self.accept(TokenKind::Colon).is_some() {
                constraints.push(self.parse_type()?);
                while self.accept(TokenKind::Amp).is_some() {
                    constraints.push(self.parse_type()?);
                }
            }
            let default = if self.accept(TokenKind::Assign).is_some() {
                Some(self.parse_type()?)
            } else {
                None
            };
            let loc = name_token.loc.merge(&self.current().loc);
            params.push(self.arena_mut().alloc(
                AstKind::GenericParam {
                    name,
                    constraints,
                    default,
                    infer_index: None,
                },
                loc,
            ));
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RBracket)?;
        Ok(params)
    }

    fn parse_func_params(&mut self) -> ParseResult<NodeList> {
        let mut params = Vec::new();
        while !self.check(TokenKind::RParen) {
            let attrs = self.parse_attributes()?;
            let variadic = self.accept(TokenKind::Ellipsis).is_some();
            let name_token = self.expect(TokenKind::Ident)?;
            let name = name_token.ident().expect("ident token");
            let ty = if self.accept(TokenKind::Colon).is_some() {
                Some(self.parse_type()?)
            } else {
                None
            };
            let default = if self.accept(TokenKind::Assign).is_some() {
                Some(self.parse_expr()?)
            } else {
                None
            };
            let loc = name_token.loc.merge(&self.current().loc);
            let mut flags = NodeFlags::empty();
            if variadic {
                flags |= NodeFlags::VARIADIC;
            }
            for &attr in &attrs {
                if let AstKind::Attr { name, .. } = self.arena().kind(attr) {
                    if self.strings.resolve(*name) == "transient" {
                        flags |= NodeFlags::TRANSIENT;
                    }
                }
            }
            let param = self
                .arena_mut()
                .alloc_flagged(AstKind::FuncParam { name, ty, default }, loc, flags);
            self.arena_mut().get_mut(param).attrs = attrs;
            params.push(param);
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        Ok(params)
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    fn parse_struct_decl(&mut self) -> ParseResult<NodeIndex> {
        let start = self.expect(TokenKind::Struct)?;
        let name_token = self.expect(TokenKind::Ident)?;
        let name = name_token.ident().expect("ident token");
        let generic_params = self.parse_generic_params()?;
        let members = self.parse_member_block()?;
        let loc = start.loc.merge(&self.current().loc);
        Ok(self.arena_mut().alloc(
            AstKind::StructDecl {
                name,
                generic_params,
                members,
            },
            loc,
        ))
    }

    fn parse_class_decl(&mut self) -> ParseResult<NodeIndex> {
        let start = self.expect(TokenKind::Class)?;
        let name_token = self.expect(TokenKind::Ident)?;
        let name = name_token.ident().expect("ident token");
        let generic_params = self.parse_generic_params()?;
        let mut base = None;
        let mut interfaces = Vec::new();
        if self.accept(TokenKind::Colon).is_some() {
            // The first entry is the base class; the checker reclassifies
            // it as an interface when it resolves to one.
            base = Some(self.parse_type()?);
            while self.accept(TokenKind::Comma).is_some() {
                interfaces.push(self.parse_type()?);
            }
        }
        let members = self.parse_member_block()?;
        let loc = start.loc.merge(&self.current().loc);
        Ok(self.arena_mut().alloc(
            AstKind::ClassDecl {
                name,
                generic_params,
                base,
                interfaces,
                members,
            },
            loc,
        ))
    }

    fn parse_interface_decl(&mut self) -> ParseResult<NodeIndex> {
        let start = self.expect(TokenKind::Interface)?;
        let name_token = self.expect(TokenKind::Ident)?;
        let name = name_token.ident().expect("ident token");
        let generic_params = self.parse_generic_params()?;
        let members = self.parse_member_block()?;
        let loc = start.loc.merge(&self.current().loc);
        Ok(self.arena_mut().alloc(
            AstKind::InterfaceDecl {
                name,
                generic_params,
                members,
            },
            loc,
        ))
    }

    fn parse_member_block(&mut self) -> ParseResult<NodeList> {
        self.expect(TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            match self.parse_member() {
                Ok(Some(member)) => {
                    self.arena_mut().add_flags(member, NodeFlags::MEMBER);
                    members.push(member);
                }
                Ok(None) => {}
                Err(ParseError::Fatal) => return Err(ParseError::Fatal),
                Err(ParseError::Recoverable) => self.synchronize_stmt(),
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(members)
    }

    fn parse_member(&mut self) -> ParseResult<Option<NodeIndex>> {
        if self.accept(TokenKind::Semicolon).is_some() {
            return Ok(None);
        }
        let attrs = self.parse_attributes()?;
        let flags = self.parse_modifiers();

        let member = match self.current().kind {
            TokenKind::Func | TokenKind::Async => self.parse_func_decl()?,
            TokenKind::Const | TokenKind::Var => self.parse_var_decl()?,
            TokenKind::Type => self.parse_type_decl()?,
            TokenKind::HashIf => self.parse_comptime_if_decl()?,
            TokenKind::HashFor => self.parse_comptime_for_stmt()?,
            TokenKind::HashConst => self.parse_comptime_const()?,
            TokenKind::Ident => {
                // `name: type (= default)?;`
                let name_token = self.advance();
                let name = name_token.ident().expect("ident token");
                self.expect(TokenKind::Colon)?;
                let ty = self.parse_type()?;
                let default = if self.accept(TokenKind::Assign).is_some() {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                self.accept(TokenKind::Semicolon);
                let loc = name_token.loc.merge(&self.arena().loc(ty));
                self.arena_mut()
                    .alloc(AstKind::FieldDecl { name, ty, default }, loc)
            }
            _ => return self.unexpected("a member declaration"),
        };
        self.arena_mut().add_flags(member, flags);
        self.arena_mut().get_mut(member).attrs = attrs;
        Ok(Some(member))
    }

    // =========================================================================
    // Enums, aliases, vars
    // =========================================================================

    fn parse_enum_decl(&mut self) -> ParseResult<NodeIndex> {
        let start = self.expect(TokenKind::Enum)?;
        let name_token = self.expect(TokenKind::Ident)?;
        let name = name_token.ident().expect("ident token");
        let base = if self.accept(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(TokenKind::LBrace)?;
        let mut options = Vec::new();
        while !self.check(TokenKind::RBrace) {
            let option_token = self.expect(TokenKind::Ident)?;
            let option_name = option_token.ident().expect("ident token");
            let value = if self.accept(TokenKind::Assign).is_some() {
                Some(self.parse_expr()?)
            } else {
                None
            };
            let loc = option_token.loc.merge(&self.current().loc);
            options.push(self.arena_mut().alloc(
                AstKind::EnumOption {
                    name: option_name,
                    value,
                },
                loc,
            ));
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        let loc = start.loc.merge(&self.current().loc);
        Ok(self
            .arena_mut()
            .alloc(AstKind::EnumDecl { name, base, options }, loc))
    }

    fn parse_type_decl(&mut self) -> ParseResult<NodeIndex> {
        let start = self.expect(TokenKind::Type)?;
        let name_token = self.expect(TokenKind::Ident)?;
        let name = name_token.ident().expect("ident token");
        let generic_params = self.parse_generic_params()?;
        let aliased = if self.accept(TokenKind::Assign).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.accept(TokenKind::Semicolon);
        let loc = start.loc.merge(&self.current().loc);
        Ok(self.arena_mut().alloc(
            AstKind::TypeDecl {
                name,
                generic_params,
                aliased,
            },
            loc,
        ))
    }

    /// `var a, b = expr;` / `const x: T = expr;`
    pub(crate) fn parse_var_decl(&mut self) -> ParseResult<NodeIndex> {
        let start = self.advance();
        debug_assert!(matches!(start.kind, TokenKind::Var | TokenKind::Const));
        let mut names = Vec::new();
        loop {
            let name_token = self.expect(TokenKind::Ident)?;
            let name = name_token.ident().expect("ident token");
            names.push(self.arena_mut().alloc(AstKind::Identifier { name }, name_token.loc));
            if self.accept(TokenKind::Comma).is_none() {
                break;
            }
        }
        let ty = if self.accept(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let init = if self.accept(TokenKind::Assign).is_some() {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.accept(TokenKind::Semicolon);
        let loc = start.loc.merge(&self.current().loc);
        let mut flags = NodeFlags::empty();
        if start.kind == TokenKind::Const {
            flags |= NodeFlags::CONST;
        }
        Ok(self
            .arena_mut()
            .alloc_flagged(AstKind::VarDecl { names, ty, init }, loc, flags))
    }

    // =========================================================================
    // Exceptions, macros, tests
    // =========================================================================

    /// `exception Name(field: T, ...) { what-body }` or `=> expr`.
    fn parse_exception_decl(&mut self) -> ParseResult<NodeIndex> {
        let start = self.expect(TokenKind::Exception)?;
        let name_token = self.expect(TokenKind::Ident)?;
        let name = name_token.ident().expect("ident token");
        self.expect(TokenKind::LParen)?;
        let params = self.parse_func_params()?;
        self.expect(TokenKind::RParen)?;
        let body = if self.accept(TokenKind::FatArrow).is_some() {
            let expr = self.parse_expr()?;
            self.accept(TokenKind::Semicolon);
            let loc = self.arena().loc(expr);
            let ret = self
                .arena_mut()
                .alloc(AstKind::ReturnStmt { value: Some(expr) }, loc);
            self.arena_mut().mk_block(vec![ret], loc)
        } else {
            self.parse_block()?
        };
        let loc = start.loc.merge(&self.current().loc);
        Ok(self
            .arena_mut()
            .alloc(AstKind::ExceptionDecl { name, params, body }, loc))
    }

    fn parse_macro_decl(&mut self) -> ParseResult<NodeIndex> {
        let start = self.expect(TokenKind::Macro)?;
        let name_token = self.expect(TokenKind::Ident)?;
        let name = name_token.ident().expect("ident token");
        self.expect(TokenKind::LParen)?;
        let params = self.parse_func_params()?;
        self.expect(TokenKind::RParen)?;
        let body = if self.accept(TokenKind::FatArrow).is_some() {
            let expr = self.parse_expr()?;
            self.accept(TokenKind::Semicolon);
            expr
        } else {
            self.parse_block()?
        };
        let loc = start.loc.merge(&self.current().loc);
        let decl = self
            .arena_mut()
            .alloc_flagged(AstKind::MacroDecl { name, params, body }, loc, NodeFlags::COMPTIME);
        Ok(decl)
    }

    /// `test "name" { ... }` - only kept when the driver runs in test mode;
    /// the shaker drops or rewrites it.
    fn parse_test_decl(&mut self) -> ParseResult<NodeIndex> {
        let start = self.expect(TokenKind::Test)?;
        let name_token = self.expect(TokenKind::StrLit)?;
        let name = match name_token.value {
            TokenValue::Str(atom) => atom,
            _ => return self.unexpected("a test name string"),
        };
        let body = self.parse_block()?;
        let loc = start.loc.merge(&self.current().loc);
        Ok(self.arena_mut().alloc_flagged(
            AstKind::TestDecl { name, body },
            loc,
            NodeFlags::TEST_CONTEXT,
        ))
    }

    // =========================================================================
    // Imports
    // =========================================================================

    /// `import "path"`, `import plugin "path" as name`,
    /// `import { a, b } from "path"`.
    fn parse_import(&mut self) -> ParseResult<NodeIndex> {
        let start = self.expect(TokenKind::Import)?;
        let is_plugin = self.accept(TokenKind::Plugin).is_some();
        let mut entities = Vec::new();
        if self.accept(TokenKind::LBrace).is_some() {
            while !self.check(TokenKind::RBrace) {
                let name_token = self.expect(TokenKind::Ident)?;
                let name = name_token.ident().expect("ident token");
                let alias = if self.accept(TokenKind::As).is_some() {
                    let alias_token = self.expect(TokenKind::Ident)?;
                    alias_token.ident()
                } else {
                    None
                };
                entities.push(self.arena_mut().alloc(
                    AstKind::ImportEntity { name, alias },
                    name_token.loc,
                ));
                if self.accept(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RBrace)?;
            if !self.accept_soft_keyword("from") {
                return self.unexpected("'from'");
            }
        }
        let path_token = self.expect(TokenKind::StrLit)?;
        let raw = match path_token.value {
            TokenValue::Str(atom) => atom,
            _ => return self.unexpected("an import path"),
        };
        let path = self
            .arena_mut()
            .alloc(AstKind::StringLit { raw }, path_token.loc);
        let alias = if self.accept(TokenKind::As).is_some() {
            let alias_token = self.expect(TokenKind::Ident)?;
            alias_token.ident()
        } else {
            None
        };
        self.accept(TokenKind::Semicolon);
        let loc = start.loc.merge(&self.current().loc);
        Ok(self.arena_mut().alloc(
            AstKind::ImportDecl {
                path,
                entities,
                alias,
                is_plugin,
            },
            loc,
        ))
    }

    fn accept_soft_keyword(&mut self, word: &str) -> bool {
        let current = self.current();
        if current.kind == TokenKind::Ident && self.ident_text(&current) == Some(word) {
            self.advance();
            return true;
        }
        false
    }

    // =========================================================================
    // Comptime declaration forms
    // =========================================================================

    /// `#if (cond) { ... } else { ... }` in declaration or statement position.
    pub(crate) fn parse_comptime_if_decl(&mut self) -> ParseResult<NodeIndex> {
        let start = self.expect(TokenKind::HashIf)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let then = self.parse_comptime_branch()?;
        let otherwise = if self.accept(TokenKind::Else).is_some() {
            if self.check(TokenKind::HashIf) {
                Some(self.parse_comptime_if_decl()?)
            } else {
                Some(self.parse_comptime_branch()?)
            }
        } else {
            None
        };
        let loc = start.loc.merge(&self.current().loc);
        Ok(self.arena_mut().alloc_flagged(
            AstKind::IfStmt {
                cond,
                then,
                otherwise,
            },
            loc,
            NodeFlags::COMPTIME,
        ))
    }

    /// Branch of a comptime `#if`: a block whose statements may be
    /// declarations, spliced into the parent on evaluation.
    fn parse_comptime_branch(&mut self) -> ParseResult<NodeIndex> {
        let start = self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            if self.current().kind.starts_declaration() && !self.check(TokenKind::Var) {
                match self.parse_declaration() {
                    Ok(decl) => stmts.push(decl),
                    Err(ParseError::Fatal) => return Err(ParseError::Fatal),
                    Err(ParseError::Recoverable) => self.synchronize_stmt(),
                }
            } else {
                match self.parse_stmt() {
                    Ok(stmt) => stmts.push(stmt),
                    Err(ParseError::Fatal) => return Err(ParseError::Fatal),
                    Err(ParseError::Recoverable) => self.synchronize_stmt(),
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        let loc = start.loc.merge(&self.current().loc);
        Ok(self.arena_mut().mk_block(stmts, loc))
    }

    /// `#const name = expr;`
    pub(crate) fn parse_comptime_const(&mut self) -> ParseResult<NodeIndex> {
        let start = self.expect(TokenKind::HashConst)?;
        let name_token = self.expect(TokenKind::Ident)?;
        let name = name_token.ident().expect("ident token");
        self.expect(TokenKind::Assign)?;
        let init = self.parse_expr()?;
        self.accept(TokenKind::Semicolon);
        let loc = start.loc.merge(&self.current().loc);
        let ident = self.arena_mut().alloc(AstKind::Identifier { name }, name_token.loc);
        Ok(self.arena_mut().alloc_flagged(
            AstKind::VarDecl {
                names: vec![ident],
                ty: None,
                init: Some(init),
            },
            loc,
            NodeFlags::COMPTIME | NodeFlags::CONST,
        ))
    }
}

/// Public lookup for operator overload names, shared with the checker.
pub fn operator_for_overload_name(name: &str) -> Option<Operator> {
    OVERLOAD_NAMES.get(name).copied()
}

/// All canonical overload names, interned eagerly by the driver at startup.
pub fn all_overload_names() -> impl Iterator<Item = &'static str> {
    OVERLOAD_NAMES.keys().copied()
}

/// Helper used by later passes to fetch a declaration's name atom.
pub fn decl_name_of(arena: &crate::ast::NodeArena, idx: NodeIndex) -> Option<Atom> {
    arena.kind(idx).decl_name()
}
