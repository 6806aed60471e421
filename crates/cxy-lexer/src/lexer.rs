//! The lexer.
//!
//! Pull-based: the parser owns the lookahead window and calls `next_token`.
//! A small pushdown stack of file buffers makes `include "path"` transparent
//! to the parser, and a mode stack lexes interpolated strings as the token
//! sequence `LStr, part, LStrFmt, expr-tokens, LStrFmt, part, RStr`.
//!
//! Escape sequences are validated but not decoded; literals keep their raw
//! bytes. Numeric literals are scanned up to 128 bits.

use crate::token::{FloatSuffix, IntSuffix, Token, TokenKind, TokenValue};
use cxy_common::numeric::strtou128;
use cxy_common::{limits, Atom, FileLoc, FilePos, Interner, Log};
use tracing::trace;

/// Mutable compilation-wide state the frontend threads through every call.
pub struct FrontendCtx<'a> {
    pub strings: &'a mut Interner,
    pub log: &'a mut Log,
}

/// Resolves an `include` path to `(file name, contents)`.
pub type SourceLoader = Box<dyn FnMut(&str) -> Option<(String, String)>>;

struct Buffer {
    file: Atom,
    source: String,
    pos: FilePos,
}

impl Buffer {
    fn peek(&self) -> Option<char> {
        self.source[self.pos.offset as usize..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.source[self.pos.offset as usize..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos.offset += ch.len_utf8() as u32;
        if ch == '\n' {
            self.pos.row += 1;
            self.pos.col = 1;
        } else {
            self.pos.col += 1;
        }
        Some(ch)
    }

    fn at_end(&self) -> bool {
        self.pos.offset as usize >= self.source.len()
    }
}

/// Interpolated-string lexing state. `Part` means the cursor sits inside
/// literal text; `Expr` means it sits inside a `${...}` expression whose
/// nested brace depth is tracked so the closing `}` can be recognized.
enum StrMode {
    Part,
    Expr { depth: u32 },
}

pub struct Lexer {
    buffers: Vec<Buffer>,
    interp: Vec<StrMode>,
    loader: Option<SourceLoader>,
    poisoned: bool,
}

impl Lexer {
    pub fn new(file: Atom, source: String) -> Self {
        Lexer {
            buffers: vec![Buffer {
                file,
                source,
                pos: FilePos::start(),
            }],
            interp: Vec::new(),
            loader: None,
            poisoned: false,
        }
    }

    /// True after an unrecoverable lexical failure (a missing include);
    /// the unit cannot be tokenized past this point.
    pub fn poisoned(&self) -> bool {
        self.poisoned
    }

    /// Install the resolver used for `include` directives.
    pub fn with_loader(mut self, loader: SourceLoader) -> Self {
        self.loader = Some(loader);
        self
    }

    fn buf(&mut self) -> &mut Buffer {
        self.buffers.last_mut().expect("lexer buffer stack is never empty")
    }

    fn here(&mut self) -> FilePos {
        self.buf().pos
    }

    fn loc_from(&mut self, begin: FilePos) -> FileLoc {
        let buf = self.buf();
        FileLoc::new(buf.file, begin, buf.pos)
    }

    /// Produce the next token, crossing include boundaries transparently.
    pub fn next_token(&mut self, ctx: &mut FrontendCtx<'_>) -> Token {
        if matches!(self.interp.last(), Some(StrMode::Part)) {
            return self.lex_string_part(ctx);
        }
        loop {
            self.skip_trivia(ctx);
            if self.buf().at_end() {
                if self.buffers.len() > 1 {
                    self.buffers.pop();
                    continue;
                }
                let pos = self.here();
                return Token::new(TokenKind::Eof, self.loc_from(pos));
            }
            let token = self.lex_token(ctx);
            if token.kind == TokenKind::Include && self.interp.is_empty() {
                match self.enter_include(ctx, token.loc) {
                    Ok(()) => continue,
                    Err(error_token) => return error_token,
                }
            }
            return token;
        }
    }

    // =========================================================================
    // Include pushdown
    // =========================================================================

    fn enter_include(&mut self, ctx: &mut FrontendCtx<'_>, loc: FileLoc) -> Result<(), Token> {
        self.skip_trivia(ctx);
        let path_token = self.lex_token(ctx);
        let path_atom = match path_token.value {
            TokenValue::Str(atom) if path_token.kind == TokenKind::StrLit => atom,
            _ => {
                ctx.log
                    .error(path_token.loc, "expected a string literal after 'include'");
                self.poisoned = true;
                return Err(Token::new(TokenKind::Error, path_token.loc));
            }
        };
        if self.buffers.len() >= limits::MAX_INCLUDE_DEPTH {
            ctx.log.error(loc, "include nesting too deep");
            self.poisoned = true;
            return Err(Token::new(TokenKind::Error, loc));
        }
        let path = ctx.strings.resolve(path_atom).to_string();
        let loaded = self.loader.as_mut().and_then(|loader| loader(&path));
        match loaded {
            Some((name, contents)) => {
                trace!(file = %name, "entering include");
                let file = ctx.strings.intern(&name);
                self.buffers.push(Buffer {
                    file,
                    source: contents,
                    pos: FilePos::start(),
                });
                Ok(())
            }
            None => {
                ctx.log
                    .error(loc, format!("cannot open include file \"{path}\""));
                self.poisoned = true;
                Err(Token::new(TokenKind::Error, loc))
            }
        }
    }

    // =========================================================================
    // Trivia
    // =========================================================================

    fn skip_trivia(&mut self, ctx: &mut FrontendCtx<'_>) {
        loop {
            let Some(ch) = self.buf().peek() else { return };
            if ch.is_whitespace() {
                self.buf().bump();
                continue;
            }
            if ch == '/' {
                match self.buf().peek_second() {
                    Some('/') => {
                        while let Some(c) = self.buf().bump() {
                            if c == '\n' {
                                break;
                            }
                        }
                        continue;
                    }
                    Some('*') => {
                        let begin = self.here();
                        self.buf().bump();
                        self.buf().bump();
                        let mut depth = 1u32;
                        loop {
                            match (self.buf().peek(), self.buf().peek_second()) {
                                (Some('/'), Some('*')) => {
                                    self.buf().bump();
                                    self.buf().bump();
                                    depth += 1;
                                }
                                (Some('*'), Some('/')) => {
                                    self.buf().bump();
                                    self.buf().bump();
                                    depth -= 1;
                                    if depth == 0 {
                                        break;
                                    }
                                }
                                (Some(_), _) => {
                                    self.buf().bump();
                                }
                                (None, _) => {
                                    let loc = self.loc_from(begin);
                                    ctx.log.error(loc, "unterminated block comment");
                                    return;
                                }
                            }
                        }
                        continue;
                    }
                    _ => return,
                }
            }
            return;
        }
    }

    // =========================================================================
    // Main dispatch
    // =========================================================================

    fn lex_token(&mut self, ctx: &mut FrontendCtx<'_>) -> Token {
        let begin = self.here();
        let ch = match self.buf().peek() {
            Some(c) => c,
            None => return Token::new(TokenKind::Eof, self.loc_from(begin)),
        };

        if ch.is_ascii_digit() {
            return self.lex_number(ctx, begin);
        }
        if ch == '_' || ch.is_alphabetic() {
            return self.lex_ident(ctx, begin);
        }

        self.buf().bump();
        match ch {
            '"' => self.lex_quoted_string(ctx, begin),
            '\'' => self.lex_char(ctx, begin),
            '`' => {
                self.interp.push(StrMode::Part);
                Token::new(TokenKind::LStr, self.loc_from(begin))
            }
            '(' => Token::new(TokenKind::LParen, self.loc_from(begin)),
            ')' => Token::new(TokenKind::RParen, self.loc_from(begin)),
            '[' => Token::new(TokenKind::LBracket, self.loc_from(begin)),
            ']' => Token::new(TokenKind::RBracket, self.loc_from(begin)),
            '{' => {
                if let Some(StrMode::Expr { depth }) = self.interp.last_mut() {
                    *depth += 1;
                }
                Token::new(TokenKind::LBrace, self.loc_from(begin))
            }
            '}' => {
                if let Some(StrMode::Expr { depth }) = self.interp.last_mut() {
                    if *depth == 0 {
                        *self.interp.last_mut().expect("interp mode") = StrMode::Part;
                        return Token::new(TokenKind::LStrFmt, self.loc_from(begin));
                    }
                    *depth -= 1;
                }
                Token::new(TokenKind::RBrace, self.loc_from(begin))
            }
            ',' => Token::new(TokenKind::Comma, self.loc_from(begin)),
            ';' => Token::new(TokenKind::Semicolon, self.loc_from(begin)),
            ':' => Token::new(TokenKind::Colon, self.loc_from(begin)),
            '~' => Token::new(TokenKind::Tilde, self.loc_from(begin)),
            '@' => Token::new(TokenKind::At, self.loc_from(begin)),
            '+' => self.with_more(begin, &[('+', TokenKind::PlusPlus), ('=', TokenKind::PlusEq)], TokenKind::Plus),
            '-' => self.with_more(
                begin,
                &[('-', TokenKind::MinusMinus), ('=', TokenKind::MinusEq), ('>', TokenKind::Arrow)],
                TokenKind::Minus,
            ),
            '*' => self.with_more(begin, &[('=', TokenKind::StarEq)], TokenKind::Star),
            '/' => self.with_more(begin, &[('=', TokenKind::SlashEq)], TokenKind::Slash),
            '%' => self.with_more(begin, &[('=', TokenKind::PercentEq)], TokenKind::Percent),
            '^' => self.with_more(begin, &[('=', TokenKind::CaretEq)], TokenKind::Caret),
            '=' => self.with_more(
                begin,
                &[('=', TokenKind::EqEq), ('>', TokenKind::FatArrow)],
                TokenKind::Assign,
            ),
            '!' => self.with_more(
                begin,
                &[('=', TokenKind::NotEq), (':', TokenKind::BangColon)],
                TokenKind::Bang,
            ),
            '?' => self.with_more(begin, &[('.', TokenKind::QuestionDot)], TokenKind::Question),
            '&' => self.with_more(
                begin,
                &[('&', TokenKind::AmpAmp), ('=', TokenKind::AmpEq)],
                TokenKind::Amp,
            ),
            '|' => self.with_more(
                begin,
                &[('|', TokenKind::PipePipe), ('=', TokenKind::PipeEq)],
                TokenKind::Pipe,
            ),
            '<' => {
                if self.buf().peek() == Some('<') {
                    self.buf().bump();
                    self.with_more(begin, &[('=', TokenKind::ShlEq)], TokenKind::Shl)
                } else {
                    self.with_more(begin, &[('=', TokenKind::LtEq)], TokenKind::Lt)
                }
            }
            '>' => {
                if self.buf().peek() == Some('>') {
                    self.buf().bump();
                    self.with_more(begin, &[('=', TokenKind::ShrEq)], TokenKind::Shr)
                } else {
                    self.with_more(begin, &[('=', TokenKind::GtEq)], TokenKind::Gt)
                }
            }
            '.' => {
                if self.buf().peek() == Some('.') {
                    self.buf().bump();
                    if self.buf().peek() == Some('.') {
                        self.buf().bump();
                        Token::new(TokenKind::Ellipsis, self.loc_from(begin))
                    } else {
                        Token::new(TokenKind::DotDot, self.loc_from(begin))
                    }
                } else {
                    Token::new(TokenKind::Dot, self.loc_from(begin))
                }
            }
            '$' => {
                // Only meaningful as `${` inside an interpolated string part,
                // which lex_string_part handles. Elsewhere it is an error.
                let loc = self.loc_from(begin);
                ctx.log.error(loc, "unexpected character '$'");
                Token::new(TokenKind::Error, loc)
            }
            '#' => self.lex_hash(ctx, begin),
            other => {
                let loc = self.loc_from(begin);
                ctx.log.error(loc, format!("unexpected character '{other}'"));
                Token::new(TokenKind::Error, loc)
            }
        }
    }

    /// Try to extend a single-char operator with one more char.
    fn with_more(&mut self, begin: FilePos, options: &[(char, TokenKind)], fallback: TokenKind) -> Token {
        if let Some(next) = self.buf().peek() {
            for &(ch, kind) in options {
                if next == ch {
                    self.buf().bump();
                    return Token::new(kind, self.loc_from(begin));
                }
            }
        }
        Token::new(fallback, self.loc_from(begin))
    }

    fn lex_hash(&mut self, ctx: &mut FrontendCtx<'_>, begin: FilePos) -> Token {
        if self.buf().peek() == Some('{') {
            self.buf().bump();
            return Token::new(TokenKind::HashLBrace, self.loc_from(begin));
        }
        let mut word = String::new();
        while let Some(c) = self.buf().peek() {
            if c == '_' || c.is_alphanumeric() {
                word.push(c);
                self.buf().bump();
            } else {
                break;
            }
        }
        let kind = match word.as_str() {
            "if" => TokenKind::HashIf,
            "for" => TokenKind::HashFor,
            "while" => TokenKind::HashWhile,
            "const" => TokenKind::HashConst,
            _ => {
                let loc = self.loc_from(begin);
                ctx.log
                    .error(loc, format!("unknown compile-time directive '#{word}'"));
                return Token::new(TokenKind::Error, loc);
            }
        };
        Token::new(kind, self.loc_from(begin))
    }

    // =========================================================================
    // Identifiers and keywords
    // =========================================================================

    fn lex_ident(&mut self, ctx: &mut FrontendCtx<'_>, begin: FilePos) -> Token {
        let start = self.buf().pos.offset as usize;
        while let Some(c) = self.buf().peek() {
            if c == '_' || c.is_alphanumeric() {
                self.buf().bump();
            } else {
                break;
            }
        }
        let end = self.buf().pos.offset as usize;
        let text = self.buf().source[start..end].to_string();
        debug_assert!(!text.is_empty());
        let loc = self.loc_from(begin);
        if let Some(kind) = TokenKind::keyword(&text) {
            return Token::new(kind, loc);
        }
        let atom = ctx.strings.intern(&text);
        Token::with_value(TokenKind::Ident, loc, TokenValue::Ident(atom))
    }

    // =========================================================================
    // Numbers
    // =========================================================================

    fn lex_number(&mut self, ctx: &mut FrontendCtx<'_>, begin: FilePos) -> Token {
        let mut base = 10u32;
        if self.buf().peek() == Some('0') {
            match self.buf().peek_second() {
                Some('x' | 'X') => base = 16,
                Some('b' | 'B') => base = 2,
                Some('o' | 'O') => base = 8,
                _ => {}
            }
            if base != 10 {
                self.buf().bump();
                self.buf().bump();
            }
        }
        let digits_start = self.buf().pos.offset as usize;
        self.eat_digits(base);
        let mut is_float = false;

        if base == 10 {
            // A '.' only belongs to the literal when a digit follows, so
            // range expressions like `0..3` keep their dots.
            if self.buf().peek() == Some('.')
                && self.buf().peek_second().is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                self.buf().bump();
                self.eat_digits(10);
            }
            if matches!(self.buf().peek(), Some('e' | 'E')) {
                let after = self.buf().peek_second();
                let exp_digit = match after {
                    Some('+' | '-') => true,
                    Some(c) => c.is_ascii_digit(),
                    None => false,
                };
                if exp_digit {
                    is_float = true;
                    self.buf().bump();
                    if matches!(self.buf().peek(), Some('+' | '-')) {
                        self.buf().bump();
                    }
                    self.eat_digits(10);
                }
            }
        }

        let digits_end = self.buf().pos.offset as usize;
        let suffix_start = digits_end;
        // Optional suffix, with or without a separating underscore.
        while let Some(c) = self.buf().peek() {
            if c == '_' || c.is_alphanumeric() {
                self.buf().bump();
            } else {
                break;
            }
        }
        let suffix_end = self.buf().pos.offset as usize;
        let source = &self.buf().source;
        let digits = source[digits_start..digits_end].to_string();
        let suffix_text = source[suffix_start..suffix_end]
            .trim_start_matches('_')
            .to_string();
        let loc = self.loc_from(begin);

        if is_float {
            let suffix = match suffix_text.as_str() {
                "" => None,
                "f32" => Some(FloatSuffix::F32),
                "f64" => Some(FloatSuffix::F64),
                other => {
                    ctx.log
                        .error(loc, format!("invalid float literal suffix '{other}'"));
                    return self.error_recover_line(loc);
                }
            };
            let cleaned: String = digits.chars().filter(|&c| c != '_').collect();
            match cleaned.parse::<f64>() {
                Ok(value) => {
                    return Token::with_value(
                        TokenKind::FloatLit,
                        loc,
                        TokenValue::Float { value, suffix },
                    );
                }
                Err(_) => {
                    ctx.log.error(loc, "malformed float literal");
                    return self.error_recover_line(loc);
                }
            }
        }

        let suffix = if suffix_text.is_empty() {
            None
        } else {
            match IntSuffix::from_str(&suffix_text) {
                Some(s) => Some(s),
                None => {
                    ctx.log
                        .error(loc, format!("invalid integer literal suffix '{suffix_text}'"));
                    return self.error_recover_line(loc);
                }
            }
        };
        match strtou128(&digits, base) {
            Some(value) => Token::with_value(TokenKind::IntLit, loc, TokenValue::Int { value, suffix }),
            None => {
                ctx.log.error(loc, "malformed integer literal");
                self.error_recover_line(loc)
            }
        }
    }

    fn eat_digits(&mut self, base: u32) {
        while let Some(c) = self.buf().peek() {
            let ok = match base {
                2 => matches!(c, '0' | '1' | '_'),
                8 => matches!(c, '0'..='7' | '_'),
                16 => c.is_ascii_hexdigit() || c == '_',
                _ => c.is_ascii_digit() || c == '_',
            };
            if ok {
                self.buf().bump();
            } else {
                break;
            }
        }
    }

    // =========================================================================
    // Strings and chars
    // =========================================================================

    fn lex_quoted_string(&mut self, ctx: &mut FrontendCtx<'_>, begin: FilePos) -> Token {
        let start = self.buf().pos.offset as usize;
        loop {
            match self.buf().peek() {
                Some('"') => {
                    let end = self.buf().pos.offset as usize;
                    let raw = self.buf().source[start..end].to_string();
                    self.buf().bump();
                    let loc = self.loc_from(begin);
                    if let Err(message) = validate_escapes(&raw) {
                        ctx.log.error(loc, message);
                        return Token::new(TokenKind::Error, loc);
                    }
                    let atom = ctx.strings.intern(&raw);
                    return Token::with_value(TokenKind::StrLit, loc, TokenValue::Str(atom));
                }
                Some('\\') => {
                    self.buf().bump();
                    self.buf().bump();
                }
                Some('\n') | None => {
                    let loc = self.loc_from(begin);
                    ctx.log.error(loc, "unterminated string literal");
                    return Token::new(TokenKind::Error, loc);
                }
                Some(_) => {
                    self.buf().bump();
                }
            }
        }
    }

    fn lex_char(&mut self, ctx: &mut FrontendCtx<'_>, begin: FilePos) -> Token {
        let start = self.buf().pos.offset as usize;
        loop {
            match self.buf().peek() {
                Some('\'') => {
                    let end = self.buf().pos.offset as usize;
                    let raw = self.buf().source[start..end].to_string();
                    self.buf().bump();
                    let loc = self.loc_from(begin);
                    if raw.is_empty() {
                        ctx.log.error(loc, "empty character literal");
                        return Token::new(TokenKind::Error, loc);
                    }
                    if let Err(message) = validate_escapes(&raw) {
                        ctx.log.error(loc, message);
                        return Token::new(TokenKind::Error, loc);
                    }
                    let atom = ctx.strings.intern(&raw);
                    return Token::with_value(TokenKind::CharLit, loc, TokenValue::Char(atom));
                }
                Some('\\') => {
                    self.buf().bump();
                    self.buf().bump();
                }
                Some('\n') | None => {
                    let loc = self.loc_from(begin);
                    ctx.log.error(loc, "unterminated character literal");
                    return Token::new(TokenKind::Error, loc);
                }
                Some(_) => {
                    self.buf().bump();
                }
            }
        }
    }

    /// Lex literal text inside an interpolated string, up to the next
    /// delimiter. Emits the delimiter token directly when the part is empty.
    fn lex_string_part(&mut self, ctx: &mut FrontendCtx<'_>) -> Token {
        let begin = self.here();
        let start = self.buf().pos.offset as usize;
        loop {
            match self.buf().peek() {
                Some('`') => {
                    let end = self.buf().pos.offset as usize;
                    if end > start {
                        let raw = self.buf().source[start..end].to_string();
                        let loc = self.loc_from(begin);
                        let atom = ctx.strings.intern(&raw);
                        return Token::with_value(TokenKind::StrLit, loc, TokenValue::Str(atom));
                    }
                    self.buf().bump();
                    self.interp.pop();
                    return Token::new(TokenKind::RStr, self.loc_from(begin));
                }
                Some('$') if self.buf().peek_second() == Some('{') => {
                    let end = self.buf().pos.offset as usize;
                    if end > start {
                        let raw = self.buf().source[start..end].to_string();
                        let loc = self.loc_from(begin);
                        let atom = ctx.strings.intern(&raw);
                        return Token::with_value(TokenKind::StrLit, loc, TokenValue::Str(atom));
                    }
                    self.buf().bump();
                    self.buf().bump();
                    *self.interp.last_mut().expect("interp mode") = StrMode::Expr { depth: 0 };
                    return Token::new(TokenKind::LStrFmt, self.loc_from(begin));
                }
                Some('\\') => {
                    self.buf().bump();
                    self.buf().bump();
                }
                Some(_) => {
                    self.buf().bump();
                }
                None => {
                    let loc = self.loc_from(begin);
                    ctx.log.error(loc, "unterminated interpolated string");
                    self.interp.pop();
                    return Token::new(TokenKind::Error, loc);
                }
            }
        }
    }

    /// Skip to the end of the current line so one bad literal produces one
    /// diagnostic.
    fn error_recover_line(&mut self, loc: FileLoc) -> Token {
        while let Some(c) = self.buf().peek() {
            if c == '\n' || c == '{' || c == '}' {
                break;
            }
            self.buf().bump();
        }
        Token::new(TokenKind::Error, loc)
    }
}

/// Validate (without decoding) the escape sequences in a raw literal body.
fn validate_escapes(raw: &str) -> Result<(), String> {
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            continue;
        }
        match chars.next() {
            Some('n' | 'r' | 't' | 'v' | 'b' | 'a' | 'f' | '0' | '\\' | '\'' | '"' | '`' | '$') => {}
            Some('x') => {
                for _ in 0..2 {
                    match chars.next() {
                        Some(h) if h.is_ascii_hexdigit() => {}
                        _ => return Err("invalid '\\x' escape: expected two hex digits".into()),
                    }
                }
            }
            Some('u') => {
                if chars.next() != Some('{') {
                    return Err("invalid '\\u' escape: expected '{'".into());
                }
                let mut digits = 0;
                for h in chars.by_ref() {
                    if h == '}' {
                        break;
                    }
                    if !h.is_ascii_hexdigit() {
                        return Err("invalid '\\u' escape: bad hex digit".into());
                    }
                    digits += 1;
                }
                if digits == 0 || digits > 6 {
                    return Err("invalid '\\u' escape: expected 1-6 hex digits".into());
                }
            }
            Some(other) => return Err(format!("invalid escape sequence '\\{other}'")),
            None => return Err("dangling '\\' at end of literal".into()),
        }
    }
    Ok(())
}
