//! Tests for tokenization: literals, interpolation mode, include pushdown,
//! and error recovery.

use cxy_common::{Interner, Log};
use cxy_lexer::{FrontendCtx, IntSuffix, Lexer, Token, TokenKind, TokenValue};

fn lex_all(source: &str) -> (Vec<Token>, Interner, Log) {
    let mut strings = Interner::new();
    let mut log = Log::new();
    let file = strings.intern("test.cxy");
    let mut lexer = Lexer::new(file, source.to_string());
    let mut tokens = Vec::new();
    loop {
        let token = {
            let mut ctx = FrontendCtx {
                strings: &mut strings,
                log: &mut log,
            };
            lexer.next_token(&mut ctx)
        };
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            break;
        }
    }
    (tokens, strings, log)
}

fn kinds(source: &str) -> Vec<TokenKind> {
    let (tokens, _, log) = lex_all(source);
    assert_eq!(log.error_count(), 0, "unexpected lex errors");
    tokens.iter().map(|t| t.kind).collect()
}

#[test]
fn keywords_identifiers_and_operators() {
    assert_eq!(
        kinds("func f() => x + 1;"),
        vec![
            TokenKind::Func,
            TokenKind::Ident,
            TokenKind::LParen,
            TokenKind::RParen,
            TokenKind::FatArrow,
            TokenKind::Ident,
            TokenKind::Plus,
            TokenKind::IntLit,
            TokenKind::Semicolon,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn maximal_munch_on_compound_operators() {
    assert_eq!(
        kinds("a <<= b >> c ?. d !: e ... ..)"),
        vec![
            TokenKind::Ident,
            TokenKind::ShlEq,
            TokenKind::Ident,
            TokenKind::Shr,
            TokenKind::Ident,
            TokenKind::QuestionDot,
            TokenKind::Ident,
            TokenKind::BangColon,
            TokenKind::Ident,
            TokenKind::Ellipsis,
            TokenKind::DotDot,
            TokenKind::RParen,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn range_dots_are_not_eaten_by_number() {
    assert_eq!(
        kinds("0..3"),
        vec![
            TokenKind::IntLit,
            TokenKind::DotDot,
            TokenKind::IntLit,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn integer_literals_with_bases_and_suffixes() {
    let (tokens, _, log) = lex_all("255 0xff_u8 0b1010 0o17 1_000_000 42_i128");
    assert_eq!(log.error_count(), 0);
    let ints: Vec<(u128, Option<IntSuffix>)> = tokens
        .iter()
        .filter_map(|t| match t.value {
            TokenValue::Int { value, suffix } => Some((value, suffix)),
            _ => None,
        })
        .collect();
    assert_eq!(
        ints,
        vec![
            (255, None),
            (255, Some(IntSuffix::U8)),
            (10, None),
            (15, None),
            (1_000_000, None),
            (42, Some(IntSuffix::I128)),
        ]
    );
}

#[test]
fn i128_range_literals_survive() {
    let (tokens, _, log) = lex_all("170141183460469231731687303715884105727_i128");
    assert_eq!(log.error_count(), 0);
    match tokens[0].value {
        TokenValue::Int { value, suffix } => {
            assert_eq!(value, i128::MAX as u128);
            assert_eq!(suffix, Some(IntSuffix::I128));
        }
        _ => panic!("expected integer literal"),
    }
}

#[test]
fn float_literals() {
    let (tokens, _, log) = lex_all("1.5 2e10 3.25f32");
    assert_eq!(log.error_count(), 0);
    let floats: Vec<f64> = tokens
        .iter()
        .filter_map(|t| match t.value {
            TokenValue::Float { value, .. } => Some(value),
            _ => None,
        })
        .collect();
    assert_eq!(floats, vec![1.5, 2e10, 3.25]);
}

#[test]
fn string_literal_keeps_raw_escapes() {
    let (tokens, strings, log) = lex_all(r#""a\nb""#);
    assert_eq!(log.error_count(), 0);
    match tokens[0].value {
        TokenValue::Str(atom) => assert_eq!(strings.resolve(atom), "a\\nb"),
        _ => panic!("expected string literal"),
    }
}

#[test]
fn invalid_escape_is_an_error_token() {
    let (tokens, _, log) = lex_all(r#""bad\q" ok"#);
    assert_eq!(tokens[0].kind, TokenKind::Error);
    assert_eq!(log.error_count(), 1);
    // Recovery continues on the same input.
    assert!(tokens.iter().any(|t| t.kind == TokenKind::Ident));
}

#[test]
fn unterminated_string_recovers_at_line_end() {
    let (tokens, _, log) = lex_all("\"open\nvar x");
    assert_eq!(tokens[0].kind, TokenKind::Error);
    assert!(log.error_count() >= 1);
    assert!(tokens.iter().any(|t| t.kind == TokenKind::Var));
}

#[test]
fn nested_block_comments_are_trivia() {
    assert_eq!(
        kinds("a /* x /* y */ z */ b"),
        vec![TokenKind::Ident, TokenKind::Ident, TokenKind::Eof]
    );
}

#[test]
fn interpolated_string_token_sequence() {
    // `A${x}B${y}` => LStr part LStrFmt expr LStrFmt part LStrFmt expr LStrFmt RStr
    assert_eq!(
        kinds("`A${x}B${y}`"),
        vec![
            TokenKind::LStr,
            TokenKind::StrLit,
            TokenKind::LStrFmt,
            TokenKind::Ident,
            TokenKind::LStrFmt,
            TokenKind::StrLit,
            TokenKind::LStrFmt,
            TokenKind::Ident,
            TokenKind::LStrFmt,
            TokenKind::RStr,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn interpolation_expr_may_contain_braces() {
    assert_eq!(
        kinds("`v=${ if (a) { b } else { c } }`"),
        vec![
            TokenKind::LStr,
            TokenKind::StrLit,
            TokenKind::LStrFmt,
            TokenKind::If,
            TokenKind::LParen,
            TokenKind::Ident,
            TokenKind::RParen,
            TokenKind::LBrace,
            TokenKind::Ident,
            TokenKind::RBrace,
            TokenKind::Else,
            TokenKind::LBrace,
            TokenKind::Ident,
            TokenKind::RBrace,
            TokenKind::LStrFmt,
            TokenKind::RStr,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn empty_interpolated_string() {
    assert_eq!(
        kinds("``"),
        vec![TokenKind::LStr, TokenKind::RStr, TokenKind::Eof]
    );
}

#[test]
fn comptime_directives() {
    assert_eq!(
        kinds("#if #for #while #const #{x}"),
        vec![
            TokenKind::HashIf,
            TokenKind::HashFor,
            TokenKind::HashWhile,
            TokenKind::HashConst,
            TokenKind::HashLBrace,
            TokenKind::Ident,
            TokenKind::RBrace,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn utf8_identifiers_and_positions() {
    let (tokens, strings, log) = lex_all("var café = \"日本\"");
    assert_eq!(log.error_count(), 0);
    match tokens[1].value {
        TokenValue::Ident(atom) => assert_eq!(strings.resolve(atom), "café"),
        _ => panic!("expected identifier"),
    }
    // Byte offsets advance by UTF-8 length while columns advance by char.
    for token in &tokens {
        assert!(token.loc.begin.offset <= token.loc.end.offset);
    }
}

#[test]
fn include_pushdown_resumes_parent_buffer() {
    let mut strings = Interner::new();
    let mut log = Log::new();
    let file = strings.intern("main.cxy");
    let mut lexer = Lexer::new(file, "var a\ninclude \"lib\"\nvar b".to_string()).with_loader(
        Box::new(|path: &str| {
            assert_eq!(path, "lib");
            Some(("lib.cxy".to_string(), "const k = 1".to_string()))
        }),
    );
    let mut seen = Vec::new();
    loop {
        let token = {
            let mut ctx = FrontendCtx {
                strings: &mut strings,
                log: &mut log,
            };
            lexer.next_token(&mut ctx)
        };
        if token.kind == TokenKind::Eof {
            break;
        }
        seen.push(token.kind);
    }
    assert_eq!(log.error_count(), 0);
    assert_eq!(
        seen,
        vec![
            TokenKind::Var,
            TokenKind::Ident,
            // tokens from the included buffer
            TokenKind::Const,
            TokenKind::Ident,
            TokenKind::Assign,
            TokenKind::IntLit,
            // parent buffer resumes
            TokenKind::Var,
            TokenKind::Ident,
        ]
    );
}

#[test]
fn missing_include_is_a_fatal_error_token() {
    let mut strings = Interner::new();
    let mut log = Log::new();
    let file = strings.intern("main.cxy");
    let mut lexer = Lexer::new(file, "include \"nope\"".to_string());
    let token = {
        let mut ctx = FrontendCtx {
            strings: &mut strings,
            log: &mut log,
        };
        lexer.next_token(&mut ctx)
    };
    assert_eq!(token.kind, TokenKind::Error);
    assert_eq!(log.error_count(), 1);
}
