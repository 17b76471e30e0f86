// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The lexer implementation using logos.

use std::iter::Peekable;
use std::str::Chars;

use litmus_ast::token::{TemplatePart, Token, TokenKind};
use litmus_ast::Span;
use logos::Logos;

/// Piece of a template literal before escape processing.
#[derive(Debug, Clone, PartialEq)]
enum RawPart {
    Str(String),
    Expr(String, usize),
}

/// Raw token type for logos - literal values are parsed in a second pass.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\f\x0B\u{00A0}\u{FEFF}]+")]
enum RawToken {
    // === Keywords ===
    #[token("var")]
    Var,
    #[token("let")]
    Let,
    #[token("const")]
    Const,
    #[token("function")]
    Function,
    #[token("return")]
    Return,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("while")]
    While,
    #[token("do")]
    Do,
    #[token("break")]
    Break,
    #[token("continue")]
    Continue,
    #[token("throw")]
    Throw,
    #[token("try")]
    Try,
    #[token("catch")]
    Catch,
    #[token("finally")]
    Finally,
    #[token("switch")]
    Switch,
    #[token("case")]
    Case,
    #[token("default")]
    Default,
    #[token("new")]
    New,
    #[token("typeof")]
    Typeof,
    #[token("instanceof")]
    Instanceof,
    #[token("in")]
    In,
    #[token("this")]
    This,
    #[token("void")]
    Void,
    #[token("delete")]
    Delete,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    // === Operators (longest match wins) ===
    #[token(">>>")]
    GtGtGt,
    #[token("===")]
    EqEqEq,
    #[token("!==")]
    BangEqEq,
    #[token("**=")]
    StarStarEq,
    #[token("&&=")]
    AmpAmpEq,
    #[token("||=")]
    PipePipeEq,
    #[token("??=")]
    QuestionQuestionEq,
    #[token("...")]
    DotDotDot,

    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<=")]
    LtEq,
    #[token(">=")]
    GtEq,
    #[token("&&")]
    AmpAmp,
    #[token("||")]
    PipePipe,
    #[token("??")]
    QuestionQuestion,
    #[token("?.")]
    QuestionDot,
    #[token("=>")]
    FatArrow,
    #[token("**")]
    StarStar,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    #[token("<<")]
    LtLt,
    #[token(">>")]
    GtGt,
    #[token("+=")]
    PlusEq,
    #[token("-=")]
    MinusEq,
    #[token("*=")]
    StarEq,
    #[token("/=")]
    SlashEq,
    #[token("%=")]
    PercentEq,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("=")]
    Eq,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("!")]
    Bang,
    #[token("?")]
    Question,
    #[token(".")]
    Dot,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,

    // === Delimiters ===
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(":")]
    Colon,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,

    // === Line terminators (folded into `newline_before`) ===
    #[regex(r"\r\n|\n|\r|\u{2028}|\u{2029}")]
    Newline,

    // === Comments ===
    #[regex(r"//[^\r\n]*", logos::skip)]
    LineComment,

    /// Carries whether the comment spans a line break.
    #[token("/*", block_comment)]
    BlockComment(bool),

    // === Literals ===
    #[regex(r"0[xX][0-9a-fA-F_]+")]
    HexNumber,
    #[regex(r"0[bB][01_]+")]
    BinNumber,
    #[regex(r"0[oO][0-7_]+")]
    OctNumber,
    #[regex(r"[0-9][0-9_]*(\.[0-9][0-9_]*)?([eE][+-]?[0-9]+)?")]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?")]
    DecNumber,

    #[regex(r#""([^"\\\r\n]|\\[^\r\n]|\\\r?\n)*""#)]
    #[regex(r#"'([^'\\\r\n]|\\[^\r\n]|\\\r?\n)*'"#)]
    String,

    #[token("`", template)]
    Template(Vec<RawPart>),

    // === Identifier (keywords take priority) ===
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*")]
    Ident,
}

/// Skip to the end of a block comment. Comments do not nest.
fn block_comment(lexer: &mut logos::Lexer<RawToken>) -> Option<bool> {
    let remainder = lexer.remainder();
    match remainder.find("*/") {
        Some(end) => {
            let body = &remainder[..end];
            lexer.bump(end + 2);
            Some(body.contains(['\n', '\r']))
        }
        None => {
            lexer.bump(remainder.len());
            None
        }
    }
}

/// Scan a template literal after its opening backtick.
fn template(lexer: &mut logos::Lexer<RawToken>) -> Option<Vec<RawPart>> {
    let base = lexer.span().end;
    let remainder = lexer.remainder();
    match scan_template(remainder, base) {
        Some((parts, consumed)) => {
            lexer.bump(consumed);
            Some(parts)
        }
        None => {
            lexer.bump(remainder.len());
            None
        }
    }
}

/// Returns the parts and the number of bytes consumed, closing backtick included.
fn scan_template(rest: &str, base: usize) -> Option<(Vec<RawPart>, usize)> {
    let bytes = rest.as_bytes();
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'`' => {
                parts.push(RawPart::Str(text));
                return Some((parts, i + 1));
            }
            b'\\' => {
                let escaped = rest[i + 1..].chars().next().map_or(0, char::len_utf8);
                text.push_str(&rest[i..i + 1 + escaped]);
                i += 1 + escaped;
            }
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                parts.push(RawPart::Str(std::mem::take(&mut text)));
                let start = i + 2;
                let end = skip_substitution(rest, start)?;
                parts.push(RawPart::Expr(rest[start..end].to_string(), base + start));
                i = end + 1;
            }
            _ => {
                let ch = rest[i..].chars().next()?;
                text.push(ch);
                i += ch.len_utf8();
            }
        }
    }
    None
}

/// Find the `}` closing a `${` substitution, skipping nested braces,
/// strings, templates and comments.
fn skip_substitution(src: &str, start: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' if depth == 0 => return Some(i),
            b'}' => depth -= 1,
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'`' => {
                let (_, consumed) = scan_template(&src[i + 1..], 0)?;
                i += consumed;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = src[i + 2..].find("*/")?;
                i += end + 3;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Maximum number of errors to collect before stopping.
const MAX_ERRORS: usize = 20;

/// The lexer for snippet source code.
pub struct Lexer<'a> {
    source: &'a str,
    /// Added to every span; non-zero when lexing a template substitution.
    base: usize,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::with_offset(source, 0)
    }

    /// Lex a fragment that starts `base` bytes into the enclosing snippet.
    pub fn with_offset(source: &'a str, base: usize) -> Self {
        Self { source, base, errors: Vec::new() }
    }

    /// Tokenize the entire source, collecting multiple errors.
    pub fn tokenize(&mut self) -> LexResult {
        let mut tokens = Vec::new();
        let mut newline_before = false;
        let mut logos_lexer = RawToken::lexer(self.source);

        while let Some(result) = logos_lexer.next() {
            if self.errors.len() >= MAX_ERRORS {
                break;
            }

            let span = logos_lexer.span();
            let slice = logos_lexer.slice();

            let raw = match result {
                Ok(raw) => raw,
                Err(()) => {
                    let err = self.classify_error(span.start, span.end);
                    self.errors.push(err);
                    continue;
                }
            };

            let kind = match raw {
                RawToken::Newline => {
                    newline_before = true;
                    continue;
                }
                RawToken::BlockComment(multiline) => {
                    newline_before |= multiline;
                    continue;
                }
                raw => match self.convert_token(raw, slice, span.start, span.end) {
                    Ok(kind) => kind,
                    Err(e) => {
                        self.errors.push(e);
                        continue;
                    }
                },
            };

            tokens.push(Token {
                kind,
                span: Span::new(self.base + span.start, self.base + span.end),
                newline_before,
            });
            newline_before = false;
        }

        let end = self.base + self.source.len();
        tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::new(end, end),
            newline_before,
        });

        LexResult {
            tokens,
            errors: std::mem::take(&mut self.errors),
        }
    }

    fn classify_error(&self, start: usize, end: usize) -> LexError {
        let rest = &self.source[start..];
        let (start, end) = (self.base + start, self.base + end);
        if rest.starts_with("/*") {
            LexError::unterminated_comment(start, end)
        } else if rest.starts_with('`') {
            LexError::unterminated_template(start, end)
        } else if rest.starts_with(['"', '\'']) {
            LexError::unterminated_string(start, end)
        } else {
            let ch = rest.chars().next().unwrap_or('?');
            LexError::unexpected_char(ch, start)
        }
    }

    /// Convert a raw logos token to our TokenKind, parsing literals.
    fn convert_token(
        &self,
        raw: RawToken,
        slice: &str,
        start: usize,
        end: usize,
    ) -> Result<TokenKind, LexError> {
        let pos = self.base + start;
        Ok(match raw {
            RawToken::Var => TokenKind::Var,
            RawToken::Let => TokenKind::Let,
            RawToken::Const => TokenKind::Const,
            RawToken::Function => TokenKind::Function,
            RawToken::Return => TokenKind::Return,
            RawToken::If => TokenKind::If,
            RawToken::Else => TokenKind::Else,
            RawToken::For => TokenKind::For,
            RawToken::While => TokenKind::While,
            RawToken::Do => TokenKind::Do,
            RawToken::Break => TokenKind::Break,
            RawToken::Continue => TokenKind::Continue,
            RawToken::Throw => TokenKind::Throw,
            RawToken::Try => TokenKind::Try,
            RawToken::Catch => TokenKind::Catch,
            RawToken::Finally => TokenKind::Finally,
            RawToken::Switch => TokenKind::Switch,
            RawToken::Case => TokenKind::Case,
            RawToken::Default => TokenKind::Default,
            RawToken::New => TokenKind::New,
            RawToken::Typeof => TokenKind::Typeof,
            RawToken::Instanceof => TokenKind::Instanceof,
            RawToken::In => TokenKind::In,
            RawToken::This => TokenKind::This,
            RawToken::Void => TokenKind::Void,
            RawToken::Delete => TokenKind::Delete,
            RawToken::True => TokenKind::Bool(true),
            RawToken::False => TokenKind::Bool(false),
            RawToken::Null => TokenKind::Null,

            RawToken::GtGtGt => TokenKind::GtGtGt,
            RawToken::EqEqEq => TokenKind::EqEqEq,
            RawToken::BangEqEq => TokenKind::BangEqEq,
            RawToken::StarStarEq => TokenKind::StarStarEq,
            RawToken::AmpAmpEq => TokenKind::AmpAmpEq,
            RawToken::PipePipeEq => TokenKind::PipePipeEq,
            RawToken::QuestionQuestionEq => TokenKind::QuestionQuestionEq,
            RawToken::DotDotDot => TokenKind::DotDotDot,
            RawToken::EqEq => TokenKind::EqEq,
            RawToken::BangEq => TokenKind::BangEq,
            RawToken::LtEq => TokenKind::LtEq,
            RawToken::GtEq => TokenKind::GtEq,
            RawToken::AmpAmp => TokenKind::AmpAmp,
            RawToken::PipePipe => TokenKind::PipePipe,
            RawToken::QuestionQuestion => TokenKind::QuestionQuestion,
            RawToken::QuestionDot => TokenKind::QuestionDot,
            RawToken::FatArrow => TokenKind::FatArrow,
            RawToken::StarStar => TokenKind::StarStar,
            RawToken::PlusPlus => TokenKind::PlusPlus,
            RawToken::MinusMinus => TokenKind::MinusMinus,
            RawToken::LtLt => TokenKind::LtLt,
            RawToken::GtGt => TokenKind::GtGt,
            RawToken::PlusEq => TokenKind::PlusEq,
            RawToken::MinusEq => TokenKind::MinusEq,
            RawToken::StarEq => TokenKind::StarEq,
            RawToken::SlashEq => TokenKind::SlashEq,
            RawToken::PercentEq => TokenKind::PercentEq,
            RawToken::Plus => TokenKind::Plus,
            RawToken::Minus => TokenKind::Minus,
            RawToken::Star => TokenKind::Star,
            RawToken::Slash => TokenKind::Slash,
            RawToken::Percent => TokenKind::Percent,
            RawToken::Eq => TokenKind::Eq,
            RawToken::Lt => TokenKind::Lt,
            RawToken::Gt => TokenKind::Gt,
            RawToken::Bang => TokenKind::Bang,
            RawToken::Question => TokenKind::Question,
            RawToken::Dot => TokenKind::Dot,
            RawToken::Amp => TokenKind::Amp,
            RawToken::Pipe => TokenKind::Pipe,
            RawToken::Caret => TokenKind::Caret,
            RawToken::Tilde => TokenKind::Tilde,

            RawToken::LBrace => TokenKind::LBrace,
            RawToken::RBrace => TokenKind::RBrace,
            RawToken::LParen => TokenKind::LParen,
            RawToken::RParen => TokenKind::RParen,
            RawToken::LBracket => TokenKind::LBracket,
            RawToken::RBracket => TokenKind::RBracket,
            RawToken::Colon => TokenKind::Colon,
            RawToken::Semi => TokenKind::Semi,
            RawToken::Comma => TokenKind::Comma,

            RawToken::HexNumber => TokenKind::Number(parse_radix(&slice[2..], 16)),
            RawToken::BinNumber => TokenKind::Number(parse_radix(&slice[2..], 2)),
            RawToken::OctNumber => TokenKind::Number(parse_radix(&slice[2..], 8)),
            RawToken::DecNumber => {
                let cleaned: String = slice.chars().filter(|c| *c != '_').collect();
                let value = cleaned
                    .parse::<f64>()
                    .map_err(|_| LexError::invalid_number(pos, self.base + end))?;
                TokenKind::Number(value)
            }
            RawToken::String => {
                let inner = &slice[1..slice.len() - 1];
                TokenKind::String(cook(inner, pos)?)
            }
            RawToken::Template(parts) => {
                let mut cooked = Vec::with_capacity(parts.len());
                for part in parts {
                    cooked.push(match part {
                        RawPart::Str(text) => TemplatePart::Str(cook(&text, pos)?),
                        RawPart::Expr(source, offset) => TemplatePart::Expr {
                            source,
                            offset: self.base + offset,
                        },
                    });
                }
                TokenKind::Template(cooked)
            }
            RawToken::Ident => TokenKind::Ident(slice.to_string()),

            RawToken::Newline | RawToken::LineComment | RawToken::BlockComment(_) => {
                unreachable!("trivia is filtered before conversion")
            }
        })
    }
}

/// Digits of a prefixed integer literal. Accumulates in f64 so oversized
/// literals lose precision instead of failing.
fn parse_radix(digits: &str, radix: u32) -> f64 {
    digits
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, d| acc * radix as f64 + d as f64)
}

/// Process escape sequences in string or template text.
fn cook(s: &str, pos: usize) -> Result<String, LexError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(ch) = parse_escape(&mut chars, pos)? {
                result.push(ch);
            }
        } else {
            result.push(c);
        }
    }
    Ok(result)
}

/// Parse one escape sequence. `None` means a line continuation.
fn parse_escape(chars: &mut Peekable<Chars<'_>>, pos: usize) -> Result<Option<char>, LexError> {
    let ch = match chars.next() {
        Some('n') => '\n',
        Some('r') => '\r',
        Some('t') => '\t',
        Some('b') => '\u{8}',
        Some('f') => '\u{c}',
        Some('v') => '\u{b}',
        Some('0') => '\0',
        Some('x') => {
            let code = take_hex(chars, 2, pos)?;
            char::from_u32(code).ok_or(LexError::invalid_escape(pos))?
        }
        Some('u') => parse_unicode_escape(chars, pos)?,
        Some('\r') => {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            return Ok(None);
        }
        Some('\n') | Some('\u{2028}') | Some('\u{2029}') => return Ok(None),
        // Unknown escapes stand for the character itself.
        Some(other) => other,
        None => return Err(LexError::invalid_escape(pos)),
    };
    Ok(Some(ch))
}

fn take_hex(chars: &mut Peekable<Chars<'_>>, count: usize, pos: usize) -> Result<u32, LexError> {
    let mut code = 0u32;
    for _ in 0..count {
        let digit = chars
            .next()
            .and_then(|c| c.to_digit(16))
            .ok_or(LexError::invalid_escape(pos))?;
        code = code * 16 + digit;
    }
    Ok(code)
}

/// `\uXXXX` or `\u{X...}`. Surrogate pairs written as two escapes combine.
fn parse_unicode_escape(chars: &mut Peekable<Chars<'_>>, pos: usize) -> Result<char, LexError> {
    let code = if chars.peek() == Some(&'{') {
        chars.next();
        let mut code = 0u32;
        let mut digits = 0;
        loop {
            match chars.next() {
                Some('}') if digits > 0 => break,
                Some(c) if c.is_ascii_hexdigit() && digits < 6 => {
                    code = code * 16 + c.to_digit(16).unwrap_or(0);
                    digits += 1;
                }
                _ => return Err(LexError::invalid_escape(pos)),
            }
        }
        code
    } else {
        take_hex(chars, 4, pos)?
    };

    if (0xD800..0xDC00).contains(&code) {
        let mut look = chars.clone();
        if look.next() == Some('\\') && look.next() == Some('u') {
            if let Ok(low) = take_hex(&mut look, 4, pos) {
                if (0xDC00..0xE000).contains(&low) {
                    *chars = look;
                    let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
                    return char::from_u32(combined).ok_or(LexError::invalid_escape(pos));
                }
            }
        }
    }
    Ok(char::from_u32(code).unwrap_or('\u{FFFD}'))
}

/// Result of lexing: tokens plus any errors found.
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub errors: Vec<LexError>,
}

impl LexResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A lexer error with location and friendly message.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct LexError {
    pub span: Span,
    pub message: String,
    pub hint: Option<String>,
}

impl LexError {
    fn unexpected_char(ch: char, pos: usize) -> Self {
        Self {
            span: Span::new(pos, pos + ch.len_utf8()),
            message: format!("Invalid or unexpected token '{}'", ch),
            hint: None,
        }
    }

    fn unterminated_string(start: usize, end: usize) -> Self {
        Self {
            span: Span::new(start, end),
            message: "Invalid or unexpected token (unterminated string)".to_string(),
            hint: Some("strings cannot span lines; use a template literal".to_string()),
        }
    }

    fn unterminated_template(start: usize, end: usize) -> Self {
        Self {
            span: Span::new(start, end),
            message: "Unterminated template literal".to_string(),
            hint: Some("add a closing '`'".to_string()),
        }
    }

    fn unterminated_comment(start: usize, end: usize) -> Self {
        Self {
            span: Span::new(start, end),
            message: "Unterminated comment".to_string(),
            hint: Some("add a closing '*/'".to_string()),
        }
    }

    fn invalid_escape(pos: usize) -> Self {
        Self {
            span: Span::new(pos, pos + 1),
            message: "Invalid escape sequence".to_string(),
            hint: Some("valid: \\n \\r \\t \\b \\f \\v \\0 \\xHH \\uXXXX \\u{...}".to_string()),
        }
    }

    fn invalid_number(start: usize, end: usize) -> Self {
        Self {
            span: Span::new(start, end),
            message: "Invalid number".to_string(),
            hint: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let result = Lexer::new(src).tokenize();
        assert!(result.is_ok(), "lex errors: {:?}", result.errors);
        result.tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("let x = typeof $y_1"),
            vec![
                TokenKind::Let,
                TokenKind::Ident("x".into()),
                TokenKind::Eq,
                TokenKind::Typeof,
                TokenKind::Ident("$y_1".into()),
                TokenKind::Eof,
            ]
        );
        // Keyword prefixes stay identifiers.
        assert_eq!(kinds("letter")[0], TokenKind::Ident("letter".into()));
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("1 2.5 .5 1e3 0xff 0b101 0o17 1_000"),
            vec![
                TokenKind::Number(1.0),
                TokenKind::Number(2.5),
                TokenKind::Number(0.5),
                TokenKind::Number(1000.0),
                TokenKind::Number(255.0),
                TokenKind::Number(5.0),
                TokenKind::Number(15.0),
                TokenKind::Number(1000.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn strings_and_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\tb" "\x41B\u{43}""#),
            vec![
                TokenKind::String("it's".into()),
                TokenKind::String("a\tb".into()),
                TokenKind::String("ABC".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn surrogate_pair_escape() {
        assert_eq!(kinds(r#""\uD83D\uDE00""#)[0], TokenKind::String("😀".into()));
    }

    #[test]
    fn longest_operator_wins() {
        assert_eq!(
            kinds("a === b !== c >>> 1 ?? d ?. e ... f **= 2"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::EqEqEq,
                TokenKind::Ident("b".into()),
                TokenKind::BangEqEq,
                TokenKind::Ident("c".into()),
                TokenKind::GtGtGt,
                TokenKind::Number(1.0),
                TokenKind::QuestionQuestion,
                TokenKind::Ident("d".into()),
                TokenKind::QuestionDot,
                TokenKind::Ident("e".into()),
                TokenKind::DotDotDot,
                TokenKind::Ident("f".into()),
                TokenKind::StarStarEq,
                TokenKind::Number(2.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn newline_flag_tracks_line_breaks() {
        let result = Lexer::new("a\nb /* x\n */ c // tail\nd").tokenize();
        let flags: Vec<bool> = result.tokens.iter().map(|t| t.newline_before).collect();
        assert_eq!(flags, vec![false, true, true, true, false]);
    }

    #[test]
    fn template_parts() {
        let toks = kinds("`a ${x + 1} b ${`in${y}`}`");
        match &toks[0] {
            TokenKind::Template(parts) => {
                assert_eq!(parts.len(), 5);
                assert_eq!(parts[0], TemplatePart::Str("a ".into()));
                assert_eq!(
                    parts[1],
                    TemplatePart::Expr { source: "x + 1".into(), offset: 5 }
                );
                assert_eq!(parts[2], TemplatePart::Str(" b ".into()));
                assert!(matches!(&parts[3], TemplatePart::Expr { source, .. } if source == "`in${y}`"));
                assert_eq!(parts[4], TemplatePart::Str(String::new()));
            }
            other => panic!("expected template, got {:?}", other),
        }
    }

    #[test]
    fn template_substitution_with_braces() {
        let toks = kinds("`${ {a: 1}.a }`");
        assert!(matches!(
            &toks[0],
            TokenKind::Template(parts) if matches!(&parts[1], TemplatePart::Expr { source, .. } if source == " {a: 1}.a ")
        ));
    }

    #[test]
    fn offset_lexing_shifts_spans() {
        let result = Lexer::with_offset("x", 10).tokenize();
        assert_eq!(result.tokens[0].span, Span::new(10, 11));
    }

    #[test]
    fn unterminated_literals_are_errors() {
        assert!(!Lexer::new("`abc").tokenize().is_ok());
        assert!(!Lexer::new("/* abc").tokenize().is_ok());
        assert!(!Lexer::new("'abc\n'").tokenize().is_ok());
        assert!(!Lexer::new("a # b").tokenize().is_ok());
    }
}
