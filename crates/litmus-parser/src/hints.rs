// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Error hints - suggestions for fixing common mistakes.

use litmus_ast::token::TokenKind;

/// Get a hint for an "expected X" error based on what was found instead.
pub fn for_expected(expected: &str, found: &TokenKind) -> Option<&'static str> {
    match (expected, found) {
        ("')'", TokenKind::Eof) => Some("add ')' to close the parenthesis"),
        ("')'", TokenKind::Semi) => Some("missing ')' before ';'"),
        ("']'", TokenKind::Eof) => Some("add ']' to close the bracket"),
        ("'}'", TokenKind::Eof) => Some("every '{' needs a matching '}'"),
        ("'{'", _) => Some("blocks start with '{'"),
        ("'('", _) => Some("conditions and parameter lists are wrapped in parentheses"),
        ("':'", TokenKind::Eq) => Some("object literals use ':' between key and value"),
        ("':'", _) => Some("a conditional expression needs both branches: a ? b : c"),

        ("expression", TokenKind::Eq) => Some("put the value after '='"),
        ("expression", TokenKind::Semi) => Some("statement is incomplete"),
        ("expression", TokenKind::Eof) => Some("statement is incomplete"),
        ("expression", TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace) => {
            Some("a value is missing before the closing bracket")
        }
        ("expression", _) => Some("try a value, variable, or function call"),

        ("a name", TokenKind::Number(_)) => Some("names can't start with a number"),
        ("a name", kind) if kind.keyword_name().is_some() => Some("reserved words can't be used as names"),
        ("a name", _) => Some("names start with a letter, '_' or '$'"),
        ("property name", _) => Some("property names follow '.'"),

        ("';'", TokenKind::Ident(_)) => Some("separate statements with ';' or a line break"),
        ("';'", _) => Some("end statements with ';' or a line break"),

        _ => None,
    }
}
