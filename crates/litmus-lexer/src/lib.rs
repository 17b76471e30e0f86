// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Lexer for the Litmus scripting language.
//!
//! Tokenizes snippet source into a stream of tokens for the parser. Line
//! terminators are not tokens; they are folded into each token's
//! `newline_before` flag.

mod lexer;

pub use lexer::{LexError, LexResult, Lexer};
