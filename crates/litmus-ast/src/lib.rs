// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Abstract Syntax Tree types for the Litmus scripting language.
//!
//! The language is the dynamically-typed, implicitly-coercing subset that
//! tutorial documents embed in `js` fences. This crate is shared by the
//! lexer, the parser and the interpreter.

pub mod span;
pub mod token;
pub mod expr;
pub mod stmt;

pub use span::Span;
