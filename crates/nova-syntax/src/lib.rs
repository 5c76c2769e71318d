//! Java syntax for Nova's loop analyses.
//!
//! This crate provides:
//! - [`parse`]: parses a compilation unit into the span-carrying [`ast`], with
//!   recovery. Errors are collected instead of aborting.
//! - [`parse_block`] / [`parse_expression`]: parse snippets at a known file
//!   offset. Rewrites use these to re-check generated code.
//! - [`JavaLanguageLevel`]: which stream library features a rewrite may use.

pub mod ast;
mod language_level;
mod lexer;
mod literals;
mod parser;

pub use ast::*;
pub use language_level::{JavaFeature, JavaLanguageLevel, ParseLanguageLevelError};
pub use literals::{
    parse_double_literal, parse_int_literal, parse_literal, parse_long_literal,
    quote_string_literal, unescape_char_literal, unescape_string_literal, unescape_text_block,
    LiteralError, LiteralValue,
};
pub use parser::{parse, parse_block, parse_expression, Parse, ParseError};

#[cfg(test)]
mod tests;
