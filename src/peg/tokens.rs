//! Canned regex-backed token parsers
//!
//! Building blocks for grammars that do not want to spell out common token
//! shapes. These are ordinary consumers of the core contract: each is a
//! [`pattern`] (or a small composition over one), and the process-wide
//! pattern cache guarantees that every grammar using, say, [`identifier`]
//! shares one compiled regex.

use crate::peg::matchers::pattern;
use crate::peg::parser::Parser;

const IDENTIFIER: &str = r"[A-Za-z_][A-Za-z0-9_]*";
const INTEGER: &str = r"-?[0-9]+";
const NUMBER: &str = r"-?[0-9]+(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?";
const WHITESPACE: &str = r"[ \t\r\n]+";
const SINGLE_QUOTED: &str = r"'(?:\\.|[^'\\])*'";
const DOUBLE_QUOTED: &str = r#""(?:\\.|[^"\\])*""#;

/// A letter-or-underscore-led word: the usual identifier shape.
pub fn identifier() -> Parser<String> {
    pattern(IDENTIFIER)
}

/// An optionally signed decimal integer.
pub fn integer() -> Parser<String> {
    pattern(INTEGER)
}

/// An optionally signed decimal number with optional fraction and exponent.
pub fn number() -> Parser<String> {
    pattern(NUMBER)
}

/// One or more whitespace characters. Mostly useful for grammars running
/// over unsqueezed input.
pub fn whitespace() -> Parser<String> {
    pattern(WHITESPACE)
}

/// A single- or double-quoted string with backslash escapes. The value
/// excludes the surrounding quotes (escapes are left as written).
pub fn quoted_string() -> Parser<String> {
    pattern(SINGLE_QUOTED)
        .or(&pattern(DOUBLE_QUOTED))
        .map(|quoted| quoted[1..quoted.len() - 1].to_string())
}
