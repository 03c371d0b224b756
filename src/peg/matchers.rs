//! Literal and pattern primitives
//!
//! Three matcher families sit at the leaves of every grammar: a single
//! character, a fixed string, and a compiled regular expression. All three
//! require an anchored match starting exactly at the cursor - a match, not a
//! search.
//!
//! Compiled patterns are interned in a process-wide cache keyed by the
//! pattern text, so repeated use of the same pattern across a grammar (or
//! across grammars) reuses one compiled regex. Entries are written once and
//! never mutated. A pattern that fails to compile is cached the same way and
//! reports its compile error through the ordinary failure channel, uniform
//! with grammar-level failures.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::peg::parser::Parser;
use crate::peg::result::ParseResult;

/// Pattern text -> anchored compiled regex (or its compile error).
static PATTERN_CACHE: Lazy<Mutex<HashMap<String, Result<Regex, String>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn compiled(pattern: &str) -> Result<Regex, String> {
    let mut cache = PATTERN_CACHE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(entry) = cache.get(pattern) {
        return entry.clone();
    }
    let anchored = format!(r"\A(?:{pattern})");
    let entry = Regex::new(&anchored).map_err(|e| e.to_string());
    cache.insert(pattern.to_string(), entry.clone());
    entry
}

/// Match one specific character at the cursor.
pub fn atom(expected: char) -> Parser<char> {
    Parser::new(move |scanner, _session| {
        let entry = scanner.offset();
        match scanner.peek() {
            Some(ch) if ch == expected => {
                scanner.advance(1);
                ParseResult::success(entry, 1, ch)
            }
            _ => ParseResult::failure(entry, format!("expected '{expected}'")),
        }
    })
}

/// Match a fixed string at the cursor.
pub fn literal(expected: &str) -> Parser<String> {
    let expected = expected.to_string();
    let length = expected.chars().count();
    Parser::new(move |scanner, _session| {
        let entry = scanner.offset();
        if scanner.starts_with(&expected) {
            scanner.advance(length);
            ParseResult::success(entry, length, expected.clone())
        } else {
            ParseResult::failure(entry, format!("expected \"{expected}\""))
        }
    })
}

/// Match a regular expression anchored at the cursor, yielding the matched
/// text. The compiled regex is shared through the process-wide cache.
pub fn pattern(pattern: &str) -> Parser<String> {
    let source = pattern.to_string();
    let regex = compiled(pattern);
    Parser::new(move |scanner, _session| {
        let entry = scanner.offset();
        match &regex {
            Ok(re) => match scanner.pattern_prefix(re) {
                Some(length) => {
                    let matched = scanner.read(length);
                    ParseResult::success(entry, length, matched)
                }
                None => ParseResult::failure(entry, format!("expected pattern /{source}/")),
            },
            Err(error) => {
                ParseResult::failure(entry, format!("invalid pattern /{source}/: {error}"))
            }
        }
    })
}
