//! The parser value and the core combinator algebra
//!
//! A [`Parser<T>`] is an opaque, cloneable function value from a scanner
//! (plus the per-parse session) to a [`ParseResult<T>`]. Grammars are graphs
//! of composed parser values: leaf matchers at the bottom, combinators above
//! them, optionally packrat-wrapped rules at the top.
//!
//! Every combinator honors the global backtracking invariant: on failure the
//! cursor is restored to the combinator's entry offset before returning; on
//! success the cursor sits at `entry + consumed length`.

use std::rc::Rc;

use crate::peg::result::ParseResult;
use crate::peg::scanner::Scanner;
use crate::peg::session::Session;

/// A composable parsing function. Cloning is cheap (shared behind `Rc`);
/// identity of a parser value is meaningful only to the packrat engine,
/// which assigns explicit rule ids.
pub struct Parser<T> {
    f: Rc<dyn Fn(&mut Scanner, &mut Session) -> ParseResult<T>>,
}

impl<T> Clone for Parser<T> {
    fn clone(&self) -> Self {
        Parser {
            f: Rc::clone(&self.f),
        }
    }
}

impl<T> std::fmt::Debug for Parser<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Parser")
    }
}

impl<T: 'static> Parser<T> {
    pub fn new(f: impl Fn(&mut Scanner, &mut Session) -> ParseResult<T> + 'static) -> Self {
        Parser { f: Rc::new(f) }
    }

    /// Invoke against an existing scanner and session.
    pub fn run(&self, scanner: &mut Scanner, session: &mut Session) -> ParseResult<T> {
        (self.f)(scanner, session)
    }

    /// Parse a string from offset 0 with a fresh scanner and session.
    pub fn parse(&self, text: &str) -> ParseResult<T> {
        let mut scanner = Scanner::new(text);
        let mut session = Session::new();
        self.run(&mut scanner, &mut session)
    }

    /// Like [`Parser::parse`], but over the whitespace-squeezed input.
    pub fn parse_squeezed(&self, text: &str) -> ParseResult<T> {
        let mut scanner = Scanner::new_squeezed(text);
        let mut session = Session::new();
        self.run(&mut scanner, &mut session)
    }

    /// Transform the success value; failures pass through unchanged.
    pub fn map<U: 'static>(&self, f: impl Fn(T) -> U + 'static) -> Parser<U> {
        let inner = self.clone();
        Parser::new(move |scanner, session| inner.run(scanner, session).map(&f))
    }

    /// Sequence two parsers. The second runs only if the first succeeds; on
    /// either failure the cursor backtracks to the sequence's start. The
    /// success span is the union of both consumed spans.
    pub fn then<U: 'static>(&self, next: &Parser<U>) -> Parser<(T, U)> {
        let first = self.clone();
        let second = next.clone();
        Parser::new(move |scanner, session| {
            let entry = scanner.offset();
            match first.run(scanner, session) {
                ParseResult::Success {
                    offset,
                    length,
                    value: left,
                } => match second.run(scanner, session) {
                    ParseResult::Success {
                        length: next_length,
                        value: right,
                        ..
                    } => ParseResult::success(offset, length + next_length, (left, right)),
                    ParseResult::Failure {
                        offset: at,
                        reason,
                    } => ParseResult::failure(at, reason).recover(scanner, entry),
                },
                ParseResult::Failure { offset, reason } => {
                    ParseResult::failure(offset, reason).recover(scanner, entry)
                }
            }
        })
    }

    /// Sequence, keeping only the left value.
    pub fn then_skip<U: 'static>(&self, next: &Parser<U>) -> Parser<T> {
        self.then(next).map(|(left, _)| left)
    }

    /// Sequence, keeping only the right value.
    pub fn skip_then<U: 'static>(&self, next: &Parser<U>) -> Parser<U> {
        self.then(next).map(|(_, right)| right)
    }

    /// Ordered choice between this parser and `alt`.
    pub fn or(&self, alt: &Parser<T>) -> Parser<T> {
        choice(vec![self.clone(), alt.clone()])
    }
}

/// Build a self-referential parser through deferred binding: `build`
/// receives a placeholder that resolves to the finished parser on first
/// use. This is how a rule references itself (or how a grammar ties a
/// recursive knot) without forward-declared mutable bindings.
pub fn recursive<T: 'static>(build: impl FnOnce(Parser<T>) -> Parser<T>) -> Parser<T> {
    let slot: Rc<std::cell::RefCell<Option<Parser<T>>>> = Rc::new(std::cell::RefCell::new(None));
    let resolver = Rc::clone(&slot);
    let placeholder = Parser::new(move |scanner, session| {
        let resolved = resolver.borrow().clone();
        match resolved {
            Some(parser) => parser.run(scanner, session),
            None => panic!("recursive parser invoked before its definition was resolved"),
        }
    });
    let built = build(placeholder);
    *slot.borrow_mut() = Some(built.clone());
    built
}

/// Ordered choice: alternatives are tried strictly in declaration order from
/// the entry offset; the first success wins (PEG priority, never
/// longest-match). On total failure, every alternative's reason and offset
/// are aggregated into one composite message reported at the entry offset.
pub fn choice<T: 'static>(alternatives: Vec<Parser<T>>) -> Parser<T> {
    Parser::new(move |scanner, session| {
        let entry = scanner.offset();
        let mut reasons = Vec::with_capacity(alternatives.len());
        for alternative in &alternatives {
            match alternative.run(scanner, session) {
                success @ ParseResult::Success { .. } => return success,
                ParseResult::Failure { offset, reason } => {
                    reasons.push(format!("{reason} (at {offset})"));
                    scanner.jump_to(entry);
                }
            }
        }
        ParseResult::failure(entry, reasons.join(" or "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peg::matchers::{atom, literal};

    #[test]
    fn then_unions_spans() {
        let parser = literal("ab").then(&literal("cd"));
        match parser.parse("abcd") {
            ParseResult::Success {
                offset,
                length,
                value,
            } => {
                assert_eq!(offset, 0);
                assert_eq!(length, 4);
                assert_eq!(value, ("ab".to_string(), "cd".to_string()));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn then_backtracks_to_sequence_start_when_second_fails() {
        let parser = literal("ab").then(&literal("XY"));
        let mut scanner = Scanner::new("abcd");
        let mut session = Session::new();
        let result = parser.run(&mut scanner, &mut session);
        assert!(result.is_failure());
        assert_eq!(scanner.offset(), 0);
    }

    #[test]
    fn choice_prefers_the_first_alternative() {
        // PEG priority: 'a' wins even though "ab" would consume more.
        let parser = choice(vec![
            atom('a').map(|c| c.to_string()),
            literal("ab"),
        ]);
        match parser.parse("ab") {
            ParseResult::Success { length, value, .. } => {
                assert_eq!(length, 1);
                assert_eq!(value, "a");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn choice_aggregates_all_failure_reasons() {
        let parser = choice(vec![atom('x').map(|c| c.to_string()), literal("yz")]);
        match parser.parse("ab") {
            ParseResult::Failure { offset, reason } => {
                assert_eq!(offset, 0);
                assert!(reason.contains("'x'"));
                assert!(reason.contains("\"yz\""));
                assert!(reason.contains(" or "));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn map_transforms_the_value_only() {
        let parser = literal("42").map(|s| s.parse::<u32>().unwrap_or(0));
        match parser.parse("42") {
            ParseResult::Success {
                offset,
                length,
                value,
            } => {
                assert_eq!((offset, length, value), (0, 2, 42));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn skip_projections_keep_one_side() {
        let parser = atom('(').skip_then(&literal("x")).then_skip(&atom(')'));
        assert_eq!(parser.parse("(x)").unwrap_value(), "x");
    }
}
