//! Higher-order combinators: repetition, optionality, assertions, lists
//!
//! Everything here is built on the same contract as the core algebra in
//! `parser.rs`: failure restores the cursor to the combinator's entry
//! offset, success leaves it at `entry + consumed`. Malformed arguments
//! (an inverted repetition range) are reported through the ordinary failure
//! channel so they compose uniformly with grammar-level failures.

use crate::peg::parser::Parser;
use crate::peg::result::ParseResult;
use crate::peg::scanner::Scanner;
use crate::peg::session::Session;

impl<T: 'static> Parser<T> {
    /// Total combinator: if the inner parser fails, succeed with a
    /// zero-length match at the unchanged entry offset instead.
    pub fn optional(&self) -> Parser<Option<T>> {
        let inner = self.clone();
        Parser::new(move |scanner, session| {
            let entry = scanner.offset();
            match inner.run(scanner, session) {
                ParseResult::Success {
                    offset,
                    length,
                    value,
                } => ParseResult::success(offset, length, Some(value)),
                // Inner failure already restored the cursor.
                ParseResult::Failure { .. } => ParseResult::empty(entry, None),
            }
        })
    }

    /// Greedy repetition core: apply the inner parser until it fails or the
    /// upper bound is reached; fewer than `min` successes backtracks fully
    /// and fails. A zero-length inner success ends the loop, since no
    /// further progress is possible.
    fn repeat(&self, min: usize, max: Option<usize>) -> Parser<Vec<T>> {
        let inner = self.clone();
        Parser::new(move |scanner, session| {
            let entry = scanner.offset();
            if let Some(max) = max {
                if max < min {
                    return ParseResult::failure(
                        entry,
                        format!("invalid repetition range: minimum {min} exceeds maximum {max}"),
                    );
                }
            }
            let values = collect_greedy(&inner, scanner, session, max);
            if values.len() < min {
                let found = values.len();
                return ParseResult::failure(
                    entry,
                    format!("expected at least {min} repetitions, found {found}"),
                )
                .recover(scanner, entry);
            }
            ParseResult::success(entry, scanner.offset() - entry, values)
        })
    }

    /// Exactly `n` repetitions.
    pub fn exactly(&self, n: usize) -> Parser<Vec<T>> {
        self.repeat(n, Some(n))
    }

    /// At least `n` repetitions, greedy.
    pub fn minimum(&self, n: usize) -> Parser<Vec<T>> {
        self.repeat(n, None)
    }

    /// Up to `n` repetitions; zero is fine.
    pub fn maximum(&self, n: usize) -> Parser<Vec<T>> {
        self.repeat(0, Some(n))
    }

    /// Between `min` and `max` repetitions inclusive.
    pub fn range(&self, min: usize, max: usize) -> Parser<Vec<T>> {
        self.repeat(min, Some(max))
    }

    pub fn zero_or_more(&self) -> Parser<Vec<T>> {
        self.repeat(0, None)
    }

    pub fn one_or_more(&self) -> Parser<Vec<T>> {
        self.repeat(1, None)
    }

    /// Greedy repetition that fails specifically when the final count equals
    /// the forbidden `n`, even though every individual match succeeded.
    pub fn not_exactly(&self, n: usize) -> Parser<Vec<T>> {
        let inner = self.clone();
        Parser::new(move |scanner, session| {
            let entry = scanner.offset();
            let values = collect_greedy(&inner, scanner, session, None);
            if values.len() == n {
                return ParseResult::failure(
                    entry,
                    format!("matched exactly {n} repetitions, which is forbidden"),
                )
                .recover(scanner, entry);
            }
            ParseResult::success(entry, scanner.offset() - entry, values)
        })
    }

    /// Positive lookahead: match self, require `assertion` to match just
    /// after it, then rewind the cursor to just after self. The assertion's
    /// consumption never counts toward the result.
    pub fn if_followed_by<A: 'static>(&self, assertion: &Parser<A>) -> Parser<T> {
        let inner = self.clone();
        let assertion = assertion.clone();
        Parser::new(move |scanner, session| {
            let entry = scanner.offset();
            match inner.run(scanner, session) {
                ParseResult::Success {
                    offset,
                    length,
                    value,
                } => {
                    let after = scanner.offset();
                    let check = assertion.run(scanner, session);
                    scanner.jump_to(after);
                    match check {
                        ParseResult::Success { .. } => ParseResult::success(offset, length, value),
                        ParseResult::Failure { reason, .. } => {
                            ParseResult::failure(after, format!("lookahead failed: {reason}"))
                                .recover(scanner, entry)
                        }
                    }
                }
                fail => fail,
            }
        })
    }

    /// Negative lookahead: match self, require `assertion` not to match just
    /// after it.
    pub fn not_followed_by<A: 'static>(&self, assertion: &Parser<A>) -> Parser<T> {
        let inner = self.clone();
        let assertion = assertion.clone();
        Parser::new(move |scanner, session| {
            let entry = scanner.offset();
            match inner.run(scanner, session) {
                ParseResult::Success {
                    offset,
                    length,
                    value,
                } => {
                    let after = scanner.offset();
                    let check = assertion.run(scanner, session);
                    scanner.jump_to(after);
                    match check {
                        ParseResult::Success { .. } => {
                            ParseResult::failure(after, "negative lookahead matched")
                                .recover(scanner, entry)
                        }
                        ParseResult::Failure { .. } => ParseResult::success(offset, length, value),
                    }
                }
                fail => fail,
            }
        })
    }

    /// Positive lookbehind: match self, then require that `assertion` could
    /// match somewhere in the preceding input, ending exactly at the match's
    /// start offset. This rescans the prefix from every start position over
    /// a derived sub-scanner - an O(input length) check per use, a
    /// documented performance limitation rather than a correctness one.
    pub fn if_preceded_by<A: 'static>(&self, assertion: &Parser<A>) -> Parser<T> {
        let inner = self.clone();
        let assertion = assertion.clone();
        Parser::new(move |scanner, session| {
            let entry = scanner.offset();
            match inner.run(scanner, session) {
                ParseResult::Success {
                    offset,
                    length,
                    value,
                } => {
                    if lookbehind_matches(&assertion, scanner, session, entry) {
                        ParseResult::success(offset, length, value)
                    } else {
                        ParseResult::failure(entry, "lookbehind failed").recover(scanner, entry)
                    }
                }
                fail => fail,
            }
        })
    }

    /// Negative lookbehind: match self, then require that `assertion` could
    /// not match ending exactly at the match's start offset.
    pub fn not_preceded_by<A: 'static>(&self, assertion: &Parser<A>) -> Parser<T> {
        let inner = self.clone();
        let assertion = assertion.clone();
        Parser::new(move |scanner, session| {
            let entry = scanner.offset();
            match inner.run(scanner, session) {
                ParseResult::Success {
                    offset,
                    length,
                    value,
                } => {
                    if lookbehind_matches(&assertion, scanner, session, entry) {
                        ParseResult::failure(entry, "negative lookbehind matched")
                            .recover(scanner, entry)
                    } else {
                        ParseResult::success(offset, length, value)
                    }
                }
                fail => fail,
            }
        })
    }

    /// One or more values separated by `separator`. A trailing separator
    /// with no following value is backtracked over and excluded from the
    /// result.
    pub fn separated_by<S: 'static>(&self, separator: &Parser<S>) -> Parser<Vec<T>> {
        let item = self.clone();
        let separator = separator.clone();
        Parser::new(move |scanner, session| {
            let entry = scanner.offset();
            let mut values = Vec::new();
            match item.run(scanner, session) {
                ParseResult::Success { value, .. } => values.push(value),
                ParseResult::Failure { offset, reason } => {
                    return ParseResult::failure(offset, reason).recover(scanner, entry);
                }
            }
            loop {
                let before_separator = scanner.offset();
                if separator.run(scanner, session).is_failure() {
                    break;
                }
                match item.run(scanner, session) {
                    ParseResult::Success { value, .. } => values.push(value),
                    ParseResult::Failure { .. } => {
                        // Trailing separator: give it back.
                        scanner.jump_to(before_separator);
                        break;
                    }
                }
            }
            ParseResult::success(entry, scanner.offset() - entry, values)
        })
    }
}

/// Lookbehind check shared by the preceded-by assertions: can `assertion`
/// match somewhere in `[0, entry)` ending exactly at `entry`? Runs over a
/// derived sub-scanner so the parent scanner's cursor and memo partition are
/// untouched.
fn lookbehind_matches<A: 'static>(
    assertion: &Parser<A>,
    scanner: &Scanner,
    session: &mut Session,
    entry: usize,
) -> bool {
    let mut sub = scanner.sub_scanner(entry);
    for start in 0..=entry {
        sub.jump_to(start);
        if let ParseResult::Success { offset, length, .. } = assertion.run(&mut sub, session) {
            if offset + length == entry {
                return true;
            }
        }
    }
    false
}

/// Greedy accumulation shared by the repetition family.
fn collect_greedy<T: 'static>(
    inner: &Parser<T>,
    scanner: &mut Scanner,
    session: &mut Session,
    max: Option<usize>,
) -> Vec<T> {
    let mut values = Vec::new();
    loop {
        if max.is_some_and(|m| values.len() >= m) {
            break;
        }
        match inner.run(scanner, session) {
            ParseResult::Success { length, value, .. } => {
                values.push(value);
                if length == 0 {
                    break;
                }
            }
            // Inner failure already restored the cursor past this attempt.
            ParseResult::Failure { .. } => break,
        }
    }
    values
}

/// Bracketed group: `open`, then `inner`, then `close` in sequence,
/// yielding only `inner`'s value.
pub fn island<O: 'static, T: 'static, C: 'static>(
    open: &Parser<O>,
    inner: &Parser<T>,
    close: &Parser<C>,
) -> Parser<T> {
    open.skip_then(inner).then_skip(close)
}

/// Walk forward one character at a time until `target` would match or input
/// is exhausted, then restore the cursor to the entry offset and succeed
/// with the skipped span as a zero-length, non-consuming match.
pub fn until<A: 'static>(target: &Parser<A>) -> Parser<String> {
    let target = target.clone();
    Parser::new(move |scanner, session| {
        let entry = scanner.offset();
        let mut skipped = String::new();
        while !scanner.is_at_end() {
            let here = scanner.offset();
            if target.run(scanner, session).is_success() {
                scanner.jump_to(here);
                break;
            }
            if let Some(ch) = scanner.peek() {
                skipped.push(ch);
                scanner.advance(1);
            }
        }
        scanner.jump_to(entry);
        ParseResult::empty(entry, skipped)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peg::matchers::{atom, literal};

    #[test]
    fn optional_never_fails() {
        let parser = atom('x').optional();
        let mut scanner = Scanner::new("abc");
        let mut session = Session::new();
        scanner.advance(1);
        match parser.run(&mut scanner, &mut session) {
            ParseResult::Success {
                offset,
                length,
                value,
            } => {
                assert_eq!((offset, length), (1, 0));
                assert_eq!(value, None);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(scanner.offset(), 1);
    }

    #[test]
    fn optional_passes_the_value_through_on_success() {
        let parser = atom('a').optional();
        assert_eq!(parser.parse("abc").unwrap_value(), Some('a'));
    }

    #[test]
    fn range_takes_the_greedy_upper_bound() {
        let parser = atom('a').range(2, 4);
        match parser.parse("aaaaa") {
            ParseResult::Success { length, value, .. } => {
                assert_eq!(length, 4);
                assert_eq!(value.len(), 4);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn range_below_minimum_rewinds_to_start() {
        let parser = atom('a').range(2, 4);
        let mut scanner = Scanner::new("a");
        let mut session = Session::new();
        assert!(parser.run(&mut scanner, &mut session).is_failure());
        assert_eq!(scanner.offset(), 0);
    }

    #[test]
    fn empty_range_on_empty_input_succeeds() {
        let parser = atom('a').range(0, 0);
        match parser.parse("") {
            ParseResult::Success { length, value, .. } => {
                assert_eq!(length, 0);
                assert!(value.is_empty());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn inverted_range_is_an_ordinary_failure() {
        let parser = atom('a').range(3, 1);
        match parser.parse("aaaa") {
            ParseResult::Failure { offset, reason } => {
                assert_eq!(offset, 0);
                assert!(reason.contains("invalid repetition range"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn exactly_stops_at_the_bound() {
        let parser = atom('a').exactly(2);
        match parser.parse("aaa") {
            ParseResult::Success { length, value, .. } => {
                assert_eq!(length, 2);
                assert_eq!(value.len(), 2);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn not_exactly_rejects_the_forbidden_count() {
        let parser = atom('a').not_exactly(2);
        let mut scanner = Scanner::new("aab");
        let mut session = Session::new();
        let result = parser.run(&mut scanner, &mut session);
        assert!(result.is_failure());
        assert_eq!(scanner.offset(), 0);
    }

    #[test]
    fn not_exactly_accepts_any_other_count() {
        let parser = atom('a').not_exactly(2);
        assert_eq!(parser.parse("aaa").unwrap_value().len(), 3);
        assert_eq!(parser.parse("b").unwrap_value().len(), 0);
    }

    #[test]
    fn lookahead_does_not_consume_the_assertion() {
        let parser = literal("ab").if_followed_by(&atom('c'));
        let mut scanner = Scanner::new("abc");
        let mut session = Session::new();
        assert!(parser.run(&mut scanner, &mut session).is_success());
        assert_eq!(scanner.offset(), 2);
    }

    #[test]
    fn lookahead_failure_rewinds_fully() {
        let parser = literal("ab").if_followed_by(&atom('X'));
        let mut scanner = Scanner::new("abc");
        let mut session = Session::new();
        assert!(parser.run(&mut scanner, &mut session).is_failure());
        assert_eq!(scanner.offset(), 0);
    }

    #[test]
    fn negative_lookahead_inverts_the_assertion() {
        let parser = literal("ab").not_followed_by(&atom('X'));
        assert!(parser.parse("abc").is_success());
        let parser = literal("ab").not_followed_by(&atom('c'));
        assert!(parser.parse("abc").is_failure());
    }

    #[test]
    fn lookbehind_rescans_the_prefix() {
        let word = literal("world").if_preceded_by(&literal("hello "));
        let mut scanner = Scanner::new("hello world");
        let mut session = Session::new();
        scanner.advance(6);
        assert!(word.run(&mut scanner, &mut session).is_success());
        assert_eq!(scanner.offset(), 11);
    }

    #[test]
    fn lookbehind_requires_the_match_to_end_at_the_entry() {
        // "hello" ends at 5, not at the entry offset 6.
        let word = literal("world").if_preceded_by(&literal("hello"));
        let mut scanner = Scanner::new("hello world");
        let mut session = Session::new();
        scanner.advance(6);
        assert!(word.run(&mut scanner, &mut session).is_failure());
        assert_eq!(scanner.offset(), 6);
    }

    #[test]
    fn negative_lookbehind() {
        let word = literal("world").not_preceded_by(&literal("hello "));
        let mut scanner = Scanner::new("hello world");
        let mut session = Session::new();
        scanner.advance(6);
        assert!(word.run(&mut scanner, &mut session).is_failure());
        assert_eq!(scanner.offset(), 6);
    }

    #[test]
    fn separated_by_requires_one_value() {
        let parser = atom('a').separated_by(&atom(','));
        assert!(parser.parse("b").is_failure());
        assert_eq!(parser.parse("a").unwrap_value(), vec!['a']);
    }

    #[test]
    fn separated_by_backtracks_over_a_trailing_separator() {
        let parser = atom('a').separated_by(&atom(','));
        let mut scanner = Scanner::new("a,a,b");
        let mut session = Session::new();
        match parser.run(&mut scanner, &mut session) {
            ParseResult::Success { length, value, .. } => {
                assert_eq!(value, vec!['a', 'a']);
                // The trailing "," before "b" is not consumed.
                assert_eq!(length, 3);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(scanner.offset(), 3);
    }

    #[test]
    fn island_discards_its_delimiters() {
        let parser = island(&atom('['), &literal("abc"), &atom(']'));
        match parser.parse("[abc]") {
            ParseResult::Success { length, value, .. } => {
                assert_eq!(length, 5);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn island_backtracks_when_the_close_is_missing() {
        let parser = island(&atom('['), &literal("abc"), &atom(']'));
        let mut scanner = Scanner::new("[abc");
        let mut session = Session::new();
        assert!(parser.run(&mut scanner, &mut session).is_failure());
        assert_eq!(scanner.offset(), 0);
    }

    #[test]
    fn until_reports_the_skipped_span_without_consuming() {
        let parser = until(&atom(';'));
        let mut scanner = Scanner::new("abc;def");
        let mut session = Session::new();
        match parser.run(&mut scanner, &mut session) {
            ParseResult::Success {
                offset,
                length,
                value,
            } => {
                assert_eq!((offset, length), (0, 0));
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(scanner.offset(), 0);
    }

    #[test]
    fn until_stops_at_end_of_input() {
        let parser = until(&atom(';'));
        assert_eq!(parser.parse("abc").unwrap_value(), "abc");
    }
}
