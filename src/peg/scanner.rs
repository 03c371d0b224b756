//! Backtrackable text cursor over an immutable character buffer
//!
//! A [`Scanner`] is created once per top-level parse and threaded through
//! every parsing function. All offsets are character positions, not byte
//! positions; byte offsets into the underlying `str` are precomputed so the
//! regex primitives can slice the remaining input cheaply.
//!
//! Cursor movement is bounded: moving outside `[0, len]` is an internal
//! combinator bug, not a grammar/input mismatch, and aborts with a panic
//! instead of returning a recoverable failure.
//!
//! ## Whitespace squeezing
//!
//! [`Scanner::new_squeezed`] runs a single left-to-right preprocessing pass
//! that drops runs of whitespace outside single- or double-quoted string
//! contexts. Every retained character records its original-text offset in an
//! index map keyed by its squeezed position, so a grammar can ignore
//! insignificant whitespace without explicit whitespace-skipping combinators
//! while diagnostics still resolve to original-text offsets.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique scanner identity, used to partition memo tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScannerId(u64);

impl ScannerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        ScannerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Immutable character buffer with a mutable, bounded cursor.
pub struct Scanner {
    text: String,
    chars: Vec<char>,
    /// Byte offset of each character in `text`, plus the final length.
    byte_starts: Vec<usize>,
    offset: usize,
    /// Squeezed position -> original-text position. `None` when the input
    /// was not squeezed.
    origin_map: Option<Vec<usize>>,
    /// Character length of the original, unsqueezed input.
    origin_len: usize,
    id: ScannerId,
}

impl Scanner {
    /// Scanner over the raw input text.
    pub fn new(text: &str) -> Self {
        Self::build(text.to_string(), None, text.chars().count())
    }

    /// Scanner over the whitespace-squeezed input, with an index map back to
    /// original offsets.
    pub fn new_squeezed(text: &str) -> Self {
        let origin_len = text.chars().count();
        let (squeezed, map) = squeeze(text);
        Self::build(squeezed, Some(map), origin_len)
    }

    fn build(text: String, origin_map: Option<Vec<usize>>, origin_len: usize) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let mut byte_starts: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        byte_starts.push(text.len());
        Self {
            text,
            chars,
            byte_starts,
            offset: 0,
            origin_map,
            origin_len,
            id: ScannerId::next(),
        }
    }

    /// Identity used as a memo-table partition key.
    pub fn id(&self) -> ScannerId {
        self.id
    }

    /// Current cursor position, in characters.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Total input length, in characters.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn is_at_end(&self) -> bool {
        self.offset == self.chars.len()
    }

    /// Characters left between the cursor and the end of input.
    pub fn remaining(&self) -> usize {
        self.chars.len() - self.offset
    }

    /// The character under the cursor, if any. Never moves the cursor.
    pub fn peek(&self) -> Option<char> {
        self.chars.get(self.offset).copied()
    }

    /// Move the cursor forward by `n` characters.
    pub fn advance(&mut self, n: usize) {
        if self.offset + n > self.chars.len() {
            self.fault(&format!(
                "advance({n}) from offset {} would pass the end of input (length {})",
                self.offset,
                self.chars.len()
            ));
        }
        self.offset += n;
    }

    /// Move the cursor backward by `n` characters.
    pub fn backtrack(&mut self, n: usize) {
        if n > self.offset {
            self.fault(&format!(
                "backtrack({n}) from offset {} would pass the start of input",
                self.offset
            ));
        }
        self.offset -= n;
    }

    /// Reposition the cursor to an absolute offset.
    pub fn jump_to(&mut self, target: usize) {
        if target > self.chars.len() {
            self.fault(&format!(
                "jump_to({target}) is outside the input (length {})",
                self.chars.len()
            ));
        }
        self.offset = target;
    }

    /// Consume and return the next `n` characters.
    pub fn read(&mut self, n: usize) -> String {
        if self.offset + n > self.chars.len() {
            self.fault(&format!(
                "read({n}) from offset {} would pass the end of input (length {})",
                self.offset,
                self.chars.len()
            ));
        }
        let out: String = self.chars[self.offset..self.offset + n].iter().collect();
        self.offset += n;
        out
    }

    /// Consume and return everything from the cursor to the end of input.
    pub fn read_to_end(&mut self) -> String {
        self.read(self.remaining())
    }

    /// Cursor back to the start of input.
    pub fn reset(&mut self) {
        self.offset = 0;
    }

    /// Whether the input at the cursor starts with `literal`. Never moves
    /// the cursor.
    pub fn starts_with(&self, literal: &str) -> bool {
        self.remaining_str().starts_with(literal)
    }

    /// Anchored regex test at the cursor, reporting the match length in
    /// characters. The regex must be `\A`-anchored (the matchers module
    /// compiles patterns that way). Never moves the cursor.
    pub fn pattern_prefix(&self, re: &regex::Regex) -> Option<usize> {
        re.find(self.remaining_str())
            .map(|m| m.as_str().chars().count())
    }

    /// The unread remainder of the buffer.
    pub fn remaining_str(&self) -> &str {
        &self.text[self.byte_starts[self.offset]..]
    }

    /// Derived scanner over `[0, end)` with a fresh identity. Used by the
    /// lookbehind assertions, which re-scan the input before a match.
    pub fn sub_scanner(&self, end: usize) -> Scanner {
        if end > self.chars.len() {
            self.fault(&format!(
                "sub_scanner({end}) is outside the input (length {})",
                self.chars.len()
            ));
        }
        let text: String = self.chars[..end].iter().collect();
        let origin_map = self.origin_map.as_ref().map(|m| m[..end].to_vec());
        Self::build(text, origin_map, self.origin_len)
    }

    /// Map a position in this (possibly squeezed) buffer back to its offset
    /// in the original text. Identity when the input was not squeezed.
    pub fn original_offset(&self, pos: usize) -> usize {
        match &self.origin_map {
            Some(map) => map.get(pos).copied().unwrap_or(self.origin_len),
            None => pos,
        }
    }

    fn fault(&self, message: &str) -> ! {
        panic!("scanner fault: {message}");
    }
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("offset", &self.offset)
            .field("len", &self.chars.len())
            .field("squeezed", &self.origin_map.is_some())
            .finish()
    }
}

/// Single-pass whitespace elision. Returns the squeezed text and, for each
/// retained character, its character offset in the original input.
///
/// A quote opens a string context unless preceded by an unescaped backslash;
/// the matching unescaped quote closes it. Whitespace inside a string
/// context is retained verbatim; whitespace outside is dropped entirely.
fn squeeze(text: &str) -> (String, Vec<usize>) {
    let mut out = String::new();
    let mut map = Vec::new();
    let mut in_string: Option<char> = None;
    let mut escaped = false;

    for (i, ch) in text.chars().enumerate() {
        match in_string {
            Some(open) => {
                out.push(ch);
                map.push(i);
                if ch == open && !escaped {
                    in_string = None;
                }
            }
            None => {
                if ch.is_whitespace() {
                    escaped = false;
                    continue;
                }
                out.push(ch);
                map.push(i);
                if (ch == '\'' || ch == '"') && !escaped {
                    in_string = Some(ch);
                }
            }
        }
        escaped = ch == '\\' && !escaped;
    }

    (out, map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_and_backtracks_within_bounds() {
        let mut scanner = Scanner::new("hello");
        scanner.advance(3);
        assert_eq!(scanner.offset(), 3);
        scanner.backtrack(2);
        assert_eq!(scanner.offset(), 1);
        assert_eq!(scanner.peek(), Some('e'));
    }

    #[test]
    #[should_panic(expected = "scanner fault")]
    fn advance_past_end_is_fatal() {
        let mut scanner = Scanner::new("ab");
        scanner.advance(3);
    }

    #[test]
    #[should_panic(expected = "scanner fault")]
    fn backtrack_past_start_is_fatal() {
        let mut scanner = Scanner::new("ab");
        scanner.backtrack(1);
    }

    #[test]
    fn read_consumes_and_returns() {
        let mut scanner = Scanner::new("hello world");
        assert_eq!(scanner.read(5), "hello");
        assert_eq!(scanner.offset(), 5);
        assert_eq!(scanner.read_to_end(), " world");
        assert!(scanner.is_at_end());
    }

    #[test]
    fn starts_with_never_moves_the_cursor() {
        let mut scanner = Scanner::new("hello");
        scanner.advance(1);
        assert!(scanner.starts_with("ell"));
        assert!(!scanner.starts_with("hel"));
        assert_eq!(scanner.offset(), 1);
    }

    #[test]
    fn squeeze_drops_whitespace_outside_strings() {
        let scanner = Scanner::new_squeezed("a 'b c' d");
        assert_eq!(scanner.remaining_str(), "a'b c'd");
    }

    #[test]
    fn squeeze_index_map_resolves_original_offsets() {
        // Squeezed: a'b c'd -- the `c` sits at squeezed position 4,
        // original position 5.
        let scanner = Scanner::new_squeezed("a 'b c' d");
        assert_eq!(scanner.original_offset(0), 0); // a
        assert_eq!(scanner.original_offset(1), 2); // '
        assert_eq!(scanner.original_offset(4), 5); // c
        assert_eq!(scanner.original_offset(6), 8); // d
    }

    #[test]
    fn squeeze_respects_escaped_quotes() {
        // The escaped quote does not open a string, so the following
        // whitespace is still elided.
        let scanner = Scanner::new_squeezed(r"a \' b");
        assert_eq!(scanner.remaining_str(), r"a\'b");
    }

    #[test]
    fn squeeze_double_quoted_strings() {
        let scanner = Scanner::new_squeezed("x  \"a  b\"  y");
        assert_eq!(scanner.remaining_str(), "x\"a  b\"y");
    }

    #[test]
    fn unsqueezed_offsets_map_to_themselves() {
        let scanner = Scanner::new("a b");
        assert_eq!(scanner.original_offset(2), 2);
    }

    #[test]
    fn sub_scanner_covers_a_prefix_with_fresh_identity() {
        let scanner = Scanner::new("abcdef");
        let sub = scanner.sub_scanner(3);
        assert_eq!(sub.remaining_str(), "abc");
        assert_ne!(sub.id(), scanner.id());
    }
}
