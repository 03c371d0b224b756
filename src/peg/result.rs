//! Uniform parse outcome and the backtracking contract
//!
//! Every parsing function returns a [`ParseResult`]: a success carrying the
//! matched span and a value, or a failure carrying an offset and a textual
//! reason. Parse failures are data, never panics; combinators propagate them
//! by returning them upward.
//!
//! The backtracking contract: after a success the scanner cursor sits at
//! `offset + length`; after a failure the cursor sits exactly where it was
//! when the failing call was entered. [`ParseResult::recover`] is the single
//! mechanism every combinator funnels its failure path through to guarantee
//! the second half of that contract.

use crate::peg::scanner::Scanner;

/// Outcome of one parsing function invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseResult<T> {
    /// Matched `length` characters starting at `offset`.
    Success {
        offset: usize,
        length: usize,
        value: T,
    },
    /// No match; `reason` is composable text explaining what was attempted.
    Failure { offset: usize, reason: String },
}

impl<T> ParseResult<T> {
    pub fn success(offset: usize, length: usize, value: T) -> Self {
        ParseResult::Success {
            offset,
            length,
            value,
        }
    }

    /// Zero-length success, used by total combinators like `optional`.
    pub fn empty(offset: usize, value: T) -> Self {
        Self::success(offset, 0, value)
    }

    pub fn failure(offset: usize, reason: impl Into<String>) -> Self {
        ParseResult::Failure {
            offset,
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ParseResult::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ParseResult::Failure { .. })
    }

    /// Offset of the first character past the match. Failures report their
    /// failure offset.
    pub fn end(&self) -> usize {
        match self {
            ParseResult::Success { offset, length, .. } => offset + length,
            ParseResult::Failure { offset, .. } => *offset,
        }
    }

    /// The `undo` operation: reposition the scanner to the caller's entry
    /// offset when this result is a failure, then hand the result back.
    pub fn recover(self, scanner: &mut Scanner, entry: usize) -> Self {
        if self.is_failure() {
            scanner.jump_to(entry);
        }
        self
    }

    /// Transform the success value; failures pass through unchanged.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseResult<U> {
        match self {
            ParseResult::Success {
                offset,
                length,
                value,
            } => ParseResult::Success {
                offset,
                length,
                value: f(value),
            },
            ParseResult::Failure { offset, reason } => ParseResult::Failure { offset, reason },
        }
    }

    /// The success value, if any.
    pub fn into_value(self) -> Option<T> {
        match self {
            ParseResult::Success { value, .. } => Some(value),
            ParseResult::Failure { .. } => None,
        }
    }

    /// The success value; panics on failure. Test helper.
    pub fn unwrap_value(self) -> T {
        match self {
            ParseResult::Success { value, .. } => value,
            ParseResult::Failure { offset, reason } => {
                panic!("parse failed at {offset}: {reason}")
            }
        }
    }

    /// The failure reason, if any.
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            ParseResult::Failure { reason, .. } => Some(reason),
            ParseResult::Success { .. } => None,
        }
    }
}
