//! # pika
//!
//! A PEG parser-combinator engine. Grammars are built by composing small
//! parsing functions into larger ones over a backtracking text cursor, with
//! packrat memoization and seed-growing support for direct left-recursive
//! rules.
//!
//! The core pieces:
//! - [`peg::scanner`] - the cursor over an immutable character buffer, with
//!   an optional whitespace-squeeze preprocessing pass
//! - [`peg::result`] - the uniform success/failure outcome of every parser
//! - [`peg::matchers`] - character, string and regex primitives
//! - [`peg::parser`] and [`peg::combinators`] - the combinator algebra
//! - [`peg::packrat`] - memoization and left-recursion seed growing
//! - [`peg::tokens`] - canned regex-backed token parsers

pub mod peg;

pub use peg::combinators::{island, until};
pub use peg::matchers::{atom, literal, pattern};
pub use peg::packrat::rule;
pub use peg::parser::{choice, recursive, Parser};
pub use peg::result::ParseResult;
pub use peg::scanner::Scanner;
pub use peg::session::Session;
