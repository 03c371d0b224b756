//! Whitespace squeezing end to end: a grammar with no whitespace parsers
//! running over squeezed input, string literals kept intact, and failure
//! offsets resolved back to the original text.

use pika::peg::tokens::{identifier, quoted_string};
use pika::{atom, ParseResult, Scanner, Session};

#[test]
fn assignment_grammar_without_whitespace_parsers() {
    let assignment = identifier().then_skip(&atom('=')).then(&quoted_string());
    let result = assignment.parse_squeezed("greeting = 'hello world'");
    let (name, value) = result.unwrap_value();
    assert_eq!(name, "greeting");
    assert_eq!(value, "hello world");
}

#[test]
fn interior_string_whitespace_survives() {
    let mut scanner = Scanner::new_squeezed("a 'b c' d");
    assert_eq!(scanner.read_to_end(), "a'b c'd");
}

#[test]
fn failure_offsets_resolve_to_the_original_text() {
    let assignment = identifier().then_skip(&atom('=')).then(&quoted_string());
    let mut scanner = Scanner::new_squeezed("greeting := 'x'");
    let mut session = Session::new();
    match assignment.run(&mut scanner, &mut session) {
        ParseResult::Failure { offset, .. } => {
            // The '=' matcher fails at squeezed position 8 (the ':'), which
            // sits at offset 9 in the original text.
            assert_eq!(offset, 8);
            assert_eq!(scanner.original_offset(offset), 9);
        }
        other => panic!("expected a failure, got: {other:?}"),
    }
}

#[test]
fn quoted_values_with_escapes() {
    let parser = quoted_string();
    let result = parser.parse_squeezed(r#"  "say \"hi\" now"  "#);
    assert_eq!(result.unwrap_value(), r#"say \"hi\" now"#);
}

#[test]
fn unsqueezed_parsing_still_sees_whitespace() {
    let assignment = identifier().then_skip(&atom('=')).then(&quoted_string());
    // Over the raw text the space after the identifier breaks the grammar.
    assert!(assignment.parse("greeting = 'x'").is_failure());
    assert!(assignment.parse("greeting='x'").is_success());
}
