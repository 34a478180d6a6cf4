//! Round-trip and whole-macro parsing tests
//!
//! Exercises the parser against complete macro texts and verifies the
//! serializer is its left inverse for accepted command lines.

use wm_parser::{serialize_command, CommandType, LineKind, Parser};

const SAMPLE_MACRO: &str = "VERSION BUILD=1011\n\
' collect search results\n\
SET !ERRORIGNORE YES\n\
URL GOTO=https://example.com/search?q={{query}}\n\
TAG POS=1 TYPE=INPUT ATTR=NAME:q&&VALUE:x CONTENT={{!COL1}}\n\
WAIT SECONDS=2\n\
SET !EXTRACT {{!VAR1}}\n\
PAUSE\n";

#[test]
fn test_parse_sample_macro() {
    let parsed = Parser::new().parse(SAMPLE_MACRO);

    assert_eq!(parsed.version.as_deref(), Some("1011"));
    assert_eq!(parsed.command_count(), 7);
    assert_eq!(parsed.comments().count(), 1);
    assert!(parsed.errors.is_empty());
}

#[test]
fn test_sample_macro_variable_list() {
    let parsed = Parser::new().parse(SAMPLE_MACRO);

    let names: Vec<_> = parsed.variables.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec!["query", "!COL1", "!VAR1"]);
    assert!(!parsed.variables[0].is_system);
    assert!(parsed.variables[1].is_system);
}

#[test]
fn test_round_trip_every_command_line() {
    let parsed = Parser::new().parse(SAMPLE_MACRO);

    for line in &parsed.lines {
        if let LineKind::Command(cmd) = &line.kind {
            assert_eq!(serialize_command(cmd), line.raw.trim(), "line {}", line.number);
        }
    }
}

#[test]
fn test_validation_reports_each_bad_line_once() {
    let parser = Parser::new().with_validation(true);
    let parsed = parser.parse("FOOBAR X=1\nTAG POS=1 TYPE=A\nWAIT\n");

    assert_eq!(parsed.errors.len(), 2);
    assert_eq!(parsed.errors[0].line, 1);
    assert!(parsed.errors[0].message.contains("Unknown command"));
    assert_eq!(parsed.errors[1].line, 3);
    assert!(parsed.errors[1].message.contains("SECONDS"));
}

#[test]
fn test_unknown_command_sentinel_keeps_parameters() {
    let parsed = Parser::new().with_validation(true).parse("FOOBAR X=1");
    let cmd = parsed.commands().next().unwrap();

    assert_eq!(cmd.command, CommandType::Unknown("FOOBAR".to_string()));
    assert_eq!(cmd.param_value("X"), Some("1"));
    assert_eq!(parsed.errors.len(), 1);
}

#[test]
fn test_command_lines_know_their_numbers() {
    let parsed = Parser::new().parse("' first\nWAIT SECONDS=1\n\nPAUSE");
    let lines: Vec<_> = parsed.commands().map(|c| c.line).collect();
    assert_eq!(lines, vec![2, 4]);
}

#[test]
fn test_escaped_reference_is_reported_but_marked() {
    let parsed = Parser::new().parse(r"PRINT FILE=\{{literal}}");
    let cmd = parsed.commands().next().unwrap();

    assert_eq!(cmd.refs.len(), 1);
    assert!(cmd.refs[0].escaped);
}

#[test]
fn test_crlf_macro_round_trip() {
    let text = "URL GOTO=https://example.com\r\nWAIT SECONDS=1\r\n";
    let parsed = Parser::new().parse(text);

    assert_eq!(parsed.command_count(), 2);
    let cmd = parsed.commands().next().unwrap();
    assert_eq!(serialize_command(cmd), "URL GOTO=https://example.com");
}
