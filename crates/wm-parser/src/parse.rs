//! Macro text parsing
//!
//! Pure text-in, structure-out: the parser never touches variables or
//! execution state, and it never fails — structural problems surface as
//! `ParseError` diagnostics on the resulting `ParsedMacro`.

use crate::command::CommandType;
use crate::model::{LineKind, Parameter, ParamKind, ParsedCommand, ParsedLine, ParsedMacro};
use crate::validate;
use crate::varref::find_references;
use tracing::trace;

/// Comment marker; consumes the rest of the line
pub const COMMENT_MARKER: char = '\'';

/// Implicit value carried by a bare flag parameter
pub const FLAG_VALUE: &str = "YES";

/// Macro text parser
///
/// Validation is opt-in: with it enabled, each command is checked against
/// its keyword's required-parameter rule and unknown keywords are
/// reported.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    validate: bool,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable per-command structural validation
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Parse a whole macro
    pub fn parse(&self, text: &str) -> ParsedMacro {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut lines = Vec::new();
        let mut errors = Vec::new();

        for (idx, raw) in split_lines(text).into_iter().enumerate() {
            let number = idx + 1;
            let line = self.parse_line(&raw, number);

            if self.validate {
                if let LineKind::Command(cmd) = &line.kind {
                    if let Some(err) = validate::validate_command(cmd) {
                        errors.push(err);
                    }
                }
            }

            lines.push(line);
        }

        // A version header only counts when it is the first command.
        let version = lines
            .iter()
            .find_map(|l| match &l.kind {
                LineKind::Command(cmd) => Some(cmd),
                _ => None,
            })
            .filter(|cmd| cmd.command == CommandType::Version)
            .map(|cmd| {
                cmd.param_value("BUILD")
                    .map(str::to_string)
                    .unwrap_or_else(|| cmd.raw.clone())
            });

        // Macro-wide variable list: first appearance wins.
        let mut variables = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for line in &lines {
            if let LineKind::Command(cmd) = &line.kind {
                for r in &cmd.refs {
                    if seen.insert(r.canonical()) {
                        variables.push(r.clone());
                    }
                }
            }
        }

        trace!(
            lines = lines.len(),
            variables = variables.len(),
            errors = errors.len(),
            "Parsed macro"
        );

        ParsedMacro {
            lines,
            variables,
            version,
            errors,
        }
    }

    /// Classify and parse a single source line
    pub fn parse_line(&self, raw: &str, number: usize) -> ParsedLine {
        let trimmed = raw.trim();

        let kind = if trimmed.is_empty() {
            LineKind::Empty
        } else if let Some(rest) = trimmed.strip_prefix(COMMENT_MARKER) {
            LineKind::Comment(rest.trim_start().to_string())
        } else {
            LineKind::Command(self.parse_command(trimmed, number))
        };

        ParsedLine {
            number,
            raw: raw.to_string(),
            kind,
        }
    }

    /// Parse one command line into its structured form
    pub fn parse_command(&self, raw: &str, number: usize) -> ParsedCommand {
        let raw = raw.trim();
        let (keyword, rest) = match raw.split_once(char::is_whitespace) {
            Some((kw, rest)) => (kw, rest.trim_start()),
            None => (raw, ""),
        };

        let command = CommandType::from_keyword(keyword);

        let parameters = if command.takes_name_and_value() {
            parse_name_and_value(rest)
        } else if command.takes_rest_of_line() {
            parse_rest_of_line(rest)
        } else {
            tokenize(rest).into_iter().map(parse_token).collect()
        };

        ParsedCommand {
            command,
            parameters,
            raw: raw.to_string(),
            line: number,
            refs: find_references(raw),
        }
    }
}

/// Split on any line-ending style (`\r\n`, `\n`, bare `\r`)
fn split_lines(text: &str) -> Vec<String> {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .split('\n')
        .map(str::to_string)
        .collect()
}

/// `SET`/`ADD`-style grammar: a name token, then the rest of the line
fn parse_name_and_value(rest: &str) -> Vec<Parameter> {
    let mut params = Vec::new();

    let (name, value_raw) = match rest.split_once(char::is_whitespace) {
        Some((name, value)) => (name, value.trim_start()),
        None => (rest, ""),
    };

    if !name.is_empty() {
        params.push(positional(name));
    }
    if !value_raw.is_empty() {
        params.push(positional(value_raw));
    }

    params
}

/// `PROMPT`-style grammar: the whole remainder is one positional value
fn parse_rest_of_line(rest: &str) -> Vec<Parameter> {
    if rest.is_empty() {
        Vec::new()
    } else {
        vec![positional(rest)]
    }
}

fn positional(raw: &str) -> Parameter {
    let value = unquote(raw);
    let refs = find_references(&value);
    Parameter {
        key: String::new(),
        value,
        raw_value: raw.to_string(),
        kind: ParamKind::Positional,
        refs,
    }
}

/// Split a parameter section into raw tokens, honoring double quotes
fn tokenize(rest: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = rest.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '\\' if in_quotes => {
                current.push(c);
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

/// Turn one raw token into a parameter
fn parse_token(token: String) -> Parameter {
    match token.split_once('=') {
        Some((key, raw_value)) => {
            let value = unquote(raw_value);
            let refs = find_references(&value);
            Parameter {
                key: key.to_string(),
                value,
                raw_value: raw_value.to_string(),
                kind: ParamKind::KeyValue,
                refs,
            }
        }
        None => Parameter {
            key: token.clone(),
            value: FLAG_VALUE.to_string(),
            raw_value: token,
            kind: ParamKind::Flag,
            refs: Vec::new(),
        },
    }
}

/// Strip one layer of double quotes and resolve escapes
///
/// Unquoted input is returned unchanged. Recognized escapes are `\"`,
/// `\\`, `\n` and `\t`; anything else keeps its backslash.
pub fn unquote(raw: &str) -> String {
    let inner = match raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) if raw.len() >= 2 => inner,
        _ => return raw.to_string(),
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
