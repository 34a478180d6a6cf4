//! Parsed macro data model
//!
//! Everything here is produced once by the parser and treated as
//! immutable afterwards; the executor and the variable engine only read
//! these structures.

use crate::command::CommandType;
use crate::varref::VariableReference;
use serde::{Deserialize, Serialize};

/// How a parameter was written in the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// `KEY=VALUE`
    KeyValue,
    /// A bare keyword, implicitly true
    Flag,
    /// A bare token consumed by position (e.g. the SET variable name)
    Positional,
}

/// One parameter of a command line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Key, empty for positional parameters; matching is case-insensitive
    pub key: String,
    /// Unquoted, unescaped value
    pub value: String,
    /// Original value text, quoting preserved
    pub raw_value: String,
    pub kind: ParamKind,
    /// References found inside the value
    pub refs: Vec<VariableReference>,
}

impl Parameter {
    /// True when this parameter is an implicit-true flag
    pub fn is_flag(&self) -> bool {
        self.kind == ParamKind::Flag
    }
}

/// A classified source line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedLine {
    /// 1-based physical line number
    pub number: usize,
    pub raw: String,
    pub kind: LineKind,
}

/// Classification of a source line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Empty,
    /// Comment text with the marker stripped
    Comment(String),
    Command(ParsedCommand),
}

/// A command line broken into structured parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedCommand {
    pub command: CommandType,
    /// Parameters in source order
    pub parameters: Vec<Parameter>,
    pub raw: String,
    /// 1-based physical line number
    pub line: usize,
    /// Every reference found anywhere on the line, in order
    pub refs: Vec<VariableReference>,
}

impl ParsedCommand {
    /// Look up a keyed parameter, case-insensitively
    pub fn param(&self, key: &str) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.kind != ParamKind::Positional && p.key.eq_ignore_ascii_case(key))
    }

    /// Value of a keyed parameter, case-insensitively
    pub fn param_value(&self, key: &str) -> Option<&str> {
        self.param(key).map(|p| p.value.as_str())
    }

    /// The n-th positional parameter (0-based)
    pub fn positional(&self, index: usize) -> Option<&Parameter> {
        self.parameters
            .iter()
            .filter(|p| p.kind == ParamKind::Positional)
            .nth(index)
    }

    /// True when a flag parameter with this name is present
    pub fn has_flag(&self, key: &str) -> bool {
        self.parameters
            .iter()
            .any(|p| p.kind == ParamKind::Flag && p.key.eq_ignore_ascii_case(key))
    }
}

/// A structural diagnostic; parsing never fails, it reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseError {
    /// 1-based physical line number
    pub line: usize,
    pub message: String,
    pub raw: String,
}

/// A fully parsed macro
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedMacro {
    /// All source lines in order, classified
    pub lines: Vec<ParsedLine>,
    /// Deduplicated references in first-appearance order
    pub variables: Vec<VariableReference>,
    /// Version declared by a leading VERSION command, if any
    pub version: Option<String>,
    /// Structural diagnostics collected during parsing/validation
    pub errors: Vec<ParseError>,
}

impl ParsedMacro {
    /// Command lines in source order
    pub fn commands(&self) -> impl Iterator<Item = &ParsedCommand> {
        self.lines.iter().filter_map(|l| match &l.kind {
            LineKind::Command(cmd) => Some(cmd),
            _ => None,
        })
    }

    /// Comment lines in source order
    pub fn comments(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().filter_map(|l| match &l.kind {
            LineKind::Comment(text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// Number of command lines
    pub fn command_count(&self) -> usize {
        self.commands().count()
    }

    /// True when validation produced no diagnostics
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}
