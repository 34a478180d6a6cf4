//! Command serialization — the parser's left inverse
//!
//! Reproduces macro text from a parsed command. Raw values are preferred
//! so original quoting survives; flags collapse back to their bare
//! keyword form. `serialize(parse(line)) == line` holds for any accepted
//! command line up to whitespace normalization.

use crate::model::{ParamKind, Parameter, ParsedCommand};

/// Render a parsed command back to a single macro line
pub fn serialize_command(cmd: &ParsedCommand) -> String {
    let mut parts = vec![cmd.command.keyword().to_string()];
    parts.extend(cmd.parameters.iter().map(serialize_parameter));
    parts.join(" ")
}

fn serialize_parameter(param: &Parameter) -> String {
    match param.kind {
        ParamKind::Flag => param.key.clone(),
        ParamKind::Positional => value_text(param),
        ParamKind::KeyValue => format!("{}={}", param.key, value_text(param)),
    }
}

/// Raw value when available, otherwise the value re-quoted as needed
fn value_text(param: &Parameter) -> String {
    if !param.raw_value.is_empty() {
        return param.raw_value.clone();
    }
    quote_if_needed(&param.value)
}

fn quote_if_needed(value: &str) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c.is_whitespace() || c == '"' || c == '\\');
    if !needs_quotes {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
