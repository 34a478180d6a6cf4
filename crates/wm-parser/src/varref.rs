//! Variable reference scanning
//!
//! Finds every `{{..}}` occurrence in a piece of macro text, recording
//! exact byte offsets so the expander can substitute right-to-left without
//! invalidating earlier positions. A backslash immediately before the
//! opening braces marks the occurrence as escaped; the scanner still
//! reports it so the expander can restore the literal braces.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use wm_core::SYSTEM_SIGIL;

static REFERENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{([^{}]+)\}\}").unwrap());

/// One `{{..}}` occurrence in macro text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableReference {
    /// Variable name without any format suffix (e.g. `!NOW`)
    pub name: String,
    /// True when the name carries the system sigil
    pub is_system: bool,
    /// Byte offset of the `{{` in the scanned text
    pub start: usize,
    /// Byte offset one past the closing `}}`
    pub end: usize,
    /// The full matched text, braces included
    pub text: String,
    /// Parametric suffix for format-driven names (`{{!NOW:yyyymmdd}}`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// True when a backslash immediately precedes the `{{`
    pub escaped: bool,
}

impl VariableReference {
    /// Uppercased name for case-insensitive lookup
    pub fn canonical(&self) -> String {
        self.name.to_ascii_uppercase()
    }
}

/// Scan `text` for variable references, in order of appearance
pub fn find_references(text: &str) -> Vec<VariableReference> {
    REFERENCE_RE
        .captures_iter(text)
        .map(|caps| {
            let m = caps.get(0).unwrap();
            let inner = caps.get(1).unwrap().as_str().trim();
            let is_system = inner.starts_with(SYSTEM_SIGIL);

            // Only system names support a format suffix; a colon inside a
            // custom name stays part of the name.
            let (name, format) = if is_system {
                match inner.split_once(':') {
                    Some((n, f)) => (n.to_string(), Some(f.to_string())),
                    None => (inner.to_string(), None),
                }
            } else {
                (inner.to_string(), None)
            };

            let escaped = text[..m.start()].ends_with('\\');

            VariableReference {
                name,
                is_system,
                start: m.start(),
                end: m.end(),
                text: m.as_str().to_string(),
                format,
                escaped,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finds_all_references_in_order() {
        let refs = find_references("URL GOTO={{base}}/item/{{!VAR1}}");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].name, "base");
        assert!(!refs[0].is_system);
        assert_eq!(refs[1].name, "!VAR1");
        assert!(refs[1].is_system);
    }

    #[test]
    fn test_offsets_cover_the_match() {
        let text = "ab{{x}}cd";
        let refs = find_references(text);
        assert_eq!(refs.len(), 1);
        assert_eq!(&text[refs[0].start..refs[0].end], "{{x}}");
        assert_eq!(refs[0].text, "{{x}}");
    }

    #[test]
    fn test_format_suffix_on_system_name() {
        let refs = find_references("{{!NOW:yyyymmdd_hhnnss}}");
        assert_eq!(refs[0].name, "!NOW");
        assert_eq!(refs[0].format.as_deref(), Some("yyyymmdd_hhnnss"));
    }

    #[test]
    fn test_colon_in_custom_name_is_not_a_format() {
        let refs = find_references("{{my:name}}");
        assert_eq!(refs[0].name, "my:name");
        assert_eq!(refs[0].format, None);
    }

    #[test]
    fn test_escaped_occurrence_is_flagged() {
        let refs = find_references(r"literal \{{keep}} and {{expand}}");
        assert_eq!(refs.len(), 2);
        assert!(refs[0].escaped);
        assert!(!refs[1].escaped);
    }

    #[test]
    fn test_no_references() {
        assert!(find_references("TAG POS=1 TYPE=A ATTR=TXT:x").is_empty());
    }

    #[test]
    fn test_whitespace_inside_braces_is_trimmed() {
        let refs = find_references("{{ name }}");
        assert_eq!(refs[0].name, "name");
    }
}
