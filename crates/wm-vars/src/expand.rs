//! `{{..}}` string interpolation
//!
//! Substitution walks the parser's reference list right-to-left so the
//! recorded offsets of earlier references stay valid while later ones
//! are replaced. Resolution order per reference: injected resolver,
//! then context lookup, then the caller default; in strict mode a
//! reference nothing resolves is an error, otherwise it is left
//! verbatim. A backslash before `{{` suppresses expansion for that
//! occurrence — the backslash is consumed and the braces kept, even on
//! text with no other references.

use crate::context::VariableContext;
use crate::error::{VarError, VarResult};
use wm_core::VariableValue;
use wm_parser::find_references;

/// Options controlling one expansion pass
#[derive(Default)]
pub struct ExpandOptions<'a> {
    /// Tried before the context; lets handlers inject transient values
    pub resolver: Option<&'a dyn Fn(&str) -> Option<String>>,
    /// Substituted when nothing else resolves a reference
    pub default: Option<&'a str>,
    /// Unresolved references become errors instead of staying verbatim
    pub strict: bool,
}

/// Expand every reference in `text` against the given context
pub fn expand(
    ctx: &VariableContext,
    text: &str,
    opts: &ExpandOptions<'_>,
) -> VarResult<String> {
    let refs = find_references(text);
    if refs.is_empty() {
        return Ok(text.to_string());
    }

    let mut out = text.to_string();

    for reference in refs.iter().rev() {
        if reference.escaped {
            // Drop the escaping backslash, keep the braces literally.
            out.replace_range(reference.start - 1..reference.start, "");
            continue;
        }

        let resolved = resolve(ctx, opts, reference)?;
        match resolved {
            Some(value) => out.replace_range(reference.start..reference.end, &value),
            None => {
                if let Some(default) = opts.default {
                    out.replace_range(reference.start..reference.end, default);
                } else if opts.strict {
                    return Err(VarError::Undefined(reference.name.clone()));
                }
                // Otherwise leave the reference verbatim.
            }
        }
    }

    Ok(out)
}

fn resolve(
    ctx: &VariableContext,
    opts: &ExpandOptions<'_>,
    reference: &wm_parser::VariableReference,
) -> VarResult<Option<String>> {
    if let Some(resolver) = opts.resolver {
        if let Some(value) = resolver(&reference.name) {
            return Ok(Some(value));
        }
    }

    match ctx.get_with_format(&reference.name, reference.format.as_deref()) {
        Ok(VariableValue::Null) => Ok(None),
        Ok(value) => Ok(Some(value.as_text())),
        // An unknown system name is "absent" for expansion purposes;
        // datasource errors are real and propagate.
        Err(VarError::Unsupported(_)) => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> VariableContext {
        let mut ctx = VariableContext::new();
        ctx.set("!VAR1", "one".into()).unwrap();
        ctx.set("name", "world".into()).unwrap();
        ctx
    }

    #[test]
    fn test_expand_no_references_is_identity() {
        let text = "TAG POS=1 TYPE=A ATTR=TXT:x";
        assert_eq!(ctx().expand(text).unwrap(), text);
    }

    #[test]
    fn test_expand_is_idempotent_on_resolved_text() {
        let ctx = ctx();
        let once = ctx.expand("hello {{name}}").unwrap();
        assert_eq!(once, "hello world");
        assert_eq!(ctx.expand(&once).unwrap(), once);
    }

    #[test]
    fn test_multiple_references_substituted_in_place() {
        assert_eq!(
            ctx().expand("{{!VAR1}}-{{name}}-{{!VAR1}}").unwrap(),
            "one-world-one"
        );
    }

    #[test]
    fn test_resolver_takes_precedence() {
        let ctx = ctx();
        let resolver = |name: &str| {
            if name == "name" {
                Some("override".to_string())
            } else {
                None
            }
        };
        let opts = ExpandOptions {
            resolver: Some(&resolver),
            ..Default::default()
        };
        assert_eq!(
            ctx.expand_with("{{name}} {{!VAR1}}", &opts).unwrap(),
            "override one"
        );
    }

    #[test]
    fn test_default_substitutes_missing() {
        let ctx = ctx();
        let opts = ExpandOptions {
            default: Some(""),
            ..Default::default()
        };
        assert_eq!(ctx.expand_with("[{{missing}}]", &opts).unwrap(), "[]");
    }

    #[test]
    fn test_strict_mode_raises_on_missing() {
        let ctx = ctx();
        let opts = ExpandOptions {
            strict: true,
            ..Default::default()
        };
        assert!(matches!(
            ctx.expand_with("{{missing}}", &opts),
            Err(VarError::Undefined(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_lenient_mode_leaves_missing_verbatim() {
        assert_eq!(ctx().expand("x {{missing}} y").unwrap(), "x {{missing}} y");
    }

    #[test]
    fn test_escape_suppresses_expansion() {
        assert_eq!(
            ctx().expand(r"keep \{{name}} expand {{name}}").unwrap(),
            "keep {{name}} expand world"
        );
    }

    #[test]
    fn test_escape_restored_without_other_references() {
        assert_eq!(ctx().expand(r"only \{{name}} here").unwrap(), "only {{name}} here");
    }

    #[test]
    fn test_system_reference_with_format() {
        let ctx = ctx();
        let expanded = ctx.expand("{{!NOW:yyyy}}").unwrap();
        assert_eq!(expanded.len(), 4);
        assert!(expanded.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_datasource_error_propagates() {
        let ctx = ctx();
        assert!(matches!(
            ctx.expand("{{!COL1}}"),
            Err(VarError::DatasourceNotLoaded)
        ));
    }

    #[test]
    fn test_unknown_system_reference_stays_verbatim() {
        assert_eq!(ctx().expand("{{!BOGUS}}").unwrap(), "{{!BOGUS}}");
    }
}
