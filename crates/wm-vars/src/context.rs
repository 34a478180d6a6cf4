//! Variable context
//!
//! Owns the two-tier namespace: the closed system set with typed
//! defaults and validated writes, and the open custom namespace. Also
//! home to the extract accumulator, the loaded datasource and the
//! injected collaborator callbacks (datasource loader, live location
//! resolver, native-evaluation fallback, clipboard/prompt sources).
//!
//! The context is created once per executor and `reset()` between runs;
//! its identity is preserved so handler closures holding it stay valid.

use crate::datasource::Datasource;
use crate::error::{VarError, VarResult};
use crate::eval;
use crate::expand::{expand, ExpandOptions};
use crate::format;
use crate::system::{self, SystemVarDef};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use wm_core::{MacroError, VariableValue, EXTRACT_DELIMITER, SYSTEM_SIGIL};

/// Loads datasource content for a path-like spec
pub type DatasourceLoader = Arc<dyn Fn(&str) -> Result<String, String> + Send + Sync>;

/// Resolves the live current-location pseudo-variable
pub type LocationResolver = Arc<dyn Fn() -> String + Send + Sync>;

/// Native-evaluation fallback: expression text in, value or macro error
/// out. Kept narrow on purpose; the core never inlines dynamic code
/// execution.
pub type NativeEvaluator =
    Arc<dyn Fn(&str) -> Result<VariableValue, MacroError> + Send + Sync>;

/// No-argument external value source (clipboard-like store, prompt)
pub type ExternalSource = Arc<dyn Fn() -> String + Send + Sync>;

/// System + custom variable scope with the extract accumulator
#[derive(Default)]
pub struct VariableContext {
    system: HashMap<String, VariableValue>,
    custom: HashMap<String, VariableValue>,
    extract: Vec<String>,
    datasource: Option<Datasource>,
    datasource_loader: Option<DatasourceLoader>,
    location_resolver: Option<LocationResolver>,
    native_evaluator: Option<NativeEvaluator>,
    clipboard_source: Option<ExternalSource>,
    prompt_source: Option<ExternalSource>,
}

impl VariableContext {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Collaborator injection ---

    pub fn set_datasource_loader(&mut self, loader: DatasourceLoader) {
        self.datasource_loader = Some(loader);
    }

    pub fn set_location_resolver(&mut self, resolver: LocationResolver) {
        self.location_resolver = Some(resolver);
    }

    pub fn set_native_evaluator(&mut self, evaluator: NativeEvaluator) {
        self.native_evaluator = Some(evaluator);
    }

    pub fn set_clipboard_source(&mut self, source: ExternalSource) {
        self.clipboard_source = Some(source);
    }

    pub fn set_prompt_source(&mut self, source: ExternalSource) {
        self.prompt_source = Some(source);
    }

    // --- Reads ---

    /// Get a variable; system names always resolve, unset custom names
    /// yield `Null`
    pub fn get(&self, name: &str) -> VarResult<VariableValue> {
        self.get_with_format(name, None)
    }

    /// Get with an optional format suffix (only `!NOW` uses one)
    pub fn get_with_format(
        &self,
        name: &str,
        fmt: Option<&str>,
    ) -> VarResult<VariableValue> {
        if !name.starts_with(SYSTEM_SIGIL) {
            return Ok(self
                .custom
                .get(&name.to_ascii_uppercase())
                .cloned()
                .unwrap_or(VariableValue::Null));
        }

        let upper = name.to_ascii_uppercase();
        match upper.as_str() {
            "!NOW" => return Ok(VariableValue::Str(format::format_now(fmt))),
            "!URLCURRENT" => {
                if let Some(resolver) = &self.location_resolver {
                    return Ok(VariableValue::Str(resolver()));
                }
            }
            "!EXTRACT" => {
                return Ok(VariableValue::Str(self.extract_joined()));
            }
            "!DATASOURCE_COLUMNS" => {
                if let Some(ds) = &self.datasource {
                    let count = ds.column_count(self.datasource_line())?;
                    return Ok(VariableValue::Num(count as f64));
                }
            }
            _ => {}
        }

        if let Some(column) = system::column_accessor(&upper) {
            let ds = self
                .datasource
                .as_ref()
                .ok_or(VarError::DatasourceNotLoaded)?;
            let text = ds.column(self.datasource_line(), column)?;
            return Ok(VariableValue::Str(text.to_string()));
        }

        let def = system::lookup(&upper).ok_or_else(|| VarError::Unsupported(upper.clone()))?;
        Ok(self
            .system
            .get(def.name)
            .cloned()
            .unwrap_or_else(|| system::default_value(def)))
    }

    /// YES/NO toggle view of a variable
    pub fn flag(&self, name: &str) -> bool {
        self.get(name)
            .map(|v| v.as_text().eq_ignore_ascii_case("YES"))
            .unwrap_or(false)
    }

    /// Numeric view of a variable
    pub fn number(&self, name: &str) -> Option<f64> {
        self.get(name).ok().and_then(|v| v.as_number())
    }

    // --- Writes ---

    /// Set a variable; system writes are validated and may cascade
    pub fn set(&mut self, name: &str, value: VariableValue) -> VarResult<()> {
        if !name.starts_with(SYSTEM_SIGIL) {
            self.custom.insert(name.to_ascii_uppercase(), value);
            return Ok(());
        }

        let upper = name.to_ascii_uppercase();

        if system::column_accessor(&upper).is_some() {
            return Err(VarError::ReadOnly(upper));
        }

        match upper.as_str() {
            "!EXTRACT" => {
                // Single-slot assignment: reset the accumulator, then
                // append, so both views change together.
                self.extract.clear();
                self.extract.push(value.as_text());
                return Ok(());
            }
            "!EXTRACTADD" => {
                self.extract.push(value.as_text());
                return Ok(());
            }
            _ => {}
        }

        let def = system::lookup(&upper).ok_or_else(|| VarError::Unsupported(upper.clone()))?;
        if def.read_only {
            return Err(VarError::ReadOnly(upper));
        }
        def.validator.check(def.name, &value)?;

        match def.name {
            "!TIMEOUT_STEP" => {
                let step = value.as_number().unwrap_or(0.0);
                let tag = (step / 10.0).floor().max(1.0);
                self.system
                    .insert("!TIMEOUT_TAG".to_string(), VariableValue::Num(tag));
            }
            "!DATASOURCE" => {
                self.load_datasource(&value.as_text())?;
            }
            _ => {}
        }

        debug!(name = %def.name, value = %value, "Set system variable");
        self.system.insert(def.name.to_string(), value);
        Ok(())
    }

    /// Accumulate onto a variable using the macro coercion rules
    pub fn add(&mut self, name: &str, addend: VariableValue) -> VarResult<()> {
        let current = self.get(name)?;
        self.set(name, current.add(&addend))
    }

    fn load_datasource(&mut self, path: &str) -> VarResult<()> {
        if path.is_empty() {
            self.datasource = None;
            return Ok(());
        }
        let Some(loader) = &self.datasource_loader else {
            warn!(path, "No datasource loader injected; ignoring assignment");
            return Ok(());
        };
        let content = loader(path).map_err(VarError::DatasourceLoad)?;
        let delimiter = self.delimiter();
        let ds = Datasource::parse(&content, delimiter);
        debug!(path, rows = ds.row_count(), "Loaded datasource");
        self.datasource = Some(ds);
        Ok(())
    }

    fn delimiter(&self) -> char {
        self.get("!DATASOURCE_DELIMITER")
            .ok()
            .and_then(|v| v.as_text().chars().next())
            .unwrap_or(',')
    }

    fn datasource_line(&self) -> usize {
        self.number("!DATASOURCE_LINE")
            .map(|n| n as usize)
            .filter(|n| *n >= 1)
            .unwrap_or(1)
    }

    /// Directly loaded row table (tests, hosts with in-memory data)
    pub fn set_datasource(&mut self, datasource: Datasource) {
        self.datasource = Some(datasource);
    }

    pub fn has_datasource(&self) -> bool {
        self.datasource.is_some()
    }

    // --- Extract accumulator ---

    /// Append one extracted piece; both exposed views update together
    pub fn push_extract(&mut self, text: impl Into<String>) {
        self.extract.push(text.into());
    }

    /// Ordered extract entries
    pub fn extract_list(&self) -> &[String] {
        &self.extract
    }

    /// Delimiter-joined view of the accumulator
    pub fn extract_joined(&self) -> String {
        self.extract.join(EXTRACT_DELIMITER)
    }

    pub fn clear_extract(&mut self) {
        self.extract.clear();
    }

    // --- Expansion and SET values ---

    /// Expand `{{..}}` references with default options
    pub fn expand(&self, text: &str) -> VarResult<String> {
        expand(self, text, &ExpandOptions::default())
    }

    /// Expand with explicit options (resolver, default, strict mode)
    pub fn expand_with(&self, text: &str, opts: &ExpandOptions<'_>) -> VarResult<String> {
        expand(self, text, opts)
    }

    /// Resolve a SET/ADD value: `EVAL(..)` through the sandbox (with the
    /// injected native fallback), the reserved external-source keywords,
    /// or an expanded literal
    pub fn resolve_value(&self, raw: &str) -> VarResult<VariableValue> {
        let trimmed = raw.trim();

        if let Some(expr) = eval_body(trimmed) {
            let expanded = self.expand(expr)?;
            let stripped = strip_quote_layer(&expanded);
            return match eval::evaluate(&stripped) {
                Ok(value) => Ok(value.into_variable_value()),
                Err(err) => self.native_fallback(&stripped, err),
            };
        }

        match trimmed {
            "CLIPBOARD" => {
                return Ok(VariableValue::Str(match &self.clipboard_source {
                    Some(source) => source(),
                    None => {
                        warn!("No clipboard source injected; substituting empty string");
                        String::new()
                    }
                }))
            }
            "PROMPT" => {
                return Ok(VariableValue::Str(match &self.prompt_source {
                    Some(source) => source(),
                    None => {
                        warn!("No prompt source injected; substituting empty string");
                        String::new()
                    }
                }))
            }
            _ => {}
        }

        Ok(VariableValue::Str(self.expand(raw)?))
    }

    fn native_fallback(
        &self,
        expression: &str,
        sandbox_err: eval::EvalError,
    ) -> VarResult<VariableValue> {
        match &self.native_evaluator {
            Some(evaluator) => {
                debug!(%sandbox_err, "Sandbox could not resolve; trying native evaluator");
                match evaluator(expression) {
                    Ok(value) => Ok(value),
                    // A macro-level error from the collaborator must end
                    // the run, not just fail the assignment.
                    Err(err) => Err(VarError::Fatal(err)),
                }
            }
            None => {
                warn!(%sandbox_err, "No native evaluator; EVAL result defaults to 0");
                Ok(VariableValue::Num(0.0))
            }
        }
    }

    // --- Lifecycle ---

    /// Clear all state back to defaults; callbacks and object identity
    /// are preserved
    pub fn reset(&mut self) {
        self.system.clear();
        self.custom.clear();
        self.extract.clear();
        self.datasource = None;
    }

    /// Per-loop-iteration reset: only the designated variables (the
    /// extract accumulator), never the numbered or custom variables
    pub fn reset_per_loop(&mut self) {
        self.extract.clear();
    }

    /// Snapshot of every stored or defaulted variable
    ///
    /// Computed entries (`!NOW`, `!COL<n>`) are excluded; `!EXTRACT`
    /// reports the joined accumulator view.
    pub fn snapshot(&self) -> HashMap<String, VariableValue> {
        let mut out = HashMap::new();
        for def in system::SYSTEM_VARS {
            let value = match def.name {
                "!NOW" => continue,
                "!EXTRACT" => VariableValue::Str(self.extract_joined()),
                _ => self
                    .system
                    .get(def.name)
                    .cloned()
                    .unwrap_or_else(|| system::default_value(def)),
            };
            out.insert(def.name.to_string(), value);
        }
        for (name, value) in &self.custom {
            out.insert(name.clone(), value.clone());
        }
        out
    }

    /// Definitions of the closed system set (for hosts and tooling)
    pub fn system_definitions() -> &'static [SystemVarDef] {
        system::SYSTEM_VARS
    }
}

/// The inside of an `EVAL(..)` wrapper, if the value is one
fn eval_body(value: &str) -> Option<&str> {
    let upper = value.get(..5)?.to_ascii_uppercase();
    if upper != "EVAL(" || !value.ends_with(')') {
        return None;
    }
    Some(&value[5..value.len() - 1])
}

/// Strip one layer of optional quoting, unescaping interior quotes
fn strip_quote_layer(text: &str) -> String {
    let trimmed = text.trim();
    let quote = match trimmed.chars().next() {
        Some(c @ ('"' | '\'')) if trimmed.len() >= 2 && trimmed.ends_with(c) => c,
        _ => return trimmed.to_string(),
    };

    let inner = &trimmed[1..trimmed.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && matches!(chars.peek(), Some(&q) if q == quote || q == '\\') {
            out.push(chars.next().unwrap_or(quote));
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use wm_core::codes;

    #[test]
    fn test_system_get_never_absent() {
        let ctx = VariableContext::new();
        for def in VariableContext::system_definitions() {
            if def.name == "!NOW" {
                continue;
            }
            assert!(ctx.get(def.name).is_ok(), "{} should resolve", def.name);
        }
        assert_eq!(
            ctx.get("!TIMEOUT_PAGE").unwrap(),
            VariableValue::Str("60".to_string())
        );
    }

    #[test]
    fn test_unknown_system_name_rejected() {
        let mut ctx = VariableContext::new();
        assert!(matches!(
            ctx.set("!BOGUS", "x".into()),
            Err(VarError::Unsupported(_))
        ));
        assert!(matches!(ctx.get("!BOGUS"), Err(VarError::Unsupported(_))));
    }

    #[test]
    fn test_read_only_rejects_set() {
        let mut ctx = VariableContext::new();
        for name in ["!NOW", "!URLCURRENT", "!TIMEOUT_TAG", "!DATASOURCE_COLUMNS"] {
            assert!(
                matches!(ctx.set(name, "x".into()), Err(VarError::ReadOnly(_))),
                "{name} should be read-only"
            );
        }
    }

    #[test]
    fn test_validator_runs_before_mutation() {
        let mut ctx = VariableContext::new();
        assert!(ctx.set("!ERRORIGNORE", "MAYBE".into()).is_err());
        assert_eq!(
            ctx.get("!ERRORIGNORE").unwrap(),
            VariableValue::Str("NO".to_string())
        );
        assert!(ctx.set("!ERRORIGNORE", "YES".into()).is_ok());
        assert!(ctx.flag("!ERRORIGNORE"));
    }

    #[test]
    fn test_custom_namespace_is_open() {
        let mut ctx = VariableContext::new();
        assert_eq!(ctx.get("anything").unwrap(), VariableValue::Null);
        ctx.set("myvar", "42".into()).unwrap();
        assert_eq!(
            ctx.get("MYVAR").unwrap(),
            VariableValue::Str("42".to_string())
        );
    }

    #[test]
    fn test_extract_views_update_together() {
        let mut ctx = VariableContext::new();
        ctx.set("!EXTRACT", "first".into()).unwrap();
        ctx.set("!EXTRACTADD", "second".into()).unwrap();

        assert_eq!(ctx.extract_list(), &["first", "second"]);
        assert_eq!(
            ctx.get("!EXTRACT").unwrap().as_text(),
            format!("first{EXTRACT_DELIMITER}second")
        );

        // Single-slot assignment resets before appending.
        ctx.set("!EXTRACT", "only".into()).unwrap();
        assert_eq!(ctx.extract_list(), &["only"]);
    }

    #[test]
    fn test_timeout_step_cascades_to_tag() {
        let mut ctx = VariableContext::new();
        ctx.set("!TIMEOUT_STEP", "45".into()).unwrap();
        assert_eq!(ctx.get("!TIMEOUT_TAG").unwrap(), VariableValue::Num(4.0));

        // Floor has a minimum of 1.
        ctx.set("!TIMEOUT_STEP", "5".into()).unwrap();
        assert_eq!(ctx.get("!TIMEOUT_TAG").unwrap(), VariableValue::Num(1.0));
    }

    #[test]
    fn test_add_macro_rules() {
        let mut ctx = VariableContext::new();
        ctx.set("!VAR0", "10".into()).unwrap();
        ctx.add("!VAR0", "5".into()).unwrap();
        assert_eq!(ctx.get("!VAR0").unwrap(), VariableValue::Num(15.0));

        ctx.set("!VAR0", "prefix_".into()).unwrap();
        ctx.add("!VAR0", "abc".into()).unwrap();
        assert_eq!(
            ctx.get("!VAR0").unwrap(),
            VariableValue::Str("prefix_abc".to_string())
        );
    }

    #[test]
    fn test_datasource_columns_via_loader() {
        let mut ctx = VariableContext::new();
        ctx.set_datasource_loader(Arc::new(|path| {
            assert_eq!(path, "rows.csv");
            Ok("alpha,beta\ngamma,delta".to_string())
        }));

        ctx.set("!DATASOURCE", "rows.csv".into()).unwrap();
        assert_eq!(ctx.get("!COL1").unwrap().as_text(), "alpha");

        ctx.set("!DATASOURCE_LINE", "2".into()).unwrap();
        assert_eq!(ctx.get("!COL2").unwrap().as_text(), "delta");
        assert_eq!(
            ctx.get("!DATASOURCE_COLUMNS").unwrap(),
            VariableValue::Num(2.0)
        );
    }

    #[test]
    fn test_column_without_datasource_errors() {
        let ctx = VariableContext::new();
        assert!(matches!(
            ctx.get("!COL1"),
            Err(VarError::DatasourceNotLoaded)
        ));
    }

    #[test]
    fn test_column_accessors_are_read_only() {
        let mut ctx = VariableContext::new();
        assert!(matches!(
            ctx.set("!COL1", "x".into()),
            Err(VarError::ReadOnly(_))
        ));
    }

    #[test]
    fn test_location_resolver() {
        let mut ctx = VariableContext::new();
        assert_eq!(ctx.get("!URLCURRENT").unwrap().as_text(), "");
        ctx.set_location_resolver(Arc::new(|| "https://example.com/x".to_string()));
        assert_eq!(
            ctx.get("!URLCURRENT").unwrap().as_text(),
            "https://example.com/x"
        );
    }

    #[test]
    fn test_resolve_value_eval() {
        let ctx = VariableContext::new();
        assert_eq!(
            ctx.resolve_value("EVAL(\"1+2\")").unwrap(),
            VariableValue::Num(3.0)
        );
        assert_eq!(
            ctx.resolve_value("EVAL('\\'a\\'+1')").unwrap(),
            VariableValue::Str("a1".to_string())
        );
    }

    #[test]
    fn test_resolve_value_eval_expands_first() {
        let mut ctx = VariableContext::new();
        ctx.set("!VAR1", "7".into()).unwrap();
        assert_eq!(
            ctx.resolve_value("EVAL(\"{{!VAR1}}*2\")").unwrap(),
            VariableValue::Num(14.0)
        );
    }

    #[test]
    fn test_eval_unsupported_defaults_to_zero_without_native() {
        let ctx = VariableContext::new();
        assert_eq!(
            ctx.resolve_value("EVAL(\"mystery()\")").unwrap(),
            VariableValue::Num(0.0)
        );
    }

    #[test]
    fn test_native_fallback_value_and_fatal() {
        let mut ctx = VariableContext::new();
        ctx.set_native_evaluator(Arc::new(|expr| {
            if expr.contains("boom") {
                Err(MacroError::new(codes::SCRIPT_ERROR, "native failure"))
            } else {
                Ok(VariableValue::Str("native".to_string()))
            }
        }));

        assert_eq!(
            ctx.resolve_value("EVAL(\"mystery()\")").unwrap(),
            VariableValue::Str("native".to_string())
        );

        let err = ctx.resolve_value("EVAL(\"boom()\")").unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(err.code(), codes::SCRIPT_ERROR);
    }

    #[test]
    fn test_resolve_value_reserved_keywords() {
        let mut ctx = VariableContext::new();
        assert_eq!(ctx.resolve_value("CLIPBOARD").unwrap().as_text(), "");
        ctx.set_clipboard_source(Arc::new(|| "copied".to_string()));
        ctx.set_prompt_source(Arc::new(|| "typed".to_string()));
        assert_eq!(ctx.resolve_value("CLIPBOARD").unwrap().as_text(), "copied");
        assert_eq!(ctx.resolve_value("PROMPT").unwrap().as_text(), "typed");
    }

    #[test]
    fn test_resolve_value_literal_expands() {
        let mut ctx = VariableContext::new();
        ctx.set("name", "world".into()).unwrap();
        assert_eq!(
            ctx.resolve_value("hello {{name}}").unwrap().as_text(),
            "hello world"
        );
    }

    #[test]
    fn test_reset_clears_but_preserves_identity() {
        let mut ctx = VariableContext::new();
        ctx.set_clipboard_source(Arc::new(|| "kept".to_string()));
        ctx.set("!VAR1", "x".into()).unwrap();
        ctx.set("custom", "y".into()).unwrap();
        ctx.push_extract("z");

        ctx.reset();

        assert_eq!(ctx.get("!VAR1").unwrap().as_text(), "");
        assert_eq!(ctx.get("custom").unwrap(), VariableValue::Null);
        assert!(ctx.extract_list().is_empty());
        // Injected callbacks survive the reset.
        assert_eq!(ctx.resolve_value("CLIPBOARD").unwrap().as_text(), "kept");
    }

    #[test]
    fn test_per_loop_reset_spares_numbered_vars() {
        let mut ctx = VariableContext::new();
        ctx.set("!VAR3", "keep".into()).unwrap();
        ctx.push_extract("drop");

        ctx.reset_per_loop();

        assert_eq!(ctx.get("!VAR3").unwrap().as_text(), "keep");
        assert!(ctx.extract_list().is_empty());
    }

    #[test]
    fn test_snapshot_contains_both_tiers() {
        let mut ctx = VariableContext::new();
        ctx.set("!VAR1", "a".into()).unwrap();
        ctx.set("custom", "b".into()).unwrap();
        ctx.push_extract("c");

        let snap = ctx.snapshot();
        assert_eq!(snap.get("!VAR1").unwrap().as_text(), "a");
        assert_eq!(snap.get("CUSTOM").unwrap().as_text(), "b");
        assert_eq!(snap.get("!EXTRACT").unwrap().as_text(), "c");
        assert!(snap.contains_key("!TIMEOUT_PAGE"));
        assert!(!snap.contains_key("!NOW"));
    }
}
