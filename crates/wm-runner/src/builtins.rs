//! Built-in command handlers
//!
//! The handlers that need no external capability: variable assignment
//! and accumulation, the interruptible sleep, the pause trigger, and
//! the no-op version/state-clear declarations. Everything else is the
//! host's business through the registry.

use crate::context::ScriptContext;
use crate::registry::HandlerRegistry;
use std::time::Duration;
use tracing::{debug, warn};
use wm_core::{codes, CommandResult, VariableValue};
use wm_vars::VarError;

/// Register every built-in into a registry
pub(crate) fn register_builtins(registry: &HandlerRegistry) {
    registry.register("SET", set_handler);
    registry.register("ADD", add_handler);
    registry.register("WAIT", wait_handler);
    registry.register("PAUSE", pause_handler);
    registry.register("VERSION", version_handler);
    registry.register("CLEAR", clear_handler);
}

/// `SET <name> <value>` — resolve the value (literal, reserved keyword
/// or `EVAL(..)`) and write it through the variable engine
async fn set_handler(ctx: ScriptContext) -> CommandResult {
    let Some((name, raw_value)) = name_and_value(&ctx) else {
        return CommandResult::fail(
            codes::MISSING_PARAMETER,
            "SET requires a variable name and a value",
        );
    };

    // The loop-counter variable only takes effect on the first
    // iteration; later assignments are a logged no-op.
    if name.eq_ignore_ascii_case("!LOOP") {
        return set_loop_counter(&ctx, &raw_value);
    }

    let resolved = match ctx.vars().resolve_value(&raw_value) {
        Ok(value) => value,
        Err(err) => return failed_resolution(err),
    };

    if let Err(err) = ctx.vars().set(&name, resolved) {
        return CommandResult::fail(err.code(), err.to_string());
    }

    mirror_toggles(&ctx, &name);
    CommandResult::ok()
}

/// `ADD <name> <value>` — accumulate using the macro coercion rules
async fn add_handler(ctx: ScriptContext) -> CommandResult {
    let Some((name, raw_value)) = name_and_value(&ctx) else {
        return CommandResult::fail(
            codes::MISSING_PARAMETER,
            "ADD requires a variable name and a value",
        );
    };

    let resolved = match ctx.vars().resolve_value(&raw_value) {
        Ok(value) => value,
        Err(err) => return failed_resolution(err),
    };

    if let Err(err) = ctx.vars().add(&name, resolved) {
        return CommandResult::fail(err.code(), err.to_string());
    }

    mirror_toggles(&ctx, &name);
    CommandResult::ok()
}

/// `WAIT SECONDS=<n>` — interruptible sleep; `stop()` cuts it short
async fn wait_handler(ctx: ScriptContext) -> CommandResult {
    let Some(raw) = ctx.command.param_value("SECONDS").map(str::to_string) else {
        return CommandResult::fail(codes::MISSING_PARAMETER, "WAIT requires SECONDS");
    };

    let expanded = match ctx.vars().expand(&raw) {
        Ok(text) => text,
        Err(err) => return CommandResult::fail(err.code(), err.to_string()),
    };

    let seconds: f64 = match expanded.trim().parse() {
        Ok(n) if n >= 0.0 => n,
        _ => {
            return CommandResult::fail(
                codes::INVALID_PARAMETER,
                format!("WAIT SECONDS must be a non-negative number, got '{expanded}'"),
            )
        }
    };

    debug!(seconds, "Waiting");
    ctx.control
        .interruptible_delay(Duration::from_secs_f64(seconds))
        .await;
    // An abort mid-wait is observed by the run loop at the next
    // suspension point; the wait itself still reports success.
    CommandResult::ok()
}

/// `PAUSE` — the run suspends before the next command until `resume()`
async fn pause_handler(ctx: ScriptContext) -> CommandResult {
    debug!("Macro requested pause");
    ctx.control.pause();
    CommandResult::ok()
}

/// `VERSION BUILD=..` — declaration only
async fn version_handler(_ctx: ScriptContext) -> CommandResult {
    CommandResult::ok()
}

/// `CLEAR` — browsing-state reset belongs to the host; the core
/// acknowledges and moves on
async fn clear_handler(ctx: ScriptContext) -> CommandResult {
    debug!(line = ctx.command.line, "CLEAR acknowledged");
    CommandResult::ok()
}

// --- helpers ---

fn name_and_value(ctx: &ScriptContext) -> Option<(String, String)> {
    let name = ctx.command.positional(0)?.value.clone();
    let value = ctx.command.positional(1)?.value.clone();
    Some((name, value))
}

fn failed_resolution(err: VarError) -> CommandResult {
    if err.is_fatal() {
        let inner = err.to_macro_error();
        CommandResult::fail_fatal(inner.code, inner.message)
    } else {
        CommandResult::fail(err.code(), err.to_string())
    }
}

/// Assign the loop counter, honoring the first-iteration-only guard
fn set_loop_counter(ctx: &ScriptContext, raw_value: &str) -> CommandResult {
    let first_iteration = ctx.state().loop_counter <= 1;
    if !first_iteration {
        debug!("SET !LOOP ignored after the first iteration");
        return CommandResult::ok();
    }

    let resolved = match ctx.vars().resolve_value(raw_value) {
        Ok(value) => value,
        Err(err) => return failed_resolution(err),
    };

    let Some(start) = resolved.as_number().filter(|n| *n >= 1.0 && n.fract() == 0.0) else {
        return CommandResult::fail(
            codes::INVALID_PARAMETER,
            format!("!LOOP expects a positive integer, got '{resolved}'"),
        );
    };

    if let Err(err) = ctx.vars().set("!LOOP", VariableValue::Num(start)) {
        return CommandResult::fail(err.code(), err.to_string());
    }
    ctx.state().loop_counter = start as u32;
    CommandResult::ok()
}

/// Keep the run-control toggles in sync with their mirror variables
fn mirror_toggles(ctx: &ScriptContext, name: &str) {
    if name.eq_ignore_ascii_case("!SINGLESTEP") {
        let enabled = ctx.vars().flag("!SINGLESTEP");
        ctx.control.set_single_step(enabled);
        if enabled {
            warn!("Single-step mode enabled from the macro");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::RunControl;
    use crate::state::ExecutionState;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;
    use wm_parser::Parser;
    use wm_vars::VariableContext;

    fn ctx_for(line: &str) -> ScriptContext {
        let control = RunControl::new();
        control.begin_run();
        ScriptContext {
            command: Parser::new().parse_command(line, 1),
            vars: Arc::new(Mutex::new(VariableContext::new())),
            state: Arc::new(Mutex::new(ExecutionState::new())),
            control: Arc::new(control),
        }
    }

    #[tokio::test]
    async fn test_set_literal() {
        let ctx = ctx_for("SET !VAR1 hello");
        assert!(set_handler(ctx.clone()).await.success);
        assert_eq!(ctx.vars().get("!VAR1").unwrap().as_text(), "hello");
    }

    #[tokio::test]
    async fn test_set_eval() {
        let ctx = ctx_for("SET !VAR1 EVAL(\"1+2\")");
        assert!(set_handler(ctx.clone()).await.success);
        assert_eq!(
            ctx.vars().get("!VAR1").unwrap(),
            VariableValue::Num(3.0)
        );
    }

    #[tokio::test]
    async fn test_set_rejects_unknown_system_variable() {
        let ctx = ctx_for("SET !NOPE x");
        let result = set_handler(ctx).await;
        assert!(!result.success);
        assert_eq!(result.code, codes::UNSUPPORTED_VARIABLE);
    }

    #[tokio::test]
    async fn test_set_rejects_read_only() {
        let ctx = ctx_for("SET !NOW x");
        let result = set_handler(ctx).await;
        assert!(!result.success);
        assert_eq!(result.code, codes::READONLY_VARIABLE);
    }

    #[tokio::test]
    async fn test_add_numeric_then_string() {
        let ctx = ctx_for("ADD !VAR0 5");
        ctx.vars().set("!VAR0", "10".into()).unwrap();
        assert!(add_handler(ctx.clone()).await.success);
        assert_eq!(ctx.vars().get("!VAR0").unwrap(), VariableValue::Num(15.0));

        let ctx2 = ctx_for("ADD !VAR0 abc");
        ctx2.vars().set("!VAR0", "prefix_".into()).unwrap();
        assert!(add_handler(ctx2.clone()).await.success);
        assert_eq!(
            ctx2.vars().get("!VAR0").unwrap().as_text(),
            "prefix_abc"
        );
    }

    #[tokio::test]
    async fn test_set_loop_guard() {
        let ctx = ctx_for("SET !LOOP 5");
        assert!(set_handler(ctx.clone()).await.success);
        assert_eq!(ctx.state().loop_counter, 5);

        // Second iteration: assignment is a no-op success.
        let ctx2 = ctx_for("SET !LOOP 9");
        ctx2.state().loop_counter = 2;
        assert!(set_handler(ctx2.clone()).await.success);
        assert_eq!(ctx2.state().loop_counter, 2);
    }

    #[tokio::test]
    async fn test_wait_requires_valid_seconds() {
        let result = wait_handler(ctx_for("WAIT")).await;
        assert_eq!(result.code, codes::MISSING_PARAMETER);

        let result = wait_handler(ctx_for("WAIT SECONDS=abc")).await;
        assert_eq!(result.code, codes::INVALID_PARAMETER);

        let result = wait_handler(ctx_for("WAIT SECONDS=-1")).await;
        assert_eq!(result.code, codes::INVALID_PARAMETER);
    }

    #[tokio::test]
    async fn test_wait_sleeps_expanded_duration() {
        let ctx = ctx_for("WAIT SECONDS={{!VAR1}}");
        ctx.vars().set("!VAR1", "0.15".into()).unwrap();

        let start = Instant::now();
        assert!(wait_handler(ctx).await.success);
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_pause_sets_control() {
        let ctx = ctx_for("PAUSE");
        assert!(pause_handler(ctx.clone()).await.success);
        assert!(ctx.control.is_paused());
    }

    #[tokio::test]
    async fn test_set_singlestep_mirrors_into_control() {
        let ctx = ctx_for("SET !SINGLESTEP YES");
        assert!(set_handler(ctx.clone()).await.success);
        assert!(ctx.control.is_single_step());
    }
}
