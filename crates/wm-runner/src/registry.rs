//! Command handler registry
//!
//! Maps command keywords to async handlers — the plugin boundary where
//! the host wires DOM interaction, image matching, file I/O and dialog
//! handling. Re-registering a keyword replaces its handler, which is
//! how built-ins are overridden; unregistered keywords fall back to the
//! executor's default warn-and-succeed handler.

use crate::context::ScriptContext;
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;
use wm_core::CommandResult;

/// Future type for async command handlers
pub type HandlerFuture = Pin<Box<dyn Future<Output = CommandResult> + Send>>;

/// Command handler function type
pub type CommandHandler = Arc<dyn Fn(ScriptContext) -> HandlerFuture + Send + Sync>;

/// Registry of command handlers, keyed by uppercase keyword
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: DashMap<String, CommandHandler>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a command keyword
    ///
    /// An existing handler for the same keyword is replaced.
    pub fn register<F, Fut>(&self, command: impl Into<String>, handler: F)
    where
        F: Fn(ScriptContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CommandResult> + Send + 'static,
    {
        let key = command.into().to_ascii_uppercase();
        debug!(command = %key, "Registering command handler");

        let handler: CommandHandler = Arc::new(move |ctx| Box::pin(handler(ctx)) as HandlerFuture);
        self.handlers.insert(key, handler);
    }

    /// Handler for a keyword, if one is registered
    pub fn get(&self, command: &str) -> Option<CommandHandler> {
        self.handlers
            .get(&command.to_ascii_uppercase())
            .map(|h| h.clone())
    }

    pub fn has_handler(&self, command: &str) -> bool {
        self.handlers.contains_key(&command.to_ascii_uppercase())
    }

    /// Remove a handler; returns whether one was present
    pub fn unregister(&self, command: &str) -> bool {
        self.handlers
            .remove(&command.to_ascii_uppercase())
            .is_some()
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::RunControl;
    use crate::state::ExecutionState;
    use std::sync::Mutex;
    use wm_parser::Parser;
    use wm_vars::VariableContext;

    fn test_context(line: &str) -> ScriptContext {
        ScriptContext {
            command: Parser::new().parse_command(line, 1),
            vars: Arc::new(Mutex::new(VariableContext::new())),
            state: Arc::new(Mutex::new(ExecutionState::new())),
            control: Arc::new(RunControl::new()),
        }
    }

    #[test]
    fn test_register_and_dispatch() {
        let registry = HandlerRegistry::new();
        registry.register("TAG", |ctx: ScriptContext| async move {
            CommandResult::ok_with_output(ctx.command.param_value("POS").unwrap_or("").to_string())
        });

        let handler = registry.get("tag").unwrap();
        let result = tokio_test::block_on(handler(test_context("TAG POS=3 TYPE=A")));
        assert!(result.success);
        assert_eq!(result.output.as_deref(), Some("3"));
    }

    #[test]
    fn test_reregistering_replaces() {
        let registry = HandlerRegistry::new();
        registry.register("TAG", |_| async { CommandResult::ok() });
        registry.register("TAG", |_| async {
            CommandResult::fail(wm_core::codes::ELEMENT_NOT_FOUND, "replaced")
        });

        assert_eq!(registry.handler_count(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = HandlerRegistry::new();
        registry.register("TAG", |_| async { CommandResult::ok() });

        assert!(registry.has_handler("TAG"));
        assert!(registry.unregister("tag"));
        assert!(!registry.has_handler("TAG"));
        assert!(!registry.unregister("TAG"));
    }
}
