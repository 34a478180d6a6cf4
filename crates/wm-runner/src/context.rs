//! Per-invocation handler context
//!
//! Handlers receive shared access to the variable engine, the execution
//! state and the run control through this context. The underlying
//! engine instance is reused across sequential runs, so handlers must
//! not retain clones beyond their own invocation, and must not hold a
//! guard across an await point.

use crate::control::RunControl;
use crate::state::ExecutionState;
use crate::sync::lock;
use std::sync::{Arc, Mutex, MutexGuard};
use wm_parser::ParsedCommand;
use wm_vars::VariableContext;

/// Everything a command handler gets to see for one dispatch
#[derive(Clone)]
pub struct ScriptContext {
    /// The command being executed
    pub command: ParsedCommand,
    pub vars: Arc<Mutex<VariableContext>>,
    pub state: Arc<Mutex<ExecutionState>>,
    pub control: Arc<RunControl>,
}

impl ScriptContext {
    /// Lock the variable engine for a short, non-awaiting section
    pub fn vars(&self) -> MutexGuard<'_, VariableContext> {
        lock(&self.vars)
    }

    /// Lock the execution state for a short, non-awaiting section
    pub fn state(&self) -> MutexGuard<'_, ExecutionState> {
        lock(&self.state)
    }
}
