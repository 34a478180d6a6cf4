//! Run-level result and progress types

use crate::value::VariableValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle state of a run
///
/// `Idle` is the initial state; the terminal states return to `Running`
/// only through a fresh `execute()`. `Paused` is reachable only from
/// `Running` and leaves only to `Running` or `Aborted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    Error,
    Aborted,
}

impl MacroStatus {
    /// True for states a run cannot leave without a new `execute()`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MacroStatus::Completed | MacroStatus::Error | MacroStatus::Aborted
        )
    }
}

/// Snapshot emitted before every command dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Run correlation id
    pub run_id: String,
    /// Display-adjusted line about to execute
    pub line: i32,
    /// Total command-bearing lines in the macro
    pub total_lines: usize,
    /// Current loop iteration (1-based)
    pub loop_index: u32,
    pub max_loops: u32,
    pub status: MacroStatus,
}

/// Final outcome of one `execute()` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroResult {
    pub success: bool,
    /// Stable result code (`codes::OK` on success)
    pub code: i32,
    pub message: String,
    /// Display-adjusted line of the failing command, when applicable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_line: Option<i32>,
    pub loops_completed: u32,
    /// Wall-clock duration of the run in milliseconds
    pub elapsed_ms: u64,
    /// Ordered extract accumulator at run end
    pub extract: Vec<String>,
    /// Snapshot of every variable (system and custom) at run end
    pub variables: HashMap<String, VariableValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!MacroStatus::Idle.is_terminal());
        assert!(!MacroStatus::Running.is_terminal());
        assert!(!MacroStatus::Paused.is_terminal());
        assert!(MacroStatus::Completed.is_terminal());
        assert!(MacroStatus::Error.is_terminal());
        assert!(MacroStatus::Aborted.is_terminal());
    }

    #[test]
    fn test_result_round_trips_through_json() {
        let result = MacroResult {
            success: true,
            code: crate::codes::OK,
            message: "completed".to_string(),
            error_line: None,
            loops_completed: 3,
            elapsed_ms: 1250,
            extract: vec!["a".to_string(), "b".to_string()],
            variables: HashMap::from([(
                "!VAR1".to_string(),
                VariableValue::Str("x".to_string()),
            )]),
        };

        let json = serde_json::to_string(&result).unwrap();
        let back: MacroResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
