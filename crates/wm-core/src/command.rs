//! Handler result and control directives

use crate::error::{codes, MacroError};
use serde::{Deserialize, Serialize};

/// Control directive a handler can attach to its result
///
/// Modeled as a tagged union so the run loop's dispatch is exhaustive:
/// adding a directive is a compile error everywhere it is not handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    /// Proceed to the next command
    #[default]
    Continue,
    /// Abandon the remainder of this loop iteration (not an error)
    SkipLoop,
    /// Terminate the whole run successfully
    Stop,
    /// Continue at the given 1-based line
    JumpToLine(usize),
}

/// Outcome of a single command dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Handler output (e.g. extracted text) for the host to observe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default)]
    pub control: Control,
    /// Non-recoverable failure: terminates the run even under the
    /// ignore or skip-to-next-loop error policies
    #[serde(default)]
    pub fatal: bool,
}

impl CommandResult {
    /// Plain success, continue with the next command
    pub fn ok() -> Self {
        Self {
            success: true,
            code: codes::OK,
            message: None,
            output: None,
            control: Control::Continue,
            fatal: false,
        }
    }

    /// Success carrying handler output
    pub fn ok_with_output(output: impl Into<String>) -> Self {
        Self {
            output: Some(output.into()),
            ..Self::ok()
        }
    }

    /// Success that terminates the run
    pub fn stop() -> Self {
        Self {
            control: Control::Stop,
            ..Self::ok()
        }
    }

    /// Success that abandons the rest of this loop iteration
    pub fn skip_loop() -> Self {
        Self {
            control: Control::SkipLoop,
            ..Self::ok()
        }
    }

    /// Success that redirects execution to a 1-based line
    pub fn jump_to_line(line: usize) -> Self {
        Self {
            control: Control::JumpToLine(line),
            ..Self::ok()
        }
    }

    /// Failure with a stable code and message
    pub fn fail(code: i32, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            message: Some(message.into()),
            output: None,
            control: Control::Continue,
            fatal: false,
        }
    }

    /// Failure that no error policy can ignore
    pub fn fail_fatal(code: i32, message: impl Into<String>) -> Self {
        Self {
            fatal: true,
            ..Self::fail(code, message)
        }
    }

    /// View of a failed result as a MacroError
    pub fn as_error(&self) -> Option<MacroError> {
        if self.success {
            return None;
        }
        Some(MacroError::new(
            self.code,
            self.message.clone().unwrap_or_else(|| "command failed".to_string()),
        ))
    }
}

impl From<MacroError> for CommandResult {
    fn from(err: MacroError) -> Self {
        CommandResult::fail(err.code, err.message)
    }
}
