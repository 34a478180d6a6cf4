//! Stable error-code contract
//!
//! Every failure the engine reports carries one of these signed codes.
//! The values are public API: hosts branch on them and stored results
//! reference them, so they must never change.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The fixed set of result codes
pub mod codes {
    /// Successful completion
    pub const OK: i32 = 1;

    // --- User-initiated ---
    /// Run aborted by the user
    pub const USER_ABORT: i32 = -101;
    /// Run stopped while suspended in pause or single-step
    pub const USER_STOP_WHILE_PAUSED: i32 = -102;

    // --- Syntax / parameter ---
    /// Command keyword not part of the vocabulary
    pub const UNKNOWN_COMMAND: i32 = -910;
    /// A required parameter is missing
    pub const MISSING_PARAMETER: i32 = -911;
    /// A parameter value failed validation
    pub const INVALID_PARAMETER: i32 = -912;
    /// Variable name outside the closed system set
    pub const UNSUPPORTED_VARIABLE: i32 = -914;
    /// Write attempted on a read-only system variable
    pub const READONLY_VARIABLE: i32 = -915;

    // --- Element / timeout ---
    /// Target element was not found
    pub const ELEMENT_NOT_FOUND: i32 = -920;
    /// Step timed out waiting for an element
    pub const STEP_TIMEOUT: i32 = -921;
    /// Page load timed out
    pub const PAGE_TIMEOUT: i32 = -922;

    // --- Download / file ---
    /// A download did not complete
    pub const DOWNLOAD_FAILED: i32 = -930;
    /// File could not be read or written
    pub const FILE_ACCESS: i32 = -931;

    // --- Script / datasource / loop ---
    /// Datasource referenced before one was loaded
    pub const DATASOURCE_NOT_LOADED: i32 = -950;
    /// Datasource line cursor outside the row table
    pub const DATASOURCE_LINE_RANGE: i32 = -951;
    /// Datasource column outside the active row
    pub const DATASOURCE_COLUMN_RANGE: i32 = -952;
    /// EVAL expression failed to evaluate
    pub const EVAL_ERROR: i32 = -991;

    // --- Generic runtime ---
    /// Uncaught error escaping a handler or the run loop
    pub const SCRIPT_ERROR: i32 = -1001;
}

/// Category a result code belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Ok,
    User,
    Syntax,
    Element,
    File,
    Script,
    Runtime,
}

impl ErrorCategory {
    /// Classify a result code
    pub fn of(code: i32) -> ErrorCategory {
        match code {
            1 => ErrorCategory::Ok,
            -102..=-101 => ErrorCategory::User,
            -915..=-910 => ErrorCategory::Syntax,
            -922..=-920 => ErrorCategory::Element,
            -931..=-930 => ErrorCategory::File,
            -991 | -952..=-950 => ErrorCategory::Script,
            _ => ErrorCategory::Runtime,
        }
    }
}

/// A macro-level failure: stable code, human message, optional source line
///
/// The line is the display-adjusted line when the error surfaced during a
/// run, absent for errors raised outside any command.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("macro error {code}: {message}")]
pub struct MacroError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<i32>,
}

impl MacroError {
    /// Create an error with no line attribution
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            line: None,
        }
    }

    /// Attach the display-adjusted source line
    pub fn at_line(mut self, line: i32) -> Self {
        self.line = Some(line);
        self
    }

    /// Category of this error's code
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::of(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_values_are_stable() {
        // Public contract; these assertions pin the exact values.
        assert_eq!(codes::OK, 1);
        assert_eq!(codes::USER_ABORT, -101);
        assert_eq!(codes::USER_STOP_WHILE_PAUSED, -102);
        assert_eq!(codes::UNKNOWN_COMMAND, -910);
        assert_eq!(codes::MISSING_PARAMETER, -911);
        assert_eq!(codes::INVALID_PARAMETER, -912);
        assert_eq!(codes::UNSUPPORTED_VARIABLE, -914);
        assert_eq!(codes::READONLY_VARIABLE, -915);
        assert_eq!(codes::ELEMENT_NOT_FOUND, -920);
        assert_eq!(codes::STEP_TIMEOUT, -921);
        assert_eq!(codes::PAGE_TIMEOUT, -922);
        assert_eq!(codes::DOWNLOAD_FAILED, -930);
        assert_eq!(codes::FILE_ACCESS, -931);
        assert_eq!(codes::DATASOURCE_NOT_LOADED, -950);
        assert_eq!(codes::DATASOURCE_LINE_RANGE, -951);
        assert_eq!(codes::DATASOURCE_COLUMN_RANGE, -952);
        assert_eq!(codes::EVAL_ERROR, -991);
        assert_eq!(codes::SCRIPT_ERROR, -1001);
    }

    #[test]
    fn test_categories_partition_codes() {
        assert_eq!(ErrorCategory::of(codes::OK), ErrorCategory::Ok);
        assert_eq!(ErrorCategory::of(codes::USER_ABORT), ErrorCategory::User);
        assert_eq!(
            ErrorCategory::of(codes::UNKNOWN_COMMAND),
            ErrorCategory::Syntax
        );
        assert_eq!(
            ErrorCategory::of(codes::READONLY_VARIABLE),
            ErrorCategory::Syntax
        );
        assert_eq!(
            ErrorCategory::of(codes::STEP_TIMEOUT),
            ErrorCategory::Element
        );
        assert_eq!(
            ErrorCategory::of(codes::DOWNLOAD_FAILED),
            ErrorCategory::File
        );
        assert_eq!(ErrorCategory::of(codes::EVAL_ERROR), ErrorCategory::Script);
        assert_eq!(
            ErrorCategory::of(codes::DATASOURCE_LINE_RANGE),
            ErrorCategory::Script
        );
        assert_eq!(
            ErrorCategory::of(codes::SCRIPT_ERROR),
            ErrorCategory::Runtime
        );
    }

    #[test]
    fn test_error_line_attribution() {
        let err = MacroError::new(codes::STEP_TIMEOUT, "element not found in time").at_line(4);
        assert_eq!(err.line, Some(4));
        assert_eq!(err.category(), ErrorCategory::Element);
        assert_eq!(
            err.to_string(),
            "macro error -921: element not found in time"
        );
    }
}
