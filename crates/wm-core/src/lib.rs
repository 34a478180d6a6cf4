//! Core types for the webmacro engine
//!
//! This crate provides the fundamental types shared by the parser, the
//! variable engine and the runner: VariableValue, the stable error-code
//! contract, CommandResult with its control directive, and MacroResult.

mod command;
mod error;
mod result;
mod value;

pub use command::{CommandResult, Control};
pub use error::{codes, ErrorCategory, MacroError};
pub use result::{MacroResult, MacroStatus, ProgressUpdate};
pub use value::VariableValue;

/// Sigil that marks a system variable name (e.g. `!TIMEOUT_STEP`)
pub const SYSTEM_SIGIL: char = '!';

/// Delimiter used when joining the extract accumulator into a single string
pub const EXTRACT_DELIMITER: &str = "[EXTRACT]";
