//! Variable engine errors

use thiserror::Error;
use wm_core::{codes, MacroError};

/// Result type for variable operations
pub type VarResult<T> = Result<T, VarError>;

/// Errors raised by the variable & expression engine
#[derive(Debug, Clone, Error)]
pub enum VarError {
    #[error("unsupported variable: {0}")]
    Unsupported(String),

    #[error("variable {0} is read-only")]
    ReadOnly(String),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: String, reason: String },

    #[error("variable not defined: {0}")]
    Undefined(String),

    #[error("no datasource loaded")]
    DatasourceNotLoaded,

    #[error("datasource line {0} out of range")]
    DatasourceLine(usize),

    #[error("datasource column {0} out of range")]
    DatasourceColumn(usize),

    #[error("datasource load failed: {0}")]
    DatasourceLoad(String),

    #[error("eval failed: {0}")]
    Eval(String),

    /// The native-evaluation collaborator reported a macro-level error;
    /// this must terminate the running macro, not just fail the
    /// assignment.
    #[error(transparent)]
    Fatal(MacroError),
}

impl VarError {
    /// Stable result code for this error
    pub fn code(&self) -> i32 {
        match self {
            VarError::Unsupported(_) => codes::UNSUPPORTED_VARIABLE,
            VarError::ReadOnly(_) => codes::READONLY_VARIABLE,
            VarError::Invalid { .. } => codes::INVALID_PARAMETER,
            VarError::Undefined(_) => codes::EVAL_ERROR,
            VarError::DatasourceNotLoaded => codes::DATASOURCE_NOT_LOADED,
            VarError::DatasourceLine(_) => codes::DATASOURCE_LINE_RANGE,
            VarError::DatasourceColumn(_) => codes::DATASOURCE_COLUMN_RANGE,
            VarError::DatasourceLoad(_) => codes::FILE_ACCESS,
            VarError::Eval(_) => codes::EVAL_ERROR,
            VarError::Fatal(err) => err.code,
        }
    }

    /// True when this error must end the run regardless of error policy
    pub fn is_fatal(&self) -> bool {
        matches!(self, VarError::Fatal(_))
    }

    /// View as a MacroError with the mapped code
    pub fn to_macro_error(&self) -> MacroError {
        match self {
            VarError::Fatal(err) => err.clone(),
            other => MacroError::new(other.code(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_map_to_contract() {
        assert_eq!(
            VarError::Unsupported("!BOGUS".into()).code(),
            codes::UNSUPPORTED_VARIABLE
        );
        assert_eq!(
            VarError::ReadOnly("!NOW".into()).code(),
            codes::READONLY_VARIABLE
        );
        assert_eq!(VarError::DatasourceLine(9).code(), codes::DATASOURCE_LINE_RANGE);
        assert_eq!(VarError::Eval("x".into()).code(), codes::EVAL_ERROR);
    }

    #[test]
    fn test_fatal_preserves_inner_code() {
        let err = VarError::Fatal(MacroError::new(codes::SCRIPT_ERROR, "boom"));
        assert!(err.is_fatal());
        assert_eq!(err.code(), codes::SCRIPT_ERROR);
        assert_eq!(err.to_macro_error().message, "boom");
    }
}
