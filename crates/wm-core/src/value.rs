//! Variable value model
//!
//! Macro variables hold strings or numbers; an unset variable is `Null`,
//! which is distinct from the empty string. The ADD coercion rules live
//! here so the parser, the variable engine and the runner all agree on
//! them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value of a macro variable
///
/// `Null` means the variable was never written; the empty string means it
/// was written with no content. The two behave differently under ADD and
/// under expansion defaults, so the distinction is kept explicit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Null,
    Str(String),
    Num(f64),
}

impl VariableValue {
    /// True if the variable was never written
    pub fn is_null(&self) -> bool {
        matches!(self, VariableValue::Null)
    }

    /// True if the value is absent or an empty string
    pub fn is_empty(&self) -> bool {
        match self {
            VariableValue::Null => true,
            VariableValue::Str(s) => s.is_empty(),
            VariableValue::Num(_) => false,
        }
    }

    /// Numeric view of the value, if it has one
    ///
    /// Strings parse through `f64`; whitespace padding is accepted. An
    /// empty string is not numeric (emptiness is handled by the caller's
    /// coercion rules, not here).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            VariableValue::Null => None,
            VariableValue::Num(n) => Some(*n),
            VariableValue::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    trimmed.parse::<f64>().ok()
                }
            }
        }
    }

    /// String view of the value; `Null` renders as the empty string
    pub fn as_text(&self) -> String {
        self.to_string()
    }

    /// Accumulate `addend` onto this value using the macro coercion rules
    ///
    /// - an empty-string addend leaves the current value untouched
    /// - an empty or absent current value counts as 0 for a numeric addend
    /// - numeric + numeric is a numeric sum
    /// - anything else is string concatenation
    pub fn add(&self, addend: &VariableValue) -> VariableValue {
        if let VariableValue::Str(s) = addend {
            if s.is_empty() {
                return self.clone();
            }
        }
        if addend.is_null() {
            return self.clone();
        }

        match addend.as_number() {
            Some(rhs) => {
                if self.is_empty() {
                    return VariableValue::Num(rhs);
                }
                match self.as_number() {
                    Some(lhs) => VariableValue::Num(lhs + rhs),
                    None => VariableValue::Str(format!("{}{}", self, addend)),
                }
            }
            None => VariableValue::Str(format!("{}{}", self, addend)),
        }
    }
}

impl fmt::Display for VariableValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableValue::Null => Ok(()),
            VariableValue::Str(s) => f.write_str(s),
            VariableValue::Num(n) => {
                // Whole numbers print without a trailing ".0" so macro
                // text round-trips ("15", not "15.0").
                if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
        }
    }
}

impl From<&str> for VariableValue {
    fn from(s: &str) -> Self {
        VariableValue::Str(s.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(s: String) -> Self {
        VariableValue::Str(s)
    }
}

impl From<f64> for VariableValue {
    fn from(n: f64) -> Self {
        VariableValue::Num(n)
    }
}

impl From<i64> for VariableValue {
    fn from(n: i64) -> Self {
        VariableValue::Num(n as f64)
    }
}

impl Default for VariableValue {
    fn default() -> Self {
        VariableValue::Null
    }
}
