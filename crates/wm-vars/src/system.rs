//! System variable registry
//!
//! The closed, pre-registered set of `!`-sigil variables: typed defaults,
//! a read-only subset, and per-variable validators. `!COL<n>` accessors
//! are computed from the active datasource row and are not listed here.

use crate::error::{VarError, VarResult};
use wm_core::VariableValue;

/// Validation rule applied on every write to a system variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    /// Any value accepted
    Any,
    /// YES or NO (case-insensitive)
    BoolYesNo,
    /// Number ≥ 0
    NonNegativeNumber,
    /// Integer ≥ 1
    PositiveInteger,
    /// Exactly one character
    SingleChar,
    /// One of a fixed word list (case-insensitive)
    OneOf(&'static [&'static str]),
}

impl Validator {
    /// Check a candidate value against this rule
    pub fn check(&self, name: &str, value: &VariableValue) -> VarResult<()> {
        let fail = |reason: &str| {
            Err(VarError::Invalid {
                name: name.to_string(),
                reason: reason.to_string(),
            })
        };

        match self {
            Validator::Any => Ok(()),
            Validator::BoolYesNo => {
                let text = value.as_text().to_ascii_uppercase();
                if text == "YES" || text == "NO" {
                    Ok(())
                } else {
                    fail("expected YES or NO")
                }
            }
            Validator::NonNegativeNumber => match value.as_number() {
                Some(n) if n >= 0.0 => Ok(()),
                _ => fail("expected a non-negative number"),
            },
            Validator::PositiveInteger => match value.as_number() {
                Some(n) if n >= 1.0 && n.fract() == 0.0 => Ok(()),
                _ => fail("expected a positive integer"),
            },
            Validator::SingleChar => {
                if value.as_text().chars().count() == 1 {
                    Ok(())
                } else {
                    fail("expected a single character")
                }
            }
            Validator::OneOf(words) => {
                let text = value.as_text().to_ascii_uppercase();
                if words.iter().any(|w| *w == text) {
                    Ok(())
                } else {
                    fail(&format!("expected one of: {}", words.join(", ")))
                }
            }
        }
    }
}

/// Definition of one system variable
#[derive(Debug, Clone, Copy)]
pub struct SystemVarDef {
    pub name: &'static str,
    pub default: &'static str,
    pub read_only: bool,
    pub validator: Validator,
}

/// The closed system variable set
pub const SYSTEM_VARS: &[SystemVarDef] = &[
    // General-purpose numbered variables
    def("!VAR0"),
    def("!VAR1"),
    def("!VAR2"),
    def("!VAR3"),
    def("!VAR4"),
    def("!VAR5"),
    def("!VAR6"),
    def("!VAR7"),
    def("!VAR8"),
    def("!VAR9"),
    // Toggles
    SystemVarDef {
        name: "!ERRORIGNORE",
        default: "NO",
        read_only: false,
        validator: Validator::BoolYesNo,
    },
    SystemVarDef {
        name: "!ERRORLOOP",
        default: "NO",
        read_only: false,
        validator: Validator::BoolYesNo,
    },
    SystemVarDef {
        name: "!SINGLESTEP",
        default: "NO",
        read_only: false,
        validator: Validator::BoolYesNo,
    },
    SystemVarDef {
        name: "!EXTRACT_TEST_POPUP",
        default: "NO",
        read_only: false,
        validator: Validator::BoolYesNo,
    },
    // Looping
    SystemVarDef {
        name: "!LOOP",
        default: "1",
        read_only: false,
        validator: Validator::PositiveInteger,
    },
    // Timeouts (seconds)
    SystemVarDef {
        name: "!TIMEOUT_PAGE",
        default: "60",
        read_only: false,
        validator: Validator::NonNegativeNumber,
    },
    SystemVarDef {
        name: "!TIMEOUT_STEP",
        default: "6",
        read_only: false,
        validator: Validator::NonNegativeNumber,
    },
    // Derived from !TIMEOUT_STEP; writes are rejected
    SystemVarDef {
        name: "!TIMEOUT_TAG",
        default: "1",
        read_only: true,
        validator: Validator::Any,
    },
    SystemVarDef {
        name: "!REPLAYSPEED",
        default: "FAST",
        read_only: false,
        validator: Validator::OneOf(&["SLOW", "MEDIUM", "FAST"]),
    },
    // Datasource
    def("!DATASOURCE"),
    SystemVarDef {
        name: "!DATASOURCE_LINE",
        default: "1",
        read_only: false,
        validator: Validator::PositiveInteger,
    },
    SystemVarDef {
        name: "!DATASOURCE_COLUMNS",
        default: "0",
        read_only: true,
        validator: Validator::Any,
    },
    SystemVarDef {
        name: "!DATASOURCE_DELIMITER",
        default: ",",
        read_only: false,
        validator: Validator::SingleChar,
    },
    // Extract accumulator views
    def("!EXTRACT"),
    def("!EXTRACTADD"),
    // Computed
    SystemVarDef {
        name: "!URLCURRENT",
        default: "",
        read_only: true,
        validator: Validator::Any,
    },
    SystemVarDef {
        name: "!NOW",
        default: "",
        read_only: true,
        validator: Validator::Any,
    },
    // Host folders
    def("!FOLDER_DATASOURCE"),
    def("!FOLDER_DOWNLOAD"),
];

const fn def(name: &'static str) -> SystemVarDef {
    SystemVarDef {
        name,
        default: "",
        read_only: false,
        validator: Validator::Any,
    }
}

/// Look up a system variable definition by (case-insensitive) name
pub fn lookup(name: &str) -> Option<&'static SystemVarDef> {
    let upper = name.to_ascii_uppercase();
    SYSTEM_VARS.iter().find(|d| d.name == upper)
}

/// Parse a `!COL<n>` accessor name into its 1-based column number
pub fn column_accessor(name: &str) -> Option<usize> {
    let upper = name.to_ascii_uppercase();
    let rest = upper.strip_prefix("!COL")?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok().filter(|n: &usize| *n >= 1)
}

/// Default value of a system variable as a VariableValue
pub fn default_value(def: &SystemVarDef) -> VariableValue {
    VariableValue::Str(def.default.to_string())
}
