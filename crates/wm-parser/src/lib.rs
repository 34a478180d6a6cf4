//! Macro script parser
//!
//! Turns line-oriented macro text into a structured `ParsedMacro`: lines
//! classified as commands, comments or blanks; parameters split with
//! quoting and escapes resolved; every `{{..}}` variable reference located
//! with exact offsets. Parsing is a pure function with no side effects —
//! structural problems are reported as diagnostics, never thrown.

mod command;
mod model;
mod parse;
mod serialize;
mod validate;
mod varref;

pub use command::{CommandType, ParamRule};
pub use model::{
    LineKind, Parameter, ParamKind, ParseError, ParsedCommand, ParsedLine, ParsedMacro,
};
pub use parse::{unquote, Parser, COMMENT_MARKER, FLAG_VALUE};
pub use serialize::serialize_command;
pub use validate::validate_command;
pub use varref::{find_references, VariableReference};
