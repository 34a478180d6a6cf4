//! Variable & expression engine
//!
//! Owns the macro variable scope: the closed system-variable set with
//! typed defaults and validated writes, the open custom namespace, the
//! ordered extract accumulator, datasource column accessors, `{{..}}`
//! interpolation and the sandboxed `EVAL(..)` expression evaluator.
//!
//! Collaborators (datasource loader, live location resolver, native
//! evaluation, clipboard/prompt sources) are injected callbacks — the
//! engine itself performs no I/O and can never run arbitrary code.

mod context;
mod datasource;
mod error;
mod eval;
mod expand;
mod format;
mod system;

pub use context::{
    DatasourceLoader, ExternalSource, LocationResolver, NativeEvaluator, VariableContext,
};
pub use datasource::Datasource;
pub use error::{VarError, VarResult};
pub use eval::{evaluate, EvalError, EvalValue};
pub use expand::ExpandOptions;
pub use format::{format_now, format_timestamp, DEFAULT_NOW_FORMAT};
pub use system::{column_accessor, SystemVarDef, Validator, SYSTEM_VARS};
