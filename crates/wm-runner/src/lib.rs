//! Macro execution engine
//!
//! The stateful side of the system: the `Executor` drives the run loop
//! over a `ParsedMacro`, dispatching each command to a registered async
//! handler, applying control directives (jump/skip/stop) and the
//! configurable error policy, and supporting cooperative
//! pause/resume/single-step/abort. Handlers plug in through the
//! `HandlerRegistry`; the built-ins cover variable assignment, the
//! interruptible sleep, pause and the no-op declarations.

mod builtins;
mod context;
mod control;
mod executor;
mod profiler;
mod registry;
mod state;
mod sync;

pub use context::ScriptContext;
pub use control::{RunControl, Suspension};
pub use executor::{CleanupFn, Executor, ExecutorConfig, ProgressSink};
pub use profiler::{csv_line, ProfileEntry, ProfileSink, CSV_HEADER};
pub use registry::{CommandHandler, HandlerFuture, HandlerRegistry};
pub use state::{AsyncErrorSlot, ExecutionState};
