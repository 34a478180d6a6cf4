//! Per-command profiling
//!
//! When profiling is enabled the executor records one entry per
//! dispatched command, mirrors the trace into the execution state and
//! hands each entry to the optional CSV append sink.

use std::sync::Arc;

/// One profiled command dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileEntry {
    /// Physical 1-based source line
    pub line: usize,
    /// Command keyword
    pub command: String,
    /// Milliseconds since run start when dispatch began
    pub offset_ms: u64,
    /// Dispatch duration in milliseconds
    pub duration_ms: u64,
}

/// Sink receiving each entry as it is recorded (e.g. a CSV appender)
pub type ProfileSink = Arc<dyn Fn(&ProfileEntry) + Send + Sync>;

/// Header matching [`csv_line`] output
pub const CSV_HEADER: &str = "line,command,offset_ms,duration_ms";

/// Render an entry as one CSV row
pub fn csv_line(entry: &ProfileEntry) -> String {
    format!(
        "{},{},{},{}",
        entry.line, entry.command, entry.offset_ms, entry.duration_ms
    )
}
