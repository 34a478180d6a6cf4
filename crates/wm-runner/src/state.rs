//! Execution state
//!
//! A shared mutable record the run loop and handlers both see: current
//! line, loop counters, status, the extract mirror, the optional
//! profiler trace and the pending-async-error slot through which
//! out-of-band collaborators (e.g. a download watcher) report a fatal
//! condition observed at the loop's next yield point.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use wm_core::{MacroError, MacroStatus};

use crate::profiler::ProfileEntry;

/// Cloneable handle for delivering an asynchronous error into a run
///
/// Collaborators keep a clone and `raise()` at any time; the run loop
/// `take()`s at its next yield point and applies the normal error
/// policy.
#[derive(Clone, Default)]
pub struct AsyncErrorSlot(Arc<Mutex<Option<MacroError>>>);

impl AsyncErrorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error; an earlier undelivered error is kept
    pub fn raise(&self, error: MacroError) {
        let mut slot = lock_ignore_poison(&self.0);
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    /// Take the pending error, leaving the slot empty
    pub fn take(&self) -> Option<MacroError> {
        lock_ignore_poison(&self.0).take()
    }

    pub fn clear(&self) {
        lock_ignore_poison(&self.0).take();
    }

    pub fn is_set(&self) -> bool {
        lock_ignore_poison(&self.0).is_some()
    }
}

fn lock_ignore_poison<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Mutable bookkeeping for one run
#[derive(Clone, Default)]
pub struct ExecutionState {
    /// Correlation id stamped at `execute()` entry
    pub run_id: String,
    /// Physical 1-based line of the command being executed
    pub current_line: usize,
    /// Number of command lines in the macro
    pub total_lines: usize,
    /// Current loop iteration (1-based, monotonic within a run)
    pub loop_counter: u32,
    pub max_loops: u32,
    pub status: MacroStatus,
    pub started_at: Option<DateTime<Utc>>,
    /// Mirror of the variable engine's extract accumulator
    pub extract: Vec<String>,
    /// Per-command trace when profiling is enabled
    pub profile: Option<Vec<ProfileEntry>>,
    /// Slot for errors observed outside the run loop
    pub pending: AsyncErrorSlot,
}

impl ExecutionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset for a fresh `execute()`; the pending slot handle survives
    /// but its content is dropped
    pub fn reset(&mut self, run_id: String, total_lines: usize, max_loops: u32, profiling: bool) {
        self.run_id = run_id;
        self.current_line = 0;
        self.total_lines = total_lines;
        self.loop_counter = 1;
        self.max_loops = max_loops;
        self.status = MacroStatus::Running;
        self.started_at = Some(Utc::now());
        self.extract.clear();
        self.profile = profiling.then(Vec::new);
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wm_core::codes;

    #[test]
    fn test_async_slot_keeps_first_error() {
        let slot = AsyncErrorSlot::new();
        assert!(!slot.is_set());

        slot.raise(MacroError::new(codes::DOWNLOAD_FAILED, "first"));
        slot.raise(MacroError::new(codes::FILE_ACCESS, "second"));

        let err = slot.take().unwrap();
        assert_eq!(err.code, codes::DOWNLOAD_FAILED);
        assert!(!slot.is_set());
    }

    #[test]
    fn test_slot_handle_is_shared() {
        let slot = AsyncErrorSlot::new();
        let watcher = slot.clone();
        watcher.raise(MacroError::new(codes::DOWNLOAD_FAILED, "from watcher"));
        assert!(slot.is_set());
    }

    #[test]
    fn test_reset_clears_run_state_but_keeps_slot_handle() {
        let mut state = ExecutionState::new();
        let slot = state.pending.clone();
        state.pending.raise(MacroError::new(codes::FILE_ACCESS, "stale"));
        state.extract.push("old".to_string());

        state.reset("run-1".to_string(), 5, 3, true);

        assert_eq!(state.loop_counter, 1);
        assert_eq!(state.total_lines, 5);
        assert_eq!(state.status, MacroStatus::Running);
        assert!(state.extract.is_empty());
        assert!(state.profile.is_some());
        assert!(!state.pending.is_set());

        // The pre-reset clone still reaches the same slot.
        slot.raise(MacroError::new(codes::FILE_ACCESS, "fresh"));
        assert!(state.pending.is_set());
    }
}
