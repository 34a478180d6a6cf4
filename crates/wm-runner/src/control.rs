//! Cooperative run control
//!
//! One explicit signal object carries the pause/resume, single-step and
//! abort state so the three modes compose without races. Suspension is
//! polled on a short fixed interval rather than slept through, which is
//! also how the interruptible delay observes `stop()` mid-wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// Poll interval for suspended waits
const SUSPEND_TICK: Duration = Duration::from_millis(25);

/// Re-check interval inside the interruptible delay
const DELAY_CHUNK: Duration = Duration::from_millis(100);

/// Shared control signals for one executor
#[derive(Default)]
pub struct RunControl {
    paused: AtomicBool,
    aborted: AtomicBool,
    single_step: AtomicBool,
    step_pending: AtomicBool,
}

/// How a suspension ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspension {
    /// Proceed with the next command
    Continue,
    /// Aborted while running (between commands)
    Aborted,
    /// Aborted while suspended in a pause or step wait
    AbortedWhileSuspended,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-run flags; the single-step mode toggle survives runs
    pub fn begin_run(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.aborted.store(false, Ordering::SeqCst);
        self.step_pending.store(false, Ordering::SeqCst);
    }

    /// Request a pause; takes effect at the next command boundary
    pub fn pause(&self) {
        debug!("Pause requested");
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Release a pause (or a not-yet-effective pause request)
    pub fn resume(&self) {
        debug!("Resume requested");
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Abort the run; any suspended wait is released promptly
    pub fn stop(&self) {
        debug!("Stop requested");
        self.aborted.store(true, Ordering::SeqCst);
    }

    /// Release one suspended single-step wait; no-op otherwise
    pub fn step(&self) {
        self.step_pending.store(true, Ordering::SeqCst);
    }

    pub fn set_single_step(&self, enabled: bool) {
        self.single_step.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.step_pending.store(false, Ordering::SeqCst);
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn is_single_step(&self) -> bool {
        self.single_step.load(Ordering::SeqCst)
    }

    fn take_step(&self) -> bool {
        self.step_pending.swap(false, Ordering::SeqCst)
    }

    /// Wait here while paused or awaiting a single-step release
    ///
    /// Returns how the suspension ended; abort is observed both before
    /// and during the wait.
    pub async fn wait_if_suspended(&self) -> Suspension {
        if self.is_aborted() {
            return Suspension::Aborted;
        }
        if !self.is_paused() && (!self.is_single_step() || self.take_step()) {
            return Suspension::Continue;
        }

        loop {
            tokio::time::sleep(SUSPEND_TICK).await;
            if self.is_aborted() {
                return Suspension::AbortedWhileSuspended;
            }
            if self.is_paused() {
                continue;
            }
            // A queued step is only consumed once the pause is gone, so
            // pausing during step mode cannot swallow the release.
            if !self.is_single_step() || self.take_step() {
                return Suspension::Continue;
            }
        }
    }

    /// Sleep for `duration` in short chunks, re-checking abort
    ///
    /// Returns `false` when the wait was cut short by `stop()`.
    pub async fn interruptible_delay(&self, duration: Duration) -> bool {
        let mut remaining = duration;
        while remaining > Duration::ZERO {
            if self.is_aborted() {
                return false;
            }
            let chunk = remaining.min(DELAY_CHUNK);
            tokio::time::sleep(chunk).await;
            remaining = remaining.saturating_sub(chunk);
        }
        !self.is_aborted()
    }
}
