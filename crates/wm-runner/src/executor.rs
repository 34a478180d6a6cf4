//! Macro executor
//!
//! Drives the run loop: dispatches each parsed command to its
//! registered handler, applies control directives and the error policy,
//! manages pause/resume/single-step/abort, runs cleanup callbacks on
//! every exit path and assembles the final MacroResult.

use crate::builtins;
use crate::context::ScriptContext;
use crate::control::{RunControl, Suspension};
use crate::profiler::{ProfileEntry, ProfileSink};
use crate::registry::HandlerRegistry;
use crate::state::{AsyncErrorSlot, ExecutionState};
use crate::sync::lock;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};
use ulid::Ulid;
use wm_core::{
    codes, CommandResult, Control, MacroError, MacroResult, MacroStatus, ProgressUpdate,
    VariableValue,
};
use wm_parser::{ParsedCommand, ParsedMacro};
use wm_vars::VariableContext;

/// Callback receiving a snapshot before every command dispatch
pub type ProgressSink = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Cleanup hook run exactly once on every exit path of a run
pub type CleanupFn = Box<dyn Fn() -> Result<(), String> + Send + Sync>;

/// Static knobs for an executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Outer loop iterations per run
    pub max_loops: u32,
    /// Non-positive delta applied to reported line numbers only; control
    /// flow always uses physical lines
    pub display_line_offset: i32,
    /// Record a per-command profile trace
    pub profiling: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_loops: 1,
            display_line_offset: 0,
            profiling: false,
        }
    }
}

/// How one loop iteration ended
enum IterationEnd {
    Completed,
    SkippedToNext,
    Stopped,
    Failed(MacroError),
}

/// Terminal summary of one run
struct RunEnd {
    success: bool,
    code: i32,
    message: String,
    error_line: Option<i32>,
    loops_completed: u32,
}

/// The stateful macro execution engine
///
/// One executor runs one macro at a time; the variable engine is
/// created once and `reset()` between runs so handler closures holding
/// it stay valid.
pub struct Executor {
    config: ExecutorConfig,
    registry: HandlerRegistry,
    vars: Arc<Mutex<VariableContext>>,
    state: Arc<Mutex<ExecutionState>>,
    control: Arc<RunControl>,
    initial_variables: HashMap<String, VariableValue>,
    cleanups: Vec<CleanupFn>,
    progress_sink: Option<ProgressSink>,
    profile_sink: Option<ProfileSink>,
}

impl Executor {
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        let registry = HandlerRegistry::new();
        builtins::register_builtins(&registry);

        Self {
            config,
            registry,
            vars: Arc::new(Mutex::new(VariableContext::new())),
            state: Arc::new(Mutex::new(ExecutionState::new())),
            control: Arc::new(RunControl::new()),
            initial_variables: HashMap::new(),
            cleanups: Vec::new(),
            progress_sink: None,
            profile_sink: None,
        }
    }

    // --- Wiring ---

    /// The handler registry; re-registering a keyword overrides it
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Shared variable engine (for injection of collaborator callbacks)
    pub fn variables(&self) -> Arc<Mutex<VariableContext>> {
        self.vars.clone()
    }

    /// Shared execution state
    pub fn state(&self) -> Arc<Mutex<ExecutionState>> {
        self.state.clone()
    }

    /// Handle for out-of-band collaborators to deliver a fatal error
    pub fn async_error_slot(&self) -> AsyncErrorSlot {
        lock(&self.state).pending.clone()
    }

    /// Variables re-applied after every reset at `execute()` entry
    pub fn set_initial_variables(&mut self, variables: HashMap<String, VariableValue>) {
        self.initial_variables = variables;
    }

    /// Register a cleanup run on every exit path; its own failure is
    /// logged and never blocks the remaining cleanups
    pub fn add_cleanup(
        &mut self,
        cleanup: impl Fn() -> Result<(), String> + Send + Sync + 'static,
    ) {
        self.cleanups.push(Box::new(cleanup));
    }

    pub fn set_progress_sink(&mut self, sink: impl Fn(ProgressUpdate) + Send + Sync + 'static) {
        self.progress_sink = Some(Arc::new(sink));
    }

    pub fn set_profile_sink(&mut self, sink: impl Fn(&ProfileEntry) + Send + Sync + 'static) {
        self.profile_sink = Some(Arc::new(sink));
    }

    // --- Control primitives (safe to call at any time) ---

    /// Suspend before the next command; effective only while running
    pub fn pause(&self) {
        if lock(&self.state).status == MacroStatus::Running {
            self.control.pause();
        }
    }

    /// Release a pause or a pause that has not taken effect yet
    pub fn resume(&self) {
        self.control.resume();
    }

    /// Abort the run; any suspended pause/step wait is released promptly
    /// and cleanup still runs
    pub fn stop(&self) {
        self.control.stop();
    }

    /// Release one suspended single-step wait; no-op otherwise
    pub fn step(&self) {
        self.control.step();
    }

    /// Toggle single-step mode, mirrored into `!SINGLESTEP`
    pub fn set_single_step(&self, enabled: bool) {
        self.control.set_single_step(enabled);
        let value = if enabled { "YES" } else { "NO" };
        if let Err(err) = lock(&self.vars).set("!SINGLESTEP", value.into()) {
            warn!(%err, "Failed to mirror single-step toggle");
        }
    }

    /// Toggle the global error-ignore policy, mirrored into
    /// `!ERRORIGNORE`
    pub fn set_error_ignore(&self, enabled: bool) {
        let value = if enabled { "YES" } else { "NO" };
        if let Err(err) = lock(&self.vars).set("!ERRORIGNORE", value.into()) {
            warn!(%err, "Failed to mirror error-ignore toggle");
        }
    }

    /// Current run status
    pub fn status(&self) -> MacroStatus {
        lock(&self.state).status
    }

    // --- Execution ---

    /// Run a parsed macro to completion
    ///
    /// Never panics out and never returns early without cleanup: any
    /// uncaught failure inside the loop becomes a generic script-error
    /// result, and every registered cleanup runs exactly once on every
    /// exit path.
    pub async fn execute(&self, parsed: &ParsedMacro) -> MacroResult {
        let started = Instant::now();
        let run_id = Ulid::new().to_string();
        debug!(run_id = %run_id, "Starting macro run");

        let end = AssertUnwindSafe(self.run(parsed, &run_id, started))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                error!("Run loop panicked; converting to script error");
                RunEnd {
                    success: false,
                    code: codes::SCRIPT_ERROR,
                    message: "internal error in run loop".to_string(),
                    error_line: None,
                    loops_completed: 0,
                }
            });

        self.run_cleanups();

        let status = if end.success {
            MacroStatus::Completed
        } else if matches!(end.code, codes::USER_ABORT | codes::USER_STOP_WHILE_PAUSED) {
            MacroStatus::Aborted
        } else {
            MacroStatus::Error
        };
        lock(&self.state).status = status;

        let (extract, variables) = {
            let vars = lock(&self.vars);
            (vars.extract_list().to_vec(), vars.snapshot())
        };

        debug!(
            run_id = %run_id,
            code = end.code,
            loops = end.loops_completed,
            "Macro run finished"
        );

        MacroResult {
            success: end.success,
            code: end.code,
            message: end.message,
            error_line: end.error_line,
            loops_completed: end.loops_completed,
            elapsed_ms: started.elapsed().as_millis() as u64,
            extract,
            variables,
        }
    }

    async fn run(&self, parsed: &ParsedMacro, run_id: &str, started: Instant) -> RunEnd {
        self.control.begin_run();

        let commands: Vec<&ParsedCommand> = parsed.commands().collect();

        {
            let mut vars = lock(&self.vars);
            vars.reset();
            // Caller-supplied initial variables survive the reset.
            for (name, value) in &self.initial_variables {
                if let Err(err) = vars.set(name, value.clone()) {
                    warn!(name = %name, %err, "Ignoring invalid initial variable");
                }
            }
        }
        lock(&self.state).reset(
            run_id.to_string(),
            commands.len(),
            self.config.max_loops,
            self.config.profiling,
        );

        let mut loops_completed = 0u32;

        loop {
            self.sync_loop_variable();

            match self.run_iteration(&commands, started).await {
                IterationEnd::Completed | IterationEnd::SkippedToNext => {
                    loops_completed += 1;
                    let more_loops = {
                        let mut state = lock(&self.state);
                        if state.loop_counter < state.max_loops {
                            state.loop_counter += 1;
                            true
                        } else {
                            false
                        }
                    };
                    if !more_loops || self.control.is_aborted() {
                        break;
                    }
                    // Only the designated per-loop variables reset; the
                    // numbered and custom variables carry over.
                    lock(&self.vars).reset_per_loop();
                }
                IterationEnd::Stopped => break,
                IterationEnd::Failed(err) => {
                    return RunEnd {
                        success: false,
                        code: err.code,
                        message: err.message,
                        error_line: err.line,
                        loops_completed,
                    };
                }
            }
        }

        RunEnd {
            success: true,
            code: codes::OK,
            message: "Macro completed".to_string(),
            error_line: None,
            loops_completed,
        }
    }

    /// Execute one pass over the command list, by index — control
    /// directives may rewrite the cursor
    async fn run_iteration(
        &self,
        commands: &[&ParsedCommand],
        started: Instant,
    ) -> IterationEnd {
        let mut index = 0usize;

        while index < commands.len() {
            match self.suspend_point().await {
                Suspension::Continue => {}
                Suspension::Aborted => {
                    return IterationEnd::Failed(MacroError::new(
                        codes::USER_ABORT,
                        "Macro stopped by user",
                    ));
                }
                Suspension::AbortedWhileSuspended => {
                    return IterationEnd::Failed(MacroError::new(
                        codes::USER_STOP_WHILE_PAUSED,
                        "Macro stopped while paused",
                    ));
                }
            }

            // Errors delivered out-of-band are honored at this yield
            // point with the same policy as synchronous failures.
            if let Some(pending) = lock(&self.state).pending.take() {
                match self.handle_failure(pending, None) {
                    FailureOutcome::Ignored => {}
                    FailureOutcome::SkipLoop => return IterationEnd::SkippedToNext,
                    FailureOutcome::Terminate(err) => return IterationEnd::Failed(err),
                }
            }

            let cmd = commands[index];
            lock(&self.state).current_line = cmd.line;
            self.emit_progress(cmd);

            let dispatch_started = Instant::now();
            let result = self.dispatch(cmd).await;
            self.record_profile(cmd, started, dispatch_started);
            self.mirror_extract();

            if !result.success {
                let err = MacroError::new(
                    result.code,
                    result
                        .message
                        .clone()
                        .unwrap_or_else(|| format!("{} failed", cmd.command.keyword())),
                )
                .at_line(self.display_line(cmd));

                if result.fatal {
                    return IterationEnd::Failed(err);
                }
                match self.handle_failure(err, Some(cmd)) {
                    FailureOutcome::Ignored => {}
                    FailureOutcome::SkipLoop => return IterationEnd::SkippedToNext,
                    FailureOutcome::Terminate(err) => return IterationEnd::Failed(err),
                }
            } else {
                match result.control {
                    Control::Continue => {}
                    Control::Stop => {
                        debug!(line = cmd.line, "Stop directive; run ends successfully");
                        return IterationEnd::Stopped;
                    }
                    Control::SkipLoop => {
                        debug!(line = cmd.line, "Skip-loop directive");
                        return IterationEnd::SkippedToNext;
                    }
                    Control::JumpToLine(target) => {
                        if target < 1 {
                            return IterationEnd::Failed(
                                MacroError::new(
                                    codes::INVALID_PARAMETER,
                                    format!("jump target {target} out of range"),
                                )
                                .at_line(self.display_line(cmd)),
                            );
                        }
                        trace!(from = cmd.line, to = target, "Jump directive");
                        index = target - 1;
                        continue;
                    }
                }
            }

            if let Some(delay) = self.command_delay() {
                if !self.control.interruptible_delay(delay).await {
                    return IterationEnd::Failed(MacroError::new(
                        codes::USER_ABORT,
                        "Macro stopped by user",
                    ));
                }
            }

            index += 1;
        }

        IterationEnd::Completed
    }

    /// Dispatch one command to its handler (or the default), converting
    /// a panic into a generic script error so one handler can never
    /// crash the loop
    async fn dispatch(&self, cmd: &ParsedCommand) -> CommandResult {
        let keyword = cmd.command.keyword().to_string();
        let ctx = ScriptContext {
            command: cmd.clone(),
            vars: self.vars.clone(),
            state: self.state.clone(),
            control: self.control.clone(),
        };

        let result = match self.registry.get(&keyword) {
            Some(handler) => AssertUnwindSafe(handler(ctx))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| {
                    CommandResult::fail(
                        codes::SCRIPT_ERROR,
                        format!("handler for {keyword} panicked"),
                    )
                }),
            None => {
                warn!(
                    command = %keyword,
                    line = cmd.line,
                    "No handler registered; command ignored"
                );
                CommandResult::ok()
            }
        };

        trace!(
            command = %keyword,
            line = cmd.line,
            success = result.success,
            code = result.code,
            "Dispatched command"
        );
        result
    }

    /// Suspension point between commands, reflecting pause state into
    /// the status
    async fn suspend_point(&self) -> Suspension {
        let will_suspend = self.control.is_paused() || self.control.is_single_step();
        if will_suspend && !self.control.is_aborted() {
            lock(&self.state).status = MacroStatus::Paused;
        }

        let outcome = self.control.wait_if_suspended().await;
        if outcome == Suspension::Continue {
            lock(&self.state).status = MacroStatus::Running;
        }
        outcome
    }

    fn handle_failure(&self, err: MacroError, cmd: Option<&ParsedCommand>) -> FailureOutcome {
        let (ignore, skip_loop) = {
            let vars = lock(&self.vars);
            (vars.flag("!ERRORIGNORE"), vars.flag("!ERRORLOOP"))
        };

        if ignore {
            warn!(
                code = err.code,
                line = cmd.map(|c| c.line).unwrap_or_default(),
                message = %err.message,
                "Error ignored by policy"
            );
            return FailureOutcome::Ignored;
        }
        if skip_loop {
            warn!(
                code = err.code,
                message = %err.message,
                "Error skips to the next loop iteration"
            );
            return FailureOutcome::SkipLoop;
        }
        FailureOutcome::Terminate(err)
    }

    fn emit_progress(&self, cmd: &ParsedCommand) {
        let Some(sink) = &self.progress_sink else {
            return;
        };
        let update = {
            let state = lock(&self.state);
            ProgressUpdate {
                run_id: state.run_id.clone(),
                line: self.display_line(cmd),
                total_lines: state.total_lines,
                loop_index: state.loop_counter,
                max_loops: state.max_loops,
                status: state.status,
            }
        };
        sink(update);
    }

    fn record_profile(&self, cmd: &ParsedCommand, run_start: Instant, dispatch_start: Instant) {
        let profiling = lock(&self.state).profile.is_some();
        if !profiling {
            return;
        }

        let entry = ProfileEntry {
            line: cmd.line,
            command: cmd.command.keyword().to_string(),
            offset_ms: dispatch_start.duration_since(run_start).as_millis() as u64,
            duration_ms: dispatch_start.elapsed().as_millis() as u64,
        };

        if let Some(sink) = &self.profile_sink {
            sink(&entry);
        }
        if let Some(trace) = lock(&self.state).profile.as_mut() {
            trace.push(entry);
        }
    }

    fn mirror_extract(&self) {
        let extract = lock(&self.vars).extract_list().to_vec();
        lock(&self.state).extract = extract;
    }

    fn sync_loop_variable(&self) {
        let counter = lock(&self.state).loop_counter;
        if let Err(err) = lock(&self.vars).set("!LOOP", VariableValue::Num(counter as f64)) {
            warn!(%err, "Failed to mirror loop counter");
        }
    }

    fn display_line(&self, cmd: &ParsedCommand) -> i32 {
        cmd.line as i32 + self.config.display_line_offset
    }

    /// Inter-command delay derived from `!REPLAYSPEED`
    fn command_delay(&self) -> Option<Duration> {
        let speed = lock(&self.vars)
            .get("!REPLAYSPEED")
            .map(|v| v.as_text().to_ascii_uppercase())
            .unwrap_or_default();
        match speed.as_str() {
            "SLOW" => Some(Duration::from_secs(1)),
            "MEDIUM" => Some(Duration::from_millis(250)),
            _ => None,
        }
    }

    fn run_cleanups(&self) {
        for cleanup in &self.cleanups {
            if let Err(message) = cleanup() {
                // A failing cleanup never blocks the rest or changes
                // the already-decided result.
                warn!(%message, "Cleanup callback failed");
            }
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

enum FailureOutcome {
    Ignored,
    SkipLoop,
    Terminate(MacroError),
}
