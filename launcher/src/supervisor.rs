//! The execution supervisor: child-process lifecycle for a single run.
//!
//! State machine: `Idle -> Starting -> Running -> {Completed, Failed,
//! Cancelled} -> Idle`. One run at a time; the caller observes progress
//! through an [`OutputSink`] and is never blocked beyond handing work off.
//!
//! Every failure inside a supervised run is folded into the terminal
//! [`RunOutcome`]; nothing escapes as an error to the outcome consumer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use tracing::{info, warn};

use crate::core::descriptor::{CommandPlan, RunDescriptor, command_line};
use crate::core::outcome::{RunOutcome, classify_exit};
use crate::io::environments::EnvironmentResolver;
use crate::io::process::{StreamedChild, join_reader, spawn_reader, spawn_streamed, wait_with_cancel};

/// Grace period between a cooperative termination request and a forced kill.
pub const CANCEL_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Bytes of stderr retained for the outcome of a failed run.
const STDERR_TAIL_LIMIT: usize = 8 * 1024;

/// Consumer of a run's streamed output and terminal outcome.
///
/// Chunks arrive in the order each stream produced them, and `on_outcome`
/// is always the last call for a run. Both are invoked from
/// supervisor-owned threads, so implementations must tolerate cross-thread
/// delivery.
pub trait OutputSink: Send + Sync {
    fn on_chunk(&self, text: &str);
    fn on_outcome(&self, outcome: &RunOutcome);
}

/// Owns the child-process lifecycle for one run at a time.
///
/// The only state shared across threads is the running flag and the cancel
/// flag; the child handle never leaves the worker thread.
pub struct Supervisor {
    resolver: Arc<dyn EnvironmentResolver>,
    interpreter: Vec<String>,
    grace_period: Duration,
    running: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Supervisor {
    pub fn new(resolver: Arc<dyn EnvironmentResolver>, interpreter: Vec<String>) -> Self {
        Self {
            resolver,
            interpreter,
            grace_period: CANCEL_GRACE_PERIOD,
            running: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Override the cancellation grace period. Tests use short periods.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Whether a run is currently in flight.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Launch `descriptor` asynchronously, streaming to `sink`.
    ///
    /// Returns an error only while another run is active; every failure
    /// after acceptance is reported through the sink as a terminal
    /// [`RunOutcome`].
    pub fn start(&self, descriptor: RunDescriptor, sink: Arc<dyn OutputSink>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            bail!("a run is already active");
        }
        self.cancel.store(false, Ordering::SeqCst);

        // Starting: resolve the concrete invocation. A resolver failure is
        // not fatal while a default interpreter exists.
        let env_prefix = match &descriptor.environment {
            Some(name) => match self.resolver.resolve(name) {
                Ok(prefix) => Some(prefix),
                Err(err) => {
                    warn!(environment = %name, error = %err, "environment resolution failed, using default interpreter");
                    sink.on_chunk(&format!(
                        "Warning: could not resolve environment '{name}', using the default interpreter instead.\n"
                    ));
                    None
                }
            },
            None => None,
        };
        let plan = CommandPlan::build(&descriptor, env_prefix, &self.interpreter);

        info!(
            script = %descriptor.script_path.display(),
            command = %command_line(&plan.primary),
            "starting run"
        );

        let running = Arc::clone(&self.running);
        let cancel = Arc::clone(&self.cancel);
        let grace_period = self.grace_period;
        let handle = thread::spawn(move || {
            let outcome = run_to_completion(&plan, &sink, &cancel, grace_period);
            sink.on_outcome(&outcome);
            running.store(false, Ordering::SeqCst);
        });

        let mut worker = self
            .worker
            .lock()
            .map_err(|_| anyhow!("worker handle lock poisoned"))?;
        *worker = Some(handle);
        Ok(())
    }

    /// Request cancellation of the active run. Best-effort and idempotent;
    /// a no-op when nothing is running.
    pub fn cancel(&self) {
        if !self.is_running() {
            return;
        }
        if !self.cancel.swap(true, Ordering::SeqCst) {
            info!("cancellation requested");
        }
    }

    /// Block until the current run, if any, has delivered its outcome.
    pub fn wait(&self) -> Result<()> {
        let handle = self
            .worker
            .lock()
            .map_err(|_| anyhow!("worker handle lock poisoned"))?
            .take();
        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| anyhow!("supervisor worker panicked"))?;
        }
        Ok(())
    }
}

/// Drive one run from spawn to terminal outcome.
fn run_to_completion(
    plan: &CommandPlan,
    sink: &Arc<dyn OutputSink>,
    cancel: &AtomicBool,
    grace_period: Duration,
) -> RunOutcome {
    let (streamed, argv) = match spawn_with_fallback(plan, sink) {
        Ok(spawned) => spawned,
        Err(err) => {
            return RunOutcome::launch_failure(command_line(&plan.primary), format!("{err:#}"));
        }
    };
    supervise(streamed, sink, cancel, grace_period, command_line(&argv))
}

/// Spawn the primary invocation, falling back once to the plain-interpreter
/// invocation when an environment-qualified launch cannot be created.
fn spawn_with_fallback(
    plan: &CommandPlan,
    sink: &Arc<dyn OutputSink>,
) -> Result<(StreamedChild, Vec<String>)> {
    match spawn_streamed(&plan.primary) {
        Ok(streamed) => Ok((streamed, plan.primary.clone())),
        Err(err) => match &plan.fallback {
            Some(fallback) => {
                warn!(error = %err, "environment launch failed, falling back to default interpreter");
                sink.on_chunk(
                    "Warning: could not launch inside the selected environment, using the default interpreter instead.\n",
                );
                let streamed = spawn_streamed(fallback)?;
                Ok((streamed, fallback.clone()))
            }
            None => Err(err),
        },
    }
}

/// Stream the child's output and wait for a terminal state.
fn supervise(
    streamed: StreamedChild,
    sink: &Arc<dyn OutputSink>,
    cancel: &AtomicBool,
    grace_period: Duration,
    command: String,
) -> RunOutcome {
    let StreamedChild {
        mut child,
        stdout,
        stderr,
    } = streamed;

    let stdout_sink = Arc::clone(sink);
    let stdout_handle = spawn_reader(stdout, 0, move |text| stdout_sink.on_chunk(text));
    let stderr_sink = Arc::clone(sink);
    let stderr_handle = spawn_reader(stderr, STDERR_TAIL_LIMIT, move |text| {
        stderr_sink.on_chunk(text);
    });

    let waited = wait_with_cancel(&mut child, cancel, grace_period);
    if waited.is_err() {
        // Losing track of the child is a runtime failure. Make sure the
        // pipes close so the readers can finish before reporting it.
        let _ = child.kill();
        let _ = child.wait();
    }

    // Joining the readers here guarantees every chunk is delivered before
    // the terminal outcome.
    let stdout_result = join_reader(stdout_handle);
    let stderr_result = join_reader(stderr_handle);

    let waited = match waited {
        Ok(waited) => waited,
        Err(err) => {
            let tail = stderr_result.unwrap_or_default();
            return RunOutcome {
                success: false,
                exit: None,
                stderr_tail: if tail.is_empty() { format!("{err:#}") } else { tail },
                command,
            };
        }
    };

    let exit = classify_exit(waited.status, waited.forced_kill);
    let mut stream_errors = Vec::new();
    let stderr_tail = match stderr_result {
        Ok(tail) => tail,
        Err(err) => {
            stream_errors.push(err);
            String::new()
        }
    };
    if let Err(err) = stdout_result {
        stream_errors.push(err);
    }

    if !stream_errors.is_empty() {
        // A mid-run read error fails the run; captured output stands.
        let mut tail = stderr_tail;
        for err in &stream_errors {
            warn!(error = %err, "output stream read failed");
            if !tail.is_empty() {
                tail.push('\n');
            }
            tail.push_str(&format!("{err:#}"));
        }
        return RunOutcome {
            success: false,
            exit: Some(exit),
            stderr_tail: tail,
            command,
        };
    }

    RunOutcome {
        success: waited.status.success(),
        exit: Some(exit),
        stderr_tail,
        command,
    }
}
