//! Orchestration of a single launch: descriptor, supervision, history.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::warn;

use crate::core::descriptor::{RunDescriptor, file_name_of};
use crate::core::history::HistoryEntry;
use crate::core::outcome::RunOutcome;
use crate::io::history_store::HistoryStore;
use crate::io::scripts::read_config_values;
use crate::supervisor::{OutputSink, Supervisor};

/// Inputs for one launch.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub script: PathBuf,
    pub config: Option<PathBuf>,
    pub environment: Option<String>,
}

/// Run `request` to completion and record it in `history`.
///
/// Exactly one history entry is written per run, whether it completed,
/// failed, or was cancelled. A history write failure is logged and never
/// fails the run itself.
pub fn run_launch(
    request: &LaunchRequest,
    supervisor: &Supervisor,
    sink: Arc<dyn OutputSink>,
    history: &HistoryStore,
) -> Result<RunOutcome> {
    let config_values = match &request.config {
        Some(path) => match read_config_values(path) {
            Ok(values) => values,
            Err(err) => {
                warn!(config = %path.display(), error = %err, "config unreadable, recording empty values");
                Default::default()
            }
        },
        None => Default::default(),
    };

    let descriptor = RunDescriptor {
        script_path: request.script.clone(),
        config_path: request.config.clone(),
        environment: request.environment.clone(),
    };
    let script = descriptor.script_name();
    let config_file = request.config.as_deref().map(file_name_of);
    let started_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

    let capture = Arc::new(OutcomeCapture::new(sink));
    supervisor.start(descriptor, capture.clone())?;
    supervisor.wait()?;
    let outcome = capture
        .take_outcome()
        .context("run finished without an outcome")?;

    let entry = HistoryEntry {
        timestamp: started_at,
        script,
        environment: request.environment.clone(),
        config_file,
        config_values,
        success: outcome.success,
        command: outcome.command.clone(),
    };
    if let Err(err) = history
        .ensure_initialized()
        .and_then(|()| history.append(entry))
    {
        warn!(error = %err, "failed to record run history");
    }

    Ok(outcome)
}

/// Sink wrapper that forwards everything and keeps the terminal outcome.
struct OutcomeCapture {
    inner: Arc<dyn OutputSink>,
    outcome: Mutex<Option<RunOutcome>>,
}

impl OutcomeCapture {
    fn new(inner: Arc<dyn OutputSink>) -> Self {
        Self {
            inner,
            outcome: Mutex::new(None),
        }
    }

    fn take_outcome(&self) -> Option<RunOutcome> {
        self.outcome.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl OutputSink for OutcomeCapture {
    fn on_chunk(&self, text: &str) {
        self.inner.on_chunk(text);
    }

    fn on_outcome(&self, outcome: &RunOutcome) {
        self.inner.on_outcome(outcome);
        if let Ok(mut slot) = self.outcome.lock() {
            *slot = Some(outcome.clone());
        }
    }
}
