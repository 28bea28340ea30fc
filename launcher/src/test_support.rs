//! Test-only helpers for driving the supervisor without real environments.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Result, anyhow};

use crate::core::outcome::RunOutcome;
use crate::io::environments::EnvironmentResolver;
use crate::supervisor::OutputSink;

/// Everything a sink receives, in delivery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Chunk(String),
    Outcome(RunOutcome),
}

/// Sink that records every delivery for later assertions.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events.lock().expect("events lock").clone()
    }

    /// All chunks concatenated, in arrival order.
    pub fn output(&self) -> String {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                SinkEvent::Chunk(text) => Some(text),
                SinkEvent::Outcome(_) => None,
            })
            .collect()
    }

    pub fn outcome(&self) -> Option<RunOutcome> {
        self.events().into_iter().find_map(|event| match event {
            SinkEvent::Outcome(outcome) => Some(outcome),
            SinkEvent::Chunk(_) => None,
        })
    }
}

impl OutputSink for CollectingSink {
    fn on_chunk(&self, text: &str) {
        self.events
            .lock()
            .expect("events lock")
            .push(SinkEvent::Chunk(text.to_string()));
    }

    fn on_outcome(&self, outcome: &RunOutcome) {
        self.events
            .lock()
            .expect("events lock")
            .push(SinkEvent::Outcome(outcome.clone()));
    }
}

/// Resolver with a scripted answer: a fixed prefix, or failure when `None`.
pub struct StaticResolver {
    pub prefix: Option<Vec<String>>,
    pub environments: Vec<String>,
}

impl StaticResolver {
    pub fn failing() -> Self {
        Self {
            prefix: None,
            environments: Vec::new(),
        }
    }

    pub fn with_prefix(prefix: Vec<String>) -> Self {
        Self {
            prefix: Some(prefix),
            environments: Vec::new(),
        }
    }
}

impl EnvironmentResolver for StaticResolver {
    fn resolve(&self, name: &str) -> Result<Vec<String>> {
        self.prefix
            .clone()
            .ok_or_else(|| anyhow!("unknown environment {name}"))
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.environments.clone())
    }
}

/// Temporary directory holding scripts, configs, and a history file.
pub struct TestArea {
    temp: tempfile::TempDir,
}

impl TestArea {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp: tempfile::tempdir()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Write a shell script fixture and return its path.
    pub fn write_script(&self, name: &str, body: &str) -> PathBuf {
        let path = self.temp.path().join(name);
        std::fs::write(&path, body).expect("write script");
        path
    }

    /// Write a YAML config fixture and return its path.
    pub fn write_config(&self, name: &str, body: &str) -> PathBuf {
        let path = self.temp.path().join(name);
        std::fs::write(&path, body).expect("write config");
        path
    }

    pub fn history_path(&self) -> PathBuf {
        self.temp.path().join("run_history.json")
    }
}
