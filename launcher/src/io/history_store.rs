//! Persistent, capped run-history storage.
//!
//! The history file is an ordered JSON list of entries, most recent first,
//! readable by independent tooling without the launcher running.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::history::{HistoryEntry, push_entry};

/// JSON-backed history log capped at
/// [`MAX_ENTRIES`](crate::core::history::MAX_ENTRIES).
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location used when the caller does not override the path:
    /// `<user data dir>/launcher/run_history.json`.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::data_dir().context("no user data directory available")?;
        Ok(base.join("launcher").join("run_history.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty store if none exists. Idempotent.
    pub fn ensure_initialized(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        write_atomic(&self.path, "[]\n")
    }

    /// Read all entries, most recent first.
    ///
    /// A missing, empty, or unparsable file is treated as an empty store so
    /// a damaged history can never block new runs.
    pub fn load_all(&self) -> Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("read history {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&contents) {
            Ok(entries) => Ok(entries),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "history file unreadable, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Prepend an entry, evict beyond the cap, and persist immediately.
    ///
    /// A write failure is reported to the caller, not retried.
    pub fn append(&self, entry: HistoryEntry) -> Result<()> {
        let mut entries = self.load_all()?;
        push_entry(&mut entries, entry);
        let mut buf = serde_json::to_string_pretty(&entries).context("serialize history")?;
        buf.push('\n');
        write_atomic(&self.path, &buf)?;
        debug!(path = %self.path.display(), entries = entries.len(), "history appended");
        Ok(())
    }
}

/// Atomic write (temp file + rename), creating parent directories.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("history path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp history {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace history {}", path.display()))?;
    Ok(())
}
