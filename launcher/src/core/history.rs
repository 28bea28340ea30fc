//! Run-history records and the bounded, most-recent-first log.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Maximum number of runs retained in the history log.
pub const MAX_ENTRIES: usize = 100;

/// One recorded run. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Local start time, rendered `%Y-%m-%d %H:%M:%S`.
    pub timestamp: String,
    /// Script file name.
    pub script: String,
    /// Named environment the run used, if any.
    pub environment: Option<String>,
    /// Configuration file name, if a config was passed.
    pub config_file: Option<String>,
    /// Configuration values at launch time, for display and re-use.
    pub config_values: BTreeMap<String, Option<String>>,
    /// Whether the run exited with status zero.
    pub success: bool,
    /// The invocation that ran, joined into a single line.
    pub command: String,
}

/// Prepend `entry` and evict the oldest entries beyond [`MAX_ENTRIES`].
pub fn push_entry(entries: &mut Vec<HistoryEntry>, entry: HistoryEntry) {
    entries.insert(0, entry);
    entries.truncate(MAX_ENTRIES);
}
