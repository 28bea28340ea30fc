//! Stable exit codes for launcher CLI commands.

/// Command succeeded and, for `launcher run`, the script completed.
pub const OK: i32 = 0;
/// `launcher run` finished with a failed or cancelled run.
pub const RUN_FAILED: i32 = 1;
/// Invalid usage, unreadable paths, or another launcher error.
pub const INVALID: i32 = 2;
