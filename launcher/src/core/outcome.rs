//! Terminal run outcomes and exit-status classification.

use std::process::ExitStatus;

use serde::{Deserialize, Serialize};

/// How the child process left the running state.
///
/// Serialized as a lowercase sentinel string for the signal cases and as a
/// bare integer for a normal exit, so independent tooling reads either
/// `"terminated"`, `"killed"`, or the code itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExitDisposition {
    /// Ended by a cooperative termination signal.
    Terminated,
    /// Force-killed after the cancellation grace period elapsed.
    Killed,
    /// Normal exit with a code.
    #[serde(untagged)]
    Code(i32),
}

/// Terminal report for one run. Created exactly once, when the child
/// reaches a terminal state or the launch itself fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    /// Whether the child exited with status zero.
    pub success: bool,
    /// Exit classification; `None` when the child never launched.
    pub exit: Option<ExitDisposition>,
    /// Bounded tail of the child's stderr, or the launch error text.
    pub stderr_tail: String,
    /// The invocation that actually ran (or was last attempted), joined
    /// into a single line for post-hoc reporting.
    pub command: String,
}

impl RunOutcome {
    /// Outcome for a run whose process could not be created at all.
    pub fn launch_failure(command: String, error: String) -> Self {
        Self {
            success: false,
            exit: None,
            stderr_tail: error,
            command,
        }
    }
}

/// Classify a child's exit status. `forced_kill` is set by the supervisor
/// when the grace period elapsed and it escalated to an unconditional kill.
pub fn classify_exit(status: ExitStatus, forced_kill: bool) -> ExitDisposition {
    if let Some(code) = status.code() {
        return ExitDisposition::Code(code);
    }
    if forced_kill || ended_by_sigkill(status) {
        ExitDisposition::Killed
    } else {
        ExitDisposition::Terminated
    }
}

#[cfg(unix)]
fn ended_by_sigkill(status: ExitStatus) -> bool {
    use std::os::unix::process::ExitStatusExt;

    status.signal() == Some(libc::SIGKILL)
}

#[cfg(not(unix))]
fn ended_by_sigkill(_status: ExitStatus) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn status_from_raw(raw: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;

        ExitStatus::from_raw(raw)
    }

    #[cfg(unix)]
    #[test]
    fn classifies_exit_codes() {
        assert_eq!(classify_exit(status_from_raw(0), false), ExitDisposition::Code(0));
        assert_eq!(
            classify_exit(status_from_raw(3 << 8), false),
            ExitDisposition::Code(3)
        );
    }

    #[cfg(unix)]
    #[test]
    fn classifies_signals() {
        // Raw wait statuses: low byte carries the terminating signal.
        assert_eq!(
            classify_exit(status_from_raw(libc::SIGTERM), false),
            ExitDisposition::Terminated
        );
        assert_eq!(
            classify_exit(status_from_raw(libc::SIGKILL), false),
            ExitDisposition::Killed
        );
        assert_eq!(
            classify_exit(status_from_raw(libc::SIGTERM), true),
            ExitDisposition::Killed
        );
    }

    #[test]
    fn disposition_serializes_as_code_or_sentinel() {
        assert_eq!(serde_json::to_string(&ExitDisposition::Code(0)).expect("json"), "0");
        assert_eq!(
            serde_json::to_string(&ExitDisposition::Terminated).expect("json"),
            "\"terminated\""
        );
        assert_eq!(
            serde_json::to_string(&ExitDisposition::Killed).expect("json"),
            "\"killed\""
        );
    }

    #[test]
    fn disposition_round_trips() {
        for disposition in [
            ExitDisposition::Code(17),
            ExitDisposition::Terminated,
            ExitDisposition::Killed,
        ] {
            let json = serde_json::to_string(&disposition).expect("json");
            let parsed: ExitDisposition = serde_json::from_str(&json).expect("parse");
            assert_eq!(parsed, disposition);
        }
    }
}
