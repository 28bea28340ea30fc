//! Script-execution supervisor for a drag-and-drop script launcher.
//!
//! Runs a selected script as a child process inside an optional named
//! environment, streams its output as it arrives, supports cooperative
//! cancellation with a bounded grace period, classifies the terminal
//! outcome, and records every run in a capped, persisted history. The
//! architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (command derivation, outcome
//!   classification, history capping). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (process spawning, filesystem,
//!   environment discovery). Isolated to enable substitution in tests.
//!
//! [`supervisor`] and [`launch`] coordinate core logic with I/O; a GUI or
//! the bundled CLI acts as the caller and as the
//! [`supervisor::OutputSink`].

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod launch;
pub mod logging;
pub mod supervisor;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
