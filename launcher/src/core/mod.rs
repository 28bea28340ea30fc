//! Pure, deterministic launcher logic.
//!
//! These modules define stable contracts between components. They do not
//! perform I/O and must remain deterministic across runs.

pub mod descriptor;
pub mod history;
pub mod outcome;
