//! Append-only JSON-lines audit journal for plan runs.
//!
//! One record per event (`plan_created`, `replan`, `step_result`,
//! `vision_select`, `run_summary`), each carrying the run id and a UTC
//! timestamp, for offline audit and prompt-engineering iteration.

mod model;
mod writer;

pub use model::{AssertionRecord, RunEvent, RunRecord};
pub use writer::{JournalError, JsonlJournal, MemoryJournal, RunJournal};
