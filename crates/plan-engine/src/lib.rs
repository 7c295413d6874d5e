//! Plan execution engine: drives a validated, model-generated plan against an
//! action backend, gates progress on predicate verification, and requests
//! revised plans from the planning oracle when required steps fail, bounded
//! by a replan budget.
//!
//! The engine is a library: the action backend, the planning and executor
//! oracles, the optional vision oracle, and the audit journal are all
//! injected behind traits. The process hosting it owns its own CLI and
//! configuration layers.

mod backend;
mod config;
mod controller;
mod errors;
mod executor;
mod feedback;
mod guardrails;
mod observe;
mod oracle;
mod planner;
mod prompts;
mod substeps;

pub use backend::{ActionBackend, BackendError};
pub use config::{EngineConfig, PollPolicy, ResultsPageShape, TypingTempo};
pub use controller::{
    AbortReason, Engine, RunMetrics, RunReport, RunState, RunStatus, StepRecord,
};
pub use errors::EngineError;
pub use executor::{StepExecutor, StepOutcome, StepView};
pub use feedback::build_step_feedback;
pub use guardrails::ensure_minimum_plan;
pub use observe::{format_observation, SNAPSHOT_HEADER};
pub use oracle::{
    parse_click_id, OracleError, OracleReply, ScriptedOracle, ScriptedVisionOracle, TextOracle,
    VisionOracle,
};
pub use planner::{request_plan, request_replan, PlannerOutcome};
pub use substeps::{run_optional_substeps, SubStepReport};
