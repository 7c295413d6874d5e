//! Waypoint prelude.
//!
//! Re-exports the workspace crates behind stable module names so hosts can
//! depend on a single crate. The engine validates untrusted, model-generated
//! task plans, executes them step by step against an injected action
//! backend, gates progress on predicate verification, and replans on
//! required-step failure within a bounded budget.

pub mod types {
    pub use waypoint_core_types::{Element, Observation, RunId};
}

pub mod gate {
    pub use verify_gate::{evaluate, validate_spec, GateError, Predicate, PredicateSpec, Selector, SpecIssue};
}

pub mod plan {
    pub use plan_schema::{
        extract_json_object, normalize_plan, parse_plan_text, parse_plan_value, validate_plan,
        ActionKind, ParsedPlan, Plan, PlanSchemaError, Step, SubStep, ValidationError,
    };
}

pub mod journal {
    pub use run_journal::{
        AssertionRecord, JournalError, JsonlJournal, MemoryJournal, RunEvent, RunJournal, RunRecord,
    };
}

pub mod engine {
    pub use plan_engine::{
        build_step_feedback, ensure_minimum_plan, format_observation, parse_click_id,
        request_plan, request_replan, run_optional_substeps, AbortReason, ActionBackend,
        BackendError, Engine, EngineConfig, EngineError, OracleError, OracleReply, PlannerOutcome,
        PollPolicy, ResultsPageShape, RunMetrics, RunReport, RunState, RunStatus, ScriptedOracle,
        ScriptedVisionOracle, StepExecutor, StepOutcome, StepRecord, StepView, SubStepReport,
        TextOracle, TypingTempo, VisionOracle, SNAPSHOT_HEADER,
    };
}
