use plan_schema::ValidationError;
use thiserror::Error;

use crate::oracle::OracleError;

/// Terminal errors surfaced by the engine.
///
/// Verification failures never appear here: they are recovered locally into
/// failed step records. Replan-budget exhaustion and in-run replan failures
/// are reported through [`crate::AbortReason`] on the final run report; the
/// variants below are fatal for a call site with no plan to run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The oracle text never yielded a JSON object across all attempts.
    #[error("planner produced no parseable plan after {attempts} attempt(s)")]
    PlanParse { attempts: u32, last_output: String },

    /// The JSON parsed but kept violating the schema across all attempts.
    /// Carries the full error list for the correction prompt.
    #[error("plan failed schema validation after {attempts} attempt(s) with {} issue(s)", .errors.len())]
    PlanValidation {
        attempts: u32,
        errors: Vec<ValidationError>,
        last_output: String,
    },

    /// The planning oracle itself failed at the transport level.
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

impl EngineError {
    /// The raw oracle output of the last failed attempt, when one exists.
    pub fn last_output(&self) -> Option<&str> {
        match self {
            EngineError::PlanParse { last_output, .. }
            | EngineError::PlanValidation { last_output, .. } => Some(last_output),
            EngineError::Oracle(_) => None,
        }
    }
}
