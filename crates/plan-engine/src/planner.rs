//! Bounded-retry plan acquisition from the planning oracle.
//!
//! Each attempt requests raw text, extracts the first JSON object,
//! normalizes, validates, and types it. The first attempt uses the lenient
//! prompt; later attempts demand bare JSON and append the accumulated
//! validation errors as corrective feedback. Exhausting the attempt budget
//! is terminal for the call site.

use plan_schema::{parse_plan_text, Plan, PlanSchemaError, ValidationError};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::oracle::TextOracle;
use crate::prompts;

/// A plan accepted by the parse pipeline, kept with its normalized JSON
/// value and the raw oracle text for journaling.
#[derive(Debug, Clone)]
pub struct PlannerOutcome {
    pub plan: Plan,
    pub value: Value,
    pub raw_output: String,
}

/// Request an initial plan for `task`.
pub async fn request_plan(
    oracle: &dyn TextOracle,
    task: &str,
    cfg: &EngineConfig,
) -> Result<PlannerOutcome, EngineError> {
    request(oracle, cfg, |strict, schema_errors| {
        (
            prompts::PLANNER_SYSTEM.to_string(),
            prompts::planner_user(task, strict, schema_errors),
        )
    })
    .await
}

/// Request a revised remaining-work plan after a required-step failure.
pub async fn request_replan(
    oracle: &dyn TextOracle,
    task: &str,
    feedback: &str,
    cfg: &EngineConfig,
) -> Result<PlannerOutcome, EngineError> {
    request(oracle, cfg, |strict, schema_errors| {
        (
            prompts::REPLAN_SYSTEM.to_string(),
            prompts::replan_user(task, feedback, strict, schema_errors),
        )
    })
    .await
}

async fn request(
    oracle: &dyn TextOracle,
    cfg: &EngineConfig,
    build_prompts: impl Fn(bool, Option<&str>) -> (String, String),
) -> Result<PlannerOutcome, EngineError> {
    let attempts = cfg.plan_attempts.max(1);
    let mut last_output = String::new();
    let mut last_errors: Vec<ValidationError> = Vec::new();

    for attempt in 1..=attempts {
        let strict = attempt > 1;
        let schema_feedback = if last_errors.is_empty() {
            None
        } else {
            Some(format_errors(&last_errors))
        };
        let (system, user) = build_prompts(strict, schema_feedback.as_deref());
        let reply = oracle.generate(&system, &user).await?;
        debug!(
            attempt,
            strict,
            prompt_tokens = reply.prompt_tokens,
            completion_tokens = reply.completion_tokens,
            "planner reply received"
        );
        last_output = reply.content;

        match parse_plan_text(&last_output) {
            Ok(parsed) => {
                return Ok(PlannerOutcome {
                    plan: parsed.plan,
                    value: parsed.value,
                    raw_output: last_output,
                });
            }
            Err(PlanSchemaError::Schema(errors)) => {
                warn!(attempt, issues = errors.len(), "plan failed validation");
                last_errors = errors;
            }
            Err(err) => {
                warn!(attempt, %err, "plan extraction failed");
                last_errors.clear();
            }
        }
    }

    if last_errors.is_empty() {
        Err(EngineError::PlanParse {
            attempts,
            last_output,
        })
    } else {
        Err(EngineError::PlanValidation {
            attempts,
            errors: last_errors,
            last_output,
        })
    }
}

/// Bulleted rendering of validation errors for the correction prompt.
pub(crate) fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|error| format!("- {error}"))
        .collect::<Vec<_>>()
        .join("\n")
}
