//! Plan schema: the typed plan model, the best-effort normalizer applied to
//! raw planner JSON, the exhaustive schema validator, and JSON extraction
//! from raw oracle text.
//!
//! The intended pipeline, applied to every oracle reply, is
//! [`extract_json_object`] → [`normalize_plan`] → [`validate_plan`] →
//! [`parse_plan_value`]; [`parse_plan_text`] runs all four. Downstream
//! components only ever see the typed, validated [`Plan`].

mod extract;
mod normalize;
mod types;
mod validate;

use serde_json::Value;
use thiserror::Error;

pub use extract::extract_json_object;
pub use normalize::normalize_plan;
pub use types::{ActionKind, Plan, Step, SubStep};
pub use validate::{validate_plan, ValidationError};

/// Terminal outcomes of a parse attempt over raw oracle text.
#[derive(Debug, Error)]
pub enum PlanSchemaError {
    #[error("no JSON object found in planner output")]
    NoJson,

    #[error("planner output is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("plan failed schema validation with {} issue(s)", .0.len())]
    Schema(Vec<ValidationError>),
}

/// A successfully parsed plan, kept alongside its normalized JSON value for
/// journaling and feedback construction.
#[derive(Debug, Clone)]
pub struct ParsedPlan {
    pub plan: Plan,
    pub value: Value,
}

/// Deserialize a normalized, validated JSON value into the typed plan.
pub fn parse_plan_value(value: Value) -> Result<ParsedPlan, PlanSchemaError> {
    let errors = validate_plan(&value);
    if !errors.is_empty() {
        return Err(PlanSchemaError::Schema(errors));
    }
    let plan: Plan = serde_json::from_value(value.clone())?;
    Ok(ParsedPlan { plan, value })
}

/// Extract, normalize, validate, and type one raw oracle reply.
pub fn parse_plan_text(raw: &str) -> Result<ParsedPlan, PlanSchemaError> {
    let body = extract_json_object(raw).ok_or(PlanSchemaError::NoJson)?;
    let value: Value = serde_json::from_str(&body)?;
    parse_plan_value(normalize_plan(value))
}
