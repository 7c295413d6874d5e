//! Typed plan model populated after normalization and validation.

use serde::{Deserialize, Serialize};
use verify_gate::PredicateSpec;

/// The unit of work: an ordered list of steps toward one task. A plan is
/// never mutated in place; a replan replaces the whole structure.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub task: String,
    /// Advisory planner notes; not executed.
    #[serde(default)]
    pub notes: Vec<String>,
    pub steps: Vec<Step>,
}

/// One navigate/click/type action plus its verification gates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Contiguous 1-based position within the plan.
    pub id: u32,
    /// Natural-language description handed to the executor oracle.
    pub goal: String,
    pub action: ActionKind,
    /// Destination URL; present exactly when `action` is `NAVIGATE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Semantic hint for `CLICK` target selection (e.g. `first_product_link`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    /// Literal text for `TYPE_AND_SUBMIT`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verify: Vec<PredicateSpec>,
    /// When true, verification failure triggers replanning.
    #[serde(default)]
    pub required: bool,
    /// When true, step success halts the run successfully.
    #[serde(default)]
    pub stop_if_true: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optional_substeps: Vec<SubStep>,
}

/// A conditionally-executed substep attached to a step. Substeps run only
/// when the overlay-visibility gate observes an open drawer, carry their own
/// verification, and never trigger replanning. Ids are optional unless any
/// sibling uses one; `stop_if_true` is accepted but recorded only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubStep {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub goal: String,
    pub action: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub verify: Vec<PredicateSpec>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub stop_if_true: bool,
}

/// The three executable action kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Navigate,
    Click,
    TypeAndSubmit,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Navigate => "NAVIGATE",
            ActionKind::Click => "CLICK",
            ActionKind::TypeAndSubmit => "TYPE_AND_SUBMIT",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
