//! Replan guardrail: backfill a degenerate replan with baseline steps.

use plan_schema::{ActionKind, Plan, Step};
use tracing::debug;

/// When a replan triggered by a results-page shape failure comes back
/// without any `TYPE_AND_SUBMIT` step (planners sometimes emit only a
/// focus-click), keep its first step and append the configured baseline
/// sequence, renumbering ids contiguously from 1.
///
/// A plan that already types, or an empty baseline, passes through
/// untouched.
pub fn ensure_minimum_plan(mut plan: Plan, baseline: &[Step]) -> Plan {
    if baseline.is_empty()
        || plan
            .steps
            .iter()
            .any(|step| step.action == ActionKind::TypeAndSubmit)
    {
        return plan;
    }

    debug!("replan lacks a typing step; appending baseline steps");
    let mut steps: Vec<Step> = Vec::with_capacity(baseline.len() + 1);
    if let Some(first) = plan.steps.first() {
        steps.push(first.clone());
    }
    steps.extend(baseline.iter().cloned());
    for (index, step) in steps.iter_mut().enumerate() {
        step.id = index as u32 + 1;
    }
    plan.steps = steps;
    plan
}
