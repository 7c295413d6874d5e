//! Conditional execution of a step's optional substeps.
//!
//! Substeps model optional UI (upsell drawers, overlays): they run only when
//! the overlay-visibility gate observes one within a short poll window.
//! Never seeing the overlay is an expected outcome, not a failure, and
//! substep failures are recorded without ever triggering replanning.

use chrono::{DateTime, Utc};
use plan_schema::Step;
use tracing::debug;
use verify_gate::{Predicate, Selector};

use crate::config::EngineConfig;
use crate::executor::{StepExecutor, StepOutcome, StepView};

/// Result of one executed substep, timestamped for journaling.
#[derive(Clone, Debug)]
pub struct SubStepReport {
    pub id: Option<u32>,
    pub goal: String,
    pub outcome: StepOutcome,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// Run the step's optional substeps when an overlay is visible.
pub async fn run_optional_substeps(
    executor: &StepExecutor<'_>,
    step: &Step,
    cfg: &EngineConfig,
) -> Vec<SubStepReport> {
    if step.optional_substeps.is_empty() {
        return Vec::new();
    }

    let gate = overlay_gate(cfg);
    if !executor.check_eventually(&gate, &cfg.overlay_poll).await {
        debug!(step = step.id, "no overlay observed; skipping optional substeps");
        return Vec::new();
    }

    let mut reports = Vec::with_capacity(step.optional_substeps.len());
    for sub in &step.optional_substeps {
        let started_at = Utc::now();
        let outcome = executor.execute(&StepView::from(sub)).await;
        reports.push(SubStepReport {
            id: sub.id,
            goal: sub.goal.clone(),
            outcome,
            started_at,
            ended_at: Utc::now(),
        });
    }
    reports
}

/// Fixed drawer-visibility predicate: any configured overlay indicator text
/// present in the observation.
fn overlay_gate(cfg: &EngineConfig) -> Predicate {
    Predicate::AnyOf(
        cfg.overlay_indicators
            .iter()
            .map(|indicator| Predicate::Exists(Selector::TextContains(indicator.clone())))
            .collect(),
    )
}
