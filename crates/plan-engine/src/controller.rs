//! Replanning controller: the top-level run state machine.
//!
//! A run moves through `RUNNING(i)` executing one step at a time. Required
//! failures within the replan budget request a revised plan, replace the
//! step list wholesale, and reset the index to 0; the budget running out or
//! a replan that never parses aborts the run. A `stop_if_true` success ends
//! the run early.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use waypoint_core_types::RunId;

use crate::backend::ActionBackend;
use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::executor::{StepExecutor, StepView, NOTE_SEARCH_RESULTS_NOT_VERIFIED};
use crate::feedback::build_step_feedback;
use crate::guardrails::ensure_minimum_plan;
use crate::oracle::{TextOracle, VisionOracle};
use crate::planner::{request_plan, request_replan};
use crate::substeps::run_optional_substeps;
use run_journal::{RunEvent, RunJournal, RunRecord};

/// Outcome of one executed top-level step, as recorded in the run report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: u32,
    pub goal: String,
    pub success: bool,
    pub note: String,
    pub url: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Mutable run state owned by the controller for the duration of a run.
#[derive(Clone, Debug, Default)]
pub struct RunState {
    pub step_index: usize,
    pub replans_used: u32,
    pub step_results: Vec<StepRecord>,
}

/// Terminal state of a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Done { success: bool },
    Aborted { reason: AbortReason },
}

/// Why a started run aborted instead of completing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbortReason {
    /// A required step kept failing after the last allowed replan.
    ReplanBudgetExhausted { replans_used: u32 },
    /// A replan request never produced an acceptable plan; carries the
    /// failure detail, the validation issues (when any), and the last raw
    /// oracle output for diagnosis.
    ReplanFailed {
        detail: String,
        issues: Vec<String>,
        last_output: String,
    },
}

impl AbortReason {
    fn from_replan_error(error: EngineError) -> Self {
        let detail = error.to_string();
        match error {
            EngineError::PlanParse { last_output, .. } => AbortReason::ReplanFailed {
                detail,
                issues: Vec::new(),
                last_output,
            },
            EngineError::PlanValidation {
                errors,
                last_output,
                ..
            } => AbortReason::ReplanFailed {
                detail,
                issues: errors.iter().map(ToString::to_string).collect(),
                last_output,
            },
            EngineError::Oracle(_) => AbortReason::ReplanFailed {
                detail,
                issues: Vec::new(),
                last_output: String::new(),
            },
        }
    }
}

/// Aggregate metrics for the final summary record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub steps_total: usize,
    pub steps_passed: usize,
    pub steps_failed: usize,
    pub total_duration_ms: u64,
    pub avg_step_duration_ms: u64,
    pub replans_used: u32,
}

impl RunMetrics {
    pub fn from_steps(steps: &[StepRecord], replans_used: u32) -> Self {
        let steps_passed = steps.iter().filter(|step| step.success).count();
        let total_duration_ms: u64 = steps.iter().map(|step| step.duration_ms).sum();
        let avg_step_duration_ms = if steps.is_empty() {
            0
        } else {
            total_duration_ms / steps.len() as u64
        };
        Self {
            steps_total: steps.len(),
            steps_passed,
            steps_failed: steps.len() - steps_passed,
            total_duration_ms,
            avg_step_duration_ms,
            replans_used,
        }
    }
}

/// Final report for one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub task: String,
    pub status: RunStatus,
    pub steps: Vec<StepRecord>,
    pub replans_used: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub metrics: RunMetrics,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Done { success: true })
    }
}

/// The engine: wires the backend, the oracles, the journal, and the
/// configuration into the run state machine.
pub struct Engine {
    backend: Arc<dyn ActionBackend>,
    planner_oracle: Arc<dyn TextOracle>,
    selector_oracle: Arc<dyn TextOracle>,
    vision: Option<Arc<dyn VisionOracle>>,
    journal: Option<Arc<dyn RunJournal>>,
    cfg: EngineConfig,
}

impl Engine {
    pub fn new(
        backend: Arc<dyn ActionBackend>,
        planner_oracle: Arc<dyn TextOracle>,
        selector_oracle: Arc<dyn TextOracle>,
    ) -> Self {
        Self {
            backend,
            planner_oracle,
            selector_oracle,
            vision: None,
            journal: None,
            cfg: EngineConfig::default(),
        }
    }

    /// Attach a vision oracle for click-target fallback.
    pub fn with_vision(mut self, vision: Arc<dyn VisionOracle>) -> Self {
        self.vision = Some(vision);
        self
    }

    /// Attach an audit journal.
    pub fn with_journal(mut self, journal: Arc<dyn RunJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn with_config(mut self, cfg: EngineConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Plan and run `task` to a terminal state.
    ///
    /// Initial-plan parse or validation failure is an error here (there is
    /// no run to abort); once execution starts, every outcome, including
    /// budget exhaustion and failed replans, is reported through the
    /// returned [`RunReport`].
    pub async fn run(&self, task: &str) -> Result<RunReport, EngineError> {
        let run_id = RunId::new();
        let started_at = Utc::now();
        info!(run_id = %run_id, task, "starting run");

        let initial = request_plan(self.planner_oracle.as_ref(), task, &self.cfg).await?;
        self.journal_event(
            &run_id,
            RunEvent::PlanCreated {
                task: task.to_string(),
                raw_output: initial.raw_output.clone(),
                plan: initial.value.clone(),
            },
        );

        let executor = StepExecutor::new(
            self.backend.as_ref(),
            self.selector_oracle.as_ref(),
            self.vision.as_deref(),
            self.journal.as_deref(),
            &self.cfg,
            &run_id.0,
        );

        let mut plan = initial.plan;
        let mut state = RunState::default();
        let mut status: Option<RunStatus> = None;

        while state.step_index < plan.steps.len() {
            let step = plan.steps[state.step_index].clone();
            let step_started = Utc::now();
            let outcome = executor.execute(&StepView::from(&step)).await;

            for report in run_optional_substeps(&executor, &step, &self.cfg).await {
                self.journal_event(
                    &run_id,
                    RunEvent::StepResult {
                        step_id: report.id.unwrap_or(0),
                        goal: report.goal.clone(),
                        success: report.outcome.success,
                        note: report.outcome.note.clone(),
                        url: report.outcome.url.clone(),
                        assertions: report.outcome.assertions.clone(),
                        started_at: report.started_at,
                        ended_at: report.ended_at,
                        duration_ms: duration_ms(report.started_at, report.ended_at),
                        substep_of: Some(step.id),
                    },
                );
            }

            let step_ended = Utc::now();
            let record = StepRecord {
                id: step.id,
                goal: step.goal.clone(),
                success: outcome.success,
                note: outcome.note.clone(),
                url: outcome.url.clone(),
                started_at: step_started,
                ended_at: step_ended,
                duration_ms: duration_ms(step_started, step_ended),
            };
            info!(
                step = record.id,
                success = record.success,
                note = %record.note,
                "step finished"
            );
            self.journal_event(
                &run_id,
                RunEvent::StepResult {
                    step_id: record.id,
                    goal: record.goal.clone(),
                    success: record.success,
                    note: record.note.clone(),
                    url: record.url.clone(),
                    assertions: outcome.assertions.clone(),
                    started_at: record.started_at,
                    ended_at: record.ended_at,
                    duration_ms: record.duration_ms,
                    substep_of: None,
                },
            );
            state.step_results.push(record.clone());

            if !outcome.success && step.required {
                if state.replans_used < self.cfg.max_replans {
                    state.replans_used += 1;
                    let feedback = build_step_feedback(&step, &record, &outcome.assertions);
                    warn!(
                        step = step.id,
                        replans_used = state.replans_used,
                        "required step failed; requesting replan"
                    );
                    match request_replan(self.planner_oracle.as_ref(), task, &feedback, &self.cfg)
                        .await
                    {
                        Ok(replanned) => {
                            let mut new_plan = replanned.plan;
                            if outcome.note == NOTE_SEARCH_RESULTS_NOT_VERIFIED {
                                new_plan = ensure_minimum_plan(new_plan, &self.cfg.replan_baseline);
                            }
                            self.journal_event(
                                &run_id,
                                RunEvent::Replan {
                                    feedback,
                                    raw_output: replanned.raw_output,
                                    plan: serde_json::to_value(&new_plan)
                                        .unwrap_or_else(|_| replanned.value.clone()),
                                },
                            );
                            // The revised plan covers the remaining work on
                            // its own; splicing indices across plans would
                            // require ambiguous id merging.
                            plan = new_plan;
                            state.step_index = 0;
                            continue;
                        }
                        Err(error) => {
                            warn!(%error, "replan failed; aborting run");
                            status = Some(RunStatus::Aborted {
                                reason: AbortReason::from_replan_error(error),
                            });
                            break;
                        }
                    }
                } else {
                    warn!(
                        replans_used = state.replans_used,
                        "replan budget exhausted; aborting run"
                    );
                    status = Some(RunStatus::Aborted {
                        reason: AbortReason::ReplanBudgetExhausted {
                            replans_used: state.replans_used,
                        },
                    });
                    break;
                }
            }

            if step.stop_if_true && outcome.success {
                info!(step = step.id, "stop_if_true satisfied; ending run early");
                status = Some(RunStatus::Done { success: true });
                break;
            }

            state.step_index += 1;
        }

        let status = status.unwrap_or(RunStatus::Done { success: true });
        let ended_at = Utc::now();
        let metrics = RunMetrics::from_steps(&state.step_results, state.replans_used);
        let report = RunReport {
            run_id: run_id.0.clone(),
            task: task.to_string(),
            status,
            steps: state.step_results,
            replans_used: state.replans_used,
            started_at,
            ended_at,
            metrics,
        };
        self.journal_event(
            &run_id,
            RunEvent::RunSummary {
                summary: serde_json::to_value(&report).unwrap_or_else(|_| json!(null)),
            },
        );
        info!(
            run_id = %run_id,
            success = report.is_success(),
            steps = report.metrics.steps_total,
            replans = report.replans_used,
            "run finished"
        );
        Ok(report)
    }

    fn journal_event(&self, run_id: &RunId, event: RunEvent) {
        if let Some(journal) = &self.journal {
            if let Err(error) = journal.append(&RunRecord::now(run_id.0.clone(), event)) {
                warn!(%error, "journal append failed");
            }
        }
    }
}

fn duration_ms(started: DateTime<Utc>, ended: DateTime<Utc>) -> u64 {
    ended
        .signed_duration_since(started)
        .num_milliseconds()
        .max(0) as u64
}
