use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope for one journaled event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub ts: DateTime<Utc>,
    #[serde(flatten)]
    pub event: RunEvent,
}

impl RunRecord {
    /// Stamp an event with the run id and the current wall clock.
    pub fn now(run_id: impl Into<String>, event: RunEvent) -> Self {
        Self {
            run_id: run_id.into(),
            ts: Utc::now(),
            event,
        }
    }
}

/// The journaled event kinds, tagged by `event` on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    /// Initial plan accepted after parse/normalize/validate.
    PlanCreated {
        task: String,
        raw_output: String,
        plan: Value,
    },
    /// Replacement plan accepted after a required-step failure.
    Replan {
        feedback: String,
        raw_output: String,
        plan: Value,
    },
    /// Outcome of one executed step (or substep, when `substep_of` is set).
    StepResult {
        step_id: u32,
        goal: String,
        success: bool,
        note: String,
        url: String,
        assertions: Vec<AssertionRecord>,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        duration_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        substep_of: Option<u32>,
    },
    /// A vision-oracle fallback was consulted for a click target.
    VisionSelect {
        step_id: u32,
        reason: String,
        response: String,
        selected_id: Option<u32>,
    },
    /// Final roll-up for the run: per-step results plus aggregate metrics.
    RunSummary { summary: Value },
}

/// One verification predicate outcome captured during a step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionRecord {
    pub label: String,
    pub required: bool,
    pub passed: bool,
}

impl AssertionRecord {
    pub fn new(label: impl Into<String>, required: bool, passed: bool) -> Self {
        Self {
            label: label.into(),
            required,
            passed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_are_tagged_by_event_kind() {
        let record = RunRecord::now(
            "run-1",
            RunEvent::PlanCreated {
                task: "t".to_string(),
                raw_output: "{}".to_string(),
                plan: json!({"task": "t"}),
            },
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["event"], json!("plan_created"));
        assert_eq!(value["run_id"], json!("run-1"));
    }

    #[test]
    fn step_result_round_trips() {
        let record = RunRecord::now(
            "run-1",
            RunEvent::StepResult {
                step_id: 3,
                goal: "click first product".to_string(),
                success: false,
                note: "llm_click_id_missing".to_string(),
                url: "https://shop.example/s?k=laptop".to_string(),
                assertions: vec![AssertionRecord::new("verify_1", true, false)],
                started_at: Utc::now(),
                ended_at: Utc::now(),
                duration_ms: 1200,
                substep_of: None,
            },
        );
        let text = serde_json::to_string(&record).unwrap();
        let back: RunRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
    }
}
