//! End-to-end scenario driven through the prelude facade.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use waypoint::engine::{
    ActionBackend, BackendError, Engine, EngineConfig, ScriptedOracle,
};
use waypoint::journal::{MemoryJournal, RunEvent};
use waypoint::plan::{normalize_plan, validate_plan};
use waypoint::types::Observation;

struct FixedBackend {
    landing: HashMap<String, String>,
    url: Mutex<String>,
}

impl FixedBackend {
    fn new(landing: &[(&str, &str)]) -> Self {
        Self {
            landing: landing
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            url: Mutex::new("about:blank".to_string()),
        }
    }
}

#[async_trait]
impl ActionBackend for FixedBackend {
    async fn navigate(&self, url: &str) -> Result<(), BackendError> {
        let landed = self.landing.get(url).cloned().unwrap_or_else(|| url.to_string());
        *self.url.lock() = landed;
        Ok(())
    }

    async fn click(&self, _element_id: u32) -> Result<(), BackendError> {
        Ok(())
    }

    async fn type_text(&self, _text: &str) -> Result<(), BackendError> {
        Ok(())
    }

    async fn submit(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn snapshot(&self) -> Result<Observation, BackendError> {
        Ok(Observation::new(self.url.lock().clone()))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BackendError> {
        Ok(Vec::new())
    }
}

const PLAN: &str = r#"{"task":"t","steps":[{"id":1,"action":"NAVIGATE","goal":"open","target":"https://x","verify":[{"predicate":"url_contains","args":["x"]}],"required":true}]}"#;

#[test]
fn scenario_plan_validates_cleanly() {
    let value: serde_json::Value = serde_json::from_str(PLAN).unwrap();
    assert!(validate_plan(&normalize_plan(value)).is_empty());
}

#[tokio::test(start_paused = true)]
async fn scenario_plan_executes_to_done_true() {
    let backend = Arc::new(FixedBackend::new(&[("https://x", "https://x.com")]));
    let planner = Arc::new(ScriptedOracle::new([PLAN]));
    let selector = Arc::new(ScriptedOracle::new(Vec::<String>::new()));
    let journal = Arc::new(MemoryJournal::new());

    let engine = Engine::new(backend, planner, selector)
        .with_journal(journal.clone())
        .with_config(EngineConfig::fast());
    let report = engine.run("t").await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.steps.len(), 1);
    assert!(report.steps[0].success);

    let summary = journal
        .records()
        .into_iter()
        .find_map(|record| match record.event {
            RunEvent::RunSummary { summary } => Some(summary),
            _ => None,
        })
        .expect("summary record");
    assert_eq!(summary["status"]["status"], "done");
    assert_eq!(summary["metrics"]["steps_passed"], 1);
}
