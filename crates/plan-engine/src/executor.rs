//! Step execution: dispatches one plan step against the action backend and
//! applies its verification gates.

use std::time::Duration;

use plan_schema::{ActionKind, Step, SubStep};
use rand::Rng;
use run_journal::{AssertionRecord, RunEvent, RunJournal, RunRecord};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use verify_gate::{evaluate, Predicate, PredicateSpec, Selector};
use waypoint_core_types::Observation;

use crate::backend::{ActionBackend, BackendError};
use crate::config::{EngineConfig, PollPolicy};
use crate::observe::format_observation;
use crate::oracle::{parse_click_id, TextOracle, VisionOracle};
use crate::prompts;

/// Note attached when a `TYPE_AND_SUBMIT` landed somewhere that does not
/// look like a search-results page.
pub const NOTE_SEARCH_RESULTS_NOT_VERIFIED: &str = "search_results_not_verified";
/// Note attached when no click target could be resolved by any oracle.
pub const NOTE_CLICK_ID_MISSING: &str = "llm_click_id_missing";
/// Note attached when the results list never hydrated enough candidates.
pub const NOTE_PRODUCT_LINKS_NOT_FOUND: &str = "product_links_not_found";

const FOCUS_GOAL: &str = "Click the search input box (role=searchbox or role=textbox) before typing.";

/// Uniform borrowed view over [`Step`] and [`SubStep`], which share
/// execution semantics.
#[derive(Clone, Copy, Debug)]
pub struct StepView<'a> {
    pub id: Option<u32>,
    pub goal: &'a str,
    pub action: ActionKind,
    pub target: Option<&'a str>,
    pub intent: Option<&'a str>,
    pub input: Option<&'a str>,
    pub verify: &'a [PredicateSpec],
    pub required: bool,
}

impl<'a> From<&'a Step> for StepView<'a> {
    fn from(step: &'a Step) -> Self {
        Self {
            id: Some(step.id),
            goal: &step.goal,
            action: step.action,
            target: step.target.as_deref(),
            intent: step.intent.as_deref(),
            input: step.input.as_deref(),
            verify: &step.verify,
            required: step.required,
        }
    }
}

impl<'a> From<&'a SubStep> for StepView<'a> {
    fn from(sub: &'a SubStep) -> Self {
        Self {
            id: sub.id,
            goal: &sub.goal,
            action: sub.action,
            target: sub.target.as_deref(),
            intent: sub.intent.as_deref(),
            input: sub.input.as_deref(),
            verify: &sub.verify,
            required: sub.required,
        }
    }
}

/// Outcome of one executed step: a recovered boolean, never an error.
#[derive(Clone, Debug)]
pub struct StepOutcome {
    pub success: bool,
    pub note: String,
    /// Last URL observed while executing the step.
    pub url: String,
    pub assertions: Vec<AssertionRecord>,
}

impl StepOutcome {
    fn passed(note: &str, url: String, assertions: Vec<AssertionRecord>) -> Self {
        Self {
            success: true,
            note: note.to_string(),
            url,
            assertions,
        }
    }

    fn failed(note: &str, url: String, assertions: Vec<AssertionRecord>) -> Self {
        Self {
            success: false,
            note: note.to_string(),
            url,
            assertions,
        }
    }
}

/// Executes single steps against the backend, consulting the executor
/// oracle for click targets and the vision oracle as bounded fallback.
pub struct StepExecutor<'a> {
    backend: &'a dyn ActionBackend,
    selector_oracle: &'a dyn TextOracle,
    vision: Option<&'a dyn VisionOracle>,
    journal: Option<&'a dyn RunJournal>,
    cfg: &'a EngineConfig,
    run_id: &'a str,
}

impl<'a> StepExecutor<'a> {
    pub fn new(
        backend: &'a dyn ActionBackend,
        selector_oracle: &'a dyn TextOracle,
        vision: Option<&'a dyn VisionOracle>,
        journal: Option<&'a dyn RunJournal>,
        cfg: &'a EngineConfig,
        run_id: &'a str,
    ) -> Self {
        Self {
            backend,
            selector_oracle,
            vision,
            journal,
            cfg,
            run_id,
        }
    }

    /// Execute one step. Backend errors are recovered into a failed
    /// outcome at this boundary; they never escape as errors.
    pub async fn execute(&self, view: &StepView<'_>) -> StepOutcome {
        info!(step = view.id, action = %view.action, goal = view.goal, "executing step");
        match self.try_execute(view).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(step = view.id, %err, "backend call failed during step");
                StepOutcome::failed(&format!("backend_error: {err}"), String::new(), Vec::new())
            }
        }
    }

    async fn try_execute(&self, view: &StepView<'_>) -> Result<StepOutcome, BackendError> {
        match view.action {
            ActionKind::Navigate => self.run_navigate(view).await,
            ActionKind::TypeAndSubmit => self.run_type_and_submit(view).await,
            ActionKind::Click => self.run_click(view).await,
        }
    }

    async fn run_navigate(&self, view: &StepView<'_>) -> Result<StepOutcome, BackendError> {
        let target = view.target.unwrap_or_default();
        self.backend.navigate(target).await?;
        sleep(Duration::from_millis(self.cfg.navigate_settle_ms)).await;
        let obs = self.backend.snapshot().await?;
        debug!(url = %obs.url, elements = obs.elements.len(), "navigation settled");
        let (ok, assertions) = self
            .apply_verifications(view.verify, view.required, Some(&obs))
            .await;
        let outcome = if ok {
            StepOutcome::passed("navigated", obs.url, assertions)
        } else {
            StepOutcome::failed("navigated", obs.url, assertions)
        };
        Ok(outcome)
    }

    async fn run_type_and_submit(&self, view: &StepView<'_>) -> Result<StepOutcome, BackendError> {
        // Best-effort focus of the input target; many inputs are already
        // focused, so an unusable oracle answer is not a failure.
        match self.backend.snapshot().await {
            Ok(pre) => {
                let compact = self.compact(&pre, self.cfg.snapshot_limit);
                let user = prompts::selector_user(FOCUS_GOAL, Some("search_box"), &compact, &[], false);
                match self
                    .selector_oracle
                    .generate(prompts::SELECTOR_SYSTEM, &user)
                    .await
                {
                    Ok(reply) => {
                        if let Some(id) = parse_click_id(&reply.content) {
                            if let Err(err) = self.backend.click(id).await {
                                warn!(%err, "focus click failed; typing anyway");
                            } else {
                                sleep(Duration::from_millis(self.cfg.focus_settle_ms)).await;
                            }
                        } else {
                            debug!(reply = %reply.content, "no usable focus target; typing anyway");
                        }
                    }
                    Err(err) => debug!(%err, "focus oracle unavailable; typing anyway"),
                }
            }
            Err(err) => warn!(%err, "pre-type snapshot failed; typing anyway"),
        }

        let text = view.input.unwrap_or_default();
        self.type_with_tempo(text).await?;
        self.backend.submit().await?;
        sleep(Duration::from_millis(self.cfg.post_submit_settle_ms)).await;

        let obs = self.backend.snapshot().await?;
        if !self.cfg.results_shape.is_results_page(&obs.url, text) {
            warn!(url = %obs.url, "landing URL does not look like search results");
            return Ok(StepOutcome::failed(
                NOTE_SEARCH_RESULTS_NOT_VERIFIED,
                obs.url,
                Vec::new(),
            ));
        }

        let (ok, assertions) = self
            .apply_verifications(view.verify, view.required, Some(&obs))
            .await;
        let outcome = if ok {
            StepOutcome::passed("typed_and_submitted", obs.url, assertions)
        } else {
            StepOutcome::failed("typed_and_submitted", obs.url, assertions)
        };
        Ok(outcome)
    }

    async fn run_click(&self, view: &StepView<'_>) -> Result<StepOutcome, BackendError> {
        let intent = view.intent.unwrap_or_default();
        let first_result = self.cfg.is_first_result_intent(intent);

        // Guard against clicking into a results page whose links have not
        // hydrated yet.
        if first_result && !self.await_result_links().await {
            let url = self
                .backend
                .snapshot()
                .await
                .map(|obs| obs.url)
                .unwrap_or_default();
            return Ok(StepOutcome::failed(
                NOTE_PRODUCT_LINKS_NOT_FOUND,
                url,
                Vec::new(),
            ));
        }

        let limit = if first_result || self.cfg.is_search_box_intent(intent) {
            self.cfg.results_snapshot_limit
        } else {
            self.cfg.snapshot_limit
        };
        let obs = self.backend.snapshot().await?;
        let compact = self.compact(&obs, limit);

        let user = prompts::selector_user(
            view.goal,
            view.intent,
            &compact,
            &self.cfg.results_shape.detail_markers,
            first_result,
        );
        let mut click_id = match self
            .selector_oracle
            .generate(prompts::SELECTOR_SYSTEM, &user)
            .await
        {
            Ok(reply) => {
                let parsed = parse_click_id(&reply.content);
                if parsed.is_none() {
                    warn!(reply = %reply.content, "executor oracle reply not parseable");
                }
                parsed
            }
            Err(err) => {
                warn!(%err, "executor oracle failed");
                None
            }
        };

        if click_id.is_none() {
            click_id = self
                .vision_select(view, &compact, "executor_missing_click_id")
                .await;
        }
        let Some(id) = click_id else {
            return Ok(StepOutcome::failed(NOTE_CLICK_ID_MISSING, obs.url, Vec::new()));
        };

        self.backend.click(id).await?;
        sleep(Duration::from_millis(self.cfg.post_click_settle_ms)).await;
        let after = self.backend.snapshot().await.ok();
        let compact_after = after
            .as_ref()
            .map(|observed| self.compact(observed, limit));
        let mut url = after
            .as_ref()
            .map(|observed| observed.url.clone())
            .unwrap_or_else(|| obs.url.clone());

        let (mut ok, mut assertions) = self
            .apply_verifications(view.verify, view.required, after.as_ref())
            .await;

        // Some sites report the search input as searchbox/combobox rather
        // than textbox; accept any configured alternate before escalating.
        if !ok && view.required && self.cfg.is_search_box_intent(intent) {
            let alternates = self.alt_search_predicate();
            if self
                .check_eventually(&alternates, &self.cfg.alt_role_poll)
                .await
            {
                return Ok(StepOutcome::passed(
                    "search_box_detected_alt",
                    url,
                    assertions,
                ));
            }
        }

        // One vision override attempt for failed required verification.
        if !ok && view.required {
            let context = compact_after.as_deref().unwrap_or(&compact);
            if let Some(vision_id) = self.vision_select(view, context, "verification_failed").await
            {
                if vision_id != id {
                    self.backend.click(vision_id).await?;
                    sleep(Duration::from_millis(self.cfg.post_click_settle_ms)).await;
                }
                let retry_obs = self.backend.snapshot().await.ok();
                if let Some(observed) = retry_obs.as_ref() {
                    url = observed.url.clone();
                }
                let (retry_ok, retry_assertions) = self
                    .apply_verifications(view.verify, view.required, retry_obs.as_ref())
                    .await;
                if retry_ok {
                    return Ok(StepOutcome::passed(
                        "vision_override_pass",
                        url,
                        retry_assertions,
                    ));
                }
                ok = retry_ok;
                assertions = retry_assertions;
            }
        }

        let outcome = if ok {
            StepOutcome::passed("clicked", url, assertions)
        } else {
            StepOutcome::failed("clicked", url, assertions)
        };
        Ok(outcome)
    }

    /// Apply every verification predicate of a step.
    ///
    /// Required steps poll each predicate under the bounded verification
    /// loop, re-snapshotting until it holds or the budget runs out; step
    /// success is the conjunction of those outcomes. Non-required steps
    /// evaluate once against the supplied observation and only annotate.
    pub async fn apply_verifications(
        &self,
        specs: &[PredicateSpec],
        required: bool,
        current: Option<&Observation>,
    ) -> (bool, Vec<AssertionRecord>) {
        if specs.is_empty() {
            return (true, Vec::new());
        }

        let once_obs = if required {
            None
        } else {
            match current {
                Some(obs) => Some(obs.clone()),
                None => self.backend.snapshot().await.ok(),
            }
        };

        let mut ok_all = true;
        let mut records = Vec::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            let label = format!("verify_{}", index + 1);
            let passed = match Predicate::compile(spec) {
                Ok(predicate) => {
                    if required {
                        self.check_eventually(&predicate, &self.cfg.verify_poll).await
                    } else {
                        once_obs
                            .as_ref()
                            .map(|obs| evaluate(&predicate, obs))
                            .unwrap_or(false)
                    }
                }
                Err(err) => {
                    // Validated plans always compile; reaching this means
                    // the caller skipped validation.
                    warn!(%err, label = %label, "verification spec failed to compile");
                    false
                }
            };
            debug!(label = %label, required, passed, "verification predicate evaluated");
            if required && !passed {
                ok_all = false;
            }
            records.push(AssertionRecord::new(label, required, passed));
        }
        (ok_all, records)
    }

    /// Bounded poll until the predicate holds: re-snapshot, evaluate, sleep.
    /// Ends with `false` on timeout or snapshot-cap exhaustion, never an
    /// error.
    pub async fn check_eventually(&self, predicate: &Predicate, policy: &PollPolicy) -> bool {
        let deadline = Instant::now() + Duration::from_millis(policy.timeout_ms);
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.backend.snapshot().await {
                Ok(obs) => {
                    if evaluate(predicate, &obs) {
                        return true;
                    }
                }
                Err(err) => warn!(%err, "snapshot failed during verification poll"),
            }
            if attempts >= policy.max_snapshots || Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_millis(policy.interval_ms)).await;
        }
    }

    /// Type text character by character with randomized human-like cadence.
    async fn type_with_tempo(&self, text: &str) -> Result<(), BackendError> {
        let tempo = &self.cfg.typing;
        for ch in text.chars() {
            self.backend.type_text(&ch.to_string()).await?;
            let (key_delay, pause) = {
                let mut rng = rand::thread_rng();
                let key_delay = if tempo.max_key_delay_ms > tempo.min_key_delay_ms {
                    rng.gen_range(tempo.min_key_delay_ms..=tempo.max_key_delay_ms)
                } else {
                    tempo.min_key_delay_ms
                };
                let pause = (tempo.pause_chance > 0.0 && rng.gen_bool(tempo.pause_chance))
                    .then(|| {
                        if tempo.max_pause_ms > tempo.min_pause_ms {
                            rng.gen_range(tempo.min_pause_ms..=tempo.max_pause_ms)
                        } else {
                            tempo.min_pause_ms
                        }
                    });
                (key_delay, pause)
            };
            if key_delay > 0 {
                sleep(Duration::from_millis(key_delay)).await;
            }
            if let Some(pause_ms) = pause {
                sleep(Duration::from_millis(pause_ms)).await;
            }
        }
        Ok(())
    }

    /// Poll until enough candidate detail links are present for a
    /// first-result click.
    async fn await_result_links(&self) -> bool {
        let policy = &self.cfg.hydration_poll;
        let deadline = Instant::now() + Duration::from_millis(policy.timeout_ms);
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.backend.snapshot().await {
                Ok(obs) => {
                    let links = obs
                        .elements
                        .iter()
                        .filter(|el| {
                            el.href
                                .as_deref()
                                .map(|href| self.cfg.results_shape.is_detail_href(href))
                                .unwrap_or(false)
                        })
                        .count();
                    if links >= self.cfg.min_result_links {
                        return true;
                    }
                    debug!(links, needed = self.cfg.min_result_links, "results still hydrating");
                }
                Err(err) => warn!(%err, "snapshot failed during hydration poll"),
            }
            if attempts >= policy.max_snapshots || Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_millis(policy.interval_ms)).await;
        }
    }

    fn alt_search_predicate(&self) -> Predicate {
        Predicate::AnyOf(
            self.cfg
                .alt_search_roles
                .iter()
                .map(|role| Predicate::Exists(Selector::Role(role.clone())))
                .collect(),
        )
    }

    /// Consult the vision oracle for a click target, journaling the
    /// exchange. Returns `None` when vision is not configured, the call
    /// fails, or the reply is unparseable.
    async fn vision_select(
        &self,
        view: &StepView<'_>,
        compact: &str,
        reason: &str,
    ) -> Option<u32> {
        let vision = self.vision?;
        let shot = match self.backend.screenshot().await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%err, "screenshot failed; skipping vision fallback");
                return None;
            }
        };
        let user = prompts::vision_select_user(view.goal, reason, compact);
        let reply = match vision
            .generate_with_image(prompts::VISION_SELECT_SYSTEM, &user, &shot)
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                warn!(%err, "vision oracle failed");
                return None;
            }
        };
        let selected = parse_click_id(&reply.content);
        info!(reason, selected, "vision oracle consulted");
        self.journal_event(RunEvent::VisionSelect {
            step_id: view.id.unwrap_or(0),
            reason: reason.to_string(),
            response: reply.content.clone(),
            selected_id: selected,
        });
        selected
    }

    fn compact(&self, obs: &Observation, limit: usize) -> String {
        format_observation(obs, limit, self.cfg.max_element_text_len)
    }

    fn journal_event(&self, event: RunEvent) {
        if let Some(journal) = self.journal {
            if let Err(err) = journal.append(&RunRecord::now(self.run_id, event)) {
                warn!(%err, "journal append failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use waypoint_core_types::Element;

    use super::*;
    use crate::oracle::{ScriptedOracle, ScriptedVisionOracle};

    #[derive(Default)]
    struct FakeBackend {
        inner: Mutex<Inner>,
    }

    #[derive(Default)]
    struct Inner {
        url: String,
        elements: Vec<Element>,
        on_navigate: HashMap<String, String>,
        on_click: HashMap<u32, (String, Vec<Element>)>,
        on_submit: Option<(String, Vec<Element>)>,
        fail_navigate: Option<BackendError>,
        clicks: Vec<u32>,
        typed: Vec<String>,
        submitted: bool,
    }

    impl FakeBackend {
        fn at(url: &str, elements: Vec<Element>) -> Self {
            let backend = Self::default();
            {
                let mut inner = backend.inner.lock();
                inner.url = url.to_string();
                inner.elements = elements;
            }
            backend
        }

        fn map_navigate(&self, target: &str, landed: &str) {
            self.inner
                .lock()
                .on_navigate
                .insert(target.to_string(), landed.to_string());
        }

        fn map_click(&self, id: u32, url: &str, elements: Vec<Element>) {
            self.inner
                .lock()
                .on_click
                .insert(id, (url.to_string(), elements));
        }

        fn map_submit(&self, url: &str, elements: Vec<Element>) {
            self.inner.lock().on_submit = Some((url.to_string(), elements));
        }

        fn fail_navigation(&self, err: BackendError) {
            self.inner.lock().fail_navigate = Some(err);
        }

        fn clicks(&self) -> Vec<u32> {
            self.inner.lock().clicks.clone()
        }

        fn typed(&self) -> String {
            self.inner.lock().typed.concat()
        }

        fn submitted(&self) -> bool {
            self.inner.lock().submitted
        }
    }

    #[async_trait]
    impl ActionBackend for FakeBackend {
        async fn navigate(&self, url: &str) -> Result<(), BackendError> {
            let mut inner = self.inner.lock();
            if let Some(err) = inner.fail_navigate.clone() {
                return Err(err);
            }
            inner.url = inner
                .on_navigate
                .get(url)
                .cloned()
                .unwrap_or_else(|| url.to_string());
            Ok(())
        }

        async fn click(&self, element_id: u32) -> Result<(), BackendError> {
            let mut inner = self.inner.lock();
            inner.clicks.push(element_id);
            if let Some((url, elements)) = inner.on_click.get(&element_id).cloned() {
                inner.url = url;
                inner.elements = elements;
            }
            Ok(())
        }

        async fn type_text(&self, text: &str) -> Result<(), BackendError> {
            self.inner.lock().typed.push(text.to_string());
            Ok(())
        }

        async fn submit(&self) -> Result<(), BackendError> {
            let mut inner = self.inner.lock();
            inner.submitted = true;
            if let Some((url, elements)) = inner.on_submit.clone() {
                inner.url = url;
                inner.elements = elements;
            }
            Ok(())
        }

        async fn snapshot(&self) -> Result<Observation, BackendError> {
            let inner = self.inner.lock();
            Ok(Observation {
                url: inner.url.clone(),
                elements: inner.elements.clone(),
            })
        }

        async fn screenshot(&self) -> Result<Vec<u8>, BackendError> {
            Ok(vec![0u8; 4])
        }
    }

    fn verify_url_contains(needle: &str) -> Vec<PredicateSpec> {
        vec![PredicateSpec::new("url_contains", vec![json!(needle)])]
    }

    fn navigate_view<'a>(target: &'a str, verify: &'a [PredicateSpec], required: bool) -> StepView<'a> {
        StepView {
            id: Some(1),
            goal: "open page",
            action: ActionKind::Navigate,
            target: Some(target),
            intent: None,
            input: None,
            verify,
            required,
        }
    }

    fn click_view<'a>(intent: &'a str, verify: &'a [PredicateSpec], required: bool) -> StepView<'a> {
        StepView {
            id: Some(2),
            goal: "click something",
            action: ActionKind::Click,
            target: None,
            intent: Some(intent),
            input: None,
            verify,
            required,
        }
    }

    fn result_links() -> Vec<Element> {
        vec![
            Element::new(10, "link", "Laptop A").with_href("https://shop.example/dp/A1"),
            Element::new(11, "link", "Laptop B").with_href("https://shop.example/dp/B2"),
            Element::new(12, "link", "Laptop C").with_href("https://shop.example/gp/product/C3"),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn navigate_passes_verification_on_landed_url() {
        let backend = FakeBackend::at("about:blank", vec![]);
        backend.map_navigate("https://x", "https://x.com/home");
        let oracle = ScriptedOracle::new(Vec::<String>::new());
        let cfg = EngineConfig::fast();
        let executor = StepExecutor::new(&backend, &oracle, None, None, &cfg, "run");

        let verify = verify_url_contains("x");
        let outcome = executor.execute(&navigate_view("https://x", &verify, true)).await;
        assert!(outcome.success);
        assert_eq!(outcome.note, "navigated");
        assert_eq!(outcome.url, "https://x.com/home");
        assert_eq!(outcome.assertions.len(), 1);
        assert!(outcome.assertions[0].passed);
    }

    #[tokio::test(start_paused = true)]
    async fn navigate_required_verification_times_out_to_failure() {
        let backend = FakeBackend::at("about:blank", vec![]);
        backend.map_navigate("https://y", "https://x.com/home");
        let oracle = ScriptedOracle::new(Vec::<String>::new());
        let cfg = EngineConfig::fast();
        let executor = StepExecutor::new(&backend, &oracle, None, None, &cfg, "run");

        let verify = verify_url_contains("y.com");
        let outcome = executor.execute(&navigate_view("https://y", &verify, true)).await;
        assert!(!outcome.success);
        assert!(!outcome.assertions[0].passed);
    }

    #[tokio::test(start_paused = true)]
    async fn backend_failure_is_recovered_into_failed_outcome() {
        let backend = FakeBackend::at("about:blank", vec![]);
        backend.fail_navigation(BackendError::PageGone("target closed".to_string()));
        let oracle = ScriptedOracle::new(Vec::<String>::new());
        let cfg = EngineConfig::fast();
        let executor = StepExecutor::new(&backend, &oracle, None, None, &cfg, "run");

        let outcome = executor.execute(&navigate_view("https://x", &[], false)).await;
        assert!(!outcome.success);
        assert!(outcome.note.starts_with("backend_error"));
        assert!(outcome.note.contains("target closed"));
    }

    #[tokio::test(start_paused = true)]
    async fn type_and_submit_types_submits_and_verifies_results_shape() {
        let backend = FakeBackend::at(
            "https://www.amazon.com/",
            vec![Element::new(5, "searchbox", "")],
        );
        backend.map_submit("https://www.amazon.com/s?k=laptop", result_links());
        // Focus call resolves the searchbox, then the step types.
        let oracle = ScriptedOracle::new(["CLICK(5)"]);
        let cfg = EngineConfig::fast();
        let executor = StepExecutor::new(&backend, &oracle, None, None, &cfg, "run");

        let verify = verify_url_contains("k=laptop");
        let view = StepView {
            id: Some(3),
            goal: "search for laptop",
            action: ActionKind::TypeAndSubmit,
            target: None,
            intent: None,
            input: Some("laptop"),
            verify: &verify,
            required: true,
        };
        let outcome = executor.execute(&view).await;
        assert!(outcome.success, "note={}", outcome.note);
        assert_eq!(outcome.note, "typed_and_submitted");
        assert_eq!(backend.typed(), "laptop");
        assert!(backend.submitted());
        assert_eq!(backend.clicks(), vec![5]);
    }

    #[tokio::test(start_paused = true)]
    async fn type_and_submit_fails_fast_when_landing_is_not_results() {
        let backend = FakeBackend::at("https://www.amazon.com/", vec![]);
        backend.map_submit("https://www.amazon.com/", vec![]);
        let oracle = ScriptedOracle::new(["no target"]);
        let cfg = EngineConfig::fast();
        let executor = StepExecutor::new(&backend, &oracle, None, None, &cfg, "run");

        let verify = verify_url_contains("k=laptop");
        let view = StepView {
            id: Some(3),
            goal: "search",
            action: ActionKind::TypeAndSubmit,
            target: None,
            intent: None,
            input: Some("laptop"),
            verify: &verify,
            required: true,
        };
        let outcome = executor.execute(&view).await;
        assert!(!outcome.success);
        assert_eq!(outcome.note, NOTE_SEARCH_RESULTS_NOT_VERIFIED);
        // The shape gate fails before verification is consulted.
        assert!(outcome.assertions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn click_fails_without_target_when_vision_is_absent() {
        let backend = FakeBackend::at("https://shop.example/s?k=laptop", result_links());
        let oracle = ScriptedOracle::new(["I would click the blue one."]);
        let cfg = EngineConfig::fast();
        let executor = StepExecutor::new(&backend, &oracle, None, None, &cfg, "run");

        let outcome = executor.execute(&click_view("add_to_cart", &[], false)).await;
        assert!(!outcome.success);
        assert_eq!(outcome.note, NOTE_CLICK_ID_MISSING);
        assert!(backend.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn vision_fallback_resolves_missing_click_id_once() {
        let backend = FakeBackend::at("https://shop.example/s?k=laptop", result_links());
        backend.map_click(10, "https://shop.example/dp/A1", vec![]);
        let oracle = ScriptedOracle::new(["no id here"]);
        let vision = ScriptedVisionOracle::new(["CLICK(10)"]);
        let cfg = EngineConfig::fast();
        let executor = StepExecutor::new(&backend, &oracle, Some(&vision), None, &cfg, "run");

        let verify = verify_url_contains("/dp/");
        let outcome = executor
            .execute(&click_view("first_product_link", &verify, true))
            .await;
        assert!(outcome.success, "note={}", outcome.note);
        assert_eq!(backend.clicks(), vec![10]);
        assert_eq!(vision.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn vision_is_never_consulted_on_the_success_path() {
        let backend = FakeBackend::at("https://shop.example/s?k=laptop", result_links());
        backend.map_click(10, "https://shop.example/dp/A1", vec![]);
        let oracle = ScriptedOracle::new(["CLICK(10)"]);
        let vision = ScriptedVisionOracle::new(["CLICK(11)"]);
        let cfg = EngineConfig::fast();
        let executor = StepExecutor::new(&backend, &oracle, Some(&vision), None, &cfg, "run");

        let verify = verify_url_contains("/dp/");
        let outcome = executor
            .execute(&click_view("first_product_link", &verify, true))
            .await;
        assert!(outcome.success);
        assert_eq!(vision.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn vision_override_retries_failed_required_verification_once() {
        let backend = FakeBackend::at("https://shop.example/s?k=laptop", result_links());
        // First click lands on a sponsored interstitial; the vision pick
        // reaches the detail page.
        backend.map_click(12, "https://shop.example/interstitial", result_links());
        backend.map_click(10, "https://shop.example/dp/A1", vec![]);
        let oracle = ScriptedOracle::new(["CLICK(12)"]);
        let vision = ScriptedVisionOracle::new(["CLICK(10)"]);
        let cfg = EngineConfig::fast();
        let executor = StepExecutor::new(&backend, &oracle, Some(&vision), None, &cfg, "run");

        let verify = verify_url_contains("/dp/");
        let outcome = executor
            .execute(&click_view("first_product_link", &verify, true))
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.note, "vision_override_pass");
        assert_eq!(backend.clicks(), vec![12, 10]);
        assert_eq!(vision.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hydration_guard_fails_before_consulting_the_oracle() {
        let backend = FakeBackend::at(
            "https://shop.example/s?k=laptop",
            vec![Element::new(1, "link", "nav chrome")],
        );
        let oracle = ScriptedOracle::new(["CLICK(1)"]);
        let cfg = EngineConfig::fast();
        let executor = StepExecutor::new(&backend, &oracle, None, None, &cfg, "run");

        let outcome = executor
            .execute(&click_view("first_product_link", &[], true))
            .await;
        assert!(!outcome.success);
        assert_eq!(outcome.note, NOTE_PRODUCT_LINKS_NOT_FOUND);
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn alternate_role_rescues_failed_search_box_verification() {
        let backend = FakeBackend::at(
            "https://www.amazon.com/ref=nav",
            vec![Element::new(5, "combobox", "")],
        );
        let oracle = ScriptedOracle::new(["CLICK(5)"]);
        let cfg = EngineConfig::fast();
        let executor = StepExecutor::new(&backend, &oracle, None, None, &cfg, "run");

        // The plan asked for role=textbox, but the site reports combobox.
        let verify = vec![PredicateSpec::new("exists", vec![json!("role=textbox")])];
        let outcome = executor.execute(&click_view("search_box", &verify, true)).await;
        assert!(outcome.success);
        assert_eq!(outcome.note, "search_box_detected_alt");
    }

    #[tokio::test(start_paused = true)]
    async fn non_required_predicates_annotate_without_failing() {
        let backend = FakeBackend::at("https://shop.example/cart", vec![]);
        backend.map_navigate("https://shop.example/cart", "https://shop.example/cart");
        let oracle = ScriptedOracle::new(Vec::<String>::new());
        let cfg = EngineConfig::fast();
        let executor = StepExecutor::new(&backend, &oracle, None, None, &cfg, "run");

        let verify = verify_url_contains("checkout");
        let outcome = executor
            .execute(&navigate_view("https://shop.example/cart", &verify, false))
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.assertions.len(), 1);
        assert!(!outcome.assertions[0].passed);
    }
}
