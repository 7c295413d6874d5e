//! Engine configuration.
//!
//! Every retry and poll constant here is a tuned default, not a load-bearing
//! invariant; hosts override them through the builder methods.

use plan_schema::Step;
use serde::{Deserialize, Serialize};

/// Bounded poll loop shape: wall-clock timeout, re-check interval, and a cap
/// on snapshot attempts. Exceeding either bound ends the loop with a
/// negative result, never an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    pub timeout_ms: u64,
    pub interval_ms: u64,
    pub max_snapshots: u32,
}

impl PollPolicy {
    pub const fn new(timeout_ms: u64, interval_ms: u64, max_snapshots: u32) -> Self {
        Self {
            timeout_ms,
            interval_ms,
            max_snapshots,
        }
    }
}

/// Humanized typing cadence for `TYPE_AND_SUBMIT`. The randomized delays
/// model human keystroke timing; this is an anti-bot-detection measure, not
/// a performance knob.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypingTempo {
    /// Minimum per-keystroke delay.
    /// Default: 40
    pub min_key_delay_ms: u64,
    /// Maximum per-keystroke delay.
    /// Default: 140
    pub max_key_delay_ms: u64,
    /// Probability of an additional thinking pause after a keystroke.
    /// Default: 0.08
    pub pause_chance: f64,
    /// Minimum thinking-pause length.
    /// Default: 180
    pub min_pause_ms: u64,
    /// Maximum thinking-pause length.
    /// Default: 520
    pub max_pause_ms: u64,
}

impl Default for TypingTempo {
    fn default() -> Self {
        Self {
            min_key_delay_ms: 40,
            max_key_delay_ms: 140,
            pause_chance: 0.08,
            min_pause_ms: 180,
            max_pause_ms: 520,
        }
    }
}

impl TypingTempo {
    /// Zero-delay tempo for tests.
    pub fn instant() -> Self {
        Self {
            min_key_delay_ms: 0,
            max_key_delay_ms: 0,
            pause_chance: 0.0,
            min_pause_ms: 0,
            max_pause_ms: 0,
        }
    }
}

/// URL shape of a search-results page on the primary demonstrated site.
/// After `TYPE_AND_SUBMIT`, the landing URL must look like results
/// (keyword in the URL or a results-path marker) and explicitly not like a
/// product detail page or the home page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsPageShape {
    /// Query parameter carrying the search keyword.
    /// Default: "k"
    pub keyword_param: String,
    /// Path fragments that identify a results page.
    pub results_markers: Vec<String>,
    /// Path fragments that identify a product detail page.
    pub detail_markers: Vec<String>,
    /// Host suffixes whose bare root counts as the home page.
    pub home_hosts: Vec<String>,
}

impl Default for ResultsPageShape {
    fn default() -> Self {
        Self {
            keyword_param: "k".to_string(),
            results_markers: vec!["/s".to_string(), "s?k=".to_string()],
            detail_markers: vec!["/dp/".to_string(), "/gp/product/".to_string()],
            home_hosts: vec!["amazon.com".to_string()],
        }
    }
}

impl ResultsPageShape {
    /// Whether `url` looks like a results page for `query`.
    pub fn is_results_page(&self, url: &str, query: &str) -> bool {
        let current = url.to_lowercase();
        let keyword_in_url = !query.trim().is_empty()
            && current.contains(&format!("{}={}", self.keyword_param, query.to_lowercase()));
        let results_marker = self
            .results_markers
            .iter()
            .any(|marker| current.contains(marker.as_str()));
        let not_detail = !self
            .detail_markers
            .iter()
            .any(|marker| current.contains(marker.as_str()));
        let trimmed = current.trim_end_matches('/');
        let not_home = !self
            .home_hosts
            .iter()
            .any(|host| trimmed.ends_with(host.as_str()));
        (keyword_in_url || results_marker) && not_detail && not_home
    }

    /// Whether the element href points at a product detail page.
    pub fn is_detail_href(&self, href: &str) -> bool {
        self.detail_markers
            .iter()
            .any(|marker| href.contains(marker.as_str()))
    }
}

/// Engine-wide configuration with tuned defaults and builder overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Replans allowed per run before aborting.
    /// Default: 1
    pub max_replans: u32,
    /// Oracle attempts per plan/replan parse cycle (lenient, then strict).
    /// Default: 2
    pub plan_attempts: u32,
    /// Poll loop for required verification predicates.
    /// Default: 8s / 0.5s / 8 snapshots
    pub verify_poll: PollPolicy,
    /// Poll loop waiting for result links to hydrate before a
    /// first-result click.
    /// Default: 12s / 0.5s / 12 snapshots
    pub hydration_poll: PollPolicy,
    /// Poll loop for the overlay-visibility gate ahead of substeps.
    /// Default: 4s / 0.4s / 4 snapshots
    pub overlay_poll: PollPolicy,
    /// Short recheck for alternate search-input roles after a failed
    /// required `search_box` verification.
    /// Default: 3s / 0.3s / 3 snapshots
    pub alt_role_poll: PollPolicy,
    /// Settle delay after navigation. Default: 1500
    pub navigate_settle_ms: u64,
    /// Settle delay after a click. Default: 1200
    pub post_click_settle_ms: u64,
    /// Settle delay after submitting typed input. Default: 1500
    pub post_submit_settle_ms: u64,
    /// Settle delay after focusing an input. Default: 400
    pub focus_settle_ms: u64,
    /// Elements rendered into ordinary oracle prompts. Default: 60
    pub snapshot_limit: usize,
    /// Elements rendered when selecting among search results. Default: 120
    pub results_snapshot_limit: usize,
    /// Per-element text cap in compact renderings. Default: 80
    pub max_element_text_len: usize,
    /// Candidate detail links required before a first-result click.
    /// Default: 3
    pub min_result_links: usize,
    /// Intents that mean "click the first result/product".
    pub first_result_intents: Vec<String>,
    /// Intents that mean "focus the search input".
    pub search_box_intents: Vec<String>,
    /// Roles accepted as a search input by the alternate-role recheck.
    pub alt_search_roles: Vec<String>,
    /// Text indicators whose presence marks an open drawer/overlay.
    pub overlay_indicators: Vec<String>,
    pub typing: TypingTempo,
    pub results_shape: ResultsPageShape,
    /// Baseline steps appended when a shape-failure replan lacks a
    /// `TYPE_AND_SUBMIT` step. Empty disables the guardrail.
    pub replan_baseline: Vec<Step>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_replans: 1,
            plan_attempts: 2,
            verify_poll: PollPolicy::new(8_000, 500, 8),
            hydration_poll: PollPolicy::new(12_000, 500, 12),
            overlay_poll: PollPolicy::new(4_000, 400, 4),
            alt_role_poll: PollPolicy::new(3_000, 300, 3),
            navigate_settle_ms: 1_500,
            post_click_settle_ms: 1_200,
            post_submit_settle_ms: 1_500,
            focus_settle_ms: 400,
            snapshot_limit: 60,
            results_snapshot_limit: 120,
            max_element_text_len: 80,
            min_result_links: 3,
            first_result_intents: vec![
                "first_product_link".to_string(),
                "first_search_result".to_string(),
            ],
            search_box_intents: vec!["search_box".to_string()],
            alt_search_roles: vec![
                "searchbox".to_string(),
                "textbox".to_string(),
                "combobox".to_string(),
            ],
            overlay_indicators: vec![
                "Add to Your Order".to_string(),
                "No thanks".to_string(),
                "Add protection".to_string(),
            ],
            typing: TypingTempo::default(),
            results_shape: ResultsPageShape::default(),
            replan_baseline: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Short poll budgets and instant typing, for tests.
    pub fn fast() -> Self {
        Self {
            verify_poll: PollPolicy::new(400, 50, 3),
            hydration_poll: PollPolicy::new(400, 50, 3),
            overlay_poll: PollPolicy::new(200, 50, 2),
            alt_role_poll: PollPolicy::new(200, 50, 2),
            navigate_settle_ms: 0,
            post_click_settle_ms: 0,
            post_submit_settle_ms: 0,
            focus_settle_ms: 0,
            typing: TypingTempo::instant(),
            ..Self::default()
        }
    }

    /// Builder: replan budget.
    pub fn max_replans(mut self, budget: u32) -> Self {
        self.max_replans = budget;
        self
    }

    /// Builder: parse attempts per plan request.
    pub fn plan_attempts(mut self, attempts: u32) -> Self {
        self.plan_attempts = attempts;
        self
    }

    /// Builder: required-verification poll loop.
    pub fn verify_poll(mut self, policy: PollPolicy) -> Self {
        self.verify_poll = policy;
        self
    }

    /// Builder: results-page URL shape.
    pub fn results_shape(mut self, shape: ResultsPageShape) -> Self {
        self.results_shape = shape;
        self
    }

    /// Builder: replan baseline guardrail steps.
    pub fn replan_baseline(mut self, steps: Vec<Step>) -> Self {
        self.replan_baseline = steps;
        self
    }

    pub(crate) fn is_first_result_intent(&self, intent: &str) -> bool {
        self.first_result_intents
            .iter()
            .any(|known| known.eq_ignore_ascii_case(intent))
    }

    pub(crate) fn is_search_box_intent(&self, intent: &str) -> bool {
        self.search_box_intents
            .iter()
            .any(|known| known.eq_ignore_ascii_case(intent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_tuned_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.max_replans, 1);
        assert_eq!(cfg.plan_attempts, 2);
        assert_eq!(cfg.verify_poll, PollPolicy::new(8_000, 500, 8));
        assert_eq!(cfg.hydration_poll.timeout_ms, 12_000);
    }

    #[test]
    fn builders_override_defaults() {
        let cfg = EngineConfig::new()
            .max_replans(3)
            .plan_attempts(4)
            .verify_poll(PollPolicy::new(1_000, 100, 2));
        assert_eq!(cfg.max_replans, 3);
        assert_eq!(cfg.plan_attempts, 4);
        assert_eq!(cfg.verify_poll.max_snapshots, 2);
    }

    #[test]
    fn results_shape_accepts_keyword_and_results_urls() {
        let shape = ResultsPageShape::default();
        assert!(shape.is_results_page("https://www.amazon.com/s?k=laptop", "laptop"));
        assert!(shape.is_results_page("https://www.amazon.com/s?k=laptop&ref=nav", "other"));
    }

    #[test]
    fn results_shape_rejects_detail_and_home_pages() {
        let shape = ResultsPageShape::default();
        assert!(!shape.is_results_page("https://www.amazon.com/dp/B00X?k=laptop", "laptop"));
        assert!(!shape.is_results_page("https://www.amazon.com/", "laptop"));
        assert!(!shape.is_results_page("https://www.amazon.com", "laptop"));
    }

    #[test]
    fn intent_matching_is_case_insensitive() {
        let cfg = EngineConfig::default();
        assert!(cfg.is_first_result_intent("FIRST_PRODUCT_LINK"));
        assert!(cfg.is_search_box_intent("Search_Box"));
        assert!(!cfg.is_first_result_intent("add_to_cart"));
    }
}
