//! Prompt builders for the planning, executor, and vision oracles.

use crate::observe::SNAPSHOT_HEADER;

/// System prompt for initial planning.
pub const PLANNER_SYSTEM: &str = "\
You are the PLANNER. Output a JSON plan for an Executor to run.
The Executor can only click/type using element IDs from snapshots.
Include explicit verification predicates per step.
Use stop_if_true for steps whose success should end the run early.
Do NOT hardcode product URLs; use a CLICK step on the first product link.";

/// System prompt for replanning after a failure.
pub const REPLAN_SYSTEM: &str = "\
You are the PLANNER. Output a JSON plan for an Executor to run.
Keep the same JSON format as the original plan.
Only include the remaining steps from the current point onward.
Do not include any extra keys beyond the schema.
Actions must be one of: NAVIGATE, CLICK, TYPE_AND_SUBMIT.
Step ids in a replan MUST start at 1 and be contiguous.
Do NOT hardcode product URLs; use CLICK on a product link.";

/// System prompt for resolving a click target from a snapshot.
pub const SELECTOR_SYSTEM: &str = "You are a careful web agent. Output only CLICK(<id>).";

/// System prompt for the vision fallback selector.
pub const VISION_SELECT_SYSTEM: &str = "You are a visual selector. Output only CLICK(<id>).";

const STRICT_NOTE: &str = "Return ONLY a JSON object. Do not include any other text.\n";

const PLAN_FORMAT_EXAMPLE: &str = r#"Format example (match keys exactly):
{
  "task": "Shopping cart checkout flow",
  "notes": ["Executor types with human-like jitter", "Stop on sign-in redirect"],
  "steps": [
    {
      "id": 1,
      "goal": "Navigate to the shop homepage",
      "action": "NAVIGATE",
      "target": "https://www.example.com",
      "verify": [{ "predicate": "url_contains", "args": ["example."] }],
      "required": true
    },
    {
      "id": 2,
      "goal": "Type the search query and submit",
      "action": "TYPE_AND_SUBMIT",
      "input": "laptop",
      "verify": [{ "predicate": "url_contains", "args": ["k=laptop"] }],
      "required": true
    },
    {
      "id": 3,
      "goal": "Click the FIRST product link in search results",
      "action": "CLICK",
      "intent": "first_product_link",
      "verify": [{ "predicate": "url_contains", "args": ["/dp/"] }],
      "required": true,
      "optional_substeps": [
        {
          "goal": "If an upsell drawer appears, dismiss it",
          "action": "CLICK",
          "intent": "drawer_no_thanks",
          "verify": [{ "predicate": "not_exists", "args": ["text~'Add to Your Order'"] }],
          "required": false
        }
      ]
    },
    {
      "id": 4,
      "goal": "Proceed to checkout",
      "action": "CLICK",
      "intent": "proceed_to_checkout",
      "verify": [{ "predicate": "any_of", "args": [
        { "predicate": "url_contains", "args": ["signin"] },
        { "predicate": "url_contains", "args": ["/ap/"] }
      ]}],
      "required": false,
      "stop_if_true": true
    }
  ]
}"#;

/// User prompt requesting an initial plan. The strict variant demands bare
/// JSON; accumulated validation errors from a prior attempt are appended as
/// corrective feedback.
pub fn planner_user(task: &str, strict: bool, schema_errors: Option<&str>) -> String {
    let strict_note = if strict { STRICT_NOTE } else { "" };
    let schema_note = schema_errors
        .map(|errors| format!("\nSchema errors from last attempt:\n{errors}\n"))
        .unwrap_or_default();
    format!(
        "Task: {task}\n{strict_note}{schema_note}\n\
Output JSON with fields:\n\
- task: string\n\
- notes: list of strings\n\
- steps: list of steps (id, goal, action, target/intent/input, verify, required, stop_if_true?, optional_substeps?)\n\n\
Predicates allowed: url_contains, url_matches, exists, not_exists, element_count, any_of, all_of.\n\
Note: url_contains expects a single string; use any_of for multiple options.\n\n\
{PLAN_FORMAT_EXAMPLE}\n"
    )
}

/// User prompt requesting a revised remaining-work plan after a failure.
pub fn replan_user(task: &str, feedback: &str, strict: bool, schema_errors: Option<&str>) -> String {
    let strict_note = if strict { STRICT_NOTE } else { "" };
    let schema_note = schema_errors
        .map(|errors| format!("\nSchema errors from last attempt:\n{errors}\n"))
        .unwrap_or_default();
    format!(
        "Task: {task}\n{strict_note}\n\
Execution feedback:\n{feedback}\n{schema_note}\n\
Return a revised JSON plan for the remaining steps only.\n\n\
{PLAN_FORMAT_EXAMPLE}\n"
    )
}

/// User prompt asking the executor oracle to pick a click target from the
/// compact snapshot. First-result intents get extra disambiguation rules so
/// the oracle prefers result links over navigation chrome.
pub fn selector_user(
    goal: &str,
    intent: Option<&str>,
    compact: &str,
    detail_markers: &[String],
    first_result: bool,
) -> String {
    let intent_line = intent
        .map(|value| format!("Intent: {value}\n"))
        .unwrap_or_default();
    let extra_rules = if first_result {
        let markers = detail_markers.join("' or '");
        format!(
            "CRITICAL RULES FOR SEARCH RESULTS:\n\
1) ONLY click product links whose href contains '{markers}'.\n\
2) Ignore menu items and top-nav links.\n\
3) If multiple match, choose the FIRST product link in the main results list.\n\n"
        )
    } else {
        String::new()
    };
    format!(
        "You are controlling a browser via element IDs.\n\n\
You must respond with exactly ONE action in this format:\n\
- CLICK(<id>)\n\n\
Goal: {goal}\n{intent_line}{extra_rules}\
SNAPSHOT FORMAT: {SNAPSHOT_HEADER}\n\n{compact}\n"
    )
}

/// User prompt for the vision fallback: pick a target from the screenshot
/// plus the compact element list.
pub fn vision_select_user(goal: &str, reason: &str, compact: &str) -> String {
    format!(
        "Select the best element ID from the snapshot list based on the screenshot.\n\
Goal: {goal}\n\
Reason: {reason}\n\n\
Snapshot list ({SNAPSHOT_HEADER}):\n{compact}\n\n\
Return ONLY: CLICK(<id>)"
    )
}
