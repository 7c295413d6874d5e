//! Best-effort repair of predictable planner-output deviations.
//!
//! Normalization runs before validation and is not a substitute for it: it
//! absorbs the deviations oracles produce reliably (field aliases, arity
//! conflation, placeholder URLs) so the validator's error surface stays
//! focused on genuine plan defects.

use serde_json::{json, Map, Value};

/// Path fragment identifying a product detail page on the primary
/// demonstrated site; used both to detect path-fragment "regexes" and as the
/// rewrite target for placeholder product URLs.
const PRODUCT_PATH_MARKER: &str = "/dp/";

/// Token planners emit when they hardcode a templated product URL instead of
/// clicking through from search results.
const PLACEHOLDER_TOKEN: &str = "product-url";

const FIRST_PRODUCT_INTENT: &str = "first_product_link";
const FIRST_PRODUCT_GOAL: &str = "Click the FIRST product link in search results";

/// Rewrite a raw plan value toward the expected schema. Pure; unknown
/// structures pass through untouched for the validator to report.
pub fn normalize_plan(mut plan: Value) -> Value {
    if let Some(steps) = plan.get_mut("steps").and_then(Value::as_array_mut) {
        for step in steps.iter_mut() {
            let Some(step) = step.as_object_mut() else {
                continue;
            };
            normalize_step(step);
            if let Some(subs) = step
                .get_mut("optional_substeps")
                .and_then(Value::as_array_mut)
            {
                for sub in subs.iter_mut() {
                    if let Some(sub) = sub.as_object_mut() {
                        normalize_step(sub);
                    }
                }
            }
        }
    }
    plan
}

fn normalize_step(step: &mut Map<String, Value>) {
    // `url` is a common alias for `target`.
    if step.contains_key("url") && !step.contains_key("target") {
        if let Some(url) = step.remove("url") {
            step.insert("target".to_string(), url);
        }
    }

    if let Some(action) = step.get("action").and_then(Value::as_str) {
        let mut upper = action.trim().to_ascii_uppercase();
        if upper == "TYPE" {
            upper = "TYPE_AND_SUBMIT".to_string();
        }
        step.insert("action".to_string(), Value::String(upper));
    }

    if let Some(verify) = step.get_mut("verify").and_then(Value::as_array_mut) {
        for spec in verify.iter_mut() {
            normalize_predicate(spec);
        }
    }

    // A templated product URL cannot be navigated; convert the step into a
    // click on the first product link with a detail-page verification.
    let placeholder = step
        .get("target")
        .and_then(Value::as_str)
        .map(|target| target.contains(PLACEHOLDER_TOKEN))
        .unwrap_or(false);
    if placeholder {
        step.remove("target");
        step.insert("action".to_string(), json!("CLICK"));
        let has_intent = step
            .get("intent")
            .and_then(Value::as_str)
            .map(|intent| !intent.trim().is_empty())
            .unwrap_or(false);
        if !has_intent {
            step.insert("intent".to_string(), json!(FIRST_PRODUCT_INTENT));
        }
        let has_goal = step
            .get("goal")
            .and_then(Value::as_str)
            .map(|goal| !goal.trim().is_empty())
            .unwrap_or(false);
        if !has_goal {
            step.insert("goal".to_string(), json!(FIRST_PRODUCT_GOAL));
        }
        step.insert(
            "verify".to_string(),
            json!([{ "predicate": "url_contains", "args": [PRODUCT_PATH_MARKER] }]),
        );
    }
}

fn normalize_predicate(spec: &mut Value) {
    let Some(object) = spec.as_object_mut() else {
        return;
    };
    let predicate = object
        .get("predicate")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match predicate.as_str() {
        // Oracles conflate "any of these substrings" with a multi-arg call.
        "url_contains" => {
            let rewrite = object
                .get("args")
                .and_then(Value::as_array)
                .filter(|args| args.len() > 1 && args.iter().all(Value::is_string))
                .cloned();
            if let Some(args) = rewrite {
                let children: Vec<Value> = args
                    .into_iter()
                    .map(|arg| json!({ "predicate": "url_contains", "args": [arg] }))
                    .collect();
                object.insert("predicate".to_string(), json!("any_of"));
                object.insert("args".to_string(), Value::Array(children));
            }
        }
        // Oracles confuse regex matching with substring containment for
        // path markers; a bare path fragment is not a pattern.
        "url_matches" => {
            let is_path_fragment = object
                .get("args")
                .and_then(Value::as_array)
                .and_then(|args| args.first())
                .and_then(Value::as_str)
                .map(|pattern| pattern.contains(PRODUCT_PATH_MARKER) && !pattern.starts_with("http"))
                .unwrap_or(false);
            if is_path_fragment {
                object.insert("predicate".to_string(), json!("url_contains"));
                object.insert("args".to_string(), json!([PRODUCT_PATH_MARKER]));
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalize_first_step(plan: Value) -> Value {
        normalize_plan(plan)["steps"][0].clone()
    }

    #[test]
    fn renames_url_to_target() {
        let step = normalize_first_step(json!({"steps": [
            {"id": 1, "goal": "g", "action": "NAVIGATE", "url": "https://x"}
        ]}));
        assert_eq!(step["target"], json!("https://x"));
        assert!(step.get("url").is_none());
    }

    #[test]
    fn folds_action_case_and_aliases() {
        let plan = normalize_plan(json!({"steps": [
            {"id": 1, "goal": "g", "action": "navigate"},
            {"id": 2, "goal": "g", "action": "type"}
        ]}));
        assert_eq!(plan["steps"][0]["action"], json!("NAVIGATE"));
        assert_eq!(plan["steps"][1]["action"], json!("TYPE_AND_SUBMIT"));
    }

    #[test]
    fn rewrites_multi_arg_url_contains_to_any_of() {
        let step = normalize_first_step(json!({"steps": [{
            "id": 1, "goal": "g", "action": "CLICK",
            "verify": [{"predicate": "url_contains", "args": ["signin", "/ap/"]}]
        }]}));
        let spec = &step["verify"][0];
        assert_eq!(spec["predicate"], json!("any_of"));
        assert_eq!(spec["args"][0]["predicate"], json!("url_contains"));
        assert_eq!(spec["args"][1]["args"], json!(["/ap/"]));
    }

    #[test]
    fn leaves_single_arg_url_contains_alone() {
        let step = normalize_first_step(json!({"steps": [{
            "id": 1, "goal": "g", "action": "CLICK",
            "verify": [{"predicate": "url_contains", "args": ["cart"]}]
        }]}));
        assert_eq!(step["verify"][0]["predicate"], json!("url_contains"));
    }

    #[test]
    fn rewrites_path_fragment_url_matches() {
        let step = normalize_first_step(json!({"steps": [{
            "id": 1, "goal": "g", "action": "CLICK",
            "verify": [{"predicate": "url_matches", "args": ["/dp/[A-Z0-9]+"]}]
        }]}));
        assert_eq!(step["verify"][0]["predicate"], json!("url_contains"));
        assert_eq!(step["verify"][0]["args"], json!(["/dp/"]));
    }

    #[test]
    fn keeps_full_url_matches_patterns() {
        let step = normalize_first_step(json!({"steps": [{
            "id": 1, "goal": "g", "action": "CLICK",
            "verify": [{"predicate": "url_matches", "args": ["https://shop\\.example/dp/.*"]}]
        }]}));
        assert_eq!(step["verify"][0]["predicate"], json!("url_matches"));
    }

    #[test]
    fn converts_placeholder_target_to_click() {
        let step = normalize_first_step(json!({"steps": [{
            "id": 2, "goal": "", "action": "NAVIGATE",
            "target": "https://shop.example/dp/product-url"
        }]}));
        assert!(step.get("target").is_none());
        assert_eq!(step["action"], json!("CLICK"));
        assert_eq!(step["intent"], json!("first_product_link"));
        assert_eq!(step["verify"][0]["args"], json!(["/dp/"]));
    }

    #[test]
    fn normalizes_substeps_too() {
        let plan = normalize_plan(json!({"steps": [{
            "id": 1, "goal": "g", "action": "CLICK",
            "optional_substeps": [
                {"goal": "dismiss", "action": "click", "intent": "drawer_no_thanks"}
            ]
        }]}));
        assert_eq!(
            plan["steps"][0]["optional_substeps"][0]["action"],
            json!("CLICK")
        );
    }
}
