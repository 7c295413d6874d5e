//! Structured feedback blocks handed back to the planning oracle on replan.

use plan_schema::Step;
use run_journal::AssertionRecord;

use crate::controller::StepRecord;

/// Render the failure context of a required step as the textual block the
/// replan prompt embeds: failed step id/goal, landing URL, failure note,
/// and the captured verification results.
pub fn build_step_feedback(
    step: &Step,
    record: &StepRecord,
    assertions: &[AssertionRecord],
) -> String {
    let mut block = format!(
        "Step failed: id={}, goal={}\nURL: {}\nNote: {}\nVerification results:\n",
        step.id, step.goal, record.url, record.note
    );
    if assertions.is_empty() {
        block.push_str("- (none)\n");
    } else {
        for assertion in assertions {
            let kind = if assertion.required {
                "required"
            } else {
                "advisory"
            };
            let verdict = if assertion.passed { "pass" } else { "fail" };
            block.push_str(&format!("- {} ({kind}) => {verdict}\n", assertion.label));
        }
    }
    block
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use plan_schema::ActionKind;

    use super::*;

    #[test]
    fn renders_step_context_and_assertions() {
        let step = Step {
            id: 3,
            goal: "Click the FIRST product link in search results".to_string(),
            action: ActionKind::Click,
            target: None,
            intent: Some("first_product_link".to_string()),
            input: None,
            verify: Vec::new(),
            required: true,
            stop_if_true: false,
            optional_substeps: Vec::new(),
        };
        let record = StepRecord {
            id: 3,
            goal: step.goal.clone(),
            success: false,
            note: "llm_click_id_missing".to_string(),
            url: "https://shop.example/s?k=laptop".to_string(),
            started_at: Utc::now(),
            ended_at: Utc::now(),
            duration_ms: 950,
        };
        let assertions = vec![
            AssertionRecord::new("verify_1", true, false),
            AssertionRecord::new("verify_2", false, true),
        ];

        let feedback = build_step_feedback(&step, &record, &assertions);
        assert!(feedback.contains("Step failed: id=3"));
        assert!(feedback.contains("URL: https://shop.example/s?k=laptop"));
        assert!(feedback.contains("Note: llm_click_id_missing"));
        assert!(feedback.contains("- verify_1 (required) => fail"));
        assert!(feedback.contains("- verify_2 (advisory) => pass"));
    }

    #[test]
    fn notes_absent_assertions() {
        let step = Step {
            id: 1,
            goal: "open".to_string(),
            action: ActionKind::Navigate,
            target: Some("https://x".to_string()),
            intent: None,
            input: None,
            verify: Vec::new(),
            required: true,
            stop_if_true: false,
            optional_substeps: Vec::new(),
        };
        let record = StepRecord {
            id: 1,
            goal: "open".to_string(),
            success: false,
            note: "backend_error: page is gone: closed".to_string(),
            url: String::new(),
            started_at: Utc::now(),
            ended_at: Utc::now(),
            duration_ms: 10,
        };
        let feedback = build_step_feedback(&step, &record, &[]);
        assert!(feedback.contains("- (none)"));
    }
}
