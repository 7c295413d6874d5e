//! Exhaustive schema validation of a (normalized) plan value.
//!
//! Every violation is collected rather than failing fast: the full list is
//! fed back to the planning oracle as one correction prompt, so partial
//! reporting would cost extra correction round-trips.

use std::fmt;

use serde_json::Value;
use verify_gate::validate_spec;

const ALLOWED_ACTIONS: &[&str] = &["NAVIGATE", "CLICK", "TYPE_AND_SUBMIT"];
const ALLOWED_STEP_KEYS: &[&str] = &[
    "id",
    "goal",
    "action",
    "target",
    "intent",
    "input",
    "verify",
    "required",
    "stop_if_true",
    "optional_substeps",
];

/// One schema violation, located by a JSON-path-style label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Validate a plan value against the schema, returning every violation.
/// An empty result means the value deserializes cleanly into
/// [`crate::Plan`].
pub fn validate_plan(plan: &Value) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let Some(plan_obj) = plan.as_object() else {
        return vec![ValidationError::new("plan", "must be an object")];
    };

    if !plan_obj.get("task").map(Value::is_string).unwrap_or(false) {
        errors.push(ValidationError::new("plan.task", "must be a string"));
    }
    if let Some(notes) = plan_obj.get("notes") {
        let all_strings = notes
            .as_array()
            .map(|items| items.iter().all(Value::is_string))
            .unwrap_or(false);
        if !all_strings {
            errors.push(ValidationError::new(
                "plan.notes",
                "must be a list of strings",
            ));
        }
    }

    let steps = match plan_obj.get("steps").and_then(Value::as_array) {
        Some(steps) if !steps.is_empty() => steps,
        _ => {
            errors.push(ValidationError::new(
                "plan.steps",
                "must be a non-empty list",
            ));
            return errors;
        }
    };

    let mut expected_id: u64 = 1;
    for (index, step) in steps.iter().enumerate() {
        let path = format!("plan.steps[{index}]");
        let Some(step_obj) = step.as_object() else {
            errors.push(ValidationError::new(path, "must be an object"));
            continue;
        };

        let mut extra: Vec<&str> = step_obj
            .keys()
            .map(String::as_str)
            .filter(|key| !ALLOWED_STEP_KEYS.contains(key))
            .collect();
        extra.sort_unstable();
        if !extra.is_empty() {
            errors.push(ValidationError::new(
                &path,
                format!("has unsupported keys: {extra:?}"),
            ));
        }

        match step_obj.get("id").and_then(Value::as_u64) {
            Some(id) => {
                if id != expected_id {
                    errors.push(ValidationError::new(
                        format!("{path}.id"),
                        format!("must be contiguous starting at 1 (expected={expected_id})"),
                    ));
                }
                expected_id += 1;
            }
            None => {
                errors.push(ValidationError::new(
                    format!("{path}.id"),
                    "must be a positive integer",
                ));
            }
        }

        validate_common_fields(step_obj, &path, &mut errors);

        if let Some(subs) = step_obj.get("optional_substeps") {
            validate_substeps(subs, &path, &mut errors);
        }
    }

    errors
}

/// Field checks shared by steps and substeps: goal, action, target/intent/
/// input typing and presence, flags, and verification specs.
fn validate_common_fields(
    step: &serde_json::Map<String, Value>,
    path: &str,
    errors: &mut Vec<ValidationError>,
) {
    if !step.get("goal").map(Value::is_string).unwrap_or(false) {
        errors.push(ValidationError::new(
            format!("{path}.goal"),
            "must be a string",
        ));
    }

    let action = match step.get("action").and_then(Value::as_str) {
        Some(action) => {
            let upper = action.trim().to_ascii_uppercase();
            if !ALLOWED_ACTIONS.contains(&upper.as_str()) {
                errors.push(ValidationError::new(
                    format!("{path}.action"),
                    format!("must be one of {ALLOWED_ACTIONS:?}"),
                ));
                None
            } else {
                Some(upper)
            }
        }
        None => {
            errors.push(ValidationError::new(
                format!("{path}.action"),
                "must be a string",
            ));
            None
        }
    };

    for field in ["target", "intent", "input"] {
        if let Some(value) = step.get(field) {
            if !value.is_string() {
                errors.push(ValidationError::new(
                    format!("{path}.{field}"),
                    "must be a string when provided",
                ));
            }
        }
    }

    let non_empty_string = |field: &str| {
        step.get(field)
            .and_then(Value::as_str)
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false)
    };
    match action.as_deref() {
        Some("NAVIGATE") if !non_empty_string("target") => {
            errors.push(ValidationError::new(
                format!("{path}.target"),
                "is required for NAVIGATE and must be a non-empty string",
            ));
        }
        Some("TYPE_AND_SUBMIT") if !non_empty_string("input") => {
            errors.push(ValidationError::new(
                format!("{path}.input"),
                "is required for TYPE_AND_SUBMIT and must be a non-empty string",
            ));
        }
        _ => {}
    }

    for flag in ["required", "stop_if_true"] {
        if let Some(value) = step.get(flag) {
            if !value.is_boolean() {
                errors.push(ValidationError::new(
                    format!("{path}.{flag}"),
                    "must be a boolean",
                ));
            }
        }
    }

    let mut verify_count = 0usize;
    if let Some(verify) = step.get("verify") {
        match verify.as_array() {
            Some(specs) => {
                verify_count = specs.len();
                for (index, spec) in specs.iter().enumerate() {
                    for issue in validate_spec(spec, &format!("{path}.verify[{index}]")) {
                        errors.push(ValidationError::new(issue.path, issue.message));
                    }
                }
            }
            None => {
                errors.push(ValidationError::new(
                    format!("{path}.verify"),
                    "must be a list",
                ));
            }
        }
    }

    let required = step
        .get("required")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if required && verify_count == 0 {
        errors.push(ValidationError::new(
            format!("{path}.verify"),
            "is required and must be non-empty when step.required is true",
        ));
    }
}

fn validate_substeps(subs: &Value, parent_path: &str, errors: &mut Vec<ValidationError>) {
    let path = format!("{parent_path}.optional_substeps");
    let Some(subs) = subs.as_array() else {
        errors.push(ValidationError::new(path, "must be a list"));
        return;
    };

    let mut expected_id: Option<u64> = None;
    let mut any_id_seen = false;
    for (index, sub) in subs.iter().enumerate() {
        let sub_path = format!("{path}[{index}]");
        let Some(sub_obj) = sub.as_object() else {
            errors.push(ValidationError::new(sub_path, "must be an object"));
            continue;
        };

        let mut extra: Vec<&str> = sub_obj
            .keys()
            .map(String::as_str)
            .filter(|key| *key == "optional_substeps" || !ALLOWED_STEP_KEYS.contains(key))
            .collect();
        extra.sort_unstable();
        if !extra.is_empty() {
            errors.push(ValidationError::new(
                &sub_path,
                format!("has unsupported keys: {extra:?}"),
            ));
        }

        // Substep ids are optional as a group, but once any substep uses one
        // they must start at 1 and increase contiguously.
        match sub_obj.get("id") {
            Some(id_value) => match id_value.as_u64() {
                Some(id) => {
                    any_id_seen = true;
                    let expected = expected_id.unwrap_or(1);
                    if id != expected {
                        errors.push(ValidationError::new(
                            format!("{sub_path}.id"),
                            format!("must be contiguous starting at 1 (expected={expected})"),
                        ));
                    }
                    expected_id = Some(expected + 1);
                }
                None => {
                    errors.push(ValidationError::new(
                        format!("{sub_path}.id"),
                        "must be a positive integer when provided",
                    ));
                }
            },
            None => {
                if any_id_seen {
                    errors.push(ValidationError::new(
                        format!("{sub_path}.id"),
                        "is required once any optional_substeps carry ids",
                    ));
                }
            }
        }

        validate_common_fields(sub_obj, &sub_path, errors);
    }
}
