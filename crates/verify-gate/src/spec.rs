//! Predicate spec wire model, shape validation, and compilation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::GateError;
use crate::selector::Selector;

/// Wire-level predicate node exactly as it appears in plan JSON:
/// `{"predicate": "...", "args": [...]}`. Arguments of `any_of`/`all_of`
/// are themselves predicate spec objects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredicateSpec {
    pub predicate: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl PredicateSpec {
    pub fn new(predicate: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            predicate: predicate.into(),
            args,
        }
    }
}

/// A shape violation found while validating a predicate spec value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecIssue {
    pub path: String,
    pub message: String,
}

impl SpecIssue {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SpecIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Validate the shape of one predicate spec value, collecting every
/// violation rather than failing fast. Arity and argument types are checked
/// per predicate; selector strings must parse and `url_matches` patterns
/// must compile, so that no predicate can fail at evaluation time.
pub fn validate_spec(value: &Value, path: &str) -> Vec<SpecIssue> {
    let mut issues = Vec::new();
    collect_spec_issues(value, path, &mut issues);
    issues
}

fn collect_spec_issues(value: &Value, path: &str, issues: &mut Vec<SpecIssue>) {
    let Some(object) = value.as_object() else {
        issues.push(SpecIssue::new(path, "predicate spec must be an object"));
        return;
    };
    let Some(predicate) = object.get("predicate").and_then(Value::as_str) else {
        issues.push(SpecIssue::new(path, "missing or invalid 'predicate'"));
        return;
    };
    let empty = Vec::new();
    let args = object
        .get("args")
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    match predicate {
        "url_contains" => {
            if !single_string(args) {
                issues.push(SpecIssue::new(
                    path,
                    "'url_contains' expects args: [string]",
                ));
            }
        }
        "url_matches" => {
            if !single_string(args) {
                issues.push(SpecIssue::new(path, "'url_matches' expects args: [string]"));
            } else if let Some(pattern) = args[0].as_str() {
                if let Err(err) = Regex::new(pattern) {
                    issues.push(SpecIssue::new(
                        path,
                        format!("'url_matches' pattern does not compile: {err}"),
                    ));
                }
            }
        }
        "exists" | "not_exists" => {
            if !single_string(args) {
                issues.push(SpecIssue::new(
                    path,
                    format!("'{predicate}' expects args: [selector]"),
                ));
            } else if let Some(raw) = args[0].as_str() {
                if let Err(err) = Selector::parse(raw) {
                    issues.push(SpecIssue::new(path, err.to_string()));
                }
            }
        }
        "element_count" => {
            if args.is_empty() || !args[0].is_string() {
                issues.push(SpecIssue::new(
                    path,
                    "'element_count' expects args: [selector, min?, max?]",
                ));
            } else {
                if let Some(raw) = args[0].as_str() {
                    if let Err(err) = Selector::parse(raw) {
                        issues.push(SpecIssue::new(path, err.to_string()));
                    }
                }
                for (idx, bound) in args.iter().enumerate().skip(1).take(2) {
                    if bound.as_u64().is_none() {
                        issues.push(SpecIssue::new(
                            path,
                            format!("'element_count' bound args[{idx}] must be a non-negative integer"),
                        ));
                    }
                }
                if args.len() > 3 {
                    issues.push(SpecIssue::new(
                        path,
                        "'element_count' accepts at most [selector, min, max]",
                    ));
                }
            }
        }
        "any_of" | "all_of" => {
            if args.is_empty() {
                issues.push(SpecIssue::new(
                    path,
                    format!("'{predicate}' expects args: [predicate_spec, ...]"),
                ));
            } else {
                for (idx, child) in args.iter().enumerate() {
                    collect_spec_issues(child, &format!("{path}.args[{idx}]"), issues);
                }
            }
        }
        other => {
            issues.push(SpecIssue::new(
                path,
                format!("unsupported predicate '{other}'"),
            ));
        }
    }
}

fn single_string(args: &[Value]) -> bool {
    args.len() == 1 && args[0].is_string()
}

/// Compiled, runtime form of the predicate DSL.
#[derive(Clone, Debug)]
pub enum Predicate {
    /// Case-sensitive substring match on the observation URL.
    UrlContains(String),
    /// Regex (partial) match on the observation URL.
    UrlMatches(Regex),
    /// At least one element matches the selector.
    Exists(Selector),
    /// No element matches the selector.
    NotExists(Selector),
    /// Matching-element count within inclusive bounds; no `max` means
    /// unbounded above.
    ElementCount {
        selector: Selector,
        min: u64,
        max: Option<u64>,
    },
    /// True iff any child is true; short-circuits at the first true child.
    AnyOf(Vec<Predicate>),
    /// True iff all children are true; short-circuits at the first false child.
    AllOf(Vec<Predicate>),
    /// Test-only probe counting how often it was evaluated.
    #[cfg(test)]
    Probe(
        std::sync::Arc<std::sync::atomic::AtomicUsize>,
        bool,
    ),
}

impl Predicate {
    /// Compile a validated spec into its runtime form. Specs that passed
    /// [`validate_spec`] always compile; errors here indicate the caller
    /// skipped validation.
    pub fn compile(spec: &PredicateSpec) -> Result<Self, GateError> {
        let name = spec.predicate.as_str();
        match name {
            "url_contains" => Ok(Predicate::UrlContains(string_arg(spec, 0)?)),
            "url_matches" => {
                let pattern = string_arg(spec, 0)?;
                let regex = Regex::new(&pattern).map_err(|err| GateError::InvalidRegex {
                    pattern,
                    message: err.to_string(),
                })?;
                Ok(Predicate::UrlMatches(regex))
            }
            "exists" => Ok(Predicate::Exists(Selector::parse(&string_arg(spec, 0)?)?)),
            "not_exists" => Ok(Predicate::NotExists(Selector::parse(&string_arg(
                spec, 0,
            )?)?)),
            "element_count" => {
                let selector = Selector::parse(&string_arg(spec, 0)?)?;
                let min = spec.args.get(1).and_then(Value::as_u64).unwrap_or(0);
                let max = spec.args.get(2).and_then(Value::as_u64);
                Ok(Predicate::ElementCount { selector, min, max })
            }
            "any_of" | "all_of" => {
                if spec.args.is_empty() {
                    return Err(GateError::Arity {
                        predicate: name.to_string(),
                        expected: "args: [predicate_spec, ...]",
                    });
                }
                let children = spec
                    .args
                    .iter()
                    .map(|child| {
                        let child_spec: PredicateSpec = serde_json::from_value(child.clone())
                            .map_err(|_| GateError::Arity {
                                predicate: name.to_string(),
                                expected: "args: [predicate_spec, ...]",
                            })?;
                        Predicate::compile(&child_spec)
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if name == "any_of" {
                    Ok(Predicate::AnyOf(children))
                } else {
                    Ok(Predicate::AllOf(children))
                }
            }
            other => Err(GateError::UnsupportedPredicate(other.to_string())),
        }
    }
}

fn string_arg(spec: &PredicateSpec, index: usize) -> Result<String, GateError> {
    spec.args
        .get(index)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GateError::Arity {
            predicate: spec.predicate.clone(),
            expected: "args: [string]",
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validates_single_string_arity() {
        let issues = validate_spec(&json!({"predicate": "url_contains", "args": ["a"]}), "v");
        assert!(issues.is_empty());

        let issues = validate_spec(&json!({"predicate": "url_contains", "args": ["a", "b"]}), "v");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("url_contains"));
    }

    #[test]
    fn rejects_unknown_predicate() {
        let issues = validate_spec(&json!({"predicate": "title_contains", "args": ["x"]}), "v");
        assert!(issues[0].message.contains("unsupported predicate"));
    }

    #[test]
    fn rejects_uncompilable_regex_at_validation() {
        let issues = validate_spec(&json!({"predicate": "url_matches", "args": ["("]}), "v");
        assert!(issues[0].message.contains("does not compile"));
    }

    #[test]
    fn rejects_bad_selector_at_validation() {
        let issues = validate_spec(&json!({"predicate": "exists", "args": ["css=.x"]}), "v");
        assert!(issues[0].message.contains("invalid selector"));
    }

    #[test]
    fn validates_element_count_bounds() {
        let ok = validate_spec(
            &json!({"predicate": "element_count", "args": ["role=link", 3]}),
            "v",
        );
        assert!(ok.is_empty());

        let bad = validate_spec(
            &json!({"predicate": "element_count", "args": ["role=link", -1]}),
            "v",
        );
        assert_eq!(bad.len(), 1);
    }

    #[test]
    fn validates_nested_composites_with_paths() {
        let issues = validate_spec(
            &json!({"predicate": "any_of", "args": [
                {"predicate": "url_contains", "args": ["ok"]},
                {"predicate": "exists", "args": []}
            ]}),
            "plan.steps[0].verify[0]",
        );
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "plan.steps[0].verify[0].args[1]");
    }

    #[test]
    fn empty_composite_is_invalid() {
        let issues = validate_spec(&json!({"predicate": "all_of", "args": []}), "v");
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn compiles_nested_spec() {
        let spec = PredicateSpec::new(
            "any_of",
            vec![
                json!({"predicate": "url_contains", "args": ["signin"]}),
                json!({"predicate": "url_contains", "args": ["/ap/"]}),
            ],
        );
        let compiled = Predicate::compile(&spec).unwrap();
        match compiled {
            Predicate::AnyOf(children) => assert_eq!(children.len(), 2),
            other => panic!("expected AnyOf, got {other:?}"),
        }
    }

    #[test]
    fn compile_rejects_missing_args() {
        let spec = PredicateSpec::new("url_contains", vec![]);
        assert!(matches!(
            Predicate::compile(&spec),
            Err(GateError::Arity { .. })
        ));
    }
}
