//! Pure evaluation of compiled predicates against an observation.

use waypoint_core_types::Observation;

use crate::spec::Predicate;

/// Evaluate one predicate against the supplied observation.
///
/// Evaluation is side-effect free and total: it never snapshots, never
/// errors, and composites short-circuit (`any_of` stops at the first true
/// child, `all_of` at the first false one).
pub fn evaluate(predicate: &Predicate, obs: &Observation) -> bool {
    match predicate {
        Predicate::UrlContains(needle) => obs.url.contains(needle.as_str()),
        Predicate::UrlMatches(regex) => regex.is_match(&obs.url),
        Predicate::Exists(selector) => obs.elements.iter().any(|el| selector.matches(el)),
        Predicate::NotExists(selector) => !obs.elements.iter().any(|el| selector.matches(el)),
        Predicate::ElementCount { selector, min, max } => {
            let count = obs
                .elements
                .iter()
                .filter(|el| selector.matches(el))
                .count() as u64;
            count >= *min && max.map_or(true, |upper| count <= upper)
        }
        Predicate::AnyOf(children) => {
            for child in children {
                if evaluate(child, obs) {
                    return true;
                }
            }
            false
        }
        Predicate::AllOf(children) => {
            for child in children {
                if !evaluate(child, obs) {
                    return false;
                }
            }
            true
        }
        #[cfg(test)]
        Predicate::Probe(hits, outcome) => {
            hits.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            *outcome
        }
    }
}
