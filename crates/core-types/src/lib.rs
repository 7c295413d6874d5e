//! Shared leaf types for the waypoint engine crates.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for one end-to-end run of a plan.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One interactive element surfaced by a backend snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Backend-assigned element id; the unit of click targeting.
    pub id: u32,
    /// Accessibility role (`link`, `button`, `textbox`, ...).
    pub role: String,
    /// Visible text content, possibly truncated by the backend.
    pub text: String,
    /// Link destination when the element carries one.
    pub href: Option<String>,
}

impl Element {
    pub fn new(id: u32, role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            role: role.into(),
            text: text.into(),
            href: None,
        }
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }
}

/// Snapshot of the live document: current URL plus visible elements.
///
/// Produced fresh on every `snapshot()` call and never cached across steps;
/// predicate evaluation receives an `Observation` and must not trigger a new
/// snapshot itself.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub url: String,
    pub elements: Vec<Element>,
}

impl Observation {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            elements: Vec::new(),
        }
    }

    pub fn with_elements(mut self, elements: Vec<Element>) -> Self {
        self.elements = elements;
        self
    }

    /// Look up an element by backend id.
    pub fn element(&self, id: u32) -> Option<&Element> {
        self.elements.iter().find(|el| el.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn observation_lookup_by_id() {
        let obs = Observation::new("https://example.com").with_elements(vec![
            Element::new(1, "link", "first"),
            Element::new(7, "button", "Add to Cart"),
        ]);
        assert_eq!(obs.element(7).map(|el| el.text.as_str()), Some("Add to Cart"));
        assert!(obs.element(3).is_none());
    }
}
