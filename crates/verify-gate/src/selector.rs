//! Small element-selector grammar used by `exists`/`not_exists`/`element_count`.
//!
//! Four forms are recognised:
//! - `role=<role>`: accessibility role, matched case-insensitively
//! - `text~'<substring>'`: case-sensitive substring of the element text
//! - `id=<n>`: exact backend element id
//! - `href~'<substring>'`: case-sensitive substring of the element href

use serde::{Deserialize, Serialize};
use waypoint_core_types::Element;

use crate::errors::GateError;

/// A parsed element selector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selector {
    Role(String),
    TextContains(String),
    Id(u32),
    HrefContains(String),
}

impl Selector {
    /// Parse a selector string. The quotes around `text~`/`href~` operands
    /// are optional so that oracle output like `text~Added to Cart` still
    /// resolves.
    pub fn parse(raw: &str) -> Result<Self, GateError> {
        let trimmed = raw.trim();
        if let Some(rest) = trimmed.strip_prefix("role=") {
            let role = rest.trim();
            if role.is_empty() {
                return Err(GateError::InvalidSelector(raw.to_string()));
            }
            return Ok(Selector::Role(role.to_string()));
        }
        if let Some(rest) = trimmed.strip_prefix("text~") {
            let needle = strip_quotes(rest);
            if needle.is_empty() {
                return Err(GateError::InvalidSelector(raw.to_string()));
            }
            return Ok(Selector::TextContains(needle.to_string()));
        }
        if let Some(rest) = trimmed.strip_prefix("href~") {
            let needle = strip_quotes(rest);
            if needle.is_empty() {
                return Err(GateError::InvalidSelector(raw.to_string()));
            }
            return Ok(Selector::HrefContains(needle.to_string()));
        }
        if let Some(rest) = trimmed.strip_prefix("id=") {
            let id = rest
                .trim()
                .parse::<u32>()
                .map_err(|_| GateError::InvalidSelector(raw.to_string()))?;
            return Ok(Selector::Id(id));
        }
        Err(GateError::InvalidSelector(raw.to_string()))
    }

    /// Whether the given element matches this selector.
    pub fn matches(&self, element: &Element) -> bool {
        match self {
            Selector::Role(role) => element.role.eq_ignore_ascii_case(role),
            Selector::TextContains(needle) => element.text.contains(needle.as_str()),
            Selector::Id(id) => element.id == *id,
            Selector::HrefContains(needle) => element
                .href
                .as_deref()
                .map(|href| href.contains(needle.as_str()))
                .unwrap_or(false),
        }
    }
}

fn strip_quotes(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_role_selector() {
        assert_eq!(
            Selector::parse("role=textbox").unwrap(),
            Selector::Role("textbox".to_string())
        );
    }

    #[test]
    fn parses_quoted_text_selector() {
        assert_eq!(
            Selector::parse("text~'Added to Cart'").unwrap(),
            Selector::TextContains("Added to Cart".to_string())
        );
    }

    #[test]
    fn parses_unquoted_href_selector() {
        assert_eq!(
            Selector::parse("href~/dp/").unwrap(),
            Selector::HrefContains("/dp/".to_string())
        );
    }

    #[test]
    fn parses_id_selector() {
        assert_eq!(Selector::parse("id=42").unwrap(), Selector::Id(42));
        assert!(Selector::parse("id=abc").is_err());
    }

    #[test]
    fn rejects_unknown_forms() {
        assert!(Selector::parse("css=.foo").is_err());
        assert!(Selector::parse("role=").is_err());
        assert!(Selector::parse("").is_err());
    }

    #[test]
    fn role_match_is_case_insensitive() {
        let el = Element::new(1, "TextBox", "search");
        assert!(Selector::Role("textbox".to_string()).matches(&el));
    }

    #[test]
    fn text_match_is_case_sensitive_substring() {
        let el = Element::new(1, "button", "Added to Cart");
        assert!(Selector::TextContains("to Cart".to_string()).matches(&el));
        assert!(!Selector::TextContains("TO CART".to_string()).matches(&el));
    }

    #[test]
    fn href_match_requires_href() {
        let el = Element::new(1, "link", "product");
        assert!(!Selector::HrefContains("/dp/".to_string()).matches(&el));
        let el = el.with_href("https://shop.example/dp/B00X");
        assert!(Selector::HrefContains("/dp/".to_string()).matches(&el));
    }
}
