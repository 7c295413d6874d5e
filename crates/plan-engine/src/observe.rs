//! Compact textual rendering of an observation for oracle prompts.

use waypoint_core_types::Observation;

/// Column legend for the compact rendering.
pub const SNAPSHOT_HEADER: &str = "id|role|text|href";

/// Render up to `limit` elements as `id|role|text|href` lines, with element
/// text flattened and capped at `max_text` characters.
pub fn format_observation(obs: &Observation, limit: usize, max_text: usize) -> String {
    let mut lines = Vec::with_capacity(obs.elements.len().min(limit) + 1);
    lines.push(SNAPSHOT_HEADER.to_string());
    for element in obs.elements.iter().take(limit) {
        let text = clamp_text(&element.text, max_text);
        let href = element.href.as_deref().unwrap_or("-");
        lines.push(format!("{}|{}|{}|{}", element.id, element.role, text, href));
    }
    lines.join("\n")
}

fn clamp_text(text: &str, max_chars: usize) -> String {
    let flattened: String = text
        .chars()
        .map(|ch| match ch {
            '\n' | '\r' | '\t' => ' ',
            '|' => '/',
            other => other,
        })
        .collect();
    if flattened.chars().count() <= max_chars {
        return flattened;
    }
    let mut clamped: String = flattened.chars().take(max_chars).collect();
    clamped.push('…');
    clamped
}
