//! Prompt formatting for sub-agent invocation (§4.5.3 step 3), grounded on
//! the teacher's `AgentPrompts::build_builder_prompt` field-concatenation
//! style, generalized from one fixed task shape to whatever fields the
//! task spec happens to carry.

use serde_json::{Map, Value};

const FIELDS: [&str; 4] = ["Goal", "Details", "Files", "Requirements"];

/// Concatenates `Goal`/`Details`/`Files`/`Requirements` (case-insensitive
/// keys, first match wins) when present; falls back to a pretty-printed
/// dump of the whole spec when none of them are.
pub fn format_prompt(spec: &Map<String, Value>) -> String {
    let mut sections = Vec::new();
    for field in FIELDS {
        if let Some(value) = lookup_case_insensitive(spec, field) {
            sections.push(format!("## {field}\n{}", value_to_text(value)));
        }
    }

    if sections.is_empty() {
        return serde_json::to_string_pretty(spec).unwrap_or_default();
    }

    sections.join("\n\n")
}

/// `len(text)/4`, the spec's estimate for when no real token count is
/// available from a model client (§4.5.3).
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() / 4) as u64
}

fn lookup_case_insensitive<'a>(spec: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    spec.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(field))
        .map(|(_, value)| value)
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| format!("- {}", value_to_text(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn concatenates_known_fields_in_order() {
        let spec = json!({
            "Goal": "ship the thing",
            "Requirements": ["must compile", "must pass tests"],
            "Unrelated": "ignored",
        });
        let prompt = format_prompt(spec.as_object().unwrap());
        assert!(prompt.starts_with("## Goal\nship the thing"));
        assert!(prompt.contains("## Requirements\n- must compile\n- must pass tests"));
        assert!(!prompt.contains("Unrelated"));
    }

    #[test]
    fn falls_back_to_pretty_json_when_no_known_fields() {
        let spec = json!({"foo": "bar"});
        let prompt = format_prompt(spec.as_object().unwrap());
        assert!(prompt.contains("\"foo\""));
        assert!(prompt.contains("\"bar\""));
    }

    #[test]
    fn token_estimate_is_len_over_four() {
        assert_eq!(estimate_tokens("12345678"), 2);
        assert_eq!(estimate_tokens(""), 0);
    }
}
