//! Spec/ADR markdown rendering for ARCHITECT's complex-strategy branch
//! (§4.5.2 step 5). Ported from the original's f-string templates, kept as
//! plain template functions rather than a templating crate since the shape
//! is fixed and small.

use chrono::Utc;
use trinity_types::Pattern;

use crate::signal::Signal;

fn title_case(pattern: &str) -> String {
    pattern
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_historical_patterns(patterns: &[Pattern]) -> String {
    if patterns.is_empty() {
        return "No historical patterns found.".to_string();
    }
    patterns
        .iter()
        .take(3)
        .map(|p| {
            format!(
                "- {}: confidence={:.2}, seen={} times",
                p.pattern_name, p.confidence, p.times_seen
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn infer_article(pattern: &str) -> &'static str {
    if pattern.contains("test") {
        "II"
    } else if pattern.contains("context") {
        "I"
    } else if pattern.contains("learning") {
        "IV"
    } else {
        "V"
    }
}

/// Renders the spec document generated when complexity clears `min_complexity`
/// (§4.5.2 step 5). `historical_patterns` is the context gathered in step 2.
pub fn render_spec_markdown(signal: &Signal, historical_patterns: &[Pattern], correlation_id: &str) -> String {
    let pattern = &signal.pattern;
    let context_message = signal
        .data
        .extra
        .get("message")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("No additional context");

    format!(
        "# Spec: {title}\n\n\
         **ID**: spec-{correlation_id}\n\
         **Status**: Draft\n\
         **Created**: {date}\n\n\
         ## Goal\n\
         Address {pattern} pattern detected in the system.\n\n\
         ## Context\n\
         {context}\n\n\
         ## Non-Goals\n\
         - This spec does not cover unrelated patterns\n\
         - Performance optimization out of scope unless explicitly needed\n\n\
         ## Acceptance Criteria\n\
         - [ ] Implementation addresses root cause\n\
         - [ ] All tests pass\n\
         - [ ] Pattern no longer detected post-fix\n\n\
         ## Implementation Notes\n\
         Based on historical patterns:\n\
         {history}\n\n\
         ## Related\n\
         - Pattern: {pattern}\n",
        title = title_case(pattern),
        date = Utc::now().format("%Y-%m-%d"),
        context = context_message,
        history = format_historical_patterns(historical_patterns),
    )
}

/// Renders the ADR generated when [`super::plan::is_architectural`] holds
/// (§4.5.2 step 5).
pub fn render_adr_markdown(signal: &Signal, correlation_id: &str) -> String {
    let pattern = &signal.pattern;
    let context_message = signal
        .data
        .extra
        .get("message")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("Architectural decision required");

    format!(
        "# ADR-{correlation_id}: {title}\n\n\
         **Status**: Proposed\n\
         **Date**: {date}\n\
         **Context**: {context}\n\n\
         ## Decision\n\
         Implement solution for {pattern} pattern.\n\n\
         ## Rationale\n\
         - Constitutional requirement (Article {article})\n\
         - Risk mitigation\n\n\
         ## Consequences\n\
         **Positive**:\n\
         - Improved system quality\n\
         - Reduced technical debt\n\n\
         **Negative**:\n\
         - Implementation time required\n\
         - Potential short-term complexity increase\n\n\
         ## Alternatives Considered\n\
         1. Do nothing - rejected\n\
         2. Minimal fix - rejected (technical debt accumulation)\n\
         3. Comprehensive solution - **selected**\n",
        title = title_case(pattern),
        date = Utc::now().format("%Y-%m-%d"),
        context = context_message,
        article = infer_article(pattern),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalData;
    use trinity_types::PatternType;

    fn signal() -> Signal {
        Signal {
            correlation_id: "corr-1".to_string(),
            priority: trinity_types::Priority::Normal,
            pattern: "constitutional_violation".to_string(),
            pattern_type: Some("constitutional_violation".to_string()),
            data: SignalData::default(),
            evidence_count: 1,
            confidence: 0.9,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn spec_markdown_contains_pattern_and_correlation_id() {
        let md = render_spec_markdown(&signal(), &[], "corr-1");
        assert!(md.contains("spec-corr-1"));
        assert!(md.contains("constitutional_violation"));
        assert!(md.contains("No historical patterns found."));
    }

    #[test]
    fn spec_markdown_summarizes_top_three_historical_patterns() {
        let now = Utc::now();
        let pattern = Pattern {
            id: 1,
            pattern_type: PatternType::Failure,
            pattern_name: "null-deref".to_string(),
            content: "content".to_string(),
            confidence: 0.8,
            evidence_count: 1,
            times_seen: 3,
            times_successful: 1,
            created_at: now,
            last_seen: now,
            metadata: None,
            embedding_id: None,
        };
        let md = render_spec_markdown(&signal(), &[pattern], "corr-1");
        assert!(md.contains("null-deref"));
        assert!(md.contains("seen=3 times"));
    }

    #[test]
    fn adr_markdown_infers_article_from_pattern_name() {
        let mut s = signal();
        s.pattern = "missing_tests".to_string();
        let md = render_adr_markdown(&s, "corr-1");
        assert!(md.contains("Article II"));
    }
}
