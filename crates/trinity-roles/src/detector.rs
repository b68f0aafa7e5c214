//! Pattern detector interface (§4.5.1): WITNESS delegates the actual event
//! analysis to an external collaborator. Grounded on the teacher's split
//! between `tandem_tools::Tool` (a narrow, object-safe async trait the
//! orchestrator calls without knowing the concrete implementation) and the
//! sidecar process that does the real work behind it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use trinity_types::Priority;

/// Opaque failure from a [`PatternDetector`] implementation. WITNESS never
/// inspects the cause beyond logging it — a detector error is always a
/// failure-telemetry-and-drop outcome (§4.5.1).
#[derive(Debug, Clone)]
pub struct DetectorError(pub String);

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pattern detector error: {}", self.0)
    }
}

impl std::error::Error for DetectorError {}

/// One detection surfaced by a [`PatternDetector`] for a single event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub pattern_type: String,
    pub pattern_name: String,
    pub content: String,
    pub confidence: f64,
    #[serde(default)]
    pub metadata: Option<Value>,
    pub priority: Priority,
}

/// Runs over one telemetry event and returns zero or more detections.
/// Implementations are external collaborators — the core ships no real
/// pattern-matching intelligence, only this seam and a deterministic test
/// double.
#[async_trait]
pub trait PatternDetector: Send + Sync {
    async fn detect(&self, event: &Value) -> Result<Vec<Detection>, DetectorError>;
}

/// A deterministic double used by tests and, until a real detector is
/// wired in, by `trinity-engine`: reads `event.pattern_type`,
/// `event.pattern_name` / `event.message`, `event.confidence`, and
/// `event.priority` straight off the event object, emitting a single
/// [`Detection`] when `pattern_type` is present. This mirrors how the
/// original `WitnessAgent`'s test harness stubs a detector — spec.md names
/// no concrete detector, only the `detect(event) -> [Detection]` contract.
#[derive(Default)]
pub struct StubPatternDetector;

impl StubPatternDetector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PatternDetector for StubPatternDetector {
    async fn detect(&self, event: &Value) -> Result<Vec<Detection>, DetectorError> {
        if event.get("force_detector_error").is_some() {
            return Err(DetectorError("forced failure for test_spec".to_string()));
        }

        let Some(pattern_type) = event.get("pattern_type").and_then(Value::as_str) else {
            return Ok(Vec::new());
        };

        let pattern_name = event
            .get("pattern_name")
            .and_then(Value::as_str)
            .unwrap_or(pattern_type)
            .to_string();
        let content = event
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let confidence = event.get("confidence").and_then(Value::as_f64).unwrap_or(0.75);
        let priority = match event.get("priority").and_then(Value::as_str) {
            Some("CRITICAL") => Priority::Critical,
            Some("HIGH") => Priority::High,
            _ => Priority::Normal,
        };

        Ok(vec![Detection {
            pattern_type: pattern_type.to_string(),
            pattern_name,
            content,
            confidence,
            metadata: event.get("metadata").cloned(),
            priority,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn stub_detector_emits_nothing_without_a_pattern_type() {
        let detector = StubPatternDetector::new();
        let detections = detector.detect(&json!({"message": "noop"})).await.unwrap();
        assert!(detections.is_empty());
    }

    #[tokio::test]
    async fn stub_detector_reads_fields_off_the_event() {
        let detector = StubPatternDetector::new();
        let event = json!({
            "pattern_type": "failure",
            "message": "NullPointerException in parser",
            "confidence": 0.92,
            "priority": "HIGH",
        });
        let detections = detector.detect(&event).await.unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].pattern_type, "failure");
        assert_eq!(detections[0].confidence, 0.92);
        assert_eq!(detections[0].priority, Priority::High);
    }
}
