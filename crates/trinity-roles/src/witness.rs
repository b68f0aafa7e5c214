//! WITNESS — perception (§4.5.1). Subscribes to `telemetry_stream` and
//! `personal_context_stream`, runs an external [`PatternDetector`] over each
//! event, upserts detections into the pattern store, and emits improvement
//! signals for anything that clears the priority/recurrence bar.
//!
//! Shaped after `OrchestratorEngine` (Arc handles to shared collaborators,
//! a cancellable `run()` loop) generalized to a single subscribe-process-ack
//! cycle instead of a multi-phase run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use trinity_bus::{queues, MessageBus};
use trinity_patterns::PatternStore;
use trinity_types::Priority;

use crate::config::WitnessConfig;
use crate::detector::PatternDetector;
use crate::error::Result;
use crate::signal::{Signal, SignalData};

/// Running counters surfaced for operators (§4.5.1: "Stats: total
/// detections, unique patterns, most common").
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct WitnessStats {
    pub total_detections: u64,
    pub unique_patterns: u64,
    pub most_common: Option<String>,
}

struct StatsState {
    total_detections: u64,
    by_pattern_name: HashMap<String, u64>,
}

impl StatsState {
    fn new() -> Self {
        Self {
            total_detections: 0,
            by_pattern_name: HashMap::new(),
        }
    }

    fn record(&mut self, pattern_name: &str) {
        self.total_detections += 1;
        *self.by_pattern_name.entry(pattern_name.to_string()).or_insert(0) += 1;
    }

    fn snapshot(&self) -> WitnessStats {
        let most_common = self
            .by_pattern_name
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(name, _)| name.clone());
        WitnessStats {
            total_detections: self.total_detections,
            unique_patterns: self.by_pattern_name.len() as u64,
            most_common,
        }
    }
}

/// Stateless perception worker. Holds only shared handles; all learned state
/// lives in the pattern store.
pub struct Witness {
    bus: Arc<MessageBus>,
    patterns: Arc<dyn PatternStore>,
    detector: Arc<dyn PatternDetector>,
    config: WitnessConfig,
    stats: Mutex<StatsState>,
}

impl Witness {
    pub fn new(
        bus: Arc<MessageBus>,
        patterns: Arc<dyn PatternStore>,
        detector: Arc<dyn PatternDetector>,
        config: WitnessConfig,
    ) -> Self {
        Self {
            bus,
            patterns,
            detector,
            config,
            stats: Mutex::new(StatsState::new()),
        }
    }

    pub fn stats(&self) -> WitnessStats {
        self.stats.lock().expect("witness stats lock poisoned").snapshot()
    }

    /// Runs until `cancel` fires. Consumes `telemetry_stream` and
    /// `personal_context_stream` as one merged source (§4.5.1); each event
    /// is processed end-to-end and acked before the next is considered.
    pub async fn run(&self, cancel: CancellationToken) {
        let telemetry = self.bus.subscribe(queues::TELEMETRY_STREAM, 1);
        let personal_context = self.bus.subscribe(queues::PERSONAL_CONTEXT_STREAM, 1);
        let mut events = futures::stream::select(telemetry, personal_context);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(target: "trinity.witness", "stopping");
                    break;
                }
                message = events.next() => {
                    let Some(message) = message else { break };
                    let message_id = message.id;
                    if let Err(err) = self.process_event(&message.payload).await {
                        error!(target: "trinity.witness", error = %err, "event processing failed");
                    }
                    if let Err(err) = self.bus.ack(message_id).await {
                        error!(target: "trinity.witness", error = %err, "ack failed");
                    }
                }
            }
        }
    }

    /// One perception cycle over a single telemetry event. Public so tests
    /// (and a caller that wants to drive WITNESS without the bus loop) can
    /// exercise it directly.
    pub async fn process_event(&self, event: &Value) -> Result<()> {
        let detections = match self.detector.detect(event).await {
            Ok(detections) => detections,
            Err(err) => {
                warn!(target: "trinity.witness", error = %err.0, "pattern detector failed");
                self.publish_detector_failure(&err.0, event).await?;
                return Ok(());
            }
        };

        for detection in detections {
            if detection.confidence < self.config.min_confidence {
                continue;
            }

            let pattern_id = self
                .patterns
                .store_pattern(
                    &detection.pattern_type,
                    &detection.pattern_name,
                    &detection.content,
                    detection.confidence,
                    detection.metadata.clone(),
                    1,
                )
                .await?;

            self.stats
                .lock()
                .expect("witness stats lock poisoned")
                .record(&detection.pattern_name);

            let times_seen = self.times_seen(pattern_id).await?;
            let is_urgent = matches!(detection.priority, Priority::High | Priority::Critical);
            let is_recurring = times_seen >= self.config.emit_times_seen_threshold;
            if !is_urgent && !is_recurring {
                continue;
            }

            self.emit_signal(event, &detection, times_seen.max(1)).await?;
        }

        Ok(())
    }

    async fn times_seen(&self, pattern_id: i64) -> Result<u32> {
        Ok(self
            .patterns
            .get_pattern(pattern_id)
            .await?
            .map(|p| p.times_seen)
            .unwrap_or(1))
    }

    async fn emit_signal(
        &self,
        event: &Value,
        detection: &crate::detector::Detection,
        evidence_count: u32,
    ) -> Result<()> {
        let correlation_id = event
            .get("correlation_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let keywords = event
            .get("keywords")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let extra = detection
            .metadata
            .as_ref()
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let signal = Signal {
            correlation_id: correlation_id.clone(),
            priority: detection.priority,
            pattern: detection.pattern_name.clone(),
            pattern_type: Some(detection.pattern_type.clone()),
            data: SignalData { keywords, extra },
            evidence_count,
            confidence: detection.confidence,
            timestamp: chrono::Utc::now(),
        };

        let payload = serde_json::to_value(&signal)?;
        self.bus
            .publish(
                queues::IMPROVEMENT_QUEUE,
                payload,
                detection.priority.bus_priority(),
                Some(correlation_id),
            )
            .await?;
        Ok(())
    }

    async fn publish_detector_failure(&self, reason: &str, event: &Value) -> Result<()> {
        let correlation_id = event
            .get("correlation_id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let report = serde_json::json!({
            "status": "failure",
            "stage": "witness_detect",
            "details": reason,
            "timestamp": chrono::Utc::now(),
        });
        self.bus
            .publish(queues::TELEMETRY_STREAM, report, 10, correlation_id)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::StubPatternDetector;
    use serde_json::json;
    use std::path::Path;
    use trinity_patterns::InMemoryPatternStore;

    fn witness() -> Witness {
        Witness::new(
            Arc::new(MessageBus::open(Path::new(":memory:")).unwrap()),
            Arc::new(InMemoryPatternStore::new()),
            Arc::new(StubPatternDetector::new()),
            WitnessConfig::default(),
        )
    }

    #[tokio::test]
    async fn low_confidence_detection_is_discarded() {
        let w = witness();
        let event = json!({
            "pattern_type": "failure",
            "message": "minor hiccup",
            "confidence": 0.1,
        });
        w.process_event(&event).await.unwrap();
        assert_eq!(w.stats().total_detections, 0);
    }

    #[tokio::test]
    async fn critical_detection_emits_signal_and_stores_pattern() {
        let w = witness();
        let event = json!({
            "pattern_type": "failure",
            "pattern_name": "null-deref",
            "message": "Fatal error: NoneType in payments",
            "confidence": 0.92,
            "priority": "CRITICAL",
            "correlation_id": "corr-1",
        });
        w.process_event(&event).await.unwrap();

        assert_eq!(w.stats().total_detections, 1);
        assert_eq!(w.stats().unique_patterns, 1);

        let pending = w.bus.pending_count(queues::IMPROVEMENT_QUEUE).await.unwrap();
        assert_eq!(pending, 1);
    }

    #[tokio::test]
    async fn normal_priority_below_recurrence_threshold_emits_nothing() {
        let w = witness();
        let event = json!({
            "pattern_type": "opportunity",
            "pattern_name": "cache-hint",
            "message": "could memoize this",
            "confidence": 0.8,
            "priority": "NORMAL",
        });
        w.process_event(&event).await.unwrap();
        let pending = w.bus.pending_count(queues::IMPROVEMENT_QUEUE).await.unwrap();
        assert_eq!(pending, 0);
    }

    #[tokio::test]
    async fn recurring_normal_pattern_crosses_threshold_and_emits() {
        let w = witness();
        let event = json!({
            "pattern_type": "opportunity",
            "pattern_name": "cache-hint",
            "message": "could memoize this",
            "confidence": 0.8,
            "priority": "NORMAL",
        });
        for _ in 0..5 {
            w.process_event(&event).await.unwrap();
        }
        let pending = w.bus.pending_count(queues::IMPROVEMENT_QUEUE).await.unwrap();
        assert_eq!(pending, 1);
    }

    #[tokio::test]
    async fn detector_error_publishes_failure_telemetry() {
        let w = witness();
        let event = json!({"force_detector_error": true});
        w.process_event(&event).await.unwrap();
        let pending = w.bus.pending_count(queues::TELEMETRY_STREAM).await.unwrap();
        assert_eq!(pending, 1);
    }
}
