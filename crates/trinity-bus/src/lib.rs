//! Durable, priority-ordered, correlation-aware pub/sub bus (§4.3).
//!
//! `MessageBus` persists every message to a single SQLite file (or
//! `":memory:"` for tests) and fans new publishes out to every live
//! subscriber via an in-process `tokio::sync::broadcast` channel per queue.

mod bus;
mod error;

pub use bus::{BusStats, MessageBus};
pub use error::{BusError, Result};

/// Queue names recognized by the core (§6), re-exported for convenience.
pub use trinity_types::queues;

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn publish_then_subscribe_drains_pending_in_priority_order() {
        let bus = Arc::new(MessageBus::open(Path::new(":memory:")).unwrap());
        bus.publish("q", json!({"n": "a"}), 1, None).await.unwrap();
        bus.publish("q", json!({"n": "b"}), 5, None).await.unwrap();
        bus.publish("q", json!({"n": "c"}), 1, None).await.unwrap();

        let mut stream = bus.subscribe("q", 1);
        let first = stream.next().await.unwrap();
        let second = stream.next().await.unwrap();
        let third = stream.next().await.unwrap();

        assert_eq!(first.payload["n"], "b");
        assert_eq!(second.payload["n"], "a");
        assert_eq!(third.payload["n"], "c");
    }

    #[tokio::test]
    async fn ack_is_idempotent_and_prevents_redelivery() {
        let bus = Arc::new(MessageBus::open(Path::new(":memory:")).unwrap());
        let id = bus.publish("q", json!({"n": 1}), 0, None).await.unwrap();
        bus.ack(id).await.unwrap();
        bus.ack(id).await.unwrap();
        assert_eq!(bus.pending_count("q").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn ack_unknown_id_is_noop() {
        let bus = Arc::new(MessageBus::open(Path::new(":memory:")).unwrap());
        bus.ack(999).await.unwrap();
    }

    #[tokio::test]
    async fn new_publishes_fan_out_to_every_live_subscriber() {
        let bus = Arc::new(MessageBus::open(Path::new(":memory:")).unwrap());
        let mut sub1 = bus.subscribe("q", 1);
        let mut sub2 = bus.subscribe("q", 1);

        bus.publish("q", json!({"n": 1}), 0, None).await.unwrap();

        let m1 = tokio::time::timeout(Duration::from_secs(1), sub1.next())
            .await
            .unwrap()
            .unwrap();
        let m2 = tokio::time::timeout(Duration::from_secs(1), sub2.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(m1.payload, m2.payload);
    }

    #[tokio::test]
    async fn by_correlation_spans_multiple_queues_ordered_by_created_at() {
        let bus = Arc::new(MessageBus::open(Path::new(":memory:")).unwrap());
        bus.publish("telemetry_stream", json!({"step": 1}), 0, Some("corr-1".into()))
            .await
            .unwrap();
        bus.publish("execution_queue", json!({"step": 2}), 0, Some("corr-1".into()))
            .await
            .unwrap();
        bus.publish("execution_queue", json!({"step": 3}), 0, Some("other".into()))
            .await
            .unwrap();

        let messages = bus.by_correlation("corr-1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].payload["step"], 1);
        assert_eq!(messages[1].payload["step"], 2);
    }

    #[tokio::test]
    async fn publish_rejects_non_object_payload() {
        let bus = MessageBus::open(Path::new(":memory:")).unwrap();
        let err = bus.publish("q", json!("not-an-object"), 0, None).await;
        assert!(matches!(err, Err(BusError::Validation(_))));
    }

    #[tokio::test]
    async fn stats_reports_totals_by_status_and_queue() {
        let bus = Arc::new(MessageBus::open(Path::new(":memory:")).unwrap());
        let id = bus.publish("q1", json!({}), 0, None).await.unwrap();
        bus.publish("q2", json!({}), 0, None).await.unwrap();
        bus.ack(id).await.unwrap();

        let stats = bus.stats().await.unwrap();
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.by_status.get("processed"), Some(&1));
        assert_eq!(stats.by_status.get("pending"), Some(&1));
        assert_eq!(stats.by_queue.get("q1"), Some(&1));
    }

    #[tokio::test]
    async fn cross_restart_durability_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("bus.sqlite");

        {
            let bus = MessageBus::open(&db_path).unwrap();
            bus.publish("q", json!({"n": "a"}), 1, None).await.unwrap();
            let keep_pending = bus.publish("q", json!({"n": "b"}), 5, None).await.unwrap();
            bus.ack(keep_pending).await.unwrap();
        }

        let reopened = Arc::new(MessageBus::open(&db_path).unwrap());
        let mut stream = reopened.subscribe("q", 1);
        let only = tokio::time::timeout(Duration::from_secs(1), stream.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(only.payload["n"], "a");
        assert_eq!(reopened.pending_count("q").await.unwrap(), 1);
    }
}
