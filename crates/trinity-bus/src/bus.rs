// Durable, priority-ordered pub/sub message bus (§4.3 of the spec).
//
// Schema and connection setup mirror `trinity-cost::storage::SqliteStorage`
// (itself grounded on the teacher's WAL/busy_timeout convention); the
// in-process fanout notification uses `tokio::sync::broadcast` per queue,
// grounded on the teacher's `tandem_core::event_bus::EventBus`, generalized
// to one channel per queue name instead of one process-wide channel.

use crate::error::{BusError, Result};
use async_stream::stream;
use chrono::Utc;
use futures_core::stream::Stream;
use rusqlite::{params, Connection};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use trinity_types::{Message, MessageStatus};

const BROADCAST_CAPACITY: usize = 4096;

#[derive(Debug, Clone, Default)]
pub struct BusStats {
    pub total_messages: i64,
    pub by_status: HashMap<String, i64>,
    pub by_queue: HashMap<String, i64>,
    pub active_subscribers: HashMap<String, usize>,
}

struct QueueChannel {
    tx: broadcast::Sender<Message>,
    drained: bool,
    subscriber_count: usize,
}

/// Durable single-file pub/sub bus. `":memory:"` opens an in-memory SQLite
/// connection through the same setup path as a real file (§6).
pub struct MessageBus {
    conn: Arc<Mutex<Connection>>,
    channels: RwLock<HashMap<String, QueueChannel>>,
    cancel: CancellationToken,
}

impl MessageBus {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = if path == Path::new(":memory:") {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.busy_timeout(Duration::from_secs(10))?;
        let _ = conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()));
        conn.execute("PRAGMA synchronous = NORMAL", [])?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue_name TEXT NOT NULL,
                payload TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                correlation_id TEXT,
                created_at TEXT NOT NULL,
                processed_at TEXT,
                status TEXT NOT NULL DEFAULT 'pending'
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_queue_status
             ON messages(queue_name, status, priority DESC, created_at)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_correlation ON messages(correlation_id)",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            channels: RwLock::new(HashMap::new()),
            cancel: CancellationToken::new(),
        })
    }

    fn channel_sender(&self, queue: &str) -> broadcast::Sender<Message> {
        let mut channels = self.channels.write().expect("channels lock poisoned");
        channels
            .entry(queue.to_string())
            .or_insert_with(|| QueueChannel {
                tx: broadcast::channel(BROADCAST_CAPACITY).0,
                drained: false,
                subscriber_count: 0,
            })
            .tx
            .clone()
    }

    /// Publishes `payload` onto `queue`. Durable before returning (§4.3).
    pub async fn publish(
        &self,
        queue: &str,
        payload: Value,
        priority: i64,
        correlation_id: Option<String>,
    ) -> Result<i64> {
        if self.cancel.is_cancelled() {
            return Err(BusError::Closed);
        }
        if queue.trim().is_empty() {
            return Err(BusError::Validation("queue_name must not be empty".into()));
        }
        if !payload.is_object() {
            return Err(BusError::Validation("payload must be a JSON object".into()));
        }

        let now = Utc::now();
        let payload_text = serde_json::to_string(&payload)?;

        let id = {
            let conn = self.conn.lock().await;
            conn.execute(
                "INSERT INTO messages (queue_name, payload, priority, correlation_id, created_at, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending')",
                params![queue, payload_text, priority, correlation_id, now.to_rfc3339()],
            )?;
            conn.last_insert_rowid()
        };

        let message = Message {
            id,
            queue_name: queue.to_string(),
            payload,
            priority,
            correlation_id: correlation_id.clone(),
            created_at: now,
            processed_at: None,
            status: MessageStatus::Pending,
        };

        let sender = self.channel_sender(queue);
        let _ = sender.send(message);

        tracing::info!(
            target: "trinity.bus",
            message_id = id,
            queue_name = queue,
            correlation_id = correlation_id.as_deref().unwrap_or(""),
            "message published"
        );

        Ok(id)
    }

    async fn drain_pending(&self, queue: &str) -> Result<Vec<Message>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, queue_name, payload, priority, correlation_id, created_at, processed_at, status
             FROM messages
             WHERE queue_name = ?1 AND status = 'pending'
             ORDER BY priority DESC, created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![queue], row_to_message)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Subscribes to `queue`. The returned stream first yields all messages
    /// pending at subscribe time (in priority order), then blocks for newly
    /// published ones — fanout to every live subscriber (§4.3). Only the
    /// first subscriber on a queue receives the startup drain, per the
    /// spec's conservative resolution of the fanout/backlog ambiguity.
    pub fn subscribe(self: &Arc<Self>, queue: &str, batch_size: usize) -> impl Stream<Item = Message> {
        let bus = self.clone();
        let queue = queue.to_string();
        let batch_size = batch_size.max(1);

        // Registration happens here, synchronously, before this function
        // returns — not inside the `stream!` body below, which only runs on
        // first poll. A publish racing a subscribe that hadn't registered
        // its broadcast receiver yet would silently lose the message.
        let (mut receiver, should_drain) = {
            let mut channels = bus.channels.write().expect("channels lock poisoned");
            let entry = channels.entry(queue.clone()).or_insert_with(|| QueueChannel {
                tx: broadcast::channel(BROADCAST_CAPACITY).0,
                drained: false,
                subscriber_count: 0,
            });
            entry.subscriber_count += 1;
            let receiver = entry.tx.subscribe();
            let first = !entry.drained;
            entry.drained = true;
            (receiver, first)
        };

        stream! {
            if should_drain {
                if let Ok(pending) = bus.drain_pending(&queue).await {
                    for chunk in pending.chunks(batch_size) {
                        for message in chunk {
                            yield message.clone();
                        }
                    }
                }
            }

            loop {
                if bus.cancel.is_cancelled() {
                    break;
                }
                tokio::select! {
                    _ = bus.cancel.cancelled() => break,
                    received = receiver.recv() => {
                        match received {
                            Ok(message) => yield message,
                            Err(broadcast::error::RecvError::Lagged(_)) => {
                                tracing::warn!(
                                    target: "trinity.bus",
                                    queue_name = queue.as_str(),
                                    "subscriber lagged; re-draining pending rows"
                                );
                                if let Ok(pending) = bus.drain_pending(&queue).await {
                                    for message in pending {
                                        yield message;
                                    }
                                }
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                }
            }
        }
    }

    /// Marks a message processed. Idempotent: a second call on the same id
    /// is a well-defined no-op (§8 invariant 10).
    pub async fn ack(&self, message_id: i64) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE messages SET status = 'processed', processed_at = ?1
             WHERE id = ?2 AND status = 'pending'",
            params![Utc::now().to_rfc3339(), message_id],
        )?;
        Ok(())
    }

    pub async fn pending_count(&self, queue: &str) -> Result<i64> {
        let conn = self.conn.lock().await;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE queue_name = ?1 AND status = 'pending'",
            params![queue],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// All messages sharing `correlation_id`, across every queue, ordered by
    /// `created_at` (§4.3).
    pub async fn by_correlation(&self, correlation_id: &str) -> Result<Vec<Message>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT id, queue_name, payload, priority, correlation_id, created_at, processed_at, status
             FROM messages
             WHERE correlation_id = ?1
             ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![correlation_id], row_to_message)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub async fn stats(&self) -> Result<BusStats> {
        let conn = self.conn.lock().await;
        let total_messages: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |r| r.get(0))?;

        let mut by_status = HashMap::new();
        {
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM messages GROUP BY status")?;
            let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
            for row in rows {
                let (status, count) = row?;
                by_status.insert(status, count);
            }
        }

        let mut by_queue = HashMap::new();
        {
            let mut stmt = conn.prepare("SELECT queue_name, COUNT(*) FROM messages GROUP BY queue_name")?;
            let rows = stmt.query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?)))?;
            for row in rows {
                let (queue, count) = row?;
                by_queue.insert(queue, count);
            }
        }
        drop(conn);

        let channels = self.channels.read().expect("channels lock poisoned");
        let active_subscribers = channels
            .iter()
            .map(|(queue, channel)| (queue.clone(), channel.subscriber_count))
            .collect();

        Ok(BusStats {
            total_messages,
            by_status,
            by_queue,
            active_subscribers,
        })
    }

    /// Cooperative shutdown: blocked `subscribe` streams end after their
    /// current await point (§4.3, §5).
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    let payload_text: String = row.get(2)?;
    let created_at: String = row.get(5)?;
    let processed_at: Option<String> = row.get(6)?;
    let status: String = row.get(7)?;
    Ok(Message {
        id: row.get(0)?,
        queue_name: row.get(1)?,
        payload: serde_json::from_str(&payload_text).unwrap_or(Value::Null),
        priority: row.get(3)?,
        correlation_id: row.get(4)?,
        created_at: parse_timestamp(&created_at),
        processed_at: processed_at.as_deref().map(parse_timestamp),
        status: if status == "processed" {
            MessageStatus::Processed
        } else {
            MessageStatus::Pending
        },
    })
}

fn parse_timestamp(raw: &str) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
