use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Delivery status of a bus message. Once `Processed`, a message is never
/// redelivered (see the durability invariant in the spec).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Processed,
}

/// A single durable bus record. `payload` is a JSON object; the bus itself
/// is agnostic to its shape beyond that.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub queue_name: String,
    pub payload: Value,
    pub priority: i64,
    pub correlation_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub status: MessageStatus,
}

impl Message {
    /// True once `ack` has been observed for this row.
    pub fn is_processed(&self) -> bool {
        matches!(self.status, MessageStatus::Processed)
    }
}
