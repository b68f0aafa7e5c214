//! The improvement signal WITNESS emits and ARCHITECT consumes (§6: "Signal
//! payload (WITNESS → ARCHITECT)").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trinity_types::Priority;

/// `data` field of a [`Signal`]. `keywords` drives ARCHITECT's complexity
/// scoring (architecture/refactor/multi-file/system-wide substring checks);
/// anything else a detector wants to carry rides in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalData {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A message on `improvement_queue`. `pattern_type` is not in spec.md's
/// literal field list but the original `_assess_complexity` reads it
/// independently of `pattern` (a constitutional_violation detection can be
/// named anything while still carrying `pattern_type=constitutional_violation`),
/// so ARCHITECT needs both to score correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub correlation_id: String,
    #[serde(default)]
    pub priority: Priority,
    pub pattern: String,
    #[serde(default)]
    pub pattern_type: Option<String>,
    #[serde(default)]
    pub data: SignalData,
    pub evidence_count: u32,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}
