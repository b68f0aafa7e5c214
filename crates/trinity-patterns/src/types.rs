// Pattern store types and error definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use trinity_types::Pattern;

/// Default embedding dimension for all-MiniLM-L6-v2.
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

/// Default embedding model name.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("lock error: {0}")]
    Lock(String),
}

impl From<String> for PatternError {
    fn from(err: String) -> Self {
        PatternError::InvalidConfig(err)
    }
}

impl From<&str> for PatternError {
    fn from(err: &str) -> Self {
        PatternError::InvalidConfig(err.to_string())
    }
}

pub type PatternResult<T> = Result<T, PatternError>;

/// Query parameters for [`crate::store::PatternStore::search_patterns`].
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub pattern_type: Option<String>,
    pub min_confidence: f64,
    pub limit: i64,
    pub semantic: bool,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self {
            query: None,
            pattern_type: None,
            min_confidence: 0.7,
            limit: 10,
            semantic: true,
        }
    }
}

/// Aggregate view over the stored pattern population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternStats {
    pub total_patterns: i64,
    pub by_type: std::collections::HashMap<String, i64>,
    pub average_confidence: f64,
    pub top_patterns: Vec<Pattern>,
    pub embedding_available: bool,
    pub embedding_health: EmbeddingHealth,
    pub index_size: i64,
}

/// Embedding backend health, surfaced alongside [`PatternStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingHealth {
    /// "ok" when embeddings are available, "degraded_disabled" otherwise.
    pub status: String,
    pub reason: Option<String>,
}

impl EmbeddingHealth {
    pub fn available() -> Self {
        Self {
            status: "ok".to_string(),
            reason: None,
        }
    }

    pub fn disabled(reason: Option<String>) -> Self {
        Self {
            status: "degraded_disabled".to_string(),
            reason,
        }
    }
}

/// Audit entry recorded whenever a pattern's success counters change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessUpdateLogEntry {
    pub pattern_id: i64,
    pub success: bool,
    pub times_successful: u32,
    pub times_seen: u32,
    pub updated_at: DateTime<Utc>,
}
