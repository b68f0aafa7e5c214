//! The [`PatternStore`] trait and an in-memory fake used by `trinity-roles`
//! tests, split the way `tandem_core::agents::AgentRegistry` splits a
//! trait-object-friendly interface (`Arc<RwLock<_>>` map) from its durable
//! SQLite-backed sibling.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use trinity_types::Pattern;

use crate::types::{EmbeddingHealth, PatternResult, PatternStats, SearchQuery, SuccessUpdateLogEntry};

/// Durable pattern storage + semantic search + success stats (§4.2).
#[async_trait]
pub trait PatternStore: Send + Sync {
    /// Insert or, on a `(pattern_type, pattern_name, content)` collision,
    /// bump the existing row's counters (§3 uniqueness key).
    async fn store_pattern(
        &self,
        pattern_type: &str,
        pattern_name: &str,
        content: &str,
        confidence: f64,
        metadata: Option<Value>,
        evidence_count: u32,
    ) -> PatternResult<i64>;

    async fn search_patterns(&self, query: &SearchQuery) -> PatternResult<Vec<Pattern>>;

    /// Direct lookup by primary key, independent of any confidence/limit
    /// window — the only way to read back a single row's exact counters
    /// right after a `store_pattern` call. `None` on an unknown id.
    async fn get_pattern(&self, id: i64) -> PatternResult<Option<Pattern>>;

    /// No-op on an unknown id (§8 boundary behavior).
    async fn update_success(&self, id: i64, success: bool) -> PatternResult<()>;

    async fn stats(&self) -> PatternResult<PatternStats>;
}

/// Non-durable fake satisfying the same dedupe/ordering/confidence rules as
/// [`crate::db::SqlitePatternStore`], minus the vector search path (semantic
/// search degrades to the structured query, same as embeddings-unavailable
/// production behavior per §4.2's graceful-degradation contract).
#[derive(Default)]
pub struct InMemoryPatternStore {
    rows: Mutex<Vec<Pattern>>,
    next_id: Mutex<i64>,
}

impl InMemoryPatternStore {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
        }
    }
}

#[async_trait]
impl PatternStore for InMemoryPatternStore {
    async fn store_pattern(
        &self,
        pattern_type: &str,
        pattern_name: &str,
        content: &str,
        confidence: f64,
        metadata: Option<Value>,
        evidence_count: u32,
    ) -> PatternResult<i64> {
        let now = Utc::now();
        let mut rows = self.rows.lock().map_err(|_| "pattern store lock poisoned")?;
        let parsed_type = trinity_types::PatternType::parse(pattern_type);

        if let Some(existing) = rows.iter_mut().find(|p| {
            p.pattern_type.as_str() == parsed_type.as_str()
                && p.pattern_name == pattern_name
                && p.content == content
        }) {
            existing.times_seen += 1;
            existing.evidence_count += evidence_count.max(1);
            existing.confidence = confidence;
            existing.last_seen = now;
            if metadata.is_some() {
                existing.metadata = metadata;
            }
            return Ok(existing.id);
        }

        let mut next_id = self.next_id.lock().map_err(|_| "pattern store lock poisoned")?;
        let id = *next_id;
        *next_id += 1;

        rows.push(Pattern {
            id,
            pattern_type: parsed_type,
            pattern_name: pattern_name.to_string(),
            content: content.to_string(),
            confidence,
            evidence_count: evidence_count.max(1),
            times_seen: 1,
            times_successful: 0,
            created_at: now,
            last_seen: now,
            metadata,
            embedding_id: None,
        });
        Ok(id)
    }

    async fn search_patterns(&self, query: &SearchQuery) -> PatternResult<Vec<Pattern>> {
        let rows = self.rows.lock().map_err(|_| "pattern store lock poisoned")?;
        let mut matches: Vec<Pattern> = rows
            .iter()
            .filter(|p| p.confidence >= query.min_confidence)
            .filter(|p| {
                query
                    .pattern_type
                    .as_deref()
                    .map_or(true, |t| p.pattern_type.as_str() == t)
            })
            .filter(|p| {
                query.query.as_deref().map_or(true, |q| {
                    q.is_empty()
                        || p.content.to_lowercase().contains(&q.to_lowercase())
                        || p.pattern_name.to_lowercase().contains(&q.to_lowercase())
                })
            })
            .cloned()
            .collect();

        matches.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.times_seen.cmp(&a.times_seen))
        });
        matches.truncate(query.limit.max(0) as usize);
        Ok(matches)
    }

    async fn get_pattern(&self, id: i64) -> PatternResult<Option<Pattern>> {
        let rows = self.rows.lock().map_err(|_| "pattern store lock poisoned")?;
        Ok(rows.iter().find(|p| p.id == id).cloned())
    }

    async fn update_success(&self, id: i64, success: bool) -> PatternResult<()> {
        let mut rows = self.rows.lock().map_err(|_| "pattern store lock poisoned")?;
        if let Some(row) = rows.iter_mut().find(|p| p.id == id) {
            if success {
                row.times_successful += 1;
                let entry = SuccessUpdateLogEntry {
                    pattern_id: row.id,
                    success,
                    times_successful: row.times_successful,
                    times_seen: row.times_seen,
                    updated_at: Utc::now(),
                };
                tracing::debug!(
                    target: "trinity.patterns",
                    pattern_id = entry.pattern_id,
                    times_successful = entry.times_successful,
                    times_seen = entry.times_seen,
                    "pattern success updated"
                );
            }
        }
        Ok(())
    }

    async fn stats(&self) -> PatternResult<PatternStats> {
        let rows = self.rows.lock().map_err(|_| "pattern store lock poisoned")?;
        let mut by_type: HashMap<String, i64> = HashMap::new();
        let mut confidence_sum = 0.0;
        for row in rows.iter() {
            *by_type.entry(row.pattern_type.as_str().to_string()).or_insert(0) += 1;
            confidence_sum += row.confidence;
        }
        let total_patterns = rows.len() as i64;
        let average_confidence = if total_patterns > 0 {
            confidence_sum / total_patterns as f64
        } else {
            0.0
        };
        let mut top_patterns = rows.clone();
        top_patterns.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        top_patterns.truncate(5);

        Ok(PatternStats {
            total_patterns,
            by_type,
            average_confidence,
            top_patterns,
            embedding_available: false,
            embedding_health: EmbeddingHealth::disabled(Some(
                "in-memory pattern store carries no embedding backend".to_string(),
            )),
            index_size: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dedupe_bumps_counters_and_keeps_one_row() {
        let store = InMemoryPatternStore::new();
        let id1 = store
            .store_pattern("failure", "null-deref", "NoneType error", 0.8, None, 1)
            .await
            .unwrap();
        let id2 = store
            .store_pattern("failure", "null-deref", "NoneType error", 0.85, None, 1)
            .await
            .unwrap();
        let id3 = store
            .store_pattern("failure", "null-deref", "NoneType error", 0.9, None, 1)
            .await
            .unwrap();
        assert_eq!(id1, id2);
        assert_eq!(id2, id3);

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_patterns, 1);

        let found = store
            .search_patterns(&SearchQuery {
                min_confidence: 0.5,
                limit: 10,
                ..SearchQuery::new()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].times_seen, 3);
        assert_eq!(found[0].evidence_count, 3);
        assert_eq!(found[0].confidence, 0.9);
    }

    #[tokio::test]
    async fn update_success_on_unknown_id_is_noop() {
        let store = InMemoryPatternStore::new();
        store.update_success(999, true).await.unwrap();
    }

    #[tokio::test]
    async fn search_orders_by_confidence_then_times_seen() {
        let store = InMemoryPatternStore::new();
        store
            .store_pattern("opportunity", "a", "content a", 0.75, None, 1)
            .await
            .unwrap();
        store
            .store_pattern("opportunity", "b", "content b", 0.9, None, 1)
            .await
            .unwrap();

        let found = store
            .search_patterns(&SearchQuery {
                min_confidence: 0.0,
                limit: 10,
                ..SearchQuery::new()
            })
            .await
            .unwrap();
        assert_eq!(found[0].pattern_name, "b");
        assert_eq!(found[1].pattern_name, "a");
    }
}
