// SQLite + sqlite-vec backed pattern store (§4.2).
//
// Schema and connection setup follow `tandem-memory::MemoryDatabase`'s
// convention: register sqlite-vec as a SQLite extension, open with a busy
// timeout, WAL journaling, and `PRAGMA synchronous = NORMAL`, and heal a
// corrupted vector table at startup rather than fail hard.

use crate::embeddings::EmbeddingService;
use crate::store::PatternStore;
use crate::types::{
    EmbeddingHealth, PatternResult, PatternStats, SearchQuery, SuccessUpdateLogEntry,
    DEFAULT_EMBEDDING_DIMENSION,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{ffi::sqlite3_auto_extension, params, Connection, OptionalExtension};
use sqlite_vec::sqlite3_vec_init;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use trinity_types::{Pattern, PatternType};

static VEC_EXTENSION_INIT: std::sync::Once = std::sync::Once::new();

fn register_vec_extension() {
    VEC_EXTENSION_INIT.call_once(|| unsafe {
        sqlite3_auto_extension(Some(std::mem::transmute::<
            *const (),
            unsafe extern "C" fn(
                *mut rusqlite::ffi::sqlite3,
                *mut *mut i8,
                *const rusqlite::ffi::sqlite3_api_routines,
            ) -> i32,
        >(sqlite3_vec_init as *const ())));
    });
}

/// Durable, vector-search-capable pattern store. `":memory:"` opens an
/// in-memory SQLite connection through the same setup path as a real file
/// (§6); the WAL pragma is a documented no-op there.
pub struct SqlitePatternStore {
    conn: Arc<Mutex<Connection>>,
    embeddings: Arc<Mutex<EmbeddingService>>,
}

impl SqlitePatternStore {
    pub async fn open(path: &Path) -> PatternResult<Self> {
        Self::open_with_embeddings(path, EmbeddingService::new()).await
    }

    pub async fn open_with_embeddings(
        path: &Path,
        embeddings: EmbeddingService,
    ) -> PatternResult<Self> {
        register_vec_extension();

        let conn = if path == Path::new(":memory:") {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.busy_timeout(Duration::from_secs(10))?;
        let _ = conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()));
        conn.execute("PRAGMA synchronous = NORMAL", [])?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            embeddings: Arc::new(Mutex::new(embeddings)),
        };
        store.init_schema().await?;
        if let Err(err) = store.validate_vector_table().await {
            tracing::warn!(
                target: "trinity.patterns",
                "pattern_vectors failed validation ({}); recreating",
                err
            );
            store.recreate_vector_table().await?;
        }
        Ok(store)
    }

    async fn init_schema(&self) -> PatternResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS patterns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pattern_type TEXT NOT NULL,
                pattern_name TEXT NOT NULL,
                content TEXT NOT NULL,
                confidence REAL NOT NULL,
                evidence_count INTEGER NOT NULL DEFAULT 1,
                times_seen INTEGER NOT NULL DEFAULT 1,
                times_successful INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                last_seen TEXT NOT NULL,
                metadata TEXT,
                embedding_id INTEGER,
                UNIQUE(pattern_type, pattern_name, content)
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_patterns_type_confidence
             ON patterns(pattern_type, confidence DESC)",
            [],
        )?;
        conn.execute(
            &format!(
                "CREATE VIRTUAL TABLE IF NOT EXISTS pattern_vectors USING vec0(
                    pattern_id INTEGER PRIMARY KEY,
                    embedding float[{}]
                )",
                DEFAULT_EMBEDDING_DIMENSION
            ),
            [],
        )?;
        Ok(())
    }

    async fn validate_vector_table(&self) -> PatternResult<()> {
        let conn = self.conn.lock().await;
        let row_count: i64 = conn.query_row("SELECT COUNT(*) FROM pattern_vectors", [], |r| r.get(0))?;
        if row_count > 0 {
            let probe = format!("[{}]", vec!["0.0"; DEFAULT_EMBEDDING_DIMENSION].join(","));
            let mut stmt = conn.prepare(
                "SELECT pattern_id, distance FROM pattern_vectors WHERE embedding MATCH ?1 AND k = 1",
            )?;
            let mut rows = stmt.query(params![probe])?;
            let _ = rows.next()?;
        }
        Ok(())
    }

    async fn recreate_vector_table(&self) -> PatternResult<()> {
        let conn = self.conn.lock().await;
        for name in [
            "pattern_vectors",
            "pattern_vectors_chunks",
            "pattern_vectors_info",
            "pattern_vectors_rowids",
        ] {
            conn.execute(&format!("DROP TABLE IF EXISTS \"{name}\""), [])?;
        }
        conn.execute(
            &format!(
                "CREATE VIRTUAL TABLE pattern_vectors USING vec0(
                    pattern_id INTEGER PRIMARY KEY,
                    embedding float[{}]
                )",
                DEFAULT_EMBEDDING_DIMENSION
            ),
            [],
        )?;
        conn.execute("UPDATE patterns SET embedding_id = NULL", [])?;
        Ok(())
    }

    async fn embed_if_available(&self, content: &str) -> Option<Vec<f32>> {
        let service = self.embeddings.lock().await;
        if !service.is_available() {
            return None;
        }
        service.embed(content).await.ok()
    }
}

fn row_to_pattern(row: &rusqlite::Row) -> rusqlite::Result<Pattern> {
    let pattern_type: String = row.get(1)?;
    let created_at: String = row.get(8)?;
    let last_seen: String = row.get(9)?;
    let metadata: Option<String> = row.get(10)?;
    Ok(Pattern {
        id: row.get(0)?,
        pattern_type: PatternType::parse(&pattern_type),
        pattern_name: row.get(2)?,
        content: row.get(3)?,
        confidence: row.get(4)?,
        evidence_count: row.get::<_, i64>(5)? as u32,
        times_seen: row.get::<_, i64>(6)? as u32,
        times_successful: row.get::<_, i64>(7)? as u32,
        created_at: parse_timestamp(&created_at),
        last_seen: parse_timestamp(&last_seen),
        metadata: metadata.and_then(|m| serde_json::from_str(&m).ok()),
        embedding_id: row.get(11)?,
    })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

const PATTERN_COLUMNS: &str = "id, pattern_type, pattern_name, content, confidence,
         evidence_count, times_seen, times_successful, created_at, last_seen,
         metadata, embedding_id";

#[async_trait]
impl PatternStore for SqlitePatternStore {
    async fn store_pattern(
        &self,
        pattern_type: &str,
        pattern_name: &str,
        content: &str,
        confidence: f64,
        metadata: Option<serde_json::Value>,
        evidence_count: u32,
    ) -> PatternResult<i64> {
        let now = Utc::now();
        let metadata_json = metadata.as_ref().map(serde_json::to_string).transpose()?;
        let evidence_count = evidence_count.max(1);

        let conn = self.conn.lock().await;

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM patterns WHERE pattern_type = ?1 AND pattern_name = ?2 AND content = ?3",
                params![pattern_type, pattern_name, content],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = existing {
            conn.execute(
                "UPDATE patterns SET
                    times_seen = times_seen + 1,
                    evidence_count = evidence_count + ?1,
                    confidence = ?2,
                    last_seen = ?3,
                    metadata = COALESCE(?4, metadata)
                 WHERE id = ?5",
                params![evidence_count, confidence, now.to_rfc3339(), metadata_json, id],
            )?;
            tracing::debug!(target: "trinity.patterns", pattern_id = id, pattern_type, confidence, "pattern re-seen");
            return Ok(id);
        }

        conn.execute(
            "INSERT INTO patterns (
                pattern_type, pattern_name, content, confidence, evidence_count,
                times_seen, times_successful, created_at, last_seen, metadata, embedding_id
             ) VALUES (?1, ?2, ?3, ?4, ?5, 1, 0, ?6, ?6, ?7, NULL)",
            params![
                pattern_type,
                pattern_name,
                content,
                confidence,
                evidence_count,
                now.to_rfc3339(),
                metadata_json,
            ],
        )?;
        let id = conn.last_insert_rowid();
        drop(conn);

        if let Some(embedding) = self.embed_if_available(content).await {
            let conn = self.conn.lock().await;
            let embedding_json = format!(
                "[{}]",
                embedding.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(",")
            );
            conn.execute(
                "INSERT INTO pattern_vectors (pattern_id, embedding) VALUES (?1, ?2)",
                params![id, embedding_json],
            )?;
            conn.execute("UPDATE patterns SET embedding_id = ?1 WHERE id = ?1", params![id])?;
        }

        tracing::debug!(target: "trinity.patterns", pattern_id = id, pattern_type, confidence, "pattern created");
        Ok(id)
    }

    async fn search_patterns(&self, query: &SearchQuery) -> PatternResult<Vec<Pattern>> {
        let semantic_candidates = if query.semantic {
            if let Some(q) = query.query.as_deref() {
                self.embed_if_available(q).await
            } else {
                None
            }
        } else {
            None
        };

        let conn = self.conn.lock().await;

        let mut candidate_ids: Option<Vec<i64>> = None;
        if let Some(embedding) = semantic_candidates {
            let embedding_json = format!(
                "[{}]",
                embedding.iter().map(|f| f.to_string()).collect::<Vec<_>>().join(",")
            );
            let k = (query.limit.max(1)) * 2;
            let mut stmt = conn.prepare(
                "SELECT pattern_id FROM pattern_vectors WHERE embedding MATCH ?1 AND k = ?2 ORDER BY distance",
            )?;
            let ids = stmt
                .query_map(params![embedding_json, k], |row| row.get::<_, i64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            candidate_ids = Some(ids);
        }

        let mut sql = format!("SELECT {PATTERN_COLUMNS} FROM patterns WHERE confidence >= ?");
        let mut param_values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(query.min_confidence)];

        if let Some(ty) = &query.pattern_type {
            sql.push_str(" AND pattern_type = ?");
            param_values.push(Box::new(ty.clone()));
        }

        match &candidate_ids {
            Some(ids) => {
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
                sql.push_str(&format!(" AND id IN ({placeholders})"));
                for id in ids {
                    param_values.push(Box::new(*id));
                }
            }
            None => {
                if let Some(text) = query.query.as_deref().filter(|q| !q.is_empty()) {
                    sql.push_str(" AND (content LIKE ? OR pattern_name LIKE ?)");
                    let like = format!("%{text}%");
                    param_values.push(Box::new(like.clone()));
                    param_values.push(Box::new(like));
                }
            }
        }

        let mut rows: Vec<Pattern> = Vec::new();
        {
            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn rusqlite::ToSql> =
                param_values.iter().map(|b| b.as_ref()).collect();
            let mapped = stmt.query_map(param_refs.as_slice(), row_to_pattern)?;
            for r in mapped {
                rows.push(r?);
            }
        }

        rows.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.times_seen.cmp(&a.times_seen))
        });
        rows.truncate(query.limit.max(0) as usize);
        Ok(rows)
    }

    async fn get_pattern(&self, id: i64) -> PatternResult<Option<Pattern>> {
        let conn = self.conn.lock().await;
        let sql = format!("SELECT {PATTERN_COLUMNS} FROM patterns WHERE id = ?1");
        let pattern = conn
            .query_row(&sql, params![id], row_to_pattern)
            .optional()?;
        Ok(pattern)
    }

    async fn update_success(&self, id: i64, success: bool) -> PatternResult<()> {
        if !success {
            return Ok(());
        }
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE patterns SET times_successful = times_successful + 1 WHERE id = ?1",
            params![id],
        )?;
        let row: Option<(i64, i64)> = conn
            .query_row(
                "SELECT times_successful, times_seen FROM patterns WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        drop(conn);

        if let Some((times_successful, times_seen)) = row {
            let entry = SuccessUpdateLogEntry {
                pattern_id: id,
                success,
                times_successful: times_successful as u32,
                times_seen: times_seen as u32,
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
        Ok(())
    }

    async fn stats(&self) -> PatternResult<PatternStats> {
        let conn = self.conn.lock().await;
        let total_patterns: i64 = conn.query_row("SELECT COUNT(*) FROM patterns", [], |r| r.get(0))?;
        let average_confidence: f64 = conn
            .query_row("SELECT COALESCE(AVG(confidence), 0.0) FROM patterns", [], |r| r.get(0))?;

        let mut by_type = HashMap::new();
        {
            let mut stmt = conn.prepare("SELECT pattern_type, COUNT(*) FROM patterns GROUP BY pattern_type")?;
            let mapped = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for r in mapped {
                let (ty, count) = r?;
                by_type.insert(ty, count);
            }
        }

        let mut top_patterns = Vec::new();
        {
            let sql = format!(
                "SELECT {PATTERN_COLUMNS} FROM patterns ORDER BY confidence DESC, times_seen DESC LIMIT 5"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mapped = stmt.query_map([], row_to_pattern)?;
            for r in mapped {
                top_patterns.push(r?);
            }
        }

        let index_size: i64 = conn
            .query_row("SELECT COUNT(*) FROM pattern_vectors", [], |r| r.get(0))
            .unwrap_or(0);
        let embeddings = self.embeddings.lock().await;
        let embedding_available = embeddings.is_available();
        let embedding_health = if embedding_available {
            EmbeddingHealth::available()
        } else {
            EmbeddingHealth::disabled(embeddings.disabled_reason().map(str::to_string))
        };
        drop(embeddings);

        Ok(PatternStats {
            total_patterns,
            by_type,
            average_confidence,
            top_patterns,
            embedding_available,
            embedding_health,
            index_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    async fn store() -> SqlitePatternStore {
        SqlitePatternStore::open(Path::new(":memory:")).await.unwrap()
    }

    #[tokio::test]
    async fn store_pattern_dedupes_on_uniqueness_key() {
        let store = store().await;
        let id1 = store
            .store_pattern("failure", "null-deref", "NoneType error in payments", 0.8, None, 1)
            .await
            .unwrap();
        let id2 = store
            .store_pattern("failure", "null-deref", "NoneType error in payments", 0.85, None, 1)
            .await
            .unwrap();
        let id3 = store
            .store_pattern("failure", "null-deref", "NoneType error in payments", 0.9, None, 1)
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
                semantic: false,
                ..SearchQuery::new()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].times_seen, 3);
        assert_eq!(found[0].evidence_count, 3);
        assert!((found[0].confidence - 0.9).abs() < 1e-9);
    }

    #[tokio::test]
    async fn update_success_on_unknown_id_is_noop() {
        let store = store().await;
        store.update_success(12345, true).await.unwrap();
    }

    #[tokio::test]
    async fn search_patterns_filters_by_type_and_confidence() {
        let store = store().await;
        store
            .store_pattern("failure", "a", "content a", 0.9, None, 1)
            .await
            .unwrap();
        store
            .store_pattern("opportunity", "b", "content b", 0.9, None, 1)
            .await
            .unwrap();
        store
            .store_pattern("failure", "c", "content c", 0.3, None, 1)
            .await
            .unwrap();

        let found = store
            .search_patterns(&SearchQuery {
                pattern_type: Some("failure".to_string()),
                min_confidence: 0.5,
                limit: 10,
                semantic: false,
                ..SearchQuery::new()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].pattern_name, "a");
    }

    #[tokio::test]
    async fn stats_reports_embedding_unavailable_without_feature() {
        let store = store().await;
        store
            .store_pattern("failure", "a", "content a", 0.9, None, 1)
            .await
            .unwrap();
        let stats = store.stats().await.unwrap();
        assert!(!stats.embedding_available);
        assert_eq!(stats.index_size, 0);
    }
}
