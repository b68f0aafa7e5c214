use crate::error::{CostError, Result};
use crate::filters::SummaryFilters;
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use trinity_types::{CostEntry, ModelTier};

/// Append-only storage for cost entries. Two implementations ship with this
/// crate: [`MemoryStorage`] (process lifetime) and [`SqliteStorage`]
/// (durable single-file backend, §4.1).
pub trait CostStorage: Send + Sync {
    fn append(&self, entry: CostEntry) -> Result<()>;
    fn entries(&self, filters: &SummaryFilters) -> Result<Vec<CostEntry>>;
}

/// In-memory backend; entries live only for the process lifetime.
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<Vec<CostEntry>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CostStorage for MemoryStorage {
    fn append(&self, entry: CostEntry) -> Result<()> {
        self.entries
            .lock()
            .map_err(|_| CostError::Storage("memory storage lock poisoned".into()))?
            .push(entry);
        Ok(())
    }

    fn entries(&self, filters: &SummaryFilters) -> Result<Vec<CostEntry>> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| CostError::Storage("memory storage lock poisoned".into()))?;
        Ok(guard.iter().filter(|e| filters.matches(e)).cloned().collect())
    }
}

/// Durable single-file backend. `":memory:"` opens an in-memory SQLite
/// connection through the same code path (§6 of the spec).
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = if path == Path::new(":memory:") {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.busy_timeout(std::time::Duration::from_secs(10))?;
        let _ = conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()));
        conn.execute("PRAGMA synchronous = NORMAL", [])?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS cost_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                operation TEXT NOT NULL,
                model TEXT NOT NULL,
                model_tier TEXT NOT NULL,
                tokens_in INTEGER NOT NULL,
                tokens_out INTEGER NOT NULL,
                cost_usd REAL NOT NULL,
                duration_seconds REAL NOT NULL,
                success INTEGER NOT NULL,
                metadata TEXT NOT NULL,
                error TEXT
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cost_entries_timestamp ON cost_entries(timestamp)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_cost_entries_operation ON cost_entries(operation)",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn tier_from_str(s: &str) -> ModelTier {
    match s {
        "local" => ModelTier::Local,
        "cloud_mini" => ModelTier::CloudMini,
        "cloud_standard" => ModelTier::CloudStandard,
        _ => ModelTier::CloudPremium,
    }
}

impl CostStorage for SqliteStorage {
    fn append(&self, entry: CostEntry) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CostError::Storage("sqlite storage lock poisoned".into()))?;
        conn.execute(
            "INSERT INTO cost_entries (
                timestamp, operation, model, model_tier, tokens_in, tokens_out,
                cost_usd, duration_seconds, success, metadata, error
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                entry.timestamp.to_rfc3339(),
                entry.operation,
                entry.model,
                entry.model_tier.as_str(),
                entry.tokens_in as i64,
                entry.tokens_out as i64,
                entry.cost_usd,
                entry.duration_seconds,
                entry.success as i64,
                serde_json::to_string(&entry.metadata)?,
                entry.error,
            ],
        )?;
        Ok(())
    }

    fn entries(&self, filters: &SummaryFilters) -> Result<Vec<CostEntry>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| CostError::Storage("sqlite storage lock poisoned".into()))?;
        let mut stmt = conn.prepare(
            "SELECT timestamp, operation, model, model_tier, tokens_in, tokens_out,
                    cost_usd, duration_seconds, success, metadata, error
             FROM cost_entries ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let timestamp: String = row.get(0)?;
            let metadata: String = row.get(9)?;
            Ok(CostEntry {
                timestamp: chrono::DateTime::parse_from_rfc3339(&timestamp)
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|_| Utc::now()),
                operation: row.get(1)?,
                model: row.get(2)?,
                model_tier: tier_from_str(&row.get::<_, String>(3)?),
                tokens_in: row.get::<_, i64>(4)? as u64,
                tokens_out: row.get::<_, i64>(5)? as u64,
                cost_usd: row.get(6)?,
                duration_seconds: row.get(7)?,
                success: row.get::<_, i64>(8)? != 0,
                metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
                error: row.get::<_, Option<String>>(10)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            let entry = row.map_err(CostError::from)?;
            if filters.matches(&entry) {
                out.push(entry);
            }
        }
        Ok(out)
    }
}
