mod error;
mod filters;
mod pricing;
mod storage;
mod tracker;

pub use error::{CostError, Result};
pub use filters::SummaryFilters;
pub use pricing::calculate_cost;
pub use storage::{CostStorage, MemoryStorage, SqliteStorage};
pub use tracker::{BudgetStatus, CostTracker, TrackParams};

use std::path::Path;

/// Process-lifetime cost tracker. No durability across restarts.
pub type InMemoryCostTracker = CostTracker<MemoryStorage>;

/// SQLite-durable cost tracker. `":memory:"` selects an in-memory SQLite
/// connection through the same code path as a real file (§6).
pub type SqliteCostTracker = CostTracker<SqliteStorage>;

impl InMemoryCostTracker {
    pub fn new_in_memory() -> Self {
        CostTracker::new(MemoryStorage::new())
    }
}

impl SqliteCostTracker {
    pub fn open(path: &Path) -> Result<Self> {
        Ok(CostTracker::new(SqliteStorage::open(path)?))
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use trinity_types::ModelTier;

    #[test]
    fn sqlite_backend_persists_within_connection_lifetime() {
        let tracker = SqliteCostTracker::open(Path::new(":memory:")).unwrap();
        tracker
            .track(TrackParams {
                tokens_in: 500,
                tokens_out: 500,
                ..TrackParams::new("test_generation", "local-model", ModelTier::Local)
            })
            .unwrap();
        let summary = tracker.summary(&SummaryFilters::default()).unwrap();
        assert_eq!(summary.total_calls, 1);
        assert_eq!(summary.total_cost_usd, 0.0);
    }

    #[test]
    fn sqlite_backend_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("costs.sqlite");

        {
            let tracker = SqliteCostTracker::open(&db_path).unwrap();
            tracker
                .track(TrackParams {
                    tokens_in: 1000,
                    tokens_out: 1000,
                    ..TrackParams::new("release_manager", "gpt-4", ModelTier::CloudStandard)
                })
                .unwrap();
        }

        let reopened = SqliteCostTracker::open(&db_path).unwrap();
        let summary = reopened.summary(&SummaryFilters::default()).unwrap();
        assert_eq!(summary.total_calls, 1);
        assert!((summary.total_cost_usd - 0.0125).abs() < 1e-9);
    }
}
