use crate::error::{CostError, Result};
use crate::filters::SummaryFilters;
use crate::pricing::calculate_cost;
use crate::storage::CostStorage;
use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::RwLock;
use trinity_types::{CostEntry, CostSummary, ModelTier};

/// Arguments for [`CostTracker::track`]. `tokens_in`/`tokens_out` drive the
/// pricing-table lookup in `crate::pricing`; callers never supply a cost
/// directly.
#[derive(Debug, Clone)]
pub struct TrackParams {
    pub operation: String,
    pub model: String,
    pub model_tier: ModelTier,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub duration_seconds: f64,
    pub success: bool,
    pub metadata: Value,
    pub error: Option<String>,
}

impl TrackParams {
    pub fn new(operation: impl Into<String>, model: impl Into<String>, model_tier: ModelTier) -> Self {
        Self {
            operation: operation.into(),
            model: model.into(),
            model_tier,
            tokens_in: 0,
            tokens_out: 0,
            duration_seconds: 0.0,
            success: true,
            metadata: Value::Null,
            error: None,
        }
    }
}

/// Mirrors the original `BudgetStatus` model field-for-field: `remaining_usd`
/// and `percent_used` are `0.0` (not `None`) when no limit is set.
#[derive(Debug, Clone, Serialize)]
pub struct BudgetStatus {
    pub limit_usd: Option<f64>,
    pub alert_threshold_pct: Option<f64>,
    pub spent_usd: f64,
    pub remaining_usd: f64,
    pub percent_used: f64,
    pub alert_triggered: bool,
    pub limit_exceeded: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct BudgetConfig {
    limit_usd: Option<f64>,
    alert_threshold_pct: Option<f64>,
}

/// Tracks per-call LLM cost, aggregates it into summaries, and enforces an
/// optional budget. Generic over the storage backend so `InMemoryCostTracker`
/// and `SqliteCostTracker` share one implementation (§4.1).
pub struct CostTracker<S: CostStorage> {
    storage: S,
    budget: RwLock<BudgetConfig>,
}

impl<S: CostStorage> CostTracker<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            budget: RwLock::new(BudgetConfig::default()),
        }
    }

    /// Records a call, computing `cost_usd` from the pricing table. Returns
    /// the stored entry so callers can log the actual dollar figure.
    pub fn track(&self, params: TrackParams) -> Result<CostEntry> {
        if params.operation.trim().is_empty() {
            return Err(CostError::Validation("operation must not be empty".into()));
        }
        if params.duration_seconds < 0.0 {
            return Err(CostError::Validation(
                "duration_seconds must not be negative".into(),
            ));
        }

        let cost_usd = calculate_cost(params.model_tier, params.tokens_in, params.tokens_out);
        let entry = CostEntry {
            timestamp: Utc::now(),
            operation: params.operation,
            model: params.model,
            model_tier: params.model_tier,
            tokens_in: params.tokens_in,
            tokens_out: params.tokens_out,
            cost_usd,
            duration_seconds: params.duration_seconds,
            success: params.success,
            metadata: params.metadata,
            error: params.error,
        };

        self.storage.append(entry.clone())?;

        let status = self.budget_status()?;
        if status.alert_triggered {
            tracing::warn!(
                spent_usd = status.spent_usd,
                percent_used = status.percent_used,
                "cost budget alert threshold crossed"
            );
        }
        if status.limit_exceeded {
            tracing::error!(
                spent_usd = status.spent_usd,
                limit_usd = status.limit_usd.unwrap_or_default(),
                "cost budget exceeded"
            );
        }

        Ok(entry)
    }

    pub fn summary(&self, filters: &SummaryFilters) -> Result<CostSummary> {
        let entries = self.storage.entries(filters)?;
        Ok(summarize(&entries))
    }

    /// `alert_threshold_pct` is a percentage in `[0, 100]`, matching the
    /// original `set_budget(limit_usd, alert_threshold_pct)`.
    pub fn set_budget(&self, limit_usd: f64, alert_threshold_pct: f64) -> Result<()> {
        if limit_usd < 0.0 {
            return Err(CostError::Validation("limit_usd must not be negative".into()));
        }
        if !(0.0..=100.0).contains(&alert_threshold_pct) {
            return Err(CostError::Validation(
                "alert_threshold_pct must be between 0 and 100".into(),
            ));
        }
        let mut guard = self
            .budget
            .write()
            .map_err(|_| CostError::Storage("budget lock poisoned".into()))?;
        guard.limit_usd = Some(limit_usd);
        guard.alert_threshold_pct = Some(alert_threshold_pct);
        Ok(())
    }

    pub fn budget_status(&self) -> Result<BudgetStatus> {
        let config = *self
            .budget
            .read()
            .map_err(|_| CostError::Storage("budget lock poisoned".into()))?;
        let spent_usd = self.summary(&SummaryFilters::default())?.total_cost_usd;

        let Some(limit_usd) = config.limit_usd else {
            return Ok(BudgetStatus {
                limit_usd: None,
                alert_threshold_pct: None,
                spent_usd,
                remaining_usd: 0.0,
                percent_used: 0.0,
                alert_triggered: false,
                limit_exceeded: false,
            });
        };

        let remaining_usd = limit_usd - spent_usd;
        let percent_used = if limit_usd > 0.0 {
            (spent_usd / limit_usd) * 100.0
        } else {
            0.0
        };
        let alert_triggered = config
            .alert_threshold_pct
            .is_some_and(|threshold| percent_used >= threshold);
        let limit_exceeded = spent_usd > limit_usd;

        Ok(BudgetStatus {
            limit_usd: Some(limit_usd),
            alert_threshold_pct: config.alert_threshold_pct,
            spent_usd,
            remaining_usd,
            percent_used,
            alert_triggered,
            limit_exceeded,
        })
    }

    /// Spend rate over the last hour, in USD/hour.
    pub fn hourly_rate(&self) -> Result<f64> {
        let since = Utc::now() - Duration::hours(1);
        let filters = SummaryFilters {
            since: Some(since),
            ..Default::default()
        };
        Ok(self.summary(&filters)?.total_cost_usd)
    }

    /// Naive 24x extrapolation of the last hour's spend.
    pub fn daily_projection(&self) -> Result<f64> {
        Ok(self.hourly_rate()? * 24.0)
    }

    pub fn export_json(&self, filters: &SummaryFilters) -> Result<Value> {
        let entries = self.storage.entries(filters)?;
        serde_json::to_value(entries).map_err(CostError::from)
    }
}

fn summarize(entries: &[CostEntry]) -> CostSummary {
    let mut summary = CostSummary::default();
    if entries.is_empty() {
        summary.success_rate = 1.0;
        return summary;
    }

    let mut successes = 0u64;
    for entry in entries {
        summary.total_cost_usd += entry.cost_usd;
        summary.total_calls += 1;
        summary.total_tokens_in += entry.tokens_in;
        summary.total_tokens_out += entry.tokens_out;
        if entry.success {
            successes += 1;
        }
        *summary.by_operation.entry(entry.operation.clone()).or_insert(0.0) += entry.cost_usd;
        *summary.by_model.entry(entry.model.clone()).or_insert(0.0) += entry.cost_usd;
    }
    summary.success_rate = successes as f64 / summary.total_calls as f64;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn tracker() -> CostTracker<MemoryStorage> {
        CostTracker::new(MemoryStorage::new())
    }

    #[test]
    fn track_rejects_empty_operation() {
        let t = tracker();
        let params = TrackParams::new("", "gpt", ModelTier::CloudMini);
        assert!(matches!(t.track(params), Err(CostError::Validation(_))));
    }

    #[test]
    fn summary_success_rate_is_one_when_empty() {
        let t = tracker();
        let summary = t.summary(&SummaryFilters::default()).unwrap();
        assert_eq!(summary.total_calls, 0);
        assert_eq!(summary.success_rate, 1.0);
    }

    #[test]
    fn summary_aggregates_across_entries() {
        let t = tracker();
        t.track(TrackParams {
            tokens_in: 1000,
            tokens_out: 1000,
            ..TrackParams::new("code_generation", "gpt-4", ModelTier::CloudStandard)
        })
        .unwrap();
        t.track(TrackParams {
            tokens_in: 1000,
            tokens_out: 1000,
            success: false,
            ..TrackParams::new("code_generation", "gpt-4", ModelTier::CloudStandard)
        })
        .unwrap();

        let summary = t.summary(&SummaryFilters::default()).unwrap();
        assert_eq!(summary.total_calls, 2);
        assert!((summary.total_cost_usd - 0.025).abs() < 1e-9);
        assert!((summary.success_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn budget_status_flags_limit_exceeded_and_alert() {
        let t = tracker();
        t.set_budget(0.01, 50.0).unwrap();
        t.track(TrackParams {
            tokens_in: 1000,
            tokens_out: 1000,
            ..TrackParams::new("code_generation", "gpt-4", ModelTier::CloudStandard)
        })
        .unwrap();

        let status = t.budget_status().unwrap();
        assert!(status.limit_exceeded);
        assert!(status.alert_triggered);
        assert!(status.remaining_usd < 0.0);
        assert!(status.percent_used > 100.0);
    }

    #[test]
    fn budget_status_defaults_when_no_limit_set() {
        let t = tracker();
        let status = t.budget_status().unwrap();
        assert_eq!(status.limit_usd, None);
        assert_eq!(status.remaining_usd, 0.0);
        assert_eq!(status.percent_used, 0.0);
        assert!(!status.alert_triggered);
        assert!(!status.limit_exceeded);
    }

    #[test]
    fn set_budget_rejects_negative_limit_and_out_of_range_threshold() {
        let t = tracker();
        assert!(matches!(
            t.set_budget(-1.0, 50.0),
            Err(CostError::Validation(_))
        ));
        assert!(matches!(
            t.set_budget(10.0, 150.0),
            Err(CostError::Validation(_))
        ));
    }

    #[test]
    fn daily_projection_is_24x_hourly_rate() {
        let t = tracker();
        t.track(TrackParams {
            tokens_in: 1000,
            tokens_out: 1000,
            ..TrackParams::new("code_generation", "gpt-4", ModelTier::CloudMini)
        })
        .unwrap();
        let hourly = t.hourly_rate().unwrap();
        let daily = t.daily_projection().unwrap();
        assert!((daily - hourly * 24.0).abs() < 1e-12);
    }
}
