use chrono::{DateTime, Utc};
use serde_json::Value;
use trinity_types::{CostEntry, ModelTier};

/// Filters applied when summarizing or exporting cost entries. All fields
/// are conjunctive; an absent field matches everything.
#[derive(Debug, Clone, Default)]
pub struct SummaryFilters {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub operation: Option<String>,
    pub model_tier: Option<ModelTier>,
    pub metadata: Option<Value>,
}

impl SummaryFilters {
    pub fn matches(&self, entry: &CostEntry) -> bool {
        if let Some(since) = self.since {
            if entry.timestamp < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if entry.timestamp > until {
                return false;
            }
        }
        if let Some(op) = &self.operation {
            if &entry.operation != op {
                return false;
            }
        }
        if let Some(tier) = self.model_tier {
            if entry.model_tier != tier {
                return false;
            }
        }
        if let Some(metadata) = &self.metadata {
            if &entry.metadata != metadata {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(operation: &str, metadata: Value) -> CostEntry {
        CostEntry {
            timestamp: Utc::now(),
            operation: operation.to_string(),
            model: "gpt-4".to_string(),
            model_tier: ModelTier::CloudStandard,
            tokens_in: 0,
            tokens_out: 0,
            cost_usd: 0.0,
            duration_seconds: 0.0,
            success: true,
            metadata,
            error: None,
        }
    }

    #[test]
    fn metadata_filter_requires_exact_equality() {
        let filters = SummaryFilters {
            metadata: Some(json!({"repo": "trinity"})),
            ..Default::default()
        };
        assert!(filters.matches(&entry("code_generation", json!({"repo": "trinity"}))));
        assert!(!filters.matches(&entry("code_generation", json!({"repo": "other"}))));
        assert!(!filters.matches(&entry("code_generation", Value::Null)));
    }

    #[test]
    fn absent_metadata_filter_matches_everything() {
        let filters = SummaryFilters::default();
        assert!(filters.matches(&entry("code_generation", json!({"repo": "trinity"}))));
        assert!(filters.matches(&entry("code_generation", Value::Null)));
    }
}
