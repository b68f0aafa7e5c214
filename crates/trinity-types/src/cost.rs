use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Pricing tier for a model call. The USD/1k-token rates for each tier are
/// a contract value owned by `trinity-cost::pricing`, not this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Local,
    CloudMini,
    CloudStandard,
    CloudPremium,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Local => "local",
            ModelTier::CloudMini => "cloud_mini",
            ModelTier::CloudStandard => "cloud_standard",
            ModelTier::CloudPremium => "cloud_premium",
        }
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One append-only record of an LLM call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostEntry {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub model: String,
    pub model_tier: ModelTier,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost_usd: f64,
    pub duration_seconds: f64,
    pub success: bool,
    #[serde(default)]
    pub metadata: Value,
    pub error: Option<String>,
}

/// Aggregated view over a set of cost entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_cost_usd: f64,
    pub total_calls: u64,
    pub total_tokens_in: u64,
    pub total_tokens_out: u64,
    pub success_rate: f64,
    pub by_operation: HashMap<String, f64>,
    pub by_model: HashMap<String, f64>,
}
