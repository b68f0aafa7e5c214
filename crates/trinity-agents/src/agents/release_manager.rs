use async_trait::async_trait;
use serde_json::{Map, Value};
use trinity_types::{CostEntry, ModelTier};

use super::support::invoke_stub;
use crate::result::SubAgentResult;
use crate::sub_agent::SubAgent;

/// Integrates and commits the work of a parallel group, and handles every
/// `merge` task node (§4.5.3 step 6).
pub struct ReleaseManagerAgent;

#[async_trait]
impl SubAgent for ReleaseManagerAgent {
    fn agent_name(&self) -> &'static str {
        "release_manager"
    }
    fn model(&self) -> &'static str {
        "claude-4.1"
    }
    fn model_tier(&self) -> ModelTier {
        ModelTier::CloudStandard
    }

    async fn invoke(&self, task_spec: &Map<String, Value>) -> (SubAgentResult, CostEntry) {
        invoke_stub(self.agent_name(), self.model(), self.model_tier(), task_spec, |spec| {
            let reports = spec
                .get("Details")
                .and_then(Value::as_str)
                .unwrap_or("prior sub-agent results");
            format!("merged: {reports}")
        })
        .await
    }
}
