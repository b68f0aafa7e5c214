use async_trait::async_trait;
use serde_json::{Map, Value};
use trinity_types::{CostEntry, ModelTier};

use super::support::invoke_stub;
use crate::result::SubAgentResult;
use crate::sub_agent::SubAgent;

/// Cheap-model summarizer, used for telemetry narration rather than plan
/// execution — the only role running on `cloud_mini` (§4.4).
pub struct TaskSummarizerAgent;

#[async_trait]
impl SubAgent for TaskSummarizerAgent {
    fn agent_name(&self) -> &'static str {
        "task_summarizer"
    }
    fn model(&self) -> &'static str {
        "gpt-5-mini"
    }
    fn model_tier(&self) -> ModelTier {
        ModelTier::CloudMini
    }

    async fn invoke(&self, task_spec: &Map<String, Value>) -> (SubAgentResult, CostEntry) {
        invoke_stub(self.agent_name(), self.model(), self.model_tier(), task_spec, |spec| {
            format!("summary: {} field(s) in task spec", spec.len())
        })
        .await
    }
}
