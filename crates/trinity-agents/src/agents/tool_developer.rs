use async_trait::async_trait;
use serde_json::{Map, Value};
use trinity_types::{CostEntry, ModelTier};

use super::support::invoke_stub;
use crate::result::SubAgentResult;
use crate::sub_agent::SubAgent;

/// Builds new internal tooling for `tool_creation` tasks (§4.5.3 step 1).
pub struct ToolDeveloperAgent;

#[async_trait]
impl SubAgent for ToolDeveloperAgent {
    fn agent_name(&self) -> &'static str {
        "tool_developer"
    }
    fn model(&self) -> &'static str {
        "codestral-22b"
    }
    fn model_tier(&self) -> ModelTier {
        ModelTier::Local
    }

    async fn invoke(&self, task_spec: &Map<String, Value>) -> (SubAgentResult, CostEntry) {
        invoke_stub(self.agent_name(), self.model(), self.model_tier(), task_spec, |spec| {
            let goal = spec
                .get("Goal")
                .or_else(|| spec.get("goal"))
                .and_then(Value::as_str)
                .unwrap_or("the requested tool");
            format!("built tooling for {goal}")
        })
        .await
    }
}
