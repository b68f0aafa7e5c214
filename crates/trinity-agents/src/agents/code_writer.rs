use async_trait::async_trait;
use serde_json::{Map, Value};
use trinity_types::{CostEntry, ModelTier};

use super::support::invoke_stub;
use crate::result::SubAgentResult;
use crate::sub_agent::SubAgent;

/// Writes code for `code_generation`/`tool_creation` tasks. Grounded on the
/// teacher's Builder agent (`AgentPrompts::build_builder_prompt`).
pub struct CodeWriterAgent;

#[async_trait]
impl SubAgent for CodeWriterAgent {
    fn agent_name(&self) -> &'static str {
        "code_writer"
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
                .unwrap_or("the requested change");
            format!("implemented {goal}")
        })
        .await
    }
}
