use async_trait::async_trait;
use serde_json::{Map, Value};
use trinity_types::{CostEntry, ModelTier};

use super::support::invoke_stub;
use crate::result::SubAgentResult;
use crate::sub_agent::SubAgent;

/// Writes tests for `test_generation` tasks and accompanies `code_writer`
/// in every `code_generation`/`tool_creation` parallel group (§4.5.3 step 1).
pub struct TestArchitectAgent;

#[async_trait]
impl SubAgent for TestArchitectAgent {
    fn agent_name(&self) -> &'static str {
        "test_architect"
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
            format!("added regression tests covering {goal}")
        })
        .await
    }
}
