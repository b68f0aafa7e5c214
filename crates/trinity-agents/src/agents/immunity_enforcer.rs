use async_trait::async_trait;
use serde_json::{Map, Value};
use trinity_types::{CostEntry, ModelTier};

use super::support::invoke_stub;
use crate::result::SubAgentResult;
use crate::sub_agent::SubAgent;

/// Quality gate invoked for `verification` tasks (distinct from the
/// `run_verification` external test-runner gate in §4.4, which it doesn't
/// replace — it handles in-band `verification`-typed task nodes).
pub struct ImmunityEnforcerAgent;

#[async_trait]
impl SubAgent for ImmunityEnforcerAgent {
    fn agent_name(&self) -> &'static str {
        "immunity_enforcer"
    }
    fn model(&self) -> &'static str {
        "claude-4.1"
    }
    fn model_tier(&self) -> ModelTier {
        ModelTier::CloudStandard
    }

    async fn invoke(&self, task_spec: &Map<String, Value>) -> (SubAgentResult, CostEntry) {
        invoke_stub(self.agent_name(), self.model(), self.model_tier(), task_spec, |_| {
            "no constitutional violations detected".to_string()
        })
        .await
    }
}
