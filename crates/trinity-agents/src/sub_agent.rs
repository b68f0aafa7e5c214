use async_trait::async_trait;
use serde_json::{Map, Value};
use trinity_types::{CostEntry, ModelTier};

use crate::result::SubAgentResult;

/// A worker role invocable by the EXECUTOR (§4.4). Generalized to a trait
/// because the spec treats concrete LLM clients as external collaborators —
/// interfaces only — grounded on the teacher's split between `AgentPrompts`
/// (prompt construction) and the sidecar process that actually talks to a
/// model.
#[async_trait]
pub trait SubAgent: Send + Sync {
    fn agent_name(&self) -> &'static str;
    fn model(&self) -> &'static str;
    fn model_tier(&self) -> ModelTier;

    /// Runs once. Always returns a result — failures are reported via
    /// `SubAgentResult::status`/`error`, not an `Err`, so the caller records
    /// exactly one cost entry per invocation regardless of outcome (§4.4).
    async fn invoke(&self, task_spec: &Map<String, Value>) -> (SubAgentResult, CostEntry);
}
