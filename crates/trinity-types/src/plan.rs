use crate::{ModelTier, Priority, SubAgentType, TaskSpec};
use serde::{Deserialize, Serialize};

/// One sub-agent invocation named by an `ExecutionPlan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAgentSpec {
    pub agent: SubAgentType,
    pub task: TaskSpec,
}

/// A set of sub-agent names EXECUTOR runs concurrently and joins before
/// moving to the next group (§4.5.3 step 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelGroup {
    pub agents: Vec<SubAgentType>,
}

/// Ephemeral per-task plan produced by EXECUTOR's deconstruct step. Not
/// itself persisted beyond an advisory workspace file (§9 design note).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub task_id: String,
    pub correlation_id: String,
    pub sub_agent_specs: Vec<SubAgentSpec>,
    pub parallel_groups: Vec<ParallelGroup>,
    pub verification_command: String,
}

/// Ephemeral per-signal strategy produced by ARCHITECT (§3 of the spec).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub priority: Priority,
    pub complexity: f64,
    pub engine: ModelTier,
    pub decision: String,
    pub spec_markdown: Option<String>,
    pub adr_markdown: Option<String>,
    pub tasks: Vec<TaskSpec>,
}
