use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Signal/task priority. Maps to bus-level integer priority via
/// [`Priority::bus_priority`] (§4.5.2 step 9 of the spec: CRITICAL=10,
/// HIGH=5, NORMAL=0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Normal,
    High,
    Critical,
}

impl Priority {
    pub fn bus_priority(&self) -> i64 {
        match self {
            Priority::Critical => 10,
            Priority::High => 5,
            Priority::Normal => 0,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// One of the six fixed sub-agent roles EXECUTOR can invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubAgentType {
    CodeWriter,
    TestArchitect,
    ToolDeveloper,
    ImmunityEnforcer,
    ReleaseManager,
    TaskSummarizer,
}

impl SubAgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubAgentType::CodeWriter => "code_writer",
            SubAgentType::TestArchitect => "test_architect",
            SubAgentType::ToolDeveloper => "tool_developer",
            SubAgentType::ImmunityEnforcer => "immunity_enforcer",
            SubAgentType::ReleaseManager => "release_manager",
            SubAgentType::TaskSummarizer => "task_summarizer",
        }
    }
}

impl std::fmt::Display for SubAgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of work a `TaskSpec` names. `Unknown` absorbs any task_type string
/// the wire format doesn't recognize (§4.5.3 step 1: "unknown → default to
/// code_generation's fan-out") rather than rejecting the message outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    CodeGeneration,
    TestGeneration,
    ToolCreation,
    Verification,
    Merge,
    #[serde(other)]
    Unknown,
}

/// A task emitted by ARCHITECT onto `execution_queue` (§3, §4.5.2 step 9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub task_id: String,
    pub correlation_id: String,
    pub priority: Priority,
    pub task_type: TaskType,
    pub sub_agent: String,
    pub spec: Map<String, Value>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub timestamp: DateTime<Utc>,
}
