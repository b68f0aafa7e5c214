use thiserror::Error;

/// Aggregates every lower-layer error a Trinity role can surface, mirroring
/// the teacher's `TandemError` aggregation role (`#[from]` on each
/// component's own enum rather than a shared `anyhow::Error`).
#[derive(Error, Debug)]
pub enum RoleError {
    #[error(transparent)]
    Bus(#[from] trinity_bus::BusError),

    #[error(transparent)]
    Pattern(#[from] trinity_patterns::PatternError),

    #[error(transparent)]
    Cost(#[from] trinity_cost::CostError),

    #[error(transparent)]
    Agent(#[from] trinity_agents::AgentError),

    #[error(transparent)]
    Planning(#[from] PlanningError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RoleError>;

/// Raised by [`crate::architect::plan::validate_plan`] (§4.5.2 step 8).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanningError {
    #[error("task graph is empty")]
    EmptyTaskGraph,

    #[error("task {0} has no sub_agent assigned")]
    MissingSubAgent(String),

    #[error("code_generation task present without a corresponding test_generation task")]
    MissingTestTask,

    #[error("task {task_id} depends on unknown task {dependency_id}")]
    InvalidDependency { task_id: String, dependency_id: String },

    #[error("task {0} depends on itself")]
    SelfDependency(String),

    #[error("duplicate task id {0}")]
    DuplicateTaskId(String),
}
