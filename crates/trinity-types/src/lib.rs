//! Shared data model for the Trinity Protocol core.
//!
//! Every cross-crate structure that crosses the message bus boundary or a
//! durable store lives here: the bus `Message` envelope, the `Pattern` store
//! record, cost-tracking `CostEntry`, and the ARCHITECT/EXECUTOR planning
//! types (`TaskSpec`, `ExecutionPlan`, `Strategy`).

mod cost;
mod message;
mod pattern;
mod plan;
mod task;

pub use cost::{CostEntry, CostSummary, ModelTier};
pub use message::{Message, MessageStatus};
pub use pattern::{Pattern, PatternType};
pub use plan::{ExecutionPlan, ParallelGroup, Strategy, SubAgentSpec};
pub use task::{Priority, SubAgentType, TaskSpec, TaskType};

/// Queue names recognized by the core (§6 of the spec).
pub mod queues {
    pub const TELEMETRY_STREAM: &str = "telemetry_stream";
    pub const PERSONAL_CONTEXT_STREAM: &str = "personal_context_stream";
    pub const IMPROVEMENT_QUEUE: &str = "improvement_queue";
    pub const EXECUTION_QUEUE: &str = "execution_queue";
}
