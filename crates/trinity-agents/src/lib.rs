//! Sub-agent registry and verification gate (§4.4).
//!
//! [`agents`] holds the six fixed, stub-backed worker roles EXECUTOR can
//! invoke through the [`SubAgent`] trait; [`registry::SubAgentRegistry`]
//! resolves a `trinity_types::SubAgentType` to its handle. [`verification`]
//! is the separate, mandatory external-test-runner gate — not a role —
//! that EXECUTOR runs once per task before it may report success.

pub mod agents;
mod error;
mod prompt;
mod registry;
mod result;
mod sub_agent;
pub mod verification;

pub use error::{AgentError, Result};
pub use prompt::{estimate_tokens, format_prompt};
pub use registry::SubAgentRegistry;
pub use result::{SubAgentResult, SubAgentStatus, VerificationResult};
pub use sub_agent::SubAgent;
pub use verification::run_verification;
