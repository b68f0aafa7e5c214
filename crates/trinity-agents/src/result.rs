use serde::{Deserialize, Serialize};

/// Outcome of one sub-agent invocation. Every invocation, success or
/// failure, produces exactly one of these plus exactly one cost entry,
/// tracked separately by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAgentResult {
    pub agent: String,
    pub status: SubAgentStatus,
    pub summary: String,
    pub duration_seconds: f64,
    pub cost_usd: f64,
    pub error: Option<String>,
}

impl SubAgentResult {
    pub fn is_success(&self) -> bool {
        matches!(self.status, SubAgentStatus::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubAgentStatus {
    Success,
    Failure,
}

/// Outcome of the external test-runner gate (§4.4, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub passed: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_seconds: f64,
}
