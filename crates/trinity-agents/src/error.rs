use thiserror::Error;

/// The ways a sub-agent invocation or the verification gate can fail.
/// `Timeout`/`Launch` are verification-gate-only. A non-zero exit from the
/// runner is not an error on this path; it's carried as `passed: false` on
/// the returned `VerificationResult` so callers keep the captured
/// stdout/stderr. A `SubAgent` impl reports its own failures as
/// `SubAgentFailure`.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("verification runner timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("failed to launch verification runner: {0}")]
    Launch(String),

    #[error("sub-agent {agent} failed: {reason}")]
    SubAgentFailure { agent: String, reason: String },
}

pub type Result<T> = std::result::Result<T, AgentError>;
