//! The absolute verification gate (§4.4, §6): a single external program
//! invocation, never bypassed, that decides whether a task may report
//! success. Grounded on the `tokio::process::Command` + `tokio::select!`
//! cancellation pattern the teacher uses in `tandem-tools::BashTool`.

use std::path::Path;
use std::time::{Duration, Instant};

use tokio::process::Command;

use crate::error::{AgentError, Result};
use crate::result::VerificationResult;

/// Launches `runner --run-all` from `workdir`, bounded by `timeout`. Exit
/// code 0 is the only passing outcome; a non-zero exit, a launch failure,
/// or hitting the timeout are all hard failures (§4.4 — "under no
/// circumstance does a task complete success without the gate returning
/// success").
pub async fn run_verification(
    workdir: &Path,
    runner: &str,
    timeout: Duration,
) -> Result<VerificationResult> {
    let start = Instant::now();

    let mut command = Command::new(runner);
    command.arg("--run-all").current_dir(workdir);
    command.stdout(std::process::Stdio::piped());
    command.stderr(std::process::Stdio::piped());
    // A timed-out child must not be left running — drop cancels the future,
    // and kill_on_drop turns that into an actual process kill.
    command.kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|err| AgentError::Launch(err.to_string()))?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => return Err(AgentError::Launch(err.to_string())),
        Err(_elapsed) => return Err(AgentError::Timeout(timeout)),
    };

    let duration_seconds = start.elapsed().as_secs_f64();
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code();
    let passed = output.status.success();

    if !passed {
        tracing::warn!(
            target: "trinity.agents",
            exit_code,
            "verification runner exited non-zero"
        );
    }

    Ok(VerificationResult {
        passed,
        exit_code,
        stdout,
        stderr,
        duration_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passing_runner_reports_success() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_verification(dir.path(), "true", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(result.passed);
        assert_eq!(result.exit_code, Some(0));
    }

    #[tokio::test]
    async fn failing_runner_reports_failure_without_erroring() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_verification(dir.path(), "false", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(!result.passed);
        assert_eq!(result.exit_code, Some(1));
    }

    #[tokio::test]
    async fn missing_runner_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_verification(dir.path(), "definitely-not-a-real-binary", Duration::from_secs(5)).await;
        assert!(matches!(err, Err(AgentError::Launch(_))));
    }

    #[tokio::test]
    async fn timeout_kills_the_child_and_reports_timeout() {
        // `yes` treats its first argument as the string to repeat forever,
        // so `yes --run-all` never exits on its own — exactly the shape of
        // a hung test runner this gate needs to bound.
        let dir = tempfile::tempdir().unwrap();
        let err = run_verification(dir.path(), "yes", Duration::from_millis(50)).await;
        assert!(matches!(err, Err(AgentError::Timeout(_))));
    }
}
