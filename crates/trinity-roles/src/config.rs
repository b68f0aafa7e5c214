//! Configuration recognized by the three role loops (§6 of the spec).
//! Each role owns one config struct with the spec's literal defaults;
//! `trinity-engine` is the only crate that ever builds these from env vars
//! or a config file — roles themselves just take a struct.

use std::path::PathBuf;
use std::time::Duration;

/// WITNESS-specific knobs (§4.5.1).
#[derive(Debug, Clone)]
pub struct WitnessConfig {
    /// Detections below this confidence are discarded before reaching the
    /// pattern store.
    pub min_confidence: f64,
    /// `times_seen` value at or above which a recurring (non-HIGH/CRITICAL)
    /// pattern still earns an improvement signal.
    pub emit_times_seen_threshold: u32,
}

impl Default for WitnessConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            emit_times_seen_threshold: 5,
        }
    }
}

/// ARCHITECT-specific knobs (§4.5.2).
#[derive(Debug, Clone)]
pub struct ArchitectConfig {
    /// Complexity at or above which a spec (and possibly an ADR) is
    /// generated before the task graph.
    pub min_complexity: f64,
    /// Directory strategy files are externalized to (step 6), advisory
    /// only per §9 design note.
    pub workspace_dir: PathBuf,
}

impl Default for ArchitectConfig {
    fn default() -> Self {
        Self {
            min_complexity: 0.7,
            workspace_dir: PathBuf::from(".trinity/workspace/architect"),
        }
    }
}

/// EXECUTOR-specific knobs (§4.5.3, §4.4).
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Directory execution plans (and error logs) are externalized to.
    pub workspace_dir: PathBuf,
    /// Working directory the verification runner is launched from.
    pub verification_workdir: PathBuf,
    /// Program name invoked as `<runner> --run-all` (§6).
    pub verification_runner: String,
    /// Hard timeout on the verification subprocess.
    pub verification_timeout: Duration,
    /// Caps concurrent sub-agent invocations within one parallel group.
    pub max_parallel_subagents: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::from(".trinity/workspace/executor"),
            verification_workdir: PathBuf::from("."),
            verification_runner: "run_tests".to_string(),
            verification_timeout: Duration::from_secs(600),
            max_parallel_subagents: 4,
        }
    }
}
