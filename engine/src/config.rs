//! Layered configuration for `trinity-engine` (SPEC_FULL.md §2): struct
//! defaults, overlaid by an optional YAML file, overlaid by `TRINITY_`
//! prefixed environment variables. Grounded on the teacher's
//! `tandem_core::ConfigStore` layering (global/project/managed/env/cli),
//! collapsed to the single file+env+defaults shape this binary needs —
//! `trinity-engine` is the only caller that ever builds role config structs
//! from outside sources (`trinity-roles::config` doc comment).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use trinity_roles::{ArchitectConfig, ExecutorConfig, WitnessConfig};

/// Raw shape of an optional YAML config file. Every field is optional so a
/// file can override just the knobs it cares about.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    state_dir: Option<String>,
    in_memory: Option<bool>,
    log_retention_days: Option<u64>,
    witness: FileWitnessConfig,
    architect: FileArchitectConfig,
    executor: FileExecutorConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileWitnessConfig {
    min_confidence: Option<f64>,
    emit_times_seen_threshold: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileArchitectConfig {
    min_complexity: Option<f64>,
    workspace_dir: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileExecutorConfig {
    workspace_dir: Option<String>,
    verification_workdir: Option<String>,
    verification_runner: Option<String>,
    verification_timeout_secs: Option<u64>,
    max_parallel_subagents: Option<usize>,
}

/// Fully resolved engine configuration: struct defaults, a config file, and
/// `TRINITY_*` env vars merged in that order (env wins).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub state_dir: PathBuf,
    pub in_memory: bool,
    pub log_retention_days: u64,
    pub witness: WitnessConfig,
    pub architect: ArchitectConfig,
    pub executor: ExecutorConfig,
}

impl EngineConfig {
    pub fn load(config_file: Option<&Path>) -> anyhow::Result<Self> {
        let file = match config_file {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path)?;
                serde_yaml::from_str(&raw)?
            }
            _ => FileConfig::default(),
        };

        let mut config = EngineConfig::defaults();
        config.apply_file(file);
        config.apply_env();
        Ok(config)
    }

    fn defaults() -> Self {
        Self {
            state_dir: PathBuf::from(".trinity"),
            in_memory: false,
            log_retention_days: 14,
            witness: WitnessConfig::default(),
            architect: ArchitectConfig::default(),
            executor: ExecutorConfig::default(),
        }
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(state_dir) = file.state_dir {
            self.state_dir = PathBuf::from(state_dir);
        }
        if let Some(in_memory) = file.in_memory {
            self.in_memory = in_memory;
        }
        if let Some(days) = file.log_retention_days {
            self.log_retention_days = days;
        }
        if let Some(v) = file.witness.min_confidence {
            self.witness.min_confidence = v;
        }
        if let Some(v) = file.witness.emit_times_seen_threshold {
            self.witness.emit_times_seen_threshold = v;
        }
        if let Some(v) = file.architect.min_complexity {
            self.architect.min_complexity = v;
        }
        if let Some(v) = file.architect.workspace_dir {
            self.architect.workspace_dir = PathBuf::from(v);
        }
        if let Some(v) = file.executor.workspace_dir {
            self.executor.workspace_dir = PathBuf::from(v);
        }
        if let Some(v) = file.executor.verification_workdir {
            self.executor.verification_workdir = PathBuf::from(v);
        }
        if let Some(v) = file.executor.verification_runner {
            self.executor.verification_runner = v;
        }
        if let Some(v) = file.executor.verification_timeout_secs {
            self.executor.verification_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.executor.max_parallel_subagents {
            self.executor.max_parallel_subagents = v;
        }
    }

    fn apply_env(&mut self) {
        if let Some(v) = env_string("TRINITY_STATE_DIR") {
            self.state_dir = PathBuf::from(v);
        }
        if let Some(v) = env_bool("TRINITY_IN_MEMORY") {
            self.in_memory = v;
        }
        if let Some(v) = env_parse::<u64>("TRINITY_LOG_RETENTION_DAYS") {
            self.log_retention_days = v;
        }
        if let Some(v) = env_parse::<f64>("TRINITY_WITNESS_MIN_CONFIDENCE") {
            self.witness.min_confidence = v;
        }
        if let Some(v) = env_parse::<u32>("TRINITY_WITNESS_RECURRENCE_THRESHOLD") {
            self.witness.emit_times_seen_threshold = v;
        }
        if let Some(v) = env_parse::<f64>("TRINITY_ARCHITECT_MIN_COMPLEXITY") {
            self.architect.min_complexity = v;
        }
        if let Some(v) = env_string("TRINITY_ARCHITECT_WORKSPACE_DIR") {
            self.architect.workspace_dir = PathBuf::from(v);
        }
        if let Some(v) = env_string("TRINITY_EXECUTOR_WORKSPACE_DIR") {
            self.executor.workspace_dir = PathBuf::from(v);
        }
        if let Some(v) = env_string("TRINITY_EXECUTOR_VERIFICATION_WORKDIR") {
            self.executor.verification_workdir = PathBuf::from(v);
        }
        if let Some(v) = env_string("TRINITY_EXECUTOR_VERIFICATION_RUNNER") {
            self.executor.verification_runner = v;
        }
        if let Some(v) = env_parse::<u64>("TRINITY_EXECUTOR_VERIFICATION_TIMEOUT_SECS") {
            self.executor.verification_timeout = Duration::from_secs(v);
        }
        if let Some(v) = env_parse::<usize>("TRINITY_EXECUTOR_MAX_PARALLEL_SUBAGENTS") {
            self.executor.max_parallel_subagents = v;
        }
    }

    pub fn bus_path(&self) -> PathBuf {
        self.store_path("bus.sqlite")
    }

    pub fn patterns_path(&self) -> PathBuf {
        self.store_path("patterns.sqlite")
    }

    pub fn cost_path(&self) -> PathBuf {
        self.store_path("cost.sqlite")
    }

    fn store_path(&self, file_name: &str) -> PathBuf {
        if self.in_memory {
            PathBuf::from(":memory:")
        } else {
            self.state_dir.join(file_name)
        }
    }

    pub fn logs_dir(&self) -> PathBuf {
        trinity_observability::canonical_logs_dir_from_root(&self.state_dir)
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_bool(key: &str) -> Option<bool> {
    match env_string(key)?.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_role_config_defaults() {
        let config = EngineConfig::defaults();
        assert_eq!(config.state_dir, PathBuf::from(".trinity"));
        assert_eq!(config.witness.min_confidence, WitnessConfig::default().min_confidence);
        assert_eq!(config.architect.min_complexity, ArchitectConfig::default().min_complexity);
        assert_eq!(
            config.executor.max_parallel_subagents,
            ExecutorConfig::default().max_parallel_subagents
        );
    }

    #[test]
    fn file_overrides_apply_over_defaults() {
        let mut config = EngineConfig::defaults();
        config.apply_file(FileConfig {
            state_dir: Some("/tmp/trinity-test".to_string()),
            witness: FileWitnessConfig {
                min_confidence: Some(0.9),
                ..Default::default()
            },
            ..Default::default()
        });
        assert_eq!(config.state_dir, PathBuf::from("/tmp/trinity-test"));
        assert_eq!(config.witness.min_confidence, 0.9);
    }

    #[test]
    fn in_memory_flag_selects_memory_paths() {
        let mut config = EngineConfig::defaults();
        config.in_memory = true;
        assert_eq!(config.bus_path(), PathBuf::from(":memory:"));
        assert_eq!(config.patterns_path(), PathBuf::from(":memory:"));
        assert_eq!(config.cost_path(), PathBuf::from(":memory:"));
    }
}
