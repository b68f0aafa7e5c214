//! ARCHITECT — cognition (§4.5.2). Subscribes to `improvement_queue` and
//! runs the 10-step triage → context → complexity → engine → strategy →
//! externalize → task graph → self-verify → publish → reset cycle per
//! signal.

pub mod markdown;
pub mod plan;

use std::sync::{Arc, Mutex};

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use trinity_bus::{queues, MessageBus};
use trinity_patterns::{PatternStore, SearchQuery};
use trinity_types::{Pattern, Strategy};

use crate::config::ArchitectConfig;
use crate::error::Result;
use crate::signal::Signal;

/// §4.5.2's five counters, surfaced verbatim (`get_stats()` in the original).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ArchitectStats {
    pub signals_processed: u64,
    pub specs_generated: u64,
    pub adrs_generated: u64,
    pub tasks_created: u64,
    pub escalations: u64,
}

pub struct Architect {
    bus: Arc<MessageBus>,
    patterns: Arc<dyn PatternStore>,
    config: ArchitectConfig,
    stats: Mutex<ArchitectStats>,
}

impl Architect {
    pub fn new(bus: Arc<MessageBus>, patterns: Arc<dyn PatternStore>, config: ArchitectConfig) -> Self {
        Self {
            bus,
            patterns,
            config,
            stats: Mutex::new(ArchitectStats::default()),
        }
    }

    pub fn stats(&self) -> ArchitectStats {
        self.stats.lock().expect("architect stats lock poisoned").clone()
    }

    pub async fn run(&self, cancel: CancellationToken) {
        let mut signals = self.bus.subscribe(queues::IMPROVEMENT_QUEUE, 1);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(target: "trinity.architect", "stopping");
                    break;
                }
                message = signals.next() => {
                    let Some(message) = message else { break };
                    let message_id = message.id;
                    if let Err(err) = self.process_message(&message.payload).await {
                        error!(target: "trinity.architect", error = %err, "signal processing failed");
                    }
                    if let Err(err) = self.bus.ack(message_id).await {
                        error!(target: "trinity.architect", error = %err, "ack failed");
                    }
                }
            }
        }
    }

    /// Deserializes the raw payload and runs one cycle, converting any
    /// failure into a telemetry report rather than propagating it — every
    /// signal either completes fully or produces exactly one failure report
    /// (§7 propagation policy).
    pub async fn process_message(&self, payload: &serde_json::Value) -> Result<()> {
        let signal: Signal = match serde_json::from_value(payload.clone()) {
            Ok(signal) => signal,
            Err(err) => {
                let correlation_id = payload
                    .get("correlation_id")
                    .and_then(serde_json::Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                return self
                    .publish_failure(&correlation_id, payload, &err.to_string())
                    .await;
            }
        };

        match self.process_signal(&signal).await {
            Ok(()) => {
                self.stats.lock().expect("architect stats lock poisoned").signals_processed += 1;
                Ok(())
            }
            Err(err) => {
                self.publish_failure(&signal.correlation_id, payload, &err.to_string())
                    .await
            }
        }
    }

    async fn process_signal(&self, signal: &Signal) -> Result<()> {
        let correlation_id = signal.correlation_id.clone();

        // Step 2: gather context.
        let historical_patterns = self.gather_context(signal).await?;

        // Steps 3-4: complexity + engine selection.
        let complexity = plan::assess_complexity(signal);
        let (engine, escalated) = plan::select_engine(signal, complexity);
        if escalated {
            self.stats.lock().expect("architect stats lock poisoned").escalations += 1;
        }

        // Step 5: formulate strategy.
        let strategy = self.formulate_strategy(signal, &historical_patterns, complexity, engine, &correlation_id);

        // Step 6: externalize.
        self.externalize_strategy(&correlation_id, &strategy).await?;

        // Step 7: task graph.
        let tasks = plan::generate_task_graph(&strategy, &correlation_id);
        self.stats.lock().expect("architect stats lock poisoned").tasks_created += tasks.len() as u64;

        // Step 8: self-verify.
        let verify_result = plan::validate_plan(&tasks);
        // Step 10 happens regardless of step 8's outcome (stateless reset).
        self.cleanup_workspace(&correlation_id).await;
        verify_result?;

        // Step 9: publish.
        for task in &tasks {
            self.bus
                .publish(
                    queues::EXECUTION_QUEUE,
                    serde_json::to_value(task)?,
                    task.priority.bus_priority(),
                    Some(correlation_id.clone()),
                )
                .await?;
        }

        Ok(())
    }

    async fn gather_context(&self, signal: &Signal) -> Result<Vec<Pattern>> {
        let query_text = if signal.pattern.is_empty() {
            "general".to_string()
        } else {
            signal.pattern.clone()
        };
        let query = SearchQuery {
            query: Some(query_text),
            min_confidence: 0.6,
            limit: 5,
            ..SearchQuery::new()
        };
        Ok(self.patterns.search_patterns(&query).await?)
    }

    fn formulate_strategy(
        &self,
        signal: &Signal,
        historical_patterns: &[Pattern],
        complexity: f64,
        engine: trinity_types::ModelTier,
        correlation_id: &str,
    ) -> Strategy {
        if complexity >= self.config.min_complexity {
            let spec_markdown = markdown::render_spec_markdown(signal, historical_patterns, correlation_id);
            self.stats.lock().expect("architect stats lock poisoned").specs_generated += 1;

            let adr_markdown = if plan::is_architectural(signal) {
                self.stats.lock().expect("architect stats lock poisoned").adrs_generated += 1;
                Some(markdown::render_adr_markdown(signal, correlation_id))
            } else {
                None
            };

            Strategy {
                priority: signal.priority,
                complexity,
                engine,
                decision: format!("Complex task requiring formal specification (complexity={complexity:.2})"),
                spec_markdown: Some(spec_markdown),
                adr_markdown,
                tasks: Vec::new(),
            }
        } else {
            Strategy {
                priority: signal.priority,
                complexity,
                engine,
                decision: format!("Simple task, direct implementation (complexity={complexity:.2})"),
                spec_markdown: None,
                adr_markdown: None,
                tasks: Vec::new(),
            }
        }
    }

    async fn externalize_strategy(&self, correlation_id: &str, strategy: &Strategy) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.workspace_dir).await?;
        let path = self.strategy_path(correlation_id);
        let content = render_strategy_file(strategy);
        tokio::fs::write(&path, content).await?;
        Ok(())
    }

    async fn cleanup_workspace(&self, correlation_id: &str) {
        let path = self.strategy_path(correlation_id);
        let _ = tokio::fs::remove_file(&path).await;
    }

    fn strategy_path(&self, correlation_id: &str) -> std::path::PathBuf {
        self.config.workspace_dir.join(format!("{correlation_id}_strategy.md"))
    }

    async fn publish_failure(
        &self,
        correlation_id: &str,
        signal: &serde_json::Value,
        reason: &str,
    ) -> Result<()> {
        let report = serde_json::json!({
            "status": "failure",
            "correlation_id": correlation_id,
            "signal": signal,
            "error": reason,
            "timestamp": chrono::Utc::now(),
        });
        self.bus
            .publish(queues::TELEMETRY_STREAM, report, 10, Some(correlation_id.to_string()))
            .await?;
        Ok(())
    }
}

fn render_strategy_file(strategy: &Strategy) -> String {
    let mut content = format!(
        "# Strategy\n\n## Engine\n{}\n\n## Complexity\n{:.2}\n\n## Decision\n{}\n\n## Spec Generated\n{}\n\n## ADR Generated\n{}\n",
        strategy.engine,
        strategy.complexity,
        strategy.decision,
        if strategy.spec_markdown.is_some() { "Yes" } else { "No" },
        if strategy.adr_markdown.is_some() { "Yes" } else { "No" },
    );
    content.push_str("\n## Task Graph\n");
    for task in &strategy.tasks {
        content.push_str(&format!("- {}: {:?} ({})\n", task.task_id, task.task_type, task.sub_agent));
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalData;
    use std::path::Path;
    use trinity_patterns::InMemoryPatternStore;

    fn architect(workspace: std::path::PathBuf) -> Architect {
        Architect::new(
            Arc::new(MessageBus::open(Path::new(":memory:")).unwrap()),
            Arc::new(InMemoryPatternStore::new()),
            ArchitectConfig {
                min_complexity: 0.7,
                workspace_dir: workspace,
            },
        )
    }

    fn signal(priority: trinity_types::Priority, pattern: &str, keywords: &[&str]) -> Signal {
        Signal {
            correlation_id: "corr-1".to_string(),
            priority,
            pattern: pattern.to_string(),
            pattern_type: Some(pattern.to_string()),
            data: SignalData {
                keywords: keywords.iter().map(|s| s.to_string()).collect(),
                extra: Default::default(),
            },
            evidence_count: 1,
            confidence: 0.8,
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn simple_signal_produces_three_tasks_without_spec() {
        let dir = tempfile::tempdir().unwrap();
        let a = architect(dir.path().to_path_buf());
        let s = signal(trinity_types::Priority::Normal, "opportunity", &[]);
        a.process_signal(&s).await.unwrap();

        let tasks = a.bus.by_correlation("corr-1").await.unwrap();
        assert_eq!(tasks.len(), 3);
        assert_eq!(a.stats().tasks_created, 3);
        assert_eq!(a.stats().specs_generated, 0);
    }

    #[tokio::test]
    async fn architectural_keyword_generates_spec_and_adr() {
        let dir = tempfile::tempdir().unwrap();
        let a = architect(dir.path().to_path_buf());
        let s = signal(trinity_types::Priority::Normal, "refactor", &["architecture"]);
        a.process_signal(&s).await.unwrap();

        assert_eq!(a.stats().specs_generated, 1);
        assert_eq!(a.stats().adrs_generated, 1);
    }

    #[tokio::test]
    async fn critical_priority_escalates() {
        let dir = tempfile::tempdir().unwrap();
        let a = architect(dir.path().to_path_buf());
        let s = signal(trinity_types::Priority::Critical, "failure", &[]);
        a.process_signal(&s).await.unwrap();
        assert_eq!(a.stats().escalations, 1);
    }

    #[tokio::test]
    async fn workspace_file_is_cleaned_up_after_the_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let a = architect(dir.path().to_path_buf());
        let s = signal(trinity_types::Priority::Normal, "opportunity", &[]);
        a.process_signal(&s).await.unwrap();
        assert!(!a.strategy_path("corr-1").exists());
    }

    #[tokio::test]
    async fn malformed_payload_publishes_failure_telemetry() {
        let dir = tempfile::tempdir().unwrap();
        let a = architect(dir.path().to_path_buf());
        let bad = serde_json::json!({"not": "a signal"});
        a.process_message(&bad).await.unwrap();
        let pending = a.bus.pending_count(queues::TELEMETRY_STREAM).await.unwrap();
        assert_eq!(pending, 1);
    }
}
