//! EXECUTOR — action (§4.5.3). Subscribes to `execution_queue` and runs the
//! 9-step deconstruct → externalize → orchestrate → (fail|merge → verify →
//! report) → reset cycle per task. Generic over the cost backend so the
//! engine binary can wire either `MemoryStorage` or `SqliteStorage` through
//! the same code, matching `trinity-cost`'s own `CostTracker<S>` shape.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Map, Value};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use trinity_agents::{run_verification, SubAgentRegistry, SubAgentResult, VerificationResult};
use trinity_bus::{queues, MessageBus};
use trinity_cost::{CostStorage, CostTracker, TrackParams};
use trinity_types::{CostEntry, ExecutionPlan, SubAgentType, TaskSpec};

use crate::architect::plan::deconstruct;
use crate::config::ExecutorConfig;
use crate::error::Result;

/// `get_stats()`'s four counters from the original, surfaced verbatim.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ExecutorStats {
    pub tasks_processed: u64,
    pub tasks_succeeded: u64,
    pub tasks_failed: u64,
    pub total_cost_usd: f64,
}

pub struct Executor<S: CostStorage> {
    bus: Arc<MessageBus>,
    registry: Arc<SubAgentRegistry>,
    cost_tracker: Arc<CostTracker<S>>,
    config: ExecutorConfig,
    stats: Mutex<ExecutorStats>,
}

impl<S: CostStorage> Executor<S> {
    pub fn new(
        bus: Arc<MessageBus>,
        registry: Arc<SubAgentRegistry>,
        cost_tracker: Arc<CostTracker<S>>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            bus,
            registry,
            cost_tracker,
            config,
            stats: Mutex::new(ExecutorStats::default()),
        }
    }

    pub fn stats(&self) -> ExecutorStats {
        self.stats.lock().expect("executor stats lock poisoned").clone()
    }

    pub async fn run(&self, cancel: CancellationToken) {
        let mut tasks = self.bus.subscribe(queues::EXECUTION_QUEUE, 1);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(target: "trinity.executor", "stopping");
                    break;
                }
                message = tasks.next() => {
                    let Some(message) = message else { break };
                    let message_id = message.id;
                    if let Err(err) = self.process_message(&message.payload).await {
                        error!(target: "trinity.executor", error = %err, "task processing failed");
                    }
                    if let Err(err) = self.bus.ack(message_id).await {
                        error!(target: "trinity.executor", error = %err, "ack failed");
                    }
                }
            }
        }
    }

    /// Deserializes the raw payload and runs one cycle. A malformed payload
    /// can't be deconstructed at all, so it goes straight to a failure
    /// report rather than through [`Self::execute_task`].
    pub async fn process_message(&self, payload: &Value) -> Result<()> {
        let task: TaskSpec = match serde_json::from_value(payload.clone()) {
            Ok(task) => task,
            Err(err) => {
                let task_id = payload.get("task_id").and_then(Value::as_str).unwrap_or("unknown");
                let correlation_id = payload
                    .get("correlation_id")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                let report = build_telemetry_report(
                    "failure",
                    task_id,
                    &correlation_id,
                    format!("Task failed: {err}"),
                    &[],
                    json!("N/A - Task failure"),
                );
                self.bus
                    .publish(queues::TELEMETRY_STREAM, report, 10, Some(correlation_id))
                    .await?;
                return Ok(());
            }
        };
        self.execute_task(&task).await
    }

    async fn execute_task(&self, task: &TaskSpec) -> Result<()> {
        self.stats.lock().expect("executor stats lock poisoned").tasks_processed += 1;

        // Steps 1-2: deconstruct + externalize.
        let plan = deconstruct(task);
        self.externalize_plan(&plan).await?;

        // Step 3: orchestrate in parallel, step 5 on first failure.
        let (sub_agent_reports, any_failed) = self.orchestrate_parallel(&plan).await?;
        if any_failed {
            return self.fail_task(task, "one or more sub-agents failed").await;
        }

        // Step 6: delegate merge. Never raises — failure surfaces as a
        // `SubAgentResult` with `status=failure`, carried into verification
        // like any other report.
        let (merge_result, merge_cost) = self.invoke_merge(task, &sub_agent_reports).await;
        self.record_cost(&merge_cost)?;
        let mut sub_agent_reports = sub_agent_reports;
        sub_agent_reports.push(merge_result);

        // Step 7: absolute verification. Never bypassed.
        let verification = match run_verification(
            &self.config.verification_workdir,
            &self.config.verification_runner,
            self.config.verification_timeout,
        )
        .await
        {
            Ok(result) => result,
            Err(err) => return self.fail_task(task, &err.to_string()).await,
        };
        if !verification.passed {
            let reason = format!(
                "verification failed: exit_code={:?} stdout={} stderr={}",
                verification.exit_code, verification.stdout, verification.stderr
            );
            return self.fail_task_with_verification(task, &reason, Some(&verification)).await;
        }

        // Step 8: report success. Step 9: reset.
        self.report_success(task, &sub_agent_reports, &verification).await
    }

    /// Step 3. Runs each parallel group to completion (bounded by
    /// `max_parallel_subagents`) before starting the next; stops dispatching
    /// further groups the moment one result comes back `status=failure`,
    /// matching "abort the remaining groups and jump to step 5".
    async fn orchestrate_parallel(&self, plan: &ExecutionPlan) -> Result<(Vec<SubAgentResult>, bool)> {
        let mut all_results = Vec::new();
        let mut any_failed = false;

        for group in &plan.parallel_groups {
            if any_failed {
                break;
            }

            let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_subagents.max(1)));
            let mut join_set = JoinSet::new();
            for agent_type in &group.agents {
                let Some(spec_entry) = plan.sub_agent_specs.iter().find(|s| &s.agent == agent_type) else {
                    continue;
                };
                let agent = self.registry.get(*agent_type);
                let task_spec = spec_entry.task.spec.clone();
                let permit = semaphore.clone();
                join_set.spawn(async move {
                    let _permit = permit.acquire_owned().await.expect("semaphore closed");
                    agent.invoke(&task_spec).await
                });
            }

            while let Some(joined) = join_set.join_next().await {
                let (result, cost_entry) =
                    joined.map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err.to_string()))?;
                self.record_cost(&cost_entry)?;
                if !result.is_success() {
                    any_failed = true;
                }
                all_results.push(result);
            }
        }

        Ok((all_results, any_failed))
    }

    async fn invoke_merge(&self, task: &TaskSpec, prior: &[SubAgentResult]) -> (SubAgentResult, CostEntry) {
        let merge_spec = build_merge_spec(task, prior);
        let agent = self.registry.get(SubAgentType::ReleaseManager);
        agent.invoke(&merge_spec).await
    }

    fn record_cost(&self, entry: &CostEntry) -> Result<()> {
        let params = TrackParams {
            operation: entry.operation.clone(),
            model: entry.model.clone(),
            model_tier: entry.model_tier,
            tokens_in: entry.tokens_in,
            tokens_out: entry.tokens_out,
            duration_seconds: entry.duration_seconds,
            success: entry.success,
            metadata: entry.metadata.clone(),
            error: entry.error.clone(),
        };
        self.cost_tracker.track(params)?;
        Ok(())
    }

    async fn externalize_plan(&self, plan: &ExecutionPlan) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.workspace_dir).await?;
        let content = render_plan_markdown(plan, self.config.verification_timeout);
        tokio::fs::write(self.plan_path(&plan.task_id), content).await?;
        Ok(())
    }

    async fn write_error_log(&self, task: &TaskSpec, reason: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.config.workspace_dir).await?;
        let content = format!(
            "Task Failure: {}\n\nTimestamp: {}\nError: {}\nTask: {}\n",
            task.task_id,
            chrono::Utc::now().to_rfc3339(),
            reason,
            serde_json::to_string_pretty(task).unwrap_or_default(),
        );
        tokio::fs::write(self.error_log_path(&task.task_id), content).await?;
        Ok(())
    }

    async fn cleanup_workspace(&self, task_id: &str) {
        let _ = tokio::fs::remove_file(self.plan_path(task_id)).await;
        let _ = tokio::fs::remove_file(self.error_log_path(task_id)).await;
    }

    fn plan_path(&self, task_id: &str) -> std::path::PathBuf {
        self.config.workspace_dir.join(format!("{task_id}_plan.md"))
    }

    fn error_log_path(&self, task_id: &str) -> std::path::PathBuf {
        self.config.workspace_dir.join(format!("{task_id}_error.log"))
    }

    /// Step 5: log the failure, publish its report, reset, and return.
    /// Never propagated as an `Err`.
    async fn fail_task(&self, task: &TaskSpec, reason: &str) -> Result<()> {
        self.fail_task_with_verification(task, reason, None).await
    }

    /// Same as [`Self::fail_task`], but when a verification attempt actually
    /// ran, embeds its captured `stdout`/`stderr` in the telemetry report
    /// instead of the placeholder, so both streams reach the failure report
    /// the same way [`Self::report_success`] treats the passing case.
    async fn fail_task_with_verification(
        &self,
        task: &TaskSpec,
        reason: &str,
        verification: Option<&VerificationResult>,
    ) -> Result<()> {
        self.write_error_log(task, reason).await?;

        let verification_result = match verification {
            Some(result) => serde_json::to_value(result)?,
            None => json!("N/A - Task failure"),
        };
        let report = build_telemetry_report(
            "failure",
            &task.task_id,
            &task.correlation_id,
            format!("Task failed: {reason}"),
            &[],
            verification_result,
        );
        self.bus
            .publish(queues::TELEMETRY_STREAM, report, 10, Some(task.correlation_id.clone()))
            .await?;

        self.stats.lock().expect("executor stats lock poisoned").tasks_failed += 1;
        self.cleanup_workspace(&task.task_id).await;
        Ok(())
    }

    async fn report_success(
        &self,
        task: &TaskSpec,
        reports: &[SubAgentResult],
        verification: &VerificationResult,
    ) -> Result<()> {
        let details = format!("Task completed and verified. {}", verification.stdout);
        let report = build_telemetry_report(
            "success",
            &task.task_id,
            &task.correlation_id,
            details,
            reports,
            serde_json::to_value(verification)?,
        );
        self.bus
            .publish(queues::TELEMETRY_STREAM, report, 5, Some(task.correlation_id.clone()))
            .await?;

        let mut stats = self.stats.lock().expect("executor stats lock poisoned");
        stats.tasks_succeeded += 1;
        stats.total_cost_usd += reports.iter().map(|r| r.cost_usd).sum::<f64>();
        drop(stats);

        self.cleanup_workspace(&task.task_id).await;
        Ok(())
    }
}

fn build_merge_spec(task: &TaskSpec, prior: &[SubAgentResult]) -> Map<String, Value> {
    let mut spec = Map::new();
    spec.insert("goal".to_string(), json!("Integrate changes from sub-agents"));
    spec.insert(
        "details".to_string(),
        json!(format!("Merge results from {} sub-agents", prior.len())),
    );
    spec.insert("task_id".to_string(), json!(task.task_id));
    spec.insert(
        "sub_agent_results".to_string(),
        json!(prior
            .iter()
            .map(|r| json!({"agent": r.agent, "status": r.status, "summary": r.summary}))
            .collect::<Vec<_>>()),
    );
    spec
}

fn build_telemetry_report(
    status: &str,
    task_id: &str,
    correlation_id: &str,
    details: String,
    sub_agent_reports: &[SubAgentResult],
    verification_result: Value,
) -> Value {
    json!({
        "status": status,
        "task_id": task_id,
        "correlation_id": correlation_id,
        "details": details,
        "sub_agent_reports": sub_agent_reports.iter().map(|r| json!({
            "agent": r.agent,
            "status": r.status,
            "summary": r.summary,
            "cost_usd": r.cost_usd,
        })).collect::<Vec<_>>(),
        "verification_result": verification_result,
        "timestamp": chrono::Utc::now(),
    })
}

fn render_plan_markdown(plan: &ExecutionPlan, verification_timeout: Duration) -> String {
    let mut content = format!(
        "# Execution Plan: {}\n\n**Correlation ID**: {}\n**Timestamp**: {}\n\n## Sub-Agents\n\n",
        plan.task_id,
        plan.correlation_id,
        chrono::Utc::now().to_rfc3339(),
    );

    for (i, spec) in plan.sub_agent_specs.iter().enumerate() {
        let details = spec
            .task
            .spec
            .get("details")
            .and_then(Value::as_str)
            .unwrap_or("N/A");
        content.push_str(&format!("{}. **{}**\n   Spec: {}\n\n", i + 1, spec.agent, details));
    }

    content.push_str("## Parallel Groups\n\n");
    for (i, group) in plan.parallel_groups.iter().enumerate() {
        let names = group.agents.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
        content.push_str(&format!("{}. {names}\n", i + 1));
    }

    content.push_str(&format!(
        "\n## Verification\n\nCommand: `{}`\nTimeout: {}s\n",
        plan.verification_command,
        verification_timeout.as_secs(),
    ));

    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::Path;
    use trinity_cost::MemoryStorage;
    use trinity_types::{Priority, TaskType};

    fn executor(workspace: std::path::PathBuf, runner: &str) -> Executor<MemoryStorage> {
        Executor::new(
            Arc::new(MessageBus::open(Path::new(":memory:")).unwrap()),
            Arc::new(SubAgentRegistry::new()),
            Arc::new(CostTracker::new(MemoryStorage::new())),
            ExecutorConfig {
                workspace_dir: workspace,
                verification_workdir: std::env::temp_dir(),
                verification_runner: runner.to_string(),
                verification_timeout: Duration::from_secs(5),
                max_parallel_subagents: 4,
            },
        )
    }

    fn task(task_type: TaskType, spec: Map<String, Value>) -> TaskSpec {
        TaskSpec {
            task_id: "corr-1_code".to_string(),
            correlation_id: "corr-1".to_string(),
            priority: Priority::Normal,
            task_type,
            sub_agent: SubAgentType::CodeWriter.to_string(),
            spec,
            dependencies: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn successful_task_emits_one_success_report_with_all_sub_agent_results() {
        let dir = tempfile::tempdir().unwrap();
        let e = executor(dir.path().to_path_buf(), "true");
        let t = task(TaskType::CodeGeneration, Map::new());
        e.execute_task(&t).await.unwrap();

        assert_eq!(e.stats().tasks_succeeded, 1);
        assert_eq!(e.stats().tasks_failed, 0);

        let pending = e.bus.by_correlation("corr-1").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload["status"], "success");
        let reports = pending[0].payload["sub_agent_reports"].as_array().unwrap();
        // code_writer + test_architect + release_manager.
        assert_eq!(reports.len(), 3);
    }

    #[tokio::test]
    async fn sub_agent_failure_aborts_before_merge_and_verification() {
        let dir = tempfile::tempdir().unwrap();
        let e = executor(dir.path().to_path_buf(), "true");
        let mut spec = Map::new();
        spec.insert("force_failure".to_string(), json!("test_architect"));
        let t = task(TaskType::CodeGeneration, spec);
        e.execute_task(&t).await.unwrap();

        assert_eq!(e.stats().tasks_failed, 1);
        assert_eq!(e.stats().tasks_succeeded, 0);

        let reports = e.bus.by_correlation("corr-1").await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].payload["status"], "failure");
        assert!(reports[0].payload["sub_agent_reports"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn verification_failure_blocks_success_but_merge_cost_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let e = executor(dir.path().to_path_buf(), "false");
        let t = task(TaskType::CodeGeneration, Map::new());
        e.execute_task(&t).await.unwrap();

        assert_eq!(e.stats().tasks_failed, 1);
        let summary = e
            .cost_tracker
            .summary(&trinity_cost::SummaryFilters::default())
            .unwrap();
        // code_writer + test_architect + release_manager all tracked despite the
        // task ultimately failing at the verification gate.
        assert_eq!(summary.total_calls, 3);

        let reports = e.bus.by_correlation("corr-1").await.unwrap();
        assert_eq!(reports[0].payload["status"], "failure");
        // The real captured exit code/stdout/stderr reach the failure report,
        // not the "N/A" placeholder used when verification never ran at all.
        assert_eq!(reports[0].payload["verification_result"]["exit_code"], 1);
        assert_eq!(reports[0].payload["verification_result"]["passed"], false);
    }

    #[tokio::test]
    async fn malformed_payload_publishes_failure_telemetry_without_a_task_id() {
        let dir = tempfile::tempdir().unwrap();
        let e = executor(dir.path().to_path_buf(), "true");
        let bad = json!({"not": "a task"});
        e.process_message(&bad).await.unwrap();
        let pending = e.bus.pending_count(queues::TELEMETRY_STREAM).await.unwrap();
        assert_eq!(pending, 1);
    }

    #[tokio::test]
    async fn workspace_files_are_cleaned_up_after_a_successful_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let e = executor(dir.path().to_path_buf(), "true");
        let t = task(TaskType::CodeGeneration, Map::new());
        e.execute_task(&t).await.unwrap();
        assert!(!e.plan_path(&t.task_id).exists());
        assert!(!e.error_log_path(&t.task_id).exists());
    }
}
