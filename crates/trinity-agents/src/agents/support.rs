use crate::prompt::{estimate_tokens, format_prompt};
use crate::result::{SubAgentResult, SubAgentStatus};
use serde_json::{json, Map, Value};
use std::time::Instant;
use trinity_types::{CostEntry, ModelTier};

/// Shared invocation path for every stub sub-agent: format the prompt, check
/// the task spec's `force_failure` escape hatch (lets tests drive a
/// deterministic failure without a real model client), then hand back a
/// `SubAgentResult` paired with a `CostEntry` computed off the same token
/// estimate (§4.5.3 prompt-formatting helper).
pub(super) async fn invoke_stub(
    agent_name: &'static str,
    model: &'static str,
    tier: ModelTier,
    task_spec: &Map<String, Value>,
    summarize: impl FnOnce(&Map<String, Value>) -> String,
) -> (SubAgentResult, CostEntry) {
    let start = Instant::now();
    let prompt = format_prompt(task_spec);
    let tokens_in = estimate_tokens(&prompt);

    // Yield once so every stub crosses a real await point, matching the
    // suspension-point contract every other sub-agent call site assumes.
    tokio::task::yield_now().await;

    let forced_failure = task_spec
        .get("force_failure")
        .and_then(Value::as_str)
        .is_some_and(|forced| forced == agent_name);

    let (status, summary, error) = if forced_failure {
        let reason = format!("{agent_name} forced to fail by task spec");
        (SubAgentStatus::Failure, reason.clone(), Some(reason))
    } else {
        (SubAgentStatus::Success, summarize(task_spec), None)
    };

    let tokens_out = estimate_tokens(&summary);
    let cost_usd = trinity_cost::calculate_cost(tier, tokens_in, tokens_out);
    let duration_seconds = start.elapsed().as_secs_f64();

    let result = SubAgentResult {
        agent: agent_name.to_string(),
        status,
        summary: summary.clone(),
        duration_seconds,
        cost_usd,
        error: error.clone(),
    };

    let cost_entry = CostEntry {
        timestamp: chrono::Utc::now(),
        operation: agent_name.to_string(),
        model: model.to_string(),
        model_tier: tier,
        tokens_in,
        tokens_out,
        cost_usd,
        duration_seconds,
        success: error.is_none(),
        metadata: json!({"prompt_chars": prompt.len()}),
        error,
    };

    (result, cost_entry)
}
