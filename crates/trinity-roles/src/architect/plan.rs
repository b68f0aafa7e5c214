//! Deterministic scoring, engine selection, and task-graph construction for
//! ARCHITECT (§4.5.2 steps 3, 4, 7, 8). Ported faithfully from the original
//! `_assess_complexity`/`_select_reasoning_engine`/`_generate_task_graph`/
//! `_self_verify_plan` so the elif-chain scoring and task_id naming
//! convention match exactly, then re-expressed as pure Rust functions
//! grounded on the teacher's `TaskScheduler::validate` (§4.5.2 step 8).

use serde_json::json;
use trinity_types::{
    ExecutionPlan, ModelTier, ParallelGroup, Priority, Strategy, SubAgentSpec, SubAgentType,
    TaskSpec, TaskType,
};

use crate::error::PlanningError;
use crate::signal::Signal;

/// Step 3: deterministic complexity score in `[0, 1]`.
pub fn assess_complexity(signal: &Signal) -> f64 {
    let mut score = 0.0;

    let pattern = signal.pattern.as_str();
    let pattern_type = signal.pattern_type.as_deref().unwrap_or("");

    if matches!(
        pattern,
        "constitutional_violation" | "code_duplication" | "missing_tests"
    ) {
        score += 0.3;
    } else if pattern_type == "failure" {
        score += 0.2;
    } else if pattern_type == "user_intent" {
        score += 0.4;
    }

    let keywords = &signal.data.keywords;
    if keywords.iter().any(|k| k == "architecture") {
        score = score.max(0.7);
    }
    if keywords.iter().any(|k| k == "refactor") {
        score += 0.2;
    }

    // The original scans `str(signal).lower()` for these two substrings —
    // approximated here as the serialized signal, matching the same intent
    // without depending on Python's dict repr.
    let haystack = serde_json::to_string(signal).unwrap_or_default().to_lowercase();
    if haystack.contains("multi-file") {
        score += 0.2;
    }
    if haystack.contains("system-wide") {
        score += 0.3;
    }

    if signal.evidence_count >= 5 {
        score += 0.1;
    }

    score.min(1.0)
}

/// Step 4: hybrid local/cloud engine selection. Returns the chosen tier and
/// whether this selection counts as an escalation.
pub fn select_engine(signal: &Signal, complexity: f64) -> (ModelTier, bool) {
    if signal.priority == Priority::Critical {
        return (ModelTier::CloudPremium, true);
    }
    if signal.priority == Priority::High && complexity > 0.7 {
        return (ModelTier::CloudPremium, true);
    }
    (ModelTier::Local, false)
}

/// A pattern-name is architectural when tagged as such or carrying the
/// `architecture` keyword (§4.5.2 step 5).
pub fn is_architectural(signal: &Signal) -> bool {
    signal.data.keywords.iter().any(|k| k == "architecture") || signal.pattern == "constitutional_violation"
}

/// Step 7: deterministic three-task graph, task ids following the original's
/// `{correlation_id}_code` / `_test` / `_merge` convention.
pub fn generate_task_graph(strategy: &Strategy, correlation_id: &str) -> Vec<TaskSpec> {
    let timestamp = chrono::Utc::now();

    let code_task = TaskSpec {
        task_id: format!("{correlation_id}_code"),
        correlation_id: correlation_id.to_string(),
        priority: strategy.priority,
        task_type: TaskType::CodeGeneration,
        sub_agent: SubAgentType::CodeWriter.to_string(),
        spec: json_object(json!({
            "details": strategy.decision,
            "spec_content": strategy.spec_markdown,
            "complexity": strategy.complexity,
        })),
        dependencies: Vec::new(),
        timestamp,
    };

    let test_task = TaskSpec {
        task_id: format!("{correlation_id}_test"),
        correlation_id: correlation_id.to_string(),
        priority: strategy.priority,
        task_type: TaskType::TestGeneration,
        sub_agent: SubAgentType::TestArchitect.to_string(),
        spec: json_object(json!({
            "details": format!("Tests for {}", strategy.decision),
            "spec_content": strategy.spec_markdown,
            "complexity": strategy.complexity,
        })),
        dependencies: Vec::new(),
        timestamp,
    };

    let merge_task = TaskSpec {
        task_id: format!("{correlation_id}_merge"),
        correlation_id: correlation_id.to_string(),
        priority: strategy.priority,
        task_type: TaskType::Merge,
        sub_agent: SubAgentType::ReleaseManager.to_string(),
        spec: json_object(json!({
            "details": "Integrate code and tests, commit with compliance checks",
        })),
        dependencies: vec![code_task.task_id.clone(), test_task.task_id.clone()],
        timestamp,
    };

    vec![code_task, test_task, merge_task]
}

fn json_object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

/// Step 8: self-verification. Mirrors `TaskScheduler::validate`'s shape,
/// extended with the code⇒test check Article II names.
pub fn validate_plan(tasks: &[TaskSpec]) -> Result<(), PlanningError> {
    if tasks.is_empty() {
        return Err(PlanningError::EmptyTaskGraph);
    }

    let mut seen_ids = std::collections::HashSet::new();
    for task in tasks {
        if !seen_ids.insert(task.task_id.as_str()) {
            return Err(PlanningError::DuplicateTaskId(task.task_id.clone()));
        }
        if task.sub_agent.trim().is_empty() {
            return Err(PlanningError::MissingSubAgent(task.task_id.clone()));
        }
    }

    let has_code = tasks.iter().any(|t| t.task_type == TaskType::CodeGeneration);
    let has_test = tasks.iter().any(|t| t.task_type == TaskType::TestGeneration);
    if has_code && !has_test {
        return Err(PlanningError::MissingTestTask);
    }

    let task_ids: std::collections::HashSet<&str> = tasks.iter().map(|t| t.task_id.as_str()).collect();
    for task in tasks {
        for dep in &task.dependencies {
            if dep == &task.task_id {
                return Err(PlanningError::SelfDependency(task.task_id.clone()));
            }
            if !task_ids.contains(dep.as_str()) {
                return Err(PlanningError::InvalidDependency {
                    task_id: task.task_id.clone(),
                    dependency_id: dep.clone(),
                });
            }
        }
    }

    Ok(())
}

/// Task-type → sub-agent fan-out table for EXECUTOR's deconstruct step
/// (§4.5.3 step 1). Lives here because it mirrors `generate_task_graph`'s
/// fixed-agent-per-type shape; `trinity-roles::executor` is its only caller.
pub fn fanout_for(task_type: TaskType) -> Vec<SubAgentType> {
    match task_type {
        TaskType::CodeGeneration | TaskType::Unknown => {
            vec![SubAgentType::CodeWriter, SubAgentType::TestArchitect]
        }
        TaskType::TestGeneration => vec![SubAgentType::TestArchitect],
        TaskType::ToolCreation => vec![SubAgentType::ToolDeveloper, SubAgentType::TestArchitect],
        TaskType::Verification => vec![SubAgentType::ImmunityEnforcer],
        TaskType::Merge => Vec::new(),
    }
}

/// Builds the single parallel group EXECUTOR fans a task's sub-agents out
/// into (§4.5.3 step 1 names one group per non-merge task type).
pub fn deconstruct(task: &TaskSpec) -> ExecutionPlan {
    let agents = fanout_for(task.task_type);
    let sub_agent_specs = agents
        .iter()
        .map(|agent| SubAgentSpec {
            agent: *agent,
            task: task.clone(),
        })
        .collect();
    let parallel_groups = if agents.is_empty() {
        Vec::new()
    } else {
        vec![ParallelGroup { agents }]
    };

    ExecutionPlan {
        task_id: task.task_id.clone(),
        correlation_id: task.correlation_id.clone(),
        sub_agent_specs,
        parallel_groups,
        verification_command: "run_tests --run-all".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SignalData;
    use chrono::Utc;

    fn signal(pattern: &str, pattern_type: &str, keywords: &[&str], evidence_count: u32) -> Signal {
        Signal {
            correlation_id: "corr-1".to_string(),
            priority: Priority::Normal,
            pattern: pattern.to_string(),
            pattern_type: Some(pattern_type.to_string()),
            data: SignalData {
                keywords: keywords.iter().map(|s| s.to_string()).collect(),
                extra: Default::default(),
            },
            evidence_count,
            confidence: 0.8,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn architecture_keyword_floors_complexity_at_point_seven() {
        let s = signal("refactor", "opportunity", &["architecture"], 1);
        assert!(assess_complexity(&s) >= 0.7);
    }

    #[test]
    fn constitutional_violation_scores_point_three_base() {
        let s = signal("constitutional_violation", "", &[], 1);
        assert_eq!(assess_complexity(&s), 0.3);
    }

    #[test]
    fn high_evidence_count_adds_tenth() {
        let s = signal("constitutional_violation", "", &[], 5);
        assert!((assess_complexity(&s) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn complexity_clamps_to_one() {
        let mut s = signal("constitutional_violation", "", &["architecture", "refactor"], 5);
        s.data.extra.insert("note".into(), json!("system-wide multi-file change"));
        assert_eq!(assess_complexity(&s), 1.0);
    }

    #[test]
    fn critical_priority_always_escalates() {
        let mut s = signal("failure", "failure", &[], 1);
        s.priority = Priority::Critical;
        let (tier, escalated) = select_engine(&s, 0.1);
        assert_eq!(tier, ModelTier::CloudPremium);
        assert!(escalated);
    }

    #[test]
    fn high_priority_needs_complexity_above_threshold_to_escalate() {
        let mut s = signal("failure", "failure", &[], 1);
        s.priority = Priority::High;
        let (tier, escalated) = select_engine(&s, 0.5);
        assert_eq!(tier, ModelTier::Local);
        assert!(!escalated);

        let (tier, escalated) = select_engine(&s, 0.71);
        assert_eq!(tier, ModelTier::CloudPremium);
        assert!(escalated);
    }

    #[test]
    fn task_graph_has_code_test_merge_with_correct_dependencies() {
        let strategy = Strategy {
            priority: Priority::Normal,
            complexity: 0.2,
            engine: ModelTier::Local,
            decision: "Simple task".to_string(),
            spec_markdown: None,
            adr_markdown: None,
            tasks: Vec::new(),
        };
        let tasks = generate_task_graph(&strategy, "corr-42");
        assert_eq!(tasks[0].task_id, "corr-42_code");
        assert_eq!(tasks[1].task_id, "corr-42_test");
        assert_eq!(tasks[2].task_id, "corr-42_merge");
        assert_eq!(tasks[2].dependencies, vec!["corr-42_code", "corr-42_test"]);
        assert!(validate_plan(&tasks).is_ok());
    }

    #[test]
    fn validate_plan_rejects_empty_graph() {
        assert_eq!(validate_plan(&[]), Err(PlanningError::EmptyTaskGraph));
    }

    #[test]
    fn validate_plan_rejects_code_without_test() {
        let strategy = Strategy {
            priority: Priority::Normal,
            complexity: 0.2,
            engine: ModelTier::Local,
            decision: "d".to_string(),
            spec_markdown: None,
            adr_markdown: None,
            tasks: Vec::new(),
        };
        let mut tasks = generate_task_graph(&strategy, "corr-1");
        tasks.retain(|t| t.task_type != TaskType::TestGeneration);
        assert_eq!(validate_plan(&tasks), Err(PlanningError::MissingTestTask));
    }

    #[test]
    fn fanout_table_matches_contract() {
        assert_eq!(
            fanout_for(TaskType::CodeGeneration),
            vec![SubAgentType::CodeWriter, SubAgentType::TestArchitect]
        );
        assert_eq!(fanout_for(TaskType::Unknown), fanout_for(TaskType::CodeGeneration));
        assert_eq!(fanout_for(TaskType::Verification), vec![SubAgentType::ImmunityEnforcer]);
        assert!(fanout_for(TaskType::Merge).is_empty());
    }
}
