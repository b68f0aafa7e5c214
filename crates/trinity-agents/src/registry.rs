use std::collections::HashMap;
use std::sync::Arc;

use trinity_types::SubAgentType;

use crate::agents::{
    CodeWriterAgent, ImmunityEnforcerAgent, ReleaseManagerAgent, TaskSummarizerAgent,
    TestArchitectAgent, ToolDeveloperAgent,
};
use crate::sub_agent::SubAgent;

/// Owns one handle per fixed sub-agent role (§4.4), grounded on the
/// teacher's `ToolRegistry`/`AgentRegistry` name-keyed maps. Unlike those,
/// the role set here is closed — `trinity-roles` never registers a custom
/// agent at runtime — so the map is built once in [`SubAgentRegistry::new`]
/// and never mutated.
#[derive(Clone)]
pub struct SubAgentRegistry {
    agents: HashMap<SubAgentType, Arc<dyn SubAgent>>,
}

impl SubAgentRegistry {
    pub fn new() -> Self {
        let mut agents: HashMap<SubAgentType, Arc<dyn SubAgent>> = HashMap::new();
        agents.insert(SubAgentType::CodeWriter, Arc::new(CodeWriterAgent));
        agents.insert(SubAgentType::TestArchitect, Arc::new(TestArchitectAgent));
        agents.insert(SubAgentType::ToolDeveloper, Arc::new(ToolDeveloperAgent));
        agents.insert(SubAgentType::ImmunityEnforcer, Arc::new(ImmunityEnforcerAgent));
        agents.insert(SubAgentType::ReleaseManager, Arc::new(ReleaseManagerAgent));
        agents.insert(SubAgentType::TaskSummarizer, Arc::new(TaskSummarizerAgent));
        Self { agents }
    }

    /// Every role is registered at construction, so this only panics if a
    /// new `SubAgentType` variant is added without a matching entry above.
    pub fn get(&self, agent_type: SubAgentType) -> Arc<dyn SubAgent> {
        self.agents
            .get(&agent_type)
            .cloned()
            .unwrap_or_else(|| panic!("no sub-agent registered for {agent_type}"))
    }
}

impl Default for SubAgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn every_fixed_role_resolves_and_invokes() {
        let registry = SubAgentRegistry::new();
        let spec = json!({"Goal": "ship it"});
        let spec = spec.as_object().unwrap();

        for agent_type in [
            SubAgentType::CodeWriter,
            SubAgentType::TestArchitect,
            SubAgentType::ToolDeveloper,
            SubAgentType::ImmunityEnforcer,
            SubAgentType::ReleaseManager,
            SubAgentType::TaskSummarizer,
        ] {
            let agent = registry.get(agent_type);
            let (result, cost_entry) = agent.invoke(spec).await;
            assert!(result.is_success());
            assert_eq!(cost_entry.operation, agent.agent_name());
        }
    }
}
