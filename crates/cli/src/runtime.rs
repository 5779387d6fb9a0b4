//! Runtime assembly: the capability catalog, one agent per configured
//! definition, and the shared agent registry that makes delegation work.

use std::sync::Arc;

use serde_json::Value;
use taskweave_agent::{Agent, AgentLanguage, CallAgent, FunctionCallingLanguage, RunReport};
use taskweave_config::{AgentDefinition, AppConfig};
use taskweave_core::agent_registry::AgentRegistry;
use taskweave_core::catalog::{CapabilityCatalog, CatalogBuilder};
use taskweave_core::context::ContextProperties;
use taskweave_core::error::RegistryError;
use taskweave_core::event::EventBus;
use taskweave_core::memory::Memory;
use taskweave_core::provider::Provider;
use taskweave_core::registry::RegistrySelection;

/// Built-in capabilities plus `call_agent` (tag `agents`).
pub fn build_catalog(bus: &Arc<EventBus>) -> Result<CapabilityCatalog, RegistryError> {
    let delegation = CallAgent::new().with_event_bus(bus.clone()).into_descriptor()?;
    taskweave_tools::register_builtins(CatalogBuilder::new())?
        .register(delegation, ["agents"])
        .build()
}

/// Capabilities an agent definition asks for: its tags and tool names,
/// plus the terminal capability when opted in.
pub fn selection_for(def: &AgentDefinition) -> RegistrySelection {
    let selection = RegistrySelection::new()
        .tags(def.tags.iter().cloned())
        .names(def.tools.iter().cloned());
    if def.include_terminal {
        selection.include_terminal()
    } else {
        selection
    }
}

/// Every configured agent, registered in one shared registry.
pub struct Runtime {
    registry: Arc<AgentRegistry>,
    agents: Vec<Arc<Agent>>,
}

impl Runtime {
    pub fn assemble(
        config: &AppConfig,
        catalog: &CapabilityCatalog,
        provider: Arc<dyn Provider>,
        bus: Arc<EventBus>,
    ) -> Result<Self, RegistryError> {
        let language: Arc<dyn AgentLanguage> = Arc::new(
            FunctionCallingLanguage::new()
                .with_description_budget(config.agent.description_budget)
                .with_environment_role(config.agent.environment_role),
        );

        let mut registry = AgentRegistry::new();
        if let Some(depth) = config.agent.max_delegation_depth {
            registry = registry.with_max_delegation_depth(depth);
        }

        let mut agents = Vec::with_capacity(config.agents.len());
        for def in &config.agents {
            let actions = selection_for(def).select(catalog)?;

            let agent = Arc::new(
                Agent::new(&def.name, def.goals.clone(), actions, provider.clone())
                    .with_language(language.clone())
                    .with_max_iterations(config.max_iterations_for(def))
                    .with_event_bus(bus.clone()),
            );
            registry.register(&def.name, agent.clone(), &def.description)?;
            agents.push(agent);
        }

        Ok(Self {
            registry: Arc::new(registry),
            agents,
        })
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn agent(&self, name: &str) -> Option<&Arc<Agent>> {
        self.agents.iter().find(|a| a.name() == name)
    }

    /// Run `name` on `task` with the shared registry in context.
    pub async fn run(&self, name: &str, task: &str) -> Option<RunReport> {
        let agent = self.agent(name)?;
        let props = ContextProperties::new().with_agent_registry(self.registry.clone());
        Some(agent.run_with_report(task, None, props).await)
    }
}

/// The final answer of a run: the `result` of the last environment
/// envelope when it decodes, otherwise the raw last entry.
pub fn final_result(memory: &Memory) -> Option<String> {
    let last = memory.last()?;
    let decoded = serde_json::from_str::<Value>(&last.content)
        .ok()
        .and_then(|v| v.get("result").cloned());
    Some(match decoded {
        Some(Value::String(s)) => s,
        Some(other) => serde_json::to_string_pretty(&other).unwrap_or_else(|_| other.to_string()),
        None => last.content.clone(),
    })
}
