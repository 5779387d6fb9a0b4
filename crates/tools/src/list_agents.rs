//! List-agents capability: tells the model which agents it may delegate to.

use async_trait::async_trait;
use serde_json::json;
use taskweave_core::capability::{Arguments, CapabilityDescriptor, CapabilityResult, ContextualCapability};
use taskweave_core::context::ActionContext;
use taskweave_core::error::{CapabilityError, RegistryError};

pub struct ListAgents;

#[async_trait]
impl ContextualCapability for ListAgents {
    async fn call(&self, _args: Arguments, ctx: &ActionContext<'_>) -> CapabilityResult {
        let registry = ctx
            .get_agent_registry()
            .ok_or_else(|| CapabilityError::failed("No agent registry found in context"))?;
        tracing::debug!(agents = registry.len(), depth = ctx.depth(), "Listing agents");
        Ok(json!({
            "agents": registry.names(),
            "description": registry.describe(),
        }))
    }
}

pub fn list_agents() -> Result<CapabilityDescriptor, RegistryError> {
    CapabilityDescriptor::builder("list_agents")
        .description("List the agents available for delegation, with their descriptions.")
        .contextual(ListAgents)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use taskweave_core::agent_registry::{AgentRegistry, RunnableAgent};
    use taskweave_core::context::ContextProperties;
    use taskweave_core::error::AgentError;
    use taskweave_core::memory::Memory;

    struct Idle;

    #[async_trait]
    impl RunnableAgent for Idle {
        async fn run_task(
            &self,
            _task: &str,
            memory: Memory,
            _props: ContextProperties,
        ) -> Result<Memory, AgentError> {
            Ok(memory)
        }
    }

    #[tokio::test]
    async fn lists_registered_agents() {
        let mut registry = AgentRegistry::new();
        registry.register("Researcher", Arc::new(Idle), "finds facts").unwrap();
        let props = ContextProperties::new().with_agent_registry(Arc::new(registry));
        let ctx = ActionContext::new(&props);

        let out = ListAgents.call(Arguments::default(), &ctx).await.unwrap();
        assert_eq!(out["agents"], json!(["Researcher"]));
        assert!(out["description"].as_str().unwrap().contains("- Researcher: finds facts"));
    }

    #[tokio::test]
    async fn fails_without_registry() {
        let props = ContextProperties::new();
        let ctx = ActionContext::new(&props);
        let err = ListAgents.call(Arguments::default(), &ctx).await.unwrap_err();
        assert_eq!(err.kind(), "execution_failed");
        assert!(list_agents().unwrap().accepts_context());
    }
}
