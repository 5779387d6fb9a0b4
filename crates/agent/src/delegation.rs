//! Delegation: a capability that runs another registered agent to
//! completion and folds its outcome back into a plain value.
//!
//! The delegate always starts from an empty [`Memory`]; it sees the task
//! string and nothing of its caller's history. Every failure is returned as
//! `{"success": false, ...}` data for the calling loop to reason about.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use taskweave_core::capability::{
    Arguments, CapabilityDescriptor, CapabilityResult, ContextualCapability,
};
use taskweave_core::context::ActionContext;
use taskweave_core::error::RegistryError;
use taskweave_core::event::{DomainEvent, EventBus};
use taskweave_core::memory::Memory;
use tracing::{info, warn};

/// Name under which the delegation capability is registered.
pub const CALL_AGENT: &str = "call_agent";

/// The `call_agent` capability body.
#[derive(Debug, Default)]
pub struct CallAgent {
    event_bus: Option<Arc<EventBus>>,
}

impl CallAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a `DelegationCompleted` event after each delegation.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn into_descriptor(self) -> Result<CapabilityDescriptor, RegistryError> {
        CapabilityDescriptor::builder(CALL_AGENT)
            .description("Invoke another registered agent with a task and return its final result.")
            .param::<String>("agent_name")
            .describe_param("agent_name", "Name of the agent to delegate to")
            .param::<String>("task")
            .describe_param("task", "The complete task description for that agent")
            .contextual(self)
            .build()
    }

    fn finish(&self, ctx: &ActionContext<'_>, agent: &str, outcome: Value) -> CapabilityResult {
        let success = outcome["success"].as_bool().unwrap_or(false);
        if !success {
            warn!(agent = %agent, error = %outcome["error"], "Delegation failed");
        }
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::DelegationCompleted {
                caller_depth: ctx.depth(),
                agent: agent.to_string(),
                success,
                timestamp: Utc::now(),
            });
        }
        Ok(outcome)
    }
}

#[async_trait]
impl ContextualCapability for CallAgent {
    async fn call(&self, args: Arguments, ctx: &ActionContext<'_>) -> CapabilityResult {
        let agent_name: String = args.required("agent_name")?;
        let task: String = args.required("task")?;

        let Some(registry) = ctx.get_agent_registry() else {
            return self.finish(
                ctx,
                &agent_name,
                json!({ "success": false, "error": "No agent registry found in context" }),
            );
        };

        if let Some(limit) = registry.max_delegation_depth()
            && ctx.depth() >= limit
        {
            return self.finish(
                ctx,
                &agent_name,
                json!({
                    "success": false,
                    "agent": agent_name,
                    "error": format!("Delegation depth limit of {limit} reached"),
                }),
            );
        }

        let Some(runner) = registry.get(&agent_name) else {
            let names = registry.names();
            let available = if names.is_empty() {
                "<none>".to_string()
            } else {
                names.join(", ")
            };
            return self.finish(
                ctx,
                &agent_name,
                json!({
                    "success": false,
                    "error": format!("Agent '{agent_name}' not found. Available agents: {available}"),
                }),
            );
        };

        info!(agent = %agent_name, depth = ctx.depth() + 1, "Delegating task");
        let outcome = match runner
            .run_task(&task, Memory::new(), ctx.properties().child())
            .await
        {
            Err(e) => json!({
                "success": false,
                "agent": agent_name,
                "error": format!("Agent execution failed: {e}"),
            }),
            Ok(memory) => match memory.last() {
                None => json!({
                    "success": false,
                    "agent": agent_name,
                    "error": "Agent completed but produced no results",
                }),
                Some(last) if last.content.trim().is_empty() => json!({
                    "success": false,
                    "agent": agent_name,
                    "error": "Agent completed but returned an empty result",
                }),
                Some(last) => json!({
                    "success": true,
                    "agent": agent_name,
                    "result": last.content,
                    "memory_items": memory.len(),
                }),
            },
        };
        self.finish(ctx, &agent_name, outcome)
    }
}

/// The delegation capability without event publishing.
pub fn call_agent() -> Result<CapabilityDescriptor, RegistryError> {
    CallAgent::new().into_descriptor()
}
