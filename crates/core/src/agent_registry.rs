//! Agent registry: a name-keyed directory of runnable agents.
//!
//! Capabilities reach the registry only through the
//! [`ActionContext`](crate::context::ActionContext); there is no global
//! lookup.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::ContextProperties;
use crate::error::{AgentError, RegistryError};
use crate::memory::Memory;

/// Anything that can run a full decision loop for a task.
#[async_trait]
pub trait RunnableAgent: Send + Sync {
    /// Run `task` to completion starting from `memory` and return the
    /// resulting memory.
    async fn run_task(
        &self,
        task: &str,
        memory: Memory,
        props: ContextProperties,
    ) -> Result<Memory, AgentError>;
}

/// A registry entry.
#[derive(Clone)]
pub struct RegisteredAgent {
    pub name: String,
    pub description: String,
    pub runner: Arc<dyn RunnableAgent>,
}

impl std::fmt::Debug for RegisteredAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredAgent")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// Directory of agents available for delegation.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: Vec<RegisteredAgent>,
    max_delegation_depth: Option<usize>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse delegation once a run is this many delegations deep.
    pub fn with_max_delegation_depth(mut self, depth: usize) -> Self {
        self.max_delegation_depth = Some(depth);
        self
    }

    pub fn max_delegation_depth(&self) -> Option<usize> {
        self.max_delegation_depth
    }

    /// Register an agent. Names are unique.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        runner: Arc<dyn RunnableAgent>,
        description: impl Into<String>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.agents.iter().any(|a| a.name == name) {
            return Err(RegistryError::DuplicateAgent(name));
        }
        tracing::debug!(agent = %name, "Registered agent");
        self.agents.push(RegisteredAgent {
            name,
            description: description.into(),
            runner,
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn RunnableAgent>> {
        self.info(name).map(|a| a.runner.clone())
    }

    pub fn info(&self, name: &str) -> Option<&RegisteredAgent> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Human-readable listing for prompts and tools.
    pub fn describe(&self) -> String {
        if self.agents.is_empty() {
            return "No agents registered.".into();
        }
        let lines: Vec<String> = self
            .agents
            .iter()
            .map(|a| {
                let desc = if a.description.is_empty() {
                    "No description"
                } else {
                    a.description.as_str()
                };
                format!("- {}: {}", a.name, desc)
            })
            .collect();
        format!("Available agents:\n{}", lines.join("\n"))
    }
}
