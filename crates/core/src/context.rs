//! Action context: the per-invocation property bag handed to
//! context-aware capabilities.
//!
//! [`ContextProperties`] is owned by a run and outlives every invocation in
//! it. [`ActionContext`] is created fresh for each dispatch, borrows the
//! run's properties and memory, and is dropped as soon as the capability
//! returns.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use uuid::Uuid;

use crate::agent_registry::AgentRegistry;
use crate::memory::Memory;

/// Cross-cutting references available to every invocation of one run.
#[derive(Clone, Default)]
pub struct ContextProperties {
    agent_registry: Option<Arc<AgentRegistry>>,
    properties: HashMap<String, Value>,
    depth: usize,
}

impl ContextProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agent_registry(mut self, registry: Arc<AgentRegistry>) -> Self {
        self.agent_registry = Some(registry);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn agent_registry(&self) -> Option<&Arc<AgentRegistry>> {
        self.agent_registry.as_ref()
    }

    /// How many delegations separate this run from the top-level one.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Properties for a run started by delegation from this one: same
    /// registry and properties, one level deeper.
    pub fn child(&self) -> Self {
        Self {
            agent_registry: self.agent_registry.clone(),
            properties: self.properties.clone(),
            depth: self.depth + 1,
        }
    }
}

impl std::fmt::Debug for ContextProperties {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextProperties")
            .field(
                "agent_registry",
                &self.agent_registry.as_ref().map(|r| r.names()),
            )
            .field("properties", &self.properties)
            .field("depth", &self.depth)
            .finish()
    }
}

/// Request-scoped view handed to a context-aware capability.
pub struct ActionContext<'a> {
    id: String,
    props: &'a ContextProperties,
    memory: Option<&'a Memory>,
}

impl<'a> ActionContext<'a> {
    pub fn new(props: &'a ContextProperties) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            props,
            memory: None,
        }
    }

    pub fn with_memory(mut self, memory: &'a Memory) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Unique id of this invocation.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.props.properties.get(key)
    }

    /// Look up a property, returning `default` when it is not set.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).cloned().unwrap_or(default)
    }

    /// The calling run's memory as it stood when the capability was dispatched.
    pub fn get_memory(&self) -> Option<&'a Memory> {
        self.memory
    }

    pub fn get_agent_registry(&self) -> Option<&'a Arc<AgentRegistry>> {
        self.props.agent_registry.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.props.depth
    }

    pub fn properties(&self) -> &'a ContextProperties {
        self.props
    }
}
