//! # Taskweave Core
//!
//! Domain types, traits, and error definitions for the taskweave agent engine.
//! This crate defines the domain model that all other crates implement
//! against: capabilities and how they are catalogued, run memory, goals,
//! the provider-neutral prompt, the environment that executes capabilities,
//! and the agent registry used for delegation.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here. Implementations live in their respective
//! crates. This enables:
//! - Swapping providers via configuration
//! - Easy testing with scripted providers and canned agents
//! - Clean dependency graph (all crates depend inward on core)

pub mod agent_registry;
pub mod capability;
pub mod catalog;
pub mod context;
pub mod environment;
pub mod error;
pub mod event;
pub mod goal;
pub mod memory;
pub mod prompt;
pub mod provider;
pub mod registry;

// Re-export key types at crate root for ergonomics
pub use agent_registry::{AgentRegistry, RegisteredAgent, RunnableAgent};
pub use capability::{
    Arguments, Capability, CapabilityBuilder, CapabilityDescriptor, CapabilityResult,
    ContextMode, ContextualCapability, Handler, ParamSpec, ParamType,
};
pub use catalog::{CapabilityCatalog, CatalogBuilder, CatalogEntry};
pub use context::{ActionContext, ContextProperties};
pub use environment::{Environment, ExecutionOutcome};
pub use error::{AgentError, CapabilityError, Error, ProviderError, RegistryError, Result};
pub use event::{DomainEvent, EventBus};
pub use goal::Goal;
pub use memory::{EntryKind, Memory, MemoryEntry};
pub use prompt::{EnvironmentRole, Prompt, PromptMessage, Role, ToolSchema};
pub use provider::{Provider, ProviderReply};
pub use registry::{ActionRegistry, RegistrySelection};
