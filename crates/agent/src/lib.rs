//! The agent decision loop, the heart of taskweave.
//!
//! An agent follows a **Prompt → Dispatch → Record** cycle:
//!
//! 1. **Seed** memory with the task
//! 2. **Prompt** the provider with goals, memory and capability schemas
//! 3. **Dispatch** the proposed capability through the environment
//! 4. **Record** the decision and the result envelope, then loop back to 2
//!
//! The loop ends when a terminal capability is invoked, when the model
//! names a capability the agent does not have, or when the iteration
//! ceiling is reached.
//!
//! Agents can hand work to one another through the `call_agent`
//! capability; see [`delegation`].

pub mod delegation;
pub mod language;
pub mod loop_runner;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use delegation::{CALL_AGENT, CallAgent, call_agent};
pub use language::{AgentLanguage, FunctionCallingLanguage, Invocation};
pub use loop_runner::{Agent, DEFAULT_MAX_ITERATIONS, LoopExit, RunReport};
