//! The agent decision loop implementation.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use taskweave_core::agent_registry::RunnableAgent;
use taskweave_core::context::{ActionContext, ContextProperties};
use taskweave_core::environment::{Environment, ExecutionOutcome};
use taskweave_core::error::AgentError;
use taskweave_core::event::{DomainEvent, EventBus};
use taskweave_core::goal::Goal;
use taskweave_core::memory::{Memory, MemoryEntry};
use taskweave_core::provider::Provider;
use taskweave_core::registry::ActionRegistry;
use tracing::{debug, info, warn};

use crate::language::{AgentLanguage, FunctionCallingLanguage};

/// Iteration ceiling used when none is configured.
pub const DEFAULT_MAX_ITERATIONS: usize = 50;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// A terminal capability was invoked.
    Terminated,
    /// The model named a capability the registry does not hold, or the
    /// provider call failed.
    Aborted,
    /// The iteration ceiling was reached.
    Exhausted,
}

impl LoopExit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terminated => "terminated",
            Self::Aborted => "aborted",
            Self::Exhausted => "exhausted",
        }
    }
}

impl std::fmt::Display for LoopExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub memory: Memory,
    pub exit: LoopExit,
    pub iterations: usize,
}

/// A goal-driven agent: prompt, decide, execute, record, repeat.
pub struct Agent {
    /// Name used in logs and events
    name: String,

    goals: Vec<Goal>,

    /// Capabilities this agent may invoke, fixed at construction
    actions: ActionRegistry,

    /// The LLM provider to use
    provider: Arc<dyn Provider>,

    language: Arc<dyn AgentLanguage>,

    environment: Environment,

    /// Maximum decisions per run
    max_iterations: usize,

    /// Event bus for domain events
    event_bus: Option<Arc<EventBus>>,
}

impl Agent {
    /// Create a new agent with the function-calling language.
    pub fn new(
        name: impl Into<String>,
        goals: Vec<Goal>,
        actions: ActionRegistry,
        provider: Arc<dyn Provider>,
    ) -> Self {
        Self {
            name: name.into(),
            goals,
            actions,
            provider,
            language: Arc::new(FunctionCallingLanguage::default()),
            environment: Environment::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            event_bus: None,
        }
    }

    pub fn with_language(mut self, language: Arc<dyn AgentLanguage>) -> Self {
        self.language = language;
        self
    }

    /// Set the maximum number of iterations per run.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Run `task` to completion and return the resulting memory.
    ///
    /// Never fails: every outcome is visible in the returned memory.
    pub async fn run(&self, task: &str, memory: Option<Memory>, props: ContextProperties) -> Memory {
        self.run_with_report(task, memory, props).await.memory
    }

    /// Like [`Agent::run`], but also reports how the loop ended.
    pub async fn run_with_report(
        &self,
        task: &str,
        memory: Option<Memory>,
        props: ContextProperties,
    ) -> RunReport {
        let mut memory = memory.unwrap_or_default();
        memory.push(MemoryEntry::user(task));

        info!(
            agent = %self.name,
            depth = props.depth(),
            capabilities = self.actions.len(),
            "Starting run"
        );
        self.publish(DomainEvent::RunStarted {
            agent: self.name.clone(),
            depth: props.depth(),
            timestamp: Utc::now(),
        });

        let mut exit = LoopExit::Exhausted;
        let mut iterations = 0;

        for iteration in 1..=self.max_iterations {
            iterations = iteration;
            debug!(
                agent = %self.name,
                iteration,
                max = self.max_iterations,
                "Agent loop iteration"
            );
            self.publish(DomainEvent::IterationStarted {
                agent: self.name.clone(),
                iteration,
                timestamp: Utc::now(),
            });

            let prompt =
                self.language
                    .construct_prompt(self.actions.list(), &self.goals, &memory);

            let response = match self.provider.generate(&prompt).await {
                Ok(reply) => reply.into_decision_text(),
                Err(e) => {
                    warn!(agent = %self.name, provider = %self.provider.name(), error = %e, "Provider call failed");
                    let outcome = ExecutionOutcome::failed(
                        "provider",
                        e.to_string(),
                        format!("provider '{}' returned {e:?}", self.provider.name()),
                    );
                    memory.push(MemoryEntry::environment(outcome.to_json_string()));
                    exit = LoopExit::Aborted;
                    break;
                }
            };
            debug!(agent = %self.name, decision = %preview(&response), "Decision");

            let invocation = self.language.parse_response(&response);
            let Some(action) = self.actions.get(&invocation.tool) else {
                warn!(agent = %self.name, tool = %invocation.tool, "Unknown capability, aborting run");
                exit = LoopExit::Aborted;
                break;
            };

            let start = Instant::now();
            let outcome = {
                let ctx = ActionContext::new(&props).with_memory(&memory);
                self.environment.execute(action, invocation.args, &ctx).await
            };
            self.publish(DomainEvent::CapabilityExecuted {
                agent: self.name.clone(),
                capability: action.name().to_string(),
                success: outcome.is_executed(),
                duration_ms: start.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
            });

            memory.push(MemoryEntry::assistant(response));
            memory.push(MemoryEntry::environment(outcome.to_json_string()));

            if action.is_terminal() {
                exit = LoopExit::Terminated;
                break;
            }
        }

        if exit == LoopExit::Exhausted {
            warn!(agent = %self.name, iterations, "Max iterations reached");
        }
        info!(
            agent = %self.name,
            exit = %exit,
            iterations,
            memory_items = memory.len(),
            "Run finished"
        );
        self.publish(DomainEvent::RunFinished {
            agent: self.name.clone(),
            exit: exit.to_string(),
            iterations,
            memory_len: memory.len(),
            timestamp: Utc::now(),
        });

        RunReport {
            memory,
            exit,
            iterations,
        }
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}

#[async_trait]
impl RunnableAgent for Agent {
    async fn run_task(
        &self,
        task: &str,
        memory: Memory,
        props: ContextProperties,
    ) -> Result<Memory, AgentError> {
        Ok(self.run(task, Some(memory), props).await)
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("goals", &self.goals.len())
            .field("actions", &self.actions.names())
            .field("provider", &self.provider.name())
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        ScriptedProvider, catalog, invocation, memory_kinds, terminate_reply,
    };
    use serde_json::{Value, json};
    use taskweave_core::error::ProviderError;
    use taskweave_core::memory::EntryKind;
    use taskweave_core::provider::ProviderReply;
    use taskweave_core::registry::RegistrySelection;

    fn registry(tags: &[&str]) -> ActionRegistry {
        RegistrySelection::new()
            .tags(tags.iter().copied())
            .include_terminal()
            .select(&catalog())
            .unwrap()
    }

    #[tokio::test]
    async fn terminates_on_fourth_iteration_with_nine_entries() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            invocation("echo", json!({"text": "one"})),
            invocation("echo", json!({"text": "two"})),
            invocation("echo", json!({"text": "three"})),
            terminate_reply("done"),
        ]));
        let agent = Agent::new("Echoer", vec![], registry(&["debug"]), provider.clone())
            .with_max_iterations(10);

        let report = agent
            .run_with_report("repeat things", None, ContextProperties::new())
            .await;

        assert_eq!(report.exit, LoopExit::Terminated);
        assert_eq!(report.iterations, 4);
        assert_eq!(report.memory.len(), 9);
        assert_eq!(provider.call_count(), 4);
        assert_eq!(report.memory.entries()[0].kind, EntryKind::User);
        assert_eq!(report.memory.entries()[0].content, "repeat things");

        let last: Value = serde_json::from_str(&report.memory.last().unwrap().content).unwrap();
        assert_eq!(last["tool_executed"], true);
        assert_eq!(last["result"], "done\nTerminating...");
    }

    #[tokio::test]
    async fn unparsable_reply_terminates_with_raw_text() {
        let provider = Arc::new(ScriptedProvider::new(vec![ProviderReply::Text(
            "I don't know".into(),
        )]));
        let agent = Agent::new("Confused", vec![], registry(&["debug"]), provider);

        let report = agent.run_with_report("what?", None, ContextProperties::new()).await;
        assert_eq!(report.exit, LoopExit::Terminated);
        assert_eq!(report.iterations, 1);
        assert_eq!(
            memory_kinds(&report.memory),
            vec![EntryKind::User, EntryKind::Assistant, EntryKind::Environment]
        );
        assert_eq!(report.memory.entries()[1].content, "I don't know");
        assert!(report.memory.last().unwrap().content.contains("I don't know"));
    }

    #[tokio::test]
    async fn unknown_capability_aborts_without_appending() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            invocation("echo", json!({"text": "hi"})),
            invocation("rm_rf", json!({})),
        ]));
        let agent = Agent::new("Reckless", vec![], registry(&["debug"]), provider);

        let report = agent.run_with_report("go", None, ContextProperties::new()).await;
        assert_eq!(report.exit, LoopExit::Aborted);
        assert_eq!(report.iterations, 2);
        assert_eq!(report.memory.len(), 3);
    }

    #[tokio::test]
    async fn terminal_capability_needs_opt_in() {
        let provider = Arc::new(ScriptedProvider::new(vec![terminate_reply("bye")]));
        let without_terminal = ActionRegistry::from_catalog(&catalog(), &["debug"]);
        let agent = Agent::new("NoExit", vec![], without_terminal, provider);

        let report = agent.run_with_report("stop", None, ContextProperties::new()).await;
        assert_eq!(report.exit, LoopExit::Aborted);
        assert_eq!(report.memory.len(), 1);
    }

    #[tokio::test]
    async fn failed_terminal_call_still_terminates() {
        let provider = Arc::new(ScriptedProvider::new(vec![invocation("terminate", json!({}))]));
        let agent = Agent::new("Abrupt", vec![], registry(&["debug"]), provider);

        let report = agent.run_with_report("stop now", None, ContextProperties::new()).await;
        assert_eq!(report.exit, LoopExit::Terminated);
        assert_eq!(report.iterations, 1);
        assert_eq!(report.memory.len(), 3);
        let last: Value = serde_json::from_str(&report.memory.last().unwrap().content).unwrap();
        assert_eq!(last["tool_executed"], false);
        assert_eq!(last["kind"], "invalid_arguments");
    }

    #[tokio::test]
    async fn exhausts_at_ceiling() {
        let replies = (0..3)
            .map(|i| invocation("echo", json!({"text": i.to_string()})))
            .collect();
        let provider = Arc::new(ScriptedProvider::new(replies));
        let agent = Agent::new("Looper", vec![], registry(&["debug"]), provider)
            .with_max_iterations(3);

        let report = agent.run_with_report("loop", None, ContextProperties::new()).await;
        assert_eq!(report.exit, LoopExit::Exhausted);
        assert_eq!(report.iterations, 3);
        assert_eq!(report.memory.len(), 7);
    }

    #[tokio::test]
    async fn capability_failure_is_recorded_and_loop_continues() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            invocation("echo", json!({})),
            terminate_reply("gave up"),
        ]));
        let agent = Agent::new("Sloppy", vec![], registry(&["debug"]), provider);

        let report = agent.run_with_report("echo", None, ContextProperties::new()).await;
        assert_eq!(report.exit, LoopExit::Terminated);
        let failure: Value = serde_json::from_str(&report.memory.entries()[2].content).unwrap();
        assert_eq!(failure["tool_executed"], false);
        assert_eq!(failure["kind"], "invalid_arguments");
    }

    #[tokio::test]
    async fn provider_failure_aborts_after_one_entry() {
        let provider = Arc::new(ScriptedProvider::failing(ProviderError::Network(
            "connection refused".into(),
        )));
        let agent = Agent::new("Offline", vec![], registry(&["debug"]), provider);

        let report = agent.run_with_report("hello", None, ContextProperties::new()).await;
        assert_eq!(report.exit, LoopExit::Aborted);
        assert_eq!(report.memory.len(), 2);
        let entry: Value = serde_json::from_str(&report.memory.last().unwrap().content).unwrap();
        assert_eq!(entry["kind"], "provider");
        assert!(entry["error"].as_str().unwrap().contains("connection refused"));
    }

    #[tokio::test]
    async fn supplied_memory_is_extended() {
        let provider = Arc::new(ScriptedProvider::new(vec![terminate_reply("ok")]));
        let agent = Agent::new("Continuer", vec![], registry(&["debug"]), provider);

        let mut prior = Memory::new();
        prior.push(MemoryEntry::system("stay on topic"));
        let memory = agent.run("next", Some(prior), ContextProperties::new()).await;
        assert_eq!(memory.len(), 4);
        assert_eq!(memory.entries()[0].content, "stay on topic");
    }

    #[tokio::test]
    async fn events_are_published() {
        let bus = Arc::new(EventBus::new(32));
        let mut rx = bus.subscribe();
        let provider = Arc::new(ScriptedProvider::new(vec![terminate_reply("ok")]));
        let agent = Agent::new("Observed", vec![], registry(&["debug"]), provider)
            .with_event_bus(bus);

        agent.run("watch me", None, ContextProperties::new()).await;

        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(match event.as_ref() {
                DomainEvent::RunStarted { .. } => "run_started",
                DomainEvent::IterationStarted { .. } => "iteration_started",
                DomainEvent::CapabilityExecuted { .. } => "capability_executed",
                DomainEvent::DelegationCompleted { .. } => "delegation_completed",
                DomainEvent::RunFinished { .. } => "run_finished",
            });
        }
        assert_eq!(
            names,
            vec!["run_started", "iteration_started", "capability_executed", "run_finished"]
        );
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let text = "ü".repeat(300);
        assert_eq!(preview(&text).chars().count(), 200);
        assert_eq!(preview("short"), "short");
    }
}
