//! Agent language: how goals, memory and capabilities become a [`Prompt`],
//! and how a model reply becomes a single capability invocation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use taskweave_core::capability::CapabilityDescriptor;
use taskweave_core::goal::Goal;
use taskweave_core::memory::{EntryKind, Memory};
use taskweave_core::prompt::{EnvironmentRole, Prompt, PromptMessage, Role, ToolSchema};
use tracing::debug;

/// Default character budget for rendered capability descriptions.
pub const DEFAULT_DESCRIPTION_BUDGET: usize = 1024;

const GOAL_SEPARATOR: &str = "\n-------------------\n";

/// One proposed capability call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

/// The protocol spoken between an agent and its model.
pub trait AgentLanguage: Send + Sync {
    /// Build the prompt for the next decision.
    fn construct_prompt(
        &self,
        actions: &[CapabilityDescriptor],
        goals: &[Goal],
        memory: &Memory,
    ) -> Prompt;

    /// Decode a model reply. Never fails: undecodable replies map to the
    /// terminal capability carrying the raw text.
    fn parse_response(&self, response: &str) -> Invocation;
}

/// Function-calling protocol for OpenAI-style APIs.
#[derive(Debug, Clone)]
pub struct FunctionCallingLanguage {
    description_budget: usize,
    environment_role: EnvironmentRole,
    terminate_tool: String,
}

impl Default for FunctionCallingLanguage {
    fn default() -> Self {
        Self {
            description_budget: DEFAULT_DESCRIPTION_BUDGET,
            environment_role: EnvironmentRole::default(),
            terminate_tool: "terminate".into(),
        }
    }
}

impl FunctionCallingLanguage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_description_budget(mut self, chars: usize) -> Self {
        self.description_budget = chars;
        self
    }

    pub fn with_environment_role(mut self, role: EnvironmentRole) -> Self {
        self.environment_role = role;
        self
    }

    /// Capability substituted when a reply cannot be decoded.
    pub fn with_terminate_tool(mut self, name: impl Into<String>) -> Self {
        self.terminate_tool = name.into();
        self
    }

    /// All goals in input order, as one system message.
    pub fn format_goals(&self, goals: &[Goal]) -> Vec<PromptMessage> {
        let instructions = goals
            .iter()
            .map(|g| format!("{}:{GOAL_SEPARATOR}{}{GOAL_SEPARATOR}", g.name, g.description))
            .collect::<Vec<_>>()
            .join("\n\n");
        vec![PromptMessage::system(instructions)]
    }

    pub fn format_memory(&self, memory: &Memory) -> Vec<PromptMessage> {
        memory
            .entries()
            .iter()
            .map(|entry| {
                let content = if entry.content.is_empty() {
                    serde_json::to_string_pretty(entry).unwrap_or_default()
                } else {
                    entry.content.clone()
                };
                let role = match entry.kind {
                    EntryKind::Assistant => Role::Assistant,
                    EntryKind::Environment => self.environment_role.into(),
                    EntryKind::User | EntryKind::System => Role::User,
                };
                PromptMessage { role, content }
            })
            .collect()
    }

    pub fn format_actions(&self, actions: &[CapabilityDescriptor]) -> Vec<ToolSchema> {
        actions
            .iter()
            .map(|a| ToolSchema {
                name: a.name().to_string(),
                description: truncate_chars(a.description(), self.description_budget),
                parameters: a.parameters().clone(),
            })
            .collect()
    }
}

impl AgentLanguage for FunctionCallingLanguage {
    fn construct_prompt(
        &self,
        actions: &[CapabilityDescriptor],
        goals: &[Goal],
        memory: &Memory,
    ) -> Prompt {
        let mut messages = self.format_goals(goals);
        messages.extend(self.format_memory(memory));

        let mut metadata = Map::new();
        metadata.insert("language".into(), Value::String("function_calling".into()));

        Prompt::new(messages, self.format_actions(actions), metadata)
    }

    fn parse_response(&self, response: &str) -> Invocation {
        if let Some(value) = extract_json(response)
            && let Ok(invocation) = serde_json::from_value::<Invocation>(value)
        {
            return invocation;
        }
        debug!(
            fallback = %self.terminate_tool,
            "Reply is not an invocation, substituting terminal capability"
        );
        Invocation {
            tool: self.terminate_tool.clone(),
            args: serde_json::json!({ "message": response }),
        }
    }
}

/// Cut `text` to at most `budget` characters.
fn truncate_chars(text: &str, budget: usize) -> String {
    match text.char_indices().nth(budget) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Find a JSON value in a model reply: the whole reply, a fenced block, or
/// the outermost brace span.
fn extract_json(content: &str) -> Option<Value> {
    let trimmed = content.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if trimmed.starts_with("```") {
        let stripped = trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```JSON")
            .trim_start_matches("```");
        if let Some(end) = stripped.rfind("```")
            && let Ok(value) = serde_json::from_str::<Value>(stripped[..end].trim())
        {
            return Some(value);
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && start < end
        && let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end])
    {
        return Some(value);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taskweave_core::memory::MemoryEntry;

    fn lang() -> FunctionCallingLanguage {
        FunctionCallingLanguage::new()
    }

    #[test]
    fn single_user_entry_renders_as_single_user_message() {
        let mut memory = Memory::new();
        memory.push(MemoryEntry::user("hi"));
        assert_eq!(lang().format_memory(&memory), vec![PromptMessage::user("hi")]);
    }

    #[test]
    fn environment_entries_use_assistant_role_by_default() {
        let mut memory = Memory::new();
        memory.push(MemoryEntry::environment(r#"{"tool_executed":true}"#));
        memory.push(MemoryEntry::system("rules"));

        let messages = lang().format_memory(&memory);
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[1].role, Role::User);

        let as_user = lang()
            .with_environment_role(EnvironmentRole::User)
            .format_memory(&memory);
        assert_eq!(as_user[0].role, Role::User);
    }

    #[test]
    fn empty_content_falls_back_to_entry_json() {
        let mut memory = Memory::new();
        memory.push(MemoryEntry::assistant(""));
        let messages = lang().format_memory(&memory);
        let decoded: Value = serde_json::from_str(&messages[0].content).unwrap();
        assert_eq!(decoded, json!({"type": "assistant", "content": ""}));
    }

    #[test]
    fn goals_render_in_input_order_as_one_system_message() {
        let goals = vec![
            Goal::new(5, "Second", "runs later"),
            Goal::new(1, "First", "runs first"),
        ];
        let messages = lang().format_goals(&goals);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(
            messages[0].content,
            "Second:\n-------------------\nruns later\n-------------------\n\n\n\
             First:\n-------------------\nruns first\n-------------------\n"
        );
    }

    #[test]
    fn descriptions_are_hard_truncated() {
        let long = "é".repeat(2000);
        let cap = CapabilityDescriptor::builder("verbose")
            .description(long)
            .sync_fn(|_args| Ok(()))
            .build()
            .unwrap();
        let tools = lang().format_actions(std::slice::from_ref(&cap));
        assert_eq!(tools[0].description.chars().count(), 1024);

        let tight = lang().with_description_budget(3).format_actions(&[cap]);
        assert_eq!(tight[0].description, "ééé");
    }

    #[test]
    fn prompt_orders_goals_before_memory_and_attaches_tools() {
        let cap = CapabilityDescriptor::builder("echo")
            .param::<String>("text")
            .sync_fn(|args| args.required::<String>("text"))
            .build()
            .unwrap();
        let mut memory = Memory::new();
        memory.push(MemoryEntry::user("say hi"));

        let prompt = lang().construct_prompt(&[cap], &[Goal::new(0, "Echo", "Repeat")], &memory);
        assert_eq!(prompt.messages().len(), 2);
        assert_eq!(prompt.messages()[0].role, Role::System);
        assert_eq!(prompt.messages()[1], PromptMessage::user("say hi"));
        assert_eq!(prompt.tools()[0].name, "echo");
        assert_eq!(prompt.tools()[0].parameters["required"], json!(["text"]));
    }

    #[test]
    fn parses_plain_and_fenced_invocations() {
        let plain = lang().parse_response(r#"{"tool": "double", "args": {"x": 2}}"#);
        assert_eq!(plain.tool, "double");
        assert_eq!(plain.args, json!({"x": 2}));

        let fenced = lang().parse_response("```json\n{\"tool\": \"echo\", \"args\": {}}\n```");
        assert_eq!(fenced.tool, "echo");
    }

    #[test]
    fn unparsable_text_becomes_terminate() {
        let invocation = lang().parse_response("I don't know");
        assert_eq!(
            invocation,
            Invocation {
                tool: "terminate".into(),
                args: json!({"message": "I don't know"}),
            }
        );
    }

    #[test]
    fn json_without_tool_field_becomes_terminate() {
        let invocation = lang().parse_response(r#"{"answer": 42}"#);
        assert_eq!(invocation.tool, "terminate");
        assert_eq!(invocation.args["message"], r#"{"answer": 42}"#);
    }
}
