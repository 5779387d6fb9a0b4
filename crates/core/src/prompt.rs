//! Prompt: the provider-neutral request assembled by the agent language.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who authored a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role used when replaying environment-type memory entries to the model.
///
/// Defaults to `Assistant`: tool outcomes are presented in the model's own
/// voice, as prior reasoning rather than outside input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentRole {
    #[default]
    Assistant,
    User,
}

impl From<EnvironmentRole> for Role {
    fn from(policy: EnvironmentRole) -> Self {
        match policy {
            EnvironmentRole::Assistant => Role::Assistant,
            EnvironmentRole::User => Role::User,
        }
    }
}

/// One message of the conversation sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A tool the model may call, as presented to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's parameters
    pub parameters: Value,
}

/// Messages plus tool schemas for one model call.
///
/// Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    messages: Vec<PromptMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ToolSchema>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    metadata: Map<String, Value>,
}

impl Prompt {
    pub fn new(
        messages: Vec<PromptMessage>,
        tools: Vec<ToolSchema>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            messages,
            tools,
            metadata,
        }
    }

    pub fn messages(&self) -> &[PromptMessage] {
        &self.messages
    }

    pub fn tools(&self) -> &[ToolSchema] {
        &self.tools
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn tool(&self, name: &str) -> Option<&ToolSchema> {
        self.tools.iter().find(|t| t.name == name)
    }
}
