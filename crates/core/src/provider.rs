//! Provider trait: the abstraction over LLM backends.
//!
//! A provider receives a [`Prompt`] and answers with either plain text or a
//! structured tool invocation. The agent loop never sees wire formats.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::prompt::Prompt;

/// What the model produced for one prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum ProviderReply {
    /// Free text. The agent language is expected to parse a decision out of it.
    Text(String),
    /// A native function call.
    Invocation { tool: String, args: Value },
}

impl ProviderReply {
    /// Normalize to the textual decision form the agent language parses.
    ///
    /// Invocations become `{"tool": ..., "args": ...}`.
    pub fn into_decision_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Invocation { tool, args } => {
                serde_json::json!({ "tool": tool, "args": args }).to_string()
            }
        }
    }
}

/// The core Provider trait.
///
/// Every LLM backend implements this. The agent loop calls `generate()`
/// without knowing which provider is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "scripted").
    fn name(&self) -> &str;

    /// Send a prompt and wait for the model's reply.
    async fn generate(&self, prompt: &Prompt) -> Result<ProviderReply, ProviderError>;
}
