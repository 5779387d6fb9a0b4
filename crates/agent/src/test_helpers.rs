//! Shared test helpers for loop and delegation tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::{Value, json};
use taskweave_core::catalog::{CapabilityCatalog, CatalogBuilder};
use taskweave_core::error::ProviderError;
use taskweave_core::memory::{EntryKind, Memory};
use taskweave_core::prompt::Prompt;
use taskweave_core::provider::{Provider, ProviderReply};

use crate::delegation::call_agent;

/// A mock provider that returns a sequence of scripted replies.
///
/// Each call to `generate` returns the next reply in the queue.
/// Panics if more calls are made than replies provided.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<ProviderReply, ProviderError>>>,
    call_count: Mutex<usize>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<ProviderReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            call_count: Mutex::new(0),
        }
    }

    /// A provider whose first call fails.
    pub fn failing(error: ProviderError) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(error)])),
            call_count: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _prompt: &Prompt) -> Result<ProviderReply, ProviderError> {
        let mut count = self.call_count.lock().unwrap();
        *count += 1;
        self.replies.lock().unwrap().pop_front().unwrap_or_else(|| {
            panic!("ScriptedProvider: no more replies (call #{})", *count)
        })
    }
}

/// A structured tool invocation reply.
pub fn invocation(tool: &str, args: Value) -> ProviderReply {
    ProviderReply::Invocation {
        tool: tool.to_string(),
        args,
    }
}

/// A reply invoking `terminate` with `message`.
pub fn terminate_reply(message: &str) -> ProviderReply {
    invocation("terminate", json!({ "message": message }))
}

/// Built-in capabilities plus `call_agent` under the `agents` tag.
pub fn catalog() -> CapabilityCatalog {
    let builder = taskweave_tools::register_builtins(CatalogBuilder::new()).unwrap();
    builder
        .register(call_agent().unwrap(), ["agents"])
        .build()
        .unwrap()
}

pub fn memory_kinds(memory: &Memory) -> Vec<EntryKind> {
    memory.entries().iter().map(|e| e.kind).collect()
}
