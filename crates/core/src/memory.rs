//! Run memory: the append-only log of one decision loop.
//!
//! Every run owns exactly one `Memory`. Entries are only ever appended; the
//! single non-append operation is [`Memory::copy_without_system_memories`],
//! which produces a filtered copy and leaves the original untouched.

use serde::{Deserialize, Serialize};

/// The kind of a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A task or message from whoever started the run
    User,
    /// A raw decision returned by the provider
    Assistant,
    /// A serialized result envelope from the environment
    Environment,
    /// Out-of-band instructions
    System,
}

/// A single entry in a run's memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub content: String,
}

impl MemoryEntry {
    pub fn new(kind: EntryKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(EntryKind::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(EntryKind::Assistant, content)
    }

    pub fn environment(content: impl Into<String>) -> Self {
        Self::new(EntryKind::Environment, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(EntryKind::System, content)
    }
}

/// Ordered, append-only history of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    entries: Vec<MemoryEntry>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn push(&mut self, entry: MemoryEntry) {
        self.entries.push(entry);
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    /// The last `limit` entries, oldest first. A limit of zero returns everything.
    pub fn recent(&self, limit: usize) -> &[MemoryEntry] {
        if limit == 0 || limit >= self.entries.len() {
            return &self.entries;
        }
        &self.entries[self.entries.len() - limit..]
    }

    /// The most recent entry, if any.
    pub fn last(&self) -> Option<&MemoryEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A copy holding every non-system entry, in the original order.
    pub fn copy_without_system_memories(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|e| e.kind != EntryKind::System)
                .cloned()
                .collect(),
        }
    }
}
