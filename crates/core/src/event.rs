//! Domain event system: decoupled observation of agent runs.
//!
//! The decision loop publishes events when something interesting happens.
//! Front-ends subscribe to render progress without touching the loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A decision loop started working on a task
    RunStarted {
        agent: String,
        depth: usize,
        timestamp: DateTime<Utc>,
    },

    /// A new iteration of the loop began
    IterationStarted {
        agent: String,
        iteration: usize,
        timestamp: DateTime<Utc>,
    },

    /// A capability was dispatched through the environment
    CapabilityExecuted {
        agent: String,
        capability: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A delegated run returned control to its caller
    DelegationCompleted {
        caller_depth: usize,
        agent: String,
        success: bool,
        timestamp: DateTime<Utc>,
    },

    /// A decision loop stopped
    RunFinished {
        agent: String,
        exit: String,
        iterations: usize,
        memory_len: usize,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}
