//! Agent goals.

use serde::{Deserialize, Serialize};

/// A single instruction block handed to the model as part of the system
/// message.
///
/// `priority` is advisory: prompts render goals in the order they were given.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Goal {
    #[serde(default)]
    pub priority: i32,
    pub name: String,
    pub description: String,
}

impl Goal {
    pub fn new(priority: i32, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            priority,
            name: name.into(),
            description: description.into(),
        }
    }
}
