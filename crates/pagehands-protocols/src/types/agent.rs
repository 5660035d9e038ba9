//! Agent lifecycle types shared across the fabric and the loop.

use serde::{Deserialize, Serialize};

/// Two-phase agent lifecycle mode. Per-tab, defaults to plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentMode {
    #[default]
    Plan,
    Execute,
}

impl std::fmt::Display for AgentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentMode::Plan => write!(f, "plan"),
            AgentMode::Execute => write!(f, "execute"),
        }
    }
}

/// A per-tab todo item the agent maintains across turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub content: String,
    pub status: TodoStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

impl Todo {
    pub fn is_open(&self) -> bool {
        !matches!(self.status, TodoStatus::Completed)
    }
}
