use crate::ids::{AgentId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What an agent did (or is about to do) to a target resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Read,
    Write,
    Create,
    Update,
    Delete,
    Rename,
}

impl OperationKind {
    /// Every kind except `Read` changes the target.
    pub fn is_mutating(self) -> bool {
        !matches!(self, OperationKind::Read)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Read => write!(f, "read"),
            OperationKind::Write => write!(f, "write"),
            OperationKind::Create => write!(f, "create"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
            OperationKind::Rename => write!(f, "rename"),
        }
    }
}

/// An observed operation by an agent against a target (usually a file path).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOperation {
    pub agent_id: AgentId,
    #[serde(rename = "type")]
    pub kind: OperationKind,
    pub target: String,
    /// The task the agent was working on, when known.
    #[serde(default)]
    pub task_id: Option<TaskId>,
    pub timestamp: DateTime<Utc>,
}

impl AgentOperation {
    pub fn new(
        agent_id: impl Into<AgentId>,
        kind: OperationKind,
        target: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            kind,
            target: target.into(),
            task_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn for_task(mut self, task_id: impl Into<TaskId>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }
}
