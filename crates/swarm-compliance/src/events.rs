use crate::checks::Violation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swarm_core::{AgentId, Severity, TaskId};
use uuid::Uuid;

/// A state transition emitted by the coordinator for external persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: SwarmEventKind,
}

impl SwarmEvent {
    pub fn now(kind: SwarmEventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Short stable name for the event, used as the log message.
    pub fn name(&self) -> &'static str {
        match &self.kind {
            SwarmEventKind::AgentRegistered { .. } => "agent_registered",
            SwarmEventKind::AgentUnregistered { .. } => "agent_unregistered",
            SwarmEventKind::TaskSubmitted { .. } => "task_submitted",
            SwarmEventKind::AssignmentMade { .. } => "assignment_made",
            SwarmEventKind::TaskStarted { .. } => "task_started",
            SwarmEventKind::TaskCompleted { .. } => "task_completed",
            SwarmEventKind::TaskFailed { .. } => "task_failed",
            SwarmEventKind::TaskCancelled { .. } => "task_cancelled",
            SwarmEventKind::TaskBlocked { .. } => "task_blocked",
            SwarmEventKind::TaskUnblocked { .. } => "task_unblocked",
            SwarmEventKind::TaskRebalanced { .. } => "task_rebalanced",
            SwarmEventKind::ConflictDetected { .. } => "conflict_detected",
            SwarmEventKind::ConflictResolved { .. } => "conflict_resolved",
            SwarmEventKind::ComplianceViolation { .. } => "compliance_violation",
        }
    }
}

/// Payload of a [`SwarmEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SwarmEventKind {
    AgentRegistered {
        agent_id: AgentId,
        kind: String,
    },
    AgentUnregistered {
        agent_id: AgentId,
    },
    TaskSubmitted {
        task_id: TaskId,
        task_type: String,
        priority: i32,
        dependencies: Vec<TaskId>,
    },
    AssignmentMade {
        task_id: TaskId,
        agent_id: AgentId,
        score: f64,
    },
    TaskStarted {
        task_id: TaskId,
        agent_id: Option<AgentId>,
    },
    TaskCompleted {
        task_id: TaskId,
        agent_id: Option<AgentId>,
    },
    TaskFailed {
        task_id: TaskId,
        agent_id: Option<AgentId>,
        reason: String,
    },
    TaskCancelled {
        task_id: TaskId,
    },
    TaskBlocked {
        task_id: TaskId,
        missing: Vec<TaskId>,
    },
    TaskUnblocked {
        task_id: TaskId,
    },
    TaskRebalanced {
        task_id: TaskId,
        from: AgentId,
        to: AgentId,
    },
    ConflictDetected {
        conflict_id: Uuid,
        conflict_type: String,
        severity: Severity,
        agent_ids: Vec<AgentId>,
        description: String,
    },
    ConflictResolved {
        conflict_id: Uuid,
        strategy: String,
        winning_agent: Option<AgentId>,
        backoff_agents: Vec<AgentId>,
        requires_human_review: bool,
    },
    ComplianceViolation {
        violation: Violation,
    },
}
