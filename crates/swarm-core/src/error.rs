use crate::ids::{AgentId, TaskId};

/// A convenience `Result` alias using [`SwarmError`].
pub type SwarmResult<T> = Result<T, SwarmError>;

/// Top-level error type for the swarm engine.
///
/// Capacity misses (no agent matches a task) are never errors; they surface as
/// `None` or a queued schedule decision instead.
#[derive(Debug, thiserror::Error)]
pub enum SwarmError {
    /// An operation referenced an agent id that is not registered.
    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),

    /// An operation referenced a task id that was never submitted.
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// The dependency graph contains a cycle. `cycle` starts and ends on the same id.
    #[error("Cyclic dependency: {}", format_cycle(.cycle))]
    CyclicDependency {
        /// The offending cycle, in traversal order.
        cycle: Vec<TaskId>,
    },

    /// An agent is already running `max` tasks.
    #[error("Agent {agent} is at capacity ({max} concurrent tasks)")]
    CapacityExceeded {
        /// The saturated agent.
        agent: AgentId,
        /// Its `max_concurrent_tasks`.
        max: usize,
    },

    /// A task state transition that the lifecycle does not allow.
    #[error("Task {task}: cannot transition from {from} to {to}")]
    InvalidTransition {
        /// The task being transitioned.
        task: TaskId,
        /// Current status name.
        from: String,
        /// Requested status name.
        to: String,
    },

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A TOML deserialization error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_cycle(cycle: &[TaskId]) -> String {
    cycle
        .iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cyclic_dependency_display() {
        let err = SwarmError::CyclicDependency {
            cycle: vec!["T1".into(), "T2".into(), "T1".into()],
        };
        assert_eq!(err.to_string(), "Cyclic dependency: T1 -> T2 -> T1");
    }

    #[test]
    fn test_capacity_display() {
        let err = SwarmError::CapacityExceeded {
            agent: "builder-1".into(),
            max: 3,
        };
        assert!(err.to_string().contains("builder-1"));
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: SwarmError = parse.unwrap_err().into();
        assert!(matches!(err, SwarmError::Json(_)));
    }
}
