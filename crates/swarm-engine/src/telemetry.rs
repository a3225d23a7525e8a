use crate::distributor::TaskDistributor;
use crate::registry::AgentRegistry;
use crate::types::{Task, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use swarm_core::SwarmResult;

/// Point-in-time view of the swarm for dashboards and health checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub captured_at: DateTime<Utc>,
    pub total_agents: usize,
    pub agents_by_status: BTreeMap<String, usize>,
    pub total_tasks: usize,
    pub tasks_by_status: BTreeMap<String, usize>,
    /// Mean utilization over all registered agents; 0 when there are none.
    pub average_utilization_pct: f64,
    /// Mean start-to-completion time of completed tasks; 0 when none have finished.
    pub average_task_duration_ms: f64,
    pub pending_reviews: usize,
}

impl TelemetrySnapshot {
    pub fn capture(
        registry: &AgentRegistry,
        distributor: &TaskDistributor,
        pending_reviews: usize,
    ) -> Self {
        let mut agents_by_status = BTreeMap::new();
        let mut utilization = 0.0;
        for agent in registry.all() {
            *agents_by_status.entry(agent.status.to_string()).or_insert(0) += 1;
            utilization += agent.utilization_pct();
        }

        let mut tasks_by_status = BTreeMap::new();
        for task in distributor.all_tasks() {
            *tasks_by_status
                .entry(task.status.name().to_string())
                .or_insert(0) += 1;
        }

        let average_utilization_pct = if registry.is_empty() {
            0.0
        } else {
            utilization / registry.len() as f64
        };

        Self {
            captured_at: Utc::now(),
            total_agents: registry.len(),
            agents_by_status,
            total_tasks: distributor.len(),
            tasks_by_status,
            average_utilization_pct,
            average_task_duration_ms: average_duration_ms(distributor.all_tasks()),
            pending_reviews,
        }
    }

    /// Count of tasks with the given status name, e.g. `"running"`.
    pub fn tasks_in(&self, status: &str) -> usize {
        self.tasks_by_status.get(status).copied().unwrap_or(0)
    }

    pub fn to_json(&self) -> SwarmResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn average_duration_ms<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> f64 {
    let durations: Vec<i64> = tasks
        .into_iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .filter_map(|t| Some((t.completed_at? - t.started_at?).num_milliseconds()))
        .collect();
    if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<i64>() as f64 / durations.len() as f64
    }
}
