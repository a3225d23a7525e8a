use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use swarm_core::AgentId;

/// Per-agent exclusion windows applied after losing a conflict.
#[derive(Debug, Default, Clone)]
pub struct BackoffTable {
    deadlines: HashMap<AgentId, DateTime<Utc>>,
}

impl BackoffTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude `agent` for `duration` from now.
    pub fn apply(&mut self, agent: &AgentId, duration: Duration) -> DateTime<Utc> {
        let now = Utc::now();
        let until = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.apply_until(agent, until);
        until
    }

    /// Exclude `agent` until `until`. An existing later deadline is kept.
    pub fn apply_until(&mut self, agent: &AgentId, until: DateTime<Utc>) {
        let deadline = self.deadlines.entry(agent.clone()).or_insert(until);
        if until > *deadline {
            *deadline = until;
        }
    }

    pub fn is_backed_off(&self, agent: &AgentId, now: DateTime<Utc>) -> bool {
        self.deadlines.get(agent).is_some_and(|until| now < *until)
    }

    pub fn deadline(&self, agent: &AgentId) -> Option<DateTime<Utc>> {
        self.deadlines.get(agent).copied()
    }

    /// Lift the backoff on `agent` early.
    pub fn clear(&mut self, agent: &AgentId) {
        self.deadlines.remove(agent);
    }

    /// Drop deadlines that have passed.
    pub fn clear_expired(&mut self, now: DateTime<Utc>) {
        self.deadlines.retain(|_, until| now < *until);
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
