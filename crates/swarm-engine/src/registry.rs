use crate::types::{Agent, AgentKind, AgentStatus};
use chrono::Utc;
use std::collections::HashMap;
use swarm_core::{AgentId, SwarmError, SwarmResult, TaskId};

/// Source of truth for known agents and their live status.
///
/// Iteration always follows registration order, which makes scoring ties and
/// load views deterministic.
#[derive(Debug, Default, Clone)]
pub struct AgentRegistry {
    agents: HashMap<AgentId, Agent>,
    order: Vec<AgentId>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an agent. An overwritten agent keeps its original position.
    pub fn register(&mut self, agent: Agent) {
        if !self.agents.contains_key(&agent.id) {
            self.order.push(agent.id.clone());
        }
        self.agents.insert(agent.id.clone(), agent);
    }

    /// Remove an agent, returning it if it was known.
    pub fn unregister(&mut self, id: &AgentId) -> Option<Agent> {
        let removed = self.agents.remove(id);
        if removed.is_some() {
            self.order.retain(|known| known != id);
        }
        removed
    }

    pub fn get(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.get(id)
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.agents.contains_key(id)
    }

    /// All agents, in registration order.
    pub fn all(&self) -> impl Iterator<Item = &Agent> {
        self.order.iter().filter_map(|id| self.agents.get(id))
    }

    pub fn by_capability_kind(&self, kind: AgentKind) -> Vec<&Agent> {
        self.all().filter(|a| a.capability.kind == kind).collect()
    }

    /// Idle agents, plus busy agents with a free slot.
    ///
    /// This ignores backoff; use [`EligibilityGate`](crate::EligibilityGate) for
    /// scheduling decisions.
    pub fn available(&self) -> Vec<&Agent> {
        self.all().filter(|a| a.is_available()).collect()
    }

    /// Set an agent's status. Unknown ids are ignored.
    pub fn set_status(&mut self, id: &AgentId, status: AgentStatus) {
        if let Some(agent) = self.agents.get_mut(id) {
            agent.status = status;
        }
    }

    /// Give a task slot on `id` to `task`.
    ///
    /// An idle agent becomes busy. Attaching a task the agent already holds is a no-op.
    pub fn attach_task(&mut self, id: &AgentId, task: &TaskId) -> SwarmResult<()> {
        let agent = self
            .agents
            .get_mut(id)
            .ok_or_else(|| SwarmError::AgentNotFound(id.clone()))?;

        if agent.current_tasks.contains(task) {
            return Ok(());
        }
        if !agent.has_spare_capacity() {
            return Err(SwarmError::CapacityExceeded {
                agent: id.clone(),
                max: agent.max_concurrent(),
            });
        }
        agent.current_tasks.push(task.clone());
        if agent.status == AgentStatus::Idle {
            agent.status = AgentStatus::Busy;
        }
        Ok(())
    }

    /// Free the slot `task` holds on `id`. Returns whether the task was held.
    ///
    /// A busy agent with no tasks left becomes idle.
    pub fn detach_task(&mut self, id: &AgentId, task: &TaskId) -> bool {
        let Some(agent) = self.agents.get_mut(id) else {
            return false;
        };
        let before = agent.current_tasks.len();
        agent.current_tasks.retain(|t| t != task);
        let removed = agent.current_tasks.len() != before;
        if agent.current_tasks.is_empty() && agent.status == AgentStatus::Busy {
            agent.status = AgentStatus::Idle;
        }
        removed
    }

    /// Count a finished task towards the agent's history.
    pub fn record_completion(&mut self, id: &AgentId) {
        if let Some(agent) = self.agents.get_mut(id) {
            agent.total_tasks_completed += 1;
            agent.capability.performance.last_active_at = Some(Utc::now());
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
