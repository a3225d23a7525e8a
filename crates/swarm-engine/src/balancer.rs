use crate::backoff::BackoffTable;
use crate::eligibility::EligibilityGate;
use crate::registry::AgentRegistry;
use crate::types::{Agent, Task};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use swarm_core::{AgentId, TaskId};
use tracing::{debug, info};

/// Capacity usage of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentLoad {
    pub agent_id: AgentId,
    pub current: usize,
    pub max: usize,
    pub utilization_pct: f64,
    /// When a backed-off agent becomes eligible again.
    pub available_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    Immediate,
    Queued,
    Delayed,
    Rejected,
}

/// Where and when a task should run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDecision {
    pub schedule: Schedule,
    pub assigned_agent: Option<AgentId>,
    pub estimated_start: Option<DateTime<Utc>>,
    pub reason: String,
}

/// A task moved off an overloaded agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reassignment {
    pub task_id: TaskId,
    pub from: AgentId,
    pub to: AgentId,
}

/// Tracks per-agent utilization and makes scheduling decisions.
#[derive(Debug, Clone)]
pub struct LoadBalancer {
    overload_threshold_pct: f64,
    schedule_threshold_pct: f64,
    assigned_at: HashMap<TaskId, DateTime<Utc>>,
}

impl LoadBalancer {
    pub fn new(overload_threshold_pct: f64, schedule_threshold_pct: f64) -> Self {
        Self {
            overload_threshold_pct,
            schedule_threshold_pct,
            assigned_at: HashMap::new(),
        }
    }

    pub fn overload_threshold_pct(&self) -> f64 {
        self.overload_threshold_pct
    }

    fn describe(agent: &Agent, backoff: &BackoffTable, now: DateTime<Utc>) -> AgentLoad {
        AgentLoad {
            agent_id: agent.id.clone(),
            current: agent.current_tasks.len(),
            max: agent.max_concurrent(),
            utilization_pct: agent.utilization_pct(),
            available_at: backoff
                .deadline(&agent.id)
                .filter(|until| *until > now),
        }
    }

    pub fn load(
        &self,
        registry: &AgentRegistry,
        backoff: &BackoffTable,
        id: &AgentId,
    ) -> Option<AgentLoad> {
        registry
            .get(id)
            .map(|a| Self::describe(a, backoff, Utc::now()))
    }

    /// Loads of every agent, in registration order.
    pub fn all_loads(&self, registry: &AgentRegistry, backoff: &BackoffTable) -> Vec<AgentLoad> {
        let now = Utc::now();
        registry
            .all()
            .map(|a| Self::describe(a, backoff, now))
            .collect()
    }

    /// Utilization strictly above the overload threshold. Unknown agents are not overloaded.
    pub fn is_overloaded(&self, registry: &AgentRegistry, id: &AgentId) -> bool {
        registry
            .get(id)
            .is_some_and(|a| a.utilization_pct() > self.overload_threshold_pct)
    }

    /// Decide whether `task` can start now.
    ///
    /// Picks the first eligible agent below the scheduling threshold. If only
    /// backed-off agents have room, the task is delayed until the earliest of
    /// their windows closes; otherwise it is queued. With no agents at all it
    /// is rejected.
    pub fn schedule(&self, gate: &EligibilityGate<'_>, task: &Task) -> ScheduleDecision {
        let registry = gate.registry();
        if registry.is_empty() {
            return ScheduleDecision {
                schedule: Schedule::Rejected,
                assigned_agent: None,
                estimated_start: None,
                reason: "no agents registered".to_string(),
            };
        }

        let under_threshold = |a: &&Agent| a.utilization_pct() < self.schedule_threshold_pct;

        if let Some(agent) = gate.eligible_agents().into_iter().find(under_threshold) {
            debug!(task_id = %task.id, agent_id = %agent.id, "Scheduled immediately");
            return ScheduleDecision {
                schedule: Schedule::Immediate,
                assigned_agent: Some(agent.id.clone()),
                estimated_start: Some(gate.now()),
                reason: format!(
                    "agent {} at {:.0}% utilization",
                    agent.id,
                    agent.utilization_pct()
                ),
            };
        }

        let backoff = gate.backoff();
        let reopening = registry
            .all()
            .filter(|a| a.is_available())
            .filter(under_threshold)
            .filter_map(|a| backoff.deadline(&a.id).filter(|until| *until > gate.now()))
            .min();

        match reopening {
            Some(until) => ScheduleDecision {
                schedule: Schedule::Delayed,
                assigned_agent: None,
                estimated_start: Some(until),
                reason: "capacity is held by backed-off agents".to_string(),
            },
            None => ScheduleDecision {
                schedule: Schedule::Queued,
                assigned_agent: None,
                estimated_start: None,
                reason: format!(
                    "no agent below {:.0}% utilization",
                    self.schedule_threshold_pct
                ),
            },
        }
    }

    /// Remember when `task` was handed to its agent.
    pub fn record_assignment(&mut self, task: &TaskId, at: DateTime<Utc>) {
        self.assigned_at.insert(task.clone(), at);
    }

    pub fn forget(&mut self, task: &TaskId) {
        self.assigned_at.remove(task);
    }

    /// Drain overloaded agents down to the scheduling threshold.
    ///
    /// From each overloaded agent, the least-recently-assigned task accepted by
    /// `movable` is moved to the least-utilized eligible agent that stays at or
    /// below the scheduling threshold after receiving it. Stops per agent when
    /// it is back under the threshold or nothing more can move.
    pub fn rebalance(
        &mut self,
        registry: &mut AgentRegistry,
        backoff: &BackoffTable,
        movable: impl Fn(&TaskId) -> bool,
    ) -> Vec<Reassignment> {
        let now = Utc::now();
        let overloaded: Vec<AgentId> = registry
            .all()
            .filter(|a| a.utilization_pct() > self.overload_threshold_pct)
            .map(|a| a.id.clone())
            .collect();

        let mut moves = Vec::new();
        for from in overloaded {
            loop {
                let Some(source) = registry.get(&from) else {
                    break;
                };
                if source.utilization_pct() <= self.schedule_threshold_pct {
                    break;
                }

                let Some(task) = self.oldest_movable(source, &movable) else {
                    break;
                };
                let Some(to) = self.pick_target(registry, backoff, &from, now) else {
                    break;
                };

                registry.detach_task(&from, &task);
                if registry.attach_task(&to, &task).is_err() {
                    // pick_target only returns agents with a free slot.
                    let _ = registry.attach_task(&from, &task);
                    break;
                }
                self.assigned_at.insert(task.clone(), now);
                info!(task_id = %task, from = %from, to = %to, "Task rebalanced");
                moves.push(Reassignment {
                    task_id: task,
                    from: from.clone(),
                    to,
                });
            }
        }
        moves
    }

    fn oldest_movable(&self, agent: &Agent, movable: &impl Fn(&TaskId) -> bool) -> Option<TaskId> {
        agent
            .current_tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| movable(*t))
            .min_by_key(|(pos, t)| (self.assigned_at.get(*t).copied(), *pos))
            .map(|(_, t)| t.clone())
    }

    fn pick_target(
        &self,
        registry: &AgentRegistry,
        backoff: &BackoffTable,
        from: &AgentId,
        now: DateTime<Utc>,
    ) -> Option<AgentId> {
        let gate = EligibilityGate::new(registry, backoff, self.overload_threshold_pct).at(now);
        gate.eligible_agents()
            .into_iter()
            .filter(|a| &a.id != from)
            .filter(|a| {
                let after = (a.current_tasks.len() + 1) as f64 / a.max_concurrent() as f64 * 100.0;
                after <= self.schedule_threshold_pct
            })
            .min_by(|a, b| a.utilization_pct().total_cmp(&b.utilization_pct()))
            .map(|a| a.id.clone())
    }
}

impl Default for LoadBalancer {
    fn default() -> Self {
        Self::new(90.0, 80.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::{AgentKind, TaskType};

    fn fill(registry: &mut AgentRegistry, agent: &str, n: usize) {
        for i in 0..n {
            registry
                .attach_task(&agent.into(), &format!("{agent}-T{i}").into())
                .unwrap();
        }
    }

    fn registry_with(agents: &[(&str, usize)]) -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        for (id, max) in agents {
            registry.register(Agent::new(*id, *id, AgentKind::Builder).with_max_concurrent(*max));
        }
        registry
    }

    #[test]
    fn test_full_agent_is_overloaded() {
        let mut registry = registry_with(&[("a", 5)]);
        fill(&mut registry, "a", 5);
        let balancer = LoadBalancer::default();
        let load = balancer
            .load(&registry, &BackoffTable::new(), &"a".into())
            .unwrap();
        assert_eq!(load.utilization_pct, 100.0);
        assert_eq!((load.current, load.max), (5, 5));
        assert!(balancer.is_overloaded(&registry, &"a".into()));
    }

    #[test]
    fn test_exactly_ninety_percent_not_overloaded() {
        let mut registry = registry_with(&[("a", 10)]);
        fill(&mut registry, "a", 9);
        let balancer = LoadBalancer::default();
        assert!(!balancer.is_overloaded(&registry, &"a".into()));
        assert!(!balancer.is_overloaded(&registry, &"ghost".into()));
        assert!(balancer.load(&registry, &BackoffTable::new(), &"ghost".into()).is_none());
    }

    #[test]
    fn test_schedule_immediate_picks_first_under_threshold() {
        let mut registry = registry_with(&[("busy", 5), ("free", 5)]);
        fill(&mut registry, "busy", 4);
        let backoff = BackoffTable::new();
        let gate = EligibilityGate::new(&registry, &backoff, 90.0);
        let decision = LoadBalancer::default().schedule(&gate, &Task::new("T", TaskType::Build));
        assert_eq!(decision.schedule, Schedule::Immediate);
        assert_eq!(decision.assigned_agent, Some("free".into()));
    }

    #[test]
    fn test_schedule_queued_when_saturated() {
        let mut registry = registry_with(&[("a", 5)]);
        fill(&mut registry, "a", 4);
        let backoff = BackoffTable::new();
        let gate = EligibilityGate::new(&registry, &backoff, 90.0);
        let decision = LoadBalancer::default().schedule(&gate, &Task::new("T", TaskType::Build));
        assert_eq!(decision.schedule, Schedule::Queued);
        assert!(decision.assigned_agent.is_none());
    }

    #[test]
    fn test_schedule_delayed_by_backoff() {
        let registry = registry_with(&[("a", 2)]);
        let mut backoff = BackoffTable::new();
        let now = Utc::now();
        let until = now + chrono::Duration::seconds(20);
        backoff.apply_until(&"a".into(), until);
        let gate = EligibilityGate::new(&registry, &backoff, 90.0).at(now);

        let decision = LoadBalancer::default().schedule(&gate, &Task::new("T", TaskType::Build));
        assert_eq!(decision.schedule, Schedule::Delayed);
        assert_eq!(decision.estimated_start, Some(until));

        let load = LoadBalancer::default().load(&registry, &backoff, &"a".into()).unwrap();
        assert_eq!(load.available_at, Some(until));
    }

    #[test]
    fn test_schedule_rejected_without_agents() {
        let registry = AgentRegistry::new();
        let backoff = BackoffTable::new();
        let gate = EligibilityGate::new(&registry, &backoff, 90.0);
        let decision = LoadBalancer::default().schedule(&gate, &Task::new("T", TaskType::Build));
        assert_eq!(decision.schedule, Schedule::Rejected);
    }

    #[test]
    fn test_rebalance_moves_oldest_tasks() {
        let mut registry = registry_with(&[("hot", 5), ("cold", 5)]);
        fill(&mut registry, "hot", 5);
        let mut balancer = LoadBalancer::default();
        let base = Utc::now();
        // hot-T3 is the oldest assignment, then hot-T0.
        for (i, offset) in [(0, 2), (1, 3), (2, 4), (3, 1), (4, 5)] {
            balancer.record_assignment(
                &format!("hot-T{i}").into(),
                base + chrono::Duration::seconds(offset),
            );
        }

        let moves = balancer.rebalance(&mut registry, &BackoffTable::new(), |_| true);
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].task_id.as_str(), "hot-T3");
        assert_eq!(moves[0].to.as_str(), "cold");

        let hot = registry.get(&"hot".into()).unwrap();
        assert_eq!(hot.utilization_pct(), 80.0);
        assert_eq!(registry.get(&"cold".into()).unwrap().current_tasks.len(), 1);
    }

    #[test]
    fn test_rebalance_respects_movable_predicate() {
        let mut registry = registry_with(&[("hot", 2), ("cold", 5)]);
        fill(&mut registry, "hot", 2);
        let mut balancer = LoadBalancer::default();
        let moves =
            balancer.rebalance(&mut registry, &BackoffTable::new(), |t| t.as_str() == "hot-T1");
        // 1/2 = 50% after moving hot-T1; hot-T0 stays put.
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].task_id.as_str(), "hot-T1");
        assert_eq!(registry.get(&"hot".into()).unwrap().current_tasks.len(), 1);
    }

    #[test]
    fn test_rebalance_without_targets_moves_nothing() {
        let mut registry = registry_with(&[("hot", 2), ("also-hot", 2)]);
        fill(&mut registry, "hot", 2);
        fill(&mut registry, "also-hot", 2);
        let mut balancer = LoadBalancer::default();
        assert!(balancer
            .rebalance(&mut registry, &BackoffTable::new(), |_| true)
            .is_empty());
    }

    #[test]
    fn test_rebalance_skips_backed_off_targets() {
        let mut registry = registry_with(&[("hot", 2), ("cold", 5)]);
        fill(&mut registry, "hot", 2);
        let mut backoff = BackoffTable::new();
        backoff.apply(&"cold".into(), std::time::Duration::from_secs(60));
        let mut balancer = LoadBalancer::default();
        assert!(balancer.rebalance(&mut registry, &backoff, |_| true).is_empty());
    }
}
