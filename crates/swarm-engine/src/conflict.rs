use crate::backoff::BackoffTable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use swarm_core::{AgentId, AgentOperation, Severity, TaskId};
use tracing::{info, warn};
use uuid::Uuid;

/// What two or more agents are contending over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    File,
    Resource,
    Architecture,
    Governance,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::File => write!(f, "file"),
            ConflictKind::Resource => write!(f, "resource"),
            ConflictKind::Architecture => write!(f, "architecture"),
            ConflictKind::Governance => write!(f, "governance"),
        }
    }
}

/// A detected contention between agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    /// Involved agents, in order of their first operation.
    pub agent_ids: Vec<AgentId>,
    pub task_ids: Vec<TaskId>,
    pub target: String,
    pub description: String,
    pub severity: Severity,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution: Option<String>,
}

impl Conflict {
    pub fn new(
        kind: ConflictKind,
        severity: Severity,
        target: impl Into<String>,
        agent_ids: Vec<AgentId>,
    ) -> Self {
        let target = target.into();
        Self {
            id: Uuid::new_v4(),
            kind,
            description: format!(
                "{} agents contending for {kind} '{target}'",
                agent_ids.len()
            ),
            agent_ids,
            task_ids: Vec::new(),
            target,
            severity,
            detected_at: Utc::now(),
            resolved_at: None,
            resolution: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStrategy {
    Priority,
    Backoff,
    Merge,
    Escalate,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionStrategy::Priority => write!(f, "priority"),
            ResolutionStrategy::Backoff => write!(f, "backoff"),
            ResolutionStrategy::Merge => write!(f, "merge"),
            ResolutionStrategy::Escalate => write!(f, "escalate"),
        }
    }
}

/// How a conflict is to be settled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub strategy: ResolutionStrategy,
    pub winning_agent: Option<AgentId>,
    pub backoff_agents: Vec<AgentId>,
    pub requires_human_review: bool,
}

impl Resolution {
    /// One-line summary stored on the resolved conflict.
    pub fn summary(&self) -> String {
        match (&self.strategy, &self.winning_agent) {
            (ResolutionStrategy::Escalate, _) => format!(
                "escalated for human review; {} agent(s) backed off",
                self.backoff_agents.len()
            ),
            (strategy, Some(winner)) => format!(
                "{strategy}: {winner} proceeds; {} agent(s) backed off",
                self.backoff_agents.len()
            ),
            (strategy, None) => format!("{strategy}: no winner"),
        }
    }
}

/// Detects concurrent operations on the same target and arbitrates between agents.
///
/// Owns the backoff table consulted by the eligibility gate, and the queue of
/// escalated conflicts awaiting a human decision.
#[derive(Debug, Clone)]
pub struct ConflictResolver {
    backoff: BackoffTable,
    default_backoff: Duration,
    pending_reviews: Vec<Conflict>,
}

impl ConflictResolver {
    pub fn new(default_backoff: Duration) -> Self {
        Self {
            backoff: BackoffTable::new(),
            default_backoff,
            pending_reviews: Vec::new(),
        }
    }

    /// The first contended target in `operations`, if any.
    pub fn detect(&self, operations: &[AgentOperation]) -> Option<Conflict> {
        self.detect_all(operations).into_iter().next()
    }

    /// One conflict per contended target, in order of each target's first operation.
    ///
    /// A target is contended when operations from at least two distinct agents
    /// touch it and at least one of them mutates it.
    pub fn detect_all(&self, operations: &[AgentOperation]) -> Vec<Conflict> {
        let mut targets: Vec<(&str, Vec<&AgentOperation>)> = Vec::new();
        for op in operations {
            match targets.iter_mut().find(|(t, _)| *t == op.target) {
                Some((_, ops)) => ops.push(op),
                None => targets.push((op.target.as_str(), vec![op])),
            }
        }

        targets
            .into_iter()
            .filter_map(|(target, ops)| {
                if !ops.iter().any(|op| op.kind.is_mutating()) {
                    return None;
                }
                let mut agents: Vec<AgentId> = Vec::new();
                let mut tasks: Vec<TaskId> = Vec::new();
                for op in &ops {
                    if !agents.contains(&op.agent_id) {
                        agents.push(op.agent_id.clone());
                    }
                    if let Some(task) = &op.task_id {
                        if !tasks.contains(task) {
                            tasks.push(task.clone());
                        }
                    }
                }
                if agents.len() < 2 {
                    return None;
                }
                let mut conflict =
                    Conflict::new(ConflictKind::File, Severity::Medium, target, agents);
                conflict.task_ids = tasks;
                Some(conflict)
            })
            .collect()
    }

    /// Decide how to settle `conflict`. Pure; see [`settle`](ConflictResolver::settle)
    /// to also apply the outcome.
    pub fn resolve(&self, conflict: &Conflict) -> Resolution {
        if conflict.kind == ConflictKind::Governance || conflict.severity == Severity::Critical {
            return Resolution {
                strategy: ResolutionStrategy::Escalate,
                winning_agent: None,
                backoff_agents: conflict.agent_ids.clone(),
                requires_human_review: true,
            };
        }

        let mut agents = conflict.agent_ids.iter().cloned();
        let winning_agent = agents.next();
        Resolution {
            strategy: ResolutionStrategy::Priority,
            winning_agent,
            backoff_agents: agents.collect(),
            requires_human_review: false,
        }
    }

    /// Resolve `conflict`, back off the losers for the default duration, stamp
    /// the conflict as resolved, and queue it for review when required.
    pub fn settle(&mut self, conflict: &mut Conflict) -> Resolution {
        let resolution = self.resolve(conflict);
        for agent in &resolution.backoff_agents {
            self.apply_backoff(agent, self.default_backoff);
        }
        conflict.resolved_at = Some(Utc::now());
        conflict.resolution = Some(resolution.summary());

        if resolution.requires_human_review {
            self.escalate(conflict.clone());
        } else {
            info!(
                conflict_id = %conflict.id,
                strategy = %resolution.strategy,
                winner = ?resolution.winning_agent,
                "Conflict resolved"
            );
        }
        resolution
    }

    /// Exclude `agent` from scheduling for `duration`.
    pub fn apply_backoff(&mut self, agent: &AgentId, duration: Duration) {
        let until = self.backoff.apply(agent, duration);
        info!(agent_id = %agent, until = %until, "Agent backed off");
    }

    /// Park a conflict until a human acknowledges it. Never retried automatically.
    pub fn escalate(&mut self, conflict: Conflict) {
        warn!(
            conflict_id = %conflict.id,
            conflict_type = %conflict.kind,
            severity = %conflict.severity,
            agents = conflict.agent_ids.len(),
            "Conflict escalated for human review"
        );
        if !self.pending_reviews.iter().any(|c| c.id == conflict.id) {
            self.pending_reviews.push(conflict);
        }
    }

    pub fn pending_reviews(&self) -> &[Conflict] {
        &self.pending_reviews
    }

    /// Remove a conflict from the review queue once a human has dealt with it.
    pub fn acknowledge(&mut self, conflict_id: Uuid) -> Option<Conflict> {
        let pos = self.pending_reviews.iter().position(|c| c.id == conflict_id)?;
        Some(self.pending_reviews.remove(pos))
    }

    pub fn backoff(&self) -> &BackoffTable {
        &self.backoff
    }

    pub fn backoff_mut(&mut self) -> &mut BackoffTable {
        &mut self.backoff
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use swarm_core::OperationKind;

    fn op(agent: &str, kind: OperationKind, target: &str) -> AgentOperation {
        AgentOperation::new(agent, kind, target)
    }

    #[test]
    fn test_two_writers_conflict() {
        let resolver = ConflictResolver::default();
        let conflict = resolver
            .detect(&[
                op("A", OperationKind::Write, "f.ts"),
                op("B", OperationKind::Write, "f.ts"),
            ])
            .unwrap();
        assert_eq!(conflict.kind, ConflictKind::File);
        assert_eq!(conflict.severity, Severity::Medium);
        assert_eq!(conflict.agent_ids, vec![AgentId::from("A"), AgentId::from("B")]);
        assert_eq!(conflict.target, "f.ts");
        assert!(!conflict.is_resolved());
    }

    #[test]
    fn test_same_agent_twice_is_not_a_conflict() {
        let resolver = ConflictResolver::default();
        assert!(resolver
            .detect(&[
                op("A", OperationKind::Write, "f.ts"),
                op("A", OperationKind::Delete, "f.ts"),
            ])
            .is_none());
    }

    #[test]
    fn test_concurrent_reads_are_not_a_conflict() {
        let resolver = ConflictResolver::default();
        assert!(resolver
            .detect(&[
                op("A", OperationKind::Read, "f.ts"),
                op("B", OperationKind::Read, "f.ts"),
            ])
            .is_none());
    }

    #[test]
    fn test_read_against_write_conflicts() {
        let resolver = ConflictResolver::default();
        let conflict = resolver
            .detect(&[
                op("A", OperationKind::Read, "f.ts"),
                op("B", OperationKind::Update, "f.ts"),
            ])
            .unwrap();
        assert_eq!(conflict.agent_ids.len(), 2);
    }

    #[test]
    fn test_different_targets_do_not_conflict() {
        let resolver = ConflictResolver::default();
        assert!(resolver
            .detect(&[
                op("A", OperationKind::Write, "a.ts"),
                op("B", OperationKind::Write, "b.ts"),
            ])
            .is_none());
    }

    #[test]
    fn test_detect_all_and_task_ids() {
        let resolver = ConflictResolver::default();
        let conflicts = resolver.detect_all(&[
            op("A", OperationKind::Write, "a.ts").for_task("T1"),
            op("B", OperationKind::Write, "b.ts"),
            op("C", OperationKind::Write, "a.ts").for_task("T3"),
            op("D", OperationKind::Create, "b.ts"),
        ]);
        assert_eq!(conflicts.len(), 2);
        assert_eq!(conflicts[0].target, "a.ts");
        assert_eq!(conflicts[0].task_ids, vec![TaskId::from("T1"), TaskId::from("T3")]);
        assert_eq!(conflicts[1].agent_ids, vec![AgentId::from("B"), AgentId::from("D")]);
    }

    #[test]
    fn test_priority_resolution() {
        let resolver = ConflictResolver::default();
        let conflict = Conflict::new(
            ConflictKind::File,
            Severity::Medium,
            "f.ts",
            vec!["A".into(), "B".into(), "C".into()],
        );
        let resolution = resolver.resolve(&conflict);
        assert_eq!(resolution.strategy, ResolutionStrategy::Priority);
        assert_eq!(resolution.winning_agent, Some("A".into()));
        assert_eq!(resolution.backoff_agents, vec![AgentId::from("B"), AgentId::from("C")]);
        assert!(!resolution.requires_human_review);
    }

    #[test]
    fn test_governance_and_critical_escalate() {
        let resolver = ConflictResolver::default();
        for (kind, severity) in [
            (ConflictKind::Governance, Severity::Low),
            (ConflictKind::File, Severity::Critical),
        ] {
            let conflict = Conflict::new(kind, severity, "x", vec!["A".into(), "B".into()]);
            let resolution = resolver.resolve(&conflict);
            assert_eq!(resolution.strategy, ResolutionStrategy::Escalate);
            assert!(resolution.winning_agent.is_none());
            assert_eq!(resolution.backoff_agents.len(), 2);
            assert!(resolution.requires_human_review);
        }
    }

    #[test]
    fn test_settle_applies_backoff_and_stamps() {
        let mut resolver = ConflictResolver::new(Duration::from_secs(60));
        let mut conflict = Conflict::new(
            ConflictKind::File,
            Severity::Medium,
            "f.ts",
            vec!["A".into(), "B".into()],
        );
        let resolution = resolver.settle(&mut conflict);

        assert!(conflict.is_resolved());
        assert!(conflict.resolution.as_deref().unwrap().contains("A proceeds"));
        let now = Utc::now();
        assert!(resolver.backoff().is_backed_off(&"B".into(), now));
        assert!(!resolver.backoff().is_backed_off(&"A".into(), now));
        assert!(resolver.pending_reviews().is_empty());
        assert_eq!(resolution.winning_agent, Some("A".into()));
    }

    #[test]
    fn test_escalation_queue() {
        let mut resolver = ConflictResolver::default();
        let mut conflict = Conflict::new(
            ConflictKind::Governance,
            Severity::High,
            "policy.md",
            vec!["A".into(), "B".into()],
        );
        resolver.settle(&mut conflict);
        assert_eq!(resolver.pending_reviews().len(), 1);
        assert!(resolver.backoff().is_backed_off(&"A".into(), Utc::now()));

        // Escalating the same conflict again does not duplicate it.
        resolver.escalate(conflict.clone());
        assert_eq!(resolver.pending_reviews().len(), 1);

        assert!(resolver.acknowledge(conflict.id).is_some());
        assert!(resolver.acknowledge(conflict.id).is_none());
        assert!(resolver.pending_reviews().is_empty());
    }
}
