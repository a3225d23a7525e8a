use crate::balancer::{AgentLoad, LoadBalancer, Reassignment, ScheduleDecision};
use crate::config::SwarmConfig;
use crate::conflict::{Conflict, ConflictResolver, Resolution};
use crate::dependency::DependencyAnalyzer;
use crate::distributor::TaskDistributor;
use crate::eligibility::EligibilityGate;
use crate::matcher::CapabilityMatcher;
use crate::registry::AgentRegistry;
use crate::telemetry::TelemetrySnapshot;
use crate::types::{Agent, AgentStatus, MatchResult, Task, TaskRequirements, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use swarm_compliance::{
    check_domain_boundary, check_response_time, EventSink, EventSinkChain, SwarmEvent,
    SwarmEventKind, Violation,
};
use swarm_core::{AgentId, AgentOperation, SwarmResult, TaskId};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One assignment made during a distribution cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub task_id: TaskId,
    pub agent_id: AgentId,
    pub score: f64,
}

/// Outcome of [`SwarmCoordinator::run_distribution_cycle`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    /// Assignments, in the order they were made.
    pub assigned: Vec<Assignment>,
    /// Ready tasks no eligible agent could take this cycle.
    pub unmatched: Vec<TaskId>,
    /// Tasks parked because a dependency was never submitted.
    pub blocked: Vec<TaskId>,
    /// Blocked tasks whose missing dependencies have since been submitted.
    pub unblocked: Vec<TaskId>,
}

impl CycleReport {
    /// Nothing changed this cycle.
    pub fn is_idle(&self) -> bool {
        self.assigned.is_empty() && self.blocked.is_empty() && self.unblocked.is_empty()
    }
}

/// The coordination engine.
///
/// Owns the registry, dependency graph, task state and backoff table, and is
/// the only thing that mutates them. Every state transition is logged through
/// `tracing` and published to the configured [`EventSink`]s.
///
/// Mutating calls take `&mut self`; wrap the coordinator in a
/// [`SharedCoordinator`](crate::SharedCoordinator) to share it across threads.
#[derive(Debug)]
pub struct SwarmCoordinator {
    config: SwarmConfig,
    registry: AgentRegistry,
    dependencies: DependencyAnalyzer,
    matcher: CapabilityMatcher,
    distributor: TaskDistributor,
    resolver: ConflictResolver,
    balancer: LoadBalancer,
    sinks: EventSinkChain,
    operations: Vec<AgentOperation>,
    /// Operations before this index have been through `boundary_compliance`.
    boundary_checked: usize,
}

impl SwarmCoordinator {
    /// Create a coordinator after validating `config`.
    pub fn new(config: SwarmConfig) -> SwarmResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SwarmConfig) -> Self {
        Self {
            registry: AgentRegistry::new(),
            dependencies: DependencyAnalyzer::new(),
            matcher: CapabilityMatcher::new(config.weights.clone()),
            distributor: TaskDistributor::new(),
            resolver: ConflictResolver::new(config.default_backoff()),
            balancer: LoadBalancer::new(
                config.overload_threshold_pct,
                config.schedule_threshold_pct,
            ),
            sinks: EventSinkChain::new(),
            operations: Vec::new(),
            boundary_checked: 0,
            config,
        }
    }

    /// Builder-style variant of [`add_sink`](SwarmCoordinator::add_sink).
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.add(sink);
        self
    }

    /// Publish every subsequent event to `sink` as well.
    pub fn add_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.add(sink);
    }

    fn emit(&self, kind: SwarmEventKind) {
        self.sinks.emit(SwarmEvent::now(kind));
    }

    fn gate_at(&self, now: DateTime<Utc>) -> EligibilityGate<'_> {
        EligibilityGate::new(
            &self.registry,
            self.resolver.backoff(),
            self.config.overload_threshold_pct,
        )
        .at(now)
    }

    // --- agents ---

    /// Add or replace an agent.
    ///
    /// Replacing an agent keeps the task slots it already holds; those are
    /// owned by the coordinator, not the caller.
    pub fn register_agent(&mut self, mut agent: Agent) {
        if let Some(existing) = self.registry.get(&agent.id) {
            agent.current_tasks = existing.current_tasks.clone();
            if !agent.current_tasks.is_empty() && agent.status == AgentStatus::Idle {
                agent.status = AgentStatus::Busy;
            }
        }
        let agent_id = agent.id.clone();
        let kind = agent.capability.kind;
        info!(agent_id = %agent_id, kind = %kind, max = agent.max_concurrent(), "Agent registered");
        self.registry.register(agent);
        self.emit(SwarmEventKind::AgentRegistered {
            agent_id,
            kind: kind.to_string(),
        });
    }

    /// Remove an agent. Tasks it was assigned but had not started go back to
    /// pending for the next cycle; running tasks are left to the caller.
    pub fn unregister_agent(&mut self, id: &AgentId) -> Option<Agent> {
        let agent = self.registry.unregister(id)?;
        for task_id in &agent.current_tasks {
            let assigned = self
                .distributor
                .get(task_id)
                .is_some_and(|t| t.status == TaskStatus::Assigned);
            if assigned && self.distributor.release(task_id).is_ok() {
                self.balancer.forget(task_id);
                debug!(task_id = %task_id, "Released task from unregistered agent");
            }
        }
        self.resolver.backoff_mut().clear(id);
        info!(agent_id = %id, "Agent unregistered");
        self.emit(SwarmEventKind::AgentUnregistered {
            agent_id: id.clone(),
        });
        Some(agent)
    }

    /// Get a registered agent.
    pub fn agent(&self, id: &AgentId) -> Option<&Agent> {
        self.registry.get(id)
    }

    /// Get a reference to the agent registry.
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    // --- tasks ---

    /// Accept a task. It enters the dependency graph and waits as pending.
    ///
    /// Resubmitting an assigned or running task frees the slot it held.
    pub fn submit_task(&mut self, task: Task) -> TaskId {
        let held = self
            .distributor
            .get(&task.id)
            .filter(|t| matches!(t.status, TaskStatus::Assigned | TaskStatus::Running))
            .and_then(|t| t.assigned_agent.clone());
        if let Some(agent) = held {
            self.registry.detach_task(&agent, &task.id);
            warn!(
                task_id = %task.id,
                agent_id = %agent,
                "Resubmitted task released from its agent"
            );
        }
        self.balancer.forget(&task.id);
        self.dependencies.add_task(&task.id, &task.dependencies);
        let event = SwarmEventKind::TaskSubmitted {
            task_id: task.id.clone(),
            task_type: task.task_type.to_string(),
            priority: task.priority(),
            dependencies: task.dependencies.clone(),
        };
        let id = self.distributor.submit(task);
        info!(task_id = %id, "Task submitted");
        self.emit(event);
        id
    }

    /// Current status of a task.
    pub fn task_status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.distributor.status(id)
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.distributor.get(id)
    }

    /// Get a reference to the task distributor.
    pub fn distributor(&self) -> &TaskDistributor {
        &self.distributor
    }

    /// Get a reference to the dependency graph.
    pub fn dependencies(&self) -> &DependencyAnalyzer {
        &self.dependencies
    }

    /// Submitted tasks in dependency order. Fails on a cycle.
    pub fn execution_order(&self) -> SwarmResult<Vec<TaskId>> {
        self.dependencies.execution_order()
    }

    pub fn detect_cycles(&self) -> Option<Vec<TaskId>> {
        self.dependencies.detect_cycles()
    }

    /// Match ready tasks to agents.
    ///
    /// 1. Blocked tasks whose missing dependencies have been submitted go back to pending.
    /// 2. Pending tasks with a dependency that was never submitted are blocked.
    /// 3. Pending tasks whose dependencies have all completed are offered, highest
    ///    priority first (ties by submission order), to the best eligible agent.
    ///
    /// Readiness is evaluated once at the start; tasks that become ready during
    /// the cycle wait for the next one. Assigned tasks are not started here, see
    /// [`start_assigned_tasks`](SwarmCoordinator::start_assigned_tasks).
    pub fn run_distribution_cycle(&mut self) -> CycleReport {
        let now = Utc::now();
        self.resolver.backoff_mut().clear_expired(now);
        let mut report = CycleReport::default();

        let parked: Vec<TaskId> = self
            .distributor
            .with_status(&TaskStatus::Blocked)
            .into_iter()
            .map(|t| t.id.clone())
            .collect();
        for id in parked {
            if self.dependencies.missing_dependencies(&id).is_empty()
                && self.distributor.unblock(&id).is_ok()
            {
                info!(task_id = %id, "Task unblocked");
                self.emit(SwarmEventKind::TaskUnblocked {
                    task_id: id.clone(),
                });
                report.unblocked.push(id);
            }
        }

        for id in self.dependencies.blocked_tasks() {
            if self.distributor.status(&id) != Some(TaskStatus::Pending) {
                continue;
            }
            if self.distributor.mark_blocked(&id).is_ok() {
                let missing = self.dependencies.missing_dependencies(&id);
                warn!(
                    task_id = %id,
                    missing = ?missing,
                    "Task blocked on dependencies that were never submitted"
                );
                self.emit(SwarmEventKind::TaskBlocked {
                    task_id: id.clone(),
                    missing,
                });
                report.blocked.push(id);
            }
        }

        let completed = self.distributor.completed_ids().clone();
        let mut ready: Vec<(i32, TaskId)> = self
            .distributor
            .with_status(&TaskStatus::Pending)
            .into_iter()
            .filter(|t| self.dependencies.can_execute(&t.id, &completed))
            .map(|t| (t.priority(), t.id.clone()))
            .collect();
        // Stable: equal priorities keep submission order.
        ready.sort_by(|a, b| b.0.cmp(&a.0));

        for (_, id) in ready {
            let Some(task) = self.distributor.get(&id) else {
                continue;
            };
            let found = self.matcher.best_match(&self.gate_at(now), &task.requirements);
            let Some(found) = found else {
                debug!(task_id = %id, "No eligible agent for task");
                report.unmatched.push(id);
                continue;
            };

            if let Err(e) = self.registry.attach_task(&found.agent_id, &id) {
                warn!(
                    task_id = %id,
                    agent_id = %found.agent_id,
                    error = %e,
                    "Assignment rejected by registry"
                );
                report.unmatched.push(id);
                continue;
            }
            if let Err(e) = self.distributor.assign(&id, &found.agent_id) {
                warn!(task_id = %id, error = %e, "Assignment rejected by distributor");
                self.registry.detach_task(&found.agent_id, &id);
                report.unmatched.push(id);
                continue;
            }
            self.balancer.record_assignment(&id, now);

            info!(task_id = %id, agent_id = %found.agent_id, score = found.score, "Task assigned");
            self.emit(SwarmEventKind::AssignmentMade {
                task_id: id.clone(),
                agent_id: found.agent_id.clone(),
                score: found.score,
            });
            report.assigned.push(Assignment {
                task_id: id,
                agent_id: found.agent_id,
                score: found.score,
            });
        }

        info!(
            assigned = report.assigned.len(),
            unmatched = report.unmatched.len(),
            blocked = report.blocked.len(),
            unblocked = report.unblocked.len(),
            "Distribution cycle complete"
        );
        report
    }

    /// Start every assigned task whose dependencies have completed.
    pub fn start_assigned_tasks(&mut self) -> Vec<TaskId> {
        let started = self.distributor.distribute_ready();
        for id in &started {
            let agent_id = self.distributor.get(id).and_then(|t| t.assigned_agent.clone());
            info!(task_id = %id, agent_id = ?agent_id, "Task started");
            self.emit(SwarmEventKind::TaskStarted {
                task_id: id.clone(),
                agent_id,
            });
        }
        started
    }

    /// Mark a running task completed and free its agent's slot.
    pub fn complete_task(&mut self, id: &TaskId) -> SwarmResult<()> {
        let agent_id = self.distributor.complete(id)?;
        if let Some(agent) = &agent_id {
            self.registry.detach_task(agent, id);
            self.registry.record_completion(agent);
        }
        self.balancer.forget(id);
        info!(task_id = %id, agent_id = ?agent_id, "Task completed");
        self.emit(SwarmEventKind::TaskCompleted {
            task_id: id.clone(),
            agent_id,
        });
        Ok(())
    }

    /// Mark an assigned or running task failed and free its agent's slot.
    pub fn fail_task(&mut self, id: &TaskId, reason: impl Into<String>) -> SwarmResult<()> {
        let reason = reason.into();
        let agent_id = self.distributor.fail(id, reason.clone())?;
        if let Some(agent) = &agent_id {
            self.registry.detach_task(agent, id);
        }
        self.balancer.forget(id);
        warn!(task_id = %id, agent_id = ?agent_id, reason = %reason, "Task failed");
        self.emit(SwarmEventKind::TaskFailed {
            task_id: id.clone(),
            agent_id,
            reason,
        });
        Ok(())
    }

    /// Cancel a non-terminal task.
    ///
    /// The agent's capacity is not released; call
    /// [`release_capacity`](SwarmCoordinator::release_capacity) with the returned
    /// agent once its work has actually stopped.
    pub fn cancel_task(&mut self, id: &TaskId) -> SwarmResult<Option<AgentId>> {
        let agent_id = self.distributor.cancel(id)?;
        self.balancer.forget(id);
        info!(task_id = %id, agent_id = ?agent_id, "Task cancelled");
        self.emit(SwarmEventKind::TaskCancelled {
            task_id: id.clone(),
        });
        Ok(agent_id)
    }

    /// Free the slot `task` holds on `agent`.
    pub fn release_capacity(&mut self, agent: &AgentId, task: &TaskId) -> bool {
        self.registry.detach_task(agent, task)
    }

    // --- matching and load ---

    pub fn all_matches(&self, requirements: &TaskRequirements) -> Vec<MatchResult> {
        self.matcher.all_matches(&self.gate_at(Utc::now()), requirements)
    }

    /// Best eligible agent for `requirements`. `None` is a normal outcome.
    pub fn best_match(&self, requirements: &TaskRequirements) -> Option<MatchResult> {
        self.matcher.best_match(&self.gate_at(Utc::now()), requirements)
    }

    pub fn load(&self, id: &AgentId) -> Option<AgentLoad> {
        self.balancer.load(&self.registry, self.resolver.backoff(), id)
    }

    /// Loads of every agent, in registration order.
    pub fn all_loads(&self) -> Vec<AgentLoad> {
        self.balancer.all_loads(&self.registry, self.resolver.backoff())
    }

    pub fn is_overloaded(&self, id: &AgentId) -> bool {
        self.balancer.is_overloaded(&self.registry, id)
    }

    /// Advisory scheduling decision for `task`. Changes nothing.
    pub fn schedule(&self, task: &Task) -> ScheduleDecision {
        self.balancer.schedule(&self.gate_at(Utc::now()), task)
    }

    /// Move assigned, not yet started tasks off overloaded agents.
    pub fn rebalance(&mut self) -> Vec<Reassignment> {
        let distributor = &self.distributor;
        let moves = self.balancer.rebalance(
            &mut self.registry,
            self.resolver.backoff(),
            |task| distributor.get(task).is_some_and(|t| t.status == TaskStatus::Assigned),
        );

        for m in &moves {
            if let Err(e) = self.distributor.reassign(&m.task_id, &m.to) {
                warn!(task_id = %m.task_id, error = %e, "Rebalanced task could not be reassigned");
                continue;
            }
            self.emit(SwarmEventKind::TaskRebalanced {
                task_id: m.task_id.clone(),
                from: m.from.clone(),
                to: m.to.clone(),
            });
        }
        moves
    }

    // --- conflicts ---

    /// Record a batch of concurrent operations and report every contended target.
    ///
    /// Detected conflicts are published but not resolved; pass each to
    /// [`resolve_conflict`](SwarmCoordinator::resolve_conflict).
    pub fn observe_operations(
        &mut self,
        operations: impl IntoIterator<Item = AgentOperation>,
    ) -> Vec<Conflict> {
        let batch: Vec<AgentOperation> = operations.into_iter().collect();
        let conflicts = self.resolver.detect_all(&batch);
        for conflict in &conflicts {
            warn!(
                conflict_id = %conflict.id,
                target = %conflict.target,
                agents = conflict.agent_ids.len(),
                "Conflict detected"
            );
            self.emit(SwarmEventKind::ConflictDetected {
                conflict_id: conflict.id,
                conflict_type: conflict.kind.to_string(),
                severity: conflict.severity,
                agent_ids: conflict.agent_ids.clone(),
                description: conflict.description.clone(),
            });
        }
        self.operations.extend(batch);
        conflicts
    }

    /// Settle `conflict`: back off the losers and, when a human must decide,
    /// park it in the review queue.
    pub fn resolve_conflict(&mut self, conflict: &mut Conflict) -> Resolution {
        let resolution = self.resolver.settle(conflict);
        self.emit(SwarmEventKind::ConflictResolved {
            conflict_id: conflict.id,
            strategy: resolution.strategy.to_string(),
            winning_agent: resolution.winning_agent.clone(),
            backoff_agents: resolution.backoff_agents.clone(),
            requires_human_review: resolution.requires_human_review,
        });
        resolution
    }

    /// Exclude `agent` from matching and scheduling for `duration`.
    pub fn apply_backoff(&mut self, agent: &AgentId, duration: Duration) {
        self.resolver.apply_backoff(agent, duration);
    }

    pub fn is_backed_off(&self, agent: &AgentId) -> bool {
        self.resolver.backoff().is_backed_off(agent, Utc::now())
    }

    /// Escalated conflicts waiting for a human.
    pub fn pending_reviews(&self) -> &[Conflict] {
        self.resolver.pending_reviews()
    }

    pub fn acknowledge_review(&mut self, conflict_id: Uuid) -> Option<Conflict> {
        let acknowledged = self.resolver.acknowledge(conflict_id);
        if acknowledged.is_some() {
            info!(conflict_id = %conflict_id, "Review acknowledged");
        }
        acknowledged
    }

    /// Operations recorded by [`observe_operations`](SwarmCoordinator::observe_operations).
    pub fn observed_operations(&self) -> &[AgentOperation] {
        &self.operations
    }

    pub fn clear_operations(&mut self) {
        self.operations.clear();
        self.boundary_checked = 0;
    }

    // --- compliance ---

    /// Agents whose average response time exceeds the configured ceiling.
    pub fn performance_compliance(&self) -> Vec<Violation> {
        let ceiling = self.config.max_response_time_ms as f64;
        let violations: Vec<Violation> = self
            .registry
            .all()
            .filter_map(|a| {
                check_response_time(
                    &a.id,
                    a.capability.performance.average_response_time_ms,
                    ceiling,
                )
            })
            .map(Violation::from)
            .collect();
        self.publish(&violations);
        violations
    }

    /// Observed operations whose target lies outside the acting agent's
    /// governance domains, including operations by unregistered agents.
    ///
    /// Each operation is checked once: a later call only covers operations
    /// observed since the previous one.
    pub fn boundary_compliance(&mut self) -> Vec<Violation> {
        let unchecked = &self.operations[self.boundary_checked..];
        let violations: Vec<Violation> = unchecked
            .iter()
            .filter_map(|op| {
                let domains = self
                    .registry
                    .get(&op.agent_id)
                    .map(|a| a.capability.governance_domains.as_slice());
                check_domain_boundary(op, domains)
            })
            .map(Violation::from)
            .collect();
        self.boundary_checked = self.operations.len();
        self.publish(&violations);
        violations
    }

    fn publish(&self, violations: &[Violation]) {
        for violation in violations {
            warn!(agent_id = %violation.agent_id(), "Compliance violation");
            self.emit(SwarmEventKind::ComplianceViolation {
                violation: violation.clone(),
            });
        }
    }

    // --- reporting ---

    /// Point-in-time counts for dashboards.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        TelemetrySnapshot::capture(&self.registry, &self.distributor, self.pending_reviews().len())
    }

    /// Get a reference to the active configuration.
    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }
}

impl Default for SwarmCoordinator {
    fn default() -> Self {
        Self::build(SwarmConfig::default())
    }
}
