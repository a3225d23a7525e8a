//! Multi-agent task coordination engine.
//!
//! Matches submitted tasks to registered agents by capability, respecting task
//! dependencies, per-agent capacity and conflict backoff, and rebalances work
//! away from overloaded agents. Everything is in memory and synchronous; the
//! [`SwarmCoordinator`] is the single owner of engine state.
//!
//! # Main types
//!
//! - [`SwarmCoordinator`]: Top-level engine composing every component into a distribution cycle.
//! - [`AgentRegistry`]: Registered agents and their capacity bookkeeping.
//! - [`DependencyAnalyzer`]: Task dependency graph with cycle detection and topological order.
//! - [`CapabilityMatcher`]: Weighted scoring of agents against task requirements.
//! - [`TaskDistributor`]: Task lifecycle state machine.
//! - [`ConflictResolver`]: Detects contended targets and backs off the losing agents.
//! - [`LoadBalancer`]: Utilization, scheduling decisions and rebalancing.
//! - [`SwarmConfig`]: Thresholds, backoff and scoring weights, loadable from TOML.

/// Conflict backoff windows.
pub mod backoff;
/// Load views, scheduling and rebalancing.
pub mod balancer;
/// Engine configuration.
pub mod config;
/// Conflict detection and resolution.
pub mod conflict;
/// The coordinator facade.
pub mod coordinator;
/// Task dependency graph.
pub mod dependency;
/// Task lifecycle state machine.
pub mod distributor;
/// The shared agent eligibility predicate.
pub mod eligibility;
/// Capability scoring.
pub mod matcher;
/// Agent registry.
pub mod registry;
/// Thread-safe coordinator handle.
pub mod shared;
/// Point-in-time swarm statistics.
pub mod telemetry;
/// Agent, task and match types.
pub mod types;

pub use backoff::BackoffTable;
pub use balancer::{AgentLoad, LoadBalancer, Reassignment, Schedule, ScheduleDecision};
pub use config::{MatchWeights, SwarmConfig};
pub use conflict::{Conflict, ConflictKind, ConflictResolver, Resolution, ResolutionStrategy};
pub use coordinator::{Assignment, CycleReport, SwarmCoordinator};
pub use dependency::DependencyAnalyzer;
pub use distributor::TaskDistributor;
pub use eligibility::EligibilityGate;
pub use matcher::CapabilityMatcher;
pub use registry::AgentRegistry;
pub use shared::SharedCoordinator;
pub use telemetry::TelemetrySnapshot;
pub use types::{
    Agent, AgentCapability, AgentKind, AgentStatus, MatchResult, Performance, Task,
    TaskRequirements, TaskStatus, TaskType,
};
