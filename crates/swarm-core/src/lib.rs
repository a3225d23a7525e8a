//! Core types and error definitions for the swarm coordination engine.
//!
//! This crate provides the foundational types shared across all swarm crates,
//! including identifiers, ordered risk/severity levels, and error handling.
//!
//! # Main types
//!
//! - [`SwarmError`]: Unified error enum for all swarm subsystems.
//! - [`SwarmResult`]: Convenience alias for `Result<T, SwarmError>`.
//! - [`AgentId`] / [`TaskId`]: Opaque string identifiers for agents and tasks.
//! - [`RiskLevel`]: Ordered risk classification (low < medium < high < critical).
//! - [`Severity`]: Ordered severity classification for conflicts and violations.
//! - [`AgentOperation`]: An observed agent action against a target resource.

/// Error types.
pub mod error;
/// Agent and task identifiers.
pub mod ids;
/// Risk and severity levels.
pub mod level;
/// Observed agent operations.
pub mod operation;

pub use error::{SwarmError, SwarmResult};
pub use ids::{AgentId, TaskId};
pub use level::{RiskLevel, Severity};
pub use operation::{AgentOperation, OperationKind};
