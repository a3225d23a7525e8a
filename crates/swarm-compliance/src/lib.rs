//! Audit events and compliance checks for the swarm coordination engine.
//!
//! The engine persists nothing itself. Every state transition is published as a
//! [`SwarmEvent`] through an [`EventSink`], and the compliance checks here turn
//! agent performance figures and observed operations into [`Violation`] records.
//!
//! # Main types
//!
//! - [`SwarmEvent`]: Timestamped state transition (registration, assignment, conflict, ...).
//! - [`EventSink`]: Seam for external persistence; see [`TracingSink`], [`ChannelSink`] and
//!   [`MemorySink`].
//! - [`EventSinkChain`]: Fan-out to several sinks.
//! - [`PerformanceViolation`] / [`BoundaryViolation`]: Compliance findings.

/// Performance and governance-boundary checks.
pub mod checks;
/// Event vocabulary.
pub mod events;
/// Event sinks.
pub mod sink;

pub use checks::{
    check_domain_boundary, check_response_time, within_domains, BoundaryViolation,
    PerformanceViolation, Violation,
};
pub use events::{SwarmEvent, SwarmEventKind};
pub use sink::{ChannelSink, EventSink, EventSinkChain, MemorySink, TracingSink};
