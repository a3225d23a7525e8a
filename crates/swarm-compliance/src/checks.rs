use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swarm_core::{AgentId, AgentOperation, OperationKind};

/// An agent whose measured performance breaches a configured ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceViolation {
    pub agent_id: AgentId,
    pub metric: String,
    pub threshold: f64,
    pub actual: f64,
    pub timestamp: DateTime<Utc>,
}

/// An operation that touched a target outside the agent's governance domains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryViolation {
    pub agent_id: AgentId,
    pub operation: OperationKind,
    pub target: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// Either kind of compliance violation, as carried on the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    Performance(PerformanceViolation),
    Boundary(BoundaryViolation),
}

impl Violation {
    pub fn agent_id(&self) -> &AgentId {
        match self {
            Violation::Performance(v) => &v.agent_id,
            Violation::Boundary(v) => &v.agent_id,
        }
    }
}

impl From<PerformanceViolation> for Violation {
    fn from(v: PerformanceViolation) -> Self {
        Violation::Performance(v)
    }
}

impl From<BoundaryViolation> for Violation {
    fn from(v: BoundaryViolation) -> Self {
        Violation::Boundary(v)
    }
}

/// Name of the metric reported by [`check_response_time`].
pub const AVERAGE_RESPONSE_TIME: &str = "average_response_time_ms";

/// Flags an agent whose average response time exceeds `ceiling_ms`.
pub fn check_response_time(
    agent_id: &AgentId,
    average_response_ms: f64,
    ceiling_ms: f64,
) -> Option<PerformanceViolation> {
    if average_response_ms > ceiling_ms {
        Some(PerformanceViolation {
            agent_id: agent_id.clone(),
            metric: AVERAGE_RESPONSE_TIME.to_string(),
            threshold: ceiling_ms,
            actual: average_response_ms,
            timestamp: Utc::now(),
        })
    } else {
        None
    }
}

/// Splits a `/`-separated path into its components, dropping empty and `.`
/// segments. `None` if the path climbs with `..`.
fn components(path: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => return None,
            part => parts.push(part),
        }
    }
    Some(parts)
}

/// Whether `target` falls under one of `domains`.
///
/// Domains match whole path components, so `src` covers `src/lib.rs` but not
/// `srcfoo/x`. `"*"` matches everything. A target containing `..` never
/// matches, and an empty domain list matches nothing.
pub fn within_domains(target: &str, domains: &[String]) -> bool {
    let Some(target) = components(target) else {
        return false;
    };
    domains.iter().any(|d| {
        d == "*" || components(d).is_some_and(|domain| target.starts_with(&domain))
    })
}

/// Checks one operation against the governance domains of the agent that
/// performed it. `domains` is `None` when the agent is not registered.
pub fn check_domain_boundary(
    op: &AgentOperation,
    domains: Option<&[String]>,
) -> Option<BoundaryViolation> {
    let reason = match domains {
        None => format!("agent {} is not registered", op.agent_id),
        Some(domains) if within_domains(&op.target, domains) => return None,
        Some(_) if components(&op.target).is_none() => {
            format!("target '{}' escapes its directory with '..'", op.target)
        }
        Some([]) => format!("agent {} declares no governance domains", op.agent_id),
        Some(domains) => format!(
            "target '{}' is outside declared domains [{}]",
            op.target,
            domains.join(", ")
        ),
    };

    Some(BoundaryViolation {
        agent_id: op.agent_id.clone(),
        operation: op.kind,
        target: op.target.clone(),
        reason,
        timestamp: op.timestamp,
    })
}
