use crate::backoff::BackoffTable;
use crate::registry::AgentRegistry;
use crate::types::Agent;
use chrono::{DateTime, Utc};
use swarm_core::AgentId;

/// The single "may this agent take work right now" predicate.
///
/// Composes status, capacity, overload, and conflict backoff. Both the
/// capability matcher and the load balancer draw their candidates from here.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityGate<'a> {
    registry: &'a AgentRegistry,
    backoff: &'a BackoffTable,
    overload_threshold_pct: f64,
    now: DateTime<Utc>,
}

impl<'a> EligibilityGate<'a> {
    pub fn new(
        registry: &'a AgentRegistry,
        backoff: &'a BackoffTable,
        overload_threshold_pct: f64,
    ) -> Self {
        Self {
            registry,
            backoff,
            overload_threshold_pct,
            now: Utc::now(),
        }
    }

    /// Evaluate backoff windows at `now` instead of the wall clock.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn registry(&self) -> &'a AgentRegistry {
        self.registry
    }

    pub fn backoff(&self) -> &'a BackoffTable {
        self.backoff
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn is_eligible(&self, agent: &Agent) -> bool {
        agent.is_available()
            && agent.utilization_pct() <= self.overload_threshold_pct
            && !self.backoff.is_backed_off(&agent.id, self.now)
    }

    /// Unknown agents are never eligible.
    pub fn eligible(&self, id: &AgentId) -> bool {
        self.registry.get(id).is_some_and(|a| self.is_eligible(a))
    }

    /// Eligible agents in registration order.
    pub fn eligible_agents(&self) -> Vec<&'a Agent> {
        let gate = *self;
        self.registry.all().filter(|a| gate.is_eligible(a)).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::{AgentKind, AgentStatus};

    fn registry() -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        registry.register(Agent::new("idle", "Idle", AgentKind::Builder).with_max_concurrent(2));
        registry.register(
            Agent::new("blocked", "Blocked", AgentKind::Builder).with_status(AgentStatus::Blocked),
        );
        registry.register(Agent::new("wide", "Wide", AgentKind::Builder).with_max_concurrent(20));
        registry
    }

    #[test]
    fn test_status_and_unknown() {
        let registry = registry();
        let backoff = BackoffTable::new();
        let gate = EligibilityGate::new(&registry, &backoff, 90.0);
        assert!(gate.eligible(&"idle".into()));
        assert!(!gate.eligible(&"blocked".into()));
        assert!(!gate.eligible(&"ghost".into()));
    }

    #[test]
    fn test_backoff_excludes_agent() {
        let registry = registry();
        let mut backoff = BackoffTable::new();
        let now = Utc::now();
        backoff.apply_until(&"idle".into(), now + chrono::Duration::seconds(10));

        let gate = EligibilityGate::new(&registry, &backoff, 90.0).at(now);
        assert!(!gate.eligible(&"idle".into()));

        let later = EligibilityGate::new(&registry, &backoff, 90.0)
            .at(now + chrono::Duration::seconds(11));
        assert!(later.eligible(&"idle".into()));
    }

    #[test]
    fn test_overloaded_agent_with_spare_slot_excluded() {
        let mut registry = registry();
        let wide = AgentId::from("wide");
        for i in 0..19 {
            registry.attach_task(&wide, &format!("T{i}").into()).unwrap();
        }
        let backoff = BackoffTable::new();
        let gate = EligibilityGate::new(&registry, &backoff, 90.0);
        // 19/20 = 95% still has a slot but is over the overload line.
        assert!(registry.get(&wide).unwrap().is_available());
        assert!(!gate.eligible(&wide));
    }

    #[test]
    fn test_eligible_agents_in_registration_order() {
        let registry = registry();
        let backoff = BackoffTable::new();
        let gate = EligibilityGate::new(&registry, &backoff, 90.0);
        let ids: Vec<&str> = gate.eligible_agents().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["idle", "wide"]);
    }
}
