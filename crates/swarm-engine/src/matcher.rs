use crate::config::MatchWeights;
use crate::eligibility::EligibilityGate;
use crate::types::{Agent, AgentStatus, MatchResult, TaskRequirements};
use std::collections::BTreeSet;

/// Scores agents against task requirements.
///
/// | factor | default weight | value |
/// |---|---|---|
/// | skills | 40 | share of required skills the agent has (1.0 when none required) |
/// | context | 20 | same, over context tags |
/// | risk | 15 | 1.0 if the agent is cleared for the task's risk level, else 0.5 |
/// | performance | 15 | historical success rate |
/// | availability | 10 | 1.0 idle, 0.5 busy with a free slot, 0.0 otherwise |
///
/// An under-qualified agent keeps half the risk credit, so it may still win
/// when nothing better is available.
#[derive(Debug, Clone, Default)]
pub struct CapabilityMatcher {
    weights: MatchWeights,
}

impl CapabilityMatcher {
    pub fn new(weights: MatchWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &MatchWeights {
        &self.weights
    }

    pub fn score(&self, agent: &Agent, req: &TaskRequirements) -> f64 {
        let cap = &agent.capability;
        let w = &self.weights;

        let skill = overlap(&req.skills, &cap.skills);
        let context = overlap(&req.context, &cap.context);
        let risk = if cap.risk_level >= req.risk_level {
            1.0
        } else {
            0.5
        };
        let performance = cap.performance.success_rate.clamp(0.0, 1.0);
        let availability = match agent.status {
            AgentStatus::Idle => 1.0,
            AgentStatus::Busy if agent.has_spare_capacity() => 0.5,
            _ => 0.0,
        };

        skill * w.skills
            + context * w.context
            + risk * w.risk
            + performance * w.performance
            + availability * w.availability
    }

    /// Every eligible agent with a positive score, best first.
    ///
    /// Ties keep registration order.
    pub fn all_matches(
        &self,
        gate: &EligibilityGate<'_>,
        req: &TaskRequirements,
    ) -> Vec<MatchResult> {
        let mut matches: Vec<MatchResult> = gate
            .eligible_agents()
            .into_iter()
            .filter_map(|agent| {
                let score = self.score(agent, req);
                (score > 0.0).then(|| MatchResult {
                    agent_id: agent.id.clone(),
                    score,
                    reason: format!("Agent {} matched with {score:.1} score", agent.name),
                })
            })
            .collect();
        // sort_by is stable, which preserves registration order between equal scores.
        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches
    }

    pub fn best_match(
        &self,
        gate: &EligibilityGate<'_>,
        req: &TaskRequirements,
    ) -> Option<MatchResult> {
        self.all_matches(gate, req).into_iter().next()
    }
}

fn overlap(required: &BTreeSet<String>, offered: &BTreeSet<String>) -> f64 {
    if required.is_empty() {
        return 1.0;
    }
    let hits = required.intersection(offered).count();
    hits as f64 / required.len() as f64
}
