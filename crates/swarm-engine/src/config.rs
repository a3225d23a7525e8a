use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use swarm_core::{SwarmError, SwarmResult};

/// Weights applied to each capability-matching factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchWeights {
    #[serde(default = "default_skill_weight")]
    pub skills: f64,
    #[serde(default = "default_context_weight")]
    pub context: f64,
    #[serde(default = "default_risk_weight")]
    pub risk: f64,
    #[serde(default = "default_performance_weight")]
    pub performance: f64,
    #[serde(default = "default_availability_weight")]
    pub availability: f64,
}

impl Default for MatchWeights {
    fn default() -> Self {
        Self {
            skills: default_skill_weight(),
            context: default_context_weight(),
            risk: default_risk_weight(),
            performance: default_performance_weight(),
            availability: default_availability_weight(),
        }
    }
}

impl MatchWeights {
    pub fn total(&self) -> f64 {
        self.skills + self.context + self.risk + self.performance + self.availability
    }
}

fn default_skill_weight() -> f64 {
    40.0
}
fn default_context_weight() -> f64 {
    20.0
}
fn default_risk_weight() -> f64 {
    15.0
}
fn default_performance_weight() -> f64 {
    15.0
}
fn default_availability_weight() -> f64 {
    10.0
}

/// Caller-supplied tuning for the coordinator.
///
/// ```toml
/// overload_threshold_pct = 90.0
/// schedule_threshold_pct = 80.0
/// max_response_time_ms = 5000
/// default_backoff_ms = 30000
///
/// [weights]
/// skills = 40.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Utilization strictly above this is overloaded.
    #[serde(default = "default_overload_threshold")]
    pub overload_threshold_pct: f64,
    /// Agents strictly below this take new work immediately; rebalancing drains down to it.
    #[serde(default = "default_schedule_threshold")]
    pub schedule_threshold_pct: f64,
    /// Performance-compliance ceiling on average response time.
    #[serde(default = "default_max_response_time")]
    pub max_response_time_ms: u64,
    /// Backoff applied to agents that lose a conflict.
    #[serde(default = "default_backoff")]
    pub default_backoff_ms: u64,
    #[serde(default)]
    pub weights: MatchWeights,
}

fn default_overload_threshold() -> f64 {
    90.0
}
fn default_schedule_threshold() -> f64 {
    80.0
}
fn default_max_response_time() -> u64 {
    5_000
}
fn default_backoff() -> u64 {
    30_000
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            overload_threshold_pct: default_overload_threshold(),
            schedule_threshold_pct: default_schedule_threshold(),
            max_response_time_ms: default_max_response_time(),
            default_backoff_ms: default_backoff(),
            weights: MatchWeights::default(),
        }
    }
}

impl SwarmConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> SwarmResult<Self> {
        let config: SwarmConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> SwarmResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SwarmError::Config(format!("Cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> SwarmResult<()> {
        for (name, value) in [
            ("overload_threshold_pct", self.overload_threshold_pct),
            ("schedule_threshold_pct", self.schedule_threshold_pct),
        ] {
            if !(value > 0.0 && value <= 100.0) {
                return Err(SwarmError::Config(format!(
                    "{name} must be in (0, 100], got {value}"
                )));
            }
        }
        if self.schedule_threshold_pct > self.overload_threshold_pct {
            return Err(SwarmError::Config(format!(
                "schedule_threshold_pct ({}) exceeds overload_threshold_pct ({})",
                self.schedule_threshold_pct, self.overload_threshold_pct
            )));
        }
        let w = &self.weights;
        if [w.skills, w.context, w.risk, w.performance, w.availability]
            .iter()
            .any(|v| *v < 0.0 || !v.is_finite())
        {
            return Err(SwarmError::Config(
                "match weights must be finite and non-negative".to_string(),
            ));
        }
        if w.total() <= 0.0 {
            return Err(SwarmError::Config(
                "match weights must sum to a positive value".to_string(),
            ));
        }
        Ok(())
    }

    pub fn default_backoff(&self) -> Duration {
        Duration::from_millis(self.default_backoff_ms)
    }
}
