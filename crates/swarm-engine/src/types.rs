use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use swarm_core::{AgentId, RiskLevel, TaskId};

/// Role of an agent in the swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentKind {
    /// Implements changes.
    Builder,
    /// Plans and supervises builders.
    Foreman,
    /// Builder cleared for platform-level changes.
    MaturionBuilder,
    /// Writes and runs tests.
    Qa,
    /// Automated refactoring agent.
    Ara,
    /// Validates outputs against governance rules.
    Validator,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentKind::Builder => write!(f, "builder"),
            AgentKind::Foreman => write!(f, "foreman"),
            AgentKind::MaturionBuilder => write!(f, "maturion-builder"),
            AgentKind::Qa => write!(f, "qa"),
            AgentKind::Ara => write!(f, "ara"),
            AgentKind::Validator => write!(f, "validator"),
        }
    }
}

/// Live status of an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Busy,
    Blocked,
    Escalating,
    Recovering,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Busy => write!(f, "busy"),
            AgentStatus::Blocked => write!(f, "blocked"),
            AgentStatus::Escalating => write!(f, "escalating"),
            AgentStatus::Recovering => write!(f, "recovering"),
        }
    }
}

/// Historical performance figures reported for an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub average_response_time_ms: f64,
    /// Fraction of tasks that succeeded, in `[0, 1]`.
    pub success_rate: f64,
    pub last_active_at: Option<DateTime<Utc>>,
}

impl Default for Performance {
    fn default() -> Self {
        Self {
            average_response_time_ms: 0.0,
            success_rate: 1.0,
            last_active_at: None,
        }
    }
}

/// What an agent can do and how much of it at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCapability {
    pub kind: AgentKind,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    #[serde(default)]
    pub context: BTreeSet<String>,
    #[serde(default)]
    pub risk_level: RiskLevel,
    /// Path prefixes the agent is allowed to operate on. `"*"` allows everything.
    #[serde(default)]
    pub governance_domains: Vec<String>,
    pub max_concurrent_tasks: usize,
    #[serde(default)]
    pub performance: Performance,
}

/// A unit of execution capacity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub capability: AgentCapability,
    #[serde(default)]
    pub status: AgentStatus,
    /// Tasks currently held, in the order they were attached.
    #[serde(default)]
    pub current_tasks: Vec<TaskId>,
    #[serde(default)]
    pub total_tasks_completed: u64,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Agent {
    /// Creates an idle agent with a single task slot and no skills.
    pub fn new(id: impl Into<AgentId>, name: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            capability: AgentCapability {
                kind,
                skills: BTreeSet::new(),
                context: BTreeSet::new(),
                risk_level: RiskLevel::Low,
                governance_domains: Vec::new(),
                max_concurrent_tasks: 1,
                performance: Performance::default(),
            },
            status: AgentStatus::Idle,
            current_tasks: Vec::new(),
            total_tasks_completed: 0,
            metadata: HashMap::new(),
        }
    }

    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capability.skills = skills.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_context<I, S>(mut self, context: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capability.context = context.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capability.governance_domains = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_risk_level(mut self, level: RiskLevel) -> Self {
        self.capability.risk_level = level;
        self
    }

    /// Values below one are raised to one.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.capability.max_concurrent_tasks = max.max(1);
        self
    }

    pub fn with_performance(mut self, average_response_time_ms: f64, success_rate: f64) -> Self {
        self.capability.performance.average_response_time_ms = average_response_time_ms;
        self.capability.performance.success_rate = success_rate.clamp(0.0, 1.0);
        self
    }

    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.capability.max_concurrent_tasks
    }

    pub fn has_spare_capacity(&self) -> bool {
        self.current_tasks.len() < self.capability.max_concurrent_tasks
    }

    /// Share of capacity in use, as a percentage.
    pub fn utilization_pct(&self) -> f64 {
        let max = self.capability.max_concurrent_tasks;
        if max == 0 {
            return 100.0;
        }
        self.current_tasks.len() as f64 / max as f64 * 100.0
    }

    /// Idle, or busy with a free slot.
    pub fn is_available(&self) -> bool {
        match self.status {
            AgentStatus::Idle => true,
            AgentStatus::Busy => self.has_spare_capacity(),
            _ => false,
        }
    }
}

/// Category of requested work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Build,
    Test,
    Review,
    Refactor,
    Validate,
    Governance,
    Custom(String),
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Build => write!(f, "build"),
            TaskType::Test => write!(f, "test"),
            TaskType::Review => write!(f, "review"),
            TaskType::Refactor => write!(f, "refactor"),
            TaskType::Validate => write!(f, "validate"),
            TaskType::Governance => write!(f, "governance"),
            TaskType::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// What an agent needs to bring to take on a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskRequirements {
    #[serde(default)]
    pub skills: BTreeSet<String>,
    #[serde(default)]
    pub context: BTreeSet<String>,
    #[serde(default)]
    pub risk_level: RiskLevel,
    /// Stored for the caller's governance gate; the engine does not interpret it.
    #[serde(default)]
    pub governance_constraints: Vec<String>,
    /// Higher is more urgent.
    #[serde(default)]
    pub priority: i32,
}

/// Status of a task in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Running,
    Completed,
    Failed { reason: String },
    Blocked,
    Cancelled,
}

impl TaskStatus {
    /// Completed, failed and cancelled tasks never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed { .. } | TaskStatus::Cancelled
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Assigned => "assigned",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed { .. } => "failed",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A unit of requested work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    #[serde(default)]
    pub requirements: TaskRequirements,
    #[serde(default)]
    pub dependencies: Vec<TaskId>,
    pub status: TaskStatus,
    #[serde(default)]
    pub assigned_agent: Option<AgentId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, task_type: TaskType) -> Self {
        Self {
            id: id.into(),
            task_type,
            requirements: TaskRequirements::default(),
            dependencies: Vec::new(),
            status: TaskStatus::Pending,
            assigned_agent: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_dependencies<I, T>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TaskId>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requirements.skills = skills.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_context<I, S>(mut self, context: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requirements.context = context.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_risk_level(mut self, level: RiskLevel) -> Self {
        self.requirements.risk_level = level;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.requirements.priority = priority;
        self
    }

    pub fn with_requirements(mut self, requirements: TaskRequirements) -> Self {
        self.requirements = requirements;
        self
    }

    pub fn priority(&self) -> i32 {
        self.requirements.priority
    }
}

/// An agent scored against a set of task requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub agent_id: AgentId,
    /// Weighted score, 0 to 100 with the default weights.
    pub score: f64,
    pub reason: String,
}
