use crate::types::{Task, TaskStatus};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use swarm_core::{AgentId, SwarmError, SwarmResult, TaskId};

/// Owns task lifecycle state and assignment bookkeeping.
///
/// ```text
/// pending ──assign──> assigned ──start──> running ──> completed | failed
///    │  ↑
///  block unblock            cancel: any non-terminal ──> cancelled
///    ↓  │
/// blocked
/// ```
#[derive(Debug, Default, Clone)]
pub struct TaskDistributor {
    tasks: HashMap<TaskId, Task>,
    order: Vec<TaskId>,
    completed: HashSet<TaskId>,
}

impl TaskDistributor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task to the distributor. Its status is forced to `Pending`.
    ///
    /// Resubmitting an id replaces the previous task but keeps its position.
    pub fn submit(&mut self, mut task: Task) -> TaskId {
        task.status = TaskStatus::Pending;
        task.assigned_agent = None;
        task.started_at = None;
        task.completed_at = None;

        let id = task.id.clone();
        if !self.tasks.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.completed.remove(&id);
        self.tasks.insert(id.clone(), task);
        id
    }

    fn task_mut(&mut self, id: &TaskId) -> SwarmResult<&mut Task> {
        self.tasks
            .get_mut(id)
            .ok_or_else(|| SwarmError::TaskNotFound(id.clone()))
    }

    /// Record that `agent` will run `id`. Only pending tasks can be assigned.
    pub fn assign(&mut self, id: &TaskId, agent: &AgentId) -> SwarmResult<()> {
        let task = self.task_mut(id)?;
        if task.status != TaskStatus::Pending {
            return Err(invalid(task, "assigned"));
        }
        task.assigned_agent = Some(agent.clone());
        task.status = TaskStatus::Assigned;
        Ok(())
    }

    /// Move an assigned, not yet started task to a different agent.
    /// Returns the previous agent.
    pub fn reassign(&mut self, id: &TaskId, agent: &AgentId) -> SwarmResult<Option<AgentId>> {
        let task = self.task_mut(id)?;
        if task.status != TaskStatus::Assigned {
            return Err(invalid(task, "assigned"));
        }
        Ok(task.assigned_agent.replace(agent.clone()))
    }

    /// Return an assigned, not yet started task to pending. Returns the agent it was taken from.
    pub fn release(&mut self, id: &TaskId) -> SwarmResult<Option<AgentId>> {
        let task = self.task_mut(id)?;
        if task.status != TaskStatus::Assigned {
            return Err(invalid(task, "pending"));
        }
        task.status = TaskStatus::Pending;
        Ok(task.assigned_agent.take())
    }

    fn dependencies_met(&self, task: &Task) -> bool {
        task.dependencies.iter().all(|d| self.completed.contains(d))
    }

    /// Start every assigned task whose dependencies are all completed.
    ///
    /// Returns the started tasks in submission order.
    pub fn distribute_ready(&mut self) -> Vec<TaskId> {
        let ready: Vec<TaskId> = self
            .order
            .iter()
            .filter_map(|id| self.tasks.get(id))
            .filter(|t| t.status == TaskStatus::Assigned && self.dependencies_met(t))
            .map(|t| t.id.clone())
            .collect();

        let now = Utc::now();
        for id in &ready {
            if let Some(task) = self.tasks.get_mut(id) {
                task.status = TaskStatus::Running;
                task.started_at = Some(now);
            }
        }
        ready
    }

    /// Start one assigned task. Fails if any dependency has not completed.
    pub fn start(&mut self, id: &TaskId) -> SwarmResult<()> {
        let task = self
            .tasks
            .get(id)
            .ok_or_else(|| SwarmError::TaskNotFound(id.clone()))?;
        if task.status != TaskStatus::Assigned || !self.dependencies_met(task) {
            return Err(invalid(task, "running"));
        }
        let task = self.task_mut(id)?;
        task.status = TaskStatus::Running;
        task.started_at = Some(Utc::now());
        Ok(())
    }

    /// Mark a running task completed. Returns the agent that ran it.
    pub fn complete(&mut self, id: &TaskId) -> SwarmResult<Option<AgentId>> {
        let task = self.task_mut(id)?;
        if task.status != TaskStatus::Running {
            return Err(invalid(task, "completed"));
        }
        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now());
        let agent = task.assigned_agent.clone();
        self.completed.insert(id.clone());
        Ok(agent)
    }

    /// Mark an assigned or running task failed. Returns the agent that held it.
    pub fn fail(&mut self, id: &TaskId, reason: impl Into<String>) -> SwarmResult<Option<AgentId>> {
        let task = self.task_mut(id)?;
        if !matches!(task.status, TaskStatus::Assigned | TaskStatus::Running) {
            return Err(invalid(task, "failed"));
        }
        task.status = TaskStatus::Failed {
            reason: reason.into(),
        };
        task.completed_at = Some(Utc::now());
        Ok(task.assigned_agent.clone())
    }

    /// Park a pending task whose dependencies can never be satisfied as things stand.
    pub fn mark_blocked(&mut self, id: &TaskId) -> SwarmResult<()> {
        let task = self.task_mut(id)?;
        if task.status != TaskStatus::Pending {
            return Err(invalid(task, "blocked"));
        }
        task.status = TaskStatus::Blocked;
        Ok(())
    }

    /// Return a blocked task to pending.
    pub fn unblock(&mut self, id: &TaskId) -> SwarmResult<()> {
        let task = self.task_mut(id)?;
        if task.status != TaskStatus::Blocked {
            return Err(invalid(task, "pending"));
        }
        task.status = TaskStatus::Pending;
        Ok(())
    }

    /// Cancel a task that has not reached a terminal state.
    ///
    /// Returns the agent the task was assigned to, if any. The agent's capacity
    /// is not released here.
    pub fn cancel(&mut self, id: &TaskId) -> SwarmResult<Option<AgentId>> {
        let task = self.task_mut(id)?;
        if task.status.is_terminal() {
            return Err(invalid(task, "cancelled"));
        }
        task.status = TaskStatus::Cancelled;
        task.completed_at = Some(Utc::now());
        Ok(task.assigned_agent.clone())
    }

    pub fn status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.tasks.get(id).map(|t| t.status.clone())
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    /// All tasks, in submission order.
    pub fn all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    /// Tasks with the given status, in submission order.
    pub fn with_status(&self, status: &TaskStatus) -> Vec<&Task> {
        self.all_tasks().filter(|t| &t.status == status).collect()
    }

    pub fn completed_ids(&self) -> &HashSet<TaskId> {
        &self.completed
    }

    pub fn count_by(&self, pred: impl Fn(&TaskStatus) -> bool) -> usize {
        self.tasks.values().filter(|t| pred(&t.status)).count()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Every task has reached a terminal state.
    pub fn is_done(&self) -> bool {
        self.tasks.values().all(|t| t.status.is_terminal())
    }
}

fn invalid(task: &Task, to: &str) -> SwarmError {
    SwarmError::InvalidTransition {
        task: task.id.clone(),
        from: task.status.name().to_string(),
        to: to.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::types::TaskType;

    fn submit(dist: &mut TaskDistributor, id: &str, deps: &[&str]) -> TaskId {
        dist.submit(Task::new(id, TaskType::Build).with_dependencies(deps.iter().copied()))
    }

    #[test]
    fn test_empty_distributor() {
        let dist = TaskDistributor::new();
        assert!(dist.is_empty());
        assert!(dist.is_done());
        assert!(dist.status(&"T1".into()).is_none());
    }

    #[test]
    fn test_submit_forces_pending() {
        let mut dist = TaskDistributor::new();
        let mut task = Task::new("T1", TaskType::Test);
        task.status = TaskStatus::Running;
        task.assigned_agent = Some("a".into());
        let id = dist.submit(task);
        assert_eq!(dist.status(&id), Some(TaskStatus::Pending));
        assert!(dist.get(&id).unwrap().assigned_agent.is_none());
    }

    #[test]
    fn test_full_lifecycle() {
        let mut dist = TaskDistributor::new();
        let id = submit(&mut dist, "T1", &[]);
        let agent = AgentId::from("a");

        dist.assign(&id, &agent).unwrap();
        assert_eq!(dist.status(&id), Some(TaskStatus::Assigned));
        assert_eq!(dist.get(&id).unwrap().assigned_agent, Some(agent.clone()));

        assert_eq!(dist.distribute_ready(), vec![id.clone()]);
        assert_eq!(dist.status(&id), Some(TaskStatus::Running));
        assert!(dist.get(&id).unwrap().started_at.is_some());

        assert_eq!(dist.complete(&id).unwrap(), Some(agent));
        assert_eq!(dist.status(&id), Some(TaskStatus::Completed));
        assert!(dist.completed_ids().contains(&id));
        assert!(dist.is_done());
    }

    #[test]
    fn test_distribute_ready_waits_for_dependencies() {
        let mut dist = TaskDistributor::new();
        let t1 = submit(&mut dist, "T1", &[]);
        let t2 = submit(&mut dist, "T2", &["T1"]);
        let agent = AgentId::from("a");
        dist.assign(&t1, &agent).unwrap();
        dist.assign(&t2, &agent).unwrap();

        assert_eq!(dist.distribute_ready(), vec![t1.clone()]);
        assert_eq!(dist.status(&t2), Some(TaskStatus::Assigned));
        assert!(dist.start(&t2).is_err());

        dist.complete(&t1).unwrap();
        assert_eq!(dist.distribute_ready(), vec![t2.clone()]);
    }

    #[test]
    fn test_assign_unknown_task() {
        let mut dist = TaskDistributor::new();
        let err = dist.assign(&"ghost".into(), &"a".into()).unwrap_err();
        assert!(matches!(err, SwarmError::TaskNotFound(_)));
    }

    #[test]
    fn test_assign_twice_rejected() {
        let mut dist = TaskDistributor::new();
        let id = submit(&mut dist, "T1", &[]);
        dist.assign(&id, &"a".into()).unwrap();
        let err = dist.assign(&id, &"b".into()).unwrap_err();
        assert!(matches!(err, SwarmError::InvalidTransition { .. }));
    }

    #[test]
    fn test_reassign() {
        let mut dist = TaskDistributor::new();
        let id = submit(&mut dist, "T1", &[]);
        assert!(dist.reassign(&id, &"b".into()).is_err());
        dist.assign(&id, &"a".into()).unwrap();
        assert_eq!(dist.reassign(&id, &"b".into()).unwrap(), Some("a".into()));
        assert_eq!(dist.get(&id).unwrap().assigned_agent, Some("b".into()));
    }

    #[test]
    fn test_release_returns_task_to_pending() {
        let mut dist = TaskDistributor::new();
        let id = submit(&mut dist, "T1", &[]);
        assert!(dist.release(&id).is_err());
        dist.assign(&id, &"a".into()).unwrap();
        assert_eq!(dist.release(&id).unwrap(), Some("a".into()));
        assert_eq!(dist.status(&id), Some(TaskStatus::Pending));
        assert!(dist.get(&id).unwrap().assigned_agent.is_none());
    }

    #[test]
    fn test_fail_requires_assignment() {
        let mut dist = TaskDistributor::new();
        let id = submit(&mut dist, "T1", &[]);
        assert!(dist.fail(&id, "boom").is_err());
        dist.assign(&id, &"a".into()).unwrap();
        dist.fail(&id, "boom").unwrap();
        assert!(matches!(dist.status(&id), Some(TaskStatus::Failed { .. })));
        assert!(!dist.completed_ids().contains(&id));
    }

    #[test]
    fn test_complete_requires_running() {
        let mut dist = TaskDistributor::new();
        let id = submit(&mut dist, "T1", &[]);
        let err = dist.complete(&id).unwrap_err();
        assert!(err.to_string().contains("from pending to completed"));
    }

    #[test]
    fn test_block_and_unblock() {
        let mut dist = TaskDistributor::new();
        let id = submit(&mut dist, "T1", &["ghost"]);
        dist.mark_blocked(&id).unwrap();
        assert_eq!(dist.status(&id), Some(TaskStatus::Blocked));
        assert!(dist.assign(&id, &"a".into()).is_err());
        dist.unblock(&id).unwrap();
        assert_eq!(dist.status(&id), Some(TaskStatus::Pending));
    }

    #[test]
    fn test_cancel_non_terminal() {
        let mut dist = TaskDistributor::new();
        let id = submit(&mut dist, "T1", &[]);
        dist.assign(&id, &"a".into()).unwrap();
        assert_eq!(dist.cancel(&id).unwrap(), Some("a".into()));
        assert_eq!(dist.status(&id), Some(TaskStatus::Cancelled));
    }

    #[test]
    fn test_terminal_tasks_are_cancel_immune() {
        let mut dist = TaskDistributor::new();
        let id = submit(&mut dist, "T1", &[]);
        dist.assign(&id, &"a".into()).unwrap();
        dist.start(&id).unwrap();
        dist.complete(&id).unwrap();

        let err = dist.cancel(&id).unwrap_err();
        assert!(matches!(err, SwarmError::InvalidTransition { .. }));
        assert_eq!(dist.status(&id), Some(TaskStatus::Completed));

        let again = dist.cancel(&"ghost".into()).unwrap_err();
        assert!(matches!(again, SwarmError::TaskNotFound(_)));
    }

    #[test]
    fn test_with_status_and_counts() {
        let mut dist = TaskDistributor::new();
        submit(&mut dist, "T1", &[]);
        let t2 = submit(&mut dist, "T2", &[]);
        dist.assign(&t2, &"a".into()).unwrap();
        assert_eq!(dist.with_status(&TaskStatus::Pending).len(), 1);
        assert_eq!(dist.count_by(|s| *s == TaskStatus::Assigned), 1);
        assert!(!dist.is_done());
    }
}
