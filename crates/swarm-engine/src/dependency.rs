use std::collections::{BTreeSet, HashMap, HashSet};
use swarm_core::{SwarmError, SwarmResult, TaskId};

#[derive(Debug, Clone)]
struct DependencyNode {
    dependencies: Vec<TaskId>,
    dependents: BTreeSet<TaskId>,
    /// False for placeholders created only because another task referenced this id.
    declared: bool,
}

impl DependencyNode {
    fn placeholder() -> Self {
        Self {
            dependencies: Vec::new(),
            dependents: BTreeSet::new(),
            declared: false,
        }
    }
}

/// The task dependency graph.
///
/// Edges point from a task to the tasks it depends on. Nodes are visited in
/// insertion order so traversal results are deterministic.
#[derive(Debug, Default, Clone)]
pub struct DependencyAnalyzer {
    nodes: HashMap<TaskId, DependencyNode>,
    order: Vec<TaskId>,
}

impl DependencyAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    fn node_mut(&mut self, id: &TaskId) -> &mut DependencyNode {
        if !self.nodes.contains_key(id) {
            self.order.push(id.clone());
        }
        self.nodes
            .entry(id.clone())
            .or_insert_with(DependencyNode::placeholder)
    }

    /// Declare `id` with the given dependencies.
    ///
    /// Adding an id twice extends its dependency list. Unknown dependency ids get
    /// placeholder nodes so dangling references can be reported by [`blocked_tasks`].
    ///
    /// [`blocked_tasks`]: DependencyAnalyzer::blocked_tasks
    pub fn add_task(&mut self, id: &TaskId, deps: &[TaskId]) {
        let node = self.node_mut(id);
        node.declared = true;
        for dep in deps {
            if !node.dependencies.contains(dep) {
                node.dependencies.push(dep.clone());
            }
        }
        for dep in deps {
            self.node_mut(dep).dependents.insert(id.clone());
        }
    }

    /// Whether `id` was declared through [`add_task`](DependencyAnalyzer::add_task).
    pub fn contains(&self, id: &TaskId) -> bool {
        self.nodes.get(id).is_some_and(|n| n.declared)
    }

    pub fn dependencies(&self, id: &TaskId) -> &[TaskId] {
        self.nodes
            .get(id)
            .map(|n| n.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks that declared `id` as a dependency.
    pub fn dependents(&self, id: &TaskId) -> Vec<TaskId> {
        self.nodes
            .get(id)
            .map(|n| n.dependents.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Find one dependency cycle, if any.
    ///
    /// The returned path starts and ends on the same id, e.g. `[A, B, C, A]`.
    pub fn detect_cycles(&self) -> Option<Vec<TaskId>> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        let mut path = Vec::new();
        for id in &self.order {
            if !visited.contains(id) {
                if let Some(cycle) = self.dfs_cycle(id, &mut visited, &mut on_stack, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn dfs_cycle(
        &self,
        id: &TaskId,
        visited: &mut HashSet<TaskId>,
        on_stack: &mut HashSet<TaskId>,
        path: &mut Vec<TaskId>,
    ) -> Option<Vec<TaskId>> {
        if on_stack.contains(id) {
            return Some(close_cycle(path, id));
        }
        if !visited.insert(id.clone()) {
            return None;
        }
        on_stack.insert(id.clone());
        path.push(id.clone());

        for dep in self.dependencies(id) {
            if let Some(cycle) = self.dfs_cycle(dep, visited, on_stack, path) {
                return Some(cycle);
            }
        }

        path.pop();
        on_stack.remove(id);
        None
    }

    /// All declared tasks, each after everything it depends on.
    ///
    /// Placeholders for never-declared ids are left out. Fails with
    /// [`SwarmError::CyclicDependency`] when the graph has a cycle; use
    /// [`detect_cycles`](DependencyAnalyzer::detect_cycles) to probe first.
    pub fn execution_order(&self) -> SwarmResult<Vec<TaskId>> {
        let mut order = Vec::with_capacity(self.order.len());
        let mut done = HashSet::new();
        let mut in_progress = HashSet::new();
        let mut path = Vec::new();
        for id in &self.order {
            self.visit(id, &mut done, &mut in_progress, &mut path, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        id: &TaskId,
        done: &mut HashSet<TaskId>,
        in_progress: &mut HashSet<TaskId>,
        path: &mut Vec<TaskId>,
        order: &mut Vec<TaskId>,
    ) -> SwarmResult<()> {
        if done.contains(id) {
            return Ok(());
        }
        if in_progress.contains(id) {
            return Err(SwarmError::CyclicDependency {
                cycle: close_cycle(path, id),
            });
        }
        in_progress.insert(id.clone());
        path.push(id.clone());

        for dep in self.dependencies(id) {
            self.visit(dep, done, in_progress, path, order)?;
        }

        path.pop();
        in_progress.remove(id);
        done.insert(id.clone());
        if self.contains(id) {
            order.push(id.clone());
        }
        Ok(())
    }

    /// True when `id` is declared and every one of its dependencies is in `completed`.
    pub fn can_execute(&self, id: &TaskId, completed: &HashSet<TaskId>) -> bool {
        match self.nodes.get(id) {
            Some(node) if node.declared => node.dependencies.iter().all(|d| completed.contains(d)),
            _ => false,
        }
    }

    /// Dependencies of `id` that were referenced but never declared.
    pub fn missing_dependencies(&self, id: &TaskId) -> Vec<TaskId> {
        self.dependencies(id)
            .iter()
            .filter(|d| !self.contains(d))
            .cloned()
            .collect()
    }

    /// Declared tasks with at least one dependency that was never declared.
    ///
    /// These cannot become ready until the missing task is submitted, as opposed
    /// to tasks that are merely waiting for their dependencies to complete.
    pub fn blocked_tasks(&self) -> Vec<TaskId> {
        self.order
            .iter()
            .filter(|id| self.contains(id))
            .filter(|id| self.dependencies(id).iter().any(|d| !self.contains(d)))
            .cloned()
            .collect()
    }

    /// Number of declared tasks.
    pub fn len(&self) -> usize {
        self.nodes.values().filter(|n| n.declared).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn close_cycle(path: &[TaskId], repeated: &TaskId) -> Vec<TaskId> {
    let start = path.iter().position(|p| p == repeated).unwrap_or(0);
    let mut cycle = path[start..].to_vec();
    cycle.push(repeated.clone());
    cycle
}
