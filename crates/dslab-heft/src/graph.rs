//! Workflow task graph.

use std::collections::{BTreeSet, HashMap, VecDeque};

use indexmap::IndexMap;

use crate::error::{HeftError, Result};
use crate::task::*;

/// Name of the synthetic root task.
pub const SYNTHETIC_ROOT_NAME: &str = "dummy";

/// Task together with its dependencies.
#[derive(Clone, Debug)]
pub struct TaskNode {
    pub task: Task,
    pub(crate) parents: BTreeSet<TaskId>,
    pub(crate) children: BTreeSet<TaskId>,
}

impl TaskNode {
    fn new(task: Task) -> Self {
        Self {
            task,
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
        }
    }

    pub fn parents(&self) -> &BTreeSet<TaskId> {
        &self.parents
    }

    pub fn children(&self) -> &BTreeSet<TaskId> {
        &self.children
    }
}

/// Directed acyclic graph of workflow tasks.
///
/// Task ids are never reused, so removing a task does not invalidate ids of the remaining tasks.
/// The graph does not check for cycles, the caller is responsible for passing a DAG.
#[derive(Clone, Debug, Default)]
pub struct TaskGraph {
    nodes: IndexMap<TaskId, TaskNode>,
    next_id: TaskId,
    synthetic_root: Option<TaskId>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&mut self, task: Task) -> TaskId {
        let task_id = self.next_id;
        self.next_id += 1;
        self.nodes.insert(task_id, TaskNode::new(task));
        task_id
    }

    /// Adds dependency `parent -> child`.
    pub fn add_edge(&mut self, parent: TaskId, child: TaskId) -> Result<()> {
        if parent == child {
            return Err(HeftError::InvalidGraph(format!("self-dependency of task {}", parent)));
        }
        for task_id in [parent, child] {
            if !self.nodes.contains_key(&task_id) {
                return Err(HeftError::InvalidGraph(format!("unknown task {}", task_id)));
            }
        }
        self.nodes[&parent].children.insert(child);
        self.nodes[&child].parents.insert(parent);
        Ok(())
    }

    pub fn get_task(&self, task_id: TaskId) -> Option<&Task> {
        self.nodes.get(&task_id).map(|node| &node.task)
    }

    pub fn get_node(&self, task_id: TaskId) -> Option<&TaskNode> {
        self.nodes.get(&task_id)
    }

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.nodes.contains_key(&task_id)
    }

    /// Returns ids of all tasks in insertion order.
    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn task_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn parents(&self, task_id: TaskId) -> impl Iterator<Item = TaskId> + '_ {
        self.nodes.get(&task_id).into_iter().flat_map(|node| node.parents.iter().copied())
    }

    pub fn children(&self, task_id: TaskId) -> impl Iterator<Item = TaskId> + '_ {
        self.nodes.get(&task_id).into_iter().flat_map(|node| node.children.iter().copied())
    }

    /// Returns tasks without parents.
    pub fn roots(&self) -> Vec<TaskId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.parents.is_empty())
            .map(|(&id, _)| id)
            .collect()
    }

    /// Returns tasks without children.
    pub fn leaves(&self) -> Vec<TaskId> {
        self.nodes
            .iter()
            .filter(|(_, node)| node.children.is_empty())
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn synthetic_root(&self) -> Option<TaskId> {
        self.synthetic_root
    }

    pub fn is_synthetic_root(&self, task_id: TaskId) -> bool {
        self.synthetic_root == Some(task_id)
    }

    /// Adds a zero-cost task which becomes the only parent of all current roots.
    pub fn insert_synthetic_root(&mut self) -> Result<TaskId> {
        if let Some(root) = self.synthetic_root {
            return Err(HeftError::InvalidGraph(format!("synthetic root {} is already inserted", root)));
        }
        let roots = self.roots();
        let root = self.add_task(Task::new(
            SYNTHETIC_ROOT_NAME,
            Transformation::new(SYNTHETIC_ROOT_NAME, SYNTHETIC_ROOT_NAME, SYNTHETIC_ROOT_NAME),
        ));
        for task_id in roots {
            self.add_edge(root, task_id)?;
        }
        self.synthetic_root = Some(root);
        Ok(root)
    }

    /// Removes task and all its dependencies.
    pub fn remove_task(&mut self, task_id: TaskId) -> Result<Task> {
        let node = self
            .nodes
            .shift_remove(&task_id)
            .ok_or_else(|| HeftError::InvalidGraph(format!("unknown task {}", task_id)))?;
        for parent in node.parents.iter() {
            self.nodes[parent].children.remove(&task_id);
        }
        for child in node.children.iter() {
            self.nodes[child].parents.remove(&task_id);
        }
        if self.synthetic_root == Some(task_id) {
            self.synthetic_root = None;
        }
        Ok(node.task)
    }

    /// Returns an iterator visiting every task after all of its parents, starting from the roots
    /// (or from the synthetic root if it is inserted).
    pub fn breadth_first_order(&self) -> BreadthFirstIter<'_> {
        BreadthFirstIter::new(self)
    }
}

/// Breadth-first traversal of a [`TaskGraph`] respecting dependencies.
pub struct BreadthFirstIter<'a> {
    graph: &'a TaskGraph,
    queue: VecDeque<TaskId>,
    pending_parents: HashMap<TaskId, usize>,
}

impl<'a> BreadthFirstIter<'a> {
    fn new(graph: &'a TaskGraph) -> Self {
        let pending_parents = graph
            .nodes
            .iter()
            .filter(|(_, node)| !node.parents.is_empty())
            .map(|(&id, node)| (id, node.parents.len()))
            .collect();
        Self {
            graph,
            queue: graph.roots().into_iter().collect(),
            pending_parents,
        }
    }
}

impl Iterator for BreadthFirstIter<'_> {
    type Item = TaskId;

    fn next(&mut self) -> Option<TaskId> {
        let task_id = self.queue.pop_front()?;
        for &child in self.graph.nodes[&task_id].children.iter() {
            if let Some(pending) = self.pending_parents.get_mut(&child) {
                *pending -= 1;
                if *pending == 0 {
                    self.pending_parents.remove(&child);
                    self.queue.push_back(child);
                }
            }
        }
        Some(task_id)
    }
}
