//! Task ranking.

use std::collections::HashMap;

use log::debug;

use crate::capacity::SiteCapacityModel;
use crate::error::{HeftError, Result};
use crate::graph::TaskGraph;
use crate::task::{Task, TaskId};

/// Average compute times and downward ranks of the graph tasks.
///
/// Both maps are filled by separate passes, the synthetic root has an average compute time of zero.
#[derive(Clone, Debug, Default)]
pub struct Ranks {
    avg_compute_time: HashMap<TaskId, f64>,
    downward_rank: HashMap<TaskId, f64>,
}

impl Ranks {
    pub fn avg_compute_time(&self, task_id: TaskId) -> Option<f64> {
        self.avg_compute_time.get(&task_id).copied()
    }

    pub fn downward_rank(&self, task_id: TaskId) -> Option<f64> {
        self.downward_rank.get(&task_id).copied()
    }
}

pub struct RankCalculator<'a> {
    capacity: &'a SiteCapacityModel<'a>,
    communication_cost: f64,
}

impl<'a> RankCalculator<'a> {
    pub fn new(capacity: &'a SiteCapacityModel<'a>, communication_cost: f64) -> Self {
        Self {
            capacity,
            communication_cost,
        }
    }

    /// Returns expected runtime of the task averaged over candidate sites and weighted by their processor counts.
    pub fn average_compute_time(&self, task: &Task, candidate_sites: &[String]) -> Result<f64> {
        if candidate_sites.is_empty() {
            return Err(HeftError::NoCandidateSite(task.name.clone()));
        }
        let mut total_nodes = 0.;
        let mut total = 0.;
        for site in candidate_sites {
            let nodes = self.capacity.processor_count(site) as f64;
            total += self.capacity.expected_duration(task, site)? as f64 * nodes;
            total_nodes += nodes;
        }
        Ok(total / total_nodes)
    }

    /// Computes average compute times of all real tasks of the graph.
    pub fn compute_average_times(
        &self,
        graph: &TaskGraph,
        candidate_sites: &HashMap<TaskId, Vec<String>>,
        ranks: &mut Ranks,
    ) -> Result<()> {
        for task_id in graph.task_ids().filter(|&id| !graph.is_synthetic_root(id)) {
            let task = graph
                .get_task(task_id)
                .ok_or_else(|| HeftError::InvalidGraph(format!("unknown task {}", task_id)))?;
            let sites = candidate_sites
                .get(&task_id)
                .ok_or_else(|| HeftError::NoCandidateSite(task.name.clone()))?;
            let avg = self.average_compute_time(task, sites)?;
            debug!("average compute time {} is {}", task.name, avg);
            ranks.avg_compute_time.insert(task_id, avg);
        }
        Ok(())
    }

    /// Returns downward rank of the task given the ranks of its parents.
    ///
    /// `rank(t) = max over parents p of (rank(p) + avg_compute_time(p) + communication_cost)`, zero for the root.
    pub fn downward_rank(&self, graph: &TaskGraph, task_id: TaskId, ranks: &Ranks) -> Result<f64> {
        let mut result = 0.;
        for parent in graph.parents(task_id) {
            let parent_rank = ranks.downward_rank(parent).ok_or_else(|| {
                HeftError::InvalidGraph(format!("rank of task {} requested before its parent {}", task_id, parent))
            })?;
            let parent_avg = if graph.is_synthetic_root(parent) {
                0.
            } else {
                ranks.avg_compute_time(parent).ok_or_else(|| {
                    HeftError::InvalidGraph(format!("no average compute time for task {}", parent))
                })?
            };
            result = f64::max(result, parent_rank + parent_avg + self.communication_cost);
        }
        Ok(result)
    }

    /// Traverses the graph breadth-first from the synthetic root computing downward ranks.
    ///
    /// Returns the visited tasks except the root in traversal order.
    pub fn compute_downward_ranks(&self, graph: &TaskGraph, ranks: &mut Ranks) -> Result<Vec<TaskId>> {
        let root = graph
            .synthetic_root()
            .ok_or_else(|| HeftError::InvalidGraph("synthetic root is not inserted".to_string()))?;
        let mut order = graph.breadth_first_order();
        match order.next() {
            Some(first) if first == root => {}
            _ => {
                return Err(HeftError::InvalidGraph(
                    "traversal does not start at the synthetic root".to_string(),
                ))
            }
        }
        ranks.downward_rank.insert(root, 0.);

        let mut visited = Vec::with_capacity(graph.task_count().saturating_sub(1));
        for task_id in order {
            let rank = self.downward_rank(graph, task_id, ranks)?;
            debug!("downward rank for task {} is {}", task_id, rank);
            ranks.downward_rank.insert(task_id, rank);
            visited.push(task_id);
        }
        if visited.len() + 1 != graph.task_count() {
            return Err(HeftError::InvalidGraph(format!(
                "only {} of {} tasks are reachable from the root, the graph has a cycle",
                visited.len(),
                graph.task_count() - 1
            )));
        }
        Ok(visited)
    }
}
