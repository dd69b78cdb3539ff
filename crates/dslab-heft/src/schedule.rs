//! Scheduling result.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::{HeftError, Result};
use crate::processor::ProcessorPool;
use crate::rank::Ranks;
use crate::task::TaskId;

/// Site and estimated execution interval assigned to a task.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScheduleDecision {
    pub task_name: String,
    pub site: String,
    pub processor: usize,
    pub start_time: f64,
    pub finish_time: f64,
}

/// Result of scheduling one workflow.
#[derive(Clone, Debug, Serialize)]
pub struct ScheduleResult {
    label: String,
    decisions: IndexMap<TaskId, ScheduleDecision>,
    leaves: Vec<TaskId>,
    pools: IndexMap<String, ProcessorPool>,
    #[serde(skip)]
    ranks: Ranks,
}

impl ScheduleResult {
    pub(crate) fn new(
        label: &str,
        decisions: IndexMap<TaskId, ScheduleDecision>,
        leaves: Vec<TaskId>,
        pools: IndexMap<String, ProcessorPool>,
        ranks: Ranks,
    ) -> Self {
        Self {
            label: label.to_string(),
            decisions,
            leaves,
            pools,
            ranks,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn decision(&self, task_id: TaskId) -> Option<&ScheduleDecision> {
        self.decisions.get(&task_id)
    }

    /// Returns decisions in the order the tasks were scheduled.
    pub fn decisions(&self) -> &IndexMap<TaskId, ScheduleDecision> {
        &self.decisions
    }

    pub fn site_of(&self, task_id: TaskId) -> Option<&str> {
        self.decisions.get(&task_id).map(|d| d.site.as_str())
    }

    /// Returns processor timelines of every site that got at least one query.
    pub fn pools(&self) -> &IndexMap<String, ProcessorPool> {
        &self.pools
    }

    /// Returns average compute times and downward ranks the schedule was built from.
    pub fn ranks(&self) -> &Ranks {
        &self.ranks
    }

    /// Returns the maximum finish time over the workflow leaves.
    pub fn makespan(&self) -> Result<f64> {
        let mut result = 0.;
        for &leaf in self.leaves.iter() {
            let decision = self.decisions.get(&leaf).ok_or(HeftError::UnscheduledLeaf(leaf))?;
            result = f64::max(result, decision.finish_time);
        }
        Ok(result)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| HeftError::Io(e.into()))
    }

    /// Saves the schedule as JSON.
    pub fn save_to_file<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let mut file = File::create(file)?;
        file.write_all(self.to_json()?.as_bytes())?;
        Ok(())
    }
}
