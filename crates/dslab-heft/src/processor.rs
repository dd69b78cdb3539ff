//! Processor timelines of a site.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::{HeftError, Result};
use crate::task::TaskId;

/// Busy interval `[start_time, end_time)` of a processor.
#[derive(Clone, Debug, Serialize)]
pub struct ScheduledTask {
    pub start_time: f64,
    pub end_time: f64,
    pub task: TaskId,
}

impl ScheduledTask {
    pub fn new(start_time: f64, end_time: f64, task: TaskId) -> ScheduledTask {
        ScheduledTask {
            start_time,
            end_time,
            task,
        }
    }
}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start_time
            .total_cmp(&other.start_time)
            .then(self.end_time.total_cmp(&other.end_time))
            .then(self.task.cmp(&other.task))
    }
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScheduledTask {}

/// Single execution slot of a site.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Processor {
    schedule: BTreeSet<ScheduledTask>,
}

impl Processor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the earliest time not before `ready_time` after the last busy interval.
    pub fn available_time(&self, ready_time: f64) -> f64 {
        match self.schedule.iter().next_back() {
            Some(last) => ready_time.max(last.end_time),
            None => ready_time,
        }
    }

    pub fn busy_until(&self) -> f64 {
        self.schedule.iter().next_back().map_or(0., |last| last.end_time)
    }

    pub fn schedule(&self) -> impl Iterator<Item = &ScheduledTask> {
        self.schedule.iter()
    }

    fn append(&mut self, interval: ScheduledTask) {
        self.schedule.insert(interval);
    }
}

#[derive(Clone, Copy, Debug)]
struct TentativeSelection {
    processor: usize,
    start_time: f64,
}

/// Processors of one site, instantiated lazily up to the site capacity.
///
/// Uses the non-insertion policy: a new interval always goes after the last interval of a processor.
#[derive(Clone, Debug, Serialize)]
pub struct ProcessorPool {
    site: String,
    capacity: u32,
    processors: Vec<Processor>,
    #[serde(skip)]
    tentative: Option<TentativeSelection>,
}

impl ProcessorPool {
    pub fn new(site: &str, capacity: u32) -> Self {
        Self {
            site: site.to_string(),
            capacity,
            processors: Vec::new(),
            tentative: None,
        }
    }

    pub fn site(&self) -> &str {
        &self.site
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn processors(&self) -> &[Processor] {
        &self.processors
    }

    /// Finds the earliest time not before `ready_time` when some processor is free and tentatively selects it.
    ///
    /// A new processor is preferred over waiting for a busy one while the pool is below capacity.
    /// Returns the start time and the index of the selected processor.
    pub fn earliest_available_time(&mut self, ready_time: f64) -> Result<(f64, usize)> {
        let mut best: Option<(f64, usize)> = None;
        for (index, processor) in self.processors.iter().enumerate() {
            let time = processor.available_time(ready_time);
            if best.map_or(true, |(best_time, _)| time < best_time) {
                best = Some((time, index));
            }
        }
        let can_grow = (self.processors.len() as u32) < self.capacity;
        let selection = match best {
            Some((time, _)) if time > ready_time && can_grow => (ready_time, self.processors.len()),
            None if can_grow => (ready_time, self.processors.len()),
            Some(selection) if selection.0.is_finite() => selection,
            _ => {
                self.tentative = None;
                return Err(HeftError::SiteExhausted(self.site.clone()));
            }
        };
        self.tentative = Some(TentativeSelection {
            processor: selection.1,
            start_time: selection.0,
        });
        Ok(selection)
    }

    /// Appends interval to the processor selected by the preceding
    /// [`earliest_available_time`](Self::earliest_available_time) call.
    pub fn commit(&mut self, processor: usize, start_time: f64, end_time: f64, task: TaskId) -> Result<()> {
        let tentative = match self.tentative.take() {
            Some(tentative) if tentative.processor == processor && start_time >= tentative.start_time => tentative,
            _ => {
                return Err(HeftError::NoTentativeSelection {
                    site: self.site.clone(),
                    processor,
                })
            }
        };
        if tentative.processor == self.processors.len() {
            self.processors.push(Processor::new());
        }
        self.processors[tentative.processor].append(ScheduledTask::new(start_time, end_time, task));
        Ok(())
    }
}
