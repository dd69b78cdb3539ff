//! HEFT site selector.

use std::collections::HashMap;

use indexmap::IndexMap;
use log::{debug, info};

use crate::capacity::SiteCapacityModel;
use crate::catalog::{NoRuntimeEstimator, RuntimeEstimator, SiteCatalog, TransformationCatalog};
use crate::config::{HeftConfig, SchedulerParams};
use crate::error::{HeftError, Result};
use crate::graph::TaskGraph;
use crate::processor::ProcessorPool;
use crate::rank::{RankCalculator, Ranks};
use crate::schedule::{ScheduleDecision, ScheduleResult};
use crate::task::TaskId;

/// Best placement of a task found so far.
struct Placement {
    site: String,
    processor: usize,
    start_time: f64,
    finish_time: f64,
}

/// Maps workflow tasks to sites with HEFT.
///
/// Differs from the algorithm in the HEFT paper in two ways: tasks are ordered by ascending downward rank, and a task is
/// always appended after the last busy interval of a processor (no insertion into earlier gaps).
pub struct HeftScheduler<'a> {
    config: HeftConfig,
    site_catalog: &'a dyn SiteCatalog,
    transformation_catalog: &'a dyn TransformationCatalog,
    estimator: Box<dyn RuntimeEstimator + 'a>,
}

impl<'a> HeftScheduler<'a> {
    pub fn new(site_catalog: &'a dyn SiteCatalog, transformation_catalog: &'a dyn TransformationCatalog) -> Self {
        Self {
            config: HeftConfig::default(),
            site_catalog,
            transformation_catalog,
            estimator: Box::new(NoRuntimeEstimator),
        }
    }

    pub fn from_scheduler_params(
        params: &SchedulerParams,
        site_catalog: &'a dyn SiteCatalog,
        transformation_catalog: &'a dyn TransformationCatalog,
    ) -> Result<Self> {
        Ok(Self::new(site_catalog, transformation_catalog).with_config(HeftConfig::from_params(params)?))
    }

    pub fn with_config(mut self, config: HeftConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_runtime_estimator(mut self, estimator: Box<dyn RuntimeEstimator + 'a>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn config(&self) -> &HeftConfig {
        &self.config
    }

    pub fn description(&self) -> &'static str {
        "Heft based Site Selector"
    }

    /// Schedules the workflow on the given candidate sites.
    ///
    /// The graph gets a synthetic root for the duration of the call, it is removed before returning
    /// (also on error).
    pub fn schedule(&self, graph: &mut TaskGraph, sites: &[String], label: &str) -> Result<ScheduleResult> {
        if let Some(root) = graph.synthetic_root() {
            return Err(HeftError::InvalidGraph(format!("graph already has synthetic root {}", root)));
        }
        debug!("scheduling workflow {} with {} tasks on sites {:?}", label, graph.task_count(), sites);
        let capacity = SiteCapacityModel::new(
            sites,
            self.site_catalog,
            self.transformation_catalog,
            self.estimator.as_ref(),
            &self.config,
        );

        let mut candidate_sites = HashMap::new();
        for task_id in graph.task_ids() {
            if let Some(task) = graph.get_task(task_id) {
                let runnable = capacity.candidate_sites(task, sites)?;
                debug!("runnable sites for task {} {:?}", task.name, runnable);
                candidate_sites.insert(task_id, runnable);
            }
        }

        let calculator = RankCalculator::new(&capacity, self.config.communication_cost());
        let mut ranks = Ranks::default();
        calculator.compute_average_times(graph, &candidate_sites, &mut ranks)?;

        let root = graph.insert_synthetic_root()?;
        let decisions = self.schedule_from_root(graph, &calculator, &capacity, &candidate_sites, &mut ranks);
        graph.remove_task(root)?;
        let (decisions, pools) = decisions?;

        let result = ScheduleResult::new(label, decisions, graph.leaves(), pools, ranks);
        info!("expected makespan: {:.3}", result.makespan()?);
        Ok(result)
    }

    fn schedule_from_root(
        &self,
        graph: &TaskGraph,
        calculator: &RankCalculator,
        capacity: &SiteCapacityModel,
        candidate_sites: &HashMap<TaskId, Vec<String>>,
        ranks: &mut Ranks,
    ) -> Result<(IndexMap<TaskId, ScheduleDecision>, IndexMap<String, ProcessorPool>)> {
        let mut tasks = calculator.compute_downward_ranks(graph, ranks)?;
        // stable sort keeps traversal order for equal ranks
        tasks.sort_by(|&a, &b| {
            let rank_a = ranks.downward_rank(a).unwrap_or(0.);
            let rank_b = ranks.downward_rank(b).unwrap_or(0.);
            rank_a.total_cmp(&rank_b)
        });

        let mut pools: IndexMap<String, ProcessorPool> = IndexMap::new();
        let mut decisions: IndexMap<TaskId, ScheduleDecision> = IndexMap::new();
        let communication_cost = self.config.communication_cost();

        for task_id in tasks.into_iter() {
            let task = graph
                .get_task(task_id)
                .ok_or_else(|| HeftError::InvalidGraph(format!("unknown task {}", task_id)))?;
            let sites = candidate_sites
                .get(&task_id)
                .ok_or_else(|| HeftError::NoCandidateSite(task.name.clone()))?;
            debug!("scheduling task {}", task.name);

            let mut best: Option<Placement> = None;
            for site in sites.iter() {
                let ready_time = self.ready_time(graph, task_id, site, &decisions, communication_cost)?;
                let pool = pools
                    .entry(site.clone())
                    .or_insert_with(|| ProcessorPool::new(site, capacity.processor_count(site)));
                let (start_time, processor) = pool.earliest_available_time(ready_time)?;
                let finish_time = start_time + capacity.expected_duration(task, site)? as f64;

                let better = match &best {
                    None => true,
                    Some(b) => finish_time < b.finish_time || (finish_time == b.finish_time && *site < b.site),
                };
                if better {
                    best = Some(Placement {
                        site: site.clone(),
                        processor,
                        start_time,
                        finish_time,
                    });
                }
            }
            let best = best.ok_or_else(|| HeftError::NoCandidateSite(task.name.clone()))?;

            pools[&best.site].commit(best.processor, best.start_time, best.finish_time, task_id)?;

            debug!(
                "scheduling [heft] task {} on site {} on processor {} on time {:.3}-{:.3}",
                task.name, best.site, best.processor, best.start_time, best.finish_time
            );
            decisions.insert(
                task_id,
                ScheduleDecision {
                    task_name: task.name.clone(),
                    site: best.site,
                    processor: best.processor,
                    start_time: best.start_time,
                    finish_time: best.finish_time,
                },
            );
        }

        Ok((decisions, pools))
    }

    /// Returns the time when outputs of all parents are available at the site.
    fn ready_time(
        &self,
        graph: &TaskGraph,
        task_id: TaskId,
        site: &str,
        decisions: &IndexMap<TaskId, ScheduleDecision>,
        communication_cost: f64,
    ) -> Result<f64> {
        let mut ready_time = 0.;
        for parent in graph.parents(task_id).filter(|&p| !graph.is_synthetic_root(p)) {
            let decision = decisions.get(&parent).ok_or_else(|| {
                HeftError::InvalidGraph(format!("task {} is scheduled before its parent {}", task_id, parent))
            })?;
            let mut current = decision.finish_time;
            if decision.site != site {
                current += communication_cost;
            }
            ready_time = f64::max(ready_time, current);
        }
        Ok(ready_time)
    }
}
