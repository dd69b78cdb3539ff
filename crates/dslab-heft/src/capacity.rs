//! Site capacity and runtime lookups.

use std::collections::HashMap;

use log::{debug, warn};

use crate::catalog::{RuntimeEstimator, SiteCatalog, TransformationCatalog, UNKNOWN_NODES};
use crate::config::HeftConfig;
use crate::error::{HeftError, Result};
use crate::task::Task;

/// Number of processors and expected task runtimes for the candidate sites of one scheduling call.
pub struct SiteCapacityModel<'a> {
    processors: HashMap<String, u32>,
    default_processor_count: u32,
    runtime_profile_key: String,
    transformation_catalog: &'a dyn TransformationCatalog,
    estimator: &'a dyn RuntimeEstimator,
}

impl<'a> SiteCapacityModel<'a> {
    /// Resolves the number of processors for every site using the site catalog.
    pub fn new(
        sites: &[String],
        site_catalog: &dyn SiteCatalog,
        transformation_catalog: &'a dyn TransformationCatalog,
        estimator: &'a dyn RuntimeEstimator,
        config: &HeftConfig,
    ) -> Self {
        let mut processors = HashMap::new();
        for site in sites {
            let nodes = resolve_processor_count(site, site_catalog, config.default_processor_count);
            debug!("available nodes set for site {} {}", site, nodes);
            processors.insert(site.clone(), nodes);
        }
        Self {
            processors,
            default_processor_count: config.default_processor_count,
            runtime_profile_key: config.runtime_profile_key.clone(),
            transformation_catalog,
            estimator,
        }
    }

    pub fn processor_count(&self, site: &str) -> u32 {
        self.processors
            .get(site)
            .copied()
            .unwrap_or(self.default_processor_count)
    }

    /// Returns the sites from `sites` where the task transformation is installed.
    pub fn candidate_sites(&self, task: &Task, sites: &[String]) -> Result<Vec<String>> {
        let candidates = self.transformation_catalog.sites(&task.transformation, sites);
        if candidates.is_empty() {
            return Err(HeftError::NoCandidateSite(task.name.clone()));
        }
        Ok(candidates)
    }

    /// Returns expected runtime of the task on the site in whole seconds.
    ///
    /// Sources are tried in order: runtime estimator, runtime profile of the first transformation catalog entry
    /// for the site, runtime profile of the task itself. Values below one second are raised to one.
    pub fn expected_duration(&self, task: &Task, site: &str) -> Result<u64> {
        let no_estimate = || HeftError::NoRuntimeEstimate {
            task: task.name.clone(),
            site: site.to_string(),
        };
        let entries = self.transformation_catalog.entries(&task.transformation, site);
        let entry = *entries.first().ok_or_else(no_estimate)?;

        if let Some(runtime) = self.estimator.estimate(task, entry).and_then(|v| clamp_runtime(task, v)) {
            return Ok(runtime);
        }

        debug!("fetching runtime information from profiles for task {}", task.name);
        let key = self.runtime_profile_key.as_str();
        [entry.profile(key), task.profile(key)]
            .into_iter()
            .flatten()
            .find_map(|value| match value.trim().parse::<f64>() {
                Ok(runtime) => clamp_runtime(task, runtime),
                Err(_) => {
                    debug!("ignoring malformed runtime {} for task {}", value, task.name);
                    None
                }
            })
            .ok_or_else(no_estimate)
    }
}

fn resolve_processor_count(site: &str, site_catalog: &dyn SiteCatalog, default: u32) -> u32 {
    let gateway = match site_catalog.lookup(site).and_then(|entry| entry.compute_gateway) {
        Some(gateway) => gateway,
        None => {
            debug!("site {} has no compute gateway, using default number of free nodes", site);
            return default;
        }
    };
    if gateway.idle_nodes > 0 {
        return gateway.idle_nodes as u32;
    }
    debug!("picking up total nodes for site {}", site);
    if gateway.total_nodes > 0 {
        return gateway.total_nodes as u32;
    }
    if gateway.total_nodes != UNKNOWN_NODES {
        debug!("site {} reports {} total nodes", site, gateway.total_nodes);
    }
    debug!("picking up default free nodes for site {}", site);
    default
}

fn clamp_runtime(task: &Task, runtime: f64) -> Option<u64> {
    if !runtime.is_finite() || runtime < 0. {
        None
    } else if runtime < 1. {
        warn!("runtime {} for task {} is below one second, using 1", runtime, task.name);
        Some(1)
    } else {
        Some(runtime as u64)
    }
}
