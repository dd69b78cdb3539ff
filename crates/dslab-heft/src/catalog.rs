//! Site and transformation catalogs.
//!
//! Only the lookups needed by the site selector are modeled here. Both catalogs are read-only for the scheduler.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::task::{Task, Transformation};

/// Value used by the site catalog for an unknown number of nodes.
pub const UNKNOWN_NODES: i32 = -1;

/// Compute job manager of a site.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GridGateway {
    /// Number of idle nodes, `-1` if unknown.
    pub idle_nodes: i32,
    /// Total number of nodes, `-1` if unknown.
    pub total_nodes: i32,
}

impl GridGateway {
    pub fn new(idle_nodes: i32, total_nodes: i32) -> Self {
        Self { idle_nodes, total_nodes }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_NODES, UNKNOWN_NODES)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SiteEntry {
    pub name: String,
    pub compute_gateway: Option<GridGateway>,
}

/// Transformation installed on a site.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransformationEntry {
    pub site: String,
    pub profiles: BTreeMap<String, String>,
}

impl TransformationEntry {
    pub fn profile(&self, key: &str) -> Option<&str> {
        self.profiles.get(key).map(|s| s.as_str())
    }
}

pub trait SiteCatalog {
    fn lookup(&self, site: &str) -> Option<&SiteEntry>;
}

pub trait TransformationCatalog {
    /// Returns entries of the transformation installed on the site.
    fn entries(&self, transformation: &Transformation, site: &str) -> Vec<&TransformationEntry>;

    /// Returns the subset of `sites` where the transformation has at least one entry, preserving order.
    fn sites(&self, transformation: &Transformation, sites: &[String]) -> Vec<String> {
        sites
            .iter()
            .filter(|site| !self.entries(transformation, site).is_empty())
            .cloned()
            .collect()
    }
}

/// Dynamic runtime estimation consulted before the catalog profiles.
pub trait RuntimeEstimator {
    /// Returns expected runtime of the task on the site in seconds, if known.
    fn estimate(&self, task: &Task, entry: &TransformationEntry) -> Option<f64>;
}

/// Estimator which never knows the answer.
pub struct NoRuntimeEstimator;

impl RuntimeEstimator for NoRuntimeEstimator {
    fn estimate(&self, _task: &Task, _entry: &TransformationEntry) -> Option<f64> {
        None
    }
}

/// In-memory site catalog.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SiteStore {
    sites: HashMap<String, SiteEntry>,
}

impl SiteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_site(&mut self, name: &str, compute_gateway: Option<GridGateway>) {
        self.sites.insert(
            name.to_string(),
            SiteEntry {
                name: name.to_string(),
                compute_gateway,
            },
        );
    }
}

impl SiteCatalog for SiteStore {
    fn lookup(&self, site: &str) -> Option<&SiteEntry> {
        self.sites.get(site)
    }
}

/// In-memory transformation catalog.
#[derive(Clone, Debug, Default)]
pub struct TransformationStore {
    entries: HashMap<Transformation, Vec<TransformationEntry>>,
}

impl TransformationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the transformation at the site with the given profiles.
    pub fn add_entry(&mut self, transformation: &Transformation, site: &str, profiles: &[(&str, &str)]) {
        self.entries
            .entry(transformation.clone())
            .or_default()
            .push(TransformationEntry {
                site: site.to_string(),
                profiles: profiles
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            });
    }
}

impl TransformationCatalog for TransformationStore {
    fn entries(&self, transformation: &Transformation, site: &str) -> Vec<&TransformationEntry> {
        self.entries
            .get(transformation)
            .map(|entries| entries.iter().filter(|e| e.site == site).collect())
            .unwrap_or_default()
    }
}
