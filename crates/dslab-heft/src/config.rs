//! Scheduler configuration.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{HeftError, Result};

/// Parameters of the HEFT site selector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeftConfig {
    /// Average bandwidth between the sites in MB/s (default: 5).
    pub average_bandwidth: f64,
    /// Average amount of data transferred between two dependent tasks in MB (default: 2).
    pub average_data_size: f64,
    /// Number of processors used for a site without capacity information in the site catalog (default: 10).
    pub default_processor_count: u32,
    /// Profile key holding the expected task runtime in seconds (default: `runtime`).
    pub runtime_profile_key: String,
}

impl Default for HeftConfig {
    fn default() -> Self {
        Self {
            average_bandwidth: 5.,
            average_data_size: 2.,
            default_processor_count: 10,
            runtime_profile_key: "runtime".to_string(),
        }
    }
}

impl HeftConfig {
    /// Returns the fixed penalty added when a parent and its child run on different sites.
    pub fn communication_cost(&self) -> f64 {
        self.average_bandwidth / self.average_data_size
    }

    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(s).map_err(|e| HeftError::Config(e.to_string()))?;
        config.validate()
    }

    /// Reads config from YAML file, missing fields take default values.
    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        Self::from_yaml_str(&std::fs::read_to_string(file)?)
    }

    /// Applies known parameters on top of the default config.
    pub fn from_params(params: &SchedulerParams) -> Result<Self> {
        let mut config = Self::default();
        for (key, value) in params.params.iter() {
            match key.as_str() {
                "average_bandwidth" => config.average_bandwidth = parse_param(key, value)?,
                "average_data_size" => config.average_data_size = parse_param(key, value)?,
                "default_processor_count" => config.default_processor_count = parse_param(key, value)?,
                "runtime_profile_key" => config.runtime_profile_key = value.clone(),
                _ => return Err(HeftError::Config(format!("unknown parameter {}", key))),
            }
        }
        config.validate()
    }

    fn validate(self) -> Result<Self> {
        if !(self.average_bandwidth >= 0.) || !self.average_bandwidth.is_finite() {
            return Err(HeftError::Config(format!(
                "average_bandwidth must be non-negative, got {}",
                self.average_bandwidth
            )));
        }
        if !(self.average_data_size > 0.) || !self.average_data_size.is_finite() {
            return Err(HeftError::Config(format!(
                "average_data_size must be positive, got {}",
                self.average_data_size
            )));
        }
        if self.default_processor_count == 0 {
            return Err(HeftError::Config("default_processor_count must be positive".to_string()));
        }
        Ok(self)
    }
}

fn parse_param<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| HeftError::Config(format!("can't parse value {} of parameter {}", value, key)))
}

/// Scheduler name with parameters in the form `Name[key1=value1,key2=value2]`.
#[derive(Debug, Clone)]
pub struct SchedulerParams {
    name: String,
    params: BTreeMap<String, String>,
}

impl SchedulerParams {
    pub fn from_str(s: &str) -> Option<Self> {
        let open = match s.find('[') {
            Some(open) => open,
            None => {
                return Some(Self {
                    name: s.to_string(),
                    params: BTreeMap::new(),
                })
            }
        };
        if !s.ends_with(']') {
            return None;
        }

        let mut params = BTreeMap::new();
        let body = &s[open + 1..s.len() - 1];
        if !body.is_empty() {
            for param in body.split(',') {
                let pos = param.find('=')?;
                params.insert(param[..pos].trim().to_string(), param[pos + 1..].trim().to_string());
            }
        }

        Some(Self {
            name: s[..open].to_string(),
            params,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get<T: FromStr, K: AsRef<str>>(&self, name: K) -> Option<T> {
        self.params.get(name.as_ref()).and_then(|s| s.parse().ok())
    }
}

impl std::fmt::Display for SchedulerParams {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(
                f,
                "{}[{}]",
                self.name,
                self.params.iter().map(|(k, v)| format!("{k}={v}")).join(",")
            )
        }
    }
}
