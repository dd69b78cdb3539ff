//! Workflow task.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Identifier of a task inside a [`TaskGraph`](crate::graph::TaskGraph).
pub type TaskId = usize;

/// Logical program executed by a task, identified by namespace, name and version.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Transformation {
    pub namespace: String,
    pub name: String,
    pub version: String,
}

impl Transformation {
    pub fn new(namespace: &str, name: &str, version: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            version: version.to_string(),
        }
    }
}

impl Display for Transformation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}:{}", self.namespace, self.name, self.version)
    }
}

/// Represents a workflow task.
///
/// Besides the transformation it runs, a task may carry workflow-level profiles (key-value pairs set by the
/// workflow author). The `runtime` profile is used as the last-resort runtime estimate.
#[derive(Clone, Debug)]
pub struct Task {
    pub name: String,
    pub transformation: Transformation,
    pub profiles: BTreeMap<String, String>,
}

impl Task {
    /// Creates new task without profiles.
    pub fn new(name: &str, transformation: Transformation) -> Self {
        Self {
            name: name.to_string(),
            transformation,
            profiles: BTreeMap::new(),
        }
    }

    /// Adds workflow-level profile.
    pub fn with_profile(mut self, key: &str, value: &str) -> Self {
        self.profiles.insert(key.to_string(), value.to_string());
        self
    }

    pub fn profile(&self, key: &str) -> Option<&str> {
        self.profiles.get(key).map(|s| s.as_str())
    }
}
