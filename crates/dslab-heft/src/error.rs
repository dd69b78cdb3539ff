//! Scheduling errors.

use thiserror::Error;

use crate::task::TaskId;

/// Errors returned by the HEFT site selector.
///
/// All of them are fatal for the scheduling call: nothing is retried and no partial schedule is produced.
#[derive(Debug, Error)]
pub enum HeftError {
    /// Structural misuse of the task graph.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),
    /// No usable runtime estimate for a task on a site.
    #[error("invalid or no runtime specified for task {task} on site {site}")]
    NoRuntimeEstimate { task: String, site: String },
    /// The task transformation is not installed on any of the candidate sites.
    #[error("no runnable site for task {0}")]
    NoCandidateSite(String),
    /// No processor of the site can host a task.
    #[error("no available processor at site {0}")]
    SiteExhausted(String),
    /// Commit was requested without a matching tentative processor selection.
    #[error("no tentative selection of processor {processor} at site {site}")]
    NoTentativeSelection { site: String, processor: usize },
    /// Makespan was requested for a leaf without a finish time.
    #[error("leaf task {0} is unscheduled")]
    UnscheduledLeaf(TaskId),
    /// Malformed scheduler configuration.
    #[error("invalid config: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HeftError>;
