//! Remote CI pipelines.
//!
//! [CiClient] is the capability the dispatcher needs from the CI server;
//! [GitLabClient] talks to the GitLab REST API and [MockCiClient] replays
//! scripted statuses in tests. [dispatcher] decides what runs when.

pub mod dispatcher;
pub mod gitlab;
pub mod mock;

pub use dispatcher::{
    dispatch, DispatchObserver, DispatchOptions, DispatchPlan, DispatchReport,
    PipelineDispatcher,
};
pub use gitlab::GitLabClient;
pub use mock::MockCiClient;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// A pipeline variable passed on trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub key: String,
    pub value: String,
}

impl Variable {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Variable {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Identity of a freshly created pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineHandle {
    pub id: u64,
    pub web_url: String,
}

/// Pipeline status as reported by the CI server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStatus {
    Created,
    Pending,
    Running,
    Success,
    Failed,
    Canceled,
    Skipped,
    /// Any status this tool does not know; never terminal
    Other(String),
}

impl PipelineStatus {
    pub fn from_api(status: &str) -> Self {
        match status {
            "created" => PipelineStatus::Created,
            "pending" => PipelineStatus::Pending,
            "running" => PipelineStatus::Running,
            "success" => PipelineStatus::Success,
            "failed" => PipelineStatus::Failed,
            "canceled" => PipelineStatus::Canceled,
            "skipped" => PipelineStatus::Skipped,
            other => PipelineStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PipelineStatus::Created => "created",
            PipelineStatus::Pending => "pending",
            PipelineStatus::Running => "running",
            PipelineStatus::Success => "success",
            PipelineStatus::Failed => "failed",
            PipelineStatus::Canceled => "canceled",
            PipelineStatus::Skipped => "skipped",
            PipelineStatus::Other(other) => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStatus::Success
                | PipelineStatus::Failed
                | PipelineStatus::Canceled
                | PipelineStatus::Skipped
        )
    }

    pub fn is_success(&self) -> bool {
        *self == PipelineStatus::Success
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pipeline that ran to a terminal status
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub service: String,
    pub pipeline_id: u64,
    pub web_url: String,
    pub status: PipelineStatus,
    pub dispatched_at: Instant,
    pub finished_at: Instant,
}

/// Remote CI capability
///
/// `project` is the project path on the server (`backend/billing`);
/// implementations take care of encoding it.
pub trait CiClient: Send + Sync {
    /// Value of a project-level CI variable, `None` when it is not defined
    fn get_variable(&self, project: &str, key: &str) -> Result<Option<String>>;

    /// Start a pipeline for `git_ref`
    fn create_pipeline(
        &self,
        project: &str,
        git_ref: &str,
        variables: &[Variable],
    ) -> Result<PipelineHandle>;

    fn pipeline_status(&self, project: &str, pipeline_id: u64) -> Result<PipelineStatus>;
}
