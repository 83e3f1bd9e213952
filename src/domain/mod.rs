//! Domain logic - pure release-train rules independent of git, Maven and GitLab

pub mod release;
pub mod service;
pub mod task;

pub use release::ReleaseVersion;
pub use service::{ConcurrencyClass, Service};
pub use task::{extract_task_ids, CommitRecord, TaskPolicy, TaskSet};
