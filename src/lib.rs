pub mod cli;
pub mod config;
pub mod descriptor;
pub mod domain;
pub mod error;
pub mod git;
pub mod maven;
pub mod notes;
pub mod pipeline;
pub mod telemetry;
pub mod ui;
pub mod warning;

pub use error::{ReleaseError, Result};
