//! Storage layer for qaloop - per-iteration artifact files and the final report.
//!
//! The controller only needs "persist this, tell me if it failed"; the on-disk
//! layout is owned by [`FsArtifactStore`].

mod fs;

use std::path::PathBuf;

use crate::domain::StageArtifact;
use crate::error::Result;
use crate::report::RunReport;

pub use fs::{FsArtifactStore, RunSummaryLine};

/// Persistence sink for iteration artifacts and run reports
pub trait ArtifactStore: Send + Sync {
    /// Create the iteration directory and its evidence folder; returns the
    /// evidence folder
    fn prepare_iteration(&self, dir_name: &str) -> Result<PathBuf>;

    /// Write one stage artifact into the iteration directory
    fn save_artifact(&self, dir_name: &str, artifact: &StageArtifact) -> Result<()>;

    /// Write the final report; returns its path
    fn save_report(&self, report: &RunReport) -> Result<PathBuf>;
}
