//! Filesystem artifact store.
//!
//! Layout:
//! ```text
//! <loops_dir>/
//!   runs.jsonl                      one summary line per finished run
//!   loop-001_20261018_143005/
//!     requirements.md
//!     spec_extraction.json
//!     test_design_result.json
//!     test_cases.csv
//!     execution_results.json
//!     improvement_analysis.json
//!     evidence/
//! <report_dir>/final_report_20261018_143005_<run_id>.json
//! ```

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ArtifactStore;
use crate::artifact::table;
use crate::domain::{IntegrationLevel, RunStatus, StageArtifact, StagePayload};
use crate::error::{QaLoopError, Result};
use crate::id::report_file_name;
use crate::report::RunReport;

const EVIDENCE_DIR: &str = "evidence";
const RUNS_LOG: &str = "runs.jsonl";

/// One line of `runs.jsonl`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummaryLine {
    pub run_id: String,
    pub target_url: String,
    pub status: RunStatus,
    pub iterations: usize,
    pub level_history: Vec<IntegrationLevel>,
    pub report: PathBuf,
    pub finished_at: i64,
}

pub struct FsArtifactStore {
    loops_dir: PathBuf,
    report_dir: PathBuf,
}

impl FsArtifactStore {
    /// Create a store rooted at the given directories, creating them if needed
    pub fn new(loops_dir: impl AsRef<Path>, report_dir: impl AsRef<Path>) -> Result<Self> {
        let loops_dir = loops_dir.as_ref().to_path_buf();
        let report_dir = report_dir.as_ref().to_path_buf();
        fs::create_dir_all(&loops_dir)?;
        fs::create_dir_all(&report_dir)?;
        Ok(Self { loops_dir, report_dir })
    }

    pub fn iteration_dir(&self, dir_name: &str) -> PathBuf {
        self.loops_dir.join(dir_name)
    }

    fn write_json<T: Serialize>(&self, dir: &Path, file: &str, value: &T) -> Result<()> {
        let content = serde_json::to_string_pretty(value)?;
        fs::write(dir.join(file), content)?;
        Ok(())
    }

    /// Append a summary record to the run log
    fn append_run_line(&self, line: &RunSummaryLine) -> Result<()> {
        let path = self.loops_dir.join(RUNS_LOG);
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{}", serde_json::to_string(line)?)?;
        Ok(())
    }

    /// Read back every run summary, oldest first
    pub fn list_runs(&self) -> Result<Vec<RunSummaryLine>> {
        let path = self.loops_dir.join(RUNS_LOG);
        if !path.exists() {
            return Ok(Vec::new());
        }
        fs::read_to_string(&path)?
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(QaLoopError::from))
            .collect()
    }
}

impl ArtifactStore for FsArtifactStore {
    fn prepare_iteration(&self, dir_name: &str) -> Result<PathBuf> {
        let evidence = self.iteration_dir(dir_name).join(EVIDENCE_DIR);
        fs::create_dir_all(&evidence)?;
        Ok(evidence)
    }

    fn save_artifact(&self, dir_name: &str, artifact: &StageArtifact) -> Result<()> {
        let dir = self.iteration_dir(dir_name);
        if !dir.is_dir() {
            return Err(QaLoopError::Storage(format!(
                "iteration directory {} was never prepared",
                dir.display()
            )));
        }

        match artifact.payload() {
            StagePayload::Spec(spec) => {
                fs::write(dir.join("requirements.md"), &spec.markdown)?;
                self.write_json(&dir, "spec_extraction.json", artifact)?;
            }
            StagePayload::Design(design) => {
                self.write_json(&dir, "test_design_result.json", artifact)?;
                fs::write(dir.join("test_cases.csv"), table::format_cases(&design.cases))?;
            }
            StagePayload::Execution(_) => self.write_json(&dir, "execution_results.json", artifact)?,
            StagePayload::Analysis(_) => self.write_json(&dir, "improvement_analysis.json", artifact)?,
        }

        tracing::debug!(dir = %dir.display(), kind = %artifact.kind(), "Artifact saved");
        Ok(())
    }

    fn save_report(&self, report: &RunReport) -> Result<PathBuf> {
        let path = self.report_dir.join(report_file_name(&report.generated_at, &report.run_id));
        fs::write(&path, serde_json::to_string_pretty(report)?)?;

        self.append_run_line(&RunSummaryLine {
            run_id: report.run_id.clone(),
            target_url: report.target_url.clone(),
            status: report.status,
            iterations: report.total_iterations,
            level_history: report.level_history.clone(),
            report: path.clone(),
            finished_at: report.generated_at.timestamp_millis(),
        })?;

        tracing::info!(path = %path.display(), "Final report saved");
        Ok(path)
    }
}
