use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub collaborators: CollaboratorsConfig,
    #[serde(rename = "loop")]
    pub looping: LoopConfig,
    pub storage: StorageConfig,
    pub launcher: LauncherConfig,
}

/// Endpoints and timeouts for the external services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorsConfig {
    pub llm_url: String,
    pub llm_model: String,
    pub design_url: String,
    pub execution_url: String,
    pub probe_timeout_ms: u64,
    pub call_timeout_ms: u64,
    pub page_timeout_ms: u64,
}

impl Default for CollaboratorsConfig {
    fn default() -> Self {
        Self {
            llm_url: "http://localhost:11434".to_string(),
            llm_model: "llama3.2".to_string(),
            design_url: "http://localhost:5003".to_string(),
            execution_url: "http://localhost:5001".to_string(),
            probe_timeout_ms: 5000,
            call_timeout_ms: 60000,
            page_timeout_ms: 10000,
        }
    }
}

impl CollaboratorsConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub max_loops: u32,
    /// Stop when an analysis proposes this many improvements or fewer
    pub low_improvement_threshold: usize,
    /// Proposals emitted by the rule-based analyzer when failures exist
    pub fallback_proposal_count: usize,
    pub iteration_delay_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_loops: 5,
            low_improvement_threshold: 1,
            fallback_proposal_count: 1,
            iteration_delay_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub loops_dir: PathBuf,
    pub report_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            loops_dir: PathBuf::from("loops"),
            report_dir: PathBuf::from("."),
        }
    }
}

/// How to start the auxiliary services when auto-start is on
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub command: Option<String>,
    pub args: Vec<String>,
    pub startup_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            startup_timeout_ms: 30000,
            poll_interval_ms: 1000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            collaborators: CollaboratorsConfig::default(),
            looping: LoopConfig::default(),
            storage: StorageConfig::default(),
            launcher: LauncherConfig::default(),
        }
    }
}

impl Config {
    /// Files tried when no explicit path is given, most specific first:
    /// `~/.config/qaloop/qaloop.yml`, then `./qaloop.yml`
    fn candidates() -> Vec<PathBuf> {
        let name = env!("CARGO_PKG_NAME");
        let file = format!("{}.yml", name);
        let mut paths = Vec::with_capacity(2);
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join(name).join(&file));
        }
        paths.push(PathBuf::from(file));
        paths
    }

    /// Load the explicit file, or the first readable candidate, or defaults.
    /// An explicit file that fails to load is an error; a bad candidate is skipped.
    pub fn load(explicit: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path).with_context(|| format!("Failed to load config from {}", path.display()));
        }

        for path in Self::candidates().into_iter().filter(|p| p.exists()) {
            match Self::from_file(&path) {
                Ok(config) => return Ok(config),
                Err(e) => log::warn!("Skipping config {}: {:#}", path.display(), e),
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        log::info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    /// Reject values no run could start with
    pub fn validate(&self) -> Result<()> {
        if self.looping.max_loops == 0 {
            eyre::bail!("loop.max_loops must be at least 1");
        }
        let c = &self.collaborators;
        for (key, url) in [
            ("llm_url", &c.llm_url),
            ("design_url", &c.design_url),
            ("execution_url", &c.execution_url),
        ] {
            if url.trim().is_empty() {
                eyre::bail!("collaborators.{} must not be empty", key);
            }
        }
        if c.probe_timeout_ms == 0 || c.call_timeout_ms == 0 || c.page_timeout_ms == 0 {
            eyre::bail!("collaborator timeouts must be non-zero");
        }
        Ok(())
    }
}
