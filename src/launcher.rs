//! Service Launcher - starts the auxiliary services when auto-start is on and
//! waits until the probe sees them.
//!
//! The core never talks to the launcher; it only observes the effect through
//! reachability.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::Instant;

use crate::config::LauncherConfig;
use crate::domain::Reachability;
use crate::error::{QaLoopError, Result};
use crate::health::HealthProbe;

/// How a launch attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// No launch command configured
    NotConfigured,
    /// Every collaborator already answered; nothing spawned
    AlreadyRunning,
    /// Spawned and every collaborator answered before the deadline
    Ready,
    /// Spawned, but not everything came up in time; the run degrades
    TimedOut(Reachability),
}

pub struct ServiceLauncher {
    config: LauncherConfig,
    child: Option<Child>,
}

impl ServiceLauncher {
    pub fn new(config: LauncherConfig) -> Self {
        Self { config, child: None }
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Spawn the configured command and poll `probe` until all collaborators
    /// answer or the startup timeout passes
    pub async fn start(&mut self, probe: &dyn HealthProbe) -> Result<LaunchOutcome> {
        let Some(command) = self.config.command.clone() else {
            tracing::debug!("No launcher command configured");
            return Ok(LaunchOutcome::NotConfigured);
        };

        if probe.probe().await == Reachability::all() {
            tracing::info!("Services already reachable, skipping launch");
            return Ok(LaunchOutcome::AlreadyRunning);
        }

        tracing::info!(command = %command, args = ?self.config.args, "Launching services");
        let child = Command::new(&command)
            .args(&self.config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| QaLoopError::Launcher(format!("Failed to spawn {}: {}", command, e)))?;
        let child = self.child.insert(child);

        let deadline = Instant::now() + Duration::from_millis(self.config.startup_timeout_ms);
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        loop {
            let reachability = probe.probe().await;
            if reachability == Reachability::all() {
                tracing::info!("Services ready");
                return Ok(LaunchOutcome::Ready);
            }

            if let Some(status) = child.try_wait()? {
                self.child = None;
                return Err(QaLoopError::Launcher(format!(
                    "{} exited before services were ready ({})",
                    command, status
                )));
            }

            if Instant::now() >= deadline {
                tracing::warn!(reachability = %reachability, "Services not ready before startup timeout");
                return Ok(LaunchOutcome::TimedOut(reachability));
            }
            tokio::time::sleep(poll).await;
        }
    }

    /// Stop the launched process, if any
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            tracing::info!("Stopping launched services");
            child
                .kill()
                .await
                .map_err(|e| QaLoopError::Launcher(format!("Failed to stop services: {}", e)))?;
        }
        Ok(())
    }
}
