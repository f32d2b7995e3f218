use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod cli;

use cli::Cli;
use cli::commands::Commands;
use qaloop::collaborators::Collaborators;
use qaloop::config::Config;
use qaloop::domain::{Provenance, RunConfig, RunStatus};
use qaloop::health::{HealthProbe, HttpHealthProbe};
use qaloop::integration::{StageStrategy, resolve};
use qaloop::launcher::{LaunchOutcome, ServiceLauncher};
use qaloop::orchestrator::{ControllerConfig, LoopController, RunOutcome};
use qaloop::storage::FsArtifactStore;

fn setup_logging(verbose: bool, default_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("qaloop")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("qaloop.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let env = env_logger::Env::default().default_filter_or(default_level.unwrap_or("info"));
    let mut builder = env_logger::Builder::from_env(env);
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Pipe(target)).init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterruptAction {
    StopAfterIteration,
    ForceExit,
}

/// First Ctrl-C cancels cooperatively; any further one exits at once
fn interrupt_action(count: u32) -> InterruptAction {
    if count <= 1 {
        InterruptAction::StopAfterIteration
    } else {
        InterruptAction::ForceExit
    }
}

fn status_label(status: RunStatus) -> ColoredString {
    match status {
        RunStatus::Completed => "completed".green(),
        RunStatus::StoppedEarly => "stopped early".yellow(),
        RunStatus::MaxReached => "max loops reached".yellow(),
        RunStatus::Cancelled => "cancelled".yellow(),
        RunStatus::Failed => "failed".red(),
        RunStatus::Running => "running".normal(),
    }
}

fn print_summary(outcome: &RunOutcome) {
    let report = &outcome.report;

    println!();
    println!("{} {}", "Run:".bold(), report.run_id);
    println!("  target:     {}", report.target_url);
    println!("  status:     {}", status_label(report.status));
    println!("  iterations: {}", report.total_iterations);

    for it in &report.iterations {
        let degraded = it
            .stages
            .iter()
            .filter(|s| s.provenance == Provenance::Fallback)
            .count();
        println!(
            "  {} level={} passed={}/{} proposals={} fallback_stages={} verdict={}",
            format!("#{}", it.sequence).cyan(),
            it.level,
            it.tally.passed,
            it.tally.total,
            it.proposal_count,
            degraded,
            it.verdict
        );
    }

    println!(
        "  success rate: {:.1}% ({} tests, {} failures)",
        report.execution.success_rate, report.execution.total_tests_run, report.execution.total_failures
    );

    if let Some(failure) = &report.failure {
        println!("  {} {}", "failure:".red(), failure);
    }

    println!("{}", "Recommendations:".bold());
    for rec in &report.recommendations {
        println!("  - {}", rec);
    }

    println!(
        "  degraded iterations: {} of {}",
        report.degraded_iterations(),
        report.total_iterations
    );

    if let Some(path) = &outcome.report_path {
        println!("{} {}", "Report:".green(), path.display());
    }
}

async fn handle_probe_command(config: &Config) -> Result<i32> {
    let probe = HttpHealthProbe::new(&config.collaborators).context("Failed to build health probe")?;
    let reachability = probe.probe().await;
    let level = resolve(&reachability);
    let strategy = StageStrategy::select(&reachability);

    let mark = |up: bool| if up { "reachable".green() } else { "unreachable".red() };
    println!("{} {}", "llm:".bold(), mark(reachability.llm));
    println!("{} {}", "design service:".bold(), mark(reachability.design_service));
    println!("{} {}", "execution service:".bold(), mark(reachability.execution_service));
    println!(
        "{} {} ({} of 4 stages on fallback)",
        "integration level:".bold(),
        level.to_string().cyan(),
        strategy.fallback_count()
    );
    Ok(0)
}

async fn handle_run_command(
    url: &str,
    max_loops: Option<u32>,
    no_auto_start: bool,
    output_dir: Option<&Path>,
    verbose: bool,
    config: &Config,
) -> Result<i32> {
    let run_config = RunConfig::new(url, max_loops.unwrap_or(config.looping.max_loops))
        .context("Invalid run options")?
        .with_auto_start(!no_auto_start)
        .with_verbose(verbose);

    let (loops_dir, report_dir) = match output_dir {
        Some(dir) => (dir.join("loops"), dir.to_path_buf()),
        None => (config.storage.loops_dir.clone(), config.storage.report_dir.clone()),
    };

    let probe: Arc<dyn HealthProbe> =
        Arc::new(HttpHealthProbe::new(&config.collaborators).context("Failed to build health probe")?);

    let mut launcher = ServiceLauncher::new(config.launcher.clone());
    if run_config.auto_start {
        match launcher.start(probe.as_ref()).await {
            Ok(LaunchOutcome::Ready) => println!("{}", "Services started".green()),
            Ok(LaunchOutcome::TimedOut(r)) => {
                println!("{} {}", "Services not fully up, continuing degraded:".yellow(), r)
            }
            Ok(_) => {}
            Err(e) => println!("{} {}", "Service launch failed, continuing degraded:".yellow(), e),
        }
    }

    let collaborators = Collaborators::http(&config.collaborators).context("Failed to build collaborator clients")?;
    let store = FsArtifactStore::new(&loops_dir, &report_dir).context("Failed to prepare output directories")?;
    let controller = LoopController::new(&collaborators, probe, ControllerConfig::from(&config.looping))
        .with_store(Arc::new(store));

    let cancel = controller.cancel_token();
    tokio::spawn(async move {
        let mut interrupts = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            interrupts += 1;
            match interrupt_action(interrupts) {
                InterruptAction::StopAfterIteration => {
                    info!("Interrupt received, stopping after the current iteration");
                    println!(
                        "{}",
                        "Interrupt received, stopping after the current iteration (again to force quit)".yellow()
                    );
                    cancel.cancel();
                }
                InterruptAction::ForceExit => {
                    log::warn!("Second interrupt received, exiting immediately");
                    println!("{}", "Forced exit".red());
                    std::process::exit(RunStatus::Cancelled.exit_code());
                }
            }
        }
    });

    println!(
        "{} {} (max {} loops)",
        "Starting QA loop:".cyan(),
        run_config.target_url,
        run_config.max_loops
    );
    let outcome = controller.run(run_config).await;

    if let Err(e) = launcher.shutdown().await {
        log::warn!("{}", e);
    }

    print_summary(&outcome);
    Ok(outcome.run.status().exit_code())
}

async fn run_application(cli: &Cli, config: &Config) -> Result<i32> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run {
            url,
            max_loops,
            no_auto_start,
            output_dir,
        } => {
            handle_run_command(
                url,
                *max_loops,
                *no_auto_start,
                output_dir.as_deref(),
                cli.is_verbose(),
                config,
            )
            .await
        }
        Commands::Probe => handle_probe_command(config).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    setup_logging(cli.is_verbose(), config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    let code = run_application(&cli, &config).await.context("Application failed")?;
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_interrupt_forces_exit() {
        assert_eq!(interrupt_action(1), InterruptAction::StopAfterIteration);
        assert_eq!(interrupt_action(2), InterruptAction::ForceExit);
        assert_eq!(interrupt_action(5), InterruptAction::ForceExit);
        assert_eq!(RunStatus::Cancelled.exit_code(), 130);
    }
}
