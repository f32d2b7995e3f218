//! CLI command definitions using clap.
//!
//! - run: drive the QA loop against a target URL
//! - probe: report collaborator reachability and the resulting integration level

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// qaloop - iterative QA loop orchestrator
#[derive(Parser, Debug)]
#[command(name = "qaloop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run extract, design, execute and analyze iterations against a web app
    Run {
        /// Target application URL
        #[arg(short, long)]
        url: String,

        /// Maximum number of iterations (config value, 5 by default)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        max_loops: Option<u32>,

        /// Do not start the auxiliary services
        #[arg(long)]
        no_auto_start: bool,

        /// Directory for iteration artifacts and the final report
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Probe the collaborators once and print the integration level
    Probe,
}
