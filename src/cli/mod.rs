//! CLI module for qaloop - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
