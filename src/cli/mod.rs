//! CLI module for the Impeller deployment driver.
//!
//! This module provides the command-line interface for installing
//! releases onto a cluster.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat, RunArgs};
pub use output::OutputFormatter;
