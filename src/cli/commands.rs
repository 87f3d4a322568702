//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::installer::{HELM_BIN, KUBECTL_BIN, RunOptions};

/// Impeller - Declarative Helm release installer.
#[derive(Parser, Debug)]
#[command(name = "impeller")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the cluster configuration file.
    #[arg(short, long, global = true, env = "IMPELLER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Helm executable.
    #[arg(long, global = true, env = "IMPELLER_HELM_BIN", default_value = HELM_BIN)]
    pub helm_bin: String,

    /// Kubectl executable.
    #[arg(long, global = true, env = "IMPELLER_KUBECTL_BIN", default_value = KUBECTL_BIN)]
    pub kubectl_bin: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Synchronize chart repositories and install every release.
    Install {
        /// Run options.
        #[command(flatten)]
        run: RunArgs,

        /// Kube-config document to write to ~/.kube/config (overwrites it).
        #[arg(long, env = "KUBE_CONFIG", hide_env_values = true)]
        kube_config: Option<String>,

        /// Kubernetes context to switch to before installing.
        #[arg(long, env = "KUBE_CONTEXT")]
        kube_context: Option<String>,
    },

    /// Validate the cluster configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Print the commands an install would run, with secrets masked.
    Template {
        /// Run options.
        #[command(flatten)]
        run: RunArgs,
    },
}

/// Options shared by commands that resolve releases.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Value files applied to every release (repeatable or comma-separated).
    #[arg(short = 'f', long = "values", env = "IMPELLER_VALUES", value_delimiter = ',')]
    pub values: Vec<String>,

    /// Simulate: helm releases run with --dry-run, kubectl releases are only rendered.
    #[arg(long, env = "IMPELLER_DRY_RUN")]
    pub dry_run: bool,

    /// Directory charts are unpacked into for kubectl releases.
    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Directory containing values/<release>/ override files.
    #[arg(long)]
    pub values_dir: Option<PathBuf>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl RunArgs {
    /// Builds run options for the given binaries.
    #[must_use]
    pub fn to_options(&self, helm_bin: &str, kubectl_bin: &str) -> RunOptions {
        RunOptions {
            value_files: self.values.clone(),
            dry_run: self.dry_run,
            working_dir: self.working_dir.clone(),
            values_dir: self.values_dir.clone().unwrap_or_default(),
            helm_bin: helm_bin.to_string(),
            kubectl_bin: kubectl_bin.to_string(),
        }
    }
}
