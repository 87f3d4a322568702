//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{ClusterConfig, ValidationResult};
use crate::driver::{InstallReport, PlannedCommand};
use crate::installer::{ReleaseOutcome, ReleaseReport};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Release row for table display.
#[derive(Tabled)]
struct ReleaseRow {
    #[tabled(rename = "Release")]
    release: String,
    #[tabled(rename = "Chart")]
    chart: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Namespace")]
    namespace: String,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Result")]
    result: String,
}

/// Planned command row for table display.
#[derive(Tabled)]
struct CommandRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Scope")]
    scope: String,
    #[tabled(rename = "Command")]
    command: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the result of an install run.
    #[must_use]
    pub fn format_report(&self, report: &InstallReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    fn format_report_text(report: &InstallReport) -> String {
        let mut output = String::new();
        let _ = writeln!(
            output,
            "\nCluster: {}{}",
            report.cluster,
            if report.dry_run { " (dry run)" } else { "" }
        );

        if report.releases.is_empty() {
            output.push_str("   No releases configured.\n");
            return output;
        }

        let rows: Vec<ReleaseRow> = report.releases.iter().map(Self::release_row).collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let elapsed = report.finished_at - report.started_at;
        let _ = writeln!(
            output,
            "\n{} release(s) processed in {}s, {} repo(s) synchronized",
            report.releases.len().to_string().green(),
            elapsed.num_seconds(),
            report.repositories
        );

        let warnings = report.warning_count();
        if warnings > 0 {
            let _ = writeln!(output, "\n{} {warnings} override warning(s):", "!".yellow());
            for release in &report.releases {
                for warning in &release.warnings {
                    let _ = writeln!(output, "   - {}: {warning}", release.release);
                }
            }
        }

        output
    }

    fn release_row(release: &ReleaseReport) -> ReleaseRow {
        let result = match release.outcome {
            ReleaseOutcome::Installed if release.apply_attempts > 1 => {
                format!("installed (apply x{})", release.apply_attempts)
                    .green()
                    .to_string()
            }
            ReleaseOutcome::Installed => "installed".green().to_string(),
            ReleaseOutcome::Rendered => "rendered".cyan().to_string(),
            ReleaseOutcome::DryRun => "dry run".cyan().to_string(),
        };

        ReleaseRow {
            release: release.release.clone(),
            chart: Self::truncate(&release.chart, 40),
            version: release.version.clone(),
            namespace: if release.namespace.is_empty() {
                String::from("-")
            } else {
                release.namespace.clone()
            },
            method: release.method.to_string(),
            result,
        }
    }

    /// Formats the command listing of a template run.
    #[must_use]
    pub fn format_plan(&self, commands: &[PlannedCommand]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(commands).unwrap_or_default(),
            OutputFormat::Text => {
                let rows: Vec<CommandRow> = commands
                    .iter()
                    .enumerate()
                    .map(|(i, c)| CommandRow {
                        index: i + 1,
                        scope: c.scope.clone().unwrap_or_else(|| String::from("-")),
                        command: c.command.clone(),
                    })
                    .collect();
                format!("{}\n", Table::new(rows))
            }
        }
    }

    /// Formats a validation result with a configuration summary.
    #[must_use]
    pub fn format_validation(
        &self,
        config: &ClusterConfig,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "valid": result.is_valid(),
                "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "warnings": result.warnings,
                "cluster": config.name,
                "repositories": config.helm.repos.len(),
                "releases": config.release_names(),
            }))
            .unwrap_or_default(),
            OutputFormat::Text => Self::format_validation_text(config, result, show_warnings),
        }
    }

    fn format_validation_text(
        config: &ClusterConfig,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        let mut output = String::new();

        if result.is_valid() {
            let _ = writeln!(output, "{} Configuration is valid!", "✓".green());
        } else {
            let _ = writeln!(
                output,
                "{} Configuration has {} error(s):",
                "✗".red(),
                result.error_count()
            );
            for error in &result.errors {
                let _ = writeln!(output, "   - {error}");
            }
        }

        if show_warnings && result.warning_count() > 0 {
            let _ = writeln!(output, "\nWarnings:");
            for warning in &result.warnings {
                let _ = writeln!(output, "   - {warning}");
            }
        }

        let _ = writeln!(output, "\nConfiguration summary:");
        let _ = writeln!(output, "  Cluster: {}", config.name);
        let _ = writeln!(output, "  Repositories: {}", config.helm.repos.len());
        let _ = writeln!(output, "  Releases: {}", config.releases.len());
        output
    }

    /// Truncates a string with an ellipsis.
    fn truncate(s: &str, max: usize) -> String {
        if s.chars().count() <= max {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}
