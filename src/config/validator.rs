//! Configuration validation for cluster configurations.
//!
//! This module checks a parsed configuration before any subprocess runs, so
//! that a malformed release is reported up front rather than halfway through
//! an install.

use crate::error::{ConfigError, ImpellerError, Result};
use std::collections::HashSet;
use tracing::debug;

use super::spec::{ClusterConfig, HelmConfig, HelmRepo, Release};

/// Validator for cluster configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationError {
    /// Converts into the error reported when validation fails.
    #[must_use]
    pub fn to_config_error(&self) -> ConfigError {
        ConfigError::ValidationError {
            message: self.message.clone(),
            field: Some(self.field.clone()),
        }
    }
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a cluster configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any were found.
    pub fn validate(&self, config: &ClusterConfig) -> Result<ValidationResult> {
        let result = self.check(config);

        if let Some(first_error) = result.errors.first() {
            return Err(ImpellerError::Config(first_error.to_config_error()));
        }

        debug!("Configuration validation passed");
        Ok(result)
    }

    /// Collects every error and warning without failing.
    #[must_use]
    pub fn check(&self, config: &ClusterConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        if config.name.is_empty() {
            result.warnings.push(String::from(
                "name: Cluster name is empty, per-cluster value files will not be used",
            ));
        }

        Self::validate_helm(&config.helm, &mut result);
        Self::validate_repos(&config.helm.repos, &mut result);
        Self::validate_releases(&config.releases, &mut result);

        result
    }

    fn validate_helm(helm: &HelmConfig, result: &mut ValidationResult) {
        if helm.upgrade {
            result
                .warnings
                .push(String::from("helm.upgrade: Ignored, no server-side component to upgrade"));
        }
        if !helm.service_account.is_empty() {
            result.warnings.push(format!(
                "helm.service_account: Ignored service account '{}'",
                helm.service_account
            ));
        }
        if !helm.overrides.is_empty() {
            result.warnings.push(format!(
                "helm.overrides: Ignored {} server-side override(s)",
                helm.overrides.len()
            ));
        }
        if helm.log_level > 9 {
            result.warnings.push(format!(
                "helm.log_level: Level {} is unusually high",
                helm.log_level
            ));
        }
    }

    fn validate_repos(repos: &[HelmRepo], result: &mut ValidationResult) {
        let mut seen_names = HashSet::new();

        for (i, repo) in repos.iter().enumerate() {
            let prefix = format!("helm.repos[{i}]");

            if repo.name.is_empty() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: String::from("Repository name cannot be empty"),
                });
            } else if !seen_names.insert(repo.name.as_str()) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: format!("Duplicate repository name: {}", repo.name),
                });
            }

            if repo.url.is_empty() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.url"),
                    message: format!("Repository '{}' has no URL", repo.name),
                });
            } else if !repo.url.starts_with("https://") && !repo.url.starts_with("http://") {
                result.warnings.push(format!(
                    "{prefix}.url: '{}' is not an http(s) URL",
                    repo.url
                ));
            }

            if repo.password.is_some() && repo.username.is_none() {
                result.warnings.push(format!(
                    "{prefix}.password: Password set for '{}' without a username",
                    repo.name
                ));
            }
        }
    }

    fn validate_releases(releases: &[Release], result: &mut ValidationResult) {
        if releases.is_empty() {
            result.warnings.push(String::from("No releases defined in configuration"));
            return;
        }

        let mut seen_names = HashSet::new();

        for (i, release) in releases.iter().enumerate() {
            let prefix = format!("releases[{i}]");

            if !seen_names.insert(release.name.as_str()) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: format!("Duplicate release name: {}", release.name),
                });
            }

            if !is_valid_name(&release.name) {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.name"),
                    message: format!(
                        "Release name '{}' is invalid. Must be lowercase alphanumeric with hyphens or dots.",
                        release.name
                    ),
                });
            }

            if release.chart_path.is_empty() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.chart_path"),
                    message: format!("Release '{}' has no chart", release.name),
                });
            }

            if release.version.is_empty() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.version"),
                    message: format!("Release '{}' must pin a chart version", release.name),
                });
            }

            Self::validate_overrides(release, &prefix, result);
        }
    }

    fn validate_overrides(release: &Release, prefix: &str, result: &mut ValidationResult) {
        let mut seen_targets = HashSet::new();

        for (i, entry) in release.overrides.iter().enumerate() {
            if entry.target.is_empty() {
                result.errors.push(ValidationError {
                    field: format!("{prefix}.overrides[{i}].target"),
                    message: format!("Override in release '{}' has no target", release.name),
                });
            } else if !seen_targets.insert(entry.target.as_str()) {
                // helm keeps the last occurrence
                result.warnings.push(format!(
                    "{prefix}.overrides[{i}].target: '{}' is set more than once",
                    entry.target
                ));
            }
        }
    }
}

/// Validates a release name the way helm does: dot-separated segments of
/// lowercase alphanumerics and hyphens, each starting and ending with an
/// alphanumeric, at most 53 characters in total.
fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.len() <= 53 && name.split('.').all(is_valid_segment)
}

fn is_valid_segment(segment: &str) -> bool {
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    match (segment.chars().next(), segment.chars().last()) {
        (Some(first), Some(last)) => {
            alnum(first) && alnum(last) && segment.chars().all(|c| alnum(c) || c == '-')
        }
        _ => false,
    }
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
