//! Error types for the Impeller deployment driver.
//!
//! This module provides the error hierarchy for every stage of a run:
//! configuration, secret resolution, subprocess execution and the
//! repository/release orchestration that wraps them with context.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the Impeller deployment driver.
#[derive(Debug, Error)]
pub enum ImpellerError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Subprocess errors not yet attributed to a release, such as a failed
    /// `repo add`.
    #[error("Command error: {0}")]
    Exec(#[from] ExecError),

    /// Installation errors carrying repository or release context.
    #[error("{0}")]
    Install(#[from] InstallError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// A secret required by the configuration could not be resolved.
    #[error("Could not resolve {what}: {source}")]
    UnresolvedSecret {
        /// What the secret was for (e.g. "username for repo 'stable'").
        what: String,
        /// Underlying resolution failure.
        source: SecretError,
    },
}

/// Secret resolution errors.
#[derive(Debug, Error)]
pub enum SecretError {
    /// Environment variable backing the secret is not set.
    #[error("environment variable '{name}' is not set")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// File backing the secret could not be read.
    #[error("cannot read secret file {path}: {source}")]
    UnreadableFile {
        /// Path to the secret file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
}

/// Subprocess execution errors.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The process could not be started.
    #[error("failed to start '{program}': {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The process exited unsuccessfully.
    #[error("'{program}' exited with {}{}", exit_code_label(.exit_code), stderr_suffix(.stderr))]
    Failed {
        /// Program that failed.
        program: String,
        /// Exit code, `None` when terminated by a signal.
        exit_code: Option<i32>,
        /// Captured standard error (empty when streamed).
        stderr: String,
    },
}

/// Installation errors with the failing entity attached.
#[derive(Debug, Error)]
pub enum InstallError {
    /// Adding a chart repository failed.
    #[error("Could not add repo \"{repo}\": {source}")]
    Repository {
        /// Repository name.
        repo: String,
        /// Underlying cause.
        source: Box<ImpellerError>,
    },

    /// Refreshing the repository cache failed.
    #[error("Error updating Helm repos: {source}")]
    RepositoryUpdate {
        /// Underlying cause.
        source: ExecError,
    },

    /// Installing a release failed.
    #[error("Error installing release \"{release}\" ({stage}): {source}")]
    Release {
        /// Release name.
        release: String,
        /// Stage that failed.
        stage: ReleaseStage,
        /// Underlying cause.
        source: ExecError,
    },

    /// Preparing the Kubernetes client configuration failed.
    #[error("Error initializing Kubernetes config: {message}")]
    KubeConfig {
        /// Description of the failure.
        message: String,
    },
}

/// Stage of a release installation, used for error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseStage {
    /// Chart download and unpack.
    Fetch,
    /// Manifest rendering.
    Render,
    /// Manifest application through kubectl.
    Apply,
    /// Helm upgrade-install.
    Upgrade,
}

impl std::fmt::Display for ReleaseStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Fetch => "fetch",
            Self::Render => "render",
            Self::Apply => "apply",
            Self::Upgrade => "upgrade",
        };
        f.write_str(label)
    }
}

/// Result type alias for Impeller operations.
pub type Result<T> = std::result::Result<T, ImpellerError>;

fn exit_code_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {c}"),
        None => String::from("no exit code (terminated by signal)"),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

impl ExecError {
    /// Returns the exit code of a failed process, if it exited normally.
    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Failed { exit_code, .. } => *exit_code,
            Self::Spawn { .. } => None,
        }
    }

    /// Returns the captured standard error, empty when none was captured.
    #[must_use]
    pub fn stderr(&self) -> &str {
        match self {
            Self::Failed { stderr, .. } => stderr,
            Self::Spawn { .. } => "",
        }
    }
}

impl InstallError {
    /// Wraps an execution failure with release context.
    #[must_use]
    pub fn release(release: impl Into<String>, stage: ReleaseStage, source: ExecError) -> Self {
        Self::Release {
            release: release.into(),
            stage,
            source,
        }
    }

    /// Wraps a repository failure with repository context.
    #[must_use]
    pub fn repository(repo: impl Into<String>, source: impl Into<ImpellerError>) -> Self {
        Self::Repository {
            repo: repo.into(),
            source: Box::new(source.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_exec_message_includes_stderr() {
        let err = ExecError::Failed {
            program: String::from("helm"),
            exit_code: Some(1),
            stderr: String::from("Error: chart not found\n"),
        };
        assert_eq!(err.to_string(), "'helm' exited with exit code 1: Error: chart not found");
    }

    #[test]
    fn test_release_error_names_release_and_stage() {
        let err = ImpellerError::from(InstallError::release(
            "ingress",
            ReleaseStage::Apply,
            ExecError::Failed {
                program: String::from("kubectl"),
                exit_code: Some(2),
                stderr: String::new(),
            },
        ));
        let message = err.to_string();
        assert!(message.contains("\"ingress\""));
        assert!(message.contains("(apply)"));
        assert!(message.contains("exit code 2"));
    }

    #[test]
    fn test_repository_error_keeps_command_failure() {
        let err = InstallError::repository(
            "stable",
            ExecError::Failed {
                program: String::from("helm"),
                exit_code: Some(1),
                stderr: String::from("Error: looks like the repo is not valid"),
            },
        );
        assert!(err.to_string().starts_with("Could not add repo \"stable\""));
        match err {
            InstallError::Repository { source, .. } => {
                assert!(matches!(*source, ImpellerError::Exec(ExecError::Failed { .. })));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
