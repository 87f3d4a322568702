//! Resolvable secret references.
//!
//! A secret in the cluster configuration is never stored as plaintext in the
//! parsed config; it is a reference that yields its value only when resolved.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::SecretError;

/// A value that is resolved at use time from one of several sources.
///
/// In YAML a plain scalar is a literal, `{ env: NAME }` reads an environment
/// variable and `{ file: path }` reads a file. Numbers and booleans are kept
/// in their YAML spelling, so `3` and `true` become `"3"` and `"true"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged, try_from = "SecretRepr")]
pub enum SecretValue {
    /// Inline value.
    Literal(String),
    /// Value read from an environment variable.
    Env {
        /// Name of the environment variable.
        env: String,
    },
    /// Value read from a file.
    File {
        /// Path to the file.
        file: PathBuf,
    },
}

/// Accepted YAML shapes, before scalars are normalized to strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum SecretRepr {
    Env { env: String },
    File { file: PathBuf },
    Scalar(serde_yaml::Value),
}

impl TryFrom<SecretRepr> for SecretValue {
    type Error = String;

    fn try_from(repr: SecretRepr) -> Result<Self, Self::Error> {
        match repr {
            SecretRepr::Env { env } => Ok(Self::Env { env }),
            SecretRepr::File { file } => Ok(Self::File { file }),
            SecretRepr::Scalar(value) => match value {
                serde_yaml::Value::String(s) => Ok(Self::Literal(s)),
                serde_yaml::Value::Number(n) => Ok(Self::Literal(n.to_string())),
                serde_yaml::Value::Bool(b) => Ok(Self::Literal(b.to_string())),
                serde_yaml::Value::Null => Ok(Self::Literal(String::new())),
                _ => Err(String::from(
                    "expected a scalar, { env: NAME } or { file: path }",
                )),
            },
        }
    }
}

impl SecretValue {
    /// Creates a literal secret.
    #[must_use]
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal(value.into())
    }

    /// Creates an environment-backed secret.
    #[must_use]
    pub fn env(name: impl Into<String>) -> Self {
        Self::Env { env: name.into() }
    }

    /// Creates a file-backed secret.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File { file: path.into() }
    }

    /// Resolves the secret to its plaintext value.
    ///
    /// File contents lose a single trailing newline, the way editors leave
    /// one behind.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing variable is unset or the file cannot
    /// be read.
    pub fn resolve(&self) -> Result<String, SecretError> {
        match self {
            Self::Literal(value) => Ok(value.clone()),
            Self::Env { env } => std::env::var(env).map_err(|_| SecretError::MissingEnvVar {
                name: env.clone(),
            }),
            Self::File { file } => {
                let content =
                    std::fs::read_to_string(file).map_err(|source| SecretError::UnreadableFile {
                        path: file.clone(),
                        source,
                    })?;
                let trimmed = content
                    .strip_suffix("\r\n")
                    .or_else(|| content.strip_suffix('\n'))
                    .unwrap_or(&content);
                Ok(trimmed.to_string())
            }
        }
    }

    /// Describes the source without revealing the value.
    #[must_use]
    pub fn source_label(&self) -> String {
        match self {
            Self::Literal(_) => String::from("literal"),
            Self::Env { env } => format!("env:{env}"),
            Self::File { file } => format!("file:{}", file.display()),
        }
    }
}
