//! Override resolution for releases.
//!
//! Helm applies value files and `--set` pairs with last-wins semantics, so
//! the order produced here is the precedence order:
//!
//! 1. value files given for the whole run
//! 2. `values/<release>/default.yaml`
//! 3. the release's own value files
//! 4. `values/<release>/<cluster>.yaml`
//! 5. the release's key overrides, as a single `--set`
//!
//! Optional sources that are missing or fail to resolve are skipped with a
//! warning; nothing here aborts a release. Results are recomputed on every
//! call.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::command::Argument;
use crate::config::Release;

/// Directory holding per-release value files, relative to the base directory.
pub const VALUES_DIR: &str = "values";

/// Computes the override arguments for releases of one cluster.
#[derive(Debug, Clone)]
pub struct OverrideResolver<'a> {
    value_files: &'a [String],
    cluster_name: &'a str,
    base_dir: PathBuf,
}

/// Override arguments for one release.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedOverrides {
    /// `-f <path>` arguments in precedence order.
    pub files: Vec<Argument>,
    /// Combined `--set k=v,...` argument, secret.
    pub set: Option<Argument>,
    /// Warnings recorded while resolving.
    pub warnings: Vec<String>,
}

impl<'a> OverrideResolver<'a> {
    /// Creates a resolver for the given run-wide value files and cluster.
    #[must_use]
    pub const fn new(value_files: &'a [String], cluster_name: &'a str) -> Self {
        Self {
            value_files,
            cluster_name,
            base_dir: PathBuf::new(),
        }
    }

    /// Looks for `values/` under `dir` instead of the current directory.
    #[must_use]
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Path of the release's default value file.
    #[must_use]
    pub fn default_values_path(&self, release: &Release) -> PathBuf {
        self.base_dir
            .join(VALUES_DIR)
            .join(&release.name)
            .join("default.yaml")
    }

    /// Path of the release's per-cluster value file, `None` without a
    /// cluster name.
    #[must_use]
    pub fn cluster_values_path(&self, release: &Release) -> Option<PathBuf> {
        (!self.cluster_name.is_empty()).then(|| {
            self.base_dir
                .join(VALUES_DIR)
                .join(&release.name)
                .join(format!("{}.yaml", self.cluster_name))
        })
    }

    /// Resolves the override arguments for a release.
    #[must_use]
    pub fn resolve(&self, release: &Release) -> ResolvedOverrides {
        let mut resolved = ResolvedOverrides::default();

        for file in self.value_files {
            let file = file.trim();
            if file.is_empty() {
                resolved.warn(String::from("Ignoring blank value file name"));
                continue;
            }
            resolved.push_file(file);
        }

        let default_path = self.default_values_path(release);
        if default_path.is_file() {
            resolved.push_file(&default_path.to_string_lossy());
        } else {
            debug!("No default values for {}: {}", release.name, default_path.display());
        }

        for file in &release.value_files {
            if Path::new(file).is_file() {
                resolved.push_file(file);
            } else {
                resolved.warn(format!("Value file does not exist: {file}"));
            }
        }

        if let Some(cluster_path) = self.cluster_values_path(release)
            && cluster_path.is_file()
        {
            resolved.push_file(&cluster_path.to_string_lossy());
        }

        resolved.set = Self::resolve_set(release, &mut resolved.warnings);
        resolved
    }

    fn resolve_set(release: &Release, warnings: &mut Vec<String>) -> Option<Argument> {
        let mut pairs = Vec::with_capacity(release.overrides.len());

        for entry in &release.overrides {
            info!("Overriding value for: {}", entry.target);
            let value = match entry.value.resolve() {
                Ok(value) => value,
                Err(e) => {
                    let message = format!(
                        "Could not get override value for '{}' ({}), skipping: {e}",
                        entry.target,
                        entry.value.source_label()
                    );
                    warn!("{message}");
                    warnings.push(message);
                    continue;
                }
            };
            if value.is_empty() {
                let message = format!("Override value for '{}' is blank", entry.target);
                warn!("{message}");
                warnings.push(message);
            }
            pairs.push(format!("{}={value}", entry.target));
        }

        (!pairs.is_empty()).then(|| Argument::long("set", pairs.join(",")).secret())
    }
}

impl ResolvedOverrides {
    fn push_file(&mut self, path: &str) {
        info!("Adding override file: {path}");
        self.files.push(Argument::short("f", path));
    }

    fn warn(&mut self, message: String) {
        warn!("{message}");
        self.warnings.push(message);
    }

    /// All override arguments in command order.
    #[must_use]
    pub fn arguments(&self) -> Vec<Argument> {
        self.files.iter().cloned().chain(self.set.clone()).collect()
    }

    /// The file paths passed with `-f`, in order.
    #[must_use]
    pub fn file_paths(&self) -> Vec<&str> {
        self.files.iter().map(Argument::value).collect()
    }
}
