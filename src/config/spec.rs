//! Configuration specification types for the deployment driver.
//!
//! This module defines all the structs that map to the `impeller.yaml` file.
//! The configuration is read-only once parsed: a run consumes it and never
//! mutates it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::secret::SecretValue;

/// The root configuration structure for a cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Cluster name, used to select per-cluster value files.
    #[serde(default)]
    pub name: String,
    /// Helm-wide settings and chart repositories.
    #[serde(default)]
    pub helm: HelmConfig,
    /// Releases to install, in install order.
    #[serde(default)]
    pub releases: Vec<Release>,
}

/// Helm-wide configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelmConfig {
    /// Chart repositories to register before installing.
    #[serde(default)]
    pub repos: Vec<HelmRepo>,
    /// Pass `--debug` to upgrade-install.
    #[serde(default)]
    pub debug: bool,
    /// Helm log verbosity, passed as `--v` when non-zero.
    #[serde(default)]
    pub log_level: u32,
    /// Legacy server-side bootstrap: force upgrade of the server component.
    #[serde(default)]
    pub upgrade: bool,
    /// Legacy server-side bootstrap: service account for the server component.
    #[serde(default)]
    pub service_account: String,
    /// Legacy server-side bootstrap: manifest overrides.
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

/// A chart repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HelmRepo {
    /// Local repository name.
    pub name: String,
    /// Repository URL.
    pub url: String,
    /// Optional basic-auth username.
    #[serde(default)]
    pub username: Option<SecretValue>,
    /// Optional basic-auth password.
    #[serde(default)]
    pub password: Option<SecretValue>,
}

/// How a release is installed onto the cluster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(from = "String", into = "String")]
pub enum DeploymentMethod {
    /// Render with helm, apply with kubectl.
    Kubectl,
    /// `helm upgrade --install`.
    #[default]
    Helm,
}

/// One deployable unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Release {
    /// Release name.
    pub name: String,
    /// Chart reference, e.g. `stable/nginx-ingress`.
    pub chart_path: String,
    /// Pinned chart version.
    pub version: String,
    /// Target namespace (empty for the client default).
    #[serde(default)]
    pub namespace: String,
    /// Installation strategy.
    #[serde(default)]
    pub deployment_method: DeploymentMethod,
    /// Release-specific value files, in precedence order.
    #[serde(default)]
    pub value_files: Vec<String>,
    /// Individual key overrides, in order.
    #[serde(default)]
    pub overrides: Vec<Override>,
}

/// A single `key=value` override for chart templating.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Override {
    /// Dotted value path, e.g. `controller.replicaCount`.
    pub target: String,
    /// Value to inject.
    pub value: SecretValue,
}

impl From<String> for DeploymentMethod {
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case("kubectl") {
            Self::Kubectl
        } else {
            Self::Helm
        }
    }
}

impl From<DeploymentMethod> for String {
    fn from(method: DeploymentMethod) -> Self {
        method.to_string()
    }
}

impl std::fmt::Display for DeploymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kubectl => f.write_str("kubectl"),
            Self::Helm => f.write_str("helm"),
        }
    }
}

impl ClusterConfig {
    /// Returns release names in install order.
    #[must_use]
    pub fn release_names(&self) -> Vec<&str> {
        self.releases.iter().map(|r| r.name.as_str()).collect()
    }

    /// Returns true if any legacy server-side bootstrap setting is present.
    #[must_use]
    pub fn uses_legacy_bootstrap(&self) -> bool {
        self.helm.upgrade || !self.helm.service_account.is_empty() || !self.helm.overrides.is_empty()
    }
}

impl Release {
    /// Returns the directory name the chart unpacks into.
    #[must_use]
    pub fn chart_dir(&self) -> &str {
        self.chart_path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(&self.chart_path)
    }
}
