//! One orchestration run.
//!
//! The driver ties the stages together in their fixed order: repositories
//! are synchronized once, then releases are installed strictly one after
//! another in configuration order. Nothing runs concurrently; release order
//! in the configuration is the install-order contract.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::command::CommandRunner;
use crate::config::{ClusterConfig, DeploymentMethod};
use crate::error::Result;
use crate::installer::{Installer, ReleaseReport, RunOptions};
use crate::repos::RepositorySynchronizer;

/// Runs repository sync and release installation for one configuration.
pub struct Driver<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    options: &'a RunOptions,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    /// Cluster name.
    pub cluster: String,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Number of repositories synchronized.
    pub repositories: usize,
    /// Per-release results, in install order.
    pub releases: Vec<ReleaseReport>,
}

/// A command a run would issue, rendered with secrets masked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCommand {
    /// Repository or release the command belongs to, `None` for global
    /// commands.
    pub scope: Option<String>,
    /// Rendered command line.
    pub command: String,
}

impl<'a, R: CommandRunner + ?Sized> Driver<'a, R> {
    /// Creates a driver.
    #[must_use]
    pub const fn new(runner: &'a R, options: &'a RunOptions) -> Self {
        Self { runner, options }
    }

    /// Synchronizes repositories, then installs every release.
    ///
    /// # Errors
    ///
    /// Returns the first repository or release failure; later stages do not
    /// run.
    pub async fn run(&self, config: &ClusterConfig) -> Result<InstallReport> {
        let started_at = Utc::now();
        info!(
            "Deploying {} release(s) to cluster '{}'",
            config.releases.len(),
            config.name
        );

        RepositorySynchronizer::new(self.runner, &self.options.helm_bin)
            .sync(&config.helm.repos)
            .await?;

        let releases = Installer::new(self.runner, config, self.options)
            .install_all()
            .await?;

        Ok(InstallReport {
            cluster: config.name.clone(),
            dry_run: self.options.dry_run,
            started_at,
            finished_at: Utc::now(),
            repositories: config.helm.repos.len(),
            releases,
        })
    }

    /// Lists the commands [`Driver::run`] would issue, without running any.
    ///
    /// Override files are resolved against the current filesystem, so the
    /// listing reflects exactly what a run right now would pass.
    ///
    /// # Errors
    ///
    /// Returns an error if a repository credential cannot be resolved.
    pub fn plan(&self, config: &ClusterConfig) -> Result<Vec<PlannedCommand>> {
        let repos = RepositorySynchronizer::new(self.runner, &self.options.helm_bin);
        let mut commands = Vec::new();

        for repo in &config.helm.repos {
            commands.push(PlannedCommand {
                scope: Some(repo.name.clone()),
                command: repos.add_invocation(repo)?.render(),
            });
        }
        commands.push(PlannedCommand {
            scope: None,
            command: repos.update_invocation().render(),
        });

        let installer = Installer::new(self.runner, config, self.options);
        let resolver = installer.resolver();
        for release in &config.releases {
            let overrides = resolver.resolve(release);
            let invocations = match release.deployment_method {
                DeploymentMethod::Helm => vec![installer.upgrade_invocation(release, &overrides)],
                DeploymentMethod::Kubectl => {
                    let mut steps = vec![
                        installer.fetch_invocation(release),
                        installer.template_invocation(release, &overrides),
                    ];
                    if !self.options.dry_run {
                        steps.push(installer.apply_invocation());
                    }
                    steps
                }
            };
            commands.extend(invocations.into_iter().map(|invocation| PlannedCommand {
                scope: Some(release.name.clone()),
                command: invocation.render(),
            }));
        }

        Ok(commands)
    }
}

impl InstallReport {
    /// Total `kubectl apply` runs across releases.
    #[must_use]
    pub fn apply_attempts(&self) -> usize {
        self.releases.iter().map(|r| usize::from(r.apply_attempts)).sum()
    }

    /// Total override warnings across releases.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.releases.iter().map(|r| r.warnings.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::RecordingRunner;
    use crate::config::ConfigParser;

    const CONFIG: &str = r"
name: prod-east
helm:
  repos:
    - name: stable
      url: https://charts.example.com/stable
    - name: private
      url: https://charts.example.com/private
      username: deploy
      password: hunter2
releases:
  - name: crds
    chart_path: private/crds
    version: 0.3.0
    deployment_method: kubectl
  - name: ingress
    chart_path: stable/nginx-ingress
    version: 1.41.3
    namespace: ingress
    overrides:
      - target: controller.token
        value: abc123
";

    fn config() -> ClusterConfig {
        ConfigParser::new()
            .parse_yaml(CONFIG, None)
            .expect("test config parses")
    }

    #[tokio::test]
    async fn test_run_order() {
        let runner = RecordingRunner::new();
        let options = RunOptions::default();

        let report = Driver::new(&runner, &options)
            .run(&config())
            .await
            .expect("run succeeds");

        let sequence: Vec<String> = runner
            .calls_matching(&[])
            .into_iter()
            .map(|c| c.argv[..3].join(" "))
            .collect();
        assert_eq!(
            sequence,
            vec![
                "helm repo add",
                "helm repo add",
                "helm repo update",
                "helm fetch --version",
                "helm template --name",
                "kubectl apply --filename",
                "helm upgrade --install",
            ]
        );
        assert_eq!(report.repositories, 2);
        assert_eq!(report.releases.len(), 2);
        assert_eq!(report.apply_attempts(), 1);
        assert_eq!(report.warning_count(), 0);
    }

    #[tokio::test]
    async fn test_repo_failure_skips_releases() {
        let runner = RecordingRunner::new().script(&["helm", "repo", "update"], vec![Err(1)]);
        let options = RunOptions::default();

        let err = Driver::new(&runner, &options)
            .run(&config())
            .await
            .expect_err("repo update fails");

        assert!(err.to_string().contains("updating Helm repos"));
        assert!(runner.calls_matching(&["helm", "upgrade"]).is_empty());
        assert!(runner.calls_matching(&["helm", "fetch"]).is_empty());
    }

    #[test]
    fn test_plan_masks_secrets_and_runs_nothing() {
        let runner = RecordingRunner::new();
        let options = RunOptions {
            dry_run: true,
            ..RunOptions::default()
        };

        let plan = Driver::new(&runner, &options)
            .plan(&config())
            .expect("plan succeeds");

        assert!(runner.calls_matching(&[]).is_empty());
        assert_eq!(plan.len(), 6);
        assert!(plan.iter().all(|p| !p.command.contains("hunter2")));
        assert!(plan.iter().all(|p| !p.command.contains("abc123")));
        assert!(plan.iter().all(|p| !p.command.starts_with("kubectl")));
        assert_eq!(plan[2].scope, None);
        assert!(plan[5].command.ends_with("--dry-run"));
    }
}
