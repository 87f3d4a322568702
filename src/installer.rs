//! Release installation.
//!
//! Each release is installed with one of two strategies:
//!
//! - **Packaged upgrade** (`helm`, the default): a single
//!   `helm upgrade --install`, letting helm keep its own release records.
//! - **Direct apply** (`kubectl`): fetch and unpack the chart, render it with
//!   `helm template`, and pipe the manifests into `kubectl apply`.
//!
//! Direct apply issues `kubectl apply` at most twice. Charts that ship custom
//! resources together with their definitions commonly fail the first pass
//! because the definitions are not registered yet; the second pass picks up
//! what the first one created. Two failures in a row mean the manifests are
//! broken.

use std::path::PathBuf;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::command::{Argument, CommandBuilder, CommandRunner, Invocation};
use crate::config::{ClusterConfig, DeploymentMethod, Release};
use crate::error::{ExecError, InstallError, ReleaseStage, Result};
use crate::overrides::{OverrideResolver, ResolvedOverrides};

/// Default helm binary.
pub const HELM_BIN: &str = "helm";

/// Default kubectl binary.
pub const KUBECTL_BIN: &str = "kubectl";

/// Invocation context of one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Value files applied to every release, lowest precedence first.
    pub value_files: Vec<String>,
    /// Render or simulate instead of changing the cluster.
    pub dry_run: bool,
    /// Directory charts are unpacked into for direct apply. `None` uses the
    /// current directory.
    pub working_dir: Option<PathBuf>,
    /// Directory containing `values/<release>/...`.
    pub values_dir: PathBuf,
    /// Helm executable.
    pub helm_bin: String,
    /// Kubectl executable.
    pub kubectl_bin: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            value_files: Vec::new(),
            dry_run: false,
            working_dir: None,
            values_dir: PathBuf::new(),
            helm_bin: String::from(HELM_BIN),
            kubectl_bin: String::from(KUBECTL_BIN),
        }
    }
}

/// What happened to a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOutcome {
    /// Installed or upgraded on the cluster.
    Installed,
    /// Manifests rendered and printed, nothing applied.
    Rendered,
    /// Helm ran the upgrade in dry-run mode.
    DryRun,
}

/// Result of installing one release.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseReport {
    /// Release name.
    pub release: String,
    /// Chart reference.
    pub chart: String,
    /// Chart version.
    pub version: String,
    /// Target namespace.
    pub namespace: String,
    /// Strategy used.
    pub method: DeploymentMethod,
    /// Outcome.
    pub outcome: ReleaseOutcome,
    /// Number of `kubectl apply` runs (0, 1 or 2).
    pub apply_attempts: u8,
    /// Warnings recorded while resolving overrides.
    pub warnings: Vec<String>,
    /// Rendered manifests for dry-run direct apply.
    #[serde(skip)]
    pub manifest: Option<String>,
}

/// State of the bounded apply protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApplyAttempt {
    First,
    Second,
}

impl ApplyAttempt {
    /// The state after a failed attempt, `None` once the retry is spent.
    const fn after_failure(self) -> Option<Self> {
        match self {
            Self::First => Some(Self::Second),
            Self::Second => None,
        }
    }

    const fn number(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }
}

/// Installs the releases of a cluster configuration, one at a time.
pub struct Installer<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    config: &'a ClusterConfig,
    options: &'a RunOptions,
}

impl<'a, R: CommandRunner + ?Sized> Installer<'a, R> {
    /// Creates an installer.
    #[must_use]
    pub const fn new(runner: &'a R, config: &'a ClusterConfig, options: &'a RunOptions) -> Self {
        Self {
            runner,
            config,
            options,
        }
    }

    /// Installs every release in configuration order, stopping at the first
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns the first release failure, naming the release and stage.
    pub async fn install_all(&self) -> Result<Vec<ReleaseReport>> {
        let mut reports = Vec::with_capacity(self.config.releases.len());
        for release in &self.config.releases {
            reports.push(self.install(release).await?);
        }
        Ok(reports)
    }

    /// Installs a single release with the strategy it asks for.
    ///
    /// # Errors
    ///
    /// Returns an error naming the release and the failing stage.
    pub async fn install(&self, release: &Release) -> Result<ReleaseReport> {
        info!("Installing release: {} @ {}", release.name, release.version);
        let overrides = self.resolver().resolve(release);

        let mut report = ReleaseReport {
            release: release.name.clone(),
            chart: release.chart_path.clone(),
            version: release.version.clone(),
            namespace: release.namespace.clone(),
            method: release.deployment_method,
            outcome: ReleaseOutcome::Installed,
            apply_attempts: 0,
            warnings: overrides.warnings.clone(),
            manifest: None,
        };

        match release.deployment_method {
            DeploymentMethod::Kubectl => {
                self.install_via_kubectl(release, &overrides, &mut report)
                    .await?;
            }
            DeploymentMethod::Helm => {
                self.install_via_helm(release, &overrides).await?;
                if self.options.dry_run {
                    report.outcome = ReleaseOutcome::DryRun;
                }
            }
        }

        Ok(report)
    }

    /// The override resolver for this run.
    #[must_use]
    pub fn resolver(&self) -> OverrideResolver<'a> {
        OverrideResolver::new(&self.options.value_files, &self.config.name)
            .with_base_dir(&self.options.values_dir)
    }

    async fn install_via_helm(&self, release: &Release, overrides: &ResolvedOverrides) -> Result<()> {
        if self.options.dry_run {
            info!("Running dry run: {}", release.name);
        }
        let invocation = self.upgrade_invocation(release, overrides);
        self.runner
            .run(&invocation, false, None)
            .await
            .map_err(|e| InstallError::release(&release.name, ReleaseStage::Upgrade, e))?;
        Ok(())
    }

    async fn install_via_kubectl(
        &self,
        release: &Release,
        overrides: &ResolvedOverrides,
        report: &mut ReleaseReport,
    ) -> Result<()> {
        self.runner
            .run(&self.fetch_invocation(release), false, None)
            .await
            .map_err(|e| InstallError::release(&release.name, ReleaseStage::Fetch, e))?;

        let manifest = self
            .runner
            .run(&self.template_invocation(release, overrides), true, None)
            .await
            .map_err(|e| InstallError::release(&release.name, ReleaseStage::Render, e))?
            .stdout_lossy();

        if self.options.dry_run {
            info!("Running dry run: {}", release.name);
            let mut stdout = tokio::io::stdout();
            stdout
                .write_all(format!("rendered chart output:\n{manifest}").as_bytes())
                .await?;
            stdout.flush().await?;
            report.outcome = ReleaseOutcome::Rendered;
            report.manifest = Some(manifest);
            return Ok(());
        }

        report.apply_attempts = self
            .apply_with_retry(&manifest)
            .await
            .map_err(|e| InstallError::release(&release.name, ReleaseStage::Apply, e))?;
        Ok(())
    }

    /// Runs `kubectl apply`, retrying exactly once with identical input.
    ///
    /// Returns the number of attempts made.
    async fn apply_with_retry(&self, manifest: &str) -> std::result::Result<u8, ExecError> {
        let invocation = self.apply_invocation();
        let mut attempt = ApplyAttempt::First;

        loop {
            match self
                .runner
                .run(&invocation, false, Some(manifest.as_bytes()))
                .await
            {
                Ok(_) => return Ok(attempt.number()),
                Err(e) => match attempt.after_failure() {
                    Some(next) => {
                        warn!("kubectl apply failed, retrying once for dependent resources: {e}");
                        attempt = next;
                    }
                    None => return Err(e),
                },
            }
        }
    }

    /// `helm upgrade --install` for a release.
    #[must_use]
    pub fn upgrade_invocation(&self, release: &Release, overrides: &ResolvedOverrides) -> Invocation {
        let helm = &self.config.helm;
        let mut cb = CommandBuilder::new(&self.options.helm_bin);
        cb.add(Argument::raw("upgrade"))
            .add(Argument::raw("--install"))
            .add(Argument::raw(&release.name))
            .add(Argument::raw(&release.chart_path))
            .add(Argument::long("version", &release.version));

        if helm.debug {
            cb.add(Argument::raw("--debug"));
        }
        cb.add_opt(Argument::long_opt("namespace", non_empty(&release.namespace)));
        if helm.log_level != 0 {
            cb.add(Argument::long("v", helm.log_level.to_string()));
        }

        cb.extend(overrides.arguments());

        if self.options.dry_run {
            cb.add(Argument::raw("--dry-run"));
        }
        cb.build()
    }

    /// `helm fetch --untar` for a release.
    #[must_use]
    pub fn fetch_invocation(&self, release: &Release) -> Invocation {
        let mut cb = CommandBuilder::new(&self.options.helm_bin);
        cb.add(Argument::raw("fetch"))
            .add(Argument::long("version", &release.version))
            .add(Argument::raw("--untar"))
            .add(Argument::raw(&release.chart_path));
        match &self.options.working_dir {
            Some(dir) => cb.current_dir(dir).build(),
            None => cb.build(),
        }
    }

    /// `helm template` over the unpacked chart.
    #[must_use]
    pub fn template_invocation(&self, release: &Release, overrides: &ResolvedOverrides) -> Invocation {
        let chart_dir = self.options.working_dir.as_ref().map_or_else(
            || release.chart_dir().to_string(),
            |dir| dir.join(release.chart_dir()).to_string_lossy().into_owned(),
        );

        let mut cb = CommandBuilder::new(&self.options.helm_bin);
        cb.add(Argument::raw("template"))
            .add_opt(Argument::long_opt("namespace", non_empty(&release.namespace)))
            .add_opt(Argument::long_opt("name", non_empty(&release.name)))
            .extend(overrides.arguments());
        cb.add(Argument::raw(chart_dir));
        cb.build()
    }

    /// `kubectl apply --filename -`.
    #[must_use]
    pub fn apply_invocation(&self) -> Invocation {
        let mut cb = CommandBuilder::new(&self.options.kubectl_bin);
        cb.add(Argument::raw("apply"))
            .add(Argument::long("filename", "-"));
        cb.build()
    }
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::RecordingRunner;
    use crate::config::{Override, SecretValue};
    use crate::error::ImpellerError;

    const MANIFEST: &str = "apiVersion: v1\nkind: Namespace\nmetadata:\n  name: ingress\n";

    fn release(name: &str, method: DeploymentMethod) -> Release {
        Release {
            name: name.to_string(),
            chart_path: format!("stable/{name}"),
            version: String::from("1.0.0"),
            namespace: String::from("platform"),
            deployment_method: method,
            value_files: vec![],
            overrides: vec![Override {
                target: String::from("auth.token"),
                value: SecretValue::literal("sekret"),
            }],
        }
    }

    fn cluster(releases: Vec<Release>) -> ClusterConfig {
        ClusterConfig {
            name: String::from("test"),
            helm: crate::config::HelmConfig::default(),
            releases,
        }
    }

    fn kubectl_runner() -> RecordingRunner {
        RecordingRunner::new().script(&["helm", "template"], vec![Ok(MANIFEST)])
    }

    #[tokio::test]
    async fn test_apply_retry_succeeds_on_second_attempt() {
        let runner = kubectl_runner().script(&["kubectl", "apply"], vec![Err(1), Ok("")]);
        let config = cluster(vec![release("crds", DeploymentMethod::Kubectl)]);
        let options = RunOptions::default();

        let reports = Installer::new(&runner, &config, &options)
            .install_all()
            .await
            .expect("second apply succeeds");

        let applies = runner.calls_matching(&["kubectl", "apply"]);
        assert_eq!(applies.len(), 2);
        assert_eq!(applies[0].argv, applies[1].argv);
        assert_eq!(applies[0].stdin.as_deref(), Some(MANIFEST.as_bytes()));
        assert_eq!(applies[0].stdin, applies[1].stdin);
        assert_eq!(reports[0].apply_attempts, 2);
        assert_eq!(reports[0].outcome, ReleaseOutcome::Installed);
    }

    #[tokio::test]
    async fn test_apply_twice_failing_reports_second_error() {
        let runner = kubectl_runner().script(&["kubectl", "apply"], vec![Err(1), Err(7), Ok("")]);
        let config = cluster(vec![release("crds", DeploymentMethod::Kubectl)]);
        let options = RunOptions::default();

        let err = Installer::new(&runner, &config, &options)
            .install_all()
            .await
            .expect_err("both applies fail");

        match err {
            ImpellerError::Install(InstallError::Release { release, stage, source }) => {
                assert_eq!(release, "crds");
                assert_eq!(stage, ReleaseStage::Apply);
                assert_eq!(source.exit_code(), Some(7));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.calls_matching(&["kubectl", "apply"]).len(), 2);
    }

    #[tokio::test]
    async fn test_first_apply_success_runs_once() {
        let runner = kubectl_runner();
        let config = cluster(vec![release("crds", DeploymentMethod::Kubectl)]);
        let options = RunOptions::default();

        let reports = Installer::new(&runner, &config, &options)
            .install_all()
            .await
            .expect("apply succeeds");

        assert_eq!(runner.calls_matching(&["kubectl", "apply"]).len(), 1);
        assert_eq!(reports[0].apply_attempts, 1);
    }

    #[tokio::test]
    async fn test_dry_run_direct_apply_renders_without_applying() {
        let runner = kubectl_runner();
        let config = cluster(vec![release("crds", DeploymentMethod::Kubectl)]);
        let options = RunOptions {
            dry_run: true,
            ..RunOptions::default()
        };

        let reports = Installer::new(&runner, &config, &options)
            .install_all()
            .await
            .expect("dry run succeeds");

        assert!(runner.calls_matching(&["kubectl"]).is_empty());
        assert_eq!(runner.calls_matching(&["helm", "template"]).len(), 1);
        assert_eq!(reports[0].outcome, ReleaseOutcome::Rendered);
        assert_eq!(reports[0].manifest.as_deref(), Some(MANIFEST));
    }

    #[tokio::test]
    async fn test_strategy_dispatch_is_exclusive() {
        let runner = kubectl_runner();
        let config = cluster(vec![release("ingress", DeploymentMethod::Helm)]);
        let options = RunOptions::default();

        Installer::new(&runner, &config, &options)
            .install_all()
            .await
            .expect("upgrade succeeds");

        assert_eq!(runner.calls_matching(&["helm", "upgrade", "--install"]).len(), 1);
        assert!(runner.calls_matching(&["helm", "fetch"]).is_empty());
        assert!(runner.calls_matching(&["helm", "template"]).is_empty());
        assert!(runner.calls_matching(&["kubectl"]).is_empty());

        let runner = kubectl_runner();
        let config = cluster(vec![release("crds", DeploymentMethod::Kubectl)]);
        Installer::new(&runner, &config, &options)
            .install_all()
            .await
            .expect("direct apply succeeds");

        assert!(runner.calls_matching(&["helm", "upgrade"]).is_empty());
        assert_eq!(runner.calls_matching(&["helm", "fetch"]).len(), 1);
    }

    #[tokio::test]
    async fn test_upgrade_command_shape() {
        let runner = RecordingRunner::new();
        let mut config = cluster(vec![release("ingress", DeploymentMethod::Helm)]);
        config.helm.debug = true;
        config.helm.log_level = 2;
        let options = RunOptions {
            dry_run: true,
            ..RunOptions::default()
        };

        let reports = Installer::new(&runner, &config, &options)
            .install_all()
            .await
            .expect("dry run succeeds");

        let call = &runner.calls_matching(&["helm", "upgrade"])[0];
        assert_eq!(
            call.argv,
            vec![
                "helm", "upgrade", "--install", "ingress", "stable/ingress", "--version", "1.0.0",
                "--debug", "--namespace", "platform", "--v", "2", "--set", "auth.token=sekret",
                "--dry-run",
            ]
        );
        assert!(!call.rendered.contains("sekret"));
        assert_eq!(reports[0].outcome, ReleaseOutcome::DryRun);
    }

    #[tokio::test]
    async fn test_template_uses_unpacked_chart_in_working_dir() {
        let runner = kubectl_runner();
        let config = cluster(vec![release("crds", DeploymentMethod::Kubectl)]);
        let options = RunOptions {
            working_dir: Some(PathBuf::from("/tmp/impeller-work")),
            ..RunOptions::default()
        };

        Installer::new(&runner, &config, &options)
            .install_all()
            .await
            .expect("direct apply succeeds");

        let template = &runner.calls_matching(&["helm", "template"])[0];
        assert_eq!(
            template.argv,
            vec![
                "helm", "template", "--namespace", "platform", "--name", "crds", "--set",
                "auth.token=sekret", "/tmp/impeller-work/crds",
            ]
        );
    }

    #[tokio::test]
    async fn test_first_failure_stops_later_releases() {
        let runner = RecordingRunner::new().script(&["helm", "upgrade", "--install", "first"], vec![Err(1)]);
        let config = cluster(vec![
            release("first", DeploymentMethod::Helm),
            release("second", DeploymentMethod::Helm),
        ]);
        let options = RunOptions::default();

        let err = Installer::new(&runner, &config, &options)
            .install_all()
            .await
            .expect_err("first release fails");

        assert!(err.to_string().contains("\"first\""));
        assert!(runner.calls_matching(&["helm", "upgrade", "--install", "second"]).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_release() {
        let runner = RecordingRunner::new().script(&["helm", "fetch"], vec![Err(1)]);
        let config = cluster(vec![release("crds", DeploymentMethod::Kubectl)]);
        let options = RunOptions::default();

        let err = Installer::new(&runner, &config, &options)
            .install_all()
            .await
            .expect_err("fetch fails");

        assert!(matches!(
            err,
            ImpellerError::Install(InstallError::Release { stage: ReleaseStage::Fetch, .. })
        ));
        assert!(runner.calls_matching(&["helm", "template"]).is_empty());
    }

    #[tokio::test]
    async fn test_render_failure_aborts_release() {
        let runner = RecordingRunner::new().script(&["helm", "template"], vec![Err(1)]);
        let config = cluster(vec![
            release("crds", DeploymentMethod::Kubectl),
            release("ingress", DeploymentMethod::Helm),
        ]);
        let options = RunOptions::default();

        let err = Installer::new(&runner, &config, &options)
            .install_all()
            .await
            .expect_err("render fails");

        match err {
            ImpellerError::Install(InstallError::Release { release, stage, .. }) => {
                assert_eq!(release, "crds");
                assert_eq!(stage, ReleaseStage::Render);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runner.calls_matching(&["helm", "fetch"]).len(), 1);
        assert!(runner.calls_matching(&["kubectl"]).is_empty());
        assert!(runner.calls_matching(&["helm", "upgrade"]).is_empty());
    }
}
