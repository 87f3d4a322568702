//! Loading of cluster configuration files.
//!
//! A configuration is read from YAML, then relative release value files are
//! anchored to the directory the configuration lives in, so a run started
//! from a subdirectory (see [`find_config_file`]) passes the same files as a
//! run started next to the configuration.

use crate::error::{ConfigError, ImpellerError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::ClusterConfig;

/// Environment variable replacing the cluster name from the file.
const CLUSTER_NAME_ENV: &str = "IMPELLER_CLUSTER_NAME";

/// Configuration parser for loading cluster configuration.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Directory relative value files and `.env` are resolved against.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the directory relative paths are resolved against. Without one,
    /// the configuration file's own directory is used.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file and anchors relative value files.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, or not a valid
    /// configuration.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ClusterConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                }
                .into());
            }
            Err(e) => {
                return Err(ConfigError::ParseError {
                    message: format!("cannot read configuration: {e}"),
                    location: Some(path.display().to_string()),
                }
                .into());
            }
        };

        let mut config = self.parse_yaml(&content, Some(path))?;
        let base = self
            .base_path
            .clone()
            .or_else(|| path.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        anchor_value_files(&mut config, &base);
        Ok(config)
    }

    /// Parses configuration from a YAML string. Paths are left as written.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid, with the line and column when
    /// known.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<ClusterConfig> {
        let config: ClusterConfig = serde_yaml::from_str(content).map_err(|e| {
            let file = source.map_or_else(|| String::from("<input>"), |p| p.display().to_string());
            let location = e
                .location()
                .map_or(file.clone(), |l| format!("{file}:{}:{}", l.line(), l.column()));
            ImpellerError::Config(ConfigError::ParseError {
                message: e.to_string(),
                location: Some(location),
            })
        })?;

        debug!(
            "Parsed cluster '{}' with {} release(s) and {} repo(s)",
            config.name,
            config.releases.len(),
            config.helm.repos.len()
        );
        Ok(config)
    }

    /// Loads configuration, then applies `IMPELLER_CLUSTER_NAME` if set.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be loaded.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<ClusterConfig> {
        let mut config = self.load_file(path)?;
        if let Ok(name) = std::env::var(CLUSTER_NAME_ENV) {
            debug!("Cluster name '{name}' taken from {CLUSTER_NAME_ENV}");
            config.name = name;
        }
        Ok(config)
    }

    /// Exports variables from `.env` in the base directory, if one exists.
    /// Secrets given as `{ env: NAME }` can be kept there.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_deref()
            .unwrap_or_else(|| Path::new("."))
            .join(".env");

        match dotenvy::from_path(&env_path) {
            Ok(()) => {
                info!("Loaded environment from: {}", env_path.display());
                Ok(())
            }
            Err(dotenvy::Error::Io(e)) if e.kind() == ErrorKind::NotFound => {
                debug!("No .env at {}", env_path.display());
                Ok(())
            }
            Err(e) => Err(ConfigError::ParseError {
                message: format!("invalid .env file: {e}"),
                location: Some(env_path.display().to_string()),
            }
            .into()),
        }
    }
}

/// Rewrites relative release value files as paths under `base`.
fn anchor_value_files(config: &mut ClusterConfig, base: &Path) {
    if base.as_os_str().is_empty() {
        return;
    }
    for release in &mut config.releases {
        for file in &mut release.value_files {
            if Path::new(file.as_str()).is_relative() {
                *file = base.join(file.as_str()).to_string_lossy().into_owned();
            }
        }
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "impeller.yaml",
    "impeller.yml",
    "cluster.yaml",
    "cluster.yml",
];

/// Finds the configuration file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ImpellerError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeploymentMethod, SecretValue};
    use tempfile::TempDir;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r"
name: staging
";
        let parser = ConfigParser::new();
        let config = parser.parse_yaml(yaml, None).expect("minimal config parses");

        assert_eq!(config.name, "staging");
        assert!(config.releases.is_empty());
        assert!(config.helm.repos.is_empty());
        assert!(!config.helm.debug);
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r"
name: prod-east
helm:
  debug: true
  log_level: 3
  repos:
    - name: stable
      url: https://charts.example.com/stable
    - name: private
      url: https://charts.example.com/private
      username: deploy
      password:
        env: PRIVATE_REPO_PASSWORD
releases:
  - name: cert-manager-crds
    chart_path: private/cert-manager-crds
    version: 1.4.0
    deployment_method: kubectl
  - name: ingress
    chart_path: stable/nginx-ingress
    version: 1.41.3
    namespace: ingress
    value_files:
      - values/ingress/extra.yaml
    overrides:
      - target: controller.replicaCount
        value: 3
      - target: controller.hostNetwork
        value: true
      - target: controller.auth.token
        value:
          file: /run/secrets/ingress-token
";
        let parser = ConfigParser::new();
        let config = parser.parse_yaml(yaml, None).expect("full config parses");

        assert_eq!(config.name, "prod-east");
        assert!(config.helm.debug);
        assert_eq!(config.helm.log_level, 3);
        assert_eq!(config.helm.repos.len(), 2);
        assert_eq!(
            config.helm.repos[1].password,
            Some(SecretValue::env("PRIVATE_REPO_PASSWORD"))
        );
        assert_eq!(config.release_names(), vec!["cert-manager-crds", "ingress"]);
        assert_eq!(config.releases[0].deployment_method, DeploymentMethod::Kubectl);
        assert_eq!(config.releases[1].deployment_method, DeploymentMethod::Helm);
        assert_eq!(config.releases[1].overrides.len(), 3);
        assert_eq!(config.releases[1].overrides[0].value, SecretValue::literal("3"));
        assert_eq!(config.releases[1].overrides[1].value, SecretValue::literal("true"));
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let parser = ConfigParser::new();
        let result = parser.parse_yaml("releases: [unterminated", None);
        assert!(matches!(
            result,
            Err(ImpellerError::Config(ConfigError::ParseError { .. }))
        ));
    }

    #[test]
    fn test_find_config_file_walks_up() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(temp.path().join("impeller.yaml"), "name: x\n").expect("write config");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("create nested dirs");

        let found = find_config_file(&nested).expect("config should be found");
        assert_eq!(found, temp.path().join("impeller.yaml"));
    }

    #[test]
    fn test_invalid_yaml_reports_line() {
        let err = ConfigParser::new()
            .parse_yaml("name: x\nreleases:\n  - name: [\n", Some(Path::new("impeller.yaml")))
            .expect_err("invalid yaml");
        match err {
            ImpellerError::Config(ConfigError::ParseError { location, .. }) => {
                let location = location.expect("location present");
                assert!(location.starts_with("impeller.yaml:"), "{location}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let result = ConfigParser::new().load_file(temp.path().join("impeller.yaml"));
        assert!(matches!(
            result,
            Err(ImpellerError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_relative_value_files_anchored_to_config_dir() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let path = temp.path().join("impeller.yaml");
        std::fs::write(
            &path,
            r"
name: dev
releases:
  - name: ingress
    chart_path: stable/nginx-ingress
    version: 1.0.0
    value_files:
      - values/ingress/extra.yaml
      - /etc/impeller/shared.yaml
",
        )
        .expect("write config");

        let config = ConfigParser::new().load_file(&path).expect("config loads");
        let files = &config.releases[0].value_files;
        assert_eq!(
            files[0],
            temp.path().join("values/ingress/extra.yaml").to_string_lossy()
        );
        assert_eq!(files[1], "/etc/impeller/shared.yaml");
    }

    #[test]
    fn test_dotenv_exports_variables() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(
            temp.path().join(".env"),
            "IMPELLER_TEST_DOTENV_TOKEN=from-dotenv\n",
        )
        .expect("write .env");

        ConfigParser::new()
            .with_base_path(temp.path())
            .load_dotenv()
            .expect(".env loads");
        assert_eq!(
            std::env::var("IMPELLER_TEST_DOTENV_TOKEN").as_deref(),
            Ok("from-dotenv")
        );
    }

    #[test]
    fn test_missing_dotenv_is_ignored() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        ConfigParser::new()
            .with_base_path(temp.path())
            .load_dotenv()
            .expect("absent .env is fine");
    }
}
