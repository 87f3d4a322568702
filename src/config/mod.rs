//! Configuration module for the Impeller deployment driver.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `impeller.yaml`
//! - Resolvable secret references used by repositories and overrides
//! - Validation of configuration values

mod parser;
mod secret;
mod spec;
mod validator;

pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use secret::SecretValue;
pub use spec::{ClusterConfig, DeploymentMethod, HelmConfig, HelmRepo, Override, Release};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
