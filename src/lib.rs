// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Impeller
//!
//! A declarative installer for Helm releases.
//!
//! ## Overview
//!
//! Impeller reads a cluster description and drives `helm` and `kubectl` to
//! bring a Kubernetes cluster to it:
//!
//! - Chart repositories are registered (with credentials) and refreshed once
//! - Releases are installed strictly in configuration order
//! - Value overrides are layered with a fixed precedence
//! - Secrets never appear in logged command lines
//!
//! ## Deployment methods
//!
//! 1. **helm**: `helm upgrade --install` with the layered values
//! 2. **kubectl**: the chart is fetched and rendered with `helm template`,
//!    then piped into `kubectl apply`, which is retried once on failure
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`command`]: Argument model, command builder and process runner
//! - [`overrides`]: Value-override resolution
//! - [`repos`]: Chart repository synchronization
//! - [`installer`]: Per-release installation
//! - [`kubeconfig`]: Kubernetes client configuration bootstrap
//! - [`driver`]: One orchestration run
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! name: prod-east
//!
//! helm:
//!   repos:
//!     - name: private
//!       url: https://charts.example.com/private
//!       username: deploy
//!       password:
//!         env: CHARTS_PASSWORD
//!
//! releases:
//!   - name: crds
//!     chart_path: private/crds
//!     version: 0.3.0
//!     deployment_method: kubectl
//!   - name: ingress
//!     chart_path: private/nginx-ingress
//!     version: 1.41.3
//!     namespace: ingress
//!     value_files:
//!       - ingress-common.yaml
//!     overrides:
//!       - target: controller.apiToken
//!         value:
//!           file: /run/secrets/ingress-token
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod command;
pub mod config;
pub mod driver;
pub mod error;
pub mod installer;
pub mod kubeconfig;
pub mod overrides;
pub mod repos;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use command::{Argument, CommandBuilder, CommandRunner, Invocation, ProcessRunner};
pub use config::{ClusterConfig, ConfigParser, ConfigValidator, DeploymentMethod, Release};
pub use driver::{Driver, InstallReport, PlannedCommand};
pub use error::{ImpellerError, Result};
pub use installer::{Installer, ReleaseOutcome, ReleaseReport, RunOptions};
pub use kubeconfig::KubeSetup;
pub use overrides::{OverrideResolver, ResolvedOverrides};
pub use repos::RepositorySynchronizer;
