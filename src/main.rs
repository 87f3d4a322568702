//! Impeller CLI entrypoint.
//!
//! This is the main entrypoint for the impeller command-line tool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use impeller::cli::{Cli, Commands, OutputFormatter, RunArgs};
use impeller::command::ProcessRunner;
use impeller::config::{ClusterConfig, ConfigParser, ConfigValidator, find_config_file};
use impeller::driver::Driver;
use impeller::error::Result;
use impeller::kubeconfig::{KubeSetup, default_kubeconfig_path};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
///
/// Logs go to stderr; stdout carries rendered manifests only.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Install {
            run,
            kube_config,
            kube_context,
        } => {
            let setup = KubeSetup {
                config: kube_config,
                context: kube_context,
            };
            cmd_install(
                cli.config.as_ref(),
                &run,
                setup,
                (&cli.helm_bin, &cli.kubectl_bin),
                &formatter,
            )
            .await
        }
        Commands::Validate { warnings } => cmd_validate(cli.config.as_ref(), warnings, &formatter),
        Commands::Template { run } => cmd_template(
            cli.config.as_ref(),
            &run,
            (&cli.helm_bin, &cli.kubectl_bin),
            &formatter,
        ),
    }
}

/// Synchronize repositories and install every release.
async fn cmd_install(
    config_path: Option<&PathBuf>,
    run: &RunArgs,
    setup: KubeSetup,
    (helm_bin, kubectl_bin): (&str, &str),
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;
    let options = run.to_options(helm_bin, kubectl_bin);
    let runner = ProcessRunner::new();

    if !setup.is_empty() {
        setup
            .apply(&runner, kubectl_bin, &default_kubeconfig_path()?)
            .await?;
    }

    if options.dry_run {
        info!("Dry run: helm releases are simulated, kubectl releases are only rendered");
    }

    let report = Driver::new(&runner, &options).run(&config).await?;
    eprintln!("{}", formatter.format_report(&report));

    Ok(())
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let parser = parser_for(&config_file);
    parser.load_dotenv()?;
    let config = parser.load_with_env(&config_file)?;

    let result = ConfigValidator::new().check(&config);
    eprintln!("{}", formatter.format_validation(&config, &result, show_warnings));

    if let Some(first_error) = result.errors.first() {
        return Err(first_error.to_config_error().into());
    }

    Ok(())
}

/// Print the commands an install would run.
fn cmd_template(
    config_path: Option<&PathBuf>,
    run: &RunArgs,
    (helm_bin, kubectl_bin): (&str, &str),
    formatter: &OutputFormatter,
) -> Result<()> {
    let config = load_config(config_path)?;
    let options = run.to_options(helm_bin, kubectl_bin);
    let runner = ProcessRunner::new();

    let commands = Driver::new(&runner, &options).plan(&config)?;
    eprintln!("{}", formatter.format_plan(&commands));

    Ok(())
}

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    config_path.map_or_else(|| find_config_file("."), |path| Ok(path.clone()))
}

/// Creates a parser rooted next to the configuration file.
fn parser_for(config_file: &Path) -> ConfigParser {
    ConfigParser::new().with_base_path(config_file.parent().unwrap_or_else(|| Path::new(".")))
}

/// Loads and validates the cluster configuration.
fn load_config(config_path: Option<&PathBuf>) -> Result<ClusterConfig> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let parser = parser_for(&config_file);
    parser.load_dotenv()?;
    let config = parser.load_with_env(&config_file)?;

    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }

    Ok(config)
}
