mod config;

use clap::Parser;
use config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use jira_connector::config::ValidationError;
use jira_connector::errors::ConnectorError;
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;

const METRICS_PREFIX: &str = "jira_connector";

#[derive(Parser)]
#[command(version, about = "Jira card connector")]
enum CliCommand {
    /// Serve card and action requests
    JiraConnector(Args),
    /// Load and validate the config file, then exit
    CheckConfig(Args),
}

#[derive(clap::Args)]
struct Args {
    #[arg(long)]
    config_file: PathBuf,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("config file has no {0} section")]
    MissingSection(&'static str),
    #[error("invalid jira_connector config: {0}")]
    Validation(#[from] ValidationError),
    #[error("could not initialize logging: {0}")]
    Logging(#[from] TryInitError),
    #[error("could not initialize metrics: {0}")]
    Metrics(String),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Connector(#[from] ConnectorError),
}

fn main() -> ExitCode {
    match cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn cli() -> Result<(), CliError> {
    match CliCommand::parse() {
        CliCommand::JiraConnector(args) => {
            let config = Config::from_file(&args.config_file)?;
            let connector_config = config
                .jira_connector
                .ok_or(CliError::MissingSection("jira_connector"))?;

            // Dropping the guard flushes pending sentry events
            let _sentry = init_logging(config.common.logging.as_ref())?;
            if let Some(metrics_config) = &config.common.metrics {
                init_metrics(metrics_config)?;
            }

            tracing::info!(config = ?connector_config, "Starting jira-connector");
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(jira_connector::run(connector_config))?;
        }
        CliCommand::CheckConfig(args) => {
            let config = Config::from_file(&args.config_file)?;
            config
                .jira_connector
                .ok_or(CliError::MissingSection("jira_connector"))?
                .validate()?;
            println!("{}: ok", args.config_file.display());
        }
    }

    Ok(())
}

fn init_logging(
    config: Option<&LoggingConfig>,
) -> Result<Option<sentry::ClientInitGuard>, TryInitError> {
    let guard = config
        .and_then(|logging| logging.sentry_dsn.as_deref().map(|dsn| (dsn, logging)))
        .map(|(dsn, logging)| {
            sentry::init((
                dsn,
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    environment: logging.environment.clone().map(Into::into),
                    ..Default::default()
                },
            ))
        });

    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_layer)
        .try_init()?;

    Ok(guard)
}

fn init_metrics(config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(METRICS_PREFIX))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;

    shared::metrics_defs::describe_all(jira_connector::metrics_defs::ALL_METRICS);
    Ok(())
}
