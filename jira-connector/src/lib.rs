pub mod actions;
pub mod aggregator;
pub mod auth;
pub mod backend;
pub mod cards;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod extractor;
pub mod i18n;
pub mod jira;
pub mod metrics_defs;
pub mod service;
pub mod translate;

#[cfg(test)]
mod testutils;

use crate::aggregator::Aggregator;
use crate::auth::ConnectorAuth;
use crate::errors::ConnectorError;
use crate::jira::JiraClient;
use crate::service::ConnectorService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;

pub async fn run(config: config::Config) -> Result<(), ConnectorError> {
    config.validate()?;

    let extractor = config.extractor.build()?;
    let backend = Arc::new(JiraClient::new(&config.backend)?);
    let service = ConnectorService::new(
        ConnectorAuth::new(&config.auth),
        Aggregator::new(backend, config.backend.max_concurrent_fetches),
        extractor,
    );

    tracing::info!(
        listener = %format!("{}:{}", config.listener.host, config.listener.port),
        max_concurrent_fetches = config.backend.max_concurrent_fetches,
        request_timeout_secs = config.backend.request_timeout_secs,
        "Starting jira connector"
    );

    let connector_task = run_http_service(&config.listener.host, config.listener.port, service);
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::<_, ConnectorError>::new(|| true),
    );

    tokio::try_join!(connector_task, admin_task)?;
    Ok(())
}
