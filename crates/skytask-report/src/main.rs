//! Operational report CLI: prints the current tasking breakdown to
//! stdout. Read-only; always exits 0 so a broken database does not fail
//! a cron job that captures the output.

use std::sync::Arc;

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use skytask_domain::ReportService;
use skytask_postgres::{PostgresClient, PostgresReportRepository};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize, Clone)]
struct ReportConfig {
    #[serde(default = "default_postgres_host")]
    postgres_host: String,

    #[serde(default = "default_postgres_port")]
    postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    postgres_database: String,

    #[serde(default = "default_postgres_username")]
    postgres_username: String,

    #[serde(default = "default_postgres_password")]
    postgres_password: String,
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "skytask".to_string()
}

fn default_postgres_username() -> String {
    "skytask".to_string()
}

fn default_postgres_password() -> String {
    "skytask".to_string()
}

impl ReportConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("SKYTASK"))
            .build()?
            .try_deserialize()
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let report = render().await;
    print!("{report}");
}

async fn render() -> String {
    let config = match ReportConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => return format!("report unavailable: {e}\n"),
    };

    let client = match PostgresClient::new(
        &config.postgres_host,
        config.postgres_port,
        &config.postgres_database,
        &config.postgres_username,
        &config.postgres_password,
        2,
    ) {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "failed to create database client");
            return format!("report unavailable: {e}\n");
        }
    };

    let service = ReportService::new(Arc::new(PostgresReportRepository::new(client)));
    service.render_report_lossy().await
}
