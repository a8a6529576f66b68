//! Deletes flow responses older than a retention period.
//!
//! Usage: `delete-historical-responses [retention_period]` where the period is in months.

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use std::sync::Arc;

use flow_results_api::config::ServerConfig;
use flow_results_api::middleware::init_tracing;
use flow_results_api::services::RetentionService;
use flow_results_api::storage::{PostgresStorageBackend, StorageBackend};

#[derive(Parser, Debug)]
#[command(name = "delete-historical-responses", version, about = "Delete flow responses older than the retention period")]
struct Args {
    /// Specify the retention period in months (default: RETENTION_PERIOD_MONTHS, else 60)
    retention_period: Option<u32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = ServerConfig::from_env().context("Failed to load configuration")?;
    let retention_months = args.retention_period.unwrap_or(config.retention_months);
    let database_url = config
        .database_url
        .context("DATABASE_URL must be set to purge stored responses")?;
    let pool = sqlx::PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    let storage: Arc<dyn StorageBackend> = Arc::new(PostgresStorageBackend::new(pool));
    RetentionService::new(storage, retention_months)
        .purge(Utc::now())
        .await
        .context("Failed to delete historical responses")?;
    Ok(())
}
