//! Create every table in the configured database.
//!
//! Reads `AUTOTRAQ_DATABASE_URL` (or `DATABASE_URL`). Safe to run repeatedly.

use anyhow::Context;

use autotraq_infra::{DatabaseConfig, connect};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    autotraq_observability::init();

    let config = DatabaseConfig::from_env().context("failed to load database configuration")?;
    let repo = connect(&config)
        .await
        .with_context(|| format!("failed to connect to {} database", config.dialect))?;

    repo.create_schema()
        .await
        .context("failed to create schema")?;

    tracing::info!(dialect = %repo.dialect(), "schema ready");
    Ok(())
}
