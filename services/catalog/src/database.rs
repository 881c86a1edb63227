//! Schema management for the catalog tables

use common::DatabaseError;
use sqlx::PgPool;
use tracing::{error, info};

/// Apply the embedded migrations under `services/catalog/migrations`
pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
    info!("Running catalog migrations");
    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        error!("Catalog migrations failed: {}", e);
        DatabaseError::Migration(e.to_string())
    })?;
    info!("Catalog migrations applied");
    Ok(())
}
