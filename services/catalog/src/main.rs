use anyhow::Result;
use catalog::Catalog;
use catalog::database::run_migrations;
use common::database::{health_check, init_pool};
use common::settings::Settings;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load()?;

    // Initialize logging, RUST_LOG wins over the configured level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("setting default subscriber failed: {e}"))?;

    info!("Starting catalog service");

    let pool = init_pool(&settings.database).await?;
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    run_migrations(&pool).await?;

    let catalog = Catalog::postgres(pool);
    let categories = catalog.categories.list(&json!({ "per_page": 1 })).await?;
    let videos = catalog.videos.list(&json!({ "per_page": 1 })).await?;
    info!(
        categories = categories.total,
        videos = videos.total,
        "Catalog service initialized successfully"
    );

    Ok(())
}
