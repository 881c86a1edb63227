//! Layered application settings
//!
//! Defaults come from [`DatabaseConfig::from_env`] and are overridden by
//! `CATALOG__*` environment variables, e.g. `CATALOG__LOG_LEVEL=debug` or
//! `CATALOG__DATABASE__MAX_CONNECTIONS=20`.

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

use crate::database::DatabaseConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    /// Default filter directive for the tracing subscriber
    pub log_level: String,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let database =
            DatabaseConfig::from_env().map_err(|e| ConfigError::Message(e.to_string()))?;

        Config::builder()
            .set_default("log_level", "info")?
            .set_default("database.database_url", database.database_url)?
            .set_default("database.max_connections", i64::from(database.max_connections))?
            .set_default("database.min_connections", i64::from(database.min_connections))?
            .set_default(
                "database.connection_timeout",
                i64::try_from(database.connection_timeout).unwrap_or(i64::MAX),
            )?
            .add_source(
                Environment::with_prefix("CATALOG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
