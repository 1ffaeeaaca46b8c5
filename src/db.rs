use crate::app_config::DatabaseConfig;
use crate::store::{MemoryStore, SeaStore, Store};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::sync::Arc;
use std::time::Duration;

/// Opens the Postgres pool described by `config`.
pub async fn connect(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opts = ConnectOptions::new(config.url.to_owned());
    opts.max_connections(config.max_connections)
        .connect_timeout(Duration::from_secs(8))
        .sqlx_logging(false);

    Database::connect(opts).await
}

/// Builds the store handlers share. An empty database url selects the
/// in-memory store, which loses everything on restart.
pub async fn init_store(config: &DatabaseConfig) -> Result<Store, DbErr> {
    if config.url.trim().is_empty() {
        log::warn!("No database url configured; polls are kept in memory only.");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let db = connect(config).await?;
    log::info!("Connected to database");
    Ok(Arc::new(SeaStore::new(db)))
}
