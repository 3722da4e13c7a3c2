//! SQLite persistence.
//!
//! The poll path writes through [`Store::apply_snapshot`], one transaction
//! per poll. Everything else (offline marking, the optimistic ONU upsert
//! after provisioning, audit entries) is a single statement outside that
//! boundary.

mod audit;
mod devices;
mod onus;
mod rows;
mod snapshot;

use log::debug;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};

use crate::error::StoreError;

/// Store handles all database operations.
#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
}

impl Store {
    /// Connect to `url` and run pending migrations.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        Self::with_pool_size(url, 5).await
    }

    /// Connect with a specific pool size.
    pub async fn with_pool_size(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database on a single, never-recycled connection.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        debug!("store: schema ready");
        Ok(())
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}
