//! Database operations for the bridge `PostgreSQL` database.
//!
//! Stores tenant state only (Shopify and the Facturio platform stay the
//! source of truth for everything else):
//!
//! ## Tables
//!
//! - `shop` - One record per installed shop, keyed by domain
//! - `shop_session` - Offline access tokens, bulk-deleted on uninstall
//!
//! # Migrations
//!
//! Migrations are stored in `crates/bridge/migrations/` and run via:
//! ```bash
//! cargo run -p facturio-cli -- migrate
//! ```

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub mod sessions;
pub mod shops;

pub use sessions::SessionRepository;
pub use shops::{PgShopStore, ShopStore};

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Row targeted by an update does not exist.
    #[error("record not found")]
    NotFound,

    /// A stored value no longer parses as its domain type.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
