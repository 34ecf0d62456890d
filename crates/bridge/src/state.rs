//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::BridgeConfig;
use crate::db::PgShopStore;
use crate::services::facturio::{FacturioClient, FacturioError};

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`; provides access to the database pool,
/// configuration, shop store, and the Facturio platform client.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: BridgeConfig,
    pool: PgPool,
    shops: PgShopStore,
    facturio: FacturioClient,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the Facturio HTTP client cannot be built.
    pub fn new(config: BridgeConfig, pool: PgPool) -> Result<Self, FacturioError> {
        let facturio = FacturioClient::new(&config.facturio)?;
        let shops = PgShopStore::new(pool.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                shops,
                facturio,
            }),
        })
    }

    /// Get a reference to the bridge configuration.
    #[must_use]
    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the shop store.
    #[must_use]
    pub fn shops(&self) -> &PgShopStore {
        &self.inner.shops
    }

    /// Get a reference to the Facturio platform client.
    #[must_use]
    pub fn facturio(&self) -> &FacturioClient {
        &self.inner.facturio
    }
}
