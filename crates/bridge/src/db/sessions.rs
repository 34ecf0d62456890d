//! Session repository.
//!
//! Offline access tokens, one row per shop. The OAuth callback that writes
//! them lives outside this service; here they are read on every
//! authenticated request and bulk-deleted when a shop uninstalls or is
//! redacted.

use secrecy::SecretString;
use sqlx::PgPool;

use facturio_core::ShopDomain;

use super::RepositoryError;

/// Repository for shop session database operations.
pub struct SessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepository<'a> {
    /// Create a new session repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Look up the offline access token for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_access_token(
        &self,
        shop: &ShopDomain,
    ) -> Result<Option<SecretString>, RepositoryError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT access_token FROM shop_session WHERE shop_domain = $1")
                .bind(shop)
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(|(token,)| SecretString::from(token)))
    }

    /// Store or rotate the offline access token for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        shop: &ShopDomain,
        access_token: &str,
        scope: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO shop_session (shop_domain, access_token, scope) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (shop_domain) DO UPDATE \
             SET access_token = EXCLUDED.access_token, \
                 scope = EXCLUDED.scope, \
                 updated_at = now()",
        )
        .bind(shop)
        .bind(access_token)
        .bind(scope)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Delete all sessions for a shop. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete_for_shop(&self, shop: &ShopDomain) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop_session WHERE shop_domain = $1")
            .bind(shop)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
