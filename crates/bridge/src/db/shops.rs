//! Shop repository.
//!
//! Every mutation is a single domain-keyed statement, so concurrent or
//! duplicated deliveries (webhooks are at-least-once) converge through the
//! database's own atomic row update instead of application-level locking.

use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};

use facturio_core::{ChargeStatus, Email, PRO_MONTHLY_LIMIT, PlanTier, ShopDomain};

use super::RepositoryError;
use crate::models::shop::{InstallInfo, ShopRecord};

/// Persistence operations on the shop record.
///
/// Abstracted as a trait so the lifecycle and billing services can be
/// exercised against an in-memory double; production uses [`PgShopStore`].
#[async_trait]
pub trait ShopStore: Send + Sync {
    /// Fetch a shop by domain.
    async fn get(&self, shop: &ShopDomain) -> Result<Option<ShopRecord>, RepositoryError>;

    /// Create-or-reactivate a shop.
    ///
    /// On first contact the record is created active. On an existing record
    /// the name and email are refreshed and `is_active`/`uninstalled_at`
    /// are forced back to the installed state, whether or not the record
    /// was ever marked inactive.
    async fn upsert_on_install(
        &self,
        shop: &ShopDomain,
        info: &InstallInfo,
    ) -> Result<ShopRecord, RepositoryError>;

    /// Mark a shop uninstalled. Returns `false` when no record exists.
    async fn deactivate(&self, shop: &ShopDomain) -> Result<bool, RepositoryError>;

    /// Delete a shop record entirely. Returns `false` when already absent.
    async fn purge(&self, shop: &ShopDomain) -> Result<bool, RepositoryError>;

    /// Record a freshly created, not-yet-confirmed subscription.
    async fn set_charge_pending(
        &self,
        shop: &ShopDomain,
        charge_id: &str,
    ) -> Result<(), RepositoryError>;

    /// Move the charge to a terminal state without touching the plan.
    async fn set_charge_status(
        &self,
        shop: &ShopDomain,
        status: ChargeStatus,
    ) -> Result<(), RepositoryError>;

    /// Record a confirmed subscription: pro tier, unlimited allowance,
    /// active charge.
    async fn activate_pro(
        &self,
        shop: &ShopDomain,
        charge_id: &str,
    ) -> Result<(), RepositoryError>;
}

/// `PostgreSQL`-backed [`ShopStore`].
#[derive(Clone)]
pub struct PgShopStore {
    pool: PgPool,
}

impl PgShopStore {
    /// Create a new shop store over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SHOP_COLUMNS: &str = "shop_domain, shop_name, email, is_active, installed_at, \
                            uninstalled_at, plan, monthly_limit, charge_id, charge_status";

fn record_from_row(row: &PgRow) -> Result<ShopRecord, RepositoryError> {
    let email = row
        .try_get::<Option<String>, _>("email")?
        .map(|raw| {
            Email::parse(&raw).map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
            })
        })
        .transpose()?;

    Ok(ShopRecord {
        shop_domain: row.try_get::<ShopDomain, _>("shop_domain")?,
        shop_name: row.try_get("shop_name")?,
        email,
        is_active: row.try_get("is_active")?,
        installed_at: row.try_get("installed_at")?,
        uninstalled_at: row.try_get("uninstalled_at")?,
        plan: row.try_get::<PlanTier, _>("plan")?,
        monthly_limit: row.try_get("monthly_limit")?,
        charge_id: row.try_get("charge_id")?,
        charge_status: row.try_get::<Option<ChargeStatus>, _>("charge_status")?,
    })
}

#[async_trait]
impl ShopStore for PgShopStore {
    async fn get(&self, shop: &ShopDomain) -> Result<Option<ShopRecord>, RepositoryError> {
        let query = format!("SELECT {SHOP_COLUMNS} FROM shop WHERE shop_domain = $1");
        let row = sqlx::query(&query)
            .bind(shop)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn upsert_on_install(
        &self,
        shop: &ShopDomain,
        info: &InstallInfo,
    ) -> Result<ShopRecord, RepositoryError> {
        let query = format!(
            "INSERT INTO shop (shop_domain, shop_name, email) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (shop_domain) DO UPDATE \
             SET shop_name = EXCLUDED.shop_name, \
                 email = EXCLUDED.email, \
                 is_active = TRUE, \
                 uninstalled_at = NULL \
             RETURNING {SHOP_COLUMNS}"
        );

        let row = sqlx::query(&query)
            .bind(shop)
            .bind(&info.shop_name)
            .bind(info.email.as_ref().map(Email::as_str))
            .fetch_one(&self.pool)
            .await?;

        record_from_row(&row)
    }

    async fn deactivate(&self, shop: &ShopDomain) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("UPDATE shop SET is_active = FALSE, uninstalled_at = now() WHERE shop_domain = $1")
                .bind(shop)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge(&self, shop: &ShopDomain) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop WHERE shop_domain = $1")
            .bind(shop)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_charge_pending(
        &self,
        shop: &ShopDomain,
        charge_id: &str,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE shop SET charge_id = $2, charge_status = $3 WHERE shop_domain = $1")
                .bind(shop)
                .bind(charge_id)
                .bind(ChargeStatus::Pending)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn set_charge_status(
        &self,
        shop: &ShopDomain,
        status: ChargeStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE shop SET charge_status = $2 WHERE shop_domain = $1")
            .bind(shop)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn activate_pro(
        &self,
        shop: &ShopDomain,
        charge_id: &str,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop \
             SET plan = $2, monthly_limit = $3, charge_id = $4, charge_status = $5 \
             WHERE shop_domain = $1",
        )
        .bind(shop)
        .bind(PlanTier::Pro)
        .bind(PRO_MONTHLY_LIMIT)
        .bind(charge_id)
        .bind(ChargeStatus::Active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}

/// In-memory [`ShopStore`] mirroring the SQL semantics, for service tests.
#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashMap;

    use chrono::Utc;
    use tokio::sync::Mutex;

    use async_trait::async_trait;

    use facturio_core::{
        ChargeStatus, FREE_MONTHLY_LIMIT, PRO_MONTHLY_LIMIT, PlanTier, ShopDomain,
    };

    use super::ShopStore;
    use crate::db::RepositoryError;
    use crate::models::shop::{InstallInfo, ShopRecord};

    #[derive(Default)]
    pub struct MemoryShopStore {
        shops: Mutex<HashMap<String, ShopRecord>>,
    }

    impl MemoryShopStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl ShopStore for MemoryShopStore {
        async fn get(&self, shop: &ShopDomain) -> Result<Option<ShopRecord>, RepositoryError> {
            Ok(self.shops.lock().await.get(shop.as_str()).cloned())
        }

        async fn upsert_on_install(
            &self,
            shop: &ShopDomain,
            info: &InstallInfo,
        ) -> Result<ShopRecord, RepositoryError> {
            let mut shops = self.shops.lock().await;
            let record = shops
                .entry(shop.as_str().to_owned())
                .and_modify(|existing| {
                    existing.shop_name.clone_from(&info.shop_name);
                    existing.email.clone_from(&info.email);
                    existing.is_active = true;
                    existing.uninstalled_at = None;
                })
                .or_insert_with(|| ShopRecord {
                    shop_domain: shop.clone(),
                    shop_name: info.shop_name.clone(),
                    email: info.email.clone(),
                    is_active: true,
                    installed_at: Utc::now(),
                    uninstalled_at: None,
                    plan: PlanTier::Free,
                    monthly_limit: FREE_MONTHLY_LIMIT,
                    charge_id: None,
                    charge_status: None,
                });
            Ok(record.clone())
        }

        async fn deactivate(&self, shop: &ShopDomain) -> Result<bool, RepositoryError> {
            let mut shops = self.shops.lock().await;
            match shops.get_mut(shop.as_str()) {
                Some(record) => {
                    record.is_active = false;
                    record.uninstalled_at = Some(Utc::now());
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn purge(&self, shop: &ShopDomain) -> Result<bool, RepositoryError> {
            Ok(self.shops.lock().await.remove(shop.as_str()).is_some())
        }

        async fn set_charge_pending(
            &self,
            shop: &ShopDomain,
            charge_id: &str,
        ) -> Result<(), RepositoryError> {
            let mut shops = self.shops.lock().await;
            let record = shops
                .get_mut(shop.as_str())
                .ok_or(RepositoryError::NotFound)?;
            record.charge_id = Some(charge_id.to_owned());
            record.charge_status = Some(ChargeStatus::Pending);
            Ok(())
        }

        async fn set_charge_status(
            &self,
            shop: &ShopDomain,
            status: ChargeStatus,
        ) -> Result<(), RepositoryError> {
            let mut shops = self.shops.lock().await;
            let record = shops
                .get_mut(shop.as_str())
                .ok_or(RepositoryError::NotFound)?;
            record.charge_status = Some(status);
            Ok(())
        }

        async fn activate_pro(
            &self,
            shop: &ShopDomain,
            charge_id: &str,
        ) -> Result<(), RepositoryError> {
            let mut shops = self.shops.lock().await;
            let record = shops
                .get_mut(shop.as_str())
                .ok_or(RepositoryError::NotFound)?;
            record.plan = PlanTier::Pro;
            record.monthly_limit = PRO_MONTHLY_LIMIT;
            record.charge_id = Some(charge_id.to_owned());
            record.charge_status = Some(ChargeStatus::Active);
            Ok(())
        }
    }
}
