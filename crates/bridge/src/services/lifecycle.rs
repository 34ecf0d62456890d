//! Shop lifecycle transitions: install, uninstall, redact.
//!
//! Shopify delivers lifecycle webhooks at least once and in no guaranteed
//! order, so every transition here is idempotent and tolerant of the record
//! being in any prior state, including absent.

use facturio_core::ShopDomain;

use crate::db::{RepositoryError, ShopStore};
use crate::models::shop::{InstallInfo, ShopRecord};

/// Owns the create/activate/deactivate/purge transitions on the shop record.
pub struct ShopLifecycle<'a, S: ShopStore> {
    store: &'a S,
}

impl<'a, S: ShopStore> ShopLifecycle<'a, S> {
    /// Create a lifecycle service over a shop store.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Create-or-reactivate a shop on authenticated contact.
    ///
    /// Unconditionally refreshes the name/email, forces `is_active = true`
    /// and clears `uninstalled_at`, even when the record was never marked
    /// inactive. Repeated calls converge on the same state.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the upsert fails.
    pub async fn upsert_on_install(
        &self,
        shop: &ShopDomain,
        info: &InstallInfo,
    ) -> Result<ShopRecord, RepositoryError> {
        let record = self.store.upsert_on_install(shop, info).await?;
        tracing::info!(shop = %shop, name = %record.shop_name, "shop connected");
        Ok(record)
    }

    /// Mark a shop uninstalled.
    ///
    /// The uninstall webhook can race ahead of a completed install, so a
    /// missing record is a logged no-op rather than an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the update itself fails.
    pub async fn deactivate_on_uninstall(&self, shop: &ShopDomain) -> Result<(), RepositoryError> {
        if self.store.deactivate(shop).await? {
            tracing::info!(shop = %shop, "shop marked inactive");
        } else {
            tracing::info!(shop = %shop, "no shop record to deactivate");
        }
        Ok(())
    }

    /// Delete a shop's record entirely.
    ///
    /// Terminal: nothing may write to this domain again until a new install
    /// recreates it. Succeeds whether or not the record still exists, since
    /// the redact event arrives well after uninstall and may be redelivered.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the delete itself fails.
    pub async fn purge_on_redact(&self, shop: &ShopDomain) -> Result<(), RepositoryError> {
        if self.store.purge(shop).await? {
            tracing::info!(shop = %shop, "shop data deleted");
        } else {
            tracing::info!(shop = %shop, "no shop data left to delete");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::shops::memory::MemoryShopStore;
    use facturio_core::Email;

    fn shop() -> ShopDomain {
        ShopDomain::parse("demo.myshopify.com").unwrap()
    }

    fn info() -> InstallInfo {
        InstallInfo {
            shop_name: "Demo Shop".to_owned(),
            email: Some(Email::parse("owner@demo.com").unwrap()),
        }
    }

    #[tokio::test]
    async fn install_creates_active_record() {
        let store = MemoryShopStore::new();
        let lifecycle = ShopLifecycle::new(&store);

        let record = lifecycle.upsert_on_install(&shop(), &info()).await.unwrap();

        assert!(record.is_active);
        assert!(record.uninstalled_at.is_none());
        assert_eq!(record.shop_name, "Demo Shop");
        assert_eq!(record.email.as_ref().map(Email::as_str), Some("owner@demo.com"));
    }

    #[tokio::test]
    async fn repeated_installs_converge() {
        let store = MemoryShopStore::new();
        let lifecycle = ShopLifecycle::new(&store);

        let first = lifecycle.upsert_on_install(&shop(), &info()).await.unwrap();
        let second = lifecycle.upsert_on_install(&shop(), &info()).await.unwrap();

        assert_eq!(first, second);
        assert!(second.is_active);
        assert!(second.uninstalled_at.is_none());
    }

    #[tokio::test]
    async fn reinstall_fully_undoes_uninstall() {
        let store = MemoryShopStore::new();
        let lifecycle = ShopLifecycle::new(&store);

        lifecycle.upsert_on_install(&shop(), &info()).await.unwrap();
        lifecycle.deactivate_on_uninstall(&shop()).await.unwrap();

        let between = store.get(&shop()).await.unwrap().unwrap();
        assert!(!between.is_active);
        assert!(between.uninstalled_at.is_some());

        let after = lifecycle.upsert_on_install(&shop(), &info()).await.unwrap();
        assert!(after.is_active);
        assert!(after.uninstalled_at.is_none());
    }

    #[tokio::test]
    async fn install_refreshes_name_and_email() {
        let store = MemoryShopStore::new();
        let lifecycle = ShopLifecycle::new(&store);

        lifecycle.upsert_on_install(&shop(), &info()).await.unwrap();

        let renamed = InstallInfo {
            shop_name: "Demo Shop Renamed".to_owned(),
            email: None,
        };
        let record = lifecycle.upsert_on_install(&shop(), &renamed).await.unwrap();

        assert_eq!(record.shop_name, "Demo Shop Renamed");
        assert!(record.email.is_none());
    }

    #[tokio::test]
    async fn uninstall_before_install_is_a_noop() {
        let store = MemoryShopStore::new();
        let lifecycle = ShopLifecycle::new(&store);

        lifecycle.deactivate_on_uninstall(&shop()).await.unwrap();
        assert!(store.get(&shop()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn purge_on_missing_record_succeeds() {
        let store = MemoryShopStore::new();
        let lifecycle = ShopLifecycle::new(&store);

        lifecycle.purge_on_redact(&shop()).await.unwrap();
    }

    #[tokio::test]
    async fn purge_removes_the_record() {
        let store = MemoryShopStore::new();
        let lifecycle = ShopLifecycle::new(&store);

        lifecycle.upsert_on_install(&shop(), &info()).await.unwrap();
        lifecycle.purge_on_redact(&shop()).await.unwrap();

        assert!(store.get(&shop()).await.unwrap().is_none());

        // Redelivery of the redact event is still a success.
        lifecycle.purge_on_redact(&shop()).await.unwrap();
    }
}
