//! Subscription orchestration against the Shopify billing API.
//!
//! Creates the recurring "Facturio Pro" subscription and settles its
//! outcome after the merchant visits the confirmation page. The settle
//! decision is recomputed from the live subscription list on every call, so
//! duplicate callbacks and merchant refreshes converge without a
//! read-modify-write race.

use thiserror::Error;

use facturio_core::{ChargeStatus, Currency, PlanTier, Price, ShopDomain};

use crate::config::BridgeConfig;
use crate::db::{RepositoryError, ShopStore};
use crate::services::facturio::FacturioClient;
use crate::shopify::{
    AppSubscription, BillingGateway, ShopifyError, SubscriptionParams, UserError,
};

/// Display name of the paid plan, as shown on the Shopify confirmation page.
pub const PRO_PLAN_NAME: &str = "Facturio Pro";

/// Monthly price of the paid plan, in cents.
const PRO_PLAN_PRICE_CENTS: i64 = 900;

/// Errors from the billing orchestrator.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Shopify Admin API failure.
    #[error(transparent)]
    Shopify(#[from] ShopifyError),

    /// Local persistence failure.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Shopify accepted the mutation but returned no subscription or
    /// confirmation URL to act on.
    #[error("subscription create returned no confirmation URL")]
    IncompleteCreation,
}

/// Result of a subscription creation attempt.
#[derive(Debug)]
pub enum SubscriptionCreate {
    /// Subscription created; send the merchant to the confirmation page.
    Accepted {
        /// Shopify-hosted confirmation URL.
        confirmation_url: String,
    },
    /// Shopify rejected the input; nothing was created or persisted.
    Rejected {
        /// Validation errors, passed through unchanged.
        errors: Vec<UserError>,
    },
}

/// Result of a confirmation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// Merchant backed out; no charge identifier came back.
    Cancelled,
    /// An active subscription exists; the shop is on the paid tier.
    Activated {
        /// GID of the live subscription.
        subscription_id: String,
    },
    /// A charge identifier was supplied but no subscription is active.
    Declined,
}

/// Find the subscription the merchant has actually approved, if any.
#[must_use]
pub fn find_active(subscriptions: &[AppSubscription]) -> Option<&AppSubscription> {
    subscriptions.iter().find(|s| s.is_active())
}

/// Creates and confirms the platform-native recurring subscription and
/// writes the local billing snapshot.
pub struct BillingOrchestrator<'a, S: ShopStore, G: BillingGateway> {
    store: &'a S,
    gateway: &'a G,
    facturio: &'a FacturioClient,
    config: &'a BridgeConfig,
}

impl<'a, S: ShopStore, G: BillingGateway> BillingOrchestrator<'a, S, G> {
    /// Create an orchestrator for one request.
    #[must_use]
    pub const fn new(
        store: &'a S,
        gateway: &'a G,
        facturio: &'a FacturioClient,
        config: &'a BridgeConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            facturio,
            config,
        }
    }

    /// Create the recurring subscription for a shop.
    ///
    /// On validation failure the Shopify error list is returned unchanged
    /// and the record is not touched. On success the pending charge is
    /// persisted and the confirmation URL returned.
    ///
    /// # Errors
    ///
    /// Returns `BillingError` on API or persistence failure, or when
    /// Shopify reports success without a confirmation URL.
    pub async fn create_subscription(
        &self,
        shop: &ShopDomain,
    ) -> Result<SubscriptionCreate, BillingError> {
        let return_url = self.config.billing_return_url();
        let params = SubscriptionParams {
            name: PRO_PLAN_NAME,
            price: Price::from_cents(PRO_PLAN_PRICE_CENTS, Currency::Usd),
            return_url: &return_url,
            test: self.config.billing_test_mode(),
        };

        let payload = self.gateway.create_app_subscription(&params).await?;

        if !payload.user_errors.is_empty() {
            tracing::warn!(
                shop = %shop,
                errors = ?payload.user_errors,
                "subscription create rejected"
            );
            return Ok(SubscriptionCreate::Rejected {
                errors: payload.user_errors,
            });
        }

        match (payload.subscription_id, payload.confirmation_url) {
            (Some(subscription_id), Some(confirmation_url)) => {
                self.store
                    .set_charge_pending(shop, &subscription_id)
                    .await?;
                tracing::info!(shop = %shop, charge_id = %subscription_id, "subscription pending confirmation");
                Ok(SubscriptionCreate::Accepted { confirmation_url })
            }
            _ => Err(BillingError::IncompleteCreation),
        }
    }

    /// Settle the outcome of a confirmation page visit.
    ///
    /// An absent `charge_id` is the cancellation signal. Otherwise the live
    /// subscription list decides: an ACTIVE entry upgrades the shop (and
    /// notifies the platform best-effort), no ACTIVE entry means the
    /// merchant declined. The plan tier is never touched on cancellation or
    /// decline.
    ///
    /// # Errors
    ///
    /// Returns `BillingError` on API or persistence failure. A failed
    /// platform notification is logged, not returned; the local write
    /// already happened and stands.
    pub async fn confirm_subscription(
        &self,
        shop: &ShopDomain,
        charge_id: Option<&str>,
    ) -> Result<ConfirmationOutcome, BillingError> {
        if charge_id.is_none() {
            self.store
                .set_charge_status(shop, ChargeStatus::Cancelled)
                .await?;
            tracing::info!(shop = %shop, "subscription cancelled by merchant");
            return Ok(ConfirmationOutcome::Cancelled);
        }

        // Never trust the stored pending flag; ask Shopify what is live.
        let subscriptions = self.gateway.active_app_subscriptions().await?;

        match find_active(&subscriptions) {
            Some(subscription) => {
                self.store.activate_pro(shop, &subscription.id).await?;
                tracing::info!(shop = %shop, charge_id = %subscription.id, "shop upgraded to pro");

                if let Err(e) = self
                    .facturio
                    .notify_upgrade(shop, PlanTier::Pro, &subscription.id)
                    .await
                {
                    tracing::warn!(shop = %shop, error = %e, "billing sync with platform failed");
                }

                Ok(ConfirmationOutcome::Activated {
                    subscription_id: subscription.id.clone(),
                })
            }
            None => {
                self.store
                    .set_charge_status(shop, ChargeStatus::Declined)
                    .await?;
                tracing::info!(shop = %shop, "subscription declined");
                Ok(ConfirmationOutcome::Declined)
            }
        }
    }

    /// Report whether the shop currently has an approved subscription,
    /// refreshing the local snapshot when one is found.
    ///
    /// # Errors
    ///
    /// Returns `BillingError` on API or persistence failure.
    pub async fn subscription_status(
        &self,
        shop: &ShopDomain,
    ) -> Result<Option<AppSubscription>, BillingError> {
        let subscriptions = self.gateway.active_app_subscriptions().await?;

        match find_active(&subscriptions) {
            Some(subscription) => {
                self.store.activate_pro(shop, &subscription.id).await?;
                Ok(Some(subscription.clone()))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::config::FacturioConfig;
    use crate::db::shops::memory::MemoryShopStore;
    use crate::models::shop::InstallInfo;
    use crate::shopify::{AppSubscriptionStatus, SubscriptionCreatePayload};
    use facturio_core::{FREE_MONTHLY_LIMIT, PRO_MONTHLY_LIMIT};

    struct FakeGateway {
        create: SubscriptionCreatePayload,
        subscriptions: Vec<AppSubscription>,
    }

    #[async_trait]
    impl BillingGateway for FakeGateway {
        async fn create_app_subscription(
            &self,
            _params: &SubscriptionParams<'_>,
        ) -> Result<SubscriptionCreatePayload, ShopifyError> {
            Ok(self.create.clone())
        }

        async fn active_app_subscriptions(&self) -> Result<Vec<AppSubscription>, ShopifyError> {
            Ok(self.subscriptions.clone())
        }
    }

    fn shop() -> ShopDomain {
        ShopDomain::parse("demo.myshopify.com").unwrap()
    }

    fn config() -> BridgeConfig {
        BridgeConfig {
            database_url: secrecy::SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            app_url: "https://bridge.facturio.io".to_string(),
            environment: "development".to_string(),
            shopify_api_version: "2026-01".to_string(),
            facturio: FacturioConfig {
                // Nothing listens here; platform notifications must fail
                // without failing the orchestrator.
                base_url: "http://127.0.0.1:9".to_string(),
            },
            sentry_dsn: None,
            sentry_traces_sample_rate: 0.0,
        }
    }

    fn facturio(config: &BridgeConfig) -> FacturioClient {
        FacturioClient::new(&config.facturio).unwrap()
    }

    async fn installed_store() -> MemoryShopStore {
        let store = MemoryShopStore::new();
        let info = InstallInfo {
            shop_name: "Demo Shop".to_owned(),
            email: None,
        };
        store.upsert_on_install(&shop(), &info).await.unwrap();
        store
    }

    fn active_subscription(id: &str) -> AppSubscription {
        AppSubscription {
            id: id.to_owned(),
            name: PRO_PLAN_NAME.to_owned(),
            status: AppSubscriptionStatus::Active,
        }
    }

    #[test]
    fn find_active_skips_non_active_entries() {
        let subs = vec![
            AppSubscription {
                id: "gid://shopify/AppSubscription/1".to_owned(),
                name: PRO_PLAN_NAME.to_owned(),
                status: AppSubscriptionStatus::Declined,
            },
            active_subscription("gid://shopify/AppSubscription/2"),
        ];
        assert_eq!(
            find_active(&subs).map(|s| s.id.as_str()),
            Some("gid://shopify/AppSubscription/2")
        );
        assert!(find_active(&[]).is_none());
    }

    #[tokio::test]
    async fn create_persists_pending_charge() {
        let store = installed_store().await;
        let gateway = FakeGateway {
            create: SubscriptionCreatePayload {
                subscription_id: Some("gid://shopify/AppSubscription/42".to_owned()),
                confirmation_url: Some("https://demo.myshopify.com/charges/42/confirm".to_owned()),
                user_errors: vec![],
            },
            subscriptions: vec![],
        };
        let config = config();
        let facturio = facturio(&config);
        let orchestrator = BillingOrchestrator::new(&store, &gateway, &facturio, &config);

        let result = orchestrator.create_subscription(&shop()).await.unwrap();
        match result {
            SubscriptionCreate::Accepted { confirmation_url } => {
                assert_eq!(
                    confirmation_url,
                    "https://demo.myshopify.com/charges/42/confirm"
                );
            }
            SubscriptionCreate::Rejected { .. } => panic!("expected acceptance"),
        }

        let record = store.get(&shop()).await.unwrap().unwrap();
        assert_eq!(
            record.charge_id.as_deref(),
            Some("gid://shopify/AppSubscription/42")
        );
        assert_eq!(record.charge_status, Some(ChargeStatus::Pending));
        // The plan only changes once the charge is confirmed.
        assert_eq!(record.plan, PlanTier::Free);
    }

    #[tokio::test]
    async fn create_returns_user_errors_without_mutation() {
        let store = installed_store().await;
        let gateway = FakeGateway {
            create: SubscriptionCreatePayload {
                subscription_id: None,
                confirmation_url: None,
                user_errors: vec![UserError {
                    field: Some(vec!["lineItems".to_owned()]),
                    message: "price must be positive".to_owned(),
                }],
            },
            subscriptions: vec![],
        };
        let config = config();
        let facturio = facturio(&config);
        let orchestrator = BillingOrchestrator::new(&store, &gateway, &facturio, &config);

        let result = orchestrator.create_subscription(&shop()).await.unwrap();
        match result {
            SubscriptionCreate::Rejected { errors } => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].message, "price must be positive");
            }
            SubscriptionCreate::Accepted { .. } => panic!("expected rejection"),
        }

        let record = store.get(&shop()).await.unwrap().unwrap();
        assert!(record.charge_id.is_none());
        assert!(record.charge_status.is_none());
    }

    #[tokio::test]
    async fn confirm_without_charge_id_cancels_and_keeps_plan() {
        let store = installed_store().await;
        store
            .set_charge_pending(&shop(), "gid://shopify/AppSubscription/42")
            .await
            .unwrap();
        let gateway = FakeGateway {
            create: SubscriptionCreatePayload {
                subscription_id: None,
                confirmation_url: None,
                user_errors: vec![],
            },
            // Even with an active subscription listed, an absent charge_id
            // must be treated as cancellation.
            subscriptions: vec![active_subscription("gid://shopify/AppSubscription/42")],
        };
        let config = config();
        let facturio = facturio(&config);
        let orchestrator = BillingOrchestrator::new(&store, &gateway, &facturio, &config);

        let outcome = orchestrator.confirm_subscription(&shop(), None).await.unwrap();
        assert_eq!(outcome, ConfirmationOutcome::Cancelled);

        let record = store.get(&shop()).await.unwrap().unwrap();
        assert_eq!(record.charge_status, Some(ChargeStatus::Cancelled));
        assert_eq!(record.plan, PlanTier::Free);
        assert_eq!(record.monthly_limit, FREE_MONTHLY_LIMIT);
    }

    #[tokio::test]
    async fn cancel_after_activation_keeps_the_plan_tier() {
        let store = installed_store().await;
        store
            .activate_pro(&shop(), "gid://shopify/AppSubscription/42")
            .await
            .unwrap();
        let gateway = FakeGateway {
            create: SubscriptionCreatePayload {
                subscription_id: None,
                confirmation_url: None,
                user_errors: vec![],
            },
            subscriptions: vec![],
        };
        let config = config();
        let facturio = facturio(&config);
        let orchestrator = BillingOrchestrator::new(&store, &gateway, &facturio, &config);

        let outcome = orchestrator.confirm_subscription(&shop(), None).await.unwrap();
        assert_eq!(outcome, ConfirmationOutcome::Cancelled);

        // Only the charge status moves; the cancellation never downgrades.
        let record = store.get(&shop()).await.unwrap().unwrap();
        assert_eq!(record.charge_status, Some(ChargeStatus::Cancelled));
        assert_eq!(record.plan, PlanTier::Pro);
        assert_eq!(record.monthly_limit, PRO_MONTHLY_LIMIT);
    }

    #[tokio::test]
    async fn confirm_upgrades_when_subscription_is_active() {
        let store = installed_store().await;
        store
            .set_charge_pending(&shop(), "gid://shopify/AppSubscription/42")
            .await
            .unwrap();
        let gateway = FakeGateway {
            create: SubscriptionCreatePayload {
                subscription_id: None,
                confirmation_url: None,
                user_errors: vec![],
            },
            subscriptions: vec![active_subscription("gid://shopify/AppSubscription/42")],
        };
        let config = config();
        let facturio = facturio(&config);
        let orchestrator = BillingOrchestrator::new(&store, &gateway, &facturio, &config);

        let outcome = orchestrator
            .confirm_subscription(&shop(), Some("gid://shopify/AppSubscription/42"))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ConfirmationOutcome::Activated {
                subscription_id: "gid://shopify/AppSubscription/42".to_owned()
            }
        );

        let record = store.get(&shop()).await.unwrap().unwrap();
        assert_eq!(record.plan, PlanTier::Pro);
        assert_eq!(record.monthly_limit, PRO_MONTHLY_LIMIT);
        assert_eq!(record.charge_status, Some(ChargeStatus::Active));
        // The unreachable platform endpoint must not have failed the call.
    }

    #[tokio::test]
    async fn confirm_is_idempotent_under_duplicate_delivery() {
        let store = installed_store().await;
        store
            .set_charge_pending(&shop(), "gid://shopify/AppSubscription/42")
            .await
            .unwrap();
        let gateway = FakeGateway {
            create: SubscriptionCreatePayload {
                subscription_id: None,
                confirmation_url: None,
                user_errors: vec![],
            },
            subscriptions: vec![active_subscription("gid://shopify/AppSubscription/42")],
        };
        let config = config();
        let facturio = facturio(&config);
        let orchestrator = BillingOrchestrator::new(&store, &gateway, &facturio, &config);

        let first = orchestrator
            .confirm_subscription(&shop(), Some("gid://shopify/AppSubscription/42"))
            .await
            .unwrap();
        let state_after_first = store.get(&shop()).await.unwrap().unwrap();

        let second = orchestrator
            .confirm_subscription(&shop(), Some("gid://shopify/AppSubscription/42"))
            .await
            .unwrap();
        let state_after_second = store.get(&shop()).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(state_after_first, state_after_second);
    }

    #[tokio::test]
    async fn confirm_declines_when_nothing_is_active() {
        let store = installed_store().await;
        store
            .set_charge_pending(&shop(), "gid://shopify/AppSubscription/42")
            .await
            .unwrap();
        let gateway = FakeGateway {
            create: SubscriptionCreatePayload {
                subscription_id: None,
                confirmation_url: None,
                user_errors: vec![],
            },
            subscriptions: vec![],
        };
        let config = config();
        let facturio = facturio(&config);
        let orchestrator = BillingOrchestrator::new(&store, &gateway, &facturio, &config);

        let outcome = orchestrator
            .confirm_subscription(&shop(), Some("gid://shopify/AppSubscription/42"))
            .await
            .unwrap();
        assert_eq!(outcome, ConfirmationOutcome::Declined);

        let record = store.get(&shop()).await.unwrap().unwrap();
        assert_eq!(record.charge_status, Some(ChargeStatus::Declined));
        assert_eq!(record.plan, PlanTier::Free);
    }

    #[tokio::test]
    async fn status_heals_local_snapshot_when_active() {
        let store = installed_store().await;
        let gateway = FakeGateway {
            create: SubscriptionCreatePayload {
                subscription_id: None,
                confirmation_url: None,
                user_errors: vec![],
            },
            subscriptions: vec![active_subscription("gid://shopify/AppSubscription/7")],
        };
        let config = config();
        let facturio = facturio(&config);
        let orchestrator = BillingOrchestrator::new(&store, &gateway, &facturio, &config);

        let status = orchestrator.subscription_status(&shop()).await.unwrap();
        assert!(status.is_some());

        let record = store.get(&shop()).await.unwrap().unwrap();
        assert_eq!(record.plan, PlanTier::Pro);
        assert_eq!(
            record.charge_id.as_deref(),
            Some("gid://shopify/AppSubscription/7")
        );
    }
}
