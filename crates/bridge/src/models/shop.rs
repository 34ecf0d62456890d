//! Shop record model.

use chrono::{DateTime, Utc};
use facturio_core::{ChargeStatus, Email, PlanTier, ShopDomain};

/// The locally persisted record for one installed shop.
///
/// Keyed by [`ShopDomain`]; one row per tenant. Lifecycle handlers mutate it
/// through idempotent, domain-keyed upserts so duplicate webhook deliveries
/// converge on the same terminal state.
///
/// The `plan` and `monthly_limit` fields are a cache written by the billing
/// flow. The Facturio platform stays authoritative for entitlements and
/// overrides them on every read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShopRecord {
    /// Unique tenant key.
    pub shop_domain: ShopDomain,
    /// Display name reported by Shopify; falls back to the domain.
    pub shop_name: String,
    /// Contact email reported by Shopify, if any.
    pub email: Option<Email>,
    /// False once the app has been uninstalled.
    pub is_active: bool,
    /// First successful authenticated contact.
    pub installed_at: DateTime<Utc>,
    /// Set on uninstall; cleared unconditionally by reinstall.
    pub uninstalled_at: Option<DateTime<Utc>>,
    /// Cached plan tier.
    pub plan: PlanTier,
    /// Cached monthly invoice allowance.
    pub monthly_limit: i64,
    /// Shopify `AppSubscription` GID, once a charge has been created.
    pub charge_id: Option<String>,
    /// Charge lifecycle state; `None` until a charge exists.
    pub charge_status: Option<ChargeStatus>,
}

/// Shop details captured at install/auth time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallInfo {
    /// Display name (domain when Shopify cannot be queried).
    pub shop_name: String,
    /// Contact email, if Shopify reported one.
    pub email: Option<Email>,
}

impl InstallInfo {
    /// Fallback info for when the Shopify shop query fails: the domain
    /// doubles as the display name.
    #[must_use]
    pub fn from_domain(shop: &ShopDomain) -> Self {
        Self {
            shop_name: shop.as_str().to_owned(),
            email: None,
        }
    }
}
