//! App entry route.
//!
//! The first authenticated request after OAuth (and every dashboard load
//! after that) lands here: the shop record is created or reactivated, the
//! fresh access token is relayed to the Facturio platform, and the
//! effective entitlement is resolved and returned.

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use tracing::instrument;

use facturio_core::{Email, PlanSnapshot, PlanTier, ShopDomain};

use crate::error::Result;
use crate::middleware::AuthSession;
use crate::models::shop::InstallInfo;
use crate::services::{PlanReconciler, ShopLifecycle};
use crate::state::AppState;

/// Create app entry routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/app", get(app_home))
}

/// Entitlement summary returned to the embedded app frontend.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitlementSummary {
    /// Shop domain the summary belongs to.
    pub shop: ShopDomain,
    /// Effective plan tier.
    pub plan: PlanTier,
    /// Invoices allowed this month.
    pub monthly_limit: i64,
    /// Invoices issued this month.
    pub invoices_this_month: i64,
    /// Share of the allowance already used, 0-100 (may exceed 100).
    pub usage_percent: u32,
    /// Channel currently paying for the tenant, if any.
    pub billing_source: Option<String>,
    /// Whether the upgrade flow should be offered here.
    pub can_upgrade: bool,
    /// Optional note from the platform.
    pub message: Option<String>,
}

impl EntitlementSummary {
    fn new(shop: ShopDomain, snapshot: PlanSnapshot) -> Self {
        Self {
            usage_percent: snapshot.usage_percent(),
            can_upgrade: snapshot.upgrade_available(),
            shop,
            plan: snapshot.plan,
            monthly_limit: snapshot.monthly_limit,
            invoices_this_month: snapshot.invoices_this_month,
            billing_source: snapshot.billing_source,
            message: snapshot.message,
        }
    }
}

/// App home: upsert the shop, relay the token, resolve the entitlement.
#[instrument(skip(state, session), fields(shop = %session.shop))]
async fn app_home(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<EntitlementSummary>> {
    let shop = session.shop.clone();

    // Shop details are a nicety; the domain works fine when Shopify is
    // unavailable.
    let info = match session.admin.shop_info().await {
        Ok(details) => InstallInfo {
            shop_name: details.name,
            email: details.email.and_then(|raw| Email::parse(&raw).ok()),
        },
        Err(e) => {
            tracing::warn!(shop = %shop, error = %e, "shop info query failed");
            InstallInfo::from_domain(&shop)
        }
    };

    ShopLifecycle::new(state.shops())
        .upsert_on_install(&shop, &info)
        .await?;

    // Fire-and-forget: the platform needs the token to fetch order data on
    // its own, but this response never waits for it.
    let facturio = state.facturio().clone();
    let token_shop = shop.clone();
    let token = session.access_token.clone();
    tokio::spawn(async move {
        if let Err(e) = facturio.sync_token(&token_shop, &token).await {
            tracing::warn!(shop = %token_shop, error = %e, "access token sync failed");
        }
    });

    let snapshot = PlanReconciler::new(state.facturio())
        .effective_plan(&shop)
        .await;

    Ok(Json(EntitlementSummary::new(shop, snapshot)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn summary_derives_usage_and_upgrade_flag() {
        let shop = ShopDomain::parse("demo.myshopify.com").unwrap();
        let snapshot = PlanSnapshot {
            plan: PlanTier::Free,
            monthly_limit: 10,
            invoices_this_month: 8,
            billing_source: None,
            can_upgrade_here: true,
            message: None,
        };

        let summary = EntitlementSummary::new(shop, snapshot);
        assert_eq!(summary.usage_percent, 80);
        assert!(summary.can_upgrade);
    }

    #[test]
    fn summary_suppresses_upgrade_for_externally_billed_tenants() {
        let shop = ShopDomain::parse("demo.myshopify.com").unwrap();
        let snapshot = PlanSnapshot {
            plan: PlanTier::Pro,
            monthly_limit: 999_999,
            invoices_this_month: 120,
            billing_source: Some("external".to_owned()),
            can_upgrade_here: true,
            message: Some("Billed via web checkout".to_owned()),
        };

        let summary = EntitlementSummary::new(shop, snapshot);
        assert!(!summary.can_upgrade);
        assert_eq!(summary.usage_percent, 0);
        assert_eq!(summary.message.as_deref(), Some("Billed via web checkout"));
    }

    #[test]
    fn summary_serializes_camel_case() {
        let shop = ShopDomain::parse("demo.myshopify.com").unwrap();
        let summary = EntitlementSummary::new(shop, PlanSnapshot::fallback());
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["shop"], "demo.myshopify.com");
        assert_eq!(json["plan"], "free");
        assert_eq!(json["monthlyLimit"], 10);
        assert_eq!(json["invoicesThisMonth"], 0);
        assert_eq!(json["usagePercent"], 0);
        assert_eq!(json["canUpgrade"], true);
    }
}
