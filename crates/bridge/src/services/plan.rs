//! Effective-plan resolution.
//!
//! The Facturio platform is the single source of truth for a tenant's plan
//! and usage across every channel they might pay through (this app, the web
//! checkout, a mobile storefront). Whatever the billing flow cached locally,
//! the platform's answer wins on read. When the platform cannot answer, the
//! tenant gets the conservative free-tier default instead of an error.

use facturio_core::{PlanSnapshot, ShopDomain};

use crate::services::facturio::FacturioClient;

/// Resolves the effective plan for a shop, degrading gracefully.
pub struct PlanReconciler<'a> {
    facturio: &'a FacturioClient,
}

impl<'a> PlanReconciler<'a> {
    /// Create a reconciler over the platform client.
    #[must_use]
    pub const fn new(facturio: &'a FacturioClient) -> Self {
        Self { facturio }
    }

    /// Resolve the effective plan for a shop.
    ///
    /// Infallible by design: any platform failure is logged and replaced by
    /// [`PlanSnapshot::fallback`], so callers never block or fail because
    /// the platform is unreachable.
    pub async fn effective_plan(&self, shop: &ShopDomain) -> PlanSnapshot {
        match self.facturio.fetch_plan(shop).await {
            Ok(snapshot) => {
                tracing::debug!(
                    shop = %shop,
                    plan = %snapshot.plan,
                    used = snapshot.invoices_this_month,
                    limit = snapshot.monthly_limit,
                    "plan resolved"
                );
                snapshot
            }
            Err(e) => {
                tracing::warn!(shop = %shop, error = %e, "plan fetch failed, serving fallback");
                PlanSnapshot::fallback()
            }
        }
    }
}
