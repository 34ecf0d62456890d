//! Billing routes: subscription creation, status, and the confirmation
//! callback Shopify redirects the merchant back to.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::Result;
use crate::middleware::AuthSession;
use crate::services::billing::{BillingOrchestrator, SubscriptionCreate};
use crate::services::PlanReconciler;
use crate::shopify::{AppSubscription, UserError};
use crate::state::AppState;

/// Create billing routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/app/billing", get(billing_status).post(create_subscription))
        .route("/app/billing/callback", get(billing_callback))
}

/// Error response for a rejected subscription creation.
#[derive(Debug, Serialize)]
pub struct BillingErrors {
    pub success: bool,
    pub errors: Vec<UserError>,
}

impl BillingErrors {
    fn new(errors: Vec<UserError>) -> Self {
        Self {
            success: false,
            errors,
        }
    }
}

/// Current subscription status for the shop.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingStatus {
    pub has_active_subscription: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<AppSubscription>,
}

/// Query parameters on the confirmation callback.
///
/// Shopify omits `charge_id` entirely when the merchant backs out; its
/// absence is the only cancellation signal there is.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub charge_id: Option<String>,
}

/// Create the recurring subscription and send the merchant to Shopify's
/// confirmation page.
#[instrument(skip(state, session), fields(shop = %session.shop))]
async fn create_subscription(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Response> {
    // Tenants already entitled through another channel must not be charged
    // again here.
    let snapshot = PlanReconciler::new(state.facturio())
        .effective_plan(&session.shop)
        .await;
    if !snapshot.upgrade_available() {
        tracing::info!(shop = %session.shop, source = ?snapshot.billing_source, "upgrade suppressed");
        let message = snapshot.message.unwrap_or_else(|| {
            "Billing for this account is managed through another channel.".to_string()
        });
        return Ok(Json(BillingErrors::new(vec![UserError {
            field: None,
            message,
        }]))
        .into_response());
    }

    let orchestrator = BillingOrchestrator::new(
        state.shops(),
        &session.admin,
        state.facturio(),
        state.config(),
    );

    match orchestrator.create_subscription(&session.shop).await? {
        SubscriptionCreate::Accepted { confirmation_url } => {
            Ok(Redirect::to(&confirmation_url).into_response())
        }
        SubscriptionCreate::Rejected { errors } => {
            Ok(Json(BillingErrors::new(errors)).into_response())
        }
    }
}

/// Settle the subscription outcome after the confirmation page.
#[instrument(skip(state, session, query), fields(shop = %session.shop))]
async fn billing_callback(
    State(state): State<AppState>,
    session: AuthSession,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect> {
    let orchestrator = BillingOrchestrator::new(
        state.shops(),
        &session.admin,
        state.facturio(),
        state.config(),
    );

    orchestrator
        .confirm_subscription(&session.shop, query.charge_id.as_deref())
        .await?;

    Ok(Redirect::to("/app"))
}

/// Report the live subscription status, healing the local snapshot when an
/// approved subscription exists.
#[instrument(skip(state, session), fields(shop = %session.shop))]
async fn billing_status(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<Json<BillingStatus>> {
    let orchestrator = BillingOrchestrator::new(
        state.shops(),
        &session.admin,
        state.facturio(),
        state.config(),
    );

    let subscription = orchestrator.subscription_status(&session.shop).await?;

    Ok(Json(BillingStatus {
        has_active_subscription: subscription.is_some(),
        subscription,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::shopify::AppSubscriptionStatus;

    #[test]
    fn billing_errors_serialize_verbatim() {
        let response = BillingErrors::new(vec![UserError {
            field: Some(vec!["lineItems".to_owned(), "plan".to_owned()]),
            message: "price must be positive".to_owned(),
        }]);
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["errors"][0]["message"], "price must be positive");
        assert_eq!(json["errors"][0]["field"][1], "plan");
    }

    #[test]
    fn billing_status_omits_missing_subscription() {
        let json = serde_json::to_value(BillingStatus {
            has_active_subscription: false,
            subscription: None,
        })
        .unwrap();
        assert_eq!(json["hasActiveSubscription"], false);
        assert!(json.get("subscription").is_none());
    }

    #[test]
    fn billing_status_includes_subscription_when_present() {
        let json = serde_json::to_value(BillingStatus {
            has_active_subscription: true,
            subscription: Some(AppSubscription {
                id: "gid://shopify/AppSubscription/7".to_owned(),
                name: "Facturio Pro".to_owned(),
                status: AppSubscriptionStatus::Active,
            }),
        })
        .unwrap();
        assert_eq!(json["hasActiveSubscription"], true);
        assert_eq!(json["subscription"]["status"], "ACTIVE");
    }

    #[test]
    fn callback_query_tolerates_missing_charge_id() {
        let query: CallbackQuery = serde_json::from_str("{}").unwrap();
        assert!(query.charge_id.is_none());
    }
}
