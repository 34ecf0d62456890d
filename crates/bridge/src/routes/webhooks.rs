//! Webhook dispatcher.
//!
//! Shopify delivers webhooks at least once per topic and disables the
//! subscription of an app that keeps answering with errors. So: every
//! handler is an idempotent transition on terminal fields, and every
//! internal failure is logged and converted into a 200 acknowledgment.
//! A dropped event is recoverable; a disabled webhook subscription is not.
//!
//! Request authenticity (HMAC) is verified by the fronting layer before a
//! request reaches this router.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use tracing::instrument;

use facturio_core::ShopDomain;

use crate::db::SessionRepository;
use crate::error::{AppError, Result};
use crate::services::ShopLifecycle;
use crate::state::AppState;

/// Header carrying the event topic.
pub const TOPIC_HEADER: &str = "x-shopify-topic";

/// Header carrying the shop the event belongs to.
pub const SHOP_HEADER: &str = "x-shopify-shop-domain";

/// Create webhook routes.
pub fn router() -> Router<AppState> {
    Router::new().route("/webhooks", post(handle_webhook))
}

/// One inbound webhook: `{shop, topic, payload}`, routed by topic.
#[instrument(skip(state, headers, body))]
async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode> {
    let topic = headers
        .get(TOPIC_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing topic header".to_string()))?
        .to_owned();

    let raw_shop = headers
        .get(SHOP_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::BadRequest("missing shop domain header".to_string()))?;
    let shop = ShopDomain::parse(raw_shop)
        .map_err(|e| AppError::BadRequest(format!("invalid shop domain: {e}")))?;

    // Payloads are informational for most topics; a body that does not
    // parse is logged, not rejected.
    let payload: serde_json::Value = serde_json::from_slice(&body).unwrap_or_else(|e| {
        tracing::warn!(shop = %shop, topic = %topic, error = %e, "unparseable webhook payload");
        serde_json::Value::Null
    });

    tracing::info!(shop = %shop, topic = %topic, "webhook received");

    match topic.as_str() {
        "app/uninstalled" => handle_uninstalled(&state, &shop).await,
        "shop/redact" => handle_shop_redact(&state, &shop).await,
        "customers/data_request" => handle_customer_data_request(&shop, &payload),
        "customers/redact" => handle_customer_redact(&shop, &payload),
        "orders/create" => handle_order_create(&state, &shop, &payload).await,
        other => {
            tracing::warn!(shop = %shop, topic = %other, "unhandled webhook topic");
        }
    }

    Ok(StatusCode::OK)
}

/// Mark the shop inactive and drop its sessions.
///
/// The uninstall may arrive before the install ever completed; a missing
/// record is fine.
async fn handle_uninstalled(state: &AppState, shop: &ShopDomain) {
    if let Err(e) = ShopLifecycle::new(state.shops())
        .deactivate_on_uninstall(shop)
        .await
    {
        tracing::error!(shop = %shop, error = %e, "uninstall handling failed");
    }

    match SessionRepository::new(state.pool()).delete_for_shop(shop).await {
        Ok(deleted) if deleted > 0 => {
            tracing::info!(shop = %shop, deleted, "sessions removed");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(shop = %shop, error = %e, "session cleanup failed");
        }
    }
}

/// Delete everything stored for the shop.
///
/// Fires 48 hours after uninstall and may be redelivered; both the record
/// and the sessions may already be gone.
async fn handle_shop_redact(state: &AppState, shop: &ShopDomain) {
    if let Err(e) = ShopLifecycle::new(state.shops()).purge_on_redact(shop).await {
        tracing::error!(shop = %shop, error = %e, "shop redact failed");
    }

    // Sessions normally went away at uninstall; sweep again regardless.
    if let Err(e) = SessionRepository::new(state.pool()).delete_for_shop(shop).await {
        tracing::error!(shop = %shop, error = %e, "session cleanup failed");
    }
}

/// Acknowledge a customer data request.
///
/// Customer data lives in fiscal invoices on the platform side; the actual
/// export is assembled and delivered to the merchant out of band.
fn handle_customer_data_request(shop: &ShopDomain, payload: &serde_json::Value) {
    tracing::info!(
        shop = %shop,
        customer = %payload.pointer("/customer/id").unwrap_or(&serde_json::Value::Null),
        "customer data request acknowledged"
    );
}

/// Acknowledge a customer redact request.
///
/// Fiscal documents are subject to legal retention and cannot be erased;
/// fulfillment (anonymization where permitted) happens out of band.
fn handle_customer_redact(shop: &ShopDomain, payload: &serde_json::Value) {
    tracing::info!(
        shop = %shop,
        customer = %payload.pointer("/customer/id").unwrap_or(&serde_json::Value::Null),
        "customer redact acknowledged"
    );
}

/// Forward a new order to the platform, verbatim and best-effort.
async fn handle_order_create(state: &AppState, shop: &ShopDomain, payload: &serde_json::Value) {
    match state.facturio().forward_order(shop, payload).await {
        Ok(()) => {
            tracing::info!(
                shop = %shop,
                order = %payload.pointer("/name").unwrap_or(&serde_json::Value::Null),
                "order forwarded"
            );
        }
        Err(e) => {
            tracing::error!(shop = %shop, error = %e, "order forward failed");
        }
    }
}
