//! Facturio platform API client.
//!
//! The platform holds the canonical subscription and usage data for every
//! tenant across all channels. Apart from the plan query, every call here
//! is a best-effort, single-attempt notification: failures are logged by
//! the caller and never retried, and no tenant-facing response waits on
//! their outcome beyond the client's fixed request timeout.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use facturio_core::{PlanSnapshot, PlanTier, ShopDomain};

use crate::config::FacturioConfig;

/// Header naming the tenant a request acts for.
const SHOP_HEADER: &str = "X-Shopify-Shop";

/// Upper bound on any single platform call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when interacting with the Facturio platform API.
#[derive(Debug, Error)]
pub enum FacturioError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Facturio platform API client.
#[derive(Clone)]
pub struct FacturioClient {
    client: reqwest::Client,
    base_url: String,
}

impl FacturioClient {
    /// Create a new platform API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &FacturioConfig) -> Result<Self, FacturioError> {
        let mut headers = HeaderMap::new();
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Fetch the canonical entitlement snapshot for a shop.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response does not
    /// parse; the plan reconciler converts every failure into the
    /// conservative fallback snapshot.
    pub async fn fetch_plan(&self, shop: &ShopDomain) -> Result<PlanSnapshot, FacturioError> {
        let url = format!("{}/api/shop/plan", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(SHOP_HEADER, shop.as_str())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FacturioError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<PlanSnapshot>()
            .await
            .map_err(|e| FacturioError::Parse(e.to_string()))
    }

    /// Push a freshly obtained access token to the platform so it can call
    /// the shop's Admin API on its own (order backfill, refunds, ...).
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails; the caller logs and drops it.
    pub async fn sync_token(
        &self,
        shop: &ShopDomain,
        access_token: &SecretString,
    ) -> Result<(), FacturioError> {
        let url = format!("{}/api/webhooks/shopify/token-sync", self.base_url);
        let body = serde_json::json!({
            "shop": shop.as_str(),
            "accessToken": access_token.expose_secret(),
        });

        self.post_ack(&url, shop, &body).await
    }

    /// Tell the platform the shop upgraded through this channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails; the caller logs and drops it.
    pub async fn notify_upgrade(
        &self,
        shop: &ShopDomain,
        plan: PlanTier,
        charge_id: &str,
    ) -> Result<(), FacturioError> {
        let url = format!("{}/api/webhooks/shopify/billing", self.base_url);
        let body = serde_json::json!({
            "action": "upgrade",
            "plan": plan.as_str(),
            "shopifyChargeId": charge_id,
        });

        self.post_ack(&url, shop, &body).await
    }

    /// Forward a newly created order payload, verbatim.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails; the caller logs and drops it.
    pub async fn forward_order(
        &self,
        shop: &ShopDomain,
        order: &serde_json::Value,
    ) -> Result<(), FacturioError> {
        let url = format!("{}/api/webhooks/shopify/order", self.base_url);
        let body = serde_json::json!({
            "action": "create",
            "order": order,
            "shop": shop.as_str(),
        });

        self.post_ack(&url, shop, &body).await
    }

    /// POST a JSON body and only check for an acknowledging status.
    async fn post_ack(
        &self,
        url: &str,
        shop: &ShopDomain,
        body: &serde_json::Value,
    ) -> Result<(), FacturioError> {
        let response = self
            .client
            .post(url)
            .header(SHOP_HEADER, shop.as_str())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(FacturioError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}
