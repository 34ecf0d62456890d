//! Shopify Admin API client.
//!
//! # Architecture
//!
//! - One client per request, bound to the shop and offline token the
//!   authenticated session supplied
//! - Raw GraphQL documents with serde response wrappers; no local sync,
//!   direct API calls
//! - Billing decisions are always derived from the live subscription list,
//!   never from cached state

mod admin;

pub use admin::AdminClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use facturio_core::Price;

/// Errors that can occur when interacting with the Shopify Admin API.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", .0.join("; "))]
    GraphQL(Vec<String>),

    /// Response body did not match the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),
}

/// Basic shop details from the Admin API.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopInfo {
    /// Shop display name.
    pub name: String,
    /// Shop contact email, if set.
    pub email: Option<String>,
}

/// A `userErrors` entry from a billing mutation.
///
/// Returned to the caller verbatim when subscription creation is rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserError {
    /// Input path the error refers to, if any.
    #[serde(default)]
    pub field: Option<Vec<String>>,
    /// Human-readable message.
    pub message: String,
}

/// Status of an app subscription, per the Admin API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppSubscriptionStatus {
    Active,
    Pending,
    Declined,
    Expired,
    Frozen,
    Cancelled,
    /// Statuses this app has no behavior for.
    #[serde(other)]
    Unknown,
}

/// One recurring app subscription on the current installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSubscription {
    /// Subscription GID.
    pub id: String,
    /// Display name the subscription was created with.
    pub name: String,
    /// Current status.
    pub status: AppSubscriptionStatus,
}

impl AppSubscription {
    /// Whether the merchant has approved this subscription.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AppSubscriptionStatus::Active
    }
}

/// Result of an `appSubscriptionCreate` mutation, mirroring the GraphQL
/// payload: either a subscription plus confirmation URL, or user errors.
#[derive(Debug, Clone)]
pub struct SubscriptionCreatePayload {
    /// GID of the created (pending) subscription.
    pub subscription_id: Option<String>,
    /// Where to send the merchant to approve the charge.
    pub confirmation_url: Option<String>,
    /// Validation errors; non-empty means nothing was created.
    pub user_errors: Vec<UserError>,
}

/// Parameters for creating a recurring app subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionParams<'a> {
    /// Display name of the plan.
    pub name: &'a str,
    /// Recurring price per 30-day interval.
    pub price: Price,
    /// Where Shopify redirects the merchant after the confirmation page.
    pub return_url: &'a str,
    /// Create a test charge (no money moves).
    pub test: bool,
}

/// The billing operations the orchestrator needs from Shopify.
///
/// Implemented by [`AdminClient`]; test doubles stand in for it so the
/// confirmation logic can be exercised without the network.
#[async_trait]
pub trait BillingGateway: Send + Sync {
    /// Create a recurring app subscription.
    async fn create_app_subscription(
        &self,
        params: &SubscriptionParams<'_>,
    ) -> Result<SubscriptionCreatePayload, ShopifyError>;

    /// List the subscriptions currently attached to the installation.
    ///
    /// Queried live on every confirmation attempt; a cached pending flag is
    /// never trusted.
    async fn active_app_subscriptions(&self) -> Result<Vec<AppSubscription>, ShopifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shopify_error_display() {
        let err = ShopifyError::GraphQL(vec!["Field not found".into(), "Invalid ID".into()]);
        assert_eq!(
            err.to_string(),
            "GraphQL errors: Field not found; Invalid ID"
        );

        let err = ShopifyError::RateLimited(30);
        assert_eq!(err.to_string(), "Rate limited, retry after 30 seconds");
    }

    #[test]
    fn subscription_status_deserializes_screaming_snake_case() {
        let sub: AppSubscription = serde_json::from_str(
            r#"{"id": "gid://shopify/AppSubscription/1", "name": "Facturio Pro", "status": "ACTIVE"}"#,
        )
        .expect("valid subscription JSON");
        assert!(sub.is_active());
    }

    #[test]
    fn unknown_subscription_status_is_tolerated() {
        let sub: AppSubscription = serde_json::from_str(
            r#"{"id": "gid://shopify/AppSubscription/2", "name": "Legacy", "status": "ON_HOLD"}"#,
        )
        .expect("valid subscription JSON");
        assert_eq!(sub.status, AppSubscriptionStatus::Unknown);
        assert!(!sub.is_active());
    }
}
