//! Admin API GraphQL client, bound to a single shop.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use facturio_core::ShopDomain;

use super::{
    AppSubscription, BillingGateway, ShopInfo, ShopifyError, SubscriptionCreatePayload,
    SubscriptionParams, UserError,
};

const SHOP_INFO_QUERY: &str = "\
query {
  shop {
    name
    email
  }
}";

const SUBSCRIPTION_CREATE_MUTATION: &str = "\
mutation CreateSubscription($name: String!, $lineItems: [AppSubscriptionLineItemInput!]!, $returnUrl: URL!, $test: Boolean) {
  appSubscriptionCreate(name: $name, returnUrl: $returnUrl, lineItems: $lineItems, test: $test) {
    appSubscription {
      id
      status
    }
    confirmationUrl
    userErrors {
      field
      message
    }
  }
}";

const ACTIVE_SUBSCRIPTIONS_QUERY: &str = "\
query {
  currentAppInstallation {
    activeSubscriptions {
      id
      name
      status
    }
  }
}";

/// Shopify Admin API GraphQL client.
///
/// Constructed per request from the authenticated session's shop domain and
/// offline access token; the endpoint is the shop's own Admin API host.
#[derive(Clone)]
pub struct AdminClient {
    client: reqwest::Client,
    endpoint: String,
    access_token: SecretString,
}

/// GraphQL response wrapper.
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLErrorResponse>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ShopInfoData {
    shop: ShopInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionCreateData {
    app_subscription_create: SubscriptionCreateNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionCreateNode {
    app_subscription: Option<CreatedSubscription>,
    confirmation_url: Option<String>,
    #[serde(default)]
    user_errors: Vec<UserError>,
}

#[derive(Debug, Deserialize)]
struct CreatedSubscription {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveSubscriptionsData {
    current_app_installation: Option<CurrentInstallation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CurrentInstallation {
    #[serde(default)]
    active_subscriptions: Vec<AppSubscription>,
}

impl AdminClient {
    /// Create a client for one shop's Admin API.
    #[must_use]
    pub fn new(shop: &ShopDomain, access_token: SecretString, api_version: &str) -> Self {
        let endpoint = format!("https://{shop}/admin/api/{api_version}/graphql.json");

        Self {
            client: reqwest::Client::new(),
            endpoint,
            access_token,
        }
    }

    /// Execute a GraphQL document.
    async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, ShopifyError> {
        let body = serde_json::json!({
            "query": query,
            "variables": variables,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("X-Shopify-Access-Token", self.access_token.expose_secret())
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        let response_text = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %response_text.chars().take(500).collect::<String>(),
                "Shopify Admin API returned non-success status"
            );
            return Err(ShopifyError::Api {
                status: status.as_u16(),
                message: response_text.chars().take(500).collect(),
            });
        }

        let parsed: GraphQLResponse<T> = serde_json::from_str(&response_text)
            .map_err(|e| ShopifyError::Parse(e.to_string()))?;

        if let Some(errors) = parsed.errors
            && !errors.is_empty()
        {
            return Err(ShopifyError::GraphQL(
                errors.into_iter().map(|e| e.message).collect(),
            ));
        }

        parsed
            .data
            .ok_or_else(|| ShopifyError::Parse("response contained no data".to_string()))
    }

    /// Fetch the shop's display name and contact email.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError` if the request or query fails. Callers that
    /// can live without the details should degrade to the shop domain.
    pub async fn shop_info(&self) -> Result<ShopInfo, ShopifyError> {
        let data: ShopInfoData = self
            .execute(SHOP_INFO_QUERY, serde_json::Value::Null)
            .await?;
        Ok(data.shop)
    }
}

#[async_trait]
impl BillingGateway for AdminClient {
    async fn create_app_subscription(
        &self,
        params: &SubscriptionParams<'_>,
    ) -> Result<SubscriptionCreatePayload, ShopifyError> {
        let variables = serde_json::json!({
            "name": params.name,
            "returnUrl": params.return_url,
            "test": params.test,
            "lineItems": [
                {
                    "plan": {
                        "appRecurringPricingDetails": {
                            "price": params.price,
                            "interval": "EVERY_30_DAYS",
                        }
                    }
                }
            ],
        });

        let data: SubscriptionCreateData = self
            .execute(SUBSCRIPTION_CREATE_MUTATION, variables)
            .await?;

        let node = data.app_subscription_create;
        Ok(SubscriptionCreatePayload {
            subscription_id: node.app_subscription.map(|s| s.id),
            confirmation_url: node.confirmation_url,
            user_errors: node.user_errors,
        })
    }

    async fn active_app_subscriptions(&self) -> Result<Vec<AppSubscription>, ShopifyError> {
        let data: ActiveSubscriptionsData = self
            .execute(ACTIVE_SUBSCRIPTIONS_QUERY, serde_json::Value::Null)
            .await?;

        Ok(data
            .current_app_installation
            .map(|installation| installation.active_subscriptions)
            .unwrap_or_default())
    }
}
