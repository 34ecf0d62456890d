//! Authenticated shop session extractor.
//!
//! Embedded-app requests reach this service through a fronting layer that
//! validates the Shopify session token and forwards the shop domain in the
//! `X-Shopify-Shop-Domain` header. This extractor turns that into a usable
//! session: the shop, its offline access token, and an Admin API client
//! bound to both.
//!
//! This is the one place a request may hard-fail: without an authenticated
//! shop there is nothing safe to do. Every downstream failure is absorbed
//! into a default or a logged no-op instead.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use secrecy::SecretString;

use facturio_core::ShopDomain;

use crate::db::SessionRepository;
use crate::error::AppError;
use crate::shopify::AdminClient;
use crate::state::AppState;

/// Header set by the session-verification layer in front of this service.
pub const SHOP_DOMAIN_HEADER: &str = "x-shopify-shop-domain";

/// An authenticated shop session.
pub struct AuthSession {
    /// The shop the request acts for.
    pub shop: ShopDomain,
    /// Offline Admin API access token for the shop.
    pub access_token: SecretString,
    /// Admin API client bound to the shop and token.
    pub admin: AdminClient,
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw_shop = parts
            .headers
            .get(SHOP_DOMAIN_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("missing shop domain".to_string()))?;

        let shop = ShopDomain::parse(raw_shop)
            .map_err(|e| AppError::Unauthorized(format!("invalid shop domain: {e}")))?;

        let access_token = SessionRepository::new(state.pool())
            .find_access_token(&shop)
            .await?
            .ok_or_else(|| {
                tracing::info!(shop = %shop, "no session for shop");
                AppError::Unauthorized("no session for shop".to_string())
            })?;

        let admin = AdminClient::new(
            &shop,
            access_token.clone(),
            &state.config().shopify_api_version,
        );

        Ok(Self {
            shop,
            access_token,
            admin,
        })
    }
}
