//! Shop session commands.
//!
//! The OAuth callback that normally writes offline tokens runs in the
//! fronting layer; these commands are the operator's hook for seeding a
//! development shop or rotating a token by hand.

use facturio_bridge::db::SessionRepository;
use facturio_core::ShopDomain;

use super::CommandError;

/// Store or rotate a shop's offline access token.
///
/// # Errors
///
/// Returns `CommandError` if the domain does not parse or the write fails.
pub async fn put(shop: &str, token: &str, scope: Option<&str>) -> Result<(), CommandError> {
    let shop = ShopDomain::parse(shop).map_err(|e| CommandError::InvalidInput(e.to_string()))?;

    let pool = super::connect().await?;
    SessionRepository::new(&pool).upsert(&shop, token, scope).await?;

    tracing::info!(shop = %shop, "session stored");
    Ok(())
}

/// Remove a shop's sessions.
///
/// # Errors
///
/// Returns `CommandError` if the domain does not parse or the delete fails.
pub async fn delete(shop: &str) -> Result<(), CommandError> {
    let shop = ShopDomain::parse(shop).map_err(|e| CommandError::InvalidInput(e.to_string()))?;

    let pool = super::connect().await?;
    let removed = SessionRepository::new(&pool).delete_for_shop(&shop).await?;

    tracing::info!(shop = %shop, removed, "sessions deleted");
    Ok(())
}
