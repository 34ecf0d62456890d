//! Plan tiers and the entitlement snapshot served by the Facturio platform.

use serde::{Deserialize, Serialize};

/// Monthly invoice allowance on the free tier.
pub const FREE_MONTHLY_LIMIT: i64 = 10;

/// Monthly invoice allowance on the pro tier (effectively unlimited).
pub const PRO_MONTHLY_LIMIT: i64 = 999_999;

/// The billing source value that names this integration.
///
/// A snapshot whose `billing_source` is some *other* channel belongs to a
/// tenant who already pays elsewhere (web checkout, mobile storefront, ...).
pub const LOCAL_BILLING_SOURCE: &str = "shopify";

/// Subscription tier of a shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    /// Limited monthly allowance, no charge.
    #[default]
    Free,
    /// Paid tier with an effectively unlimited allowance.
    Pro,
}

impl PlanTier {
    /// Returns the canonical lowercase name used in storage and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
        }
    }
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            _ => Err(format!("invalid plan tier: {s}")),
        }
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for PlanTier {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for PlanTier {
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <String as sqlx::Decode<'_, sqlx::Postgres>>::decode(value)?;
        Ok(raw.parse::<Self>()?)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for PlanTier {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<'_, sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

/// Entitlement snapshot for one shop, as served by the Facturio platform.
///
/// Fetched per request and never persisted: the platform is the single
/// source of truth for plan and usage across every channel a tenant might
/// pay through, so a cached copy would only be a stale copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlanSnapshot {
    /// Effective plan tier.
    pub plan: PlanTier,
    /// Invoices allowed this month.
    pub monthly_limit: i64,
    /// Invoices already issued this month.
    pub invoices_this_month: i64,
    /// The channel currently paying for the tenant, if any.
    #[serde(default)]
    pub billing_source: Option<String>,
    /// Whether the platform permits starting a subscription from this
    /// integration. Defaults to permissive when the platform omits it.
    #[serde(default = "default_can_upgrade")]
    pub can_upgrade_here: bool,
    /// Optional human-readable note from the platform.
    #[serde(default)]
    pub message: Option<String>,
}

const fn default_can_upgrade() -> bool {
    true
}

impl PlanSnapshot {
    /// The conservative snapshot used whenever the platform is unreachable.
    ///
    /// Free tier, small allowance, zero usage, upgrade permitted. Callers
    /// must never fail because the platform is down.
    #[must_use]
    pub const fn fallback() -> Self {
        Self {
            plan: PlanTier::Free,
            monthly_limit: FREE_MONTHLY_LIMIT,
            invoices_this_month: 0,
            billing_source: None,
            can_upgrade_here: true,
            message: None,
        }
    }

    /// Percentage of the monthly allowance already used, rounded to the
    /// nearest whole percent.
    #[must_use]
    pub fn usage_percent(&self) -> u32 {
        usage_percent(self.invoices_this_month, self.monthly_limit)
    }

    /// Whether this integration may start a new subscription for the tenant.
    ///
    /// A tenant who is already `pro` through a different channel must not be
    /// charged a second time here, whatever the platform's flag says.
    #[must_use]
    pub fn upgrade_available(&self) -> bool {
        if !self.can_upgrade_here {
            return false;
        }
        match self.billing_source.as_deref() {
            Some(source) => !(self.plan == PlanTier::Pro && source != LOCAL_BILLING_SOURCE),
            None => true,
        }
    }
}

/// Percentage of `limit` consumed by `used`, rounded to the nearest whole
/// percent. A non-positive limit yields 0 rather than dividing by zero.
#[must_use]
pub fn usage_percent(used: i64, limit: i64) -> u32 {
    if limit <= 0 {
        return 0;
    }
    let used = used.max(0);

    #[allow(clippy::cast_precision_loss)] // Invoice counts never approach 2^52
    let pct = (used as f64 / limit as f64) * 100.0;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Rounded and non-negative
    {
        pct.round() as u32
    }
}
