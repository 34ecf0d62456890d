//! Core types for the Facturio Shopify bridge.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod domain;
pub mod email;
pub mod plan;
pub mod price;
pub mod status;

pub use domain::{ShopDomain, ShopDomainError};
pub use email::{Email, EmailError};
pub use plan::{
    FREE_MONTHLY_LIMIT, LOCAL_BILLING_SOURCE, PRO_MONTHLY_LIMIT, PlanSnapshot, PlanTier,
    usage_percent,
};
pub use price::{Currency, Price};
pub use status::ChargeStatus;
