//! Business services composed around the shop store.
//!
//! - [`facturio`] - HTTP client for the Facturio platform API
//! - [`lifecycle`] - install/uninstall/redact transitions on the shop record
//! - [`billing`] - Shopify recurring subscription creation and confirmation
//! - [`plan`] - effective-plan resolution with a conservative fallback

pub mod billing;
pub mod facturio;
pub mod lifecycle;
pub mod plan;

pub use billing::BillingOrchestrator;
pub use facturio::{FacturioClient, FacturioError};
pub use lifecycle::ShopLifecycle;
pub use plan::PlanReconciler;
