//! Facturio Core - Shared types library.
//!
//! This crate provides common types used across the Facturio Shopify bridge:
//! - `bridge` - The Shopify app server (webhooks, billing, entitlements)
//! - `cli` - Command-line tools for migrations and session management
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for shop domains, emails, plan tiers,
//!   charge statuses, and plan snapshots

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
