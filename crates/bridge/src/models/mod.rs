//! Local persistence models.

pub mod shop;

pub use shop::{InstallInfo, ShopRecord};
