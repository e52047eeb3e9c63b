//! Domain models for admin.

pub mod display_rule;
pub mod sku;

pub use display_rule::StoredDisplayRule;
pub use sku::SkuStock;
