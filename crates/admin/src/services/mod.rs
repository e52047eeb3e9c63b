//! Business logic services for admin.
//!
//! # Services
//!
//! - `availability` - Cached display rules and availability resolution

pub mod availability;

pub use availability::{
    AvailabilityError, AvailabilityService, PgRuleStore, RuleStore, resolve_logged,
};
