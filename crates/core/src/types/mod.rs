//! Core types for Stockline.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod scenario;
pub mod view;

pub use id::*;
pub use scenario::{CollectionType, Scenario};
pub use view::View;
