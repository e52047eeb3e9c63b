//! Stockline Core - availability display rules.
//!
//! This crate provides the types and the rule engine shared by all Stockline
//! components:
//! - `admin` - Internal service that stores rules and resolves availability
//! - `cli` - Command-line tools for migrations and formula checks
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. Rule lookup and formula evaluation can be
//! used anywhere, including the exporters that resolve thousands of SKUs.
//!
//! # Modules
//!
//! - [`types`] - Scenario and view enums, type-safe IDs
//! - [`availability`] - Formula language, rule table and resolution

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod availability;
pub mod types;

pub use availability::{
    DisplayRule, FieldSource, Formula, FormulaError, Inputs, Resolution, RuleError, RuleSet,
    Variable, default_rule, format_quantity, resolve, try_resolve,
};
pub use types::*;
