//! Availability display rules.
//!
//! Given a SKU's collection [`Scenario`](crate::Scenario) and the
//! [`View`](crate::View) it is shown in, the rule table decides which stock
//! figure to display and under what label:
//!
//! - [`formula`] - the restricted arithmetic language over `on_hand`,
//!   `incoming` and `committed`
//! - [`rules`] - the `(scenario, view) -> rule` table and its defaults
//! - [`resolve`](mod@resolve) - applying a rule to a SKU's stock inputs

pub mod formula;
pub mod resolve;
pub mod rules;

pub use formula::{Formula, FormulaError, Inputs, Variable};
pub use resolve::{Resolution, format_quantity, resolve, try_resolve};
pub use rules::{DisplayRule, FieldSource, RuleError, RuleSet, default_rule};
