//! Applying display rules to stock inputs.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::formula::{FormulaError, Inputs};
use super::rules::{DisplayRule, FieldSource, RuleSet};
use crate::types::{Scenario, View};

/// Decimal places kept for fractional results.
const DISPLAY_DECIMALS: u32 = 2;

/// What to show for one SKU in one view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Text to render.
    pub display: String,
    /// Numeric value behind `display`, absent for text and blank sources.
    ///
    /// Serialized as a JSON number, which is an `f64` for most consumers.
    /// Magnitudes past 2^53 lose precision there; `display` always carries
    /// the exact value.
    #[serde(with = "rust_decimal::serde::float_option")]
    pub numeric_value: Option<Decimal>,
    /// Column header for the value.
    pub label: String,
}

impl Resolution {
    fn numeric(value: Decimal, label: &str) -> Self {
        let value = round_quantity(value);
        Self {
            display: value.to_string(),
            numeric_value: Some(value),
            label: label.to_string(),
        }
    }

    /// The zero fallback used when a formula cannot be evaluated.
    #[must_use]
    pub fn zero(label: &str) -> Self {
        Self::numeric(Decimal::ZERO, label)
    }
}

impl DisplayRule {
    /// Apply this rule to a set of inputs.
    ///
    /// # Errors
    ///
    /// Returns an evaluation `FormulaError` when a formula source divides by
    /// zero or overflows.
    pub fn apply(&self, inputs: &Inputs) -> Result<Resolution, FormulaError> {
        let resolution = match &self.field_source {
            FieldSource::OnHand | FieldSource::Incoming | FieldSource::Committed => {
                let value = self
                    .field_source
                    .variable()
                    .map_or(0, |variable| inputs.get(variable));
                Resolution::numeric(Decimal::from(value), &self.label)
            }
            FieldSource::Formula { expression } => {
                Resolution::numeric(expression.evaluate(inputs)?, &self.label)
            }
            FieldSource::Label => Resolution {
                display: self.label.clone(),
                numeric_value: None,
                label: self.label.clone(),
            },
            FieldSource::Blank => Resolution {
                display: String::new(),
                numeric_value: None,
                label: self.label.clone(),
            },
        };
        Ok(resolution)
    }
}

/// Resolve what to show, surfacing formula evaluation errors.
///
/// # Errors
///
/// Returns `FormulaError` if the cell's formula cannot be evaluated for
/// these inputs.
pub fn try_resolve(
    rules: &RuleSet,
    scenario: Scenario,
    view: View,
    inputs: &Inputs,
) -> Result<Resolution, FormulaError> {
    rules.get(scenario, view).apply(inputs)
}

/// Resolve what to show, falling back to zero if the formula fails.
#[must_use]
pub fn resolve(rules: &RuleSet, scenario: Scenario, view: View, inputs: &Inputs) -> Resolution {
    let rule = rules.get(scenario, view);
    rule.apply(inputs)
        .unwrap_or_else(|_| Resolution::zero(&rule.label))
}

/// Round to two places, half away from zero, without trailing zeros.
fn round_quantity(value: Decimal) -> Decimal {
    value
        .round_dp_with_strategy(DISPLAY_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

/// Format a quantity the way it is displayed.
#[must_use]
pub fn format_quantity(value: Decimal) -> String {
    round_quantity(value).to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::availability::formula::Formula;

    fn formula_rule(source: &str, label: &str) -> DisplayRule {
        DisplayRule::new(
            FieldSource::Formula {
                expression: Formula::parse(source).unwrap(),
            },
            label,
        )
    }

    #[test]
    fn test_resolve_defaults_for_ats() {
        let rules = RuleSet::defaults();
        let inputs = Inputs::new(120, 0, 20);

        let admin = resolve(&rules, Scenario::Ats, View::AdminProducts, &inputs);
        assert_eq!(admin.display, "120");
        assert_eq!(admin.numeric_value, Some(Decimal::from(120)));
        assert_eq!(admin.label, "On Hand");

        let buyer = resolve(&rules, Scenario::Ats, View::BuyerPage, &inputs);
        assert_eq!(buyer.display, "100");
        assert_eq!(buyer.label, "Available");
    }

    #[test]
    fn test_resolve_defaults_for_pre_order() {
        let rules = RuleSet::defaults();
        let inputs = Inputs::new(0, 300, 120);

        let with_po = resolve(&rules, Scenario::PreOrderPo, View::XlsxExport, &inputs);
        assert_eq!(with_po.display, "180");

        let without_po = resolve(&rules, Scenario::PreOrderNoPo, View::BuyerPage, &inputs);
        assert_eq!(without_po.display, "Pre-Order");
        assert_eq!(without_po.numeric_value, None);

        let admin = resolve(&rules, Scenario::PreOrderNoPo, View::AdminInventory, &inputs);
        assert_eq!(admin.display, "120");
    }

    #[test]
    fn test_negative_values_are_not_clamped() {
        let rules = RuleSet::defaults();
        let oversold = Inputs::new(5, 0, 8);
        let buyer = resolve(&rules, Scenario::Ats, View::RepPage, &oversold);
        assert_eq!(buyer.display, "-3");
    }

    #[test]
    fn test_failed_formula_defaults_to_zero() {
        let rules = RuleSet::with_overrides([(
            Scenario::Ats,
            View::PdfExport,
            formula_rule("on_hand / committed", "Ratio"),
        )]);
        let inputs = Inputs::new(10, 0, 0);

        assert_eq!(
            try_resolve(&rules, Scenario::Ats, View::PdfExport, &inputs).unwrap_err(),
            FormulaError::DivisionByZero
        );

        let fallback = resolve(&rules, Scenario::Ats, View::PdfExport, &inputs);
        assert_eq!(fallback.display, "0");
        assert_eq!(fallback.numeric_value, Some(Decimal::ZERO));
        assert_eq!(fallback.label, "Ratio");
    }

    #[test]
    fn test_blank_source() {
        let rule = DisplayRule::new(FieldSource::Blank, "Stock");
        let resolution = rule.apply(&Inputs::default()).unwrap();
        assert_eq!(resolution.display, "");
        assert_eq!(resolution.numeric_value, None);
        assert_eq!(resolution.label, "Stock");
    }

    #[test]
    fn test_fractional_formatting() {
        let rule = formula_rule("on_hand / 3", "Thirds");
        let resolution = rule.apply(&Inputs::new(10, 0, 0)).unwrap();
        assert_eq!(resolution.display, "3.33");

        assert_eq!(format_quantity(Decimal::from_str("2.005").unwrap()), "2.01");
        assert_eq!(format_quantity(Decimal::from_str("-2.005").unwrap()), "-2.01");
        assert_eq!(format_quantity(Decimal::from_str("7.50").unwrap()), "7.5");
        assert_eq!(format_quantity(Decimal::from_str("90.0").unwrap()), "90");
    }

    #[test]
    fn test_display_is_exact_beyond_float_precision() {
        let rule = DisplayRule::new(FieldSource::OnHand, "On Hand");
        let beyond = (1_i64 << 53) + 1;
        let resolution = rule.apply(&Inputs::new(beyond, 0, 0)).unwrap();

        assert_eq!(resolution.display, "9007199254740993");
        assert_eq!(resolution.numeric_value, Some(Decimal::from(beyond)));

        let json = serde_json::to_value(&resolution).unwrap();
        assert_eq!(json["display"], "9007199254740993");
        assert!(json["numeric_value"].is_number());
    }

    #[test]
    fn test_resolution_json_uses_numbers() {
        let resolution = Resolution::zero("Available");
        let json = serde_json::to_value(&resolution).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"display": "0", "numeric_value": 0.0, "label": "Available"})
        );
    }
}
