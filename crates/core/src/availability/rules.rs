//! The display rule table: what to show for each scenario and view.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::formula::{Formula, FormulaError, Variable};
use crate::types::{Scenario, View};

/// Longest accepted rule label, in characters.
pub const MAX_LABEL_LEN: usize = 64;

/// Errors from building or validating a display rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("unknown field source '{0}'")]
    UnknownSource(String),
    #[error("formula field source requires an expression")]
    MissingExpression,
    #[error("label is required when the field source is 'label'")]
    EmptyLabel,
    #[error("label is longer than {max} characters")]
    LabelTooLong { max: usize },
    #[error("invalid formula: {0}")]
    Formula(#[from] FormulaError),
}

/// Where the displayed value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldSource {
    /// The `on_hand` input.
    OnHand,
    /// The `incoming` input.
    Incoming,
    /// The `committed` input.
    Committed,
    /// A formula over the inputs.
    Formula { expression: Formula },
    /// The rule's label, shown as text instead of a number.
    Label,
    /// Nothing.
    Blank,
}

impl FieldSource {
    /// Stable kind name used in the database and the API.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::OnHand => "on_hand",
            Self::Incoming => "incoming",
            Self::Committed => "committed",
            Self::Formula { .. } => "formula",
            Self::Label => "label",
            Self::Blank => "blank",
        }
    }

    /// The formula, if this source is one.
    #[must_use]
    pub const fn formula(&self) -> Option<&Formula> {
        match self {
            Self::Formula { expression } => Some(expression),
            _ => None,
        }
    }

    /// Rebuild a field source from its stored kind and expression.
    ///
    /// # Errors
    ///
    /// Returns `RuleError` for an unknown kind, a formula kind without an
    /// expression, or an expression that no longer parses.
    pub fn from_parts(kind: &str, expression: Option<&str>) -> Result<Self, RuleError> {
        match kind {
            "on_hand" => Ok(Self::OnHand),
            "incoming" => Ok(Self::Incoming),
            "committed" => Ok(Self::Committed),
            "label" => Ok(Self::Label),
            "blank" => Ok(Self::Blank),
            "formula" => {
                let source = expression.ok_or(RuleError::MissingExpression)?;
                Ok(Self::Formula {
                    expression: Formula::parse(source)?,
                })
            }
            other => Err(RuleError::UnknownSource(other.to_string())),
        }
    }

    /// The input variable this source reads directly, if any.
    #[must_use]
    pub const fn variable(&self) -> Option<Variable> {
        match self {
            Self::OnHand => Some(Variable::OnHand),
            Self::Incoming => Some(Variable::Incoming),
            Self::Committed => Some(Variable::Committed),
            _ => None,
        }
    }
}

/// One cell of the rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayRule {
    /// Where the value comes from.
    pub field_source: FieldSource,
    /// Column header, or the text itself for [`FieldSource::Label`].
    pub label: String,
}

impl DisplayRule {
    #[must_use]
    pub fn new(field_source: FieldSource, label: impl Into<String>) -> Self {
        Self {
            field_source,
            label: label.into(),
        }
    }

    /// Check the label constraints.
    ///
    /// # Errors
    ///
    /// Returns `RuleError` if the label is too long, or empty for a label source.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.label.chars().count() > MAX_LABEL_LEN {
            return Err(RuleError::LabelTooLong { max: MAX_LABEL_LEN });
        }
        if matches!(self.field_source, FieldSource::Label) && self.label.trim().is_empty() {
            return Err(RuleError::EmptyLabel);
        }
        Ok(())
    }
}

/// Built-in rule for a cell that has no stored override.
#[must_use]
pub fn default_rule(scenario: Scenario, view: View) -> DisplayRule {
    match (scenario, view.is_internal()) {
        (Scenario::Ats, true) => DisplayRule::new(FieldSource::OnHand, "On Hand"),
        (Scenario::Ats, false) => DisplayRule::new(
            FieldSource::Formula {
                expression: Formula::difference(Variable::OnHand, Variable::Committed),
            },
            "Available",
        ),
        (Scenario::PreOrderPo, true) => DisplayRule::new(FieldSource::Incoming, "Incoming"),
        (Scenario::PreOrderPo, false) => DisplayRule::new(
            FieldSource::Formula {
                expression: Formula::difference(Variable::Incoming, Variable::Committed),
            },
            "Available to Order",
        ),
        (Scenario::PreOrderNoPo, true) => DisplayRule::new(FieldSource::Committed, "Committed"),
        (Scenario::PreOrderNoPo, false) => DisplayRule::new(FieldSource::Label, "Pre-Order"),
    }
}

/// The complete rule table.
///
/// Every `(scenario, view)` cell has a rule: stored overrides are layered on
/// top of [`default_rule`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: BTreeMap<(Scenario, View), DisplayRule>,
    overridden: BTreeSet<(Scenario, View)>,
}

impl RuleSet {
    /// The built-in table with no overrides.
    #[must_use]
    pub fn defaults() -> Self {
        let rules = Scenario::ALL
            .into_iter()
            .flat_map(|s| View::ALL.into_iter().map(move |v| (s, v)))
            .map(|(s, v)| ((s, v), default_rule(s, v)))
            .collect();
        Self {
            rules,
            overridden: BTreeSet::new(),
        }
    }

    /// The built-in table with stored rules replacing individual cells.
    ///
    /// Later entries for the same cell win.
    #[must_use]
    pub fn with_overrides(
        overrides: impl IntoIterator<Item = (Scenario, View, DisplayRule)>,
    ) -> Self {
        let mut set = Self::defaults();
        for (scenario, view, rule) in overrides {
            set.rules.insert((scenario, view), rule);
            set.overridden.insert((scenario, view));
        }
        set
    }

    /// The rule for a cell.
    #[must_use]
    pub fn get(&self, scenario: Scenario, view: View) -> Cow<'_, DisplayRule> {
        self.rules.get(&(scenario, view)).map_or_else(
            || Cow::Owned(default_rule(scenario, view)),
            Cow::Borrowed,
        )
    }

    /// Whether the cell comes from a stored override.
    #[must_use]
    pub fn is_overridden(&self, scenario: Scenario, view: View) -> bool {
        self.overridden.contains(&(scenario, view))
    }

    /// All cells, scenario-major in table order.
    pub fn entries(&self) -> impl Iterator<Item = (Scenario, View, &DisplayRule)> {
        self.rules.iter().map(|(&(s, v), rule)| (s, v, rule))
    }

    /// Number of stored overrides.
    #[must_use]
    pub fn override_count(&self) -> usize {
        self.overridden.len()
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::defaults()
    }
}
