//! Stored display rule overrides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockline_core::{DisplayRule, Scenario, View};

/// A display rule override persisted in `admin.display_rules`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDisplayRule {
    /// Scenario row of the rule table.
    pub scenario: Scenario,
    /// View column of the rule table.
    pub view: View,
    /// The rule itself.
    #[serde(flatten)]
    pub rule: DisplayRule,
    /// Admin who last changed the rule.
    pub updated_by: Option<String>,
    /// When the rule was last changed.
    pub updated_at: DateTime<Utc>,
}

impl StoredDisplayRule {
    /// Key and rule, in the shape `RuleSet::with_overrides` takes.
    #[must_use]
    pub fn into_override(self) -> (Scenario, View, DisplayRule) {
        (self.scenario, self.view, self.rule)
    }
}
