//! Collection scenarios that drive which availability figure is shown.

use serde::{Deserialize, Serialize};

/// How a collection is sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CollectionType {
    /// Stock on the shelf, available to sell.
    #[default]
    Ats,
    /// Sold ahead of production.
    PreOrder,
}

impl CollectionType {
    /// Stable string form used in the database and the API.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ats => "ats",
            Self::PreOrder => "pre_order",
        }
    }
}

impl std::fmt::Display for CollectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CollectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ats" => Ok(Self::Ats),
            "pre_order" => Ok(Self::PreOrder),
            _ => Err(format!("invalid collection type: {s}")),
        }
    }
}

/// The collection scenario a SKU falls under.
///
/// Each scenario has its own row in the display rule table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Available-to-sell stock.
    Ats,
    /// Pre-order backed by an open purchase order.
    PreOrderPo,
    /// Pre-order with no purchase order placed yet.
    PreOrderNoPo,
}

impl Scenario {
    /// Every scenario, in table order.
    pub const ALL: [Self; 3] = [Self::Ats, Self::PreOrderPo, Self::PreOrderNoPo];

    /// Classify a SKU from its collection type and purchase order state.
    #[must_use]
    pub const fn classify(collection_type: CollectionType, has_open_po: bool) -> Self {
        match (collection_type, has_open_po) {
            (CollectionType::Ats, _) => Self::Ats,
            (CollectionType::PreOrder, true) => Self::PreOrderPo,
            (CollectionType::PreOrder, false) => Self::PreOrderNoPo,
        }
    }

    /// Stable string form used in the database and the API.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ats => "ats",
            Self::PreOrderPo => "pre_order_po",
            Self::PreOrderNoPo => "pre_order_no_po",
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ats" => Ok(Self::Ats),
            "pre_order_po" => Ok(Self::PreOrderPo),
            "pre_order_no_po" => Ok(Self::PreOrderNoPo),
            _ => Err(format!("invalid scenario: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(Scenario::classify(CollectionType::Ats, false), Scenario::Ats);
        // An ATS collection stays ATS even if a PO happens to be open.
        assert_eq!(Scenario::classify(CollectionType::Ats, true), Scenario::Ats);
        assert_eq!(
            Scenario::classify(CollectionType::PreOrder, true),
            Scenario::PreOrderPo
        );
        assert_eq!(
            Scenario::classify(CollectionType::PreOrder, false),
            Scenario::PreOrderNoPo
        );
    }

    #[test]
    fn test_scenario_string_forms_agree_with_serde() {
        for scenario in Scenario::ALL {
            let json = serde_json::to_string(&scenario).unwrap_or_default();
            assert_eq!(json, format!("\"{scenario}\""));
            assert_eq!(scenario.as_str().parse::<Scenario>(), Ok(scenario));
        }
    }

    #[test]
    fn test_invalid_scenario() {
        assert!("preorder".parse::<Scenario>().is_err());
        assert!("ATS".parse::<Scenario>().is_err());
    }

    #[test]
    fn test_collection_type_parse() {
        assert_eq!(
            "pre_order".parse::<CollectionType>(),
            Ok(CollectionType::PreOrder)
        );
        assert!("ats ".parse::<CollectionType>().is_err());
    }
}
