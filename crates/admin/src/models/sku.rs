//! SKU stock records used as availability inputs.

use serde::{Deserialize, Serialize};

use stockline_core::{CollectionId, CollectionType, Inputs, Scenario, SkuId};

/// A SKU with its stock figures and the collection it is sold in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkuStock {
    /// Unique SKU ID.
    pub id: SkuId,
    /// SKU code (e.g., "TEE-BLK-M").
    pub sku: String,
    /// Collection the SKU belongs to.
    pub collection_id: CollectionId,
    /// Collection display name.
    pub collection_name: String,
    /// How the collection is sold.
    pub collection_type: CollectionType,
    /// Stock quantities.
    pub inputs: Inputs,
    /// Open purchase order number, if any.
    pub po_number: Option<String>,
}

impl SkuStock {
    /// Whether an open purchase order backs this SKU.
    #[must_use]
    pub fn has_open_po(&self) -> bool {
        self.po_number
            .as_deref()
            .is_some_and(|po| !po.trim().is_empty())
    }

    /// The collection scenario that selects this SKU's display rules.
    #[must_use]
    pub fn scenario(&self) -> Scenario {
        Scenario::classify(self.collection_type, self.has_open_po())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sku(collection_type: CollectionType, po_number: Option<&str>) -> SkuStock {
        SkuStock {
            id: SkuId::new(1),
            sku: "TEE-BLK-M".to_string(),
            collection_id: CollectionId::new(1),
            collection_name: "Spring".to_string(),
            collection_type,
            inputs: Inputs::new(10, 20, 5),
            po_number: po_number.map(String::from),
        }
    }

    #[test]
    fn test_scenario_from_collection_and_po() {
        assert_eq!(sku(CollectionType::Ats, None).scenario(), Scenario::Ats);
        assert_eq!(
            sku(CollectionType::PreOrder, Some("PO-1042")).scenario(),
            Scenario::PreOrderPo
        );
        assert_eq!(
            sku(CollectionType::PreOrder, None).scenario(),
            Scenario::PreOrderNoPo
        );
    }

    #[test]
    fn test_blank_po_number_is_not_an_open_po() {
        assert!(!sku(CollectionType::PreOrder, Some("  ")).has_open_po());
        assert_eq!(
            sku(CollectionType::PreOrder, Some("")).scenario(),
            Scenario::PreOrderNoPo
        );
    }
}
