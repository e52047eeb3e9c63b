//! Display contexts in which availability is rendered.

use serde::{Deserialize, Serialize};

/// A place where an availability figure is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    /// Admin product table.
    AdminProducts,
    /// Admin inventory table.
    AdminInventory,
    /// Buyer-facing order page.
    BuyerPage,
    /// Sales rep order page.
    RepPage,
    /// PDF line sheet.
    PdfExport,
    /// XLSX export.
    XlsxExport,
}

impl View {
    /// Every view, in table order.
    pub const ALL: [Self; 6] = [
        Self::AdminProducts,
        Self::AdminInventory,
        Self::BuyerPage,
        Self::RepPage,
        Self::PdfExport,
        Self::XlsxExport,
    ];

    /// Stable string form used in the database and the API.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AdminProducts => "admin_products",
            Self::AdminInventory => "admin_inventory",
            Self::BuyerPage => "buyer_page",
            Self::RepPage => "rep_page",
            Self::PdfExport => "pdf_export",
            Self::XlsxExport => "xlsx_export",
        }
    }

    /// Internal views see raw stock figures; the rest see what can be ordered.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::AdminProducts | Self::AdminInventory)
    }
}

impl std::fmt::Display for View {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|view| view.as_str() == s)
            .ok_or_else(|| format!("invalid view: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_parse_roundtrip() {
        for view in View::ALL {
            assert_eq!(view.to_string().parse::<View>(), Ok(view));
        }
        assert!("admin".parse::<View>().is_err());
    }

    #[test]
    fn test_internal_views() {
        let internal: Vec<View> = View::ALL.into_iter().filter(View::is_internal).collect();
        assert_eq!(internal, vec![View::AdminProducts, View::AdminInventory]);
    }
}
