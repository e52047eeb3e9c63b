//! Database operations for SKU stock lookups.

use sqlx::PgPool;

use stockline_core::{CollectionId, CollectionType, Inputs, SkuId};

use super::RepositoryError;
use crate::models::SkuStock;

/// Internal row type for SKU joined with its collection.
#[derive(Debug, sqlx::FromRow)]
struct SkuStockRow {
    id: i32,
    sku: String,
    collection_id: i32,
    collection_name: String,
    collection_type: String,
    on_hand: i32,
    incoming: i32,
    committed: i32,
    po_number: Option<String>,
}

impl TryFrom<SkuStockRow> for SkuStock {
    type Error = RepositoryError;

    fn try_from(row: SkuStockRow) -> Result<Self, Self::Error> {
        let collection_type = row
            .collection_type
            .parse::<CollectionType>()
            .map_err(RepositoryError::DataCorruption)?;

        Ok(Self {
            id: SkuId::new(row.id),
            sku: row.sku,
            collection_id: CollectionId::new(row.collection_id),
            collection_name: row.collection_name,
            collection_type,
            inputs: Inputs::new(
                i64::from(row.on_hand),
                i64::from(row.incoming),
                i64::from(row.committed),
            ),
            po_number: row.po_number,
        })
    }
}

const SKU_STOCK_SELECT: &str = r"
    SELECT
        s.id, s.sku, s.collection_id,
        c.name AS collection_name,
        c.collection_type,
        s.on_hand, s.incoming, s.committed, s.po_number
    FROM admin.skus s
    JOIN admin.collections c ON c.id = s.collection_id
";

/// Repository for SKU stock lookups.
pub struct SkuRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SkuRepository<'a> {
    /// Create a new SKU repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get a SKU with its collection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_collection(
        &self,
        id: SkuId,
    ) -> Result<Option<SkuStock>, RepositoryError> {
        let row = sqlx::query_as::<_, SkuStockRow>(&format!("{SKU_STOCK_SELECT} WHERE s.id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        row.map(SkuStock::try_from).transpose()
    }

    /// Get several SKUs by ID. Missing IDs are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_many(&self, ids: &[SkuId]) -> Result<Vec<SkuStock>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(SkuId::as_i32).collect();
        let rows = sqlx::query_as::<_, SkuStockRow>(&format!(
            "{SKU_STOCK_SELECT} WHERE s.id = ANY($1) ORDER BY s.id"
        ))
        .bind(raw)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(SkuStock::try_from).collect()
    }

    /// List the SKUs of a collection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_collection(
        &self,
        collection_id: CollectionId,
    ) -> Result<Vec<SkuStock>, RepositoryError> {
        let rows = sqlx::query_as::<_, SkuStockRow>(&format!(
            "{SKU_STOCK_SELECT} WHERE s.collection_id = $1 ORDER BY s.sku"
        ))
        .bind(collection_id)
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(SkuStock::try_from).collect()
    }
}
