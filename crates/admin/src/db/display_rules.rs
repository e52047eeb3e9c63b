//! Database operations for display rule overrides.
//!
//! Only cells that differ from the built-in table are stored. Deleting a row
//! resets the cell to its default.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use stockline_core::{DisplayRule, FieldSource, Scenario, View};

use super::RepositoryError;
use crate::models::StoredDisplayRule;

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for display rule queries.
#[derive(Debug, sqlx::FromRow)]
struct DisplayRuleRow {
    scenario: String,
    view: String,
    field_source: String,
    formula: Option<String>,
    label: String,
    updated_by: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DisplayRuleRow> for StoredDisplayRule {
    type Error = RepositoryError;

    fn try_from(row: DisplayRuleRow) -> Result<Self, Self::Error> {
        let scenario = row
            .scenario
            .parse::<Scenario>()
            .map_err(RepositoryError::DataCorruption)?;
        let view = row
            .view
            .parse::<View>()
            .map_err(RepositoryError::DataCorruption)?;
        let field_source = FieldSource::from_parts(&row.field_source, row.formula.as_deref())
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("display rule {scenario}/{view}: {e}"))
            })?;

        Ok(Self {
            scenario,
            view,
            rule: DisplayRule::new(field_source, row.label),
            updated_by: row.updated_by,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for display rule overrides.
pub struct DisplayRuleRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> DisplayRuleRepository<'a> {
    /// Create a new display rule repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List every stored override.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails, or
    /// `RepositoryError::DataCorruption` if a row no longer parses.
    pub async fn list(&self) -> Result<Vec<StoredDisplayRule>, RepositoryError> {
        let rows = sqlx::query_as::<_, DisplayRuleRow>(
            r"
            SELECT scenario, view, field_source, formula, label, updated_by, updated_at
            FROM admin.display_rules
            ORDER BY scenario, view
            ",
        )
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(StoredDisplayRule::try_from).collect()
    }

    /// Insert or replace the override for one cell.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        scenario: Scenario,
        view: View,
        rule: &DisplayRule,
        updated_by: &str,
    ) -> Result<StoredDisplayRule, RepositoryError> {
        let row = sqlx::query_as::<_, DisplayRuleRow>(
            r"
            INSERT INTO admin.display_rules
                (scenario, view, field_source, formula, label, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (scenario, view) DO UPDATE SET
                field_source = EXCLUDED.field_source,
                formula = EXCLUDED.formula,
                label = EXCLUDED.label,
                updated_by = EXCLUDED.updated_by,
                updated_at = NOW()
            RETURNING scenario, view, field_source, formula, label, updated_by, updated_at
            ",
        )
        .bind(scenario.as_str())
        .bind(view.as_str())
        .bind(rule.field_source.kind())
        .bind(rule.field_source.formula().map(|f| f.source().to_string()))
        .bind(&rule.label)
        .bind(updated_by)
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Delete the override for one cell.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the cell has no override, or
    /// `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, scenario: Scenario, view: View) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM admin.display_rules
            WHERE scenario = $1 AND view = $2
            ",
        )
        .bind(scenario.as_str())
        .bind(view.as_str())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
