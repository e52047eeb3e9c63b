//! Availability display rule routes.
//!
//! JSON API for editing the rule table and resolving what a view shows for a
//! SKU. Every route requires the admin API token.

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use stockline_core::{
    CollectionId, DisplayRule, FieldSource, Formula, Inputs, Resolution, Scenario, SkuId,
    Variable, View,
};

use crate::db::SkuRepository;
use crate::error::AppError;
use crate::middleware::RequireAdminToken;
use crate::models::StoredDisplayRule;
use crate::services::resolve_logged;
use crate::state::AppState;

/// Most SKU IDs accepted by one batch request.
pub const MAX_BATCH_SIZE: usize = 500;

/// Build the availability router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/availability/rules", get(list_rules))
        .route(
            "/api/availability/rules/{scenario}/{view}",
            put(update_rule).delete(reset_rule),
        )
        .route("/api/availability/formulas/validate", post(validate_formula))
        .route("/api/availability/preview", post(preview))
        .route("/api/availability/skus/{id}", get(resolve_sku))
        .route("/api/availability/collections/{id}", get(resolve_collection))
        .route("/api/availability/resolve", post(resolve_batch))
}

// =============================================================================
// API Types
// =============================================================================

/// One cell of the rule table.
#[derive(Debug, Serialize)]
pub struct RuleCellView {
    pub scenario: Scenario,
    pub view: View,
    pub field_source: FieldSource,
    pub label: String,
    /// Whether the cell comes from a stored override rather than the default.
    pub overridden: bool,
}

/// Response for the rule table.
#[derive(Debug, Serialize)]
pub struct RulesResponse {
    /// Seconds a rule change may take to reach other readers.
    pub cache_ttl_secs: u64,
    pub rules: Vec<RuleCellView>,
}

/// Request to check a formula.
#[derive(Debug, Deserialize)]
pub struct ValidateFormulaRequest {
    pub expression: String,
}

/// Result of checking a formula.
#[derive(Debug, Serialize)]
pub struct ValidateFormulaResponse {
    pub valid: bool,
    /// Trimmed source text, when valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    /// Inputs the formula reads, when valid.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<Variable>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Request to preview a resolution.
#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub scenario: Scenario,
    pub view: View,
    #[serde(default)]
    pub inputs: Inputs,
    /// Draft rule to try instead of the stored one.
    pub rule: Option<DisplayRule>,
}

/// Preview result.
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    #[serde(flatten)]
    pub resolution: Resolution,
    /// Set when the formula failed for these inputs and the value fell back to zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula_error: Option<String>,
}

/// Query parameters for resolving a SKU.
#[derive(Debug, Deserialize)]
pub struct ResolveSkuQuery {
    pub view: View,
}

/// Resolution for one SKU.
#[derive(Debug, Serialize)]
pub struct SkuResolution {
    pub sku_id: SkuId,
    pub sku: String,
    pub scenario: Scenario,
    pub view: View,
    #[serde(flatten)]
    pub resolution: Resolution,
}

/// Resolutions for every SKU in a collection.
#[derive(Debug, Serialize)]
pub struct CollectionResolution {
    pub collection_id: CollectionId,
    pub view: View,
    pub skus: Vec<SkuResolution>,
}

/// Request to resolve many SKUs for one view.
#[derive(Debug, Deserialize)]
pub struct BatchResolveRequest {
    pub view: View,
    pub sku_ids: Vec<SkuId>,
}

/// One entry of a batch result, in request order.
#[derive(Debug, Serialize)]
pub struct BatchItem {
    pub sku_id: SkuId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scenario: Option<Scenario>,
    #[serde(flatten)]
    pub resolution: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

/// Batch resolution result.
#[derive(Debug, Serialize)]
pub struct BatchResolveResponse {
    pub view: View,
    pub results: Vec<BatchItem>,
}

// =============================================================================
// Helpers
// =============================================================================

/// Parse `{scenario}/{view}` path segments.
fn parse_cell(scenario: &str, view: &str) -> Result<(Scenario, View), AppError> {
    let scenario = scenario.parse::<Scenario>().map_err(AppError::BadRequest)?;
    let view = view.parse::<View>().map_err(AppError::BadRequest)?;
    Ok((scenario, view))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| AppError::BadRequest(e.body_text()))
}

// =============================================================================
// Handlers
// =============================================================================

/// List the full rule table.
///
/// GET /api/availability/rules
#[instrument(skip_all)]
async fn list_rules(
    State(state): State<AppState>,
    RequireAdminToken(_admin): RequireAdminToken,
) -> Result<Json<RulesResponse>, AppError> {
    let rules = state.availability().rules().await?;

    let cells = rules
        .entries()
        .map(|(scenario, view, rule)| RuleCellView {
            scenario,
            view,
            field_source: rule.field_source.clone(),
            label: rule.label.clone(),
            overridden: rules.is_overridden(scenario, view),
        })
        .collect();

    Ok(Json(RulesResponse {
        cache_ttl_secs: state.availability().ttl().as_secs(),
        rules: cells,
    }))
}

/// Set the rule for one cell.
///
/// PUT /api/availability/rules/{scenario}/{view}
#[instrument(skip_all, fields(admin = %admin.name, %scenario, %view))]
async fn update_rule(
    State(state): State<AppState>,
    RequireAdminToken(admin): RequireAdminToken,
    Path((scenario, view)): Path<(String, String)>,
    payload: Result<Json<DisplayRule>, JsonRejection>,
) -> Result<Json<StoredDisplayRule>, AppError> {
    let (scenario, view) = parse_cell(&scenario, &view)?;
    let rule = json_body(payload)?;

    let stored = state
        .availability()
        .update_rule(scenario, view, &rule, &admin.name)
        .await?;

    Ok(Json(stored))
}

/// Reset one cell to its default.
///
/// DELETE /api/availability/rules/{scenario}/{view}
#[instrument(skip_all, fields(admin = %admin.name, %scenario, %view))]
async fn reset_rule(
    State(state): State<AppState>,
    RequireAdminToken(admin): RequireAdminToken,
    Path((scenario, view)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let (scenario, view) = parse_cell(&scenario, &view)?;

    state.availability().reset_rule(scenario, view).await?;

    Ok(StatusCode::NO_CONTENT.into_response())
}

/// Check a formula without storing anything.
///
/// POST /api/availability/formulas/validate
#[instrument(skip_all, fields(admin = %admin.name))]
async fn validate_formula(
    RequireAdminToken(admin): RequireAdminToken,
    payload: Result<Json<ValidateFormulaRequest>, JsonRejection>,
) -> Result<Json<ValidateFormulaResponse>, AppError> {
    let request = json_body(payload)?;

    let response = match Formula::parse(&request.expression) {
        Ok(formula) => ValidateFormulaResponse {
            valid: true,
            expression: Some(formula.source().to_string()),
            variables: formula.variables().into_iter().collect(),
            error: None,
        },
        Err(e) => ValidateFormulaResponse {
            valid: false,
            expression: None,
            variables: Vec::new(),
            error: Some(e.to_string()),
        },
    };

    Ok(Json(response))
}

/// Preview what a cell shows for given inputs, optionally with a draft rule.
///
/// POST /api/availability/preview
#[instrument(skip_all)]
async fn preview(
    State(state): State<AppState>,
    RequireAdminToken(_admin): RequireAdminToken,
    payload: Result<Json<PreviewRequest>, JsonRejection>,
) -> Result<Json<PreviewResponse>, AppError> {
    let request = json_body(payload)?;

    let rule = match request.rule {
        Some(draft) => {
            draft
                .validate()
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            draft
        }
        None => {
            let rules = state.availability().rules_or_defaults().await;
            rules.get(request.scenario, request.view).into_owned()
        }
    };

    let response = match rule.apply(&request.inputs) {
        Ok(resolution) => PreviewResponse {
            resolution,
            formula_error: None,
        },
        Err(e) => PreviewResponse {
            resolution: Resolution::zero(&rule.label),
            formula_error: Some(e.to_string()),
        },
    };

    Ok(Json(response))
}

/// Resolve one SKU for a view.
///
/// GET /api/availability/skus/{id}?view=...
#[instrument(skip_all)]
async fn resolve_sku(
    State(state): State<AppState>,
    RequireAdminToken(_admin): RequireAdminToken,
    id: Result<Path<i32>, PathRejection>,
    query: Result<Query<ResolveSkuQuery>, QueryRejection>,
) -> Result<Json<SkuResolution>, AppError> {
    let Path(id) = id.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let sku_id = SkuId::new(id);

    let sku = SkuRepository::new(state.pool())
        .get_with_collection(sku_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("SKU {sku_id}")))?;

    let resolution = state.availability().resolve_sku(&sku, query.view).await;

    Ok(Json(SkuResolution {
        sku_id,
        sku: sku.sku.clone(),
        scenario: sku.scenario(),
        view: query.view,
        resolution,
    }))
}

/// Resolve every SKU in a collection for a view, ordered by SKU code.
///
/// GET /api/availability/collections/{id}?view=...
#[instrument(skip_all)]
async fn resolve_collection(
    State(state): State<AppState>,
    RequireAdminToken(_admin): RequireAdminToken,
    id: Result<Path<i32>, PathRejection>,
    query: Result<Query<ResolveSkuQuery>, QueryRejection>,
) -> Result<Json<CollectionResolution>, AppError> {
    let Path(id) = id.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let Query(query) = query.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let collection_id = CollectionId::new(id);

    let skus = SkuRepository::new(state.pool())
        .list_by_collection(collection_id)
        .await?;
    let rules = state.availability().rules_or_defaults().await;

    let skus = skus
        .into_iter()
        .map(|sku| {
            let scenario = sku.scenario();
            SkuResolution {
                resolution: resolve_logged(&rules, scenario, query.view, &sku.inputs),
                sku_id: sku.id,
                sku: sku.sku,
                scenario,
                view: query.view,
            }
        })
        .collect();

    Ok(Json(CollectionResolution {
        collection_id,
        view: query.view,
        skus,
    }))
}

/// Resolve many SKUs for one view, as the PDF and XLSX exporters do.
///
/// POST /api/availability/resolve
#[instrument(skip_all)]
async fn resolve_batch(
    State(state): State<AppState>,
    RequireAdminToken(_admin): RequireAdminToken,
    payload: Result<Json<BatchResolveRequest>, JsonRejection>,
) -> Result<Json<BatchResolveResponse>, AppError> {
    let request = json_body(payload)?;
    if request.sku_ids.len() > MAX_BATCH_SIZE {
        return Err(AppError::BadRequest(format!(
            "at most {MAX_BATCH_SIZE} SKUs per request (got {})",
            request.sku_ids.len()
        )));
    }

    let skus = SkuRepository::new(state.pool())
        .get_many(&request.sku_ids)
        .await?;
    let rules = state.availability().rules_or_defaults().await;

    let results = request
        .sku_ids
        .iter()
        .map(|&sku_id| match skus.iter().find(|s| s.id == sku_id) {
            Some(sku) => {
                let scenario = sku.scenario();
                BatchItem {
                    sku_id,
                    sku: Some(sku.sku.clone()),
                    scenario: Some(scenario),
                    resolution: Some(resolve_logged(&rules, scenario, request.view, &sku.inputs)),
                    error: None,
                }
            }
            None => BatchItem {
                sku_id,
                sku: None,
                scenario: None,
                resolution: None,
                error: Some("not_found"),
            },
        })
        .collect();

    tracing::debug!(
        requested = request.sku_ids.len(),
        found = skus.len(),
        view = %request.view,
        "Resolved availability batch"
    );

    Ok(Json(BatchResolveResponse {
        view: request.view,
        results,
    }))
}
