//! HTTP route handlers for admin.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                                  - Liveness check
//! GET    /health/ready                            - Readiness check (database)
//!
//! # Display rules (bearer token required)
//! GET    /api/availability/rules                  - Full rule table
//! PUT    /api/availability/rules/{scenario}/{view} - Override one cell
//! DELETE /api/availability/rules/{scenario}/{view} - Reset one cell to default
//! POST   /api/availability/formulas/validate      - Check a formula
//! POST   /api/availability/preview                - Resolve sample inputs
//!
//! # Resolution (bearer token required)
//! GET    /api/availability/skus/{id}?view=        - Resolve one SKU
//! GET    /api/availability/collections/{id}?view= - Resolve a collection's SKUs
//! POST   /api/availability/resolve                - Resolve many SKUs
//! ```

pub mod availability;

use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::state::AppState;

/// Build the admin router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(availability::router())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
