//! HTTP middleware and extractors for admin.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request tracing with status and latency)
//! 3. Auth extractor on `/api/*` handlers (bearer token)

pub mod auth;

pub use auth::{AdminAuthRejection, CurrentAdmin, RequireAdminToken};
