//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AdminConfig;
use crate::services::{AvailabilityService, PgRuleStore};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    pool: PgPool,
    availability: AvailabilityService<PgRuleStore>,
}

impl AppState {
    /// Build application state.
    ///
    /// The availability service caches rules for `config.rules_cache_ttl`.
    #[must_use]
    pub fn new(config: AdminConfig, pool: PgPool) -> Self {
        let availability =
            AvailabilityService::new(PgRuleStore::new(pool.clone()), config.rules_cache_ttl);

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                availability,
            }),
        }
    }

    /// Application configuration.
    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    /// Database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Cached display rules and resolution.
    #[must_use]
    pub fn availability(&self) -> &AvailabilityService<PgRuleStore> {
        &self.inner.availability
    }
}
