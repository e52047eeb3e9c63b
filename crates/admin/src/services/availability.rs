//! Availability service: cached display rules and resolution.
//!
//! The rule set is loaded from the rule store on first use and cached with
//! `moka` for the configured TTL (one minute by default). Concurrent misses
//! share a single load. Every admin edit invalidates the cached set, so the
//! editing admin sees the change immediately and other readers see it within
//! one TTL at most.
//!
//! The cache is keyed by a generation counter that each invalidation bumps.
//! A load that read the store before an edit finishes under the old
//! generation, which no later reader asks for.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use stockline_core::{DisplayRule, Inputs, Resolution, RuleError, RuleSet, Scenario, View};

use crate::db::{DisplayRuleRepository, RepositoryError};
use crate::models::{SkuStock, StoredDisplayRule};

/// Errors from the availability service.
#[derive(Debug, Error)]
pub enum AvailabilityError {
    /// Loading the rule set failed (shared by every caller waiting on the load).
    #[error("failed to load display rules: {0}")]
    Load(Arc<RepositoryError>),

    /// A store write failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The submitted rule is not valid.
    #[error("invalid display rule: {0}")]
    InvalidRule(#[from] RuleError),
}

// =============================================================================
// Rule store seam
// =============================================================================

/// Persistence for display rule overrides.
pub trait RuleStore: Send + Sync + 'static {
    /// Load every stored override.
    fn load_overrides(
        &self,
    ) -> impl Future<Output = Result<Vec<StoredDisplayRule>, RepositoryError>> + Send;

    /// Insert or replace the override for one cell.
    fn save(
        &self,
        scenario: Scenario,
        view: View,
        rule: &DisplayRule,
        updated_by: &str,
    ) -> impl Future<Output = Result<StoredDisplayRule, RepositoryError>> + Send;

    /// Remove the override for one cell.
    fn remove(
        &self,
        scenario: Scenario,
        view: View,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// Rule store backed by `admin.display_rules`.
#[derive(Clone)]
pub struct PgRuleStore {
    pool: PgPool,
}

impl PgRuleStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RuleStore for PgRuleStore {
    async fn load_overrides(&self) -> Result<Vec<StoredDisplayRule>, RepositoryError> {
        DisplayRuleRepository::new(&self.pool).list().await
    }

    async fn save(
        &self,
        scenario: Scenario,
        view: View,
        rule: &DisplayRule,
        updated_by: &str,
    ) -> Result<StoredDisplayRule, RepositoryError> {
        DisplayRuleRepository::new(&self.pool)
            .upsert(scenario, view, rule, updated_by)
            .await
    }

    async fn remove(&self, scenario: Scenario, view: View) -> Result<(), RepositoryError> {
        DisplayRuleRepository::new(&self.pool)
            .delete(scenario, view)
            .await
    }
}

// =============================================================================
// Service
// =============================================================================

/// Cached access to the display rule table.
pub struct AvailabilityService<S> {
    inner: Arc<AvailabilityServiceInner<S>>,
}

struct AvailabilityServiceInner<S> {
    store: S,
    cache: Cache<u64, Arc<RuleSet>>,
    generation: AtomicU64,
    ttl: Duration,
}

impl<S> Clone for AvailabilityService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: RuleStore> AvailabilityService<S> {
    /// Create a service that caches the rule set for `ttl`.
    #[must_use]
    pub fn new(store: S, ttl: Duration) -> Self {
        // Retired generations are never read again and age out with the TTL.
        let cache = Cache::builder().time_to_live(ttl).build();

        Self {
            inner: Arc::new(AvailabilityServiceInner {
                store,
                cache,
                generation: AtomicU64::new(0),
                ttl,
            }),
        }
    }

    /// The underlying rule store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    /// How long a loaded rule set is served.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// The current rule set, loading it on a cache miss.
    ///
    /// # Errors
    ///
    /// Returns `AvailabilityError::Load` if the store cannot be read.
    pub async fn rules(&self) -> Result<Arc<RuleSet>, AvailabilityError> {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        self.inner
            .cache
            .try_get_with(generation, async {
                let stored = self.inner.store.load_overrides().await?;
                debug!(overrides = stored.len(), "Loaded display rules");
                Ok::<_, RepositoryError>(Arc::new(RuleSet::with_overrides(
                    stored.into_iter().map(StoredDisplayRule::into_override),
                )))
            })
            .await
            .map_err(AvailabilityError::Load)
    }

    /// The current rule set, or the built-in defaults if the store is unreachable.
    ///
    /// Defaults served this way are not cached; the next call retries the store.
    pub async fn rules_or_defaults(&self) -> Arc<RuleSet> {
        match self.rules().await {
            Ok(rules) => rules,
            Err(e) => {
                warn!(error = %e, "Falling back to default display rules");
                Arc::new(RuleSet::defaults())
            }
        }
    }

    /// Drop the cached rule set.
    ///
    /// Loads already in flight finish under the retired generation, so their
    /// result is never served.
    pub async fn invalidate(&self) {
        let retired = self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.cache.invalidate(&retired).await;
    }

    /// Validate, store and publish a rule for one cell.
    ///
    /// # Errors
    ///
    /// Returns `AvailabilityError::InvalidRule` if the rule fails validation
    /// (nothing is stored), or `AvailabilityError::Repository` if the write fails.
    #[instrument(skip(self, rule), fields(source = rule.field_source.kind()))]
    pub async fn update_rule(
        &self,
        scenario: Scenario,
        view: View,
        rule: &DisplayRule,
        updated_by: &str,
    ) -> Result<StoredDisplayRule, AvailabilityError> {
        rule.validate()?;
        let stored = self
            .inner
            .store
            .save(scenario, view, rule, updated_by)
            .await?;
        self.invalidate().await;
        info!(%scenario, %view, "Display rule updated");
        Ok(stored)
    }

    /// Reset one cell to its built-in default.
    ///
    /// # Errors
    ///
    /// Returns `AvailabilityError::Repository` with `RepositoryError::NotFound`
    /// if the cell had no override.
    #[instrument(skip(self))]
    pub async fn reset_rule(&self, scenario: Scenario, view: View) -> Result<(), AvailabilityError> {
        self.inner.store.remove(scenario, view).await?;
        self.invalidate().await;
        info!(%scenario, %view, "Display rule reset to default");
        Ok(())
    }

    /// Resolve what to show for one set of inputs.
    pub async fn resolve(&self, scenario: Scenario, view: View, inputs: &Inputs) -> Resolution {
        let rules = self.rules_or_defaults().await;
        resolve_logged(&rules, scenario, view, inputs)
    }

    /// Resolve what to show for a SKU.
    pub async fn resolve_sku(&self, sku: &SkuStock, view: View) -> Resolution {
        self.resolve(sku.scenario(), view, &sku.inputs).await
    }
}

/// Resolve against a loaded rule set, logging and zeroing formula failures.
#[must_use]
pub fn resolve_logged(
    rules: &RuleSet,
    scenario: Scenario,
    view: View,
    inputs: &Inputs,
) -> Resolution {
    match stockline_core::try_resolve(rules, scenario, view, inputs) {
        Ok(resolution) => resolution,
        Err(e) => {
            warn!(%scenario, %view, error = %e, "Formula evaluation failed, showing zero");
            Resolution::zero(&rules.get(scenario, view).label)
        }
    }
}

// =============================================================================
// In-memory store
// =============================================================================

pub mod memory {
    //! In-memory rule store for tests and local tooling.

    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};

    use chrono::Utc;

    use super::{RuleStore, StoredDisplayRule};
    use crate::db::RepositoryError;
    use stockline_core::{DisplayRule, Scenario, View};

    /// Rule store that keeps overrides in a map and counts loads.
    #[derive(Default)]
    pub struct MemoryRuleStore {
        rules: Mutex<BTreeMap<(Scenario, View), StoredDisplayRule>>,
        loads: AtomicUsize,
        unavailable: AtomicBool,
    }

    impl MemoryRuleStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of times overrides have been loaded.
        #[must_use]
        pub fn load_count(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }

        /// Make every subsequent call fail, as if the database were down.
        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        fn check_available(&self) -> Result<(), RepositoryError> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
            }
            Ok(())
        }
    }

    impl RuleStore for MemoryRuleStore {
        async fn load_overrides(&self) -> Result<Vec<StoredDisplayRule>, RepositoryError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.check_available()?;
            let rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
            Ok(rules.values().cloned().collect())
        }

        async fn save(
            &self,
            scenario: Scenario,
            view: View,
            rule: &DisplayRule,
            updated_by: &str,
        ) -> Result<StoredDisplayRule, RepositoryError> {
            self.check_available()?;
            let stored = StoredDisplayRule {
                scenario,
                view,
                rule: rule.clone(),
                updated_by: Some(updated_by.to_string()),
                updated_at: Utc::now(),
            };
            self.rules
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert((scenario, view), stored.clone());
            Ok(stored)
        }

        async fn remove(&self, scenario: Scenario, view: View) -> Result<(), RepositoryError> {
            self.check_available()?;
            self.rules
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&(scenario, view))
                .map(|_| ())
                .ok_or(RepositoryError::NotFound)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use stockline_core::{FieldSource, Formula};
    use tokio::sync::Notify;

    use super::memory::MemoryRuleStore;
    use super::*;

    /// Store whose loads can be held after reading, to race them against edits.
    #[derive(Default)]
    struct GatedStore {
        inner: MemoryRuleStore,
        hold: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl RuleStore for GatedStore {
        async fn load_overrides(&self) -> Result<Vec<StoredDisplayRule>, RepositoryError> {
            let stored = self.inner.load_overrides().await?;
            if self.hold.load(Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(stored)
        }

        async fn save(
            &self,
            scenario: Scenario,
            view: View,
            rule: &DisplayRule,
            updated_by: &str,
        ) -> Result<StoredDisplayRule, RepositoryError> {
            self.inner.save(scenario, view, rule, updated_by).await
        }

        async fn remove(&self, scenario: Scenario, view: View) -> Result<(), RepositoryError> {
            self.inner.remove(scenario, view).await
        }
    }

    fn service(ttl: Duration) -> AvailabilityService<MemoryRuleStore> {
        AvailabilityService::new(MemoryRuleStore::new(), ttl)
    }

    fn formula_rule(source: &str, label: &str) -> DisplayRule {
        DisplayRule::new(
            FieldSource::Formula {
                expression: Formula::parse(source).unwrap(),
            },
            label,
        )
    }

    #[tokio::test]
    async fn test_rules_are_cached() {
        let service = service(Duration::from_secs(60));

        let first = service.rules().await.unwrap();
        let second = service.rules().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(service.store().load_count(), 1);
    }

    #[tokio::test]
    async fn test_update_invalidates_cache() {
        let service = service(Duration::from_secs(60));
        let inputs = Inputs::new(50, 0, 10);

        let before = service.resolve(Scenario::Ats, View::BuyerPage, &inputs).await;
        assert_eq!(before.display, "40");

        service
            .update_rule(
                Scenario::Ats,
                View::BuyerPage,
                &formula_rule("on_hand - committed - 5", "Available"),
                "ops",
            )
            .await
            .unwrap();

        let after = service.resolve(Scenario::Ats, View::BuyerPage, &inputs).await;
        assert_eq!(after.display, "35");
        assert_eq!(service.store().load_count(), 2);
    }

    #[tokio::test]
    async fn test_load_in_flight_during_edit_is_not_served() {
        let service = AvailabilityService::new(GatedStore::default(), Duration::from_secs(60));
        service.store().hold.store(true, Ordering::SeqCst);

        let reader = tokio::spawn({
            let service = service.clone();
            async move { service.rules().await.unwrap() }
        });
        service.store().entered.notified().await;
        service.store().hold.store(false, Ordering::SeqCst);

        service
            .update_rule(
                Scenario::Ats,
                View::BuyerPage,
                &DisplayRule::new(FieldSource::Blank, ""),
                "ops",
            )
            .await
            .unwrap();
        service.store().release.notify_one();

        let stale = reader.await.unwrap();
        assert!(!stale.is_overridden(Scenario::Ats, View::BuyerPage));

        let current = service.rules().await.unwrap();
        assert!(current.is_overridden(Scenario::Ats, View::BuyerPage));
    }

    #[tokio::test]
    async fn test_reset_restores_default() {
        let service = service(Duration::from_secs(60));
        service
            .update_rule(
                Scenario::PreOrderNoPo,
                View::BuyerPage,
                &DisplayRule::new(FieldSource::Blank, ""),
                "ops",
            )
            .await
            .unwrap();
        assert!(
            service
                .rules()
                .await
                .unwrap()
                .is_overridden(Scenario::PreOrderNoPo, View::BuyerPage)
        );

        service
            .reset_rule(Scenario::PreOrderNoPo, View::BuyerPage)
            .await
            .unwrap();
        let resolution = service
            .resolve(Scenario::PreOrderNoPo, View::BuyerPage, &Inputs::default())
            .await;
        assert_eq!(resolution.display, "Pre-Order");
    }

    #[tokio::test]
    async fn test_reset_without_override_is_not_found() {
        let service = service(Duration::from_secs(60));
        let err = service
            .reset_rule(Scenario::Ats, View::PdfExport)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AvailabilityError::Repository(RepositoryError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_invalid_rule_is_not_stored() {
        let service = service(Duration::from_secs(60));
        let err = service
            .update_rule(
                Scenario::Ats,
                View::RepPage,
                &DisplayRule::new(FieldSource::Label, ""),
                "ops",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AvailabilityError::InvalidRule(RuleError::EmptyLabel)));
        assert_eq!(service.rules().await.unwrap().override_count(), 0);
    }

    #[tokio::test]
    async fn test_ttl_expiry_reloads() {
        let service = service(Duration::from_millis(50));

        service.rules().await.unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        service.rules().await.unwrap();

        assert_eq!(service.store().load_count(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_falls_back_to_defaults_uncached() {
        let service = service(Duration::from_secs(60));
        service.store().set_unavailable(true);

        assert!(matches!(
            service.rules().await,
            Err(AvailabilityError::Load(_))
        ));
        let rules = service.rules_or_defaults().await;
        assert_eq!(*rules, RuleSet::defaults());

        service.store().set_unavailable(false);
        service.rules().await.unwrap();
        // Two failed loads, then one successful load.
        assert_eq!(service.store().load_count(), 3);
    }

    #[tokio::test]
    async fn test_formula_failure_shows_zero() {
        let service = service(Duration::from_secs(60));
        service
            .update_rule(
                Scenario::PreOrderPo,
                View::XlsxExport,
                &formula_rule("incoming / committed", "Cover"),
                "ops",
            )
            .await
            .unwrap();

        let resolution = service
            .resolve(Scenario::PreOrderPo, View::XlsxExport, &Inputs::new(0, 10, 0))
            .await;
        assert_eq!(resolution.display, "0");
        assert_eq!(resolution.label, "Cover");
    }
}
