//! Cache-coherent repository over a record store and a cache backend.
//!
//! Reads probe the cache and fall back to the store, repopulating on miss.
//! Writes go to the store first and invalidate afterwards, so the cache is
//! never invalidated for a write that did not happen. Every write deletes the
//! mutated record's key and the whole list-query namespace; over-invalidation
//! is always safe, under-invalidation never is.
//!
//! Cache availability is re-checked on every call. When the backend is down
//! or the cache is disabled, both paths bypass it entirely and the repository
//! serves strictly from the store - correct, only slower. Recovery is
//! automatic once the backend answers pings again.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use stockpile_core::{
    ChangeAction, ChangeEvent, HealthCheck, InventoryRecord, NewRecord, Page, RecordId,
    RecordPatch, RecordQuery, StockError, StockResult, StoreError, ValidationError,
};

use crate::cache::{CacheBackend, CacheKey, CacheSettings, CacheStats, QUERY_PREFIX};
use crate::store::RecordStore;
use crate::validation;

/// Actor recorded on history events when the caller does not supply one.
const SYSTEM_ACTOR: &str = "system";

/// Read/write facade combining the durable record store with a best-effort
/// cache.
///
/// Both collaborators are injected at construction; there is no hidden global
/// state, and tests substitute either side freely.
pub struct CachedRecordStore<S, C> {
    store: Arc<S>,
    cache: Arc<C>,
    settings: CacheSettings,
}

impl<S, C> CachedRecordStore<S, C>
where
    S: RecordStore,
    C: CacheBackend,
{
    /// Create a new repository.
    pub fn new(store: Arc<S>, cache: Arc<C>, settings: CacheSettings) -> Self {
        Self {
            store,
            cache,
            settings,
        }
    }

    /// Create a repository with default cache settings.
    pub fn with_defaults(store: Arc<S>, cache: Arc<C>) -> Self {
        Self::new(store, cache, CacheSettings::default())
    }

    /// Get a reference to the underlying record store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get a reference to the cache backend.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Get the cache settings.
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    // ========================================================================
    // READ PATH
    // ========================================================================

    /// Get a record by ID.
    ///
    /// Serves from the cache on a hit; otherwise reads the store and
    /// repopulates the cache best-effort. Not-found is propagated without
    /// caching the negative result, so a subsequent create is visible
    /// immediately.
    pub async fn get_record(&self, id: RecordId) -> StockResult<InventoryRecord> {
        let key = CacheKey::record(id);
        let use_cache = self.cache_ready().await;

        if use_cache {
            if let Some(record) = self.cache_fetch::<InventoryRecord>(&key).await {
                return Ok(record);
            }
        }

        let record = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(StoreError::NotFound { id })?;

        if use_cache {
            self.cache_store(&key, &record, self.settings.default_ttl)
                .await;
        }
        Ok(record)
    }

    /// List records for a filtered, sorted, paginated query.
    ///
    /// The cache key is derived from the full normalized query signature, so
    /// distinct queries never collide. Listing entries use the shorter query
    /// TTL since aggregate views change more often than single records.
    pub async fn list_records(&self, query: &RecordQuery) -> StockResult<Page<InventoryRecord>> {
        validation::validate_query(query)?;

        let key = CacheKey::query(query);
        let use_cache = self.cache_ready().await;

        if use_cache {
            if let Some(page) = self.cache_fetch::<Page<InventoryRecord>>(&key).await {
                return Ok(page);
            }
        }

        let (items, total_count) = self.store.find(query).await?;
        let page = Page::new(items, total_count, query.page, query.page_size);

        if use_cache {
            self.cache_store(&key, &page, self.settings.effective_query_ttl())
                .await;
        }
        Ok(page)
    }

    /// Page through a product's change history, newest first.
    ///
    /// History reads are a store passthrough: the audit trail is not cached.
    pub async fn get_history(
        &self,
        product_id: &str,
        page: u32,
        page_size: u32,
    ) -> StockResult<Page<ChangeEvent>> {
        validation::validate_pagination(page, page_size)?;
        let (events, total_count) = self.store.list_history(product_id, page, page_size).await?;
        Ok(Page::new(events, total_count, page, page_size))
    }

    // ========================================================================
    // WRITE PATH
    // ========================================================================

    /// Create a record.
    ///
    /// Returns the store-authoritative record so the caller sees the true
    /// post-write state immediately.
    pub async fn create_record(
        &self,
        new: NewRecord,
        actor: &str,
    ) -> StockResult<InventoryRecord> {
        validation::validate_new_record(&new)?;

        let record = new.into_record();
        let stored = self.store.insert(&record).await?;

        self.record_history(ChangeEvent::new(
            &stored.product_id,
            ChangeAction::Create,
            0,
            stored.quantity,
            actor,
            None,
        ))
        .await;
        self.invalidate(stored.record_id).await;

        Ok(stored)
    }

    /// Adjust a record's quantity by a signed delta.
    ///
    /// Fails with `InsufficientStock` when the result would go negative; a
    /// rejected adjustment has no store or cache effect.
    pub async fn update_quantity(
        &self,
        id: RecordId,
        delta: i64,
        actor: &str,
        notes: Option<String>,
    ) -> StockResult<InventoryRecord> {
        validation::validate_quantity_delta(delta)?;

        let current = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(StoreError::NotFound { id })?;

        let new_quantity = current.quantity + delta;
        if new_quantity < 0 {
            return Err(StockError::InsufficientStock {
                product_id: current.product_id,
                requested: -delta,
                available: current.quantity,
            });
        }

        let updated = self
            .store
            .update_quantity(id, new_quantity)
            .await?
            .ok_or(StoreError::NotFound { id })?;

        self.record_history(ChangeEvent::new(
            &updated.product_id,
            ChangeAction::Adjust,
            current.quantity,
            new_quantity,
            actor,
            notes,
        ))
        .await;
        self.invalidate(id).await;

        Ok(updated)
    }

    /// Add stock to a record. Routes through `update_quantity`.
    pub async fn add_stock(
        &self,
        id: RecordId,
        quantity: i64,
        actor: &str,
        notes: Option<String>,
    ) -> StockResult<InventoryRecord> {
        validate_positive_amount(quantity)?;
        self.update_quantity(id, quantity, actor, notes).await
    }

    /// Remove stock from a record. Routes through `update_quantity` and
    /// rejects removals that would drive the quantity below zero.
    pub async fn remove_stock(
        &self,
        id: RecordId,
        quantity: i64,
        actor: &str,
        notes: Option<String>,
    ) -> StockResult<InventoryRecord> {
        validate_positive_amount(quantity)?;
        self.update_quantity(id, -quantity, actor, notes).await
    }

    /// Update descriptive or threshold fields.
    ///
    /// The `max_stock > min_stock` invariant is checked against the effective
    /// record - stored values merged with the patch - so a partial patch
    /// cannot break it.
    pub async fn update_fields(
        &self,
        id: RecordId,
        patch: RecordPatch,
    ) -> StockResult<InventoryRecord> {
        validation::validate_patch(&patch)?;

        let current = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(StoreError::NotFound { id })?;

        let effective_min = patch.min_stock.unwrap_or(current.min_stock);
        let effective_max = patch.max_stock.unwrap_or(current.max_stock);
        validation::validate_stock_bounds(effective_min, effective_max)?;

        let updated = self
            .store
            .update(id, &patch)
            .await?
            .ok_or(StoreError::NotFound { id })?;

        self.record_history(ChangeEvent::new(
            &updated.product_id,
            ChangeAction::Update,
            updated.quantity,
            updated.quantity,
            SYSTEM_ACTOR,
            None,
        ))
        .await;
        self.invalidate(id).await;

        Ok(updated)
    }

    /// Delete a record and purge its cache entries.
    ///
    /// Returns false without side effects when the record does not exist.
    pub async fn delete_record(&self, id: RecordId) -> StockResult<bool> {
        let Some(current) = self.store.find_by_id(id).await? else {
            return Ok(false);
        };

        let removed = self.store.delete(id).await?;
        if removed {
            self.record_history(ChangeEvent::new(
                &current.product_id,
                ChangeAction::Delete,
                current.quantity,
                0,
                SYSTEM_ACTOR,
                None,
            ))
            .await;
            self.invalidate(id).await;
        }
        Ok(removed)
    }

    // ========================================================================
    // OBSERVABILITY
    // ========================================================================

    /// Cache statistics. Observability only, no correctness role.
    pub async fn cache_stats(&self) -> CacheStats {
        if !self.settings.enabled {
            return CacheStats::disconnected();
        }
        match self.cache.stats().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "cache stats unavailable");
                CacheStats::disconnected()
            }
        }
    }

    /// Component health: the store is required, the cache is optional.
    pub async fn health(&self) -> Vec<HealthCheck> {
        let store_check = if self.store.health().await {
            HealthCheck::healthy("store")
        } else {
            HealthCheck::unhealthy("store", "record store unreachable")
        };

        let cache_check = if !self.settings.enabled {
            HealthCheck::degraded("cache", "cache disabled by configuration")
        } else if self.cache.ping().await {
            HealthCheck::healthy("cache")
        } else {
            HealthCheck::degraded("cache", "cache backend unreachable")
        };

        vec![store_check, cache_check]
    }

    // ========================================================================
    // CACHE POLICY HELPERS
    // ========================================================================

    /// Whether the cache should be used for this call.
    ///
    /// Evaluated per call, never memoized, so recovery is automatic once the
    /// backend returns.
    async fn cache_ready(&self) -> bool {
        self.settings.enabled && self.cache.ping().await
    }

    /// Read and decode a cached value. Any failure is a miss.
    async fn cache_fetch<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key = %key, error = %e, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Encode and write a value to the cache. Failures are logged, never
    /// surfaced.
    async fn cache_store<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "cache value failed to serialize");
                return;
            }
        };
        if let Err(e) = self.cache.set(key, &bytes, ttl).await {
            warn!(key = %key, error = %e, "cache write failed");
        }
    }

    /// Delete the record's key and the whole list-query namespace.
    ///
    /// Called only after a successful store write. Skipped entirely when the
    /// cache is bypassed, where there is nothing valid to invalidate.
    async fn invalidate(&self, id: RecordId) {
        if !self.cache_ready().await {
            return;
        }
        let key = CacheKey::record(id);
        if let Err(e) = self.cache.delete(&key).await {
            warn!(key = %key, error = %e, "cache invalidation failed");
        }
        if let Err(e) = self.cache.delete_prefix(QUERY_PREFIX).await {
            warn!(prefix = QUERY_PREFIX, error = %e, "query cache invalidation failed");
        }
    }

    /// Append a history event best-effort. The audit trail is not a
    /// correctness dependency of the write that produced it.
    async fn record_history(&self, event: ChangeEvent) {
        if let Err(e) = self.store.append_history(&event).await {
            warn!(product_id = %event.product_id, error = %e, "failed to append history event");
        }
    }
}

impl<S, C> Clone for CachedRecordStore<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            settings: self.settings.clone(),
        }
    }
}

fn validate_positive_amount(quantity: i64) -> Result<(), ValidationError> {
    if quantity <= 0 {
        return Err(ValidationError::InvalidValue {
            field: "quantity".to_string(),
            reason: "must be positive".to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
