//! Record store trait and in-memory implementation.
//!
//! The trait is the seam between the repository and the durable store. The
//! PostgreSQL adapter lives in `stockpile-pg`; the in-memory store here backs
//! tests and cache-less local development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use stockpile_core::{
    ChangeEvent, InventoryRecord, RecordId, RecordPatch, RecordQuery, SortDirection, SortField,
    StoreError,
};

/// Storage trait for inventory records and their change history.
///
/// `find_by_id`/`update`/`update_quantity` report an absent record as
/// `Ok(None)`; mapping that to a not-found error is the caller's concern.
/// Transient backend failures surface as `StoreError::Unavailable` and are
/// never silently degraded, since the store is the source of truth.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a new record. Fails with `DuplicateKey` when `product_id`
    /// collides with an existing record.
    async fn insert(&self, record: &InventoryRecord) -> Result<InventoryRecord, StoreError>;

    /// Get a record by ID.
    async fn find_by_id(&self, id: RecordId) -> Result<Option<InventoryRecord>, StoreError>;

    /// Filtered, sorted, paginated listing plus the total match count.
    async fn find(&self, query: &RecordQuery) -> Result<(Vec<InventoryRecord>, u64), StoreError>;

    /// Apply a field patch and return the updated record.
    async fn update(
        &self,
        id: RecordId,
        patch: &RecordPatch,
    ) -> Result<Option<InventoryRecord>, StoreError>;

    /// Set the on-hand quantity and return the updated record.
    async fn update_quantity(
        &self,
        id: RecordId,
        new_quantity: i64,
    ) -> Result<Option<InventoryRecord>, StoreError>;

    /// Delete a record. Returns whether a record was removed.
    async fn delete(&self, id: RecordId) -> Result<bool, StoreError>;

    /// Append one event to the change history.
    async fn append_history(&self, event: &ChangeEvent) -> Result<(), StoreError>;

    /// Page through a product's history, newest first, plus the total count.
    async fn list_history(
        &self,
        product_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<ChangeEvent>, u64), StoreError>;

    /// Liveness probe against the backend.
    async fn health(&self) -> bool;
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// In-memory record store for tests and local development.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<HashMap<RecordId, InventoryRecord>>>,
    history: Arc<RwLock<Vec<ChangeEvent>>>,
}

impl MemoryRecordStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Number of stored history events.
    pub fn history_count(&self) -> usize {
        self.history.read().unwrap().len()
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        self.records.write().unwrap().clear();
        self.history.write().unwrap().clear();
    }

    fn matches(record: &InventoryRecord, query: &RecordQuery) -> bool {
        if let Some(category) = &query.filter.category {
            if &record.category != category {
                return false;
            }
        }
        if let Some(needle) = &query.filter.name_contains {
            if !record
                .name
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        if query.filter.low_stock_only && !record.low_stock_alert() {
            return false;
        }
        true
    }

    fn sort(records: &mut [InventoryRecord], field: SortField, direction: SortDirection) {
        records.sort_by(|a, b| {
            let ordering = match field {
                SortField::Name => a.name.cmp(&b.name),
                SortField::Category => a.category.cmp(&b.category),
                SortField::Quantity => a.quantity.cmp(&b.quantity),
                SortField::Price => a
                    .price
                    .partial_cmp(&b.price)
                    .unwrap_or(std::cmp::Ordering::Equal),
                SortField::CreatedAt => a.created_at.cmp(&b.created_at),
                SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            };
            match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        });
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: &InventoryRecord) -> Result<InventoryRecord, StoreError> {
        let mut records = self.records.write().unwrap();
        if records
            .values()
            .any(|existing| existing.product_id == record.product_id)
        {
            return Err(StoreError::DuplicateKey {
                product_id: record.product_id.clone(),
            });
        }
        records.insert(record.record_id, record.clone());
        Ok(record.clone())
    }

    async fn find_by_id(&self, id: RecordId) -> Result<Option<InventoryRecord>, StoreError> {
        let records = self.records.read().unwrap();
        Ok(records.get(&id).cloned())
    }

    async fn find(&self, query: &RecordQuery) -> Result<(Vec<InventoryRecord>, u64), StoreError> {
        let records = self.records.read().unwrap();
        let mut matched: Vec<InventoryRecord> = records
            .values()
            .filter(|r| Self::matches(r, query))
            .cloned()
            .collect();
        let total = matched.len() as u64;

        Self::sort(&mut matched, query.sort_field, query.sort_direction);

        let page: Vec<InventoryRecord> = matched
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.page_size as usize)
            .collect();
        Ok((page, total))
    }

    async fn update(
        &self,
        id: RecordId,
        patch: &RecordPatch,
    ) -> Result<Option<InventoryRecord>, StoreError> {
        let mut records = self.records.write().unwrap();
        let Some(record) = records.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = &patch.name {
            record.name = name.clone();
        }
        if let Some(description) = &patch.description {
            record.description = description.clone();
        }
        if let Some(category) = &patch.category {
            record.category = category.clone();
        }
        if let Some(supplier) = &patch.supplier {
            record.supplier = supplier.clone();
        }
        if let Some(sku) = &patch.sku {
            record.sku = sku.clone();
        }
        if let Some(price) = patch.price {
            record.price = price;
        }
        if let Some(min_stock) = patch.min_stock {
            record.min_stock = min_stock;
        }
        if let Some(max_stock) = patch.max_stock {
            record.max_stock = max_stock;
        }
        record.touch();

        Ok(Some(record.clone()))
    }

    async fn update_quantity(
        &self,
        id: RecordId,
        new_quantity: i64,
    ) -> Result<Option<InventoryRecord>, StoreError> {
        let mut records = self.records.write().unwrap();
        let Some(record) = records.get_mut(&id) else {
            return Ok(None);
        };
        record.quantity = new_quantity;
        record.touch();
        Ok(Some(record.clone()))
    }

    async fn delete(&self, id: RecordId) -> Result<bool, StoreError> {
        let mut records = self.records.write().unwrap();
        Ok(records.remove(&id).is_some())
    }

    async fn append_history(&self, event: &ChangeEvent) -> Result<(), StoreError> {
        let mut history = self.history.write().unwrap();
        history.push(event.clone());
        Ok(())
    }

    async fn list_history(
        &self,
        product_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<ChangeEvent>, u64), StoreError> {
        let history = self.history.read().unwrap();
        let mut matched: Vec<ChangeEvent> = history
            .iter()
            .filter(|e| e.product_id == product_id)
            .cloned()
            .collect();
        let total = matched.len() as u64;

        // Newest first for audit replay.
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let offset = (page.max(1) as usize - 1) * page_size as usize;
        let page_items: Vec<ChangeEvent> = matched
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .collect();
        Ok((page_items, total))
    }

    async fn health(&self) -> bool {
        true
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use stockpile_core::{ChangeAction, NewRecord, RecordFilter};

    fn make_record(name: &str, category: &str, quantity: i64) -> InventoryRecord {
        NewRecord {
            name: name.to_string(),
            quantity,
            price: 2.5,
            category: Some(category.to_string()),
            ..Default::default()
        }
        .into_record()
    }

    #[tokio::test]
    async fn test_insert_find_roundtrip() {
        let store = MemoryRecordStore::new();
        let record = make_record("Widget", "tools", 5);

        store.insert(&record).await.unwrap();
        let found = store.find_by_id(record.record_id).await.unwrap();
        assert_eq!(found, Some(record));
    }

    #[tokio::test]
    async fn test_insert_duplicate_product_id() {
        let store = MemoryRecordStore::new();
        let mut first = make_record("Widget", "tools", 5);
        first.product_id = "shared".to_string();
        let mut second = make_record("Gadget", "tools", 3);
        second.product_id = "shared".to_string();

        store.insert(&first).await.unwrap();
        let err = store.insert(&second).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::DuplicateKey {
                product_id: "shared".to_string()
            }
        );
        assert_eq!(store.record_count(), 1);
    }

    #[tokio::test]
    async fn test_find_filters_by_category() {
        let store = MemoryRecordStore::new();
        store.insert(&make_record("Hammer", "tools", 5)).await.unwrap();
        store.insert(&make_record("Screw", "fasteners", 5)).await.unwrap();
        store.insert(&make_record("Wrench", "tools", 5)).await.unwrap();

        let query = RecordQuery::page(1, 20).with_filter(RecordFilter::by_category("tools"));
        let (records, total) = store.find(&query).await.unwrap();
        assert_eq!(total, 2);
        assert!(records.iter().all(|r| r.category == "tools"));
    }

    #[tokio::test]
    async fn test_find_name_contains_is_case_insensitive() {
        let store = MemoryRecordStore::new();
        store.insert(&make_record("Ball Bearing", "parts", 5)).await.unwrap();
        store.insert(&make_record("Gasket", "parts", 5)).await.unwrap();

        let query = RecordQuery::page(1, 20).with_filter(RecordFilter {
            name_contains: Some("bearing".to_string()),
            ..Default::default()
        });
        let (records, total) = store.find(&query).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(records[0].name, "Ball Bearing");
    }

    #[tokio::test]
    async fn test_find_low_stock_only() {
        let store = MemoryRecordStore::new();
        let mut low = make_record("Low", "parts", 5);
        low.min_stock = 10;
        let mut ok = make_record("Ok", "parts", 50);
        ok.min_stock = 10;
        store.insert(&low).await.unwrap();
        store.insert(&ok).await.unwrap();

        let query = RecordQuery::page(1, 20).with_filter(RecordFilter {
            low_stock_only: true,
            ..Default::default()
        });
        let (records, total) = store.find(&query).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(records[0].name, "Low");
    }

    #[tokio::test]
    async fn test_find_sorts_and_paginates() {
        let store = MemoryRecordStore::new();
        for (name, quantity) in [("a", 3), ("b", 1), ("c", 2)] {
            store.insert(&make_record(name, "parts", quantity)).await.unwrap();
        }

        let query = RecordQuery::page(1, 2).with_sort(SortField::Quantity, SortDirection::Ascending);
        let (records, total) = store.find(&query).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].quantity, 1);
        assert_eq!(records[1].quantity, 2);

        let page2 = RecordQuery { page: 2, ..query };
        let (records, _) = store.find(&page2).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_update_applies_patch_and_touches() {
        let store = MemoryRecordStore::new();
        let record = make_record("Widget", "tools", 5);
        store.insert(&record).await.unwrap();

        let patch = RecordPatch {
            price: Some(9.99),
            supplier: Some("Acme".to_string()),
            ..Default::default()
        };
        let updated = store.update(record.record_id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.price, 9.99);
        assert_eq!(updated.supplier, "Acme");
        assert!(updated.updated_at >= record.updated_at);
        // Untouched fields survive.
        assert_eq!(updated.name, "Widget");
        assert_eq!(updated.quantity, 5);
    }

    #[tokio::test]
    async fn test_update_missing_returns_none() {
        let store = MemoryRecordStore::new();
        let result = store
            .update(stockpile_core::new_record_id(), &RecordPatch::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_update_quantity() {
        let store = MemoryRecordStore::new();
        let record = make_record("Widget", "tools", 5);
        store.insert(&record).await.unwrap();

        let updated = store
            .update_quantity(record.record_id, 42)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.quantity, 42);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryRecordStore::new();
        let record = make_record("Widget", "tools", 5);
        store.insert(&record).await.unwrap();

        assert!(store.delete(record.record_id).await.unwrap());
        assert!(!store.delete(record.record_id).await.unwrap());
        assert_eq!(store.record_count(), 0);
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let store = MemoryRecordStore::new();
        let first = ChangeEvent::new("p-1", ChangeAction::Create, 0, 10, "system", None);
        let second = ChangeEvent::new("p-1", ChangeAction::Adjust, 10, 7, "system", None);
        let other = ChangeEvent::new("p-2", ChangeAction::Create, 0, 3, "system", None);

        store.append_history(&first).await.unwrap();
        store.append_history(&second).await.unwrap();
        store.append_history(&other).await.unwrap();

        let (events, total) = store.list_history("p-1", 1, 10).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(events[0].event_id, second.event_id);
        assert_eq!(events[1].event_id, first.event_id);
    }

    #[tokio::test]
    async fn test_history_pagination() {
        let store = MemoryRecordStore::new();
        for i in 0..5 {
            let event = ChangeEvent::new("p-1", ChangeAction::Adjust, i, i + 1, "system", None);
            store.append_history(&event).await.unwrap();
        }

        let (page1, total) = store.list_history("p-1", 1, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page1.len(), 2);
        let (page3, _) = store.list_history("p-1", 3, 2).await.unwrap();
        assert_eq!(page3.len(), 1);
    }
}
