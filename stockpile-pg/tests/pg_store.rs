//! Integration tests against a live PostgreSQL instance.
//!
//! Run with `cargo test -p stockpile-pg --features db-tests` and the
//! `STOCKPILE_DB_*` environment pointing at a scratch database.

#![cfg(feature = "db-tests")]

use stockpile_core::{ChangeAction, ChangeEvent, NewRecord, RecordFilter, RecordQuery, StoreError};
use stockpile_pg::{PgConfig, PgRecordStore};
use stockpile_storage::RecordStore;

async fn store() -> PgRecordStore {
    PgRecordStore::connect(&PgConfig::from_env())
        .await
        .expect("test database must be reachable")
}

fn unique_record(name: &str) -> stockpile_core::InventoryRecord {
    NewRecord {
        name: name.to_string(),
        quantity: 25,
        price: 3.5,
        category: Some("integration".to_string()),
        ..Default::default()
    }
    .into_record()
}

#[tokio::test]
async fn test_insert_find_delete_roundtrip() {
    let store = store().await;
    let record = unique_record("Integration widget");

    let stored = store.insert(&record).await.unwrap();
    assert_eq!(stored.record_id, record.record_id);
    assert_eq!(stored.product_id, record.product_id);
    assert_eq!(stored.quantity, record.quantity);

    // Timestamps are compared at microsecond precision, which is what
    // TIMESTAMPTZ preserves.
    let found = store.find_by_id(record.record_id).await.unwrap().unwrap();
    assert_eq!(found.record_id, record.record_id);
    assert_eq!(found.name, record.name);
    assert_eq!(
        found.created_at.timestamp_micros(),
        record.created_at.timestamp_micros()
    );

    assert!(store.delete(record.record_id).await.unwrap());
    assert_eq!(store.find_by_id(record.record_id).await.unwrap(), None);
}

#[tokio::test]
async fn test_duplicate_product_id_maps_to_duplicate_key() {
    let store = store().await;
    let first = unique_record("Duplicate a");
    let mut second = unique_record("Duplicate b");
    second.product_id = first.product_id.clone();

    store.insert(&first).await.unwrap();
    let err = store.insert(&second).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateKey { .. }));

    store.delete(first.record_id).await.unwrap();
}

#[tokio::test]
async fn test_find_filters_and_counts() {
    let store = store().await;
    let record = unique_record("Filterable widget");
    store.insert(&record).await.unwrap();

    let query = RecordQuery::page(1, 50).with_filter(RecordFilter {
        name_contains: Some("filterable".to_string()),
        ..Default::default()
    });
    let (records, total) = store.find(&query).await.unwrap();
    assert!(total >= 1);
    assert!(records.iter().any(|r| r.record_id == record.record_id));

    store.delete(record.record_id).await.unwrap();
}

#[tokio::test]
async fn test_history_roundtrip_newest_first() {
    let store = store().await;
    let record = unique_record("History widget");
    store.insert(&record).await.unwrap();

    let created = ChangeEvent::new(&record.product_id, ChangeAction::Create, 0, 25, "it", None);
    let adjusted = ChangeEvent::new(&record.product_id, ChangeAction::Adjust, 25, 20, "it", None);
    store.append_history(&created).await.unwrap();
    store.append_history(&adjusted).await.unwrap();

    let (events, total) = store.list_history(&record.product_id, 1, 10).await.unwrap();
    assert_eq!(total, 2);
    assert_eq!(events[0].action, ChangeAction::Adjust);
    assert_eq!(events[1].action, ChangeAction::Create);

    store.delete(record.record_id).await.unwrap();
}

#[tokio::test]
async fn test_health_probe() {
    let store = store().await;
    assert!(store.health().await);
}
