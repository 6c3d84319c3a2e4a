//! PostgreSQL record store for Stockpile.
//!
//! Connection pooling via deadpool-postgres. The adapter owns the schema:
//! `connect` pings the database (a startup failure is fatal to the caller)
//! and creates the tables and indexes the query paths rely on. Runtime
//! pool or socket failures surface as `StoreError::Unavailable`; the store
//! is the source of truth and never degrades silently.

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, RecyclingMethod, Runtime};
use std::time::Duration;
use tokio_postgres::error::SqlState;
use tokio_postgres::row::Row;
use tokio_postgres::NoTls;
use tracing::info;

use stockpile_core::{
    ChangeEvent, InventoryRecord, RecordId, RecordPatch, RecordQuery, SortDirection, StoreError,
};
use stockpile_storage::RecordStore;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct PgConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
}

impl Default for PgConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "stockpile".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(5),
        }
    }
}

impl PgConfig {
    /// Create a new database configuration from environment variables.
    ///
    /// - `STOCKPILE_DB_HOST` (default: localhost)
    /// - `STOCKPILE_DB_PORT` (default: 5432)
    /// - `STOCKPILE_DB_NAME` (default: stockpile)
    /// - `STOCKPILE_DB_USER` (default: postgres)
    /// - `STOCKPILE_DB_PASSWORD` (default: empty)
    /// - `STOCKPILE_DB_POOL_SIZE` (default: 16)
    /// - `STOCKPILE_DB_TIMEOUT` seconds (default: 5)
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("STOCKPILE_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("STOCKPILE_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("STOCKPILE_DB_NAME")
                .unwrap_or_else(|_| "stockpile".to_string()),
            user: std::env::var("STOCKPILE_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("STOCKPILE_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("STOCKPILE_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("STOCKPILE_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5),
            ),
        }
    }

    /// Create a connection pool from this configuration.
    pub fn create_pool(&self) -> Result<Pool, StoreError> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());
        cfg.connect_timeout = Some(self.timeout);

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Unavailable {
                reason: format!("failed to create pool: {e}"),
            })
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Tables plus the indexes the query paths rely on: a unique index on
/// `product_id`, secondary indexes for the filter/sort columns, and the
/// compound `(product_id, timestamp DESC)` index for newest-first history.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS inventory_records (
    record_id   UUID PRIMARY KEY,
    product_id  TEXT NOT NULL,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    category    TEXT NOT NULL DEFAULT 'general',
    supplier    TEXT NOT NULL DEFAULT '',
    sku         TEXT NOT NULL DEFAULT '',
    quantity    BIGINT NOT NULL CHECK (quantity >= 0),
    price       DOUBLE PRECISION NOT NULL CHECK (price >= 0),
    min_stock   BIGINT NOT NULL DEFAULT 10,
    max_stock   BIGINT NOT NULL DEFAULT 1000,
    created_at  TIMESTAMPTZ NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS inventory_records_product_id_idx
    ON inventory_records (product_id);
CREATE INDEX IF NOT EXISTS inventory_records_category_idx
    ON inventory_records (category);
CREATE INDEX IF NOT EXISTS inventory_records_name_idx
    ON inventory_records (name);
CREATE INDEX IF NOT EXISTS inventory_records_quantity_idx
    ON inventory_records (quantity);
CREATE INDEX IF NOT EXISTS inventory_records_created_at_idx
    ON inventory_records (created_at DESC);

CREATE TABLE IF NOT EXISTS stock_history (
    event_id        UUID PRIMARY KEY,
    product_id      TEXT NOT NULL,
    action          TEXT NOT NULL,
    quantity_delta  BIGINT NOT NULL,
    quantity_before BIGINT NOT NULL,
    quantity_after  BIGINT NOT NULL,
    actor           TEXT NOT NULL,
    notes           TEXT,
    timestamp       TIMESTAMPTZ NOT NULL
);
CREATE INDEX IF NOT EXISTS stock_history_product_ts_idx
    ON stock_history (product_id, timestamp DESC);
";

const RECORD_COLUMNS: &str = "record_id, product_id, name, description, category, supplier, \
     sku, quantity, price, min_stock, max_stock, created_at, updated_at";

const EVENT_COLUMNS: &str = "event_id, product_id, action, quantity_delta, quantity_before, \
     quantity_after, actor, notes, timestamp";

/// Listing WHERE clause shared by the page and count queries. NULL parameters
/// disable their clause.
const FIND_WHERE: &str = "($1::text IS NULL OR category = $1) \
     AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%') \
     AND (NOT $3::bool OR quantity <= min_stock)";

// ============================================================================
// RECORD STORE
// ============================================================================

/// Record store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgRecordStore {
    pool: Pool,
}

impl PgRecordStore {
    /// Connect, verify liveness, and bootstrap the schema.
    ///
    /// An unreachable database is an error here: the service must not start
    /// without its source of truth.
    pub async fn connect(config: &PgConfig) -> Result<Self, StoreError> {
        let pool = config.create_pool()?;
        let store = Self { pool };

        let conn = store.get_conn().await?;
        conn.batch_execute(SCHEMA)
            .await
            .map_err(map_db_error)?;
        info!(host = %config.host, dbname = %config.dbname, "connected to postgres record store");

        Ok(store)
    }

    /// Wrap an existing pool. The schema is assumed to be in place.
    pub fn with_pool(pool: Pool) -> Self {
        Self { pool }
    }

    /// Get the current pool size for observability.
    pub fn pool_size(&self) -> usize {
        self.pool.status().size
    }

    async fn get_conn(&self) -> Result<deadpool_postgres::Object, StoreError> {
        self.pool.get().await.map_err(|e| StoreError::Unavailable {
            reason: e.to_string(),
        })
    }
}

/// Map a driver error: unique violations become `DuplicateKey`, errors
/// without a SQLSTATE are transport faults (`Unavailable`), the rest are
/// query failures.
fn map_db_error(e: tokio_postgres::Error) -> StoreError {
    if let Some(db_err) = e.as_db_error() {
        if db_err.code() == &SqlState::UNIQUE_VIOLATION {
            return StoreError::DuplicateKey {
                product_id: db_err.detail().unwrap_or_default().to_string(),
            };
        }
        return StoreError::Query {
            reason: db_err.to_string(),
        };
    }
    StoreError::Unavailable {
        reason: e.to_string(),
    }
}

fn row_to_record(row: &Row) -> InventoryRecord {
    InventoryRecord {
        record_id: row.get("record_id"),
        product_id: row.get("product_id"),
        name: row.get("name"),
        description: row.get("description"),
        category: row.get("category"),
        supplier: row.get("supplier"),
        sku: row.get("sku"),
        quantity: row.get("quantity"),
        price: row.get("price"),
        min_stock: row.get("min_stock"),
        max_stock: row.get("max_stock"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_event(row: &Row) -> Result<ChangeEvent, StoreError> {
    let action: String = row.get("action");
    let action = action.parse().map_err(|reason| StoreError::Query { reason })?;
    Ok(ChangeEvent {
        event_id: row.get("event_id"),
        product_id: row.get("product_id"),
        action,
        quantity_delta: row.get("quantity_delta"),
        quantity_before: row.get("quantity_before"),
        quantity_after: row.get("quantity_after"),
        actor: row.get("actor"),
        notes: row.get("notes"),
        timestamp: row.get("timestamp"),
    })
}

fn order_clause(query: &RecordQuery) -> String {
    let direction = match query.sort_direction {
        SortDirection::Ascending => "ASC",
        SortDirection::Descending => "DESC",
    };
    // Sort columns come from the SortField enum, never from caller strings.
    format!("ORDER BY {} {}", query.sort_field.as_str(), direction)
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert(&self, record: &InventoryRecord) -> Result<InventoryRecord, StoreError> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_one(
                format!(
                    "INSERT INTO inventory_records ({RECORD_COLUMNS}) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
                     RETURNING {RECORD_COLUMNS}"
                )
                .as_str(),
                &[
                    &record.record_id,
                    &record.product_id,
                    &record.name,
                    &record.description,
                    &record.category,
                    &record.supplier,
                    &record.sku,
                    &record.quantity,
                    &record.price,
                    &record.min_stock,
                    &record.max_stock,
                    &record.created_at,
                    &record.updated_at,
                ],
            )
            .await
            .map_err(|e| match map_db_error(e) {
                // The driver reports the violated key in the detail string;
                // the caller wants the product_id it tried to insert.
                StoreError::DuplicateKey { .. } => StoreError::DuplicateKey {
                    product_id: record.product_id.clone(),
                },
                other => other,
            })?;
        Ok(row_to_record(&row))
    }

    async fn find_by_id(&self, id: RecordId) -> Result<Option<InventoryRecord>, StoreError> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                format!("SELECT {RECORD_COLUMNS} FROM inventory_records WHERE record_id = $1")
                    .as_str(),
                &[&id],
            )
            .await
            .map_err(map_db_error)?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn find(&self, query: &RecordQuery) -> Result<(Vec<InventoryRecord>, u64), StoreError> {
        let conn = self.get_conn().await?;

        let category = query.filter.category.as_deref();
        let name_contains = query.filter.name_contains.as_deref();
        let low_stock_only = query.filter.low_stock_only;

        let total: i64 = conn
            .query_one(
                format!("SELECT COUNT(*) FROM inventory_records WHERE {FIND_WHERE}").as_str(),
                &[&category, &name_contains, &low_stock_only],
            )
            .await
            .map_err(map_db_error)?
            .get(0);

        let rows = conn
            .query(
                format!(
                    "SELECT {RECORD_COLUMNS} FROM inventory_records WHERE {FIND_WHERE} {} \
                     LIMIT $4 OFFSET $5",
                    order_clause(query)
                )
                .as_str(),
                &[
                    &category,
                    &name_contains,
                    &low_stock_only,
                    &(query.page_size as i64),
                    &(query.offset() as i64),
                ],
            )
            .await
            .map_err(map_db_error)?;

        Ok((rows.iter().map(row_to_record).collect(), total as u64))
    }

    async fn update(
        &self,
        id: RecordId,
        patch: &RecordPatch,
    ) -> Result<Option<InventoryRecord>, StoreError> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                format!(
                    "UPDATE inventory_records SET \
                         name = COALESCE($2, name), \
                         description = COALESCE($3, description), \
                         category = COALESCE($4, category), \
                         supplier = COALESCE($5, supplier), \
                         sku = COALESCE($6, sku), \
                         price = COALESCE($7, price), \
                         min_stock = COALESCE($8, min_stock), \
                         max_stock = COALESCE($9, max_stock), \
                         updated_at = GREATEST(now(), updated_at) \
                     WHERE record_id = $1 \
                     RETURNING {RECORD_COLUMNS}"
                )
                .as_str(),
                &[
                    &id,
                    &patch.name,
                    &patch.description,
                    &patch.category,
                    &patch.supplier,
                    &patch.sku,
                    &patch.price,
                    &patch.min_stock,
                    &patch.max_stock,
                ],
            )
            .await
            .map_err(map_db_error)?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn update_quantity(
        &self,
        id: RecordId,
        new_quantity: i64,
    ) -> Result<Option<InventoryRecord>, StoreError> {
        let conn = self.get_conn().await?;
        let row = conn
            .query_opt(
                format!(
                    "UPDATE inventory_records SET \
                         quantity = $2, \
                         updated_at = GREATEST(now(), updated_at) \
                     WHERE record_id = $1 \
                     RETURNING {RECORD_COLUMNS}"
                )
                .as_str(),
                &[&id, &new_quantity],
            )
            .await
            .map_err(map_db_error)?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn delete(&self, id: RecordId) -> Result<bool, StoreError> {
        let conn = self.get_conn().await?;
        let deleted = conn
            .execute("DELETE FROM inventory_records WHERE record_id = $1", &[&id])
            .await
            .map_err(map_db_error)?;
        Ok(deleted > 0)
    }

    async fn append_history(&self, event: &ChangeEvent) -> Result<(), StoreError> {
        let conn = self.get_conn().await?;
        conn.execute(
            format!(
                "INSERT INTO stock_history ({EVENT_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
            )
            .as_str(),
            &[
                &event.event_id,
                &event.product_id,
                &event.action.as_str(),
                &event.quantity_delta,
                &event.quantity_before,
                &event.quantity_after,
                &event.actor,
                &event.notes,
                &event.timestamp,
            ],
        )
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    async fn list_history(
        &self,
        product_id: &str,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<ChangeEvent>, u64), StoreError> {
        let conn = self.get_conn().await?;

        let total: i64 = conn
            .query_one(
                "SELECT COUNT(*) FROM stock_history WHERE product_id = $1",
                &[&product_id],
            )
            .await
            .map_err(map_db_error)?
            .get(0);

        let offset = (page.max(1) as i64 - 1) * page_size as i64;
        let rows = conn
            .query(
                format!(
                    "SELECT {EVENT_COLUMNS} FROM stock_history WHERE product_id = $1 \
                     ORDER BY timestamp DESC LIMIT $2 OFFSET $3"
                )
                .as_str(),
                &[&product_id, &(page_size as i64), &offset],
            )
            .await
            .map_err(map_db_error)?;

        let events = rows
            .iter()
            .map(row_to_event)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((events, total as u64))
    }

    async fn health(&self) -> bool {
        match self.get_conn().await {
            Ok(conn) => conn.simple_query("SELECT 1").await.is_ok(),
            Err(_) => false,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use stockpile_core::{RecordFilter, SortField};

    #[test]
    fn test_config_defaults() {
        let config = PgConfig::default();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.dbname, "stockpile");
        assert_eq!(config.max_size, 16);
    }

    #[test]
    fn test_order_clause_uses_enum_columns() {
        let query = RecordQuery::page(1, 20).with_sort(SortField::Price, SortDirection::Ascending);
        assert_eq!(order_clause(&query), "ORDER BY price ASC");

        let query = RecordQuery::default();
        assert_eq!(order_clause(&query), "ORDER BY created_at DESC");
    }

    #[test]
    fn test_schema_declares_required_indexes() {
        assert!(SCHEMA.contains("UNIQUE INDEX IF NOT EXISTS inventory_records_product_id_idx"));
        assert!(SCHEMA.contains("stock_history (product_id, timestamp DESC)"));
        for column in ["category", "name", "quantity", "created_at"] {
            assert!(
                SCHEMA.contains(&format!("inventory_records_{column}_idx")),
                "missing index on {column}"
            );
        }
    }

    #[test]
    fn test_find_where_disables_clauses_for_empty_filter() {
        // The same WHERE text serves both the page and the count query; the
        // filter is expressed purely through NULL-tolerant parameters.
        let filter = RecordFilter::default();
        assert!(filter.is_empty());
        assert!(FIND_WHERE.contains("$1::text IS NULL"));
        assert!(FIND_WHERE.contains("$2::text IS NULL"));
        assert!(FIND_WHERE.contains("NOT $3::bool"));
    }
}
