//! Stockpile Core - Entity Types
//!
//! Pure data structures for the inventory record service. All other crates
//! depend on this. This crate contains ONLY data types and their derived
//! accessors - no storage or caching logic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Record identifier using UUIDv7 for timestamp-sortable IDs.
/// UUIDv7 embeds a Unix timestamp, making IDs naturally sortable by creation time.
pub type RecordId = Uuid;

/// Identifier for a change-history event.
pub type EventId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 RecordId (timestamp-sortable).
pub fn new_record_id() -> RecordId {
    Uuid::now_v7()
}

/// Generate a new UUIDv7 EventId.
pub fn new_event_id() -> EventId {
    Uuid::now_v7()
}

// ============================================================================
// ENUMS
// ============================================================================

/// Action recorded in the change history for one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    /// Record was created.
    Create,
    /// Quantity was adjusted (add/remove stock).
    Adjust,
    /// Descriptive or threshold fields were updated.
    Update,
    /// Record was deleted.
    Delete,
}

impl ChangeAction {
    /// Stable string form used by the durable store.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Create => "create",
            ChangeAction::Adjust => "adjust",
            ChangeAction::Update => "update",
            ChangeAction::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(ChangeAction::Create),
            "adjust" => Ok(ChangeAction::Adjust),
            "update" => Ok(ChangeAction::Update),
            "delete" => Ok(ChangeAction::Delete),
            other => Err(format!("unknown change action: {other}")),
        }
    }
}

/// Sortable fields for record listings.
///
/// Restricting sorting to this set is what makes list-query cache signatures
/// finite and keeps the store's ORDER BY clauses index-backed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Name,
    Category,
    Quantity,
    Price,
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    /// Stable column name used by the durable store and cache signatures.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Category => "category",
            SortField::Quantity => "quantity",
            SortField::Price => "price",
            SortField::CreatedAt => "created_at",
            SortField::UpdatedAt => "updated_at",
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(SortField::Name),
            "category" => Ok(SortField::Category),
            "quantity" => Ok(SortField::Quantity),
            "price" => Ok(SortField::Price),
            "created_at" => Ok(SortField::CreatedAt),
            "updated_at" => Ok(SortField::UpdatedAt),
            other => Err(format!("unsupported sort field: {other}")),
        }
    }
}

/// Sort direction for record listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl SortDirection {
    /// Stable short form used in cache signatures and SQL.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        }
    }
}

// ============================================================================
// ENTITIES
// ============================================================================

/// One inventory record with quantity, price, and threshold attributes.
///
/// `stock_value`, `low_stock_alert`, and `over_stock_alert` are derived and
/// never stored; they are exposed as accessors so every serialization path
/// computes them from the authoritative fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    pub record_id: RecordId,
    /// External product identifier, unique across the store.
    /// Defaults to the stringified record_id when not supplied at creation.
    pub product_id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub supplier: String,
    pub sku: String,
    /// On-hand quantity, never negative.
    pub quantity: i64,
    /// Unit price, never negative.
    pub price: f64,
    pub min_stock: i64,
    pub max_stock: i64,
    pub created_at: Timestamp,
    /// Monotonic non-decreasing; advanced on every mutation.
    pub updated_at: Timestamp,
}

impl InventoryRecord {
    /// Total value of the on-hand stock.
    pub fn stock_value(&self) -> f64 {
        self.quantity as f64 * self.price
    }

    /// True when the on-hand quantity is at or below the minimum threshold.
    pub fn low_stock_alert(&self) -> bool {
        self.quantity <= self.min_stock
    }

    /// True when the on-hand quantity is at or above the maximum threshold.
    pub fn over_stock_alert(&self) -> bool {
        self.quantity >= self.max_stock
    }

    /// Advance `updated_at` without ever moving it backwards.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.updated_at {
            self.updated_at = now;
        }
    }
}

/// Request payload for creating a record.
///
/// Optional fields take the same defaults the service has always applied:
/// `category` "general", `min_stock` 10, `max_stock` 1000, empty strings for
/// the remaining descriptive fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRecord {
    pub product_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub quantity: i64,
    pub price: f64,
    pub category: Option<String>,
    pub min_stock: Option<i64>,
    pub max_stock: Option<i64>,
    pub supplier: Option<String>,
    pub sku: Option<String>,
}

/// Default minimum-stock threshold.
pub const DEFAULT_MIN_STOCK: i64 = 10;
/// Default maximum-stock threshold.
pub const DEFAULT_MAX_STOCK: i64 = 1000;
/// Default category applied when none is supplied.
pub const DEFAULT_CATEGORY: &str = "general";

impl NewRecord {
    /// Materialize a full record, generating identity and timestamps.
    pub fn into_record(self) -> InventoryRecord {
        let record_id = new_record_id();
        let now = Utc::now();
        InventoryRecord {
            record_id,
            product_id: self.product_id.unwrap_or_else(|| record_id.to_string()),
            name: self.name,
            description: self.description.unwrap_or_default(),
            category: self
                .category
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            supplier: self.supplier.unwrap_or_default(),
            sku: self.sku.unwrap_or_default(),
            quantity: self.quantity,
            price: self.price,
            min_stock: self.min_stock.unwrap_or(DEFAULT_MIN_STOCK),
            max_stock: self.max_stock.unwrap_or(DEFAULT_MAX_STOCK),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Update payload for descriptive and threshold fields.
///
/// Quantity is deliberately absent: quantity changes go through the
/// adjustment path so they always produce a history event with a delta.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub supplier: Option<String>,
    pub sku: Option<String>,
    pub price: Option<f64>,
    pub min_stock: Option<i64>,
    pub max_stock: Option<i64>,
}

impl RecordPatch {
    /// True when the patch carries no changes.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.supplier.is_none()
            && self.sku.is_none()
            && self.price.is_none()
            && self.min_stock.is_none()
            && self.max_stock.is_none()
    }
}

/// Immutable audit entry for one mutation to a record.
///
/// Append-only: events are never mutated or deleted, and are listed
/// newest-first per `product_id` for audit replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub event_id: EventId,
    pub product_id: String,
    pub action: ChangeAction,
    pub quantity_delta: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub actor: String,
    pub notes: Option<String>,
    pub timestamp: Timestamp,
}

impl ChangeEvent {
    /// Build an event for a mutation, deriving the delta from before/after.
    pub fn new(
        product_id: impl Into<String>,
        action: ChangeAction,
        quantity_before: i64,
        quantity_after: i64,
        actor: impl Into<String>,
        notes: Option<String>,
    ) -> Self {
        Self {
            event_id: new_event_id(),
            product_id: product_id.into(),
            action,
            quantity_delta: quantity_after - quantity_before,
            quantity_before,
            quantity_after,
            actor: actor.into(),
            notes,
            timestamp: Utc::now(),
        }
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    /// Assemble a page from items and the query that produced it.
    pub fn new(items: Vec<T>, total_count: u64, page: u32, page_size: u32) -> Self {
        Self {
            items,
            total_count,
            page,
            page_size,
        }
    }

    /// Number of pages needed to cover `total_count` at this page size.
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(self.page_size as u64)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// FILTERS & QUERIES
// ============================================================================

/// Filter for record listings. All clauses are conjunctive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordFilter {
    /// Exact category match.
    pub category: Option<String>,
    /// Case-insensitive substring match on the record name.
    pub name_contains: Option<String>,
    /// Only records at or below their minimum-stock threshold.
    pub low_stock_only: bool,
}

impl RecordFilter {
    /// True when no clause is set.
    pub fn is_empty(&self) -> bool {
        self.category.is_none() && self.name_contains.is_none() && !self.low_stock_only
    }

    /// Filter by exact category.
    pub fn by_category(category: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            ..Default::default()
        }
    }
}

/// A fully-specified listing query: filter, sort, and pagination.
///
/// Serialization of this struct is canonical (stable field order), which is
/// what the cache layer hashes into a list-query signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordQuery {
    pub filter: RecordFilter,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
    pub page: u32,
    pub page_size: u32,
}

/// Default page size for listings.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// Upper bound on page size accepted by validation.
pub const MAX_PAGE_SIZE: u32 = 100;

impl Default for RecordQuery {
    fn default() -> Self {
        Self {
            filter: RecordFilter::default(),
            sort_field: SortField::default(),
            sort_direction: SortDirection::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl RecordQuery {
    /// Query for one page with the default sort.
    pub fn page(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            ..Default::default()
        }
    }

    /// Replace the filter.
    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Replace the sort.
    pub fn with_sort(mut self, field: SortField, direction: SortDirection) -> Self {
        self.sort_field = field;
        self.sort_direction = direction;
        self
    }

    /// Zero-based row offset for this page.
    pub fn offset(&self) -> u64 {
        (self.page.saturating_sub(1) as u64) * self.page_size as u64
    }
}

// ============================================================================
// ERRORS
// ============================================================================

/// Durable-store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Record not found: {id}")]
    NotFound { id: RecordId },

    #[error("Duplicate product_id: {product_id}")]
    DuplicateKey { product_id: String },

    #[error("Store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Query failed: {reason}")]
    Query { reason: String },
}

/// Input-shape validation errors, raised before a mutation reaches the store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Constraint violation on {constraint}: {reason}")]
    ConstraintViolation { constraint: String, reason: String },
}

/// Configuration errors raised while loading settings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Stockpile operations.
///
/// Cache failures are deliberately absent: the cache layer absorbs its own
/// errors and degrades to a miss, so they never reach this channel.
#[derive(Debug, Clone, Error)]
pub enum StockError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error(
        "Insufficient stock for {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: String,
        requested: i64,
        available: i64,
    },
}

impl StockError {
    /// True for the not-found store condition, which callers commonly branch on.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StockError::Store(StoreError::NotFound { .. }))
    }
}

/// Result type alias for Stockpile operations.
pub type StockResult<T> = Result<T, StockError>;

// ============================================================================
// HEALTH
// ============================================================================

/// Health status for a service or component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Component is fully operational
    Healthy,
    /// Component is operational but degraded
    Degraded,
    /// Component is not operational
    Unhealthy,
}

/// Detailed health check result for a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall health status
    pub status: HealthStatus,
    /// Component name
    pub component: String,
    /// Detailed status message
    pub message: Option<String>,
    /// Additional metadata
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl HealthCheck {
    /// Create a healthy check result.
    pub fn healthy(component: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            component: component.into(),
            message: None,
            metadata: None,
        }
    }

    /// Create a degraded check result.
    pub fn degraded(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Degraded,
            component: component.into(),
            message: Some(message.into()),
            metadata: None,
        }
    }

    /// Create an unhealthy check result.
    pub fn unhealthy(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            component: component.into(),
            message: Some(message.into()),
            metadata: None,
        }
    }

    /// Add metadata.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
