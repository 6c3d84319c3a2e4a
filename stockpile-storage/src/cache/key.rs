//! Cache key namespace.
//!
//! Keys are grouped into two namespaces: single-record keys (`record:{id}`)
//! and list-query keys (`records:query:{signature}`). The query namespace
//! shares a common prefix so every listing can be invalidated in one
//! delete-by-prefix call after any write.

use sha2::{Digest, Sha256};
use stockpile_core::{RecordId, RecordQuery};

/// Prefix for single-record cache entries.
pub const RECORD_PREFIX: &str = "record:";

/// Prefix for list-query cache entries; the bulk-invalidation target.
pub const QUERY_PREFIX: &str = "records:query:";

/// A fully-formed cache key.
///
/// Construction goes through the `record`/`query` constructors so keys cannot
/// land outside the two known namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a single record.
    pub fn record(id: RecordId) -> Self {
        Self(format!("{RECORD_PREFIX}{id}"))
    }

    /// Key for a list query, derived from the full normalized query signature.
    ///
    /// Distinct queries never collide (the canonical rendering is injective)
    /// and identical queries always produce the same key.
    pub fn query(query: &RecordQuery) -> Self {
        let digest = Sha256::digest(canonical_query_string(query).as_bytes());
        Self(format!("{QUERY_PREFIX}{}", hex::encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical, injective rendering of a query.
///
/// String fields are length-prefixed so no choice of filter values can make
/// two different queries render identically.
fn canonical_query_string(query: &RecordQuery) -> String {
    let mut buf = String::with_capacity(96);
    push_opt(&mut buf, "category", query.filter.category.as_deref());
    push_opt(&mut buf, "name", query.filter.name_contains.as_deref());
    buf.push_str("low_stock=");
    buf.push_str(if query.filter.low_stock_only { "1" } else { "0" });
    buf.push(';');
    buf.push_str("sort=");
    buf.push_str(query.sort_field.as_str());
    buf.push(':');
    buf.push_str(query.sort_direction.as_str());
    buf.push(';');
    buf.push_str(&format!("page={};size={};", query.page, query.page_size));
    buf
}

fn push_opt(buf: &mut String, tag: &str, value: Option<&str>) {
    buf.push_str(tag);
    buf.push('=');
    match value {
        Some(v) => {
            buf.push_str(&v.len().to_string());
            buf.push(':');
            buf.push_str(v);
        }
        None => buf.push('-'),
    }
    buf.push(';');
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockpile_core::{new_record_id, RecordFilter, SortDirection, SortField};

    #[test]
    fn test_record_key_format() {
        let id = new_record_id();
        let key = CacheKey::record(id);
        assert_eq!(key.as_str(), format!("record:{id}"));
    }

    #[test]
    fn test_query_key_is_deterministic() {
        let query = RecordQuery::page(1, 20).with_filter(RecordFilter::by_category("tools"));
        assert_eq!(CacheKey::query(&query), CacheKey::query(&query.clone()));
    }

    #[test]
    fn test_query_keys_isolated_by_page() {
        let page1 = RecordQuery::page(1, 20).with_filter(RecordFilter::by_category("tools"));
        let page2 = RecordQuery::page(2, 20).with_filter(RecordFilter::by_category("tools"));
        assert_ne!(CacheKey::query(&page1), CacheKey::query(&page2));
    }

    #[test]
    fn test_query_keys_isolated_by_sort() {
        let by_name = RecordQuery::page(1, 20).with_sort(SortField::Name, SortDirection::Ascending);
        let by_price =
            RecordQuery::page(1, 20).with_sort(SortField::Price, SortDirection::Ascending);
        assert_ne!(CacheKey::query(&by_name), CacheKey::query(&by_price));
    }

    #[test]
    fn test_query_keys_share_invalidation_prefix() {
        let query = RecordQuery::default();
        assert!(CacheKey::query(&query).as_str().starts_with(QUERY_PREFIX));
    }

    #[test]
    fn test_canonical_rendering_is_injective_for_tricky_values() {
        // A category value that embeds the rendering of another field must not
        // collide with the query that actually sets that field.
        let sneaky = RecordQuery::page(1, 20).with_filter(RecordFilter {
            category: Some("a;name=1:b".to_string()),
            name_contains: None,
            low_stock_only: false,
        });
        let honest = RecordQuery::page(1, 20).with_filter(RecordFilter {
            category: Some("a".to_string()),
            name_contains: Some("b".to_string()),
            low_stock_only: false,
        });
        assert_ne!(CacheKey::query(&sneaky), CacheKey::query(&honest));
    }
}
