//! Repository-facing cache settings.

use std::time::Duration;

/// Cache policy knobs for the repository.
///
/// `query_ttl` bounds the staleness of aggregate listing pages and is always
/// clamped to `default_ttl`, since listings change more often than single
/// records.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Global enable/disable flag. When false the repository behaves as in
    /// the degraded bypass path permanently.
    pub enabled: bool,
    /// TTL for single-record entries.
    pub default_ttl: Duration,
    /// TTL for list-query entries.
    pub query_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: Duration::from_secs(3600),
            query_ttl: Duration::from_secs(300),
        }
    }
}

impl CacheSettings {
    /// Create settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load settings from environment variables.
    ///
    /// - `STOCKPILE_CACHE_ENABLED`: "true" or "false" (default: true)
    /// - `STOCKPILE_CACHE_TTL`: record TTL in seconds (default: 3600)
    /// - `STOCKPILE_CACHE_QUERY_TTL`: listing TTL in seconds (default: 300)
    pub fn from_env() -> Self {
        let enabled = std::env::var("STOCKPILE_CACHE_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        let default_ttl = std::env::var("STOCKPILE_CACHE_TTL")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(3600));

        let query_ttl = std::env::var("STOCKPILE_CACHE_QUERY_TTL")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(300));

        Self {
            enabled,
            default_ttl,
            query_ttl,
        }
    }

    /// Enable or disable the cache.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the record TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the listing TTL.
    pub fn with_query_ttl(mut self, ttl: Duration) -> Self {
        self.query_ttl = ttl;
        self
    }

    /// Effective TTL for listing entries, never longer than the record TTL.
    pub fn effective_query_ttl(&self) -> Duration {
        self.query_ttl.min(self.default_ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = CacheSettings::default();
        assert!(settings.enabled);
        assert_eq!(settings.default_ttl, Duration::from_secs(3600));
        assert_eq!(settings.query_ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_query_ttl_clamped_to_default() {
        let settings = CacheSettings::new()
            .with_default_ttl(Duration::from_secs(60))
            .with_query_ttl(Duration::from_secs(600));
        assert_eq!(settings.effective_query_ttl(), Duration::from_secs(60));
    }

    #[test]
    fn test_builder() {
        let settings = CacheSettings::new()
            .with_enabled(false)
            .with_default_ttl(Duration::from_secs(120))
            .with_query_ttl(Duration::from_secs(30));
        assert!(!settings.enabled);
        assert_eq!(settings.default_ttl, Duration::from_secs(120));
        assert_eq!(settings.effective_query_ttl(), Duration::from_secs(30));
    }
}
