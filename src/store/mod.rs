pub mod sqlite;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::app::Result;

pub use sqlite::SqliteCache;

/// A successful API response kept for offline use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub body: Vec<u8>,
    pub total: Option<u64>,
    pub total_pages: Option<u32>,
    pub fetched_at: DateTime<Utc>,
}

/// Offline copy of API responses, keyed by request URL.
///
/// Callers pass the URL without its cache-busting parameter so that a version
/// bump still finds earlier copies.
pub trait ResponseCache: Send + Sync {
    fn get(&self, url: &str) -> Result<Option<CachedResponse>>;
    fn put(&self, url: &str, response: &CachedResponse) -> Result<()>;
    fn clear(&self) -> Result<usize>;
}

/// Deterministic cache key for a request URL
pub fn cache_key(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_deterministic() {
        let a = cache_key("https://example.com/wp-json/wp/v2/posts?page=1");
        let b = cache_key("https://example.com/wp-json/wp/v2/posts?page=1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_cache_key_differs_by_page() {
        let a = cache_key("https://example.com/wp-json/wp/v2/posts?page=1");
        let b = cache_key("https://example.com/wp-json/wp/v2/posts?page=2");
        assert_ne!(a, b);
    }
}
