//! Cache-aside storage for resolved links, metadata, tokens and short links.
//!
//! Every component receives a [`Cache`] handle wrapping a [`CacheStore`]
//! backend. Backends only deal in strings; the handle adds JSON encoding,
//! the key formats and per-namespace TTLs.
//!
//! Read failures are logged and reported as a miss, write failures are
//! logged and dropped. A broken cache costs a redundant fetch, never a
//! failed request.
//!
//! # Example
//!
//! ```
//! use songbridge_core::cache::{Cache, search_key};
//!
//! assert_eq!(search_key("https://api.deezer.com/search/track?q=x"),
//!            "search:https://api.deezer.com/search/track?q=x");
//! let _cache = Cache::in_memory();
//! ```

mod error;
mod memory;
mod sqlite;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

pub use error::CacheError;
pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

use crate::model::{AccessToken, ContentMetadata, ResultLink, ServiceKind};

/// Counter incremented once per completed search.
pub const SEARCH_COUNT_KEY: &str = "search-count";

/// Default TTL for resolved links and parsed metadata.
pub const DEFAULT_LINK_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default TTL for shortened universal links.
pub const DEFAULT_SHORT_LINK_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Key for a resolved link or cross-reference page, by effective request URL.
#[must_use]
pub fn search_key(url: &str) -> String {
    format!("search:{url}")
}

/// Key for parsed metadata of `id` on `service`.
#[must_use]
pub fn metadata_key(service: ServiceKind, id: &str) -> String {
    format!("metadata:{service}:{id}")
}

/// Key for the OAuth token of `service`.
#[must_use]
pub fn access_token_key(service: ServiceKind) -> String {
    format!("{service}:accessToken")
}

/// Key for the shortened form of `link`.
#[must_use]
pub fn short_link_key(link: &str) -> String {
    format!("url-shortener:{link}")
}

/// A string key/value store with optional per-entry expiry.
#[async_trait]
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// Returns the live value for `key`, or `None` on miss or expiry.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Upserts `value` under `key`. `None` means no expiry.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Increments an integer counter, creating it at 1. Counters never expire.
    async fn increment(&self, key: &str) -> Result<i64, CacheError>;

    /// Removes every entry.
    async fn clear(&self) -> Result<(), CacheError>;
}

/// TTLs per cache namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    pub links: Duration,
    pub metadata: Duration,
    pub short_links: Duration,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self {
            links: DEFAULT_LINK_TTL,
            metadata: DEFAULT_LINK_TTL,
            short_links: DEFAULT_SHORT_LINK_TTL,
        }
    }
}

/// Shared cache handle. Cheap to clone.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
    ttl: CacheTtl,
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("store", &self.store)
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl Cache {
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, ttl: CacheTtl) -> Self {
        Self { store, ttl }
    }

    /// A handle over a fresh [`MemoryCache`] with default TTLs.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCache::new()), CacheTtl::default())
    }

    #[must_use]
    pub fn ttl(&self) -> CacheTtl {
        self.ttl
    }

    /// Raw string read. Errors are logged and treated as a miss.
    pub async fn value(&self, key: &str) -> Option<String> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(error) => {
                warn!(key, error = %error, "cache read failed");
                None
            }
        }
    }

    /// Raw string write. Errors are logged and dropped.
    pub async fn put_value(&self, key: &str, value: &str, ttl: Option<Duration>) {
        if let Err(error) = self.store.set(key, value, ttl).await {
            warn!(key, error = %error, "cache write failed");
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.value(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(source) => {
                let error = CacheError::Serialization {
                    key: key.to_string(),
                    source,
                };
                warn!(error = %error, "ignoring undecodable cache entry");
                None
            }
        }
    }

    async fn put_json<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        match serde_json::to_string(value) {
            Ok(raw) => self.put_value(key, &raw, ttl).await,
            Err(source) => {
                let error = CacheError::Serialization {
                    key: key.to_string(),
                    source,
                };
                warn!(error = %error, "cache value not serializable");
            }
        }
    }

    /// Cached adapter result for the effective search `url`.
    pub async fn search_link(&self, url: &str) -> Option<ResultLink> {
        self.get_json(&search_key(url)).await
    }

    pub async fn put_search_link(&self, url: &str, link: &ResultLink) {
        self.put_json(&search_key(url), link, Some(self.ttl.links))
            .await;
    }

    /// Cached links scraped from a cross-reference page.
    pub async fn cross_links(&self, page_url: &str) -> Option<Vec<ResultLink>> {
        self.get_json(&search_key(page_url)).await
    }

    pub async fn put_cross_links(&self, page_url: &str, links: &[ResultLink]) {
        self.put_json(&search_key(page_url), links, Some(self.ttl.links))
            .await;
    }

    pub async fn metadata(&self, service: ServiceKind, id: &str) -> Option<ContentMetadata> {
        self.get_json(&metadata_key(service, id)).await
    }

    pub async fn put_metadata(&self, service: ServiceKind, id: &str, metadata: &ContentMetadata) {
        self.put_json(&metadata_key(service, id), metadata, Some(self.ttl.metadata))
            .await;
    }

    pub async fn access_token(&self, service: ServiceKind) -> Option<AccessToken> {
        self.get_json(&access_token_key(service)).await
    }

    /// Stores a token for its remaining `lifetime`.
    pub async fn put_access_token(&self, service: ServiceKind, token: &AccessToken, lifetime: Duration) {
        self.put_json(&access_token_key(service), token, Some(lifetime))
            .await;
    }

    pub async fn short_link(&self, link: &str) -> Option<String> {
        self.value(&short_link_key(link)).await
    }

    pub async fn put_short_link(&self, link: &str, short: &str) {
        self.put_value(&short_link_key(link), short, Some(self.ttl.short_links))
            .await;
    }

    /// Bumps the completed-search counter. Failures are logged.
    pub async fn increment_search_count(&self) -> Option<i64> {
        match self.store.increment(SEARCH_COUNT_KEY).await {
            Ok(count) => Some(count),
            Err(error) => {
                warn!(error = %error, "failed to increment search counter");
                None
            }
        }
    }

    /// Removes every entry from the backing store.
    ///
    /// # Errors
    ///
    /// Propagates the backend's [`CacheError`].
    pub async fn clear(&self) -> Result<(), CacheError> {
        self.store.clear().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::ContentType;

    #[derive(Debug)]
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            Err(CacheError::NotACounter { key: "x".into() })
        }
        async fn set(&self, _: &str, _: &str, _: Option<Duration>) -> Result<(), CacheError> {
            Err(CacheError::NotACounter { key: "x".into() })
        }
        async fn increment(&self, key: &str) -> Result<i64, CacheError> {
            Err(CacheError::NotACounter { key: key.into() })
        }
        async fn clear(&self) -> Result<(), CacheError> {
            Ok(())
        }
    }

    #[test]
    fn test_key_formats() {
        assert_eq!(search_key("https://a/b?q=1"), "search:https://a/b?q=1");
        assert_eq!(
            metadata_key(ServiceKind::AppleMusic, "123"),
            "metadata:appleMusic:123"
        );
        assert_eq!(
            access_token_key(ServiceKind::Spotify),
            "spotify:accessToken"
        );
        assert_eq!(
            short_link_key("https://app/?id=abc"),
            "url-shortener:https://app/?id=abc"
        );
    }

    #[tokio::test]
    async fn test_search_link_round_trip() {
        let cache = Cache::in_memory();
        let link = ResultLink::verified(ServiceKind::Deezer, "https://www.deezer.com/track/1");
        cache.put_search_link("https://api/search?q=a", &link).await;
        assert_eq!(cache.search_link("https://api/search?q=a").await, Some(link));
        assert_eq!(cache.search_link("https://api/search?q=b").await, None);
    }

    #[tokio::test]
    async fn test_metadata_is_keyed_by_service_and_id() {
        let cache = Cache::in_memory();
        let metadata = ContentMetadata {
            title: "Song".into(),
            description: "Artist".into(),
            content_type: ContentType::Song,
            image_url: "https://img".into(),
            audio_preview_url: None,
        };
        cache.put_metadata(ServiceKind::Spotify, "abc", &metadata).await;
        assert_eq!(cache.metadata(ServiceKind::Spotify, "abc").await, Some(metadata));
        assert_eq!(cache.metadata(ServiceKind::Deezer, "abc").await, None);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let cache = Cache::in_memory();
        cache.put_value(&search_key("u"), "not json", None).await;
        assert_eq!(cache.search_link("u").await, None);
    }

    #[tokio::test]
    async fn test_broken_store_degrades_to_miss() {
        let cache = Cache::new(Arc::new(BrokenStore), CacheTtl::default());
        assert_eq!(cache.value("k").await, None);
        cache.put_value("k", "v", None).await;
        assert_eq!(cache.increment_search_count().await, None);
    }

    #[tokio::test]
    async fn test_search_counter_increments() {
        let cache = Cache::in_memory();
        assert_eq!(cache.increment_search_count().await, Some(1));
        assert_eq!(cache.increment_search_count().await, Some(2));
        assert_eq!(cache.value(SEARCH_COUNT_KEY).await.as_deref(), Some("2"));
    }
}
