//! HTTP access for remote lookups
//!
//! Lookups go through the `Fetcher` trait so they can be cached and
//! replaced in tests. `CachedFetcher` keeps successful responses keyed
//! by URL, optionally persisted to a JSON file between runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CatalogError;

/// Accept header used for JSON APIs
pub const ACCEPT_JSON: &str = "application/json";

/// Default lifetime of cached responses
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A response from a remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Trait for issuing GET requests to lookup services
pub trait Fetcher {
    /// Fetch a URL
    ///
    /// Transport failures are errors; any HTTP status is a response.
    fn get(&self, url: &str, accept: &str) -> Result<FetchResponse, CatalogError>;
}

/// Fetcher backed by a blocking HTTP client
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, CatalogError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CatalogError::LookupFailure {
                url: String::new(),
                reason: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn get(&self, url: &str, accept: &str) -> Result<FetchResponse, CatalogError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, accept)
            .send()
            .map_err(|e| CatalogError::LookupFailure {
                url: url.to_string(),
                reason: format!("HTTP request failed: {}", e),
            })?;

        let status = response.status().as_u16();
        let body = response.text().map_err(|e| CatalogError::LookupFailure {
            url: url.to_string(),
            reason: format!("Failed to read response: {}", e),
        })?;

        Ok(FetchResponse { status, body })
    }
}

/// A fetcher that never reaches anything (for offline runs)
pub struct NoOpFetcher;

impl Fetcher for NoOpFetcher {
    fn get(&self, url: &str, _accept: &str) -> Result<FetchResponse, CatalogError> {
        Err(CatalogError::LookupFailure {
            url: url.to_string(),
            reason: "NoOpFetcher does not issue requests".to_string(),
        })
    }
}

/// Configuration of the response cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// File the cache is persisted to; in-memory only when `None`
    pub path: Option<PathBuf>,
    /// How long a cached response stays valid
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: None,
            ttl: DEFAULT_CACHE_TTL,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    /// Unix time (seconds) the response was stored
    stored_at: u64,
    response: FetchResponse,
}

/// Successful responses keyed by URL, with expiry
#[derive(Debug, Default)]
pub struct ResponseCache {
    ttl: Duration,
    entries: HashMap<String, CacheEntry>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Load a persisted cache, dropping expired entries
    ///
    /// A missing file gives an empty cache; an unreadable one is logged
    /// and ignored.
    pub fn open(path: &Path, ttl: Duration) -> Self {
        let mut cache = Self::new(ttl);
        if !path.exists() {
            return cache;
        }

        let loaded = std::fs::read_to_string(path)
            .map_err(CatalogError::from)
            .and_then(|content| {
                serde_json::from_str::<HashMap<String, CacheEntry>>(&content)
                    .map_err(CatalogError::from)
            });

        match loaded {
            Ok(entries) => {
                let now = unix_now();
                cache.entries = entries;
                cache.evict_expired(now);
                debug!(
                    "Loaded {} cached responses from {}",
                    cache.entries.len(),
                    path.display()
                );
            }
            Err(e) => warn!("Ignoring unreadable cache file {}: {}", path.display(), e),
        }
        cache
    }

    /// Write all live entries to a file
    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        let now = unix_now();
        let live: HashMap<&String, &CacheEntry> = self
            .entries
            .iter()
            .filter(|(_, entry)| !self.is_expired(entry, now))
            .collect();
        let content = serde_json::to_string(&live)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn get(&self, url: &str) -> Option<&FetchResponse> {
        self.get_at(url, unix_now())
    }

    pub fn insert(&mut self, url: &str, response: FetchResponse) {
        self.insert_at(url, response, unix_now());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get_at(&self, url: &str, now: u64) -> Option<&FetchResponse> {
        self.entries
            .get(url)
            .filter(|entry| !self.is_expired(entry, now))
            .map(|entry| &entry.response)
    }

    fn insert_at(&mut self, url: &str, response: FetchResponse, now: u64) {
        self.entries.insert(
            url.to_string(),
            CacheEntry {
                stored_at: now,
                response,
            },
        );
    }

    fn evict_expired(&mut self, now: u64) {
        let ttl = self.ttl.as_secs();
        self.entries
            .retain(|_, entry| now.saturating_sub(entry.stored_at) <= ttl);
    }

    fn is_expired(&self, entry: &CacheEntry, now: u64) -> bool {
        now.saturating_sub(entry.stored_at) > self.ttl.as_secs()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// A fetcher that answers repeated requests from a response cache
pub struct CachedFetcher<F> {
    inner: F,
    cache: Mutex<ResponseCache>,
    path: Option<PathBuf>,
}

impl<F: Fetcher> CachedFetcher<F> {
    /// Wrap a fetcher, loading the persisted cache if one is configured
    pub fn new(inner: F, config: &CacheConfig) -> Self {
        let cache = match &config.path {
            Some(path) => ResponseCache::open(path, config.ttl),
            None => ResponseCache::new(config.ttl),
        };
        Self {
            inner,
            cache: Mutex::new(cache),
            path: config.path.clone(),
        }
    }

    /// Persist the cache, if it has a file
    pub fn flush(&self) -> Result<(), CatalogError> {
        match &self.path {
            Some(path) => self.lock().save(path),
            None => Ok(()),
        }
    }

    /// Number of responses currently cached
    pub fn cached(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResponseCache> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<F: Fetcher> Fetcher for CachedFetcher<F> {
    fn get(&self, url: &str, accept: &str) -> Result<FetchResponse, CatalogError> {
        if let Some(hit) = self.lock().get(url) {
            debug!("Cache hit for {}", url);
            return Ok(hit.clone());
        }

        debug!("Cache miss for {}", url);
        let response = self.inner.get(url, accept)?;
        if response.is_success() {
            self.lock().insert(url, response.clone());
        }
        Ok(response)
    }
}

/// Test double serving canned responses
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::Cell;

    #[derive(Default)]
    pub struct StaticFetcher {
        responses: HashMap<String, FetchResponse>,
        calls: Cell<usize>,
    }

    impl StaticFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, url: &str, status: u16, body: &str) -> Self {
            self.responses.insert(
                url.to_string(),
                FetchResponse {
                    status,
                    body: body.to_string(),
                },
            );
            self
        }

        pub fn calls(&self) -> usize {
            self.calls.get()
        }
    }

    impl Fetcher for StaticFetcher {
        fn get(&self, url: &str, _accept: &str) -> Result<FetchResponse, CatalogError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.responses.get(url).cloned().unwrap_or(FetchResponse {
                status: 404,
                body: String::new(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StaticFetcher;
    use super::*;

    fn ok(body: &str) -> FetchResponse {
        FetchResponse {
            status: 200,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_cache_expiry() {
        let mut cache = ResponseCache::new(Duration::from_secs(60));
        cache.insert_at("http://a", ok("{}"), 1_000);

        assert!(cache.get_at("http://a", 1_030).is_some());
        assert!(cache.get_at("http://a", 1_060).is_some());
        assert!(cache.get_at("http://a", 1_061).is_none());

        cache.evict_expired(2_000);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cached_fetcher_avoids_repeat_calls() {
        let inner = StaticFetcher::new().with("http://a", 200, "{\"x\":1}");
        let fetcher = CachedFetcher::new(inner, &CacheConfig::default());

        let first = fetcher.get("http://a", ACCEPT_JSON).unwrap();
        let second = fetcher.get("http://a", ACCEPT_JSON).unwrap();
        assert_eq!(first, second);
        assert_eq!(fetcher.inner.calls(), 1);
        assert_eq!(fetcher.cached(), 1);
    }

    #[test]
    fn test_failures_not_cached() {
        let fetcher = CachedFetcher::new(StaticFetcher::new(), &CacheConfig::default());

        let response = fetcher.get("http://missing", ACCEPT_JSON).unwrap();
        assert_eq!(response.status, 404);
        fetcher.get("http://missing", ACCEPT_JSON).unwrap();
        assert_eq!(fetcher.inner.calls(), 2);
        assert_eq!(fetcher.cached(), 0);
    }

    #[test]
    fn test_cache_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            path: Some(dir.path().join("cache.json")),
            ttl: DEFAULT_CACHE_TTL,
        };

        let inner = StaticFetcher::new().with("http://a", 200, "{}");
        let fetcher = CachedFetcher::new(inner, &config);
        fetcher.get("http://a", ACCEPT_JSON).unwrap();
        fetcher.flush().unwrap();

        let reopened = CachedFetcher::new(StaticFetcher::new(), &config);
        let response = reopened.get("http://a", ACCEPT_JSON).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(reopened.inner.calls(), 0);
    }

    #[test]
    fn test_save_skips_expired() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = ResponseCache::new(Duration::from_secs(60));
        cache.insert_at("http://old", ok("{}"), 0);
        cache.insert("http://new", ok("{}"));
        cache.save(&path).unwrap();

        let saved: HashMap<String, CacheEntry> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.len(), 1);
        assert!(saved.contains_key("http://new"));
    }

    #[test]
    fn test_unreadable_cache_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json").unwrap();

        let cache = ResponseCache::open(&path, DEFAULT_CACHE_TTL);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_noop_fetcher() {
        let err = NoOpFetcher.get("http://a", ACCEPT_JSON).unwrap_err();
        assert!(err.is_recoverable());
    }
}
