// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! HTTP client for the directory proxy
//!
//! The proxy wraps every payload in `{ "success": bool, "data": ..., "error": ... }`.
//! Successful payloads are kept in a small LRU for the configured TTL so
//! consecutive evaluation passes do not hit the proxy for the same
//! organization.

use super::config::DirectoryConfig;
use super::{DirectoryClient, DirectoryError, DirectoryResult, Organization, Tribunal};
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};

#[derive(Debug, Deserialize)]
struct Envelope {
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl Envelope {
    fn into_data(self) -> DirectoryResult<Option<Value>> {
        if !self.success {
            return Err(DirectoryError::Api(
                self.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(self.data.filter(|data| !data.is_null()))
    }
}

/// Basic cache statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
}

struct CacheEntry {
    data: Value,
    stored_at: Instant,
}

struct ResponseCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    ttl: Option<Duration>,
    stats: Mutex<CacheStats>,
}

impl ResponseCache {
    fn new(capacity: NonZeroUsize, ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
            stats: Mutex::new(CacheStats::default()),
        }
    }

    fn get(&self, path: &str) -> Option<Value> {
        let mut entries = self.entries.lock();
        let fresh = entries.get(path).and_then(|entry| {
            let expired = self.ttl.is_some_and(|ttl| entry.stored_at.elapsed() >= ttl);
            (!expired).then(|| entry.data.clone())
        });
        if fresh.is_none() {
            entries.pop(path);
        }

        let mut stats = self.stats.lock();
        match fresh {
            Some(_) => stats.hits += 1,
            None => stats.misses += 1,
        }
        fresh
    }

    fn insert(&self, path: String, data: Value) {
        self.entries.lock().put(
            path,
            CacheEntry {
                data,
                stored_at: Instant::now(),
            },
        );
    }
}

/// [`DirectoryClient`] backed by the directory proxy's REST API
pub struct HttpDirectoryClient {
    config: DirectoryConfig,
    client: reqwest::Client,
    cache: Option<ResponseCache>,
}

impl HttpDirectoryClient {
    /// Build a client from configuration
    pub fn new(config: DirectoryConfig) -> DirectoryResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        let cache = NonZeroUsize::new(config.cache.max_entries)
            .filter(|_| config.cache.enabled)
            .map(|capacity| ResponseCache::new(capacity, config.cache.ttl));

        Ok(Self {
            config,
            client,
            cache,
        })
    }

    /// Build a client from `CORPORATIVO_PROXY_URL` / `DIRECTORY_TIMEOUT_SECS`
    pub fn from_env() -> DirectoryResult<Self> {
        Self::new(DirectoryConfig::from_env()?)
    }

    /// Active configuration
    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Response cache statistics; `None` when caching is disabled
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| *cache.stats.lock())
    }

    async fn fetch<T: DeserializeOwned>(&self, path: &str) -> DirectoryResult<Option<T>> {
        if let Some(data) = self.cache.as_ref().and_then(|cache| cache.get(path)) {
            log::debug!("Directory cache hit for {path}");
            return Ok(Some(serde_json::from_value(data)?));
        }

        let url = self.config.base_url.join(path)?;
        log::debug!("Fetching {url}");
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        let Some(data) = response.json::<Envelope>().await?.into_data()? else {
            return Ok(None);
        };
        let entity = serde_json::from_value(data.clone())?;
        if let Some(cache) = &self.cache {
            cache.insert(path.to_string(), data);
        }
        Ok(Some(entity))
    }
}

impl std::fmt::Debug for HttpDirectoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDirectoryClient")
            .field("base_url", &self.config.base_url.as_str())
            .field("cache_enabled", &self.cache.is_some())
            .finish()
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn get_organization(&self, organization_id: i64) -> DirectoryResult<Option<Organization>> {
        self.fetch(&format!("api/orgaos/{organization_id}")).await
    }

    async fn get_tribunal_of_organization(
        &self,
        organization_id: i64,
    ) -> DirectoryResult<Option<Tribunal>> {
        self.fetch(&format!("api/orgaos/{organization_id}/tribunal"))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::CacheConfig;
    use serde_json::json;

    #[test]
    fn test_envelope() {
        let ok: Envelope = serde_json::from_value(json!({"success": true, "data": {"a": 1}})).unwrap();
        assert_eq!(ok.into_data().unwrap(), Some(json!({"a": 1})));

        let empty: Envelope = serde_json::from_value(json!({"success": true, "data": null})).unwrap();
        assert_eq!(empty.into_data().unwrap(), None);

        let failed: Envelope =
            serde_json::from_value(json!({"success": false, "error": "Órgão não encontrado"}))
                .unwrap();
        assert!(matches!(failed.into_data(), Err(DirectoryError::Api(msg)) if msg == "Órgão não encontrado"));
    }

    #[test]
    fn test_response_cache_hits_and_expiry() {
        let capacity = NonZeroUsize::new(2).unwrap();
        let cache = ResponseCache::new(capacity, None);
        cache.insert("api/orgaos/1".into(), json!({"seqOrgao": 1}));

        assert_eq!(cache.get("api/orgaos/1"), Some(json!({"seqOrgao": 1})));
        assert_eq!(cache.get("api/orgaos/2"), None);
        assert_eq!(*cache.stats.lock(), CacheStats { hits: 1, misses: 1 });

        let expiring = ResponseCache::new(capacity, Some(Duration::ZERO));
        expiring.insert("api/orgaos/1".into(), json!({}));
        assert_eq!(expiring.get("api/orgaos/1"), None);
        assert!(expiring.entries.lock().is_empty());
    }

    #[test]
    fn test_cache_disabled_by_config() {
        let config = DirectoryConfig::default().with_cache(CacheConfig::disabled());
        let client = HttpDirectoryClient::new(config).unwrap();
        assert!(client.cache_stats().is_none());

        let client = HttpDirectoryClient::new(DirectoryConfig::default()).unwrap();
        assert_eq!(client.cache_stats(), Some(CacheStats::default()));
    }

    #[tokio::test]
    async fn test_unreachable_proxy_is_an_error() {
        let config = DirectoryConfig::new("http://127.0.0.1:9")
            .unwrap()
            .with_timeout(Duration::from_millis(500));
        let client = HttpDirectoryClient::new(config).unwrap();
        assert!(matches!(
            client.get_organization(1).await,
            Err(DirectoryError::Http(_))
        ));
    }
}
