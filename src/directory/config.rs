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

//! Directory client configuration options

use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Environment variable holding the directory proxy base URL
pub const BASE_URL_ENV: &str = "CORPORATIVO_PROXY_URL";

/// Environment variable holding the request timeout in seconds
pub const TIMEOUT_ENV: &str = "DIRECTORY_TIMEOUT_SECS";

/// Base URL used when nothing is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:3001";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Base URL could not be parsed
    #[error("Invalid directory base URL '{url}': {source}")]
    InvalidBaseUrl {
        /// Offending URL text
        url: String,
        /// Parse failure
        #[source]
        source: url::ParseError,
    },

    /// Base URL is not http(s)
    #[error("Unsupported scheme '{0}' for directory base URL")]
    UnsupportedScheme(String),

    /// Timeout is not a positive integer
    #[error("Invalid value '{value}' for {variable}")]
    InvalidTimeout {
        /// Environment variable name
        variable: &'static str,
        /// Raw value
        value: String,
    },
}

/// Configuration for the transport-level response cache
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Maximum number of cached responses
    pub max_entries: usize,

    /// Optional TTL for cache entries
    pub ttl: Option<Duration>,

    /// Whether responses are cached at all
    pub enabled: bool,
}

impl CacheConfig {
    /// Create a new cache configuration with custom settings
    pub fn new(max_entries: usize, ttl: Option<Duration>) -> Self {
        Self {
            max_entries,
            ttl,
            enabled: max_entries > 0,
        }
    }

    /// Create a configuration with caching disabled
    pub fn disabled() -> Self {
        Self {
            max_entries: 0,
            ttl: None,
            enabled: false,
        }
    }

    /// Create a configuration for testing
    pub fn testing() -> Self {
        Self {
            max_entries: 16,
            ttl: Some(Duration::from_millis(100)), // Very short TTL for tests
            enabled: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            ttl: Some(Duration::from_secs(300)), // directory data changes rarely
            enabled: true,
        }
    }
}

/// Configuration for [`HttpDirectoryClient`](super::http::HttpDirectoryClient)
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryConfig {
    /// Proxy base URL
    pub base_url: Url,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Response cache settings
    pub cache: CacheConfig,
}

impl DirectoryConfig {
    /// Create a configuration for the given base URL with default timeout and cache
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            ..Self::default()
        })
    }

    /// Load configuration from `CORPORATIVO_PROXY_URL` and `DIRECTORY_TIMEOUT_SECS`,
    /// falling back to defaults for unset variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup(BASE_URL_ENV) {
            Some(url) => Self::new(&url)?,
            None => Self::default(),
        };

        if let Some(raw) = lookup(TIMEOUT_ENV) {
            let secs = raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidTimeout {
                    variable: TIMEOUT_ENV,
                    value: raw.clone(),
                })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the cache configuration
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            request_timeout: Duration::from_secs(10),
            cache: CacheConfig::default(),
        }
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        source,
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::UnsupportedScheme(url.scheme().to_string()));
    }
    // relative joins replace the last segment unless the path ends with '/'
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
