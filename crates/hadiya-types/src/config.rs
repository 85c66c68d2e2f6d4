//! Client configuration types.
//!
//! `ClientConfig` represents `config.toml` in the Hadiya config directory.
//! Every field has a default so an empty or missing file is valid.

use serde::{Deserialize, Serialize};

use crate::chat::DEFAULT_PAGE_LIMIT;

/// Top-level client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the REST API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Base URL of the realtime feed. Derived from `api_url` when unset.
    #[serde(default)]
    pub ws_url: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long a transient network notice stays visible.
    #[serde(default = "default_notice_ttl_ms")]
    pub notice_ttl_ms: u64,

    #[serde(default)]
    pub reconnect: ReconnectConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_notice_ttl_ms() -> u64 {
    4_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            ws_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            notice_ttl_ms: default_notice_ttl_ms(),
            reconnect: ReconnectConfig::default(),
            history: HistoryConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Exponential backoff parameters for the realtime feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    5
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_LIMIT
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

/// Bounds for the per-conversation thread cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

fn default_cache_capacity() -> usize {
    32
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_cache_capacity(),
        }
    }
}
