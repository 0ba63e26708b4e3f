//! Configuration structs
//!
//! Durations are stored as milliseconds so the JSON file stays plain numbers;
//! accessor methods hand out `Duration`s.

use forcedash_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete client configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiSettings,
    pub cache: CacheSettings,
    pub polling: PollingSettings,
    pub loader: LoaderSettings,
}

/// Backend connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    /// Default request timeout for status and results calls
    pub timeout_ms: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Size and lifetime of one cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheTier {
    pub capacity: usize,
    pub ttl_ms: u64,
}

impl CacheTier {
    pub const fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity,
            ttl_ms: ttl.as_millis() as u64,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// When false, chart loads always hit the network; fetched charts are
    /// still kept so their handles are released on eviction
    pub enabled: bool,
    pub charts: CacheTier,
    pub results: CacheTier,
    pub default: CacheTier,
    pub auto_cleanup: bool,
    pub cleanup_interval_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            charts: CacheTier::new(50, Duration::from_secs(10 * 60)),
            results: CacheTier::new(20, Duration::from_secs(30 * 60)),
            default: CacheTier::new(100, Duration::from_secs(5 * 60)),
            auto_cleanup: true,
            cleanup_interval_ms: 60_000,
        }
    }
}

impl CacheSettings {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

/// Task status polling cadence and retry bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    /// Delay between polls while the task reports `running`
    pub running_interval_ms: u64,
    /// Delay between polls for any other non-terminal status
    pub idle_interval_ms: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub retry_cap_ms: u64,
    /// Grace period between the completion notice and navigation
    pub redirect_delay_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            running_interval_ms: 2_000,
            idle_interval_ms: 5_000,
            max_retries: 3,
            retry_base_ms: 10_000,
            retry_cap_ms: 30_000,
            redirect_delay_ms: 3_000,
        }
    }
}

impl PollingSettings {
    pub fn running_interval(&self) -> Duration {
        Duration::from_millis(self.running_interval_ms)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }

    pub fn retry_cap(&self) -> Duration {
        Duration::from_millis(self.retry_cap_ms)
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }
}

/// Batch chart loading defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    pub concurrency: usize,
    /// Per-chart deadline
    pub timeout_ms: u64,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            concurrency: 3,
            timeout_ms: 30_000,
        }
    }
}

impl LoaderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ClientConfig {
    /// Reject settings the client cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(Error::configuration("api.base_url must not be empty"));
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://")
        {
            return Err(Error::configuration(format!(
                "api.base_url must be an http(s) URL, got '{}'",
                self.api.base_url
            )));
        }
        if self.api.timeout_ms == 0 {
            return Err(Error::configuration("api.timeout_ms must be positive"));
        }

        for (name, tier) in [
            ("charts", &self.cache.charts),
            ("results", &self.cache.results),
            ("default", &self.cache.default),
        ] {
            if tier.capacity == 0 {
                return Err(Error::configuration(format!(
                    "cache.{name}.capacity must be at least 1"
                )));
            }
            if tier.ttl_ms == 0 {
                return Err(Error::configuration(format!(
                    "cache.{name}.ttl_ms must be positive"
                )));
            }
        }
        if self.cache.auto_cleanup && self.cache.cleanup_interval_ms == 0 {
            return Err(Error::configuration(
                "cache.cleanup_interval_ms must be positive when auto_cleanup is on",
            ));
        }

        if self.loader.concurrency == 0 {
            return Err(Error::configuration("loader.concurrency must be at least 1"));
        }
        if self.loader.timeout_ms == 0 {
            return Err(Error::configuration("loader.timeout_ms must be positive"));
        }

        if self.polling.running_interval_ms == 0 || self.polling.idle_interval_ms == 0 {
            return Err(Error::configuration("polling intervals must be positive"));
        }
        if self.polling.retry_base_ms > self.polling.retry_cap_ms {
            return Err(Error::configuration(
                "polling.retry_base_ms must not exceed polling.retry_cap_ms",
            ));
        }
        Ok(())
    }
}
