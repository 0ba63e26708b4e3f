//! Configuration loading with precedence handling

use crate::settings::ClientConfig;
use forcedash_core::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const ENV_BASE_URL: &str = "FORCEDASH_API_BASE_URL";
pub const ENV_API_TIMEOUT_MS: &str = "FORCEDASH_API_TIMEOUT_MS";
pub const ENV_LOADER_CONCURRENCY: &str = "FORCEDASH_LOADER_CONCURRENCY";
pub const ENV_LOADER_TIMEOUT_MS: &str = "FORCEDASH_LOADER_TIMEOUT_MS";
pub const ENV_CACHE_ENABLED: &str = "FORCEDASH_CACHE_ENABLED";

/// Where a configuration layer came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    ConfigFile(PathBuf),
    Environment,
    CommandLine,
}

/// Values given on the command line (highest precedence)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    pub concurrency: Option<usize>,
    pub loader_timeout_ms: Option<u64>,
    pub cache_enabled: Option<bool>,
}

impl CliOverrides {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Configuration loader that handles precedence
///
/// defaults → config file → `FORCEDASH_*` environment → CLI overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    /// Explicit config file; must exist when set
    path: Option<PathBuf>,
    overrides: CliOverrides,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read this file instead of the default location
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn overrides(mut self, overrides: CliOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Load and validate the configuration
    pub fn load(&self) -> Result<ClientConfig> {
        self.load_with_env(|name| std::env::var(name).ok())
    }

    /// Same as `load`, reading environment variables through `lookup`
    pub fn load_with_env<F>(&self, lookup: F) -> Result<ClientConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut sources = vec![ConfigSource::Default];

        let mut config = match self.config_file()? {
            Some(path) => {
                let config = Self::load_from_file(&path)?;
                sources.push(ConfigSource::ConfigFile(path));
                config
            }
            None => ClientConfig::default(),
        };

        if Self::apply_env(&mut config, &lookup) {
            sources.push(ConfigSource::Environment);
        }

        if !self.overrides.is_empty() {
            Self::apply_cli_args(&mut config, &self.overrides);
            sources.push(ConfigSource::CommandLine);
        }

        config.validate()?;
        debug!(?sources, base_url = %config.api.base_url, "configuration loaded");
        Ok(config)
    }

    /// The file to read, if any: the explicit path, or the default location when present
    fn config_file(&self) -> Result<Option<PathBuf>> {
        if let Some(path) = &self.path {
            if !path.exists() {
                return Err(Error::configuration(format!(
                    "config file '{}' does not exist",
                    path.display()
                )));
            }
            return Ok(Some(path.clone()));
        }
        Ok(Self::default_config_path().filter(|path| path.exists()))
    }

    /// `$XDG_CONFIG_HOME/forcedash/config.json`, falling back to the platform config dir
    pub fn default_config_path() -> Option<PathBuf> {
        let config_dir = match std::env::var("XDG_CONFIG_HOME") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::config_dir()?,
        };
        Some(config_dir.join("forcedash").join("config.json"))
    }

    /// Parse a JSON config file; missing fields keep their defaults
    pub fn load_from_file(path: &Path) -> Result<ClientConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!("failed to read config file '{}': {e}", path.display()))
        })?;
        let config = serde_json::from_str(&content).map_err(|e| {
            Error::configuration(format!("invalid config file '{}': {e}", path.display()))
        })?;
        Ok(config)
    }

    /// Apply `FORCEDASH_*` variables; returns whether any were set.
    ///
    /// Unparsable values are logged and ignored.
    fn apply_env<F>(config: &mut ClientConfig, lookup: &F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = false;

        if let Some(base_url) = lookup(ENV_BASE_URL) {
            config.api.base_url = base_url;
            applied = true;
        }
        if let Some(timeout) = parse_env(lookup, ENV_API_TIMEOUT_MS) {
            config.api.timeout_ms = timeout;
            applied = true;
        }
        if let Some(concurrency) = parse_env(lookup, ENV_LOADER_CONCURRENCY) {
            config.loader.concurrency = concurrency;
            applied = true;
        }
        if let Some(timeout) = parse_env(lookup, ENV_LOADER_TIMEOUT_MS) {
            config.loader.timeout_ms = timeout;
            applied = true;
        }
        if let Some(enabled) = lookup(ENV_CACHE_ENABLED) {
            config.cache.enabled = matches!(enabled.to_lowercase().as_str(), "1" | "true" | "yes");
            applied = true;
        }

        applied
    }

    fn apply_cli_args(config: &mut ClientConfig, overrides: &CliOverrides) {
        if let Some(base_url) = &overrides.base_url {
            config.api.base_url = base_url.clone();
        }
        if let Some(concurrency) = overrides.concurrency {
            config.loader.concurrency = concurrency;
        }
        if let Some(timeout) = overrides.loader_timeout_ms {
            config.loader.timeout_ms = timeout;
        }
        if let Some(enabled) = overrides.cache_enabled {
            config.cache.enabled = enabled;
        }
    }
}

fn parse_env<F, T>(lookup: &F, name: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}
