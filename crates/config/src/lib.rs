//! Configuration for the forcedash client
//!
//! [`ClientConfig`] is assembled by [`ConfigLoader`] from, in increasing
//! precedence: built-in defaults, a JSON config file, `FORCEDASH_*`
//! environment variables, and command line overrides.

pub mod loader;
pub mod settings;

pub use loader::{CliOverrides, ConfigLoader, ConfigSource};
pub use settings::{
    ApiSettings, CacheSettings, CacheTier, ClientConfig, LoaderSettings, PollingSettings,
};
