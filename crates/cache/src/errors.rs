//! Cache error types

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache capacity must be at least 1, got {capacity}")]
    InvalidCapacity { capacity: usize },

    /// A `get_or_set` producer failed; nothing was stored
    #[error("failed to produce value for cache key '{key}': {source}")]
    Factory {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl From<CacheError> for forcedash_core::Error {
    fn from(error: CacheError) -> Self {
        match error {
            CacheError::InvalidCapacity { .. } => {
                forcedash_core::Error::configuration(error.to_string())
            }
            // a producer that already failed with a client error keeps its variant
            CacheError::Factory { key, source } => match source.downcast::<forcedash_core::Error>() {
                Ok(inner) => *inner,
                Err(source) => forcedash_core::Error::factory(key, source),
            },
        }
    }
}
