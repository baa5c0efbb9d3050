//! Error types for cache stores.

use thiserror::Error;

/// Errors raised by a [`CacheStore`](super::CacheStore) backend.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to talk to the backing database.
    #[error("cache database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failed to run cache schema migrations.
    #[error("cache migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A cached value could not be (de)serialized.
    #[error("cache value for '{key}' is not valid JSON: {source}")]
    Serialization {
        /// The cache key involved.
        key: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A counter key holds a value that is not an integer.
    #[error("cache counter '{key}' holds a non-integer value")]
    NotACounter {
        /// The counter key.
        key: String,
    },
}
