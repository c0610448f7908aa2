//! Error Types
//!
//! Every failure in kvspace surfaces as a [`StorageError`]. Nothing is retried
//! or swallowed internally: adapter failures, bad configuration and corrupt
//! persisted data all propagate to whoever called the [`Storage`] facade.
//!
//! [`Storage`]: crate::storage::Storage

use thiserror::Error;

/// Failures raised by a storage [`Adapter`](crate::adapter::Adapter).
///
/// Adapters wrap whatever their provider reports (an I/O error, a quota
/// limit, ...) in one of these variants. The facade never inspects them.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The provider refused the write because it is full
    #[error("storage quota exceeded: {used} of {limit} bytes used")]
    QuotaExceeded { used: usize, limit: usize },

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other provider-specific failure
    #[error("{0}")]
    Provider(String),
}

/// Errors that can occur while using the storage facade.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The facade was constructed with incomplete configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An argument was rejected before any work started
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The underlying adapter failed
    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// A value could not be encoded or decoded as JSON
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted value exists but is not in the expected format
    #[error("corrupt value under key {key:?}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The background cache seeding task failed or was cancelled
    #[error("cache seeding failed: {0}")]
    Seeding(String),
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
