//! Storage Adapters
//!
//! An adapter is the synchronous, persistent key-value provider that the
//! [`Storage`](crate::storage::Storage) facade sits on top of. It owns the
//! persisted bytes and knows nothing about caching, TTLs or namespaces.
//!
//! ## Provided Adapters
//!
//! - [`MemoryAdapter`]: an in-process map, optionally with a byte quota
//! - [`FileAdapter`]: a single JSON file on disk, rewritten on every mutation
//!
//! ## Implementing an Adapter
//!
//! ```
//! use bytes::Bytes;
//! use kvspace::adapter::Adapter;
//! use kvspace::error::AdapterError;
//! use std::collections::HashMap;
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct MapAdapter(Mutex<HashMap<String, Bytes>>);
//!
//! impl Adapter for MapAdapter {
//!     fn name(&self) -> &str {
//!         "map"
//!     }
//!     fn set_item(&self, key: &str, value: Bytes) -> Result<(), AdapterError> {
//!         self.0.lock().unwrap().insert(key.to_string(), value);
//!         Ok(())
//!     }
//!     fn get_item(&self, key: &str) -> Result<Option<Bytes>, AdapterError> {
//!         Ok(self.0.lock().unwrap().get(key).cloned())
//!     }
//!     fn remove_item(&self, key: &str) -> Result<(), AdapterError> {
//!         self.0.lock().unwrap().remove(key);
//!         Ok(())
//!     }
//!     fn size(&self) -> Result<usize, AdapterError> {
//!         Ok(self.0.lock().unwrap().len())
//!     }
//!     fn keys(&self) -> Result<Vec<String>, AdapterError> {
//!         Ok(self.0.lock().unwrap().keys().cloned().collect())
//!     }
//! }
//! ```

pub mod file;
pub mod memory;

use crate::error::AdapterError;
use bytes::Bytes;

pub use file::FileAdapter;
pub use memory::MemoryAdapter;

/// A synchronous key-value storage provider.
///
/// Implementations must be safe to share between threads; the facade holds
/// them behind an `Arc` and the background seeding task reads from them.
pub trait Adapter: Send + Sync {
    /// A short name identifying the provider
    fn name(&self) -> &str;

    /// Stores `value` under `key`, replacing any previous value.
    fn set_item(&self, key: &str, value: Bytes) -> Result<(), AdapterError>;

    /// Loads the value stored under `key`.
    fn get_item(&self, key: &str) -> Result<Option<Bytes>, AdapterError>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), AdapterError>;

    /// Returns the provider's current footprint.
    fn size(&self) -> Result<usize, AdapterError>;

    /// Returns every key the provider currently holds.
    fn keys(&self) -> Result<Vec<String>, AdapterError>;
}
