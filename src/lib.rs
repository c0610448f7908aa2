//! # kvspace - Layered Key-Value Storage
//!
//! kvspace wraps a plain, synchronous key-value provider (an [`Adapter`]) with
//! the things such providers usually lack:
//!
//! - **Read-through caching**: a process-wide cache, shared between facades,
//!   avoids repeated calls into a slow provider
//! - **TTL Support**: any entry can carry an absolute expiry
//! - **Namespaces**: keys can be scoped by a prefix, or isolated in a storage
//!   space persisted as a single JSON blob
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         Storage facade                        │
//! │   get_item / set_item / remove_item / clear / keys / cache    │
//! └───────────────┬───────────────────────────────┬───────────────┘
//!                 │ space mode                    │ flat / prefix mode
//!                 ▼                               ▼
//!        ┌─────────────────┐             ┌─────────────────┐
//!        │  StorageSpace   │             │   SharedCache   │◄── SeedHandle
//!        │  (whole blob)   │             │ (read-through)  │    (background)
//!        └────────┬────────┘             └────────┬────────┘
//!                 └───────────────┬───────────────┘
//!                                 ▼
//!                       ┌─────────────────┐
//!                       │     Adapter     │  memory, JSON file, ...
//!                       └─────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use kvspace::{Cache, MemoryAdapter, Storage, StorageConfig};
//! use std::time::Duration;
//!
//! let storage = Storage::new(
//!     StorageConfig::new()
//!         .with_prefix("app")
//!         .with_adapter(MemoryAdapter::new())
//!         .with_global_cache(Cache::shared()),
//! )?;
//!
//! storage.set_item("greeting", "hello", None)?;
//! storage.set_item("session", &42, Some(Duration::from_secs(60)))?;
//!
//! assert_eq!(storage.get_item::<String>("greeting")?.as_deref(), Some("hello"));
//! assert_eq!(storage.get_item::<u32>("session")?, Some(42));
//! # Ok::<(), kvspace::StorageError>(())
//! ```
//!
//! ## Module Overview
//!
//! - [`adapter`]: the provider contract and bundled providers
//! - [`storage`]: cache, expiry records, key scoping, spaces and the facade
//! - [`error`]: error taxonomy
//!
//! ## Design Highlights
//!
//! ### Explicit Expiry Records
//!
//! A value with a TTL is stored as a tagged [`Record::Expiring`], never by
//! adding fields to the value itself, so no caller value can be mistaken for
//! a wrapped one.
//!
//! ### Injected Global Cache
//!
//! The shared cache is an explicit [`SharedCache`] handle passed through
//! [`StorageConfig::with_global_cache`], so its lifetime is the caller's and
//! tests can start from a clean one.
//!
//! ### Deferred Seeding
//!
//! The shared cache is warmed in a background task after construction. Until
//! it finishes, reads fall through to the adapter, which is always correct.

pub mod adapter;
pub mod error;
pub mod storage;

// Re-export commonly used types for convenience
pub use adapter::{Adapter, FileAdapter, MemoryAdapter};
pub use error::{AdapterError, Result, StorageError};
pub use storage::{
    Cache, CacheSweeper, Record, SeedHandle, SharedCache, Storage, StorageConfig, SweeperConfig,
};

/// Version of kvspace
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
