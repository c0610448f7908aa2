//! Storage Engine Module
//!
//! The caching, expiry and namespacing layers that sit between callers and
//! an [`Adapter`](crate::adapter::Adapter).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Storage                            │
//! │                                                             │
//! │   space mode                     flat / prefix mode         │
//! │  ┌──────────────┐              ┌──────────────┐             │
//! │  │ StorageSpace │              │ key transform│             │
//! │  │ (local Cache)│              └──────┬───────┘             │
//! │  └──────┬───────┘                     ▼                     │
//! │         │                      ┌──────────────┐  SeedHandle │
//! │         │                      │ SharedCache  │◄─────────── │
//! │         │                      └──────┬───────┘             │
//! └─────────┼─────────────────────────────┼─────────────────────┘
//!           ▼                             ▼
//!     one blob per space           one key per entry
//!                      Adapter
//! ```
//!
//! ## Modules
//!
//! - `record`: values with optional absolute expiry
//! - `cache`: in-memory map with lazy expiry
//! - `keys`: logical/physical key mapping and glob patterns
//! - `space`: whole-namespace blob persistence
//! - `seed`: background warm-up of the shared cache
//! - `sweeper`: optional active expiry for a cache, enabled on the global
//!   cache through [`StorageConfig::with_sweeper`]
//! - `facade`: the [`Storage`] facade
//!
//! ## Example
//!
//! ```
//! use kvspace::adapter::MemoryAdapter;
//! use kvspace::storage::{Cache, Storage, StorageConfig};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let adapter = Arc::new(MemoryAdapter::new());
//! let global = Cache::shared();
//!
//! let prefs = Storage::new(
//!     StorageConfig::new()
//!         .with_prefix("prefs")
//!         .with_shared_adapter(adapter.clone())
//!         .with_global_cache(Arc::clone(&global)),
//! )
//! .unwrap();
//!
//! prefs
//!     .set_item("lang", "en", None)
//!     .unwrap()
//!     .set_item("token", "abc", Some(Duration::from_secs(3600)))
//!     .unwrap();
//!
//! let user = Storage::new(StorageConfig::new().with_id("user").with_shared_adapter(adapter))
//!     .unwrap();
//! user.set_item("name", "John", None).unwrap();
//!
//! assert_eq!(prefs.get_item::<String>("lang").unwrap().as_deref(), Some("en"));
//! assert_eq!(user.get_item::<String>("name").unwrap().as_deref(), Some("John"));
//! ```

pub mod cache;
pub mod facade;
pub mod keys;
pub mod record;
pub mod seed;
pub mod space;
pub mod sweeper;

// Re-export commonly used types
pub use cache::{Cache, CacheStats, SharedCache};
pub use facade::{Storage, StorageConfig};
pub use keys::GlobPattern;
pub use record::Record;
pub use seed::SeedHandle;
pub use space::StorageSpace;
pub use sweeper::{CacheSweeper, SweeperConfig};
