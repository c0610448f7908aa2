//! Storage Facade
//!
//! [`Storage`] is the public surface of kvspace. It runs in one of three modes,
//! chosen once at construction:
//!
//! | Mode   | Configured with | Physical layout                          |
//! |--------|-----------------|------------------------------------------|
//! | Flat   | nothing         | one adapter key per logical key          |
//! | Prefix | `prefix`        | `"{prefix}-{key}"` per logical key       |
//! | Space  | `id`            | one blob under `"app*space-{id}"`        |
//!
//! When both `id` and `prefix` are given, space mode wins and the prefix is
//! ignored.
//!
//! ## Read Path (flat / prefix)
//!
//! ```text
//! get_item(key)
//!     │
//!     ▼
//! physical key ──> global cache ──hit──> value
//!                      │
//!                     miss
//!                      ▼
//!                   adapter ──expired──> remove from adapter, None
//!                      │
//!                     live
//!                      ▼
//!              fill global cache ──> value
//! ```
//!
//! ## TTL
//!
//! In flat and prefix mode the TTL travels with the persisted record, so a
//! cold read after a restart honors it exactly like a warm cache read does.
//! In space mode the TTL applies to the in-memory working set only; the
//! persisted blob holds plain values.

use crate::adapter::Adapter;
use crate::error::{Result, StorageError};
use crate::storage::cache::{Cache, SharedCache};
use crate::storage::keys::{is_space_key, strip_scope, to_physical, GlobPattern};
use crate::storage::record::{self, Record};
use crate::storage::seed::SeedHandle;
use crate::storage::space::StorageSpace;
use crate::storage::sweeper::{CacheSweeper, SweeperConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

/// Construction parameters for a [`Storage`] facade.
///
/// # Example
///
/// ```
/// use kvspace::adapter::MemoryAdapter;
/// use kvspace::storage::{Cache, Storage, StorageConfig};
///
/// let global = Cache::shared();
/// let config = StorageConfig::new()
///     .with_prefix("settings")
///     .with_adapter(MemoryAdapter::new())
///     .with_global_cache(global);
///
/// let storage = Storage::new(config).unwrap();
/// storage.set_item("theme", "dark", None).unwrap();
/// assert_eq!(storage.get_item::<String>("theme").unwrap().as_deref(), Some("dark"));
/// ```
#[derive(Clone, Default)]
pub struct StorageConfig {
    prefix: Option<String>,
    id: Option<String>,
    adapter: Option<Arc<dyn Adapter>>,
    global_cache: Option<SharedCache>,
    sweeper: Option<SweeperConfig>,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("prefix", &self.prefix)
            .field("id", &self.id)
            .field("adapter", &self.adapter.as_ref().map(|a| a.name().to_string()))
            .field("global_cache", &self.global_cache.is_some())
            .field("sweeper", &self.sweeper)
            .finish()
    }
}

impl StorageConfig {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scopes all keys under `"{prefix}-"`. Ignored in space mode.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Isolates all keys inside the storage space `id`.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the adapter.
    pub fn with_adapter(self, adapter: impl Adapter + 'static) -> Self {
        self.with_shared_adapter(Arc::new(adapter))
    }

    /// Sets an adapter that is shared with other facades.
    pub fn with_shared_adapter(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Sets the read-through cache shared between facades.
    ///
    /// Without one, the facade gets a private cache of its own.
    pub fn with_global_cache(mut self, cache: SharedCache) -> Self {
        self.global_cache = Some(cache);
        self
    }

    /// Runs a [`CacheSweeper`] over the global cache for as long as the
    /// facade lives. Ignored in space mode.
    ///
    /// Requires a Tokio runtime when the facade is created.
    pub fn with_sweeper(mut self, config: SweeperConfig) -> Self {
        self.sweeper = Some(config);
        self
    }
}

enum Scope {
    Flat {
        prefix: Option<String>,
        global: SharedCache,
        seeding: SeedHandle,
    },
    Space(StorageSpace),
}

/// A namespaced, cached view over an [`Adapter`].
pub struct Storage {
    adapter: Arc<dyn Adapter>,
    scope: Scope,
    cache: Cache<Value>,
    sweeper: Option<CacheSweeper>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Storage");
        s.field("adapter", &self.adapter.name());
        match &self.scope {
            Scope::Flat { prefix, .. } => s.field("prefix", prefix),
            Scope::Space(space) => s.field("space", &space.id()),
        };
        s.field("sweeping", &self.sweeper.is_some());
        s.finish()
    }
}

impl Storage {
    /// Creates a facade.
    ///
    /// In space mode the space blob is loaded before this returns. In flat
    /// and prefix mode seeding of the global cache is scheduled; see
    /// [`Storage::seeding`].
    ///
    /// # Errors
    ///
    /// - [`StorageError::Configuration`] if no adapter was given, or a
    ///   sweeper was requested outside of a Tokio runtime
    /// - [`StorageError::Adapter`] or [`StorageError::Corrupt`] if the space
    ///   blob cannot be read
    pub fn new(config: StorageConfig) -> Result<Self> {
        let StorageConfig {
            prefix,
            id,
            adapter,
            global_cache,
            sweeper,
        } = config;

        let adapter = adapter.ok_or_else(|| {
            StorageError::Configuration("an adapter is required to create storage".into())
        })?;

        let (scope, sweeper) = match id {
            Some(id) => {
                if prefix.is_some() {
                    debug!(space = %id, "Both id and prefix configured, prefix ignored");
                }
                let space = StorageSpace::load(id, adapter.as_ref())?;
                (Scope::Space(space), None)
            }
            None => {
                let global = global_cache.unwrap_or_else(|| {
                    debug!("No global cache supplied, using a private one");
                    Cache::shared()
                });
                let sweeper = match sweeper {
                    Some(config) => {
                        Handle::try_current().map_err(|_| {
                            StorageError::Configuration(
                                "an expiry sweeper requires a Tokio runtime".into(),
                            )
                        })?;
                        Some(CacheSweeper::start(Arc::clone(&global), config))
                    }
                    None => None,
                };
                let seeding = SeedHandle::start(Arc::clone(&adapter), Arc::clone(&global));
                let scope = Scope::Flat {
                    prefix: prefix.filter(|p| !p.is_empty()),
                    global,
                    seeding,
                };
                (scope, sweeper)
            }
        };

        let storage = Self {
            adapter,
            scope,
            cache: Cache::new(),
            sweeper,
        };
        debug!(storage = ?storage, "Storage created");
        Ok(storage)
    }

    /// Returns the configured prefix, if running in prefix mode.
    pub fn prefix(&self) -> Option<&str> {
        match &self.scope {
            Scope::Flat { prefix, .. } => prefix.as_deref(),
            Scope::Space(_) => None,
        }
    }

    /// Returns the space id, if running in space mode.
    pub fn space_id(&self) -> Option<&str> {
        match &self.scope {
            Scope::Space(space) => Some(space.id()),
            Scope::Flat { .. } => None,
        }
    }

    /// Returns the seeding handle of the global cache warm-up.
    ///
    /// `None` in space mode, which does not use the global cache.
    pub fn seeding(&self) -> Option<&SeedHandle> {
        match &self.scope {
            Scope::Flat { seeding, .. } => Some(seeding),
            Scope::Space(_) => None,
        }
    }

    /// Returns the adapter's name.
    pub fn adapter_name(&self) -> &str {
        self.adapter.name()
    }

    /// Returns the adapter's current footprint.
    pub fn size(&self) -> Result<usize> {
        Ok(self.adapter.size()?)
    }

    /// A per-facade cache for ad-hoc use, unrelated to persisted storage.
    pub fn cache(&self) -> &Cache<Value> {
        &self.cache
    }

    /// Reads a value.
    ///
    /// Returns `None` if the key is missing or its TTL has passed.
    pub fn get_item<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let value = match &self.scope {
            Scope::Space(space) => space.entries().get(key),
            Scope::Flat { prefix, global, .. } => {
                let physical = to_physical(prefix.as_deref(), key);
                match global.get(&physical) {
                    Some(value) => Some(value),
                    None => self.read_through(global, physical)?,
                }
            }
        };

        value
            .map(|v| serde_json::from_value(v).map_err(StorageError::from))
            .transpose()
    }

    fn read_through(&self, global: &SharedCache, physical: String) -> Result<Option<Value>> {
        let Some(bytes) = self.adapter.get_item(&physical)? else {
            return Ok(None);
        };
        let record = record::decode(&physical, &bytes)?;

        if record.is_expired() {
            debug!(key = %physical, "Persisted record expired, removing");
            self.adapter.remove_item(&physical)?;
            global.delete(&physical);
            return Ok(None);
        }

        let value = record.data().clone();
        global.set_record(physical, record);
        Ok(Some(value))
    }

    /// Writes a value, optionally expiring after `ttl`.
    ///
    /// A `None` or zero TTL stores the value permanently. In space mode the
    /// TTL only governs the in-memory view; the persisted blob stores the
    /// plain value, so after a reload the entry no longer expires.
    pub fn set_item<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<&Self> {
        let value = serde_json::to_value(value)?;

        match &self.scope {
            Scope::Space(space) => {
                space.commit(
                    self.adapter.as_ref(),
                    vec![(key.to_string(), Some(Record::new(value, ttl)))],
                )?;
            }
            Scope::Flat { prefix, global, .. } => {
                let physical = to_physical(prefix.as_deref(), key);
                let record = Record::new(value, ttl);
                self.adapter.set_item(&physical, record::encode(&record)?)?;
                global.set_record(physical, record);
            }
        }
        Ok(self)
    }

    /// Removes a value.
    pub fn remove_item(&self, key: &str) -> Result<&Self> {
        match &self.scope {
            Scope::Space(space) => {
                space.commit(self.adapter.as_ref(), vec![(key.to_string(), None)])?;
            }
            Scope::Flat { prefix, global, .. } => {
                let physical = to_physical(prefix.as_deref(), key);
                self.adapter.remove_item(&physical)?;
                global.delete(&physical);
            }
        }
        Ok(self)
    }

    /// Removes every in-scope key for which `predicate` resolves to true.
    ///
    /// The predicate receives logical keys, one at a time: the next key is not
    /// offered until the previous evaluation has resolved. Keys are taken
    /// from a snapshot made when the scan starts.
    ///
    /// In flat and prefix mode storage-space blobs are never offered, and in
    /// prefix mode neither are keys lacking this facade's prefix. In space
    /// mode only live entries are offered, and the removals are written in a
    /// single blob rewrite after the scan; they become visible then.
    ///
    /// # Returns
    ///
    /// Returns the number of keys removed.
    pub async fn clear<F, Fut>(&self, mut predicate: F) -> Result<usize>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = bool>,
    {
        let mut removed = Vec::new();
        for (logical, target) in self.clear_candidates()? {
            if predicate(logical).await {
                self.evict(&target)?;
                removed.push(target);
            }
        }
        self.finish_clear(removed)
    }

    /// Like [`Storage::clear`], with a synchronous predicate.
    pub fn clear_where<F>(&self, mut predicate: F) -> Result<usize>
    where
        F: FnMut(&str) -> bool,
    {
        let mut removed = Vec::new();
        for (logical, target) in self.clear_candidates()? {
            if predicate(&logical) {
                self.evict(&target)?;
                removed.push(target);
            }
        }
        self.finish_clear(removed)
    }

    /// Removes every in-scope key whose logical name matches a glob pattern.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidArgument`] for a malformed pattern, raised
    /// before anything is scanned.
    pub fn clear_matching(&self, pattern: &str) -> Result<usize> {
        let pattern = GlobPattern::parse(pattern)?;
        self.clear_where(|key| pattern.matches(key))
    }

    /// Snapshot of `(logical key, key to delete)` pairs in scope.
    fn clear_candidates(&self) -> Result<Vec<(String, String)>> {
        match &self.scope {
            Scope::Space(space) => Ok(space
                .entries()
                .record_data()
                .into_iter()
                .map(|(key, _)| (key.clone(), key))
                .collect()),
            Scope::Flat { prefix, .. } => Ok(self
                .adapter
                .keys()?
                .into_iter()
                .filter(|physical| !is_space_key(physical))
                .filter_map(|physical| {
                    let logical = strip_scope(prefix.as_deref(), &physical)?.to_string();
                    Some((logical, physical))
                })
                .collect()),
        }
    }

    fn evict(&self, target: &str) -> Result<()> {
        // Space removals are committed together in finish_clear
        if let Scope::Flat { global, .. } = &self.scope {
            self.adapter.remove_item(target)?;
            global.delete(target);
        }
        Ok(())
    }

    fn finish_clear(&self, removed: Vec<String>) -> Result<usize> {
        let count = removed.len();
        if let Scope::Space(space) = &self.scope {
            let updates = removed.into_iter().map(|key| (key, None)).collect();
            space.commit(self.adapter.as_ref(), updates)?;
        }
        debug!(removed = count, "Storage cleared");
        Ok(count)
    }

    /// Lists keys.
    ///
    /// In space mode these are the logical keys of the space. In flat and
    /// prefix mode this is every key the adapter reports, untranslated and
    /// unfiltered; use [`Storage::scoped_keys`] for this facade's own keys.
    pub fn keys(&self) -> Result<Vec<String>> {
        match &self.scope {
            Scope::Space(space) => Ok(space.entries().keys()),
            Scope::Flat { .. } => Ok(self.adapter.keys()?),
        }
    }

    /// Lists the logical keys that belong to this facade.
    ///
    /// Space blobs and keys outside the prefix are left out. In space mode
    /// only live entries are listed.
    pub fn scoped_keys(&self) -> Result<Vec<String>> {
        match &self.scope {
            Scope::Space(space) => Ok(space
                .entries()
                .record_data()
                .into_iter()
                .map(|(key, _)| key)
                .collect()),
            Scope::Flat { .. } => Ok(self
                .clear_candidates()?
                .into_iter()
                .map(|(logical, _)| logical)
                .collect()),
        }
    }

    /// Lists the scoped logical keys matching a glob pattern.
    pub fn keys_matching(&self, pattern: &str) -> Result<Vec<String>> {
        let pattern = GlobPattern::parse(pattern)?;
        Ok(self
            .scoped_keys()?
            .into_iter()
            .filter(|key| pattern.matches(key))
            .collect())
    }
}
