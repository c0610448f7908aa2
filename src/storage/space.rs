//! Storage Spaces
//!
//! A storage space is an isolated namespace whose entire contents live under
//! one physical key, `app*space-{id}`, as a single JSON object:
//!
//! ```text
//! "app*space-user"  ->  {"name": "John", "theme": "dark"}
//! ```
//!
//! The working set is held in a [`Cache`]. Every mutation rewrites the whole
//! blob; the adapter never sees a per-entry write or delete for a space.
//! Mutations go through [`StorageSpace::commit`], which writes the blob first
//! and changes the working set only once the write succeeded.
//!
//! TTLs set on space entries apply to the in-memory working set only. The
//! persisted blob holds plain values, and entries that have already expired
//! are left out of it.

use crate::adapter::Adapter;
use crate::error::{Result, StorageError};
use crate::storage::cache::Cache;
use crate::storage::keys::space_key;
use crate::storage::record::Record;
use bytes::Bytes;
use serde_json::{Map, Value};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// The in-memory working set of one storage space.
#[derive(Debug)]
pub struct StorageSpace {
    id: String,
    key: String,
    entries: Cache<Value>,
    /// Serializes blob rewrites so each one sees the previous commit
    commit_lock: Mutex<()>,
}

impl StorageSpace {
    /// Creates an empty space without touching the adapter.
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let key = space_key(&id);
        Self {
            id,
            key,
            entries: Cache::new(),
            commit_lock: Mutex::new(()),
        }
    }

    /// Loads the space `id` from the adapter.
    ///
    /// A missing or empty blob yields an empty space. A blob that is not a
    /// JSON object fails with [`StorageError::Corrupt`].
    pub fn load(id: impl Into<String>, adapter: &dyn Adapter) -> Result<Self> {
        let space = Self::new(id);

        let Some(blob) = adapter.get_item(&space.key)? else {
            debug!(space = %space.id, "Storage space not found, starting empty");
            return Ok(space);
        };
        if blob.is_empty() {
            return Ok(space);
        }

        let map: Map<String, Value> =
            serde_json::from_slice(&blob).map_err(|source| StorageError::Corrupt {
                key: space.key.clone(),
                source,
            })?;

        for (key, value) in map {
            space.entries.set_record(key, Record::Raw(value));
        }

        debug!(space = %space.id, entries = space.entries.len(), "Storage space loaded");
        Ok(space)
    }

    /// Returns the space id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the physical key holding this space.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the working set.
    pub fn entries(&self) -> &Cache<Value> {
        &self.entries
    }

    fn live_map(&self) -> Map<String, Value> {
        self.entries.record_data().into_iter().collect()
    }

    /// Serializes the live working set.
    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(&self.live_map())?))
    }

    /// Writes the whole working set back under the space key.
    pub fn persist(&self, adapter: &dyn Adapter) -> Result<()> {
        self.commit(adapter, Vec::new())
    }

    /// Applies `updates` to the space, persisted first.
    ///
    /// Each update sets a key to a record, or removes it when `None`. The blob
    /// holding the working set with the updates applied is written to the
    /// adapter, and only then are the updates applied in memory. If the write
    /// fails, the working set is left as it was.
    pub fn commit(
        &self,
        adapter: &dyn Adapter,
        updates: Vec<(String, Option<Record<Value>>)>,
    ) -> Result<()> {
        let _guard = self.commit_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut map = self.live_map();
        for (key, update) in &updates {
            match update {
                Some(record) if !record.is_expired() => {
                    map.insert(key.clone(), record.data().clone());
                }
                _ => {
                    map.remove(key);
                }
            }
        }
        adapter.set_item(&self.key, Bytes::from(serde_json::to_vec(&map)?))?;

        for (key, update) in updates {
            match update {
                Some(record) => {
                    self.entries.set_record(key, record);
                }
                None => {
                    self.entries.delete(&key);
                }
            }
        }
        Ok(())
    }
}
