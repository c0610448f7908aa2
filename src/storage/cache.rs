//! In-Memory Cache with Expiry Support
//!
//! A string-keyed map of [`Record`]s used in two roles:
//!
//! 1. As the process-wide read-through layer in front of an adapter (shared
//!    between facades through a [`SharedCache`] handle).
//! 2. As the working set of a storage space, and as the ad-hoc per-facade
//!    cache exposed through [`Storage::cache`](crate::storage::Storage::cache).
//!
//! ## Expiry
//!
//! Expiry is lazy: `get` detects an expired record and removes it. `has` and
//! `keys` look at storage only and report expired-but-present entries too.
//! [`Cache::purge_expired`] reclaims everything at once and is what the
//! background sweeper calls.
//!
//! ## Ordering
//!
//! `keys` returns keys in first-insertion order. Overwriting a key keeps its
//! position; deleting and re-inserting moves it to the end.

use crate::storage::record::{now_millis, Record};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::trace;

/// A cache handle shared between facades.
pub type SharedCache = Arc<Cache<Value>>;

#[derive(Debug, Clone)]
struct Slot<V> {
    /// Insertion sequence number, used for ordered enumeration
    seq: u64,
    record: Record<V>,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries currently stored (expired ones included)
    pub entries: u64,
    /// Lookups that returned a live value
    pub hits: u64,
    /// Lookups that found nothing or an expired value
    pub misses: u64,
    /// Entries removed because they had expired
    pub expired: u64,
}

/// A thread-safe in-memory cache with optional per-entry TTL.
///
/// # Example
///
/// ```
/// use kvspace::storage::Cache;
/// use std::time::Duration;
///
/// let cache: Cache<String> = Cache::new();
///
/// cache.set("k", "v1".to_string(), None);
/// assert_eq!(cache.get("k"), Some("v1".to_string()));
///
/// cache
///     .set("session", "abc".to_string(), Some(Duration::from_secs(60)))
///     .set("other", "x".to_string(), None);
///
/// assert!(cache.delete("k"));
/// assert_eq!(cache.get("k"), None);
/// ```
#[derive(Debug)]
pub struct Cache<V = Value> {
    entries: RwLock<HashMap<String, Slot<V>>>,
    next_seq: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

impl<V> Default for Cache<V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }
}

impl<V: Clone> Cache<V> {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache behind an `Arc`, ready to be shared.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Slot<V>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Slot<V>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Gets the live value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired. Expired
    /// entries are removed on the way out.
    pub fn get(&self, key: &str) -> Option<V> {
        // Fast path: read lock for present, live entries
        {
            let entries = self.read();
            match entries.get(key) {
                Some(slot) if !slot.record.is_expired() => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    trace!(key, "cache hit");
                    return Some(slot.record.data().clone());
                }
                Some(_) => {}
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    trace!(key, "cache miss");
                    return None;
                }
            }
        }

        // Present but expired - need write lock to remove it
        let mut entries = self.write();
        if let Some(slot) = entries.get(key) {
            if slot.record.is_expired() {
                entries.remove(key);
                self.expired.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!(key, "cache entry expired");
                return None;
            }
            // Race: another writer replaced the entry in between
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(slot.record.data().clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Stores a value, wrapping it with an expiry when `ttl` is positive.
    ///
    /// Overwrites any existing entry. Returns the cache for chaining.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) -> &Self {
        self.set_record(key, Record::new(value, ttl))
    }

    /// Stores an already-built record.
    pub fn set_record(&self, key: impl Into<String>, record: Record<V>) -> &Self {
        let key = key.into();
        let mut entries = self.write();
        match entries.get_mut(&key) {
            Some(slot) => slot.record = record,
            None => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                entries.insert(key, Slot { seq, record });
            }
        }
        self
    }

    /// Stores the record produced by `load`, only if the key is not present.
    ///
    /// `load` runs under the write lock, so no other mutation of this cache
    /// can land between the presence check and the insert. A `None` or
    /// already-expired record inserts nothing, and `load` is not called at
    /// all when the key is present.
    ///
    /// Returns `Ok(true)` if a record was inserted.
    pub fn insert_if_absent_with<E, F>(&self, key: impl Into<String>, load: F) -> Result<bool, E>
    where
        F: FnOnce() -> Result<Option<Record<V>>, E>,
    {
        let key = key.into();
        let mut entries = self.write();
        if entries.contains_key(&key) {
            return Ok(false);
        }

        match load()? {
            Some(record) if !record.is_expired() => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                entries.insert(key, Slot { seq, record });
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Checks whether a key is stored, without consulting expiry.
    ///
    /// Use [`Cache::get`] for "is it live" semantics.
    pub fn has(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Removes a key. Returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.write().remove(key).is_some()
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Returns all stored keys in insertion order, expired ones included.
    pub fn keys(&self) -> Vec<String> {
        let entries = self.read();
        let mut keyed: Vec<(u64, &String)> =
            entries.iter().map(|(key, slot)| (slot.seq, key)).collect();
        keyed.sort_unstable_by_key(|(seq, _)| *seq);
        keyed.into_iter().map(|(_, key)| key.clone()).collect()
    }

    /// Returns the number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the remaining TTL for a key in milliseconds.
    ///
    /// - `Some(Some(ms))` if the key is live and has an expiry
    /// - `Some(None)` if the key is live and never expires
    /// - `None` if the key doesn't exist or has expired
    pub fn ttl_remaining(&self, key: &str) -> Option<Option<u64>> {
        let entries = self.read();
        let slot = entries.get(key)?;
        if slot.record.is_expired() {
            return None;
        }
        Some(slot.record.ttl_ms())
    }

    /// Returns a snapshot of all live entries in insertion order.
    pub fn record_data(&self) -> Vec<(String, V)> {
        let now = now_millis();
        let entries = self.read();
        let mut live: Vec<(u64, String, V)> = entries
            .iter()
            .filter(|(_, slot)| !slot.record.is_expired_at(now))
            .map(|(key, slot)| (slot.seq, key.clone(), slot.record.data().clone()))
            .collect();
        live.sort_unstable_by_key(|(seq, _, _)| *seq);
        live.into_iter().map(|(_, key, value)| (key, value)).collect()
    }

    /// Removes every expired entry.
    ///
    /// # Returns
    ///
    /// Returns the number of entries that were removed.
    pub fn purge_expired(&self) -> u64 {
        let now = now_millis();
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, slot| !slot.record.is_expired_at(now));
        let removed = (before - entries.len()) as u64;

        if removed > 0 {
            self.expired.fetch_add(removed, Ordering::Relaxed);
        }
        removed
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len() as u64,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}
