//! Global Cache Seeding
//!
//! When a facade is created in flat or prefix mode, the shared cache is
//! warmed by enumerating every key the adapter holds. The warm-up runs as a
//! background task that first yields, so construction returns immediately and
//! the caller's current synchronous work finishes before any seeding happens.
//!
//! A `get_item` issued before seeding completes simply misses the cache and
//! reads the adapter. That costs a round trip, never correctness.
//!
//! ## Rules
//!
//! - Space keys are skipped; their blobs are not flat records.
//! - Expired records are skipped.
//! - A key already present in the cache is left alone, so a write that raced
//!   ahead of seeding is never overwritten with the older adapter value.
//! - A record is re-read from the adapter under the cache's write lock before
//!   it is inserted. A key removed after the first read stays removed.
//! - A key that fails to load or decode does not stop the pass. The first such
//!   failure is reported through [`SeedHandle::wait`].

use crate::adapter::Adapter;
use crate::error::{Result, StorageError};
use crate::storage::cache::SharedCache;
use crate::storage::keys::is_space_key;
use crate::storage::record::{self, Record};
use serde_json::Value;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::debug;

type SeedOutcome = std::result::Result<usize, String>;

/// A handle to a seeding pass.
///
/// Cloning the handle is cheap; every clone observes the same outcome.
#[derive(Debug, Clone)]
pub struct SeedHandle {
    rx: watch::Receiver<Option<SeedOutcome>>,
}

impl SeedHandle {
    /// Schedules a seeding pass of `cache` from `adapter`.
    ///
    /// Inside a Tokio runtime the pass is spawned as a task. Outside of one it
    /// runs inline before this function returns.
    pub fn start(adapter: Arc<dyn Adapter>, cache: SharedCache) -> Self {
        let (tx, rx) = watch::channel(None);

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    // Let the constructing code finish first
                    tokio::task::yield_now().await;
                    let outcome = seed(adapter.as_ref(), &cache).map_err(|e| e.to_string());
                    tx.send_replace(Some(outcome));
                });
            }
            Err(_) => {
                debug!("No async runtime available, seeding inline");
                let outcome = seed(adapter.as_ref(), &cache).map_err(|e| e.to_string());
                tx.send_replace(Some(outcome));
            }
        }

        Self { rx }
    }

    /// Returns true once the seeding pass has finished, successfully or not.
    pub fn is_complete(&self) -> bool {
        self.rx.borrow().is_some()
    }

    /// Waits for the seeding pass to finish.
    ///
    /// # Returns
    ///
    /// The number of keys inserted into the cache, or
    /// [`StorageError::Seeding`] describing the first key that could not be
    /// loaded, or the task ending without reporting.
    pub async fn wait(&self) -> Result<usize> {
        let mut rx = self.rx.clone();
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| StorageError::Seeding("seeding task ended without reporting".into()))?
            .clone();

        match outcome {
            Some(Ok(seeded)) => Ok(seeded),
            Some(Err(message)) => Err(StorageError::Seeding(message)),
            None => Err(StorageError::Seeding("seeding outcome missing".into())),
        }
    }
}

/// Runs one seeding pass synchronously.
fn seed(adapter: &dyn Adapter, cache: &SharedCache) -> Result<usize> {
    let keys = adapter.keys()?;
    let mut seeded = 0;
    let mut first_error = None;

    for key in keys {
        if is_space_key(&key) {
            continue;
        }

        if cache.has(&key) {
            continue;
        }

        // The first read stays outside the lock; only live records are
        // worth re-reading under it
        let loaded = match load(adapter, &key) {
            Ok(Some(record)) if !record.is_expired() => {
                cache.insert_if_absent_with(key.as_str(), || load(adapter, &key))
            }
            Ok(_) => Ok(false),
            Err(e) => Err(e),
        };

        match loaded {
            Ok(true) => seeded += 1,
            Ok(false) => {}
            Err(e) => {
                debug!(key = %key, error = %e, "Failed to seed key");
                first_error.get_or_insert(e);
            }
        }
    }

    debug!(seeded, cached = cache.len(), "Global cache seeded");

    match first_error {
        Some(e) => Err(e),
        None => Ok(seeded),
    }
}

fn load(adapter: &dyn Adapter, key: &str) -> Result<Option<Record<Value>>> {
    adapter
        .get_item(key)?
        .map(|bytes| record::decode(key, &bytes))
        .transpose()
}
