//! Background Expiry Sweeper
//!
//! Cache reads expire entries lazily, but an entry that is never read again
//! would otherwise sit in memory forever. The sweeper is an opt-in background
//! task that periodically purges expired entries from a [`Cache`].
//!
//! ## Adaptive Frequency
//!
//! If a large share of entries turned out to be expired, the sweeper runs more
//! often. If nothing expired, it backs off towards `max_interval`.

use crate::storage::cache::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Base interval between sweeps (default: 1s)
    pub base_interval: Duration,

    /// Minimum interval between sweeps (default: 100ms)
    pub min_interval: Duration,

    /// Maximum interval between sweeps (default: 30s)
    pub max_interval: Duration,

    /// If this fraction of entries were expired, speed up sweeping
    pub speedup_threshold: f64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(1),
            min_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(30),
            speedup_threshold: 0.25,
        }
    }
}

/// A handle to a running sweeper.
///
/// Dropping the handle stops the sweeper.
#[derive(Debug)]
pub struct CacheSweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl CacheSweeper {
    /// Starts sweeping `cache` on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start<V>(cache: Arc<Cache<V>>, config: SweeperConfig) -> Self
    where
        V: Clone + Send + Sync + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(cache, config, shutdown_rx));

        info!("Cache expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the sweeper. Also called when the handle is dropped.
    pub fn stop(&self) {
        if !self.shutdown_tx.send_replace(true) {
            info!("Cache expiry sweeper stopped");
        }
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop<V>(
    cache: Arc<Cache<V>>,
    config: SweeperConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    V: Clone + Send + Sync + 'static,
{
    let mut current_interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(current_interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Cache expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let entries_before = cache.len();
        let expired = cache.purge_expired();

        if entries_before > 0 && expired as f64 / entries_before as f64 > config.speedup_threshold
        {
            current_interval = (current_interval / 2).max(config.min_interval);
            debug!(
                expired,
                new_interval_ms = current_interval.as_millis() as u64,
                "High expiry rate, speeding up sweeper"
            );
        } else if expired == 0 {
            current_interval = (current_interval * 2).min(config.max_interval);
            trace!(
                new_interval_ms = current_interval.as_millis() as u64,
                "Nothing expired, slowing down sweeper"
            );
        }

        if expired > 0 {
            debug!(expired, remaining = cache.len(), "Expired cache entries purged");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> SweeperConfig {
        SweeperConfig {
            base_interval: Duration::from_millis(10),
            min_interval: Duration::from_millis(5),
            max_interval: Duration::from_millis(20),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_sweeper_purges_expired_entries() {
        let cache: Arc<Cache<u32>> = Cache::shared();
        for i in 0..10 {
            cache.set(format!("key{}", i), i, Some(Duration::from_millis(30)));
        }
        cache.set("persistent", 0, None);

        let _sweeper = CacheSweeper::start(Arc::clone(&cache), fast_config());
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(cache.keys(), vec!["persistent"]);
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_drop() {
        let cache: Arc<Cache<u32>> = Cache::shared();

        {
            let _sweeper = CacheSweeper::start(Arc::clone(&cache), fast_config());
            tokio::time::sleep(Duration::from_millis(30)).await;
        }

        cache.set("key", 1, Some(Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Still stored; only a read evicts it now
        assert!(cache.has("key"));
        assert_eq!(cache.get("key"), None);
    }
}
