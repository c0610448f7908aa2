//! In-process adapter backed by a sorted map.

use crate::adapter::Adapter;
use crate::error::AdapterError;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// An adapter that keeps everything in memory.
///
/// Keys are enumerated in sorted order. `size` reports the bytes used by keys
/// and values together, and an optional quota makes writes fail once it
/// would be exceeded.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    data: RwLock<BTreeMap<String, Bytes>>,
    quota: Option<usize>,
}

impl MemoryAdapter {
    /// Creates an empty adapter without a quota.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty adapter that rejects writes past `limit` bytes.
    pub fn with_quota(limit: usize) -> Self {
        Self {
            data: RwLock::default(),
            quota: Some(limit),
        }
    }

    fn footprint(data: &BTreeMap<String, Bytes>) -> usize {
        data.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl Adapter for MemoryAdapter {
    fn name(&self) -> &str {
        "memory"
    }

    fn set_item(&self, key: &str, value: Bytes) -> Result<(), AdapterError> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(limit) = self.quota {
            let replaced = data.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
            let used = Self::footprint(&data) - replaced + key.len() + value.len();
            if used > limit {
                return Err(AdapterError::QuotaExceeded { used, limit });
            }
        }

        data.insert(key.to_string(), value);
        Ok(())
    }

    fn get_item(&self, key: &str) -> Result<Option<Bytes>, AdapterError> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data.get(key).cloned())
    }

    fn remove_item(&self, key: &str) -> Result<(), AdapterError> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data.remove(key);
        Ok(())
    }

    fn size(&self) -> Result<usize, AdapterError> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(Self::footprint(&data))
    }

    fn keys(&self) -> Result<Vec<String>, AdapterError> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let adapter = MemoryAdapter::new();
        adapter.set_item("k", Bytes::from("v")).unwrap();

        assert_eq!(adapter.get_item("k").unwrap(), Some(Bytes::from("v")));
        adapter.remove_item("k").unwrap();
        assert_eq!(adapter.get_item("k").unwrap(), None);

        // Removing again is fine
        adapter.remove_item("k").unwrap();
    }

    #[test]
    fn test_keys_sorted_and_size() {
        let adapter = MemoryAdapter::new();
        adapter.set_item("b", Bytes::from("22")).unwrap();
        adapter.set_item("a", Bytes::from("1")).unwrap();

        assert_eq!(adapter.keys().unwrap(), vec!["a", "b"]);
        assert_eq!(adapter.size().unwrap(), 5);
    }

    #[test]
    fn test_quota_exceeded() {
        let adapter = MemoryAdapter::with_quota(6);
        adapter.set_item("k", Bytes::from("12345")).unwrap();

        // Replacing within the limit is allowed
        adapter.set_item("k", Bytes::from("abcde")).unwrap();

        let err = adapter.set_item("j", Bytes::from("x")).unwrap_err();
        assert!(matches!(
            err,
            AdapterError::QuotaExceeded { used: 8, limit: 6 }
        ));
        assert_eq!(adapter.get_item("j").unwrap(), None);
    }
}
