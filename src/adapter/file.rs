//! JSON-file adapter.
//!
//! The whole keyspace lives in one JSON object on disk:
//!
//! ```text
//! {
//!   "a-k": "{\"raw\":\"1\"}",
//!   "app*space-user": "{\"name\":\"John\"}"
//! }
//! ```
//!
//! Every mutation rewrites the file through a temporary sibling and a rename,
//! so a crash mid-write leaves the previous contents intact.

use crate::adapter::Adapter;
use crate::error::AdapterError;
use bytes::Bytes;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// An adapter persisting to a single JSON file.
///
/// Values must be UTF-8, which every value written by the facade is.
#[derive(Debug)]
pub struct FileAdapter {
    path: PathBuf,
    data: RwLock<BTreeMap<String, String>>,
}

impl FileAdapter {
    /// Opens the file at `path`, starting empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AdapterError> {
        let path = path.as_ref().to_path_buf();

        let data = match fs::read(&path) {
            Ok(contents) if contents.is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_slice(&contents)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!(path = %path.display(), keys = data.len(), "File adapter opened");

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, data: &BTreeMap<String, String>) -> Result<(), AdapterError> {
        let encoded = serde_json::to_vec_pretty(data)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, encoded)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl Adapter for FileAdapter {
    fn name(&self) -> &str {
        "file"
    }

    fn set_item(&self, key: &str, value: Bytes) -> Result<(), AdapterError> {
        let value = String::from_utf8(value.to_vec()).map_err(|_| {
            AdapterError::Provider(format!("value for key {:?} is not valid UTF-8", key))
        })?;

        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let previous = data.insert(key.to_string(), value);

        if let Err(e) = self.flush(&data) {
            // Keep memory in step with the file
            match previous {
                Some(previous) => data.insert(key.to_string(), previous),
                None => data.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn get_item(&self, key: &str) -> Result<Option<Bytes>, AdapterError> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data.get(key).map(|v| Bytes::from(v.clone())))
    }

    fn remove_item(&self, key: &str) -> Result<(), AdapterError> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let Some(previous) = data.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.flush(&data) {
            data.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn size(&self) -> Result<usize, AdapterError> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        Ok(data.iter().map(|(k, v)| k.len() + v.len()).sum())
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
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let adapter = FileAdapter::open(&path).unwrap();
            adapter.set_item("a", Bytes::from("1")).unwrap();
            adapter.set_item("b", Bytes::from("2")).unwrap();
            adapter.remove_item("a").unwrap();
        }

        let adapter = FileAdapter::open(&path).unwrap();
        assert_eq!(adapter.keys().unwrap(), vec!["b"]);
        assert_eq!(adapter.get_item("b").unwrap(), Some(Bytes::from("2")));
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FileAdapter::open(dir.path().join("nested/store.json")).unwrap();

        assert!(adapter.keys().unwrap().is_empty());
        adapter.set_item("k", Bytes::from("v")).unwrap();
        assert!(adapter.path().exists());
    }

    #[test]
    fn test_rejects_non_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = FileAdapter::open(dir.path().join("store.json")).unwrap();

        let err = adapter
            .set_item("k", Bytes::from_static(&[0xff, 0xfe]))
            .unwrap_err();
        assert!(matches!(err, AdapterError::Provider(_)));
        assert_eq!(adapter.get_item("k").unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(FileAdapter::open(&path), Err(AdapterError::Io(_))));
    }
}
