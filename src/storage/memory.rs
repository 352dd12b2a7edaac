//! In-memory store for tests and embedders

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{BlobStore, StorageError};

#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Bytes>>,
    /// Set for a remote-style store delivered by redirect
    public_base: Option<String>,
    read_only: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that reports itself as remote, with public URLs under `base`
    pub fn remote(base: impl Into<String>) -> Self {
        Self {
            public_base: Some(base.into()),
            ..Self::default()
        }
    }

    /// Make subsequent writes fail with `StorageError::Remote`
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn insert(&self, path: impl Into<String>, data: impl Into<Bytes>) {
        self.objects.lock().insert(path.into(), data.into());
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        Ok(self.objects.lock().contains_key(path))
    }

    async fn read(&self, path: &str) -> Result<Bytes, StorageError> {
        self.objects
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    async fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StorageError::Remote(format!("store is read-only: {}", path)));
        }
        self.objects.lock().insert(path.to_string(), data);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .objects
            .lock()
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    fn is_remote(&self) -> bool {
        self.public_base.is_some()
    }

    fn local_root_path(&self) -> Option<&Path> {
        None
    }

    fn public_url(&self, path: &str) -> Option<String> {
        let base = self.public_base.as_deref()?;
        Some(format!("{}/{}", base.trim_end_matches('/'), path))
    }
}
