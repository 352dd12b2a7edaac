//! Blob Store collaborator
//!
//! Keys are `/`-separated and relative to the store root. The derivative
//! cache is the only writer of derivative keys.

mod error;
mod local;
mod memory;
mod s3;

pub use error::StorageError;
pub use local::LocalStore;
pub use memory::MemoryStore;
pub use s3::{S3Settings, S3Store};

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use crate::path::Mount;

/// Byte storage for sources and derivatives
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn exists(&self, path: &str) -> Result<bool, StorageError>;

    /// Returns `StorageError::NotFound` when nothing is stored at `path`
    async fn read(&self, path: &str) -> Result<Bytes, StorageError>;

    /// Last writer wins
    async fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError>;

    /// All keys that start with `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Remote stores are delivered by redirect, local ones by streaming
    fn is_remote(&self) -> bool;

    /// Filesystem root backing the store, `None` for remote stores
    fn local_root_path(&self) -> Option<&Path>;

    /// Publicly reachable URL for a key, used for redirects
    fn public_url(&self, path: &str) -> Option<String>;

    fn mount(&self, source_root: &str, derivative_root: &str) -> Mount {
        Mount::new(source_root, derivative_root)
    }
}
