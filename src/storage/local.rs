//! Local filesystem store

use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

use super::{BlobStore, StorageError};

/// Store rooted at a directory; keys map to relative file paths
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store over an existing directory
    ///
    /// # Errors
    ///
    /// `StorageError::Io` when the root cannot be inspected,
    /// `StorageError::InvalidPath` when it is not a directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        if !std::fs::metadata(&root)?.is_dir() {
            return Err(StorageError::InvalidPath(root.display().to_string()));
        }
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key under the root, rejecting `..` and absolute components
    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in Path::new(key).components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::InvalidPath(key.to_string()));
                }
            }
        }
        if depth == 0 && !key.is_empty() {
            return Err(StorageError::InvalidPath(key.to_string()));
        }
        Ok(resolved)
    }

    fn resolve_file(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || key.ends_with('/') {
            return Err(StorageError::InvalidPath(key.to_string()));
        }
        self.resolve(key)
    }

    /// Key of a file under the root, `/`-separated
    fn key_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = relative
            .components()
            .map(|component| match component {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect();
        parts.map(|parts| parts.join("/"))
    }
}

/// Whether a directory can hold keys starting with `prefix`: either the
/// directory lies under the prefix, or the prefix reaches into it
fn may_contain_prefix(dir_key: &str, prefix: &str) -> bool {
    let dir = format!("{}/", dir_key);
    dir.starts_with(prefix) || prefix.starts_with(&dir)
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn exists(&self, path: &str) -> Result<bool, StorageError> {
        let file = self.resolve_file(path)?;
        match fs::metadata(&file).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn read(&self, path: &str) -> Result<Bytes, StorageError> {
        let file = self.resolve_file(path)?;
        match fs::read(&file).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes a uniquely named temp file beside the target, then renames it
    /// into place so readers never observe a partial derivative
    async fn write(&self, path: &str, data: Bytes) -> Result<(), StorageError> {
        let file = self.resolve_file(path)?;
        let (Some(parent), Some(name)) = (file.parent(), file.file_name()) else {
            return Err(StorageError::InvalidPath(path.to_string()));
        };
        fs::create_dir_all(parent).await?;

        let temp = parent.join(format!(
            ".{}.{}.tmp",
            name.to_string_lossy(),
            uuid::Uuid::new_v4()
        ));
        if let Err(e) = fs::write(&temp, &data).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp, &file).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    /// Walks the directory holding `prefix`, descending only into
    /// subdirectories that can hold matching keys
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let dir_key = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let start = self.resolve(dir_key)?;

        let mut keys = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    let relevant = self
                        .key_of(&path)
                        .map(|key| may_contain_prefix(&key, prefix))
                        .unwrap_or(false);
                    if relevant {
                        pending.push(path);
                    }
                } else if file_type.is_file() {
                    if let Some(key) = self.key_of(&path) {
                        if key.starts_with(prefix) {
                            keys.push(key);
                        }
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn is_remote(&self) -> bool {
        false
    }

    fn local_root_path(&self) -> Option<&Path> {
        Some(&self.root)
    }

    fn public_url(&self, _path: &str) -> Option<String> {
        None
    }
}
