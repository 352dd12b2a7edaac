//! Blob store error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// No object is stored under the key
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Key escapes the store root or is otherwise malformed
    #[error("Invalid storage path '{0}'")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by a remote backend
    #[error("Remote store error: {0}")]
    Remote(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        let err: StorageError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert!(matches!(err, StorageError::Io(_)));
        assert_eq!(err.to_string(), "I/O error: disk");
    }

    #[test]
    fn test_not_found() {
        assert!(StorageError::NotFound("a.jpg".into()).is_not_found());
        assert!(!StorageError::Remote("timeout".into()).is_not_found());
    }
}
