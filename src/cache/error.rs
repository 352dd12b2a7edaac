//! Derivative cache error types

use thiserror::Error;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum DerivativeError {
    /// The source already has `max` derivatives; the cap is a hard stop
    #[error("Derivative limit reached for '{source_key}': {count} of {max}")]
    TooManyDerivatives {
        source_key: String,
        count: usize,
        max: usize,
    },

    #[error("Source '{source_key}' is unreadable: {reason}")]
    SourceUnreadable { source_key: String, reason: String },

    /// Parameter, decode, encode or timeout failure; nothing was written
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl DerivativeError {
    /// - TooManyDerivatives → 500
    /// - SourceUnreadable → 404
    /// - ProcessingFailed → 500
    /// - Storage → 500
    pub fn to_http_status(&self) -> u16 {
        match self {
            DerivativeError::SourceUnreadable { .. } => 404,
            DerivativeError::TooManyDerivatives { .. }
            | DerivativeError::ProcessingFailed(_)
            | DerivativeError::Storage(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cap = DerivativeError::TooManyDerivatives {
            source_key: "a.jpg".into(),
            count: 3,
            max: 3,
        };
        assert_eq!(cap.to_http_status(), 500);
        assert_eq!(
            DerivativeError::SourceUnreadable {
                source_key: "a.jpg".into(),
                reason: "gone".into()
            }
            .to_http_status(),
            404
        );
        assert_eq!(DerivativeError::ProcessingFailed("x".into()).to_http_status(), 500);
        assert_eq!(
            DerivativeError::from(StorageError::Remote("down".into())).to_http_status(),
            500
        );
    }

    #[test]
    fn test_display() {
        let cap = DerivativeError::TooManyDerivatives {
            source_key: "uploads/cat.jpg".into(),
            count: 100,
            max: 100,
        };
        assert_eq!(
            cap.to_string(),
            "Derivative limit reached for 'uploads/cat.jpg': 100 of 100"
        );
    }
}
