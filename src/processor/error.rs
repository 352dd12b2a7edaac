//! Image processing error types
//!
//! Structured errors with HTTP status mapping. The cache manager folds every
//! variant into `DerivativeError::ProcessingFailed`; the status here is what
//! an embedder calling a processor directly would report.

use std::fmt;

/// Errors raised while resolving parameters or transforming pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    // === Decoding Errors ===
    /// Source format is not one the processor can read
    UnsupportedFormat { format: String },
    /// Failed to decode image data
    DecodeFailed { message: String },

    // === Processing Errors ===
    /// Resize or crop failed
    ResizeFailed { message: String },
    /// Encoding to output format failed
    EncodeFailed { format: String, message: String },

    // === Security Errors ===
    /// Source dimensions exceed the pixel limit (image bomb protection)
    ImageBombDetected {
        width: u32,
        height: u32,
        pixels: u64,
        max_pixels: u64,
    },

    // === Parameter Errors ===
    /// Unknown option or malformed option arguments
    InvalidParameter { param: String, message: String },
    /// Quality value out of range
    InvalidQuality { quality: u8 },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::UnsupportedFormat { format } => {
                write!(f, "Unsupported image format: {}", format)
            }
            ImageError::DecodeFailed { message } => {
                write!(f, "Failed to decode image: {}", message)
            }
            ImageError::ResizeFailed { message } => {
                write!(f, "Resize failed: {}", message)
            }
            ImageError::EncodeFailed { format, message } => {
                write!(f, "Failed to encode to {}: {}", format, message)
            }
            ImageError::ImageBombDetected {
                width,
                height,
                pixels,
                max_pixels,
            } => {
                write!(
                    f,
                    "Image dimensions {}x{} ({} pixels) exceed limit of {} pixels",
                    width, height, pixels, max_pixels
                )
            }
            ImageError::InvalidParameter { param, message } => {
                write!(f, "Invalid parameter '{}': {}", param, message)
            }
            ImageError::InvalidQuality { quality } => {
                write!(f, "Invalid quality {}: must be 1-100", quality)
            }
        }
    }
}

impl std::error::Error for ImageError {}

impl ImageError {
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        ImageError::UnsupportedFormat {
            format: format.into(),
        }
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        ImageError::DecodeFailed {
            message: message.into(),
        }
    }

    pub fn resize_failed(message: impl Into<String>) -> Self {
        ImageError::ResizeFailed {
            message: message.into(),
        }
    }

    pub fn encode_failed(format: impl Into<String>, message: impl Into<String>) -> Self {
        ImageError::EncodeFailed {
            format: format.into(),
            message: message.into(),
        }
    }

    pub fn invalid_param(param: impl Into<String>, message: impl Into<String>) -> Self {
        ImageError::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    pub fn image_bomb(width: u32, height: u32, max_pixels: u64) -> Self {
        ImageError::ImageBombDetected {
            width,
            height,
            pixels: u64::from(width) * u64::from(height),
            max_pixels,
        }
    }
}
