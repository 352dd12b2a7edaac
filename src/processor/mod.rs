//! Image Processor collaborator
//!
//! The cache manager calls processors on the blocking pool, so the trait is
//! synchronous. [`ResizeProcessor`] is the reference implementation.

mod encoder;
mod error;
mod params;
mod resize;

pub use encoder::{EncoderFactory, FormatEncoder};
pub use error::ImageError;
pub use params::{OutputFormat, ProcessParams, ProcessingDefaults, ResizeMode};
pub use resize::ResizeProcessor;

/// Pixel transformation from source bytes to derivative bytes
pub trait ImageProcessor: Send + Sync {
    fn process(&self, source: &[u8], params: &ProcessParams) -> Result<Vec<u8>, ImageError>;
}
