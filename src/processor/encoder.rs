//! Output encoders
//!
//! One encoder per output format. JPEG is lossy and honours the quality
//! setting; PNG and GIF ignore it.

use image::codecs::gif::GifEncoder as ImageGifEncoder;
use image::codecs::jpeg::JpegEncoder as ImageJpegEncoder;
use image::codecs::png::PngEncoder as ImagePngEncoder;
use image::{ColorType, DynamicImage, ImageEncoder as _};
use std::io::Cursor;

use super::error::ImageError;
use super::params::OutputFormat;

/// Encodes a processed image into one output format
pub trait FormatEncoder: Send + Sync {
    /// The output format this encoder produces
    fn format(&self) -> OutputFormat;

    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError>;
}

pub struct JpegEncoder;

impl FormatEncoder for JpegEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Jpeg
    }

    fn encode(&self, image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
        let mut output = Cursor::new(Vec::new());
        let encoder = ImageJpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100));

        // JPEG has no alpha channel
        let result = if image.color().has_color() {
            let rgb = image.to_rgb8();
            encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
        } else {
            let luma = image.to_luma8();
            encoder.write_image(luma.as_raw(), luma.width(), luma.height(), ColorType::L8)
        };
        result.map_err(|e| ImageError::encode_failed("jpeg", e.to_string()))?;

        Ok(output.into_inner())
    }
}

pub struct PngEncoder;

impl FormatEncoder for PngEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Png
    }

    fn encode(&self, image: &DynamicImage, _quality: u8) -> Result<Vec<u8>, ImageError> {
        let mut output = Cursor::new(Vec::new());
        let encoder = ImagePngEncoder::new(&mut output);

        let result = if image.color().has_color() {
            let rgba = image.to_rgba8();
            encoder.write_image(rgba.as_raw(), rgba.width(), rgba.height(), ColorType::Rgba8)
        } else {
            let luma = image.to_luma_alpha8();
            encoder.write_image(luma.as_raw(), luma.width(), luma.height(), ColorType::La8)
        };
        result.map_err(|e| ImageError::encode_failed("png", e.to_string()))?;

        Ok(output.into_inner())
    }
}

/// Single-frame GIF; animated sources keep their first frame
pub struct GifEncoder;

impl FormatEncoder for GifEncoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Gif
    }

    fn encode(&self, image: &DynamicImage, _quality: u8) -> Result<Vec<u8>, ImageError> {
        let rgba = image.to_rgba8();
        let mut output = Vec::new();
        {
            let mut encoder = ImageGifEncoder::new(&mut output);
            encoder
                .encode(rgba.as_raw(), rgba.width(), rgba.height(), ColorType::Rgba8)
                .map_err(|e| ImageError::encode_failed("gif", e.to_string()))?;
        }
        Ok(output)
    }
}

/// Factory for creating encoders based on output format
pub struct EncoderFactory;

impl EncoderFactory {
    pub fn create(format: OutputFormat) -> Box<dyn FormatEncoder> {
        match format {
            OutputFormat::Jpeg => Box::new(JpegEncoder),
            OutputFormat::Png => Box::new(PngEncoder),
            OutputFormat::Gif => Box::new(GifEncoder),
        }
    }
}
