//! Reference processor: decode → crop → resize → grayscale → encode

use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::io::Reader as ImageReader;
use image::DynamicImage;
use std::io::Cursor;
use std::num::NonZeroU32;

use super::encoder::EncoderFactory;
use super::error::ImageError;
use super::params::{ProcessParams, ResizeMode};
use super::ImageProcessor;
use crate::constants::DEFAULT_MAX_SOURCE_PIXELS;

/// Processor backed by `image` for codecs and `fast_image_resize` (Lanczos3)
#[derive(Debug, Clone)]
pub struct ResizeProcessor {
    /// Decoded pixel limit; 0 disables the check
    max_source_pixels: u64,
}

impl Default for ResizeProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SOURCE_PIXELS)
    }
}

impl ResizeProcessor {
    pub fn new(max_source_pixels: u64) -> Self {
        Self { max_source_pixels }
    }
}

impl ImageProcessor for ResizeProcessor {
    fn process(&self, source: &[u8], params: &ProcessParams) -> Result<Vec<u8>, ImageError> {
        // 1. Reject image bombs from the header, before allocating pixels
        let (src_width, src_height) = read_dimensions(source)?;
        if self.max_source_pixels > 0
            && u64::from(src_width) * u64::from(src_height) > self.max_source_pixels
        {
            return Err(ImageError::image_bomb(
                src_width,
                src_height,
                self.max_source_pixels,
            ));
        }

        // 2. Decode
        let img = decode_image(source)?;

        // 3. Crop the source window, then resize it
        let plan = plan(img.width(), img.height(), params);
        let mut img = match plan.crop {
            Some((x, y, width, height)) => img.crop_imm(x, y, width, height),
            None => img,
        };
        if plan.resize != (img.width(), img.height()) {
            img = resize_image(&img, plan.resize.0, plan.resize.1)?;
        }

        // 4. Color
        if params.grayscale {
            img = img.grayscale();
        }

        if params.interlace {
            tracing::debug!(
                format = params.format.as_str(),
                "Progressive output unavailable, encoding baseline"
            );
        }

        // 5. Encode to the request format
        EncoderFactory::create(params.format).encode(&img, params.quality)
    }
}

/// Source crop window `(x, y, width, height)` applied first, then the
/// resize target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Plan {
    pub crop: Option<(u32, u32, u32, u32)>,
    pub resize: (u32, u32),
}

/// Compute output geometry for a source of `src_w` x `src_h`
///
/// Without `upscale`, no axis is ever enlarged past the source. The resize
/// target never exceeds `max_width` x `max_height`.
pub(crate) fn plan(src_w: u32, src_h: u32, params: &ProcessParams) -> Plan {
    let (sw, sh) = (f64::from(src_w), f64::from(src_h));

    let plan = match (params.mode, params.width, params.height) {
        (ResizeMode::Stretch, width, height) => {
            let mut w = width
                .map(f64::from)
                .unwrap_or_else(|| height.map(|h| sw * f64::from(h) / sh).unwrap_or(sw));
            let mut h = height
                .map(f64::from)
                .unwrap_or_else(|| width.map(|w| sh * f64::from(w) / sw).unwrap_or(sh));
            if !params.upscale {
                w = w.min(sw);
                h = h.min(sh);
            }
            Plan {
                crop: None,
                resize: (to_pixels(w), to_pixels(h)),
            }
        }
        (ResizeMode::Crop { x, y }, Some(width), Some(height)) => {
            let mut scale = (f64::from(width) / sw).max(f64::from(height) / sh);
            if !params.upscale {
                scale = scale.min(1.0);
            }
            // Window and anchor offset in the scaled-to-cover space
            let covered = (to_pixels(sw * scale), to_pixels(sh * scale));
            let window = (width.min(covered.0), height.min(covered.1));
            let offset_x = u64::from(covered.0 - window.0) * u64::from(x) / 100;
            let offset_y = u64::from(covered.1 - window.1) * u64::from(y) / 100;

            // Mapped back onto the source
            let crop_x = ((offset_x as f64) / scale).round().min(sw - 1.0) as u32;
            let crop_y = ((offset_y as f64) / scale).round().min(sh - 1.0) as u32;
            let crop_w = to_pixels(f64::from(window.0) / scale).min(src_w - crop_x);
            let crop_h = to_pixels(f64::from(window.1) / scale).min(src_h - crop_y);
            Plan {
                crop: Some((crop_x, crop_y, crop_w, crop_h)),
                resize: window,
            }
        }
        // Fit, or crop with a single dimension (nothing to cover)
        (_, width, height) => {
            let scale_w = width.map(|w| f64::from(w) / sw);
            let scale_h = height.map(|h| f64::from(h) / sh);
            let mut scale = match (scale_w, scale_h) {
                (Some(a), Some(b)) => a.min(b),
                (Some(a), None) | (None, Some(a)) => a,
                (None, None) => 1.0,
            };
            if !params.upscale {
                scale = scale.min(1.0);
            }
            Plan {
                crop: None,
                resize: (to_pixels(sw * scale), to_pixels(sh * scale)),
            }
        }
    };

    bound(plan, params.max_width, params.max_height)
}

/// Shrink the resize target uniformly to fit the output bounds
fn bound(mut plan: Plan, max_width: u32, max_height: u32) -> Plan {
    let (width, height) = plan.resize;
    let (max_width, max_height) = (max_width.max(1), max_height.max(1));
    if width <= max_width && height <= max_height {
        return plan;
    }
    let factor = (f64::from(max_width) / f64::from(width))
        .min(f64::from(max_height) / f64::from(height));
    plan.resize = (
        to_pixels(f64::from(width) * factor).min(max_width),
        to_pixels(f64::from(height) * factor).min(max_height),
    );
    plan
}

fn to_pixels(value: f64) -> u32 {
    value.round().clamp(1.0, f64::from(u32::MAX)) as u32
}

fn read_dimensions(data: &[u8]) -> Result<(u32, u32), ImageError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImageError::decode_failed(e.to_string()))?
        .into_dimensions()
        .map_err(|e| ImageError::decode_failed(e.to_string()))
}

fn decode_image(data: &[u8]) -> Result<DynamicImage, ImageError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImageError::decode_failed(e.to_string()))?
        .decode()
        .map_err(|e| ImageError::decode_failed(e.to_string()))
}

/// Resize image using fast-image-resize with Lanczos3 filter
fn resize_image(
    img: &DynamicImage,
    target_w: u32,
    target_h: u32,
) -> Result<DynamicImage, ImageError> {
    let src_width =
        NonZeroU32::new(img.width()).ok_or_else(|| ImageError::resize_failed("Source width is 0"))?;
    let src_height = NonZeroU32::new(img.height())
        .ok_or_else(|| ImageError::resize_failed("Source height is 0"))?;
    let dst_width =
        NonZeroU32::new(target_w).ok_or_else(|| ImageError::resize_failed("Target width is 0"))?;
    let dst_height =
        NonZeroU32::new(target_h).ok_or_else(|| ImageError::resize_failed("Target height is 0"))?;

    let src_image = Image::from_vec_u8(
        src_width,
        src_height,
        img.to_rgba8().into_raw(),
        PixelType::U8x4,
    )
    .map_err(|e| ImageError::resize_failed(format!("Failed to create source image: {:?}", e)))?;

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);

    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));
    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| ImageError::resize_failed(format!("Resize operation failed: {:?}", e)))?;

    let rgba_image = image::RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| ImageError::resize_failed("Failed to create output image buffer"))?;

    Ok(DynamicImage::ImageRgba8(rgba_image))
}
