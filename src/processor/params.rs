//! Option-to-parameter resolution
//!
//! Maps the fixed option vocabulary of a [`TransformRequest`] onto concrete
//! processing parameters:
//!
//! ```text
//! (none)                 fit within WxH, preserve aspect
//! resize                 stretch to exactly WxH
//! crop | crop(x,y)       cover WxH then crop around anchor x%,y% (default 50,50)
//! upscale | upscale(0|1) allow enlarging past the source size
//! quality(N)             JPEG quality 1-100
//! interlace | interlace(0|1)
//! grayscale
//! ```

use std::str::FromStr;

use super::error::ImageError;
use crate::constants::{DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DIMENSION};
use crate::path::TransformRequest;

/// Output image format, always the request extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Gif,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ImageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "gif" => Ok(OutputFormat::Gif),
            _ => Err(ImageError::unsupported_format(s)),
        }
    }
}

/// How the source is mapped onto the target box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeMode {
    /// Scale to fit within the box, preserving aspect ratio
    #[default]
    Fit,
    /// Stretch to exactly the box (may distort)
    Stretch,
    /// Scale to cover the box, then crop around an anchor given in percent
    Crop { x: u8, y: u8 },
}

/// Configured defaults applied when a request does not say otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingDefaults {
    pub jpeg_quality: u8,
    pub interlace: bool,
    pub upscale: bool,
    /// Largest output width a request may ask for
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ProcessingDefaults {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            interlace: false,
            upscale: false,
            max_width: DEFAULT_MAX_DIMENSION,
            max_height: DEFAULT_MAX_DIMENSION,
        }
    }
}

/// Fully resolved parameters for one processor invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessParams {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub mode: ResizeMode,
    pub upscale: bool,
    pub quality: u8,
    pub interlace: bool,
    pub grayscale: bool,
    pub format: OutputFormat,
    /// Output bounds; the resize plan never exceeds them
    pub max_width: u32,
    pub max_height: u32,
}

impl ProcessParams {
    /// Resolve a decoded request against the configured defaults
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for unknown options, malformed arguments,
    /// conflicting modes or a dimension above the configured maximum; `InvalidQuality` for a quality outside 1-100;
    /// `UnsupportedFormat` when the request extension has no encoder.
    pub fn resolve(
        request: &TransformRequest,
        defaults: &ProcessingDefaults,
    ) -> Result<Self, ImageError> {
        let extension = request
            .extension()
            .ok_or_else(|| ImageError::unsupported_format(request.source_path.as_str()))?;
        check_dimension("width", request.width, defaults.max_width)?;
        check_dimension("height", request.height, defaults.max_height)?;

        let mut params = ProcessParams {
            width: request.width,
            height: request.height,
            mode: ResizeMode::Fit,
            upscale: defaults.upscale,
            quality: defaults.jpeg_quality,
            interlace: defaults.interlace,
            grayscale: false,
            format: extension.parse()?,
            max_width: defaults.max_width,
            max_height: defaults.max_height,
        };

        let mut mode_option: Option<&str> = None;
        for option in request.options.iter() {
            let name = option.name.as_str();
            let args = option.args.as_slice();
            match name {
                "resize" | "crop" => {
                    if let Some(previous) = mode_option {
                        return Err(ImageError::invalid_param(
                            name,
                            format!("conflicts with '{}'", previous),
                        ));
                    }
                    mode_option = Some(name);
                    params.mode = if name == "resize" {
                        expect_no_args(name, args)?;
                        ResizeMode::Stretch
                    } else {
                        parse_anchor(args)?
                    };
                }
                "upscale" => params.upscale = parse_flag(name, args)?,
                "interlace" => params.interlace = parse_flag(name, args)?,
                "grayscale" => {
                    expect_no_args(name, args)?;
                    params.grayscale = true;
                }
                "quality" => params.quality = parse_quality(args)?,
                _ => return Err(ImageError::invalid_param(name, "unknown option")),
            }
        }

        Ok(params)
    }
}

fn check_dimension(name: &str, value: Option<u32>, max: u32) -> Result<(), ImageError> {
    match value {
        Some(value) if value > max => Err(ImageError::invalid_param(
            name,
            format!("{} exceeds the maximum of {}", value, max),
        )),
        _ => Ok(()),
    }
}

fn expect_no_args(name: &str, args: &[String]) -> Result<(), ImageError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(ImageError::invalid_param(name, "takes no arguments"))
    }
}

fn parse_flag(name: &str, args: &[String]) -> Result<bool, ImageError> {
    match args {
        [] => Ok(true),
        [value] if value == "1" => Ok(true),
        [value] if value == "0" => Ok(false),
        _ => Err(ImageError::invalid_param(name, "expected no argument, 0 or 1")),
    }
}

fn parse_quality(args: &[String]) -> Result<u8, ImageError> {
    let [value] = args else {
        return Err(ImageError::invalid_param("quality", "expected one argument"));
    };
    let quality: u8 = value
        .parse()
        .map_err(|_| ImageError::invalid_param("quality", format!("'{}' is not 1-100", value)))?;
    if !(1..=100).contains(&quality) {
        return Err(ImageError::InvalidQuality { quality });
    }
    Ok(quality)
}

fn parse_anchor(args: &[String]) -> Result<ResizeMode, ImageError> {
    match args {
        [] => Ok(ResizeMode::Crop { x: 50, y: 50 }),
        [x, y] => Ok(ResizeMode::Crop {
            x: parse_percent(x)?,
            y: parse_percent(y)?,
        }),
        _ => Err(ImageError::invalid_param("crop", "expected no arguments or x,y")),
    }
}

fn parse_percent(value: &str) -> Result<u8, ImageError> {
    value
        .parse::<u8>()
        .ok()
        .filter(|percent| *percent <= 100)
        .ok_or_else(|| ImageError::invalid_param("crop", format!("'{}' is not 0-100", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{parse, TransformOptions};

    fn resolve(path: &str) -> Result<ProcessParams, ImageError> {
        let request = parse(path).expect("test path should parse");
        ProcessParams::resolve(&request, &ProcessingDefaults::default())
    }

    #[test]
    fn test_defaults_without_options() {
        let params = resolve("cat-300x200.jpg").unwrap();
        assert_eq!(params.width, Some(300));
        assert_eq!(params.height, Some(200));
        assert_eq!(params.mode, ResizeMode::Fit);
        assert_eq!(params.quality, DEFAULT_JPEG_QUALITY);
        assert!(!params.upscale);
        assert!(!params.interlace);
        assert!(!params.grayscale);
        assert_eq!(params.format, OutputFormat::Jpeg);
    }

    #[test]
    fn test_option_vocabulary() {
        let params =
            resolve("cat-300x200-crop(10,90)-quality(60)-upscale-interlace(1)-grayscale.PNG")
                .unwrap();
        assert_eq!(params.mode, ResizeMode::Crop { x: 10, y: 90 });
        assert_eq!(params.quality, 60);
        assert!(params.upscale);
        assert!(params.interlace);
        assert!(params.grayscale);
        assert_eq!(params.format, OutputFormat::Png);

        assert_eq!(resolve("cat-1x1-crop.gif").unwrap().mode, ResizeMode::Crop { x: 50, y: 50 });
        assert_eq!(resolve("cat-1x1-resize.jpg").unwrap().mode, ResizeMode::Stretch);
    }

    #[test]
    fn test_request_overrides_configured_flags() {
        let defaults = ProcessingDefaults {
            jpeg_quality: 70,
            interlace: true,
            upscale: true,
            ..ProcessingDefaults::default()
        };
        let request = parse("cat-10x10-upscale(0)-interlace(0).jpg").unwrap();
        let params = ProcessParams::resolve(&request, &defaults).unwrap();
        assert!(!params.upscale);
        assert!(!params.interlace);
        assert_eq!(params.quality, 70);
    }

    #[test]
    fn test_invalid_options() {
        for path in [
            "cat-10x10-sepia.jpg",
            "cat-10x10-crop(5).jpg",
            "cat-10x10-crop(5,101).jpg",
            "cat-10x10-resize(2).jpg",
            "cat-10x10-resize-crop.jpg",
            "cat-10x10-upscale(yes).jpg",
            "cat-10x10-quality.jpg",
            "cat-10x10-quality(abc).jpg",
        ] {
            assert!(
                matches!(resolve(path), Err(ImageError::InvalidParameter { .. })),
                "{} should be rejected",
                path
            );
        }
        assert_eq!(
            resolve("cat-10x10-quality(0).jpg"),
            Err(ImageError::InvalidQuality { quality: 0 })
        );
    }

    #[test]
    fn test_dimensions_above_maximum_are_rejected() {
        for path in [
            "a-60000x60000-upscale.jpg",
            "a-4000000000x_-upscale.jpg",
            "a-_x4097.png",
        ] {
            assert!(
                matches!(resolve(path), Err(ImageError::InvalidParameter { .. })),
                "{} should be rejected",
                path
            );
        }

        let params = resolve("a-4096x4096-upscale.jpg").unwrap();
        assert_eq!(params.max_width, DEFAULT_MAX_DIMENSION);

        let defaults = ProcessingDefaults {
            max_width: 100,
            max_height: 50,
            ..ProcessingDefaults::default()
        };
        let request = parse("a-100x51.jpg").unwrap();
        assert!(ProcessParams::resolve(&request, &defaults).is_err());
    }

    #[test]
    fn test_unsupported_extension() {
        let request = TransformRequest::new("cat.bmp", Some(10), None)
            .with_options(TransformOptions::new());
        let err = ProcessParams::resolve(&request, &ProcessingDefaults::default()).unwrap_err();
        assert!(matches!(err, ImageError::UnsupportedFormat { .. }));
    }
}
