//! Derivative path encoding and decoding
//!
//! A derivative is addressed by its source path plus a suffix inserted
//! before the extension:
//!
//! ```text
//! <dir>/<basename>-<W>x<H>(-<option>(<args>)?)*.<ext>
//!
//! images/cat-300x200-resize.jpg      -> images/cat.jpg, 300x200, {resize}
//! images/cat-_x200.jpg               -> images/cat.jpg, height 200 only
//! images/my-cat-90x90-crop(10,0).png -> images/my-cat.png, 90x90, {crop: [10, 0]}
//! ```
//!
//! `_` stands for an unspecified dimension (preserve aspect). Option names
//! are alphanumeric and start with a letter; arguments are comma-separated.
//!
//! Decoding is a pure function ([`parse`]). Encoding depends on the ignore
//! pattern, URL prefix and signing key, so it lives on [`UrlEncoder`].

mod encoder;
mod options;
mod parser;
mod scope;

pub use encoder::UrlEncoder;
pub use options::{TransformOption, TransformOptions};
pub use parser::parse;
pub use scope::{relativize, Mount, ScopeMatch, ScopeRule};

use thiserror::Error;

/// Image extensions the grammar accepts (matched case-insensitively)
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// Path encoding/relativizing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No configured path matches '{0}'")]
    UnconfiguredPath(String),
}

impl PathError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        PathError::InvalidInput(message.into())
    }
}

/// A decoded derivative request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRequest {
    /// Source path relative to the mount's source root, no leading slash
    pub source_path: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub options: TransformOptions,
}

impl TransformRequest {
    pub fn new(source_path: impl Into<String>, width: Option<u32>, height: Option<u32>) -> Self {
        Self {
            source_path: source_path.into(),
            width,
            height,
            options: TransformOptions::new(),
        }
    }

    pub fn with_options(mut self, options: TransformOptions) -> Self {
        self.options = options;
        self
    }

    /// Extension of the source (and therefore of the derivative)
    pub fn extension(&self) -> Option<&str> {
        split_extension(&self.source_path).map(|(_, ext)| ext)
    }

    pub fn content_type(&self) -> Option<&'static str> {
        self.extension().and_then(content_type_for)
    }
}

/// Closed content-type lookup for the recognized image extensions
pub fn content_type_for(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

pub fn is_image_extension(extension: &str) -> bool {
    IMAGE_EXTENSIONS
        .iter()
        .any(|ext| ext.eq_ignore_ascii_case(extension))
}

/// Strip a query string or fragment
pub(crate) fn strip_query(path: &str) -> &str {
    match path.find(['?', '#']) {
        Some(idx) => &path[..idx],
        None => path,
    }
}

/// Final path component, query excluded
pub(crate) fn basename(path: &str) -> &str {
    let path = strip_query(path);
    path.rsplit('/').next().unwrap_or(path)
}

/// Split `dir/name.ext` into (`dir/name`, `ext`). The dot must belong to the
/// final component.
pub(crate) fn split_extension(path: &str) -> Option<(&str, &str)> {
    let (stem, ext) = path.rsplit_once('.')?;
    if ext.is_empty() || ext.contains('/') || stem.is_empty() || stem.ends_with('/') {
        return None;
    }
    Some((stem, ext))
}
