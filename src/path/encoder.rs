//! Encoding of derivative URLs

use regex::Regex;

use super::options::TransformOptions;
use super::{basename, is_image_extension, split_extension, strip_query, PathError};
use crate::constants::TOKEN_QUERY_PARAM;
use crate::signing::Signer;

/// Builds derivative URLs for markup and for the `kagami url` command
#[derive(Debug, Clone, Default)]
pub struct UrlEncoder {
    ignore: Option<Regex>,
    url_prefix: Option<String>,
    signer: Signer,
}

impl UrlEncoder {
    pub fn new(ignore: Option<Regex>, url_prefix: Option<String>, signer: Signer) -> Self {
        Self {
            ignore,
            url_prefix: url_prefix.filter(|prefix| !prefix.is_empty()),
            signer,
        }
    }

    /// Whether the ignore pattern passes this path through untouched
    pub fn is_ignored(&self, path: &str) -> bool {
        self.ignore
            .as_ref()
            .map(|pattern| pattern.is_match(path))
            .unwrap_or(false)
    }

    /// Encode a source URL with target dimensions and options
    ///
    /// Ignored paths and requests without any dimension are returned
    /// unchanged. Dimensions are rounded to the nearest integer; an absent
    /// dimension is written as `_`.
    ///
    /// # Errors
    ///
    /// `PathError::InvalidInput` when the source is empty, lacks an image
    /// extension, a dimension rounds below 1, or an option cannot be encoded.
    pub fn encode(
        &self,
        source_url: &str,
        width: Option<f64>,
        height: Option<f64>,
        options: &TransformOptions,
    ) -> Result<String, PathError> {
        if source_url.is_empty() {
            return Err(PathError::invalid("source URL is empty"));
        }
        if self.is_ignored(strip_query(source_url)) {
            return Ok(source_url.to_string());
        }
        if width.is_none() && height.is_none() {
            return Ok(source_url.to_string());
        }

        let (path, query) = match source_url.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (source_url, None),
        };

        let (stem, ext) = split_extension(path)
            .filter(|(_, ext)| is_image_extension(ext))
            .ok_or_else(|| {
                PathError::invalid(format!("'{}' does not end in an image extension", path))
            })?;

        let suffix = format!(
            "-{}x{}{}",
            encode_dimension(width)?,
            encode_dimension(height)?,
            options.to_suffix()?
        );

        let mut encoded = self.apply_prefix(format!("{}{}.{}", stem, suffix, ext));
        if let Some(query) = query {
            encoded.push('?');
            encoded.push_str(query);
        }

        if let Some(token) = self.signer.sign(basename(&encoded)) {
            let separator = if encoded.contains('?') { '&' } else { '?' };
            encoded.push(separator);
            encoded.push_str(TOKEN_QUERY_PARAM);
            encoded.push('=');
            encoded.push_str(&token);
        }

        Ok(encoded)
    }

    fn apply_prefix(&self, path: String) -> String {
        let Some(prefix) = self.url_prefix.as_deref() else {
            return path;
        };
        if path.contains("://") {
            return path;
        }

        let prefix = prefix.trim_end_matches('/');
        let already_prefixed = path
            .strip_prefix(prefix)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false);
        if already_prefixed {
            path
        } else {
            format!("{}/{}", prefix, path.trim_start_matches('/'))
        }
    }
}

fn encode_dimension(value: Option<f64>) -> Result<String, PathError> {
    let Some(value) = value else {
        return Ok("_".to_string());
    };
    let rounded = value.round();
    if !rounded.is_finite() || rounded < 1.0 || rounded > f64::from(u32::MAX) {
        return Err(PathError::invalid(format!(
            "dimension {} is not a positive integer",
            value
        )));
    }
    Ok(format!("{}", rounded as u32))
}
