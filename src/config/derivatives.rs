//! Derivative addressing and cache configuration types.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::constants::{
    DEFAULT_DERIVATIVE_DIR, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DERIVATIVES, DEFAULT_MAX_DIMENSION,
    DEFAULT_MAX_SOURCE_PIXELS, DEFAULT_PROCESSING_TIMEOUT_SECS,
};

fn default_max_derivatives() -> usize {
    DEFAULT_MAX_DERIVATIVES
}

fn default_processing_timeout_secs() -> u64 {
    DEFAULT_PROCESSING_TIMEOUT_SECS
}

fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

fn default_max_dimension() -> u32 {
    DEFAULT_MAX_DIMENSION
}

fn default_max_source_pixels() -> u64 {
    DEFAULT_MAX_SOURCE_PIXELS
}

/// One croppable URL subtree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathConfig {
    /// Regex over the request path; the first capture group is the
    /// path relative to `source_root`
    pub pattern: String,
    pub source_root: String,
    /// Defaults to `<source_root>/_derivatives`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivative_root: Option<String>,
}

impl PathConfig {
    pub fn derivative_root(&self) -> String {
        match &self.derivative_root {
            Some(root) => root.clone(),
            None => {
                let source = self.source_root.trim_matches('/');
                if source.is_empty() {
                    DEFAULT_DERIVATIVE_DIR.to_string()
                } else {
                    format!("{}/{}", source, DEFAULT_DERIVATIVE_DIR)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivativesConfig {
    #[serde(alias = "path")]
    pub paths: Vec<PathConfig>,
    /// Sources matching this regex are never transformed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<String>,
    /// 0 disables the cap
    #[serde(default = "default_max_derivatives", alias = "max_crops")]
    pub max_derivatives: usize,
    #[serde(default = "default_processing_timeout_secs")]
    pub processing_timeout_secs: u64,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default)]
    pub interlace: bool,
    #[serde(default)]
    pub upscale: bool,
    #[serde(default = "default_max_source_pixels")]
    pub max_source_pixels: u64,
    /// Largest width a request may ask for, upscaled or not
    #[serde(default = "default_max_dimension")]
    pub max_width: u32,
    #[serde(default = "default_max_dimension")]
    pub max_height: u32,
}

impl DerivativesConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.paths.is_empty() {
            return Err("derivatives.paths must contain at least one entry".to_string());
        }

        let mut seen_patterns = HashSet::new();
        let mut prefixes: Vec<(&str, String)> = Vec::new();
        for path in &self.paths {
            let regex = Regex::new(&path.pattern)
                .map_err(|e| format!("Invalid path pattern '{}': {}", path.pattern, e))?;
            if regex.captures_len() < 2 {
                return Err(format!(
                    "Path pattern '{}' must have a capture group for the relative path",
                    path.pattern
                ));
            }
            if !seen_patterns.insert(path.pattern.as_str()) {
                return Err(format!("Duplicate path pattern '{}'", path.pattern));
            }

            let prefix = literal_prefix(&path.pattern);
            if let Some((other, _)) = prefixes
                .iter()
                .find(|(_, existing)| existing.starts_with(&prefix) || prefix.starts_with(existing))
            {
                return Err(format!(
                    "Path patterns '{}' and '{}' overlap",
                    other, path.pattern
                ));
            }
            prefixes.push((path.pattern.as_str(), prefix));
        }

        if let Some(ignore) = &self.ignore {
            Regex::new(ignore).map_err(|e| format!("Invalid ignore pattern '{}': {}", ignore, e))?;
        }

        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(format!(
                "derivatives.jpeg_quality must be 1-100, got {}",
                self.jpeg_quality
            ));
        }

        if self.max_width == 0 || self.max_height == 0 {
            return Err("derivatives.max_width and max_height must be greater than 0".to_string());
        }

        if self.processing_timeout_secs == 0 {
            return Err("derivatives.processing_timeout_secs must be greater than 0".to_string());
        }

        Ok(())
    }
}

/// Literal text every match of an anchored pattern starts with
///
/// Unanchored patterns can match anywhere, so their prefix is empty and
/// they overlap with every other pattern.
pub(crate) fn literal_prefix(pattern: &str) -> String {
    let Some(rest) = pattern.strip_prefix('^') else {
        return String::new();
    };

    let mut prefix = String::new();
    let mut chars = rest.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) if !escaped.is_ascii_alphanumeric() => prefix.push(escaped),
                _ => break,
            },
            // The preceding literal is optional or repeated
            '?' | '*' | '{' => {
                prefix.pop();
                break;
            }
            '+' | '.' | '(' | ')' | '[' | ']' | '|' | '$' | '^' => break,
            _ => prefix.push(c),
        }
    }
    // An alternation anywhere makes the prefix unreliable
    if rest.contains('|') {
        return String::new();
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(patterns: &[&str]) -> DerivativesConfig {
        let yaml = format!(
            "paths:\n{}",
            patterns
                .iter()
                .map(|p| format!("  - pattern: '{}'\n    source_root: uploads\n", p))
                .collect::<String>()
        );
        serde_yaml::from_str(&yaml).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = config(&["^/media/(.+)$"]);
        assert_eq!(config.max_derivatives, DEFAULT_MAX_DERIVATIVES);
        assert_eq!(config.jpeg_quality, DEFAULT_JPEG_QUALITY);
        assert_eq!(config.processing_timeout_secs, DEFAULT_PROCESSING_TIMEOUT_SECS);
        assert!(!config.interlace);
        assert!(!config.upscale);
        assert_eq!((config.max_width, config.max_height), (DEFAULT_MAX_DIMENSION, DEFAULT_MAX_DIMENSION));
        assert_eq!(config.paths[0].derivative_root(), "uploads/_derivatives");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_crops_alias() {
        let yaml = "paths: []\nmax_crops: 7\n";
        let config: DerivativesConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_derivatives, 7);
    }

    #[test]
    fn test_literal_prefix() {
        assert_eq!(literal_prefix(r"^/media/(.+)$"), "/media/");
        assert_eq!(literal_prefix(r"^/media/thumbs/(.+)$"), "/media/thumbs/");
        assert_eq!(literal_prefix(r"^/a\.b/(.*)"), "/a.b/");
        assert_eq!(literal_prefix(r"^/static\d/(.*)"), "/static");
        assert_eq!(literal_prefix(r"^/photos?/(.*)"), "/photo");
        assert_eq!(literal_prefix(r"/media/(.+)"), "");
        assert_eq!(literal_prefix(r"^/(a|b)/(.+)"), "");
    }

    #[test]
    fn test_rejects_overlapping_patterns() {
        let err = config(&["^/media/(.+)$", "^/media/thumbs/(.+)$"])
            .validate()
            .unwrap_err();
        assert!(err.contains("overlap"), "{}", err);

        assert!(config(&["^/media/(.+)$", "^/assets/(.+)$"]).validate().is_ok());
        assert!(config(&["(.+)", "^/assets/(.+)$"]).validate().is_err());
    }

    #[test]
    fn test_rejects_bad_patterns() {
        assert!(config(&["^/media/(.+"]).validate().is_err());
        let err = config(&["^/media/.+$"]).validate().unwrap_err();
        assert!(err.contains("capture group"));
        let err = config(&["^/a/(.+)$", "^/a/(.+)$"]).validate().unwrap_err();
        assert!(err.contains("Duplicate"));
    }

    #[test]
    fn test_rejects_bad_scalars() {
        let mut cfg = config(&["^/media/(.+)$"]);
        cfg.jpeg_quality = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = config(&["^/media/(.+)$"]);
        cfg.processing_timeout_secs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = config(&["^/media/(.+)$"]);
        cfg.max_height = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = config(&["^/media/(.+)$"]);
        cfg.ignore = Some("(".to_string());
        assert!(cfg.validate().is_err());

        let cfg: DerivativesConfig = serde_yaml::from_str("paths: []").unwrap();
        assert!(cfg.validate().is_err());
    }
}
