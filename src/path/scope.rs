//! Scope rules mapping public URLs to storage-relative paths

use regex::Regex;

use super::{strip_query, PathError};

/// Source and derivative roots bound for one scope
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mount {
    source_root: String,
    derivative_root: String,
}

impl Mount {
    pub fn new(source_root: impl Into<String>, derivative_root: impl Into<String>) -> Self {
        Self {
            source_root: trim_root(source_root.into()),
            derivative_root: trim_root(derivative_root.into()),
        }
    }

    pub fn source_root(&self) -> &str {
        &self.source_root
    }

    pub fn derivative_root(&self) -> &str {
        &self.derivative_root
    }

    /// Store key of a source file
    pub fn source_key(&self, relative: &str) -> String {
        join_key(&self.source_root, relative)
    }

    /// Store key of a derivative; the derivative tree mirrors the source tree
    pub fn derivative_key(&self, relative: &str) -> String {
        join_key(&self.derivative_root, relative)
    }
}

fn trim_root(root: String) -> String {
    root.trim_matches('/').to_string()
}

fn join_key(root: &str, relative: &str) -> String {
    let relative = relative.trim_start_matches('/');
    if root.is_empty() {
        relative.to_string()
    } else {
        format!("{}/{}", root, relative)
    }
}

/// A croppable URL subtree: a pattern whose first capture group yields the
/// path relative to `source_root`
#[derive(Debug, Clone)]
pub struct ScopeRule {
    pattern: Regex,
    source_root: String,
    derivative_root: String,
}

impl ScopeRule {
    pub fn new(
        pattern: Regex,
        source_root: impl Into<String>,
        derivative_root: impl Into<String>,
    ) -> Self {
        Self {
            pattern,
            source_root: source_root.into(),
            derivative_root: derivative_root.into(),
        }
    }

    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub fn source_root(&self) -> &str {
        &self.source_root
    }

    pub fn derivative_root(&self) -> &str {
        &self.derivative_root
    }

    fn capture<'p>(&self, path: &'p str) -> Option<&'p str> {
        let caps = self.pattern.captures(path)?;
        caps.iter().skip(1).flatten().next().map(|m| m.as_str())
    }
}

/// Result of relativizing a URL against the scope rules
#[derive(Debug, Clone)]
pub struct ScopeMatch<'a> {
    /// Path relative to the rule's roots, no leading slash
    pub relative_path: String,
    pub rule: &'a ScopeRule,
}

/// Strip the configured root of a URL or path
///
/// Rules are evaluated in order and the first match wins. Scheme, host and
/// query are removed before matching.
///
/// # Errors
///
/// `PathError::UnconfiguredPath` when no rule matches.
pub fn relativize<'a>(
    url_or_path: &str,
    rules: &'a [ScopeRule],
) -> Result<ScopeMatch<'a>, PathError> {
    let path = strip_origin(url_or_path);
    rules
        .iter()
        .find_map(|rule| {
            rule.capture(path).map(|relative| ScopeMatch {
                relative_path: relative.trim_start_matches('/').to_string(),
                rule,
            })
        })
        .ok_or_else(|| PathError::UnconfiguredPath(url_or_path.to_string()))
}

fn strip_origin(url: &str) -> &str {
    let url = strip_query(url);
    match url.find("://") {
        Some(idx) => {
            let rest = &url[idx + 3..];
            rest.find('/').map(|slash| &rest[slash..]).unwrap_or("/")
        }
        None => url,
    }
}
