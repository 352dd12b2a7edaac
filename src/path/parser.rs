//! Decoding of derivative paths

use regex::Regex;
use std::sync::OnceLock;

use super::options::TransformOptions;
use super::{strip_query, TransformRequest};

/// The stem is greedy so the rightmost `-WxH` segment is the suffix:
/// `my-photo-300x200.jpg` has stem `my-photo`.
const DERIVATIVE_PATTERN: &str = r"^(?P<stem>.+)-(?P<width>[0-9]+|_)x(?P<height>[0-9]+|_)(?P<options>(?:-[A-Za-z][A-Za-z0-9]*(?:\([^()/?#\s]*\))?)*)\.(?P<ext>(?i:jpe?g|png|gif))$";

fn derivative_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(DERIVATIVE_PATTERN).expect("derivative pattern is valid"))
}

/// Decode a derivative path into a [`TransformRequest`]
///
/// Returns `None` when the path is not a derivative request: no suffix,
/// an unrecognized extension, a zero dimension, or both dimensions
/// unspecified (`_x_`). Any query string is ignored.
pub fn parse(request_path: &str) -> Option<TransformRequest> {
    let path = strip_query(request_path);
    let caps = derivative_regex().captures(path)?;

    let stem = caps.name("stem")?.as_str();
    if stem.ends_with('/') {
        return None;
    }

    let width = parse_dimension(caps.name("width")?.as_str())?;
    let height = parse_dimension(caps.name("height")?.as_str())?;
    if width.is_none() && height.is_none() {
        return None;
    }

    let options = TransformOptions::from_suffix(caps.name("options")?.as_str())?;
    let ext = caps.name("ext")?.as_str();

    Some(TransformRequest {
        source_path: format!("{}.{}", stem.trim_start_matches('/'), ext),
        width,
        height,
        options,
    })
}

/// `_` is unspecified; zero or overflowing values reject the whole path
fn parse_dimension(token: &str) -> Option<Option<u32>> {
    if token == "_" {
        return Some(None);
    }
    match token.parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(value) => Some(Some(value)),
    }
}
