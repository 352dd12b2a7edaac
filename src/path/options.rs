//! Ordered transformation options
//!
//! Options keep the order in which they appear in the encoded path so that
//! encoding a decoded request reproduces the same suffix.

use std::fmt;
use std::str::FromStr;

use super::PathError;

/// A single named option with zero or more arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOption {
    pub name: String,
    pub args: Vec<String>,
}

impl TransformOption {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    fn validate(&self) -> Result<(), PathError> {
        if !is_valid_name(&self.name) {
            return Err(PathError::invalid(format!(
                "option name '{}' must be alphanumeric and start with a letter",
                self.name
            )));
        }
        if let Some(arg) = self.args.iter().find(|arg| !is_valid_arg(arg)) {
            return Err(PathError::invalid(format!(
                "argument '{}' of option '{}' contains a reserved character",
                arg, self.name
            )));
        }
        Ok(())
    }
}

impl fmt::Display for TransformOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.args.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}({})", self.name, self.args.join(","))
        }
    }
}

/// Parses a single segment such as `crop(10,20)` or `resize`
impl FromStr for TransformOption {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let option = match s.split_once('(') {
            Some((name, rest)) => {
                let inner = rest.strip_suffix(')').ok_or_else(|| {
                    PathError::invalid(format!("unbalanced parentheses in '{}'", s))
                })?;
                let args = if inner.is_empty() {
                    Vec::new()
                } else {
                    inner.split(',').map(str::to_string).collect()
                };
                TransformOption::new(name, args)
            }
            None => TransformOption::new(s, Vec::new()),
        };
        option.validate()?;
        Ok(option)
    }
}

/// Ordered mapping from option name to its arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOptions {
    entries: Vec<TransformOption>,
}

impl TransformOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with<S: Into<String>>(mut self, name: impl Into<String>, args: Vec<S>) -> Self {
        self.insert(name, args.into_iter().map(Into::into).collect());
        self
    }

    /// Insert an option. Re-inserting a name replaces its arguments but
    /// keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, args: Vec<String>) {
        let name = name.into();
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.args = args,
            None => self.entries.push(TransformOption { name, args }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.args.as_slice())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransformOption> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encoded suffix segments, each with its leading `-`
    pub(crate) fn to_suffix(&self) -> Result<String, PathError> {
        let mut suffix = String::new();
        for option in &self.entries {
            option.validate()?;
            suffix.push('-');
            suffix.push_str(&option.to_string());
        }
        Ok(suffix)
    }

    /// Decode the options part of an encoded path (`-a-b(1,2)`).
    /// Returns `None` when a segment is malformed.
    pub(crate) fn from_suffix(suffix: &str) -> Option<Self> {
        let mut options = TransformOptions::new();
        let body = match suffix.strip_prefix('-') {
            Some(body) => body,
            None if suffix.is_empty() => return Some(options),
            None => return None,
        };
        for segment in split_top_level(body) {
            let option: TransformOption = segment.parse().ok()?;
            options.insert(option.name, option.args);
        }
        Some(options)
    }
}

impl<N: Into<String>> FromIterator<(N, Vec<String>)> for TransformOptions {
    fn from_iter<I: IntoIterator<Item = (N, Vec<String>)>>(iter: I) -> Self {
        let mut options = TransformOptions::new();
        for (name, args) in iter {
            options.insert(name, args);
        }
        options
    }
}

/// Split on `-` outside parentheses
fn split_top_level(s: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            '-' if depth == 0 => {
                segments.push(&s[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    segments.push(&s[start..]);
    segments
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric())
}

fn is_valid_arg(arg: &str) -> bool {
    !arg.is_empty()
        && !arg
            .chars()
            .any(|c| matches!(c, '(' | ')' | ',' | '/' | '?' | '#') || c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_order() {
        let mut options = TransformOptions::new();
        options.insert("crop", vec![]);
        options.insert("quality", vec!["80".to_string()]);
        options.insert("crop", vec!["10".to_string(), "20".to_string()]);

        let names: Vec<&str> = options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["crop", "quality"]);
        assert_eq!(
            options.get("crop"),
            Some(&["10".to_string(), "20".to_string()][..])
        );
    }

    #[test]
    fn test_to_suffix() {
        let options = TransformOptions::new()
            .with("resize", Vec::<String>::new())
            .with("crop", vec!["10", "20"]);
        assert_eq!(options.to_suffix().unwrap(), "-resize-crop(10,20)");
    }

    #[test]
    fn test_to_suffix_rejects_bad_names() {
        let options = TransformOptions::new().with("300x200", Vec::<String>::new());
        assert!(matches!(
            options.to_suffix(),
            Err(PathError::InvalidInput(_))
        ));

        let options = TransformOptions::new().with("crop", vec!["1)"]);
        assert!(options.to_suffix().is_err());
    }

    #[test]
    fn test_from_suffix_splits_outside_parentheses() {
        let options = TransformOptions::from_suffix("-crop(-5,10)-grayscale").unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(
            options.get("crop"),
            Some(&["-5".to_string(), "10".to_string()][..])
        );
        assert!(options.contains("grayscale"));
    }

    #[test]
    fn test_from_suffix_empty() {
        assert_eq!(TransformOptions::from_suffix(""), Some(TransformOptions::new()));
        assert_eq!(TransformOptions::from_suffix("resize"), None);
    }

    #[test]
    fn test_option_from_str() {
        let option: TransformOption = "quality(70)".parse().unwrap();
        assert_eq!(option.name, "quality");
        assert_eq!(option.args, vec!["70".to_string()]);

        let bare: TransformOption = "upscale".parse().unwrap();
        assert!(bare.args.is_empty());

        assert!("quality(70".parse::<TransformOption>().is_err());
        assert!("9lives".parse::<TransformOption>().is_err());
    }
}
