use crate::error::ScanError;
use regex::Regex;

pub const DEFAULT_TAG_KEY_PATTERN: &str = r"[A-Za-z_][\w.\-:]*";

/// A `@key value` fragment found on one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TagMatch {
    pub key: String,
    pub value: String,
    pub raw: String,
    /// Byte offset of `@` within the line.
    pub offset: usize,
}

pub(crate) struct TagMatcher {
    re: Regex,
}

impl TagMatcher {
    pub fn new(key_pattern: &str) -> Result<Self, ScanError> {
        let source = format!(r"(?:^|\s)@(?P<key>{key_pattern})");
        let re = Regex::new(&source).map_err(|source| ScanError::InvalidPattern {
            pattern: key_pattern.to_string(),
            source,
        })?;
        Ok(Self { re })
    }

    /// Every tag on `line`; a value runs until the next tag or end of line.
    pub fn scan(&self, line: &str) -> Vec<TagMatch> {
        let hits: Vec<(usize, usize, usize)> = self
            .re
            .captures_iter(line)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let key = caps.name("key")?;
                Some((whole.start(), key.start(), key.end()))
            })
            .collect();

        hits.iter()
            .enumerate()
            .map(|(i, &(_, key_start, key_end))| {
                let value_end = hits.get(i + 1).map(|h| h.0).unwrap_or(line.len());
                let at = key_start - 1;
                TagMatch {
                    key: line[key_start..key_end].to_string(),
                    value: line[key_end..value_end].trim().to_string(),
                    raw: line[at..value_end].trim_end().to_string(),
                    offset: at,
                }
            })
            .collect()
    }
}

pub(crate) struct KeyValueMatcher {
    re: Regex,
}

impl KeyValueMatcher {
    pub fn new() -> Self {
        let re = Regex::new(r"^\s*(?P<key>[A-Za-z_][\w.\-]*)\s*[:=]\s*(?P<value>.*?)\s*$")
            .expect("key/value pattern is a valid regex");
        Self { re }
    }

    /// `key: value` or `key = value`; empty values are not items.
    pub fn scan(&self, line: &str) -> Option<(String, String)> {
        let caps = self.re.captures(line)?;
        let value = caps.name("value")?.as_str();
        if value.is_empty() {
            return None;
        }
        Some((caps.name("key")?.as_str().to_string(), value.to_string()))
    }
}
