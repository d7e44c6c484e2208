mod fenced;
mod tags;

pub use tags::DEFAULT_TAG_KEY_PATTERN;

use crate::error::ScanError;
use crate::normalize::normalize_line;
use crate::scanner::memory::scan_comments;
use fenced::{balanced_object_len, is_yaml_fence, parse_json, parse_yaml};
use serde_json::Value;
use smelter_api::{
    AnnotationCatalog, AnnotationIssue, AnnotationItem, AnnotationKind, CommentKind, CommentNode,
    CommentSyntax, SourceLocation,
};
use std::sync::Arc;
use tags::{KeyValueMatcher, TagMatcher};
use xxhash_rust::xxh3::Xxh3;

/// Caller hook that can reject an item; the message becomes an issue.
pub type ItemValidator = Arc<dyn Fn(&AnnotationItem) -> Result<(), String> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorConfig {
    pub tag_key_pattern: String,
    pub tags: bool,
    pub key_values: bool,
    pub yaml: bool,
    pub json: bool,
    /// Stripped from the start of each block-comment line; empty disables.
    pub continuation_marker: String,
    /// Treat consecutive line comments with the same prefix as one body.
    pub merge_line_comments: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            tag_key_pattern: DEFAULT_TAG_KEY_PATTERN.to_string(),
            tags: true,
            key_values: true,
            yaml: true,
            json: true,
            continuation_marker: "*".to_string(),
            merge_line_comments: true,
        }
    }
}

/// One line of a comment body, with where it came from.
struct BodyLine<'a> {
    text: &'a str,
    comment: usize,
    offset: usize,
    line: usize,
    column: usize,
}

impl BodyLine<'_> {
    fn location_at(&self, byte: usize) -> SourceLocation {
        SourceLocation {
            comment: self.comment,
            offset: self.offset,
            line: self.line,
            column: self.column + byte,
        }
    }

    fn leading_ws(&self) -> usize {
        self.text.len() - self.text.trim_start().len()
    }
}

/// Runs the sub-extractors over scanned comments.
pub struct AnnotationExtractor {
    config: ExtractorConfig,
    tags: TagMatcher,
    key_values: KeyValueMatcher,
    validator: Option<ItemValidator>,
}

impl AnnotationExtractor {
    pub fn new(config: ExtractorConfig) -> Result<Self, ScanError> {
        let tags = TagMatcher::new(&config.tag_key_pattern)?;
        Ok(Self {
            config,
            tags,
            key_values: KeyValueMatcher::new(),
            validator: None,
        })
    }

    pub fn with_validator(mut self, validator: ItemValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Scan `text` in memory and extract its annotations.
    pub fn extract(&self, text: &str, syntax: &CommentSyntax) -> AnnotationCatalog {
        self.extract_comments(&scan_comments(text, syntax))
    }

    /// Extract annotations from already scanned comments.
    pub fn extract_comments(&self, comments: &[CommentNode]) -> AnnotationCatalog {
        let mut catalog = AnnotationCatalog::default();
        for body in self.bodies(comments) {
            self.extract_body(&body, &mut catalog);
        }
        tracing::debug!(
            comments = comments.len(),
            items = catalog.items.len(),
            issues = catalog.issues.len(),
            "extracted annotations"
        );
        catalog
    }

    fn bodies<'a>(&self, comments: &'a [CommentNode]) -> Vec<Vec<BodyLine<'a>>> {
        let mut bodies: Vec<Vec<BodyLine<'a>>> = Vec::new();
        let mut previous: Option<&CommentNode> = None;

        for (idx, node) in comments.iter().enumerate() {
            match node.kind {
                CommentKind::Line => {
                    let line = BodyLine {
                        text: &node.inner,
                        comment: idx,
                        offset: node.range.start,
                        line: node.start.line,
                        column: node.raw.len() - node.inner.len() + 1,
                    };
                    let continues = self.config.merge_line_comments
                        && previous.is_some_and(|p| {
                            p.kind == CommentKind::Line
                                && p.fence == node.fence
                                && p.start.line + 1 == node.start.line
                        });
                    match bodies.last_mut() {
                        Some(body) if continues => body.push(line),
                        _ => bodies.push(vec![line]),
                    }
                }
                CommentKind::Block => {
                    let lines = node
                        .inner
                        .split('\n')
                        .enumerate()
                        .map(|(i, raw_line)| {
                            let raw_line = raw_line.strip_suffix('\r').unwrap_or(raw_line);
                            let text = normalize_line(raw_line, &self.config.continuation_marker);
                            let base = if i == 0 {
                                node.start.column + node.fence.len()
                            } else {
                                1
                            };
                            BodyLine {
                                text,
                                comment: idx,
                                offset: node.range.start,
                                line: node.start.line + i,
                                column: base + raw_line.len() - text.len(),
                            }
                        })
                        .collect();
                    bodies.push(lines);
                }
            }
            previous = Some(node);
        }
        bodies
    }

    fn extract_body(&self, lines: &[BodyLine<'_>], catalog: &mut AnnotationCatalog) {
        let mut i = 0;
        while i < lines.len() {
            let line = &lines[i];

            if self.config.yaml && is_yaml_fence(line.text) {
                let close = lines[i + 1..]
                    .iter()
                    .position(|l| is_yaml_fence(l.text))
                    .map(|rel| i + 1 + rel);
                let location = line.location_at(line.leading_ws());
                match close {
                    Some(close) => {
                        let doc = join(&lines[i + 1..close]);
                        match parse_yaml(&doc) {
                            Ok(Some(value)) => self.push(
                                catalog,
                                AnnotationKind::Yaml,
                                None,
                                value,
                                doc,
                                location,
                            ),
                            Ok(None) => {}
                            Err(message) => issue(catalog, AnnotationKind::Yaml, message, location),
                        }
                        i = close + 1;
                    }
                    None => {
                        issue(
                            catalog,
                            AnnotationKind::Yaml,
                            "unterminated YAML block".to_string(),
                            location,
                        );
                        i += 1;
                    }
                }
                continue;
            }

            if self.config.json && line.text.trim_start().starts_with('{') {
                let location = line.location_at(line.leading_ws());
                let rest = format!("{}\n{}", line.text.trim_start(), join(&lines[i + 1..]));
                match balanced_object_len(&rest) {
                    Some(len) => {
                        let raw = &rest[..len];
                        match parse_json(raw) {
                            Ok(value) => self.push(
                                catalog,
                                AnnotationKind::Json,
                                None,
                                value,
                                raw.to_string(),
                                location,
                            ),
                            Err(message) => issue(catalog, AnnotationKind::Json, message, location),
                        }
                        i += raw.matches('\n').count() + 1;
                    }
                    None => {
                        issue(
                            catalog,
                            AnnotationKind::Json,
                            "unbalanced JSON block".to_string(),
                            location,
                        );
                        i += 1;
                    }
                }
                continue;
            }

            if self.config.tags {
                let found = self.tags.scan(line.text);
                if !found.is_empty() {
                    for tag in found {
                        let value = if tag.value.is_empty() {
                            Value::Bool(true)
                        } else {
                            Value::String(tag.value)
                        };
                        self.push(
                            catalog,
                            AnnotationKind::Tag,
                            Some(tag.key),
                            value,
                            tag.raw,
                            line.location_at(tag.offset),
                        );
                    }
                    i += 1;
                    continue;
                }
            }

            if self.config.key_values
                && let Some((key, value)) = self.key_values.scan(line.text)
            {
                self.push(
                    catalog,
                    AnnotationKind::KeyValue,
                    Some(key),
                    Value::String(value),
                    line.text.trim().to_string(),
                    line.location_at(line.leading_ws()),
                );
            }
            i += 1;
        }
    }

    fn push(
        &self,
        catalog: &mut AnnotationCatalog,
        kind: AnnotationKind,
        key: Option<String>,
        value: Value,
        raw: String,
        location: SourceLocation,
    ) {
        let item = AnnotationItem {
            id: item_id(&location, kind, key.as_deref(), &raw),
            kind,
            key,
            value,
            raw,
            location,
        };
        if let Some(validator) = &self.validator
            && let Err(message) = validator(&item)
        {
            issue(catalog, kind, message, location);
            return;
        }
        *catalog.summary.entry(item.summary_key()).or_insert(0) += 1;
        catalog.items.push(item);
    }
}

fn issue(
    catalog: &mut AnnotationCatalog,
    kind: AnnotationKind,
    message: String,
    location: SourceLocation,
) {
    catalog.issues.push(AnnotationIssue {
        kind,
        message,
        location,
    });
}

fn join(lines: &[BodyLine<'_>]) -> String {
    lines.iter().map(|l| l.text).collect::<Vec<_>>().join("\n")
}

fn item_id(
    location: &SourceLocation,
    kind: AnnotationKind,
    key: Option<&str>,
    raw: &str,
) -> String {
    let mut hasher = Xxh3::new();
    hasher.update(&(location.offset as u64).to_le_bytes());
    hasher.update(&(location.line as u64).to_le_bytes());
    hasher.update(&(location.column as u64).to_le_bytes());
    hasher.update(kind.as_str().as_bytes());
    hasher.update(&[0]);
    hasher.update(key.unwrap_or_default().as_bytes());
    hasher.update(&[0]);
    hasher.update(raw.as_bytes());
    format!("{:016x}", hasher.digest())
}
