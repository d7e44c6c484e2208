use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// 1-based line and 1-based byte column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentKind {
    Line,
    Block,
}

/// One scanned comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentNode {
    pub kind: CommentKind,
    /// Full source text covered by the comment, fences included.
    pub raw: String,
    /// Text between the fences (block) or after the prefix (line).
    pub inner: String,
    /// The line prefix or block opener that started this comment.
    pub fence: String,
    /// Byte range, end exclusive.
    pub range: Range<usize>,
    pub start: Position,
    /// Position of the first byte after the comment.
    pub end: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Tag,
    #[serde(rename = "kv")]
    KeyValue,
    Yaml,
    Json,
}

impl AnnotationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationKind::Tag => "tag",
            AnnotationKind::KeyValue => "kv",
            AnnotationKind::Yaml => "yaml",
            AnnotationKind::Json => "json",
        }
    }
}

/// Where an annotation fragment was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Index of the comment (in scan order) the fragment belongs to.
    pub comment: usize,
    /// Byte offset of the owning comment.
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationItem {
    /// Stable id derived from location and content.
    pub id: String,
    pub kind: AnnotationKind,
    pub key: Option<String>,
    pub value: serde_json::Value,
    pub raw: String,
    pub location: SourceLocation,
}

impl AnnotationItem {
    /// `kind:key`, or just `kind` for keyless items.
    pub fn summary_key(&self) -> String {
        match &self.key {
            Some(key) => format!("{}:{}", self.kind.as_str(), key),
            None => self.kind.as_str().to_string(),
        }
    }
}

/// A fragment that looked like an annotation but could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationIssue {
    pub kind: AnnotationKind,
    pub message: String,
    pub location: SourceLocation,
}

/// Ordered annotations for one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationCatalog {
    pub items: Vec<AnnotationItem>,
    /// `kind:key` -> occurrence count, in first-seen order.
    pub summary: IndexMap<String, usize>,
    pub issues: Vec<AnnotationIssue>,
}

impl AnnotationCatalog {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn count(&self, summary_key: &str) -> usize {
        self.summary.get(summary_key).copied().unwrap_or(0)
    }
}
