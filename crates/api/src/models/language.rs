use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Language identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Language(Cow<'static, str>);

impl Language {
    pub const SQL: Language = Language(Cow::Borrowed("sql"));
    pub const TYPESCRIPT: Language = Language(Cow::Borrowed("typescript"));
    pub const JAVASCRIPT: Language = Language(Cow::Borrowed("javascript"));
    pub const PYTHON: Language = Language(Cow::Borrowed("python"));
    pub const SHELL: Language = Language(Cow::Borrowed("shell"));
    pub const RUST: Language = Language(Cow::Borrowed("rust"));
    pub const HTML: Language = Language(Cow::Borrowed("html"));
    pub const MARKDOWN: Language = Language(Cow::Borrowed("markdown"));
    pub const CSS: Language = Language(Cow::Borrowed("css"));
    pub const YAML: Language = Language(Cow::Borrowed("yaml"));
    pub const TOML: Language = Language(Cow::Borrowed("toml"));
    pub const JSON: Language = Language(Cow::Borrowed("json"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Language {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl From<String> for Language {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for Language {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// A block comment fence pair, e.g. `/*` ... `*/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSyntax {
    pub open: String,
    pub close: String,
    #[serde(default)]
    pub nested: bool,
}

impl BlockSyntax {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
            nested: false,
        }
    }

    pub fn nested(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }
}

/// Comment syntax declared by a language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentSyntax {
    #[serde(default)]
    pub line: Vec<String>,
    #[serde(default)]
    pub block: Vec<BlockSyntax>,
}

impl CommentSyntax {
    pub fn is_empty(&self) -> bool {
        self.line.is_empty() && self.block.is_empty()
    }

    /// Line prefixes ordered longest first so `---` is tried before `--`.
    pub fn line_prefixes_longest_first(&self) -> Vec<&str> {
        let mut prefixes: Vec<&str> = self
            .line
            .iter()
            .map(String::as_str)
            .filter(|p| !p.is_empty())
            .collect();
        prefixes.sort_by(|a, b| b.len().cmp(&a.len()));
        prefixes
    }
}

/// Immutable description of a language: comment syntax plus the
/// extensions and shebang interpreters that select it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSpec {
    pub name: Language,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub shebangs: Vec<String>,
    #[serde(default)]
    pub comments: CommentSyntax,
}

impl LanguageSpec {
    pub fn new(name: impl Into<Language>) -> Self {
        Self {
            name: name.into(),
            extensions: Vec::new(),
            shebangs: Vec::new(),
            comments: CommentSyntax::default(),
        }
    }

    pub fn with_extensions(mut self, exts: &[&str]) -> Self {
        self.extensions
            .extend(exts.iter().map(|e| e.trim_start_matches('.').to_lowercase()));
        self
    }

    pub fn with_shebangs(mut self, interpreters: &[&str]) -> Self {
        self.shebangs
            .extend(interpreters.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_line_comment(mut self, prefix: &str) -> Self {
        self.comments.line.push(prefix.to_string());
        self
    }

    pub fn with_block_comment(mut self, block: BlockSyntax) -> Self {
        self.comments.block.push(block);
        self
    }

    pub fn matches_extension(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.');
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    pub fn matches_interpreter(&self, interpreter: &str) -> bool {
        self.shebangs.iter().any(|s| s == interpreter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_sorted_longest_first() {
        let syntax = CommentSyntax {
            line: vec!["-".into(), "---".into(), "--".into()],
            block: vec![],
        };
        assert_eq!(syntax.line_prefixes_longest_first(), vec!["---", "--", "-"]);
    }

    #[test]
    fn test_extension_matching_ignores_dot_and_case() {
        let spec = LanguageSpec::new("sql").with_extensions(&[".sql"]);
        assert!(spec.matches_extension("SQL"));
        assert!(spec.matches_extension(".sql"));
        assert!(!spec.matches_extension("psql"));
    }
}
