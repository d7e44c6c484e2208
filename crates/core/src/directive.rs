//! Block-scoped include directives.
//!
//! ```text
//! -- #include users --file partials/users.sql
//! ...replaced on every run...
//! -- #includeEnd users
//! ```

use crate::config::IncludeConfig;
use crate::content::{self, ContentError};
use crate::events::{DirectiveMaterialized, Event, EventBus};
use crate::languages::LanguageRegistry;
use async_trait::async_trait;
use smelter_api::{LanguageSpec, Resource};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("line {line}: cannot parse directive arguments `{text}`")]
    BadArguments { line: usize, text: String },
    #[error("line {line}: block `{block}` has no --file argument")]
    MissingFile { line: usize, block: String },
    #[error("line {line}: block `{block}` is never closed")]
    Unclosed { line: usize, block: String },
    #[error("line {line}: rendering block `{block}` failed: {message}")]
    Render {
        line: usize,
        block: String,
        message: String,
    },
}

/// A matched open/close pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    pub block: String,
    pub file: PathBuf,
    /// Every argument after the block name, as tokenized.
    pub args: Vec<String>,
    /// The marker lines, verbatim and without line terminators.
    pub open_line: String,
    pub close_line: String,
    /// 1-based lines of the markers.
    pub start_line: usize,
    pub end_line: usize,
}

#[async_trait]
pub trait IncludeRenderer: Send + Sync {
    /// Text that replaces the whole directive span, markers included.
    async fn render(&self, directive: &IncludeDirective, source: &Path) -> Result<String, String>;
}

/// Inlines the target file between the original markers, so expanding an
/// already expanded file is stable.
pub struct FileIncludeRenderer;

#[async_trait]
impl IncludeRenderer for FileIncludeRenderer {
    async fn render(&self, directive: &IncludeDirective, source: &Path) -> Result<String, String> {
        let target = match source.parent() {
            Some(dir) if directive.file.is_relative() => dir.join(&directive.file),
            _ => directive.file.clone(),
        };
        let body = content::read_text(&target).await.map_err(|e| e.to_string())?;
        let separator = if body.is_empty() || body.ends_with('\n') {
            ""
        } else {
            "\n"
        };
        Ok(format!(
            "{}\n{}{}{}",
            directive.open_line, body, separator, directive.close_line
        ))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IncludeExpansion {
    pub text: String,
    pub changed: bool,
    /// Opening markers seen, expanded or not.
    pub markers: usize,
    pub expanded: usize,
    pub errors: Vec<DirectiveError>,
}

/// Marker syntax for one comment prefix.
struct Markers<'a> {
    prefix: &'a str,
    open: &'a str,
    close: &'a str,
}

impl Markers<'_> {
    fn token_rest<'l>(&self, line: &'l str, token: &str) -> Option<&'l str> {
        let rest = line.trim_start().strip_prefix(self.prefix)?.trim_start();
        let rest = rest.strip_prefix(token)?;
        // `#includeEnd` must not read as `#include` + `End`
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            Some(rest.trim())
        } else {
            None
        }
    }

    fn open<'l>(&self, line: &'l str) -> Option<&'l str> {
        self.token_rest(line, self.open)
    }

    fn close<'l>(&self, line: &'l str) -> Option<&'l str> {
        self.token_rest(line, self.close)
    }
}

fn content_of(line: &str) -> &str {
    line.trim_end_matches('\n').trim_end_matches('\r')
}

fn parse_open(rest: &str, line: usize) -> Result<(String, PathBuf, Vec<String>), DirectiveError> {
    let bad = || DirectiveError::BadArguments {
        line,
        text: rest.to_string(),
    };
    let mut tokens = shlex::split(rest).ok_or_else(bad)?.into_iter();
    let block = tokens.next().ok_or_else(bad)?;
    let args: Vec<String> = tokens.collect();

    let mut file = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--file" {
            file = iter.next().cloned();
        } else if let Some(value) = arg.strip_prefix("--file=") {
            file = Some(value.to_string());
        }
    }
    match file {
        Some(file) if !file.is_empty() => Ok((block, PathBuf::from(file), args)),
        _ => Err(DirectiveError::MissingFile { line, block }),
    }
}

/// Replace every complete directive span in `text` with rendered content.
/// Failures are scoped to their block, which is left as it was.
pub async fn expand_includes(
    text: &str,
    source: &Path,
    prefix: &str,
    config: &IncludeConfig,
    renderer: &dyn IncludeRenderer,
) -> IncludeExpansion {
    let markers = Markers {
        prefix,
        open: &config.open_token,
        close: &config.close_token,
    };
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut out = String::with_capacity(text.len());
    let mut expansion = IncludeExpansion::default();

    let mut i = 0;
    while i < lines.len() {
        let open_line = content_of(lines[i]);
        let Some(rest) = markers.open(open_line) else {
            out.push_str(lines[i]);
            i += 1;
            continue;
        };
        expansion.markers += 1;
        let line_no = i + 1;

        let parsed = parse_open(rest, line_no);
        let block_name = match &parsed {
            Ok((block, ..)) => Some(block.clone()),
            Err(DirectiveError::MissingFile { block, .. }) => Some(block.clone()),
            Err(_) => None,
        };
        let close = block_name.as_ref().and_then(|block| {
            lines[i + 1..]
                .iter()
                .position(|l| markers.close(content_of(l)) == Some(block.as_str()))
                .map(|rel| i + 1 + rel)
        });

        let (block, file, args) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                expansion.errors.push(e);
                let end = close.unwrap_or(i);
                lines[i..=end].iter().for_each(|l| out.push_str(l));
                i = end + 1;
                continue;
            }
        };
        let Some(j) = close else {
            expansion.errors.push(DirectiveError::Unclosed {
                line: line_no,
                block,
            });
            out.push_str(lines[i]);
            i += 1;
            continue;
        };

        let close_line = content_of(lines[j]);
        let directive = IncludeDirective {
            block: block.clone(),
            file,
            args,
            open_line: open_line.to_string(),
            close_line: close_line.to_string(),
            start_line: line_no,
            end_line: j + 1,
        };
        match renderer.render(&directive, source).await {
            Ok(rendered) => {
                out.push_str(&rendered);
                // the close line's terminator is outside the span
                out.push_str(&lines[j][close_line.len()..]);
                expansion.expanded += 1;
            }
            Err(message) => {
                expansion.errors.push(DirectiveError::Render {
                    line: line_no,
                    block,
                    message,
                });
                lines[i..=j].iter().for_each(|l| out.push_str(l));
            }
        }
        i = j + 1;
    }

    expansion.changed = out != text;
    expansion.text = out;
    expansion
}

/// The comment prefix directives use for `spec`: the first declared line
/// prefix, or the configured fallback when there is none.
pub fn include_prefix(spec: Option<&LanguageSpec>, config: &IncludeConfig) -> String {
    match spec.map(|s| s.comments.line.as_slice()) {
        Some([only]) => only.clone(),
        Some([first, ..]) => {
            tracing::warn!(
                language = %spec.map(|s| s.name.to_string()).unwrap_or_default(),
                prefix = %first,
                "language declares several line comment prefixes, using the first"
            );
            first.clone()
        }
        _ => {
            tracing::warn!(
                language = %spec.map(|s| s.name.to_string()).unwrap_or_default(),
                fallback = %config.fallback_prefix,
                "language declares no line comment, using fallback include prefix"
            );
            config.fallback_prefix.clone()
        }
    }
}

/// Expands include directives in discovered resources and writes the result back.
pub struct DirectiveProcessor {
    config: IncludeConfig,
    registry: Arc<LanguageRegistry>,
    renderer: Arc<dyn IncludeRenderer>,
    events: EventBus,
    dry_run: bool,
}

impl DirectiveProcessor {
    pub fn new(
        config: IncludeConfig,
        registry: Arc<LanguageRegistry>,
        renderer: Arc<dyn IncludeRenderer>,
        events: EventBus,
        dry_run: bool,
    ) -> Self {
        Self {
            config,
            registry,
            renderer,
            events,
            dry_run,
        }
    }

    /// `Ok(None)` for files without opening markers.
    pub async fn materialize(
        &self,
        resource: &Resource,
    ) -> Result<Option<DirectiveMaterialized>, ContentError> {
        let before = content::read_text(&resource.path).await?;
        if !before.contains(self.config.open_token.as_str()) {
            return Ok(None);
        }
        let spec = resource
            .language
            .as_ref()
            .and_then(|l| self.registry.get(l.as_str()).ok());
        let prefix = include_prefix(spec.as_deref(), &self.config);
        let expansion = expand_includes(
            &before,
            &resource.path,
            &prefix,
            &self.config,
            self.renderer.as_ref(),
        )
        .await;
        if expansion.markers == 0 {
            return Ok(None);
        }

        let mut errors: Vec<String> = expansion.errors.iter().map(|e| e.to_string()).collect();
        let mut written = false;
        if expansion.changed && !self.dry_run {
            match content::write_text(&resource.path, &expansion.text).await {
                Ok(()) => written = true,
                Err(e) => errors.push(e.to_string()),
            }
        }
        tracing::debug!(
            path = %resource.rel_path.display(),
            expanded = expansion.expanded,
            changed = expansion.changed,
            written,
            "include directives processed"
        );

        let outcome = DirectiveMaterialized {
            resource: resource.clone(),
            before,
            after: expansion.text,
            expanded: expansion.expanded,
            changed: expansion.changed,
            written,
            errors,
        };
        self.events.emit(Event::DirectiveMaterialized(outcome.clone()));
        Ok(Some(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl IncludeRenderer for Fixed {
        async fn render(&self, _: &IncludeDirective, _: &Path) -> Result<String, String> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl IncludeRenderer for Failing {
        async fn render(&self, d: &IncludeDirective, _: &Path) -> Result<String, String> {
            if d.block == "bad" {
                Err("boom".to_string())
            } else {
                Ok("ok".to_string())
            }
        }
    }

    async fn expand(text: &str, renderer: &dyn IncludeRenderer) -> IncludeExpansion {
        expand_includes(
            text,
            Path::new("/p/a.sql"),
            "--",
            &IncludeConfig::default(),
            renderer,
        )
        .await
    }

    #[tokio::test]
    async fn test_span_is_replaced() {
        let text = "select 1;\n-- #include block1 --file x.sql\nold\n-- #includeEnd block1\nselect 2;\n";
        let expansion = expand(text, &Fixed("REPLACED")).await;
        assert_eq!(expansion.text, "select 1;\nREPLACED\nselect 2;\n");
        assert!(expansion.changed);
        assert_eq!(expansion.expanded, 1);
        assert!(expansion.errors.is_empty());
    }

    #[tokio::test]
    async fn test_close_must_name_the_same_block() {
        let text = "-- #include a --file=x.sql\n-- #includeEnd b\n";
        let expansion = expand(text, &Fixed("R")).await;
        assert_eq!(expansion.text, text);
        assert!(matches!(
            expansion.errors[0],
            DirectiveError::Unclosed { line: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_failures_are_scoped_to_one_block() {
        let text = "-- #include bad --file x\n1\n-- #includeEnd bad\n\
                    -- #include good --file y\n2\n-- #includeEnd good\n\
                    -- #include nofile\n-- #includeEnd nofile\n\
                    -- #include \"unterminated\n";
        let expansion = expand(text, &Failing).await;
        assert_eq!(expansion.markers, 4);
        assert_eq!(expansion.expanded, 1);
        assert_eq!(expansion.errors.len(), 3);
        assert!(matches!(expansion.errors[0], DirectiveError::Render { .. }));
        assert!(matches!(expansion.errors[1], DirectiveError::MissingFile { .. }));
        assert!(matches!(expansion.errors[2], DirectiveError::BadArguments { .. }));
        assert!(expansion.text.contains("1\n-- #includeEnd bad\nok\n-- #include nofile"));
    }

    #[tokio::test]
    async fn test_file_renderer_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("part.sql"), "select 42;").unwrap();
        let source = dir.path().join("main.sql");
        let text = "  -- #include part --file 'part.sql'\n  -- #includeEnd part\n";

        let config = IncludeConfig::default();
        let first = expand_includes(text, &source, "--", &config, &FileIncludeRenderer).await;
        assert_eq!(
            first.text,
            "  -- #include part --file 'part.sql'\nselect 42;\n  -- #includeEnd part\n"
        );
        let second =
            expand_includes(&first.text, &source, "--", &config, &FileIncludeRenderer).await;
        assert!(!second.changed);
    }

    #[test]
    fn test_prefix_selection() {
        let config = IncludeConfig::default();
        let registry = LanguageRegistry::seeded();
        let sql = registry.get("sql").unwrap();
        assert_eq!(include_prefix(Some(sql.as_ref()), &config), "--");
        let html = registry.get("html").unwrap();
        assert_eq!(include_prefix(Some(html.as_ref()), &config), "--");
        let python = registry.get("python").unwrap();
        assert_eq!(include_prefix(Some(python.as_ref()), &config), "#");
        let multi = LanguageSpec::new("multi")
            .with_line_comment(";")
            .with_line_comment(";;");
        assert_eq!(include_prefix(Some(&multi), &config), ";");
    }

    #[tokio::test]
    async fn test_materialize_writes_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sql");
        std::fs::write(&path, "-- #include b --file x\n-- #includeEnd b\n").unwrap();
        let mut resource = Resource::new(path.clone(), PathBuf::from("a.sql"), "fs");
        resource.language = Some(smelter_api::Language::SQL);

        let events = EventBus::new();
        let mut rx = events.channel();
        let processor = DirectiveProcessor::new(
            IncludeConfig::default(),
            Arc::new(LanguageRegistry::seeded()),
            Arc::new(Fixed("REPLACED")),
            events,
            false,
        );
        let outcome = processor.materialize(&resource).await.unwrap().unwrap();
        assert!(outcome.changed && outcome.written);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "REPLACED\n");
        match rx.try_recv().unwrap() {
            Event::DirectiveMaterialized(e) => {
                assert!(e.changed);
                assert_eq!(e.resource.path, path);
                assert_eq!(e.resource.rel_path, PathBuf::from("a.sql"));
            }
            other => panic!("unexpected event {}", other.name()),
        }
    }

    #[tokio::test]
    async fn test_dry_run_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sql");
        let original = "-- #include b --file x\n-- #includeEnd b\n";
        std::fs::write(&path, original).unwrap();
        let resource = Resource::new(path.clone(), PathBuf::from("a.sql"), "fs");
        let processor = DirectiveProcessor::new(
            IncludeConfig::default(),
            Arc::new(LanguageRegistry::seeded()),
            Arc::new(Fixed("REPLACED")),
            EventBus::new(),
            true,
        );
        let outcome = processor.materialize(&resource).await.unwrap().unwrap();
        assert!(outcome.changed);
        assert!(!outcome.written);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }
}
