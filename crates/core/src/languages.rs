use smelter_api::{ApiError, ApiResult, BlockSyntax, Language, LanguageSpec};
use std::path::Path;
use std::sync::Arc;

/// Explicit language table, threaded into every component that detects
/// languages. Later registrations shadow earlier ones with the same name.
#[derive(Debug, Clone, Default)]
pub struct LanguageRegistry {
    specs: Vec<Arc<LanguageSpec>>,
}

impl LanguageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in languages.
    pub fn seeded() -> Self {
        let mut registry = Self::new();
        for spec in builtin_languages() {
            // built-ins are well formed
            let _ = registry.register(spec);
        }
        registry
    }

    pub fn register(&mut self, spec: LanguageSpec) -> ApiResult<Arc<LanguageSpec>> {
        validate(&spec)?;
        let spec = Arc::new(spec);
        self.specs.retain(|s| s.name != spec.name);
        self.specs.push(spec.clone());
        Ok(spec)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<LanguageSpec>> {
        self.specs.iter()
    }

    pub fn get(&self, name: &str) -> ApiResult<Arc<LanguageSpec>> {
        self.specs
            .iter()
            .find(|s| s.name.as_str() == name)
            .cloned()
            .ok_or_else(|| ApiError::UnknownLanguage(name.to_string()))
    }

    pub fn by_extension(&self, ext: &str) -> Option<Arc<LanguageSpec>> {
        self.specs
            .iter()
            .rev()
            .find(|s| s.matches_extension(ext))
            .cloned()
    }

    /// Lookup by the last extension of the file name.
    pub fn by_path(&self, path: &Path) -> Option<Arc<LanguageSpec>> {
        let ext = path.extension()?.to_str()?;
        self.by_extension(ext)
    }

    /// Lookup by a `#!` line: `#!/bin/bash` selects `bash`, `#!/usr/bin/env -S deno run`
    /// selects `deno`.
    pub fn by_shebang(&self, first_line: &str) -> Option<Arc<LanguageSpec>> {
        let interpreter = shebang_interpreter(first_line)?;
        self.specs
            .iter()
            .rev()
            .find(|s| s.matches_interpreter(&interpreter))
            .cloned()
    }

    pub fn detect(&self, path: &Path, text: Option<&str>) -> Option<Arc<LanguageSpec>> {
        self.by_path(path).or_else(|| {
            let first = text?.lines().next()?;
            self.by_shebang(first)
        })
    }

    pub fn detect_or_default(
        &self,
        path: &Path,
        text: Option<&str>,
        default: Option<&str>,
    ) -> Option<Arc<LanguageSpec>> {
        self.detect(path, text)
            .or_else(|| default.and_then(|name| self.get(name).ok()))
    }
}

fn validate(spec: &LanguageSpec) -> ApiResult<()> {
    let invalid = |reason: &str| ApiError::InvalidLanguage {
        language: spec.name.to_string(),
        reason: reason.to_string(),
    };
    if spec.name.as_str().is_empty() {
        return Err(invalid("empty name"));
    }
    if spec.comments.line.iter().any(|p| p.trim().is_empty()) {
        return Err(invalid("blank line comment prefix"));
    }
    if spec
        .comments
        .block
        .iter()
        .any(|b| b.open.is_empty() || b.close.is_empty())
    {
        return Err(invalid("block comment with an empty fence"));
    }
    Ok(())
}

fn shebang_interpreter(line: &str) -> Option<String> {
    let rest = line.strip_prefix("#!")?.trim();
    let mut words = rest.split_whitespace();
    let program = words.next()?;
    let name = program.rsplit('/').next()?;
    if name == "env" {
        let arg = words.find(|w| !w.starts_with('-'))?;
        return Some(arg.rsplit('/').next()?.to_string());
    }
    Some(name.to_string())
}

fn c_block() -> BlockSyntax {
    BlockSyntax::new("/*", "*/")
}

pub fn builtin_languages() -> Vec<LanguageSpec> {
    vec![
        LanguageSpec::new(Language::SQL)
            .with_extensions(&["sql"])
            .with_line_comment("--")
            .with_block_comment(c_block()),
        LanguageSpec::new(Language::TYPESCRIPT)
            .with_extensions(&["ts", "tsx", "mts", "cts"])
            .with_shebangs(&["deno", "bun", "tsx", "ts-node"])
            .with_line_comment("//")
            .with_block_comment(c_block()),
        LanguageSpec::new(Language::JAVASCRIPT)
            .with_extensions(&["js", "jsx", "mjs", "cjs"])
            .with_shebangs(&["node"])
            .with_line_comment("//")
            .with_block_comment(c_block()),
        LanguageSpec::new(Language::PYTHON)
            .with_extensions(&["py"])
            .with_shebangs(&["python", "python3"])
            .with_line_comment("#")
            .with_block_comment(BlockSyntax::new("\"\"\"", "\"\"\"")),
        LanguageSpec::new(Language::SHELL)
            .with_extensions(&["sh", "bash", "zsh"])
            .with_shebangs(&["sh", "bash", "zsh", "dash"])
            .with_line_comment("#"),
        LanguageSpec::new(Language::RUST)
            .with_extensions(&["rs"])
            .with_line_comment("//")
            .with_block_comment(c_block().nested(true)),
        LanguageSpec::new(Language::HTML)
            .with_extensions(&["html", "htm"])
            .with_block_comment(BlockSyntax::new("<!--", "-->")),
        LanguageSpec::new(Language::MARKDOWN)
            .with_extensions(&["md", "markdown"])
            .with_block_comment(BlockSyntax::new("<!--", "-->")),
        LanguageSpec::new(Language::CSS)
            .with_extensions(&["css"])
            .with_block_comment(c_block()),
        LanguageSpec::new(Language::YAML)
            .with_extensions(&["yaml", "yml"])
            .with_line_comment("#"),
        LanguageSpec::new(Language::TOML)
            .with_extensions(&["toml"])
            .with_line_comment("#"),
        LanguageSpec::new(Language::JSON).with_extensions(&["json"]),
    ]
}
