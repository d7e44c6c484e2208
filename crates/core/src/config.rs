use crate::error::{Result, SmelterError};
use crate::foundry::ExecMode;
use serde::{Deserialize, Serialize};
use smelter_annotate::{ExtractorConfig, extract::DEFAULT_TAG_KEY_PATTERN};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File looked up at the project root.
pub const CONFIG_FILE_NAME: &str = "smelter.json";

/// Settings for one assembly run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyConfig {
    /// Plan directives and foundries without writing or executing anything.
    pub dry_run: bool,
    pub respect_gitignore: bool,
    pub include_hidden: bool,
    /// Language used when neither the extension nor a shebang resolves.
    pub default_language: Option<String>,
    pub annotations: AnnotationConfig,
    pub namespaces: NamespaceConfig,
    pub include: IncludeConfig,
    pub foundry: FoundryConfig,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            respect_gitignore: true,
            include_hidden: false,
            default_language: None,
            annotations: AnnotationConfig::default(),
            namespaces: NamespaceConfig::default(),
            include: IncludeConfig::default(),
            foundry: FoundryConfig::default(),
        }
    }
}

impl AssemblyConfig {
    /// Read `smelter.json` under `root`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SmelterError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = serde_json::from_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded assembly config");
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub tag_key_pattern: String,
    pub key_values: bool,
    pub yaml: bool,
    pub json: bool,
    pub continuation_marker: String,
    pub merge_line_comments: bool,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        let defaults = ExtractorConfig::default();
        Self {
            tag_key_pattern: DEFAULT_TAG_KEY_PATTERN.to_string(),
            key_values: defaults.key_values,
            yaml: defaults.yaml,
            json: defaults.json,
            continuation_marker: defaults.continuation_marker,
            merge_line_comments: defaults.merge_line_comments,
        }
    }
}

impl From<&AnnotationConfig> for ExtractorConfig {
    fn from(config: &AnnotationConfig) -> Self {
        Self {
            tag_key_pattern: config.tag_key_pattern.clone(),
            tags: true,
            key_values: config.key_values,
            yaml: config.yaml,
            json: config.json,
            continuation_marker: config.continuation_marker.clone(),
            merge_line_comments: config.merge_line_comments,
        }
    }
}

/// Annotation key namespaces, without the trailing dot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    pub resource: String,
    pub route: String,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            resource: "resource".to_string(),
            route: "route".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncludeConfig {
    pub enabled: bool,
    pub open_token: String,
    pub close_token: String,
    /// Used when a language declares no line comment.
    pub fallback_prefix: String,
}

impl Default for IncludeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            open_token: "#include".to_string(),
            close_token: "#includeEnd".to_string(),
            fallback_prefix: "--".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FoundryConfig {
    pub enabled: bool,
    pub exec_mode: ExecMode,
    /// Extensions treated as executable under [`ExecMode::Windows`].
    pub windows_extensions: Vec<String>,
    /// Extra environment for generator processes.
    pub env: BTreeMap<String, String>,
    /// Working directory; the generator's own directory when unset.
    pub cwd: Option<PathBuf>,
}

impl Default for FoundryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            exec_mode: ExecMode::native(),
            windows_extensions: [".exe", ".bat", ".cmd", ".ps1"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: AssemblyConfig =
            serde_json::from_str(r#"{"dry_run": true, "foundry": {"exec_mode": "none"}}"#).unwrap();
        assert!(config.dry_run);
        assert!(config.respect_gitignore);
        assert_eq!(config.foundry.exec_mode, ExecMode::None);
        assert_eq!(config.include.open_token, "#include");
        assert_eq!(config.namespaces.route, "route");
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            AssemblyConfig::load(dir.path()).unwrap(),
            AssemblyConfig::default()
        );
    }

    #[test]
    fn test_load_invalid_json_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{ nope").unwrap();
        assert!(matches!(
            AssemblyConfig::load(dir.path()),
            Err(SmelterError::Json(_))
        ));
    }

    #[test]
    fn test_annotation_config_into_extractor() {
        let config = AnnotationConfig {
            yaml: false,
            ..AnnotationConfig::default()
        };
        let extractor = ExtractorConfig::from(&config);
        assert!(!extractor.yaml);
        assert!(extractor.tags);
    }
}
