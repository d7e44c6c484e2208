use smelter_api::{LanguageSpec, Resource};
use smelter_core::events::Diagnostic;
use tabled::Tabled;

/// One row per resource in an assembly summary.
#[derive(Tabled)]
pub struct ResourceView {
    pub path: String,
    pub nature: String,
    pub language: String,
    pub route: String,
}

impl ResourceView {
    pub fn from_resource(resource: &Resource) -> Self {
        let generated = if resource.is_system_generated {
            " (generated)"
        } else {
            ""
        };
        Self {
            path: resource.rel_path.display().to_string(),
            nature: format!("{}{}", resource.nature_kind(), generated),
            language: resource
                .language
                .as_ref()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "-".to_string()),
            route: resource
                .route
                .as_ref()
                .map(|r| format!("{} ({})", r.path, r.caption))
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

#[derive(Tabled)]
pub struct DiagnosticView {
    pub category: String,
    pub path: String,
    pub message: String,
}

impl DiagnosticView {
    pub fn from_diagnostic(diagnostic: &Diagnostic) -> Self {
        Self {
            category: format!("{:?}", diagnostic.category).to_lowercase(),
            path: diagnostic.path.display().to_string(),
            message: diagnostic.message.clone(),
        }
    }
}

#[derive(Tabled)]
pub struct LanguageView {
    pub name: String,
    pub extensions: String,
    pub line: String,
    pub block: String,
}

impl LanguageView {
    pub fn from_spec(spec: &LanguageSpec) -> Self {
        let or_dash = |parts: Vec<String>| {
            if parts.is_empty() {
                "-".to_string()
            } else {
                parts.join(" ")
            }
        };
        Self {
            name: spec.name.to_string(),
            extensions: or_dash(spec.extensions.clone()),
            line: or_dash(spec.comments.line.clone()),
            block: or_dash(
                spec.comments
                    .block
                    .iter()
                    .map(|b| {
                        let nested = if b.nested { " (nested)" } else { "" };
                        format!("{} {}{}", b.open, b.close, nested)
                    })
                    .collect(),
            ),
        }
    }
}
