//! Route detection, the navigational twin of [`classify`](crate::classify).

use crate::classify::{ClassificationError, coerce_fields, gather_fields};
use serde_json::{Map, Value};
use smelter_api::{AnnotationCatalog, Resource, Route, normalize_route_path};
use std::path::Path;

/// Fields of the route schema that are not strings.
pub const ROUTE_SCALAR_FIELDS: &[&str] = &["order"];

/// Route fields derived from a relative file path.
///
/// `pages/admin/index.pre.html` yields path `/pages/admin/index.pre.html`,
/// basename `index`, dirname `/pages/admin` and extensions `[pre, html]`.
pub fn default_route_fields(rel_path: &Path) -> Map<String, Value> {
    let segments: Vec<String> = rel_path
        .components()
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    let file_name = segments.last().cloned().unwrap_or_default();
    let (basename, extensions) = split_file_name(&file_name);
    let parents = &segments[..segments.len().saturating_sub(1)];
    let dirname = format!("/{}", parents.join("/"));

    let mut fields = Map::new();
    let path = format!("/{}", segments.join("/"));
    fields.insert("path".into(), Value::String(path));
    fields.insert("basename".into(), Value::String(basename));
    fields.insert("dirname".into(), Value::String(dirname));
    fields.insert(
        "extensions".into(),
        Value::Array(extensions.into_iter().map(Value::String).collect()),
    );
    fields
}

/// `report.pre.sql` -> (`report`, [`pre`, `sql`]). A leading dot belongs to
/// the basename (`.env` has no extension).
pub fn split_file_name(name: &str) -> (String, Vec<String>) {
    let (hidden, body) = match name.strip_prefix('.') {
        Some(rest) => (".", rest),
        None => ("", name),
    };
    let mut parts = body.split('.');
    let stem = parts.next().unwrap_or_default();
    let extensions = parts
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    (format!("{hidden}{stem}"), extensions)
}

/// Detect and attach a route. `Ok(None)` when the namespace is unused.
/// Defaults are applied before validation, so only `caption` is truly required.
pub fn detect_route(
    resource: &mut Resource,
    catalog: &AnnotationCatalog,
    namespace: &str,
) -> Result<Option<String>, ClassificationError> {
    let Some(mut declared) = gather_fields(catalog, namespace) else {
        return Ok(None);
    };
    coerce_fields(&mut declared, ROUTE_SCALAR_FIELDS);
    let mut fields = default_route_fields(&resource.rel_path);
    fields.extend(declared);

    let mut route: Route = serde_json::from_value(Value::Object(fields))
        .map_err(|e| ClassificationError::InvalidRoute(e.to_string()))?;
    if route.caption.trim().is_empty() {
        return Err(ClassificationError::InvalidRoute(
            "`caption` must not be empty".to_string(),
        ));
    }
    route.path = normalize_route_path(&route.path);
    let path = route.path.clone();
    resource.attach_route(route)?;
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify_resource;
    use serde_json::json;
    use smelter_annotate::{AnnotationExtractor, ExtractorConfig};
    use smelter_api::{BlockSyntax, CommentSyntax, NatureKind};
    use std::path::PathBuf;

    fn catalog(text: &str) -> AnnotationCatalog {
        let syntax = CommentSyntax {
            line: vec!["--".into()],
            block: vec![BlockSyntax::new("/*", "*/")],
        };
        AnnotationExtractor::new(ExtractorConfig::default())
            .unwrap()
            .extract(text, &syntax)
    }

    fn resource(rel: &str) -> Resource {
        Resource::new(PathBuf::from("/p").join(rel), PathBuf::from(rel), "fs")
    }

    #[test]
    fn test_default_fields() {
        let fields = default_route_fields(Path::new("pages/admin/index.pre.html"));
        assert_eq!(fields["path"], json!("/pages/admin/index.pre.html"));
        assert_eq!(fields["basename"], json!("index"));
        assert_eq!(fields["dirname"], json!("/pages/admin"));
        assert_eq!(fields["extensions"], json!(["pre", "html"]));

        let fields = default_route_fields(Path::new("top.md"));
        assert_eq!(fields["dirname"], json!("/"));
    }

    #[test]
    fn test_split_file_name() {
        assert_eq!(split_file_name(".env"), (".env".to_string(), vec![]));
        assert_eq!(
            split_file_name("a.b.c"),
            ("a".to_string(), vec!["b".to_string(), "c".to_string()])
        );
    }

    #[test]
    fn test_route_defaults_path_and_makes_page() {
        let mut r = resource("docs/intro.md");
        let result = detect_route(&mut r, &catalog("-- @route.caption Intro"), "route");
        assert_eq!(result, Ok(Some("/docs/intro.md".to_string())));
        let route = r.route.as_ref().unwrap();
        assert_eq!(route.caption, "Intro");
        assert_eq!(route.basename, "intro");
        assert_eq!(r.nature_kind(), NatureKind::Page);
    }

    #[test]
    fn test_route_keeps_sql_nature() {
        let mut r = resource("q/report.sql");
        let cat = catalog(
            "-- @resource.nature sql\n-- @route.path /reports/daily/\n-- @route.caption Daily\n-- @route.order 2",
        );
        classify_resource(&mut r, &cat, "resource").unwrap();
        detect_route(&mut r, &cat, "route").unwrap();
        assert_eq!(r.nature_kind(), NatureKind::Sql);
        let route = r.route.as_ref().unwrap();
        assert_eq!(route.path, "/reports/daily");
        assert_eq!(route.order, Some(2));
    }

    #[test]
    fn test_numeric_caption_stays_text() {
        let mut r = resource("archive/2024.md");
        let cat = catalog("-- @route.caption 2024\n-- @route.description 1.5\n-- @route.order 3");
        detect_route(&mut r, &cat, "route").unwrap();
        let route = r.route.as_ref().unwrap();
        assert_eq!(route.caption, "2024");
        assert_eq!(route.description.as_deref(), Some("1.5"));
        assert_eq!(route.order, Some(3));
    }

    #[test]
    fn test_missing_caption_fails_without_attaching() {
        let mut r = resource("a.md");
        let err = detect_route(&mut r, &catalog("-- @route.path /a"), "route").unwrap_err();
        assert!(matches!(err, ClassificationError::InvalidRoute(_)));
        assert!(r.route.is_none());
        assert!(r.nature.is_unknown());
    }

    #[test]
    fn test_unknown_route_field_is_rejected() {
        let mut r = resource("a.md");
        let err = detect_route(
            &mut r,
            &catalog("-- @route.caption A\n-- @route.icon star"),
            "route",
        )
        .unwrap_err();
        assert!(matches!(err, ClassificationError::InvalidRoute(_)));
    }
}
