use serde::{Deserialize, Serialize};

/// Navigation metadata attached to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Route {
    /// Logical path, `/`-separated.
    pub path: String,
    pub caption: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub order: Option<i64>,
    pub basename: String,
    pub dirname: String,
    /// Extension chain of the file name, outermost last (`a.pre.sql` -> `[pre, sql]`).
    pub extensions: Vec<String>,
}

impl Route {
    /// Path segments, ignoring empty ones.
    pub fn segments(&self) -> Vec<&str> {
        split_route_path(&self.path)
    }
}

pub fn split_route_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Normalize a logical path to `/a/b` form.
pub fn normalize_route_path(path: &str) -> String {
    let segments = split_route_path(path);
    format!("/{}", segments.join("/"))
}
