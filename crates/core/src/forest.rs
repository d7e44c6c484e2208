use indexmap::IndexMap;
use serde::Serialize;
use smelter_api::{Resource, Route, split_route_path};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForestNode {
    /// Full logical path, `/a/b`.
    pub path: String,
    pub segment: String,
    /// `None` for intermediate segments nobody routed.
    pub route: Option<Route>,
    pub resource: Option<PathBuf>,
    pub children: Vec<String>,
}

impl ForestNode {
    pub fn is_virtual(&self) -> bool {
        self.route.is_none()
    }

    pub fn caption(&self) -> &str {
        self.route
            .as_ref()
            .map(|r| r.caption.as_str())
            .unwrap_or(&self.segment)
    }

    fn order(&self) -> Option<i64> {
        self.route.as_ref().and_then(|r| r.order)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breadcrumb {
    pub path: String,
    pub caption: String,
}

/// Route hierarchy built from every routed resource.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PathForest {
    nodes: IndexMap<String, ForestNode>,
    roots: Vec<String>,
}

fn join(segments: &[&str]) -> String {
    format!("/{}", segments.join("/"))
}

impl PathForest {
    /// Later resources replace earlier ones at the same path.
    pub fn build<'a>(resources: impl IntoIterator<Item = &'a Resource>) -> Self {
        let mut forest = Self::default();
        for resource in resources {
            if let Some(route) = &resource.route {
                forest.insert(route.clone(), resource.path.clone());
            }
        }
        let mut roots = std::mem::take(&mut forest.roots);
        forest.sort_paths(&mut roots);
        forest.roots = roots;
        let keys: Vec<String> = forest.nodes.keys().cloned().collect();
        for key in keys {
            let mut children = std::mem::take(&mut forest.nodes[&key].children);
            forest.sort_paths(&mut children);
            forest.nodes[&key].children = children;
        }
        forest
    }

    fn insert(&mut self, route: Route, resource: PathBuf) {
        let segments = split_route_path(&route.path);
        let mut parent: Option<String> = None;
        for depth in 0..=segments.len() {
            if depth == 0 && !segments.is_empty() {
                continue;
            }
            let path = join(&segments[..depth]);
            if !self.nodes.contains_key(&path) {
                self.nodes.insert(
                    path.clone(),
                    ForestNode {
                        path: path.clone(),
                        segment: segments
                            .get(depth.wrapping_sub(1))
                            .map(|s| s.to_string())
                            .unwrap_or_default(),
                        route: None,
                        resource: None,
                        children: Vec::new(),
                    },
                );
                match &parent {
                    Some(parent) => self.nodes[parent].children.push(path.clone()),
                    None => self.roots.push(path.clone()),
                }
            }
            parent = Some(path);
        }
        if let Some(leaf) = parent {
            let node = &mut self.nodes[&leaf];
            node.route = Some(route);
            node.resource = Some(resource);
        }
    }

    fn sort_paths(&self, paths: &mut [String]) {
        // explicit order first, then insertion order
        paths.sort_by_key(|p| {
            let order = self.nodes.get(p).and_then(|n| n.order());
            (order.is_none(), order.unwrap_or(0))
        });
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&ForestNode> {
        self.nodes.get(&smelter_api::normalize_route_path(path))
    }

    pub fn roots(&self) -> Vec<&ForestNode> {
        self.roots
            .iter()
            .filter_map(|p| self.nodes.get(p))
            .collect()
    }

    pub fn children(&self, path: &str) -> Vec<&ForestNode> {
        self.get(path)
            .map(|n| {
                n.children
                    .iter()
                    .filter_map(|c| self.nodes.get(c))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Nodes above `path`, outermost first.
    pub fn ancestors(&self, path: &str) -> Vec<&ForestNode> {
        let segments = split_route_path(path);
        (1..segments.len())
            .filter_map(|depth| self.nodes.get(&join(&segments[..depth])))
            .collect()
    }

    /// Ancestors plus the node itself, as display crumbs.
    pub fn breadcrumbs(&self, path: &str) -> Vec<Breadcrumb> {
        let mut nodes = self.ancestors(path);
        nodes.extend(self.get(path));
        nodes
            .into_iter()
            .map(|n| Breadcrumb {
                path: n.path.clone(),
                caption: n.caption().to_string(),
            })
            .collect()
    }
}
