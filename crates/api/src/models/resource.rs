use super::language::Language;
use super::route::Route;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Discriminant of [`Nature`], without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NatureKind {
    Action,
    Api,
    Foundry,
    Page,
    Partial,
    Resource,
    Sql,
    Unknown,
}

impl NatureKind {
    pub const ALL: [NatureKind; 8] = [
        NatureKind::Action,
        NatureKind::Api,
        NatureKind::Foundry,
        NatureKind::Page,
        NatureKind::Partial,
        NatureKind::Resource,
        NatureKind::Sql,
        NatureKind::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NatureKind::Action => "action",
            NatureKind::Api => "api",
            NatureKind::Foundry => "foundry",
            NatureKind::Page => "page",
            NatureKind::Partial => "partial",
            NatureKind::Resource => "resource",
            NatureKind::Sql => "sql",
            NatureKind::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for NatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageMeta {
    pub title: Option<String>,
    pub layout: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartialMeta {
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActionMeta {
    pub method: String,
}

impl Default for ActionMeta {
    fn default() -> Self {
        Self {
            method: "POST".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiMeta {
    pub method: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FoundryMeta {
    /// Remove a stale derived output before the generator runs.
    pub cleanup: bool,
    /// Run after every foundry that does not declare dependencies.
    pub dependencies: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceImpact {
    #[default]
    Asset,
    Data,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DataResourceMeta {
    pub impact: ResourceImpact,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlImpact {
    Ddl,
    Dml,
    #[default]
    Dql,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SqlMeta {
    pub impact: SqlImpact,
}

/// The role a resource plays, with the metadata that role carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "nature", rename_all = "lowercase")]
pub enum Nature {
    Action(ActionMeta),
    Api(ApiMeta),
    Foundry(FoundryMeta),
    Page(PageMeta),
    Partial(PartialMeta),
    Resource(DataResourceMeta),
    Sql(SqlMeta),
    #[default]
    Unknown,
}

impl Nature {
    pub fn kind(&self) -> NatureKind {
        match self {
            Nature::Action(_) => NatureKind::Action,
            Nature::Api(_) => NatureKind::Api,
            Nature::Foundry(_) => NatureKind::Foundry,
            Nature::Page(_) => NatureKind::Page,
            Nature::Partial(_) => NatureKind::Partial,
            Nature::Resource(_) => NatureKind::Resource,
            Nature::Sql(_) => NatureKind::Sql,
            Nature::Unknown => NatureKind::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Nature::Unknown)
    }
}

/// Rejected attempt to replace one concrete nature with another.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("nature conflict: resource is already `{current}`, refusing `{proposed}`")]
pub struct NatureConflict {
    pub current: NatureKind,
    pub proposed: NatureKind,
}

/// Rejected attempt to attach a second route.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("route conflict: resource already routed at `{existing}`, refusing `{proposed}`")]
pub struct RouteConflict {
    pub existing: String,
    pub proposed: String,
}

/// A walked artifact and everything learned about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub path: PathBuf,
    pub rel_path: PathBuf,
    pub supplier: String,
    pub language: Option<Language>,
    #[serde(flatten)]
    pub nature: Nature,
    pub is_system_generated: bool,
    pub route: Option<Route>,
}

impl Resource {
    pub fn new(path: PathBuf, rel_path: PathBuf, supplier: impl Into<String>) -> Self {
        Self {
            path,
            rel_path,
            supplier: supplier.into(),
            language: None,
            nature: Nature::Unknown,
            is_system_generated: false,
            route: None,
        }
    }

    pub fn nature_kind(&self) -> NatureKind {
        self.nature.kind()
    }

    pub fn is_foundry(&self) -> bool {
        matches!(self.nature, Nature::Foundry(_))
    }

    /// Widen the nature. `Unknown` becomes anything, a nature may be
    /// refreshed with a payload of the same kind, and a different concrete
    /// nature is rejected without touching the resource.
    pub fn widen(&mut self, nature: Nature) -> Result<(), NatureConflict> {
        let current = self.nature.kind();
        let proposed = nature.kind();
        if proposed == NatureKind::Unknown {
            return Ok(());
        }
        if current != NatureKind::Unknown && current != proposed {
            return Err(NatureConflict { current, proposed });
        }
        self.nature = nature;
        Ok(())
    }

    /// Attach a route; an `Unknown` nature becomes a default page.
    pub fn attach_route(&mut self, route: Route) -> Result<(), RouteConflict> {
        if let Some(existing) = &self.route {
            return Err(RouteConflict {
                existing: existing.path.clone(),
                proposed: route.path,
            });
        }
        self.route = Some(route);
        if self.nature.is_unknown() {
            self.nature = Nature::Page(PageMeta::default());
        }
        Ok(())
    }
}
