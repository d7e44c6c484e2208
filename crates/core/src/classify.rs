//! Resource classification from namespaced annotations.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value};
use smelter_api::{
    ActionMeta, AnnotationCatalog, ApiMeta, DataResourceMeta, FoundryMeta, Nature,
    NatureConflict, NatureKind, PageMeta, PartialMeta, Resource, RouteConflict, SqlMeta,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("`{namespace}.nature` is required")]
    MissingNature { namespace: String },
    #[error("unknown nature `{0}`")]
    UnknownNature(String),
    #[error("invalid `{nature}` fields: {message}")]
    InvalidFields { nature: String, message: String },
    #[error(transparent)]
    NatureConflict(#[from] NatureConflict),
    #[error("invalid route: {0}")]
    InvalidRoute(String),
    #[error(transparent)]
    RouteConflict(#[from] RouteConflict),
}

/// How one classifier fared on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// No annotation used the namespace.
    NotAttempted,
    Applied { detail: String },
    Failed { message: String },
}

impl Outcome {
    pub fn from_result(result: &Result<Option<String>, ClassificationError>) -> Self {
        match result {
            Ok(None) => Outcome::NotAttempted,
            Ok(Some(detail)) => Outcome::Applied {
                detail: detail.clone(),
            },
            Err(e) => Outcome::Failed {
                message: e.to_string(),
            },
        }
    }
}

/// Fields of the resource schema that are not strings.
pub const RESOURCE_SCALAR_FIELDS: &[&str] = &["generated", "cleanup", "dependencies"];

/// Collect the fields a catalog declares under `namespace`.
///
/// Three spellings contribute, later ones overriding earlier ones:
/// `@ns.field value` tags and `ns.field: value` lines, a keyed item `ns`
/// whose value is an object, and YAML/JSON blocks with a top-level `ns` object.
/// Tag and key/value values stay strings; see [`coerce_fields`].
/// Returns `None` when nothing uses the namespace.
pub fn gather_fields(catalog: &AnnotationCatalog, namespace: &str) -> Option<Map<String, Value>> {
    let prefix = format!("{namespace}.");
    let mut fields = Map::new();
    let mut seen = false;

    for item in &catalog.items {
        match item.key.as_deref() {
            Some(key) if key == namespace => {
                if let Value::Object(members) = &item.value {
                    seen = true;
                    fields.extend(members.clone());
                }
            }
            Some(key) => {
                if let Some(field) = key.strip_prefix(&prefix)
                    && !field.is_empty()
                {
                    seen = true;
                    fields.insert(field.to_string(), item.value.clone());
                }
            }
            None => {
                if let Some(Value::Object(members)) = item.value.get(namespace) {
                    seen = true;
                    fields.extend(members.clone());
                }
            }
        }
    }
    seen.then_some(fields)
}

/// Coerce string values of the named non-string fields, so `@ns.order 2`
/// and `@ns.cleanup true` validate while `@ns.caption 2024` stays text.
pub fn coerce_fields(fields: &mut Map<String, Value>, scalar_fields: &[&str]) {
    for name in scalar_fields {
        if let Some(Value::String(s)) = fields.get(*name) {
            let coerced = coerce_scalar(s);
            fields.insert(name.to_string(), coerced);
        }
    }
}

/// Read a tag or key/value string as the JSON scalar it spells.
pub fn coerce_scalar(s: &str) -> Value {
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => {
            if let Ok(n) = s.parse::<i64>() {
                return Value::from(n);
            }
            match s.parse::<f64>().ok().and_then(Number::from_f64) {
                Some(n) => Value::Number(n),
                None => Value::String(s.to_string()),
            }
        }
    }
}

fn meta<T: DeserializeOwned>(
    kind: NatureKind,
    fields: Map<String, Value>,
) -> Result<T, ClassificationError> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| ClassificationError::InvalidFields {
        nature: kind.to_string(),
        message: e.to_string(),
    })
}

/// Validate gathered fields against the schema of the nature they name.
/// Returns the nature and the optional `generated` flag.
pub fn nature_from_fields(
    mut fields: Map<String, Value>,
    namespace: &str,
) -> Result<(Nature, Option<bool>), ClassificationError> {
    let name = match fields.remove("nature") {
        Some(Value::String(name)) => name,
        Some(other) => return Err(ClassificationError::UnknownNature(other.to_string())),
        None => {
            return Err(ClassificationError::MissingNature {
                namespace: namespace.to_string(),
            });
        }
    };
    let kind = NatureKind::parse(&name).ok_or(ClassificationError::UnknownNature(name))?;

    let generated = match fields.remove("generated") {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(b),
        Some(other) => {
            return Err(ClassificationError::InvalidFields {
                nature: kind.to_string(),
                message: format!("`generated` must be a boolean, got {other}"),
            });
        }
    };

    let nature = match kind {
        NatureKind::Action => Nature::Action(meta::<ActionMeta>(kind, fields)?),
        NatureKind::Api => Nature::Api(meta::<ApiMeta>(kind, fields)?),
        NatureKind::Foundry => Nature::Foundry(meta::<FoundryMeta>(kind, fields)?),
        NatureKind::Page => Nature::Page(meta::<PageMeta>(kind, fields)?),
        NatureKind::Partial => Nature::Partial(meta::<PartialMeta>(kind, fields)?),
        NatureKind::Resource => Nature::Resource(meta::<DataResourceMeta>(kind, fields)?),
        NatureKind::Sql => Nature::Sql(meta::<SqlMeta>(kind, fields)?),
        NatureKind::Unknown => {
            if let Some(field) = fields.keys().next() {
                return Err(ClassificationError::InvalidFields {
                    nature: kind.to_string(),
                    message: format!("unknown field `{field}`"),
                });
            }
            Nature::Unknown
        }
    };
    Ok((nature, generated))
}

/// Classify `resource` from its catalog. `Ok(None)` when the namespace is
/// unused; on error the resource is left untouched.
pub fn classify_resource(
    resource: &mut Resource,
    catalog: &AnnotationCatalog,
    namespace: &str,
) -> Result<Option<String>, ClassificationError> {
    let Some(mut fields) = gather_fields(catalog, namespace) else {
        return Ok(None);
    };
    coerce_fields(&mut fields, RESOURCE_SCALAR_FIELDS);
    let (nature, generated) = nature_from_fields(fields, namespace)?;
    let kind = nature.kind();
    resource.widen(nature)?;
    if let Some(generated) = generated {
        resource.is_system_generated = generated;
    }
    Ok(Some(kind.to_string()))
}
