//! JSON Schema documents resolved into a tagged tree.
//!
//! Only the subset that drives column layout is kept: nested objects with
//! `properties`, and scalar leaves with their declared kinds and `format`.

use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::warn;

use crate::column_type::{ColumnType, ColumnTypeStrategy};
use crate::error::{display_path, Result, SchemaError};
use crate::lattice::Kind;

/// A leaf of the schema tree: one future column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarSchema {
    pub kinds: BTreeSet<Kind>,
    pub format: Option<String>,
}

impl ScalarSchema {
    pub fn new(kinds: impl IntoIterator<Item = Kind>, format: Option<&str>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            format: format.map(str::to_string),
        }
    }

    pub fn column_type(&self, strategy: ColumnTypeStrategy) -> ColumnType {
        strategy.resolve(&self.kinds, self.format.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaNode {
    Scalar(ScalarSchema),
    /// Children in declaration order.
    Object { children: Vec<(String, SchemaNode)> },
}

impl SchemaNode {
    /// Resolve a stream's root schema. The root must declare `properties`.
    pub fn parse(root: &Value) -> Result<SchemaNode> {
        let path: Vec<String> = Vec::new();
        let Some(obj) = root.as_object() else {
            return Err(SchemaError::invalid_schema(&path, "schema must be a JSON object"));
        };
        match obj.get("properties") {
            Some(properties) => parse_properties(properties, &path),
            None => Err(SchemaError::invalid_schema(
                &path,
                "root schema must declare 'properties'",
            )),
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, SchemaNode::Object { .. })
    }
}

fn parse_properties(properties: &Value, path: &[String]) -> Result<SchemaNode> {
    let Some(properties) = properties.as_object() else {
        return Err(SchemaError::invalid_schema(path, "'properties' must be an object"));
    };

    let mut children = Vec::with_capacity(properties.len());
    for (name, property) in properties {
        let mut child_path = path.to_vec();
        child_path.push(name.clone());
        if let Some(node) = parse_property(property, &child_path)? {
            children.push((name.clone(), node));
        }
    }
    Ok(SchemaNode::Object { children })
}

/// `Ok(None)` means the property contributes no column.
fn parse_property(property: &Value, path: &[String]) -> Result<Option<SchemaNode>> {
    let Some(mut obj) = property.as_object() else {
        return Err(SchemaError::invalid_schema(path, "property schema must be an object"));
    };

    // Only the first alternative of a union is considered.
    if let Some(any_of) = obj.get("anyOf") {
        obj = any_of
            .as_array()
            .and_then(|alternatives| alternatives.first())
            .and_then(Value::as_object)
            .ok_or_else(|| {
                SchemaError::invalid_schema(path, "'anyOf' must hold at least one schema object")
            })?;
    }

    match obj.get("type") {
        Some(declared) => {
            let kinds = parse_kinds(declared, path)?;
            if kinds.names.iter().any(|k| k == "object") {
                if let Some(properties) = obj.get("properties") {
                    return parse_properties(properties, path).map(Some);
                }
            }
            Ok(Some(SchemaNode::Scalar(ScalarSchema {
                kinds: kinds.known,
                format: format_of(obj),
            })))
        }
        None => Ok(parse_untyped(obj, path)),
    }
}

/// A property without `type`: only a list-valued first keyword whose first
/// schema is a plain `string` or `array` is understood, as a nullable scalar.
fn parse_untyped(obj: &Map<String, Value>, path: &[String]) -> Option<SchemaNode> {
    let (keyword, value) = obj.iter().next()?;

    let inner = value
        .as_array()
        .and_then(|list| list.first())
        .and_then(Value::as_object);
    let kind = inner
        .and_then(|schema| schema.get("type"))
        .and_then(Value::as_str)
        .and_then(|t| match t {
            "string" => Some(Kind::String),
            "array" => Some(Kind::Array),
            _ => None,
        });

    match (inner, kind) {
        (Some(inner), Some(kind)) => Some(SchemaNode::Scalar(ScalarSchema {
            kinds: [Kind::Null, kind].into_iter().collect(),
            format: format_of(inner),
        })),
        _ => {
            warn!(
                property = %display_path(path),
                keyword = %keyword,
                "Skipping property with unhandled schema"
            );
            None
        }
    }
}

struct DeclaredKinds {
    names: Vec<String>,
    known: BTreeSet<Kind>,
}

fn parse_kinds(declared: &Value, path: &[String]) -> Result<DeclaredKinds> {
    let names: Vec<String> = match declared {
        Value::String(name) => vec![name.clone()],
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    SchemaError::invalid_schema(path, "'type' entries must be strings")
                })
            })
            .collect::<Result<_>>()?,
        _ => {
            return Err(SchemaError::invalid_schema(
                path,
                "'type' must be a string or a list of strings",
            ))
        }
    };

    let mut known = BTreeSet::new();
    for name in &names {
        match name.parse::<Kind>() {
            Ok(kind) => {
                known.insert(kind);
            }
            Err(_) => warn!(
                property = %display_path(path),
                kind = %name,
                "Ignoring unknown schema type"
            ),
        }
    }
    Ok(DeclaredKinds { names, known })
}

fn format_of(obj: &Map<String, Value>) -> Option<String> {
    obj.get("format").and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn children(node: SchemaNode) -> Vec<(String, SchemaNode)> {
        match node {
            SchemaNode::Object { children } => children,
            other => panic!("expected object, got {:?}", other),
        }
    }

    #[test]
    fn parses_nested_objects_in_declaration_order() {
        let schema = json!({
            "type": "object",
            "properties": {
                "zeta": {"type": "integer"},
                "address": {
                    "type": ["null", "object"],
                    "properties": {"city": {"type": "string"}}
                },
                "alpha": {"type": ["null", "string"], "format": "date-time"}
            }
        });
        let root = children(SchemaNode::parse(&schema).unwrap());
        let names: Vec<&str> = root.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["zeta", "address", "alpha"]);
        assert!(root[1].1.is_object());
        assert_eq!(
            root[2].1,
            SchemaNode::Scalar(ScalarSchema::new([Kind::Null, Kind::String], Some("date-time")))
        );
    }

    #[test]
    fn object_without_properties_is_scalar() {
        let schema = json!({"properties": {"blob": {"type": "object"}}});
        let root = children(SchemaNode::parse(&schema).unwrap());
        assert_eq!(root[0].1, SchemaNode::Scalar(ScalarSchema::new([Kind::Object], None)));
    }

    #[test]
    fn any_of_takes_first_alternative() {
        let schema = json!({"properties": {
            "v": {"anyOf": [{"type": "integer"}, {"type": "string"}]}
        }});
        let root = children(SchemaNode::parse(&schema).unwrap());
        assert_eq!(root[0].1, SchemaNode::Scalar(ScalarSchema::new([Kind::Integer], None)));
    }

    #[test]
    fn untyped_properties() {
        let schema = json!({"properties": {
            "empty": {},
            "tags": {"items": [{"type": "array"}]},
            "label": {"oneOf": [{"type": "string", "format": "date"}]},
            "weird": {"oneOf": [{"type": "integer"}]},
            "weirder": {"description": "no type here"}
        }});
        let root = children(SchemaNode::parse(&schema).unwrap());
        let names: Vec<&str> = root.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["tags", "label"]);
        assert_eq!(
            root[0].1,
            SchemaNode::Scalar(ScalarSchema::new([Kind::Null, Kind::Array], None))
        );
        assert_eq!(
            root[1].1,
            SchemaNode::Scalar(ScalarSchema::new([Kind::Null, Kind::String], Some("date")))
        );
    }

    #[test]
    fn unknown_kind_names_are_ignored() {
        let schema = json!({"properties": {"v": {"type": ["null", "decimal"]}}});
        let root = children(SchemaNode::parse(&schema).unwrap());
        assert_eq!(root[0].1, SchemaNode::Scalar(ScalarSchema::new([Kind::Null], None)));
    }

    #[test]
    fn rejects_malformed_schemas() {
        assert!(SchemaNode::parse(&json!({"type": "object"})).is_err());
        assert!(SchemaNode::parse(&json!({"properties": []})).is_err());
        assert!(SchemaNode::parse(&json!({"properties": {"v": true}})).is_err());
        assert!(SchemaNode::parse(&json!({"properties": {"v": {"type": 3}}})).is_err());
        assert!(SchemaNode::parse(&json!({"properties": {"v": {"anyOf": []}}})).is_err());
    }
}
