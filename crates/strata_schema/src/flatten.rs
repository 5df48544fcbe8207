//! Flattening nested schemas and records into a single column namespace.

use serde_json::{Map, Value};
use std::collections::btree_map::{self, BTreeMap};
use tracing::debug;

use crate::column_type::{ColumnType, ColumnTypeStrategy};
use crate::error::{display_path, Result, SchemaError};
use crate::naming::column_name;
use crate::node::{ScalarSchema, SchemaNode};

/// One column of a flattened schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatColumn {
    /// Property path that produced this column.
    pub path: Vec<String>,
    pub schema: ScalarSchema,
}

impl FlatColumn {
    pub fn column_type(&self, strategy: ColumnTypeStrategy) -> ColumnType {
        self.schema.column_type(strategy)
    }
}

/// Generated column name → leaf schema, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenedSchema {
    columns: BTreeMap<String, FlatColumn>,
}

impl FlattenedSchema {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FlatColumn> {
        self.columns.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlatColumn)> {
        self.columns.iter().map(|(name, col)| (name.as_str(), col))
    }

    /// Column names with their resolved types, in name order.
    pub fn column_types(&self, strategy: ColumnTypeStrategy) -> Vec<(String, ColumnType)> {
        self.columns
            .iter()
            .map(|(name, col)| (name.clone(), col.column_type(strategy)))
            .collect()
    }

    fn insert(&mut self, name: String, column: FlatColumn) -> Result<()> {
        match self.columns.entry(name) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(column);
                Ok(())
            }
            btree_map::Entry::Occupied(existing) => Err(SchemaError::Conflict {
                name: existing.key().clone(),
                first_path: display_path(&existing.get().path),
                second_path: display_path(&column.path),
            }),
        }
    }
}

/// Register every scalar leaf under its generated column name.
///
/// Fails on the first name produced by two distinct paths.
pub fn flatten_schema(root: &SchemaNode) -> Result<FlattenedSchema> {
    let SchemaNode::Object { children } = root else {
        return Err(SchemaError::invalid_schema(&[], "root schema must be an object"));
    };
    let mut flattened = FlattenedSchema::default();
    let mut path = Vec::new();
    flatten_children(children, &mut path, &mut flattened)?;
    Ok(flattened)
}

fn flatten_children(
    children: &[(String, SchemaNode)],
    path: &mut Vec<String>,
    out: &mut FlattenedSchema,
) -> Result<()> {
    for (name, node) in children {
        path.push(name.clone());
        match node {
            SchemaNode::Object { children } => flatten_children(children, path, out)?,
            SchemaNode::Scalar(schema) => {
                let column = column_name(path.as_slice())?;
                out.insert(
                    column,
                    FlatColumn {
                        path: path.clone(),
                        schema: schema.clone(),
                    },
                )?;
            }
        }
        path.pop();
    }
    Ok(())
}

/// Flatten a record value to generated column name → value.
///
/// Nested objects contribute their leaves and also their own path holding the
/// whole object as JSON text. Arrays become JSON text. Keys that cannot be
/// named are dropped; they never match a schema column.
pub fn flatten_record(record: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    if let Some(obj) = record.as_object() {
        let mut path = Vec::new();
        flatten_object(obj, &mut path, &mut out);
    }
    out
}

fn flatten_object(
    obj: &Map<String, Value>,
    path: &mut Vec<String>,
    out: &mut BTreeMap<String, Value>,
) {
    for (key, value) in obj {
        path.push(key.clone());
        match column_name(path.as_slice()) {
            Ok(name) => {
                let flat = match value {
                    Value::Object(nested) => {
                        flatten_object(nested, path, out);
                        Value::String(value.to_string())
                    }
                    Value::Array(_) => Value::String(value.to_string()),
                    scalar => scalar.clone(),
                };
                out.insert(name, flat);
            }
            Err(err) => debug!(
                key = %display_path(path.as_slice()),
                error = %err,
                "Dropping unnameable record key"
            ),
        }
        path.pop();
    }
}
