//! Per-stream, read-only view of a resolved schema.

use serde_json::Value;

use crate::error::{display_path, Result, SchemaError};
use crate::flatten::{flatten_schema, FlattenedSchema};
use crate::naming::{column_name, staging_table_name, table_name};
use crate::node::SchemaNode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    stream: String,
    table_name: String,
    staging_table_name: String,
    schema: FlattenedSchema,
    key_columns: Vec<String>,
}

impl StreamDescriptor {
    /// Resolve a stream's JSON schema and key-property paths.
    ///
    /// Every naming and collision failure surfaces here, before any table is touched.
    pub fn new(stream: &str, schema: &Value, key_properties: &[Vec<String>]) -> Result<Self> {
        let node = SchemaNode::parse(schema)?;
        Self::from_node(stream, &node, key_properties)
    }

    pub fn from_node(stream: &str, node: &SchemaNode, key_properties: &[Vec<String>]) -> Result<Self> {
        let table_name = table_name(stream)?;
        let staging_table_name = staging_table_name(&table_name)?;
        let schema = flatten_schema(node)?;

        let mut key_columns = Vec::with_capacity(key_properties.len());
        for path in key_properties {
            let column = column_name(path.as_slice())?;
            if !schema.contains(&column) {
                return Err(SchemaError::UnknownKeyProperty {
                    stream: stream.to_string(),
                    property: display_path(path.as_slice()),
                });
            }
            if !key_columns.contains(&column) {
                key_columns.push(column);
            }
        }

        Ok(Self {
            stream: stream.to_string(),
            table_name,
            staging_table_name,
            schema,
            key_columns,
        })
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn staging_table_name(&self) -> &str {
        &self.staging_table_name
    }

    pub fn schema(&self) -> &FlattenedSchema {
        &self.schema
    }

    /// Generated names of the key columns, in declaration order.
    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn has_keys(&self) -> bool {
        !self.key_columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(paths: &[&[&str]]) -> Vec<Vec<String>> {
        paths
            .iter()
            .map(|p| p.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn builds_names_and_keys() {
        let schema = json!({"properties": {
            "Id": {"type": "integer"},
            "meta": {"type": "object", "properties": {"tenantId": {"type": "string"}}}
        }});
        let desc = StreamDescriptor::new("UserEvents", &schema, &keys(&[&["Id"], &["meta", "tenantId"]]))
            .unwrap();
        assert_eq!(desc.stream(), "UserEvents");
        assert_eq!(desc.table_name(), "user_events");
        assert_eq!(desc.staging_table_name(), "user_events_temp");
        assert_eq!(desc.key_columns(), &["id", "meta__tenant_id"]);
        assert_eq!(desc.schema().len(), 2);
    }

    #[test]
    fn unknown_key_property_is_rejected() {
        let schema = json!({"properties": {"id": {"type": "integer"}}});
        let err = StreamDescriptor::new("s", &schema, &keys(&[&["uuid"]])).unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownKeyProperty {
                stream: "s".to_string(),
                property: "uuid".to_string(),
            }
        );
    }

    #[test]
    fn no_keys_is_allowed() {
        let schema = json!({"properties": {"v": {"type": "string"}}});
        let desc = StreamDescriptor::new("log", &schema, &[]).unwrap();
        assert!(!desc.has_keys());
    }
}
