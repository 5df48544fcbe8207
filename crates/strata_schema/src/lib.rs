//! Schema resolution for strata.
//!
//! Turns a stream's JSON Schema into a flat, ordered set of relational columns:
//!
//! - [`lattice`]: the castable-to relation between JSON Schema kinds and the
//!   most-general-kind search over it.
//! - [`column_type`]: kind sets to relational column types, by either the
//!   simple cascade or the lattice.
//! - [`naming`]: snake_case segment normalization and length-bounded path names.
//! - [`node`] / [`flatten`]: schema parsing, schema flattening, record flattening.
//! - [`descriptor`]: the per-stream result everything downstream reads.
//!
//! Nothing in this crate touches a database.

pub mod column_type;
pub mod descriptor;
pub mod error;
pub mod flatten;
pub mod lattice;
pub mod naming;
pub mod node;

pub use column_type::{column_type_generalized, column_type_simple, ColumnType, ColumnTypeStrategy};
pub use descriptor::StreamDescriptor;
pub use error::{Result, SchemaError};
pub use flatten::{flatten_record, flatten_schema, FlatColumn, FlattenedSchema};
pub use lattice::{most_general_type, Kind};
pub use naming::{
    column_name, inflect_name, staging_table_name, table_name, MAX_IDENTIFIER_LEN, PATH_SEPARATOR,
};
pub use node::{ScalarSchema, SchemaNode};
