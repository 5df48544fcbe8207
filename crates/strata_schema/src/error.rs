use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchemaError>;

/// Errors raised while resolving a stream schema into columns.
///
/// All of these are raised before any table is touched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Duplicate column name '{name}' produced by '{first_path}' and '{second_path}'")]
    Conflict {
        name: String,
        first_path: String,
        second_path: String,
    },

    #[error("Column name '{name}' is still {len} characters after abbreviating every segment (limit {limit})")]
    NameLengthExhausted {
        name: String,
        len: usize,
        limit: usize,
    },

    #[error("Invalid property name at '{path}': {reason}")]
    InvalidPropertyName { path: String, reason: String },

    #[error("Invalid schema at '{path}': {reason}")]
    InvalidSchema { path: String, reason: String },

    #[error("Key property '{property}' of stream '{stream}' is not a column of its schema")]
    UnknownKeyProperty { stream: String, property: String },
}

impl SchemaError {
    pub fn invalid_schema(path: &[String], reason: impl Into<String>) -> Self {
        SchemaError::InvalidSchema {
            path: display_path(path),
            reason: reason.into(),
        }
    }
}

/// Render a property path for error messages (`a.b.c`, `<root>` when empty).
pub fn display_path<S: AsRef<str>>(path: &[S]) -> String {
    if path.is_empty() {
        return "<root>".to_string();
    }
    path.iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(".")
}
