//! Backend-neutral parameter and row values.

use crate::error::{BackendError, Result};

/// Value type for query parameters and result cells.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
}

impl DbValue {
    pub fn is_null(&self) -> bool {
        matches!(self, DbValue::Null)
    }

    /// Text rendering used when the server casts the value itself.
    pub fn to_text(&self) -> Option<String> {
        match self {
            DbValue::Null => None,
            DbValue::Integer(v) => Some(v.to_string()),
            DbValue::Real(v) => Some(v.to_string()),
            DbValue::Text(v) => Some(v.clone()),
            DbValue::Boolean(v) => Some(v.to_string()),
        }
    }
}

impl From<i32> for DbValue {
    fn from(v: i32) -> Self {
        DbValue::Integer(v as i64)
    }
}

impl From<i64> for DbValue {
    fn from(v: i64) -> Self {
        DbValue::Integer(v)
    }
}

impl From<f64> for DbValue {
    fn from(v: f64) -> Self {
        DbValue::Real(v)
    }
}

impl From<String> for DbValue {
    fn from(v: String) -> Self {
        DbValue::Text(v)
    }
}

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        DbValue::Text(v.to_string())
    }
}

impl From<bool> for DbValue {
    fn from(v: bool) -> Self {
        DbValue::Boolean(v)
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => DbValue::Null,
        }
    }
}

/// Row data from a query result.
#[derive(Debug, Clone, PartialEq)]
pub struct DbRow {
    columns: Vec<String>,
    values: Vec<DbValue>,
}

impl DbRow {
    pub fn new(columns: Vec<String>, values: Vec<DbValue>) -> Self {
        Self { columns, values }
    }

    /// Get a value by column index. Conversion errors name the column.
    pub fn get<T: FromDbValue>(&self, index: usize) -> Result<T> {
        let value = self.values.get(index).ok_or_else(|| {
            BackendError::type_conversion(format!("Column index {} out of bounds", index))
        })?;
        T::from_db_value(value).map_err(|err| match err {
            BackendError::TypeConversion(msg) => {
                let column = self.columns.get(index).map_or("?", String::as_str);
                BackendError::type_conversion(format!("column '{}': {}", column, msg))
            }
            other => other,
        })
    }
}

/// Trait for converting from DbValue.
pub trait FromDbValue: Sized {
    fn from_db_value(value: &DbValue) -> Result<Self>;
}

fn null_error(type_name: &str) -> BackendError {
    BackendError::type_conversion(format!(
        "{type_name} field is NULL - use Option<{type_name}> for nullable columns"
    ))
}

impl FromDbValue for i64 {
    fn from_db_value(value: &DbValue) -> Result<Self> {
        match value {
            DbValue::Integer(v) => Ok(*v),
            DbValue::Null => Err(null_error("i64")),
            _ => Err(BackendError::type_conversion("Expected integer")),
        }
    }
}

impl FromDbValue for f64 {
    fn from_db_value(value: &DbValue) -> Result<Self> {
        match value {
            DbValue::Real(v) => Ok(*v),
            DbValue::Integer(v) => Ok(*v as f64),
            DbValue::Null => Err(null_error("f64")),
            _ => Err(BackendError::type_conversion("Expected real")),
        }
    }
}

impl FromDbValue for String {
    fn from_db_value(value: &DbValue) -> Result<Self> {
        match value {
            DbValue::Text(v) => Ok(v.clone()),
            DbValue::Null => Err(null_error("String")),
            _ => Err(BackendError::type_conversion("Expected text")),
        }
    }
}

impl FromDbValue for bool {
    fn from_db_value(value: &DbValue) -> Result<Self> {
        match value {
            DbValue::Boolean(v) => Ok(*v),
            DbValue::Integer(v) => Ok(*v != 0),
            DbValue::Null => Err(null_error("bool")),
            _ => Err(BackendError::type_conversion("Expected boolean")),
        }
    }
}

impl FromDbValue for DbValue {
    fn from_db_value(value: &DbValue) -> Result<Self> {
        Ok(value.clone())
    }
}

impl<T: FromDbValue> FromDbValue for Option<T> {
    fn from_db_value(value: &DbValue) -> Result<Self> {
        match value {
            DbValue::Null => Ok(None),
            _ => T::from_db_value(value).map(Some),
        }
    }
}
