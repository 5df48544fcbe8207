//! Relational column types and the two kind→type strategies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::lattice::{most_general_type, Kind};

pub const FORMAT_DATE_TIME: &str = "date-time";
pub const FORMAT_DATE: &str = "date";

/// A relational column type, spelled the way the PostgreSQL catalog reports it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Text,
    Numeric,
    BigInt,
    Boolean,
    Jsonb,
    TimestampTz,
    Date,
    /// Never produced from a schema; only observed on live tables.
    Timestamp,
    /// Any other live type name, lowercased.
    Other(String),
}

impl ColumnType {
    pub fn as_sql(&self) -> &str {
        match self {
            ColumnType::Text => "character varying",
            ColumnType::Numeric => "numeric",
            ColumnType::BigInt => "bigint",
            ColumnType::Boolean => "boolean",
            ColumnType::Jsonb => "jsonb",
            ColumnType::TimestampTz => "timestamp with time zone",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp without time zone",
            ColumnType::Other(name) => name.as_str(),
        }
    }

    /// Parse a type name reported by a live catalog. Case-insensitive; never fails.
    pub fn from_catalog(name: &str) -> Self {
        let normalized = name.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "character varying" => ColumnType::Text,
            "numeric" => ColumnType::Numeric,
            "bigint" => ColumnType::BigInt,
            "boolean" => ColumnType::Boolean,
            "jsonb" => ColumnType::Jsonb,
            "timestamp with time zone" => ColumnType::TimestampTz,
            "date" => ColumnType::Date,
            "timestamp without time zone" => ColumnType::Timestamp,
            _ => ColumnType::Other(normalized),
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, ColumnType::Jsonb)
    }

    /// Direct mapping of a resolved kind. Null and unmapped kinds become text.
    pub fn for_kind(kind: Kind) -> Self {
        match kind {
            Kind::String => ColumnType::Text,
            Kind::Number => ColumnType::Numeric,
            Kind::Integer => ColumnType::BigInt,
            Kind::Boolean => ColumnType::Boolean,
            Kind::Object | Kind::Array => ColumnType::Jsonb,
            Kind::Null => ColumnType::Text,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// How a scalar schema's kinds become a column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnTypeStrategy {
    /// Fixed precedence cascade over the declared kinds.
    #[default]
    Simple,
    /// Most general kind from the lattice.
    Generalized,
}

impl ColumnTypeStrategy {
    pub fn from_use_simple(use_simple: bool) -> Self {
        if use_simple {
            ColumnTypeStrategy::Simple
        } else {
            ColumnTypeStrategy::Generalized
        }
    }

    pub fn resolve(&self, kinds: &BTreeSet<Kind>, format: Option<&str>) -> ColumnType {
        match self {
            ColumnTypeStrategy::Simple => column_type_simple(kinds, format),
            ColumnTypeStrategy::Generalized => column_type_generalized(kinds, format),
        }
    }
}

/// Lattice strategy. Formats only refine a column that resolved to `string`.
pub fn column_type_generalized(kinds: &BTreeSet<Kind>, format: Option<&str>) -> ColumnType {
    let kind = most_general_type(kinds);
    if kind == Kind::String {
        match format {
            Some(FORMAT_DATE_TIME) => return ColumnType::TimestampTz,
            Some(FORMAT_DATE) => return ColumnType::Date,
            _ => {}
        }
    }
    ColumnType::for_kind(kind)
}

/// Cascade strategy; first matching rule wins.
pub fn column_type_simple(kinds: &BTreeSet<Kind>, format: Option<&str>) -> ColumnType {
    let has = |kind: Kind| kinds.contains(&kind);

    if has(Kind::Object) || has(Kind::Array) {
        ColumnType::Jsonb
    } else if format == Some(FORMAT_DATE_TIME) {
        ColumnType::TimestampTz
    } else if format == Some(FORMAT_DATE) {
        ColumnType::Date
    } else if has(Kind::Number) {
        ColumnType::Numeric
    } else if has(Kind::Integer) && has(Kind::String) {
        ColumnType::Text
    } else if has(Kind::Boolean) {
        ColumnType::Boolean
    } else if has(Kind::Integer) {
        ColumnType::BigInt
    } else {
        ColumnType::Text
    }
}
