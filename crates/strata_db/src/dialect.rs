//! Per-backend SQL differences: placeholders, parameter limits, catalog queries.
//!
//! Everything else (DDL, merges) is written once in the PostgreSQL dialect and
//! runs unchanged on SQLite.

use std::fmt;

use crate::quote::quote_ident;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }

    /// Schema name that always resolves to the session's temporary tables.
    pub fn temp_namespace(&self) -> &'static str {
        match self {
            Dialect::Postgres => "pg_temp",
            Dialect::Sqlite => "temp",
        }
    }

    /// Maximum bind parameters per statement.
    pub fn max_params(&self) -> usize {
        match self {
            Dialect::Postgres => 65_535,
            Dialect::Sqlite => 999,
        }
    }

    /// Placeholder for the 1-based parameter `index` bound into a column of `sql_type`.
    ///
    /// PostgreSQL receives text and casts server-side; SQLite binds native values.
    pub fn bulk_placeholder(&self, index: usize, sql_type: &str) -> String {
        match self {
            Dialect::Postgres => format!("CAST(${} AS {})", index, sql_type),
            Dialect::Sqlite => "?".to_string(),
        }
    }

    /// `(namespace, table) -> COUNT(*)`
    pub fn table_exists_sql(&self, namespace: &str) -> String {
        match self {
            Dialect::Postgres => "SELECT COUNT(*) FROM information_schema.tables \
                 WHERE table_schema = $1 AND table_name = $2"
                .to_string(),
            Dialect::Sqlite => format!(
                "SELECT COUNT(*) FROM {}.sqlite_master WHERE type = 'table' AND name = ?",
                quote_ident(namespace)
            ),
        }
    }

    /// Parameter list for [`Dialect::table_exists_sql`].
    pub fn table_exists_binds<'a>(&self, namespace: &'a str, table: &'a str) -> Vec<&'a str> {
        match self {
            Dialect::Postgres => vec![namespace, table],
            Dialect::Sqlite => vec![table],
        }
    }

    /// `(namespace, table) -> (column name, type name)` in ordinal order.
    pub fn table_columns_sql(&self) -> &'static str {
        match self {
            Dialect::Postgres => {
                "SELECT column_name::text, data_type::text FROM information_schema.columns \
                 WHERE table_schema = $1 AND table_name = $2 ORDER BY ordinal_position"
            }
            Dialect::Sqlite => "SELECT name, type FROM pragma_table_info(?, ?) ORDER BY cid",
        }
    }

    pub fn table_columns_binds<'a>(&self, namespace: &'a str, table: &'a str) -> Vec<&'a str> {
        match self {
            Dialect::Postgres => vec![namespace, table],
            Dialect::Sqlite => vec![table, namespace],
        }
    }

    /// `(table) -> COUNT(*)` of session-scoped temporary tables with that name.
    pub fn temp_table_exists_sql(&self) -> &'static str {
        match self {
            Dialect::Postgres => {
                "SELECT COUNT(*) FROM pg_catalog.pg_tables \
                 WHERE schemaname LIKE 'pg_temp%' AND tablename = $1"
            }
            Dialect::Sqlite => {
                "SELECT COUNT(*) FROM sqlite_temp_master WHERE type = 'table' AND name = ?"
            }
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_per_dialect() {
        assert_eq!(Dialect::Postgres.bulk_placeholder(3, "jsonb"), "CAST($3 AS jsonb)");
        assert_eq!(Dialect::Sqlite.bulk_placeholder(3, "jsonb"), "?");
    }

    #[test]
    fn sqlite_catalog_is_namespace_qualified() {
        assert_eq!(
            Dialect::Sqlite.table_exists_sql("analytics"),
            "SELECT COUNT(*) FROM \"analytics\".sqlite_master WHERE type = 'table' AND name = ?"
        );
        assert_eq!(Dialect::Sqlite.table_exists_binds("ns", "t"), vec!["t"]);
        assert_eq!(Dialect::Sqlite.table_columns_binds("ns", "t"), vec!["t", "ns"]);
        assert_eq!(Dialect::Postgres.table_columns_binds("ns", "t"), vec!["ns", "t"]);
    }
}
