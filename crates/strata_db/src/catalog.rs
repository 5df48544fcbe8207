//! Live catalog lookups.

use crate::backend::SqlExecutor;
use crate::error::Result;
use crate::value::DbValue;

/// A column as reported by the live catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    pub name: String,
    /// Type name exactly as the catalog spells it.
    pub data_type: String,
}

fn text_params(values: Vec<&str>) -> Vec<DbValue> {
    values.into_iter().map(DbValue::from).collect()
}

pub fn table_exists<E: SqlExecutor + ?Sized>(db: &mut E, namespace: &str, table: &str) -> Result<bool> {
    let dialect = db.dialect();
    let sql = dialect.table_exists_sql(namespace);
    let params = text_params(dialect.table_exists_binds(namespace, table));
    let count: i64 = db.query_one(&sql, &params)?.get(0)?;
    Ok(count > 0)
}

/// Columns of `namespace.table` in ordinal order; empty when the table does not exist.
pub fn live_columns<E: SqlExecutor + ?Sized>(
    db: &mut E,
    namespace: &str,
    table: &str,
) -> Result<Vec<LiveColumn>> {
    let dialect = db.dialect();
    let params = text_params(dialect.table_columns_binds(namespace, table));
    let rows = db.query_all(dialect.table_columns_sql(), &params)?;
    rows.into_iter()
        .map(|row| -> Result<LiveColumn> {
            Ok(LiveColumn {
                name: row.get(0)?,
                data_type: row.get(1)?,
            })
        })
        .collect()
}

/// Whether a session-scoped temporary table named `table` exists.
pub fn temp_table_exists<E: SqlExecutor + ?Sized>(db: &mut E, table: &str) -> Result<bool> {
    let sql = db.dialect().temp_table_exists_sql();
    let count: i64 = db.query_one(sql, &[DbValue::from(table)])?.get(0)?;
    Ok(count > 0)
}
