//! Database backend abstraction layer.
//!
//! Synchronous facade over sqlx. One [`DbConnection`] owns exactly one database
//! session (temporary staging tables are session-scoped) and a current-thread
//! tokio runtime that every call blocks on.

use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Row, TypeInfo, ValueRef};
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug_span, info};

use crate::dialect::Dialect;
use crate::error::{BackendError, Result};
use crate::quote::{hash_sql, quote_ident, quote_ident_path, sql_op_name};
use crate::value::{DbRow, DbValue, FromDbValue};

/// Target column of a bulk insert, with the SQL type the value is written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BulkColumn<'a> {
    pub name: &'a str,
    pub sql_type: &'a str,
}

impl<'a> BulkColumn<'a> {
    pub fn new(name: &'a str, sql_type: &'a str) -> Self {
        Self { name, sql_type }
    }
}

/// Statement execution as seen by the replication core.
pub trait SqlExecutor {
    fn dialect(&self) -> Dialect;

    /// Execute a statement, returning the affected row count.
    fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64>;

    fn query_all(&mut self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>>;

    /// Append rows to `table` (a dotted path is quoted per segment).
    /// Row values are in `columns` order.
    fn bulk_insert_rows(
        &mut self,
        table: &str,
        columns: &[BulkColumn<'_>],
        rows: &[Vec<DbValue>],
    ) -> Result<u64>;

    /// Make `namespace` addressable as a table qualifier, creating it if needed.
    fn ensure_namespace(&mut self, namespace: &str) -> Result<()>;

    fn query_optional(&mut self, sql: &str, params: &[DbValue]) -> Result<Option<DbRow>> {
        let rows = self.query_all(sql, params)?;
        Ok(rows.into_iter().next())
    }

    fn query_one(&mut self, sql: &str, params: &[DbValue]) -> Result<DbRow> {
        self.query_optional(sql, params)?
            .ok_or_else(|| BackendError::query("Expected one row, got none"))
    }

    fn query_scalar<T: FromDbValue>(&mut self, sql: &str, params: &[DbValue]) -> Result<T>
    where
        Self: Sized,
    {
        self.query_one(sql, params)?.get(0)
    }
}

/// Discrete PostgreSQL connection parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostgresParams {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub dbname: Option<String>,
}

enum Backend {
    Sqlite(SqliteConnection),
    Postgres(PgConnection),
}

/// Unified database connection.
pub struct DbConnection {
    runtime: tokio::runtime::Runtime,
    backend: Backend,
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConnection")
            .field("backend", &self.dialect().as_str())
            .finish()
    }
}

impl DbConnection {
    /// Open a database from a URL.
    ///
    /// Supported schemes: sqlite:, postgres://, postgresql://
    pub fn open_from_url(url: &str) -> Result<Self> {
        if url.starts_with("sqlite:") {
            let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
            return Self::open_sqlite_with(options);
        }
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            let options = PgConnectOptions::from_str(url)?;
            return Self::open_postgres_with(options);
        }

        Err(BackendError::NotAvailable(format!(
            "Unsupported database URL scheme: {}",
            url.split(':').next().unwrap_or(url)
        )))
    }

    /// Open (creating if missing) a SQLite database file.
    pub fn open_sqlite(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        Self::open_sqlite_with(options)
    }

    /// Open an in-memory SQLite database (for testing).
    pub fn open_sqlite_memory() -> Result<Self> {
        Self::open_sqlite_with(SqliteConnectOptions::from_str("sqlite::memory:")?)
    }

    pub fn open_postgres(params: &PostgresParams) -> Result<Self> {
        let mut options = PgConnectOptions::new()
            .host(&params.host)
            .port(params.port);
        if let Some(user) = params.user.as_deref() {
            options = options.username(user);
        }
        if let Some(password) = params.password.as_deref() {
            options = options.password(password);
        }
        if let Some(dbname) = params.dbname.as_deref() {
            options = options.database(dbname);
        }
        Self::open_postgres_with(options)
    }

    fn open_sqlite_with(options: SqliteConnectOptions) -> Result<Self> {
        let runtime = new_runtime()?;
        let conn = runtime.block_on(options.connect())?;
        info!(backend = "sqlite", "Opened database connection");
        Ok(Self {
            runtime,
            backend: Backend::Sqlite(conn),
        })
    }

    fn open_postgres_with(options: PgConnectOptions) -> Result<Self> {
        let runtime = new_runtime()?;
        let conn = runtime.block_on(options.connect())?;
        info!(backend = "postgres", "Opened database connection");
        Ok(Self {
            runtime,
            backend: Backend::Postgres(conn),
        })
    }

    fn execute_on_backend(&mut self, sql: &str, params: &[DbValue]) -> Result<u64> {
        let op = sql_op_name(sql);
        let sql_hash = hash_sql(sql);
        let span = debug_span!(
            "db.exec",
            op = op,
            sql_hash = %sql_hash,
            duration_ms = tracing::field::Empty
        );
        let _guard = span.enter();
        let start = Instant::now();

        let affected = match &mut self.backend {
            Backend::Sqlite(conn) => {
                let query = bind_sqlite(sqlx::query(sql).persistent(false), params);
                self.runtime.block_on(query.execute(&mut *conn))?.rows_affected()
            }
            Backend::Postgres(conn) => {
                let query = bind_postgres(sqlx::query(sql).persistent(false), params);
                self.runtime.block_on(query.execute(&mut *conn))?.rows_affected()
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        span.record("duration_ms", duration_ms);
        Ok(affected)
    }

    fn query_on_backend(&mut self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>> {
        let op = sql_op_name(sql);
        let sql_hash = hash_sql(sql);
        let span = debug_span!(
            "db.query",
            op = op,
            sql_hash = %sql_hash,
            duration_ms = tracing::field::Empty
        );
        let _guard = span.enter();
        let start = Instant::now();

        let rows = match &mut self.backend {
            Backend::Sqlite(conn) => {
                let query = bind_sqlite(sqlx::query(sql).persistent(false), params);
                let rows = self.runtime.block_on(query.fetch_all(&mut *conn))?;
                rows.iter().map(decode_sqlite_row).collect::<Result<Vec<_>>>()?
            }
            Backend::Postgres(conn) => {
                let query = bind_postgres(sqlx::query(sql).persistent(false), params);
                let rows = self.runtime.block_on(query.fetch_all(&mut *conn))?;
                rows.iter().map(decode_postgres_row).collect::<Result<Vec<_>>>()?
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        span.record("duration_ms", duration_ms);
        Ok(rows)
    }

    fn attach_sqlite_namespace(&mut self, namespace: &str) -> Result<()> {
        if namespace == "main" || namespace == "temp" {
            return Ok(());
        }
        let attached: i64 = self.query_scalar(
            "SELECT COUNT(*) FROM pragma_database_list WHERE name = ?",
            &[DbValue::from(namespace)],
        )?;
        if attached > 0 {
            return Ok(());
        }

        // An in-memory main database reports an empty file name.
        let main_file: Option<String> = self.query_scalar(
            "SELECT file FROM pragma_database_list WHERE name = 'main'",
            &[],
        )?;
        let target = match main_file.as_deref() {
            Some(file) if !file.is_empty() => Path::new(file)
                .with_extension(format!("{}.db", namespace))
                .display()
                .to_string(),
            _ => ":memory:".to_string(),
        };

        let sql = format!("ATTACH DATABASE ? AS {}", quote_ident(namespace));
        self.execute_on_backend(&sql, &[DbValue::from(target.as_str())])?;
        info!(namespace, file = %target, "Attached SQLite namespace");
        Ok(())
    }
}

impl SqlExecutor for DbConnection {
    fn dialect(&self) -> Dialect {
        match self.backend {
            Backend::Sqlite(_) => Dialect::Sqlite,
            Backend::Postgres(_) => Dialect::Postgres,
        }
    }

    fn execute(&mut self, sql: &str, params: &[DbValue]) -> Result<u64> {
        self.execute_on_backend(sql, params)
    }

    fn query_all(&mut self, sql: &str, params: &[DbValue]) -> Result<Vec<DbRow>> {
        self.query_on_backend(sql, params)
    }

    fn bulk_insert_rows(
        &mut self,
        table: &str,
        columns: &[BulkColumn<'_>],
        rows: &[Vec<DbValue>],
    ) -> Result<u64> {
        let dialect = self.dialect();
        bulk_insert_rows_generic(
            &mut |sql: &str, params: &[DbValue]| self.execute_on_backend(sql, params),
            dialect,
            table,
            columns,
            rows,
        )
    }

    fn ensure_namespace(&mut self, namespace: &str) -> Result<()> {
        match self.backend {
            Backend::Sqlite(_) => self.attach_sqlite_namespace(namespace),
            Backend::Postgres(_) => {
                let sql = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(namespace));
                self.execute_on_backend(&sql, &[])?;
                Ok(())
            }
        }
    }
}

fn new_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;
type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn bind_sqlite<'q>(mut query: SqliteQuery<'q>, params: &[DbValue]) -> SqliteQuery<'q> {
    for param in params {
        query = match param {
            DbValue::Null => query.bind(None::<String>),
            DbValue::Integer(v) => query.bind(*v),
            DbValue::Real(v) => query.bind(*v),
            DbValue::Text(v) => query.bind(v.clone()),
            DbValue::Boolean(v) => query.bind(*v),
        };
    }
    query
}

fn bind_postgres<'q>(mut query: PgQuery<'q>, params: &[DbValue]) -> PgQuery<'q> {
    for param in params {
        query = match param {
            DbValue::Null => query.bind(None::<String>),
            DbValue::Integer(v) => query.bind(*v),
            DbValue::Real(v) => query.bind(*v),
            DbValue::Text(v) => query.bind(v.clone()),
            DbValue::Boolean(v) => query.bind(*v),
        };
    }
    query
}

fn column_names<R: Row>(row: &R) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

fn decode_sqlite_row(row: &SqliteRow) -> Result<DbRow> {
    let columns = column_names(row);
    let mut values = Vec::with_capacity(columns.len());
    for index in 0..columns.len() {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            values.push(DbValue::Null);
            continue;
        }
        // Storage class of the value itself, not the declared column type.
        let type_name = raw.type_info().name().to_string();
        let value = match type_name.as_str() {
            "INTEGER" | "BOOLEAN" => DbValue::Integer(row.try_get_unchecked::<i64, _>(index)?),
            "REAL" => DbValue::Real(row.try_get_unchecked::<f64, _>(index)?),
            "TEXT" => DbValue::Text(row.try_get_unchecked::<String, _>(index)?),
            other => {
                return Err(BackendError::type_conversion(format!(
                    "Unsupported SQLite value type {} in column '{}'",
                    other, columns[index]
                )))
            }
        };
        values.push(value);
    }
    Ok(DbRow::new(columns, values))
}

fn decode_postgres_row(row: &PgRow) -> Result<DbRow> {
    let columns = column_names(row);
    let mut values = Vec::with_capacity(columns.len());
    for index in 0..columns.len() {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            values.push(DbValue::Null);
            continue;
        }
        let type_name = raw.type_info().name().to_string();
        let value = match type_name.as_str() {
            "BOOL" => DbValue::Boolean(row.try_get::<bool, _>(index)?),
            "INT2" => DbValue::Integer(row.try_get::<i16, _>(index)? as i64),
            "INT4" => DbValue::Integer(row.try_get::<i32, _>(index)? as i64),
            "INT8" => DbValue::Integer(row.try_get::<i64, _>(index)?),
            "FLOAT4" => DbValue::Real(row.try_get::<f32, _>(index)? as f64),
            "FLOAT8" => DbValue::Real(row.try_get::<f64, _>(index)?),
            "TEXT" | "VARCHAR" | "NAME" | "BPCHAR" | "\"CHAR\"" => {
                DbValue::Text(row.try_get::<String, _>(index)?)
            }
            other => {
                return Err(BackendError::type_conversion(format!(
                    "Unsupported PostgreSQL type {} in column '{}'; cast it to text",
                    other, columns[index]
                )))
            }
        };
        values.push(value);
    }
    Ok(DbRow::new(columns, values))
}

fn bulk_insert_rows_generic<F>(
    execute: &mut F,
    dialect: Dialect,
    table: &str,
    columns: &[BulkColumn<'_>],
    rows: &[Vec<DbValue>],
) -> Result<u64>
where
    F: FnMut(&str, &[DbValue]) -> Result<u64>,
{
    if rows.is_empty() {
        return Ok(0);
    }
    if columns.is_empty() {
        return Err(BackendError::invalid_input(
            "bulk_insert_rows requires at least one column",
        ));
    }

    for (index, row) in rows.iter().enumerate() {
        if row.len() != columns.len() {
            return Err(BackendError::InvalidInput(format!(
                "Row {} has {} values, expected {}",
                index,
                row.len(),
                columns.len()
            )));
        }
    }

    let max_params = dialect.max_params();
    let cols_len = columns.len();
    if cols_len > max_params {
        return Err(BackendError::InvalidInput(format!(
            "Too many columns ({}) for max params ({})",
            cols_len, max_params
        )));
    }
    let rows_per_chunk = max_params / cols_len;

    let quoted_table = quote_ident_path(table);
    let quoted_cols = columns
        .iter()
        .map(|col| quote_ident(col.name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut total = 0;
    for chunk in rows.chunks(rows_per_chunk) {
        let mut param_index = 0;
        let values_clause = chunk
            .iter()
            .map(|_| {
                let placeholders = columns
                    .iter()
                    .map(|col| {
                        param_index += 1;
                        dialect.bulk_placeholder(param_index, col.sql_type)
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("({})", placeholders)
            })
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            quoted_table, quoted_cols, values_clause
        );

        let mut params = Vec::with_capacity(chunk.len() * cols_len);
        for row in chunk {
            for value in row {
                params.push(match dialect {
                    Dialect::Postgres => DbValue::from(value.to_text()),
                    Dialect::Sqlite => value.clone(),
                });
            }
        }
        execute(&sql, &params)?;
        total += chunk.len() as u64;
    }

    Ok(total)
}
