//! Database execution layer for strata.
//!
//! A single synchronous connection type covering SQLite and PostgreSQL, the
//! [`SqlExecutor`] seam the replication core is written against, and the few
//! catalog lookups that differ between the two backends.
//!
//! # Usage
//!
//! ```rust,ignore
//! use strata_db::{catalog, DbConnection, SqlExecutor};
//!
//! let mut db = DbConnection::open_from_url("sqlite::memory:")?;
//! db.ensure_namespace("analytics")?;
//! db.execute("CREATE TABLE \"analytics\".\"users\" (\"id\" bigint)", &[])?;
//! assert!(catalog::table_exists(&mut db, "analytics", "users")?);
//! ```

mod backend;
pub mod catalog;
mod dialect;
mod error;
mod quote;
mod value;

pub use backend::{BulkColumn, DbConnection, PostgresParams, SqlExecutor};
pub use catalog::LiveColumn;
pub use dialect::Dialect;
pub use error::{BackendError, Result};
pub use quote::{quote_ident, quote_ident_path, quote_qualified};
pub use value::{DbRow, DbValue, FromDbValue};
