//! Relational sinks for strata.
//!
//! A [`StreamSync`] owns one stream's resolved schema and keeps its target table
//! in line with it:
//! - table creation and in-place column evolution
//! - staged batch loads merged on key columns, or appended for keyless streams
//! - lifecycle events reported to a [`SyncObserver`]

use thiserror::Error;

use strata_db::BackendError;
use strata_schema::{ColumnType, SchemaError};

pub mod evolution;
pub mod observer;
mod relational;

pub use evolution::{plan_alterations, AlterAction, AlterationPlan};
pub use observer::{SyncEvent, SyncObserver, TracingObserver};
pub use relational::{BatchReport, BatchState, StreamSync, SyncConfig, TableSync};

/// Errors returned by table synchronization and batch loads.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Batch aborted during {state}: {source}")]
    BatchAborted {
        state: BatchState,
        #[source]
        source: Box<BackendError>,
    },
    #[error("Record in stream '{stream}' has no value for key column '{column}'")]
    MissingKeyProperty { stream: String, column: String },
    #[error("Stream '{stream}' has no columns")]
    NoColumns { stream: String },
    #[error("Key column '{column}' of table '{table}' cannot change type: {from} -> {to}")]
    KeyColumnReplace {
        table: String,
        column: String,
        from: ColumnType,
        to: ColumnType,
    },
}

pub type Result<T> = std::result::Result<T, SyncError>;
