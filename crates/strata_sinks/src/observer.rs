//! Lifecycle events emitted by the sync orchestrator.

use tracing::{debug, info, warn};

use crate::evolution::AlterAction;
use crate::relational::{BatchReport, BatchState};

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    TableCreated {
        table: String,
        columns: usize,
    },
    ColumnAltered {
        table: String,
        action: AlterAction,
    },
    BatchState {
        table: String,
        state: BatchState,
    },
    BatchLoaded {
        table: String,
        report: BatchReport,
    },
    StagingCleanupFailed {
        table: String,
        error: String,
    },
}

/// Receives orchestrator events. Injected explicitly into each stream sync.
pub trait SyncObserver: Send + Sync {
    fn on_event(&self, event: &SyncEvent);
}

/// Default observer: forwards every event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_event(&self, event: &SyncEvent) {
        match event {
            SyncEvent::TableCreated { table, columns } => {
                info!(table = %table, columns, "Created table")
            }
            SyncEvent::ColumnAltered { table, action } => {
                info!(table = %table, "{}", action)
            }
            SyncEvent::BatchState { table, state } => {
                debug!(table = %table, state = %state, "Batch state")
            }
            SyncEvent::BatchLoaded { table, report } => info!(
                table = %table,
                staged = report.rows_staged,
                updated = report.rows_updated,
                inserted = report.rows_inserted,
                "Loaded batch"
            ),
            SyncEvent::StagingCleanupFailed { table, error } => {
                warn!(table = %table, error = %error, "Failed to drop staging table")
            }
        }
    }
}
