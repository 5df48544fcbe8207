//! Per-stream table synchronization: DDL reconciliation and staged batch loads.

mod sql;

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use strata_db::{catalog, quote_qualified, BackendError, BulkColumn, DbValue, SqlExecutor};
use strata_schema::{flatten_record, ColumnType, ColumnTypeStrategy, StreamDescriptor};

use crate::evolution::{plan_alterations, AlterAction, AlterationPlan};
use crate::observer::{SyncEvent, SyncObserver, TracingObserver};
use crate::{Result, SyncError};

/// Target namespace and type strategy shared by every stream of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub schema_namespace: String,
    pub column_types: ColumnTypeStrategy,
}

impl SyncConfig {
    pub fn new(schema_namespace: impl Into<String>, column_types: ColumnTypeStrategy) -> Self {
        Self {
            schema_namespace: schema_namespace.into(),
            column_types,
        }
    }
}

/// Phases of a batch load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchState {
    StagingCreate,
    BulkIngest,
    Merge,
    BlindInsert,
    StagingDrop,
    Done,
    Aborted,
}

impl BatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchState::StagingCreate => "staging_create",
            BatchState::BulkIngest => "bulk_ingest",
            BatchState::Merge => "merge",
            BatchState::BlindInsert => "blind_insert",
            BatchState::StagingDrop => "staging_drop",
            BatchState::Done => "done",
            BatchState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for BatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub rows_staged: u64,
    pub rows_updated: u64,
    pub rows_inserted: u64,
}

/// Outcome of [`StreamSync::ensure_table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableSync {
    Created { columns: usize },
    /// Table existed; the plan has been applied (possibly empty).
    Altered(AlterationPlan),
}

/// Keeps one stream's target table in line with its schema and loads batches into it.
pub struct StreamSync {
    descriptor: StreamDescriptor,
    config: SyncConfig,
    columns: Vec<(String, ColumnType)>,
    observer: Arc<dyn SyncObserver>,
}

impl fmt::Debug for StreamSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSync")
            .field("stream", &self.descriptor.stream())
            .field("table", &self.descriptor.table_name())
            .field("columns", &self.columns.len())
            .finish()
    }
}

impl StreamSync {
    pub fn new(descriptor: StreamDescriptor, config: SyncConfig) -> Result<Self> {
        Self::with_observer(descriptor, config, Arc::new(TracingObserver))
    }

    pub fn with_observer(
        descriptor: StreamDescriptor,
        config: SyncConfig,
        observer: Arc<dyn SyncObserver>,
    ) -> Result<Self> {
        if descriptor.schema().is_empty() {
            return Err(SyncError::NoColumns {
                stream: descriptor.stream().to_string(),
            });
        }
        let columns = descriptor.schema().column_types(config.column_types);
        Ok(Self {
            descriptor,
            config,
            columns,
            observer,
        })
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    /// Resolved `(column, type)` pairs in name order; row values follow this order.
    pub fn columns(&self) -> &[(String, ColumnType)] {
        &self.columns
    }

    fn target(&self) -> String {
        quote_qualified(&self.config.schema_namespace, self.descriptor.table_name())
    }

    fn emit(&self, event: SyncEvent) {
        self.observer.on_event(&event);
    }

    fn table_label(&self) -> String {
        format!(
            "{}.{}",
            self.config.schema_namespace,
            self.descriptor.table_name()
        )
    }

    /// Create the target table, or bring an existing one up to the current schema.
    pub fn ensure_table<E: SqlExecutor + ?Sized>(&self, db: &mut E) -> Result<TableSync> {
        let namespace = self.config.schema_namespace.as_str();
        let table = self.descriptor.table_name();
        db.ensure_namespace(namespace)?;

        if !catalog::table_exists(db, namespace, table)? {
            let sql = sql::create_table(&self.target(), &self.columns, self.descriptor.key_columns());
            debug!(sql = %sql, "Creating table");
            db.execute(&sql, &[])?;
            self.emit(SyncEvent::TableCreated {
                table: self.table_label(),
                columns: self.columns.len(),
            });
            return Ok(TableSync::Created {
                columns: self.columns.len(),
            });
        }

        let live = catalog::live_columns(db, namespace, table)?;
        let plan = plan_alterations(&self.columns, &live);
        self.check_key_replaces(&plan)?;
        for action in plan.actions() {
            for statement in action.statements(namespace, table) {
                debug!(sql = %statement, "Altering table");
                db.execute(&statement, &[])?;
            }
            self.emit(SyncEvent::ColumnAltered {
                table: self.table_label(),
                action: action.clone(),
            });
        }
        Ok(TableSync::Altered(plan))
    }

    /// A replace drops the column, which would drop the primary key with it.
    fn check_key_replaces(&self, plan: &AlterationPlan) -> Result<()> {
        let keys = self.descriptor.key_columns();
        for action in plan.replaces() {
            let AlterAction::Replace { name, from, to } = action else {
                continue;
            };
            if keys.iter().any(|k| k.eq_ignore_ascii_case(name)) {
                return Err(SyncError::KeyColumnReplace {
                    table: self.table_label(),
                    column: name.clone(),
                    from: from.clone(),
                    to: to.clone(),
                });
            }
        }
        Ok(())
    }

    /// Stage `rows` (values in [`StreamSync::columns`] order) and fold them into the target.
    ///
    /// Keyed streams merge on the key columns; keyless streams append. The staging
    /// relation is dropped whether or not the load succeeds.
    pub fn load_batch<E: SqlExecutor + ?Sized>(
        &self,
        db: &mut E,
        rows: &[Vec<DbValue>],
    ) -> Result<BatchReport> {
        if rows.is_empty() {
            return Ok(BatchReport::default());
        }

        let staging = quote_qualified(
            db.dialect().temp_namespace(),
            self.descriptor.staging_table_name(),
        );
        let mut state = BatchState::StagingCreate;
        match self.run_batch(db, rows, &staging, &mut state) {
            Ok(report) => {
                self.transition(&mut state, BatchState::Done);
                self.emit(SyncEvent::BatchLoaded {
                    table: self.table_label(),
                    report,
                });
                Ok(report)
            }
            Err(source) => {
                let failed_in = state;
                self.transition(&mut state, BatchState::Aborted);
                if let Err(err) = db.execute(&sql::drop_staging(&staging), &[]) {
                    self.emit(SyncEvent::StagingCleanupFailed {
                        table: self.descriptor.staging_table_name().to_string(),
                        error: err.to_string(),
                    });
                }
                Err(SyncError::BatchAborted {
                    state: failed_in,
                    source: Box::new(source),
                })
            }
        }
    }

    fn transition(&self, state: &mut BatchState, next: BatchState) {
        *state = next;
        self.emit(SyncEvent::BatchState {
            table: self.table_label(),
            state: next,
        });
    }

    fn run_batch<E: SqlExecutor + ?Sized>(
        &self,
        db: &mut E,
        rows: &[Vec<DbValue>],
        staging: &str,
        state: &mut BatchState,
    ) -> std::result::Result<BatchReport, BackendError> {
        let mut report = BatchReport::default();
        let target = self.target();
        let keys = self.descriptor.key_columns();

        self.transition(state, BatchState::StagingCreate);
        db.execute(&sql::drop_staging(staging), &[])?;
        db.execute(
            &sql::create_staging(self.descriptor.staging_table_name(), &self.columns),
            &[],
        )?;

        self.transition(state, BatchState::BulkIngest);
        let bulk_columns: Vec<BulkColumn<'_>> = self
            .columns
            .iter()
            .map(|(name, ty)| BulkColumn::new(name, ty.as_sql()))
            .collect();
        let staging_path = format!(
            "{}.{}",
            db.dialect().temp_namespace(),
            self.descriptor.staging_table_name()
        );
        report.rows_staged = db.bulk_insert_rows(&staging_path, &bulk_columns, rows)?;

        if self.descriptor.has_keys() {
            self.transition(state, BatchState::Merge);
            if let Some(update) = sql::merge_update(&target, staging, &self.columns, keys) {
                debug!(sql = %update, "Merging staged rows");
                report.rows_updated = db.execute(&update, &[])?;
            }
            let insert = sql::merge_insert(&target, staging, &self.columns, keys);
            debug!(sql = %insert, "Merging staged rows");
            report.rows_inserted = db.execute(&insert, &[])?;
        } else {
            self.transition(state, BatchState::BlindInsert);
            let insert = sql::blind_insert(&target, staging, &self.columns);
            debug!(sql = %insert, "Appending staged rows");
            report.rows_inserted = db.execute(&insert, &[])?;
        }

        self.transition(state, BatchState::StagingDrop);
        db.execute(&sql::drop_staging(staging), &[])?;

        Ok(report)
    }

    /// One value per resolved column, in [`StreamSync::columns`] order.
    pub fn record_to_row(&self, record: &Value) -> Vec<DbValue> {
        let flat = flatten_record(record);
        self.columns
            .iter()
            .map(|(name, ty)| match flat.get(name) {
                None | Some(Value::Null) => DbValue::Null,
                Some(value) if ty.is_json() => DbValue::Text(json_text(value)),
                Some(value) => scalar_value(value),
            })
            .collect()
    }

    /// Comma-joined key values of `record`, used to detect repeated keys within a batch.
    ///
    /// `None` for keyless streams and empty records.
    pub fn record_primary_key_string(&self, record: &Value) -> Result<Option<String>> {
        let keys = self.descriptor.key_columns();
        if keys.is_empty() {
            return Ok(None);
        }
        let flat = flatten_record(record);
        if flat.is_empty() {
            return Ok(None);
        }

        let mut parts = Vec::with_capacity(keys.len());
        for key in keys {
            match flat.get(key) {
                None | Some(Value::Null) => {
                    return Err(SyncError::MissingKeyProperty {
                        stream: self.descriptor.stream().to_string(),
                        column: key.clone(),
                    })
                }
                Some(Value::String(s)) => parts.push(s.clone()),
                Some(other) => parts.push(other.to_string()),
            }
        }
        Ok(Some(parts.join(",")))
    }
}

/// Strings that already hold JSON pass through; anything else is serialized.
fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) if serde_json::from_str::<Value>(s).is_ok() => s.clone(),
        other => other.to_string(),
    }
}

fn scalar_value(value: &Value) -> DbValue {
    match value {
        Value::Null => DbValue::Null,
        Value::Bool(b) => DbValue::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                DbValue::Integer(i)
            } else if n.is_u64() {
                DbValue::Text(n.to_string())
            } else {
                n.as_f64()
                    .map(DbValue::Real)
                    .unwrap_or_else(|| DbValue::Text(n.to_string()))
            }
        }
        Value::String(s) => DbValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => DbValue::Text(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sync(keys: &[&str]) -> StreamSync {
        let schema = json!({
            "type": "object",
            "properties": {
                "id": {"type": "integer"},
                "name": {"type": ["null", "string"]},
                "score": {"type": "number"},
                "tags": {"type": "array"},
                "address": {
                    "type": "object",
                    "properties": {"city": {"type": "string"}}
                }
            }
        });
        let keys: Vec<Vec<String>> = keys.iter().map(|k| vec![k.to_string()]).collect();
        let descriptor = StreamDescriptor::new("users", &schema, &keys).unwrap();
        StreamSync::new(
            descriptor,
            SyncConfig::new("public", ColumnTypeStrategy::Simple),
        )
        .unwrap()
    }

    #[test]
    fn columns_are_name_ordered() {
        let stream = sync(&["id"]);
        let names: Vec<&str> = stream.columns().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["address__city", "id", "name", "score", "tags"]);
    }

    #[test]
    fn record_to_row_flattens_and_fills_nulls() {
        let row = sync(&["id"]).record_to_row(&json!({
            "id": 7,
            "score": 1.5,
            "tags": ["a", "b"],
            "address": {"city": "Oslo"}
        }));
        assert_eq!(
            row,
            vec![
                DbValue::Text("Oslo".to_string()),
                DbValue::Integer(7),
                DbValue::Null,
                DbValue::Real(1.5),
                DbValue::Text("[\"a\",\"b\"]".to_string()),
            ]
        );
    }

    #[test]
    fn json_columns_keep_valid_json_strings() {
        assert_eq!(json_text(&json!("{\"a\":1}")), "{\"a\":1}");
        assert_eq!(json_text(&json!("plain")), "\"plain\"");
        assert_eq!(json_text(&json!(3)), "3");
    }

    #[test]
    fn primary_key_string_joins_key_values() {
        let sync = sync(&["id", "name"]);
        let key = sync
            .record_primary_key_string(&json!({"id": 1, "name": "ann"}))
            .unwrap();
        assert_eq!(key.as_deref(), Some("1,ann"));
        assert_eq!(sync.record_primary_key_string(&json!({})).unwrap(), None);
    }

    #[test]
    fn primary_key_string_requires_key_values() {
        let err = sync(&["id"])
            .record_primary_key_string(&json!({"name": "ann"}))
            .unwrap_err();
        assert!(matches!(err, SyncError::MissingKeyProperty { ref column, .. } if column == "id"));
    }

    #[test]
    fn keyless_stream_has_no_primary_key_string() {
        assert_eq!(
            sync(&[]).record_primary_key_string(&json!({"id": 1})).unwrap(),
            None
        );
    }

    #[test]
    fn empty_schema_is_rejected() {
        let descriptor =
            StreamDescriptor::new("empty", &json!({"type": "object", "properties": {}}), &[])
                .unwrap();
        let err = StreamSync::new(descriptor, SyncConfig::new("public", ColumnTypeStrategy::Simple))
            .unwrap_err();
        assert!(matches!(err, SyncError::NoColumns { .. }));
    }
}
