//! Line-protocol loader.
//!
//! Reads SCHEMA / RECORD / STATE lines, keeps one pending batch per stream and
//! flushes batches through [`StreamSync`]. A batch never holds two records with
//! the same key: a repeated key flushes the pending rows first.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use strata_db::{DbValue, SqlExecutor};
use strata_protocol::{
    sanitize_line, KeyProperty, Message, ProtocolError, RecordMessage, SchemaMessage,
    TargetConfig,
};
use strata_schema::{ColumnTypeStrategy, SchemaError, StreamDescriptor};
use strata_sinks::{StreamSync, SyncConfig, SyncError, SyncObserver, TableSync, TracingObserver};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Line {line}: {source}")]
    Protocol {
        line: usize,
        #[source]
        source: ProtocolError,
    },

    #[error("A record for stream '{stream}' was encountered before a corresponding schema")]
    RecordBeforeSchema { stream: String },

    #[error("Schema message for stream '{stream}' has no key_properties field")]
    MissingKeyProperties { stream: String },

    #[error("Invalid schema for stream '{stream}': {source}")]
    Schema {
        stream: String,
        #[source]
        source: SchemaError,
    },

    #[error("Sync failed for stream '{stream}': {source}")]
    Sync {
        stream: String,
        #[source]
        source: SyncError,
    },
}

pub type Result<T> = std::result::Result<T, LoadError>;

/// Pending rows of one stream.
struct StreamBatch {
    sync: StreamSync,
    rows: Vec<Vec<DbValue>>,
    seen_keys: HashSet<String>,
}

impl StreamBatch {
    fn flush<E: SqlExecutor + ?Sized>(&mut self, db: &mut E) -> Result<()> {
        if self.rows.is_empty() {
            return Ok(());
        }
        let stream = self.sync.descriptor().stream().to_string();
        self.sync
            .load_batch(db, &self.rows)
            .map_err(|source| LoadError::Sync { stream, source })?;
        self.rows.clear();
        self.seen_keys.clear();
        Ok(())
    }
}

/// Totals for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub lines: usize,
    pub records: usize,
    pub skipped_records: usize,
    pub batches: usize,
}

pub struct Loader {
    sync_config: SyncConfig,
    batch_size: usize,
    observer: Arc<dyn SyncObserver>,
    streams: HashMap<String, StreamBatch>,
    /// Stream names in schema arrival order; final flushes follow it.
    order: Vec<String>,
    state: Option<Value>,
    summary: LoadSummary,
}

impl Loader {
    pub fn new(config: &TargetConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    pub fn with_observer(config: &TargetConfig, observer: Arc<dyn SyncObserver>) -> Self {
        Self {
            sync_config: SyncConfig::new(
                config.schema_namespace.clone(),
                ColumnTypeStrategy::from_use_simple(config.use_simple_column_type),
            ),
            batch_size: config.batch_size.max(1),
            observer,
            streams: HashMap::new(),
            order: Vec::new(),
            state: None,
            summary: LoadSummary::default(),
        }
    }

    pub fn summary(&self) -> LoadSummary {
        self.summary
    }

    /// Handle one raw input line. Blank lines are ignored.
    pub fn process_line<E: SqlExecutor + ?Sized>(&mut self, db: &mut E, raw: &str) -> Result<()> {
        self.summary.lines += 1;
        let line_no = self.summary.lines;
        let line = sanitize_line(raw);
        if line.trim().is_empty() {
            return Ok(());
        }

        let message = Message::parse_line(&line).map_err(|source| LoadError::Protocol {
            line: line_no,
            source,
        })?;
        match message {
            Message::Schema(schema) => self.handle_schema(db, schema),
            Message::Record(record) => self.handle_record(db, record),
            Message::State(state) => {
                debug!(state = %state.value, "Setting state");
                self.state = Some(state.value);
                Ok(())
            }
            Message::ActivateVersion(_) => {
                debug!("Ignoring ACTIVATE_VERSION message");
                Ok(())
            }
        }
    }

    fn handle_schema<E: SqlExecutor + ?Sized>(
        &mut self,
        db: &mut E,
        message: SchemaMessage,
    ) -> Result<()> {
        let stream = message.stream;
        if self.streams.contains_key(&stream) {
            warn!(
                stream = %stream,
                "More than one schema message found for stream; only the first will be used"
            );
            return Ok(());
        }
        let Some(key_properties) = message.key_properties else {
            return Err(LoadError::MissingKeyProperties { stream });
        };

        let key_paths: Vec<Vec<String>> = key_properties
            .into_iter()
            .map(KeyProperty::into_path)
            .collect();
        let descriptor = StreamDescriptor::new(&stream, &message.schema, &key_paths).map_err(
            |source| LoadError::Schema {
                stream: stream.clone(),
                source,
            },
        )?;
        let sync_err = |source| LoadError::Sync {
            stream: stream.clone(),
            source,
        };
        let sync = StreamSync::with_observer(
            descriptor,
            self.sync_config.clone(),
            Arc::clone(&self.observer),
        )
        .map_err(sync_err)?;

        match sync.ensure_table(db).map_err(sync_err)? {
            TableSync::Created { columns } => {
                info!(stream = %stream, columns, "Stream table created")
            }
            TableSync::Altered(plan) if !plan.is_empty() => {
                info!(stream = %stream, changes = plan.len(), "Stream table altered")
            }
            TableSync::Altered(_) => debug!(stream = %stream, "Stream table up to date"),
        }

        self.order.push(stream.clone());
        self.streams.insert(
            stream,
            StreamBatch {
                sync,
                rows: Vec::new(),
                seen_keys: HashSet::new(),
            },
        );
        Ok(())
    }

    fn handle_record<E: SqlExecutor + ?Sized>(
        &mut self,
        db: &mut E,
        message: RecordMessage,
    ) -> Result<()> {
        let RecordMessage { stream, record } = message;
        let batch_size = self.batch_size;
        let Some(batch) = self.streams.get_mut(&stream) else {
            return Err(LoadError::RecordBeforeSchema { stream });
        };

        if is_empty_record(&record) {
            warn!(stream = %stream, "Skipping empty record");
            self.summary.skipped_records += 1;
            return Ok(());
        }

        let key = batch
            .sync
            .record_primary_key_string(&record)
            .map_err(|source| LoadError::Sync {
                stream: stream.clone(),
                source,
            })?;
        if key.as_ref().is_some_and(|k| batch.seen_keys.contains(k)) {
            debug!(stream = %stream, "Repeated key in batch; flushing");
            batch.flush(db)?;
            self.summary.batches += 1;
        }

        batch.rows.push(batch.sync.record_to_row(&record));
        if let Some(key) = key {
            batch.seen_keys.insert(key);
        }
        self.summary.records += 1;

        if batch.rows.len() >= batch_size {
            batch.flush(db)?;
            self.summary.batches += 1;
        }

        // State only covers records that precede it.
        self.state = None;
        Ok(())
    }

    /// Flush every pending batch and return the state to emit, if any.
    pub fn finish<E: SqlExecutor + ?Sized>(mut self, db: &mut E) -> Result<Option<Value>> {
        for stream in &self.order {
            if let Some(batch) = self.streams.get_mut(stream) {
                if !batch.rows.is_empty() {
                    batch.flush(db)?;
                    self.summary.batches += 1;
                }
            }
        }
        info!(
            lines = self.summary.lines,
            records = self.summary.records,
            skipped = self.summary.skipped_records,
            batches = self.summary.batches,
            "Finished loading"
        );
        Ok(self.state)
    }
}

fn is_empty_record(record: &Value) -> bool {
    match record {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        Value::Bool(b) => !b,
        Value::Number(_) => false,
    }
}

/// Load every line of `input` into `db` and return the state to emit.
pub fn persist_lines<E, R>(config: &TargetConfig, input: R, db: &mut E) -> Result<Option<Value>>
where
    E: SqlExecutor + ?Sized,
    R: BufRead,
{
    let mut loader = Loader::new(config);
    for line in input.lines() {
        loader.process_line(db, &line?)?;
    }
    loader.finish(db)
}
