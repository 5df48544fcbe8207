//! strata - replication target core.
//!
//! Wires the line protocol to the relational sinks: configuration, connection
//! setup and the batching loader used by the `strata` binary.

pub mod connect;
pub mod loader;

pub use connect::open_connection;
pub use loader::{persist_lines, LoadError, LoadSummary, Loader};
pub use strata_protocol::TargetConfig;
