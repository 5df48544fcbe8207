//! Canonical default values for the target configuration.

pub const DEFAULT_BATCH_SIZE: usize = 100_000;
pub const DEFAULT_POSTGRES_PORT: u16 = 5432;
pub const DEFAULT_USE_SIMPLE_COLUMN_TYPE: bool = true;
