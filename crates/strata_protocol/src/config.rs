//! Target configuration loaded from a JSON file.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::defaults::{DEFAULT_BATCH_SIZE, DEFAULT_POSTGRES_PORT, DEFAULT_USE_SIMPLE_COLUMN_TYPE};
use crate::error::{ProtocolError, Result};

/// Canonical target configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Namespace (PostgreSQL schema) that receives every table.
    #[serde(alias = "schema")]
    pub schema_namespace: String,
    /// `true` selects the simple column-type cascade, `false` the generalized lattice.
    #[serde(default = "default_use_simple_column_type")]
    pub use_simple_column_type: bool,
    /// Records buffered per stream before a flush.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(flatten)]
    pub connection: ConnectionConfig,
}

/// Connection parameters. Opaque to the replication core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Full URL (postgres://... | sqlite:...). Takes precedence over the discrete fields.
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub dbname: Option<String>,
}

/// Where to connect, resolved from a [`ConnectionConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    Url(String),
    Postgres {
        host: String,
        port: u16,
        user: Option<String>,
        password: Option<String>,
        dbname: Option<String>,
    },
}

fn default_use_simple_column_type() -> bool {
    DEFAULT_USE_SIMPLE_COLUMN_TYPE
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_port() -> u16 {
    DEFAULT_POSTGRES_PORT
}

impl TargetConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: TargetConfig = serde_json::from_str(raw)
            .map_err(|e| ProtocolError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_namespace.trim().is_empty() {
            return Err(ProtocolError::InvalidConfig(
                "schema_namespace must not be empty".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ProtocolError::InvalidConfig(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        self.connection.target()?;
        Ok(())
    }
}

impl ConnectionConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            database_url: Some(url.into()),
            port: DEFAULT_POSTGRES_PORT,
            ..Self::default()
        }
    }

    pub fn target(&self) -> Result<ConnectionTarget> {
        if let Some(url) = self.database_url.as_deref() {
            return Ok(ConnectionTarget::Url(url.to_string()));
        }
        match self.host.as_deref() {
            Some(host) if !host.is_empty() => Ok(ConnectionTarget::Postgres {
                host: host.to_string(),
                port: self.port,
                user: self.user.clone(),
                password: self.password.clone(),
                dbname: self.dbname.clone(),
            }),
            _ => Err(ProtocolError::InvalidConfig(
                "either database_url or host is required".to_string(),
            )),
        }
    }
}
