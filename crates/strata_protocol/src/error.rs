//! Protocol and configuration errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unable to parse line as JSON: {0}")]
    MalformedLine(#[source] serde_json::Error),

    #[error("Line is missing required key '{key}': {line}")]
    MissingKey { key: &'static str, line: String },

    #[error("Unknown message type '{0}'")]
    UnknownMessageType(String),

    #[error("Invalid {message_type} message: {source}")]
    InvalidMessage {
        message_type: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
