//! Line Protocol: newline-delimited JSON messages from an extractor.
//!
//! Every input line is one JSON object carrying a `type` discriminator:
//!
//! ```text
//! {"type": "SCHEMA", "stream": "users", "schema": {...}, "key_properties": ["id"]}
//! {"type": "RECORD", "stream": "users", "record": {"id": 1, "name": "ada"}}
//! {"type": "STATE", "value": {"users": {"cursor": 42}}}
//! {"type": "ACTIVATE_VERSION", "stream": "users", "version": 3}
//! ```
//!
//! - SCHEMA must precede the first RECORD of its stream.
//! - STATE is opaque to the target and echoed back once the records before it are durable.
//! - ACTIVATE_VERSION is accepted and ignored.

pub mod config;
pub mod defaults;
pub mod error;
pub mod types;

pub use config::{ConnectionConfig, ConnectionTarget, TargetConfig};
pub use error::{ProtocolError, Result};
pub use types::{
    ActivateVersionMessage, KeyProperty, Message, MessageType, RecordMessage, SchemaMessage,
    StateMessage,
};

/// JSON-escaped NUL sequence. PostgreSQL rejects NUL bytes inside text and jsonb values.
pub const ESCAPED_NUL: &str = "\\u0000";

/// Remove JSON-escaped NUL sequences from a raw input line before parsing.
pub fn sanitize_line(line: &str) -> std::borrow::Cow<'_, str> {
    if line.contains(ESCAPED_NUL) {
        std::borrow::Cow::Owned(line.replace(ESCAPED_NUL, ""))
    } else {
        std::borrow::Cow::Borrowed(line)
    }
}
