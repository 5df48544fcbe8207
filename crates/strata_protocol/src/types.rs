//! Line protocol message types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{ProtocolError, Result};

// ============================================================================
// Message Type
// ============================================================================

/// Discriminator carried in the `type` key of every line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Schema,
    Record,
    State,
    ActivateVersion,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Schema => "SCHEMA",
            MessageType::Record => "RECORD",
            MessageType::State => "STATE",
            MessageType::ActivateVersion => "ACTIVATE_VERSION",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SCHEMA" => Ok(MessageType::Schema),
            "RECORD" => Ok(MessageType::Record),
            "STATE" => Ok(MessageType::State),
            "ACTIVATE_VERSION" => Ok(MessageType::ActivateVersion),
            other => Err(ProtocolError::UnknownMessageType(other.to_string())),
        }
    }
}

// ============================================================================
// Key Properties
// ============================================================================

/// A primary-key declaration: a top-level property name or a path into nested objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyProperty {
    Name(String),
    Path(Vec<String>),
}

impl KeyProperty {
    pub fn into_path(self) -> Vec<String> {
        match self {
            KeyProperty::Name(name) => vec![name],
            KeyProperty::Path(path) => path,
        }
    }
}

impl From<&str> for KeyProperty {
    fn from(name: &str) -> Self {
        KeyProperty::Name(name.to_string())
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaMessage {
    pub stream: String,
    pub schema: Value,
    /// `None` when the extractor omitted the key; the loader rejects that.
    #[serde(default)]
    pub key_properties: Option<Vec<KeyProperty>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMessage {
    pub stream: String,
    pub record: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMessage {
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivateVersionMessage {
    #[serde(default)]
    pub stream: Option<String>,
    #[serde(default)]
    pub version: Option<i64>,
}

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Schema(SchemaMessage),
    Record(RecordMessage),
    State(StateMessage),
    ActivateVersion(ActivateVersionMessage),
}

impl Message {
    /// Parse one raw line. The caller is expected to have sanitized it already.
    pub fn parse_line(line: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(line).map_err(ProtocolError::MalformedLine)?;
        Self::from_value(value, line)
    }

    fn from_value(value: Value, line: &str) -> Result<Self> {
        let message_type = match value.get("type").and_then(Value::as_str) {
            Some(t) => t.parse::<MessageType>()?,
            None => {
                return Err(ProtocolError::MissingKey {
                    key: "type",
                    line: line.to_string(),
                })
            }
        };

        let invalid = |source| ProtocolError::InvalidMessage {
            message_type: message_type.as_str(),
            source,
        };

        let message = match message_type {
            MessageType::Schema => Message::Schema(serde_json::from_value(value).map_err(invalid)?),
            MessageType::Record => Message::Record(serde_json::from_value(value).map_err(invalid)?),
            MessageType::State => Message::State(serde_json::from_value(value).map_err(invalid)?),
            MessageType::ActivateVersion => {
                Message::ActivateVersion(serde_json::from_value(value).map_err(invalid)?)
            }
        };
        Ok(message)
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Schema(_) => MessageType::Schema,
            Message::Record(_) => MessageType::Record,
            Message::State(_) => MessageType::State,
            Message::ActivateVersion(_) => MessageType::ActivateVersion,
        }
    }
}
