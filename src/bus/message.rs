//! Message envelope carried on the bus and in the outbox.

use serde::{de::DeserializeOwned, Serialize};

/// A message sent to a named queue.
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    /// Unique identifier for this message
    pub id: String,
    /// Message type (e.g., "match.completed")
    pub event_type: String,
    /// bitcode-serialized payload
    pub payload: Vec<u8>,
    /// Optional metadata (correlation IDs, origin, etc.)
    pub metadata: Option<Vec<(String, String)>>,
}

impl Message {
    pub fn new(id: impl Into<String>, event_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            event_type: event_type.into(),
            payload,
            metadata: None,
        }
    }

    /// Create a message with a bitcode-serialized payload.
    pub fn encode<T: Serialize>(
        id: impl Into<String>,
        event_type: impl Into<String>,
        payload: &T,
    ) -> Result<Self, bitcode::Error> {
        let bytes = bitcode::serialize(payload)?;
        Ok(Self::new(id, event_type, bytes))
    }

    /// Decode the payload from bitcode binary format.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, bitcode::Error> {
        bitcode::deserialize(&self.payload)
    }

    /// Add metadata to the message.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    /// Look up a metadata value by key.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
