//! The protocol message record and field-level validation.

use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::{PROTOCOL_MAGIC, PROTOCOL_VERSION};

/// Errors raised by the codec and field validation.
#[derive(Debug, Error)]
pub enum WireError {
    /// The line is not a well-formed message record.
    #[error("malformed message line: {0}")]
    Parse(String),

    /// The record is well-formed but its field values violate the protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl WireError {
    /// True for the parse-level variant (framing/syntax failures).
    #[must_use]
    pub fn is_parse(&self) -> bool {
        matches!(self, WireError::Parse(_))
    }
}

/// One protocol message. Immutable once constructed and transmitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Fixed protocol identifier, [`PROTOCOL_MAGIC`] on every valid message.
    pub magic: String,
    /// Protocol version, [`PROTOCOL_VERSION`] on every valid message.
    pub version: u32,
    /// One of the tags in [`crate::msg_type`].
    pub message_type: String,
    /// Run/session identifier of the sending side.
    pub sender_id: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Type-dependent payload text.
    pub payload: String,
}

impl Message {
    /// Build a message of the given type with the current timestamp.
    #[must_use]
    pub fn new(
        message_type: impl Into<String>,
        sender_id: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            magic: PROTOCOL_MAGIC.to_string(),
            version: PROTOCOL_VERSION,
            message_type: message_type.into(),
            sender_id: sender_id.into(),
            timestamp: now_millis(),
            payload: payload.into(),
        }
    }

    /// Check protocol-level invariants on an already-decoded message.
    ///
    /// Fails with [`WireError::Protocol`] when the magic or version do not
    /// match the protocol constants, or when the message type or sender id
    /// is empty.
    pub fn validate(&self) -> Result<(), WireError> {
        if self.magic != PROTOCOL_MAGIC {
            return Err(WireError::Protocol(format!(
                "invalid magic: {:?}",
                self.magic
            )));
        }
        if self.version != PROTOCOL_VERSION {
            return Err(WireError::Protocol(format!(
                "invalid version: {}",
                self.version
            )));
        }
        if self.message_type.is_empty() {
            return Err(WireError::Protocol("missing messageType".to_string()));
        }
        if self.sender_id.is_empty() {
            return Err(WireError::Protocol("missing senderId".to_string()));
        }
        Ok(())
    }

    /// True when this message carries the given type tag.
    #[must_use]
    pub fn is(&self, tag: &str) -> bool {
        self.message_type == tag
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
