//! Error types for event handling.

use thiserror::Error;

/// Errors that can occur when handling events.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The event kind is unknown.
    #[error("unknown event kind: {0}")]
    UnknownEventType(String),

    /// The event payload is invalid.
    #[error("invalid {kind} payload: {message}")]
    InvalidPayload { kind: String, message: String },

    /// The frame is not valid JSON or lacks required fields.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The node answered a stream request with an error.
    #[error("stream error from node: {0}")]
    Remote(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EventError {
    fn from(err: serde_json::Error) -> Self {
        EventError::Serialization(err.to_string())
    }
}
