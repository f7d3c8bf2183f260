//! Error types for interrogator faults and message parsing

use thiserror::Error;

/// SDK message text that signals the transport to the interrogator is gone
const CONNECTION_LOST_MESSAGE: &str = "Connection Lost";

/// Faults reported by an interrogator
///
/// Device collaborators classify their failures into these variants so that
/// callers can branch on the fault kind instead of matching message text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReaderError {
    /// No device answers at the given address
    #[error("no such device: {0}")]
    NoSuchDevice(String),

    /// The transport to the device dropped
    #[error("connection lost")]
    ConnectionLost,

    /// Operation did not complete in time
    #[error("operation timed out after {0}ms")]
    Timeout(u64),

    /// Transport-level I/O failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Parameter path is not known to the device
    #[error("unsupported parameter: {0}")]
    UnsupportedParameter(String),

    /// Parameter value has the wrong type or range
    #[error("invalid value for {path}: {reason}")]
    InvalidParameter { path: String, reason: String },

    /// Device refused the request
    #[error("rejected by device: {0}")]
    Rejected(String),

    /// The session was destroyed
    #[error("device session destroyed")]
    Destroyed,
}

impl ReaderError {
    /// Classify an SDK error message
    ///
    /// Only for SDKs that surface faults as bare text. The exact text
    /// "Connection Lost" maps to [`ReaderError::ConnectionLost`]; anything
    /// else is a transport error carrying the message.
    pub fn from_sdk_message(message: &str) -> Self {
        if message.trim() == CONNECTION_LOST_MESSAGE {
            Self::ConnectionLost
        } else {
            Self::Transport(message.to_string())
        }
    }

    /// Whether the device is gone and the session cannot continue
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost | Self::Destroyed)
    }
}

/// Errors that can occur while parsing an outbound message
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Message is not wrapped in brackets
    #[error("message must start with '[' and end with ']'")]
    MissingBrackets,

    /// An item is not a double-quoted identifier
    #[error("item {index} is not a quoted identifier: {item}")]
    UnquotedItem { index: usize, item: String },

    /// An identifier is empty
    #[error("item {0} is empty")]
    EmptyIdentifier(usize),
}
