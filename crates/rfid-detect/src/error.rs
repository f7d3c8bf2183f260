//! Error types for port enumeration and reader discovery

use rfid_protocol::ReaderError;
use thiserror::Error;

/// Errors that can occur during discovery
#[derive(Debug, Error)]
pub enum DetectError {
    /// Failed to enumerate serial ports
    #[error("failed to enumerate ports: {0}")]
    EnumerationFailed(String),

    /// Every candidate port was tried and none held a reader
    #[error("no reader found after trying {attempted} port(s)")]
    DeviceNotFound { attempted: usize },

    /// Device fault outside a connect attempt
    #[error("reader error: {0}")]
    Reader(#[from] ReaderError),
}
