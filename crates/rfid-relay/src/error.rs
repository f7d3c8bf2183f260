//! Error types for the relay

use rfid_detect::DetectError;
use rfid_protocol::ReaderError;
use thiserror::Error;

/// Errors that can occur while setting up or running the relay
///
/// Setup-phase errors stop the relay before it starts cycling. Cycle-phase
/// errors are isolated to their cycle, except [`RelayError::ConnectionLost`].
#[derive(Debug, Error)]
pub enum RelayError {
    /// Port enumeration failed
    #[error("failed to enumerate ports: {0}")]
    Enumeration(String),

    /// Every candidate port was tried and none held a reader
    #[error("no reader found after trying {attempted} port(s)")]
    DeviceNotFound { attempted: usize },

    /// The reader offers no usable region
    #[error("region configuration failed: {0}")]
    RegionConfiguration(String),

    /// The reader rejected the read plan
    #[error("read plan rejected: {0}")]
    ReadPlan(ReaderError),

    /// One read window failed
    #[error("read failed: {0}")]
    ReadFailure(ReaderError),

    /// No port is left for the serial bridge once the reader port is excluded
    #[error("no serial port available besides reader port {reader_port}")]
    NoSerialPort { reader_port: String },

    /// The serial bridge port could not be opened
    #[error("failed to open serial port {port}: {reason}")]
    SerialOpen { port: String, reason: String },

    /// Writing a message failed
    #[error("serial write failed: {0}")]
    SerialWrite(std::io::Error),

    /// Reading from the serial bridge failed
    #[error("serial read failed: {0}")]
    SerialRead(std::io::Error),

    /// Closing the serial bridge failed
    #[error("serial close failed: {0}")]
    SerialClose(std::io::Error),

    /// The reader transport dropped
    #[error("connection to reader lost")]
    ConnectionLost,

    /// Other reader fault during setup
    #[error("reader error: {0}")]
    Reader(ReaderError),
}

impl RelayError {
    /// Classify a reader fault, promoting a lost connection
    pub fn from_reader(error: ReaderError) -> Self {
        if error.is_connection_lost() {
            Self::ConnectionLost
        } else {
            Self::Reader(error)
        }
    }

    /// Whether this error ends the relay
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::ReadFailure(_) | Self::SerialWrite(_) | Self::SerialRead(_) | Self::SerialClose(_)
        )
    }
}

impl From<DetectError> for RelayError {
    fn from(error: DetectError) -> Self {
        match error {
            DetectError::DeviceNotFound { attempted } => Self::DeviceNotFound { attempted },
            DetectError::EnumerationFailed(reason) => Self::Enumeration(reason),
            DetectError::Reader(e) => Self::from_reader(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality() {
        assert!(RelayError::ConnectionLost.is_fatal());
        assert!(RelayError::DeviceNotFound { attempted: 2 }.is_fatal());
        assert!(RelayError::RegionConfiguration("none".into()).is_fatal());
        assert!(!RelayError::ReadFailure(ReaderError::Timeout(500)).is_fatal());
        assert!(!RelayError::SerialWrite(std::io::ErrorKind::BrokenPipe.into()).is_fatal());
    }

    #[test]
    fn test_reader_classification() {
        assert!(matches!(
            RelayError::from_reader(ReaderError::ConnectionLost),
            RelayError::ConnectionLost
        ));
        assert!(matches!(
            RelayError::from_reader(ReaderError::Rejected("x".into())),
            RelayError::Reader(_)
        ));
        assert!(matches!(
            RelayError::from(DetectError::DeviceNotFound { attempted: 3 }),
            RelayError::DeviceNotFound { attempted: 3 }
        ));
    }
}
