//! Serial bridge to the downstream microcontroller
//!
//! The bridge is generic over the I/O type so tests can drive it with
//! `tokio::io::duplex()` instead of a real port.

use std::time::Duration;

use rfid_detect::PortDescriptor;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_serial::{DataBits, Parity, SerialPortBuilderExt, SerialStream, StopBits};
use tracing::{debug, info, warn};

use crate::encoder::OutboundMessage;
use crate::error::RelayError;

/// An open line to the microcontroller
pub struct SerialBridge<T> {
    port: String,
    io: T,
    buffer: Vec<u8>,
}

impl SerialBridge<SerialStream> {
    /// Open a serial port at 8 data bits, 1 stop bit, no parity
    pub fn open(port: &str, baud_rate: u32) -> Result<Self, RelayError> {
        let stream = tokio_serial::new(port, baud_rate)
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .parity(Parity::None)
            .timeout(Duration::from_millis(100))
            .open_native_async()
            .map_err(|e| RelayError::SerialOpen {
                port: port.to_string(),
                reason: e.to_string(),
            })?;

        info!("Opened serial bridge on {} at {} baud", port, baud_rate);
        Ok(Self::new(port, stream))
    }
}

impl<T> SerialBridge<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already-open stream
    pub fn new(port: impl Into<String>, io: T) -> Self {
        Self {
            port: port.into(),
            io,
            buffer: vec![0u8; 1024],
        }
    }

    /// Port name this bridge writes to
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Write one message, flushing before returning
    ///
    /// An empty message writes nothing.
    pub async fn send(&mut self, message: &OutboundMessage) -> Result<(), RelayError> {
        self.io
            .write_all(message.as_bytes())
            .await
            .map_err(RelayError::SerialWrite)?;
        self.io.flush().await.map_err(RelayError::SerialWrite)?;
        debug!("Wrote {} bytes to {}", message.len(), self.port);
        Ok(())
    }

    /// Read whatever the microcontroller sends within `wait`
    ///
    /// Returns an empty string when nothing arrives in time.
    pub async fn receive(&mut self, wait: Duration) -> Result<String, RelayError> {
        match tokio::time::timeout(wait, self.io.read(&mut self.buffer)).await {
            Ok(Ok(n)) => Ok(String::from_utf8_lossy(&self.buffer[..n]).into_owned()),
            Ok(Err(e)) => Err(RelayError::SerialRead(e)),
            Err(_) => Ok(String::new()),
        }
    }

    /// Flush and close the port
    ///
    /// A failed close is logged; the port is released either way.
    pub async fn close(mut self) {
        match self.io.shutdown().await {
            Ok(()) => info!("Closed serial bridge on {}", self.port),
            Err(e) => warn!("{} ({})", RelayError::SerialClose(e), self.port),
        }
    }
}

/// Opens the serial bridge
///
/// The relay only knows the port name; the opener decides what kind of
/// stream backs it.
pub trait SerialOpener {
    type Io: AsyncRead + AsyncWrite + Unpin + Send;

    fn open(&self, port: &str, baud_rate: u32) -> Result<SerialBridge<Self::Io>, RelayError>;
}

/// Opens real serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeSerial;

impl SerialOpener for NativeSerial {
    type Io = SerialStream;

    fn open(&self, port: &str, baud_rate: u32) -> Result<SerialBridge<SerialStream>, RelayError> {
        SerialBridge::open(port, baud_rate)
    }
}

/// Choose the bridge port from one enumeration pass
///
/// The reader's own port is never chosen. A `preferred` name wins when it
/// is present; otherwise the first remaining port is used.
pub fn select_bridge_port(
    ports: &[PortDescriptor],
    reader_port: &str,
    preferred: Option<&str>,
) -> Result<PortDescriptor, RelayError> {
    let mut candidates = ports.iter().filter(|p| p.name != reader_port);

    let chosen = match preferred {
        Some(name) if name == reader_port => {
            warn!("Configured serial port {} is the reader port, ignoring", name);
            candidates.next()
        }
        Some(name) => match candidates.clone().find(|p| p.name == name) {
            Some(port) => Some(port),
            None => {
                warn!("Configured serial port {} not found, using first available", name);
                candidates.next()
            }
        },
        None => candidates.next(),
    };

    chosen.cloned().ok_or_else(|| RelayError::NoSerialPort {
        reader_port: reader_port.to_string(),
    })
}
