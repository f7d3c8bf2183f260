//! RFID Reader Detection Library
//!
//! This crate provides serial port enumeration and bounded-time discovery of
//! the port an RFID interrogator is attached to.
//!
//! # Example
//!
//! ```rust,no_run
//! use rfid_detect::{PortEnumerator, PortScanner};
//!
//! let scanner = PortScanner::new();
//! let ports = scanner.enumerate_ports().unwrap();
//!
//! for port in ports {
//!     println!("Found port: {}", port.name);
//! }
//! ```

pub mod connector;
pub mod error;
pub mod scanner;

pub use connector::{ConnectorConfig, DeviceConnector, ReaderSession};
pub use error::DetectError;
pub use scanner::{FixedPorts, PortDescriptor, PortEnumerator, PortScanner, ScannerConfig};
