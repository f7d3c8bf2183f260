//! RFID Interrogator Simulation Library
//!
//! This crate provides a simulation layer for exercising the relay without
//! physical reader hardware. It includes:
//!
//! - **VirtualReader**: An `Interrogator` with region parameters, scripted
//!   read windows, and a listener thread for continuous reading
//! - **VirtualReaderFactory**: Creates readers per port with a chosen connect
//!   behaviour (succeed, refuse, no such device, hang) and records attempts
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use rfid_protocol::{Interrogator, InterrogatorFactory};
//! use rfid_sim::{ConnectBehavior, ReadScript, VirtualReaderConfig, VirtualReaderFactory};
//!
//! let factory = VirtualReaderFactory::new(VirtualReaderConfig::default())
//!     .with_port("COM3", ConnectBehavior::Refuse)
//!     .with_reads("COM4", [ReadScript::tags(["E1", "E1", "E2"])]);
//!
//! let reader = factory.create("tmr:///COM4").unwrap();
//! reader.connect().unwrap();
//! assert_eq!(reader.read(Duration::from_millis(500)).unwrap().len(), 3);
//! ```

pub mod factory;
pub mod reader;

pub use factory::VirtualReaderFactory;
pub use reader::{ConnectBehavior, ReadScript, VirtualReader, VirtualReaderConfig};
