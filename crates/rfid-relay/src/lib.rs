//! RFID Tag Relay Engine
//!
//! This crate turns a connected interrogator into a stream of messages for a
//! downstream microcontroller:
//!
//! - **Setup**: discovery (via `rfid-detect`), region resolution, read plan
//!   configuration and serial bridge binding
//! - **Aggregation**: polling or listener-driven collection of the unique
//!   tags seen in each read window
//! - **Messaging**: encoding a window's tags and writing them over serial
//!
//! # Example
//!
//! ```rust,no_run
//! use rfid_detect::PortScanner;
//! use rfid_relay::{NativeSerial, Relay, RelayCommand, RelayConfig};
//! use rfid_sim::{VirtualReaderConfig, VirtualReaderFactory};
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> Result<(), rfid_relay::RelayError> {
//! let factory = VirtualReaderFactory::new(VirtualReaderConfig::default());
//! let relay = Relay::new(RelayConfig::default(), factory, PortScanner::new(), NativeSerial);
//!
//! let (cmd_tx, cmd_rx) = mpsc::channel(1);
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     let _ = cmd_tx.send(RelayCommand::Shutdown).await;
//! });
//!
//! relay.run(cmd_rx).await?;
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod config;
pub mod encoder;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod plan;
pub mod region;
pub mod serial;
mod task;

pub use aggregator::{ListenerAggregator, PollingAggregator, TagAggregator, TagWindow};
pub use config::{AggregationStrategy, EmptyMessagePolicy, RelayConfig};
pub use encoder::{MessageEncoder, OutboundMessage};
pub use error::RelayError;
pub use events::{RelayEvent, RelayState};
pub use pipeline::{Relay, RelayCommand, RelayExit};
pub use plan::{ListenerGuard, ReadPlanConfigurator, ReaderFeed};
pub use region::RegionResolver;
pub use serial::{select_bridge_port, NativeSerial, SerialBridge, SerialOpener};
