//! Relay configuration

use std::time::Duration;

use rfid_protocol::TagProtocol;
use serde::{Deserialize, Serialize};

/// How tags are collected during a read window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationStrategy {
    /// One bounded read call per window
    #[default]
    Polling,
    /// Continuous reading with tag callbacks
    Listener,
}

/// What to do with a window that saw no tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyMessagePolicy {
    /// Write the empty message (zero bytes)
    #[default]
    Send,
    /// Write nothing
    Skip,
}

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Antenna ports to read on
    pub antennas: Vec<u8>,
    /// Air protocol
    pub protocol: TagProtocol,
    /// Upper bound on each discovery connect attempt
    pub connect_timeout: Duration,
    /// Length of each read window
    pub window: Duration,
    /// Pause between cycles
    pub inter_cycle: Duration,
    /// Tag collection strategy
    pub aggregation: AggregationStrategy,
    /// Serial bridge baud rate
    pub baud_rate: u32,
    /// Explicit serial bridge port (must differ from the reader port)
    pub serial_port: Option<String>,
    /// Delay before appending each identifier to a message
    pub item_pacing: Duration,
    /// Handling of windows without tags
    pub empty_message: EmptyMessagePolicy,
    /// Abort setup when no region can be configured
    pub require_region: bool,
    /// Log raw reader transport frames
    pub trace_transport: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            antennas: vec![1, 2, 3, 4],
            protocol: TagProtocol::Gen2,
            connect_timeout: Duration::from_secs(3),
            window: Duration::from_millis(500),
            inter_cycle: Duration::from_secs(1),
            aggregation: AggregationStrategy::Polling,
            baud_rate: 9600,
            serial_port: None,
            item_pacing: Duration::ZERO,
            empty_message: EmptyMessagePolicy::Send,
            require_region: true,
            trace_transport: false,
        }
    }
}
