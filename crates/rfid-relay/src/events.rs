//! Relay event stream
//!
//! Observers receive setup progress and per-cycle outcomes through a single
//! channel. Events are never waited on: a receiver that is dropped or stops
//! draining only loses events, and the relay keeps running.

use rfid_protocol::{ReaderError, Region};

use crate::encoder::OutboundMessage;

/// Lifecycle phase of the relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Searching ports for a reader
    Discovering,
    /// Ensuring the reader has an operating region
    RegionResolving,
    /// Applying the read plan
    PlanConfiguring,
    /// Opening the serial bridge
    SerialBinding,
    /// Running read cycles
    Cycling,
    /// Releasing the reader and serial port
    ShuttingDown,
}

/// Events emitted by the relay
#[derive(Debug, Clone)]
pub enum RelayEvent {
    // -------------------------------------------------------------------------
    // Setup
    // -------------------------------------------------------------------------
    /// The relay moved to a new phase
    StateChanged(RelayState),

    /// A reader answered on this port
    ReaderBound {
        /// Port name the reader is attached to
        port: String,
    },

    /// Region in effect after resolution (None when it failed and the
    /// relay continues without one)
    RegionApplied {
        region: Option<Region>,
    },

    /// The serial bridge is open
    SerialBound {
        /// Port name of the bridge
        port: String,
    },

    // -------------------------------------------------------------------------
    // Cycles
    // -------------------------------------------------------------------------
    /// A message was written for this cycle
    CycleCompleted {
        /// Cycle number, starting at 1
        cycle: u64,
        /// Unique tags in the window
        tags: usize,
        /// What was written
        message: OutboundMessage,
    },

    /// The window was empty and the empty message was not written
    MessageSkipped {
        cycle: u64,
    },

    /// The read window failed; the cycle carried no tags
    ReadFailed {
        cycle: u64,
        error: ReaderError,
    },

    /// Writing to the serial bridge failed
    WriteFailed {
        cycle: u64,
        error: String,
    },
}
