//! Read plans: which antennas and which air protocol to read with

use std::collections::BTreeSet;
use std::time::Duration;

/// Air protocol family a read plan targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TagProtocol {
    /// EPCglobal Class 1 Gen 2 (ISO 18000-63)
    #[default]
    Gen2,
    /// ISO 18000-6B
    Iso180006b,
    /// IPX 64 kbps link
    Ipx64,
    /// IPX 256 kbps link
    Ipx256,
}

impl TagProtocol {
    /// Returns a human-readable name for the protocol
    pub fn name(&self) -> &'static str {
        match self {
            TagProtocol::Gen2 => "GEN2",
            TagProtocol::Iso180006b => "ISO180006B",
            TagProtocol::Ipx64 => "IPX64",
            TagProtocol::Ipx256 => "IPX256",
        }
    }
}

/// Device-side read configuration over a fixed antenna set and one protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadPlan {
    /// Antenna ports, ascending and without duplicates
    antennas: Vec<u8>,
    /// Air protocol
    protocol: TagProtocol,
    /// Read duration the plan is tuned for
    window: Duration,
}

impl ReadPlan {
    /// Build a plan over the given antennas
    ///
    /// Duplicate antenna ids collapse and the list is kept ascending.
    pub fn new(
        antennas: impl IntoIterator<Item = u8>,
        protocol: TagProtocol,
        window: Duration,
    ) -> Self {
        let antennas: BTreeSet<u8> = antennas.into_iter().collect();
        Self {
            antennas: antennas.into_iter().collect(),
            protocol,
            window,
        }
    }

    /// Antenna ports the plan reads on
    pub fn antennas(&self) -> &[u8] {
        &self.antennas
    }

    /// Air protocol of the plan
    pub fn protocol(&self) -> TagProtocol {
        self.protocol
    }

    /// Read duration of the plan
    pub fn window(&self) -> Duration {
        self.window
    }
}
