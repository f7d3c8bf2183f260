//! Outbound message assembly

use std::fmt;
use std::time::Duration;

use rfid_protocol::{message, TagSet};
use tracing::trace;

/// Text written to the microcontroller for one cycle
///
/// No terminator is appended. An empty tag set yields an empty message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutboundMessage(String);

impl OutboundMessage {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for OutboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns a window's tag set into an outbound message
#[derive(Debug, Clone, Default)]
pub struct MessageEncoder {
    item_pacing: Duration,
}

impl MessageEncoder {
    /// Create an encoder that waits `item_pacing` before appending each item
    pub fn new(item_pacing: Duration) -> Self {
        Self { item_pacing }
    }

    /// Encode without pacing
    pub fn encode(&self, tags: &TagSet) -> OutboundMessage {
        OutboundMessage(message::encode_tags(tags))
    }

    /// Encode, pausing before each item when pacing is configured
    pub async fn assemble(&self, tags: &TagSet) -> OutboundMessage {
        if self.item_pacing.is_zero() {
            return self.encode(tags);
        }

        let mut out = String::new();
        for id in tags {
            tokio::time::sleep(self.item_pacing).await;
            out.push(if out.is_empty() { '[' } else { ',' });
            message::push_item(&mut out, id);
            trace!("Appended {} to outbound message", id);
        }
        if !out.is_empty() {
            out.push(']');
        }
        OutboundMessage(out)
    }
}
