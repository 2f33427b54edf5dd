//! Relay packet - the bytes notified to the downstream sink.
//!
//! Layout (one unsigned byte per tracked value, fixed order):
//! ```text
//! Byte 0: primary   (sensor reading from the source)
//! Byte 1: secondary (command value / posture)
//! Byte 2: tertiary  (movement flag)
//! ```
//! A deployment publishes the first 1, 2 or 3 of these bytes. The width
//! must match what the sink was built for.

use crate::reading::Reading;

/// Widest relay packet any deployment emits.
pub const MAX_PACKET_LEN: usize = 3;

/// How many leading fields of the reading a deployment relays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PacketLayout {
    /// `[primary]`
    Single,
    /// `[primary, secondary]`
    Pair,
    /// `[primary, secondary, tertiary]`
    Triple,
}

impl PacketLayout {
    pub const fn len(self) -> usize {
        match self {
            PacketLayout::Single => 1,
            PacketLayout::Pair => 2,
            PacketLayout::Triple => 3,
        }
    }
}

/// Snapshot of a [`Reading`] encoded for the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RelayPacket {
    bytes: [u8; MAX_PACKET_LEN],
    len: usize,
}

impl RelayPacket {
    pub fn from_reading(layout: PacketLayout, reading: &Reading) -> Self {
        Self {
            bytes: [reading.primary, reading.secondary, reading.tertiary],
            len: layout.len(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Serialize into `buf`.  Returns bytes written (0 if `buf` too small).
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < self.len {
            return 0;
        }
        buf[..self.len].copy_from_slice(self.as_bytes());
        self.len
    }
}
