//! Raw frames
//!
//! Owned bytes of one frame, tagged with the protocol that produced them.
//! A frame lives for a single decode attempt and is never stored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two sensor protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    /// Plantower PMS5003 particulate matter sensor
    Pms5003,
    /// Winsen MH-Z19C NDIR CO2 sensor
    Mhz19c,
}

impl Protocol {
    /// Short human readable name
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Pms5003 => "PMS5003",
            Protocol::Mhz19c => "MH-Z19C",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A complete frame as received from the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Protocol that produced the frame
    pub protocol: Protocol,
    /// Frame bytes including start marker and checksum
    pub bytes: Vec<u8>,
}

impl RawFrame {
    /// Tag raw bytes with their protocol
    pub fn new(protocol: Protocol, bytes: Vec<u8>) -> Self {
        Self { protocol, bytes }
    }

    /// Total frame length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the frame holds no bytes
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.protocol)?;
        for (i, b) in self.bytes.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", b)?;
        }
        f.write_str("]")
    }
}
