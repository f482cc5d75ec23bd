//! Sensor wire protocols
//!
//! Frame synchronization, decoding and checksum validation for the two serial
//! protocols AirIQ understands:
//!
//! - PMS5003 particulate sensor: unsolicited `42 4D <len> <payload> <sum16>` frames
//! - MH-Z19C CO2 sensor: fixed 9-byte command/response exchanges

pub mod checksum;
pub mod co2;
mod error;
mod frame;
pub mod pms;
pub mod serial;
mod source;
mod sync;

pub use co2::{CalibrationConfirmation, Co2Command, Co2Frame};
pub use error::{FailureKind, SensorError};
pub use frame::{Protocol, RawFrame};
pub use pms::PmFrame;
pub use serial::{list_ports, open_port, PortInfo, SensorLinkConfig};
pub use source::{ByteSource, MockSource, SerialChannel};
pub use sync::FrameSynchronizer;

/// Default baud rate of both sensors
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default read timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// PMS5003 frame start marker
pub const PM_START_MARKER: [u8; 2] = [0x42, 0x4D];

/// Largest PMS5003 payload length accepted before reading it
pub const MAX_PM_PAYLOAD_LEN: usize = 64;

/// Smallest payload holding the six concentrations plus the checksum
pub const MIN_PM_PAYLOAD_LEN: usize = 14;

/// Bytes scanned for a start marker before giving up on a cycle
pub const DEFAULT_SYNC_BUDGET: usize = 512;

/// MH-Z19C frame length (commands and responses alike)
pub const CO2_FRAME_LEN: usize = 9;
