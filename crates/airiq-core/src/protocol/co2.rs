//! MH-Z19C command/response protocol
//!
//! Every exchange is a 9-byte command followed by a 9-byte response:
//!
//! ```text
//! request   FF 01 86 00 00 00 00 00 79
//! response  FF 86 <co2 hi> <co2 lo> <temp + 40> <status> 00 00 <checksum>
//! ```
//!
//! There is no synchronization step. A response that does not start with the
//! expected bytes is rejected and the next poll flushes and starts over.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::checksum::{co2_checksum, verify_co2_checksum};
use super::{ByteSource, Protocol, RawFrame, SensorError, CO2_FRAME_LEN};

/// First byte of every frame
pub const CO2_START_BYTE: u8 = 0xFF;

/// Offset subtracted from the raw temperature byte
pub const TEMPERATURE_OFFSET: i16 = 40;

/// Sensor address byte used in commands
const SENSOR_ID: u8 = 0x01;

/// Commands understood by the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Co2Command {
    /// Read gas concentration (0x86)
    ReadConcentration,
    /// Calibrate the zero point to 400 ppm (0x87)
    ZeroCalibration,
}

impl Co2Command {
    /// Command byte
    pub fn code(&self) -> u8 {
        match self {
            Co2Command::ReadConcentration => 0x86,
            Co2Command::ZeroCalibration => 0x87,
        }
    }

    /// Whether the sensor answers this command
    pub fn expects_response(&self) -> bool {
        matches!(self, Co2Command::ReadConcentration)
    }

    /// Complete command frame, checksum included
    pub fn to_bytes(&self) -> [u8; CO2_FRAME_LEN] {
        let mut frame = [0u8; CO2_FRAME_LEN];
        frame[0] = CO2_START_BYTE;
        frame[1] = SENSOR_ID;
        frame[2] = self.code();
        frame[8] = co2_checksum(&frame);
        frame
    }
}

/// Proof that an operator confirmed a zero-point calibration.
///
/// Calibration permanently shifts the sensor baseline, so it is only sent
/// when the caller hands over a confirmation token obtained out of band.
#[derive(Debug)]
pub struct CalibrationConfirmation {
    _private: (),
}

impl CalibrationConfirmation {
    /// Token an operator has to supply
    pub const TOKEN: &'static str = "YES";

    /// Accept the confirmation only if `token` is exactly [`Self::TOKEN`]
    pub fn from_token(token: &str) -> Option<Self> {
        (token == Self::TOKEN).then_some(Self { _private: () })
    }
}

/// Fields carried by one response frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Co2Frame {
    /// CO2 concentration in ppm
    pub co2_ppm: u16,
    /// Sensor temperature in °C
    pub temperature_c: i16,
    /// Raw status byte
    pub status: u8,
}

impl Co2Frame {
    /// Encode as a response frame, the way the sensor would send it
    pub fn encode(&self) -> [u8; CO2_FRAME_LEN] {
        let [hi, lo] = self.co2_ppm.to_be_bytes();
        let temp = self.temperature_c.saturating_add(TEMPERATURE_OFFSET).clamp(0, 0xFF) as u8;
        let mut frame = [
            CO2_START_BYTE,
            Co2Command::ReadConcentration.code(),
            hi,
            lo,
            temp,
            self.status,
            0x00,
            0x00,
            0x00,
        ];
        frame[8] = co2_checksum(&frame);
        frame
    }
}

/// Read one response frame.
///
/// Fewer than 9 bytes within `timeout` is a truncated frame.
pub fn read_response<S: ByteSource + ?Sized>(
    source: &mut S,
    timeout: Duration,
) -> Result<RawFrame, SensorError> {
    let bytes = source.read_bytes(CO2_FRAME_LEN, timeout)?;
    if bytes.len() != CO2_FRAME_LEN {
        return Err(SensorError::TruncatedFrame {
            expected: CO2_FRAME_LEN,
            actual: bytes.len(),
        });
    }
    Ok(RawFrame::new(Protocol::Mhz19c, bytes))
}

/// Validate and decode a response to [`Co2Command::ReadConcentration`].
///
/// Checks run in order and stop at the first failure: start byte, command
/// echo, checksum.
pub fn decode_response(frame: &[u8]) -> Result<Co2Frame, SensorError> {
    let frame: &[u8; CO2_FRAME_LEN] =
        frame
            .try_into()
            .map_err(|_| SensorError::TruncatedFrame {
                expected: CO2_FRAME_LEN,
                actual: frame.len(),
            })?;

    if frame[0] != CO2_START_BYTE {
        return Err(SensorError::StartByteMismatch(frame[0]));
    }
    let expected = Co2Command::ReadConcentration.code();
    if frame[1] != expected {
        return Err(SensorError::CommandMismatch {
            expected,
            actual: frame[1],
        });
    }
    verify_co2_checksum(frame)?;

    Ok(Co2Frame {
        co2_ppm: u16::from_be_bytes([frame[2], frame[3]]),
        temperature_c: frame[4] as i16 - TEMPERATURE_OFFSET,
        status: frame[5],
    })
}
