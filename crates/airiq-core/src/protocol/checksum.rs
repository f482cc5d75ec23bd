//! Frame checksums
//!
//! Both sensors protect their frames with additive checksums:
//! - PMS5003: 16-bit wrapping sum of every byte before the trailing checksum field
//! - MH-Z19C: two's complement of the 8-bit sum of bytes 1..=7
//!
//! The CO2 algorithm is symmetric, so the same function validates responses and
//! fills in the last byte of outgoing command frames.

use byteorder::{BigEndian, ByteOrder};

use super::{SensorError, CO2_FRAME_LEN};

/// Compute the PMS5003 checksum of a complete frame (marker, length, payload).
///
/// The trailing two bytes are the transmitted checksum and are not summed.
/// Frames shorter than two bytes sum to zero.
pub fn pm_checksum(frame: &[u8]) -> u16 {
    let end = frame.len().saturating_sub(2);
    frame[..end]
        .iter()
        .fold(0u16, |sum, &b| sum.wrapping_add(b as u16))
}

/// Verify the trailing big-endian checksum of a complete PMS5003 frame
pub fn verify_pm_checksum(frame: &[u8]) -> Result<(), SensorError> {
    if frame.len() < 2 {
        return Err(SensorError::TruncatedFrame {
            expected: 2,
            actual: frame.len(),
        });
    }
    let expected = pm_checksum(frame);
    let actual = BigEndian::read_u16(&frame[frame.len() - 2..]);
    if expected != actual {
        return Err(SensorError::ChecksumMismatch { expected, actual });
    }
    Ok(())
}

/// Compute the MH-Z19C checksum for a 9-byte frame.
///
/// Byte 0 (start) and byte 8 (the checksum slot itself) are ignored.
pub fn co2_checksum(frame: &[u8; CO2_FRAME_LEN]) -> u8 {
    let sum = frame[1..8]
        .iter()
        .fold(0u8, |sum, &b| sum.wrapping_add(b));
    0xFFu8.wrapping_sub(sum).wrapping_add(1)
}

/// Verify the checksum byte of a 9-byte MH-Z19C frame
pub fn verify_co2_checksum(frame: &[u8; CO2_FRAME_LEN]) -> Result<(), SensorError> {
    let expected = co2_checksum(frame);
    let actual = frame[8];
    if expected != actual {
        return Err(SensorError::ChecksumMismatch {
            expected: expected as u16,
            actual: actual as u16,
        });
    }
    Ok(())
}
