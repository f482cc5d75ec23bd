//! PMS5003 frame decoding
//!
//! Frame format (all multi-byte fields big-endian):
//! - 2 bytes: start marker `42 4D`
//! - 2 bytes: payload length N (28 on a PMS5003)
//! - N bytes: payload, whose first 12 bytes are six u16 concentrations
//!   PM1.0/PM2.5/PM10 at CF=1, then PM1.0/PM2.5/PM10 atmospheric, and whose
//!   last 2 bytes are the checksum of every preceding frame byte

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::checksum::{pm_checksum, verify_pm_checksum};
use super::{
    ByteSource, Protocol, RawFrame, SensorError, MAX_PM_PAYLOAD_LEN, MIN_PM_PAYLOAD_LEN,
    PM_START_MARKER,
};

/// Payload length a PMS5003 declares
pub const PMS5003_PAYLOAD_LEN: usize = 28;

const HEADER_LEN: usize = 4;

/// The six concentrations carried by one frame, in µg/m³
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PmFrame {
    /// PM1.0, CF=1
    pub pm1_cf: u16,
    /// PM2.5, CF=1
    pub pm25_cf: u16,
    /// PM10, CF=1
    pub pm10_cf: u16,
    /// PM1.0, atmospheric
    pub pm1_atm: u16,
    /// PM2.5, atmospheric
    pub pm25_atm: u16,
    /// PM10, atmospheric
    pub pm10_atm: u16,
}

impl PmFrame {
    /// Values in wire order
    pub fn to_array(&self) -> [u16; 6] {
        [
            self.pm1_cf,
            self.pm25_cf,
            self.pm10_cf,
            self.pm1_atm,
            self.pm25_atm,
            self.pm10_atm,
        ]
    }

    /// Build from values in wire order
    pub fn from_array(values: [u16; 6]) -> Self {
        let [pm1_cf, pm25_cf, pm10_cf, pm1_atm, pm25_atm, pm10_atm] = values;
        Self {
            pm1_cf,
            pm25_cf,
            pm10_cf,
            pm1_atm,
            pm25_atm,
            pm10_atm,
        }
    }

    /// Encode as a complete PMS5003 wire frame.
    ///
    /// Particle counts and the reserved word are sent as zero.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + PMS5003_PAYLOAD_LEN);
        bytes.extend_from_slice(&PM_START_MARKER);

        let mut word = [0u8; 2];
        BigEndian::write_u16(&mut word, PMS5003_PAYLOAD_LEN as u16);
        bytes.extend_from_slice(&word);

        for value in self.to_array() {
            BigEndian::write_u16(&mut word, value);
            bytes.extend_from_slice(&word);
        }
        bytes.resize(HEADER_LEN + PMS5003_PAYLOAD_LEN, 0);

        let sum = pm_checksum(&bytes);
        let tail = bytes.len() - 2;
        BigEndian::write_u16(&mut bytes[tail..], sum);
        bytes
    }
}

/// Read the remainder of a frame from a source aligned just past the marker.
///
/// Returns the whole frame, marker included, so the checksum can be verified
/// over exactly what was received. Partial frames are discarded.
pub fn read_frame<S: ByteSource + ?Sized>(
    source: &mut S,
    timeout: Duration,
) -> Result<RawFrame, SensorError> {
    let len_bytes = source.read_bytes(2, timeout)?;
    if len_bytes.len() != 2 {
        return Err(SensorError::TruncatedFrame {
            expected: 2,
            actual: len_bytes.len(),
        });
    }
    let declared = check_declared_len(BigEndian::read_u16(&len_bytes) as usize)?;

    let payload = source.read_bytes(declared, timeout)?;
    if payload.len() != declared {
        tracing::debug!(declared, received = payload.len(), "PMS5003 frame cut short");
        return Err(SensorError::TruncatedFrame {
            expected: declared,
            actual: payload.len(),
        });
    }

    let mut bytes = Vec::with_capacity(HEADER_LEN + declared);
    bytes.extend_from_slice(&PM_START_MARKER);
    bytes.extend_from_slice(&len_bytes);
    bytes.extend_from_slice(&payload);
    Ok(RawFrame::new(Protocol::Pms5003, bytes))
}

/// Validate and decode a complete buffered frame
pub fn decode_frame(frame: &[u8]) -> Result<PmFrame, SensorError> {
    if frame.len() < HEADER_LEN {
        return Err(SensorError::TruncatedFrame {
            expected: HEADER_LEN,
            actual: frame.len(),
        });
    }
    if frame[..2] != PM_START_MARKER {
        return Err(SensorError::StartByteMismatch(frame[0]));
    }
    let declared = check_declared_len(BigEndian::read_u16(&frame[2..4]) as usize)?;
    if frame.len() != HEADER_LEN + declared {
        return Err(SensorError::TruncatedFrame {
            expected: HEADER_LEN + declared,
            actual: frame.len(),
        });
    }

    verify_pm_checksum(frame)?;

    let payload = &frame[HEADER_LEN..];
    let mut values = [0u16; 6];
    BigEndian::read_u16_into(&payload[..12], &mut values);
    Ok(PmFrame::from_array(values))
}

fn check_declared_len(declared: usize) -> Result<usize, SensorError> {
    if declared > MAX_PM_PAYLOAD_LEN {
        return Err(SensorError::FrameTooLong(declared));
    }
    if declared < MIN_PM_PAYLOAD_LEN {
        return Err(SensorError::TruncatedFrame {
            expected: MIN_PM_PAYLOAD_LEN,
            actual: declared,
        });
    }
    Ok(declared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MockSource;

    fn sample() -> PmFrame {
        PmFrame::from_array([10, 25, 40, 10, 25, 40])
    }

    #[test]
    fn test_encode_layout() {
        let bytes = sample().encode();
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[..4], &[0x42, 0x4D, 0x00, 0x1C]);
        assert_eq!(
            &bytes[4..16],
            &[0x00, 0x0A, 0x00, 0x19, 0x00, 0x28, 0x00, 0x0A, 0x00, 0x19, 0x00, 0x28]
        );
        assert!(verify_pm_checksum(&bytes).is_ok());
    }

    #[test]
    fn test_decode_concrete_payload() {
        let decoded = decode_frame(&sample().encode()).unwrap();
        assert_eq!(decoded.pm1_cf, 10);
        assert_eq!(decoded.pm25_cf, 25);
        assert_eq!(decoded.pm10_cf, 40);
        assert_eq!(decoded.pm1_atm, 10);
        assert_eq!(decoded.pm25_atm, 25);
        assert_eq!(decoded.pm10_atm, 40);
    }

    #[test]
    fn test_decode_minimal_payload() {
        // 12 data bytes + checksum, nothing else
        let mut frame = vec![0x42, 0x4D, 0x00, 0x0E];
        frame.extend_from_slice(&[0, 1, 0, 2, 0, 3, 0, 4, 0, 5, 0, 6, 0, 0]);
        let sum = pm_checksum(&frame);
        let tail = frame.len() - 2;
        frame[tail..].copy_from_slice(&sum.to_be_bytes());

        assert_eq!(
            decode_frame(&frame).unwrap(),
            PmFrame::from_array([1, 2, 3, 4, 5, 6])
        );
    }

    #[test]
    fn test_read_frame_from_aligned_source() {
        let bytes = sample().encode();
        let mut source = MockSource::with_stream(&bytes[2..]);
        let frame = read_frame(&mut source, Duration::from_millis(10)).unwrap();
        assert_eq!(frame.protocol, Protocol::Pms5003);
        assert_eq!(frame.bytes, bytes);
    }

    #[test]
    fn test_truncated_payload() {
        let bytes = sample().encode();
        let mut source = MockSource::with_stream(&bytes[2..20]);
        let err = read_frame(&mut source, Duration::from_millis(10)).unwrap_err();
        assert!(matches!(
            err,
            SensorError::TruncatedFrame {
                expected: 28,
                actual: 16
            }
        ));
    }

    #[test]
    fn test_oversized_length_not_read() {
        let mut source = MockSource::with_stream([0xFF, 0xFF, 0x00, 0x00]);
        let err = read_frame(&mut source, Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, SensorError::FrameTooLong(0xFFFF)));
        assert_eq!(source.pending(), 2);
    }

    #[test]
    fn test_undersized_length() {
        let mut source = MockSource::with_stream([0x00, 0x04, 0x00, 0x00, 0x00, 0x00]);
        let err = read_frame(&mut source, Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, SensorError::TruncatedFrame { expected: 14, actual: 4 }));
    }

    #[test]
    fn test_corrupted_checksum_field() {
        let mut bytes = sample().encode();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert!(matches!(
            decode_frame(&bytes),
            Err(SensorError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_marker() {
        let mut bytes = sample().encode();
        bytes[0] = 0x43;
        assert!(matches!(
            decode_frame(&bytes),
            Err(SensorError::StartByteMismatch(0x43))
        ));
    }
}
