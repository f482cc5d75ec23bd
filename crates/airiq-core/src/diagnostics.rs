//! Link diagnostics
//!
//! Captures raw bytes from a link without decoding anything, for checking
//! wiring and whether a sensor is transmitting at all.

use serde::Serialize;
use std::time::{Duration, Instant};

use crate::protocol::{ByteSource, SensorError, PM_START_MARKER};

/// Below this many bytes in a capture the link is considered unreliable
pub const SPARSE_CAPTURE_BYTES: usize = 32;

const READ_CHUNK: usize = 64;

/// What a capture suggests about the link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LinkVerdict {
    /// Nothing received; check TX/RX wiring, power, port name
    Silent,
    /// A few bytes only; likely a loose connection or a sleeping sensor
    Sparse,
    /// Data is flowing
    Streaming,
}

/// Bytes captured over a time window
#[derive(Debug, Clone, Serialize)]
pub struct CaptureReport {
    /// Everything received, in arrival order
    pub bytes: Vec<u8>,
    /// Offsets at which a PMS5003 start marker begins
    pub marker_offsets: Vec<usize>,
    /// Actual capture time
    pub elapsed: Duration,
}

impl CaptureReport {
    /// Judge the link by how much arrived
    pub fn verdict(&self) -> LinkVerdict {
        match self.bytes.len() {
            0 => LinkVerdict::Silent,
            n if n < SPARSE_CAPTURE_BYTES => LinkVerdict::Sparse,
            _ => LinkVerdict::Streaming,
        }
    }

    /// Hex dump, `width` bytes per line
    pub fn hex_lines(&self, width: usize) -> Vec<String> {
        hex_lines(&self.bytes, width)
    }
}

/// Read whatever arrives on `source` for `window`
pub fn capture<S: ByteSource + ?Sized>(
    source: &mut S,
    window: Duration,
) -> Result<CaptureReport, SensorError> {
    let start = Instant::now();
    let mut bytes = Vec::new();

    loop {
        let remaining = window.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            break;
        }
        let chunk = source.read_bytes(READ_CHUNK, remaining.min(Duration::from_millis(100)))?;
        bytes.extend_from_slice(&chunk);
    }

    let marker_offsets = bytes
        .windows(PM_START_MARKER.len())
        .enumerate()
        .filter(|(_, w)| *w == PM_START_MARKER)
        .map(|(i, _)| i)
        .collect();

    tracing::debug!(bytes = bytes.len(), "capture finished");
    Ok(CaptureReport {
        bytes,
        marker_offsets,
        elapsed: start.elapsed(),
    })
}

/// Format bytes as space separated upper-case hex, `width` per line
pub fn hex_lines(bytes: &[u8], width: usize) -> Vec<String> {
    bytes
        .chunks(width.max(1))
        .map(|line| {
            line.iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MockSource, PmFrame};

    #[test]
    fn test_capture_finds_markers() {
        let mut stream = vec![0x00, 0x11];
        stream.extend(PmFrame::default().encode());
        stream.extend(PmFrame::default().encode());
        let mut source = MockSource::with_stream(&stream);

        let report = capture(&mut source, Duration::from_millis(20)).unwrap();
        assert_eq!(report.bytes, stream);
        assert_eq!(report.marker_offsets, vec![2, 34]);
        assert_eq!(report.verdict(), LinkVerdict::Streaming);
    }

    #[test]
    fn test_silent_and_sparse() {
        let report = capture(&mut MockSource::new(), Duration::from_millis(5)).unwrap();
        assert_eq!(report.verdict(), LinkVerdict::Silent);

        let report = capture(&mut MockSource::with_stream([1, 2, 3]), Duration::from_millis(5)).unwrap();
        assert_eq!(report.verdict(), LinkVerdict::Sparse);
    }

    #[test]
    fn test_hex_lines() {
        let lines = hex_lines(&[0x42, 0x4D, 0x00, 0x1C, 0xAB], 2);
        assert_eq!(lines, vec!["42 4D", "00 1C", "AB"]);
    }
}
