//! Frame synchronization
//!
//! The PMS5003 streams frames continuously and the host may start listening
//! anywhere inside one. The synchronizer discards bytes until it has consumed
//! the two-byte start marker, or gives up once its read budget is spent so a
//! dead link cannot block a polling cycle forever.

use std::time::Duration;

use super::{ByteSource, SensorError, DEFAULT_SYNC_BUDGET, PM_START_MARKER};

/// Scans a byte stream for the PMS5003 start marker
#[derive(Debug, Clone, Copy)]
pub struct FrameSynchronizer {
    budget: usize,
}

impl Default for FrameSynchronizer {
    fn default() -> Self {
        Self::new(DEFAULT_SYNC_BUDGET)
    }
}

impl FrameSynchronizer {
    /// Synchronizer that reads at most `budget` bytes per attempt
    pub fn new(budget: usize) -> Self {
        Self {
            budget: budget.max(PM_START_MARKER.len()),
        }
    }

    /// Bytes scanned before giving up
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Consume bytes until the start marker has been read.
    ///
    /// On success the source is positioned on the first length byte and the
    /// number of bytes consumed (marker included) is returned. A byte that
    /// fails to complete the marker is itself tested as a marker start, so
    /// `42 42 4D` aligns on the second `42`.
    pub fn align<S: ByteSource + ?Sized>(
        &self,
        source: &mut S,
        timeout: Duration,
    ) -> Result<usize, SensorError> {
        let [first, second] = PM_START_MARKER;
        let mut scanned = 0;
        let mut armed = false;

        while scanned < self.budget {
            let byte = match source.read_bytes(1, timeout)?.first() {
                Some(&b) => b,
                None => {
                    tracing::debug!(scanned, "link went quiet while scanning for marker");
                    return Err(SensorError::SyncTimeout { scanned });
                }
            };
            scanned += 1;

            if armed && byte == second {
                if scanned > PM_START_MARKER.len() {
                    tracing::debug!(
                        skipped = scanned - PM_START_MARKER.len(),
                        "resynchronized on start marker"
                    );
                }
                return Ok(scanned);
            }
            armed = byte == first;
        }

        tracing::debug!(scanned, "sync budget exhausted");
        Err(SensorError::SyncTimeout { scanned })
    }
}
