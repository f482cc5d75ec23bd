//! Reading storage collaborator
//!
//! The core never persists anything itself. Whatever keeps history (a
//! database, a dashboard backend) implements [`ReadingStore`]; [`MemoryStore`]
//! is the in-process implementation used by tests and short sessions.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

use crate::reading::PmReading;

/// Particulate reading as kept by a store, keyed by timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    /// When the reading was taken
    pub timestamp: DateTime<Utc>,
    /// PM1.0 in µg/m³
    pub pm1: f64,
    /// PM2.5 in µg/m³
    pub pm25: f64,
    /// PM10 in µg/m³
    pub pm10: f64,
}

impl From<&PmReading> for StoredReading {
    fn from(reading: &PmReading) -> Self {
        Self {
            timestamp: reading.captured_at,
            pm1: reading.pm1_atm as f64,
            pm25: reading.pm25_atm as f64,
            pm10: reading.pm10_atm as f64,
        }
    }
}

/// One point of a history chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    /// When the reading was taken
    pub timestamp: DateTime<Utc>,
    /// PM2.5 in µg/m³
    pub pm25: f64,
    /// PM10 in µg/m³
    pub pm10: f64,
}

/// Errors raised by a store
#[derive(Error, Debug)]
pub enum StorageError {
    /// A writer panicked while holding the lock
    #[error("Store lock poisoned: {0}")]
    LockPoisoned(String),

    /// Window too large to subtract from now
    #[error("Retention window out of range")]
    WindowOutOfRange,

    /// Failure reported by an external store implementation
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl<T> From<PoisonError<T>> for StorageError {
    fn from(err: PoisonError<T>) -> Self {
        StorageError::LockPoisoned(err.to_string())
    }
}

/// Operations the polling side needs from a reading store
pub trait ReadingStore: Send + Sync {
    /// Record one reading
    fn insert_reading(&self, reading: StoredReading) -> Result<(), StorageError>;

    /// The reading with the newest timestamp
    fn latest_reading(&self) -> Result<Option<StoredReading>, StorageError>;

    /// Readings newer than `window`, oldest first
    fn history(&self, window: Duration) -> Result<Vec<HistoryPoint>, StorageError>;

    /// Every stored reading, newest first
    fn all_records(&self) -> Result<Vec<StoredReading>, StorageError>;

    /// Drop readings older than `age`, returning how many were removed
    fn purge_older_than(&self, age: Duration) -> Result<usize, StorageError>;
}

/// In-memory [`ReadingStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    readings: Arc<Mutex<Vec<StoredReading>>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored readings
    pub fn len(&self) -> usize {
        self.readings.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether the store holds no readings
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn cutoff(window: Duration) -> Result<DateTime<Utc>, StorageError> {
    let window = ChronoDuration::from_std(window).map_err(|_| StorageError::WindowOutOfRange)?;
    Utc::now()
        .checked_sub_signed(window)
        .ok_or(StorageError::WindowOutOfRange)
}

impl ReadingStore for MemoryStore {
    fn insert_reading(&self, reading: StoredReading) -> Result<(), StorageError> {
        let mut readings = self.readings.lock()?;
        // Keep timestamp order even if a caller inserts late
        let pos = readings.partition_point(|r| r.timestamp <= reading.timestamp);
        readings.insert(pos, reading);
        Ok(())
    }

    fn latest_reading(&self) -> Result<Option<StoredReading>, StorageError> {
        Ok(self.readings.lock()?.last().cloned())
    }

    fn history(&self, window: Duration) -> Result<Vec<HistoryPoint>, StorageError> {
        let since = cutoff(window)?;
        let readings = self.readings.lock()?;
        Ok(readings
            .iter()
            .filter(|r| r.timestamp > since)
            .map(|r| HistoryPoint {
                timestamp: r.timestamp,
                pm25: r.pm25,
                pm10: r.pm10,
            })
            .collect())
    }

    fn all_records(&self) -> Result<Vec<StoredReading>, StorageError> {
        Ok(self.readings.lock()?.iter().rev().cloned().collect())
    }

    fn purge_older_than(&self, age: Duration) -> Result<usize, StorageError> {
        let since = cutoff(age)?;
        let mut readings = self.readings.lock()?;
        let before = readings.len();
        readings.retain(|r| r.timestamp >= since);
        Ok(before - readings.len())
    }
}
