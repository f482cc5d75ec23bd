//! # AirIQ Core Library
//!
//! Core functionality for polling serial air quality sensors.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Frame synchronization and checksum validation for raw serial streams
//! - PMS5003 particulate matter frame decoding
//! - MH-Z19C CO2 command/response decoding
//! - Continuous polling sessions with cooperative cancellation
//! - A shared latest-reading slot for background polling
//!
//! ## Supported sensors
//!
//! - Plantower PMS5003 (PM1.0 / PM2.5 / PM10)
//! - Winsen MH-Z19C (CO2, temperature)
//!
//! ## Example
//!
//! ```rust,ignore
//! use airiq_core::prelude::*;
//! use std::time::Duration;
//!
//! let sensor = Pms5003::open(&SensorLinkConfig::new("/dev/ttyS0"))?;
//! let reader = ContinuousReader::new(sensor, Duration::from_secs(2))
//!     .with_duration(Duration::from_secs(60));
//!
//! for outcome in reader {
//!     match outcome {
//!         Ok(reading) => println!("PM2.5: {} µg/m³", reading.pm25_atm),
//!         Err(e) => eprintln!("read failed: {e}"),
//!     }
//! }
//! ```

pub mod classifier;
pub mod config;
pub mod continuous;
pub mod diagnostics;
pub mod monitor;
pub mod protocol;
pub mod reading;
pub mod sensor;
pub mod storage;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::classifier::{AirQuality, Co2Level};
    pub use crate::config::{AirIqConfig, ConfigError, PollingSettings};
    pub use crate::continuous::{CancelHandle, ContinuousReader, SessionState, StopReason};
    pub use crate::monitor::{spawn_monitor, LatestReading, MonitorHandle, MonitorSnapshot};
    pub use crate::protocol::{
        ByteSource, CalibrationConfirmation, FailureKind, MockSource, Protocol, SensorError,
        SensorLinkConfig,
    };
    pub use crate::reading::{Co2Reading, DecodeOutcome, PmReading, Reading};
    pub use crate::sensor::{Mhz19c, Pms5003, Sensor};
    pub use crate::storage::{MemoryStore, ReadingStore, StoredReading};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
