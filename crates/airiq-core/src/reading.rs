//! Validated sensor readings
//!
//! Readings are immutable snapshots, stamped at the moment decoding succeeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::{Co2Frame, PmFrame, Protocol, SensorError};

/// Result of one decode attempt: a complete reading or the reason there is none
pub type DecodeOutcome<R> = Result<R, SensorError>;

/// Particulate matter concentrations in µg/m³
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PmReading {
    /// PM1.0, standard particle (CF=1)
    pub pm1_cf: u16,
    /// PM2.5, standard particle (CF=1)
    pub pm25_cf: u16,
    /// PM10, standard particle (CF=1)
    pub pm10_cf: u16,
    /// PM1.0, atmospheric environment
    pub pm1_atm: u16,
    /// PM2.5, atmospheric environment
    pub pm25_atm: u16,
    /// PM10, atmospheric environment
    pub pm10_atm: u16,
    /// When the frame was decoded
    pub captured_at: DateTime<Utc>,
}

impl PmReading {
    /// Stamp a decoded frame
    pub fn new(frame: PmFrame, captured_at: DateTime<Utc>) -> Self {
        Self {
            pm1_cf: frame.pm1_cf,
            pm25_cf: frame.pm25_cf,
            pm10_cf: frame.pm10_cf,
            pm1_atm: frame.pm1_atm,
            pm25_atm: frame.pm25_atm,
            pm10_atm: frame.pm10_atm,
            captured_at,
        }
    }

    /// The concentrations without the timestamp
    pub fn frame(&self) -> PmFrame {
        PmFrame {
            pm1_cf: self.pm1_cf,
            pm25_cf: self.pm25_cf,
            pm10_cf: self.pm10_cf,
            pm1_atm: self.pm1_atm,
            pm25_atm: self.pm25_atm,
            pm10_atm: self.pm10_atm,
        }
    }
}

/// CO2 concentration and sensor temperature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Co2Reading {
    /// CO2 concentration in ppm
    pub co2_ppm: u16,
    /// Sensor temperature in °C, may be negative
    pub temperature_c: i16,
    /// Raw status byte
    pub status: u8,
    /// When the response was decoded
    pub captured_at: DateTime<Utc>,
}

impl Co2Reading {
    /// Stamp a decoded response
    pub fn new(frame: Co2Frame, captured_at: DateTime<Utc>) -> Self {
        Self {
            co2_ppm: frame.co2_ppm,
            temperature_c: frame.temperature_c,
            status: frame.status,
            captured_at,
        }
    }

    /// The values without the timestamp
    pub fn frame(&self) -> Co2Frame {
        Co2Frame {
            co2_ppm: self.co2_ppm,
            temperature_c: self.temperature_c,
            status: self.status,
        }
    }
}

/// A reading from either sensor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "sensor", rename_all = "lowercase")]
pub enum Reading {
    /// From a PMS5003
    Pm(PmReading),
    /// From an MH-Z19C
    Co2(Co2Reading),
}

impl Reading {
    /// Protocol the reading came from
    pub fn protocol(&self) -> Protocol {
        match self {
            Reading::Pm(_) => Protocol::Pms5003,
            Reading::Co2(_) => Protocol::Mhz19c,
        }
    }

    /// When the reading was decoded
    pub fn captured_at(&self) -> DateTime<Utc> {
        match self {
            Reading::Pm(r) => r.captured_at,
            Reading::Co2(r) => r.captured_at,
        }
    }
}

impl From<PmReading> for Reading {
    fn from(reading: PmReading) -> Self {
        Reading::Pm(reading)
    }
}

impl From<Co2Reading> for Reading {
    fn from(reading: Co2Reading) -> Self {
        Reading::Co2(reading)
    }
}
