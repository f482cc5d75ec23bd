//! PM2.5 air quality bands and CO2 comfort levels

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::reading::{Co2Reading, PmReading};

/// Qualitative air quality, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AirQuality {
    /// PM2.5 up to 12
    Good,
    /// Up to 35
    Moderate,
    /// Up to 55
    UnhealthyForSensitive,
    /// Up to 150
    Unhealthy,
    /// Up to 250
    VeryUnhealthy,
    /// Above 250, or no usable value
    Hazardous,
}

/// Inclusive PM2.5 upper bounds (µg/m³); anything above the last is hazardous
const THRESHOLDS: [(f64, AirQuality); 5] = [
    (12.0, AirQuality::Good),
    (35.0, AirQuality::Moderate),
    (55.0, AirQuality::UnhealthyForSensitive),
    (150.0, AirQuality::Unhealthy),
    (250.0, AirQuality::VeryUnhealthy),
];

impl AirQuality {
    /// Band for a PM2.5 concentration in µg/m³
    pub fn from_pm25(pm25: f64) -> Self {
        THRESHOLDS
            .iter()
            .find(|(limit, _)| pm25 <= *limit)
            .map(|&(_, band)| band)
            .unwrap_or(AirQuality::Hazardous)
    }

    /// Band for the atmospheric PM2.5 value of a reading
    pub fn classify(reading: &PmReading) -> Self {
        Self::from_pm25(reading.pm25_atm as f64)
    }

    /// Human readable band name
    pub fn label(&self) -> &'static str {
        match self {
            AirQuality::Good => "Good",
            AirQuality::Moderate => "Moderate",
            AirQuality::UnhealthyForSensitive => "Unhealthy for Sensitive Groups",
            AirQuality::Unhealthy => "Unhealthy",
            AirQuality::VeryUnhealthy => "Very Unhealthy",
            AirQuality::Hazardous => "Hazardous",
        }
    }

    /// 0 (good) through 5 (hazardous)
    pub fn severity(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for AirQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Indoor CO2 level, ordered from lowest to highest concentration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Co2Level {
    /// Under 400 ppm
    BelowNormal,
    /// 400 to 999 ppm
    Good,
    /// 1000 to 1999 ppm
    Moderate,
    /// 2000 to 4999 ppm
    Poor,
    /// 5000 ppm and above
    VeryPoor,
}

/// Exclusive ppm upper bounds; anything at or above the last is very poor
const CO2_THRESHOLDS: [(u16, Co2Level); 4] = [
    (400, Co2Level::BelowNormal),
    (1000, Co2Level::Good),
    (2000, Co2Level::Moderate),
    (5000, Co2Level::Poor),
];

impl Co2Level {
    /// Level for a CO2 concentration in ppm
    pub fn from_ppm(ppm: u16) -> Self {
        CO2_THRESHOLDS
            .iter()
            .find(|(limit, _)| ppm < *limit)
            .map(|&(_, level)| level)
            .unwrap_or(Co2Level::VeryPoor)
    }

    /// Level of a reading
    pub fn classify(reading: &Co2Reading) -> Self {
        Self::from_ppm(reading.co2_ppm)
    }

    /// Human readable level name
    pub fn label(&self) -> &'static str {
        match self {
            Co2Level::BelowNormal => "Below normal (outdoor level)",
            Co2Level::Good => "Good (acceptable)",
            Co2Level::Moderate => "Moderate (some complaints)",
            Co2Level::Poor => "Poor (drowsiness, stuffiness)",
            Co2Level::VeryPoor => "Very poor (health effects)",
        }
    }
}

impl fmt::Display for Co2Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_inclusive() {
        assert_eq!(AirQuality::from_pm25(12.0), AirQuality::Good);
        assert_eq!(AirQuality::from_pm25(12.1), AirQuality::Moderate);
        assert_eq!(AirQuality::from_pm25(35.0), AirQuality::Moderate);
        assert_eq!(AirQuality::from_pm25(55.0), AirQuality::UnhealthyForSensitive);
        assert_eq!(AirQuality::from_pm25(150.0), AirQuality::Unhealthy);
        assert_eq!(AirQuality::from_pm25(250.0), AirQuality::VeryUnhealthy);
        assert_eq!(AirQuality::from_pm25(250.1), AirQuality::Hazardous);
    }

    #[test]
    fn test_severity_ordering() {
        assert_eq!(AirQuality::Good.severity(), 0);
        assert_eq!(AirQuality::Hazardous.severity(), 5);
        assert!(AirQuality::Moderate < AirQuality::Unhealthy);
    }

    #[test]
    fn test_co2_levels() {
        assert_eq!(Co2Level::from_ppm(0), Co2Level::BelowNormal);
        assert_eq!(Co2Level::from_ppm(399), Co2Level::BelowNormal);
        assert_eq!(Co2Level::from_ppm(400), Co2Level::Good);
        assert_eq!(Co2Level::from_ppm(999), Co2Level::Good);
        assert_eq!(Co2Level::from_ppm(1000), Co2Level::Moderate);
        assert_eq!(Co2Level::from_ppm(2000), Co2Level::Poor);
        assert_eq!(Co2Level::from_ppm(4999), Co2Level::Poor);
        assert_eq!(Co2Level::from_ppm(5000), Co2Level::VeryPoor);
        assert_eq!(Co2Level::from_ppm(u16::MAX), Co2Level::VeryPoor);
    }
}
