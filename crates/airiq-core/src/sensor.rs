//! Sensor drivers
//!
//! A [`Sensor`] owns its byte source exclusively and turns one call to
//! [`Sensor::read_once`] into one synchronize + decode cycle. Interleaving
//! reads from two owners would corrupt frame alignment, so drivers are moved,
//! never shared.

use chrono::Utc;
use std::time::Duration;

use crate::protocol::{
    co2, open_port, pms, ByteSource, CalibrationConfirmation, Co2Command, FrameSynchronizer,
    Protocol, SensorError, SensorLinkConfig, SerialChannel,
};
use crate::reading::{Co2Reading, DecodeOutcome, PmReading};

/// Pause between sending the read command and reading the MH-Z19C response
pub const CO2_RESPONSE_DELAY: Duration = Duration::from_millis(100);

/// Polling faster than this degrades MH-Z19C accuracy
pub const CO2_MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// A sensor that can be polled for one reading at a time
pub trait Sensor: Send {
    /// Reading type produced by this sensor
    type Reading: Clone + Send + Sync + 'static;

    /// Wire protocol spoken by the sensor
    fn protocol(&self) -> Protocol;

    /// Perform one complete read cycle
    fn read_once(&mut self) -> DecodeOutcome<Self::Reading>;

    /// Shortest interval the manufacturer recommends between polls
    fn min_poll_interval(&self) -> Duration {
        Duration::ZERO
    }
}

/// PMS5003 driver
pub struct Pms5003<S> {
    source: S,
    synchronizer: FrameSynchronizer,
    timeout: Duration,
}

impl Pms5003<SerialChannel> {
    /// Open the serial link and wrap it in a driver
    pub fn open(config: &SensorLinkConfig) -> Result<Self, SensorError> {
        let channel = open_port(config)?;
        Ok(Self::new(channel, config.read_timeout()))
    }
}

impl<S: ByteSource> Pms5003<S> {
    /// Driver over an already open source
    pub fn new(source: S, timeout: Duration) -> Self {
        Self {
            source,
            synchronizer: FrameSynchronizer::default(),
            timeout,
        }
    }

    /// Limit how many bytes a cycle may scan for the start marker
    pub fn with_sync_budget(mut self, budget: usize) -> Self {
        self.synchronizer = FrameSynchronizer::new(budget);
        self
    }

    /// Give the byte source back, closing the driver
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S: ByteSource> Sensor for Pms5003<S> {
    type Reading = PmReading;

    fn protocol(&self) -> Protocol {
        Protocol::Pms5003
    }

    fn read_once(&mut self) -> DecodeOutcome<PmReading> {
        self.synchronizer.align(&mut self.source, self.timeout)?;
        let frame = pms::read_frame(&mut self.source, self.timeout)?;
        let values = pms::decode_frame(&frame.bytes)?;
        tracing::debug!(%frame, "decoded PMS5003 frame");
        Ok(PmReading::new(values, Utc::now()))
    }
}

/// MH-Z19C driver
pub struct Mhz19c<S> {
    source: S,
    timeout: Duration,
    response_delay: Duration,
}

impl Mhz19c<SerialChannel> {
    /// Open the serial link and wrap it in a driver
    pub fn open(config: &SensorLinkConfig) -> Result<Self, SensorError> {
        let channel = open_port(config)?;
        Ok(Self::new(channel, config.read_timeout()))
    }
}

impl<S: ByteSource> Mhz19c<S> {
    /// Driver over an already open source
    pub fn new(source: S, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            response_delay: CO2_RESPONSE_DELAY,
        }
    }

    /// Override the pause between request and response
    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    /// Give back the underlying source
    pub fn into_inner(self) -> S {
        self.source
    }

    /// Send the zero-point calibration command.
    ///
    /// Only valid with the sensor in 400 ppm outdoor air after at least 20
    /// minutes of warm-up. The sensor does not answer; it needs about 20
    /// seconds before readings settle again.
    pub fn calibrate_zero_point(
        &mut self,
        _confirmation: CalibrationConfirmation,
    ) -> Result<(), SensorError> {
        tracing::warn!("sending MH-Z19C zero point calibration");
        self.source
            .write_bytes(&Co2Command::ZeroCalibration.to_bytes())?;
        Ok(())
    }
}

impl<S: ByteSource> Sensor for Mhz19c<S> {
    type Reading = Co2Reading;

    fn protocol(&self) -> Protocol {
        Protocol::Mhz19c
    }

    fn read_once(&mut self) -> DecodeOutcome<Co2Reading> {
        // Stale bytes from an earlier failed exchange would misalign the response
        self.source.clear_input()?;
        self.source
            .write_bytes(&Co2Command::ReadConcentration.to_bytes())?;
        if !self.response_delay.is_zero() {
            std::thread::sleep(self.response_delay);
        }

        let frame = co2::read_response(&mut self.source, self.timeout)?;
        let values = co2::decode_response(&frame.bytes)?;
        tracing::debug!(%frame, "decoded MH-Z19C response");
        Ok(Co2Reading::new(values, Utc::now()))
    }

    fn min_poll_interval(&self) -> Duration {
        CO2_MIN_POLL_INTERVAL
    }
}
