//! Continuous polling
//!
//! [`ContinuousReader`] turns single reads into a lazy stream of decode
//! outcomes. It is a small state machine:
//!
//! ```text
//! Running --next()--> Decoding --ok / recoverable error--> Running
//!                         \--transport failure--> Stopped
//! Running --sleep, then cancelled or past deadline--> Stopped
//! ```
//!
//! Decode failures are yielded as `Err` items and never end the session; a
//! serial link is expected to desynchronize now and then. Only cancellation,
//! the optional deadline, or the link itself failing stop it. `Stopped` is
//! terminal and the iterator is fused.

use serde::Serialize;
use std::iter::FusedIterator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::reading::DecodeOutcome;
use crate::sensor::Sensor;

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    /// Waiting for the next cycle
    Running,
    /// A read cycle is in progress
    Decoding,
    /// Session ended; no further items
    Stopped,
}

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    /// A [`CancelHandle`] was triggered
    Cancelled,
    /// The session duration elapsed
    DeadlineReached,
    /// The link failed and cannot be polled further
    TransportFailure,
}

/// Cooperative cancellation for a running session.
///
/// Cloneable and usable from any thread. Cancelling also wakes a reader that
/// is sleeping between cycles, so shutdown does not wait out the interval.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
    wake: Sender<()>,
}

impl CancelHandle {
    /// Ask the session to stop at its next check point
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        // The reader may already be gone
        let _ = self.wake.send(());
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Counters for a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    /// Read cycles performed
    pub cycles: u64,
    /// Cycles that ended in a decode or transport failure
    pub failures: u64,
}

/// Polls a sensor on a fixed interval until cancelled or past its deadline
pub struct ContinuousReader<T: Sensor> {
    sensor: T,
    interval: Duration,
    duration: Option<Duration>,
    deadline: Option<Instant>,
    started: Option<Instant>,
    state: SessionState,
    stop_reason: Option<StopReason>,
    stats: SessionStats,
    cancel: CancelHandle,
    wake: Receiver<()>,
}

impl<T: Sensor> ContinuousReader<T> {
    /// Unbounded session polling `sensor` every `interval`
    pub fn new(sensor: T, interval: Duration) -> Self {
        let min = sensor.min_poll_interval();
        if interval < min {
            tracing::warn!(
                protocol = %sensor.protocol(),
                interval_ms = interval.as_millis() as u64,
                recommended_ms = min.as_millis() as u64,
                "polling faster than recommended may affect sensor accuracy"
            );
        }

        let (tx, rx) = mpsc::channel();
        Self {
            sensor,
            interval,
            duration: None,
            deadline: None,
            started: None,
            state: SessionState::Running,
            stop_reason: None,
            stats: SessionStats::default(),
            cancel: CancelHandle {
                flag: Arc::new(AtomicBool::new(false)),
                wake: tx,
            },
            wake: rx,
        }
    }

    /// Stop once `duration` has elapsed since the first cycle
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Handle for stopping this session from elsewhere
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Why the session stopped, once it has
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    /// Counters so far
    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Configured polling interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time since the first cycle started
    pub fn elapsed(&self) -> Duration {
        self.started.map(|s| s.elapsed()).unwrap_or_default()
    }

    /// Wait one interval, returning early if cancelled.
    ///
    /// The reader holds a sender itself, so the channel never disconnects and
    /// the only ways out are a wake-up or the timeout.
    fn sleep_interval(&self) {
        let _ = self.wake.recv_timeout(self.interval);
    }

    fn exit_condition(&self) -> Option<StopReason> {
        if self.cancel.is_cancelled() {
            return Some(StopReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(StopReason::DeadlineReached),
            _ => None,
        }
    }

    fn stop(&mut self, reason: StopReason) {
        self.state = SessionState::Stopped;
        self.stop_reason = Some(reason);
        tracing::info!(
            protocol = %self.sensor.protocol(),
            reason = ?reason,
            cycles = self.stats.cycles,
            failures = self.stats.failures,
            "polling session stopped"
        );
    }
}

impl<T: Sensor> Iterator for ContinuousReader<T> {
    type Item = DecodeOutcome<T::Reading>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state == SessionState::Stopped {
            return None;
        }

        let exit = if self.started.is_none() {
            let now = Instant::now();
            self.started = Some(now);
            self.deadline = self.duration.map(|d| now + d);
            self.cancel
                .is_cancelled()
                .then_some(StopReason::Cancelled)
        } else {
            self.sleep_interval();
            self.exit_condition()
        };

        if let Some(reason) = exit {
            self.stop(reason);
            return None;
        }

        self.state = SessionState::Decoding;
        let outcome = self.sensor.read_once();
        self.stats.cycles += 1;

        match &outcome {
            Ok(_) => self.state = SessionState::Running,
            Err(err) if err.is_recoverable() => {
                self.stats.failures += 1;
                tracing::warn!(
                    protocol = %self.sensor.protocol(),
                    kind = ?err.kind(),
                    "read failed: {}",
                    err
                );
                self.state = SessionState::Running;
            }
            Err(err) => {
                self.stats.failures += 1;
                tracing::error!(protocol = %self.sensor.protocol(), "link failed: {}", err);
                self.stop(StopReason::TransportFailure);
            }
        }

        Some(outcome)
    }
}

impl<T: Sensor> FusedIterator for ContinuousReader<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{PmFrame, Protocol, SensorError};
    use std::collections::VecDeque;

    /// Sensor replaying canned outcomes, then failing with sync timeouts
    struct Scripted {
        outcomes: VecDeque<DecodeOutcome<u16>>,
    }

    impl Scripted {
        fn new(outcomes: Vec<DecodeOutcome<u16>>) -> Self {
            Self {
                outcomes: outcomes.into(),
            }
        }
    }

    impl Sensor for Scripted {
        type Reading = u16;

        fn protocol(&self) -> Protocol {
            Protocol::Pms5003
        }

        fn read_once(&mut self) -> DecodeOutcome<u16> {
            self.outcomes
                .pop_front()
                .unwrap_or(Err(SensorError::SyncTimeout { scanned: 0 }))
        }
    }

    #[test]
    fn test_failures_do_not_end_session() {
        let sensor = Scripted::new(vec![
            Err(SensorError::ChecksumMismatch {
                expected: 1,
                actual: 2,
            }),
            Ok(7),
            Err(SensorError::TruncatedFrame {
                expected: 28,
                actual: 3,
            }),
            Ok(8),
        ]);
        let mut reader = ContinuousReader::new(sensor, Duration::ZERO);
        let items: Vec<_> = reader.by_ref().take(6).collect();

        assert_eq!(items.len(), 6);
        assert_eq!(items.iter().filter(|i| i.is_ok()).count(), 2);
        assert_eq!(reader.state(), SessionState::Running);
        assert_eq!(
            reader.stats(),
            SessionStats {
                cycles: 6,
                failures: 4
            }
        );
    }

    #[test]
    fn test_cancel_before_first_cycle() {
        let mut reader = ContinuousReader::new(Scripted::new(vec![Ok(1)]), Duration::ZERO);
        reader.cancel_handle().cancel();
        assert!(reader.next().is_none());
        assert_eq!(reader.stop_reason(), Some(StopReason::Cancelled));
        assert_eq!(reader.stats().cycles, 0);
    }

    #[test]
    fn test_cancel_between_cycles() {
        let mut reader = ContinuousReader::new(Scripted::new(vec![Ok(1), Ok(2)]), Duration::ZERO);
        let handle = reader.cancel_handle();
        assert_eq!(reader.next().unwrap().unwrap(), 1);
        handle.cancel();
        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
        assert_eq!(reader.state(), SessionState::Stopped);
    }

    #[test]
    fn test_cancel_interrupts_sleep() {
        let mut reader =
            ContinuousReader::new(Scripted::new(vec![Ok(1)]), Duration::from_secs(60));
        let handle = reader.cancel_handle();
        assert!(reader.next().unwrap().is_ok());

        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            handle.cancel();
        });
        let start = Instant::now();
        assert!(reader.next().is_none());
        assert!(start.elapsed() < Duration::from_secs(5));
        canceller.join().unwrap();
    }

    #[test]
    fn test_transport_failure_is_last_item() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged");
        let sensor = Scripted::new(vec![Ok(1), Err(SensorError::IoError(io)), Ok(2)]);
        let items: Vec<_> = ContinuousReader::new(sensor, Duration::ZERO).collect();
        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }

    #[test]
    fn test_zero_duration_runs_one_cycle() {
        let reader = ContinuousReader::new(Scripted::new(vec![Ok(5)]), Duration::ZERO)
            .with_duration(Duration::ZERO);
        let items: Vec<_> = reader.collect();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_warns_but_polls_fast_sensor() {
        struct Slow;
        impl Sensor for Slow {
            type Reading = PmFrame;
            fn protocol(&self) -> Protocol {
                Protocol::Mhz19c
            }
            fn read_once(&mut self) -> DecodeOutcome<PmFrame> {
                Ok(PmFrame::default())
            }
            fn min_poll_interval(&self) -> Duration {
                Duration::from_secs(5)
            }
        }

        let mut reader = ContinuousReader::new(Slow, Duration::ZERO);
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().unwrap().is_ok());
    }
}
