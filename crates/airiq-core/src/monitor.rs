//! Background polling with a shared latest-reading slot
//!
//! A monitor moves a [`ContinuousReader`] onto its own thread, which then has
//! exclusive ownership of the sensor link. The thread is the only writer of a
//! single-slot `watch` channel holding the latest [`MonitorSnapshot`]; any
//! number of [`LatestReading`] handles copy snapshots out of it. Every update
//! replaces the whole snapshot.

use serde::Serialize;
use std::io;
use std::thread::JoinHandle;
use tokio::sync::watch;

use crate::continuous::{CancelHandle, ContinuousReader, SessionStats};
use crate::protocol::FailureKind;
use crate::sensor::Sensor;

/// State published after every poll
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot<R> {
    /// Most recent successful reading
    pub reading: Option<R>,
    /// False once the session has ended or the link failed
    pub connected: bool,
    /// Message of the most recent failure, cleared by the next success
    pub last_error: Option<String>,
    /// Kind of the most recent failure
    pub last_error_kind: Option<FailureKind>,
    /// Session counters
    pub stats: SessionStats,
}

impl<R> Default for MonitorSnapshot<R> {
    fn default() -> Self {
        Self {
            reading: None,
            connected: false,
            last_error: None,
            last_error_kind: None,
            stats: SessionStats::default(),
        }
    }
}

/// Read side of the latest-reading slot
#[derive(Debug, Clone)]
pub struct LatestReading<R> {
    rx: watch::Receiver<MonitorSnapshot<R>>,
}

impl<R: Clone> LatestReading<R> {
    /// Copy of the current snapshot
    pub fn snapshot(&self) -> MonitorSnapshot<R> {
        self.rx.borrow().clone()
    }

    /// Copy of the most recent successful reading
    pub fn reading(&self) -> Option<R> {
        self.rx.borrow().reading.clone()
    }

    /// Wait for the next published snapshot.
    ///
    /// Returns `false` once the monitor thread has exited.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

/// Handle to a running monitor thread
pub struct MonitorHandle<R> {
    cancel: CancelHandle,
    latest: LatestReading<R>,
    thread: Option<JoinHandle<SessionStats>>,
}

impl<R: Clone> MonitorHandle<R> {
    /// A reader for the latest-reading slot
    pub fn latest(&self) -> LatestReading<R> {
        self.latest.clone()
    }

    /// Handle for cancelling the session without joining it
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Whether the polling thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Cancel the session and wait for the polling thread
    pub fn stop(mut self) -> SessionStats {
        self.cancel.cancel();
        self.join()
    }

    /// Wait for the session to end on its own
    pub fn join(&mut self) -> SessionStats {
        match self.thread.take().map(|t| t.join()) {
            Some(Ok(stats)) => stats,
            Some(Err(_)) => {
                tracing::error!("polling thread panicked");
                self.latest.snapshot().stats
            }
            None => self.latest.snapshot().stats,
        }
    }
}

impl<R> Drop for MonitorHandle<R> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start polling on a dedicated thread.
///
/// `sink` sees every successful reading before it is published, e.g. to hand
/// it to a [`crate::storage::ReadingStore`].
pub fn spawn_monitor<T, F>(
    reader: ContinuousReader<T>,
    sink: F,
) -> io::Result<MonitorHandle<T::Reading>>
where
    T: Sensor + 'static,
    F: FnMut(&T::Reading) + Send + 'static,
{
    let initial = MonitorSnapshot {
        connected: true,
        ..MonitorSnapshot::default()
    };
    let (tx, rx) = watch::channel(initial.clone());
    let cancel = reader.cancel_handle();

    let thread = std::thread::Builder::new()
        .name("airiq-poller".to_string())
        .spawn(move || run_monitor(reader, tx, initial, sink))?;

    Ok(MonitorHandle {
        cancel,
        latest: LatestReading { rx },
        thread: Some(thread),
    })
}

fn run_monitor<T, F>(
    mut reader: ContinuousReader<T>,
    tx: watch::Sender<MonitorSnapshot<T::Reading>>,
    mut current: MonitorSnapshot<T::Reading>,
    mut sink: F,
) -> SessionStats
where
    T: Sensor,
    F: FnMut(&T::Reading),
{
    while let Some(outcome) = reader.next() {
        match outcome {
            Ok(reading) => {
                sink(&reading);
                current.reading = Some(reading);
                current.last_error = None;
                current.last_error_kind = None;
            }
            Err(err) => {
                current.connected = err.is_recoverable();
                current.last_error = Some(err.to_string());
                current.last_error_kind = Some(err.kind());
            }
        }
        current.stats = reader.stats();
        tx.send_replace(current.clone());
    }

    current.connected = false;
    current.stats = reader.stats();
    tx.send_replace(current);
    reader.stats()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MockSource, PmFrame};
    use crate::reading::PmReading;
    use crate::sensor::Pms5003;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    fn pm_stream(frames: &[PmFrame]) -> MockSource {
        let mut source = MockSource::new();
        for frame in frames {
            source.push_stream(frame.encode());
        }
        source
    }

    #[test]
    fn test_monitor_publishes_latest() {
        let frames = [
            PmFrame::from_array([1, 2, 3, 1, 2, 3]),
            PmFrame::from_array([4, 5, 6, 4, 5, 6]),
        ];
        let sensor = Pms5003::new(pm_stream(&frames), Duration::from_millis(1));
        let reader = ContinuousReader::new(sensor, Duration::ZERO);

        let seen: Arc<Mutex<Vec<PmReading>>> = Arc::default();
        let sink_seen = Arc::clone(&seen);
        let mut handle = spawn_monitor(reader.with_duration(Duration::from_millis(50)), move |r| {
            sink_seen.lock().unwrap().push(r.clone())
        })
        .unwrap();

        let stats = handle.join();
        let snapshot = handle.latest().snapshot();

        assert!(!snapshot.connected);
        assert_eq!(snapshot.reading.unwrap().frame(), frames[1]);
        assert_eq!(snapshot.last_error_kind, Some(FailureKind::SyncTimeout));
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert!(stats.cycles >= 3);
        assert_eq!(snapshot.stats, stats);
    }

    #[test]
    fn test_stop_cancels_unbounded_session() {
        let sensor = Pms5003::new(MockSource::new(), Duration::from_millis(1));
        let reader = ContinuousReader::new(sensor, Duration::from_secs(30));
        let handle = spawn_monitor(reader, |_| {}).unwrap();
        let latest = handle.latest();

        // Let the first cycle publish, so the stop lands in the interval sleep
        let waited = Instant::now();
        while latest.snapshot().stats.cycles == 0 {
            assert!(waited.elapsed() < Duration::from_secs(5));
            std::thread::sleep(Duration::from_millis(1));
        }

        let stopping = Instant::now();
        let stats = handle.stop();
        assert!(stopping.elapsed() < Duration::from_secs(5));
        assert_eq!(stats.cycles, 1);
        assert_eq!(latest.snapshot().stats, stats);
        assert!(!latest.snapshot().connected);
        assert!(latest.reading().is_none());
    }

    #[test]
    fn test_stop_before_first_cycle() {
        let sensor = Pms5003::new(MockSource::new(), Duration::from_millis(1));
        let reader = ContinuousReader::new(sensor, Duration::from_secs(30));
        reader.cancel_handle().cancel();
        let handle = spawn_monitor(reader, |_| {}).unwrap();
        let latest = handle.latest();

        assert_eq!(handle.stop().cycles, 0);
        assert!(!latest.snapshot().connected);
    }

    #[tokio::test]
    async fn test_readers_observe_changes() {
        let frame = PmFrame::from_array([9, 9, 9, 9, 9, 9]);
        let sensor = Pms5003::new(pm_stream(&[frame]), Duration::from_millis(1));
        let reader = ContinuousReader::new(sensor, Duration::from_millis(5))
            .with_duration(Duration::from_millis(20));
        let handle = spawn_monitor(reader, |_| {}).unwrap();

        let mut latest = handle.latest();
        while latest.changed().await {}
        assert_eq!(latest.reading().map(|r| r.pm25_atm), Some(9));
    }
}
