//! # Sink Router
//!
//! Holds the process-wide sink mode and routes every acquired sample to
//! exactly one sink.
//!
//! This module handles:
//! - The mutually-exclusive Stream/Record mode state machine
//! - Recording session lifecycle (open file, deadline, close-and-revert)
//! - The "most recent start request wins" policy for overlapping starts
//! - Aborting a session on write failure
//!
//! The router is the single owner of the mode and the active session; the
//! acquisition loop and the request layer share one instance and mutate it
//! only through these methods.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ImuBridgeError, Result};
use crate::sample::source::ImuSource;
use crate::sample::Sample;
use crate::sink::record::RecordSink;
use crate::sink::stream::StreamSink;
use crate::store::RecordStore;

/// Where samples are currently routed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    /// Broadcast each sample to live subscribers
    Stream,
    /// Append each sample to the active recording file
    Record,
}

/// What happened to one routed sample
#[derive(Debug)]
pub enum RouteOutcome {
    /// Sample was broadcast to live subscribers
    Streamed,
    /// Sample was appended to the active recording
    Recorded,
    /// The session deadline had passed: the recording was closed and this
    /// sample (and all that follow) went to the stream
    RecordingFinished {
        /// Stored file name of the finished recording
        name: String,
        /// Records in the finished file
        records: u64,
    },
    /// Appending failed: the session was dropped and the mode reverted
    RecordingAborted {
        /// Stored file name of the aborted recording
        name: String,
    },
}

/// A time-bounded recording episode bound to one open file
struct RecordingSession {
    name: String,
    sink: RecordSink,
    deadline: Instant,
}

/// Routes samples to the stream or record sink.
pub struct SinkRouter {
    stream: StreamSink,
    store: RecordStore,
    session: Option<RecordingSession>,
}

impl SinkRouter {
    /// Create a router in Stream mode
    pub fn new(stream: StreamSink, store: RecordStore) -> Self {
        Self {
            stream,
            store,
            session: None,
        }
    }

    /// Current sink mode
    pub fn mode(&self) -> SinkMode {
        if self.session.is_some() {
            SinkMode::Record
        } else {
            SinkMode::Stream
        }
    }

    /// Stored file name of the active recording, if any
    pub fn active_recording(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.name.as_str())
    }

    /// Route one sample to the active sink.
    ///
    /// Called once per acquisition cycle, never re-entrantly.
    pub fn route(&mut self, sample: Sample) -> RouteOutcome {
        self.route_at(sample, Instant::now())
    }

    /// Clock-injected variant of [`SinkRouter::route`].
    ///
    /// The session deadline is evaluated against `now`; a sample acquired at
    /// or after the deadline closes the recording and is itself streamed.
    pub fn route_at(&mut self, sample: Sample, now: Instant) -> RouteOutcome {
        let mut session = match self.session.take() {
            Some(session) => session,
            None => {
                self.stream.publish(&sample);
                return RouteOutcome::Streamed;
            }
        };

        if now >= session.deadline {
            let name = session.name;
            let records = match session.sink.finish() {
                Ok(records) => records,
                Err(e) => {
                    warn!("Could not sync finished recording {}: {}", name, e);
                    0
                }
            };
            info!("Recording {} completed ({} records)", name, records);

            self.stream.publish(&sample);
            return RouteOutcome::RecordingFinished { name, records };
        }

        match session.sink.append(&sample) {
            Ok(()) => {
                self.session = Some(session);
                RouteOutcome::Recorded
            }
            Err(e) => {
                // Session file handle is dropped here; the sample goes nowhere
                warn!("Recording {} aborted, write failed: {}", session.name, e);
                RouteOutcome::RecordingAborted { name: session.name }
            }
        }
    }

    /// Start a recording session.
    ///
    /// # Arguments
    ///
    /// * `duration` - How long to record; must be positive
    /// * `name` - Recording name; defaults to the current local timestamp
    ///
    /// # Returns
    ///
    /// * `String` - The stored file name of the new recording
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for a zero duration or bad name and
    /// `Storage` if the file cannot be created; in both cases the current
    /// mode (and any active session) is left unchanged. If a recording is
    /// already active, the most recent start request wins: the previous
    /// file is closed and kept, and the new session begins.
    pub fn start_recording(&mut self, duration: Duration, name: Option<String>) -> Result<String> {
        self.start_recording_at(duration, name, Instant::now())
    }

    /// Clock-injected variant of [`SinkRouter::start_recording`]
    pub fn start_recording_at(
        &mut self,
        duration: Duration,
        name: Option<String>,
        now: Instant,
    ) -> Result<String> {
        if duration.is_zero() {
            return Err(ImuBridgeError::InvalidRequest(
                "recording duration must be positive".to_string(),
            ));
        }

        let name = name.unwrap_or_else(default_recording_name);

        // Open the new file first so a failure leaves the mode unchanged
        let (file_name, file) = self.store.create(&name)?;

        if let Some(previous) = self.session.take() {
            info!(
                "Recording {} superseded by new start request",
                previous.name
            );
            if let Err(e) = previous.sink.finish() {
                warn!("Could not sync superseded recording: {}", e);
            }
        }

        info!(
            "Recording to {} for {} ms",
            file_name,
            duration.as_millis()
        );
        self.session = Some(RecordingSession {
            name: file_name.clone(),
            sink: RecordSink::new(file),
            deadline: now + duration,
        });

        Ok(file_name)
    }

    /// Close any active session (shutdown path), returning its file name
    /// and record count.
    pub fn finish(&mut self) -> Option<(String, u64)> {
        let session = self.session.take()?;
        let name = session.name;
        let records = match session.sink.finish() {
            Ok(records) => records,
            Err(e) => {
                warn!("Could not sync recording {} on shutdown: {}", name, e);
                0
            }
        };
        info!("Closed active recording {} ({} records)", name, records);
        Some((name, records))
    }
}

/// Default recording name: the current local time, e.g. `2023-01-05T12:30:45+0000`
fn default_recording_name() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%z").to_string()
}

/// Run one acquisition cycle: poll the source flag and route the sample.
///
/// Returns `None` when no sample was routed this cycle, either because the
/// source had no data ready or because acquisition failed (absorbed; the
/// loop just polls again next tick).
pub async fn poll_and_route(
    source: &mut dyn ImuSource,
    router: &Mutex<SinkRouter>,
) -> Option<RouteOutcome> {
    if !source.data_ready() {
        return None;
    }

    match source.read_sample() {
        Ok(sample) => Some(router.lock().await.route(sample)),
        Err(e) => {
            debug!("No sample this cycle: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::codec::{decode_sample, RECORD_SIZE};
    use crate::sample::source::MockImuSource;
    use std::fs::File;
    use tempfile::tempdir;

    fn test_sample(yaw: f32) -> Sample {
        Sample {
            yaw,
            pitch: 0.25,
            roll: -0.75,
            accel_x: 1.0,
            accel_y: 2.0,
            accel_z: 3.0,
            gyro_x: -1.0,
            gyro_y: -2.0,
            gyro_z: -3.0,
        }
    }

    fn test_router(dir: &std::path::Path) -> (SinkRouter, StreamSink) {
        let stream = StreamSink::new(64);
        let router = SinkRouter::new(stream.clone(), RecordStore::new(dir));
        (router, stream)
    }

    fn read_records(dir: &std::path::Path, file_name: &str) -> Vec<Sample> {
        let data = std::fs::read(dir.join(file_name)).unwrap();
        assert_eq!(data.len() % RECORD_SIZE, 0, "file has a partial record");
        data.chunks(RECORD_SIZE)
            .map(|chunk| {
                let mut record = [0u8; RECORD_SIZE];
                record.copy_from_slice(chunk);
                decode_sample(&record)
            })
            .collect()
    }

    #[test]
    fn test_starts_in_stream_mode() {
        let dir = tempdir().unwrap();
        let (router, _) = test_router(dir.path());
        assert_eq!(router.mode(), SinkMode::Stream);
        assert!(router.active_recording().is_none());
    }

    #[test]
    fn test_stream_mode_publishes_to_subscribers() {
        let dir = tempdir().unwrap();
        let (mut router, stream) = test_router(dir.path());
        let mut rx = stream.subscribe();

        let outcome = router.route(test_sample(1.0));
        assert!(matches!(outcome, RouteOutcome::Streamed));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_record_mode_is_exclusive() {
        let dir = tempdir().unwrap();
        let (mut router, stream) = test_router(dir.path());
        let mut rx = stream.subscribe();

        let t0 = Instant::now();
        let name = router
            .start_recording_at(Duration::from_secs(60), Some("excl".to_string()), t0)
            .unwrap();
        assert_eq!(router.mode(), SinkMode::Record);

        for i in 0..3 {
            let outcome = router.route_at(test_sample(i as f32), t0);
            assert!(matches!(outcome, RouteOutcome::Recorded));
        }

        // While recording, zero samples reach the stream sink
        assert!(rx.try_recv().is_err());
        assert_eq!(read_records(dir.path(), &name).len(), 3);
    }

    #[test]
    fn test_deadline_scenario_five_samples_then_stream() {
        // Start with duration 1000 ms, route 5 samples 100 ms apart, then a
        // 6th after the deadline: the file holds exactly the 5, the 6th is
        // delivered via the stream.
        let dir = tempdir().unwrap();
        let (mut router, stream) = test_router(dir.path());
        let mut rx = stream.subscribe();

        let t0 = Instant::now();
        let name = router
            .start_recording_at(Duration::from_millis(1000), Some("scenario".to_string()), t0)
            .unwrap();

        for i in 0..5u64 {
            let now = t0 + Duration::from_millis(i * 100);
            let outcome = router.route_at(test_sample(i as f32), now);
            assert!(matches!(outcome, RouteOutcome::Recorded));
        }

        let outcome = router.route_at(test_sample(99.0), t0 + Duration::from_millis(1000));
        match outcome {
            RouteOutcome::RecordingFinished { name: finished, records } => {
                assert_eq!(finished, name);
                assert_eq!(records, 5);
            }
            other => panic!("Expected RecordingFinished, got: {:?}", other),
        }
        assert_eq!(router.mode(), SinkMode::Stream);

        let records = read_records(dir.path(), &name);
        assert_eq!(records.len(), 5);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(*record, test_sample(i as f32));
        }

        // The 6th sample went to the stream
        let payload = rx.try_recv().unwrap();
        assert_eq!(
            payload,
            serde_json::to_string(&test_sample(99.0).to_json()).unwrap()
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_sample_exactly_at_deadline_is_streamed() {
        let dir = tempdir().unwrap();
        let (mut router, _) = test_router(dir.path());

        let t0 = Instant::now();
        let name = router
            .start_recording_at(Duration::from_millis(500), Some("edge".to_string()), t0)
            .unwrap();

        let outcome = router.route_at(test_sample(0.0), t0 + Duration::from_millis(500));
        assert!(matches!(outcome, RouteOutcome::RecordingFinished { .. }));
        assert!(read_records(dir.path(), &name).is_empty());
    }

    #[test]
    fn test_zero_duration_rejected_without_state_change() {
        let dir = tempdir().unwrap();
        let (mut router, _) = test_router(dir.path());

        let result = router.start_recording(Duration::ZERO, Some("nope".to_string()));
        match result {
            Err(ImuBridgeError::InvalidRequest(_)) => {}
            other => panic!("Expected InvalidRequest, got: {:?}", other),
        }
        assert_eq!(router.mode(), SinkMode::Stream);
        assert!(!dir.path().join("nope.dat").exists());
    }

    #[test]
    fn test_bad_name_rejected_without_state_change() {
        let dir = tempdir().unwrap();
        let (mut router, _) = test_router(dir.path());

        let result = router.start_recording(
            Duration::from_secs(1),
            Some("../escape".to_string()),
        );
        assert!(result.is_err());
        assert_eq!(router.mode(), SinkMode::Stream);
    }

    #[test]
    fn test_most_recent_start_request_wins() {
        let dir = tempdir().unwrap();
        let (mut router, _) = test_router(dir.path());

        let t0 = Instant::now();
        let first = router
            .start_recording_at(Duration::from_secs(60), Some("first".to_string()), t0)
            .unwrap();
        router.route_at(test_sample(1.0), t0);
        router.route_at(test_sample(2.0), t0);

        let second = router
            .start_recording_at(Duration::from_secs(60), Some("second".to_string()), t0)
            .unwrap();
        assert_eq!(router.active_recording(), Some(second.as_str()));

        // The superseded file is closed and keeps its records
        assert_eq!(read_records(dir.path(), &first).len(), 2);

        router.route_at(test_sample(3.0), t0);
        assert_eq!(read_records(dir.path(), &second).len(), 1);
    }

    #[test]
    fn test_append_failure_aborts_session_and_reverts() {
        let dir = tempdir().unwrap();
        let (mut router, stream) = test_router(dir.path());
        let mut rx = stream.subscribe();

        // Craft a session over a read-only handle so the append fails
        let path = dir.path().join("doomed.dat");
        std::fs::write(&path, b"").unwrap();
        router.session = Some(RecordingSession {
            name: "doomed.dat".to_string(),
            sink: RecordSink::new(File::open(&path).unwrap()),
            deadline: Instant::now() + Duration::from_secs(60),
        });

        let outcome = router.route(test_sample(1.0));
        match outcome {
            RouteOutcome::RecordingAborted { name } => assert_eq!(name, "doomed.dat"),
            other => panic!("Expected RecordingAborted, got: {:?}", other),
        }
        assert_eq!(router.mode(), SinkMode::Stream);

        // The failing sample went nowhere; the next one streams normally
        assert!(rx.try_recv().is_err());
        assert!(matches!(router.route(test_sample(2.0)), RouteOutcome::Streamed));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_finish_closes_active_session() {
        let dir = tempdir().unwrap();
        let (mut router, _) = test_router(dir.path());

        let t0 = Instant::now();
        let name = router
            .start_recording_at(Duration::from_secs(60), Some("shutdown".to_string()), t0)
            .unwrap();
        router.route_at(test_sample(1.0), t0);

        let (finished, records) = router.finish().unwrap();
        assert_eq!(finished, name);
        assert_eq!(records, 1);
        assert_eq!(router.mode(), SinkMode::Stream);

        // Nothing left to finish
        assert!(router.finish().is_none());
    }

    #[test]
    fn test_default_recording_name_shape() {
        let name = default_recording_name();
        // e.g. 2023-01-05T12:30:45+0000
        assert!(name.len() >= 19, "unexpected name: {}", name);
        assert_eq!(&name[4..5], "-");
        assert_eq!(&name[10..11], "T");
    }

    #[tokio::test]
    async fn test_poll_and_route_skips_when_not_ready() {
        let dir = tempdir().unwrap();
        let (router, _) = test_router(dir.path());
        let router = Mutex::new(router);

        let mut source = MockImuSource::new();
        source.expect_data_ready().times(1).returning(|| false);
        source.expect_read_sample().times(0);

        let outcome = poll_and_route(&mut source, &router).await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_poll_and_route_absorbs_acquisition_fault() {
        let dir = tempdir().unwrap();
        let (router, _) = test_router(dir.path());
        let router = Mutex::new(router);

        let mut source = MockImuSource::new();
        source.expect_data_ready().times(1).returning(|| true);
        source
            .expect_read_sample()
            .times(1)
            .returning(|| Err(ImuBridgeError::Acquisition("fifo overflow".to_string())));

        let outcome = poll_and_route(&mut source, &router).await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn test_poll_and_route_routes_ready_sample() {
        let dir = tempdir().unwrap();
        let (router, stream) = test_router(dir.path());
        let mut rx = stream.subscribe();
        let router = Mutex::new(router);

        let mut source = MockImuSource::new();
        source.expect_data_ready().times(1).returning(|| true);
        source
            .expect_read_sample()
            .times(1)
            .returning(|| Ok(Sample::default()));

        let outcome = poll_and_route(&mut source, &router).await;
        assert!(matches!(outcome, Some(RouteOutcome::Streamed)));
        assert!(rx.try_recv().is_ok());
    }
}
