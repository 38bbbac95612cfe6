//! Buffer health monitor
//!
//! Bridge telemetry can arrive in dense bursts. The monitor validates each raw
//! payload and accepts it only when enough time has passed since the last
//! accepted sample or when progress/buffer moved significantly. Rejected
//! payloads are dropped, never queued.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::PlaybackConfig;
use crate::models::{PlaybackSession, RawTelemetry, TelemetrySample};
use crate::playback::PlaybackError;

/// Throttling telemetry filter, one per session
#[derive(Debug, Clone)]
pub struct BufferHealthMonitor {
    min_interval: Duration,
    progress_delta: f64,
    buffer_delta: f64,
    last_accepted: Option<(Instant, TelemetrySample)>,
    last_good: TelemetrySample,
}

impl BufferHealthMonitor {
    pub fn new(min_interval: Duration, progress_delta: f64, buffer_delta: f64) -> Self {
        Self {
            min_interval,
            progress_delta,
            buffer_delta,
            last_accepted: None,
            last_good: TelemetrySample::default(),
        }
    }

    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self::new(
            config.throttle_interval(),
            config.progress_delta,
            config.buffer_delta,
        )
    }

    /// Validate and throttle a raw payload
    ///
    /// Returns the sample when accepted.
    pub fn ingest(&mut self, raw: &RawTelemetry, now: Instant) -> Option<TelemetrySample> {
        let (sample, anomaly) = TelemetrySample::validate(raw, &self.last_good);
        if anomaly {
            let err = PlaybackError::TelemetryParseAnomaly(format!("{:?}", raw));
            debug!(error = %err, "Defaulted telemetry fields");
        }
        self.last_good = sample;

        let accept = match &self.last_accepted {
            None => true,
            Some((at, last)) => {
                now.saturating_duration_since(*at) >= self.min_interval
                    || (sample.progress - last.progress).abs() > self.progress_delta
                    || (sample.buffer - last.buffer).abs() > self.buffer_delta
            }
        };

        if accept {
            self.last_accepted = Some((now, sample));
            Some(sample)
        } else {
            None
        }
    }

    /// Most recently accepted sample
    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.last_accepted.as_ref().map(|(_, s)| s)
    }

    /// Copy an accepted sample into the session
    ///
    /// Progress never moves backwards while the session is active.
    pub fn apply(sample: &TelemetrySample, session: &mut PlaybackSession) {
        session.progress_percent = session.progress_percent.max(sample.progress);
        session.buffer_percent = sample.buffer;
        session.download_rate_bytes_per_sec = sample.download_rate;
        session.seeder_count = sample.num_seeds;
    }
}

impl Default for BufferHealthMonitor {
    fn default() -> Self {
        Self::from_config(&PlaybackConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry(progress: f64, buffer: f64) -> RawTelemetry {
        RawTelemetry::new(progress, buffer, 1024.0, 3)
    }

    #[test]
    fn test_first_sample_accepted() {
        let mut monitor = BufferHealthMonitor::default();
        assert!(monitor.ingest(&telemetry(0.1, 0.0), Instant::now()).is_some());
    }

    #[test]
    fn test_small_change_within_interval_rejected() {
        let mut monitor = BufferHealthMonitor::default();
        let t0 = Instant::now();
        monitor.ingest(&telemetry(10.0, 40.0), t0);

        let t1 = t0 + Duration::from_millis(100);
        assert!(monitor.ingest(&telemetry(10.5, 42.0), t1).is_none());
        assert_eq!(monitor.latest().unwrap().progress, 10.0);
    }

    #[test]
    fn test_interval_elapsed_accepts() {
        let mut monitor = BufferHealthMonitor::default();
        let t0 = Instant::now();
        monitor.ingest(&telemetry(10.0, 40.0), t0);
        assert!(monitor
            .ingest(&telemetry(10.1, 40.0), t0 + Duration::from_millis(500))
            .is_some());
    }

    #[test]
    fn test_significant_progress_bypasses_throttle() {
        let mut monitor = BufferHealthMonitor::default();
        let t0 = Instant::now();
        monitor.ingest(&telemetry(10.0, 40.0), t0);
        let t1 = t0 + Duration::from_millis(10);
        assert!(monitor.ingest(&telemetry(11.0, 40.0), t1).is_none());
        assert!(monitor.ingest(&telemetry(11.01, 40.0), t1).is_some());
    }

    #[test]
    fn test_significant_buffer_bypasses_throttle() {
        let mut monitor = BufferHealthMonitor::default();
        let t0 = Instant::now();
        monitor.ingest(&telemetry(10.0, 40.0), t0);
        let t1 = t0 + Duration::from_millis(10);
        assert!(monitor.ingest(&telemetry(10.0, 45.0), t1).is_none());
        assert!(monitor.ingest(&telemetry(10.0, 34.0), t1).is_some());
    }

    #[test]
    fn test_apply_keeps_progress_monotonic() {
        let mut session = PlaybackSession::new("m");
        session.progress_percent = 50.0;
        let sample = TelemetrySample {
            progress: 40.0,
            buffer: 20.0,
            download_rate: 10,
            num_seeds: 2,
        };
        BufferHealthMonitor::apply(&sample, &mut session);
        assert_eq!(session.progress_percent, 50.0);
        assert_eq!(session.buffer_percent, 20.0);
        assert_eq!(session.seeder_count, 2);
    }

    #[test]
    fn test_missing_progress_uses_last_good() {
        let mut monitor = BufferHealthMonitor::default();
        let t0 = Instant::now();
        monitor.ingest(&telemetry(30.0, 60.0), t0);
        let raw = RawTelemetry {
            progress: None,
            buffer: Some(60.0),
            download_rate: None,
            num_seeds: None,
        };
        let sample = monitor.ingest(&raw, t0 + Duration::from_secs(1)).unwrap();
        assert_eq!(sample.progress, 30.0);
        assert_eq!(sample.download_rate, 0);
    }
}
