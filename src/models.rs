//! Data structures and types for flickstream
//!
//! Contains all shared models used across the crate organized by domain:
//! - **Addons**: raw Torrentio stream records and ranked candidates
//! - **Telemetry**: bridge status payloads and their validated form
//! - **Playback**: session state, notices surfaced to the UI

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

// =============================================================================
// Addon Models (Torrentio/Stremio)
// =============================================================================

/// Behavior hints attached to a Torrentio stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binge_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Raw stream record as returned by the addon
///
/// `name` looks like `"Torrentio\n4k HDR"`, `title` carries the release line
/// followed by metadata lines (`👤 38 💾 11.27 GB ⚙️ 1337x`, language flags).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStream {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    pub info_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_idx: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_hints: Option<BehaviorHints>,
}

/// Addon response envelope (`/stream/movie/<id>.json`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonResponse {
    #[serde(default)]
    pub streams: Vec<RawStream>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_max_age: Option<u64>,
}

/// One playable, ranked release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateStream {
    pub info_hash: String,
    pub quality: String,
    pub title: String,
    pub size_label: Option<String>,
    pub size_bytes: u64,
    pub seeder_count: Option<u32>,
    pub source: Option<String>,
    pub languages: Vec<String>,
    pub filename: Option<String>,
    pub file_idx: Option<u32>,
    pub playback_uri: String,
    pub score: f64,
}

impl CandidateStream {
    /// Name used for the `dn=` part of the launch URI
    pub fn display_name(&self) -> &str {
        self.filename.as_deref().unwrap_or(&self.title)
    }

    /// Render back into the addon's wire format
    pub fn to_raw(&self) -> RawStream {
        let mut meta = Vec::new();
        if let Some(seeders) = self.seeder_count {
            meta.push(format!("👤 {}", seeders));
        }
        if let Some(size) = &self.size_label {
            meta.push(format!("💾 {}", size));
        }
        if let Some(source) = &self.source {
            meta.push(format!("⚙️ {}", source));
        }

        let mut title = self.title.clone();
        if !meta.is_empty() {
            title.push('\n');
            title.push_str(&meta.join(" "));
        }
        if !self.languages.is_empty() {
            title.push('\n');
            title.push_str(&self.languages.join(" / "));
        }

        RawStream {
            name: format!("Torrentio\n{}", self.quality),
            title,
            info_hash: self.info_hash.clone(),
            file_idx: self.file_idx,
            behavior_hints: self.filename.as_ref().map(|f| BehaviorHints {
                binge_group: None,
                filename: Some(f.clone()),
            }),
        }
    }
}

impl fmt::Display for CandidateStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} 👤{} {} ({:.1})",
            self.quality,
            self.size_label.as_deref().unwrap_or("? GB"),
            self.seeder_count.unwrap_or(0),
            self.title,
            self.score
        )
    }
}

// =============================================================================
// Telemetry Models
// =============================================================================

/// Raw bridge status payload
///
/// Every field is optional and accepts numbers or numeric strings; anything
/// else deserializes to `None` instead of failing the whole payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTelemetry {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub progress: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub buffer: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub download_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub num_seeds: Option<f64>,
}

impl RawTelemetry {
    pub fn new(progress: f64, buffer: f64, download_rate: f64, num_seeds: u32) -> Self {
        Self {
            progress: Some(progress),
            buffer: Some(buffer),
            download_rate: Some(download_rate),
            num_seeds: Some(f64::from(num_seeds)),
        }
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Validated telemetry sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    /// Overall download progress, 0-100
    pub progress: f64,
    /// Readiness window fill, 0-100
    pub buffer: f64,
    pub download_rate: u64,
    pub num_seeds: u32,
}

impl TelemetrySample {
    /// Validate a raw payload against the last known good sample.
    ///
    /// Returns the sample and whether any field had to be defaulted.
    pub fn validate(raw: &RawTelemetry, last: &TelemetrySample) -> (Self, bool) {
        let mut anomaly = false;

        let mut percent = |value: Option<f64>, previous: f64| match value {
            Some(v) if v.is_finite() && v >= 0.0 => v.min(100.0),
            _ => {
                anomaly = true;
                previous
            }
        };
        let progress = percent(raw.progress, last.progress);
        let buffer = percent(raw.buffer, last.buffer);

        let download_rate = match raw.download_rate {
            Some(v) if v.is_finite() && v >= 0.0 => v as u64,
            _ => {
                anomaly = true;
                0
            }
        };
        let num_seeds = match raw.num_seeds {
            Some(v) if v.is_finite() && v >= 0.0 => v.min(f64::from(u32::MAX)) as u32,
            _ => {
                anomaly = true;
                0
            }
        };

        (
            Self {
                progress,
                buffer,
                download_rate,
                num_seeds,
            },
            anomaly,
        )
    }
}

// =============================================================================
// Playback Models
// =============================================================================

/// Playback session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    /// Bridge start requested, not yet resolved
    Starting,
    /// Waiting for the readiness window to fill
    Buffering,
    Playing,
    /// Paused by the user
    Paused,
    /// Force-paused because the renderer stalled
    RebufferingPaused,
    Erroring,
    /// Corrective seek issued after a seek fault
    Recovering,
    /// Terminal
    Closed,
}

impl PlaybackState {
    /// States in which the renderer has a loaded stream
    pub fn is_playback(&self) -> bool {
        matches!(
            self,
            PlaybackState::Playing
                | PlaybackState::Paused
                | PlaybackState::RebufferingPaused
                | PlaybackState::Recovering
        )
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, PlaybackState::Closed)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "Idle"),
            PlaybackState::Starting => write!(f, "Starting..."),
            PlaybackState::Buffering => write!(f, "Buffering..."),
            PlaybackState::Playing => write!(f, "▶ Playing"),
            PlaybackState::Paused => write!(f, "⏸ Paused"),
            PlaybackState::RebufferingPaused => write!(f, "⏸ Rebuffering"),
            PlaybackState::Erroring => write!(f, "Error"),
            PlaybackState::Recovering => write!(f, "Recovering..."),
            PlaybackState::Closed => write!(f, "⏹ Closed"),
        }
    }
}

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeSeverity {
    Info,
    Warning,
    Fatal,
}

/// Message surfaced to the UI collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub severity: NoticeSeverity,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeSeverity::Info, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeSeverity::Warning, title, message)
    }

    pub fn fatal(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeSeverity::Fatal, title, message)
    }

    fn new(severity: NoticeSeverity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == NoticeSeverity::Fatal
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

/// Live playback session, mutated only by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSession {
    pub id: Uuid,
    /// Launch address (magnet URI)
    pub uri: String,
    pub state: PlaybackState,
    pub progress_percent: f64,
    pub buffer_percent: f64,
    pub current_position_seconds: f64,
    pub duration_seconds: Option<f64>,
    pub last_safe_position_seconds: f64,
    pub download_rate_bytes_per_sec: u64,
    pub seeder_count: u32,
    pub seek_error_streak: u32,
    /// Local URL served by the bridge once started
    pub stream_url: Option<String>,
    pub file_size: Option<u64>,
    pub status_message: String,
    pub controls_visible: bool,
    pub last_notice: Option<Notice>,
}

impl PlaybackSession {
    /// Create a new session in Idle state
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            uri: uri.into(),
            state: PlaybackState::Idle,
            progress_percent: 0.0,
            buffer_percent: 0.0,
            current_position_seconds: 0.0,
            duration_seconds: None,
            last_safe_position_seconds: 0.0,
            download_rate_bytes_per_sec: 0,
            seeder_count: 0,
            seek_error_streak: 0,
            stream_url: None,
            file_size: None,
            status_message: "Initializing stream...".to_string(),
            controls_visible: false,
            last_notice: None,
        }
    }

    /// Format download speed for display
    pub fn format_speed(&self) -> String {
        let mb_per_sec = self.download_rate_bytes_per_sec as f64 / (1024.0 * 1024.0);
        format!("{:.2} MB/s", mb_per_sec)
    }

    /// Format playhead as HH:MM:SS or MM:SS
    pub fn format_position(&self) -> String {
        let seconds = self.current_position_seconds.max(0.0);
        format_duration(Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX))
    }
}

impl fmt::Display for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {:.1}% (buffer {:.0}%) @ {} - {}",
            self.state,
            self.progress_percent,
            self.buffer_percent,
            self.format_speed(),
            self.format_position()
        )
    }
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Format a Duration as HH:MM:SS or MM:SS
fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}", mins, secs)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
