//! Configuration management for flickstream
//!
//! Handles config file loading/saving and playback tuning.
//! Config is stored at ~/.config/flickstream/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Preferred quality label ("1080p", "4k HDR", "All")
    pub preferred_quality: Option<String>,
    pub torrentio: TorrentioConfig,
    pub playback: PlaybackConfig,
    pub bridge: BridgeConfig,
    pub player: PlayerConfig,
}

/// Torrentio addon settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TorrentioConfig {
    pub base_url: String,
    /// Addon options path segment; empty for none
    pub options: String,
}

impl Default for TorrentioConfig {
    fn default() -> Self {
        Self {
            base_url: "https://torrentio.strem.fun".to_string(),
            options: "sort=qualitysize|qualityfilter=480p,scr,cam".to_string(),
        }
    }
}

/// Playback session thresholds and timers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Minimum spacing between accepted telemetry updates
    pub throttle_interval_ms: u64,
    /// Progress change (points) that bypasses the throttle
    pub progress_delta: f64,
    /// Buffer change (points) that bypasses the throttle
    pub buffer_delta: f64,
    /// Download progress required before seeking is allowed
    pub seek_unlock_percent: f64,
    /// Buffer fill required to start playback
    pub ready_buffer_percent: f64,
    /// Download progress floor required to start playback
    pub ready_progress_floor: f64,
    /// Buffer fill required to leave a rebuffering pause
    pub resume_buffer_percent: f64,
    /// Automatic corrective seeks before giving up
    pub max_seek_retries: u32,
    pub corrective_seek_delay_ms: u64,
    pub controls_autohide_ms: u64,
    pub tick_interval_ms: u64,
    pub skip_back_seconds: f64,
    /// Overrides the built-in seek fault markers when set
    pub fault_markers: Option<Vec<String>>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            throttle_interval_ms: 500,
            progress_delta: 1.0,
            buffer_delta: 5.0,
            seek_unlock_percent: 95.0,
            ready_buffer_percent: 100.0,
            ready_progress_floor: 5.0,
            resume_buffer_percent: 50.0,
            max_seek_retries: 2,
            corrective_seek_delay_ms: 500,
            controls_autohide_ms: 3000,
            tick_interval_ms: 1000,
            skip_back_seconds: 10.0,
            fault_markers: None,
        }
    }
}

impl PlaybackConfig {
    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }

    pub fn corrective_seek_delay(&self) -> Duration {
        Duration::from_millis(self.corrective_seek_delay_ms)
    }

    pub fn controls_autohide(&self) -> Duration {
        Duration::from_millis(self.controls_autohide_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

/// webtorrent-cli bridge settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub webtorrent_path: String,
    pub port: u16,
    /// Parent of per-session download dirs; system temp dir when unset
    pub download_dir: Option<PathBuf>,
    /// Bytes that make up a full readiness window
    pub readiness_window_mb: u64,
    pub start_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            webtorrent_path: "webtorrent".to_string(),
            port: 8888,
            download_dir: None,
            readiness_window_mb: 16,
            start_timeout_secs: 60,
        }
    }
}

impl BridgeConfig {
    pub fn readiness_window_bytes(&self) -> u64 {
        self.readiness_window_mb.max(1) * 1024 * 1024
    }

    pub fn download_root(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("flickstream"))
    }
}

/// mpv renderer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub mpv_path: String,
    /// IPC socket path; a per-process path in the temp dir when unset
    pub ipc_socket: Option<PathBuf>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            mpv_path: "mpv".to_string(),
            ipc_socket: None,
        }
    }
}

impl Config {
    /// Get config file path (~/.config/flickstream/config.toml)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("flickstream").join("config.toml"))
    }

    /// Load config from the default path, or return default if not found
    pub fn load() -> Self {
        Self::path()
            .and_then(|p| Self::load_from(&p).ok())
            .unwrap_or_default()
    }

    /// Load config from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.preferred_quality.is_none());
        assert_eq!(config.playback.seek_unlock_percent, 95.0);
        assert_eq!(config.playback.max_seek_retries, 2);
        assert_eq!(config.playback.throttle_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            preferred_quality = "1080p"

            [playback]
            seek_unlock_percent = 90.0
            "#,
        )
        .unwrap();
        assert_eq!(config.preferred_quality.as_deref(), Some("1080p"));
        assert_eq!(config.playback.seek_unlock_percent, 90.0);
        assert_eq!(config.playback.buffer_delta, 5.0);
        assert_eq!(config.bridge.webtorrent_path, "webtorrent");
    }

    #[test]
    fn test_load_written_file() {
        let path = std::env::temp_dir()
            .join(format!("flickstream-test-{}", uuid::Uuid::new_v4()))
            .join("config.toml");
        let mut config = Config::default();
        config.bridge.port = 9999;
        config.playback.fault_markers = Some(vec!["demux".to_string()]);

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_load_from_missing_file_errors() {
        assert!(Config::load_from(Path::new("/nonexistent/flickstream.toml")).is_err());
    }

    #[test]
    fn test_readiness_window_bytes() {
        let bridge = BridgeConfig::default();
        assert_eq!(bridge.readiness_window_bytes(), 16 * 1024 * 1024);
    }
}
