//! Torrent streaming via webtorrent-cli
//!
//! Runs `webtorrent download` as a subprocess, scrapes its status output into
//! telemetry, and serves the stream over webtorrent's local HTTP server.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BridgeConfig;
use crate::models::RawTelemetry;
use crate::playback::{
    BridgeError, BridgeFault, EventHub, Listener, StartOptions, StreamInfo, Subscription,
    TorrentBridge,
};

/// webtorrent-cli backed torrent bridge
pub struct WebtorrentBridge {
    config: BridgeConfig,
    status: EventHub<RawTelemetry>,
    errors: EventHub<BridgeFault>,
    active: Mutex<Option<ActiveTorrent>>,
    /// Bumped by every stop so a start queued behind it gives up
    stop_epoch: AtomicU64,
}

struct ActiveTorrent {
    child: Child,
    readers: Vec<JoinHandle<()>>,
    download_dir: PathBuf,
    remove_after_stop: bool,
}

/// First status the bridge reports once webtorrent serves the file
struct Ready {
    url: String,
    file_size: Option<u64>,
}

impl WebtorrentBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            status: EventHub::new(),
            errors: EventHub::new(),
            active: Mutex::new(None),
            stop_epoch: AtomicU64::new(0),
        }
    }

    /// Check if webtorrent-cli is installed
    pub async fn is_available(&self) -> bool {
        Command::new("which")
            .arg(&self.config.webtorrent_path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn spawn_webtorrent(&self, source_uri: &str, dir: &Path) -> Result<Child, BridgeError> {
        let mut cmd = Command::new(&self.config.webtorrent_path);
        cmd.arg("download")
            .arg(source_uri)
            .arg("--port")
            .arg(self.config.port.to_string())
            .arg("--out")
            .arg(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BridgeError::NotFound(self.config.webtorrent_path.clone())
            } else {
                BridgeError::Io(e)
            }
        })
    }
}

#[async_trait]
impl TorrentBridge for WebtorrentBridge {
    async fn start(
        &self,
        source_uri: &str,
        options: StartOptions,
    ) -> Result<StreamInfo, BridgeError> {
        let epoch = self.stop_epoch.load(Ordering::SeqCst);
        let ready_rx = {
            let mut active = self.active.lock().await;
            if self.stop_epoch.load(Ordering::SeqCst) != epoch {
                debug!("Stop arrived while start was waiting");
                return Err(BridgeError::Stopped);
            }
            if let Some(current) = active.as_mut() {
                if current.child.try_wait()?.is_none() {
                    return Err(BridgeError::AlreadyActive);
                }
            }

            let dir = self
                .config
                .download_root()
                .join(Uuid::new_v4().to_string());
            tokio::fs::create_dir_all(&dir).await?;

            let mut child = match self.spawn_webtorrent(source_uri, &dir) {
                Ok(child) => child,
                Err(e) => {
                    let _ = tokio::fs::remove_dir_all(&dir).await;
                    return Err(e);
                }
            };
            info!(dir = %dir.display(), port = self.config.port, "webtorrent started");

            let (ready_tx, ready_rx) = oneshot::channel();
            let mut readers = Vec::new();
            if let Some(stdout) = child.stdout.take() {
                let tracker = OutputTracker::new(self.config.readiness_window_bytes());
                let status = self.status.clone();
                readers.push(tokio::spawn(async move {
                    let mut ready_tx = Some(ready_tx);
                    let mut tracker = tracker;
                    let mut lines = BufReader::new(stdout).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        let line = strip_ansi(&line);
                        if let Some(url) = parse_server_url(&line) {
                            if let Some(tx) = ready_tx.take() {
                                let _ = tx.send(Ready {
                                    url,
                                    file_size: tracker.total,
                                });
                            }
                        }
                        if let Some(telemetry) = tracker.feed(&line) {
                            status.emit(telemetry);
                        }
                    }
                    debug!("webtorrent stdout closed");
                }));
            }
            if let Some(stderr) = child.stderr.take() {
                let errors = self.errors.clone();
                readers.push(tokio::spawn(async move {
                    let mut lines = BufReader::new(stderr).lines();
                    while let Ok(Some(line)) = lines.next_line().await {
                        let msg = strip_ansi(&line).trim().to_string();
                        if !msg.is_empty() {
                            errors.emit(BridgeFault { msg });
                        }
                    }
                }));
            }

            *active = Some(ActiveTorrent {
                child,
                readers,
                download_dir: dir,
                remove_after_stop: options.remove_after_stop,
            });
            ready_rx
        };

        let timeout_secs = self.config.start_timeout_secs;
        match tokio::time::timeout(Duration::from_secs(timeout_secs), ready_rx).await {
            Ok(Ok(ready)) => {
                info!(url = %ready.url, "webtorrent serving stream");
                Ok(StreamInfo {
                    url: ready.url,
                    file_size: ready.file_size,
                })
            }
            Ok(Err(_)) => {
                self.stop().await?;
                Err(BridgeError::Exited(
                    "webtorrent closed its output without serving the file".to_string(),
                ))
            }
            Err(_) => {
                self.stop().await?;
                Err(BridgeError::Timeout(timeout_secs))
            }
        }
    }

    async fn stop(&self) -> Result<(), BridgeError> {
        self.stop_epoch.fetch_add(1, Ordering::SeqCst);
        let Some(mut active) = self.active.lock().await.take() else {
            return Ok(());
        };

        if let Err(e) = active.child.kill().await {
            debug!(error = %e, "webtorrent already exited");
        }
        for reader in active.readers.drain(..) {
            reader.abort();
        }

        if active.remove_after_stop {
            match tokio::fs::remove_dir_all(&active.download_dir).await {
                Ok(()) => debug!(dir = %active.download_dir.display(), "Removed download dir"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(error = %e, "Failed to remove download dir"),
            }
        }
        info!("webtorrent stopped");
        Ok(())
    }

    fn on_status(&self, listener: Listener<RawTelemetry>) -> Subscription {
        self.status.subscribe(listener)
    }

    fn on_error(&self, listener: Listener<BridgeFault>) -> Subscription {
        self.errors.subscribe(listener)
    }
}

// =============================================================================
// Output parsing
// =============================================================================

/// Folds webtorrent status lines into telemetry
#[derive(Debug, Clone, Default)]
pub struct OutputTracker {
    readiness_window: u64,
    pub total: Option<u64>,
    pub downloaded: u64,
    pub download_rate: u64,
    pub peers: u32,
}

impl OutputTracker {
    pub fn new(readiness_window: u64) -> Self {
        Self {
            readiness_window: readiness_window.max(1),
            ..Default::default()
        }
    }

    /// Update from one line; returns telemetry when the line carried stats
    pub fn feed(&mut self, line: &str) -> Option<RawTelemetry> {
        let mut changed = false;
        if let Some(rate) = parse_speed(line) {
            self.download_rate = rate;
            changed = true;
        }
        if let Some((downloaded, total)) = parse_downloaded(line) {
            self.downloaded = downloaded;
            if total.is_some() {
                self.total = total;
            }
            changed = true;
        }
        if let Some(peers) = parse_peers(line) {
            self.peers = peers;
            changed = true;
        }
        changed.then(|| self.telemetry())
    }

    pub fn telemetry(&self) -> RawTelemetry {
        let window = match self.total {
            Some(total) if total > 0 => self.readiness_window.min(total),
            _ => self.readiness_window,
        };
        let buffer = (self.downloaded as f64 / window as f64 * 100.0).min(100.0);
        let progress = self
            .total
            .filter(|t| *t > 0)
            .map(|t| (self.downloaded as f64 / t as f64 * 100.0).min(100.0));

        RawTelemetry {
            progress,
            buffer: Some(buffer),
            download_rate: Some(self.download_rate as f64),
            num_seeds: Some(f64::from(self.peers)),
        }
    }
}

/// Remove terminal escape sequences
pub fn strip_ansi(line: &str) -> String {
    match Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]") {
        Ok(re) => re.replace_all(line, "").into_owned(),
        Err(_) => line.to_string(),
    }
}

/// Input: "Server running at: http://localhost:8888/webtorrent/..." → URL
pub fn parse_server_url(line: &str) -> Option<String> {
    let re = Regex::new(r"(?i)server running at:?\s*(https?://\S+)").ok()?;
    let caps = re.captures(line)?;
    Some(caps.get(1)?.as_str().to_string())
}

/// Input: "Speed: 5.2 MB/s" → 5452595 bytes/sec
pub fn parse_speed(line: &str) -> Option<u64> {
    let re = Regex::new(r"Speed:\s*([\d.]+)\s*(B|KB|MB|GB)/s").ok()?;
    let caps = re.captures(line)?;
    to_bytes(caps.get(1)?.as_str(), caps.get(2)?.as_str())
}

/// Input: "Downloaded: 1.2 GB / 4 GB" → (bytes, Some(total bytes))
pub fn parse_downloaded(line: &str) -> Option<(u64, Option<u64>)> {
    let re = Regex::new(
        r"Downloaded:\s*([\d.]+)\s*(B|KB|MB|GB)(?:\s*(?:/|of)\s*([\d.]+)\s*(B|KB|MB|GB))?",
    )
    .ok()?;
    let caps = re.captures(line)?;
    let downloaded = to_bytes(caps.get(1)?.as_str(), caps.get(2)?.as_str())?;
    let total = match (caps.get(3), caps.get(4)) {
        (Some(value), Some(unit)) => to_bytes(value.as_str(), unit.as_str()),
        _ => None,
    };
    Some((downloaded, total))
}

/// Input: "Peers: 12/40" → 12
pub fn parse_peers(line: &str) -> Option<u32> {
    let re = Regex::new(r"Peers:\s*(\d+)").ok()?;
    re.captures(line)?.get(1)?.as_str().parse().ok()
}

fn to_bytes(value: &str, unit: &str) -> Option<u64> {
    let value: f64 = value.parse().ok()?;
    let multiplier: u64 = match unit {
        "B" => 1,
        "KB" => 1024,
        "MB" => 1024 * 1024,
        "GB" => 1024 * 1024 * 1024,
        _ => return None,
    };
    Some((value * multiplier as f64) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_url() {
        assert_eq!(
            parse_server_url("Server running at: http://localhost:8888/webtorrent/abc/movie.mkv"),
            Some("http://localhost:8888/webtorrent/abc/movie.mkv".to_string())
        );
        assert_eq!(parse_server_url("Downloading: movie.mkv"), None);
    }

    #[test]
    fn test_parse_speed() {
        assert_eq!(parse_speed("Speed: 512 KB/s"), Some(512 * 1024));
        assert_eq!(parse_speed("Speed: 0 B/s"), Some(0));
        assert_eq!(parse_speed("Speed: fast"), None);
    }

    #[test]
    fn test_parse_downloaded_with_total() {
        let (downloaded, total) = parse_downloaded("Downloaded: 512 MB / 2 GB").unwrap();
        assert_eq!(downloaded, 512 * 1024 * 1024);
        assert_eq!(total, Some(2 * 1024 * 1024 * 1024));

        let (_, total) = parse_downloaded("Downloaded: 1.5 GB").unwrap();
        assert_eq!(total, None);
    }

    #[test]
    fn test_parse_peers() {
        assert_eq!(parse_peers("Peers: 12/40"), Some(12));
        assert_eq!(parse_peers("no peers yet"), None);
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[2K\x1b[1mSpeed:\x1b[0m 1 MB/s"), "Speed: 1 MB/s");
    }

    #[test]
    fn test_tracker_progress_and_buffer() {
        let mut tracker = OutputTracker::new(16 * 1024 * 1024);
        let telemetry = tracker
            .feed("Speed: 2 MB/s Downloaded: 8 MB / 800 MB Peers: 7/30")
            .unwrap();
        assert_eq!(telemetry.progress, Some(1.0));
        assert_eq!(telemetry.buffer, Some(50.0));
        assert_eq!(telemetry.download_rate, Some(2.0 * 1024.0 * 1024.0));
        assert_eq!(telemetry.num_seeds, Some(7.0));

        let telemetry = tracker.feed("Downloaded: 40 MB").unwrap();
        assert_eq!(telemetry.buffer, Some(100.0));
        assert_eq!(telemetry.progress, Some(5.0));
    }

    #[test]
    fn test_tracker_unknown_total_has_no_progress() {
        let mut tracker = OutputTracker::new(1024);
        let telemetry = tracker.feed("Downloaded: 512 B").unwrap();
        assert_eq!(telemetry.progress, None);
        assert_eq!(telemetry.buffer, Some(50.0));
    }

    #[test]
    fn test_tracker_ignores_unrelated_lines() {
        let mut tracker = OutputTracker::new(1024);
        assert!(tracker.feed("Downloading: movie.mkv").is_none());
    }

    #[tokio::test]
    async fn test_stop_before_start_is_noop() {
        let bridge = WebtorrentBridge::new(BridgeConfig::default());
        assert!(bridge.stop().await.is_ok());
        assert!(bridge.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_binary_reports_not_found() {
        let config = BridgeConfig {
            webtorrent_path: "nonexistent_webtorrent_cli_xyz".to_string(),
            download_dir: Some(std::env::temp_dir().join("flickstream-test")),
            ..Default::default()
        };
        let bridge = WebtorrentBridge::new(config);
        let err = bridge
            .start("magnet:?xt=urn:btih:abc", StartOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_stop_cancels_queued_start() {
        let config = BridgeConfig {
            webtorrent_path: "nonexistent_webtorrent_cli_xyz".to_string(),
            download_dir: Some(std::env::temp_dir().join("flickstream-test")),
            ..Default::default()
        };
        let bridge = std::sync::Arc::new(WebtorrentBridge::new(config));
        let guard = bridge.active.lock().await;

        let starter = tokio::spawn({
            let bridge = bridge.clone();
            async move {
                bridge
                    .start("magnet:?xt=urn:btih:abc", StartOptions::default())
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let stopper = tokio::spawn({
            let bridge = bridge.clone();
            async move { bridge.stop().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(guard);

        let err = starter.await.unwrap().unwrap_err();
        assert!(matches!(err, BridgeError::Stopped));
        assert!(stopper.await.unwrap().is_ok());
        assert!(bridge.active.lock().await.is_none());
    }
}
