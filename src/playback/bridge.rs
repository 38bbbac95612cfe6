//! Collaborator seams: the torrent bridge and the media renderer
//!
//! Both deliver events asynchronously through listeners; the session runner
//! funnels every delivery into its own queue before anything is applied.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::RawTelemetry;
use crate::playback::events::{Listener, Subscription};

/// Options passed to `TorrentBridge::start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOptions {
    /// Delete downloaded content when the session stops
    pub remove_after_stop: bool,
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            remove_after_stop: true,
        }
    }
}

/// Result of a successful bridge start
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Local HTTP URL the renderer should open
    pub url: String,
    pub file_size: Option<u64>,
}

/// Message from the bridge's error stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeFault {
    pub msg: String,
}

/// Errors from bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Bridge binary '{0}' not found. Install it first.")]
    NotFound(String),
    #[error("Failed to start bridge: {0}")]
    Io(#[from] std::io::Error),
    #[error("A bridge session is already active")]
    AlreadyActive,
    #[error("Bridge did not become ready within {0} seconds")]
    Timeout(u64),
    #[error("Bridge exited before the stream was ready: {0}")]
    Exited(String),
    #[error("Bridge was stopped before the stream started")]
    Stopped,
}

/// Torrent-to-local-stream engine
#[async_trait]
pub trait TorrentBridge: Send + Sync + 'static {
    /// Begin fetching `source_uri` and serving it locally
    async fn start(&self, source_uri: &str, options: StartOptions)
        -> Result<StreamInfo, BridgeError>;

    /// Stop the current session; safe to call repeatedly and before start
    async fn stop(&self) -> Result<(), BridgeError>;

    fn on_status(&self, listener: Listener<RawTelemetry>) -> Subscription;

    fn on_error(&self, listener: Listener<BridgeFault>) -> Subscription;
}

/// Event reported by the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RendererEvent {
    /// Playhead position in seconds
    Progress(f64),
    /// Media loaded; total duration in seconds
    Load(f64),
    /// Buffering started (`true`) or ended (`false`)
    Buffer(bool),
    /// Playback fault with the renderer's detail text
    Error(String),
}

/// Errors from renderer commands
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("Player '{0}' not found. Install it first.")]
    NotFound(String),
    #[error("Failed to start player: {0}")]
    StartFailed(#[from] std::io::Error),
    #[error("Player IPC error: {0}")]
    Ipc(String),
    #[error("Player is not running")]
    NotRunning,
}

/// Media renderer
#[async_trait]
pub trait Renderer: Send + Sync + 'static {
    async fn load(&self, url: &str, autoplay: bool) -> Result<(), RendererError>;

    async fn set_paused(&self, paused: bool) -> Result<(), RendererError>;

    async fn seek(&self, target_seconds: f64) -> Result<(), RendererError>;

    async fn shutdown(&self) -> Result<(), RendererError>;

    fn on_event(&self, listener: Listener<RendererEvent>) -> Subscription;
}
