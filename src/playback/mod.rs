//! Adaptive playback sessions
//!
//! - Events: owned subscription tokens for collaborator event streams
//! - Bridge: torrent bridge and renderer traits
//! - Monitor: throttled telemetry intake
//! - SeekGuard: seek gating by download progress
//! - Faults: seek-fault classification of renderer errors
//! - Controller: the session state machine
//! - Session: the single-writer event loop driving a controller

pub mod bridge;
pub mod controller;
pub mod events;
pub mod faults;
pub mod monitor;
pub mod seek_guard;
pub mod session;

use thiserror::Error;

pub use bridge::{
    BridgeError, BridgeFault, Renderer, RendererError, RendererEvent, StartOptions, StreamInfo,
    TorrentBridge,
};
pub use controller::{Effect, Input, PlaybackSessionController, PlayerCommand};
pub use events::{EventHub, Listener, Subscription};
pub use faults::{FaultClass, FaultClassifier};
pub use monitor::BufferHealthMonitor;
pub use seek_guard::SeekGuard;
pub use session::{SessionHandle, SessionRunner};

/// Playback fault taxonomy
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    /// The bridge could not begin fetching; fatal
    #[error("Could not start torrent stream: {0}")]
    SessionStartFailure(String),
    /// The renderer hit undownloaded data; recoverable
    #[error("Seek into undownloaded data: {0}")]
    SeekFault(String),
    /// Any other renderer fault; fatal
    #[error("Failed to play video: {0}")]
    RendererFailure(String),
    /// Malformed telemetry; absorbed locally
    #[error("Malformed telemetry: {0}")]
    TelemetryParseAnomaly(String),
}

impl PlaybackError {
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PlaybackError::SessionStartFailure(_) | PlaybackError::RendererFailure(_)
        )
    }
}
