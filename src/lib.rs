//! flickstream - torrent-backed streaming with adaptive playback
//!
//! Turns Torrentio addon records into a ranked, deduplicated candidate list
//! and drives a playback session (bridge + renderer) through an adaptive
//! buffering state machine.
//!
//! # Modules
//!
//! - `models` - Stream records, telemetry, session state
//! - `catalog` - Metadata parsing, ranking, launch URIs
//! - `playback` - Buffer monitor, seek guard, session controller and runner
//! - `api` - Torrentio addon client
//! - `stream` - webtorrent bridge and mpv renderer
//! - `config` - TOML configuration
//! - `cli` / `commands` - Command line surface

pub mod api;
pub mod catalog;
pub mod cli;
pub mod commands;
pub mod config;
pub mod models;
pub mod playback;
pub mod stream;

// Re-export commonly used types
pub use models::{
    AddonResponse, CandidateStream, Notice, NoticeSeverity, PlaybackSession, PlaybackState,
    RawStream, RawTelemetry, TelemetrySample,
};

pub use api::TorrentioClient;
pub use playback::{PlaybackError, PlaybackSessionController, SessionHandle, SessionRunner};
