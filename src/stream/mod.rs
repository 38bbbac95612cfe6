//! Streaming infrastructure
//!
//! - Torrent: webtorrent-cli backed torrent bridge
//! - Player: mpv renderer over JSON IPC

pub mod player;
pub mod torrent;

#[cfg(unix)]
pub use player::MpvRenderer;
pub use torrent::WebtorrentBridge;
