//! API clients for external services
//!
//! - Torrentio: Stream sources via Stremio addon protocol

pub mod torrentio;

pub use torrentio::TorrentioClient;
