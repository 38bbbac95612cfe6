//! Stream catalog engine
//!
//! - Parser: structured fields from Torrentio release titles/names
//! - Ranker: seeders-per-GiB scoring, deduplication by info hash
//! - Magnet: launch URI generation with a fixed announce list

pub mod magnet;
pub mod parser;
pub mod ranker;

pub use magnet::generate_launch_uri;
pub use ranker::{available_qualities, rank, rank_filtered, QualityFilter};
