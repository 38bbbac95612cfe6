//! Integration tests for flickstream
//!
//! Tests are organized by component:
//! - catalog_test: Title parsing, ranking, launch URIs
//! - torrentio_test: Torrentio addon tests
//! - torrent_test: webtorrent output folding and bridge lifecycle
//! - controller_test: Session state machine properties
//! - session_test: Session runner with fake bridge and renderer
//! - cli_test: Argument parsing and command handlers

// Note: Each test file is a separate integration test crate
// Tests are run individually by cargo, not via mod.rs
