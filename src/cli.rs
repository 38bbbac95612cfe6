//! CLI - Command Line Interface for flickstream
//!
//! Every catalog action is scriptable and all output is JSON-parseable.
//! Logs go to stderr, so stdout can be piped.
//!
//! # Examples
//!
//! ```bash
//! # Ranked streams for a movie or an episode
//! flickstream streams tt1877830 --quality 1080p
//! flickstream streams tt0903747 -s 1 -e 1
//!
//! # Rank a saved addon response
//! flickstream rank --input streams.json
//!
//! # Play the best 1080p candidate in mpv
//! flickstream play tt1877830 --quality 1080p
//! ```

use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::path::PathBuf;

use crate::models::{CandidateStream, PlaybackSession};

// =============================================================================
// Exit Codes
// =============================================================================

/// Exit codes for CLI operations (semantic for scripting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success
    Success = 0,
    /// General error
    Error = 1,
    /// Invalid arguments
    InvalidArgs = 2,
    /// Network error
    NetworkError = 3,
    /// No streams available
    NoStreams = 4,
    /// Playback session failed
    PlaybackFailed = 5,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> std::process::ExitCode {
        std::process::ExitCode::from(code as u8)
    }
}

// =============================================================================
// Main CLI Structure
// =============================================================================

/// flickstream - torrent-backed streaming from the terminal
#[derive(Parser, Debug)]
#[command(
    name = "flickstream",
    version,
    author = "Gorka & Hermes",
    about = "Find, rank and stream torrent releases",
    long_about = "Fetches stream candidates from the Torrentio addon, ranks and \
                  deduplicates them, and plays the chosen one through \
                  webtorrent-cli and mpv with adaptive buffering.",
    after_help = "EXAMPLES:\n\
                  flickstream streams tt1877830 -Q 1080p   Ranked 1080p streams\n\
                  flickstream rank --input streams.json    Rank a saved response\n\
                  flickstream magnet <hash> --name Movie   Build a launch URI\n\
                  flickstream play tt1877830               Stream the best candidate"
)]
pub struct Cli {
    /// Output format as JSON (default for non-TTY)
    #[arg(long, short = 'j', global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Check if JSON output should be used
    pub fn should_json(&self) -> bool {
        self.json || !std::io::stdout().is_terminal()
    }
}

// =============================================================================
// Subcommands
// =============================================================================

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Get ranked streams for a movie or episode
    #[command(visible_alias = "st")]
    Streams(StreamsCmd),

    /// Rank a saved addon response offline
    Rank(RankCmd),

    /// Build a launch URI from an info hash
    #[command(visible_alias = "m")]
    Magnet(MagnetCmd),

    /// Stream a title or magnet link in mpv
    #[command(visible_alias = "pl")]
    Play(PlayCmd),
}

// =============================================================================
// Streams Command
// =============================================================================

/// Get available streams for a movie or TV episode
#[derive(Args, Debug)]
pub struct StreamsCmd {
    /// IMDB ID (e.g., tt1877830)
    #[arg(required = true)]
    pub imdb_id: String,

    /// Season number (for TV shows)
    #[arg(long, short = 's')]
    pub season: Option<u16>,

    /// Episode number (for TV shows)
    #[arg(long, short = 'e')]
    pub episode: Option<u16>,

    /// Exact quality label ("All" for no filter)
    #[arg(long, short = 'Q')]
    pub quality: Option<String>,

    /// Maximum number of results
    #[arg(long, short = 'l', default_value = "20")]
    pub limit: usize,
}

// =============================================================================
// Rank Command
// =============================================================================

/// Rank streams from an addon JSON file
#[derive(Args, Debug)]
pub struct RankCmd {
    /// Addon response (`{"streams": [...]}`); "-" reads stdin
    #[arg(long, short = 'i', required = true)]
    pub input: PathBuf,

    /// Exact quality label ("All" for no filter)
    #[arg(long, short = 'Q')]
    pub quality: Option<String>,
}

// =============================================================================
// Magnet Command
// =============================================================================

/// Build a magnet URI with the standard announce list
#[derive(Args, Debug)]
pub struct MagnetCmd {
    /// Torrent info hash
    #[arg(required = true)]
    pub info_hash: String,

    /// Display name
    #[arg(long, short = 'n', default_value = "")]
    pub name: String,
}

// =============================================================================
// Play Command
// =============================================================================

/// Stream a title (best ranked candidate) or a raw magnet link
#[derive(Args, Debug)]
pub struct PlayCmd {
    /// IMDB ID or magnet link
    #[arg(required = true)]
    pub target: String,

    /// Season number (for TV shows)
    #[arg(long, short = 's')]
    pub season: Option<u16>,

    /// Episode number (for TV shows)
    #[arg(long, short = 'e')]
    pub episode: Option<u16>,

    /// Exact quality label ("All" for no filter)
    #[arg(long, short = 'Q')]
    pub quality: Option<String>,

    /// Candidate index in the ranked list
    #[arg(long, short = 'i', default_value = "0")]
    pub index: usize,
}

impl PlayCmd {
    pub fn is_magnet(&self) -> bool {
        self.target.starts_with("magnet:?")
    }
}

// =============================================================================
// Interactive Playback Input
// =============================================================================

/// Line command read from stdin during `play`
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerInput {
    TogglePause,
    Seek(f64),
    SkipBack(Option<f64>),
    Quit,
}

/// Parse "p", "s <secs|mm:ss>", "b [secs]", "q"
pub fn parse_player_input(line: &str) -> Option<PlayerInput> {
    let mut parts = line.split_whitespace();
    let cmd = parts.next()?;
    let arg = parts.next();
    match cmd {
        "p" | "pause" | "play" => Some(PlayerInput::TogglePause),
        "s" | "seek" => parse_time(arg?).map(PlayerInput::Seek),
        "b" | "back" => match arg {
            Some(arg) => parse_time(arg).map(|s| PlayerInput::SkipBack(Some(s))),
            None => Some(PlayerInput::SkipBack(None)),
        },
        "q" | "quit" => Some(PlayerInput::Quit),
        _ => None,
    }
}

/// Seconds, "mm:ss" or "h:mm:ss"
fn parse_time(value: &str) -> Option<f64> {
    if value.contains(':') {
        let mut total = 0.0;
        for part in value.split(':') {
            let n: f64 = part.parse().ok()?;
            total = total * 60.0 + n;
        }
        Some(total)
    } else {
        value.parse().ok().filter(|s: &f64| s.is_finite() && *s >= 0.0)
    }
}

// =============================================================================
// JSON Output Types
// =============================================================================

/// Generic JSON output wrapper with status
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonOutput<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "is_zero")]
    pub exit_code: i32,
}

fn is_zero(n: &i32) -> bool {
    *n == 0
}

impl<T: Serialize> JsonOutput<T> {
    /// Create success output with data
    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            exit_code: 0,
        }
    }

    /// Create error output (no data)
    pub fn error_msg(msg: impl Into<String>, code: ExitCode) -> JsonOutput<()> {
        JsonOutput::<()> {
            data: None,
            error: Some(msg.into()),
            exit_code: code.into(),
        }
    }
}

/// Ranked candidates plus the quality labels available for filtering
#[derive(Debug, Serialize, Deserialize)]
pub struct StreamsResponse {
    pub qualities: Vec<String>,
    pub streams: Vec<CandidateStream>,
}

/// Launch URI response
#[derive(Debug, Serialize, Deserialize)]
pub struct MagnetResponse {
    pub info_hash: String,
    pub uri: String,
}

/// Final state of a finished `play` session
#[derive(Debug, Serialize, Deserialize)]
pub struct PlayResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub session: PlaybackSession,
}

// =============================================================================
// Output Helpers
// =============================================================================

/// Output handler for consistent formatting
pub struct Output {
    pub json: bool,
    pub quiet: bool,
}

impl Output {
    pub fn new(cli: &Cli) -> Self {
        Self {
            json: cli.should_json(),
            quiet: cli.quiet,
        }
    }

    /// Print success data
    pub fn print<T: Serialize>(&self, data: T) -> anyhow::Result<()> {
        if self.json {
            let output = JsonOutput::success(data);
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Ok(())
    }

    /// Print error and return exit code
    pub fn error(&self, msg: impl Into<String>, code: ExitCode) -> ExitCode {
        let msg = msg.into();
        if self.json {
            let output = JsonOutput::<()>::error_msg(&msg, code);
            if let Ok(json) = serde_json::to_string_pretty(&output) {
                eprintln!("{}", json);
            }
        } else if !self.quiet {
            eprintln!("Error: {}", msg);
        }
        code
    }

    /// Print info message (suppressed in quiet mode)
    pub fn info(&self, msg: impl std::fmt::Display) {
        if !self.quiet && !self.json {
            eprintln!("{}", msg);
        }
    }
}

// =============================================================================
// IMDB ID Validation
// =============================================================================

/// Validate IMDB ID format (tt followed by digits)
pub fn validate_imdb_id(id: &str) -> Result<&str, &'static str> {
    if id.starts_with("tt") && id.len() >= 9 && id[2..].chars().all(|c| c.is_ascii_digit()) {
        Ok(id)
    } else {
        Err("Invalid IMDB ID format (expected tt followed by 7+ digits)")
    }
}

// =============================================================================
// Tests
// =============================================================================
