//! CLI Command Handlers
//!
//! Implements all CLI commands by calling the appropriate backend services.
//! Each handler takes CLI args and Output, returns ExitCode.

use std::io::Read;

use anyhow::{Context, Result};
use tracing::info;

use crate::api::TorrentioClient;
use crate::catalog::{self, QualityFilter};
use crate::cli::{
    validate_imdb_id, ExitCode, MagnetCmd, MagnetResponse, Output, PlayCmd, RankCmd,
    StreamsCmd, StreamsResponse,
};
use crate::config::Config;
use crate::models::{AddonResponse, CandidateStream, RawStream};

// =============================================================================
// Streams Command
// =============================================================================

pub async fn streams_cmd(cmd: StreamsCmd, config: &Config, output: &Output) -> ExitCode {
    if let Err(msg) = validate_imdb_id(&cmd.imdb_id) {
        return output.error(msg, ExitCode::InvalidArgs);
    }

    output.info(format!("Finding streams for: {}", cmd.imdb_id));

    let raw = match fetch_raw(config, &cmd.imdb_id, cmd.season, cmd.episode).await {
        Ok(raw) => raw,
        Err(FetchError::Args(msg)) => return output.error(msg, ExitCode::InvalidArgs),
        Err(FetchError::Network(e)) => {
            return output.error(
                format!("Stream fetch failed: {:#}", e),
                ExitCode::NetworkError,
            )
        }
    };

    let filter = quality_filter(cmd.quality.as_deref(), config);
    print_ranked(&raw, &filter, Some(cmd.limit), output)
}

// =============================================================================
// Rank Command
// =============================================================================

pub fn rank_cmd(cmd: RankCmd, config: &Config, output: &Output) -> ExitCode {
    let response = match read_addon_response(&cmd) {
        Ok(response) => response,
        Err(e) => return output.error(format!("{:#}", e), ExitCode::InvalidArgs),
    };

    let filter = quality_filter(cmd.quality.as_deref(), config);
    print_ranked(&response.streams, &filter, None, output)
}

fn read_addon_response(cmd: &RankCmd) -> Result<AddonResponse> {
    let text = if cmd.input.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        text
    } else {
        std::fs::read_to_string(&cmd.input)
            .with_context(|| format!("Failed to read {}", cmd.input.display()))?
    };
    serde_json::from_str(&text).context("Failed to parse addon response")
}

// =============================================================================
// Magnet Command
// =============================================================================

pub fn magnet_cmd(cmd: MagnetCmd, output: &Output) -> ExitCode {
    let info_hash = cmd.info_hash.trim();
    if info_hash.is_empty() {
        return output.error("Info hash cannot be empty", ExitCode::InvalidArgs);
    }

    let response = MagnetResponse {
        info_hash: info_hash.to_string(),
        uri: catalog::generate_launch_uri(info_hash, &cmd.name),
    };
    if let Err(e) = output.print(&response) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}

// =============================================================================
// Play Command
// =============================================================================

pub async fn play_cmd(cmd: PlayCmd, config: &Config, output: &Output) -> ExitCode {
    let (uri, title) = if cmd.is_magnet() {
        (cmd.target.clone(), None)
    } else {
        if let Err(msg) = validate_imdb_id(&cmd.target) {
            return output.error(msg, ExitCode::InvalidArgs);
        }
        let raw = match fetch_raw(config, &cmd.target, cmd.season, cmd.episode).await {
            Ok(raw) => raw,
            Err(FetchError::Args(msg)) => return output.error(msg, ExitCode::InvalidArgs),
            Err(FetchError::Network(e)) => {
                return output.error(
                    format!("Stream fetch failed: {:#}", e),
                    ExitCode::NetworkError,
                )
            }
        };

        let filter = quality_filter(cmd.quality.as_deref(), config);
        let ranked = catalog::rank_filtered(&raw, &filter);
        let Some(candidate) = ranked.into_iter().nth(cmd.index) else {
            return output.error(
                format!("No stream at index {}", cmd.index),
                ExitCode::NoStreams,
            );
        };
        output.info(format!("Selected: {}", candidate));
        (candidate.playback_uri.clone(), Some(candidate.display_name().to_string()))
    };

    playback::run(uri, title, config, output).await
}

#[cfg(unix)]
mod playback {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use tokio::io::{AsyncBufReadExt, BufReader};
    use tracing::{error, info};

    use crate::cli::{parse_player_input, ExitCode, Output, PlayResponse, PlayerInput};
    use crate::config::Config;
    use crate::playback::SessionRunner;
    use crate::stream::{player, MpvRenderer, WebtorrentBridge};

    const HELP: &str = "Commands: p (play/pause) | s <secs> (seek) | b [secs] (back) | q (quit)";

    pub async fn run(
        uri: String,
        title: Option<String>,
        config: &Config,
        output: &Output,
    ) -> ExitCode {
        let bridge = WebtorrentBridge::new(config.bridge.clone());
        if !bridge.is_available().await {
            return output.error(
                "webtorrent not found. Install with: npm install -g webtorrent-cli",
                ExitCode::Error,
            );
        }
        if !player::is_available(&config.player).await {
            return output.error("mpv not found. Install it first.", ExitCode::Error);
        }
        let renderer = MpvRenderer::new(config.player.clone());

        let failed = Arc::new(AtomicBool::new(false));
        let failed_flag = Arc::clone(&failed);
        let (runner, mut handle) =
            SessionRunner::new(bridge, renderer, uri, config.playback.clone());
        let runner = runner.on_close(move |session| {
            error!(id = %session.id, "Session closed after a fatal error");
            failed_flag.store(true, Ordering::SeqCst);
        });
        let task = runner.spawn();

        output.info(HELP);
        let Some(mut notices) = handle.take_notices() else {
            return output.error("Notice stream unavailable", ExitCode::Error);
        };
        let mut state = handle.watch();
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let mut last_status = String::new();

        loop {
            tokio::select! {
                line = stdin.next_line(), if stdin_open => match line {
                    Ok(Some(line)) => match parse_player_input(&line) {
                        Some(PlayerInput::TogglePause) => { handle.toggle_play_pause(); }
                        Some(PlayerInput::Seek(target)) => { handle.request_seek(target); }
                        Some(PlayerInput::SkipBack(seconds)) => {
                            handle.skip_back(seconds.unwrap_or(config.playback.skip_back_seconds));
                        }
                        Some(PlayerInput::Quit) => { handle.close(); }
                        None => output.info(HELP),
                    },
                    _ => stdin_open = false,
                },
                Some(notice) = notices.recv() => {
                    output.info(format!("[{:?}] {}", notice.severity, notice));
                }
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let session = state.borrow_and_update().clone();
                    if session.status_message != last_status {
                        output.info(format!("{} | {}", session.status_message, session));
                        last_status = session.status_message.clone();
                    }
                    if session.state.is_closed() {
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    handle.close();
                }
            }
        }

        let session = match task.await {
            Ok(session) => session,
            Err(e) => return output.error(format!("Session task failed: {}", e), ExitCode::Error),
        };

        let failed = failed.load(Ordering::SeqCst);
        let response = PlayResponse {
            status: if failed { "failed" } else { "closed" },
            title,
            session,
        };
        if let Err(e) = output.print(&response) {
            return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
        }
        if failed {
            ExitCode::PlaybackFailed
        } else {
            ExitCode::Success
        }
    }
}

#[cfg(not(unix))]
mod playback {
    use crate::cli::{ExitCode, Output};
    use crate::config::Config;

    pub async fn run(
        _uri: String,
        _title: Option<String>,
        _config: &Config,
        output: &Output,
    ) -> ExitCode {
        output.error(
            "Playback needs mpv IPC over unix sockets",
            ExitCode::PlaybackFailed,
        )
    }
}

// =============================================================================
// Helpers
// =============================================================================

enum FetchError {
    Args(&'static str),
    Network(anyhow::Error),
}

async fn fetch_raw(
    config: &Config,
    imdb_id: &str,
    season: Option<u16>,
    episode: Option<u16>,
) -> Result<Vec<RawStream>, FetchError> {
    let client = TorrentioClient::from_config(&config.torrentio);
    let result = match (season, episode) {
        (Some(season), Some(episode)) => client.episode_streams(imdb_id, season, episode).await,
        (None, None) => client.movie_streams(imdb_id).await,
        _ => return Err(FetchError::Args("--season and --episode must be given together")),
    };
    let raw = result.map_err(FetchError::Network)?;
    info!(imdb_id, count = raw.len(), "Fetched raw streams");
    Ok(raw)
}

/// Explicit flag wins over the configured preference
fn quality_filter(flag: Option<&str>, config: &Config) -> QualityFilter {
    flag.or(config.preferred_quality.as_deref())
        .map(QualityFilter::from_label)
        .unwrap_or(QualityFilter::All)
}

fn print_ranked(
    raw: &[RawStream],
    filter: &QualityFilter,
    limit: Option<usize>,
    output: &Output,
) -> ExitCode {
    let qualities = catalog::available_qualities(&catalog::rank(raw));
    let mut streams: Vec<CandidateStream> = catalog::rank_filtered(raw, filter);
    if streams.is_empty() {
        return output.error("No streams found", ExitCode::NoStreams);
    }
    if let Some(limit) = limit {
        streams.truncate(limit);
    }

    if let Err(e) = output.print(StreamsResponse { qualities, streams }) {
        return output.error(format!("Failed to serialize: {}", e), ExitCode::Error);
    }
    ExitCode::Success
}
