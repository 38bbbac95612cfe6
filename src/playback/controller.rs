//! Playback session state machine
//!
//! ```text
//! Idle -> Starting -> Buffering -> Playing <-> Paused
//!                                    |  ^
//!                                    v  |
//!                             RebufferingPaused
//!
//! * -> Erroring -> Recovering -> Buffering | Playing
//!              \-> Closed
//! ```
//!
//! The controller is synchronous and owns no I/O: every input returns the
//! effects the runner must carry out. Timers come back as inputs.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::PlaybackConfig;
use crate::models::{Notice, PlaybackSession, PlaybackState, RawTelemetry};
use crate::playback::bridge::{BridgeFault, RendererEvent, StartOptions, StreamInfo};
use crate::playback::faults::{FaultClass, FaultClassifier};
use crate::playback::monitor::BufferHealthMonitor;
use crate::playback::seek_guard::SeekGuard;
use crate::playback::PlaybackError;

/// User command from the UI collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    TogglePlayPause,
    /// Absolute target in seconds
    RequestSeek(f64),
    /// Seconds to jump back
    SkipBack(f64),
    Close,
}

/// Everything the controller reacts to, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    StartRequested,
    StartSucceeded(StreamInfo),
    StartFailed(String),
    Telemetry(RawTelemetry),
    BridgeFault(BridgeFault),
    Renderer(RendererEvent),
    Command(PlayerCommand),
    Tick,
    HideControls { generation: u64 },
    CorrectiveSeek { target: f64 },
}

/// Side effect requested by the controller
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartBridge { uri: String, options: StartOptions },
    LoadRenderer { url: String, autoplay: bool },
    Play,
    Pause,
    Seek(f64),
    ScheduleHideControls { generation: u64, after: Duration },
    ScheduleCorrectiveSeek { target: f64, after: Duration },
    Notify(Notice),
    /// Release everything; `fatal` closures also invoke the close callback
    Teardown { fatal: bool },
}

pub struct PlaybackSessionController {
    session: PlaybackSession,
    config: PlaybackConfig,
    monitor: BufferHealthMonitor,
    guard: SeekGuard,
    classifier: FaultClassifier,
    /// Renderer reported a stall that has not ended yet
    renderer_buffering: bool,
    /// Renderer has been loaded with the stream
    playback_started: bool,
    /// A seek was forwarded and no progress report has confirmed it yet
    seek_pending: bool,
    /// A corrective seek is scheduled but not issued yet
    corrective_pending: bool,
    controls_generation: u64,
}

impl PlaybackSessionController {
    pub fn new(uri: impl Into<String>, config: PlaybackConfig) -> Self {
        Self {
            session: PlaybackSession::new(uri),
            monitor: BufferHealthMonitor::from_config(&config),
            guard: SeekGuard::new(config.seek_unlock_percent),
            classifier: FaultClassifier::from_config(&config),
            config,
            renderer_buffering: false,
            playback_started: false,
            seek_pending: false,
            corrective_pending: false,
            controls_generation: 0,
        }
    }

    /// Replace the fault classifier (markers are otherwise taken from config)
    pub fn with_classifier(mut self, classifier: FaultClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn state(&self) -> PlaybackState {
        self.session.state
    }

    pub fn is_closed(&self) -> bool {
        self.session.state.is_closed()
    }

    /// Apply one input and return the resulting effects
    pub fn handle(&mut self, input: Input, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.is_closed() {
            debug!(?input, "Session closed, input ignored");
            return effects;
        }

        match input {
            Input::StartRequested => self.on_start_requested(&mut effects),
            Input::StartSucceeded(info) => self.on_start_succeeded(info, &mut effects),
            Input::StartFailed(msg) => {
                self.fail(PlaybackError::SessionStartFailure(msg), &mut effects)
            }
            Input::Telemetry(raw) => self.on_telemetry(&raw, now, &mut effects),
            Input::BridgeFault(fault) => self.on_bridge_fault(fault, &mut effects),
            Input::Renderer(event) => self.on_renderer(event, &mut effects),
            Input::Command(command) => self.on_command(command, &mut effects),
            Input::Tick => self.refresh_status(),
            Input::HideControls { generation } => {
                if generation == self.controls_generation {
                    self.session.controls_visible = false;
                }
            }
            Input::CorrectiveSeek { target } => self.on_corrective_seek(target, &mut effects),
        }

        effects
    }

    // -------------------------------------------------------------------------
    // Session start
    // -------------------------------------------------------------------------

    fn on_start_requested(&mut self, effects: &mut Vec<Effect>) {
        if self.session.state != PlaybackState::Idle {
            warn!(state = %self.session.state, "Session already requested");
            return;
        }
        self.transition(PlaybackState::Starting);
        effects.push(Effect::StartBridge {
            uri: self.session.uri.clone(),
            options: StartOptions {
                remove_after_stop: true,
            },
        });
    }

    fn on_start_succeeded(&mut self, info: StreamInfo, effects: &mut Vec<Effect>) {
        if self.session.state != PlaybackState::Starting {
            warn!(state = %self.session.state, "Unexpected start result");
            return;
        }
        info!(url = %info.url, file_size = ?info.file_size, "Stream started");
        self.session.stream_url = Some(info.url);
        self.session.file_size = info.file_size;
        self.transition(PlaybackState::Buffering);
        self.check_ready(effects);
    }

    /// Buffering -> Playing once the window is full and the floor is reached
    fn check_ready(&mut self, effects: &mut Vec<Effect>) {
        if self.session.state != PlaybackState::Buffering || self.playback_started {
            return;
        }
        let ready = self.session.buffer_percent >= self.config.ready_buffer_percent
            && self.session.progress_percent >= self.config.ready_progress_floor;
        if !ready {
            return;
        }
        let Some(url) = self.session.stream_url.clone() else {
            return;
        };

        self.playback_started = true;
        self.transition(PlaybackState::Playing);
        effects.push(Effect::LoadRenderer {
            url,
            autoplay: true,
        });
        self.show_controls(effects);
    }

    // -------------------------------------------------------------------------
    // Telemetry
    // -------------------------------------------------------------------------

    fn on_telemetry(&mut self, raw: &RawTelemetry, now: Instant, effects: &mut Vec<Effect>) {
        let Some(sample) = self.monitor.ingest(raw, now) else {
            return;
        };
        BufferHealthMonitor::apply(&sample, &mut self.session);

        match self.session.state {
            PlaybackState::Buffering => self.check_ready(effects),
            PlaybackState::RebufferingPaused => self.check_resume(effects),
            _ => {}
        }
    }

    fn on_bridge_fault(&mut self, fault: BridgeFault, effects: &mut Vec<Effect>) {
        warn!(msg = %fault.msg, "Bridge reported an error");
        let message = if fault.msg.trim().is_empty() {
            "Failed to stream torrent".to_string()
        } else {
            fault.msg
        };
        self.notify(Notice::warning("Streaming Error", message), effects);
    }

    // -------------------------------------------------------------------------
    // Renderer events
    // -------------------------------------------------------------------------

    fn on_renderer(&mut self, event: RendererEvent, effects: &mut Vec<Effect>) {
        match event {
            RendererEvent::Progress(position) => self.on_progress(position),
            RendererEvent::Load(duration) => {
                if duration.is_finite() && duration > 0.0 {
                    self.session.duration_seconds = Some(duration);
                }
            }
            RendererEvent::Buffer(true) => {
                self.renderer_buffering = true;
                match self.session.state {
                    PlaybackState::Playing => {
                        self.transition(PlaybackState::RebufferingPaused);
                        effects.push(Effect::Pause);
                    }
                    PlaybackState::Recovering => self.transition(PlaybackState::Buffering),
                    _ => {}
                }
            }
            RendererEvent::Buffer(false) => {
                self.renderer_buffering = false;
                if self.session.state == PlaybackState::RebufferingPaused {
                    self.check_resume(effects);
                }
            }
            RendererEvent::Error(detail) => self.on_renderer_error(detail, effects),
        }
    }

    fn on_progress(&mut self, position: f64) {
        if !position.is_finite() || position < 0.0 {
            return;
        }
        self.session.current_position_seconds = position;
        if self.corrective_pending {
            // Position may still be inside the faulty region
            return;
        }
        self.session.last_safe_position_seconds = position;

        if self.seek_pending {
            self.seek_pending = false;
            if self.session.seek_error_streak > 0 {
                debug!("Seek confirmed, error streak reset");
            }
            self.session.seek_error_streak = 0;
        }

        let recovered = self.session.state == PlaybackState::Recovering
            || (self.session.state == PlaybackState::Buffering && self.playback_started);
        if recovered {
            self.transition(PlaybackState::Playing);
        }
    }

    /// RebufferingPaused -> Playing with hysteresis on the buffer
    fn check_resume(&mut self, effects: &mut Vec<Effect>) {
        if !self.renderer_buffering
            && self.session.buffer_percent > self.config.resume_buffer_percent
        {
            self.transition(PlaybackState::Playing);
            effects.push(Effect::Play);
        }
    }

    fn on_renderer_error(&mut self, detail: String, effects: &mut Vec<Effect>) {
        let previous = self.session.state;
        self.transition(PlaybackState::Erroring);

        match self.classifier.classify(&detail) {
            FaultClass::SeekFault if self.session.seek_error_streak < self.config.max_seek_retries => {
                self.session.seek_error_streak += 1;
                let target = self.session.last_safe_position_seconds;
                warn!(
                    error = %PlaybackError::SeekFault(detail),
                    streak = self.session.seek_error_streak,
                    target,
                    "Scheduling corrective seek"
                );
                self.notify(
                    Notice::warning(
                        "Playback Issue",
                        format!(
                            "That part is not downloaded yet. Returning to {}...",
                            format_position(target)
                        ),
                    ),
                    effects,
                );
                self.corrective_pending = true;
                effects.push(Effect::ScheduleCorrectiveSeek {
                    target,
                    after: self.config.corrective_seek_delay(),
                });
                self.transition(PlaybackState::Recovering);
            }
            FaultClass::SeekFault => {
                warn!(
                    error = %PlaybackError::SeekFault(detail),
                    "Seek faults keep recurring, automatic correction stopped"
                );
                self.session.seek_error_streak = 0;
                self.notify(
                    Notice::warning(
                        "Please Wait",
                        "Not enough data downloaded to play this part. Wait for more data before seeking.",
                    ),
                    effects,
                );
                self.transition(previous);
            }
            FaultClass::RendererFailure => {
                self.fail(PlaybackError::RendererFailure(detail), effects);
            }
        }
    }

    fn on_corrective_seek(&mut self, target: f64, effects: &mut Vec<Effect>) {
        if !self.corrective_pending {
            debug!(target, "Stale corrective seek ignored");
            return;
        }
        self.corrective_pending = false;
        self.seek_pending = true;
        self.session.current_position_seconds = target;
        effects.push(Effect::Seek(target));
        effects.push(Effect::Play);
    }

    // -------------------------------------------------------------------------
    // User commands
    // -------------------------------------------------------------------------

    fn on_command(&mut self, command: PlayerCommand, effects: &mut Vec<Effect>) {
        match command {
            PlayerCommand::TogglePlayPause => self.toggle(effects),
            PlayerCommand::RequestSeek(target) => self.seek(target, effects),
            PlayerCommand::SkipBack(seconds) => {
                let target = (self.session.current_position_seconds - seconds.abs()).max(0.0);
                self.seek(target, effects);
            }
            PlayerCommand::Close => {
                info!("Session closed by user");
                self.transition(PlaybackState::Closed);
                effects.push(Effect::Teardown { fatal: false });
            }
        }
    }

    fn toggle(&mut self, effects: &mut Vec<Effect>) {
        match self.session.state {
            PlaybackState::Playing => {
                self.transition(PlaybackState::Paused);
                effects.push(Effect::Pause);
            }
            PlaybackState::Paused => {
                self.transition(PlaybackState::Playing);
                effects.push(Effect::Play);
            }
            // Renderer is already paused; the user pause now owns it
            PlaybackState::RebufferingPaused => self.transition(PlaybackState::Paused),
            _ => return,
        }
        self.show_controls(effects);
    }

    fn seek(&mut self, target: f64, effects: &mut Vec<Effect>) {
        if !self.session.state.is_playback() || !target.is_finite() {
            debug!(state = %self.session.state, target, "Seek ignored");
            return;
        }
        let safe_position = self.session.last_safe_position_seconds;

        if !self.guard.is_seek_allowed(&self.session) {
            info!(
                progress = self.session.progress_percent,
                target, "Seek rejected, not enough data downloaded"
            );
            self.session.current_position_seconds = safe_position;
            let notice = self.guard.rejection_notice(&self.session);
            self.notify(notice, effects);
            return;
        }

        // Without a reported duration only backward seeks are bounded
        let upper = match self.session.duration_seconds {
            Some(duration) => duration,
            None if target > self.session.current_position_seconds => {
                info!(target, "Seek rejected, duration not known yet");
                let notice = Notice::info(
                    "Seeking Unavailable",
                    "The stream length is not known yet. Try again in a moment.",
                );
                self.notify(notice, effects);
                return;
            }
            None => self.session.current_position_seconds,
        };
        let target = target.clamp(0.0, upper);
        self.session.current_position_seconds = target;
        self.seek_pending = true;
        // A user seek supersedes a scheduled correction
        self.corrective_pending = false;
        effects.push(Effect::Seek(target));
        self.show_controls(effects);
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn fail(&mut self, err: PlaybackError, effects: &mut Vec<Effect>) {
        error!(error = %err, "Fatal playback error");
        self.transition(PlaybackState::Erroring);
        let title = match err {
            PlaybackError::SessionStartFailure(_) => "Streaming Error",
            _ => "Playback Error",
        };
        self.notify(Notice::fatal(title, err.to_string()), effects);
        self.transition(PlaybackState::Closed);
        effects.push(Effect::Teardown { fatal: true });
    }

    fn notify(&mut self, notice: Notice, effects: &mut Vec<Effect>) {
        self.session.last_notice = Some(notice.clone());
        effects.push(Effect::Notify(notice));
    }

    fn show_controls(&mut self, effects: &mut Vec<Effect>) {
        self.controls_generation += 1;
        self.session.controls_visible = true;
        effects.push(Effect::ScheduleHideControls {
            generation: self.controls_generation,
            after: self.config.controls_autohide(),
        });
    }

    fn transition(&mut self, next: PlaybackState) {
        if self.session.state == next {
            return;
        }
        info!(from = %self.session.state, to = %next, "Playback state change");
        self.session.state = next;
        self.refresh_status();
    }

    /// Recompute the status line from the latest accepted sample
    fn refresh_status(&mut self) {
        let s = &self.session;
        let message = match s.state {
            PlaybackState::Idle => "Initializing stream...".to_string(),
            PlaybackState::Starting => "Starting torrent stream...".to_string(),
            PlaybackState::Buffering if self.playback_started => "Buffering...".to_string(),
            PlaybackState::Buffering if s.progress_percent < self.config.ready_progress_floor => {
                format!("Preparing stream... {:.1}%", s.progress_percent)
            }
            PlaybackState::Buffering => format!("Buffering... {:.1}%", s.progress_percent),
            PlaybackState::Playing => "Playing...".to_string(),
            PlaybackState::Paused => "Paused".to_string(),
            PlaybackState::RebufferingPaused => {
                format!("Waiting for data... buffer {:.0}%", s.buffer_percent)
            }
            PlaybackState::Erroring => "Playback error".to_string(),
            PlaybackState::Recovering => "Recovering playback...".to_string(),
            PlaybackState::Closed => "Stream closed".to_string(),
        };
        self.session.status_message = message;
    }
}

fn format_position(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}
