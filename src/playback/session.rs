//! Single-writer session runner
//!
//! Bridge listeners, renderer listeners, timers and user commands all push
//! `Input`s into one queue. The runner pops them in order, feeds the
//! controller, and carries out the returned effects before taking the next
//! input. Nothing else touches the session.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::PlaybackConfig;
use crate::models::{Notice, PlaybackSession};
use crate::playback::bridge::{Renderer, RendererEvent, StartOptions, TorrentBridge};
use crate::playback::controller::{Effect, Input, PlaybackSessionController, PlayerCommand};
use crate::playback::events::Subscription;

type CloseCallback = Box<dyn FnOnce(&PlaybackSession) + Send>;

/// Drives one playback session to completion
pub struct SessionRunner<B, R> {
    bridge: Arc<B>,
    renderer: Arc<R>,
    controller: PlaybackSessionController,
    tick_interval: Duration,
    inputs_tx: mpsc::UnboundedSender<Input>,
    inputs_rx: mpsc::UnboundedReceiver<Input>,
    state_tx: watch::Sender<PlaybackSession>,
    notices_tx: mpsc::UnboundedSender<Notice>,
    subscriptions: Vec<Subscription>,
    timers: Vec<JoinHandle<()>>,
    start_task: Option<JoinHandle<()>>,
    on_close: Option<CloseCallback>,
    torn_down: bool,
}

impl<B: TorrentBridge, R: Renderer> SessionRunner<B, R> {
    /// Create a runner for `uri` and the handle that talks to it
    pub fn new(
        bridge: B,
        renderer: R,
        uri: impl Into<String>,
        config: PlaybackConfig,
    ) -> (Self, SessionHandle) {
        let tick_interval = config.tick_interval();
        Self::with_controller(
            bridge,
            renderer,
            PlaybackSessionController::new(uri, config),
            tick_interval,
        )
    }

    /// Create a runner around a prepared controller
    pub fn with_controller(
        bridge: B,
        renderer: R,
        controller: PlaybackSessionController,
        tick_interval: Duration,
    ) -> (Self, SessionHandle) {
        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(controller.session().clone());

        let handle = SessionHandle {
            commands: inputs_tx.clone(),
            state: state_rx,
            notices: Some(notices_rx),
        };

        let runner = Self {
            bridge: Arc::new(bridge),
            renderer: Arc::new(renderer),
            controller,
            tick_interval,
            inputs_tx,
            inputs_rx,
            state_tx,
            notices_tx,
            subscriptions: Vec::new(),
            timers: Vec::new(),
            start_task: None,
            on_close: None,
            torn_down: false,
        };
        (runner, handle)
    }

    /// Callback invoked once if the session closes because of a fatal fault
    pub fn on_close(mut self, callback: impl FnOnce(&PlaybackSession) + Send + 'static) -> Self {
        self.on_close = Some(Box::new(callback));
        self
    }

    /// Run on a new task
    pub fn spawn(self) -> JoinHandle<PlaybackSession> {
        tokio::spawn(self.run())
    }

    /// Run until the session closes and return its final state
    pub async fn run(mut self) -> PlaybackSession {
        self.subscribe();
        self.dispatch(Input::StartRequested).await;

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        while !self.controller.is_closed() {
            let input = tokio::select! {
                input = self.inputs_rx.recv() => match input {
                    Some(input) => input,
                    None => Input::Command(PlayerCommand::Close),
                },
                _ = ticker.tick() => Input::Tick,
            };
            self.dispatch(input).await;
        }

        // Controller may have closed without a teardown effect
        self.teardown().await;
        let session = self.controller.session().clone();
        info!(id = %session.id, "Session finished");
        session
    }

    fn subscribe(&mut self) {
        let tx = self.inputs_tx.clone();
        self.subscriptions.push(self.bridge.on_status(Box::new(move |raw| {
            let _ = tx.send(Input::Telemetry(raw));
        })));

        let tx = self.inputs_tx.clone();
        self.subscriptions.push(self.bridge.on_error(Box::new(move |fault| {
            let _ = tx.send(Input::BridgeFault(fault));
        })));

        let tx = self.inputs_tx.clone();
        self.subscriptions.push(self.renderer.on_event(Box::new(move |event| {
            let _ = tx.send(Input::Renderer(event));
        })));
    }

    async fn dispatch(&mut self, input: Input) {
        let now = tokio::time::Instant::now().into_std();
        let effects = self.controller.handle(input, now);
        for effect in effects {
            self.apply(effect).await;
        }
        self.publish();
    }

    fn publish(&self) {
        let snapshot = self.controller.session();
        self.state_tx.send_if_modified(|current| {
            if current != snapshot {
                *current = snapshot.clone();
                true
            } else {
                false
            }
        });
    }

    async fn apply(&mut self, effect: Effect) {
        debug!(?effect, "Applying effect");
        match effect {
            Effect::StartBridge { uri, options } => self.start_bridge(uri, options),
            Effect::LoadRenderer { url, autoplay } => {
                if let Err(e) = self.renderer.load(&url, autoplay).await {
                    warn!(error = %e, "Renderer failed to load stream");
                    let _ = self
                        .inputs_tx
                        .send(Input::Renderer(RendererEvent::Error(e.to_string())));
                }
            }
            Effect::Play => self.set_paused(false).await,
            Effect::Pause => self.set_paused(true).await,
            Effect::Seek(target) => {
                if let Err(e) = self.renderer.seek(target).await {
                    warn!(error = %e, target, "Renderer seek failed");
                }
            }
            Effect::ScheduleHideControls { generation, after } => {
                self.schedule(after, Input::HideControls { generation })
            }
            Effect::ScheduleCorrectiveSeek { target, after } => {
                self.schedule(after, Input::CorrectiveSeek { target })
            }
            Effect::Notify(notice) => {
                let _ = self.notices_tx.send(notice);
            }
            Effect::Teardown { fatal } => {
                self.teardown().await;
                if fatal {
                    if let Some(callback) = self.on_close.take() {
                        callback(self.controller.session());
                    }
                }
            }
        }
    }

    fn start_bridge(&mut self, uri: String, options: StartOptions) {
        let bridge = Arc::clone(&self.bridge);
        let tx = self.inputs_tx.clone();
        self.start_task = Some(tokio::spawn(async move {
            let input = match bridge.start(&uri, options).await {
                Ok(info) => Input::StartSucceeded(info),
                Err(e) => Input::StartFailed(e.to_string()),
            };
            let _ = tx.send(input);
        }));
    }

    async fn set_paused(&mut self, paused: bool) {
        if let Err(e) = self.renderer.set_paused(paused).await {
            warn!(error = %e, paused, "Renderer pause toggle failed");
        }
    }

    /// Timers only enqueue; the input is applied in queue order
    fn schedule(&mut self, after: Duration, input: Input) {
        self.timers.retain(|t| !t.is_finished());
        let tx = self.inputs_tx.clone();
        self.timers.push(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(input);
        }));
    }

    /// Release every resource once; later steps run even if earlier ones fail
    async fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        info!("Tearing down playback session");

        for mut subscription in self.subscriptions.drain(..) {
            subscription.release();
        }
        for timer in self.timers.drain(..) {
            timer.abort();
        }
        if let Some(task) = self.start_task.take() {
            task.abort();
        }

        if let Err(e) = self.bridge.stop().await {
            warn!(error = %e, "Bridge stop failed");
        }
        if let Err(e) = self.renderer.shutdown().await {
            warn!(error = %e, "Renderer shutdown failed");
        }
        self.publish();
    }
}

/// Client side of a running session
///
/// Dropping the handle closes the session.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Input>,
    state: watch::Receiver<PlaybackSession>,
    notices: Option<mpsc::UnboundedReceiver<Notice>>,
}

impl SessionHandle {
    /// Latest published session state
    pub fn snapshot(&self) -> PlaybackSession {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn watch(&self) -> watch::Receiver<PlaybackSession> {
        self.state.clone()
    }

    /// Notice stream; available once
    pub fn take_notices(&mut self) -> Option<mpsc::UnboundedReceiver<Notice>> {
        self.notices.take()
    }

    /// Queue a command; false once the runner has gone away
    pub fn send(&self, command: PlayerCommand) -> bool {
        self.commands.send(Input::Command(command)).is_ok()
    }

    pub fn toggle_play_pause(&self) -> bool {
        self.send(PlayerCommand::TogglePlayPause)
    }

    pub fn request_seek(&self, target_seconds: f64) -> bool {
        self.send(PlayerCommand::RequestSeek(target_seconds))
    }

    pub fn skip_back(&self, seconds: f64) -> bool {
        self.send(PlayerCommand::SkipBack(seconds))
    }

    pub fn close(&self) -> bool {
        self.send(PlayerCommand::Close)
    }

    /// Wait until the session reaches Closed
    pub async fn closed(&mut self) -> PlaybackSession {
        if self.state.wait_for(|s| s.state.is_closed()).await.is_err() {
            debug!("Session runner dropped before closing");
        }
        self.state.borrow().clone()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let _ = self.commands.send(Input::Command(PlayerCommand::Close));
    }
}
