//! Playback Controller Tests
//!
//! Properties of the session state machine over generated input sequences,
//! plus configuration-driven behavior.

use std::time::{Duration, Instant};

use proptest::prelude::*;

use flickstream::config::PlaybackConfig;
use flickstream::models::{PlaybackState, RawTelemetry};
use flickstream::playback::{
    BridgeFault, Effect, FaultClassifier, Input, PlaybackSessionController, PlayerCommand,
    RendererEvent, StreamInfo,
};

const URI: &str = "magnet:?xt=urn:btih:abc";

fn started(config: PlaybackConfig) -> (PlaybackSessionController, Instant) {
    let mut c = PlaybackSessionController::new(URI, config);
    let now = Instant::now();
    c.handle(Input::StartRequested, now);
    c.handle(
        Input::StartSucceeded(StreamInfo {
            url: "http://127.0.0.1:8888/0".to_string(),
            file_size: Some(4 << 30),
        }),
        now,
    );
    (c, now)
}

// =============================================================================
// Strategies
// =============================================================================

fn telemetry_strategy() -> impl Strategy<Value = Input> {
    (
        0.0..=100.0f64,
        // Full windows are common in practice
        prop_oneof![Just(100.0), 0.0..=100.0f64],
        0u32..5_000_000,
        0u32..50,
    )
        .prop_map(|(progress, buffer, rate, seeds)| {
            Input::Telemetry(RawTelemetry::new(progress, buffer, f64::from(rate), seeds))
        })
}

fn seek_target_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        8 => 0.0..7200.0f64,
        1 => Just(1e300),
        1 => Just(f64::MAX),
    ]
}

fn input_strategy() -> impl Strategy<Value = Input> {
    prop_oneof![
        4 => telemetry_strategy(),
        2 => (0.0..7200.0f64).prop_map(|p| Input::Renderer(RendererEvent::Progress(p))),
        1 => (1.0..7200.0f64).prop_map(|d| Input::Renderer(RendererEvent::Load(d))),
        1 => any::<bool>().prop_map(|b| Input::Renderer(RendererEvent::Buffer(b))),
        1 => Just(Input::Renderer(RendererEvent::Error("demux error".to_string()))),
        1 => Just(Input::Command(PlayerCommand::TogglePlayPause)),
        2 => seek_target_strategy().prop_map(|t| Input::Command(PlayerCommand::RequestSeek(t))),
        1 => (0.0..600.0f64).prop_map(|s| Input::Command(PlayerCommand::SkipBack(s))),
        1 => (0.0..7200.0f64).prop_map(|target| Input::CorrectiveSeek { target }),
        1 => Just(Input::Tick),
    ]
}

fn inputs(max: usize) -> impl Strategy<Value = Vec<Input>> {
    prop::collection::vec(input_strategy(), 1..max)
}

fn is_user_seek(input: &Input) -> bool {
    matches!(
        input,
        Input::Command(PlayerCommand::RequestSeek(_) | PlayerCommand::SkipBack(_))
    )
}

// =============================================================================
// Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Test: Progress never decreases while the session is active
    #[test]
    fn prop_progress_is_monotonic(sequence in inputs(300)) {
        let (mut c, start) = started(PlaybackConfig::default());
        let mut last = 0.0;

        for (step, input) in sequence.into_iter().enumerate() {
            let now = start + Duration::from_millis(step as u64 * 137);
            c.handle(input, now);
            let progress = c.session().progress_percent;
            prop_assert!(progress >= last);
            prop_assert!((0.0..=100.0).contains(&progress));
            last = progress;
        }
    }

    /// Test: No user seek reaches the renderer below the unlock threshold
    #[test]
    fn prop_no_seek_below_unlock_threshold(sequence in inputs(300)) {
        let (mut c, start) = started(PlaybackConfig::default());

        for (step, input) in sequence.into_iter().enumerate() {
            let now = start + Duration::from_millis(step as u64 * 137);
            let user_seek = is_user_seek(&input);
            let effects = c.handle(input, now);
            if user_seek && c.session().progress_percent < 95.0 {
                prop_assert!(!effects.iter().any(|e| matches!(e, Effect::Seek(_))));
            }
        }
    }

    /// Test: Forwarded seeks stay within the known playable range
    #[test]
    fn prop_seek_targets_are_bounded(sequence in inputs(300)) {
        let config = PlaybackConfig {
            seek_unlock_percent: 0.0,
            ..Default::default()
        };
        let (mut c, start) = started(config);

        for (step, input) in sequence.into_iter().enumerate() {
            let now = start + Duration::from_millis(step as u64 * 137);
            let user_seek = is_user_seek(&input);
            let position_before = c.session().current_position_seconds;
            let effects = c.handle(input, now);

            let session = c.session();
            prop_assert!(session.current_position_seconds.is_finite());
            // Formatting the snapshot must never panic
            prop_assert!(!session.to_string().is_empty());

            if user_seek {
                for effect in &effects {
                    if let Effect::Seek(target) = effect {
                        let upper = session.duration_seconds.unwrap_or(position_before);
                        prop_assert!(*target >= 0.0 && *target <= upper);
                    }
                }
            }
        }
    }

    /// Test: Buffering hands over to Playing only with a full window and the floor reached
    #[test]
    fn prop_playback_starts_only_when_ready(sequence in inputs(200)) {
        let (mut c, start) = started(PlaybackConfig::default());

        for (step, input) in sequence.into_iter().enumerate() {
            let now = start + Duration::from_millis(step as u64 * 600);
            let before = c.state();
            let effects = c.handle(input, now);
            if effects.iter().any(|e| matches!(e, Effect::LoadRenderer { .. })) {
                prop_assert_eq!(before, PlaybackState::Buffering);
                prop_assert!(c.session().buffer_percent >= 100.0);
                prop_assert!(c.session().progress_percent >= 5.0);
            }
        }
    }

    /// Test: Closed absorbs every later input without effects
    #[test]
    fn prop_closed_is_absorbing(before in inputs(50), after in inputs(200)) {
        let (mut c, now) = started(PlaybackConfig::default());
        for input in before {
            c.handle(input, now);
        }
        if !c.is_closed() {
            let effects = c.handle(Input::Command(PlayerCommand::Close), now);
            prop_assert_eq!(effects, vec![Effect::Teardown { fatal: false }]);
        }

        for input in after {
            prop_assert!(c.handle(input, now).is_empty());
            prop_assert_eq!(c.state(), PlaybackState::Closed);
        }
        prop_assert!(c
            .handle(Input::Renderer(RendererEvent::Error("boom".into())), now)
            .is_empty());
        prop_assert!(c.handle(Input::StartFailed("late".into()), now).is_empty());
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Test: Custom fault markers decide what counts as a seek fault
#[test]
fn test_custom_fault_markers() {
    let (mut c, now) = started(PlaybackConfig::default());
    c = c.with_classifier(FaultClassifier::new(["cache underrun"]));
    c.handle(
        Input::Telemetry(RawTelemetry::new(10.0, 100.0, 0.0, 1)),
        now,
    );
    assert_eq!(c.state(), PlaybackState::Playing);

    c.handle(
        Input::Renderer(RendererEvent::Error("Cache Underrun at 00:12".into())),
        now,
    );
    assert_eq!(c.state(), PlaybackState::Recovering);

    let effects = c.handle(
        Input::Renderer(RendererEvent::Error("demuxer failure".into())),
        now,
    );
    assert_eq!(c.state(), PlaybackState::Closed);
    assert!(effects.contains(&Effect::Teardown { fatal: true }));
}

/// Test: Lower unlock threshold from config allows earlier seeks
#[test]
fn test_configured_unlock_threshold() {
    let config = PlaybackConfig {
        seek_unlock_percent: 50.0,
        ..Default::default()
    };
    let (mut c, now) = started(config);
    c.handle(
        Input::Telemetry(RawTelemetry::new(60.0, 100.0, 0.0, 1)),
        now,
    );
    c.handle(Input::Renderer(RendererEvent::Load(5400.0)), now);
    let effects = c.handle(Input::Command(PlayerCommand::RequestSeek(120.0)), now);
    assert!(effects.contains(&Effect::Seek(120.0)));
}

/// Test: Retry budget of zero gives up on the first seek fault
#[test]
fn test_zero_seek_retries() {
    let config = PlaybackConfig {
        max_seek_retries: 0,
        ..Default::default()
    };
    let (mut c, now) = started(config);
    c.handle(
        Input::Telemetry(RawTelemetry::new(10.0, 100.0, 0.0, 1)),
        now,
    );
    let effects = c.handle(
        Input::Renderer(RendererEvent::Error("seek failed".into())),
        now,
    );
    assert!(!effects
        .iter()
        .any(|e| matches!(e, Effect::ScheduleCorrectiveSeek { .. })));
    assert_eq!(c.state(), PlaybackState::Playing);
}

/// Test: Bridge faults surface as warnings in every state
#[test]
fn test_bridge_fault_during_buffering() {
    let (mut c, now) = started(PlaybackConfig::default());
    let effects = c.handle(Input::BridgeFault(BridgeFault { msg: String::new() }), now);
    assert_eq!(c.state(), PlaybackState::Buffering);
    match &effects[..] {
        [Effect::Notify(notice)] => {
            assert!(!notice.is_fatal());
            assert_eq!(notice.message, "Failed to stream torrent");
        }
        other => panic!("unexpected effects {:?}", other),
    }
}
