//! End-to-end scenarios: card taps, gestures, battery, and shutdown, all
//! driven through the public service API against mock ports.

use std::time::{Duration, Instant};

use storybox::adapters::time::FixedClock;
use storybox::app::events::{AppEvent, ShutdownReason};
use storybox::app::ports::FeedbackKind;
use storybox::app::service::StoryboxService;
use storybox::config::BoxConfig;
use storybox::drivers::led_patterns::LedPattern;
use storybox::error::ContentFault;
use storybox::fsm::StateId;

use crate::mock_hw::{story, MockAudio, MockBoard, MockCatalog, RecordingSink};

const TICK_MS: u64 = 50;

struct Harness {
    service: StoryboxService,
    board: MockBoard,
    audio: MockAudio,
    catalog: MockCatalog,
    clock: FixedClock,
    sink: RecordingSink,
    t: Instant,
}

impl Harness {
    fn new(catalog: MockCatalog, clock: FixedClock) -> Self {
        Self::with_config(catalog, clock, BoxConfig::default())
    }

    fn with_config(catalog: MockCatalog, clock: FixedClock, config: BoxConfig) -> Self {
        let mut service = StoryboxService::new(config);
        let mut board = MockBoard::new();
        let mut audio = MockAudio::new();
        let mut sink = RecordingSink::new();
        let t = Instant::now();
        service.start(t, &mut board, &mut audio, &mut sink);
        Self {
            service,
            board,
            audio,
            catalog,
            clock,
            sink,
            t,
        }
    }

    /// Advance simulated time in control-tick steps.
    fn run_ms(&mut self, ms: u64) {
        for _ in 0..(ms / TICK_MS) {
            self.t += Duration::from_millis(TICK_MS);
            self.service.tick(
                self.t,
                &mut self.board,
                &mut self.audio,
                &self.catalog,
                &self.clock,
                &mut self.sink,
            );
        }
    }

    fn tap(&mut self) {
        self.board.button = true;
        self.run_ms(150);
        self.board.button = false;
        self.run_ms(700);
    }

    fn double_tap(&mut self) {
        self.board.button = true;
        self.run_ms(150);
        self.board.button = false;
        self.run_ms(100);
        self.board.button = true;
        self.run_ms(150);
        self.board.button = false;
        self.run_ms(700);
    }

    fn long_press(&mut self) {
        self.board.button = true;
        self.run_ms(1750);
        self.board.button = false;
        self.run_ms(200);
    }
}

fn mixed_catalog() -> MockCatalog {
    MockCatalog::new().with_card(
        "000001",
        vec![story("pirates", "avventuroso"), story("moon", "calmo")],
    )
}

const MIDDAY: FixedClock = FixedClock(12 * 60);
const EVENING: FixedClock = FixedClock(22 * 60);

// ── Scenario A: valid card starts playback exactly once ──────

#[test]
fn valid_card_transitions_to_playing_with_one_play_call() {
    let mut h = Harness::new(mixed_catalog(), MIDDAY);
    assert_eq!(h.service.state(), StateId::Idle);

    h.board.uid = Some("000001".into());
    h.run_ms(50);

    assert_eq!(h.service.state(), StateId::Playing);
    assert_eq!(h.audio.play_count(), 1);
    assert!(
        matches!(h.service.active_led(), LedPattern::Success { .. }),
        "card-valid LED sequence expected, got {:?}",
        h.service.active_led()
    );
    assert!(h.sink.contains(|e| matches!(e, AppEvent::CardAccepted { uid, .. } if uid == "000001")));
    assert!(h.sink.contains(|e| matches!(
        e,
        AppEvent::StateChanged { from: StateId::Idle, to: StateId::Playing }
    )));

    // The card stays on the reader — playback must not restart.
    h.run_ms(500);
    assert_eq!(h.audio.play_count(), 1);
    assert!(
        !h.board.led_calls.is_empty(),
        "LED must be driven every tick"
    );
}

#[test]
fn selection_respects_the_calm_window_end_to_end() {
    let mut h = Harness::new(mixed_catalog(), EVENING);
    h.board.uid = Some("000001".into());
    h.run_ms(50);
    assert_eq!(h.audio.last_play_tone(), Some("calmo"));

    let mut h = Harness::new(mixed_catalog(), MIDDAY);
    h.board.uid = Some("000001".into());
    h.run_ms(50);
    assert_eq!(h.audio.last_play_tone(), Some("avventuroso"));
}

// ── Scenario B: tap pauses and resumes ───────────────────────

#[test]
fn tap_pauses_then_resumes() {
    let mut h = Harness::new(mixed_catalog(), MIDDAY);
    h.board.uid = Some("000001".into());
    h.run_ms(50);
    assert_eq!(h.service.state(), StateId::Playing);

    h.tap();
    assert_eq!(h.service.state(), StateId::Paused);
    assert_eq!(h.audio.pause_count(), 1);
    assert!(matches!(h.service.active_led(), LedPattern::Breathing { .. }));

    h.tap();
    assert_eq!(h.service.state(), StateId::Playing);
    assert_eq!(h.audio.resume_count(), 1);
    assert_eq!(*h.service.active_led(), LedPattern::Solid);
}

// ── Scenario C: empty card degrades with exactly one error ───

#[test]
fn empty_card_fires_error_feedback_once() {
    let catalog = MockCatalog::new().with_empty_card("000002");
    let mut h = Harness::new(catalog, MIDDAY);

    h.board.uid = Some("000002".into());
    h.run_ms(50);

    assert_eq!(h.service.state(), StateId::Idle);
    assert_eq!(h.audio.play_count(), 0);
    assert_eq!(h.audio.feedback_count(FeedbackKind::CardError), 1);
    assert!(matches!(h.service.active_led(), LedPattern::Error { .. }));
    assert!(h.sink.contains(|e| matches!(
        e,
        AppEvent::CardRejected { fault: ContentFault::NoStories, .. }
    )));

    // Card keeps sitting on the reader: no repeat signature.
    h.run_ms(1000);
    assert_eq!(h.audio.feedback_count(FeedbackKind::CardError), 1);

    // Removing and re-presenting it retries (and fails again, audibly).
    h.board.uid = None;
    h.run_ms(100);
    h.board.uid = Some("000002".into());
    h.run_ms(100);
    assert_eq!(h.audio.feedback_count(FeedbackKind::CardError), 2);
}

#[test]
fn unknown_card_is_rejected() {
    let mut h = Harness::new(MockCatalog::new(), MIDDAY);
    h.board.uid = Some("deadbeef".into());
    h.run_ms(50);
    assert_eq!(h.service.state(), StateId::Idle);
    assert!(h.sink.contains(|e| matches!(
        e,
        AppEvent::CardRejected { fault: ContentFault::CardNotFound, .. }
    )));
}

// ── Scenario D: long press shuts down and freezes processing ─

#[test]
fn long_press_shuts_down_and_stops_processing() {
    let mut h = Harness::new(mixed_catalog(), MIDDAY);
    h.board.uid = Some("000001".into());
    h.run_ms(50);
    assert_eq!(h.service.state(), StateId::Playing);

    h.long_press();
    assert_eq!(h.service.state(), StateId::ShuttingDown);
    assert!(h.audio.stop_count() >= 1);
    assert_eq!(h.audio.feedback_count(FeedbackKind::Shutdown), 1);
    assert!(h.sink.contains(|e| matches!(
        e,
        AppEvent::ShutdownRequested(ShutdownReason::LongPress)
    )));

    // No further gesture or card processing.
    let plays = h.audio.play_count();
    let pauses = h.audio.pause_count();
    h.board.uid = Some("000001".into());
    h.tap();
    h.run_ms(500);
    assert_eq!(h.service.state(), StateId::ShuttingDown);
    assert_eq!(h.audio.play_count(), plays);
    assert_eq!(h.audio.pause_count(), pauses);
}

// ── Natural finish ───────────────────────────────────────────

#[test]
fn natural_finish_returns_to_idle_and_clears_session() {
    let mut h = Harness::new(mixed_catalog(), MIDDAY);
    h.board.uid = Some("000001".into());
    h.run_ms(50);
    assert!(h.service.session().is_some());

    h.board.uid = None; // card taken off the reader
    h.audio.busy = false; // engine reports idle
    h.run_ms(50);

    assert_eq!(h.service.state(), StateId::Idle);
    assert!(h.service.session().is_none());
    assert!(matches!(h.service.active_led(), LedPattern::Fadeout { .. }));
    assert!(h.sink.contains(|e| matches!(e, AppEvent::PlaybackFinished)));
}

// ── Double tap: re-entrant restart for the same card ─────────

#[test]
fn double_tap_reselects_and_restarts() {
    let mut h = Harness::new(mixed_catalog(), MIDDAY);
    h.board.uid = Some("000001".into());
    h.run_ms(50);
    assert_eq!(h.audio.play_count(), 1);

    h.double_tap();
    assert_eq!(h.service.state(), StateId::Playing);
    assert!(h.audio.stop_count() >= 1);
    assert_eq!(h.audio.play_count(), 2);
    assert!(h.service.session().is_some());
}

// ── New card replaces the current session ────────────────────

#[test]
fn new_card_while_playing_switches_sessions() {
    let catalog = mixed_catalog().with_card("000002", vec![story("circus", "divertente")]);
    let mut h = Harness::new(catalog, MIDDAY);
    h.board.uid = Some("000001".into());
    h.run_ms(50);
    assert_eq!(h.service.session().unwrap().uid, "000001");

    h.board.uid = Some("000002".into());
    h.run_ms(100); // stop + re-evaluate, then fresh start

    assert_eq!(h.service.state(), StateId::Playing);
    assert_eq!(h.service.session().unwrap().uid, "000002");
    assert!(h.audio.stop_count() >= 1);
    assert_eq!(h.audio.play_count(), 2);
}

#[test]
fn new_card_while_paused_switches_sessions() {
    let catalog = mixed_catalog().with_card("000002", vec![story("circus", "divertente")]);
    let mut h = Harness::new(catalog, MIDDAY);
    h.board.uid = Some("000001".into());
    h.run_ms(50);
    h.tap();
    assert_eq!(h.service.state(), StateId::Paused);

    h.board.uid = Some("000002".into());
    h.run_ms(100);
    assert_eq!(h.service.state(), StateId::Playing);
    assert_eq!(h.service.session().unwrap().uid, "000002");
}

// ── Playback start failure degrades to Idle ──────────────────

#[test]
fn failed_playback_start_degrades_to_idle() {
    let mut h = Harness::new(mixed_catalog(), MIDDAY);
    h.audio.accept_play = false;
    h.board.uid = Some("000001".into());
    h.run_ms(50);

    assert_eq!(h.service.state(), StateId::Idle);
    assert!(h.service.session().is_none());
    assert_eq!(h.audio.feedback_count(FeedbackKind::CardError), 1);
    assert!(h.sink.contains(|e| matches!(e, AppEvent::CardRejected { .. })));
}

// ── Battery ──────────────────────────────────────────────────

#[test]
fn critical_battery_forces_shutdown() {
    let mut h = Harness::new(mixed_catalog(), MIDDAY);
    h.board.battery = Some(3.0);
    h.run_ms(50);
    assert_eq!(h.service.state(), StateId::ShuttingDown);
    assert!(h.sink.contains(|e| matches!(
        e,
        AppEvent::ShutdownRequested(ShutdownReason::BatteryCritical)
    )));
}

#[test]
fn low_battery_warns_once_with_distress_signature() {
    let mut h = Harness::new(mixed_catalog(), MIDDAY);
    h.board.battery = Some(3.4);
    h.run_ms(50);

    assert_eq!(h.service.state(), StateId::Idle);
    assert!(matches!(h.service.active_led(), LedPattern::Sos { .. }));
    let low_events = |h: &Harness| {
        h.sink
            .events
            .iter()
            .filter(|e| matches!(e, AppEvent::BatteryLow { .. }))
            .count()
    };
    assert_eq!(low_events(&h), 1);

    // Still low at the next poll — no duplicate warning.
    h.run_ms(10_050);
    assert_eq!(low_events(&h), 1);
}

// ── Idle timeout ─────────────────────────────────────────────

#[test]
fn idle_timeout_triggers_shutdown() {
    let config = BoxConfig {
        idle_timeout_secs: 2,
        ..BoxConfig::default()
    };
    let mut h = Harness::with_config(mixed_catalog(), MIDDAY, config);
    h.run_ms(2100);
    assert_eq!(h.service.state(), StateId::ShuttingDown);
    assert!(h.sink.contains(|e| matches!(
        e,
        AppEvent::ShutdownRequested(ShutdownReason::IdleTimeout)
    )));
}

#[test]
fn zero_idle_timeout_disables_the_feature() {
    let config = BoxConfig {
        idle_timeout_secs: 0,
        ..BoxConfig::default()
    };
    let mut h = Harness::with_config(mixed_catalog(), MIDDAY, config);
    h.run_ms(3000);
    assert_eq!(h.service.state(), StateId::Idle);
}

// ── Volume knob ──────────────────────────────────────────────

#[test]
fn knob_movement_rescales_software_volume() {
    use crate::mock_hw::AudioCall;

    let mut h = Harness::new(mixed_catalog(), MIDDAY);
    h.run_ms(300);
    h.board.knob = 0.9;
    h.run_ms(250);

    let last = h
        .audio
        .calls
        .iter()
        .rev()
        .find_map(|c| match c {
            AudioCall::SetVolume(v) => Some(*v),
            _ => None,
        })
        .expect("volume should have been set");
    // 0.1 + 0.9 * (0.9 - 0.1)
    assert!((last - 0.82).abs() < 0.001, "got {last}");
}

#[test]
fn tiny_knob_jitter_is_ignored() {
    use crate::mock_hw::AudioCall;

    let mut h = Harness::new(mixed_catalog(), MIDDAY);
    h.run_ms(300);
    let baseline = h.audio.calls.len();
    h.board.knob = 0.505; // within epsilon of the 0.5 start position
    h.run_ms(500);
    let sets = h.audio.calls[baseline..]
        .iter()
        .filter(|c| matches!(c, AudioCall::SetVolume(_)))
        .count();
    assert_eq!(sets, 0);
}
