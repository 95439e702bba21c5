//! Application service — the hexagonal core.
//!
//! [`StoryboxService`] owns the FSM, the gesture classifier, the LED
//! scheduler, and the housekeeping timers. It exposes a clean,
//! hardware-agnostic API. All I/O flows through port traits injected at
//! call sites, making the entire service testable with mock adapters.
//!
//! ```text
//!   InputPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!  CatalogPort ──▶│        StoryboxService        │
//!    AudioPort ◀──│  FSM · Gestures · LED sched   │
//!      LedPort ◀──└──────────────────────────────┘
//! ```
//!
//! Each control tick runs, in order: LED scheduler tick → gesture poll →
//! card-presence poll → housekeeping (volume, battery, idle timeout) →
//! playback-completion poll → FSM tick → side-effect application. That
//! ordering gives one iteration a well-defined priority: visual refresh,
//! then user input, then environmental input.

use std::mem;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::BoxConfig;
use crate::drivers::button::{ButtonEvent, GestureButton};
use crate::drivers::led_patterns::{LedPattern, LedPatternScheduler};
use crate::error::{ContentFault, InputFault};
use crate::fsm::context::{
    AudioAction, CardResolution, CardSession, FeedbackKind, FsmContext, InputSnapshot,
    ResolvedCard, SessionAction, SideEffects,
};
use crate::fsm::states::{build_state_table, led_card_invalid, led_card_valid};
use crate::fsm::{Fsm, StateId};
use crate::story::{CalmWindow, select_story};

use super::events::{AppEvent, ShutdownReason};
use super::ports::{AudioPort, CatalogPort, Clock, EventSink, InputPort, LedPort};

// ───────────────────────────────────────────────────────────────
// StoryboxService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct StoryboxService {
    fsm: Fsm,
    ctx: FsmContext,
    button: GestureButton,
    led: LedPatternScheduler,

    /// A resolved card not yet consumed by a state handler.
    pending_card: Option<CardResolution>,
    /// A gesture captured while pumping a feedback wait.
    pending_gesture: Option<ButtonEvent>,
    /// UID of the last rejected card — suppresses repeat error signatures
    /// while the same card sits on the reader.
    last_rejected_uid: Option<String>,

    // Housekeeping
    knob_level: f32,
    last_volume_poll: Option<Instant>,
    last_battery_poll: Option<Instant>,
    battery_low_latched: bool,
    last_story_start: Option<Instant>,
}

impl StoryboxService {
    /// Construct the service from configuration.
    ///
    /// Does **not** start the FSM — call [`start`](Self::start) next.
    pub fn new(config: BoxConfig) -> Self {
        let button = GestureButton::from_config(&config);
        let ctx = FsmContext::new(config);
        let fsm = Fsm::new(build_state_table(), StateId::Idle);

        Self {
            fsm,
            ctx,
            button,
            led: LedPatternScheduler::new(),
            pending_card: None,
            pending_gesture: None,
            last_rejected_uid: None,
            knob_level: 0.0,
            last_volume_poll: None,
            last_battery_poll: None,
            battery_low_latched: false,
            last_story_start: None,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the FSM in Idle, apply the initial volume, and light the LED.
    pub fn start(
        &mut self,
        now: Instant,
        hw: &mut (impl InputPort + LedPort),
        audio: &mut impl AudioPort,
        sink: &mut impl EventSink,
    ) {
        let knob = hw.read_volume_knob().clamp(0.0, 1.0);
        self.knob_level = knob;
        audio.set_volume(self.effective_volume(knob));

        self.fsm.start(&mut self.ctx);
        if let Some(p) = self.ctx.effects.led.take() {
            self.led.set_pattern(p);
        }
        self.ctx.effects = SideEffects::default();

        // Idle timeout is anchored at the last story start, or at boot if
        // nothing has played yet.
        self.last_story_start = Some(now);

        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!("service started in {:?}", self.fsm.current_state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle. Returns the (possibly new) state.
    ///
    /// The `hw` parameter satisfies **both** [`InputPort`] and [`LedPort`]
    /// — this avoids a double mutable borrow while keeping the port
    /// boundary explicit.
    pub fn tick(
        &mut self,
        now: Instant,
        hw: &mut (impl InputPort + LedPort),
        audio: &mut impl AudioPort,
        catalog: &impl CatalogPort,
        clock: &impl Clock,
        sink: &mut impl EventSink,
    ) -> StateId {
        // Terminal: keep animating the farewell pattern, process nothing.
        if self.fsm.current_state().is_terminal() {
            self.led.tick(now, hw);
            return StateId::ShuttingDown;
        }

        // 1. Visual refresh
        self.led.tick(now, hw);

        // 2. User input
        let gesture = self
            .pending_gesture
            .take()
            .or_else(|| self.button.poll(hw.raw_button_level(), now));

        // 3. Environmental input
        self.poll_card(hw, catalog, clock);

        // Low-frequency housekeeping
        self.poll_volume(now, hw, audio);
        let battery_critical = self.poll_battery(now, hw, sink);
        let idle_timeout = self.check_idle_timeout(now);

        // 4. Playback completion
        let playback_finished =
            self.fsm.current_state() == StateId::Playing && !audio.is_busy();

        // 5. FSM transition
        self.ctx.inputs = InputSnapshot {
            gesture,
            card: self.pending_card.take(),
            playback_finished,
            battery_critical,
            idle_timeout,
        };
        self.ctx.effects = SideEffects::default();
        let prev = self.fsm.current_state();
        self.fsm.tick(&mut self.ctx);
        // An unconsumed resolution is re-evaluated on the next tick.
        self.pending_card = self.ctx.inputs.card.take();

        // 6. Side effects
        self.apply_effects(now, hw, audio, catalog, clock, sink);

        let state = self.fsm.current_state();
        if state == StateId::ShuttingDown && prev != StateId::ShuttingDown {
            let reason = if gesture == Some(ButtonEvent::LongPress) {
                ShutdownReason::LongPress
            } else if battery_critical {
                ShutdownReason::BatteryCritical
            } else {
                ShutdownReason::IdleTimeout
            };
            sink.emit(&AppEvent::ShutdownRequested(reason));
        }
        if playback_finished && prev == StateId::Playing && state == StateId::Idle {
            sink.emit(&AppEvent::PlaybackFinished);
        }
        if state != prev {
            sink.emit(&AppEvent::StateChanged { from: prev, to: state });
        }
        state
    }

    // ── Queries ───────────────────────────────────────────────

    /// Current FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// The card session currently driving playback, if any.
    pub fn session(&self) -> Option<&CardSession> {
        self.ctx.session.as_ref()
    }

    /// The active LED pattern (for diagnostics and tests).
    pub fn active_led(&self) -> &LedPattern {
        self.led.active()
    }

    /// Clone of the live configuration.
    pub fn current_config(&self) -> BoxConfig {
        self.ctx.config.clone()
    }

    // ── Internal: input polling ───────────────────────────────

    /// Resolve a newly presented card against catalog + selection policy.
    /// Suppresses the card already playing, an already-pending resolution,
    /// and a card that was just rejected (until it leaves the reader).
    fn poll_card(
        &mut self,
        hw: &mut impl InputPort,
        catalog: &impl CatalogPort,
        clock: &impl Clock,
    ) {
        let Some(uid) = hw.read_uid() else {
            // Card removed — a rejected card may be re-tried when re-placed.
            self.last_rejected_uid = None;
            return;
        };

        if self.last_rejected_uid.as_deref() == Some(uid.as_str()) {
            return;
        }
        if self.ctx.session.as_ref().is_some_and(|s| s.uid == uid) {
            return;
        }
        if self.pending_card.as_ref().is_some_and(|c| c.uid() == uid) {
            return;
        }

        info!("card detected: {uid}");
        let resolution = self.resolve_card(uid, catalog, clock);
        self.pending_card = Some(resolution);
    }

    fn resolve_card(
        &self,
        uid: String,
        catalog: &impl CatalogPort,
        clock: &impl Clock,
    ) -> CardResolution {
        let Some(card) = catalog.load_card(&uid) else {
            return CardResolution::Invalid {
                uid,
                fault: ContentFault::CardNotFound,
            };
        };

        let window = CalmWindow {
            start_min: self.ctx.config.calm_start_min,
            end_min: self.ctx.config.calm_end_min,
        };
        let is_calm = window.is_calm(clock.minutes_of_day());

        match select_story(
            &card.stories,
            is_calm,
            &self.ctx.config.calm_tone,
            &mut rand::rng(),
        ) {
            Some(story) => {
                debug!(
                    "card {uid}: selected '{}' (tone {}, calm={is_calm})",
                    story.title, story.tone
                );
                CardResolution::Ready(ResolvedCard {
                    uid,
                    story: story.clone(),
                })
            }
            None => CardResolution::Invalid {
                uid,
                fault: ContentFault::NoStories,
            },
        }
    }

    fn effective_volume(&self, knob: f32) -> f32 {
        let cfg = &self.ctx.config;
        cfg.min_volume + knob * (cfg.max_volume - cfg.min_volume)
    }

    fn poll_volume(
        &mut self,
        now: Instant,
        hw: &mut impl InputPort,
        audio: &mut impl AudioPort,
    ) {
        let interval = self.ctx.config.volume_poll_interval_ms;
        let due = self
            .last_volume_poll
            .is_none_or(|t| now.duration_since(t).as_millis() as u64 >= interval);
        if !due {
            return;
        }
        self.last_volume_poll = Some(now);

        let raw = hw.read_volume_knob();
        if !raw.is_finite() {
            debug!("ignoring knob sample: {}", InputFault::KnobOutOfRange);
            return;
        }
        let knob = raw.clamp(0.0, 1.0);

        if (knob - self.knob_level).abs() > self.ctx.config.volume_epsilon {
            self.knob_level = knob;
            let effective = self.effective_volume(knob);
            audio.set_volume(effective);
            info!("volume set to {effective:.2} (knob {knob:.2})");
        }
    }

    /// Returns `true` when the battery is below the critical threshold.
    fn poll_battery(
        &mut self,
        now: Instant,
        hw: &mut impl InputPort,
        sink: &mut impl EventSink,
    ) -> bool {
        let interval = self.ctx.config.battery_poll_interval_ms;
        let due = self
            .last_battery_poll
            .is_none_or(|t| now.duration_since(t).as_millis() as u64 >= interval);
        if !due {
            return false;
        }
        self.last_battery_poll = Some(now);

        match hw.read_battery_volts() {
            None => {
                debug!("ignoring battery sample: {}", InputFault::BatteryReadFailed);
                false
            }
            Some(v) if v < self.ctx.config.battery_critical_volts => {
                warn!("battery critical at {v:.2} V, shutting down");
                true
            }
            Some(v) if v < self.ctx.config.battery_low_volts => {
                if !self.battery_low_latched {
                    self.battery_low_latched = true;
                    warn!("battery low at {v:.2} V");
                    sink.emit(&AppEvent::BatteryLow { volts: v });
                    // Distress signature, then back to the steady pattern.
                    self.led.set_pattern(LedPattern::Sos {
                        count: 1,
                        next: Some(Box::new(self.steady_pattern())),
                    });
                }
                false
            }
            Some(_) => {
                self.battery_low_latched = false;
                false
            }
        }
    }

    fn check_idle_timeout(&self, now: Instant) -> bool {
        let timeout = self.ctx.config.idle_timeout_secs;
        if timeout == 0 {
            return false;
        }
        self.last_story_start
            .is_some_and(|t| now.duration_since(t).as_secs() >= timeout)
    }

    /// The steady LED pattern for the current state.
    fn steady_pattern(&self) -> LedPattern {
        match self.fsm.current_state() {
            StateId::Playing => LedPattern::Solid,
            StateId::ShuttingDown => LedPattern::Off,
            _ => LedPattern::breathing(2500),
        }
    }

    // ── Internal: side-effect application ─────────────────────

    /// Drain the effects the handlers requested and apply them to the
    /// ports. Session changes are applied in the same pass as the audio
    /// command, so there is never a stale "card active" window.
    fn apply_effects(
        &mut self,
        now: Instant,
        hw: &mut (impl InputPort + LedPort),
        audio: &mut impl AudioPort,
        catalog: &impl CatalogPort,
        clock: &impl Clock,
        sink: &mut impl EventSink,
    ) {
        let mut fx = mem::take(&mut self.ctx.effects);

        match mem::take(&mut fx.session) {
            SessionAction::Set(s) => self.ctx.session = Some(s),
            SessionAction::Clear => self.ctx.session = None,
            SessionAction::Keep => {}
        }

        if let Some(action) = fx.audio.take() {
            match action {
                AudioAction::Pause => audio.pause(),
                AudioAction::Resume => audio.resume(),
                AudioAction::Stop => audio.stop(),
                AudioAction::Start(rc) => {
                    if audio.play_narration_with_bgm(&rc.story.audio, &rc.story.tone) {
                        self.last_story_start = Some(now);
                        sink.emit(&AppEvent::CardAccepted {
                            uid: rc.uid,
                            title: rc.story.title,
                        });
                    } else {
                        warn!("playback start failed for '{}'", rc.story.title);
                        self.degrade_to_idle(&mut fx, rc.uid, ContentFault::MissingAudio);
                    }
                }
            }
        }

        if fx.reselect {
            self.reselect_story(now, &mut fx, audio, catalog, clock, sink);
        }

        if let Some((uid, fault)) = fx.rejected.take() {
            self.last_rejected_uid = Some(uid.clone());
            sink.emit(&AppEvent::CardRejected { uid, fault });
        }

        // Forced transitions above may have left enter-handler LED defaults
        // behind; an explicit pattern from the transition wins over those.
        let late = mem::take(&mut self.ctx.effects);
        if let Some(pattern) = fx.led.or(late.led) {
            self.led.set_pattern(pattern);
        }

        // LED first, then the chime: the signature animates during the
        // bounded wait below.
        if let Some(kind) = fx.feedback {
            audio.play_feedback(kind);
            self.wait_for_feedback(hw, &*audio);
        }
    }

    /// Stop-and-reselect for the card already on the reader (double tap).
    fn reselect_story(
        &mut self,
        now: Instant,
        fx: &mut SideEffects,
        audio: &mut impl AudioPort,
        catalog: &impl CatalogPort,
        clock: &impl Clock,
        sink: &mut impl EventSink,
    ) {
        let Some(uid) = self.ctx.session.as_ref().map(|s| s.uid.clone()) else {
            return;
        };

        match self.resolve_card(uid, catalog, clock) {
            CardResolution::Ready(rc) => {
                if audio.play_narration_with_bgm(&rc.story.audio, &rc.story.tone) {
                    self.last_story_start = Some(now);
                    self.ctx.session = Some(CardSession {
                        uid: rc.uid.clone(),
                        story: rc.story.clone(),
                    });
                    fx.led = Some(led_card_valid());
                    sink.emit(&AppEvent::CardAccepted {
                        uid: rc.uid,
                        title: rc.story.title,
                    });
                    self.fsm.force_transition(StateId::Playing, &mut self.ctx);
                } else {
                    warn!("reselect failed to start '{}'", rc.story.title);
                    self.degrade_to_idle(fx, rc.uid, ContentFault::MissingAudio);
                }
            }
            CardResolution::Invalid { uid, fault } => {
                warn!("reselect for card {uid} failed: {fault}");
                self.degrade_to_idle(fx, uid, fault);
            }
        }
    }

    /// Shared ContentFault degrade path: clear the session, fall back to
    /// Idle, and queue the error signature + chime.
    fn degrade_to_idle(&mut self, fx: &mut SideEffects, uid: String, fault: ContentFault) {
        self.ctx.session = None;
        self.fsm.force_transition(StateId::Idle, &mut self.ctx);
        fx.feedback = Some(FeedbackKind::CardError);
        fx.led = Some(led_card_invalid());
        fx.rejected = Some((uid, fault));
    }

    /// Bounded wait for a short acknowledgement sound, pumping the LED
    /// scheduler and the gesture poll so input is not silently dropped.
    /// Abandoned once the cap elapses.
    fn wait_for_feedback(
        &mut self,
        hw: &mut (impl InputPort + LedPort),
        audio: &impl AudioPort,
    ) {
        let cap = Duration::from_millis(self.ctx.config.feedback_wait_ms);
        let started = Instant::now();
        while audio.is_busy() && started.elapsed() < cap {
            let now = Instant::now();
            self.led.tick(now, hw);
            if let Some(ev) = self.button.poll(hw.raw_button_level(), now) {
                // Buffered; consumed at the start of the next tick.
                self.pending_gesture.get_or_insert(ev);
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}
