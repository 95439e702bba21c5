//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that state handlers read from and
//! write to. It carries the per-tick input snapshot (classified gesture,
//! pre-resolved card, playback/battery/timeout flags), the side effects the
//! handlers request, the active card session, and the configuration.
//! Think of it as the "blackboard" in a blackboard architecture.
//!
//! Handlers stay pure: they never talk to the audio engine or LED driver
//! directly. They write [`SideEffects`], and the service applies those to
//! the ports after the tick — which is what keeps audio and LED changes in
//! the same transition, and session clearing atomic with the audio stop.

use crate::config::BoxConfig;
use crate::drivers::button::ButtonEvent;
use crate::drivers::led_patterns::LedPattern;
use crate::error::ContentFault;
use crate::story::Story;

// ---------------------------------------------------------------------------
// Card resolution (computed by the service before the FSM tick)
// ---------------------------------------------------------------------------

/// A card UID resolved against the catalog and the selection policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCard {
    pub uid: String,
    pub story: Story,
}

/// Outcome of resolving a freshly presented card.
#[derive(Debug, Clone, PartialEq)]
pub enum CardResolution {
    /// A playable story was selected.
    Ready(ResolvedCard),
    /// The card exists but nothing can be played from it.
    Invalid { uid: String, fault: ContentFault },
}

impl CardResolution {
    pub fn uid(&self) -> &str {
        match self {
            Self::Ready(rc) => &rc.uid,
            Self::Invalid { uid, .. } => uid,
        }
    }
}

// ---------------------------------------------------------------------------
// Input snapshot (read-only to state handlers; written by the service)
// ---------------------------------------------------------------------------

/// A point-in-time snapshot of every input the FSM branches on.
#[derive(Debug, Clone, Default)]
pub struct InputSnapshot {
    /// Classified gesture from this tick, if any.
    pub gesture: Option<ButtonEvent>,
    /// A newly presented card, already resolved. Consumed by the handler
    /// that acts on it; an unconsumed resolution is carried to the next
    /// tick by the service.
    pub card: Option<CardResolution>,
    /// The audio engine reported idle while we believed we were playing.
    pub playback_finished: bool,
    /// Battery below the critical threshold — treated like a long press.
    pub battery_critical: bool,
    /// The configured idle timeout since the last story start elapsed.
    pub idle_timeout: bool,
}

// ---------------------------------------------------------------------------
// Side effects (written by state handlers; applied by the service)
// ---------------------------------------------------------------------------

/// Audio engine action requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioAction {
    /// Start crossfade playback of the resolved story.
    Start(ResolvedCard),
    Pause,
    Resume,
    Stop,
}

/// Feedback chime kinds, each with a distinct sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackKind {
    /// Card invalid / content missing.
    CardError,
    /// Shutdown farewell.
    Shutdown,
}

/// What should happen to the card session in this transition.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionAction {
    #[default]
    Keep,
    Set(CardSession),
    Clear,
}

/// Effects a handler requests for this tick. The service drains this after
/// the FSM tick and applies everything in one pass.
#[derive(Debug, Default)]
pub struct SideEffects {
    pub audio: Option<AudioAction>,
    pub led: Option<LedPattern>,
    pub feedback: Option<FeedbackKind>,
    pub session: SessionAction,
    /// Stop the current story and pick a fresh one for the same card.
    pub reselect: bool,
    /// A card was rejected — emit the event and latch the UID so the error
    /// signature fires once, not every tick the card sits on the reader.
    pub rejected: Option<(String, ContentFault)>,
}

// ---------------------------------------------------------------------------
// Card session
// ---------------------------------------------------------------------------

/// The card currently driving playback.
#[derive(Debug, Clone, PartialEq)]
pub struct CardSession {
    pub uid: String,
    pub story: Story,
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext {
    // -- Timing --
    /// Ticks elapsed since the current state was entered.
    pub ticks_in_state: u64,
    /// Monotonic total tick count.
    pub total_ticks: u64,
    /// Duration of one tick in seconds (inverse of control loop frequency).
    pub tick_period_secs: f32,

    // -- Inputs --
    /// Latest input snapshot. Updated before each FSM tick.
    pub inputs: InputSnapshot,

    // -- Outputs --
    /// Effects to be applied to collaborators after the FSM tick.
    pub effects: SideEffects,

    // -- Session --
    /// Exactly one active card session, or none.
    pub session: Option<CardSession>,

    // -- Configuration --
    pub config: BoxConfig,
}

impl FsmContext {
    /// Create a new context with the given configuration.
    pub fn new(config: BoxConfig) -> Self {
        Self {
            ticks_in_state: 0,
            total_ticks: 0,
            tick_period_secs: config.tick_interval_ms as f32 / 1000.0,
            inputs: InputSnapshot::default(),
            effects: SideEffects::default(),
            session: None,
            config,
        }
    }

    /// Seconds elapsed since the current state was entered.
    pub fn secs_in_state(&self) -> f32 {
        self.ticks_in_state as f32 * self.tick_period_secs
    }

    /// True if any shutdown trigger is present this tick.
    pub fn shutdown_requested(&self) -> bool {
        self.inputs.gesture == Some(ButtonEvent::LongPress)
            || self.inputs.battery_critical
            || self.inputs.idle_timeout
    }
}
