//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ StoryboxService (domain)
//! ```
//!
//! Driven adapters (tag reader, button line, audio engine, LED driver, card
//! catalog, clock) implement these traits. The
//! [`StoryboxService`](super::service::StoryboxService) consumes them via
//! generics, so the domain core never touches hardware directly.
//!
//! Audio decoding/mixing, GPIO bootstrap and card-file storage all live on
//! the far side of these traits; the core treats them as black boxes with
//! simple synchronous calls.

use std::path::Path;
use std::sync::Arc;

use crate::story::CardData;

pub use crate::fsm::context::FeedbackKind;

// ───────────────────────────────────────────────────────────────
// Input port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for every physical input on the box.
pub trait InputPort {
    /// Poll the tag reader. Non-blocking; `None` when no tag is present.
    fn read_uid(&mut self) -> Option<String>;

    /// Raw (un-debounced) button line level; `true` = pressed.
    fn raw_button_level(&mut self) -> bool;

    /// Volume knob position in `[0, 1]`.
    fn read_volume_knob(&mut self) -> f32;

    /// Battery voltage, or `None` if the ADC read failed.
    fn read_battery_volts(&mut self) -> Option<f32>;
}

// ───────────────────────────────────────────────────────────────
// LED port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the button LED.
pub trait LedPort {
    /// Hard on/off (square patterns).
    fn set_led(&mut self, on: bool);

    /// PWM duty in `[0, 100]` (analog patterns).
    fn set_pwm_duty(&mut self, duty: f32);
}

// ───────────────────────────────────────────────────────────────
// Audio port (driven adapter: domain → audio engine)
// ───────────────────────────────────────────────────────────────

/// The audio engine behind a synchronous facade. Crossfading narration
/// over the tone-matched background loop is the engine's business; the
/// core only starts, pauses, resumes and stops.
pub trait AudioPort {
    /// Begin crossfade playback of `narration` over the BGM for `tone`.
    /// Returns `false` if playback could not start (missing BGM, decoder
    /// error) — the caller degrades with error feedback.
    fn play_narration_with_bgm(&mut self, narration: &Path, tone: &str) -> bool;

    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);

    /// `true` while narration or BGM is audible (or paused mid-story).
    fn is_busy(&self) -> bool;

    /// Play a short feedback chime.
    fn play_feedback(&mut self, kind: FeedbackKind);

    /// Set the software master volume in `[0, 1]`.
    fn set_volume(&mut self, level: f32);
}

// ───────────────────────────────────────────────────────────────
// Card catalog port (driven adapter: domain ↔ card storage)
// ───────────────────────────────────────────────────────────────

/// Card lookup. A returned card always has at least one playable story;
/// every failure mode (missing file, bad JSON, empty story list) is `None`
/// with the detail logged by the implementation.
pub trait CatalogPort {
    fn load_card(&self, uid: &str) -> Option<Arc<CardData>>;
}

// ───────────────────────────────────────────────────────────────
// Clock port (calm-window evaluation)
// ───────────────────────────────────────────────────────────────

/// Wall-clock source for the calm window. Kept behind a trait so tests and
/// the simulator can pin the time of day.
pub trait Clock {
    /// Minutes after local midnight (0–1439).
    fn minutes_of_day(&self) -> u16;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go (log, test recorder,
/// a future display).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}
