//! Unified error types for the storybox firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! top-level control loop's error handling uniform. Recoverable faults are
//! `Copy` so they can be cheaply threaded through the supervisor without
//! allocation; none of them terminates the process — input faults are
//! dropped for the tick, content faults degrade to `Idle` with user-visible
//! LED/sound feedback, and only bootstrap failures are fatal (surfaced by
//! `main` via `anyhow`, outside the core FSM).

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor returned garbage — the reading is ignored for this tick.
    Input(InputFault),
    /// Card data or audio content is missing/invalid — degrade to Idle.
    Content(ContentFault),
    /// Peripheral or collaborator initialisation failed at startup.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input(e) => write!(f, "input: {e}"),
            Self::Content(e) => write!(f, "content: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Input faults — recovered locally, never surfaced to the user
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFault {
    /// Battery ADC read failed or returned no sample.
    BatteryReadFailed,
    /// Volume knob reading was outside [0, 1] and had to be clamped.
    KnobOutOfRange,
}

impl fmt::Display for InputFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BatteryReadFailed => write!(f, "battery read failed"),
            Self::KnobOutOfRange => write!(f, "volume knob out of range"),
        }
    }
}

impl From<InputFault> for Error {
    fn from(e: InputFault) -> Self {
        Self::Input(e)
    }
}

// ---------------------------------------------------------------------------
// Content faults — recovered with an error LED/sound signature
// ---------------------------------------------------------------------------

/// A card was presented but no playable story could be produced for it.
/// Each variant degrades to `Idle` after the error signature so the user can
/// tell what went wrong without a screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFault {
    /// No `card_<uid>.json` exists for the presented UID.
    CardNotFound,
    /// The card file exists but is not valid JSON / not the expected shape.
    InvalidJson,
    /// The card parsed but its story list is empty.
    NoStories,
    /// The selected story references a narration file that does not exist.
    MissingAudio,
}

impl fmt::Display for ContentFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CardNotFound => write!(f, "card not found"),
            Self::InvalidJson => write!(f, "invalid card JSON"),
            Self::NoStories => write!(f, "card has no stories"),
            Self::MissingAudio => write!(f, "narration audio missing"),
        }
    }
}

impl From<ContentFault> for Error {
    fn from(e: ContentFault) -> Self {
        Self::Content(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
