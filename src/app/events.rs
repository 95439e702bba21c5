//! Outbound application events.
//!
//! The [`StoryboxService`](super::service::StoryboxService) emits these
//! through the [`EventSink`](super::ports::EventSink) port. Adapters on the
//! other side decide what to do with them — log to the console, record in
//! tests, drive a future companion display.

use crate::error::ContentFault;
use crate::fsm::StateId;

/// Why the box is shutting down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The user held the button.
    LongPress,
    /// Battery fell below the critical threshold.
    BatteryCritical,
    /// Nothing played for the configured idle timeout.
    IdleTimeout,
}

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started (carries initial state).
    Started(StateId),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// A card was accepted and a story started.
    CardAccepted { uid: String, title: String },

    /// A card was rejected; the error signature fired once.
    CardRejected { uid: String, fault: ContentFault },

    /// The current story finished naturally.
    PlaybackFinished,

    /// Battery crossed the warning threshold.
    BatteryLow { volts: f32 },

    /// A shutdown trigger fired; the FSM is now terminal.
    ShutdownRequested(ShutdownReason),
}
