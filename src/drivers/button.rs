//! Debounced button driver with tap, double-tap, and long-press detection.
//!
//! The main loop samples the raw digital line once per control tick and
//! feeds it to [`GestureButton::poll`] together with the current instant.
//! Debounce happens internally: a raw edge only takes effect after the line
//! has been stable for the configured settle time.
//!
//! ## Gesture classification
//!
//! | Gesture    | Condition                                             |
//! |------------|-------------------------------------------------------|
//! | Tap        | Release < long-press, no second press within window   |
//! | DoubleTap  | Second press within the double-tap window             |
//! | LongPress  | Held >= long-press duration (fires before release)    |

use std::time::{Duration, Instant};

use crate::config::DoubleTapAnchor;

/// Button events emitted after gesture classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Tap,
    DoubleTap,
    LongPress,
}

/// Internal state machine for gesture detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureState {
    Idle,
    Pressed {
        press_time: Instant,
    },
    WaitingSecondTap {
        press_time: Instant,
        release_time: Instant,
    },
}

pub struct GestureButton {
    debounce: Duration,
    long_press: Duration,
    double_tap_window: Duration,
    anchor: DoubleTapAnchor,

    state: GestureState,

    // Debounce tracking
    last_raw: bool,
    last_raw_change: Option<Instant>,
    stable_level: bool,

    // Timers are never evaluated against a timestamp earlier than the
    // previous sample.
    last_now: Option<Instant>,
}

impl GestureButton {
    pub fn new(
        debounce: Duration,
        long_press: Duration,
        double_tap_window: Duration,
        anchor: DoubleTapAnchor,
    ) -> Self {
        Self {
            debounce,
            long_press,
            double_tap_window,
            anchor,
            state: GestureState::Idle,
            last_raw: false,
            last_raw_change: None,
            stable_level: false,
            last_now: None,
        }
    }

    /// Construct from the system configuration.
    pub fn from_config(cfg: &crate::config::BoxConfig) -> Self {
        Self::new(
            Duration::from_millis(cfg.debounce_ms),
            Duration::from_millis(cfg.long_press_ms),
            Duration::from_millis(cfg.double_tap_window_ms),
            cfg.double_tap_anchor,
        )
    }

    /// The debounced level as of the last poll.
    pub fn is_pressed(&self) -> bool {
        self.stable_level
    }

    /// Feed one raw sample. Call once per control tick.
    /// Returns at most one classified gesture per call.
    pub fn poll(&mut self, raw_pressed: bool, now: Instant) -> Option<ButtonEvent> {
        let now = match self.last_now {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        self.last_now = Some(now);

        let (pressed_edge, released_edge) = self.debounce(raw_pressed, now);
        self.classify(pressed_edge, released_edge, now)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    /// Update raw tracking; returns (confirmed press edge, confirmed release
    /// edge). Raw toggles shorter than the settle time never produce edges.
    fn debounce(&mut self, raw: bool, now: Instant) -> (bool, bool) {
        if raw != self.last_raw {
            self.last_raw = raw;
            self.last_raw_change = Some(now);
        }

        if self.last_raw == self.stable_level {
            return (false, false);
        }

        let stable_since = self.last_raw_change.unwrap_or(now);
        if now.duration_since(stable_since) >= self.debounce {
            self.stable_level = self.last_raw;
            if self.stable_level {
                (true, false)
            } else {
                (false, true)
            }
        } else {
            (false, false)
        }
    }

    fn classify(
        &mut self,
        pressed_edge: bool,
        released_edge: bool,
        now: Instant,
    ) -> Option<ButtonEvent> {
        match self.state {
            GestureState::Idle => {
                if pressed_edge {
                    self.state = GestureState::Pressed { press_time: now };
                }
                None
            }

            GestureState::Pressed { press_time } => {
                // Long press fires while still held, exactly once.
                if self.stable_level && now.duration_since(press_time) >= self.long_press {
                    self.state = GestureState::Idle;
                    return Some(ButtonEvent::LongPress);
                }

                if released_edge {
                    self.state = GestureState::WaitingSecondTap {
                        press_time,
                        release_time: now,
                    };
                }
                None
            }

            GestureState::WaitingSecondTap {
                press_time,
                release_time,
            } => {
                let anchor = match self.anchor {
                    DoubleTapAnchor::FirstPress => press_time,
                    DoubleTapAnchor::FirstRelease => release_time,
                };
                let in_window = now.duration_since(anchor) <= self.double_tap_window;

                if pressed_edge {
                    if in_window {
                        self.state = GestureState::Idle;
                        return Some(ButtonEvent::DoubleTap);
                    }
                    // Window already expired: the stale sequence resolves to
                    // a Tap and this press starts a fresh one.
                    self.state = GestureState::Pressed { press_time: now };
                    return Some(ButtonEvent::Tap);
                }

                if !in_window {
                    self.state = GestureState::Idle;
                    return Some(ButtonEvent::Tap);
                }
                None
            }
        }
    }
}
