//! System configuration parameters
//!
//! All tunable parameters for the storyteller box.
//! Values can be overridden from the CLI or a JSON config file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Which timestamp anchors the double-tap window.
///
/// Historically the firmware measured the window from the first release in
/// some builds and from the first press in others; the anchor is now an
/// explicit parameter. `FirstPress` is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoubleTapAnchor {
    FirstPress,
    FirstRelease,
}

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoxConfig {
    // --- Button gestures ---
    /// Minimum stable time before a raw button edge is accepted (milliseconds)
    pub debounce_ms: u64,
    /// Hold duration that classifies as a long press (milliseconds)
    pub long_press_ms: u64,
    /// Window in which a second press counts as a double tap (milliseconds)
    pub double_tap_window_ms: u64,
    /// Timestamp the double-tap window is measured from
    pub double_tap_anchor: DoubleTapAnchor,

    // --- Loop timing ---
    /// Control loop cadence (milliseconds)
    pub tick_interval_ms: u64,
    /// Volume knob poll interval (milliseconds)
    pub volume_poll_interval_ms: u64,
    /// Battery poll interval (milliseconds)
    pub battery_poll_interval_ms: u64,
    /// Upper bound on the wait for a feedback chime to finish (milliseconds)
    pub feedback_wait_ms: u64,
    /// Auto-shutdown after this many seconds since the last story start
    /// (0 disables)
    pub idle_timeout_secs: u64,

    // --- Calm window ---
    /// Start of the calm period, minutes after midnight (default 20:30)
    pub calm_start_min: u16,
    /// End of the calm period, minutes after midnight (default 06:30)
    pub calm_end_min: u16,
    /// Story tone preferred during the calm period
    pub calm_tone: String,

    // --- Volume ---
    /// Software volume floor the knob maps onto
    pub min_volume: f32,
    /// Software volume ceiling (below 1.0 to prevent distortion)
    pub max_volume: f32,
    /// Knob movement below this is ignored
    pub volume_epsilon: f32,

    // --- Battery ---
    /// Warning threshold (volts)
    pub battery_low_volts: f32,
    /// Shutdown threshold (volts)
    pub battery_critical_volts: f32,

    // --- Content ---
    /// Directory containing `card_<uid>.json` files and narration audio
    pub stories_dir: PathBuf,
}

impl Default for BoxConfig {
    fn default() -> Self {
        Self {
            // Gestures
            debounce_ms: 50,
            long_press_ms: 1500,
            double_tap_window_ms: 400,
            double_tap_anchor: DoubleTapAnchor::FirstPress,

            // Timing
            tick_interval_ms: 50,            // 20 Hz
            volume_poll_interval_ms: 200,    // 5 Hz
            battery_poll_interval_ms: 10_000,
            feedback_wait_ms: 2500,
            idle_timeout_secs: 900, // 15 min

            // Calm window 20:30 – 06:30
            calm_start_min: 20 * 60 + 30,
            calm_end_min: 6 * 60 + 30,
            calm_tone: "calmo".to_string(),

            // Volume
            min_volume: 0.1,
            max_volume: 0.9,
            volume_epsilon: 0.01,

            // Battery (single-cell LiPo)
            battery_low_volts: 3.5,
            battery_critical_volts: 3.3,

            stories_dir: PathBuf::from("stories"),
        }
    }
}
