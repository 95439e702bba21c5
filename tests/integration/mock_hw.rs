//! Mock hardware adapters for integration tests.
//!
//! Records every port call so tests can assert on the full command history
//! without touching real GPIO/PWM or an audio device.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use storybox::app::events::AppEvent;
use storybox::app::ports::{
    AudioPort, CatalogPort, EventSink, FeedbackKind, InputPort, LedPort,
};
use storybox::story::{CardData, Story};

// ── Audio call record ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum AudioCall {
    Play { path: PathBuf, tone: String },
    Pause,
    Resume,
    Stop,
    Feedback(FeedbackKind),
    SetVolume(f32),
}

/// Records audio commands. `busy` is under test control: chimes do NOT
/// set it, so feedback waits return immediately.
pub struct MockAudio {
    pub calls: Vec<AudioCall>,
    pub busy: bool,
    pub accept_play: bool,
}

#[allow(dead_code)]
impl MockAudio {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            busy: false,
            accept_play: true,
        }
    }

    pub fn play_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, AudioCall::Play { .. }))
            .count()
    }

    pub fn pause_count(&self) -> usize {
        self.calls.iter().filter(|c| **c == AudioCall::Pause).count()
    }

    pub fn resume_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == AudioCall::Resume)
            .count()
    }

    pub fn stop_count(&self) -> usize {
        self.calls.iter().filter(|c| **c == AudioCall::Stop).count()
    }

    pub fn feedback_count(&self, kind: FeedbackKind) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == AudioCall::Feedback(kind))
            .count()
    }

    pub fn last_play_tone(&self) -> Option<&str> {
        self.calls.iter().rev().find_map(|c| match c {
            AudioCall::Play { tone, .. } => Some(tone.as_str()),
            _ => None,
        })
    }
}

impl Default for MockAudio {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPort for MockAudio {
    fn play_narration_with_bgm(&mut self, narration: &std::path::Path, tone: &str) -> bool {
        self.calls.push(AudioCall::Play {
            path: narration.to_path_buf(),
            tone: tone.to_string(),
        });
        if self.accept_play {
            self.busy = true;
        }
        self.accept_play
    }

    fn pause(&mut self) {
        self.calls.push(AudioCall::Pause);
    }

    fn resume(&mut self) {
        self.calls.push(AudioCall::Resume);
    }

    fn stop(&mut self) {
        self.calls.push(AudioCall::Stop);
        self.busy = false;
    }

    fn is_busy(&self) -> bool {
        self.busy
    }

    fn play_feedback(&mut self, kind: FeedbackKind) {
        self.calls.push(AudioCall::Feedback(kind));
    }

    fn set_volume(&mut self, level: f32) {
        self.calls.push(AudioCall::SetVolume(level));
    }
}

// ── Mock board (inputs + LED) ─────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LedCall {
    Digital(bool),
    Duty(f32),
}

pub struct MockBoard {
    pub uid: Option<String>,
    pub button: bool,
    pub knob: f32,
    pub battery: Option<f32>,
    pub led_calls: Vec<LedCall>,
}

#[allow(dead_code)]
impl MockBoard {
    pub fn new() -> Self {
        Self {
            uid: None,
            button: false,
            knob: 0.5,
            battery: Some(4.0),
            led_calls: Vec::new(),
        }
    }
}

impl Default for MockBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl InputPort for MockBoard {
    fn read_uid(&mut self) -> Option<String> {
        self.uid.clone()
    }

    fn raw_button_level(&mut self) -> bool {
        self.button
    }

    fn read_volume_knob(&mut self) -> f32 {
        self.knob
    }

    fn read_battery_volts(&mut self) -> Option<f32> {
        self.battery
    }
}

impl LedPort for MockBoard {
    fn set_led(&mut self, on: bool) {
        self.led_calls.push(LedCall::Digital(on));
    }

    fn set_pwm_duty(&mut self, duty: f32) {
        self.led_calls.push(LedCall::Duty(duty));
    }
}

// ── Mock catalog ──────────────────────────────────────────────

pub struct MockCatalog {
    cards: HashMap<String, Arc<CardData>>,
}

#[allow(dead_code)]
impl MockCatalog {
    pub fn new() -> Self {
        Self {
            cards: HashMap::new(),
        }
    }

    pub fn with_card(mut self, uid: &str, stories: Vec<Story>) -> Self {
        self.cards
            .insert(uid.to_string(), Arc::new(CardData { stories }));
        self
    }

    /// A card that loads but has nothing playable on it.
    pub fn with_empty_card(mut self, uid: &str) -> Self {
        self.cards
            .insert(uid.to_string(), Arc::new(CardData { stories: vec![] }));
        self
    }
}

impl Default for MockCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogPort for MockCatalog {
    fn load_card(&self, uid: &str) -> Option<Arc<CardData>> {
        self.cards.get(uid).cloned()
    }
}

// ── Recording event sink ──────────────────────────────────────

pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn contains(&self, pred: impl Fn(&AppEvent) -> bool) -> bool {
        self.events.iter().any(pred)
    }
}

impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Story helpers ─────────────────────────────────────────────

#[allow(dead_code)]
pub fn story(title: &str, tone: &str) -> Story {
    Story {
        id: title.to_string(),
        title: title.to_string(),
        tone: tone.to_string(),
        audio: PathBuf::from(format!("audio/{title}.mp3")),
    }
}
