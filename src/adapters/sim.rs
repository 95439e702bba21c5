//! Simulated hardware and audio backends.
//!
//! The box runs end-to-end on a development machine: the tag reader,
//! button, knob and battery are driven from stdin commands, the LED is
//! rendered to the log, and the audio engine is a timer that models
//! narration length.
//!
//! Stdin commands (interactive mode):
//!
//! ```text
//! card <uid>   place a card on the reader
//! remove       take the card off
//! tap          short button press
//! double       two quick presses
//! hold         long press (shutdown)
//! volume <v>   knob position 0.0–1.0
//! battery <v>  battery voltage
//! ```

use std::collections::VecDeque;
use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use log::{debug, info, trace, warn};

use crate::app::ports::{AudioPort, FeedbackKind, InputPort, LedPort};

// ───────────────────────────────────────────────────────────────
// Simulated board (tag reader + button + knob + battery + LED)
// ───────────────────────────────────────────────────────────────

enum SimCommand {
    Card(String),
    Remove,
    Tap,
    Double,
    Hold,
    Volume(f32),
    Battery(f32),
}

pub struct SimBoard {
    /// Scheduled button press windows (start, end).
    presses: VecDeque<(Instant, Instant)>,
    card: Option<String>,
    knob: f32,
    battery: Option<f32>,
    hold_ms: u64,

    // LED rendering
    led_duty: f32,
    led_bucket: i32,

    rx: Option<mpsc::Receiver<String>>,
}

impl SimBoard {
    /// A quiet board: no card, knob at 60%, healthy battery.
    pub fn new(hold_ms: u64) -> Self {
        Self {
            presses: VecDeque::new(),
            card: None,
            knob: 0.6,
            battery: Some(4.0),
            hold_ms,
            led_duty: 0.0,
            led_bucket: -1,
            rx: None,
        }
    }

    /// Board driven by stdin commands on a background thread.
    pub fn interactive(hold_ms: u64) -> Self {
        let (tx, rx) = mpsc::channel();
        let _ = std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(line.trim().to_string()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        let mut board = Self::new(hold_ms);
        board.rx = Some(rx);
        board
    }

    // ── Scripted control (also used by the stdin commands) ────

    pub fn place_card(&mut self, uid: impl Into<String>) {
        self.card = Some(uid.into());
    }

    pub fn remove_card(&mut self) {
        self.card = None;
    }

    /// Schedule a button press lasting `ms`, starting `after_ms` from now.
    pub fn press_for(&mut self, after_ms: u64, ms: u64) {
        let start = Instant::now() + Duration::from_millis(after_ms);
        self.presses
            .push_back((start, start + Duration::from_millis(ms)));
    }

    pub fn set_knob(&mut self, v: f32) {
        self.knob = v;
    }

    pub fn set_battery(&mut self, volts: Option<f32>) {
        self.battery = volts;
    }

    /// Last duty forwarded to the LED (diagnostics).
    pub fn led_duty(&self) -> f32 {
        self.led_duty
    }

    // ── Internal ──────────────────────────────────────────────

    fn parse(line: &str) -> Option<SimCommand> {
        let mut parts = line.split_whitespace();
        let cmd = match parts.next()? {
            "card" => SimCommand::Card(parts.next()?.to_string()),
            "remove" => SimCommand::Remove,
            "tap" => SimCommand::Tap,
            "double" => SimCommand::Double,
            "hold" | "quit" | "shutdown" => SimCommand::Hold,
            "volume" => SimCommand::Volume(parts.next()?.parse().ok()?),
            "battery" => SimCommand::Battery(parts.next()?.parse().ok()?),
            _ => return None,
        };
        Some(cmd)
    }

    fn drain_commands(&mut self) {
        let Some(rx) = &self.rx else { return };
        let lines: Vec<String> = rx.try_iter().collect();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            match Self::parse(&line) {
                Some(SimCommand::Card(uid)) => {
                    info!("[sim] card {uid} placed");
                    self.place_card(uid);
                }
                Some(SimCommand::Remove) => {
                    info!("[sim] card removed");
                    self.remove_card();
                }
                Some(SimCommand::Tap) => self.press_for(0, 150),
                Some(SimCommand::Double) => {
                    self.press_for(0, 120);
                    self.press_for(270, 120);
                }
                Some(SimCommand::Hold) => self.press_for(0, self.hold_ms + 500),
                Some(SimCommand::Volume(v)) => self.set_knob(v),
                Some(SimCommand::Battery(v)) => self.set_battery(Some(v)),
                None => warn!("[sim] unknown command: {line}"),
            }
        }
    }
}

impl InputPort for SimBoard {
    fn read_uid(&mut self) -> Option<String> {
        self.drain_commands();
        self.card.clone()
    }

    fn raw_button_level(&mut self) -> bool {
        let now = Instant::now();
        while let Some(&(_, end)) = self.presses.front() {
            if end < now {
                self.presses.pop_front();
            } else {
                break;
            }
        }
        self.presses
            .front()
            .is_some_and(|&(start, end)| now >= start && now < end)
    }

    fn read_volume_knob(&mut self) -> f32 {
        self.knob
    }

    fn read_battery_volts(&mut self) -> Option<f32> {
        self.battery
    }
}

impl LedPort for SimBoard {
    fn set_led(&mut self, on: bool) {
        self.set_pwm_duty(if on { 100.0 } else { 0.0 });
    }

    fn set_pwm_duty(&mut self, duty: f32) {
        self.led_duty = duty;
        // Quantize so steady patterns do not spam the log.
        let bucket = (duty / 10.0).round() as i32;
        if bucket != self.led_bucket {
            self.led_bucket = bucket;
            let bar = "#".repeat(bucket.max(0) as usize);
            trace!("[led] {bar:<10} {duty:5.1}%");
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Simulated audio engine
// ───────────────────────────────────────────────────────────────

/// Timer-backed stand-in for the mixer: "plays" a story for a fixed
/// duration, supports pause/resume, and keeps feedback chimes short.
pub struct SimAudio {
    narration: Duration,
    busy_until: Option<Instant>,
    paused_remaining: Option<Duration>,
    volume: f32,
}

impl SimAudio {
    pub fn new(narration_secs: u64) -> Self {
        Self {
            narration: Duration::from_secs(narration_secs),
            busy_until: None,
            paused_remaining: None,
            volume: 1.0,
        }
    }

    /// Current software master volume (diagnostics).
    pub fn volume(&self) -> f32 {
        self.volume
    }
}

impl AudioPort for SimAudio {
    fn play_narration_with_bgm(&mut self, narration: &Path, tone: &str) -> bool {
        info!(
            "[audio] crossfade start: {} over '{tone}' loop ({}s)",
            narration.display(),
            self.narration.as_secs()
        );
        self.paused_remaining = None;
        self.busy_until = Some(Instant::now() + self.narration);
        true
    }

    fn pause(&mut self) {
        if let Some(until) = self.busy_until.take() {
            let remaining = until.saturating_duration_since(Instant::now());
            self.paused_remaining = Some(remaining);
            info!("[audio] paused ({remaining:.0?} remaining)");
        }
    }

    fn resume(&mut self) {
        if let Some(remaining) = self.paused_remaining.take() {
            self.busy_until = Some(Instant::now() + remaining);
            info!("[audio] resumed");
        }
    }

    fn stop(&mut self) {
        if self.busy_until.is_some() || self.paused_remaining.is_some() {
            info!("[audio] stopped");
        }
        self.busy_until = None;
        self.paused_remaining = None;
    }

    fn is_busy(&self) -> bool {
        self.paused_remaining.is_some()
            || self.busy_until.is_some_and(|t| Instant::now() < t)
    }

    fn play_feedback(&mut self, kind: FeedbackKind) {
        info!("[audio] feedback chime: {kind:?}");
        self.busy_until = Some(Instant::now() + Duration::from_millis(700));
    }

    fn set_volume(&mut self, level: f32) {
        self.volume = level;
        debug!("[audio] volume {level:.2}");
    }
}
