//! LED pattern engine with cooperative, non-blocking animation.
//!
//! Generates time-varying output for the single button LED. The main loop
//! calls `tick()` each control cycle; the engine computes the instantaneous
//! on/off or PWM duty value and forwards it to the LED driver port.
//!
//! ## Pattern types
//!
//! | Pattern     | Description                             | Terminates |
//! |-------------|-----------------------------------------|------------|
//! | Solid       | Constant on                             | never      |
//! | Off         | Constant off                            | never      |
//! | Blink       | Square wave (period, duty)              | `count`    |
//! | Breathing   | Sinusoidal duty, 10% floor              | never      |
//! | Pulse       | Fast-rise / slow-decay envelope         | `count`    |
//! | Heartbeat   | Double-beat envelope                    | `count`    |
//! | Fadeout     | Linear decay to 0 over a duration       | always     |
//! | Sos         | ···---··· step sequence                 | `count`    |
//! | ColorShift  | Slow brightness staircase               | `count`    |
//! | Attention   | Triple flash then pause                 | `count`    |
//! | Success     | Two blips, the second held              | `count`    |
//! | Error       | Rapid 8 Hz flash                        | `count`    |
//!
//! ## Chaining
//!
//! A bounded pattern that finishes its final cycle triggers, in order: the
//! optional one-shot completion callback, then its `next` pattern if set,
//! else `Solid`. Completion fires exactly once — further ticks only render
//! the successor. The supervisor can therefore fire-and-forget a feedback
//! signature and the LED autonomously returns to a steady state.
//!
//! Phase clocks are relative to the pattern's own activation instant, never
//! wall-clock absolute, so a stalled loop cannot corrupt animation phase.

use std::f32::consts::TAU;
use std::time::Instant;

use log::warn;

use crate::app::ports::LedPort;

/// A `(duty %, duration ms)` step in a sequence signature.
type Step = (f32, u64);

// Morse SOS: three short, three long, three short, then a gap.
const SOS_STEPS: &[Step] = &[
    (100.0, 150),
    (0.0, 150),
    (100.0, 150),
    (0.0, 150),
    (100.0, 150),
    (0.0, 350),
    (100.0, 450),
    (0.0, 150),
    (100.0, 450),
    (0.0, 150),
    (100.0, 450),
    (0.0, 350),
    (100.0, 150),
    (0.0, 150),
    (100.0, 150),
    (0.0, 150),
    (100.0, 150),
    (0.0, 700),
];

const ATTENTION_STEPS: &[Step] = &[
    (100.0, 80),
    (0.0, 80),
    (100.0, 80),
    (0.0, 80),
    (100.0, 80),
    (0.0, 480),
];

const SUCCESS_STEPS: &[Step] = &[(100.0, 120), (0.0, 80), (100.0, 320), (0.0, 180)];

// 8 Hz flash, one on/off pair per cycle.
const ERROR_STEPS: &[Step] = &[(100.0, 62), (0.0, 63)];

const COLOR_SHIFT_STEPS: &[Step] = &[
    (15.0, 180),
    (35.0, 180),
    (60.0, 180),
    (85.0, 180),
    (100.0, 240),
    (85.0, 180),
    (60.0, 180),
    (35.0, 180),
];

/// Breathing duty never drops below this floor.
const BREATHING_FLOOR: f32 = 10.0;

// ---------------------------------------------------------------------------
// Pattern definition
// ---------------------------------------------------------------------------

/// A self-contained animation. Bounded variants carry an optional `next`
/// pattern to auto-chain into once their cycle count completes.
#[derive(Debug, Clone, PartialEq)]
pub enum LedPattern {
    Solid,
    Off,
    Blink {
        period_ms: u64,
        duty: f32,
        count: Option<u32>,
        next: Option<Box<LedPattern>>,
    },
    Breathing {
        period_ms: u64,
    },
    Pulse {
        period_ms: u64,
        count: Option<u32>,
        next: Option<Box<LedPattern>>,
    },
    Heartbeat {
        period_ms: u64,
        count: Option<u32>,
        next: Option<Box<LedPattern>>,
    },
    Fadeout {
        duration_ms: u64,
        from: f32,
        next: Option<Box<LedPattern>>,
    },
    Sos {
        count: u32,
        next: Option<Box<LedPattern>>,
    },
    ColorShift {
        count: u32,
        next: Option<Box<LedPattern>>,
    },
    Attention {
        count: u32,
        next: Option<Box<LedPattern>>,
    },
    Success {
        count: u32,
        next: Option<Box<LedPattern>>,
    },
    Error {
        count: u32,
        next: Option<Box<LedPattern>>,
    },
}

impl LedPattern {
    /// Unbounded blink with default 50% duty.
    pub fn blink(period_ms: u64) -> Self {
        Self::Blink {
            period_ms,
            duty: 0.5,
            count: None,
            next: None,
        }
    }

    /// Bounded blink chaining into `next` after `count` cycles.
    pub fn blink_times(period_ms: u64, duty: f32, count: u32, next: LedPattern) -> Self {
        Self::Blink {
            period_ms,
            duty,
            count: Some(count),
            next: Some(Box::new(next)),
        }
    }

    pub fn breathing(period_ms: u64) -> Self {
        Self::Breathing { period_ms }
    }

    pub fn fadeout(duration_ms: u64, next: LedPattern) -> Self {
        Self::Fadeout {
            duration_ms,
            from: 100.0,
            next: Some(Box::new(next)),
        }
    }

    /// Look up a pattern by its conventional name, with default parameters.
    /// Returns `None` for names the engine does not recognise.
    pub fn by_name(name: &str) -> Option<Self> {
        let p = match name.to_ascii_lowercase().as_str() {
            "solid" => Self::Solid,
            "off" => Self::Off,
            "blink" => Self::blink(500),
            "breathing" => Self::breathing(2500),
            "pulse" => Self::Pulse {
                period_ms: 600,
                count: None,
                next: None,
            },
            "heartbeat" => Self::Heartbeat {
                period_ms: 1000,
                count: None,
                next: None,
            },
            "fadeout" => Self::Fadeout {
                duration_ms: 1500,
                from: 100.0,
                next: None,
            },
            "sos" => Self::Sos {
                count: 1,
                next: None,
            },
            "colorshift" | "color_shift" => Self::ColorShift {
                count: 1,
                next: None,
            },
            "attention" => Self::Attention {
                count: 2,
                next: None,
            },
            "success" => Self::Success {
                count: 1,
                next: None,
            },
            "error" => Self::Error {
                count: 24,
                next: None,
            },
            _ => return None,
        };
        Some(p)
    }

    /// Cycle length in milliseconds; `None` for phase-free patterns.
    fn cycle_ms(&self) -> Option<u64> {
        match self {
            Self::Solid | Self::Off => None,
            Self::Blink { period_ms, .. }
            | Self::Breathing { period_ms }
            | Self::Pulse { period_ms, .. }
            | Self::Heartbeat { period_ms, .. } => Some(*period_ms),
            Self::Fadeout { duration_ms, .. } => Some(*duration_ms),
            Self::Sos { .. } => Some(seq_cycle_ms(SOS_STEPS)),
            Self::ColorShift { .. } => Some(seq_cycle_ms(COLOR_SHIFT_STEPS)),
            Self::Attention { .. } => Some(seq_cycle_ms(ATTENTION_STEPS)),
            Self::Success { .. } => Some(seq_cycle_ms(SUCCESS_STEPS)),
            Self::Error { .. } => Some(seq_cycle_ms(ERROR_STEPS)),
        }
    }

    /// Cycles after which the pattern completes; `None` = unbounded.
    fn bound(&self) -> Option<u64> {
        match self {
            Self::Blink { count, .. }
            | Self::Pulse { count, .. }
            | Self::Heartbeat { count, .. } => count.map(u64::from),
            Self::Fadeout { .. } => Some(1),
            Self::Sos { count, .. }
            | Self::ColorShift { count, .. }
            | Self::Attention { count, .. }
            | Self::Success { count, .. }
            | Self::Error { count, .. } => Some(u64::from(*count)),
            _ => None,
        }
    }

    /// Successor on completion; defaults to `Solid` when unset.
    fn take_next(&mut self) -> LedPattern {
        let slot = match self {
            Self::Blink { next, .. }
            | Self::Pulse { next, .. }
            | Self::Heartbeat { next, .. }
            | Self::Fadeout { next, .. }
            | Self::Sos { next, .. }
            | Self::ColorShift { next, .. }
            | Self::Attention { next, .. }
            | Self::Success { next, .. }
            | Self::Error { next, .. } => next.take(),
            _ => None,
        };
        match (slot, &self) {
            (Some(p), _) => *p,
            // A fadeout with no successor settles dark, not bright.
            (None, Self::Fadeout { .. }) => LedPattern::Off,
            (None, _) => LedPattern::Solid,
        }
    }

    /// Degenerate timing parameters would divide by zero; such patterns
    /// deterministically degrade to `Off` instead of crashing the loop.
    fn sanitized(self) -> Self {
        let broken = match &self {
            Self::Blink { period_ms, duty, .. } => *period_ms == 0 || !duty.is_finite(),
            Self::Breathing { period_ms }
            | Self::Pulse { period_ms, .. }
            | Self::Heartbeat { period_ms, .. } => *period_ms == 0,
            Self::Fadeout {
                duration_ms, from, ..
            } => *duration_ms == 0 || !from.is_finite(),
            _ => false,
        };
        if broken {
            warn!("degenerate LED pattern {self:?}, falling back to Off");
            Self::Off
        } else {
            self
        }
    }
}

// ---------------------------------------------------------------------------
// Instantaneous output
// ---------------------------------------------------------------------------

/// What the engine wants the LED driver to do this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Output {
    Digital(bool),
    Duty(f32),
}

fn seq_cycle_ms(steps: &[Step]) -> u64 {
    steps.iter().map(|(_, ms)| ms).sum()
}

fn seq_level(steps: &[Step], mut pos_ms: u64) -> f32 {
    for (level, ms) in steps {
        if pos_ms < *ms {
            return *level;
        }
        pos_ms -= ms;
    }
    0.0
}

fn render(pattern: &LedPattern, phase_ms: u64) -> Output {
    match pattern {
        LedPattern::Solid => Output::Digital(true),
        LedPattern::Off => Output::Digital(false),

        LedPattern::Blink {
            period_ms, duty, ..
        } => {
            let pos = phase_ms % period_ms;
            let on_ms = (*period_ms as f32 * duty.clamp(0.0, 1.0)) as u64;
            Output::Digital(pos < on_ms)
        }

        LedPattern::Breathing { period_ms } => {
            let t = (phase_ms % period_ms) as f32 / *period_ms as f32;
            let duty = BREATHING_FLOOR + (100.0 - BREATHING_FLOOR) * 0.5 * (1.0 - (TAU * t).cos());
            Output::Duty(duty)
        }

        LedPattern::Pulse { period_ms, .. } => {
            let t = (phase_ms % period_ms) as f32 / *period_ms as f32;
            // 15% fast attack, 85% linear decay.
            let duty = if t < 0.15 {
                100.0 * t / 0.15
            } else {
                100.0 * (1.0 - (t - 0.15) / 0.85)
            };
            Output::Duty(duty.clamp(0.0, 100.0))
        }

        LedPattern::Heartbeat { period_ms, .. } => {
            let t = (phase_ms % period_ms) as f32 / *period_ms as f32;
            let duty = if t < 0.12 {
                100.0 * (1.0 - t / 0.12)
            } else if (0.22..0.34).contains(&t) {
                75.0 * (1.0 - (t - 0.22) / 0.12)
            } else {
                0.0
            };
            Output::Duty(duty)
        }

        LedPattern::Fadeout {
            duration_ms, from, ..
        } => {
            let t = (phase_ms.min(*duration_ms)) as f32 / *duration_ms as f32;
            Output::Duty((from * (1.0 - t)).max(0.0))
        }

        LedPattern::Sos { .. } => {
            Output::Duty(seq_level(SOS_STEPS, phase_ms % seq_cycle_ms(SOS_STEPS)))
        }
        LedPattern::ColorShift { .. } => Output::Duty(seq_level(
            COLOR_SHIFT_STEPS,
            phase_ms % seq_cycle_ms(COLOR_SHIFT_STEPS),
        )),
        LedPattern::Attention { .. } => Output::Duty(seq_level(
            ATTENTION_STEPS,
            phase_ms % seq_cycle_ms(ATTENTION_STEPS),
        )),
        LedPattern::Success { .. } => Output::Duty(seq_level(
            SUCCESS_STEPS,
            phase_ms % seq_cycle_ms(SUCCESS_STEPS),
        )),
        LedPattern::Error { .. } => Output::Duty(seq_level(
            ERROR_STEPS,
            phase_ms % seq_cycle_ms(ERROR_STEPS),
        )),
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Owns the single active pattern and drives it from `tick()`.
pub struct LedPatternScheduler {
    active: LedPattern,
    activated_at: Option<Instant>,
    on_complete: Option<Box<dyn FnOnce() + Send>>,
}

impl LedPatternScheduler {
    pub fn new() -> Self {
        Self {
            active: LedPattern::Off,
            activated_at: None,
            on_complete: None,
        }
    }

    /// Replace the active pattern. Resets the phase clock and discards any
    /// pending completion callback of the previous pattern.
    pub fn set_pattern(&mut self, pattern: LedPattern) {
        self.active = pattern.sanitized();
        self.activated_at = None;
        self.on_complete = None;
    }

    /// Replace the active pattern and register a one-shot callback invoked
    /// when the (bounded) pattern completes, before the chain fires.
    pub fn set_pattern_with_callback(
        &mut self,
        pattern: LedPattern,
        callback: impl FnOnce() + Send + 'static,
    ) {
        self.set_pattern(pattern);
        self.on_complete = Some(Box::new(callback));
    }

    /// Set a pattern by conventional name; unknown names fall back to `Off`.
    pub fn set_named(&mut self, name: &str) {
        match LedPattern::by_name(name) {
            Some(p) => self.set_pattern(p),
            None => {
                warn!("unrecognised LED pattern '{name}', falling back to Off");
                self.set_pattern(LedPattern::Off);
            }
        }
    }

    pub fn active(&self) -> &LedPattern {
        &self.active
    }

    /// Advance the active pattern and forward the output to the driver.
    /// Call once per control tick; the phase clock starts at the first tick
    /// after activation.
    pub fn tick(&mut self, now: Instant, led: &mut impl LedPort) {
        let t0 = *self.activated_at.get_or_insert(now);
        let phase_ms = now.duration_since(t0).as_millis() as u64;

        if let (Some(cycle), Some(bound)) = (self.active.cycle_ms(), self.active.bound()) {
            let cycles_done = if cycle == 0 { bound } else { phase_ms / cycle };
            if cycles_done >= bound {
                if let Some(cb) = self.on_complete.take() {
                    cb();
                }
                let next = self.active.take_next();
                self.set_pattern(next);
                self.activated_at = Some(now);
            }
        }

        let phase = self
            .activated_at
            .map_or(0, |t0| now.duration_since(t0).as_millis() as u64);
        match render(&self.active, phase) {
            Output::Digital(on) => led.set_led(on),
            Output::Duty(duty) => led.set_pwm_duty(duty),
        }
    }
}

impl Default for LedPatternScheduler {
    fn default() -> Self {
        Self::new()
    }
}
