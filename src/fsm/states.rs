//! Concrete state handler functions and table builder.
//!
//! Each state is defined by three plain `fn` pointers — no closures, no
//! dynamic dispatch, no heap. Handlers only read the input snapshot and
//! write [`SideEffects`]; collaborator calls happen in the service.
//!
//! ```text
//!  IDLE ──[card valid]──▶ PLAYING ──[tap]──▶ PAUSED
//!    ▲                      │  ▲               │
//!    │               [finished] └────[tap]─────┘
//!    │                      │
//!    └──────────────────────┘
//!    ▲
//!    └──[new card while playing/paused: stop, re-evaluate]
//!
//!  Any state ──[long press / critical battery / idle timeout]──▶ SHUTDOWN
//! ```

use log::{info, warn};

use super::context::{
    AudioAction, CardResolution, CardSession, FeedbackKind, FsmContext, SessionAction,
};
use super::{StateDescriptor, StateId};
use crate::drivers::button::ButtonEvent;
use crate::drivers::led_patterns::LedPattern;

// ═══════════════════════════════════════════════════════════════════════════
//  LED signatures
// ═══════════════════════════════════════════════════════════════════════════

/// Steady idle/paused glow.
pub(crate) fn led_breathing() -> LedPattern {
    LedPattern::breathing(2500)
}

/// Card accepted: a bright success blip, then solid for playback.
pub(crate) fn led_card_valid() -> LedPattern {
    LedPattern::Success {
        count: 1,
        next: Some(Box::new(LedPattern::Solid)),
    }
}

/// Card rejected: rapid flash burst, then back to the idle glow.
pub(crate) fn led_card_invalid() -> LedPattern {
    LedPattern::Error {
        count: 6,
        next: Some(Box::new(led_breathing())),
    }
}

/// Story finished naturally: fade down, then the idle glow.
fn led_finished() -> LedPattern {
    LedPattern::fadeout(1500, led_breathing())
}

/// Farewell blink on shutdown, then dark.
fn led_shutdown() -> LedPattern {
    LedPattern::blink_times(200, 0.5, 10, LedPattern::Off)
}

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table. Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0 — Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1 — Playing
        StateDescriptor {
            id: StateId::Playing,
            name: "Playing",
            on_enter: Some(playing_enter),
            on_exit: None,
            on_update: playing_update,
        },
        // Index 2 — Paused
        StateDescriptor {
            id: StateId::Paused,
            name: "Paused",
            on_enter: Some(paused_enter),
            on_exit: None,
            on_update: paused_update,
        },
        // Index 3 — ShuttingDown (terminal)
        StateDescriptor {
            id: StateId::ShuttingDown,
            name: "ShuttingDown",
            on_enter: Some(shutting_down_enter),
            on_exit: None,
            on_update: shutting_down_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Shared guards
// ═══════════════════════════════════════════════════════════════════════════

/// Long press, critical battery, or idle timeout → shutdown, from anywhere.
/// Stops audio, clears the session, and sets the farewell signature in the
/// same transition.
fn shutdown_guard(ctx: &mut FsmContext) -> Option<StateId> {
    if !ctx.shutdown_requested() {
        return None;
    }
    info!("shutdown requested");
    ctx.effects.audio = Some(AudioAction::Stop);
    ctx.effects.feedback = Some(FeedbackKind::Shutdown);
    ctx.effects.led = Some(led_shutdown());
    ctx.effects.session = SessionAction::Clear;
    Some(StateId::ShuttingDown)
}

/// A different card was placed while a session is active: stop playback,
/// clear the session atomically, and let Idle re-evaluate the (still
/// pending) resolution on the next tick.
fn new_card_guard(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.inputs.card.is_none() {
        return None;
    }
    info!("new card while busy, stopping current playback");
    ctx.effects.audio = Some(AudioAction::Stop);
    ctx.effects.session = SessionAction::Clear;
    Some(StateId::Idle)
}

/// Double tap: abandon the current story and pick a fresh one for the same
/// card. The service performs the reselect and forces the resulting state.
fn reselect_on_double_tap(ctx: &mut FsmContext) -> bool {
    if ctx.inputs.gesture != Some(ButtonEvent::DoubleTap) {
        return false;
    }
    if ctx.session.is_none() {
        warn!("double tap with no active card, ignoring");
        return false;
    }
    info!("double tap: reselecting story for current card");
    ctx.effects.audio = Some(AudioAction::Stop);
    ctx.effects.reselect = true;
    true
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE state — waiting for a card
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut FsmContext) {
    ctx.effects.led.get_or_insert_with(led_breathing);
    info!("IDLE: waiting for a card");
}

fn idle_update(ctx: &mut FsmContext) -> Option<StateId> {
    if let Some(next) = shutdown_guard(ctx) {
        return Some(next);
    }

    match ctx.inputs.card.take() {
        Some(CardResolution::Ready(rc)) => {
            info!(
                "card {}: playing '{}' (tone: {})",
                rc.uid, rc.story.title, rc.story.tone
            );
            ctx.effects.led = Some(led_card_valid());
            ctx.effects.session = SessionAction::Set(CardSession {
                uid: rc.uid.clone(),
                story: rc.story.clone(),
            });
            ctx.effects.audio = Some(AudioAction::Start(rc));
            Some(StateId::Playing)
        }
        Some(CardResolution::Invalid { uid, fault }) => {
            warn!("card {uid} rejected: {fault}");
            ctx.effects.feedback = Some(FeedbackKind::CardError);
            ctx.effects.led = Some(led_card_invalid());
            ctx.effects.session = SessionAction::Clear;
            ctx.effects.rejected = Some((uid, fault));
            None
        }
        None => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  PLAYING state
// ═══════════════════════════════════════════════════════════════════════════

fn playing_enter(ctx: &mut FsmContext) {
    ctx.effects.led.get_or_insert(LedPattern::Solid);
}

fn playing_update(ctx: &mut FsmContext) -> Option<StateId> {
    if let Some(next) = shutdown_guard(ctx) {
        return Some(next);
    }
    if let Some(next) = new_card_guard(ctx) {
        return Some(next);
    }

    if ctx.inputs.gesture == Some(ButtonEvent::Tap) {
        info!("PLAYING: tap, pausing");
        ctx.effects.audio = Some(AudioAction::Pause);
        ctx.effects.led = Some(led_breathing());
        return Some(StateId::Paused);
    }

    if reselect_on_double_tap(ctx) {
        return None; // Re-entrant: the service restarts playback.
    }

    if ctx.inputs.playback_finished {
        info!("PLAYING: story finished, returning to idle");
        ctx.effects.led = Some(led_finished());
        ctx.effects.session = SessionAction::Clear;
        return Some(StateId::Idle);
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  PAUSED state
// ═══════════════════════════════════════════════════════════════════════════

fn paused_enter(ctx: &mut FsmContext) {
    ctx.effects.led.get_or_insert_with(led_breathing);
}

fn paused_update(ctx: &mut FsmContext) -> Option<StateId> {
    if let Some(next) = shutdown_guard(ctx) {
        return Some(next);
    }
    if let Some(next) = new_card_guard(ctx) {
        return Some(next);
    }

    if ctx.inputs.gesture == Some(ButtonEvent::Tap) {
        info!("PAUSED: tap, resuming");
        ctx.effects.audio = Some(AudioAction::Resume);
        ctx.effects.led = Some(LedPattern::Solid);
        return Some(StateId::Playing);
    }

    if reselect_on_double_tap(ctx) {
        return None; // The service forces Playing if the restart succeeds.
    }

    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  SHUTTING DOWN state — terminal
// ═══════════════════════════════════════════════════════════════════════════

fn shutting_down_enter(ctx: &mut FsmContext) {
    ctx.effects.led.get_or_insert_with(led_shutdown);
    info!("SHUTTING DOWN");
}

fn shutting_down_update(_ctx: &mut FsmContext) -> Option<StateId> {
    // Terminal: no input is processed, no transition ever leaves.
    None
}
