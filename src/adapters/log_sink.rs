//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger. A future companion-display adapter would implement the
//! same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={state:?}");
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {from:?} -> {to:?}");
            }
            AppEvent::CardAccepted { uid, title } => {
                info!("CARD  | {uid} accepted, playing '{title}'");
            }
            AppEvent::CardRejected { uid, fault } => {
                warn!("CARD  | {uid} rejected: {fault}");
            }
            AppEvent::PlaybackFinished => {
                info!("PLAY  | story finished");
            }
            AppEvent::BatteryLow { volts } => {
                warn!("BATT  | low at {volts:.2} V");
            }
            AppEvent::ShutdownRequested(reason) => {
                info!("POWER | shutdown requested ({reason:?})");
            }
        }
    }
}
