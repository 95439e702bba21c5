//! Story model and time-of-day selection policy.
//!
//! A card maps to a list of stories, each tagged with a mood tone. During
//! the configured calm window (evenings/nights) the box prefers stories
//! carrying the calm tone; outside it, stories *not* carrying the calm tone.
//! If the preferred subset is empty the choice falls back to a uniform pick
//! over all stories, so a card never goes silent just because its tones are
//! one-sided.

use std::path::PathBuf;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Card data model (matches the card_<uid>.json schema)
// ---------------------------------------------------------------------------

fn default_tone() -> String {
    "calmo".to_string()
}

/// One narrated story on a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    #[serde(default)]
    pub id: String,
    pub title: String,
    /// Mood tone; also selects the background-music loop.
    #[serde(default = "default_tone")]
    pub tone: String,
    /// Narration file, relative to the stories directory.
    pub audio: PathBuf,
}

/// Parsed contents of a card file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardData {
    pub stories: Vec<Story>,
}

// ---------------------------------------------------------------------------
// Calm window
// ---------------------------------------------------------------------------

/// Time-of-day range during which calm-toned stories are preferred.
/// May wrap around midnight (e.g. 20:30 – 06:30).
#[derive(Debug, Clone, Copy)]
pub struct CalmWindow {
    /// Start, minutes after midnight (inclusive).
    pub start_min: u16,
    /// End, minutes after midnight (exclusive).
    pub end_min: u16,
}

impl CalmWindow {
    /// Check if the given minutes-after-midnight falls inside the window.
    pub fn is_calm(&self, minutes: u16) -> bool {
        if self.start_min <= self.end_min {
            // e.g. 13:00..15:00 (daytime nap window)
            minutes >= self.start_min && minutes < self.end_min
        } else {
            // e.g. 20:30..06:30 — wraps around midnight
            minutes >= self.start_min || minutes < self.end_min
        }
    }
}

// ---------------------------------------------------------------------------
// Selection policy
// ---------------------------------------------------------------------------

/// Pick a story appropriate for the time of day.
///
/// `is_calm = true`: only stories whose tone equals `calm_tone`
/// (case-insensitive). `is_calm = false`: only stories whose tone differs.
/// Empty preferred subset → uniform fallback over all stories. Returns
/// `None` only for an empty input slice.
pub fn select_story<'a, R: Rng + ?Sized>(
    stories: &'a [Story],
    is_calm: bool,
    calm_tone: &str,
    rng: &mut R,
) -> Option<&'a Story> {
    let preferred: Vec<&Story> = stories
        .iter()
        .filter(|s| s.tone.eq_ignore_ascii_case(calm_tone) == is_calm)
        .collect();

    if let Some(&story) = preferred.choose(rng) {
        return Some(story);
    }
    stories.choose(rng)
}
