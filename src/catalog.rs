//! JSON card catalog with a warm-ahead cache.
//!
//! Cards live as `card_<uid>.json` files under the stories directory. The
//! catalog parses them, resolves narration paths, and drops stories whose
//! audio file is missing so the selection policy only ever sees playable
//! candidates.
//!
//! The cache is a shared read-only map keyed by UID: entries are immutable
//! `Arc<CardData>` once inserted, and concurrent writers follow
//! last-writer-wins. A background prefetch thread may warm it; a miss on the
//! control loop simply causes a synchronous (slower) load inline.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::RwLock;

use crate::app::ports::CatalogPort;
use crate::error::ContentFault;
use crate::story::CardData;

// ---------------------------------------------------------------------------
// Card cache
// ---------------------------------------------------------------------------

/// Shared card cache handle. Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct CardCache {
    inner: Arc<RwLock<HashMap<String, Arc<CardData>>>>,
}

impl CardCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached card. Cheap: clones an `Arc`, never blocks writers
    /// for longer than the map access.
    pub fn get(&self, uid: &str) -> Option<Arc<CardData>> {
        self.inner.read().get(uid).cloned()
    }

    /// Insert (or replace) an entry — last writer wins.
    pub fn insert(&self, uid: &str, data: Arc<CardData>) {
        self.inner.write().insert(uid.to_string(), data);
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

// ---------------------------------------------------------------------------
// JSON catalog
// ---------------------------------------------------------------------------

/// Card catalog backed by a directory of JSON files.
pub struct JsonCatalog {
    dir: PathBuf,
    cache: CardCache,
}

impl JsonCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: CardCache::new(),
        }
    }

    /// Use an externally shared cache (e.g. one also fed by a prefetcher).
    pub fn with_cache(dir: impl Into<PathBuf>, cache: CardCache) -> Self {
        Self {
            dir: dir.into(),
            cache,
        }
    }

    /// Warm the cache for `uid` on a background thread. The control loop
    /// never waits on this; it only reads the cache.
    pub fn prefetch(&self, uid: &str) {
        let uid = uid.to_string();
        let dir = self.dir.clone();
        let cache = self.cache.clone();
        // Detached on purpose: the loop only ever reads the cache.
        let _ = std::thread::spawn(move || match load_from_disk(&dir, &uid) {
            Ok(data) => {
                debug!("prefetched card {uid} ({} stories)", data.stories.len());
                cache.insert(&uid, Arc::new(data));
            }
            Err(fault) => debug!("prefetch for card {uid} skipped: {fault}"),
        });
    }

    /// Kick off a background prefetch for every card file present, so the
    /// first tap of a known card hits the cache instead of the disk.
    pub fn warm(&self) {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return;
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(uid) = name
                .strip_prefix("card_")
                .and_then(|n| n.strip_suffix(".json"))
            {
                self.prefetch(uid);
            }
        }
    }

    /// Startup sweep: parse every card file and report unplayable stories.
    /// Log-only; the box still boots with partial content.
    pub fn verify(&self) -> (usize, usize) {
        let mut checked = 0usize;
        let mut missing = 0usize;

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) => {
                warn!("cannot read stories dir {}: {e}", self.dir.display());
                return (0, 0);
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = match std::fs::read_to_string(&path) {
                Ok(r) => r,
                Err(e) => {
                    warn!("cannot read {}: {e}", path.display());
                    continue;
                }
            };
            let card: CardData = match serde_json::from_str(&raw) {
                Ok(c) => c,
                Err(e) => {
                    warn!("invalid card JSON {}: {e}", path.display());
                    continue;
                }
            };
            for story in &card.stories {
                checked += 1;
                if !self.dir.join(&story.audio).is_file() {
                    missing += 1;
                    warn!(
                        "missing narration for '{}' ({})",
                        story.title,
                        story.audio.display()
                    );
                }
            }
        }

        if missing == 0 {
            info!("catalog verified: all {checked} narration files present");
        } else {
            warn!("catalog verified: {missing}/{checked} narration files missing");
        }
        (checked, missing)
    }
}

impl CatalogPort for JsonCatalog {
    fn load_card(&self, uid: &str) -> Option<Arc<CardData>> {
        if let Some(hit) = self.cache.get(uid) {
            debug!("card {uid}: cache hit");
            return Some(hit);
        }
        match load_from_disk(&self.dir, uid) {
            Ok(data) => {
                let data = Arc::new(data);
                self.cache.insert(uid, data.clone());
                Some(data)
            }
            Err(fault) => {
                warn!("card {uid}: {fault}");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Internal
// ---------------------------------------------------------------------------

/// UIDs come straight off the tag reader; only accept simple token
/// characters so a crafted tag cannot escape the stories directory.
fn uid_is_sane(uid: &str) -> bool {
    !uid.is_empty()
        && uid.len() <= 64
        && uid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn load_from_disk(dir: &Path, uid: &str) -> Result<CardData, ContentFault> {
    if !uid_is_sane(uid) {
        warn!("rejecting malformed card UID {uid:?}");
        return Err(ContentFault::CardNotFound);
    }

    let path = dir.join(format!("card_{uid}.json"));
    let raw = std::fs::read_to_string(&path).map_err(|_| ContentFault::CardNotFound)?;
    let mut card: CardData =
        serde_json::from_str(&raw).map_err(|_| ContentFault::InvalidJson)?;

    // Resolve narration paths and keep only playable stories.
    card.stories.retain_mut(|story| {
        let resolved = if story.audio.is_absolute() {
            story.audio.clone()
        } else {
            dir.join(&story.audio)
        };
        if resolved.is_file() {
            story.audio = resolved;
            true
        } else {
            warn!(
                "card {uid}: dropping '{}' ({}): {}",
                story.title,
                story.audio.display(),
                ContentFault::MissingAudio
            );
            false
        }
    });

    if card.stories.is_empty() {
        return Err(ContentFault::NoStories);
    }
    Ok(card)
}
