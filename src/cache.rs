use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::snapshot::{MatchSnapshot, SideStats};

pub type FingerprintFn = Box<dyn Fn(&MatchSnapshot) -> String + Send + Sync>;

struct CacheEntry<T> {
    fingerprint: String,
    minute: u16,
    score: (u8, u8),
    value: Arc<T>,
}

/// Per-match memo of the last analysis result. Entries live until they are
/// invalidated; a lookup only hits when the new snapshot is a near duplicate
/// of the cached one.
pub struct ResultCache<T> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    fingerprint: FingerprintFn,
}

impl<T> Default for ResultCache<T> {
    fn default() -> Self {
        Self::with_fingerprint(Box::new(snapshot_fingerprint))
    }
}

impl<T> ResultCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fingerprint(fingerprint: FingerprintFn) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            fingerprint,
        }
    }

    pub fn fingerprint(&self, snapshot: &MatchSnapshot) -> String {
        (self.fingerprint)(snapshot)
    }

    /// Hit when the fingerprint matches, or when fewer than two minutes have
    /// passed without a change of score.
    pub fn lookup(&self, match_id: &str, snapshot: &MatchSnapshot) -> Option<Arc<T>> {
        let fingerprint = self.fingerprint(snapshot);
        let entries = self.entries.lock();
        let entry = entries.get(match_id)?;
        let same = entry.fingerprint == fingerprint;
        let near = entry.minute.abs_diff(snapshot.minute) < 2
            && entry.score == (snapshot.home_score, snapshot.away_score);
        if same || near {
            Some(Arc::clone(&entry.value))
        } else {
            None
        }
    }

    pub fn store(&self, match_id: &str, snapshot: &MatchSnapshot, value: Arc<T>) {
        let entry = CacheEntry {
            fingerprint: self.fingerprint(snapshot),
            minute: snapshot.minute,
            score: (snapshot.home_score, snapshot.away_score),
            value,
        };
        self.entries.lock().insert(match_id.to_string(), entry);
    }

    pub fn invalidate(&self, match_id: &str) -> bool {
        self.entries.lock().remove(match_id).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// SHA-256 over the minute, score and the headline counters of both sides.
pub fn snapshot_fingerprint(snapshot: &MatchSnapshot) -> String {
    let mut hasher = Sha256::new();
    hasher.update(snapshot.minute.to_le_bytes());
    hasher.update([snapshot.home_score, snapshot.away_score]);
    for side in [&snapshot.home, &snapshot.away] {
        hash_side(&mut hasher, side);
    }
    STANDARD.encode(hasher.finalize())
}

fn hash_side(hasher: &mut Sha256, side: &SideStats) {
    hasher.update(side.possession.to_bits().to_le_bytes());
    for v in [
        side.total_shots,
        side.shots_on_target,
        side.corners,
        side.fouls,
        side.yellow_cards,
        side.red_cards,
        side.offsides,
        side.throw_ins,
    ] {
        hasher.update(v.to_le_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(minute: u16, home_score: u8, corners: u32) -> MatchSnapshot {
        MatchSnapshot {
            minute,
            home_score,
            home: SideStats {
                corners,
                possession: 50.0,
                ..SideStats::default()
            },
            ..MatchSnapshot::default()
        }
    }

    #[test]
    fn identical_snapshot_hits() {
        let cache = ResultCache::new();
        cache.store("m1", &snap(30, 0, 3), Arc::new("report".to_string()));
        let hit = cache.lookup("m1", &snap(30, 0, 3));
        assert_eq!(hit.as_deref().map(String::as_str), Some("report"));
        assert!(cache.lookup("m2", &snap(30, 0, 3)).is_none());
    }

    #[test]
    fn one_minute_later_without_goal_hits() {
        let cache = ResultCache::new();
        cache.store("m1", &snap(30, 0, 3), Arc::new(1u32));
        assert!(cache.lookup("m1", &snap(31, 0, 4)).is_some());
        assert!(cache.lookup("m1", &snap(32, 0, 4)).is_none());
        assert!(cache.lookup("m1", &snap(31, 1, 4)).is_none());
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = ResultCache::new();
        cache.store("a", &snap(10, 0, 0), Arc::new(()));
        cache.store("b", &snap(10, 0, 0), Arc::new(()));
        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn injected_fingerprint_is_used() {
        let cache: ResultCache<u8> = ResultCache::with_fingerprint(Box::new(|s| s.minute.to_string()));
        assert_eq!(cache.fingerprint(&snap(44, 2, 9)), "44");
    }

    #[test]
    fn fingerprint_changes_with_core_fields() {
        let a = snapshot_fingerprint(&snap(30, 0, 3));
        assert_eq!(a, snapshot_fingerprint(&snap(30, 0, 3)));
        assert_ne!(a, snapshot_fingerprint(&snap(30, 0, 4)));
        assert_ne!(a, snapshot_fingerprint(&snap(30, 1, 3)));
    }
}
