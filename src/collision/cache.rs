//! Persistent FSM cache: keyed by `domain ++ canonical(match_tree)`, stored
//! as the canonical regex-source string rather than serialized DFA
//! internals, so a cache built by one routecomp version stays valid across
//! upgrades to the automaton builder itself (spec.md §9 design note).
//! Grounded on the pickle-based `fsm_cache` in the original validator,
//! reshaped for a format that does not tie the cache's validity to a
//! specific serialized representation of `Fsm`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::fsm::{Fsm, FsmError};

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    canonical_regex: String,
    ignore_case: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FsmCache {
    entries: BTreeMap<String, CacheEntry>,
}

impl FsmCache {
    pub fn load(path: &Path) -> std::io::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content).unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
    }

    pub fn get(&self, key: &str) -> Option<Result<Fsm, FsmError>> {
        self.entries
            .get(key)
            .map(|entry| Fsm::from_pattern(&entry.canonical_regex, entry.ignore_case))
    }

    /// Record `key` as a cache candidate. Entries that end up colliding
    /// with anything else are dropped before the cache is saved, so the
    /// persisted cache only ever contains FSMs proven non-colliding; a
    /// stale entry can never hide a real collision.
    pub fn insert(&mut self, key: String, canonical_regex: String, ignore_case: bool) {
        self.entries.insert(
            key,
            CacheEntry {
                canonical_regex,
                ignore_case,
            },
        );
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn retain_keys(&mut self, keep: impl Fn(&str) -> bool) {
        self.entries.retain(|key, _| keep(key));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut cache = FsmCache::default();
        cache.insert("example.com|/foo".to_string(), "/foo".to_string(), false);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        cache.save(&path).unwrap();
        let loaded = FsmCache::load(&path).unwrap();
        assert!(loaded.get("example.com|/foo").is_some());
    }

    #[test]
    fn colliding_entries_are_dropped_before_persisting() {
        let mut cache = FsmCache::default();
        cache.insert("a".to_string(), "/x".to_string(), false);
        cache.insert("b".to_string(), "/y".to_string(), false);
        cache.retain_keys(|k| k != "a");
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }
}
