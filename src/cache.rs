//! Content-addressed result cache
//!
//! Maps a built artifact's checksum to its previously measured score so the
//! pool can skip benchmarking flag perturbations that produced a binary
//! already seen this run. A benign race exists between a missed lookup and a
//! concurrent write for the same checksum: both writers measured the same
//! binary, so whichever write lands last is as valid as the other.

use std::collections::HashMap;
use std::sync::Mutex;

pub struct ResultCache {
    entries: Mutex<HashMap<String, f64>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, checksum: &str) -> Option<f64> {
        self.entries.lock().unwrap().get(checksum).copied()
    }

    pub fn put(&self, checksum: String, score: f64) {
        self.entries.lock().unwrap().insert(checksum, score);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let cache = ResultCache::new();
        cache.put("abc".to_string(), 4.5);
        assert_eq!(cache.get("abc"), Some(4.5));
    }

    #[test]
    fn missing_checksum_returns_none() {
        let cache = ResultCache::new();
        assert_eq!(cache.get("missing"), None);
    }

    #[test]
    fn last_write_wins_on_duplicate_checksum() {
        let cache = ResultCache::new();
        cache.put("x".to_string(), 1.0);
        cache.put("x".to_string(), 2.0);
        assert_eq!(cache.get("x"), Some(2.0));
    }
}
