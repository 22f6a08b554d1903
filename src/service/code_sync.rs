//! Editor code sync
//!
//! The editor extension pushes the learner's current buffer so the web view
//! can pick it up. Entries live only in memory, never expire, and the last
//! write for a `(user, mission)` pair wins.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// A synced buffer and when it arrived (epoch milliseconds)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncedCode {
    pub code: String,
    pub timestamp: i64,
}

#[derive(Debug, Default)]
pub struct CodeSyncStore {
    entries: RwLock<FxHashMap<String, SyncedCode>>,
}

impl CodeSyncStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(user_id: &str, mission_id: &str) -> String {
        format!("{}-{}", user_id, mission_id)
    }

    /// Store `code`, replacing whatever was there.
    pub fn put(&self, user_id: &str, mission_id: &str, code: &str, timestamp: i64) {
        self.entries.write().insert(
            Self::key(user_id, mission_id),
            SyncedCode {
                code: code.to_string(),
                timestamp,
            },
        );
    }

    pub fn get(&self, user_id: &str, mission_id: &str) -> Option<SyncedCode> {
        self.entries.read().get(&Self::key(user_id, mission_id)).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_last_write_wins() {
        let store = CodeSyncStore::new();
        assert_eq!(store.get("u", "m"), None);
        store.put("u", "m", "first", 1);
        store.put("u", "m", "second", 2);
        assert_eq!(
            store.get("u", "m"),
            Some(SyncedCode { code: "second".into(), timestamp: 2 })
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_keys_are_per_user_and_mission() {
        let store = CodeSyncStore::new();
        store.put("u1", "m", "a", 1);
        store.put("u2", "m", "b", 1);
        store.put("u1", "n", "c", 1);
        assert_eq!(store.get("u1", "m").map(|s| s.code), Some("a".into()));
        assert_eq!(store.get("u2", "m").map(|s| s.code), Some("b".into()));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_concurrent_writers() {
        let store = Arc::new(CodeSyncStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || store.put("u", "m", &format!("v{}", i), i))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let stored = store.get("u", "m").unwrap();
        assert_eq!(stored.code, format!("v{}", stored.timestamp));
    }
}
