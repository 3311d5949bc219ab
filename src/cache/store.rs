use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use serde_json::Value;
use tracing::debug;

use super::tags::{Query, Tag};

struct CacheEntry {
    value: Value,
    tags: HashSet<Tag>,
}

/// Tag-indexed store of query results.
///
/// Entries are JSON values keyed by the query that produced them and
/// registered under a set of tags; invalidating a tag drops every entry
/// registered under it. Entries have no identity beyond their tags: a
/// dropped entry is simply recreated by the next fetch.
#[derive(Default)]
pub struct TagCache {
    entries: Mutex<HashMap<Query, CacheEntry>>,
}

impl TagCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached value for `query`, if one survives.
    pub fn get(&self, query: &Query) -> Option<Value> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let hit = entries.get(query).map(|entry| entry.value.clone());
        debug!(?query, hit = hit.is_some(), "Cache probe");
        hit
    }

    /// Register `value` for `query` under `tags`, replacing any previous
    /// entry for the same query.
    pub fn insert(&self, query: Query, tags: Vec<Tag>, value: Value) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            query,
            CacheEntry {
                value,
                tags: tags.into_iter().collect(),
            },
        );
    }

    /// Drop every entry registered under any of `tags`. Returns how many
    /// entries were removed.
    pub fn invalidate(&self, tags: &[Tag]) -> usize {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| !tags.iter().any(|tag| entry.tags.contains(tag)));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(?tags, removed, "Invalidated cache entries");
        }
        removed
    }

    /// Drop everything. Used when the whole session ends.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
