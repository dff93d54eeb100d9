// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Last-known-value cache for driver tags.
//!
//! Entries expire after the configured window; an expired hit is still a
//! hit, but the value degrades to `TagValueExpired` so consumers can tell
//! stale data from fresh.

use axon_core::limits::CACHE_EXPIRY_MS;
use axon_core::{ErrorCode, TagValueMeta, Value};
use parking_lot::Mutex;
use std::collections::HashMap;

struct CachedValue {
    value: Value,
    metas: Vec<(String, Value)>,
    updated_ms: i64,
}

/// `(group, tag)` keyed value cache.
pub struct TagCache {
    entries: Mutex<HashMap<(String, String), CachedValue>>,
    expiry_ms: i64,
}

impl Default for TagCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TagCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            expiry_ms: CACHE_EXPIRY_MS,
        }
    }

    #[cfg(test)]
    fn with_expiry(expiry_ms: i64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            expiry_ms,
        }
    }

    pub fn insert(&self, group: &str, sample: &TagValueMeta, now_ms: i64) {
        self.entries.lock().insert(
            (group.to_string(), sample.tag.clone()),
            CachedValue {
                value: sample.value.clone(),
                metas: sample.metas.clone(),
                updated_ms: now_ms,
            },
        );
    }

    /// Fetch a cached sample; stale entries surface the expired error value.
    pub fn get(&self, group: &str, tag: &str, now_ms: i64) -> Option<TagValueMeta> {
        let entries = self.entries.lock();
        let cached = entries.get(&(group.to_string(), tag.to_string()))?;
        let value = if now_ms - cached.updated_ms > self.expiry_ms {
            Value::Error(ErrorCode::TagValueExpired)
        } else {
            cached.value.clone()
        };
        Some(TagValueMeta {
            tag: tag.to_string(),
            value,
            metas: cached.metas.clone(),
        })
    }

    pub fn remove_tag(&self, group: &str, tag: &str) {
        self.entries
            .lock()
            .remove(&(group.to_string(), tag.to_string()));
    }

    pub fn remove_group(&self, group: &str) {
        self.entries.lock().retain(|(g, _), _| g != group);
    }

    pub fn rename_group(&self, old: &str, new: &str) {
        let mut entries = self.entries.lock();
        let moved: Vec<_> = entries
            .iter()
            .filter(|((g, _), _)| g == old)
            .map(|((_, t), _)| t.clone())
            .collect();
        for tag in moved {
            if let Some(cached) = entries.remove(&(old.to_string(), tag.clone())) {
                entries.insert((new.to_string(), tag), cached);
            }
        }
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
