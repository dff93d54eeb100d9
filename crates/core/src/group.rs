// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polling groups: a named bag of tags with an interval and a change marker.
//!
//! The change timestamp is strictly monotone per group. Pollers cache the
//! value they last saw and re-snapshot the tag set only when it moved, so a
//! configuration change is picked up on the next tick without re-reading the
//! whole group every time.

use crate::error::ErrorCode;
use crate::limits;
use crate::tag::Tag;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

/// Filter for tag queries.
#[derive(Debug, Clone, Default)]
pub struct TagQuery {
    /// Substring match on the tag name.
    pub name_contains: Option<String>,
    /// Substring match on the description.
    pub desc_contains: Option<String>,
    /// Explicit tag-name set; empty means "all".
    pub names: Vec<String>,
    /// Keep only tags with READ or SUBSCRIBE.
    pub readable_only: bool,
}

impl TagQuery {
    fn matches(&self, tag: &Tag) -> bool {
        if self.readable_only && !tag.attribute.is_readable() {
            return false;
        }
        if let Some(name) = &self.name_contains {
            if !tag.name.contains(name.as_str()) {
                return false;
            }
        }
        if let Some(desc) = &self.desc_contains {
            if !tag.description.contains(desc.as_str()) {
                return false;
            }
        }
        if !self.names.is_empty() && !self.names.iter().any(|n| n == &tag.name) {
            return false;
        }
        true
    }
}

/// Point-in-time view of a group's configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSnapshot {
    pub name: String,
    pub interval_ms: u32,
    pub context: Option<String>,
    pub tag_count: usize,
    pub change_timestamp: i64,
}

struct Inner {
    name: String,
    interval_ms: u32,
    /// Report-control descriptor carried for CID-derived groups.
    context: Option<String>,
    tags: IndexMap<String, Tag>,
}

/// A polling unit within a driver node.
pub struct Group {
    inner: Mutex<Inner>,
    change_ts: AtomicI64,
}

impl Group {
    pub fn new(name: impl Into<String>, interval_ms: u32) -> Result<Self, ErrorCode> {
        let name = name.into();
        if !limits::name_fits(&name, limits::GROUP_NAME_LEN) {
            return Err(ErrorCode::GroupNameTooLong);
        }
        if interval_ms < limits::GROUP_INTERVAL_MIN_MS {
            return Err(ErrorCode::GroupParameterInvalid);
        }
        Ok(Self {
            inner: Mutex::new(Inner {
                name,
                interval_ms,
                context: None,
                tags: IndexMap::new(),
            }),
            change_ts: AtomicI64::new(0),
        })
    }

    pub fn with_context(self, context: Option<String>) -> Self {
        self.inner.lock().context = context;
        self
    }

    pub fn name(&self) -> String {
        self.inner.lock().name.clone()
    }

    pub fn interval_ms(&self) -> u32 {
        self.inner.lock().interval_ms
    }

    pub fn context(&self) -> Option<String> {
        self.inner.lock().context.clone()
    }

    /// Current change timestamp (µs). Strictly monotone across mutations.
    pub fn timestamp(&self) -> i64 {
        self.change_ts.load(Ordering::Acquire)
    }

    /// Bump the change timestamp to at least `now_us`, always strictly above
    /// the previous value.
    fn bump(&self, now_us: i64) {
        let _ = self
            .change_ts
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |prev| {
                Some(now_us.max(prev + 1))
            });
    }

    /// Force the change timestamp forward without a tag mutation.
    ///
    /// Subscription changes use this so the next poll resizes its fan-out.
    pub fn touch(&self, now_us: i64) {
        self.bump(now_us);
    }

    pub fn rename(&self, new_name: impl Into<String>) -> Result<(), ErrorCode> {
        let new_name = new_name.into();
        if !limits::name_fits(&new_name, limits::GROUP_NAME_LEN) {
            return Err(ErrorCode::GroupNameTooLong);
        }
        self.inner.lock().name = new_name;
        Ok(())
    }

    /// Update the polling interval. Returns true if it actually changed.
    pub fn set_interval(&self, interval_ms: u32, now_us: i64) -> Result<bool, ErrorCode> {
        if interval_ms < limits::GROUP_INTERVAL_MIN_MS {
            return Err(ErrorCode::GroupParameterInvalid);
        }
        let mut inner = self.inner.lock();
        if inner.interval_ms == interval_ms {
            return Ok(false);
        }
        inner.interval_ms = interval_ms;
        drop(inner);
        self.bump(now_us);
        Ok(true)
    }

    pub fn add_tag(&self, tag: Tag, now_us: i64) -> Result<(), ErrorCode> {
        self.add_tags(vec![tag], now_us)
    }

    /// Insert a batch of tags atomically: either every tag is added or none.
    pub fn add_tags(&self, tags: Vec<Tag>, now_us: i64) -> Result<(), ErrorCode> {
        let mut inner = self.inner.lock();
        for (i, tag) in tags.iter().enumerate() {
            tag.validate()?;
            if inner.tags.contains_key(tag.name.as_str()) {
                return Err(ErrorCode::TagNameConflict);
            }
            if tags[..i].iter().any(|t| t.name == tag.name) {
                return Err(ErrorCode::TagNameConflict);
            }
        }
        if tags.is_empty() {
            return Ok(());
        }
        for tag in tags {
            inner.tags.insert(tag.name.clone(), tag);
        }
        drop(inner);
        self.bump(now_us);
        Ok(())
    }

    /// Replace an existing tag. The timestamp moves only when the descriptor
    /// actually differs.
    pub fn update_tag(&self, tag: Tag, now_us: i64) -> Result<(), ErrorCode> {
        tag.validate()?;
        let mut inner = self.inner.lock();
        let slot = inner
            .tags
            .get_mut(tag.name.as_str())
            .ok_or(ErrorCode::TagNotExist)?;
        if *slot == tag {
            return Ok(());
        }
        *slot = tag;
        drop(inner);
        self.bump(now_us);
        Ok(())
    }

    pub fn del_tag(&self, name: &str, now_us: i64) -> Result<(), ErrorCode> {
        let mut inner = self.inner.lock();
        if inner.tags.shift_remove(name).is_none() {
            return Err(ErrorCode::TagNotExist);
        }
        drop(inner);
        self.bump(now_us);
        Ok(())
    }

    pub fn get_tag(&self, name: &str) -> Option<Tag> {
        self.inner.lock().tags.get(name).cloned()
    }

    pub fn tag_count(&self) -> usize {
        self.inner.lock().tags.len()
    }

    pub fn get_all(&self) -> Vec<Tag> {
        self.inner.lock().tags.values().cloned().collect()
    }

    pub fn query(&self, query: &TagQuery) -> Vec<Tag> {
        self.inner
            .lock()
            .tags
            .values()
            .filter(|t| query.matches(t))
            .cloned()
            .collect()
    }

    /// Paginated query. `total` counts the whole filtered set, not the page.
    pub fn query_paged(
        &self,
        query: &TagQuery,
        current_page: usize,
        page_size: usize,
    ) -> (Vec<Tag>, usize) {
        let filtered = self.query(query);
        let total = filtered.len();
        if page_size == 0 || current_page == 0 {
            return (Vec::new(), total);
        }
        let page = filtered
            .into_iter()
            .skip((current_page - 1) * page_size)
            .take(page_size)
            .collect();
        (page, total)
    }

    pub fn snapshot(&self) -> GroupSnapshot {
        let inner = self.inner.lock();
        GroupSnapshot {
            name: inner.name.clone(),
            interval_ms: inner.interval_ms,
            context: inner.context.clone(),
            tag_count: inner.tags.len(),
            change_timestamp: self.change_ts.load(Ordering::Acquire),
        }
    }
}

#[cfg(test)]
#[path = "group_tests.rs"]
mod tests;
