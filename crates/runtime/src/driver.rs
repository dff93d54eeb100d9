// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Driver-side state: group registry, polling scheduler, subscriber registry.
//!
//! Polling multiplexes every group over one base tick. A group fires when its
//! `next_fire_at` has passed, at most once per inspection, and re-snapshots
//! its readable tags only when the group's change timestamp moved since the
//! last snapshot.

use crate::cache::TagCache;
use crate::plugin::{trans_data_envelope, CachePolicy, DriverPlugin};
use axon_core::envelope::TransPayload;
use axon_core::limits::MAX_GROUPS_PER_NODE;
use axon_core::{ErrorCode, Group, GroupSnapshot, Tag, TagQuery, TagValue, TagValueMeta};
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// One subscriber of a group.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscriber {
    pub app: String,
    pub port: u16,
    pub params: Option<String>,
    pub static_tags: Option<String>,
}

/// One telemetry envelope bound for one subscriber's port.
#[derive(Debug)]
pub struct PollEmission {
    pub app: String,
    pub port: u16,
    pub envelope: axon_core::Envelope,
}

/// What one scheduler inspection produced.
#[derive(Debug, Default)]
pub struct TickOutput {
    pub emissions: Vec<PollEmission>,
    pub tag_reads: u64,
    pub read_errors: u64,
}

struct PollState {
    next_fire_ms: i64,
    last_fire_ms: i64,
    /// Change timestamp the snapshot was taken at.
    seen_ts: i64,
    snapshot: Vec<Tag>,
}

/// Groups, subscribers, cache and polling bookkeeping of one driver node.
pub struct DriverCore {
    groups: Mutex<IndexMap<String, Arc<Group>>>,
    subscribers: RwLock<HashMap<String, Vec<Subscriber>>>,
    cache: TagCache,
    poll: Mutex<HashMap<String, PollState>>,
}

impl Default for DriverCore {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverCore {
    pub fn new() -> Self {
        Self {
            groups: Mutex::new(IndexMap::new()),
            subscribers: RwLock::new(HashMap::new()),
            cache: TagCache::new(),
            poll: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &TagCache {
        &self.cache
    }

    pub fn group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.lock().get(name).cloned()
    }

    pub fn group_count(&self) -> usize {
        self.groups.lock().len()
    }

    pub fn tag_total(&self) -> usize {
        self.groups.lock().values().map(|g| g.tag_count()).sum()
    }

    pub fn snapshots(&self) -> Vec<GroupSnapshot> {
        self.groups.lock().values().map(|g| g.snapshot()).collect()
    }

    pub fn add_group(
        &self,
        name: &str,
        interval_ms: u32,
        context: Option<String>,
        now_ms: i64,
    ) -> Result<Arc<Group>, ErrorCode> {
        let mut groups = self.groups.lock();
        if groups.contains_key(name) {
            return Err(ErrorCode::GroupExist);
        }
        if groups.len() >= MAX_GROUPS_PER_NODE {
            return Err(ErrorCode::GroupMaxGroups);
        }
        let group = Arc::new(Group::new(name, interval_ms)?.with_context(context));
        groups.insert(name.to_string(), Arc::clone(&group));
        self.poll.lock().insert(
            name.to_string(),
            PollState {
                next_fire_ms: now_ms + i64::from(interval_ms),
                last_fire_ms: now_ms,
                seen_ts: -1,
                snapshot: Vec::new(),
            },
        );
        Ok(group)
    }

    pub fn del_group(&self, name: &str) -> Result<(), ErrorCode> {
        let mut groups = self.groups.lock();
        if groups.shift_remove(name).is_none() {
            return Err(ErrorCode::GroupNotExist);
        }
        drop(groups);
        self.poll.lock().remove(name);
        self.cache.remove_group(name);
        self.subscribers.write().remove(name);
        Ok(())
    }

    /// Rename and/or interval change. Tags, subscribers and poll pacing are
    /// preserved across a rename.
    pub fn update_group(
        &self,
        name: &str,
        new_name: Option<&str>,
        interval_ms: Option<u32>,
        now_us: i64,
    ) -> Result<(), ErrorCode> {
        let group = self.group(name).ok_or(ErrorCode::GroupNotExist)?;

        if let Some(interval_ms) = interval_ms {
            if group.set_interval(interval_ms, now_us)? {
                // Re-pace from the last fire so the new interval takes
                // effect without an early tick
                let mut poll = self.poll.lock();
                if let Some(state) = poll.get_mut(name) {
                    state.next_fire_ms = state.last_fire_ms + i64::from(interval_ms);
                }
            }
        }

        if let Some(new_name) = new_name.filter(|n| *n != name) {
            let mut groups = self.groups.lock();
            if groups.contains_key(new_name) {
                return Err(ErrorCode::GroupExist);
            }
            group.rename(new_name)?;
            groups.shift_remove(name);
            groups.insert(new_name.to_string(), group);
            drop(groups);

            let mut poll = self.poll.lock();
            if let Some(state) = poll.remove(name) {
                poll.insert(new_name.to_string(), state);
            }
            drop(poll);
            self.cache.rename_group(name, new_name);
            let mut subs = self.subscribers.write();
            if let Some(entries) = subs.remove(name) {
                subs.insert(new_name.to_string(), entries);
            }
        }
        Ok(())
    }

    // -- subscribers ---------------------------------------------------------

    /// Subscribe an app; a duplicate updates the opaque blobs in place.
    pub fn subscribe(
        &self,
        group: &str,
        subscriber: Subscriber,
        now_us: i64,
    ) -> Result<(), ErrorCode> {
        let g = self.group(group).ok_or(ErrorCode::GroupNotExist)?;
        let mut subs = self.subscribers.write();
        let entries = subs.entry(group.to_string()).or_default();
        match entries.iter_mut().find(|s| s.app == subscriber.app) {
            Some(existing) => *existing = subscriber,
            None => entries.push(subscriber),
        }
        drop(subs);
        // The next tick resizes its fan-out
        g.touch(now_us);
        Ok(())
    }

    pub fn unsubscribe(&self, group: &str, app: &str, now_us: i64) -> Result<(), ErrorCode> {
        let g = self.group(group).ok_or(ErrorCode::GroupNotExist)?;
        let mut subs = self.subscribers.write();
        let entries = subs.entry(group.to_string()).or_default();
        let before = entries.len();
        entries.retain(|s| s.app != app);
        if entries.len() == before {
            return Err(ErrorCode::GroupNotSubscribe);
        }
        drop(subs);
        g.touch(now_us);
        Ok(())
    }

    /// Only the opaque blobs may change; the triple must already exist.
    pub fn update_subscribe(
        &self,
        group: &str,
        app: &str,
        params: Option<String>,
        static_tags: Option<String>,
        now_us: i64,
    ) -> Result<(), ErrorCode> {
        let g = self.group(group).ok_or(ErrorCode::GroupNotExist)?;
        let mut subs = self.subscribers.write();
        let entry = subs
            .get_mut(group)
            .and_then(|entries| entries.iter_mut().find(|s| s.app == app))
            .ok_or(ErrorCode::GroupNotSubscribe)?;
        entry.params = params;
        entry.static_tags = static_tags;
        drop(subs);
        g.touch(now_us);
        Ok(())
    }

    pub fn subscribers_of(&self, group: &str) -> Vec<Subscriber> {
        self.subscribers
            .read()
            .get(group)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop every subscription held by a deleted app.
    pub fn remove_app(&self, app: &str, now_us: i64) {
        let mut subs = self.subscribers.write();
        let mut touched = Vec::new();
        for (group, entries) in subs.iter_mut() {
            let before = entries.len();
            entries.retain(|s| s.app != app);
            if entries.len() != before {
                touched.push(group.clone());
            }
        }
        drop(subs);
        for group in touched {
            if let Some(g) = self.group(&group) {
                g.touch(now_us);
            }
        }
    }

    // -- writes --------------------------------------------------------------

    /// A write must target existing, WRITE-attributed tags.
    pub fn validate_write(&self, group: &str, tags: &[TagValue]) -> Result<(), ErrorCode> {
        let g = self.group(group).ok_or(ErrorCode::GroupNotExist)?;
        for tv in tags {
            let tag = g.get_tag(&tv.tag).ok_or(ErrorCode::TagNotExist)?;
            if !tag.attribute.contains(axon_core::TagAttr::WRITE) {
                return Err(ErrorCode::TagNotAllowWrite);
            }
        }
        Ok(())
    }

    // -- polling -------------------------------------------------------------

    /// Inspect every group once; due groups poll the plugin and emit one
    /// telemetry envelope per subscriber, all sharing the payload refcount.
    pub fn on_tick(
        &self,
        now_ms: i64,
        driver: &str,
        plugin: &mut dyn DriverPlugin,
    ) -> TickOutput {
        let mut out = TickOutput::default();
        let due: Vec<(String, Arc<Group>)> = {
            let groups = self.groups.lock();
            let poll = self.poll.lock();
            groups
                .iter()
                .filter(|(name, _)| {
                    poll.get(name.as_str())
                        .map(|state| state.next_fire_ms <= now_ms)
                        .unwrap_or(false)
                })
                .map(|(name, group)| (name.clone(), Arc::clone(group)))
                .collect()
        };

        for (name, group) in due {
            let interval = i64::from(group.interval_ms());
            let snapshot = {
                let mut poll = self.poll.lock();
                let Some(state) = poll.get_mut(&name) else {
                    continue;
                };
                state.last_fire_ms = now_ms;
                // Missed ticks coalesce: one fire per inspection
                state.next_fire_ms = now_ms + interval;
                let ts = group.timestamp();
                if state.seen_ts != ts {
                    state.snapshot = group.query(&TagQuery {
                        readable_only: true,
                        ..Default::default()
                    });
                    state.seen_ts = ts;
                    debug!(group = %name, "re-snapshot after configuration change");
                }
                state.snapshot.clone()
            };
            if snapshot.is_empty() {
                continue;
            }

            let mut samples = plugin.read_batch(&name, &snapshot);
            for sample in samples.iter_mut() {
                sample.value = sample.value.clone().sanitized();
            }
            out.tag_reads += samples.len() as u64;
            out.read_errors += samples.iter().filter(|s| s.value.is_error()).count() as u64;

            if plugin.cache_policy() == CachePolicy::Interval {
                for sample in &samples {
                    self.cache.insert(&name, sample, now_ms);
                }
            }

            let subscribers = self.subscribers_of(&name);
            if subscribers.is_empty() {
                continue;
            }
            let payload = TransPayload::new(driver, name.clone(), samples);
            for sub in subscribers {
                out.emissions.push(PollEmission {
                    app: sub.app.clone(),
                    port: sub.port,
                    envelope: trans_data_envelope(driver, &sub.app, &payload),
                });
            }
        }
        out
    }

    /// Serve a read request, from cache when allowed, from the device when
    /// `sync` is set or the plugin never caches.
    pub fn read_group(
        &self,
        group: &str,
        query: &TagQuery,
        sync: bool,
        now_ms: i64,
        plugin: &mut dyn DriverPlugin,
    ) -> Result<(Vec<TagValueMeta>, u64), ErrorCode> {
        let g = self.group(group).ok_or(ErrorCode::GroupNotExist)?;
        let tags = g.query(query);
        let use_cache = !sync && plugin.cache_policy() == CachePolicy::Interval;

        let mut cache_hits = 0u64;
        let mut samples = Vec::with_capacity(tags.len());
        let mut to_read = Vec::new();
        for tag in tags {
            if use_cache {
                if let Some(hit) = self.cache.get(group, &tag.name, now_ms) {
                    cache_hits += 1;
                    samples.push(hit);
                    continue;
                }
            }
            to_read.push(tag);
        }
        if !to_read.is_empty() {
            let mut fresh = plugin.read_batch(group, &to_read);
            for sample in fresh.iter_mut() {
                sample.value = sample.value.clone().sanitized();
                if plugin.cache_policy() == CachePolicy::Interval {
                    self.cache.insert(group, sample, now_ms);
                }
            }
            samples.extend(fresh);
        }
        Ok((samples, cache_hits))
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
