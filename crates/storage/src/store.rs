// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The narrow CRUD surface the broker core persists through.
//!
//! The backing implementation is an external concern; the core only ever
//! calls this trait. Failures here degrade to warnings at the call sites;
//! the in-memory state stays authoritative for the running process and the
//! next restart re-reads whatever did persist.

use axon_core::{NodeKind, RunningState, Subscription, Tag};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors from the persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Persisted node identity and lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    pub plugin: String,
    pub kind: NodeKind,
    /// Last lifecycle state; RUNNING nodes restart running.
    #[serde(default)]
    pub running: RunningState,
}

/// Persisted group: `(driver, name, interval)` plus the optional context
/// string a CID-derived group uses to locate its report control block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub driver: String,
    pub name: String,
    pub interval_ms: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Narrow persistence facade.
pub trait Store: Send + Sync {
    fn add_node(&self, record: &NodeRecord) -> Result<(), StoreError>;
    fn del_node(&self, name: &str) -> Result<(), StoreError>;
    /// Rename cascades to settings, groups, tags and subscriptions.
    fn rename_node(&self, name: &str, new_name: &str) -> Result<(), StoreError>;
    fn set_node_state(&self, name: &str, running: RunningState) -> Result<(), StoreError>;
    fn load_nodes(&self) -> Result<Vec<NodeRecord>, StoreError>;

    fn set_setting(&self, node: &str, setting: &str) -> Result<(), StoreError>;
    fn setting(&self, node: &str) -> Result<Option<String>, StoreError>;

    fn add_group(&self, record: &GroupRecord) -> Result<(), StoreError>;
    fn update_group(
        &self,
        driver: &str,
        group: &str,
        record: &GroupRecord,
    ) -> Result<(), StoreError>;
    /// Deleting a group discards its tags.
    fn del_group(&self, driver: &str, group: &str) -> Result<(), StoreError>;
    fn load_groups(&self, driver: &str) -> Result<Vec<GroupRecord>, StoreError>;

    fn add_tags(&self, driver: &str, group: &str, tags: &[Tag]) -> Result<(), StoreError>;
    fn update_tag(&self, driver: &str, group: &str, tag: &Tag) -> Result<(), StoreError>;
    fn del_tag(&self, driver: &str, group: &str, name: &str) -> Result<(), StoreError>;
    fn load_tags(&self, driver: &str, group: &str) -> Result<Vec<Tag>, StoreError>;

    fn add_subscription(&self, sub: &Subscription) -> Result<(), StoreError>;
    fn update_subscription(&self, sub: &Subscription) -> Result<(), StoreError>;
    fn del_subscription(&self, app: &str, driver: &str, group: &str) -> Result<(), StoreError>;
    fn load_subscriptions(&self, app: &str) -> Result<Vec<Subscription>, StoreError>;
    fn load_all_subscriptions(&self) -> Result<Vec<Subscription>, StoreError>;
}

/// The whole persisted document. Shared by the in-memory and file stores.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub(crate) struct StoreState {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub settings: HashMap<String, String>,
    #[serde(default)]
    pub groups: Vec<GroupRecord>,
    /// driver -> group -> tags
    #[serde(default)]
    pub tags: HashMap<String, HashMap<String, Vec<Tag>>>,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

impl StoreState {
    pub fn add_node(&mut self, record: &NodeRecord) {
        self.nodes.retain(|n| n.name != record.name);
        self.nodes.push(record.clone());
    }

    pub fn del_node(&mut self, name: &str) {
        self.nodes.retain(|n| n.name != name);
        self.settings.remove(name);
        self.groups.retain(|g| g.driver != name);
        self.tags.remove(name);
        self.subscriptions
            .retain(|s| s.app != name && s.driver != name);
    }

    pub fn rename_node(&mut self, name: &str, new_name: &str) -> Result<(), StoreError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.name == name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        node.name = new_name.to_string();
        if let Some(setting) = self.settings.remove(name) {
            self.settings.insert(new_name.to_string(), setting);
        }
        for group in self.groups.iter_mut().filter(|g| g.driver == name) {
            group.driver = new_name.to_string();
        }
        if let Some(tags) = self.tags.remove(name) {
            self.tags.insert(new_name.to_string(), tags);
        }
        for sub in self.subscriptions.iter_mut() {
            if sub.app == name {
                sub.app = new_name.to_string();
            }
            if sub.driver == name {
                sub.driver = new_name.to_string();
            }
        }
        Ok(())
    }

    pub fn set_node_state(&mut self, name: &str, running: RunningState) -> Result<(), StoreError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.name == name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        node.running = running;
        Ok(())
    }

    pub fn add_group(&mut self, record: &GroupRecord) {
        self.groups
            .retain(|g| !(g.driver == record.driver && g.name == record.name));
        self.groups.push(record.clone());
    }

    pub fn update_group(
        &mut self,
        driver: &str,
        group: &str,
        record: &GroupRecord,
    ) -> Result<(), StoreError> {
        let slot = self
            .groups
            .iter_mut()
            .find(|g| g.driver == driver && g.name == group)
            .ok_or_else(|| StoreError::NotFound(format!("{driver}/{group}")))?;
        // A rename moves the tag bucket along
        if slot.name != record.name {
            if let Some(tags) = self
                .tags
                .get_mut(driver)
                .and_then(|groups| groups.remove(group))
            {
                self.tags
                    .entry(driver.to_string())
                    .or_default()
                    .insert(record.name.clone(), tags);
            }
        }
        *slot = record.clone();
        for sub in self
            .subscriptions
            .iter_mut()
            .filter(|s| s.driver == driver && s.group == group)
        {
            sub.group = record.name.clone();
        }
        Ok(())
    }

    pub fn del_group(&mut self, driver: &str, group: &str) {
        self.groups
            .retain(|g| !(g.driver == driver && g.name == group));
        if let Some(groups) = self.tags.get_mut(driver) {
            groups.remove(group);
        }
        self.subscriptions
            .retain(|s| !(s.driver == driver && s.group == group));
    }

    pub fn add_tags(&mut self, driver: &str, group: &str, tags: &[Tag]) {
        let bucket = self
            .tags
            .entry(driver.to_string())
            .or_default()
            .entry(group.to_string())
            .or_default();
        for tag in tags {
            bucket.retain(|t| t.name != tag.name);
            bucket.push(tag.clone());
        }
    }

    pub fn update_tag(&mut self, driver: &str, group: &str, tag: &Tag) -> Result<(), StoreError> {
        let bucket = self
            .tags
            .get_mut(driver)
            .and_then(|groups| groups.get_mut(group))
            .ok_or_else(|| StoreError::NotFound(format!("{driver}/{group}")))?;
        let slot = bucket
            .iter_mut()
            .find(|t| t.name == tag.name)
            .ok_or_else(|| StoreError::NotFound(tag.name.clone()))?;
        *slot = tag.clone();
        Ok(())
    }

    pub fn del_tag(&mut self, driver: &str, group: &str, name: &str) {
        if let Some(bucket) = self
            .tags
            .get_mut(driver)
            .and_then(|groups| groups.get_mut(group))
        {
            bucket.retain(|t| t.name != name);
        }
    }

    pub fn add_subscription(&mut self, sub: &Subscription) {
        self.subscriptions
            .retain(|s| !(s.app == sub.app && s.driver == sub.driver && s.group == sub.group));
        self.subscriptions.push(sub.clone());
    }

    pub fn del_subscription(&mut self, app: &str, driver: &str, group: &str) {
        self.subscriptions
            .retain(|s| !(s.app == app && s.driver == driver && s.group == group));
    }
}
