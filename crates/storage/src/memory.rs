// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store used by tests and as the default fixture backend.

use crate::store::{GroupRecord, NodeRecord, Store, StoreError, StoreState};
use axon_core::{RunningState, Subscription, Tag};
use parking_lot::Mutex;

/// A `Store` that forgets everything on drop.
#[derive(Default)]
pub struct MemStore {
    state: Mutex<StoreState>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {
    fn add_node(&self, record: &NodeRecord) -> Result<(), StoreError> {
        self.state.lock().add_node(record);
        Ok(())
    }

    fn del_node(&self, name: &str) -> Result<(), StoreError> {
        self.state.lock().del_node(name);
        Ok(())
    }

    fn rename_node(&self, name: &str, new_name: &str) -> Result<(), StoreError> {
        self.state.lock().rename_node(name, new_name)
    }

    fn set_node_state(&self, name: &str, running: RunningState) -> Result<(), StoreError> {
        self.state.lock().set_node_state(name, running)
    }

    fn load_nodes(&self) -> Result<Vec<NodeRecord>, StoreError> {
        Ok(self.state.lock().nodes.clone())
    }

    fn set_setting(&self, node: &str, setting: &str) -> Result<(), StoreError> {
        self.state
            .lock()
            .settings
            .insert(node.to_string(), setting.to_string());
        Ok(())
    }

    fn setting(&self, node: &str) -> Result<Option<String>, StoreError> {
        Ok(self.state.lock().settings.get(node).cloned())
    }

    fn add_group(&self, record: &GroupRecord) -> Result<(), StoreError> {
        self.state.lock().add_group(record);
        Ok(())
    }

    fn update_group(
        &self,
        driver: &str,
        group: &str,
        record: &GroupRecord,
    ) -> Result<(), StoreError> {
        self.state.lock().update_group(driver, group, record)
    }

    fn del_group(&self, driver: &str, group: &str) -> Result<(), StoreError> {
        self.state.lock().del_group(driver, group);
        Ok(())
    }

    fn load_groups(&self, driver: &str) -> Result<Vec<GroupRecord>, StoreError> {
        Ok(self
            .state
            .lock()
            .groups
            .iter()
            .filter(|g| g.driver == driver)
            .cloned()
            .collect())
    }

    fn add_tags(&self, driver: &str, group: &str, tags: &[Tag]) -> Result<(), StoreError> {
        self.state.lock().add_tags(driver, group, tags);
        Ok(())
    }

    fn update_tag(&self, driver: &str, group: &str, tag: &Tag) -> Result<(), StoreError> {
        self.state.lock().update_tag(driver, group, tag)
    }

    fn del_tag(&self, driver: &str, group: &str, name: &str) -> Result<(), StoreError> {
        self.state.lock().del_tag(driver, group, name);
        Ok(())
    }

    fn load_tags(&self, driver: &str, group: &str) -> Result<Vec<Tag>, StoreError> {
        Ok(self
            .state
            .lock()
            .tags
            .get(driver)
            .and_then(|groups| groups.get(group))
            .cloned()
            .unwrap_or_default())
    }

    fn add_subscription(&self, sub: &Subscription) -> Result<(), StoreError> {
        self.state.lock().add_subscription(sub);
        Ok(())
    }

    fn update_subscription(&self, sub: &Subscription) -> Result<(), StoreError> {
        self.state.lock().add_subscription(sub);
        Ok(())
    }

    fn del_subscription(&self, app: &str, driver: &str, group: &str) -> Result<(), StoreError> {
        self.state.lock().del_subscription(app, driver, group);
        Ok(())
    }

    fn load_subscriptions(&self, app: &str) -> Result<Vec<Subscription>, StoreError> {
        Ok(self
            .state
            .lock()
            .subscriptions
            .iter()
            .filter(|s| s.app == app)
            .cloned()
            .collect())
    }

    fn load_all_subscriptions(&self) -> Result<Vec<Subscription>, StoreError> {
        Ok(self.state.lock().subscriptions.clone())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
