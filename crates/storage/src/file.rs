// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed store: one JSON document, written atomically.
//!
//! Saves go to a `.tmp` sibling first and rename over the live file, so a
//! crash mid-write never corrupts the configuration. A corrupt file found at
//! open is rotated to `.bak` and treated as empty.

use crate::store::{GroupRecord, NodeRecord, Store, StoreError, StoreState};
use axon_core::{RunningState, Subscription, Tag};
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::warn;

/// A `Store` persisting to a single JSON file.
pub struct FileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl FileStore {
    /// Open or create the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = Self::load(&path)?;
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    fn load(path: &Path) -> Result<StoreState, StoreError> {
        if !path.exists() {
            return Ok(StoreState::default());
        }
        let file = File::open(path)?;
        match serde_json::from_reader(BufReader::new(file)) {
            Ok(state) => Ok(state),
            Err(e) => {
                let bak = path.with_extension("bak");
                warn!(
                    error = %e,
                    path = %path.display(),
                    bak = %bak.display(),
                    "corrupt store file, rotating to .bak and starting empty",
                );
                fs::rename(path, &bak)?;
                Ok(StoreState::default())
            }
        }
    }

    /// Write to `.tmp`, fsync, rename into place.
    fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, state)?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut StoreState) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut state = self.state.lock();
        let out = f(&mut state)?;
        self.persist(&state)?;
        Ok(out)
    }
}

impl Store for FileStore {
    fn add_node(&self, record: &NodeRecord) -> Result<(), StoreError> {
        self.mutate(|s| {
            s.add_node(record);
            Ok(())
        })
    }

    fn del_node(&self, name: &str) -> Result<(), StoreError> {
        self.mutate(|s| {
            s.del_node(name);
            Ok(())
        })
    }

    fn rename_node(&self, name: &str, new_name: &str) -> Result<(), StoreError> {
        self.mutate(|s| s.rename_node(name, new_name))
    }

    fn set_node_state(&self, name: &str, running: RunningState) -> Result<(), StoreError> {
        self.mutate(|s| s.set_node_state(name, running))
    }

    fn load_nodes(&self) -> Result<Vec<NodeRecord>, StoreError> {
        Ok(self.state.lock().nodes.clone())
    }

    fn set_setting(&self, node: &str, setting: &str) -> Result<(), StoreError> {
        self.mutate(|s| {
            s.settings.insert(node.to_string(), setting.to_string());
            Ok(())
        })
    }

    fn setting(&self, node: &str) -> Result<Option<String>, StoreError> {
        Ok(self.state.lock().settings.get(node).cloned())
    }

    fn add_group(&self, record: &GroupRecord) -> Result<(), StoreError> {
        self.mutate(|s| {
            s.add_group(record);
            Ok(())
        })
    }

    fn update_group(
        &self,
        driver: &str,
        group: &str,
        record: &GroupRecord,
    ) -> Result<(), StoreError> {
        self.mutate(|s| s.update_group(driver, group, record))
    }

    fn del_group(&self, driver: &str, group: &str) -> Result<(), StoreError> {
        self.mutate(|s| {
            s.del_group(driver, group);
            Ok(())
        })
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
        self.mutate(|s| {
            s.add_tags(driver, group, tags);
            Ok(())
        })
    }

    fn update_tag(&self, driver: &str, group: &str, tag: &Tag) -> Result<(), StoreError> {
        self.mutate(|s| s.update_tag(driver, group, tag))
    }

    fn del_tag(&self, driver: &str, group: &str, name: &str) -> Result<(), StoreError> {
        self.mutate(|s| {
            s.del_tag(driver, group, name);
            Ok(())
        })
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
        self.mutate(|s| {
            s.add_subscription(sub);
            Ok(())
        })
    }

    fn update_subscription(&self, sub: &Subscription) -> Result<(), StoreError> {
        self.mutate(|s| {
            s.add_subscription(sub);
            Ok(())
        })
    }

    fn del_subscription(&self, app: &str, driver: &str, group: &str) -> Result<(), StoreError> {
        self.mutate(|s| {
            s.del_subscription(app, driver, group);
            Ok(())
        })
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
#[path = "file_tests.rs"]
mod tests;
