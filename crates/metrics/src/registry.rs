// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide metric registry and per-node metric sets.
//!
//! `register_entry` is ref-counted: many nodes register the same entry name,
//! and the registry row lives until the last holder releases it. Global
//! traversal walks `(node, entry)` pairs; the system gauges are refreshed by
//! the traversal itself, not by any node.

use crate::entry::{MetricEntry, MetricType, MetricsError};
use crate::names;
use crate::system;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::debug;

struct RegistryRow {
    help: &'static str,
    metric_type: MetricType,
    refs: usize,
}

/// Process-wide registry of entry definitions plus the system gauges.
pub struct Registry {
    rows: RwLock<HashMap<&'static str, RegistryRow>>,
    nodes: Mutex<Vec<Weak<NodeMetrics>>>,
    started: Instant,
    /// Where core dumps land; scanned by the visitor.
    dump_dir: Mutex<Option<PathBuf>>,
    /// Filesystem whose usage the disk gauges report.
    state_path: Mutex<PathBuf>,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rows: RwLock::new(HashMap::new()),
            nodes: Mutex::new(Vec::new()),
            started: Instant::now(),
            dump_dir: Mutex::new(None),
            state_path: Mutex::new(PathBuf::from("/")),
        })
    }

    pub fn set_dump_dir(&self, dir: PathBuf) {
        self.dump_dir.lock().replace(dir);
    }

    pub fn set_state_path(&self, path: PathBuf) {
        *self.state_path.lock() = path;
    }

    /// Ref-counted registration of an entry definition.
    pub fn register_entry(
        &self,
        name: &'static str,
        help: &'static str,
        metric_type: MetricType,
    ) -> Result<(), MetricsError> {
        let mut rows = self.rows.write();
        match rows.get_mut(name) {
            Some(row) => {
                if row.metric_type != metric_type {
                    return Err(MetricsError::TypeMismatch(name.to_string()));
                }
                row.refs += 1;
            }
            None => {
                rows.insert(
                    name,
                    RegistryRow {
                        help,
                        metric_type,
                        refs: 1,
                    },
                );
            }
        }
        Ok(())
    }

    /// Release one reference; the row disappears with the last one.
    pub fn unregister_entry(&self, name: &str) {
        let mut rows = self.rows.write();
        if let Some(row) = rows.get_mut(name) {
            row.refs -= 1;
            if row.refs == 0 {
                rows.remove(name);
            }
        }
    }

    pub fn help_of(&self, name: &str) -> Option<&'static str> {
        self.rows.read().get(name).map(|row| row.help)
    }

    pub fn entry_refs(&self, name: &str) -> usize {
        self.rows.read().get(name).map(|row| row.refs).unwrap_or(0)
    }

    fn attach(&self, node: &Arc<NodeMetrics>) {
        let mut nodes = self.nodes.lock();
        nodes.retain(|w| w.strong_count() > 0);
        nodes.push(Arc::downgrade(node));
    }

    /// Walk every `(node, entry, value)` triple, system gauges first.
    ///
    /// The CPU gauge double-samples `/proc/stat` 50 ms apart, so one visit
    /// costs that much wall time.
    pub fn visit(&self, now_ms: i64, mut f: impl FnMut(&str, &'static str, u64)) {
        let stats = system::sample(
            self.state_path.lock().as_path(),
            self.dump_dir.lock().as_deref(),
        );
        f("system", names::CPU_PERCENT, stats.cpu_percent);
        f("system", names::MEM_USED_BYTES, stats.mem_used_bytes);
        f("system", names::MEM_TOTAL_BYTES, stats.mem_total_bytes);
        f("system", names::DISK_USED_BYTES, stats.disk_used_bytes);
        f("system", names::DISK_TOTAL_BYTES, stats.disk_total_bytes);
        f(
            "system",
            names::UPTIME_SECONDS,
            self.started.elapsed().as_secs(),
        );
        f("system", names::CORE_DUMPED, u64::from(stats.core_dumped));

        let nodes: Vec<Arc<NodeMetrics>> = {
            let nodes = self.nodes.lock();
            nodes.iter().filter_map(Weak::upgrade).collect()
        };
        for node in nodes {
            let name = node.node_name();
            let mut entries = node.entries.lock();
            for entry in entries.values_mut() {
                f(&name, entry.name, entry.value(now_ms));
            }
        }
    }
}

/// One node's metric set, keyed by entry name.
pub struct NodeMetrics {
    node: Mutex<String>,
    entries: Mutex<IndexMap<&'static str, MetricEntry>>,
    registry: Arc<Registry>,
}

impl NodeMetrics {
    /// Create and attach to the registry for traversal.
    pub fn new(registry: Arc<Registry>, node: impl Into<String>) -> Arc<Self> {
        let metrics = Arc::new(Self {
            node: Mutex::new(node.into()),
            entries: Mutex::new(IndexMap::new()),
            registry: Arc::clone(&registry),
        });
        registry.attach(&metrics);
        metrics
    }

    pub fn node_name(&self) -> String {
        self.node.lock().clone()
    }

    /// Metrics registration follows a rename so the fleet view stays keyed
    /// by the live name.
    pub fn rename(&self, node: impl Into<String>) {
        *self.node.lock() = node.into();
    }

    /// Register one entry on this node and ref-count it globally.
    pub fn register(&self, entry: MetricEntry) -> Result<(), MetricsError> {
        let name = entry.name;
        self.registry
            .register_entry(name, entry.help, entry.metric_type)?;
        let mut entries = self.entries.lock();
        if entries.insert(name, entry).is_some() {
            // Double registration on the same node keeps one global ref
            self.registry.unregister_entry(name);
        }
        Ok(())
    }

    pub fn update(&self, name: &str, now_ms: i64, value: u64) -> Result<(), MetricsError> {
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(name)
            .ok_or_else(|| MetricsError::UnknownEntry(name.to_string()))?;
        entry.update(now_ms, value);
        Ok(())
    }

    pub fn value(&self, name: &str, now_ms: i64) -> Option<u64> {
        self.entries.lock().get_mut(name).map(|e| e.value(now_ms))
    }

    /// Stop semantics: every entry returns to its initial value unless it is
    /// flagged `no_reset`.
    pub fn reset(&self) {
        self.entries.lock().values_mut().for_each(MetricEntry::reset);
    }
}

impl Drop for NodeMetrics {
    fn drop(&mut self) {
        let entries = self.entries.lock();
        for name in entries.keys() {
            self.registry.unregister_entry(name);
        }
        if !entries.is_empty() {
            debug!(node = %self.node.lock(), "released node metrics");
        }
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
