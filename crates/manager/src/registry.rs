// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin registry: the catalog of installable plugins and their factories.
//!
//! Factories are in-process constructors; how a module got into the process
//! (compiled in, or loaded by an external facility) never leaks into the
//! core types. `STATIC` plugins cannot be removed.

use axon_core::{ErrorCode, PluginDescriptor, PluginKind};
use axon_runtime::PluginInstance;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

type Factory = Arc<dyn Fn() -> PluginInstance + Send + Sync>;

struct PluginEntry {
    descriptor: PluginDescriptor,
    factory: Factory,
}

/// Name-keyed plugin catalog.
#[derive(Default)]
pub struct PluginRegistry {
    entries: RwLock<HashMap<String, PluginEntry>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install or replace a plugin. Validation failures reject the entry.
    pub fn register<F>(&self, descriptor: PluginDescriptor, factory: F) -> Result<(), ErrorCode>
    where
        F: Fn() -> PluginInstance + Send + Sync + 'static,
    {
        descriptor.validate()?;
        let name = descriptor.name.clone();
        self.entries.write().insert(
            name,
            PluginEntry {
                descriptor,
                factory: Arc::new(factory),
            },
        );
        Ok(())
    }

    /// Re-register by library name, as `ADD_PLUGIN`/`UPDATE_PLUGIN` do.
    pub fn confirm_library(&self, library: &str) -> Result<PluginDescriptor, ErrorCode> {
        self.entries
            .read()
            .values()
            .find(|e| e.descriptor.library == library)
            .map(|e| e.descriptor.clone())
            .ok_or(ErrorCode::PluginNotExist)
    }

    pub fn remove(&self, name: &str) -> Result<(), ErrorCode> {
        let mut entries = self.entries.write();
        match entries.get(name) {
            None => Err(ErrorCode::PluginNotExist),
            Some(entry) if entry.descriptor.kind == PluginKind::Static => {
                Err(ErrorCode::PluginNotAllowDelete)
            }
            Some(_) => {
                entries.remove(name);
                Ok(())
            }
        }
    }

    pub fn descriptor(&self, name: &str) -> Option<PluginDescriptor> {
        self.entries.read().get(name).map(|e| e.descriptor.clone())
    }

    pub fn descriptors(&self) -> Vec<PluginDescriptor> {
        self.entries
            .read()
            .values()
            .map(|e| e.descriptor.clone())
            .collect()
    }

    pub fn schema_exists(&self, schema: &str) -> bool {
        self.entries
            .read()
            .values()
            .any(|e| e.descriptor.schema == schema)
    }

    /// Build a fresh plugin instance.
    pub fn instantiate(&self, name: &str) -> Result<(PluginDescriptor, PluginInstance), ErrorCode> {
        let entries = self.entries.read();
        let entry = entries.get(name).ok_or(ErrorCode::PluginNotExist)?;
        Ok((entry.descriptor.clone(), (entry.factory)()))
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
