// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plugin descriptors.
//!
//! A descriptor tells the manager how to materialize a node: which module
//! provides it, which side of the broker it sits on, and whether more than
//! one instance may exist.

use crate::error::ErrorCode;
use crate::limits;
use crate::node::NodeKind;
use serde::{Deserialize, Serialize};

/// How a plugin module was brought into the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    /// Compiled in; cannot be unloaded.
    Static,
    /// Shipped with the distribution.
    System,
    /// User-installed.
    Custom,
}

/// Everything the manager knows about an installable plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    /// Module (library) providing the plugin.
    pub library: String,
    /// Settings-schema name served to the control surface.
    pub schema: String,
    pub kind: PluginKind,
    pub node_kind: NodeKind,
    pub version: String,
    /// Only one node of this plugin may exist at a time.
    #[serde(default)]
    pub single_instance: bool,
    /// Shown in plugin listings.
    #[serde(default = "default_true")]
    pub display: bool,
    /// Fixed node name for single-instance plugins created at boot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_instance_name: Option<String>,
    #[serde(default)]
    pub description: String,
}

fn default_true() -> bool {
    true
}

impl PluginDescriptor {
    pub fn validate(&self) -> Result<(), ErrorCode> {
        if !limits::name_fits(&self.name, limits::PLUGIN_NAME_LEN) {
            return Err(ErrorCode::PluginNameTooLong);
        }
        if !limits::name_fits(&self.library, limits::LIBRARY_NAME_LEN) {
            return Err(ErrorCode::LibraryNameTooLong);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "plugin_tests.rs"]
mod tests;
