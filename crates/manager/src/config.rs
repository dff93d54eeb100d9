// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration, loaded from a TOML file with sane defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// `axond` settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Where the configuration store lives.
    pub state_file: PathBuf,
    /// Directory for the daemon log file.
    pub log_dir: PathBuf,
    /// Default tracing filter, e.g. "info" or "axon_runtime=debug".
    pub log_level: String,
    /// Directory scanned for core dumps by the metrics visitor.
    pub dump_dir: Option<PathBuf>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from("/var/lib/axon/axon.json"),
            log_dir: PathBuf::from("/var/log/axon"),
            log_level: "info".to_string(),
            dump_dir: None,
        }
    }
}

impl ManagerConfig {
    /// Read from `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
