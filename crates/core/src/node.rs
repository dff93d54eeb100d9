// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node identity and the adapter lifecycle state machine.

use crate::error::ErrorCode;
use serde::{Deserialize, Serialize};

/// Which side of the broker a node sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// South-bound, talks to devices, owns groups.
    Driver,
    /// North-bound, consumes telemetry through a mailbox.
    App,
}

/// Adapter lifecycle state.
///
/// ```text
/// INIT ──setting──▶ READY ──start──▶ RUNNING ──stop──▶ STOPPED
///                                      ▲                  │
///                                      └──────start───────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunningState {
    #[default]
    Init,
    Ready,
    Running,
    Stopped,
}

impl RunningState {
    /// Check the start transition, returning the documented wrong-state code.
    pub fn check_start(self) -> Result<(), ErrorCode> {
        match self {
            RunningState::Init => Err(ErrorCode::NodeNotReady),
            RunningState::Running => Err(ErrorCode::NodeIsRunning),
            RunningState::Ready | RunningState::Stopped => Ok(()),
        }
    }

    /// Check the stop transition.
    pub fn check_stop(self) -> Result<(), ErrorCode> {
        match self {
            RunningState::Running => Ok(()),
            RunningState::Stopped => Err(ErrorCode::NodeIsStopped),
            RunningState::Init | RunningState::Ready => Err(ErrorCode::NodeNotRunning),
        }
    }
}

/// Device-link state as last reported by the plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    #[default]
    Disconnected,
    Connected,
}

/// Per-node log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// Derive the log category for a node name.
///
/// Path separators would split the category hierarchy, so they map to `_`.
pub fn log_category(node: &str) -> String {
    node.replace(['/', '\\'], "_")
}

#[cfg(test)]
#[path = "node_tests.rs"]
mod tests;
