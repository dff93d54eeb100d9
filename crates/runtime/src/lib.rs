// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! axon-runtime: the per-node adapter runtime
//!
//! An adapter binds one plugin instance to a name, owns its control endpoint
//! and dispatches every message shape to the right handler. Driver adapters
//! additionally run the group-polling scheduler, the tag cache and the write
//! queue; app adapters run a consumer thread draining the telemetry mailbox.

pub mod adapter;
pub mod cache;
pub mod driver;
mod driver_ops;
pub mod plugin;

pub use adapter::{Adapter, AdapterDeps, MANAGER_NAME};
pub use cache::TagCache;
pub use driver::{DriverCore, PollEmission};
pub use plugin::{
    CachePolicy, DriverPlugin, Plugin, PluginInstance, ScanResult, WriteOutcome, WriteRequest,
    WriteResponder,
};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub mod sim;
#[cfg(any(test, feature = "test-support"))]
pub use sim::{SimApp, SimAppState, SimDriver};
