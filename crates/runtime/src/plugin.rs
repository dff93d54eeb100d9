// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The plugin capability surface.
//!
//! Plugins are a capability set, not a linkage mechanism: the adapter calls
//! these hooks and neither knows nor cares whether the implementation was
//! compiled in or loaded some other way. Driver-only hooks live on the
//! extension trait so app plugins never see them.

use axon_bus::EndpointSender;
use axon_core::{
    Envelope, ErrorCode, LinkState, Message, PrgFileState, Tag, TagValue, TagValueMeta, Value,
};
use axon_core::envelope::TransPayload;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// How the driver's tag cache treats polled values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Refresh on each poll; reads between polls hit the cache.
    #[default]
    Interval,
    /// Never cache; every read goes to the device.
    Never,
}

/// One queued write against a driver.
#[derive(Debug, Clone)]
pub struct WriteRequest {
    pub token: u64,
    pub group: String,
    pub tags: Vec<TagValue>,
}

/// What the driver plugin did with a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The device confirmed (or refused) synchronously.
    Done(ErrorCode),
    /// The plugin kept the token and will call the responder later.
    Pending,
}

/// Result of a scan-tags pass.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub tags: Vec<Tag>,
    pub data_type: Option<axon_core::DataType>,
    pub is_array: bool,
    /// Nothing left behind `ctx`; callers stop paging here.
    pub is_last: bool,
    pub ctx: String,
}

struct PendingWrite {
    envelope: Envelope,
    /// Tokens still outstanding for this request.
    remaining: usize,
    first_error: ErrorCode,
}

/// Completion path for asynchronous writes.
///
/// Holds the pending request envelopes; responding routes the reply back to
/// the app that originated the write, with its correlation context intact.
/// A multi-group write tracks one token per group against the same request;
/// the reply goes out when the last token completes, carrying the first
/// non-success code.
#[derive(Clone)]
pub struct WriteResponder {
    pending: Arc<Mutex<HashMap<u64, Arc<Mutex<PendingWrite>>>>>,
    out: EndpointSender,
}

impl WriteResponder {
    pub fn new(out: EndpointSender) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            out,
        }
    }

    /// Park a request envelope until the plugin confirms the write.
    pub fn track(&self, token: u64, request: Envelope) {
        self.track_all(&[token], request);
    }

    /// Park a request awaiting every listed token.
    pub fn track_all(&self, tokens: &[u64], request: Envelope) {
        if tokens.is_empty() {
            return;
        }
        let entry = Arc::new(Mutex::new(PendingWrite {
            envelope: request,
            remaining: tokens.len(),
            first_error: ErrorCode::Success,
        }));
        let mut pending = self.pending.lock();
        for token in tokens {
            pending.insert(*token, Arc::clone(&entry));
        }
    }

    /// Complete a tracked write; unknown tokens are logged and ignored.
    pub fn respond(&self, token: u64, error: ErrorCode) {
        let Some(entry) = self.pending.lock().remove(&token) else {
            warn!(token, "write response for unknown token");
            return;
        };
        let reply = {
            let mut entry = entry.lock();
            entry.remaining -= 1;
            if !error.is_success() && entry.first_error.is_success() {
                entry.first_error = error;
            }
            if entry.remaining > 0 {
                return;
            }
            entry.envelope.reply_error(entry.first_error)
        };
        if let Err(e) = self.out.send(reply) {
            warn!(token, error = %e, "failed to deliver write response");
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Lifecycle and control hooks every plugin implements.
pub trait Plugin: Send {
    /// First call after construction, before `init`.
    fn open(&mut self) -> Result<(), ErrorCode> {
        Ok(())
    }

    /// `load` is true when a persisted setting exists for this node.
    fn init(&mut self, load: bool) -> Result<(), ErrorCode>;

    /// Last call before destruction.
    fn uninit(&mut self) {}

    fn start(&mut self) -> Result<(), ErrorCode>;

    fn stop(&mut self) -> Result<(), ErrorCode>;

    /// Apply a configuration string. Ok moves the node INIT -> READY.
    fn setting(&mut self, config: &str) -> Result<(), ErrorCode>;

    /// Control responses and telemetry delivered to the plugin.
    fn request(&mut self, envelope: &Envelope) -> Result<(), ErrorCode>;

    fn link_state(&self) -> LinkState {
        LinkState::Disconnected
    }
}

/// Driver-only hooks layered on top of `Plugin`.
pub trait DriverPlugin: Plugin {
    /// Reject tags whose address or type the device cannot serve.
    fn validate_tag(&self, tag: &Tag) -> Result<(), ErrorCode>;

    /// Read current values for a polling snapshot.
    fn read_batch(&mut self, group: &str, tags: &[Tag]) -> Vec<TagValueMeta>;

    /// Accept a validated write. `Pending` plugins confirm via `responder`.
    fn write(&mut self, request: WriteRequest, responder: &WriteResponder) -> WriteOutcome;

    fn cache_policy(&self) -> CachePolicy {
        CachePolicy::Interval
    }

    /// One-shot read bypassing group configuration and cache.
    fn test_read(&mut self, tag: &Tag) -> Result<Value, ErrorCode>;

    fn scan_tags(&mut self, _ctx: &str) -> Result<ScanResult, ErrorCode> {
        Err(ErrorCode::Internal)
    }

    fn action(&mut self, _action: &str) -> Result<Option<String>, ErrorCode> {
        Ok(None)
    }

    fn prg_file(&mut self, _name: &str, _data: &[u8]) -> Result<(), ErrorCode> {
        Err(ErrorCode::Internal)
    }

    fn prg_file_state(&mut self) -> (PrgFileState, Option<String>) {
        (PrgFileState::Idle, None)
    }
}

/// The shape-erased plugin an adapter owns.
pub enum PluginInstance {
    Driver(Box<dyn DriverPlugin>),
    App(Box<dyn Plugin>),
}

impl PluginInstance {
    pub fn as_plugin(&mut self) -> &mut dyn Plugin {
        match self {
            PluginInstance::Driver(p) => &mut **p,
            PluginInstance::App(p) => &mut **p,
        }
    }

    pub fn as_driver(&mut self) -> Option<&mut dyn DriverPlugin> {
        match self {
            PluginInstance::Driver(p) => Some(&mut **p),
            PluginInstance::App(_) => None,
        }
    }

    pub fn link_state(&self) -> LinkState {
        match self {
            PluginInstance::Driver(p) => p.link_state(),
            PluginInstance::App(p) => p.link_state(),
        }
    }
}

/// Build a telemetry envelope fanned out to one subscriber.
pub fn trans_data_envelope(
    driver: &str,
    app: &str,
    payload: &Arc<TransPayload>,
) -> Envelope {
    Envelope::new(
        driver,
        app,
        Message::TransData {
            payload: Arc::clone(payload),
        },
    )
}
