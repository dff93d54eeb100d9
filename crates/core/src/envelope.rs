// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Envelopes: the addressed unit moving through the bus.
//!
//! The header carries sender, receiver, an opaque correlation context and an
//! opaque trace tag; both pass through every hop untouched so an external
//! tracing sidecar can stitch write latency end to end. Telemetry payloads
//! are reference-counted and shared across the fan-out; the last holder to
//! drop its handle frees the payload.

use crate::message::{Message, TagValueMeta};
use std::sync::Arc;

/// Trace discipline requested by the envelope originator. Opaque to the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TraceKind {
    #[default]
    None,
    /// Correlate through the external OTLP sidecar.
    Otlp,
}

/// Shared body of a `TRANS_DATA` broadcast.
#[derive(Debug, Clone, PartialEq)]
pub struct TransPayload {
    pub driver: String,
    pub group: String,
    pub tags: Vec<TagValueMeta>,
}

impl TransPayload {
    pub fn new(
        driver: impl Into<String>,
        group: impl Into<String>,
        tags: Vec<TagValueMeta>,
    ) -> Arc<Self> {
        Arc::new(Self {
            driver: driver.into(),
            group: group.into(),
            tags,
        })
    }
}

/// Typed header + body routed between nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Opaque correlation id, passed through untouched.
    pub context: u64,
    pub trace: TraceKind,
    pub sender: String,
    pub receiver: String,
    pub message: Message,
}

impl Envelope {
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        message: Message,
    ) -> Self {
        Self {
            context: 0,
            trace: TraceKind::None,
            sender: sender.into(),
            receiver: receiver.into(),
            message,
        }
    }

    pub fn with_context(mut self, context: u64) -> Self {
        self.context = context;
        self
    }

    pub fn with_trace(mut self, trace: TraceKind) -> Self {
        self.trace = trace;
        self
    }

    /// Build the response envelope: sender and receiver swap, context and
    /// trace ride along, so a plugin can reply without restating its name.
    pub fn reply(&self, message: Message) -> Envelope {
        Envelope {
            context: self.context,
            trace: self.trace,
            sender: self.receiver.clone(),
            receiver: self.sender.clone(),
            message,
        }
    }

    /// Shorthand for an `Error`-bodied reply.
    pub fn reply_error(&self, code: crate::error::ErrorCode) -> Envelope {
        self.reply(Message::Error { code })
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
