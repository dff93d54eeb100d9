// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node endpoints: in-memory datagram channels of owned envelopes.
//!
//! The original design bound one abstract-namespace socket per node and sent
//! a heap pointer through it; here the channel itself carries the owned
//! envelope and a reactor notifier supplies the readiness edge. Per-sender
//! FIFO falls out of the single underlying queue. Telemetry destinations are
//! addressed by port through a shared `PortTable`.

use crate::reactor::{IoEvent, IoHandle, IoNotifier, Reactor, ReactorError};
use axon_core::limits::{ENDPOINT_TIMEOUT_MS, MAILBOX_CAPACITY};
use axon_core::Envelope;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

/// Errors surfaced to an envelope sender.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("endpoint full, send timed out after {ENDPOINT_TIMEOUT_MS}ms")]
    Timeout,
    #[error("endpoint closed")]
    Closed,
}

/// Sending half of a node endpoint. Cheap to clone; every sender sees the
/// same FIFO.
#[derive(Clone)]
pub struct EndpointSender {
    tx: Sender<Envelope>,
    notifier: Arc<Mutex<Option<IoNotifier>>>,
}

impl EndpointSender {
    /// Enqueue and signal readiness. Blocks at most the endpoint timeout
    /// when the queue is full.
    pub fn send(&self, envelope: Envelope) -> Result<(), SendError> {
        match self.tx.try_send(envelope) {
            Ok(()) => {}
            Err(TrySendError::Disconnected(_)) => return Err(SendError::Closed),
            Err(TrySendError::Full(envelope)) => {
                let deadline = Duration::from_millis(ENDPOINT_TIMEOUT_MS);
                self.tx
                    .send_timeout(envelope, deadline)
                    .map_err(|e| match e {
                        crossbeam_channel::SendTimeoutError::Timeout(_) => SendError::Timeout,
                        crossbeam_channel::SendTimeoutError::Disconnected(_) => SendError::Closed,
                    })?;
            }
        }
        if let Some(notifier) = self.notifier.lock().as_ref() {
            notifier.notify(IoEvent::Read);
        }
        Ok(())
    }

    /// Signal the receiver that this peer is going away.
    pub fn hangup(&self) {
        if let Some(notifier) = self.notifier.lock().as_ref() {
            notifier.notify(IoEvent::Hup);
        }
    }
}

/// Receiving half of a node endpoint; register it on a reactor to drain.
pub struct EndpointReceiver {
    rx: Receiver<Envelope>,
    notifier: Arc<Mutex<Option<IoNotifier>>>,
}

impl EndpointReceiver {
    /// Register on the reactor. `on_envelope` runs on the reactor thread for
    /// every queued envelope; `on_gone` runs for Closed/Hup edges.
    pub fn register<F, G>(
        self,
        reactor: &Reactor,
        mut on_envelope: F,
        mut on_gone: G,
    ) -> Result<IoHandle, ReactorError>
    where
        F: FnMut(Envelope) + Send + 'static,
        G: FnMut(IoEvent) + Send + 'static,
    {
        let rx = self.rx.clone();
        let registration = reactor.add_io(move |event| match event {
            IoEvent::Read => {
                while let Ok(envelope) = rx.try_recv() {
                    on_envelope(envelope);
                }
            }
            IoEvent::Closed | IoEvent::Hup => on_gone(event),
        })?;
        self.notifier.lock().replace(registration.notifier);
        Ok(registration.handle)
    }

    /// Drain without a reactor; blocks up to the endpoint timeout.
    ///
    /// Only used by tests and teardown paths.
    pub fn recv_timeout(&self) -> Option<Envelope> {
        let deadline = Instant::now() + Duration::from_millis(ENDPOINT_TIMEOUT_MS);
        self.rx.recv_deadline(deadline).ok()
    }
}

/// Create a connected endpoint pair with the default datagram capacity.
pub fn endpoint() -> (EndpointSender, EndpointReceiver) {
    let (tx, rx) = bounded(MAILBOX_CAPACITY);
    let notifier = Arc::new(Mutex::new(None));
    (
        EndpointSender {
            tx,
            notifier: Arc::clone(&notifier),
        },
        EndpointReceiver { rx, notifier },
    )
}

/// Process-wide map of telemetry ports to endpoint senders.
///
/// The manager hands out rising port numbers; binding an occupied port fails
/// and the caller retries with the next one.
#[derive(Default)]
pub struct PortTable {
    ports: Mutex<HashMap<u16, EndpointSender>>,
}

impl PortTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn bind(&self, port: u16, sender: EndpointSender) -> Result<(), axon_core::ErrorCode> {
        let mut ports = self.ports.lock();
        if ports.contains_key(&port) {
            warn!(port, "telemetry port already bound");
            return Err(axon_core::ErrorCode::PortInUse);
        }
        ports.insert(port, sender);
        Ok(())
    }

    pub fn unbind(&self, port: u16) {
        self.ports.lock().remove(&port);
    }

    pub fn lookup(&self, port: u16) -> Option<EndpointSender> {
        self.ports.lock().get(&port).cloned()
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
