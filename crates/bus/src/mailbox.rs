// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded telemetry mailbox between the reactor and a consumer thread.
//!
//! Overflow policy is drop-newest: `push` hands the rejected item back so
//! the producer releases its payload reference. This is the only sanctioned
//! message loss in the broker; control traffic never crosses a mailbox.

use axon_core::limits::MAILBOX_CAPACITY;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;

/// Why a push was rejected. Carries the item back to the caller.
#[derive(Debug)]
pub enum PushError<T> {
    Full(T),
    Closed(T),
}

struct State<T> {
    queue: VecDeque<T>,
    capacity: usize,
    closed: bool,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    available: Condvar,
}

/// Bounded FIFO; producer side never blocks, consumer side always does.
pub struct Mailbox<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self::with_capacity(MAILBOX_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    queue: VecDeque::with_capacity(capacity),
                    capacity,
                    closed: false,
                }),
                available: Condvar::new(),
            }),
        }
    }

    /// Non-blocking enqueue. The rejected item comes back on overflow so the
    /// caller can release its payload reference.
    pub fn push(&self, item: T) -> Result<(), PushError<T>> {
        let mut state = self.inner.state.lock();
        if state.closed {
            return Err(PushError::Closed(item));
        }
        if state.queue.len() >= state.capacity {
            return Err(PushError::Full(item));
        }
        state.queue.push_back(item);
        drop(state);
        self.inner.available.notify_one();
        Ok(())
    }

    /// Blocking dequeue; `None` once the mailbox is closed.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.inner.state.lock();
        loop {
            if let Some(item) = state.queue.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            self.inner.available.wait(&mut state);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Teardown: discard everything queued and wake the consumer.
    ///
    /// Returns how many messages were discarded.
    pub fn close(&self) -> usize {
        let mut state = self.inner.state.lock();
        state.closed = true;
        let dropped = state.queue.len();
        state.queue.clear();
        drop(state);
        self.inner.available.notify_all();
        dropped
    }
}

#[cfg(test)]
#[path = "mailbox_tests.rs"]
mod tests;
